//! Inference device suggestions

use super::SuggestionGenerator;
use crate::capabilities::SystemCapabilities;
use crate::config::StageCatalog;
use crate::types::{PipelineDescriptor, SuggestionSet};

/// Moves inference stages onto each detected accelerator, plus a CPU fallback
///
/// The device key and its companion pre-processing backend are changed
/// together because backends only work with their own device class.
pub struct DeviceGenerator {
    catalog: StageCatalog,
}

impl DeviceGenerator {
    pub fn new(catalog: StageCatalog) -> Self {
        Self { catalog }
    }
}

impl SuggestionGenerator for DeviceGenerator {
    fn name(&self) -> &str {
        "device"
    }

    fn propose(
        &self,
        pipeline: &PipelineDescriptor,
        capabilities: &SystemCapabilities,
    ) -> SuggestionSet {
        let catalog = &self.catalog;
        let mut suggestions = SuggestionSet::identity(pipeline);

        for position in pipeline.positions_of(&catalog.inference_kinds) {
            let Some(current) = pipeline.get(position) else {
                continue;
            };
            let selected = current.get(&catalog.device_key);

            for class in capabilities.iter() {
                if selected == Some(class.name.as_str()) {
                    continue;
                }
                let mut alternative = current.clone();
                alternative.set(&catalog.device_key, &class.name);
                alternative.set(&catalog.backend_key, &class.preprocess_backend);
                suggestions.push(position, alternative);
            }

            let mut fallback = current.clone();
            fallback.set(&catalog.device_key, &catalog.cpu_device);
            fallback.set(&catalog.backend_key, &catalog.cpu_backend);
            suggestions.push(position, fallback);
        }
        suggestions
    }
}
