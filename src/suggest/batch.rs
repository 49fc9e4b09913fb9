//! Batch size suggestions

use super::{propose_values, SuggestionGenerator};
use crate::capabilities::SystemCapabilities;
use crate::config::StageCatalog;
use crate::types::{PipelineDescriptor, SuggestionSet};

/// Tries every configured batch size on each inference stage
pub struct BatchGenerator {
    catalog: StageCatalog,
    sizes: Vec<u32>,
}

impl BatchGenerator {
    pub fn new(catalog: StageCatalog, sizes: Vec<u32>) -> Self {
        Self { catalog, sizes }
    }
}

impl SuggestionGenerator for BatchGenerator {
    fn name(&self) -> &str {
        "batch-size"
    }

    fn propose(&self, pipeline: &PipelineDescriptor, _: &SystemCapabilities) -> SuggestionSet {
        propose_values(
            pipeline,
            &self.catalog.inference_kinds,
            &self.catalog.batch_key,
            self.sizes.iter().copied(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_of_two_batches() {
        let generator = BatchGenerator::new(StageCatalog::default(), vec![1, 2, 4, 8, 16, 32]);
        let pipeline =
            PipelineDescriptor::parse("src ! gvadetect model=m.xml device=GPU ! sink").unwrap();
        let set = generator.propose(&pipeline, &SystemCapabilities::empty());

        let values: Vec<String> = set
            .alternatives(1)
            .iter()
            .map(|s| s.stages()[0].get("batch-size").unwrap_or_default().to_string())
            .collect();
        assert_eq!(values, vec!["1", "2", "4", "8", "16", "32"]);
        assert_eq!(
            set.alternatives(1)[2].to_string(),
            "gvadetect model=m.xml device=GPU batch-size=4"
        );
        assert_eq!(set.combination_count(), 7);
    }

    #[test]
    fn test_existing_batch_replaced_in_place() {
        let generator = BatchGenerator::new(StageCatalog::default(), vec![8]);
        let pipeline =
            PipelineDescriptor::parse("gvaclassify batch-size=1 model=c.xml").unwrap();
        let set = generator.propose(&pipeline, &SystemCapabilities::empty());
        assert_eq!(
            set.alternatives(0)[0].to_string(),
            "gvaclassify batch-size=8 model=c.xml"
        );
    }
}
