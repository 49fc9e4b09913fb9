//! Suggestion generators
//!
//! Each generator looks at the current best pipeline and proposes
//! alternatives for the positions it understands. Generators only change the
//! properties of a stage; they never add, remove or reorder positions.
//!
//! The search runs them in a fixed order, see [`default_generators`]:
//!
//! ```text
//! [DeviceGenerator] ──► [BatchGenerator] ──► [ConcurrencyGenerator]
//! ```

pub mod batch;
pub mod concurrency;
pub mod device;

pub use batch::BatchGenerator;
pub use concurrency::ConcurrencyGenerator;
pub use device::DeviceGenerator;

use crate::capabilities::SystemCapabilities;
use crate::config::AutotuneConfig;
use crate::types::{PipelineDescriptor, Stage, SuggestionSet};

/// Proposes alternative configurations for stage positions
pub trait SuggestionGenerator {
    /// Name used in logs and phase reports
    fn name(&self) -> &str;

    /// Alternatives for `pipeline`; every head equals the current stage
    fn propose(
        &self,
        pipeline: &PipelineDescriptor,
        capabilities: &SystemCapabilities,
    ) -> SuggestionSet;
}

/// The built-in generators in search order
pub fn default_generators(config: &AutotuneConfig) -> Vec<Box<dyn SuggestionGenerator>> {
    vec![
        Box::new(DeviceGenerator::new(config.stages.clone())),
        Box::new(BatchGenerator::new(
            config.stages.clone(),
            config.generators.batch_sizes.clone(),
        )),
        Box::new(ConcurrencyGenerator::new(
            config.stages.clone(),
            config.generators.concurrency_min..=config.generators.concurrency_max,
        )),
    ]
}

/// Build a set where every stage of `kinds` gets one alternative per value,
/// each a copy of the current stage with `key` set to that value.
pub(crate) fn propose_values<S, V>(
    pipeline: &PipelineDescriptor,
    kinds: &[S],
    key: &str,
    values: impl Iterator<Item = V> + Clone,
) -> SuggestionSet
where
    S: AsRef<str>,
    V: ToString,
{
    let mut suggestions = SuggestionSet::identity(pipeline);
    for position in pipeline.positions_of(kinds) {
        let Some(current) = pipeline.get(position) else {
            continue;
        };
        for value in values.clone() {
            let mut alternative: Stage = current.clone();
            alternative.set(key, value.to_string());
            suggestions.push(position, alternative);
        }
    }
    suggestions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_order() {
        let generators = default_generators(&AutotuneConfig::default());
        let names: Vec<&str> = generators.iter().map(|g| g.name()).collect();
        assert_eq!(names, vec!["device", "batch-size", "concurrency"]);
    }

    #[test]
    fn test_generators_preserve_topology() {
        let pipeline = PipelineDescriptor::parse(
            "src ! decodebin3 ! gvadetect model=d.xml ! gvaclassify model=c.xml ! sink",
        )
        .unwrap();
        let caps = SystemCapabilities::new(crate::capabilities::AcceleratorClass::defaults());

        for generator in default_generators(&AutotuneConfig::default()) {
            let set = generator.propose(&pipeline, &caps);
            assert_eq!(set.len(), pipeline.len());
            for position in 0..pipeline.len() {
                assert_eq!(set.current(position), pipeline.get(position));
                for alternative in set.alternatives(position) {
                    assert_eq!(alternative.stages().len(), 1);
                    assert_eq!(alternative.stages()[0].name(), pipeline.stages()[position].name());
                }
            }
            assert!(set.alternatives(0).is_empty());
            assert!(set.alternatives(4).is_empty());
        }
    }
}
