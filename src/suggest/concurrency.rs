//! In-flight request count suggestions

use super::{propose_values, SuggestionGenerator};
use crate::capabilities::SystemCapabilities;
use crate::config::StageCatalog;
use crate::types::{PipelineDescriptor, SuggestionSet};
use std::ops::RangeInclusive;

/// Tries every in-flight request count in a small range on each inference stage
pub struct ConcurrencyGenerator {
    catalog: StageCatalog,
    depths: RangeInclusive<u32>,
}

impl ConcurrencyGenerator {
    pub fn new(catalog: StageCatalog, depths: RangeInclusive<u32>) -> Self {
        Self { catalog, depths }
    }
}

impl SuggestionGenerator for ConcurrencyGenerator {
    fn name(&self) -> &str {
        "concurrency"
    }

    fn propose(&self, pipeline: &PipelineDescriptor, _: &SystemCapabilities) -> SuggestionSet {
        propose_values(
            pipeline,
            &self.catalog.inference_kinds,
            &self.catalog.concurrency_key,
            self.depths.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_range() {
        let generator = ConcurrencyGenerator::new(StageCatalog::default(), 1..=8);
        let pipeline = PipelineDescriptor::parse(
            "src ! gvadetect model=d.xml ! gvaclassify model=c.xml ! sink",
        )
        .unwrap();
        let set = generator.propose(&pipeline, &SystemCapabilities::empty());

        assert_eq!(set.alternatives(1).len(), 8);
        assert_eq!(set.alternatives(2).len(), 8);
        assert_eq!(
            set.alternatives(2)[7].to_string(),
            "gvaclassify model=c.xml nireq=8"
        );
        assert_eq!(set.combination_count(), 81);
    }

    #[test]
    fn test_non_inference_stages_untouched() {
        let generator = ConcurrencyGenerator::new(StageCatalog::default(), 1..=2);
        let pipeline = PipelineDescriptor::parse("videotestsrc ! fakesink").unwrap();
        let set = generator.propose(&pipeline, &SystemCapabilities::empty());
        assert_eq!(set.combination_count(), 1);
    }
}
