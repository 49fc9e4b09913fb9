//! Test data builders for creating test objects

use pipetune::{PipelineDescriptor, Stage};

/// Builder for pipelines of the form `source ! <stages> ! sink`
pub struct PipelineBuilder {
    stages: Vec<Stage>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self {
            stages: vec![Stage::new("filesrc").with_property("location", "input.mp4")],
        }
    }

    pub fn stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    /// Append an inference stage of `kind` with an optional device
    pub fn inference(self, kind: &str, device: Option<&str>) -> Self {
        let mut stage = Stage::new(kind).with_property("model", "model.xml");
        if let Some(device) = device {
            stage.set("device", device);
        }
        self.stage(stage)
    }

    pub fn build(mut self) -> PipelineDescriptor {
        self.stages.push(Stage::new("fakesink"));
        PipelineDescriptor::from_stages(self.stages)
    }

    pub fn text(self) -> String {
        self.build().to_string()
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_builder() {
        let pipeline = PipelineBuilder::new()
            .stage(Stage::new("decodebin3"))
            .inference("gvadetect", Some("CPU"))
            .build();

        assert_eq!(pipeline.len(), 4);
        assert_eq!(pipeline.get(2).unwrap().get("device"), Some("CPU"));
        assert_eq!(
            pipeline.to_string(),
            "filesrc location=input.mp4 ! decodebin3 \
             ! gvadetect model=model.xml device=CPU ! fakesink"
        );
    }
}
