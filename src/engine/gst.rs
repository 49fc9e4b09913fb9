//! GStreamer-backed pipeline engine
//!
//! Only compiled with the `gstreamer` feature. The library is initialized by
//! [`GstEngine::new`]; callers own the engine value and pass it down, there
//! is no global handle.

use super::{
    EngineError, EngineInstance, EngineMessage, EngineState, PipelineEngine, StateSnapshot,
};
use gstreamer as gst;
use gstreamer::prelude::*;
use std::time::Duration;

/// Engine that launches descriptions with `gst::parse::launch`
pub struct GstEngine {
    _private: (),
}

impl GstEngine {
    pub fn new() -> Result<Self, EngineError> {
        gst::init().map_err(|e| EngineError::Unavailable(e.to_string()))?;
        let (major, minor, micro, _) = gst::version();
        tracing::info!("GStreamer version: {}.{}.{}", major, minor, micro);
        Ok(Self { _private: () })
    }
}

impl PipelineEngine for GstEngine {
    type Instance = GstInstance;

    fn launch(&self, description: &str) -> Result<GstInstance, EngineError> {
        let element =
            gst::parse::launch(description).map_err(|e| EngineError::Launch(e.to_string()))?;
        let bus = element
            .bus()
            .ok_or_else(|| EngineError::Launch("pipeline has no bus".to_string()))?;
        Ok(GstInstance { element, bus })
    }
}

/// A launched GStreamer pipeline
pub struct GstInstance {
    element: gst::Element,
    bus: gst::Bus,
}

impl GstInstance {
    fn stage_by_name(&self, name: &str) -> Option<gst::Element> {
        match self.element.downcast_ref::<gst::Bin>() {
            Some(bin) => bin.by_name(name),
            None => (self.element.name() == name).then(|| self.element.clone()),
        }
    }
}

fn to_gst(state: EngineState) -> gst::State {
    match state {
        EngineState::Null => gst::State::Null,
        EngineState::Ready => gst::State::Ready,
        EngineState::Paused => gst::State::Paused,
        EngineState::Playing => gst::State::Playing,
    }
}

fn from_gst(state: gst::State) -> EngineState {
    match state {
        gst::State::Ready => EngineState::Ready,
        gst::State::Paused => EngineState::Paused,
        gst::State::Playing => EngineState::Playing,
        _ => EngineState::Null,
    }
}

fn is_kind(element: &gst::Element, kind: &str) -> bool {
    element
        .factory()
        .map(|factory| factory.name() == kind)
        .unwrap_or(false)
        || element.name().contains(kind)
}

impl EngineInstance for GstInstance {
    fn set_state(&mut self, state: EngineState) -> Result<(), EngineError> {
        self.element
            .set_state(to_gst(state))
            .map(|_| ())
            .map_err(|e| EngineError::StateChange(e.to_string()))
    }

    fn current_state(&mut self, timeout: Duration) -> Result<StateSnapshot, EngineError> {
        // u64::MAX is GST_CLOCK_TIME_NONE, which means "wait forever"
        let nanos = u64::try_from(timeout.as_nanos())
            .unwrap_or(u64::MAX)
            .min(u64::MAX - 1);
        let (result, current, pending) = self.element.state(gst::ClockTime::from_nseconds(nanos));
        let success = result.map_err(|e| EngineError::StateChange(e.to_string()))?;

        if success == gst::StateChangeSuccess::Async || pending != gst::State::VoidPending {
            Ok(StateSnapshot::transitioning(from_gst(current), from_gst(pending)))
        } else {
            Ok(StateSnapshot::settled(from_gst(current)))
        }
    }

    fn pop_message(&mut self) -> Option<EngineMessage> {
        let message = self.bus.pop()?;
        let source = message
            .src()
            .map(|s| s.name().to_string())
            .unwrap_or_default();

        Some(match message.view() {
            gst::MessageView::Error(err) => EngineMessage::Error {
                source,
                message: err.error().to_string(),
            },
            gst::MessageView::Warning(warning) => EngineMessage::Warning {
                source,
                message: warning.error().to_string(),
            },
            gst::MessageView::StateChanged(change) => EngineMessage::StateChanged {
                from: from_gst(change.old()),
                to: from_gst(change.current()),
            },
            gst::MessageView::Eos(_) => EngineMessage::EndOfStream,
            _ => EngineMessage::Other(format!("{:?} from {}", message.type_(), source)),
        })
    }

    fn find_stage(&self, kind: &str) -> Option<String> {
        // Bin children are ordered newest first, i.e. last stage first
        match self.element.downcast_ref::<gst::Bin>() {
            Some(bin) => bin
                .children()
                .into_iter()
                .find(|child| is_kind(child, kind))
                .map(|child| child.name().to_string()),
            None => is_kind(&self.element, kind).then(|| self.element.name().to_string()),
        }
    }

    fn property_f64(&self, stage: &str, property: &str) -> Result<f64, EngineError> {
        let element = self
            .stage_by_name(stage)
            .ok_or_else(|| EngineError::Property(format!("no stage named `{}`", stage)))?;
        if element.find_property(property).is_none() {
            return Err(EngineError::Property(format!(
                "stage `{}` has no property `{}`",
                stage, property
            )));
        }

        let value = element.property_value(property);
        value
            .get::<f32>()
            .map(f64::from)
            .or_else(|_| value.get::<f64>())
            .map_err(|e| EngineError::Property(e.to_string()))
    }
}

impl Drop for GstInstance {
    fn drop(&mut self) {
        let _ = self.element.set_state(gst::State::Null);
    }
}
