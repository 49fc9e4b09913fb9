//! Fake host probes and engine construction helpers

use pipetune::capabilities::{AcceleratorClass, CapabilityScanner, SystemProbe};
use pipetune::{ScriptedBehavior, ScriptedEngine};
use std::io;
use std::path::{Path, PathBuf};

/// Host where the listed classes have both a device node and a driver package
pub struct FakeHost {
    present: Vec<AcceleratorClass>,
}

impl SystemProbe for FakeHost {
    fn list_dir(&self, dir: &Path) -> io::Result<Vec<String>> {
        let nodes: Vec<String> = self
            .present
            .iter()
            .filter(|c| c.device_dir == dir)
            .map(|c| format!("{}0", c.node_prefix))
            .collect();
        if nodes.is_empty() {
            Err(io::Error::new(io::ErrorKind::NotFound, "no such directory"))
        } else {
            Ok(nodes)
        }
    }

    fn package_installed(&self, package: &str) -> io::Result<bool> {
        Ok(self.present.iter().any(|c| c.package == package))
    }
}

/// Accelerator class named `name` with its own device directory and package
pub fn accelerator(name: &str, backend: &str) -> AcceleratorClass {
    let lower = name.to_lowercase();
    AcceleratorClass {
        name: name.to_string(),
        device_dir: PathBuf::from("/fake/dev").join(&lower),
        node_prefix: lower.clone(),
        package: format!("{}-driver", lower),
        preprocess_backend: backend.to_string(),
    }
}

/// Scanner over `known` classes where only those named in `present` are detected
pub fn scanner_with(known: &[AcceleratorClass], present: &[&str]) -> CapabilityScanner<FakeHost> {
    let present = known
        .iter()
        .filter(|c| present.contains(&c.name.as_str()))
        .cloned()
        .collect();
    CapabilityScanner::new(FakeHost { present }, known.to_vec())
}

/// Scanner that detects nothing
pub fn bare_host() -> CapabilityScanner<FakeHost> {
    scanner_with(&[], &[])
}

/// Engine running everything at `fps` unless a rule says otherwise
pub fn engine_at(fps: f64, rules: &[(&str, ScriptedBehavior)]) -> ScriptedEngine {
    rules
        .iter()
        .cloned()
        .fold(ScriptedEngine::new(fps), |engine, (pattern, behavior)| {
            engine.with_rule(pattern, behavior)
        })
}
