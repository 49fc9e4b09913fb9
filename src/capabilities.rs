//! Host accelerator discovery
//!
//! A class is reported present only when both of its signals agree: its
//! device directory contains a matching device node, and its driver package
//! is installed. Any probe error counts as "not present"; scanning never fails.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// A category of hardware accelerator the host may expose
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceleratorClass {
    /// Device value written into inference stages (e.g. `GPU`)
    pub name: String,
    /// Directory holding the class's device special files
    pub device_dir: PathBuf,
    /// Prefix a device node must start with to count
    pub node_prefix: String,
    /// Driver package that must be installed
    pub package: String,
    /// Pre-processing backend compatible with this class
    pub preprocess_backend: String,
}

impl AcceleratorClass {
    pub fn new(name: impl Into<String>, preprocess_backend: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            device_dir: PathBuf::from("/dev").join(name.to_lowercase()),
            node_prefix: name.to_lowercase(),
            package: String::new(),
            preprocess_backend: preprocess_backend.into(),
            name,
        }
    }

    /// GPU and NPU classes as found on Intel hosts
    pub fn defaults() -> Vec<Self> {
        vec![
            Self {
                name: "GPU".to_string(),
                device_dir: PathBuf::from("/dev/dri"),
                node_prefix: "render".to_string(),
                package: "intel-opencl-icd".to_string(),
                preprocess_backend: "va-surface-sharing".to_string(),
            },
            Self {
                name: "NPU".to_string(),
                device_dir: PathBuf::from("/dev/accel"),
                node_prefix: "accel".to_string(),
                package: "intel-driver-compiler-npu".to_string(),
                preprocess_backend: "va".to_string(),
            },
        ]
    }
}

/// OS queries used to detect accelerator classes
#[cfg_attr(test, mockall::automock)]
pub trait SystemProbe {
    /// File names inside a directory
    fn list_dir(&self, dir: &Path) -> std::io::Result<Vec<String>>;

    /// Whether a driver package is installed
    fn package_installed(&self, package: &str) -> std::io::Result<bool>;
}

/// Probes the real host through the filesystem and `dpkg`
#[derive(Debug, Default, Clone, Copy)]
pub struct HostProbe;

impl SystemProbe for HostProbe {
    fn list_dir(&self, dir: &Path) -> std::io::Result<Vec<String>> {
        std::fs::read_dir(dir)?
            .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
            .collect()
    }

    fn package_installed(&self, package: &str) -> std::io::Result<bool> {
        let status = Command::new("dpkg")
            .args(["-l", package])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()?;
        Ok(status.success())
    }
}

/// Accelerator classes detected on this host, in configuration order
///
/// Computed once per run and never mutated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemCapabilities {
    classes: Vec<AcceleratorClass>,
}

impl SystemCapabilities {
    pub fn new(classes: Vec<AcceleratorClass>) -> Self {
        Self { classes }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.iter().any(|c| c.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AcceleratorClass> {
        self.classes.iter()
    }

    pub fn names(&self) -> Vec<String> {
        self.classes.iter().map(|c| c.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

/// Detects which configured accelerator classes are usable
pub struct CapabilityScanner<P: SystemProbe = HostProbe> {
    probe: P,
    classes: Vec<AcceleratorClass>,
}

impl CapabilityScanner<HostProbe> {
    pub fn host(classes: Vec<AcceleratorClass>) -> Self {
        Self::new(HostProbe, classes)
    }
}

impl<P: SystemProbe> CapabilityScanner<P> {
    pub fn new(probe: P, classes: Vec<AcceleratorClass>) -> Self {
        Self { probe, classes }
    }

    /// Probe every known class. Never fails; an unrecognized host yields an empty set.
    pub fn scan(&self) -> SystemCapabilities {
        let detected = self
            .classes
            .iter()
            .filter(|class| {
                let present = self.is_present(class);
                if present {
                    tracing::info!("Detected {} device", class.name);
                } else {
                    tracing::info!("No {} device detected", class.name);
                }
                present
            })
            .cloned()
            .collect();
        SystemCapabilities::new(detected)
    }

    fn is_present(&self, class: &AcceleratorClass) -> bool {
        let has_node = match self.probe.list_dir(&class.device_dir) {
            Ok(entries) => entries.iter().any(|e| e.starts_with(&class.node_prefix)),
            Err(e) => {
                tracing::debug!(
                    class = %class.name,
                    dir = ?class.device_dir,
                    error = %e,
                    "Device directory probe failed"
                );
                false
            }
        };
        if !has_node {
            return false;
        }

        match self.probe.package_installed(&class.package) {
            Ok(installed) => installed,
            Err(e) => {
                tracing::debug!(
                    class = %class.name,
                    package = %class.package,
                    error = %e,
                    "Package probe failed"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn not_found() -> io::Error {
        io::Error::new(io::ErrorKind::NotFound, "missing")
    }

    #[test]
    fn test_both_signals_required() {
        let mut probe = MockSystemProbe::new();
        probe.expect_list_dir().returning(|dir| {
            if dir == Path::new("/dev/dri") {
                Ok(vec!["card0".to_string(), "renderD128".to_string()])
            } else {
                Ok(vec!["accel0".to_string()])
            }
        });
        probe
            .expect_package_installed()
            .returning(|package| Ok(package == "intel-opencl-icd"));

        let scanner = CapabilityScanner::new(probe, AcceleratorClass::defaults());
        let caps = scanner.scan();

        assert!(caps.contains("GPU"));
        assert!(!caps.contains("NPU"));
        assert_eq!(caps.names(), vec!["GPU".to_string()]);
    }

    #[test]
    fn test_device_nodes_must_match_prefix() {
        let mut probe = MockSystemProbe::new();
        probe
            .expect_list_dir()
            .returning(|_| Ok(vec!["card0".to_string()]));
        probe.expect_package_installed().returning(|_| Ok(true));

        let caps = CapabilityScanner::new(probe, AcceleratorClass::defaults()).scan();
        assert!(caps.is_empty());
    }

    #[test]
    fn test_probe_errors_degrade_to_absent() {
        let mut probe = MockSystemProbe::new();
        probe.expect_list_dir().returning(|_| Err(not_found()));
        probe.expect_package_installed().never();

        let caps = CapabilityScanner::new(probe, AcceleratorClass::defaults()).scan();
        assert!(caps.is_empty());

        let mut probe = MockSystemProbe::new();
        probe
            .expect_list_dir()
            .returning(|_| Ok(vec!["renderD128".to_string(), "accel0".to_string()]));
        probe
            .expect_package_installed()
            .returning(|_| Err(not_found()));

        let caps = CapabilityScanner::new(probe, AcceleratorClass::defaults()).scan();
        assert!(caps.is_empty());
    }

    #[test]
    fn test_order_follows_configuration() {
        let mut probe = MockSystemProbe::new();
        probe
            .expect_list_dir()
            .returning(|_| Ok(vec!["renderD128".to_string(), "accel0".to_string()]));
        probe.expect_package_installed().returning(|_| Ok(true));

        let caps = CapabilityScanner::new(probe, AcceleratorClass::defaults()).scan();
        assert_eq!(caps.names(), vec!["GPU".to_string(), "NPU".to_string()]);
    }

    #[test]
    fn test_host_probe_missing_directory() {
        let probe = HostProbe;
        assert!(probe
            .list_dir(Path::new("/definitely/not/a/device/dir"))
            .is_err());
    }
}
