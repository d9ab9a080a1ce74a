//! Platform detection and release artifact key selection.
//!
//! HashiCorp publishes Terraform artifacts per `<os>_<arch>` key; the four
//! keys this tool supports are `linux_amd64`, `linux_arm64`, `darwin_amd64`
//! and `darwin_arm64`. Any other platform has no artifact.

/// Platform information for artifact selection
#[derive(Debug, Clone, PartialEq)]
pub struct Platform {
    pub os: String,
    pub arch: String,
}

impl Platform {
    /// Detect the current platform
    pub fn detect() -> Self {
        Self {
            os: Self::detect_os(),
            arch: Self::detect_arch(),
        }
    }

    fn detect_os() -> String {
        #[cfg(target_os = "macos")]
        {
            "macos".to_string()
        }
        #[cfg(target_os = "linux")]
        {
            "linux".to_string()
        }
        #[cfg(not(any(target_os = "macos", target_os = "linux")))]
        {
            std::env::consts::OS.to_string()
        }
    }

    fn detect_arch() -> String {
        #[cfg(target_arch = "x86_64")]
        {
            "x86_64".to_string()
        }
        #[cfg(target_arch = "aarch64")]
        {
            "aarch64".to_string()
        }
        #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
        {
            std::env::consts::ARCH.to_string()
        }
    }

    /// The `<os>_<arch>` key naming the release artifact for this platform,
    /// or `None` if HashiCorp publishes no Terraform artifact for it.
    pub fn release_key(&self) -> Option<String> {
        let os = match self.os.as_str() {
            "linux" => "linux",
            "macos" => "darwin",
            _ => return None,
        };
        let arch = match self.arch.as_str() {
            "x86_64" => "amd64",
            "aarch64" => "arm64",
            _ => return None,
        };
        Some(format!("{}_{}", os, arch))
    }
}
