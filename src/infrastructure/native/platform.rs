//! Platform/architecture resolution for module naming

use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};

use crate::application::errors::HostError;

static CURRENT: OnceCell<Platform> = OnceCell::new();

/// Extension every legacy module carries, whatever the host OS
pub const MODULE_EXTENSION: &str = "dll";

/// OS family and architecture names as used in module and directory names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    pub os: &'static str,
    pub arch: &'static str,
    pub bits: u32,
}

impl Platform {
    /// The platform of this process, resolved once and cached
    pub fn current() -> Result<&'static Platform, HostError> {
        CURRENT.get_or_try_init(|| {
            let platform = Self::resolve(std::env::consts::OS, std::env::consts::ARCH, usize::BITS)?;
            tracing::info!("Platform: {}/{} ({}-bit)", platform.os, platform.arch, platform.bits);
            Ok(platform)
        })
    }

    pub fn resolve(os: &str, arch: &str, bits: u32) -> Result<Platform, HostError> {
        let unsupported = || HostError::UnsupportedPlatform {
            os: os.to_string(),
            arch: format!("{} ({}-bit)", arch, bits),
        };

        let os = match os {
            "windows" => "windows",
            "linux" => "linux",
            "android" => "android",
            "macos" => "macos",
            "freebsd" => "freebsd",
            _ => return Err(unsupported()),
        };

        let arch = match (arch, bits) {
            ("x86_64", 64) => "amd64",
            ("x86", 32) => "i386",
            ("aarch64", 64) => "aarch64",
            ("arm", 32) => "arm",
            _ => return Err(unsupported()),
        };

        Ok(Platform { os, arch, bits })
    }

    /// File name of the primary bridge module, e.g. `CQP.linux.amd64.dll`
    pub fn bridge_file_name(&self) -> String {
        format!("CQP.{}.{}.{}", self.os, self.arch, MODULE_EXTENSION)
    }

    /// Per-platform plugin directory under `base`
    pub fn plugin_dir(&self, base: &Path) -> PathBuf {
        base.join(self.os).join(self.arch)
    }
}
