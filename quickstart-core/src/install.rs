//! Installer collaborators for the assets onboarding sets up.
//!
//! Installers run inside background tasks, so they are `Send + Sync` and
//! report through return values only. The paths they hand back are written to
//! the config store by the task's completion callback.
use anyhow::Result;
use std::fs::File;
use std::path::{Path, PathBuf};

pub trait FirmwareInstaller: Send + Sync {
    /// Installs the firmware read from `source`. The installer consumes the
    /// handle for the duration of the call.
    fn install_firmware(&self, source: File) -> bool;
}

pub trait AssetInstaller: Send + Sync {
    fn install_custom_font(&self, source: &Path) -> Result<PathBuf>;
    fn install_custom_driver_from_zip(&self, source: &Path) -> Result<PathBuf>;
    fn install_custom_driver_from_lib(&self, source: &Path) -> Result<PathBuf>;
}

/// The kinds of driver package a user can pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverPackage {
    Zip,
    Library,
}

impl DriverPackage {
    pub fn detect(path: &Path) -> Option<Self> {
        match extension(path).as_str() {
            "zip" => Some(DriverPackage::Zip),
            "so" => Some(DriverPackage::Library),
            _ => None,
        }
    }
}

pub fn is_font_file(path: &Path) -> bool {
    matches!(extension(path).as_str(), "ttf" | "ttc" | "otf")
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}
