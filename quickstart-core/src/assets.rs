//! Filesystem installers for custom fonts and GPU drivers, and listings of
//! what is already installed.
use crate::install::{AssetInstaller, DriverPackage, is_font_file};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// The manifest name a driver archive may describe its library in.
pub const DRIVER_MANIFEST: &str = "meta.json";

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("{} is not a supported {kind} file", path.display())]
    Unsupported { path: PathBuf, kind: &'static str },
    #[error("archive entry {0:?} escapes the install directory")]
    UnsafeEntry(String),
    #[error("driver archive contains no library")]
    MissingLibrary,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriverManifest {
    library_name: String,
}

#[derive(Debug, Clone)]
pub struct FsAssetInstaller {
    font_dir: PathBuf,
    driver_dir: PathBuf,
}

impl FsAssetInstaller {
    pub fn new(font_dir: impl Into<PathBuf>, driver_dir: impl Into<PathBuf>) -> Self {
        Self {
            font_dir: font_dir.into(),
            driver_dir: driver_dir.into(),
        }
    }
}

impl AssetInstaller for FsAssetInstaller {
    fn install_custom_font(&self, source: &Path) -> Result<PathBuf> {
        if !is_font_file(source) {
            return Err(InstallError::Unsupported {
                path: source.to_path_buf(),
                kind: "font",
            }
            .into());
        }
        copy_into(source, &self.font_dir)
    }

    fn install_custom_driver_from_zip(&self, source: &Path) -> Result<PathBuf> {
        if DriverPackage::detect(source) != Some(DriverPackage::Zip) {
            return Err(InstallError::Unsupported {
                path: source.to_path_buf(),
                kind: "driver archive",
            }
            .into());
        }
        let stem = source
            .file_stem()
            .context("driver archive has no file name")?;
        let dest = self.driver_dir.join(stem);
        if dest.exists() {
            fs::remove_dir_all(&dest)
                .with_context(|| format!("failed to replace {}", dest.display()))?;
        }

        match unpack_driver(source, &dest) {
            Ok(library) => {
                let library = fs::canonicalize(&library)?;
                tracing::info!(path = %library.display(), "driver unpacked");
                Ok(library)
            }
            Err(e) => {
                if let Err(cleanup) = fs::remove_dir_all(&dest) {
                    if cleanup.kind() != io::ErrorKind::NotFound {
                        tracing::warn!(
                            path = %dest.display(),
                            error = %cleanup,
                            "failed to clean up driver directory"
                        );
                    }
                }
                Err(e)
            }
        }
    }

    fn install_custom_driver_from_lib(&self, source: &Path) -> Result<PathBuf> {
        if DriverPackage::detect(source) != Some(DriverPackage::Library) {
            return Err(InstallError::Unsupported {
                path: source.to_path_buf(),
                kind: "driver library",
            }
            .into());
        }
        copy_into(source, &self.driver_dir)
    }
}

/// Copies `source` into `dir`, keeping its file name, and returns the
/// absolute path of the copy.
fn copy_into(source: &Path, dir: &Path) -> Result<PathBuf> {
    let name = source
        .file_name()
        .with_context(|| format!("{} has no file name", source.display()))?;
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let target = dir.join(name);
    fs::copy(source, &target)
        .with_context(|| format!("failed to copy {} to {}", source.display(), target.display()))?;
    let target = fs::canonicalize(&target)?;
    tracing::info!(path = %target.display(), "asset installed");
    Ok(target)
}

fn unpack_driver(source: &Path, dest: &Path) -> Result<PathBuf> {
    let file = File::open(source).with_context(|| format!("failed to open {}", source.display()))?;
    let mut archive = zip::ZipArchive::new(file).context("failed to read driver archive")?;
    fs::create_dir_all(dest)?;

    let mut files = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let relative = entry
            .enclosed_name()
            .ok_or_else(|| InstallError::UnsafeEntry(entry.name().to_string()))?;
        let out = dest.join(&relative);
        if entry.is_dir() {
            fs::create_dir_all(&out)?;
            continue;
        }
        if let Some(parent) = out.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut writer = File::create(&out)?;
        io::copy(&mut entry, &mut writer)
            .with_context(|| format!("failed to unpack {}", relative.display()))?;
        files.push(relative);
    }

    if let [only] = files.as_slice() {
        return Ok(dest.join(only));
    }
    let manifest = dest.join(DRIVER_MANIFEST);
    if manifest.is_file() {
        let library = read_manifest(&manifest)?;
        let path = dest.join(library);
        if path.is_file() {
            return Ok(path);
        }
    }
    Err(InstallError::MissingLibrary.into())
}

fn read_manifest(path: &Path) -> Result<String> {
    let text = fs::read_to_string(path)?;
    let manifest: DriverManifest = serde_json::from_str(&text)
        .with_context(|| format!("invalid driver manifest {}", path.display()))?;
    Ok(manifest.library_name)
}

/// File names of the fonts in `dir`, sorted.
pub fn list_installed_fonts(dir: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut fonts: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file() && is_font_file(&e.path()))
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    fonts.sort();
    fonts
}

/// Installed drivers relative to `dir`, sorted. A directory counts when it
/// holds exactly one file or names its library in a manifest.
pub fn list_installed_drivers(dir: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut drivers = Vec::new();
    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        if path.is_file() {
            drivers.push(name);
            continue;
        }
        if !path.is_dir() {
            continue;
        }
        let files: Vec<_> = match fs::read_dir(&path) {
            Ok(inner) => inner.filter_map(|e| e.ok()).collect(),
            Err(_) => continue,
        };
        if let [only] = files.as_slice() {
            drivers.push(format!("{name}/{}", only.file_name().to_string_lossy()));
            continue;
        }
        let manifest = path.join(DRIVER_MANIFEST);
        if manifest.is_file() {
            match read_manifest(&manifest) {
                Ok(library) => drivers.push(format!("{name}/{library}")),
                Err(e) => {
                    tracing::debug!(path = %manifest.display(), error = %e, "skipping driver")
                }
            }
        }
    }
    drivers.sort();
    drivers
}
