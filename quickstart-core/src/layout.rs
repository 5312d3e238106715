//! The on-disk layout of the emulator's data directory, and durable
//! persistence of the default configuration.
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

const CONFIG_DIR: &str = "config";
const DEFAULT_CONFIG_FILE: &str = "config.yml";
const FIRMWARE_DIR: &str = "firmware";
const FIRMWARE_MARKER: &str = ".installed";
const FONT_DIR: &str = "fonts";
const DRIVER_DIR: &str = "drivers";
const ISO_DIR_FILE: &str = "iso_dir";

#[derive(Debug, Error)]
#[error("failed to write {}: {source}", path.display())]
pub struct PersistenceError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_dir(&self) -> PathBuf {
        self.root.join(CONFIG_DIR)
    }

    /// The configuration the main application starts from. Its absence means
    /// onboarding has not been completed.
    pub fn default_config_file(&self) -> PathBuf {
        self.config_dir().join(DEFAULT_CONFIG_FILE)
    }

    pub fn firmware_dir(&self) -> PathBuf {
        self.root.join(FIRMWARE_DIR)
    }

    pub fn firmware_installed_file(&self) -> PathBuf {
        self.firmware_dir().join(FIRMWARE_MARKER)
    }

    pub fn font_dir(&self) -> PathBuf {
        self.root.join(FONT_DIR)
    }

    pub fn driver_dir(&self) -> PathBuf {
        self.root.join(DRIVER_DIR)
    }

    pub fn iso_dir_file(&self) -> PathBuf {
        self.root.join(ISO_DIR_FILE)
    }

    /// Creates every directory of the layout.
    pub fn mk_dirs(&self) -> io::Result<()> {
        for dir in [
            self.config_dir(),
            self.firmware_dir(),
            self.font_dir(),
            self.driver_dir(),
        ] {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    pub fn onboarding_required(&self, reentry: bool) -> bool {
        reentry || !self.default_config_file().exists()
    }

    pub fn firmware_installed(&self) -> bool {
        self.firmware_installed_file().exists()
    }

    pub fn load_iso_dir(&self) -> Option<PathBuf> {
        let text = fs::read_to_string(self.iso_dir_file()).ok()?;
        let text = text.trim();
        if text.is_empty() {
            None
        } else {
            Some(PathBuf::from(text))
        }
    }

    pub fn save_iso_dir(&self, dir: &Path) -> io::Result<()> {
        fs::create_dir_all(&self.root)?;
        fs::write(self.iso_dir_file(), dir.to_string_lossy().as_bytes())
    }

    pub fn read_default_config(&self) -> io::Result<String> {
        fs::read_to_string(self.default_config_file())
    }

    /// Writes the serialized configuration. On failure a partially written
    /// file is removed so the next start runs onboarding again.
    pub fn write_default_config(&self, text: &str) -> Result<(), PersistenceError> {
        let path = self.default_config_file();
        let result = (|| -> io::Result<()> {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut file = File::create(&path)?;
            file.write_all(text.as_bytes())?;
            file.sync_all()
        })();

        result.map_err(|source| {
            if path.exists() {
                if let Err(e) = fs::remove_file(&path) {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "failed to remove partial config"
                    );
                }
            }
            PersistenceError { path, source }
        })
    }
}
