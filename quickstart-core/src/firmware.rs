//! Contains the logic for staging a firmware image into the data directory.
//!
//! This module handles the multi-stage process of installing, which includes:
//! 1.  Decompressing the image on-the-fly if it is compressed (gzip, xz, zstd),
//!     detected from the stream's magic bytes since only a handle is given.
//! 2.  Copying the (decompressed) image into a temporary file next to the
//!     final location.
//! 3.  Verifying the staged copy against the source stream, then renaming it
//!     into place so a failed install never leaves a truncated image.
use crate::install::FirmwareInstaller;
use anyhow::{Context, Result, anyhow};
use flate2::bufread::GzDecoder;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use xz2::bufread::XzDecoder;
use zstd::stream::read::Decoder as ZstdDecoder;

const BUFFER_SIZE: usize = 1024 * 1024; // 1 MiB

/// The file name the runtime loads firmware from.
pub const FIRMWARE_FILE_NAME: &str = "PS3UPDAT.PUP";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Compression {
    None,
    Gzip,
    Xz,
    Zstd,
}

impl Compression {
    fn sniff(header: &[u8]) -> Self {
        if header.starts_with(&[0x1f, 0x8b]) {
            Compression::Gzip
        } else if header.starts_with(&[0xfd, b'7', b'z', b'X', b'Z', 0x00]) {
            Compression::Xz
        } else if header.starts_with(&[0x28, 0xb5, 0x2f, 0xfd]) {
            Compression::Zstd
        } else {
            Compression::None
        }
    }
}

/// Installs firmware by copying it into a directory.
#[derive(Debug, Clone)]
pub struct FsFirmwareInstaller {
    dir: PathBuf,
}

impl FsFirmwareInstaller {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn target(&self) -> PathBuf {
        self.dir.join(FIRMWARE_FILE_NAME)
    }

    /// Stages `source` and returns the installed path.
    ///
    /// # Errors
    ///
    /// This function will return an error if:
    /// - The source cannot be read or decompressed.
    /// - The image is empty.
    /// - The staged copy does not match the source.
    /// - The staged copy cannot be moved into place.
    pub fn install(&self, source: File) -> Result<PathBuf> {
        let mut reader = BufReader::with_capacity(BUFFER_SIZE, source);
        let compression = Compression::sniff(reader.fill_buf().context("failed to read firmware")?);
        tracing::debug!(?compression, "detected firmware encoding");

        let mut reader: Box<dyn Read> = match compression {
            Compression::Gzip => Box::new(GzDecoder::new(reader)),
            Compression::Xz => Box::new(XzDecoder::new(reader)),
            Compression::Zstd => Box::new(ZstdDecoder::with_buffer(reader)?),
            Compression::None => Box::new(reader),
        };

        fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create {}", self.dir.display()))?;
        let mut staged = NamedTempFile::new_in(&self.dir)?;
        let mut source_hasher = Sha256::new();
        let mut total: u64 = 0;
        {
            let mut writer = BufWriter::with_capacity(BUFFER_SIZE, staged.as_file_mut());
            let mut buffer = vec![0u8; BUFFER_SIZE];
            loop {
                let n = reader.read(&mut buffer).context("failed to read firmware")?;
                if n == 0 {
                    break;
                }
                writer.write_all(&buffer[..n])?;
                source_hasher.update(&buffer[..n]);
                total += n as u64;
            }
            writer.flush()?;
        }
        if total == 0 {
            return Err(anyhow!("firmware image is empty"));
        }
        staged.as_file().sync_all()?;

        let staged_hash = hash_file(staged.path())?;
        if staged_hash != source_hasher.finalize().as_slice() {
            return Err(anyhow!("Verification failed: hash mismatch."));
        }

        let target = self.target();
        staged
            .persist(&target)
            .map_err(|e| e.error)
            .with_context(|| format!("failed to move firmware to {}", target.display()))?;
        tracing::info!(path = %target.display(), bytes = total, "firmware installed");
        Ok(target)
    }
}

impl FirmwareInstaller for FsFirmwareInstaller {
    fn install_firmware(&self, source: File) -> bool {
        match self.install(source) {
            Ok(_) => true,
            Err(e) => {
                tracing::error!(error = %format!("{e:#}"), "firmware installation failed");
                false
            }
        }
    }
}

fn hash_file(path: &Path) -> Result<Vec<u8>> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];
    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(hasher.finalize().to_vec())
}
