//! The flat output directory: audio naming, listing, deletion and upload staging.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::InputItem;

/// Base name of the cross-item synthesis audio.
pub const SYNTHESIS_NAME: &str = "final_synthesis";
/// URL-derived names are cut to this many characters.
pub const MAX_URL_NAME_CHARS: usize = 30;
/// Extensions recognised as audio by listing and bulk deletion.
pub const AUDIO_EXTENSIONS: [&str; 3] = ["mp3", "wav", "m4a"];

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("file not found: {0}")]
    NotFound(String),
    #[error("invalid file name: {0}")]
    InvalidName(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// How audio base names are derived from locators.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioNaming {
    /// Names derived from the locator alone; equal names overwrite.
    #[default]
    Locator,
    /// Locator-derived name plus 8 hex chars of the locator's SHA-256.
    Hashed,
}

impl std::str::FromStr for AudioNaming {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "locator" => Ok(Self::Locator),
            "hashed" => Ok(Self::Hashed),
            other => Err(format!("unknown naming scheme '{other}' (expected locator or hashed)")),
        }
    }
}

/// One audio file in the output directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioFile {
    pub filename: String,
    pub size: u64,
    pub size_mb: f64,
}

pub fn pdf_audio_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().replace(".pdf", ""))
        .unwrap_or_default()
}

pub fn doi_audio_name(doi: &str) -> String {
    doi.replace('/', "_")
}

pub fn url_audio_name(url: &str) -> String {
    url.replace("https://", "")
        .replace("http://", "")
        .replace('/', "_")
        .chars()
        .take(MAX_URL_NAME_CHARS)
        .collect()
}

fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    hex::encode(&digest[..4])
}

fn round_mb(bytes: u64) -> f64 {
    let mb = bytes as f64 / (1024.0 * 1024.0);
    (mb * 100.0).round() / 100.0
}

fn is_audio(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| AUDIO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// A PDF upload staged inside the output directory for the length of a run.
#[derive(Debug)]
pub struct StagedUpload {
    dir: tempfile::TempDir,
    path: PathBuf,
}

impl StagedUpload {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the staged copy. Failures are logged, never returned.
    pub fn discard(self) {
        let shown = self.path.display().to_string();
        if let Err(e) = self.dir.close() {
            tracing::warn!(path = %shown, error = %e, "failed to delete staged upload");
        }
    }
}

/// Handle on the flat directory every audio file is written to.
#[derive(Debug, Clone)]
pub struct OutputDir {
    root: PathBuf,
    naming: AudioNaming,
}

impl OutputDir {
    pub fn new(root: impl Into<PathBuf>, naming: AudioNaming) -> Self {
        Self {
            root: root.into(),
            naming,
        }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn naming(&self) -> AudioNaming {
        self.naming
    }

    pub fn exists(&self) -> bool {
        self.root.is_dir()
    }

    /// Create the directory (and parents) if missing.
    pub fn ensure(&self) -> Result<(), OutputError> {
        fs::create_dir_all(&self.root)?;
        Ok(())
    }

    /// Audio base name (without extension) for one input item.
    pub fn audio_name(&self, item: &InputItem) -> String {
        let base = match item {
            InputItem::Pdf(path) => pdf_audio_name(path),
            InputItem::Doi(doi) => doi_audio_name(doi),
            InputItem::Url(url) => url_audio_name(url),
        };
        match self.naming {
            AudioNaming::Locator => base,
            AudioNaming::Hashed => format!("{}-{}", base, short_hash(&item.locator())),
        }
    }

    /// Audio base name for the synthesis of the given item locators.
    pub fn synthesis_name(&self, locators: &[String]) -> String {
        match self.naming {
            AudioNaming::Locator => SYNTHESIS_NAME.to_string(),
            AudioNaming::Hashed => {
                format!("{}-{}", SYNTHESIS_NAME, short_hash(&locators.join("\n")))
            }
        }
    }

    pub fn mp3_path(&self, basename: &str) -> PathBuf {
        self.root.join(format!("{basename}.mp3"))
    }

    /// Write `<basename>.mp3` through a temp file renamed into place, so
    /// readers never see a partially written file.
    pub fn write_audio(&self, basename: &str, bytes: &[u8]) -> Result<PathBuf, OutputError> {
        self.ensure()?;
        let path = self.mp3_path(basename);
        let mut tmp = tempfile::Builder::new()
            .prefix(".audio-")
            .suffix(".part")
            .tempfile_in(&self.root)?;
        io::Write::write_all(&mut tmp, bytes)?;
        tmp.persist(&path).map_err(|e| e.error)?;
        Ok(path)
    }

    /// Recognised audio files, sorted by name. A missing directory lists as empty.
    pub fn list_audio(&self) -> Result<Vec<AudioFile>, OutputError> {
        if !self.exists() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() || !is_audio(&path) {
                continue;
            }
            let size = entry.metadata()?.len();
            files.push(AudioFile {
                filename: entry.file_name().to_string_lossy().into_owned(),
                size,
                size_mb: round_mb(size),
            });
        }
        files.sort_by(|a, b| a.filename.cmp(&b.filename));
        Ok(files)
    }

    fn checked_path(&self, name: &str) -> Result<PathBuf, OutputError> {
        if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
            return Err(OutputError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(name))
    }

    /// Path of an existing file in the directory.
    pub fn audio_file(&self, name: &str) -> Result<PathBuf, OutputError> {
        let path = self.checked_path(name)?;
        if path.is_file() {
            Ok(path)
        } else {
            Err(OutputError::NotFound(name.to_string()))
        }
    }

    pub fn delete(&self, name: &str) -> Result<(), OutputError> {
        let path = self.audio_file(name)?;
        fs::remove_file(path)?;
        tracing::info!(file = name, "deleted output file");
        Ok(())
    }

    /// Delete every recognised audio file; returns how many were removed.
    pub fn delete_all_audio(&self) -> Result<usize, OutputError> {
        let files = self.list_audio()?;
        for file in &files {
            fs::remove_file(self.root.join(&file.filename))?;
        }
        tracing::info!(count = files.len(), "deleted all audio files");
        Ok(files.len())
    }

    /// Stage an uploaded PDF in a private temporary subdirectory.
    ///
    /// The client's file name is kept (reduced to its final component) so the
    /// audio name follows what the user uploaded.
    pub fn store_upload(&self, original_name: &str, bytes: &[u8]) -> Result<StagedUpload, OutputError> {
        self.ensure()?;
        let dir = tempfile::Builder::new()
            .prefix(".upload-")
            .tempdir_in(&self.root)?;

        let mut name = Path::new(original_name)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .filter(|n| !n.is_empty() && n != "..")
            .unwrap_or_else(|| "upload.pdf".to_string());
        if !name.to_ascii_lowercase().ends_with(".pdf") {
            name.push_str(".pdf");
        }

        let path = dir.path().join(name);
        fs::write(&path, bytes)?;
        Ok(StagedUpload { dir, path })
    }
}
