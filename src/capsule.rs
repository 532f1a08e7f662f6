//! file capsule: the transport-ready form of the one attached file.

use base64::{engine::general_purpose, Engine as _};
use bevy::prelude::*;
use std::path::{Path, PathBuf};

use crate::error::ChatError;

/// what the user picked.
///
/// native file dialogs and drag & drop hand us a path; browser uploads (and
/// tests) hand us the bytes directly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FileSource {
    Path(PathBuf),
    Bytes {
        name: String,
        mime_type: Option<String>,
        bytes: Vec<u8>,
    },
}

impl FileSource {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        FileSource::Path(path.into())
    }

    pub fn bytes(name: impl Into<String>, mime_type: Option<String>, bytes: Vec<u8>) -> Self {
        FileSource::Bytes { name: name.into(), mime_type, bytes }
    }

    /// display name (file name only, no directories).
    pub fn name(&self) -> String {
        match self {
            FileSource::Path(p) => p
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| p.display().to_string()),
            FileSource::Bytes { name, .. } => name.clone(),
        }
    }

    fn mime_type(&self) -> String {
        match self {
            FileSource::Bytes { mime_type: Some(m), .. } if !m.is_empty() => m.clone(),
            FileSource::Bytes { name, .. } => guess_mime(Path::new(name)),
            FileSource::Path(p) => guess_mime(p),
        }
    }
}

fn guess_mime(path: &Path) -> String {
    mime_guess::from_path(path).first_or_octet_stream().to_string()
}

/// base64 payload + mime type, ready to become an inline-data part.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileCapsule {
    pub name: String,
    pub data: String,
    pub mime_type: String,
}

impl FileCapsule {
    /// read the source and encode it. unreadable paths fail with `ChatError::Io`.
    pub fn capture(source: &FileSource) -> Result<Self, ChatError> {
        let mime_type = source.mime_type();
        let data = match source {
            FileSource::Path(p) => {
                let raw = std::fs::read(p)?;
                general_purpose::STANDARD.encode(raw)
            }
            FileSource::Bytes { bytes, .. } => general_purpose::STANDARD.encode(bytes),
        };
        debug!(target: "bevy_genai_chat",
            "captured file '{}' ({}, {} base64 chars)", source.name(), mime_type, data.len()
        );
        Ok(Self { name: source.name(), data, mime_type })
    }
}

/// the single attachment slot of the composer.
///
/// `generation` bumps on every select and clear, so a ui that mirrors the
/// slot can tell "same file picked again" from "nothing happened".
#[derive(Clone, Debug, Default)]
pub struct FileSlot {
    selected: Option<FileSource>,
    generation: u64,
}

impl FileSlot {
    pub fn select(&mut self, source: FileSource) {
        info!(target: "bevy_genai_chat", "file selected: '{}'", source.name());
        self.selected = Some(source);
        self.generation += 1;
    }

    pub fn clear(&mut self) {
        self.selected = None;
        self.generation += 1;
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_none()
    }

    pub fn name(&self) -> Option<String> {
        self.selected.as_ref().map(FileSource::name)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// encode the held file, if any.
    pub fn capture(&self) -> Result<Option<FileCapsule>, ChatError> {
        self.selected.as_ref().map(FileCapsule::capture).transpose()
    }
}
