//! Whole-list replacement from an uploaded CSV.
//!
//! The file is read and encoded as a data URL before it can be submitted;
//! the endpoint owns parsing and validation.

use std::fs;
use std::path::Path;

use base64::Engine;
use tracing::{debug, info, instrument, warn};

use crate::api::CubeApi;
use crate::error::CubeError;
use crate::session::Session;
use crate::token::{RequestToken, TokenGate};

/// Handle for a pending read of the selected file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRead {
    pub token: RequestToken,
    pub file_name: String,
}

#[derive(Debug, Clone)]
struct SelectedFile {
    name: String,
    encoded: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct BulkReplacePanel {
    selected: Option<SelectedFile>,
    reads: TokenGate,
}

impl BulkReplacePanel {
    /// Selecting a file replaces any earlier selection, read or not.
    pub fn select(&mut self, file_name: impl Into<String>) -> FileRead {
        let file_name = file_name.into();
        self.selected = Some(SelectedFile {
            name: file_name.clone(),
            encoded: None,
        });
        let token = self.reads.issue();
        debug!(token = token.value(), file = %file_name, "file selected");
        FileRead { token, file_name }
    }

    /// Returns false when the read belongs to a superseded selection.
    pub fn complete_read(
        &mut self,
        read: FileRead,
        content: std::io::Result<Vec<u8>>,
    ) -> Result<bool, CubeError> {
        if !self.reads.settle(read.token) {
            debug!(file = %read.file_name, "dropping stale file read");
            return Ok(false);
        }
        let bytes = content?;
        let encoded = data_url(&read.file_name, &bytes);
        if let Some(selected) = self.selected.as_mut() {
            selected.encoded = Some(encoded);
        }
        info!(file = %read.file_name, bytes = bytes.len(), "file ready for upload");
        Ok(true)
    }

    /// Select and read a file from disk in one step.
    #[instrument(skip(self, path), fields(path = %path.display()))]
    pub fn load_path(&mut self, path: &Path) -> Result<(), CubeError> {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let read = self.select(file_name);
        self.complete_read(read, fs::read(path)).map(|_| ())
    }

    pub fn file_name(&self) -> Option<&str> {
        self.selected.as_ref().map(|file| file.name.as_str())
    }

    pub fn encoded(&self) -> Option<&str> {
        self.selected
            .as_ref()
            .and_then(|file| file.encoded.as_deref())
    }

    /// A file must be selected and fully read.
    pub fn can_submit(&self) -> bool {
        self.encoded().is_some()
    }

    pub fn clear(&mut self) {
        self.selected = None;
        self.reads.invalidate();
    }

    #[instrument(skip(self, session, api), fields(cube_id = %session.cube_id()))]
    pub fn submit(&self, session: &Session, api: &dyn CubeApi) -> Result<(), CubeError> {
        let Some(selected) = self.selected.as_ref() else {
            return Err(CubeError::NoFile);
        };
        let Some(encoded) = selected.encoded.as_deref() else {
            warn!(file = %selected.name, "submit before read finished");
            return Err(CubeError::FileNotRead);
        };
        api.bulk_replace(session.cube_id(), encoded)?;
        info!(file = %selected.name, "bulk replace submitted");
        Ok(())
    }
}

pub fn data_url(file_name: &str, bytes: &[u8]) -> String {
    let mime = mime_guess::from_path(file_name).first_or_octet_stream();
    let b64 = base64::engine::general_purpose::STANDARD;
    format!("data:{};base64,{}", mime.essence_str(), b64.encode(bytes))
}
