//! File acquisition and SHA-256 fingerprinting.
//!
//! A `FileHandle` wraps a one-shot byte stream plus its metadata. Hashing reads
//! the stream once, in order, in fixed-size chunks, so memory use does not
//! depend on file size.

use std::fmt;
use std::io::Cursor;
use std::path::Path;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, trace};

use crate::error::WorkflowError;
use crate::types::Fingerprint;

/// Reference policy: 100 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

const CHUNK_SIZE: usize = 64 * 1024;

/// Metadata of a selected file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileInfo {
    pub name: String,
    pub size: u64, // declared byte length
    pub content_type: String,
}

/// User-selected file: metadata plus a byte stream that can be consumed once.
pub struct FileHandle {
    info: FileInfo,
    reader: Box<dyn AsyncRead + Send + Unpin>,
}

impl FileHandle {
    /// Open a file from disk; the content type is derived from its extension.
    pub async fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let file = tokio::fs::File::open(path).await?;
        let size = file.metadata().await?.len();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self::from_reader(name, size, file))
    }

    /// In-memory file.
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let size = bytes.len() as u64;
        Self::from_reader(name, size, Cursor::new(bytes))
    }

    /// Arbitrary stream with a declared size.
    pub fn from_reader<R>(name: impl Into<String>, size: u64, reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let name = name.into();
        let content_type = content_type_for(&name).to_string();
        FileHandle {
            info: FileInfo { name, size, content_type },
            reader: Box::new(reader),
        }
    }

    pub fn info(&self) -> &FileInfo {
        &self.info
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn size(&self) -> u64 {
        self.info.size
    }

    pub(crate) fn into_parts(self) -> (FileInfo, Box<dyn AsyncRead + Send + Unpin>) {
        (self.info, self.reader)
    }
}

impl fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileHandle").field("info", &self.info).finish()
    }
}

/// Reject a declared size above `max_size` before any byte is read.
pub fn check_size(info: &FileInfo, max_size: u64) -> Result<(), WorkflowError> {
    if info.size > max_size {
        return Err(WorkflowError::FileTooLarge { size: info.size, max: max_size });
    }
    Ok(())
}

/// Fingerprint a file, enforcing the size limit first.
pub async fn compute_fingerprint(handle: FileHandle, max_size: u64) -> Result<Fingerprint, WorkflowError> {
    check_size(&handle.info, max_size)?;
    digest_stream(handle.reader, max_size, || false).await
}

/// Stream `reader` through SHA-256.
///
/// `superseded` is polled between chunks; once it returns true the read stops
/// with `WorkflowError::Superseded`.
pub(crate) async fn digest_stream<R, F>(mut reader: R, max_size: u64, superseded: F) -> Result<Fingerprint, WorkflowError>
where
    R: AsyncRead + Unpin,
    F: Fn() -> bool,
{
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut total: u64 = 0;

    loop {
        if superseded() {
            debug!(bytes_read = total, "fingerprint computation superseded");
            return Err(WorkflowError::Superseded);
        }

        let n = reader
            .read(&mut buf)
            .await
            .map_err(|e| WorkflowError::HashComputation(e.to_string()))?;
        if n == 0 {
            break;
        }

        total += n as u64;
        // Declared sizes can lie
        if total > max_size {
            return Err(WorkflowError::FileTooLarge { size: total, max: max_size });
        }

        hasher.update(&buf[..n]);
        trace!(chunk = n, total, "hashed chunk");
    }

    let digest: [u8; 32] = hasher.finalize().into();
    Ok(Fingerprint::from_digest(&digest))
}

/// Human-readable size: `0 Bytes`, `12 Bytes`, `1.5 KB`, `100 MB`.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rendered = format!("{value:.2}");
    let rendered = rendered.trim_end_matches('0').trim_end_matches('.');
    format!("{rendered} {}", UNITS[unit])
}

/// Content type guessed from the file extension.
pub fn content_type_for(name: &str) -> &'static str {
    let ext = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "json" => "application/json",
        "csv" => "text/csv",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "zip" => "application/zip",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => "application/octet-stream",
    }
}
