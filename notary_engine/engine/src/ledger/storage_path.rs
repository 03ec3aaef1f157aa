use chrono::{DateTime, Utc};

use crate::types::StoragePath;

/// Shape of the storage path recorded next to each fingerprint.
///
/// Paths are `<directory>/<stem>_<unix-millis>[.<ext>]`. Two submissions in
/// the same millisecond with the same extension collide; uniqueness is not
/// guaranteed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    pub directory: String,
    pub stem: String,
}

impl StorageLayout {
    pub fn new(directory: impl Into<String>, stem: impl Into<String>) -> Self {
        StorageLayout {
            directory: directory.into(),
            stem: stem.into(),
        }
    }

    /// Build the path for `file_name` submitted at `at`.
    pub fn path_for(&self, file_name: &str, at: DateTime<Utc>) -> StoragePath {
        let millis = at.timestamp_millis();
        let file = match file_extension(file_name) {
            Some(ext) => format!("{}_{millis}.{ext}", self.stem),
            None => format!("{}_{millis}", self.stem),
        };

        if self.directory.is_empty() {
            StoragePath(file)
        } else {
            StoragePath(format!("{}/{file}", self.directory.trim_end_matches('/')))
        }
    }
}

/// Text after the last dot of `file_name`.
///
/// Dot-files (`.env`) and names without a dot have no extension.
pub fn file_extension(file_name: &str) -> Option<&str> {
    match file_name.rfind('.') {
        Some(0) | None => None,
        Some(idx) => {
            let ext = &file_name[idx + 1..];
            (!ext.is_empty()).then_some(ext)
        }
    }
}
