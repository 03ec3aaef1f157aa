use std::sync::Mutex;

use async_trait::async_trait;

/// System clipboard, used for operator convenience only.
#[async_trait]
pub trait Clipboard: Send + Sync {
    async fn write_text(&self, text: &str) -> Result<(), String>;
}

/// Clipboard kept in memory (tests, headless runs).
#[derive(Default)]
pub struct MemoryClipboard {
    contents: Mutex<Option<String>>,
    unavailable: bool,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// A clipboard whose writes always fail.
    pub fn unavailable() -> Self {
        MemoryClipboard {
            contents: Mutex::new(None),
            unavailable: true,
        }
    }

    pub fn contents(&self) -> Option<String> {
        self.contents.lock().ok()?.clone()
    }
}

#[async_trait]
impl Clipboard for MemoryClipboard {
    async fn write_text(&self, text: &str) -> Result<(), String> {
        if self.unavailable {
            return Err("clipboard unavailable".to_string());
        }
        let mut contents = self.contents.lock().map_err(|_| "clipboard lock poisoned".to_string())?;
        *contents = Some(text.to_string());
        Ok(())
    }
}
