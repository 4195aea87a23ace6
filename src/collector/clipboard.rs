//! Reading the user id the game's copy button places on the clipboard.

use crate::error::{CollectorError, Result};

pub trait ClipboardReader {
    fn read_text(&mut self) -> Result<String>;
}

/// System clipboard through `arboard`, opened lazily on first read.
#[derive(Default)]
pub struct SystemClipboard {
    inner: Option<arboard::Clipboard>,
}

impl SystemClipboard {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClipboardReader for SystemClipboard {
    fn read_text(&mut self) -> Result<String> {
        let mut clipboard = match self.inner.take() {
            Some(clipboard) => clipboard,
            None => {
                arboard::Clipboard::new().map_err(|e| CollectorError::Clipboard(e.to_string()))?
            }
        };
        let text = clipboard.get_text();
        self.inner = Some(clipboard);
        text
            .map(|text| text.trim().to_string())
            .map_err(|e| CollectorError::Clipboard(e.to_string()))
    }
}
