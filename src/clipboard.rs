//! Clipboard output for extracted text. Copy failures never reach the user.

use log::warn;

/// Destination for copied text
pub trait ClipboardSink {
    fn set_text(&mut self, text: &str) -> Result<(), String>;
}

/// The system clipboard, opened on each copy
#[derive(Default)]
pub struct SystemClipboard;

impl ClipboardSink for SystemClipboard {
    fn set_text(&mut self, text: &str) -> Result<(), String> {
        use arboard::Clipboard;
        let mut clipboard =
            Clipboard::new().map_err(|e| format!("Failed to access clipboard: {e}"))?;
        clipboard
            .set_text(text)
            .map_err(|e| format!("Failed to copy to clipboard: {e}"))
    }
}

/// Copy `text`, logging instead of failing. Returns whether it was copied.
pub fn copy_quietly(sink: &mut dyn ClipboardSink, text: &str) -> bool {
    match sink.set_text(text) {
        Ok(()) => true,
        Err(e) => {
            warn!("{e}");
            false
        }
    }
}
