//! Document capabilities consumed by the render engine
//!
//! A [`DocumentLoader`] is shareable across threads and knows how to open
//! the document. Each render thread opens its own [`PageSource`], since
//! document handles of native PDF engines are not thread-safe.

use std::sync::Arc;

use super::cancel::CancelToken;
use super::request::RenderError;
use super::types::{PageInfo, RasterImage};
use super::viewport::Viewport;

/// An opened, paginated document
pub trait PageSource {
    /// Number of pages
    fn page_count(&self) -> usize;

    /// Descriptor of page `number` (1-based)
    fn page_info(&self, number: usize) -> Result<PageInfo, RenderError>;

    /// Rasterize `page` so that its CSS size matches `viewport` and the
    /// backing buffer is `device_pixel_ratio` times denser.
    ///
    /// Implementations return [`RenderError::Cancelled`] as soon as they
    /// notice `token` was cancelled.
    fn rasterize(
        &self,
        page: &PageInfo,
        viewport: &Viewport,
        device_pixel_ratio: f32,
        token: &CancelToken,
    ) -> Result<RasterImage, RenderError>;
}

/// Opens [`PageSource`]s for one document
pub trait DocumentLoader: Send + Sync {
    fn open(&self) -> Result<Box<dyn PageSource>, RenderError>;
}

/// Original bytes of the opened file, kept for re-submission to the OCR service
#[derive(Clone, Debug)]
pub struct SourceFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Arc<[u8]>,
}

impl SourceFile {
    #[must_use]
    pub fn new(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        let name = name.into();
        let mime_type = mime_for_name(&name).to_string();
        Self {
            name,
            mime_type,
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk
    pub fn read(path: &std::path::Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("document.pdf")
            .to_string();
        Ok(Self::new(name, bytes))
    }
}

/// MIME type guessed from the file name; names without a known extension
/// are treated as PDF
#[must_use]
pub fn mime_for_name(name: &str) -> &'static str {
    mime_guess::from_path(name)
        .first_raw()
        .unwrap_or("application/pdf")
}
