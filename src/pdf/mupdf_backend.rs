//! MuPDF-backed document capabilities (PDF and single/multi-page images)

use std::sync::Arc;

use log::debug;
use mupdf::pdf::PdfPage;
use mupdf::{Colorspace, Document, Matrix, Pixmap};

use super::backend::{DocumentLoader, PageSource, SourceFile};
use super::cancel::CancelToken;
use super::request::RenderError;
use super::types::{PageInfo, RasterImage, Rotation, Size};
use super::viewport::Viewport;

/// Opens the in-memory file with MuPDF on whichever thread asks
pub struct MupdfLoader {
    bytes: Arc<[u8]>,
    mime_type: String,
}

impl MupdfLoader {
    #[must_use]
    pub fn new(file: &SourceFile) -> Self {
        Self {
            bytes: Arc::clone(&file.bytes),
            mime_type: file.mime_type.clone(),
        }
    }
}

impl DocumentLoader for MupdfLoader {
    fn open(&self) -> Result<Box<dyn PageSource>, RenderError> {
        let doc = Document::from_bytes(&self.bytes, &self.mime_type)
            .map_err(|e| RenderError::DocumentLoad(e.to_string()))?;
        let page_count = doc
            .page_count()
            .map_err(|e| RenderError::DocumentLoad(e.to_string()))?;
        if page_count <= 0 {
            return Err(RenderError::DocumentLoad("document has no pages".into()));
        }
        debug!("Opened {} document with {page_count} pages", self.mime_type);
        Ok(Box::new(MupdfSource {
            doc,
            page_count: page_count as usize,
        }))
    }
}

struct MupdfSource {
    doc: Document,
    page_count: usize,
}

impl MupdfSource {
    fn load(&self, number: usize) -> Result<mupdf::Page, RenderError> {
        if number == 0 || number > self.page_count {
            return Err(RenderError::page(number, "page out of range"));
        }
        self.doc
            .load_page((number - 1) as i32)
            .map_err(|e| RenderError::page(number, e.to_string()))
    }

    /// `/Rotate` of a PDF page; images and other formats have none
    fn baked_rotation(&self, number: usize) -> Rotation {
        self.load(number)
            .ok()
            .and_then(|page| PdfPage::try_from(page).ok())
            .and_then(|page| page.rotation().ok())
            .map_or(Rotation::R0, Rotation::from_degrees)
    }
}

impl PageSource for MupdfSource {
    fn page_count(&self) -> usize {
        self.page_count
    }

    fn page_info(&self, number: usize) -> Result<PageInfo, RenderError> {
        let page = self.load(number)?;
        let bounds = page
            .bounds()
            .map_err(|e| RenderError::page(number, e.to_string()))?;
        let baked_rotation = self.baked_rotation(number);

        // MuPDF reports bounds with /Rotate applied; undo it to get the page box
        let displayed = Size::new(bounds.x1 - bounds.x0, bounds.y1 - bounds.y0);
        Ok(PageInfo {
            number,
            size: displayed.rotated(baked_rotation),
            baked_rotation,
        })
    }

    fn rasterize(
        &self,
        page: &PageInfo,
        viewport: &Viewport,
        device_pixel_ratio: f32,
        token: &CancelToken,
    ) -> Result<RasterImage, RenderError> {
        let mupdf_page = self.load(page.number)?;
        if token.is_cancelled() {
            return Err(RenderError::Cancelled);
        }

        // MuPDF already applies the baked rotation; only the user's part remains
        let user_rotation = Rotation::from_degrees(
            i32::from(viewport.rotation.degrees()) - i32::from(page.baked_rotation.degrees()),
        );
        let mag = viewport.scale * device_pixel_ratio;
        let mut transform = Matrix::new_scale(mag, mag);
        if user_rotation != Rotation::R0 {
            transform.concat(Matrix::new_rotate(f32::from(user_rotation.degrees())));
        }

        let rgb = Colorspace::device_rgb();
        let pixmap = mupdf_page
            .to_pixmap(&transform, &rgb, false, false)
            .map_err(|e| RenderError::page(page.number, e.to_string()))?;
        if token.is_cancelled() {
            return Err(RenderError::Cancelled);
        }

        let pixels = pixmap_to_rgb(&pixmap).map_err(|detail| RenderError::page(page.number, detail))?;
        Ok(RasterImage {
            pixels,
            width_px: pixmap.width(),
            height_px: pixmap.height(),
        })
    }
}

fn pixmap_to_rgb(pixmap: &Pixmap) -> Result<Vec<u8>, String> {
    let n = pixmap.n() as usize;
    if n < 3 {
        return Err(format!("Unsupported pixmap format: {n} channels"));
    }

    let width = pixmap.width() as usize;
    let height = pixmap.height() as usize;
    let stride = pixmap.stride() as usize;
    let samples = pixmap.samples();
    let row_bytes = width * n;
    let expected_min = stride.saturating_mul(height);
    if samples.len() < expected_min || row_bytes > stride {
        return Err("Pixmap buffer size mismatch".to_string());
    }

    let mut out = Vec::with_capacity(width * height * 3);
    for y in 0..height {
        let row_start = y * stride;
        let row = &samples[row_start..row_start + row_bytes];
        if n == 3 {
            out.extend_from_slice(row);
        } else {
            for px in row.chunks_exact(n) {
                out.extend_from_slice(&px[..3]);
            }
        }
    }

    Ok(out)
}
