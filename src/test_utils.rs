//! In-memory stand-ins for the document backend, the OCR service and the
//! clipboard, for driving the viewer in tests without MuPDF or a network.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

use flume::{Receiver, Sender};

use crate::clipboard::ClipboardSink;
use crate::extract::{ExtractionError, HttpReply, MultipartForm, Transport};
use crate::pdf::{
    CancelToken, DocumentLoader, PageInfo, PageSource, RasterImage, RenderError, Rotation, Size,
    Viewport,
};

/// Blocks whatever waits on it until dropped
pub struct Gate {
    _release: Sender<()>,
}

fn gate_pair() -> (Gate, Receiver<()>) {
    let (tx, rx) = flume::bounded(0);
    (Gate { _release: tx }, rx)
}

/// One rasterization performed by [`FakeLoader`]
#[derive(Clone, Debug, PartialEq)]
pub struct Rasterized {
    pub page: usize,
    pub scale: f32,
    pub rotation: Rotation,
    pub width_px: u32,
    pub height_px: u32,
}

#[derive(Default)]
struct FakeDocument {
    pages: Vec<PageInfo>,
    open_error: Option<RenderError>,
    broken_pages: HashSet<usize>,
    unreadable_pages: HashSet<usize>,
    gates: HashMap<usize, Receiver<()>>,
    rasterized: Vec<Rasterized>,
}

/// Synthetic document: pages of given sizes that rasterize to blank images
#[derive(Clone, Default)]
pub struct FakeLoader {
    doc: Arc<Mutex<FakeDocument>>,
}

impl FakeLoader {
    /// Document with one page per size, no baked rotation
    #[must_use]
    pub fn with_pages(sizes: &[Size]) -> Self {
        let pages = sizes
            .iter()
            .enumerate()
            .map(|(idx, &size)| PageInfo {
                number: idx + 1,
                size,
                baked_rotation: Rotation::R0,
            })
            .collect();
        let loader = Self::default();
        loader.lock().pages = pages;
        loader
    }

    /// Loader whose every open fails with `error`
    #[must_use]
    pub fn failing(error: RenderError) -> Self {
        let loader = Self::default();
        loader.lock().open_error = Some(error);
        loader
    }

    /// Give a page a `/Rotate` entry
    #[must_use]
    pub fn baked_rotation(self, page: usize, rotation: Rotation) -> Self {
        if let Some(info) = self.lock().pages.get_mut(page - 1) {
            info.baked_rotation = rotation;
        }
        self
    }

    /// Make rasterizing `page` fail
    #[must_use]
    pub fn broken_page(self, page: usize) -> Self {
        self.lock().broken_pages.insert(page);
        self
    }

    /// Make the descriptor of `page` unreadable
    #[must_use]
    pub fn unreadable_page(self, page: usize) -> Self {
        self.lock().unreadable_pages.insert(page);
        self
    }

    /// Hold rasterization of `page` until the returned gate is dropped
    pub fn hold_page(&self, page: usize) -> Gate {
        let (gate, rx) = gate_pair();
        self.lock().gates.insert(page, rx);
        gate
    }

    /// Everything rasterized so far, in order
    #[must_use]
    pub fn rasterized(&self) -> Vec<Rasterized> {
        self.lock().rasterized.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeDocument> {
        self.doc.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DocumentLoader for FakeLoader {
    fn open(&self) -> Result<Box<dyn PageSource>, RenderError> {
        if let Some(error) = &self.lock().open_error {
            return Err(error.clone());
        }
        Ok(Box::new(self.clone()))
    }
}

impl PageSource for FakeLoader {
    fn page_count(&self) -> usize {
        self.lock().pages.len()
    }

    fn page_info(&self, number: usize) -> Result<PageInfo, RenderError> {
        if self.lock().unreadable_pages.contains(&number) {
            return Err(RenderError::page(number, "corrupt page object"));
        }
        number
            .checked_sub(1)
            .and_then(|idx| self.lock().pages.get(idx).copied())
            .ok_or_else(|| RenderError::page(number, "page out of range"))
    }

    fn rasterize(
        &self,
        page: &PageInfo,
        viewport: &Viewport,
        device_pixel_ratio: f32,
        token: &CancelToken,
    ) -> Result<RasterImage, RenderError> {
        let gate = self.lock().gates.get(&page.number).cloned();
        if let Some(gate) = gate {
            let _ = gate.recv();
        }
        if token.is_cancelled() {
            return Err(RenderError::Cancelled);
        }

        let mut doc = self.lock();
        if doc.broken_pages.contains(&page.number) {
            return Err(RenderError::page(page.number, "corrupt content stream"));
        }

        let width_px = (viewport.width * device_pixel_ratio).round() as u32;
        let height_px = (viewport.height * device_pixel_ratio).round() as u32;
        doc.rasterized.push(Rasterized {
            page: page.number,
            scale: viewport.scale,
            rotation: viewport.rotation,
            width_px,
            height_px,
        });
        Ok(RasterImage::blank(width_px, height_px))
    }
}

/// Request seen by [`ScriptedTransport`]
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub method: &'static str,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub fields: Vec<(String, String)>,
    /// `(part name, file name)` of every uploaded file
    pub files: Vec<(String, String)>,
}

impl RecordedRequest {
    /// Value of a multipart text field
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Name of the first uploaded file
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.files.first().map(|(_, name)| name.as_str())
    }
}

#[derive(Default)]
struct Script {
    replies: VecDeque<Result<HttpReply, ExtractionError>>,
    requests: Vec<RecordedRequest>,
    gate: Option<Receiver<()>>,
}

/// [`Transport`] replaying queued replies in order
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<Script>,
}

impl ScriptedTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_reply(&self, status: u16, body: &str) {
        self.lock().replies.push_back(Ok(HttpReply {
            status,
            body: body.to_string(),
        }));
    }

    pub fn push_error(&self, error: ExtractionError) {
        self.lock().replies.push_back(Err(error));
    }

    /// Hold every exchange until the returned gate is dropped
    pub fn hold(&self) -> Gate {
        let (gate, rx) = gate_pair();
        self.lock().gate = Some(rx);
        gate
    }

    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn exchange(&self, request: RecordedRequest) -> Result<HttpReply, ExtractionError> {
        let gate = self.lock().gate.clone();
        if let Some(gate) = gate {
            let _ = gate.recv();
        }

        let mut script = self.lock();
        script.requests.push(request);
        script
            .replies
            .pop_front()
            .unwrap_or_else(|| Err(ExtractionError::Transport("no scripted reply".into())))
    }
}

impl Transport for ScriptedTransport {
    fn get(&self, url: &str) -> Result<HttpReply, ExtractionError> {
        self.exchange(RecordedRequest {
            method: "GET",
            url: url.to_string(),
            query: vec![],
            fields: vec![],
            files: vec![],
        })
    }

    fn post_multipart(
        &self,
        url: &str,
        query: &[(String, String)],
        form: MultipartForm,
    ) -> Result<HttpReply, ExtractionError> {
        self.exchange(RecordedRequest {
            method: "POST",
            url: url.to_string(),
            query: query.to_vec(),
            fields: form.fields,
            files: form
                .files
                .into_iter()
                .map(|(part, file)| (part, file.name))
                .collect(),
        })
    }
}

/// Clipboard that remembers what was copied
#[derive(Clone, Default)]
pub struct MemoryClipboard {
    copied: Arc<Mutex<Vec<String>>>,
    unavailable: bool,
}

impl MemoryClipboard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Clipboard that refuses every copy
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn copied(&self) -> Vec<String> {
        self.copied
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ClipboardSink for MemoryClipboard {
    fn set_text(&mut self, text: &str) -> Result<(), String> {
        if self.unavailable {
            return Err("clipboard unavailable".to_string());
        }
        self.copied
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(text.to_string());
        Ok(())
    }
}
