//! Render service - owns the render worker, the cache, and the
//! "latest request wins" bookkeeping

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use flume::{Receiver, RecvTimeoutError, Sender};
use log::{debug, info, warn};

use super::backend::DocumentLoader;
use super::cache::{DEFAULT_CACHE_SIZE, PageCache};
use super::cancel::{CancelToken, RenderHandle};
use super::request::{RenderError, RenderParams, RenderRequest, RenderResponse, RequestId};
use super::types::{PageInfo, RenderedPage};
use super::worker::render_worker;

/// Document metadata, read once at load time.
///
/// A page whose descriptor cannot be read keeps its error here; the rest of
/// the document stays usable and rendering that page reports the failure.
#[derive(Clone, Debug)]
pub struct DocumentInfo {
    pub page_count: usize,
    pub pages: Vec<Result<PageInfo, RenderError>>,
}

impl DocumentInfo {
    /// Descriptor for page `number` (1-based), if it could be read
    #[must_use]
    pub fn page(&self, number: usize) -> Option<&PageInfo> {
        number
            .checked_sub(1)
            .and_then(|idx| self.pages.get(idx))
            .and_then(|page| page.as_ref().ok())
    }

    /// One slot per page, `None` where the descriptor failed
    #[must_use]
    pub fn descriptors(&self) -> Vec<Option<PageInfo>> {
        self.pages.iter().map(|page| page.as_ref().ok().copied()).collect()
    }
}

/// Outcome of the current render, as seen by the viewer
#[derive(Debug)]
pub enum RenderEvent {
    Rendered(Arc<RenderedPage>),
    Failed(RenderError),
}

/// Manages page rendering on a worker thread.
///
/// Only one render is meaningful at a time: starting a new one cancels the
/// previous, and responses for anything but the latest request are dropped.
pub struct RenderService {
    request_tx: Sender<RenderRequest>,
    response_rx: Receiver<RenderResponse>,
    next_request_id: u64,
    current: Option<RenderHandle>,
    cache: Arc<Mutex<PageCache>>,
    doc_info: DocumentInfo,
    fatal: Option<RenderError>,
}

impl RenderService {
    /// Open the document and start the worker with the default cache size
    pub fn new(loader: Arc<dyn DocumentLoader>) -> Result<Self, RenderError> {
        Self::with_config(loader, DEFAULT_CACHE_SIZE)
    }

    /// Open the document and start the worker
    pub fn with_config(
        loader: Arc<dyn DocumentLoader>,
        cache_size: usize,
    ) -> Result<Self, RenderError> {
        let doc_info = Self::load_document_info(loader.as_ref())?;
        info!("Loaded document with {} pages", doc_info.page_count);

        let cache = Arc::new(Mutex::new(PageCache::new(cache_size)));
        let (request_tx, request_rx) = flume::unbounded();
        let (response_tx, response_rx) = flume::unbounded();

        let worker_cache = cache.clone();
        std::thread::Builder::new()
            .name("page-render".to_string())
            .spawn(move || render_worker(loader, request_rx, response_tx, worker_cache))
            .map_err(|e| RenderError::Configuration(format!("cannot spawn render thread: {e}")))?;

        Ok(Self {
            request_tx,
            response_rx,
            next_request_id: 1,
            current: None,
            cache,
            doc_info,
            fatal: None,
        })
    }

    fn load_document_info(loader: &dyn DocumentLoader) -> Result<DocumentInfo, RenderError> {
        let source = loader.open()?;
        let page_count = source.page_count();
        if page_count == 0 {
            return Err(RenderError::DocumentLoad("document has no pages".into()));
        }

        let pages: Vec<_> = (1..=page_count)
            .map(|number| {
                source.page_info(number).inspect_err(|error| {
                    warn!("Page {number} is unreadable: {error}");
                })
            })
            .collect();

        if let Some(Err(first)) = pages.first() {
            if pages.iter().all(Result::is_err) {
                return Err(RenderError::DocumentLoad(format!("no readable pages ({first})")));
            }
        }

        Ok(DocumentInfo { page_count, pages })
    }

    /// Get document metadata
    #[must_use]
    pub fn document_info(&self) -> &DocumentInfo {
        &self.doc_info
    }

    /// Start rendering, cancelling whatever was in flight.
    ///
    /// Fails immediately once a configuration error has been seen.
    pub fn render(&mut self, params: RenderParams) -> Result<RenderHandle, RenderError> {
        if let Some(fatal) = &self.fatal {
            return Err(fatal.clone());
        }

        self.cancel();

        let id = self.next_id();
        let token = CancelToken::new();
        let handle = RenderHandle::new(id, token.clone());
        debug!(
            "Render {id}: page {} scale {} rotation {} dpr {}",
            params.page, params.scale, params.rotation, params.device_pixel_ratio
        );

        if self
            .request_tx
            .send(RenderRequest::Page { id, params, token })
            .is_err()
        {
            let error = RenderError::Configuration("render worker is not running".into());
            self.fatal = Some(error.clone());
            return Err(error);
        }

        self.current = Some(handle.clone());
        Ok(handle)
    }

    /// Cancel the in-flight render, if any. Its completion will be ignored.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.current.take() {
            debug!("Cancelling render {}", handle.id());
            handle.cancel();
        }
    }

    /// Whether a render is outstanding
    #[must_use]
    pub fn in_flight(&self) -> bool {
        self.current.is_some()
    }

    #[must_use]
    pub fn current(&self) -> Option<&RenderHandle> {
        self.current.as_ref()
    }

    /// Latched configuration error, if any
    #[must_use]
    pub fn fatal_error(&self) -> Option<&RenderError> {
        self.fatal.as_ref()
    }

    /// Drain finished renders without blocking
    pub fn poll(&mut self) -> Vec<RenderEvent> {
        let mut events = vec![];
        while let Ok(response) = self.response_rx.try_recv() {
            if let Some(event) = self.accept(response) {
                events.push(event);
            }
        }
        events
    }

    /// Block until the current render settles or `timeout` elapses
    pub fn wait(&mut self, timeout: Duration) -> Option<RenderEvent> {
        let deadline = Instant::now() + timeout;
        while self.in_flight() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.response_rx.recv_timeout(remaining) {
                Ok(response) => {
                    if let Some(event) = self.accept(response) {
                        return Some(event);
                    }
                }
                Err(RecvTimeoutError::Timeout) => return None,
                Err(RecvTimeoutError::Disconnected) => {
                    self.current = None;
                    let error = RenderError::Configuration("render worker stopped".into());
                    self.fatal = Some(error.clone());
                    return Some(RenderEvent::Failed(error));
                }
            }
        }
        None
    }

    fn accept(&mut self, response: RenderResponse) -> Option<RenderEvent> {
        let id = response.id();
        if self.current.as_ref().map(RenderHandle::id) != Some(id) {
            debug!("Dropping stale render response {id}");
            return None;
        }
        self.current = None;

        match response {
            RenderResponse::Page { data, .. } => {
                debug!("Render {id} finished: {:?}", data);
                Some(RenderEvent::Rendered(data))
            }
            RenderResponse::Cancelled(_) => None,
            RenderResponse::Error { error, .. } if error.is_cancellation() => None,
            RenderResponse::Error { error, .. } => {
                warn!("Render {id} failed: {error}");
                if error.is_fatal() {
                    self.fatal = Some(error.clone());
                }
                Some(RenderEvent::Failed(error))
            }
        }
    }

    /// Forget every cached raster
    pub fn invalidate_cache(&self) {
        self.cache
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .invalidate_all();
    }

    /// Cancel outstanding work and stop the worker
    pub fn shutdown(&mut self) {
        self.cancel();
        let _ = self.request_tx.send(RenderRequest::Shutdown);
    }

    fn next_id(&mut self) -> RequestId {
        let id = RequestId::new(self.next_request_id);
        self.next_request_id += 1;
        id
    }
}

impl Drop for RenderService {
    fn drop(&mut self) {
        self.shutdown();
    }
}
