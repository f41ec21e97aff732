//! Region viewer: one open document, its render pipeline, the selection
//! overlay and the extraction state, driven by [`ViewerState`] effects.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};

use crate::clipboard::{ClipboardSink, copy_quietly};
use crate::extract::{
    ExtractionError, ExtractionHints, ExtractionResult, Extractor, OcrClient, RegionRequest,
    RegionScheme,
};
use crate::pdf::{
    Command, DEFAULT_CACHE_SIZE, DocumentLoader, Effect, FitMode, PageInfo, PixelRect, Point,
    PointerButton, RegionSelection, RenderError, RenderEvent, RenderService, RenderedPage,
    ScrollDirection, Size, SourceFile, ViewerOptions, ViewerState, Viewport,
};

pub struct Viewer {
    state: ViewerState,
    selection: RegionSelection,
    source: Option<SourceFile>,
    service: Option<RenderService>,
    rendered: Option<Arc<RenderedPage>>,
    extractor: Extractor,
    clipboard: Box<dyn ClipboardSink>,
    scheme: RegionScheme,
    hints: ExtractionHints,
    cache_size: usize,
    document_error: Option<String>,
    render_error: Option<String>,
}

impl Viewer {
    #[must_use]
    pub fn new(options: &ViewerOptions, client: OcrClient, clipboard: Box<dyn ClipboardSink>) -> Self {
        Self {
            state: ViewerState::new(options),
            selection: RegionSelection::with_min_size(Size::default(), options.min_selection_px),
            source: None,
            service: None,
            rendered: None,
            extractor: Extractor::new(client),
            clipboard,
            scheme: RegionScheme::default(),
            hints: ExtractionHints::default(),
            cache_size: DEFAULT_CACHE_SIZE,
            document_error: None,
            render_error: None,
        }
    }

    #[must_use]
    pub fn with_region_scheme(mut self, scheme: RegionScheme) -> Self {
        self.scheme = scheme;
        self
    }

    #[must_use]
    pub fn with_hints(mut self, hints: ExtractionHints) -> Self {
        self.hints = hints;
        self
    }

    #[must_use]
    pub fn with_cache_size(mut self, cache_size: usize) -> Self {
        self.cache_size = cache_size;
        self
    }

    /// Open `file`, reading pages through `loader`.
    ///
    /// A load failure closes whatever was open before and is kept as the
    /// document error until another file is opened.
    pub fn open_with(
        &mut self,
        file: SourceFile,
        loader: Arc<dyn DocumentLoader>,
    ) -> Result<(), RenderError> {
        self.close();
        info!("Opening {} ({} bytes)", file.name, file.bytes.len());

        let service = match RenderService::with_config(loader, self.cache_size) {
            Ok(service) => service,
            Err(error) => {
                warn!("Could not open {}: {error}", file.name);
                self.document_error = Some(error.to_string());
                return Err(error);
            }
        };

        let pages = service.document_info().descriptors();
        self.service = Some(service);
        self.source = Some(file);
        self.dispatch(Command::DocumentLoaded(pages));
        Ok(())
    }

    /// Close the document, cancelling any render and dropping all state
    pub fn close(&mut self) {
        if self.source.is_some() {
            info!("Closing document");
        }
        self.dispatch(Command::DocumentClosed);
        self.service = None;
        self.source = None;
        self.rendered = None;
        self.extractor.reset();
        self.document_error = None;
        self.render_error = None;
    }

    /// Apply a state command and carry out its effects
    pub fn dispatch(&mut self, command: Command) {
        let effects = self.state.apply(command);
        self.run_effects(effects);
    }

    fn run_effects(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::RenderCurrentPage => self.start_render(),
                Effect::CancelRender => {
                    if let Some(service) = self.service.as_mut() {
                        service.cancel();
                    }
                }
                Effect::ClearSelection => self.selection.clear(),
                Effect::RescaleSelection(factor) => {
                    self.selection.rescale(factor, self.overlay_size());
                }
                Effect::InvalidateCache => {
                    if let Some(service) = self.service.as_ref() {
                        service.invalidate_cache();
                    }
                }
                Effect::Reveal => info!("Page {} visible", self.state.current_page),
            }
        }
        self.selection.set_bounds(self.overlay_size());
    }

    fn start_render(&mut self) {
        let Some(params) = self.state.render_params() else {
            return;
        };
        let Some(service) = self.service.as_mut() else {
            return;
        };
        if let Err(error) = service.render(params) {
            self.render_error = Some(error.to_string());
            self.dispatch(Command::RenderFinished { success: false });
        }
    }

    fn on_render_event(&mut self, event: RenderEvent) {
        match event {
            RenderEvent::Rendered(page) => {
                debug!("Showing {page:?}");
                self.rendered = Some(page);
                self.render_error = None;
                self.dispatch(Command::RenderFinished { success: true });
            }
            RenderEvent::Failed(error) => {
                self.render_error = Some(error.to_string());
                self.rendered = None;
                self.dispatch(Command::RenderFinished { success: false });
            }
        }
    }

    /// One frame: apply coalesced resizes, then collect finished renders
    /// and extractions. Returns true if anything visible changed.
    pub fn tick(&mut self) -> bool {
        let before = self.rendered.as_ref().map(Arc::as_ptr);
        self.dispatch(Command::AnimationFrame);

        let events = self
            .service
            .as_mut()
            .map(RenderService::poll)
            .unwrap_or_default();
        for event in events {
            self.on_render_event(event);
        }

        let extraction_changed = self.extractor.poll();
        extraction_changed || before != self.rendered.as_ref().map(Arc::as_ptr)
    }

    /// Block until the outstanding render settles. Returns true if a page is on screen.
    pub fn wait_for_render(&mut self, timeout: Duration) -> bool {
        while self.state.render_in_flight {
            let Some(service) = self.service.as_mut() else {
                break;
            };
            match service.wait(timeout) {
                Some(event) => self.on_render_event(event),
                None => {
                    if service.in_flight() {
                        warn!("Render did not finish within {timeout:?}");
                        break;
                    }
                    // Superseded or cancelled: nothing more will arrive
                    self.dispatch(Command::RenderFinished { success: false });
                }
            }
        }
        self.rendered.is_some()
    }

    pub fn go_to_page(&mut self, page: usize) {
        self.dispatch(Command::GoToPage(page));
    }

    pub fn next_page(&mut self) {
        self.dispatch(Command::NextPage);
    }

    pub fn prev_page(&mut self) {
        self.dispatch(Command::PrevPage);
    }

    pub fn zoom_in(&mut self) {
        self.dispatch(Command::ZoomIn);
    }

    pub fn zoom_out(&mut self) {
        self.dispatch(Command::ZoomOut);
    }

    pub fn set_scale(&mut self, scale: f32) {
        self.dispatch(Command::SetScale(scale));
    }

    pub fn set_fit_mode(&mut self, mode: FitMode) {
        self.dispatch(Command::SetFitMode(mode));
    }

    pub fn rotate_clockwise(&mut self) {
        self.dispatch(Command::RotateClockwise);
    }

    pub fn rotate_counter_clockwise(&mut self) {
        self.dispatch(Command::RotateCounterClockwise);
    }

    /// Container box changed; takes effect on the next [`Viewer::tick`]
    pub fn resize(&mut self, available: Size) {
        self.dispatch(Command::ContainerResized(available));
    }

    pub fn color_scheme_changed(&mut self) {
        self.dispatch(Command::ColorSchemeChanged);
    }

    pub fn set_device_pixel_ratio(&mut self, ratio: f32) {
        self.dispatch(Command::SetDevicePixelRatio(ratio));
    }

    pub fn scroll(&mut self, direction: ScrollDirection) {
        self.dispatch(Command::Scroll(direction));
    }

    /// Press on the overlay, in overlay CSS pixels
    pub fn pointer_down(&mut self, point: Point, button: PointerButton) {
        if self.state.visible {
            self.selection.pointer_down(point, button);
        }
    }

    pub fn pointer_move(&mut self, point: Point) {
        self.selection.pointer_move(point);
    }

    pub fn pointer_leave(&mut self) {
        self.selection.pointer_leave();
    }

    /// Release anywhere, on or off the overlay
    pub fn pointer_up(&mut self, point: Option<Point>) {
        self.selection.pointer_up(point);
    }

    /// Whether the extraction trigger should be enabled
    #[must_use]
    pub fn can_extract(&self) -> bool {
        self.source.is_some() && self.selection.can_extract() && !self.extractor.loading()
    }

    /// Send the selected region of the current page for extraction
    pub fn extract(&mut self) -> Result<(), ExtractionError> {
        if self.extractor.loading() {
            return Err(ExtractionError::Busy);
        }
        let (Some(file), Some(page)) = (self.source.as_ref(), self.state.page()) else {
            return Err(ExtractionError::NoDocument);
        };
        let rect = match self.selection.rect() {
            Some(rect) if self.selection.can_extract() => rect,
            _ => return Err(ExtractionError::NoSelection),
        };

        let request = RegionRequest::build(
            file.clone(),
            page,
            &rect,
            self.state.scale(),
            self.state.rotation,
            self.scheme,
            self.hints.clone(),
        );
        self.extractor.start(request)
    }

    /// Block until the running extraction settles. Returns false on timeout.
    pub fn wait_for_extraction(&mut self, timeout: Duration) -> bool {
        self.extractor.wait(timeout)
    }

    /// Copy the current result to the clipboard; failures are only logged
    pub fn copy_result_to_clipboard(&mut self) -> bool {
        let Some(result) = self.extractor.result() else {
            return false;
        };
        copy_quietly(self.clipboard.as_mut(), &result.text)
    }

    /// Document, render and extraction errors, one per line
    #[must_use]
    pub fn error(&self) -> Option<String> {
        let errors: Vec<&str> = [
            self.document_error.as_deref(),
            self.render_error.as_deref(),
            self.extractor.error(),
        ]
        .into_iter()
        .flatten()
        .collect();

        if errors.is_empty() {
            None
        } else {
            Some(errors.join("\n"))
        }
    }

    fn overlay_size(&self) -> Size {
        self.state.viewport().map(|vp| vp.size()).unwrap_or_default()
    }

    #[must_use]
    pub fn state(&self) -> &ViewerState {
        &self.state
    }

    #[must_use]
    pub fn visible(&self) -> bool {
        self.state.visible
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        self.state.page_count()
    }

    #[must_use]
    pub fn current_page(&self) -> Option<&PageInfo> {
        self.state.page()
    }

    #[must_use]
    pub fn scale(&self) -> f32 {
        self.state.scale()
    }

    /// Viewport of the current page at the current parameters
    #[must_use]
    pub fn viewport(&self) -> Option<Viewport> {
        self.state.viewport()
    }

    #[must_use]
    pub fn selection(&self) -> Option<PixelRect> {
        self.selection.rect()
    }

    #[must_use]
    pub fn rendered_page(&self) -> Option<&Arc<RenderedPage>> {
        self.rendered.as_ref()
    }

    #[must_use]
    pub fn extraction_loading(&self) -> bool {
        self.extractor.loading()
    }

    #[must_use]
    pub fn extraction_result(&self) -> Option<&ExtractionResult> {
        self.extractor.result()
    }

    #[must_use]
    pub fn source(&self) -> Option<&SourceFile> {
        self.source.as_ref()
    }

    #[must_use]
    pub fn client(&self) -> &OcrClient {
        self.extractor.client()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::Rotation;
    use crate::test_utils::{FakeLoader, MemoryClipboard, ScriptedTransport};

    const WAIT: Duration = Duration::from_secs(5);

    fn viewer(transport: &Arc<ScriptedTransport>) -> Viewer {
        let client = OcrClient::with_transport("http://ocr.test", transport.clone());
        Viewer::new(&ViewerOptions::default(), client, Box::new(MemoryClipboard::new()))
    }

    fn open_letter(viewer: &mut Viewer) -> FakeLoader {
        let loader = FakeLoader::with_pages(&[Size::new(600.0, 800.0), Size::new(800.0, 600.0)]);
        viewer.resize(Size::new(1200.0, 800.0));
        viewer
            .open_with(SourceFile::new("doc.pdf", vec![0u8; 8]), Arc::new(loader.clone()))
            .unwrap();
        assert!(viewer.wait_for_render(WAIT));
        loader
    }

    fn drag(viewer: &mut Viewer, from: Point, to: Point) {
        viewer.pointer_down(from, PointerButton::Primary);
        viewer.pointer_move(to);
        viewer.pointer_up(Some(to));
    }

    #[test]
    fn open_fits_and_reveals() {
        let mut viewer = viewer(&Arc::new(ScriptedTransport::new()));
        let loader = open_letter(&mut viewer);

        assert!(viewer.visible());
        assert_eq!(viewer.scale(), 1.0);
        assert_eq!(viewer.page_count(), 2);
        assert_eq!(loader.rasterized().len(), 1);
        assert_eq!(viewer.error(), None);
    }

    #[test]
    fn load_failure_is_a_persistent_error() {
        let mut viewer = viewer(&Arc::new(ScriptedTransport::new()));
        let loader = FakeLoader::failing(RenderError::DocumentLoad("not a PDF".into()));
        let result = viewer.open_with(SourceFile::new("x.pdf", vec![1u8]), Arc::new(loader));

        assert!(result.is_err());
        assert!(viewer.error().unwrap().contains("not a PDF"));
        assert!(!viewer.visible());
        viewer.tick();
        assert!(viewer.error().is_some());
    }

    #[test]
    fn page_failure_is_recoverable() {
        let mut viewer = viewer(&Arc::new(ScriptedTransport::new()));
        let loader = FakeLoader::with_pages(&[Size::new(600.0, 800.0), Size::new(600.0, 800.0)])
            .broken_page(2);
        viewer.resize(Size::new(600.0, 800.0));
        viewer
            .open_with(SourceFile::new("doc.pdf", vec![0u8]), Arc::new(loader))
            .unwrap();
        viewer.wait_for_render(WAIT);

        viewer.next_page();
        viewer.wait_for_render(WAIT);
        assert!(viewer.error().unwrap().contains("page 2"));

        viewer.prev_page();
        viewer.wait_for_render(WAIT);
        assert_eq!(viewer.error(), None);
    }

    #[test]
    fn unreadable_page_does_not_block_the_document() {
        let mut viewer = viewer(&Arc::new(ScriptedTransport::new()));
        let letter = Size::new(600.0, 800.0);
        let loader = FakeLoader::with_pages(&[letter, letter, letter]).unreadable_page(3);
        viewer.resize(letter);
        viewer
            .open_with(SourceFile::new("doc.pdf", vec![0u8]), Arc::new(loader))
            .unwrap();
        assert!(viewer.wait_for_render(WAIT));
        assert_eq!(viewer.page_count(), 3);
        assert_eq!(viewer.error(), None);

        viewer.go_to_page(3);
        assert!(!viewer.wait_for_render(WAIT));
        let error = viewer.error().unwrap();
        assert!(error.contains("page 3"), "{error}");
        assert!(error.contains("corrupt page object"), "{error}");
        assert!(viewer.rendered_page().is_none());
        assert_eq!(viewer.current_page(), None);

        viewer.prev_page();
        assert!(viewer.wait_for_render(WAIT));
        assert_eq!(viewer.rendered_page().map(|p| p.page), Some(2));
        assert_eq!(viewer.error(), None);
    }

    #[test]
    fn document_without_readable_pages_fails_to_load() {
        let mut viewer = viewer(&Arc::new(ScriptedTransport::new()));
        let loader = FakeLoader::with_pages(&[Size::new(600.0, 800.0)]).unreadable_page(1);
        let result = viewer.open_with(SourceFile::new("doc.pdf", vec![0u8]), Arc::new(loader));

        assert!(matches!(result, Err(RenderError::DocumentLoad(_))));
        assert_eq!(viewer.page_count(), 0);
        assert!(viewer.error().unwrap().contains("corrupt page object"));
    }

    #[test]
    fn manual_zoom_rescales_selection() {
        let mut viewer = viewer(&Arc::new(ScriptedTransport::new()));
        open_letter(&mut viewer);

        drag(&mut viewer, Point::new(100.0, 100.0), Point::new(200.0, 180.0));
        viewer.set_scale(2.0);

        assert_eq!(
            viewer.selection(),
            Some(PixelRect::new(200.0, 200.0, 200.0, 160.0))
        );
        assert_eq!(viewer.state().fit_mode, None);
    }

    #[test]
    fn navigation_clears_selection() {
        let mut viewer = viewer(&Arc::new(ScriptedTransport::new()));
        open_letter(&mut viewer);

        drag(&mut viewer, Point::new(10.0, 10.0), Point::new(200.0, 200.0));
        viewer.next_page();
        assert_eq!(viewer.selection(), None);
        assert_eq!(viewer.current_page().map(|p| p.number), Some(2));
    }

    #[test]
    fn scrolling_moves_and_rotation_rewinds() {
        let mut viewer = viewer(&Arc::new(ScriptedTransport::new()));
        open_letter(&mut viewer);

        viewer.scroll(ScrollDirection::Down);
        viewer.scroll(ScrollDirection::Down);
        viewer.scroll(ScrollDirection::Right);
        viewer.scroll(ScrollDirection::Left);
        viewer.scroll(ScrollDirection::Left);
        assert_eq!(viewer.state().zoom.scroll_top, 80.0);
        assert_eq!(viewer.state().zoom.scroll_left, 0.0);

        viewer.scroll(ScrollDirection::Right);
        viewer.rotate_clockwise();
        assert_eq!(viewer.state().zoom.scroll_top, 0.0);
        assert_eq!(viewer.state().zoom.scroll_left, 0.0);
    }

    #[test]
    fn extract_without_selection_is_refused() {
        let mut viewer = viewer(&Arc::new(ScriptedTransport::new()));
        assert_eq!(viewer.extract(), Err(ExtractionError::NoDocument));

        open_letter(&mut viewer);
        assert_eq!(viewer.extract(), Err(ExtractionError::NoSelection));
        assert!(!viewer.can_extract());
    }

    #[test]
    fn extraction_sends_points_and_copies_result() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_reply(200, r#"{"text":"Total: 42.00","method":"pdf"}"#);
        let clipboard = MemoryClipboard::new();
        let client = OcrClient::with_transport("http://ocr.test", transport.clone());
        let mut viewer = Viewer::new(&ViewerOptions::default(), client, Box::new(clipboard.clone()))
            .with_hints(ExtractionHints {
                language: Some("eng".into()),
                recipe: Some("invoice".into()),
            });
        open_letter(&mut viewer);

        drag(&mut viewer, Point::new(0.0, 0.0), Point::new(100.0, 50.0));
        assert!(viewer.can_extract());
        viewer.extract().unwrap();
        assert!(!viewer.can_extract());
        assert!(viewer.wait_for_extraction(WAIT));

        let sent = &transport.requests()[0];
        assert_eq!(sent.field("scheme"), Some("points"));
        assert_eq!(sent.field("x1"), Some("0"));
        assert_eq!(sent.field("y1"), Some("750"));
        assert_eq!(sent.field("x2"), Some("100"));
        assert_eq!(sent.field("y2"), Some("800"));
        assert_eq!(sent.field("rotation"), Some("0"));
        assert_eq!(sent.field("recipe"), Some("invoice"));
        assert_eq!(sent.file_name(), Some("doc.pdf"));

        assert!(viewer.copy_result_to_clipboard());
        assert_eq!(clipboard.copied(), vec!["Total: 42.00".to_string()]);
    }

    #[test]
    fn close_resets_everything() {
        let mut viewer = viewer(&Arc::new(ScriptedTransport::new()));
        open_letter(&mut viewer);
        viewer.rotate_clockwise();
        viewer.close();

        assert!(!viewer.visible());
        assert_eq!(viewer.page_count(), 0);
        assert!(viewer.rendered_page().is_none());
        assert_eq!(viewer.state().rotation, Rotation::R0);
        assert!(!viewer.state().render_in_flight);
    }
}
