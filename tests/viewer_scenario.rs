use std::sync::Arc;
use std::time::Duration;

use docufy_region::Viewer;
use docufy_region::extract::{ExtractionMethod, OcrClient};
use docufy_region::pdf::{
    DocumentLoader, PointerButton, Point, RenderEvent, RenderParams, RenderService, Rotation,
    Size, SourceFile, ViewerOptions,
};
use docufy_region::test_utils::{FakeLoader, MemoryClipboard, ScriptedTransport};

const WAIT: Duration = Duration::from_secs(5);
const LETTER: Size = Size::new(612.0, 792.0);

fn viewer_with(transport: &Arc<ScriptedTransport>) -> Viewer {
    let client = OcrClient::with_transport("http://ocr.test", transport.clone());
    Viewer::new(
        &ViewerOptions::default(),
        client,
        Box::new(MemoryClipboard::new()),
    )
}

#[test]
fn fit_rotate_select_extract() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.push_reply(200, r#"{"text":"Invoice #123","method":"ocr"}"#);
    let loader = FakeLoader::with_pages(&[LETTER, LETTER]);

    let mut viewer = viewer_with(&transport);
    viewer.resize(Size::new(1200.0, 900.0));
    viewer
        .open_with(
            SourceFile::new("invoice.pdf", vec![0u8; 16]),
            Arc::new(loader.clone()),
        )
        .unwrap();
    assert!(!viewer.visible());
    assert!(viewer.wait_for_render(WAIT));
    assert!(viewer.visible());

    let first_fit = viewer.scale();
    assert_eq!(first_fit, 1.14);

    viewer.pointer_down(Point::new(10.0, 10.0), PointerButton::Primary);
    viewer.pointer_move(Point::new(300.0, 300.0));
    viewer.pointer_up(None);
    assert!(viewer.selection().is_some());

    viewer.rotate_clockwise();
    assert_eq!(viewer.selection(), None);
    assert!(viewer.wait_for_render(WAIT));

    let rotated_fit = viewer.scale();
    assert_eq!(rotated_fit, 1.47);
    assert_ne!(rotated_fit, first_fit);
    let viewport = viewer.viewport().unwrap();
    assert_eq!(viewport.rotation, Rotation::R90);
    assert!((viewport.width - 792.0 * 1.47).abs() < 1e-2);

    let last = loader.rasterized().pop().unwrap();
    assert_eq!(last.rotation, Rotation::R90);
    assert_eq!(last.scale, 1.47);

    viewer.pointer_down(Point::new(100.0, 100.0), PointerButton::Primary);
    viewer.pointer_move(Point::new(200.0, 180.0));
    viewer.pointer_up(Some(Point::new(200.0, 180.0)));
    let rect = viewer.selection().unwrap();
    assert_eq!((rect.w, rect.h), (100.0, 80.0));
    assert!(viewer.can_extract());

    viewer.extract().unwrap();
    assert!(viewer.extraction_loading());
    assert!(viewer.wait_for_extraction(WAIT));

    let result = viewer.extraction_result().unwrap();
    assert_eq!(result.text, "Invoice #123");
    assert_eq!(result.method, Some(ExtractionMethod::Ocr));
    assert_eq!(viewer.error(), None);

    let sent = &transport.requests()[0];
    assert_eq!(sent.field("page"), Some("1"));
    assert_eq!(sent.field("rotation"), Some("90"));
}

#[test]
fn baked_rotation_is_folded_into_fit_render_and_request() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.push_reply(200, r#"{"text":"Landscape","method":"pdf"}"#);
    let loader = FakeLoader::with_pages(&[LETTER]).baked_rotation(1, Rotation::R90);

    let mut viewer = viewer_with(&transport);
    viewer.resize(Size::new(1200.0, 900.0));
    viewer
        .open_with(
            SourceFile::new("landscape.pdf", vec![0u8; 16]),
            Arc::new(loader.clone()),
        )
        .unwrap();
    assert!(viewer.wait_for_render(WAIT));

    // Fitted against the 792x612 box the document itself shows
    assert_eq!(viewer.scale(), 1.47);
    assert_eq!(loader.rasterized().pop().unwrap().rotation, Rotation::R90);

    viewer.rotate_clockwise();
    assert!(viewer.wait_for_render(WAIT));
    assert_eq!(viewer.scale(), 1.14);
    let last = loader.rasterized().pop().unwrap();
    assert_eq!(last.rotation, Rotation::R180);
    assert_eq!(last.scale, 1.14);

    viewer.pointer_down(Point::new(100.0, 100.0), PointerButton::Primary);
    viewer.pointer_move(Point::new(300.0, 260.0));
    viewer.pointer_up(Some(Point::new(300.0, 260.0)));
    viewer.extract().unwrap();
    assert!(viewer.wait_for_extraction(WAIT));
    assert_eq!(viewer.extraction_result().unwrap().text, "Landscape");

    let sent = &transport.requests()[0];
    assert_eq!(sent.field("page"), Some("1"));
    assert_eq!(sent.field("rotation"), Some("180"));
}

#[test]
fn superseded_render_never_reaches_the_viewer() {
    let loader = FakeLoader::with_pages(&[LETTER, LETTER]);
    let gate = loader.hold_page(2);

    let mut viewer = viewer_with(&Arc::new(ScriptedTransport::new()));
    viewer.resize(Size::new(612.0, 792.0));
    viewer
        .open_with(SourceFile::new("two.pdf", vec![0u8]), Arc::new(loader.clone()))
        .unwrap();
    assert!(viewer.wait_for_render(WAIT));

    // Page 2 blocks in the worker; page 1 is requested before it finishes
    viewer.go_to_page(2);
    viewer.go_to_page(1);
    drop(gate);

    assert!(viewer.wait_for_render(WAIT));
    std::thread::sleep(Duration::from_millis(50));
    viewer.tick();

    let shown = viewer.rendered_page().unwrap();
    assert_eq!(shown.page, 1);
    assert_eq!(Some(shown.viewport), viewer.viewport());
    assert_eq!(viewer.current_page().map(|p| p.number), Some(1));
    assert_eq!(viewer.error(), None);
}

#[test]
fn service_reports_only_the_latest_render() {
    let loader = FakeLoader::with_pages(&[LETTER]);
    let gate = loader.hold_page(1);
    let shared: Arc<dyn DocumentLoader> = Arc::new(loader);
    let mut service = RenderService::new(shared).unwrap();

    let params = |scale| RenderParams {
        page: 1,
        scale,
        rotation: Rotation::R0,
        device_pixel_ratio: 1.0,
    };
    let first = service.render(params(1.0)).unwrap();
    let second = service.render(params(2.0)).unwrap();
    assert!(first.is_cancelled());
    assert!(!second.is_cancelled());
    drop(gate);

    match service.wait(WAIT) {
        Some(RenderEvent::Rendered(page)) => assert_eq!(page.viewport.scale, 2.0),
        other => panic!("expected the second render, got {other:?}"),
    }
    std::thread::sleep(Duration::from_millis(50));
    assert!(service.poll().is_empty());
    assert!(!service.in_flight());
}

#[test]
fn configuration_error_latches() {
    let loader: Arc<dyn DocumentLoader> = Arc::new(FakeLoader::with_pages(&[LETTER]));
    let mut service = RenderService::new(loader).unwrap();

    let bad = RenderParams {
        page: 1,
        scale: 1.0,
        rotation: Rotation::R0,
        device_pixel_ratio: 0.0,
    };
    service.render(bad).unwrap();
    assert!(matches!(service.wait(WAIT), Some(RenderEvent::Failed(e)) if e.is_fatal()));

    let good = RenderParams {
        device_pixel_ratio: 1.0,
        ..bad
    };
    assert!(service.render(good).is_err());
}

#[test]
fn resize_storm_refits_once_per_frame() {
    let loader = FakeLoader::with_pages(&[LETTER]);
    let mut viewer = viewer_with(&Arc::new(ScriptedTransport::new()));
    viewer.resize(Size::new(612.0, 792.0));
    viewer
        .open_with(SourceFile::new("one.pdf", vec![0u8]), Arc::new(loader.clone()))
        .unwrap();
    assert!(viewer.wait_for_render(WAIT));
    assert_eq!(viewer.scale(), 1.0);

    for width in (300..=600).rev().step_by(20) {
        viewer.resize(Size::new(width as f32, 10_000.0));
    }
    viewer.tick();
    assert!(viewer.wait_for_render(WAIT));

    assert_eq!(viewer.scale(), 0.49);
    assert_eq!(loader.rasterized().len(), 2);
}
