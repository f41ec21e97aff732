use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use docufy_region::Viewer;
use docufy_region::extract::{ClientConfig, ExtractionError, OcrClient};
use docufy_region::pdf::{PointerButton, Point, Size, SourceFile, ViewerOptions};
use docufy_region::test_utils::{FakeLoader, MemoryClipboard};

const WAIT: Duration = Duration::from_secs(10);

/// Serves one canned reply per connection and hands back the raw requests
fn serve(replies: Vec<(u16, &'static str, &'static str)>) -> (SocketAddr, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = std::thread::spawn(move || {
        let mut seen = vec![];
        for (status, content_type, body) in replies {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);
            seen.push(read_request(&mut reader));

            let response = format!(
                "HTTP/1.1 {status} Canned\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let mut stream = reader.into_inner();
            stream.write_all(response.as_bytes()).unwrap();
            stream.flush().unwrap();
        }
        seen
    });
    (addr, handle)
}

fn read_request(reader: &mut impl BufRead) -> String {
    let mut head = String::new();
    let mut content_length = 0usize;
    let mut chunked = false;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).unwrap() == 0 {
            break;
        }
        let lower = line.to_ascii_lowercase();
        if let Some(value) = lower.strip_prefix("content-length:") {
            content_length = value.trim().parse().unwrap();
        }
        if lower.starts_with("transfer-encoding:") && lower.contains("chunked") {
            chunked = true;
        }
        head.push_str(&line);
        if line == "\r\n" {
            break;
        }
    }

    let mut body = vec![];
    if chunked {
        while !body.ends_with(b"0\r\n\r\n") {
            let mut byte = [0u8; 1];
            if reader.read(&mut byte).unwrap() == 0 {
                break;
            }
            body.push(byte[0]);
        }
    } else {
        body.resize(content_length, 0);
        reader.read_exact(&mut body).unwrap();
    }
    head + &String::from_utf8_lossy(&body)
}

fn client_for(addr: SocketAddr) -> OcrClient {
    OcrClient::new(&ClientConfig {
        base_url: format!("http://{addr}/"),
        timeout: Duration::from_secs(5),
    })
    .unwrap()
}

fn viewer_on(addr: SocketAddr) -> Viewer {
    let mut viewer = Viewer::new(
        &ViewerOptions::default(),
        client_for(addr),
        Box::new(MemoryClipboard::new()),
    );
    viewer.resize(Size::new(612.0, 792.0));
    let loader = FakeLoader::with_pages(&[Size::new(612.0, 792.0)]);
    viewer
        .open_with(
            SourceFile::new("receipt.pdf", b"%PDF-1.7 fake".to_vec()),
            Arc::new(loader),
        )
        .unwrap();
    assert!(viewer.wait_for_render(WAIT));
    viewer
}

fn select(viewer: &mut Viewer) {
    viewer.pointer_down(Point::new(50.0, 60.0), PointerButton::Primary);
    viewer.pointer_move(Point::new(250.0, 160.0));
    viewer.pointer_up(Some(Point::new(250.0, 160.0)));
    assert!(viewer.can_extract());
}

#[test]
fn failed_attempt_clears_previous_result_and_surfaces_detail() {
    let (addr, server) = serve(vec![
        (200, "application/json", r#"{"text":"Total 42","method":"pdf"}"#),
        (422, "application/json", r#"{"detail":"bad region"}"#),
    ]);
    let mut viewer = viewer_on(addr);
    select(&mut viewer);

    viewer.extract().unwrap();
    assert!(viewer.wait_for_extraction(WAIT));
    assert_eq!(viewer.extraction_result().map(|r| r.text.as_str()), Some("Total 42"));

    viewer.extract().unwrap();
    assert!(viewer.extraction_result().is_none());
    assert!(viewer.wait_for_extraction(WAIT));

    assert!(viewer.extraction_result().is_none());
    let error = viewer.error().unwrap();
    assert!(error.contains("bad region"), "{error}");
    assert!(error.contains("422"), "{error}");

    let requests = server.join().unwrap();
    assert!(requests[0].starts_with("POST /extract/region "));
    assert!(requests[0].contains("name=\"page\""));
    assert!(requests[0].contains("name=\"x1\""));
    assert!(requests[0].contains("filename=\"receipt.pdf\""));
    assert!(requests[0].contains("%PDF-1.7 fake"));
}

#[test]
fn plain_text_error_body_is_surfaced() {
    let (addr, server) = serve(vec![(500, "text/plain", "Internal Server Error")]);
    let mut viewer = viewer_on(addr);
    select(&mut viewer);

    viewer.extract().unwrap();
    assert!(viewer.wait_for_extraction(WAIT));
    assert_eq!(
        viewer.error().as_deref(),
        Some("Internal Server Error (HTTP 500)")
    );
    server.join().unwrap();
}

#[test]
fn health_and_version() {
    let (addr, server) = serve(vec![
        (200, "text/plain", "ok"),
        (200, "application/json", r#"{"service":"1.0.0","docuocr":"0.4.2"}"#),
    ]);
    let client = client_for(addr);

    assert!(client.health().unwrap());
    let version = client.version().unwrap();
    assert_eq!(version.service, "1.0.0");
    assert_eq!(version.docuocr, "0.4.2");

    let requests = server.join().unwrap();
    assert!(requests[0].starts_with("GET /health "));
    assert!(requests[1].starts_with("GET /version "));
}

#[test]
fn whole_document_ocr_passes_query() {
    let (addr, server) = serve(vec![(
        200,
        "application/json",
        r#"{"filename":"receipt.pdf","text":"hello","words":[],"metadata":{"dpi":300}}"#,
    )]);
    let client = client_for(addr);
    let file = SourceFile::new("receipt.pdf", b"%PDF".to_vec());

    let result = client.extract_document(&file, Some(300), Some("eng")).unwrap();
    assert_eq!(result.text, "hello");
    assert_eq!(result.metadata.get("dpi"), Some(&serde_json::json!(300)));

    let requests = server.join().unwrap();
    assert!(requests[0].starts_with("POST /extract?"));
    assert!(requests[0].contains("dpi=300"));
    assert!(requests[0].contains("lang=eng"));
}

#[test]
fn unreachable_service_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let result = client_for(addr).health();
    assert!(matches!(
        result,
        Err(ExtractionError::Transport(_) | ExtractionError::Timeout)
    ));
}

#[test]
fn batch_ocr_posts_each_file_under_files() {
    let (addr, server) = serve(vec![(
        200,
        "application/json",
        r#"[{"filename":"a.pdf","text":"first","words":[],"metadata":{},"error":null},{"filename":"b.png","text":"","words":[],"metadata":{},"error":"OCR failed"}]"#,
    )]);
    let client = client_for(addr);
    let files = [
        SourceFile::new("a.pdf", b"%PDF-a".to_vec()),
        SourceFile::new("b.png", b"PNG-b".to_vec()),
    ];

    let results = client.extract_documents(&files, Some(200), Some("deu")).unwrap();
    assert_eq!(results[0].text, "first");
    assert_eq!(results[1].error.as_deref(), Some("OCR failed"));

    let requests = server.join().unwrap();
    assert!(requests[0].starts_with("POST /extract/multi?dpi=200&lang=deu "));
    assert_eq!(requests[0].matches("name=\"files\"").count(), 2);
    assert!(requests[0].contains("filename=\"a.pdf\""));
    assert!(requests[0].contains("filename=\"b.png\""));
    assert!(requests[0].contains("image/png"));
}
