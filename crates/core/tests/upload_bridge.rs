//! Crop-and-upload against a local HTTP server standing in for the CMS.

use header_crop_core::dialog::{Action, CropDialog, Notice, Notifier, Phase, FAILURE_MESSAGE};
use header_crop_core::transform::{HEADER_HEIGHT, HEADER_WIDTH};
use header_crop_core::upload::{HttpImageStore, ImageStore, UploadRequest};
use header_crop_core::AppError;
use image::{DynamicImage, Rgb, RgbImage};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use url::Url;

/// Serves exactly one request with the given status and body and hands back
/// the raw request bytes.
async fn serve_once(status: &str, body: &str) -> (Url, JoinHandle<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.unwrap();
        request
    });

    let url = Url::parse(&format!("http://{}/api/upload", addr)).unwrap();
    (url, handle)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];

    let header_end = loop {
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed before headers were complete");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = find(&buf, b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let headers = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();
    let content_length = headers
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .map(|v| v.trim().parse::<usize>().unwrap());

    match content_length {
        Some(len) => {
            while buf.len() < header_end + len {
                let n = socket.read(&mut chunk).await.unwrap();
                assert!(n > 0, "connection closed before body was complete");
                buf.extend_from_slice(&chunk[..n]);
            }
        }
        // chunked
        None => {
            while !buf.ends_with(b"0\r\n\r\n") {
                let n = socket.read(&mut chunk).await.unwrap();
                assert!(n > 0, "connection closed before last chunk");
                buf.extend_from_slice(&chunk[..n]);
            }
        }
    }
    buf
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).rposition(|w| w == needle)
}

/// Pulls the JPEG out of a captured multipart request.
fn embedded_jpeg(request: &[u8]) -> DynamicImage {
    let start = find(request, &[0xFF, 0xD8, 0xFF]).expect("no JPEG start marker");
    let end = rfind(request, &[0xFF, 0xD9]).expect("no JPEG end marker") + 2;
    image::load_from_memory_with_format(&request[start..end], image::ImageFormat::Jpeg).unwrap()
}

#[derive(Clone, Default)]
struct RecordingNotifier {
    notices: Arc<Mutex<Vec<Notice>>>,
}

impl RecordingNotifier {
    fn taken(&self) -> Vec<Notice> {
        std::mem::take(&mut *self.notices.lock().unwrap())
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().unwrap().push(notice);
    }
}

fn travel_photo() -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(3000, 2000, |x, y| {
        Rgb([(x / 12) as u8, (y / 8) as u8, 128])
    }))
}

/// Compares against JPEG output, which is only close to the rendered value.
fn assert_near(actual: &Rgb<u8>, expected: [u8; 3]) {
    let close = actual
        .0
        .iter()
        .zip(expected)
        .all(|(a, e)| (*a as i16 - e as i16).abs() <= 6);
    assert!(close, "pixel {:?} is not close to {:?}", actual.0, expected);
}

fn request(bytes: &[u8]) -> UploadRequest {
    UploadRequest {
        image: bytes.to_vec(),
        destination: "destinations".to_string(),
        file_name: "bali-1718000000000".to_string(),
    }
}

#[tokio::test]
async fn server_error_is_an_upload_failure() {
    let (url, server) = serve_once("500 Internal Server Error", r#"{"error":"disk full"}"#).await;
    let store = HttpImageStore::with_endpoint(url).unwrap();

    let err = store.upload(request(b"jpeg")).await.unwrap_err();
    server.await.unwrap();

    assert!(err.is_upload_failure());
    match err {
        AppError::UploadFailed { status, body } => {
            assert_eq!(status, 500);
            assert!(body.contains("disk full"));
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
async fn stored_path_is_returned_and_fields_are_sent() {
    let (url, server) = serve_once(
        "200 OK",
        r#"{"path":"/uploads/destinations/bali-1718000000000.jpg"}"#,
    )
    .await;
    let store = HttpImageStore::with_endpoint(url).unwrap();

    let path = store.upload(request(b"\xFF\xD8jpeg")).await.unwrap();
    let raw = server.await.unwrap();
    let text = String::from_utf8_lossy(&raw);

    assert_eq!(path, "/uploads/destinations/bali-1718000000000.jpg");
    assert!(text.starts_with("POST /api/upload HTTP/1.1"));
    assert!(text.to_ascii_lowercase().contains("multipart/form-data; boundary="));
    assert!(text.contains("name=\"destination\"\r\n\r\ndestinations\r\n"));
    assert!(text.contains("name=\"fileName\"\r\n\r\nbali-1718000000000\r\n"));
    assert!(text.contains("name=\"image\"; filename=\"bali-1718000000000.jpg\""));
    assert!(text.to_ascii_lowercase().contains("content-type: image/jpeg"));
}

#[tokio::test]
async fn reply_without_path_is_invalid() {
    let (url, server) = serve_once("200 OK", r#"{"ok":true}"#).await;
    let store = HttpImageStore::with_endpoint(url).unwrap();

    let err = store.upload(request(b"jpeg")).await.unwrap_err();
    server.await.unwrap();

    assert!(matches!(err, AppError::InvalidResponse(_)));
    assert!(err.is_upload_failure());
}

#[tokio::test]
async fn failed_confirm_notifies_once_and_keeps_the_dialog() {
    let (url, server) = serve_once("500 Internal Server Error", "{}").await;
    let notifier = RecordingNotifier::default();
    let mut dialog = CropDialog::new(
        travel_photo(),
        (600.0, 400.0),
        HttpImageStore::with_endpoint(url).unwrap(),
        notifier.clone(),
        "destinations",
    );

    dialog.dispatch(Action::ScaleChanged(1.4));
    dialog.dispatch(Action::RotateChanged(12.0));
    let released = dialog.state().realized_crop().unwrap();
    dialog.dispatch(Action::CropCompleted(released));
    let before = dialog.state().clone();

    let mut called = 0;
    let result = dialog.confirm("bali.jpg", |_| called += 1).await;
    server.await.unwrap();

    assert!(result.unwrap_err().is_upload_failure());
    assert_eq!(called, 0);
    assert_eq!(notifier.taken(), vec![Notice::Failure(FAILURE_MESSAGE.to_string())]);
    assert!(dialog.is_open());
    assert_eq!(dialog.state(), &before);
    assert!(dialog.state().can_confirm());
}

#[tokio::test]
async fn confirm_stores_a_full_size_header() {
    let (url, server) = serve_once("200 OK", r#"{"path":"/uploads/destinations/bali.jpg"}"#).await;
    let notifier = RecordingNotifier::default();
    let mut dialog = CropDialog::new(
        travel_photo(),
        (600.0, 400.0),
        HttpImageStore::with_endpoint(url).unwrap(),
        notifier.clone(),
        "destinations",
    );

    let released = dialog.state().realized_crop().unwrap();
    dialog.dispatch(Action::CropCompleted(released));

    let mut paths = Vec::new();
    let path = dialog
        .confirm("bali.jpg", |p| paths.push(p.to_string()))
        .await
        .unwrap();
    let raw = server.await.unwrap();

    assert_eq!(path, "/uploads/destinations/bali.jpg");
    assert_eq!(paths, vec![path.clone()]);
    assert_eq!(dialog.state().phase, Phase::Closed);
    assert!(!dialog.is_open());
    assert!(matches!(notifier.taken().as_slice(), [Notice::Success(_)]));

    let header = embedded_jpeg(&raw);
    assert_eq!((header.width(), header.height()), (HEADER_WIDTH, HEADER_HEIGHT));

    // The covering region is x 150..2850, y 386.4..1613.6 of the gradient
    let header = header.to_rgb8();
    assert_near(header.get_pixel(0, 0), [12, 48, 128]);
    assert_near(header.get_pixel(HEADER_WIDTH - 1, HEADER_HEIGHT - 1), [237, 201, 128]);
    assert_near(header.get_pixel(HEADER_WIDTH / 2, HEADER_HEIGHT / 2), [125, 124, 128]);
    assert!(String::from_utf8_lossy(&raw).contains("name=\"fileName\"\r\n\r\nbali-"));
}

#[tokio::test]
async fn confirm_without_completed_crop_sends_nothing() {
    let notifier = RecordingNotifier::default();
    let endpoint = Url::parse("http://127.0.0.1:9/api/upload").unwrap();
    let mut dialog = CropDialog::new(
        travel_photo(),
        (600.0, 400.0),
        HttpImageStore::with_endpoint(endpoint).unwrap(),
        notifier.clone(),
        "destinations",
    );

    let err = dialog.confirm("bali.jpg", |_| panic!("must not be called")).await.unwrap_err();

    assert!(matches!(err, AppError::EmptyCrop));
    assert!(notifier.taken().is_empty());
    assert_eq!(dialog.state().phase, Phase::Editing);
}
