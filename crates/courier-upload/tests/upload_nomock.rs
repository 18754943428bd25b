//! No-mock upload tests.
//!
//! Covers:
//! - `HttpTransport` against a loopback HTTP listener
//! - The background scheduler draining a real queue and stopping promptly

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::{TimeZone, Utc};
use courier_common::{Feature, ManualClock, StorageConfig, UploadConfig};
use courier_storage::FeatureStorage;
use courier_upload::{
    AlwaysAllowed, HttpTransport, RequestBuilder, Transport, TransportError, UploadDelay,
    UploadRequest, UploadScheduler, Uploader,
};
use tempfile::tempdir;

struct Captured {
    request_line: String,
    headers: Vec<String>,
    body: Vec<u8>,
}

/// Accept one connection, answer with `status`, return what was received.
fn serve_once(status: &'static str) -> (String, thread::JoinHandle<Captured>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let endpoint = format!("http://{}", listener.local_addr().unwrap());
    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());

        let mut request_line = String::new();
        reader.read_line(&mut request_line).unwrap();
        let mut headers = Vec::new();
        let mut content_length = 0;
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            let line = line.trim_end().to_string();
            if line.is_empty() {
                break;
            }
            if let Some(value) = line.to_ascii_lowercase().strip_prefix("content-length:") {
                content_length = value.trim().parse().unwrap();
            }
            headers.push(line);
        }
        let mut body = vec![0; content_length];
        reader.read_exact(&mut body).unwrap();

        let mut stream = stream;
        write!(
            stream,
            "HTTP/1.1 {status}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
        )
        .unwrap();
        Captured {
            request_line: request_line.trim_end().to_string(),
            headers,
            body,
        }
    });
    (endpoint, handle)
}

fn request(endpoint: &str, token: Option<&str>) -> UploadRequest {
    let config = UploadConfig {
        endpoint: endpoint.to_string(),
        client_token: token.map(str::to_string),
        ..UploadConfig::default()
    };
    RequestBuilder::new(&config, Feature::Logs)
        .unwrap()
        .build(b"[{\"m\":1}]".to_vec())
}

#[test]
fn http_transport_posts_payload_with_headers() {
    let (endpoint, server) = serve_once("202 Accepted");
    let transport = HttpTransport::new(Duration::from_secs(5));
    let request = request(&endpoint, Some("pub-abc"));

    assert_eq!(transport.send(&request).unwrap(), 202);

    let captured = server.join().unwrap();
    assert_eq!(captured.request_line, "POST /api/v2/logs?source=rust HTTP/1.1");
    assert_eq!(captured.body, b"[{\"m\":1}]");
    let has = |needle: &str| {
        captured
            .headers
            .iter()
            .any(|h| h.to_ascii_lowercase() == needle.to_ascii_lowercase())
    };
    assert!(has("content-type: application/json"));
    assert!(has("x-courier-token: pub-abc"));
    assert!(has(&format!("x-courier-request-id: {}", request.id)));
}

#[test]
fn http_transport_reports_error_statuses() {
    for (status, code) in [("503 Service Unavailable", 503), ("403 Forbidden", 403)] {
        let (endpoint, server) = serve_once(status);
        let transport = HttpTransport::new(Duration::from_secs(5));
        assert_eq!(transport.send(&request(&endpoint, None)).unwrap(), code);
        server.join().unwrap();
    }
}

#[test]
fn http_transport_does_not_follow_redirects() {
    let (endpoint, server) = serve_once("302 Found");
    let transport = HttpTransport::new(Duration::from_secs(5));
    assert_eq!(transport.send(&request(&endpoint, None)).unwrap(), 302);
    server.join().unwrap();
}

struct Counting {
    sent: AtomicUsize,
}

impl Transport for Counting {
    fn send(&self, _request: &UploadRequest) -> Result<u16, TransportError> {
        self.sent.fetch_add(1, Ordering::SeqCst);
        Ok(202)
    }
}

#[test]
fn background_scheduler_drains_and_stops() {
    let root = tempdir().unwrap();
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2019, 12, 15, 10, 0, 0).unwrap());
    let storage = FeatureStorage::open(
        root.path(),
        Feature::Metrics,
        StorageConfig::default(),
        Arc::new(clock.clone()),
    )
    .unwrap();
    for n in 0..3 {
        storage.writer().write(format!("{n}").as_bytes());
        clock.advance(Duration::from_secs(5));
    }

    let transport = Arc::new(Counting {
        sent: AtomicUsize::new(0),
    });
    let mut scheduler = UploadScheduler::new(
        Feature::Metrics,
        storage.reader(),
        Uploader::new(
            transport.clone(),
            RequestBuilder::new(&UploadConfig::default(), Feature::Metrics).unwrap(),
        ),
        Arc::new(AlwaysAllowed),
        UploadDelay::new(Duration::from_millis(5), Duration::from_millis(20), 0.1),
    );
    scheduler.start().unwrap();
    assert!(scheduler.is_running());

    let deadline = Instant::now() + Duration::from_secs(10);
    while transport.sent.load(Ordering::SeqCst) < 3 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(transport.sent.load(Ordering::SeqCst), 3);

    let stopping = Instant::now();
    scheduler.stop();
    assert!(stopping.elapsed() < Duration::from_secs(2));
    assert!(!scheduler.is_running());
    assert_eq!(storage.status().unwrap().file_count, 0);
}

#[test]
fn stop_wakes_a_long_wait() {
    let root = tempdir().unwrap();
    let storage = FeatureStorage::open(
        root.path(),
        Feature::Logs,
        StorageConfig::default(),
        Arc::new(courier_common::SystemClock),
    )
    .unwrap();
    let mut scheduler = UploadScheduler::new(
        Feature::Logs,
        storage.reader(),
        Uploader::new(
            Arc::new(Counting {
                sent: AtomicUsize::new(0),
            }),
            RequestBuilder::new(&UploadConfig::default(), Feature::Logs).unwrap(),
        ),
        Arc::new(AlwaysAllowed),
        UploadDelay::new(Duration::from_secs(60), Duration::from_secs(60), 0.0),
    );
    scheduler.start().unwrap();
    thread::sleep(Duration::from_millis(50));

    let stopping = Instant::now();
    scheduler.stop();
    assert!(stopping.elapsed() < Duration::from_secs(5));
}
