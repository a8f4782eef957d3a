//! Integration tests for the Metis detector client against a mock server.

mod common;

use std::net::TcpListener;
use std::sync::mpsc;

use safehaven_core::MetisClient;

/// Serve one canned response and hand the received request back.
fn one_shot_server(status: u16, body: &'static str) -> (String, mpsc::Receiver<common::MockRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let request = common::read_request(&mut stream);
        common::respond_json(&mut stream, status, body);
        let _ = tx.send(request);
    });
    (format!("http://{addr}/detect"), rx)
}

#[test]
fn detect_posts_jpeg_and_parses_rows() {
    let (url, rx) = one_shot_server(
        200,
        r#"[[0, 0.91, 0.1, 0.1, 0.8, 0.9], [1, 0.4, 0, 0, 1, 1], [2, 0.7], "junk"]"#,
    );
    let client = MetisClient::new(&url, 2.0);
    let jpeg = b"\xFF\xD8 not really a jpeg \xFF\xD9";

    let detections = client.detect(jpeg).expect("detect");
    assert_eq!(detections.len(), 2);
    assert_eq!(detections[0].class_id, 0);
    assert!((detections[0].score - 0.91).abs() < 1e-9);

    let request = rx.recv().expect("request seen");
    assert_eq!(request.method, "POST");
    assert_eq!(request.path, "/detect");
    assert_eq!(request.headers["content-type"], "image/jpeg");
    assert_eq!(request.body, jpeg);
}

#[test]
fn detect_surfaces_http_errors() {
    let (url, _rx) = one_shot_server(500, r#"{"error":"model not loaded"}"#);
    let client = MetisClient::new(&url, 2.0);
    let err = client.detect(b"x").expect_err("500 should error");
    let message = format!("{err:#}");
    assert!(message.contains("500"), "unexpected error: {message}");
}

#[test]
fn detect_surfaces_transport_errors() {
    // Nothing listens on this port.
    let client = MetisClient::new("http://127.0.0.1:1/detect", 0.3);
    assert!(client.detect(b"x").is_err());
}

#[test]
fn detect_treats_non_array_as_empty() {
    let (url, _rx) = one_shot_server(200, r#"{"detections": "elsewhere"}"#);
    let client = MetisClient::new(&url, 2.0);
    let detections = client.detect(b"x").expect("detect");
    assert!(detections.is_empty());
}
