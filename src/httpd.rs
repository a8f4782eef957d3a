//! Minimal HTTP server plumbing for the health and metrics surfaces.
//!
//! Both surfaces serve a handful of GET endpoints with tiny bodies, so the
//! server is a plain `TcpListener` accept loop: non-blocking accept with a
//! shutdown flag, one short-lived thread per connection, and a fixed
//! status-line table. Request handling is deliberately quiet; per-request
//! logging is suppressed.

use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

const MAX_REQUEST_BYTES: usize = 8192;

#[derive(Debug)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    #[allow(dead_code)]
    pub headers: HashMap<String, String>,
}

#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, content_type: &'static str, body: Vec<u8>) -> Self {
        Self {
            status,
            content_type,
            body,
        }
    }

    pub fn json(status: u16, body: &serde_json::Value) -> Self {
        Self::new(status, "application/json", body.to_string().into_bytes())
    }
}

/// Handle for a spawned HTTP server. Dropping the handle leaves the server
/// running; `stop()` shuts it down (used by tests).
#[derive(Debug)]
pub struct HttpServerHandle {
    pub addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl HttpServerHandle {
    pub fn stop(mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            join.join().map_err(|_| anyhow!("http server thread panicked"))?;
        }
        Ok(())
    }
}

/// Bind `0.0.0.0:port` (port 0 picks a free port) and serve requests with
/// `handler` until the process exits or the handle is stopped.
pub fn spawn<F>(name: &'static str, port: u16, handler: F) -> Result<HttpServerHandle>
where
    F: Fn(&HttpRequest) -> HttpResponse + Send + Sync + 'static,
{
    let listener = TcpListener::bind(("0.0.0.0", port))?;
    let addr = listener.local_addr()?;
    listener.set_nonblocking(true)?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_thread = shutdown.clone();
    let handler: Arc<F> = Arc::new(handler);
    let join = std::thread::Builder::new()
        .name(format!("{name}-server"))
        .spawn(move || serve(listener, handler, shutdown_thread))?;

    Ok(HttpServerHandle {
        addr,
        shutdown,
        join: Some(join),
    })
}

fn serve<F>(listener: TcpListener, handler: Arc<F>, shutdown: Arc<AtomicBool>)
where
    F: Fn(&HttpRequest) -> HttpResponse + Send + Sync + 'static,
{
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        match listener.accept() {
            Ok((stream, _)) => {
                let handler = handler.clone();
                std::thread::spawn(move || {
                    if let Err(err) = handle_connection(stream, handler.as_ref()) {
                        log::debug!("http request failed: {:#}", err);
                    }
                });
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(50));
            }
            Err(err) => {
                log::warn!("http accept failed: {}", err);
                std::thread::sleep(Duration::from_millis(50));
            }
        }
    }
}

fn handle_connection<F>(mut stream: TcpStream, handler: &F) -> Result<()>
where
    F: Fn(&HttpRequest) -> HttpResponse,
{
    let request = read_request(&mut stream)?;
    let response = if request.method != "GET" {
        HttpResponse::json(405, &serde_json::json!({"error": "method_not_allowed"}))
    } else {
        handler(&request)
    };
    write_response(&mut stream, &response)
}

fn read_request(stream: &mut TcpStream) -> Result<HttpRequest> {
    stream.set_read_timeout(Some(Duration::from_secs(2)))?;
    let mut buf = [0u8; 1024];
    let mut data = Vec::new();
    loop {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);
        if data.len() > MAX_REQUEST_BYTES {
            return Err(anyhow!("request too large"));
        }
        if data.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }
    let text = String::from_utf8_lossy(&data);
    let mut lines = text.split("\r\n");
    let request_line = lines.next().ok_or_else(|| anyhow!("empty request"))?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().ok_or_else(|| anyhow!("missing method"))?;
    let raw_path = parts.next().ok_or_else(|| anyhow!("missing path"))?;
    let mut headers = HashMap::new();
    for line in lines {
        if line.is_empty() {
            break;
        }
        if let Some((k, v)) = line.split_once(':') {
            headers.insert(k.trim().to_lowercase(), v.trim().to_string());
        }
    }
    let path = raw_path.split('?').next().unwrap_or(raw_path).to_string();
    Ok(HttpRequest {
        method: method.to_string(),
        path,
        headers,
    })
}

fn write_response(stream: &mut TcpStream, response: &HttpResponse) -> Result<()> {
    let status_line = match response.status {
        200 => "HTTP/1.1 200 OK",
        404 => "HTTP/1.1 404 Not Found",
        405 => "HTTP/1.1 405 Method Not Allowed",
        503 => "HTTP/1.1 503 Service Unavailable",
        _ => "HTTP/1.1 500 Internal Server Error",
    };
    let header = format!(
        "{status_line}\r\nContent-Type: {content_type}\r\nContent-Length: {len}\r\nCache-Control: no-store\r\nConnection: close\r\n\r\n",
        status_line = status_line,
        content_type = response.content_type,
        len = response.body.len()
    );
    stream.write_all(header.as_bytes())?;
    stream.write_all(&response.body)?;
    Ok(())
}
