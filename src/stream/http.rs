//! HTTP frame transport.
//!
//! Supports cameras that stream multipart MJPEG over HTTP as well as plain
//! JPEG snapshot endpoints. The mode is sniffed from the Content-Type of the
//! first response: multipart keeps the connection open and scans the byte
//! stream for JPEG frame boundaries, anything else is re-fetched per frame.

use anyhow::{anyhow, Context, Result};
use std::io::Read;

use super::StreamTransport;
use crate::frame::Frame;

const MAX_JPEG_BYTES: usize = 5 * 1024 * 1024;

pub struct HttpTransport {
    url: String,
    mode: Option<HttpMode>,
}

enum HttpMode {
    Mjpeg(MjpegStream),
    SingleJpeg,
}

impl HttpTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            mode: None,
        }
    }
}

impl StreamTransport for HttpTransport {
    fn open(&mut self) -> Result<()> {
        let response = ureq::get(&self.url)
            .call()
            .context("connect to http stream")?;
        let content_type = response.header("Content-Type").unwrap_or("");
        if content_type.to_lowercase().contains("multipart") {
            let reader = response.into_reader();
            self.mode = Some(HttpMode::Mjpeg(MjpegStream::new(reader)));
        } else {
            self.mode = Some(HttpMode::SingleJpeg);
        }
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Frame> {
        let mode = self
            .mode
            .as_mut()
            .ok_or_else(|| anyhow!("http transport not open"))?;
        let jpeg = match mode {
            HttpMode::Mjpeg(stream) => stream.read_next_jpeg()?,
            HttpMode::SingleJpeg => fetch_single_jpeg(&self.url)?,
        };
        Frame::from_jpeg(&jpeg)
    }

    fn close(&mut self) {
        self.mode = None;
    }
}

struct MjpegStream {
    reader: Box<dyn Read + Send>,
    buffer: Vec<u8>,
}

impl MjpegStream {
    fn new(reader: Box<dyn Read + Send>) -> Self {
        Self {
            reader,
            buffer: Vec::with_capacity(64 * 1024),
        }
    }

    fn read_next_jpeg(&mut self) -> Result<Vec<u8>> {
        let mut chunk = vec![0u8; 8192];
        loop {
            if let Some((start, end)) = find_jpeg_bounds(&self.buffer) {
                let frame = self.buffer[start..end].to_vec();
                self.buffer.drain(..end);
                return Ok(frame);
            }

            let read = self.reader.read(&mut chunk).context("read mjpeg chunk")?;
            if read == 0 {
                return Err(anyhow!("mjpeg stream ended"));
            }
            self.buffer.extend_from_slice(&chunk[..read]);

            if self.buffer.len() > MAX_JPEG_BYTES * 2 {
                let keep = 2.min(self.buffer.len());
                let drain_len = self.buffer.len() - keep;
                self.buffer.drain(..drain_len);
            }
        }
    }
}

fn fetch_single_jpeg(url: &str) -> Result<Vec<u8>> {
    let response = ureq::get(url)
        .call()
        .with_context(|| format!("fetch jpeg snapshot from {}", url))?;
    let mut bytes = Vec::new();
    response
        .into_reader()
        .read_to_end(&mut bytes)
        .context("read jpeg snapshot")?;
    if bytes.is_empty() {
        return Err(anyhow!("empty jpeg snapshot"));
    }
    Ok(bytes)
}

fn find_jpeg_bounds(buffer: &[u8]) -> Option<(usize, usize)> {
    let mut start = None;
    let mut i = 0;
    while i + 1 < buffer.len() {
        if buffer[i] == 0xFF && buffer[i + 1] == 0xD8 {
            start = Some(i);
            break;
        }
        i += 1;
    }
    let start = start?;
    let mut j = start + 2;
    while j + 1 < buffer.len() {
        if buffer[j] == 0xFF && buffer[j + 1] == 0xD9 {
            return Some((start, j + 2));
        }
        j += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::TcpListener;

    #[test]
    fn jpeg_bounds_detection() {
        let mut data = vec![0x00, 0x01];
        data.extend_from_slice(&[0xFF, 0xD8, 0xAA, 0xBB, 0xFF, 0xD9]);
        data.extend_from_slice(&[0x02]);
        assert_eq!(find_jpeg_bounds(&data), Some((2, 8)));
        assert_eq!(find_jpeg_bounds(&[0xFF, 0xD8, 0x00]), None);
        assert_eq!(find_jpeg_bounds(&[]), None);
    }

    #[test]
    fn snapshot_endpoint_serves_frames() {
        let jpeg = Frame::new(vec![100u8; 16 * 16 * 3], 16, 16)
            .expect("frame")
            .to_jpeg()
            .expect("encode");
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        let served = jpeg.clone();
        std::thread::spawn(move || {
            // Serve two requests: one for open(), one for read_frame().
            for _ in 0..2 {
                let (mut stream, _) = listener.accept().expect("accept");
                let mut discard = [0u8; 1024];
                let _ = std::io::Read::read(&mut stream, &mut discard);
                let header = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    served.len()
                );
                stream.write_all(header.as_bytes()).expect("write header");
                stream.write_all(&served).expect("write body");
            }
        });

        let mut transport = HttpTransport::new(format!("http://{addr}/snapshot.jpg"));
        transport.open().expect("open");
        let frame = transport.read_frame().expect("read frame");
        assert_eq!((frame.width(), frame.height()), (16, 16));
        transport.close();
    }
}
