//! RTSP frame transport using FFmpeg (feature: rtsp-ffmpeg).
//!
//! The transport protocol (TCP or UDP) comes from the `RTSP_TRANSPORT`
//! environment variable, defaulting to TCP. Frames are scaled to RGB24.

use anyhow::{Context, Result};
use ffmpeg_next as ffmpeg;

use super::StreamTransport;
use crate::frame::Frame;

pub(crate) struct RtspTransport {
    url: String,
    session: Option<RtspSession>,
}

struct RtspSession {
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
}

impl RtspTransport {
    pub(crate) fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            session: None,
        }
    }
}

impl StreamTransport for RtspTransport {
    fn open(&mut self) -> Result<()> {
        self.session = Some(RtspSession::open(&self.url)?);
        log::info!("RtspTransport: connected to {} (ffmpeg)", self.url);
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Frame> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("rtsp transport not open"))?;
        session.next_frame()
    }

    fn close(&mut self) {
        self.session = None;
    }
}

impl RtspSession {
    fn open(url: &str) -> Result<Self> {
        ffmpeg::init().context("initialize ffmpeg")?;

        let mut options = ffmpeg::Dictionary::new();
        options.set("rtsp_transport", &rtsp_transport_setting());
        let input = ffmpeg::format::input_with_dictionary(&url, options)
            .with_context(|| format!("failed to open rtsp stream '{}' with ffmpeg", url))?;
        let input_stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| anyhow::anyhow!("rtsp stream has no video track"))?;
        let stream_index = input_stream.index();
        let context = ffmpeg::codec::context::Context::from_parameters(input_stream.parameters())
            .context("load video decoder parameters")?;
        let decoder = context
            .decoder()
            .video()
            .context("open ffmpeg video decoder")?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::util::format::pixel::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("create ffmpeg scaler")?;

        Ok(Self {
            input,
            stream_index,
            decoder,
            scaler,
        })
    }

    fn next_frame(&mut self) -> Result<Frame> {
        let mut decoded = ffmpeg::frame::Video::empty();
        let mut rgb_frame = ffmpeg::frame::Video::empty();

        for (stream, packet) in self.input.packets() {
            if stream.index() != self.stream_index {
                continue;
            }

            self.decoder
                .send_packet(&packet)
                .context("send packet to ffmpeg decoder")?;

            while self.decoder.receive_frame(&mut decoded).is_ok() {
                self.scaler
                    .run(&decoded, &mut rgb_frame)
                    .context("scale frame to RGB")?;
                return frame_to_pixels(&rgb_frame);
            }
        }

        anyhow::bail!("rtsp stream ended without frames")
    }
}

fn rtsp_transport_setting() -> String {
    let transport = std::env::var("RTSP_TRANSPORT")
        .unwrap_or_default()
        .trim()
        .to_lowercase();
    match transport.as_str() {
        "udp" => "udp".to_string(),
        _ => "tcp".to_string(),
    }
}

fn frame_to_pixels(frame: &ffmpeg::frame::Video) -> Result<Frame> {
    let width = frame.width();
    let height = frame.height();
    let row_bytes = (width as usize) * 3;
    let stride = frame.stride(0);
    let data = frame.data(0);

    if stride == row_bytes {
        return Frame::new(data.to_vec(), width, height);
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let end = start + row_bytes;
        pixels.extend_from_slice(
            data.get(start..end)
                .context("ffmpeg frame row is out of bounds")?,
        );
    }

    Frame::new(pixels, width, height)
}
