//! Synthetic frame transport for development and tests.
//!
//! Generates deterministic RGB patterns with an occasional "scene change" so
//! downstream consumers see varying content. Only reachable through
//! `stub://` URLs, which are rejected outside dev/test builds.

use anyhow::{anyhow, Result};

use super::StreamTransport;
use crate::frame::Frame;

const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;
const SCENE_CHANGE_EVERY: u64 = 50;

pub struct StubTransport {
    width: u32,
    height: u32,
    frame_count: u64,
    scene_state: u8,
}

impl StubTransport {
    /// Parse a `stub://` URL. An optional `WxH` suffix sets the frame size,
    /// e.g. `stub://320x240`.
    pub fn parse(stream_url: &str) -> Result<Self> {
        let rest = stream_url
            .strip_prefix("stub://")
            .ok_or_else(|| anyhow!("not a stub:// url: '{}'", stream_url))?;
        let (width, height) = if rest.is_empty() {
            (DEFAULT_WIDTH, DEFAULT_HEIGHT)
        } else {
            let (w, h) = rest
                .split_once('x')
                .ok_or_else(|| anyhow!("stub url dimensions must look like WxH: '{}'", rest))?;
            let width: u32 = w
                .parse()
                .map_err(|_| anyhow!("invalid stub width '{}'", w))?;
            let height: u32 = h
                .parse()
                .map_err(|_| anyhow!("invalid stub height '{}'", h))?;
            if width == 0 || height == 0 {
                return Err(anyhow!("stub dimensions must be non-zero"));
            }
            (width, height)
        };
        Ok(Self {
            width,
            height,
            frame_count: 0,
            scene_state: 0,
        })
    }
}

impl StreamTransport for StubTransport {
    fn open(&mut self) -> Result<()> {
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Frame> {
        self.frame_count += 1;
        if self.frame_count % SCENE_CHANGE_EVERY == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }
        let pixel_count = (self.width * self.height * 3) as usize;
        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.frame_count + u64::from(self.scene_state)) % 256) as u8;
        }
        Frame::new(pixels, self.width, self.height)
    }

    fn close(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dimensions() {
        let stub = StubTransport::parse("stub://320x240").expect("parse");
        assert_eq!((stub.width, stub.height), (320, 240));
        let stub = StubTransport::parse("stub://").expect("parse");
        assert_eq!((stub.width, stub.height), (DEFAULT_WIDTH, DEFAULT_HEIGHT));
        assert!(StubTransport::parse("stub://wide").is_err());
        assert!(StubTransport::parse("stub://0x0").is_err());
    }

    #[test]
    fn frames_vary_between_reads() {
        let mut stub = StubTransport::parse("stub://16x16").expect("parse");
        stub.open().expect("open");
        let a = stub.read_frame().expect("frame");
        let b = stub.read_frame().expect("frame");
        assert_ne!(a.pixels(), b.pixels());
    }
}
