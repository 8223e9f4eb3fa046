// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::{
    error::Result,
    frame::FrameConfig,
    handler::ReceiverLink,
    packet::{
        saturating_word_count, MipiHeader, MIPI_DT_FRAME_END, MIPI_DT_FRAME_START,
        MIPI_DT_LINE_START,
    },
};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Synthetic packet receiver producing a moving gradient test pattern.
///
/// Each frame is a frame start, `height` line packets in the expected
/// format and a frame end. Optional leading garbage exercises sync
/// acquisition and optional extra lines exercise overrun handling.
#[derive(Clone, Debug)]
pub struct TestPatternSource {
    line_bytes: usize,
    height: u32,
    format: u8,
    frames: u32,
    garbage: u32,
    extra_lines: u32,
    frame_interval: Option<Duration>,
}

impl TestPatternSource {
    pub fn new(config: &FrameConfig, frames: u32) -> Self {
        Self {
            line_bytes: config.line_bytes,
            height: config.height,
            format: config.expected_format,
            frames,
            garbage: 0,
            extra_lines: 0,
            frame_interval: None,
        }
    }

    /// Emits `count` packets from the middle of a frame before the first
    /// frame start.
    pub fn with_garbage(mut self, count: u32) -> Self {
        self.garbage = count;
        self
    }

    /// Emits `count` lines past the declared height in every frame.
    pub fn with_extra_lines(mut self, count: u32) -> Self {
        self.extra_lines = count;
        self
    }

    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = Some(interval);
        self
    }

    /// Pixel value of the pattern at `(frame, line, x)`.
    pub fn pattern(frame: u32, line: u32, x: usize) -> u8 {
        (x as u32).wrapping_add(line).wrapping_add(frame) as u8
    }

    /// Streams every packet through `link` and returns how many were sent.
    pub async fn run(self, link: ReceiverLink) -> Result<u64> {
        let mut line = vec![0u8; self.line_bytes];
        let word_count = saturating_word_count(self.line_bytes);
        if usize::from(word_count) != self.line_bytes {
            warn!(
                line_bytes = self.line_bytes,
                "line longer than a header word count, saturating"
            );
        }
        let mut sent = 0u64;

        for i in 0..self.garbage {
            let dt = match i % 3 {
                0 => self.format,
                1 => MIPI_DT_LINE_START,
                _ => MIPI_DT_FRAME_END,
            };
            send(&link, MipiHeader::new(dt, 0, 0), &[]).await?;
            sent += 1;
        }

        for frame in 0..self.frames {
            send(&link, MipiHeader::new(MIPI_DT_FRAME_START, 0, frame as u16), &[]).await?;
            for y in 0..self.height + self.extra_lines {
                for (x, px) in line.iter_mut().enumerate() {
                    *px = Self::pattern(frame, y, x);
                }
                let header = MipiHeader::new(self.format, 0, word_count);
                send(&link, header, &line).await?;
            }
            send(&link, MipiHeader::new(MIPI_DT_FRAME_END, 0, frame as u16), &[]).await?;
            sent += self.height as u64 + self.extra_lines as u64 + 2;
            debug!(frame, "test pattern frame sent");

            if let Some(interval) = self.frame_interval {
                tokio::time::sleep(interval).await;
            }
        }

        Ok(sent)
    }
}

async fn send(link: &ReceiverLink, header: MipiHeader, payload: &[u8]) -> Result<()> {
    let mut lease = link.next_buffer().await?;
    lease.packet_mut().fill(header, payload);
    trace!(slot = lease.index(), ?header, "packet received");
    link.submit(lease).await
}
