// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::{
    error::{IspError, Result},
    packet::{Packet, PacketKind, MIPI_DT_FRAME_START, MIPI_DT_RAW8},
    sensor::SensorClient,
};
use kanal::AsyncSender;
use tracing::{debug, info, trace, warn};

/// What to do when a frame carries more lines than the sensor declared.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum OverrunPolicy {
    /// Count and log the overrun, keep processing. The next frame start
    /// resynchronizes the line counters.
    #[default]
    Ignore,
    /// Treat the overrun as fatal.
    Fatal,
}

/// Static description of the stream the sensor was configured for.
#[derive(Clone, Debug)]
pub struct FrameConfig {
    /// Image width in pixels
    pub width: u32,
    /// Declared image height in lines
    pub height: u32,
    /// Bytes of pixel data per line
    pub line_bytes: usize,
    /// MIPI data type of the image lines
    pub expected_format: u8,
    pub overrun: OverrunPolicy,
    /// Copy line payloads into a frame buffer and emit completed frames.
    pub assemble: bool,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            line_bytes: 640,
            expected_format: MIPI_DT_RAW8,
            overrun: OverrunPolicy::Ignore,
            assemble: false,
        }
    }
}

impl FrameConfig {
    pub fn frame_bytes(&self) -> usize {
        self.line_bytes * self.height as usize
    }
}

/// Frame and line progress of the packet stream.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FrameState {
    pub waiting_for_frame_start: bool,
    pub frame_number: u32,
    pub in_line_number: u32,
    pub out_line_number: u32,
}

impl Default for FrameState {
    fn default() -> Self {
        Self {
            waiting_for_frame_start: true,
            frame_number: 0,
            in_line_number: 0,
            out_line_number: 0,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SyncState {
    AcquiringSync,
    Synced,
}

impl FrameState {
    pub fn sync_state(&self) -> SyncState {
        if self.waiting_for_frame_start {
            SyncState::AcquiringSync
        } else {
            SyncState::Synced
        }
    }
}

/// Result of feeding one packet to the state machine.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FrameEvent {
    /// Dropped while waiting for the first frame start.
    Discarded,
    /// A new frame began; carries the new frame number.
    FrameStart(u32),
    /// An image line arrived; carries the running line count.
    Line(u32),
    /// The current frame ended.
    FrameEnd(u32),
    /// A valid packet type this pipeline does not interpret.
    Ignored(u8),
}

/// A frame reassembled from its line packets.
#[derive(Clone, Debug)]
pub struct Frame {
    pub number: u32,
    pub width: u32,
    pub height: u32,
    pub line_bytes: usize,
    /// Lines actually stored, at most `height`
    pub lines: u32,
    pub data: Vec<u8>,
}

/// Classifies packets and tracks frame/line progress.
///
/// The machine starts out acquiring sync: everything before the first frame
/// start is dropped. Frame start is the only transition that resets the
/// line counters and the frame number only ever increases.
pub struct FrameStateMachine {
    config: FrameConfig,
    state: FrameState,
    overruns: u64,
    assembly: Option<Vec<u8>>,
    frame_sink: Option<AsyncSender<Frame>>,
    // set by frame start, cleared when the frame is emitted
    frame_open: bool,
}

impl FrameStateMachine {
    pub fn new(config: FrameConfig) -> Self {
        let assembly = config.assemble.then(|| vec![0; config.frame_bytes()]);
        Self {
            config,
            state: FrameState::default(),
            overruns: 0,
            assembly,
            frame_sink: None,
            frame_open: false,
        }
    }

    /// Completed frames are offered to `sink` on every frame end.
    ///
    /// Has no effect unless the config enables assembly.
    pub fn set_frame_sink(&mut self, sink: AsyncSender<Frame>) {
        self.frame_sink = Some(sink);
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    /// Total lines received past the declared height.
    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    /// Applies one packet to the frame state without any I/O.
    pub fn update(&mut self, packet: &Packet) -> Result<FrameEvent> {
        let data_type = packet.data_type();

        if self.state.waiting_for_frame_start && data_type != MIPI_DT_FRAME_START {
            trace!(data_type, "waiting for frame start");
            return Ok(FrameEvent::Discarded);
        }

        match PacketKind::classify(data_type, self.config.expected_format)? {
            PacketKind::FrameStart => {
                self.state.waiting_for_frame_start = false;
                self.state.in_line_number = 0;
                self.state.out_line_number = 0;
                self.state.frame_number = self.state.frame_number.wrapping_add(1);
                self.frame_open = true;
                if let Some(buf) = self.assembly.as_mut() {
                    buf.fill(0);
                }
                debug!(frame = self.state.frame_number, "SOF");
                Ok(FrameEvent::FrameStart(self.state.frame_number))
            }
            PacketKind::ExpectedLine => {
                self.check_overrun()?;
                self.store_line(packet);
                self.state.in_line_number = self.state.in_line_number.saturating_add(1);
                trace!(line = self.state.in_line_number, "line");
                Ok(FrameEvent::Line(self.state.in_line_number))
            }
            PacketKind::FrameEnd => {
                debug!(
                    frame = self.state.frame_number,
                    lines = self.state.in_line_number,
                    "EOF"
                );
                Ok(FrameEvent::FrameEnd(self.state.frame_number))
            }
            PacketKind::Other(data_type) => {
                trace!(data_type, "ignored packet");
                Ok(FrameEvent::Ignored(data_type))
            }
        }
    }

    /// Applies one packet and performs the sensor I/O it calls for.
    ///
    /// A frame end stops the sensor stream and waits for the
    /// acknowledgment before any further packet is handled.
    pub async fn handle_packet(
        &mut self,
        packet: &Packet,
        sensor: &SensorClient,
    ) -> Result<FrameEvent> {
        let event = self.update(packet)?;
        if let FrameEvent::FrameEnd(_) = event {
            sensor.stop_stream().await?;
            self.emit_frame();
        }
        Ok(event)
    }

    fn check_overrun(&mut self) -> Result<()> {
        if self.state.in_line_number < self.config.height {
            return Ok(());
        }
        self.overruns += 1;
        match self.config.overrun {
            OverrunPolicy::Fatal => Err(IspError::LineOverrun {
                frame: self.state.frame_number,
                line: self.state.in_line_number + 1,
                height: self.config.height,
            }),
            OverrunPolicy::Ignore => {
                if self.state.in_line_number == self.config.height {
                    warn!(
                        frame = self.state.frame_number,
                        height = self.config.height,
                        "received more lines than expected"
                    );
                }
                Ok(())
            }
        }
    }

    fn store_line(&mut self, packet: &Packet) {
        let Some(buf) = self.assembly.as_mut() else {
            return;
        };
        if self.state.in_line_number >= self.config.height {
            return;
        }
        let line_bytes = self.config.line_bytes;
        let offset = self.state.in_line_number as usize * line_bytes;
        let payload = packet.payload();
        let n = payload.len().min(line_bytes);
        buf[offset..offset + n].copy_from_slice(&payload[..n]);
        self.state.out_line_number += 1;
    }

    /// Emits at most one frame per frame start. A repeated frame end is
    /// not a new frame.
    fn emit_frame(&mut self) {
        if !std::mem::replace(&mut self.frame_open, false) {
            trace!(frame = self.state.frame_number, "no open frame to emit");
            return;
        }
        let (Some(buf), Some(sink)) = (self.assembly.as_mut(), self.frame_sink.as_ref()) else {
            return;
        };
        let frame = Frame {
            number: self.state.frame_number,
            width: self.config.width,
            height: self.config.height,
            line_bytes: self.config.line_bytes,
            lines: self.state.out_line_number,
            data: std::mem::replace(buf, vec![0; self.config.frame_bytes()]),
        };
        match sink.try_send(frame) {
            Ok(true) => info!(frame = self.state.frame_number, "frame complete"),
            Ok(false) => warn!(frame = self.state.frame_number, "frame sink full, dropped"),
            Err(_) => {
                debug!("frame sink closed");
                self.frame_sink = None;
            }
        }
    }
}
