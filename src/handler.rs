// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Reactive packet handler.
//!
//! One task multiplexes two inputs: filled packet buffers coming back from
//! the receiver and capture requests from the user application. Whichever
//! is ready first is serviced to completion before waiting again.
//!
//! Both select inputs are tokio mpsc receivers: `recv` on them is cancel
//! safe, so the branch that loses a race never swallows a buffer or a
//! request.

use crate::{
    error::{IspError, Result},
    frame::{FrameState, FrameStateMachine},
    pool::{BufferPool, PacketLease},
    sensor::SensorClient,
};
use kanal::{AsyncReceiver, AsyncSender};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Time from the start command to the first pixel leaving the pipeline.
pub const PIPELINE_TIME_MS: u32 = 100;

/// Creates the buffer exchange between the handler and a packet receiver.
pub fn packet_link() -> (HandlerLink, ReceiverLink) {
    let (free_tx, free_rx) = kanal::bounded_async(1);
    let (filled_tx, filled_rx) = mpsc::channel(1);
    (
        HandlerLink { free_tx, filled_rx },
        ReceiverLink { free_rx, filled_tx },
    )
}

/// Handler end of the packet link.
pub struct HandlerLink {
    free_tx: AsyncSender<PacketLease>,
    filled_rx: mpsc::Receiver<PacketLease>,
}

/// Receiver end of the packet link.
///
/// The receiver waits for an empty buffer, fills it with one packet and
/// submits it back. It never holds more than one buffer.
pub struct ReceiverLink {
    free_rx: AsyncReceiver<PacketLease>,
    filled_tx: mpsc::Sender<PacketLease>,
}

impl ReceiverLink {
    pub async fn next_buffer(&self) -> Result<PacketLease> {
        self.free_rx
            .recv()
            .await
            .map_err(|_| IspError::ChannelClosed("packet free"))
    }

    pub async fn submit(&self, lease: PacketLease) -> Result<()> {
        self.filled_tx
            .send(lease)
            .await
            .map_err(|_| IspError::ChannelClosed("packet filled"))
    }
}

/// Creates the channel carrying user capture requests, in milliseconds
/// from now.
pub fn capture_request_channel() -> (mpsc::Sender<u32>, mpsc::Receiver<u32>) {
    mpsc::channel(1)
}

/// Delay to request from the sensor so the capture lands `requested_ms`
/// from now. Requests shorter than the pipeline latency start immediately.
pub fn capture_delay(requested_ms: u32, pipeline_ms: u32) -> u32 {
    requested_ms.saturating_sub(pipeline_ms)
}

/// Final counters reported when the handler stops.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct HandlerSummary {
    pub state: FrameState,
    pub packets: u64,
    pub overruns: u64,
    pub captures: u64,
}

pub struct PacketHandler {
    pool: BufferPool,
    fsm: FrameStateMachine,
    sensor: SensorClient,
    pipeline_ms: u32,
    packets: u64,
    captures: u64,
}

impl PacketHandler {
    pub fn new(pool: BufferPool, fsm: FrameStateMachine, sensor: SensorClient) -> Self {
        Self {
            pool,
            fsm,
            sensor,
            pipeline_ms: PIPELINE_TIME_MS,
            packets: 0,
            captures: 0,
        }
    }

    pub fn with_pipeline_time(mut self, pipeline_ms: u32) -> Self {
        self.pipeline_ms = pipeline_ms;
        self
    }

    pub fn frame_state(&self) -> FrameState {
        self.fsm.state()
    }

    /// Forwards a user capture request to the sensor, compensating for the
    /// pipeline latency, and waits for the acknowledgment.
    pub async fn request_capture(&mut self, requested_ms: u32) -> Result<u32> {
        let delay = capture_delay(requested_ms, self.pipeline_ms);
        if requested_ms < self.pipeline_ms {
            warn!(
                requested_ms,
                pipeline_ms = self.pipeline_ms,
                "capture requested sooner than the pipeline latency"
            );
        }
        info!(
            "user asked: {} ms, pipeline time: {} ms, starting in {} ms",
            requested_ms, self.pipeline_ms, delay
        );
        self.sensor.start_stream(delay).await?;
        self.captures += 1;
        Ok(delay)
    }

    /// Runs until the packet receiver goes away or a fatal error occurs.
    ///
    /// The next free buffer is published to the receiver before the packet
    /// just received is interpreted, so the receiver never waits on the
    /// handler for somewhere to write.
    pub async fn run(
        mut self,
        mut link: HandlerLink,
        mut requests: mpsc::Receiver<u32>,
    ) -> Result<HandlerSummary> {
        let first = self.pool.lease()?;
        link.free_tx
            .send(first)
            .await
            .map_err(|_| IspError::ChannelClosed("packet free"))?;

        let mut requests_open = true;
        loop {
            tokio::select! {
                filled = link.filled_rx.recv() => {
                    let Some(lease) = filled else {
                        debug!("packet receiver closed");
                        break;
                    };
                    let index = self.pool.complete(lease)?;
                    let next = self.pool.lease()?;
                    let receiver_gone = link.free_tx.send(next).await.is_err();

                    let packet = self.pool.buffer_at(index)?;
                    self.fsm.handle_packet(packet, &self.sensor).await?;
                    self.packets += 1;

                    if receiver_gone {
                        debug!("packet receiver closed");
                        break;
                    }
                }
                request = requests.recv(), if requests_open => {
                    match request {
                        Some(ms) => {
                            self.request_capture(ms).await?;
                        }
                        None => {
                            debug!("capture request channel closed");
                            requests_open = false;
                        }
                    }
                }
            }
        }

        Ok(self.summary())
    }

    fn summary(&self) -> HandlerSummary {
        HandlerSummary {
            state: self.fsm.state(),
            packets: self.packets,
            overruns: self.fsm.overruns(),
            captures: self.captures,
        }
    }
}
