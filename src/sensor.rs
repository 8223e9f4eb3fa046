// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Sensor command channel.
//!
//! Commands travel as single 32-bit words: the command code in the top byte
//! and a 24-bit payload below it. Every command is answered by exactly one
//! acknowledgment word before the sender continues, so there is never more
//! than one command in flight.

use crate::error::{IspError, Result};
use kanal::{AsyncReceiver, AsyncSender};
use tracing::{debug, info, instrument, warn};

pub const SENSOR_STREAM_START: u32 = 0x01;
pub const SENSOR_STREAM_STOP: u32 = 0x02;

/// Acknowledgment word for an accepted command.
pub const SENSOR_ACK: u32 = 0;

/// Acknowledgment word for a command the sensor could not decode.
pub const SENSOR_NACK: u32 = u32::MAX;

const COMMAND_SHIFT: u32 = 24;
const PAYLOAD_MASK: u32 = (1 << COMMAND_SHIFT) - 1;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SensorCommand {
    /// Start streaming after `delay_ms` milliseconds.
    StreamStart { delay_ms: u32 },
    StreamStop,
}

impl SensorCommand {
    /// Packs the command into a channel word.
    ///
    /// Delays beyond the 24-bit payload saturate.
    pub fn encode(&self) -> u32 {
        match *self {
            SensorCommand::StreamStart { delay_ms } => {
                (SENSOR_STREAM_START << COMMAND_SHIFT) | delay_ms.min(PAYLOAD_MASK)
            }
            SensorCommand::StreamStop => SENSOR_STREAM_STOP << COMMAND_SHIFT,
        }
    }

    pub fn decode(word: u32) -> Option<Self> {
        match word >> COMMAND_SHIFT {
            SENSOR_STREAM_START => Some(SensorCommand::StreamStart {
                delay_ms: word & PAYLOAD_MASK,
            }),
            SENSOR_STREAM_STOP => Some(SensorCommand::StreamStop),
            _ => None,
        }
    }
}

/// Creates a connected client/server pair for sensor commands.
pub fn sensor_channel() -> (SensorClient, SensorServer) {
    let (cmd_tx, cmd_rx) = kanal::bounded_async(1);
    let (ack_tx, ack_rx) = kanal::bounded_async(1);
    (
        SensorClient { cmd_tx, ack_rx },
        SensorServer { cmd_rx, ack_tx },
    )
}

/// Sending side of the sensor command channel.
pub struct SensorClient {
    cmd_tx: AsyncSender<u32>,
    ack_rx: AsyncReceiver<u32>,
}

impl SensorClient {
    /// Sends a command and waits for its acknowledgment.
    #[instrument(skip(self))]
    pub async fn send(&self, command: SensorCommand) -> Result<u32> {
        let word = command.encode();
        self.cmd_tx
            .send(word)
            .await
            .map_err(|_| IspError::ChannelClosed("sensor command"))?;
        let ack = self
            .ack_rx
            .recv()
            .await
            .map_err(|_| IspError::ChannelClosed("sensor ack"))?;
        if ack == SENSOR_NACK {
            return Err(IspError::SensorNack { command: word, ack });
        }
        debug!(ack, "sensor acknowledged");
        Ok(ack)
    }

    pub async fn start_stream(&self, delay_ms: u32) -> Result<u32> {
        self.send(SensorCommand::StreamStart { delay_ms }).await
    }

    pub async fn stop_stream(&self) -> Result<u32> {
        self.send(SensorCommand::StreamStop).await
    }
}

/// Receiving side of the sensor command channel, owned by the sensor
/// control task.
pub struct SensorServer {
    cmd_rx: AsyncReceiver<u32>,
    ack_tx: AsyncSender<u32>,
}

impl SensorServer {
    /// Waits for the next raw command word.
    pub async fn recv(&self) -> Result<u32> {
        self.cmd_rx
            .recv()
            .await
            .map_err(|_| IspError::ChannelClosed("sensor command"))
    }

    pub async fn ack(&self, word: u32) -> Result<()> {
        self.ack_tx
            .send(word)
            .await
            .map_err(|_| IspError::ChannelClosed("sensor ack"))
    }

    /// Services commands until the client goes away.
    ///
    /// `apply` runs for each decoded command and returns the acknowledgment
    /// word. Undecodable words are answered with [`SENSOR_NACK`].
    pub async fn serve<F>(self, mut apply: F) -> Result<()>
    where
        F: FnMut(SensorCommand) -> u32,
    {
        loop {
            let word = match self.recv().await {
                Ok(w) => w,
                Err(IspError::ChannelClosed(_)) => return Ok(()),
                Err(e) => return Err(e),
            };
            let ack = match SensorCommand::decode(word) {
                Some(cmd) => apply(cmd),
                None => {
                    warn!("unknown sensor command word {:#010x}", word);
                    SENSOR_NACK
                }
            };
            self.ack(ack).await?;
        }
    }
}

/// Sensor control task for hosts without a physical sensor.
///
/// Logs every command and acknowledges it immediately.
pub async fn run_simulated_sensor(server: SensorServer) -> Result<()> {
    let mut streaming = false;
    server
        .serve(|cmd| {
            match cmd {
                SensorCommand::StreamStart { delay_ms } => {
                    info!("sensor stream start in {} ms", delay_ms);
                    streaming = true;
                }
                SensorCommand::StreamStop => {
                    if streaming {
                        debug!("sensor stream stop");
                    }
                    streaming = false;
                }
            }
            SENSOR_ACK
        })
        .await
}
