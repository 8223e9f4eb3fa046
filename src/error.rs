// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Error types for the packet handler and ISP pipeline.
//!
//! Only two kinds of failure leave the packet handler: protocol violations
//! (an unknown packet data type) and, when configured as fatal, line
//! overruns. Everything else in the hot path is absorbed locally.

use thiserror::Error;

/// Convenience alias for results using the library error type.
pub type Result<T> = std::result::Result<T, IspError>;

#[derive(Error, Debug)]
pub enum IspError {
    /// A packet carried a data type outside the valid MIPI range.
    #[error("unknown packet data type {data_type:#04x}")]
    UnknownPacket { data_type: u8 },

    /// More lines arrived than the sensor declared for one frame.
    #[error("frame {frame} received line {line} but sensor height is {height}")]
    LineOverrun { frame: u32, line: u32, height: u32 },

    #[error("buffer pool error: {0}")]
    Pool(#[from] PoolError),

    /// The peer task on the other end of a channel went away.
    #[error("{0} channel closed")]
    ChannelClosed(&'static str),

    #[error("sensor rejected command {command:#010x} with ack {ack:#010x}")]
    SensorNack { command: u32, ack: u32 },

    #[error("invalid image dimensions: {0}")]
    Dimensions(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Violations of the single-owner buffer handoff protocol.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PoolError {
    #[error("pool size {0} is not a non-zero power of two")]
    NotPowerOfTwo(usize),

    #[error("slot {0} is already leased to the producer")]
    AlreadyLeased(usize),

    #[error("expected slot {expected:?} back from the producer but got {got}")]
    UnexpectedSlot { expected: Option<usize>, got: usize },

    #[error("slot {0} is currently leased")]
    SlotLeased(usize),

    #[error("slot {0} is out of range")]
    InvalidSlot(usize),

    #[error("lease for slot {0} belongs to another pool")]
    ForeignLease(usize),
}
