// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! # EdgeFirst ISP Library
//!
//! This library provides the MIPI packet handling and image signal
//! processing core for the EdgeFirst ISP pipeline. It consumes a continuous
//! stream of sensor packets from a receiver, keeps frame and line
//! synchronization using a small fixed pool of reusable packet buffers, and
//! drives the sensor start/stop commands.
//!
//! ## Features
//!
//! - **Frame State Machine**: Acquires sync on the first frame start, tracks
//!   frame and line counters and reassembles lines into frames.
//! - **Buffer Pool**: Fixed ring of packet buffers with a checked
//!   single-owner handoff to the receiver.
//! - **Auto Exposure**: Secant-method exposure search driven by histogram
//!   skewness, restarted periodically.
//! - **Auto White Balance**: Per-channel gains from histogram percentiles.
//! - **Pixel Transforms**: Gamma 1.8, bilinear resize, 90 degree rotation
//!   and color conversions on CPU buffers.
//!
//! ## Example
//!
//! ```no_run
//! use edgefirst_isp::{
//!     frame::{FrameConfig, FrameStateMachine},
//!     handler::{capture_request_channel, packet_link, PacketHandler},
//!     packet::max_packet_size,
//!     pool::BufferPool,
//!     sensor::{run_simulated_sensor, sensor_channel},
//!     source::TestPatternSource,
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = FrameConfig::default();
//! let pool = BufferPool::new(4, max_packet_size(config.line_bytes))?;
//! let (sensor, server) = sensor_channel();
//! let (link, receiver) = packet_link();
//! let (_requests, request_rx) = capture_request_channel();
//!
//! tokio::spawn(run_simulated_sensor(server));
//! tokio::spawn(TestPatternSource::new(&config, 10).run(receiver));
//!
//! let handler = PacketHandler::new(pool, FrameStateMachine::new(config), sensor);
//! let summary = handler.run(link, request_rx).await?;
//! assert_eq!(summary.state.frame_number, 10);
//! # Ok(())
//! # }
//! ```

pub mod args;
pub mod error;
pub mod frame;
pub mod handler;
pub mod image;
pub mod isp;
pub mod packet;
pub mod pool;
pub mod sensor;
pub mod source;

pub use error::{IspError, PoolError};
