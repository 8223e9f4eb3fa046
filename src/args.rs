// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::{
    frame::{FrameConfig, OverrunPolicy},
    handler::PIPELINE_TIME_MS,
    packet::DATA_TYPE_RESERVED,
    pool::DEFAULT_POOL_SIZE,
};
use clap::Parser;
use std::path::PathBuf;

/// Handling of frames that carry more lines than the sensor height.
#[derive(clap::ValueEnum, Clone, Debug, PartialEq, Copy)]
pub enum OverrunSetting {
    /// Log and count the extra lines, keep streaming
    Ignore,
    /// Stop the packet handler with an error
    Fatal,
}

impl From<OverrunSetting> for OverrunPolicy {
    fn from(value: OverrunSetting) -> Self {
        match value {
            OverrunSetting::Ignore => OverrunPolicy::Ignore,
            OverrunSetting::Fatal => OverrunPolicy::Fatal,
        }
    }
}

/// Command-line arguments for the EdgeFirst ISP packet handler.
///
/// Arguments can be specified via command line or environment variables.
///
/// # Example
///
/// ```bash
/// # Via command line
/// edgefirst-isp --sensor-size "640 480" --capture-ms 500 --output capture.bin
///
/// # Via environment variables
/// export SENSOR_SIZE="800 480"
/// export LINE_FORMAT=0x1E
/// export BYTES_PER_PIXEL=2
/// edgefirst-isp
/// ```
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Sensor image resolution in pixels (width height)
    #[arg(
        long,
        env = "SENSOR_SIZE",
        default_value = "640 480",
        value_delimiter = ' ',
        num_args = 2
    )]
    pub sensor_size: Vec<u32>,

    /// Bytes per pixel of the line format
    #[arg(long, env = "BYTES_PER_PIXEL", default_value = "1")]
    pub bytes_per_pixel: u32,

    /// MIPI data type of image lines (0x2A RAW8, 0x2B RAW10, 0x1E YUV422,
    /// 0x24 RGB888)
    #[arg(long, env = "LINE_FORMAT", default_value = "0x2A", value_parser = parse_data_type)]
    pub line_format: u8,

    /// Number of packet buffers shared with the receiver (power of two)
    #[arg(long, env = "PACKET_BUFFERS", default_value_t = DEFAULT_POOL_SIZE)]
    pub packet_buffers: usize,

    /// Pipeline latency subtracted from capture requests in milliseconds
    #[arg(long, env = "PIPELINE_TIME_MS", default_value_t = PIPELINE_TIME_MS)]
    pub pipeline_ms: u32,

    /// Handling of frames with more lines than the sensor height
    #[arg(long, env = "OVERRUN", default_value = "ignore", value_enum)]
    pub overrun: OverrunSetting,

    /// Capture requests in milliseconds from now (can specify multiple)
    #[arg(long, env = "CAPTURE_MS", value_delimiter = ' ')]
    pub capture_ms: Vec<u32>,

    /// Number of frames produced by the test pattern receiver
    #[arg(long, env = "FRAMES", default_value = "30")]
    pub frames: u32,

    /// Delay between test pattern frames in milliseconds
    #[arg(long, env = "FRAME_INTERVAL_MS", default_value = "33")]
    pub frame_interval_ms: u64,

    /// Write every completed frame as raw bytes, suffixed by frame number
    #[arg(short, long, env = "OUTPUT")]
    pub output: Option<PathBuf>,

    /// Apply gamma 1.8 to saved frames
    #[arg(long, env = "GAMMA")]
    pub gamma: bool,

    /// Resize saved frames to this resolution (width height)
    #[arg(long, env = "OUTPUT_SIZE", value_delimiter = ' ', num_args = 2)]
    pub output_size: Option<Vec<usize>>,

    /// Rotate saved frames 90 degrees clockwise
    #[arg(long, env = "ROTATE")]
    pub rotate: bool,

    /// Enable verbose debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Enable Tokio async runtime console for debugging
    #[arg(long, env = "TOKIO_CONSOLE")]
    pub tokio_console: bool,

    /// Enable Tracy profiler for performance analysis
    #[arg(long, env = "TRACY")]
    pub tracy: bool,
}

fn parse_data_type(s: &str) -> Result<u8, String> {
    let value = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse::<u8>(),
    }
    .map_err(|e| format!("invalid data type '{s}': {e}"))?;

    if value >= DATA_TYPE_RESERVED {
        return Err(format!(
            "data type {value:#04x} is outside the valid range 0x00-0x3E"
        ));
    }
    Ok(value)
}

impl From<&Args> for FrameConfig {
    fn from(args: &Args) -> Self {
        let width = args.sensor_size[0];
        let height = args.sensor_size[1];
        FrameConfig {
            width,
            height,
            line_bytes: width as usize * args.bytes_per_pixel as usize,
            expected_format: args.line_format,
            overrun: args.overrun.into(),
            assemble: args.output.is_some(),
        }
    }
}
