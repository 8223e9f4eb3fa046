// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use clap::Parser;
use edgefirst_isp::{
    args::Args,
    frame::{Frame, FrameConfig, FrameStateMachine},
    handler::{capture_request_channel, packet_link, PacketHandler},
    image::{gamma_correct, write_image, Image},
    packet::max_packet_size,
    pool::BufferPool,
    sensor::{run_simulated_sensor, sensor_channel},
    source::TestPatternSource,
};
use kanal::AsyncReceiver;
use std::{
    error::Error,
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::{error, info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, Layer};

fn init_tracing(args: &Args) -> Result<(), Box<dyn Error>> {
    let level = if args.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    let stdout_log = tracing_subscriber::fmt::layer().with_filter(level);

    let journald = match tracing_journald::layer() {
        Ok(journald) => Some(journald.with_filter(level)),
        Err(_) => None,
    };

    let console = if args.tokio_console {
        Some(console_subscriber::spawn())
    } else {
        None
    };

    let tracy = if args.tracy {
        let _ = tracy_client::Client::start();
        Some(
            tracing_tracy::TracyLayer::new(tracing_tracy::DefaultConfig::default())
                .with_filter(LevelFilter::TRACE),
        )
    } else {
        None
    };

    let subscriber = tracing_subscriber::registry()
        .with(console)
        .with(stdout_log)
        .with(journald)
        .with(tracy);

    tracing_log::LogTracer::init()?;
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_tracing(&args)?;

    info!("EdgeFirst ISP Packet Handler");

    let config = FrameConfig::from(&args);
    if config.width == 0 || config.height == 0 {
        return Err(Box::from("sensor size must be non-zero"));
    }

    let pool = BufferPool::new(args.packet_buffers, max_packet_size(config.line_bytes))?;
    let mut fsm = FrameStateMachine::new(config.clone());

    let (frame_tx, frame_rx) = kanal::bounded_async(2);
    let writer = match args.output.clone() {
        Some(path) => {
            fsm.set_frame_sink(frame_tx);
            Some(tokio::spawn(save_frames(frame_rx, path, args.clone())))
        }
        None => None,
    };

    let (sensor, sensor_server) = sensor_channel();
    let (link, receiver) = packet_link();
    let (request_tx, request_rx) = capture_request_channel();

    let sensor_task = tokio::spawn(run_simulated_sensor(sensor_server));

    let source = TestPatternSource::new(&config, args.frames)
        .with_frame_interval(Duration::from_millis(args.frame_interval_ms));
    let source_task = tokio::spawn(source.run(receiver));

    let requests = args.capture_ms.clone();
    tokio::spawn(async move {
        for ms in requests {
            if request_tx.send(ms).await.is_err() {
                break;
            }
        }
    });

    let handler = PacketHandler::new(pool, fsm, sensor).with_pipeline_time(args.pipeline_ms);
    let summary = match handler.run(link, request_rx).await {
        Ok(summary) => summary,
        Err(e) => {
            error!("packet handler stopped: {}", e);
            return Err(e.into());
        }
    };

    info!(
        "frames: {} packets: {} overruns: {} captures: {}",
        summary.state.frame_number, summary.packets, summary.overruns, summary.captures
    );

    let sent = source_task.await??;
    if sent != summary.packets {
        warn!("receiver sent {} packets, handled {}", sent, summary.packets);
    }
    sensor_task.await??;
    if let Some(writer) = writer {
        writer.await??;
    }

    Ok(())
}

fn frame_path(path: &Path, number: u32) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "frame".to_string());
    let name = match path.extension() {
        Some(ext) => format!("{}_{:04}.{}", stem, number, ext.to_string_lossy()),
        None => format!("{}_{:04}", stem, number),
    };
    path.with_file_name(name)
}

async fn save_frames(
    rx: AsyncReceiver<Frame>,
    path: PathBuf,
    args: Args,
) -> Result<(), edgefirst_isp::IspError> {
    while let Ok(frame) = rx.recv().await {
        let channels = frame.line_bytes / frame.width.max(1) as usize;
        let mut img = Image::from_vec(
            frame.data,
            frame.width as usize,
            frame.height as usize,
            channels.max(1),
        )?;

        if args.gamma {
            gamma_correct(img.as_slice_mut());
        }
        if let Some(size) = &args.output_size {
            img = img.resize(size[0], size[1])?;
        }
        if args.rotate {
            img = img.rotate90()?;
        }

        let out = frame_path(&path, frame.number);
        write_image(
            &out,
            img.as_slice(),
            img.height(),
            img.width(),
            img.channels(),
        )?;
        info!("saved {} {} lines: {}", out.display(), img, frame.lines);
    }
    Ok(())
}
