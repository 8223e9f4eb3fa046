// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use edgefirst_isp::{
    error::{IspError, PoolError},
    frame::{FrameConfig, FrameEvent, FrameStateMachine, OverrunPolicy, SyncState},
    packet::{
        saturating_word_count, MipiHeader, Packet, PacketKind, MIPI_DT_FRAME_END,
        MIPI_DT_FRAME_START, MIPI_DT_LINE_START, MIPI_DT_RAW8, MIPI_DT_YUV422_8BIT,
    },
    pool::BufferPool,
};
use std::error::Error;

fn packet(data_type: u8, payload: &[u8]) -> Packet {
    let mut pkt = Packet::with_capacity(16);
    pkt.fill(MipiHeader::new(data_type, 0, payload.len() as u16), payload);
    pkt
}

fn small_config(overrun: OverrunPolicy) -> FrameConfig {
    FrameConfig {
        width: 4,
        height: 2,
        line_bytes: 4,
        expected_format: MIPI_DT_RAW8,
        overrun,
        assemble: true,
    }
}

#[test]
fn test_header_fields() {
    let header = MipiHeader::new(MIPI_DT_RAW8, 1, 644);
    assert_eq!(header.data_type(), MIPI_DT_RAW8);
    assert_eq!(header.virtual_channel(), 1);
    assert_eq!(header.word_count(), 644);

    // only the low 6 bits carry the data type
    let header = MipiHeader(0xFFFF_FFFF);
    assert_eq!(header.data_type(), 0x3F);
}

#[test]
fn test_word_count_saturates() {
    assert_eq!(saturating_word_count(644), 644);
    assert_eq!(saturating_word_count(65_535), u16::MAX);
    assert_eq!(saturating_word_count(70_000), u16::MAX);

    let header = MipiHeader::new(MIPI_DT_RAW8, 0, saturating_word_count(70_000));
    assert_eq!(header.data_type(), MIPI_DT_RAW8);
    assert_eq!(header.word_count(), u16::MAX);
}

#[test]
fn test_packet_fill_truncates() {
    let mut pkt = Packet::with_capacity(4);
    let kept = pkt.fill(MipiHeader::new(MIPI_DT_RAW8, 0, 6), &[1, 2, 3, 4, 5, 6]);
    assert_eq!(kept, 4);
    assert_eq!(pkt.payload(), &[1, 2, 3, 4]);

    pkt.fill_short(MIPI_DT_FRAME_END, 7);
    assert!(pkt.is_empty());
    assert_eq!(pkt.header().word_count(), 7);
}

#[test]
fn test_classify() -> Result<(), Box<dyn Error>> {
    assert_eq!(
        PacketKind::classify(MIPI_DT_FRAME_START, MIPI_DT_RAW8)?,
        PacketKind::FrameStart
    );
    assert_eq!(
        PacketKind::classify(MIPI_DT_FRAME_END, MIPI_DT_RAW8)?,
        PacketKind::FrameEnd
    );
    assert_eq!(
        PacketKind::classify(MIPI_DT_RAW8, MIPI_DT_RAW8)?,
        PacketKind::ExpectedLine
    );
    assert_eq!(
        PacketKind::classify(MIPI_DT_RAW8, MIPI_DT_YUV422_8BIT)?,
        PacketKind::Other(MIPI_DT_RAW8)
    );
    assert!(matches!(
        PacketKind::classify(0x3F, MIPI_DT_RAW8),
        Err(IspError::UnknownPacket { data_type: 0x3F })
    ));
    assert!(PacketKind::classify(0x40, MIPI_DT_RAW8).is_err());
    Ok(())
}

#[test]
fn test_discard_until_frame_start() -> Result<(), Box<dyn Error>> {
    let mut fsm = FrameStateMachine::new(small_config(OverrunPolicy::Ignore));
    assert_eq!(fsm.state().sync_state(), SyncState::AcquiringSync);

    for dt in [MIPI_DT_RAW8, MIPI_DT_FRAME_END, MIPI_DT_LINE_START, 0x3F] {
        assert_eq!(fsm.update(&packet(dt, &[1, 2]))?, FrameEvent::Discarded);
    }
    let state = fsm.state();
    assert!(state.waiting_for_frame_start);
    assert_eq!(state.frame_number, 0);
    assert_eq!(state.in_line_number, 0);

    assert_eq!(
        fsm.update(&packet(MIPI_DT_FRAME_START, &[]))?,
        FrameEvent::FrameStart(1)
    );
    assert_eq!(fsm.state().sync_state(), SyncState::Synced);
    Ok(())
}

#[test]
fn test_frame_start_resets_counters() -> Result<(), Box<dyn Error>> {
    let mut fsm = FrameStateMachine::new(small_config(OverrunPolicy::Ignore));

    // garbage before sync does not count towards anything
    fsm.update(&packet(MIPI_DT_RAW8, &[0; 4]))?;

    for frame in 1..=5u32 {
        assert_eq!(
            fsm.update(&packet(MIPI_DT_FRAME_START, &[]))?,
            FrameEvent::FrameStart(frame)
        );
        let state = fsm.state();
        assert_eq!(state.frame_number, frame);
        assert_eq!(state.in_line_number, 0);
        assert_eq!(state.out_line_number, 0);

        assert_eq!(fsm.update(&packet(MIPI_DT_RAW8, &[0; 4]))?, FrameEvent::Line(1));
        assert_eq!(fsm.update(&packet(MIPI_DT_RAW8, &[0; 4]))?, FrameEvent::Line(2));
        assert_eq!(
            fsm.update(&packet(MIPI_DT_FRAME_END, &[]))?,
            FrameEvent::FrameEnd(frame)
        );
        // frame end does not touch the counters
        assert_eq!(fsm.state().in_line_number, 2);
    }
    Ok(())
}

#[test]
fn test_frame_start_mid_frame() -> Result<(), Box<dyn Error>> {
    let mut fsm = FrameStateMachine::new(small_config(OverrunPolicy::Ignore));
    fsm.update(&packet(MIPI_DT_FRAME_START, &[]))?;
    fsm.update(&packet(MIPI_DT_RAW8, &[0; 4]))?;

    // a lost frame end: the next frame start still resynchronizes
    fsm.update(&packet(MIPI_DT_FRAME_START, &[]))?;
    let state = fsm.state();
    assert_eq!(state.frame_number, 2);
    assert_eq!(state.in_line_number, 0);
    assert!(!state.waiting_for_frame_start);
    Ok(())
}

#[test]
fn test_other_packets_ignored() -> Result<(), Box<dyn Error>> {
    let mut fsm = FrameStateMachine::new(small_config(OverrunPolicy::Ignore));
    fsm.update(&packet(MIPI_DT_FRAME_START, &[]))?;
    assert_eq!(
        fsm.update(&packet(MIPI_DT_LINE_START, &[]))?,
        FrameEvent::Ignored(MIPI_DT_LINE_START)
    );
    assert_eq!(fsm.state().in_line_number, 0);
    Ok(())
}

#[test]
fn test_unknown_packet_is_fatal() -> Result<(), Box<dyn Error>> {
    let mut fsm = FrameStateMachine::new(small_config(OverrunPolicy::Ignore));
    fsm.update(&packet(MIPI_DT_FRAME_START, &[]))?;
    let res = fsm.update(&packet(0x3F, &[]));
    assert!(matches!(
        res,
        Err(IspError::UnknownPacket { data_type: 0x3F })
    ));
    Ok(())
}

#[test]
fn test_overrun_ignored() -> Result<(), Box<dyn Error>> {
    let mut fsm = FrameStateMachine::new(small_config(OverrunPolicy::Ignore));
    fsm.update(&packet(MIPI_DT_FRAME_START, &[]))?;
    for line in 1..=4 {
        assert_eq!(fsm.update(&packet(MIPI_DT_RAW8, &[0; 4]))?, FrameEvent::Line(line));
    }
    assert_eq!(fsm.overruns(), 2);
    let state = fsm.state();
    assert_eq!(state.in_line_number, 4);
    // only lines within the frame are stored
    assert_eq!(state.out_line_number, 2);

    fsm.update(&packet(MIPI_DT_FRAME_START, &[]))?;
    assert_eq!(fsm.state().in_line_number, 0);
    Ok(())
}

#[test]
fn test_overrun_fatal() -> Result<(), Box<dyn Error>> {
    let mut fsm = FrameStateMachine::new(small_config(OverrunPolicy::Fatal));
    fsm.update(&packet(MIPI_DT_FRAME_START, &[]))?;
    fsm.update(&packet(MIPI_DT_RAW8, &[0; 4]))?;
    fsm.update(&packet(MIPI_DT_RAW8, &[0; 4]))?;

    let res = fsm.update(&packet(MIPI_DT_RAW8, &[0; 4]));
    assert!(matches!(
        res,
        Err(IspError::LineOverrun {
            frame: 1,
            line: 3,
            height: 2
        })
    ));
    assert_eq!(fsm.overruns(), 1);
    Ok(())
}

#[test]
fn test_pool_rotation() -> Result<(), Box<dyn Error>> {
    let mut pool = BufferPool::new(4, 16)?;
    let mut seen = Vec::new();

    for _ in 0..8 {
        let lease = pool.lease()?;
        assert_eq!(pool.in_flight(), Some(lease.index()));
        let index = pool.complete(lease)?;
        assert_eq!(pool.in_flight(), None);
        seen.push(index);
    }

    assert_eq!(seen, vec![0, 1, 2, 3, 0, 1, 2, 3]);
    assert!(seen.windows(2).all(|w| w[0] != w[1]));
    Ok(())
}

#[test]
fn test_pool_next_slot() -> Result<(), Box<dyn Error>> {
    let mut pool = BufferPool::new(2, 8)?;
    let slots: Vec<usize> = (0..5).map(|_| pool.next_slot()).collect();
    assert_eq!(slots, vec![0, 1, 0, 1, 0]);
    Ok(())
}

#[test]
fn test_pool_size() {
    assert_eq!(
        BufferPool::new(3, 16).err(),
        Some(PoolError::NotPowerOfTwo(3))
    );
    assert_eq!(
        BufferPool::new(0, 16).err(),
        Some(PoolError::NotPowerOfTwo(0))
    );
    assert!(BufferPool::new(1, 16).is_ok());
}

#[test]
fn test_pool_single_lease() -> Result<(), Box<dyn Error>> {
    let mut pool = BufferPool::new(4, 16)?;
    let lease = pool.lease()?;
    assert_eq!(pool.lease().err(), Some(PoolError::AlreadyLeased(0)));

    // the leased slot cannot be read by the consumer
    assert_eq!(pool.buffer_at(0).err(), Some(PoolError::SlotLeased(0)));
    assert_eq!(pool.buffer_at(9).err(), Some(PoolError::InvalidSlot(9)));
    assert!(pool.buffer_at(1).is_ok());

    pool.complete(lease)?;
    assert!(pool.buffer_at(0).is_ok());
    Ok(())
}

#[test]
fn test_pool_rejects_foreign_lease() -> Result<(), Box<dyn Error>> {
    let mut pool = BufferPool::new(4, 16)?;
    let mut other = BufferPool::new(4, 16)?;

    let first = pool.lease()?;
    pool.complete(first)?;
    let _second = pool.lease()?;

    let foreign = other.lease()?;
    assert_eq!(
        pool.complete(foreign).err(),
        Some(PoolError::UnexpectedSlot {
            expected: Some(1),
            got: 0
        })
    );

    // same slot index, different pool
    let mut pool = BufferPool::new(4, 16)?;
    let mut other = BufferPool::new(4, 64)?;
    let _ours = pool.lease()?;
    let theirs = other.lease()?;
    assert_eq!(theirs.index(), 0);
    assert_eq!(
        pool.complete(theirs).err(),
        Some(PoolError::ForeignLease(0))
    );
    assert_eq!(pool.in_flight(), Some(0));
    Ok(())
}

#[test]
fn test_pool_buffer_contents() -> Result<(), Box<dyn Error>> {
    let mut pool = BufferPool::new(2, 8)?;
    let mut lease = pool.lease()?;
    lease
        .packet_mut()
        .fill(MipiHeader::new(MIPI_DT_RAW8, 0, 3), &[7, 8, 9]);
    let index = pool.complete(lease)?;

    let pkt = pool.buffer_at(index)?;
    assert_eq!(pkt.data_type(), MIPI_DT_RAW8);
    assert_eq!(pkt.payload(), &[7, 8, 9]);
    assert_eq!(pkt.capacity(), 8);
    Ok(())
}
