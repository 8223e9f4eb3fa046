// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::error::{IspError, Result};
use core::fmt;

/// Mask selecting the data type from the packet header.
pub const DATA_TYPE_MASK: u32 = 0x3F;

/// Reserved data type, never produced by a healthy receiver.
pub const DATA_TYPE_RESERVED: u8 = 0x3F;

/// MIPI CSI-2 frame start short packet
pub const MIPI_DT_FRAME_START: u8 = 0x00;

/// MIPI CSI-2 frame end short packet
pub const MIPI_DT_FRAME_END: u8 = 0x01;

/// MIPI CSI-2 line start short packet
pub const MIPI_DT_LINE_START: u8 = 0x02;

/// MIPI CSI-2 line end short packet
pub const MIPI_DT_LINE_END: u8 = 0x03;

/// YUV 4:2:2 8-bit long packet
pub const MIPI_DT_YUV422_8BIT: u8 = 0x1E;

/// RGB 8-8-8 long packet
pub const MIPI_DT_RGB888: u8 = 0x24;

/// RAW8 Bayer long packet
pub const MIPI_DT_RAW8: u8 = 0x2A;

/// RAW10 Bayer long packet
pub const MIPI_DT_RAW10: u8 = 0x2B;

/// Bytes reserved past a full line so the packet footer always fits.
pub const PACKET_FOOTER_BYTES: usize = 4;

/// Buffer capacity needed for a maximum-size long packet of one line.
pub const fn max_packet_size(line_bytes: usize) -> usize {
    line_bytes + PACKET_FOOTER_BYTES
}

/// Word count field for a long packet of `len` bytes, saturating at the
/// 16-bit field width.
pub fn saturating_word_count(len: usize) -> u16 {
    u16::try_from(len).unwrap_or(u16::MAX)
}

/// Packed 32-bit MIPI packet header.
///
/// Bits 0-5 hold the data type, bits 6-7 the virtual channel and bits 8-23
/// the word count (payload length for long packets, frame or line number
/// for short packets).
#[derive(Copy, Clone, Default, PartialEq, Eq)]
pub struct MipiHeader(pub u32);

impl MipiHeader {
    pub fn new(data_type: u8, virtual_channel: u8, word_count: u16) -> Self {
        let word = (data_type as u32 & DATA_TYPE_MASK)
            | ((virtual_channel as u32 & 0x3) << 6)
            | ((word_count as u32) << 8);
        Self(word)
    }

    pub fn data_type(&self) -> u8 {
        (self.0 & DATA_TYPE_MASK) as u8
    }

    pub fn virtual_channel(&self) -> u8 {
        ((self.0 >> 6) & 0x3) as u8
    }

    pub fn word_count(&self) -> u16 {
        ((self.0 >> 8) & 0xFFFF) as u16
    }
}

impl fmt::Debug for MipiHeader {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "MipiHeader(dt={:#04x} vc={} wc={})",
            self.data_type(),
            self.virtual_channel(),
            self.word_count()
        )
    }
}

/// Classification of a packet as seen by the frame state machine.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PacketKind {
    FrameStart,
    FrameEnd,
    /// A line in the format the sensor was configured to stream.
    ExpectedLine,
    /// Any other valid data type, carried but not interpreted.
    Other(u8),
}

impl PacketKind {
    /// Classifies a data type against the expected line format.
    ///
    /// The reserved data type is a protocol violation: the receiver only
    /// hands over tags below it, so seeing it means the header is corrupt.
    pub fn classify(data_type: u8, expected_format: u8) -> Result<Self> {
        if data_type >= DATA_TYPE_RESERVED {
            return Err(IspError::UnknownPacket { data_type });
        }
        Ok(match data_type {
            MIPI_DT_FRAME_START => PacketKind::FrameStart,
            MIPI_DT_FRAME_END => PacketKind::FrameEnd,
            dt if dt == expected_format => PacketKind::ExpectedLine,
            dt => PacketKind::Other(dt),
        })
    }
}

/// Fixed-capacity packet buffer.
///
/// The payload storage is allocated once and never grows; the receiver
/// overwrites it in place every time the buffer comes back around the pool.
#[derive(Debug)]
pub struct Packet {
    header: MipiHeader,
    payload: Vec<u8>,
    len: usize,
}

impl Packet {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            header: MipiHeader::default(),
            payload: vec![0; capacity],
            len: 0,
        }
    }

    pub fn header(&self) -> MipiHeader {
        self.header
    }

    pub fn data_type(&self) -> u8 {
        self.header.data_type()
    }

    pub fn capacity(&self) -> usize {
        self.payload.len()
    }

    /// Valid payload bytes of the last fill.
    pub fn payload(&self) -> &[u8] {
        &self.payload[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Overwrites the packet with a new header and payload.
    ///
    /// Payload bytes beyond the buffer capacity are dropped; the number of
    /// bytes kept is returned.
    pub fn fill(&mut self, header: MipiHeader, data: &[u8]) -> usize {
        let n = data.len().min(self.payload.len());
        self.header = header;
        self.payload[..n].copy_from_slice(&data[..n]);
        self.len = n;
        n
    }

    /// Writes a short packet (no payload).
    pub fn fill_short(&mut self, data_type: u8, word_count: u16) {
        self.header = MipiHeader::new(data_type, 0, word_count);
        self.len = 0;
    }
}
