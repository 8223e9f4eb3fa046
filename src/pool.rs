// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::{error::PoolError, packet::Packet};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::trace;

static NEXT_POOL_ID: AtomicUsize = AtomicUsize::new(0);

/// Default number of packet buffers shared with the receiver.
pub const DEFAULT_POOL_SIZE: usize = 4;

/// A packet buffer on loan to the producer.
///
/// The lease owns the buffer while it is away from the pool, so the
/// consumer cannot touch a slot the producer is filling. It must be handed
/// back through [`BufferPool::complete`].
#[derive(Debug)]
pub struct PacketLease {
    pool: usize,
    index: usize,
    packet: Packet,
}

impl PacketLease {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn packet(&self) -> &Packet {
        &self.packet
    }

    pub fn packet_mut(&mut self) -> &mut Packet {
        &mut self.packet
    }
}

/// Fixed ring of pre-allocated packet buffers.
///
/// At most one slot is leased to the producer at any time and the cursor
/// advances strictly `(idx + 1) mod N` per handoff, so every buffer is
/// reused in turn and none is held by producer and consumer at once.
///
/// # Example
///
/// ```
/// use edgefirst_isp::pool::BufferPool;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut pool = BufferPool::new(4, 64)?;
/// let lease = pool.lease()?;
/// assert_eq!(lease.index(), 0);
/// let index = pool.complete(lease)?;
/// assert_eq!(pool.buffer_at(index)?.len(), 0);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct BufferPool {
    id: usize,
    slots: Vec<Option<Packet>>,
    cursor: usize,
    in_flight: Option<usize>,
    started: bool,
}

impl BufferPool {
    /// Allocates `count` packet buffers of `capacity` bytes each.
    ///
    /// `count` must be a non-zero power of two.
    pub fn new(count: usize, capacity: usize) -> Result<Self, PoolError> {
        if !count.is_power_of_two() {
            return Err(PoolError::NotPowerOfTwo(count));
        }
        let slots = (0..count)
            .map(|_| Some(Packet::with_capacity(capacity)))
            .collect();
        Ok(Self {
            id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
            slots,
            cursor: 0,
            in_flight: None,
            started: false,
        })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Slot currently leased to the producer, if any.
    pub fn in_flight(&self) -> Option<usize> {
        self.in_flight
    }

    /// Returns the next rotating slot index and advances the cursor.
    ///
    /// The first call yields slot 0.
    pub fn next_slot(&mut self) -> usize {
        if self.started {
            self.cursor = (self.cursor + 1) & (self.slots.len() - 1);
        } else {
            self.started = true;
        }
        self.cursor
    }

    /// Leases the next slot to the producer.
    pub fn lease(&mut self) -> Result<PacketLease, PoolError> {
        if let Some(index) = self.in_flight {
            return Err(PoolError::AlreadyLeased(index));
        }
        let index = self.next_slot();
        let packet = self.slots[index]
            .take()
            .ok_or(PoolError::SlotLeased(index))?;
        self.in_flight = Some(index);
        trace!(slot = index, "leased packet buffer");
        Ok(PacketLease {
            pool: self.id,
            index,
            packet,
        })
    }

    /// Takes back the buffer the producer filled and returns its slot.
    ///
    /// Only the lease currently in flight, issued by this pool, is accepted.
    pub fn complete(&mut self, lease: PacketLease) -> Result<usize, PoolError> {
        if self.in_flight != Some(lease.index) {
            return Err(PoolError::UnexpectedSlot {
                expected: self.in_flight,
                got: lease.index,
            });
        }
        if lease.pool != self.id {
            return Err(PoolError::ForeignLease(lease.index));
        }
        let index = lease.index;
        self.slots[index] = Some(lease.packet);
        self.in_flight = None;
        Ok(index)
    }

    pub fn buffer_at(&self, index: usize) -> Result<&Packet, PoolError> {
        self.slots
            .get(index)
            .ok_or(PoolError::InvalidSlot(index))?
            .as_ref()
            .ok_or(PoolError::SlotLeased(index))
    }

    pub fn buffer_at_mut(&mut self, index: usize) -> Result<&mut Packet, PoolError> {
        self.slots
            .get_mut(index)
            .ok_or(PoolError::InvalidSlot(index))?
            .as_mut()
            .ok_or(PoolError::SlotLeased(index))
    }
}
