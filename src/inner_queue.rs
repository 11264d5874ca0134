//! Per-slot inner sub-queue contract and the plain tail-drop FIFO used
//! by SFQ.

use crate::packet::Packet;
use std::collections::VecDeque;
use std::fmt;

/// Contract every per-flow sub-queue must satisfy. CoDel
/// ([`crate::codel::CoDelQueue`]) is one implementation; a plain
/// tail-drop FIFO ([`TailDropQueue`]) is another.
pub trait InnerQueue: Send + Sync + fmt::Debug {
    /// Always accepts unless a capacity cap is reached.
    fn enqueue(&mut self, packet: Packet) -> bool;
    /// May drop already-enqueued packets (AQM) before returning one, or
    /// `None` once genuinely empty.
    fn dequeue(&mut self) -> Option<Packet>;
    /// Non-destructive look at the head. May return `None` for a
    /// logically non-empty queue mid-drop-scan; callers treat that the
    /// same as "no packet available now".
    fn peek(&self) -> Option<&Packet>;
    fn size(&self) -> usize;
    /// Bytes of already-accepted packets this queue has silently
    /// dropped (e.g. under AQM) since the last call. Draining: returns
    /// the accumulated total and resets it to zero. Callers use this to
    /// reconcile their own backlog bookkeeping, since `enqueue`/`dequeue`
    /// alone only report the packet each call directly handed back.
    fn dropped_bytes(&mut self) -> u64;
}

/// Drop-on-enqueue-overflow FIFO: the inner queue SFQ uses per bucket.
/// A tail-drop cap stands in for the reference's RED queue, per the
/// spec's note that any AQM or tail-drop satisfying the
/// Enqueue/Dequeue/Peek/Size contract suffices here.
#[derive(Debug, Clone)]
pub struct TailDropQueue {
    packets: VecDeque<Packet>,
    capacity: usize,
}

impl TailDropQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            packets: VecDeque::new(),
            capacity,
        }
    }
}

impl InnerQueue for TailDropQueue {
    fn enqueue(&mut self, packet: Packet) -> bool {
        if self.packets.len() >= self.capacity {
            return false;
        }
        self.packets.push_back(packet);
        true
    }

    fn dequeue(&mut self) -> Option<Packet> {
        self.packets.pop_front()
    }

    fn peek(&self) -> Option<&Packet> {
        self.packets.front()
    }

    fn size(&self) -> usize {
        self.packets.len()
    }

    fn dropped_bytes(&mut self) -> u64 {
        0
    }
}
