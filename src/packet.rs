//! Packet representation and flow-key extraction.
//!
//! Packets flow through the scheduler as owning handles: the scheduler
//! never mutates or retains a copy after dequeue. `FlowKey` extraction
//! works on a throwaway duplicate so the caller's packet is untouched.

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Outer link-layer framing stripped by [`Packet::strip_outer_header`].
///
/// Point-to-point framing only; this is not a general link-layer model,
/// just enough to separate "has an IP header underneath" from "doesn't".
const LINK_HEADER_LEN: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PacketId(u64);

impl PacketId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum Priority {
    Low = 0,
    #[default]
    Normal = 1,
    High = 2,
    Critical = 3,
}

/// A parsed IPv4 header view: source, destination, protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ipv4View {
    pub src: u32,
    pub dst: u32,
    pub proto: u8,
}

/// An owned packet handle.
///
/// Carries an outer link header (present iff `has_link_header`) and,
/// underneath it, an optional IPv4 view. A packet whose payload never
/// had a parseable IP header (e.g. non-IP traffic, truncated headers)
/// simply has `ip = None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Packet {
    pub id: PacketId,
    size: u32,
    priority: Priority,
    has_link_header: bool,
    ip: Option<Ipv4View>,
    created_at_micros: u128,
}

impl Packet {
    /// Builds a packet with point-to-point link framing over an IPv4
    /// header. This is the common case a simulator constructs.
    pub fn new_ip(id: PacketId, size: u32, priority: Priority, ip: Ipv4View) -> Self {
        Self {
            id,
            size,
            priority,
            has_link_header: true,
            ip: Some(ip),
            created_at_micros: now_micros(),
        }
    }

    /// Builds a packet whose link payload is not a recognisable IPv4
    /// datagram (malformed or non-IP traffic). Still carries the outer
    /// link header, so `strip_outer_header` + `peek_ipv4` yields `None`.
    pub fn new_opaque(id: PacketId, size: u32, priority: Priority) -> Self {
        Self {
            id,
            size,
            priority,
            has_link_header: true,
            ip: None,
            created_at_micros: now_micros(),
        }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Produces an independent working copy, per the extractor's
    /// contract of not mutating or retaining the original.
    pub fn duplicate(&self) -> Self {
        self.clone()
    }

    /// Strips the outer link header from this (working-copy) packet.
    /// A no-op if there is no header left to strip.
    pub fn strip_outer_header(&mut self) {
        self.has_link_header = false;
    }

    /// Peeks the IPv4 header, if the link header has been stripped and
    /// the underlying payload parses as IPv4.
    pub fn peek_ipv4(&self) -> Option<Ipv4View> {
        if self.has_link_header {
            return None;
        }
        self.ip
    }

    /// Time elapsed since construction. Used by AQM inner queues to
    /// measure sojourn time; clamped to avoid poisoning metrics if the
    /// wall clock misbehaves (matches the kind of sanity check the
    /// simulator this crate serves already applies to sent timestamps).
    pub fn sojourn_time(&self) -> Duration {
        let now = now_micros();
        let elapsed = now.saturating_sub(self.created_at_micros);
        const MAX_REASONABLE_MICROS: u128 = 30_000_000;
        if elapsed > MAX_REASONABLE_MICROS {
            return Duration::ZERO;
        }
        Duration::from_micros(elapsed.min(u64::MAX as u128) as u64)
    }
}

fn now_micros() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros()
}

/// `(src, dst, proto)`. The sentinel key (all-zero) is used for packets
/// whose outer header cannot be parsed as IPv4 — they all collapse into
/// bucket 0 and share fate with each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlowKey {
    pub src: u32,
    pub dst: u32,
    pub proto: u8,
}

impl FlowKey {
    pub const SENTINEL: FlowKey = FlowKey { src: 0, dst: 0, proto: 0 };

    pub fn new(src: u32, dst: u32, proto: u8) -> Self {
        Self { src, dst, proto }
    }
}

/// Strips the outer link header from a duplicate of `packet` and reads
/// the IPv4 3-tuple. Pure: never observes or mutates `packet` itself.
pub fn extract_flow_key(packet: &Packet) -> FlowKey {
    let mut view = packet.duplicate();
    view.strip_outer_header();
    match view.peek_ipv4() {
        Some(ip) => FlowKey::new(ip.src, ip.dst, ip.proto),
        None => FlowKey::SENTINEL,
    }
}
