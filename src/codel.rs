//! CoDel active queue management, as an [`InnerQueue`].
//!
//! Implements the RFC 8289 control law on a per-packet sojourn time
//! (time between enqueue and dequeue), rather than approximating
//! sojourn from queue length. `target`/`interval`/`drop_next` follow
//! the reference scheduler's CoDel strategy naming; the control
//! structure itself (store/drop mode, `codel_pop`, drop-count decay)
//! follows the standard dequeue-time algorithm.

use crate::inner_queue::InnerQueue;
use crate::packet::Packet;
use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Store,
    Drop,
}

struct Entry {
    packet: Packet,
    enqueued_at: Instant,
}

/// CoDel AQM sub-queue. `Enqueue` always accepts unless `capacity`
/// packets are already queued; `Dequeue` may silently drop packets
/// whose standing delay has exceeded `target` for a full `interval`
/// before returning a conforming packet (or `None` if the queue drains
/// entirely while dropping).
pub struct CoDelQueue {
    entries: VecDeque<Entry>,
    capacity: usize,
    target: Duration,
    interval: Duration,
    mode: Mode,
    interval_end: Option<Instant>,
    drop_next: Instant,
    current_drop_count: u32,
    previous_drop_count: u32,
    dropped_total: u64,
    dropped_bytes_pending: u64,
}

impl fmt::Debug for CoDelQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoDelQueue")
            .field("len", &self.entries.len())
            .field("mode", &self.mode)
            .field("dropped_total", &self.dropped_total)
            .finish()
    }
}

impl CoDelQueue {
    pub fn new(capacity: usize) -> Self {
        Self::with_params(capacity, Duration::from_millis(5), Duration::from_millis(100))
    }

    pub fn with_params(capacity: usize, target: Duration, interval: Duration) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity,
            target,
            interval,
            mode: Mode::Store,
            interval_end: None,
            drop_next: Instant::now(),
            current_drop_count: 0,
            previous_drop_count: 0,
            dropped_total: 0,
            dropped_bytes_pending: 0,
        }
    }

    pub fn dropped_total(&self) -> u64 {
        self.dropped_total
    }

    /// Control law: `interval / sqrt(count)`, count==0 treated as 1.
    fn control_law(&self, count: u32) -> Duration {
        let sqrt_count = (count.max(1) as f64).sqrt();
        Duration::from_secs_f64(self.interval.as_secs_f64() / sqrt_count)
    }

    /// `dodequeue` in the RFC: pops one entry and decides whether its
    /// standing delay makes it droppable. Returns `None` once the
    /// queue is actually empty.
    fn codel_pop(&mut self, now: Instant) -> Option<(Packet, bool)> {
        let entry = self.entries.pop_front()?;
        let standing_delay = now.saturating_duration_since(entry.enqueued_at);
        let ok_to_drop = self.process_standing_delay(now, standing_delay);
        Some((entry.packet, ok_to_drop))
    }

    fn process_standing_delay(&mut self, now: Instant, standing_delay: Duration) -> bool {
        if standing_delay < self.target {
            self.interval_end = None;
            false
        } else {
            match self.interval_end {
                Some(end) => now >= end,
                None => {
                    self.interval_end = Some(now + self.interval);
                    false
                }
            }
        }
    }

    fn was_dropping_recently(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.drop_next) < self.interval * 16
    }

    /// Drop one packet, transition to drop mode, and return the next
    /// conforming packet (if any is immediately ready).
    fn drop_from_store_mode(&mut self, now: Instant, packet: Packet) -> Option<Packet> {
        debug_assert_eq!(self.mode, Mode::Store);
        self.dropped_bytes_pending += packet.size() as u64;
        drop(packet);
        self.dropped_total += 1;
        self.mode = Mode::Drop;

        let delta = self.current_drop_count.saturating_sub(self.previous_drop_count);
        self.current_drop_count = if self.was_dropping_recently(now) && delta > 1 {
            delta
        } else {
            1
        };
        self.drop_next = now + self.control_law(self.current_drop_count);
        self.previous_drop_count = self.current_drop_count;

        self.codel_pop(now).map(|(next, _)| next)
    }

    /// Already in drop mode: keep dropping at the rate the control law
    /// dictates until either the schedule says "not yet" or a packet
    /// comes back under target.
    fn drop_from_drop_mode(&mut self, now: Instant, packet: Packet) -> Option<Packet> {
        debug_assert_eq!(self.mode, Mode::Drop);

        let mut current = Some(packet);

        while current.is_some() && self.mode == Mode::Drop && now >= self.drop_next {
            if let Some(dropped) = current.take() {
                self.dropped_bytes_pending += dropped.size() as u64;
            }
            self.dropped_total += 1;
            self.current_drop_count += 1;

            match self.codel_pop(now) {
                Some((next, ok)) => {
                    current = Some(next);
                    if ok {
                        self.drop_next += self.control_law(self.current_drop_count);
                    } else {
                        self.mode = Mode::Store;
                    }
                }
                None => {
                    current = None;
                }
            }
        }

        current
    }
}

impl InnerQueue for CoDelQueue {
    fn enqueue(&mut self, packet: Packet) -> bool {
        if self.entries.len() >= self.capacity {
            self.dropped_total += 1;
            return false;
        }
        self.entries.push_back(Entry {
            packet,
            enqueued_at: Instant::now(),
        });
        true
    }

    fn dequeue(&mut self) -> Option<Packet> {
        let now = Instant::now();
        match self.codel_pop(now) {
            Some((packet, true)) => match self.mode {
                Mode::Store => self.drop_from_store_mode(now, packet),
                Mode::Drop => self.drop_from_drop_mode(now, packet),
            },
            Some((packet, false)) => {
                self.mode = Mode::Store;
                Some(packet)
            }
            None => {
                self.mode = Mode::Store;
                None
            }
        }
    }

    fn peek(&self) -> Option<&Packet> {
        self.entries.front().map(|e| &e.packet)
    }

    fn size(&self) -> usize {
        self.entries.len()
    }

    /// Drains the byte count of packets this queue has silently dropped
    /// since the last call, so the owning [`Slot`](crate::slot::Slot)
    /// can reconcile its backlog against bytes CoDel dropped internally
    /// during `dequeue` rather than bytes it actually returned.
    fn dropped_bytes(&mut self) -> u64 {
        std::mem::take(&mut self.dropped_bytes_pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{Packet, PacketId, Priority};
    use std::thread::sleep;

    fn pkt(id: u64) -> Packet {
        Packet::new_opaque(PacketId::new(id), 1500, Priority::Normal)
    }

    #[test]
    fn empty_queue_dequeues_none() {
        let mut q = CoDelQueue::new(100);
        assert!(q.peek().is_none());
        assert!(q.dequeue().is_none());
    }

    #[test]
    fn low_sojourn_never_drops() {
        let mut q = CoDelQueue::new(100);
        for i in 0..5 {
            assert!(q.enqueue(pkt(i)));
        }
        for _ in 0..5 {
            assert!(q.dequeue().is_some());
        }
        assert_eq!(q.dropped_total(), 0);
    }

    #[test]
    fn sustained_high_sojourn_eventually_drops() {
        let mut q = CoDelQueue::with_params(1000, Duration::from_millis(1), Duration::from_millis(5));
        for i in 0..50 {
            assert!(q.enqueue(pkt(i)));
        }
        sleep(Duration::from_millis(20));
        let mut dequeued = 0;
        while q.dequeue().is_some() {
            dequeued += 1;
        }
        assert!(q.dropped_total() > 0, "expected CoDel to drop under sustained delay");
        assert!(dequeued > 0);
    }

    #[test]
    fn capacity_caps_enqueue() {
        let mut q = CoDelQueue::new(2);
        assert!(q.enqueue(pkt(1)));
        assert!(q.enqueue(pkt(2)));
        assert!(!q.enqueue(pkt(3)));
    }

    #[test]
    fn dropped_bytes_accounts_for_internal_drops_and_drains() {
        let mut q = CoDelQueue::with_params(1000, Duration::from_millis(1), Duration::from_millis(5));
        for i in 0..50u64 {
            assert!(q.enqueue(pkt(i)));
        }
        sleep(Duration::from_millis(20));
        let mut returned_bytes = 0u64;
        while let Some(p) = q.dequeue() {
            returned_bytes += p.size() as u64;
        }
        assert!(q.dropped_total() > 0);
        // every byte enqueued must be accounted for as either returned
        // or reported via dropped_bytes(), with nothing left over.
        let pending = q.dropped_bytes();
        assert_eq!(returned_bytes + pending, 50 * 1500);
        assert_eq!(pending, q.dropped_total() * 1500);

        // draining resets the pending counter until the next drop.
        assert_eq!(q.dropped_bytes(), 0);
    }
}
