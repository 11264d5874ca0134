//! Stochastic Fair Queueing: single active-flows list, deficit round
//! robin over tail-drop FIFO sub-queues.

use crate::hash::{hash_bucket, HashVariant, BUCKETS};
use crate::inner_queue::{InnerQueue, TailDropQueue};
use crate::packet::{extract_flow_key, Packet};
use crate::rng::{RngSource, StdRngSource};
use crate::scheduler::{Scheduler, SchedulerConfig};
use crate::slot::Slot;
use std::collections::VecDeque;
use std::fmt;
use tracing::debug;

pub struct SfqScheduler {
    buckets: Vec<Option<Slot>>,
    active_flows: VecDeque<usize>,
    backlog: u64,
    quantum: u32,
    head_mode: bool,
    inner_capacity: usize,
    perturb: u32,
    perturb_interval: u32,
    perturb_counter: u32,
    rng: Box<dyn RngSource>,
}

impl fmt::Debug for SfqScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SfqScheduler")
            .field("backlog", &self.backlog)
            .field("active_flows", &self.active_flows.len())
            .finish()
    }
}

impl SfqScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self::with_rng(config, Box::new(StdRngSource::from_entropy()))
    }

    pub fn with_rng(config: SchedulerConfig, mut rng: Box<dyn RngSource>) -> Self {
        let perturb = rng.next_u32();
        Self {
            buckets: (0..BUCKETS).map(|_| None).collect(),
            active_flows: VecDeque::new(),
            backlog: 0,
            quantum: config.quantum,
            head_mode: config.head_mode,
            inner_capacity: config.inner_capacity,
            perturb,
            perturb_interval: config.perturb_interval,
            perturb_counter: 0,
            rng,
        }
    }

    /// Current perturbation word. Exposed read-only for diagnostics and
    /// for tests verifying refresh timing without reaching into
    /// private scheduler state.
    pub fn perturb(&self) -> u32 {
        self.perturb
    }

    fn maybe_refresh_perturbation(&mut self) {
        if self.perturb_counter > self.perturb_interval {
            self.perturb = self.rng.next_u32();
            self.perturb_counter = 0;
            debug!("sfq perturbation refreshed");
        }
    }

    fn slot_mut(&mut self, h: usize) -> &mut Slot {
        if self.buckets[h].is_none() {
            debug!(bucket = h, "sfq creating slot");
            let inner: Box<dyn InnerQueue> = Box::new(TailDropQueue::new(self.inner_capacity));
            self.buckets[h] = Some(Slot::new(h, inner, self.quantum));
        }
        self.buckets[h].as_mut().unwrap()
    }
}

impl Scheduler for SfqScheduler {
    fn enqueue(&mut self, packet: Packet) -> bool {
        // Refresh check happens at enqueue time; the counter it
        // compares against is incremented on dequeue (§4.6: SFQ
        // perturbation is dequeue-side).
        self.maybe_refresh_perturbation();

        let key = extract_flow_key(&packet);
        let h = hash_bucket(key, self.perturb, HashVariant::ThreeTuple);
        let size = packet.size() as u64;

        let slot = self.slot_mut(h);
        if !slot.active {
            if self.head_mode {
                self.active_flows.push_front(h);
            } else {
                self.active_flows.push_back(h);
            }
            slot.active = true;
        }

        let accepted = slot.inner.enqueue(packet);
        if accepted {
            slot.backlog += size;
            self.backlog += size;
        }

        let dropped = slot.inner.dropped_bytes();
        slot.backlog -= dropped;
        self.backlog -= dropped;

        accepted
    }

    fn dequeue(&mut self) -> Option<Packet> {
        loop {
            let h = *self.active_flows.front()?;

            let slot = self.buckets[h].as_mut().expect("listed slot must exist");

            if slot.deficit <= 0 {
                slot.deficit += self.quantum as i64;
                self.active_flows.pop_front();
                self.active_flows.push_back(h);
                continue;
            }

            if slot.inner.peek().is_none() {
                slot.active = false;
                self.active_flows.pop_front();
                return None;
            }

            let packet = slot.inner.dequeue()?;
            let size = packet.size() as u64;
            slot.backlog -= size;
            slot.deficit -= size as i64;
            self.backlog -= size;

            let dropped = slot.inner.dropped_bytes();
            slot.backlog -= dropped;
            self.backlog -= dropped;

            self.active_flows.pop_front();
            if slot.inner.size() > 0 {
                self.active_flows.push_back(h);
            } else {
                slot.active = false;
            }

            self.perturb_counter += 1;

            return Some(packet);
        }
    }

    fn peek(&self) -> Option<&Packet> {
        let h = *self.active_flows.front()?;
        self.buckets[h].as_ref()?.inner.peek()
    }

    fn backlog(&self) -> u64 {
        self.backlog
    }

    fn name(&self) -> &str {
        "SFQ"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{Ipv4View, PacketId, Priority};
    use crate::rng::RngSource;

    #[derive(Debug)]
    struct FixedRng(u32);
    impl RngSource for FixedRng {
        fn next_u32(&mut self) -> u32 {
            self.0
        }
    }

    fn ip_packet(id: u64, size: u32, src: u32, dst: u32) -> Packet {
        Packet::new_ip(
            PacketId::new(id),
            size,
            Priority::Normal,
            Ipv4View { src, dst, proto: 6 },
        )
    }

    fn scheduler() -> SfqScheduler {
        SfqScheduler::with_rng(SchedulerConfig::sfq_defaults(), Box::new(FixedRng(1)))
    }

    // S1: single-flow passthrough.
    #[test]
    fn single_flow_passthrough() {
        let mut s = scheduler();
        for i in 0..10 {
            assert!(s.enqueue(ip_packet(i, 1000, 1, 2)));
        }
        assert_eq!(s.backlog(), 10_000);

        let mut order = Vec::new();
        for _ in 0..10 {
            let p = s.dequeue().expect("packet available");
            order.push(p.id);
        }
        assert_eq!(order, (0..10).map(PacketId::new).collect::<Vec<_>>());
        assert_eq!(s.backlog(), 0);
        assert!(s.dequeue().is_none());

        let created = s.buckets.iter().filter(|b| b.is_some()).count();
        assert_eq!(created, 1, "exactly one slot should ever be created");
    }

    #[test]
    fn backlog_matches_sum_of_slot_backlogs() {
        let mut s = scheduler();
        for i in 0..20 {
            s.enqueue(ip_packet(i, 500, i as u32, 99));
        }
        let sum: u64 = s.buckets.iter().filter_map(|b| b.as_ref()).map(|s| s.backlog).sum();
        assert_eq!(sum, s.backlog());
    }

    // S6: inner drop.
    #[test]
    fn inner_drop_does_not_touch_backlog_or_other_flows() {
        let mut cfg = SchedulerConfig::sfq_defaults();
        cfg.inner_capacity = 100;
        let mut s = SfqScheduler::with_rng(cfg, Box::new(FixedRng(1)));

        for i in 0..100 {
            assert!(s.enqueue(ip_packet(i, 100, 1, 2)));
        }
        let backlog_before = s.backlog();
        assert!(!s.enqueue(ip_packet(100, 100, 1, 2)), "101st packet must be dropped");
        assert_eq!(s.backlog(), backlog_before);

        assert!(s.enqueue(ip_packet(200, 100, 5, 6)), "other flow unaffected");
    }
}
