//! Fair-queueing packet schedulers for a simulated link's egress:
//! Stochastic Fair Queueing ([`sfq`]) and FQ-CoDel ([`fq_codel`]).
//!
//! Both disciplines implement [`Scheduler`] and hash packets into a
//! fixed 768-bucket ([`hash::BUCKETS`]) space, round-robin between
//! buckets with deficit accounting, and drive a pluggable
//! [`InnerQueue`] per bucket. The surrounding simulator (topology,
//! routing, TCP stack, tracing harness, CLI) is out of scope — this
//! crate only implements the queueing discipline itself.

pub mod codel;
pub mod error;
pub mod hash;
pub mod inner_queue;
pub mod packet;
pub mod rng;
pub mod scheduler;
pub mod slot;

pub mod fq_codel;
pub mod sfq;

pub use error::ConfigError;
pub use fq_codel::FqCodelScheduler;
pub use inner_queue::InnerQueue;
pub use packet::{extract_flow_key, FlowKey, Ipv4View, Packet, PacketId, Priority};
pub use rng::{RngSource, StdRngSource};
pub use scheduler::{Scheduler, SchedulerBuilder, SchedulerConfig, SchedulerRegistry};
pub use sfq::SfqScheduler;

pub mod prelude {
    pub use crate::packet::{FlowKey, Ipv4View, Packet, PacketId, Priority};
    pub use crate::scheduler::{Scheduler, SchedulerBuilder, SchedulerConfig, SchedulerRegistry};
    pub use crate::{FqCodelScheduler, SfqScheduler};
}
