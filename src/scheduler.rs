//! Shared scheduler configuration and the `Scheduler` trait exposed to
//! the link layer.

use crate::error::ConfigError;
use crate::packet::Packet;
use std::collections::HashMap;
use std::fmt;

/// Bucket count, fixed per spec at `0x300` (768).
pub use crate::hash::BUCKETS;

/// Construction-time parameters, immutable once a scheduler is built.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub quantum: u32,
    pub perturb_interval: u32,
    pub head_mode: bool,
    pub inner_capacity: usize,
}

impl SchedulerConfig {
    /// Linux SFQ's historical defaults: 4500-byte quantum, 500-packet
    /// perturbation interval, tail-mode activation.
    pub fn sfq_defaults() -> Self {
        Self {
            quantum: 4500,
            perturb_interval: 500,
            head_mode: false,
            inner_capacity: 128,
        }
    }

    /// Linux fq_codel's historical defaults: 1514-byte quantum rounded
    /// up to one 9000-byte jumbo frame's worth, 500k-packet
    /// perturbation interval.
    pub fn fq_codel_defaults() -> Self {
        Self {
            quantum: 9000,
            perturb_interval: 500_000,
            head_mode: false,
            inner_capacity: 10_240,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.quantum == 0 {
            return Err(ConfigError::ZeroQuantum);
        }
        if self.perturb_interval == 0 {
            return Err(ConfigError::ZeroPerturbInterval);
        }
        Ok(())
    }
}

/// The three operations a fair-queueing discipline exposes to the link.
pub trait Scheduler: Send + Sync + fmt::Debug {
    /// Returns whether the inner queue accepted the packet.
    fn enqueue(&mut self, packet: Packet) -> bool;
    /// Returns the next packet to transmit, or `None` if nothing is
    /// available right now.
    fn dequeue(&mut self) -> Option<Packet>;
    /// Non-destructive look at the next packet to transmit.
    fn peek(&self) -> Option<&Packet>;
    /// Total bytes currently enqueued across all flows.
    fn backlog(&self) -> u64;
    fn name(&self) -> &str;
}

/// Registers scheduler constructors by name, mirroring the teacher
/// codebase's strategy registry idiom so a caller can build `"sfq"` /
/// `"fq-codel"` disciplines without matching on a hardcoded enum.
pub struct SchedulerRegistry {
    factories: HashMap<String, Box<dyn Fn(SchedulerConfig) -> Box<dyn Scheduler> + Send + Sync>>,
}

impl SchedulerRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            factories: HashMap::new(),
        };
        registry.register_builtin();
        registry
    }

    fn register_builtin(&mut self) {
        self.register("sfq", |cfg| Box::new(crate::sfq::SfqScheduler::new(cfg)));
        self.register("fq-codel", |cfg| {
            Box::new(crate::fq_codel::FqCodelScheduler::new(cfg))
        });
        self.register("fqcodel", |cfg| {
            Box::new(crate::fq_codel::FqCodelScheduler::new(cfg))
        });
    }

    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(SchedulerConfig) -> Box<dyn Scheduler> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_lowercase(), Box::new(factory));
    }

    pub fn create(&self, name: &str, config: SchedulerConfig) -> Option<Box<dyn Scheduler>> {
        self.factories.get(&name.to_lowercase()).map(|f| f(config))
    }

    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn global() -> &'static SchedulerRegistry {
        use std::sync::OnceLock;
        static REGISTRY: OnceLock<SchedulerRegistry> = OnceLock::new();
        REGISTRY.get_or_init(SchedulerRegistry::new)
    }
}

impl Default for SchedulerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for constructing a named scheduler with overridden
/// parameters, mirroring the teacher's `StrategyBuilder`.
pub struct SchedulerBuilder {
    name: String,
    config: SchedulerConfig,
}

impl SchedulerBuilder {
    pub fn new(name: impl Into<String>, defaults: SchedulerConfig) -> Self {
        Self {
            name: name.into(),
            config: defaults,
        }
    }

    pub fn quantum(mut self, quantum: u32) -> Self {
        self.config.quantum = quantum;
        self
    }

    pub fn perturb_interval(mut self, interval: u32) -> Self {
        self.config.perturb_interval = interval;
        self
    }

    pub fn head_mode(mut self, head_mode: bool) -> Self {
        self.config.head_mode = head_mode;
        self
    }

    pub fn build(self) -> Result<Box<dyn Scheduler>, ConfigError> {
        self.config.validate()?;
        SchedulerRegistry::global()
            .create(&self.name, self.config)
            .ok_or_else(|| ConfigError::UnknownDiscipline(self.name.clone()))
    }
}
