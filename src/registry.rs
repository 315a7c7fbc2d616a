//! Ordered, bounded collection of handlers

use std::panic::{AssertUnwindSafe, catch_unwind};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::HandlerConfig;
use crate::handler::{Handler, fire_tier};
use crate::{Config, LinkError, Result, Tier};

/// Default number of handler slots.
pub const DEFAULT_HANDLER_CAPACITY: usize = 10;

/// Owns every registered handler for the lifetime of the link.
///
/// Broadcasts run synchronously in registration order. By default a handler
/// panic unwinds straight through the registry; with fault isolation enabled
/// the panic is caught, logged, and the remaining handlers still run.
pub struct HandlerRegistry {
    handlers: Vec<Box<dyn Handler>>,
    capacity: usize,
    isolate_faults: bool,
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_HANDLER_CAPACITY)
    }
}

impl HandlerRegistry {
    pub fn new(capacity: usize) -> Self {
        Self { handlers: Vec::with_capacity(capacity), capacity, isolate_faults: false }
    }

    pub fn from_config(config: &HandlerConfig) -> Self {
        Self::new(config.capacity).with_fault_isolation(config.isolate_faults)
    }

    /// Catch handler panics per callback instead of propagating them.
    pub fn with_fault_isolation(mut self, isolate: bool) -> Self {
        self.isolate_faults = isolate;
        self
    }

    /// Add a handler to the end of the dispatch order.
    ///
    /// Fails once every slot is taken; callers treat that as fatal.
    pub fn register(&mut self, handler: Box<dyn Handler>) -> Result<()> {
        if self.handlers.len() >= self.capacity {
            return Err(LinkError::capacity_exceeded(self.capacity, handler.name()));
        }
        debug!("Registered handler '{}' in slot {}", handler.name(), self.handlers.len());
        self.handlers.push(handler);
        Ok(())
    }

    /// Configure a handler and register it if it accepts the configuration.
    ///
    /// Returns:
    /// - `Ok(true)` - handler configured and registered
    /// - `Ok(false)` - handler rejected the configuration and was dropped
    /// - `Err(e)` - registry is full
    pub fn install(&mut self, mut handler: Box<dyn Handler>, config: &Config) -> Result<bool> {
        if self.handlers.len() >= self.capacity {
            return Err(LinkError::capacity_exceeded(self.capacity, handler.name()));
        }
        if !handler.configure(config) {
            warn!("Failed to configure handler '{}'; not registering it", handler.name());
            return Ok(false);
        }
        info!("Installed handler '{}'", handler.name());
        self.register(handler)?;
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn isolates_faults(&self) -> bool {
        self.isolate_faults
    }

    /// Handlers in dispatch order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Handler> {
        self.handlers.iter().map(|handler| handler.as_ref())
    }

    /// Hand one validated frame to every handler.
    pub fn dispatch_packet(&mut self, packet: &[u8]) {
        self.each("handle_packet", |handler| handler.handle_packet(packet));
    }

    /// Fire one periodic tier on every handler.
    pub fn dispatch_tick(&mut self, tier: Tier, now: Instant) {
        self.each(tier.label(), |handler| fire_tier(handler, tier, now));
    }

    pub fn notify_reload(&mut self) {
        self.each("on_reload", |handler| handler.on_reload());
    }

    pub fn notify_end_of_stream(&mut self, packet_count: u32, bytes_dropped: u64) {
        self.each("end_of_stream", |handler| handler.end_of_stream(packet_count, bytes_dropped));
    }

    /// Collect every handler's result document, in dispatch order.
    pub fn reports(&self) -> Result<Vec<serde_json::Value>> {
        let mut reports = Vec::new();
        for handler in &self.handlers {
            if let Some(report) = handler.results()? {
                reports.push(report);
            }
        }
        Ok(reports)
    }

    fn each<F>(&mut self, callback: &str, mut f: F)
    where
        F: FnMut(&mut dyn Handler),
    {
        for handler in self.handlers.iter_mut() {
            if !self.isolate_faults {
                f(handler.as_mut());
                continue;
            }
            let outcome = catch_unwind(AssertUnwindSafe(|| f(handler.as_mut())));
            if outcome.is_err() {
                error!(
                    handler = handler.name(),
                    callback, "Handler panicked; continuing with next"
                );
            }
        }
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.iter().map(|h| h.name()).collect::<Vec<_>>())
            .field("capacity", &self.capacity)
            .field("isolate_faults", &self.isolate_faults)
            .finish()
    }
}
