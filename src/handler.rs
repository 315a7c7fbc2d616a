//! Handler trait for packet consumers

use tokio::time::Instant;

use crate::{Config, Result, Tier};

/// Capability set every registered handler implements.
///
/// The transport calls handlers synchronously from its single loop, in
/// registration order. Only [`name`](Handler::name) and
/// [`handle_packet`](Handler::handle_packet) are mandatory; every other hook
/// defaults to a no-op so a handler implements just what it needs.
///
/// A slow callback stalls the whole loop; handlers should not block.
pub trait Handler: Send {
    /// Human readable name used in logs and reports.
    fn name(&self) -> &str;

    /// Apply configuration before registration.
    ///
    /// Returning `false` keeps the handler out of the registry.
    fn configure(&mut self, _config: &Config) -> bool {
        true
    }

    /// Consume one validated frame.
    ///
    /// The slice is only valid for the duration of the call.
    fn handle_packet(&mut self, packet: &[u8]);

    /// Configuration reload was requested out-of-band.
    fn on_reload(&mut self) {}

    /// The datagram stream has ended.
    fn end_of_stream(&mut self, _packet_count: u32, _bytes_dropped: u64) {}

    fn idle_100hz(&mut self, _now: Instant) {}

    fn idle_10hz(&mut self, _now: Instant) {}

    fn idle_1hz(&mut self, _now: Instant) {}

    fn idle_tenth_hz(&mut self, _now: Instant) {}

    /// Result document for the reporting layer, if this handler produces one.
    fn results(&self) -> Result<Option<serde_json::Value>> {
        Ok(None)
    }
}

/// Invoke the periodic hook matching `tier`.
pub(crate) fn fire_tier(handler: &mut dyn Handler, tier: Tier, now: Instant) {
    match tier {
        Tier::Hz100 => handler.idle_100hz(now),
        Tier::Hz10 => handler.idle_10hz(now),
        Tier::Hz1 => handler.idle_1hz(now),
        Tier::TenthHz => handler.idle_tenth_hz(now),
    }
}
