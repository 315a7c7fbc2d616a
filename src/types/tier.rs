//! Periodic callback tiers

use std::time::Duration;

/// One of the four fixed callback rates.
///
/// Tiers are listed fastest first; that is also the order in which due tiers
/// fire within a single scheduler poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    /// Every 10 ms
    Hz100,
    /// Every 100 ms
    Hz10,
    /// Every second
    Hz1,
    /// Every 10 s
    TenthHz,
}

impl Tier {
    /// All tiers in firing order.
    pub const ALL: [Tier; 4] = [Tier::Hz100, Tier::Hz10, Tier::Hz1, Tier::TenthHz];

    /// Nominal period of this tier.
    pub fn period(self) -> Duration {
        match self {
            Tier::Hz100 => Duration::from_millis(10),
            Tier::Hz10 => Duration::from_millis(100),
            Tier::Hz1 => Duration::from_secs(1),
            Tier::TenthHz => Duration::from_secs(10),
        }
    }

    /// Position in [`Tier::ALL`].
    pub fn index(self) -> usize {
        match self {
            Tier::Hz100 => 0,
            Tier::Hz10 => 1,
            Tier::Hz1 => 2,
            Tier::TenthHz => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Tier::Hz100 => "100Hz",
            Tier::Hz10 => "10Hz",
            Tier::Hz1 => "1Hz",
            Tier::TenthHz => "0.1Hz",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
