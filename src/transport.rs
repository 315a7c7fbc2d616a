//! Transport owns the receive loop and drives every handler

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, trace};

use crate::config::LinkConfig;
use crate::rate_limit::RateLimiter;
use crate::registry::HandlerRegistry;
use crate::scheduler::Scheduler;
use crate::source::DatagramSource;
use crate::types::{PeerAddress, RawDatagram};
use crate::validation::{DropReason, PacketValidator};

/// Pause after a failed receive so a persistently failing socket cannot spin.
const ERROR_BACKOFF: Duration = Duration::from_millis(10);

/// Out-of-band request to reload configuration.
///
/// The signal side only ever raises the flag. The transport clears it and
/// notifies handlers from inside its own loop.
#[derive(Debug, Clone, Default)]
pub struct ReloadFlag(Arc<AtomicBool>);

impl ReloadFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Clear the flag, returning whether it was set.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

/// Raise `flag` on every SIGHUP.
///
/// The spawned task does nothing but set the flag.
#[cfg(unix)]
pub fn spawn_sighup_listener(flag: ReloadFlag) -> crate::Result<tokio::task::JoinHandle<()>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangups = signal(SignalKind::hangup())
        .map_err(|source| crate::LinkError::Signal { signal: "SIGHUP", source })?;
    Ok(tokio::spawn(async move {
        while hangups.recv().await.is_some() {
            flag.raise();
        }
    }))
}

/// What one loop iteration observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// A valid datagram of `len` bytes was dispatched
    Dispatched { len: usize },
    /// A datagram failed validation and was discarded
    Dropped(DropReason),
    /// Nothing arrived within the receive timeout
    Timeout,
    /// The source reported a receive failure
    ReceiveError,
    /// The source is exhausted
    Closed,
}

/// Counters kept by the transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportStats {
    pub packets_received: u32,
    pub packets_dispatched: u32,
    pub packets_dropped: u32,
    pub bytes_dropped: u64,
    pub receive_errors: u32,
    pub timeouts: u32,
    pub reloads: u32,
}

/// Receives datagrams, validates them and fans them out to handlers.
///
/// Everything happens on the caller's task: the wait for a datagram is the
/// only suspension point, validation, dispatch and scheduling run inline.
/// The scheduler is polled after every iteration whatever happened, so ticks
/// keep flowing while the link is silent.
pub struct PacketTransport<S> {
    source: S,
    validator: PacketValidator,
    registry: HandlerRegistry,
    scheduler: Scheduler,
    limiter: RateLimiter,
    reload: ReloadFlag,
    recv_timeout: Duration,
    buf: Vec<u8>,
    stats: TransportStats,
}

impl<S: DatagramSource> PacketTransport<S> {
    pub fn new(source: S, registry: HandlerRegistry, config: &LinkConfig) -> Self {
        Self {
            source,
            validator: PacketValidator::new(PeerAddress::new(config.peer)),
            registry,
            scheduler: Scheduler::new(Instant::now()),
            limiter: RateLimiter::new(config.error_interval()),
            reload: ReloadFlag::new(),
            recv_timeout: config.recv_timeout(),
            buf: vec![0u8; config.max_datagram],
            stats: TransportStats::default(),
        }
    }

    /// Handle for raising reload requests from outside the loop.
    pub fn reload_flag(&self) -> ReloadFlag {
        self.reload.clone()
    }

    pub fn stats(&self) -> TransportStats {
        self.stats
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn into_registry(self) -> HandlerRegistry {
        self.registry
    }

    /// Run until cancelled or the source is exhausted.
    ///
    /// On exit every handler is told the stream ended, with the number of
    /// dispatched packets and the bytes dropped by validation.
    pub async fn run(&mut self, cancel: &CancellationToken) -> TransportStats {
        info!(
            peer = %self.validator.peer(),
            handlers = self.registry.len(),
            "Packet transport started"
        );

        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Packet transport cancelled");
                    break;
                }
                event = self.step() => event,
            };
            if event == Event::Closed {
                info!("Datagram source closed");
                break;
            }
        }

        self.registry.notify_end_of_stream(self.stats.packets_dispatched, self.stats.bytes_dropped);
        info!(
            received = self.stats.packets_received,
            dispatched = self.stats.packets_dispatched,
            dropped = self.stats.packets_dropped,
            "Packet transport stopped"
        );
        self.stats
    }

    /// One loop iteration.
    pub async fn step(&mut self) -> Event {
        if self.reload.take() {
            info!("Reload requested; notifying handlers");
            self.stats.reloads += 1;
            self.registry.notify_reload();
        }

        let received =
            tokio::time::timeout(self.recv_timeout, self.source.recv(&mut self.buf)).await;
        let event = match received {
            Err(_elapsed) => {
                self.stats.timeouts += 1;
                trace!("No datagram within {:?}", self.recv_timeout);
                Event::Timeout
            }
            Ok(Ok(None)) => Event::Closed,
            Ok(Ok(Some((len, sender)))) => self.accept(len, sender),
            Ok(Err(err)) => {
                self.stats.receive_errors += 1;
                if let Some(skipped) = self.limiter.try_log() {
                    error!(suppressed = skipped, "[{}] receive: {}", skipped, err);
                }
                tokio::time::sleep(ERROR_BACKOFF).await;
                Event::ReceiveError
            }
        };

        self.scheduler.poll(Instant::now(), &mut self.registry);
        event
    }

    fn accept(&mut self, len: usize, sender: std::net::SocketAddr) -> Event {
        self.stats.packets_received += 1;
        let datagram = RawDatagram::new(&self.buf[..len], sender);

        match self.validator.admit(&datagram, &mut self.limiter) {
            Ok(()) => {
                self.registry.dispatch_packet(datagram.bytes());
                self.stats.packets_dispatched += 1;
                Event::Dispatched { len }
            }
            Err(reason) => {
                self.stats.packets_dropped += 1;
                self.stats.bytes_dropped += len as u64;
                Event::Dropped(reason)
            }
        }
    }
}
