//! Connection lifecycle state machine.
//!
//! The [`Supervisor`] loops forever: scan for the peripheral, connect,
//! subscribe to the IMU characteristic, feed every notification through the
//! decoder into the [`SessionManager`], and when the link drops, close any
//! open recording, sleep the backoff delay and scan again.
//!
//! ```text
//! Idle -> Scanning -> Connecting -> Subscribing -> Connected
//!            ^  |          |             |             |
//!            +--+          v             v             v
//!            +-------- Disconnected <----+-------------+
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::{MissedTickBehavior, interval, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use swingsense_types::frame::to_hex;
use swingsense_types::uuids::IMU_CHARACTERISTIC;
use swingsense_types::{ControlFrame, Frame};

use crate::discovery::{AdvertisementFilter, DeviceCandidate, find_target};
use crate::error::{Error, Result};
use crate::events::{EventReceiver, EventSender, SupervisorEvent, event_channel};
use crate::reconnect::{Backoff, ReconnectOptions};
use crate::session::{SessionHandle, SessionManager};
use crate::transport::{FrameHandler, Transport};

/// State of the supervised link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Idle,
    Scanning,
    Connecting,
    Subscribing,
    Connected,
    Disconnected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Scanning => "scanning",
            Self::Connecting => "connecting",
            Self::Subscribing => "subscribing",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
        };
        f.write_str(name)
    }
}

/// Per-link notification counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkStats {
    /// Notifications received.
    pub frames: u64,
    /// Sample frames decoded.
    pub samples: u64,
    /// Start and Stop frames.
    pub control: u64,
    /// Control frames with an unrecognised byte.
    pub unknown_control: u64,
    /// Frames of unexpected length.
    pub malformed: u64,
}

/// Supervisor timing and target.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Backoff after an unsuccessful connect cycle.
    pub reconnect: ReconnectOptions,
    /// How long one discovery scan runs.
    pub scan_timeout: Duration,
    /// Pause between scans that find nothing.
    pub rescan_delay: Duration,
    /// How often a connected link is checked.
    pub liveness_interval: Duration,
    /// Notification characteristic.
    pub channel: Uuid,
    /// Advertisement predicate.
    pub filter: AdvertisementFilter,
    /// Capacity of the event broadcast channel.
    pub event_capacity: usize,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            reconnect: ReconnectOptions::default(),
            scan_timeout: Duration::from_secs(5),
            rescan_delay: Duration::from_millis(500),
            liveness_interval: Duration::from_secs(1),
            channel: IMU_CHARACTERISTIC,
            filter: AdvertisementFilter::default(),
            event_capacity: 100,
        }
    }
}

impl SupervisorConfig {
    /// Create a config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the reconnect options.
    pub fn reconnect(mut self, options: ReconnectOptions) -> Self {
        self.reconnect = options;
        self
    }

    /// Set the scan timeout.
    pub fn scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout = timeout;
        self
    }

    /// Set the delay between empty scans.
    pub fn rescan_delay(mut self, delay: Duration) -> Self {
        self.rescan_delay = delay;
        self
    }

    /// Set the liveness poll interval.
    pub fn liveness_interval(mut self, interval: Duration) -> Self {
        self.liveness_interval = interval;
        self
    }

    /// Validate the config and return an error if invalid.
    pub fn validate(&self) -> Result<()> {
        self.reconnect.validate()?;
        if self.scan_timeout.is_zero() {
            return Err(Error::invalid_config("scan_timeout must be > 0"));
        }
        if self.liveness_interval.is_zero() || self.liveness_interval > Duration::from_secs(1) {
            return Err(Error::invalid_config(
                "liveness_interval must be > 0 and <= 1s",
            ));
        }
        if self.event_capacity == 0 {
            return Err(Error::invalid_config("event_capacity must be > 0"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkOutcome {
    /// Connect or subscribe failed.
    Failed,
    /// The link was up and went down.
    Lost,
    Shutdown,
}

/// Drives one peripheral through scan, connect, subscribe and reconnect.
pub struct Supervisor<T: Transport> {
    transport: Arc<T>,
    sessions: SessionManager,
    config: SupervisorConfig,
    events: EventSender,
    state: ConnectionState,
    backoff: Backoff,
}

impl<T: Transport> Supervisor<T> {
    /// Create a supervisor in the `Idle` state.
    pub fn new(
        transport: Arc<T>,
        mut sessions: SessionManager,
        config: SupervisorConfig,
    ) -> Result<Self> {
        config.validate()?;
        let (events, _) = event_channel(config.event_capacity);
        sessions.set_event_sender(events.clone());
        Ok(Self {
            transport,
            sessions,
            backoff: Backoff::new(config.reconnect.clone()),
            config,
            events,
            state: ConnectionState::Idle,
        })
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Delay the next unsuccessful cycle will sleep.
    pub fn backoff(&self) -> Duration {
        self.backoff.current()
    }

    /// Receive supervisor and session events.
    pub fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }

    /// Handle for undoing recordings from another thread.
    pub fn session_handle(&self) -> SessionHandle {
        self.sessions.handle()
    }

    /// Run until `shutdown` is cancelled.
    ///
    /// Any open recording is closed and the link is dropped before returning.
    pub async fn run(&mut self, shutdown: CancellationToken) {
        info!("Supervisor started");

        loop {
            self.set_state(ConnectionState::Scanning);
            let found = tokio::select! {
                _ = shutdown.cancelled() => break,
                found = find_target(
                    self.transport.as_ref(),
                    &self.config.filter,
                    self.config.scan_timeout,
                ) => found,
            };

            let Some(candidate) = found else {
                self.emit(SupervisorEvent::ScanMissed);
                if sleep_or_cancel(self.config.rescan_delay, &shutdown).await {
                    break;
                }
                continue;
            };

            info!(id = %candidate.id, "Found {}", candidate.display_name());
            self.emit(SupervisorEvent::DeviceFound {
                id: candidate.id.clone(),
                name: candidate.name.clone(),
            });

            if self.run_link(&candidate, &shutdown).await == LinkOutcome::Shutdown {
                break;
            }

            self.set_state(ConnectionState::Disconnected);
            let delay = self.backoff.advance();
            info!("Reconnecting in {:.1}s", delay.as_secs_f64());
            self.emit(SupervisorEvent::BackoffScheduled { delay });
            if sleep_or_cancel(delay, &shutdown).await {
                break;
            }
        }

        self.sessions.close_inferred();
        self.set_state(ConnectionState::Idle);
        info!("Supervisor stopped");
    }

    /// Connect, subscribe and pump notifications until the link ends.
    async fn run_link(
        &mut self,
        candidate: &DeviceCandidate,
        shutdown: &CancellationToken,
    ) -> LinkOutcome {
        self.set_state(ConnectionState::Connecting);
        let connected = tokio::select! {
            _ = shutdown.cancelled() => return LinkOutcome::Shutdown,
            result = self.transport.connect(candidate) => result,
        };
        let connection = match connected {
            Ok(connection) => connection,
            Err(e) => {
                warn!(id = %candidate.id, "Connect failed: {}", e);
                self.emit(SupervisorEvent::ConnectFailed {
                    error: e.to_string(),
                });
                return LinkOutcome::Failed;
            }
        };

        self.set_state(ConnectionState::Subscribing);
        let (tx, mut frames) = mpsc::unbounded_channel::<Vec<u8>>();
        let on_frame: FrameHandler = Box::new(move |data: &[u8]| {
            let _ = tx.send(data.to_vec());
        });
        let channel = self.config.channel;
        let subscribed = tokio::select! {
            _ = shutdown.cancelled() => None,
            result = self.transport.subscribe(&connection, channel, on_frame) => Some(result),
        };
        match subscribed {
            None => {
                self.transport.disconnect(&connection).await;
                return LinkOutcome::Shutdown;
            }
            Some(Err(e)) => {
                warn!(id = %candidate.id, "Subscribe failed: {}", e);
                self.emit(SupervisorEvent::SubscribeFailed {
                    error: e.to_string(),
                });
                self.transport.disconnect(&connection).await;
                return LinkOutcome::Failed;
            }
            Some(Ok(())) => {}
        }

        self.set_state(ConnectionState::Connected);
        self.backoff.reset();
        info!(id = %candidate.id, "Connected to {}", candidate.display_name());
        self.emit(SupervisorEvent::Connected {
            id: candidate.id.clone(),
        });

        let mut stats = LinkStats::default();
        let mut poll = interval(self.config.liveness_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut stream_open = true;

        let outcome = loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break LinkOutcome::Shutdown,
                _ = poll.tick() => {
                    if !self.transport.is_connected(&connection) {
                        break LinkOutcome::Lost;
                    }
                }
                frame = frames.recv(), if stream_open => match frame {
                    Some(data) => self.dispatch(&data, &mut stats),
                    None => stream_open = false,
                },
            }
        };

        // Frames that arrived before the loss was noticed still count.
        while let Ok(data) = frames.try_recv() {
            self.dispatch(&data, &mut stats);
        }
        self.sessions.close_inferred();

        if outcome == LinkOutcome::Lost {
            warn!(id = %candidate.id, "Link lost");
            self.emit(SupervisorEvent::LinkLost { stats });
        }
        info!(
            frames = stats.frames,
            samples = stats.samples,
            control = stats.control,
            unknown_control = stats.unknown_control,
            malformed = stats.malformed,
            "Link statistics"
        );

        self.transport.unsubscribe(&connection, channel).await;
        self.transport.disconnect(&connection).await;
        outcome
    }

    /// Decode one notification and apply it to the session manager.
    fn dispatch(&mut self, data: &[u8], stats: &mut LinkStats) {
        stats.frames += 1;
        match Frame::decode(data) {
            Frame::Control(ControlFrame::Start) => {
                stats.control += 1;
                info!("Start frame received");
                if let Err(e) = self.sessions.on_start() {
                    self.storage_failed(e);
                }
            }
            Frame::Control(ControlFrame::Stop) => {
                stats.control += 1;
                info!("Stop frame received");
                self.sessions.on_stop();
            }
            Frame::Control(ControlFrame::Unknown(byte)) => {
                stats.unknown_control += 1;
                warn!("Unknown control byte 0x{:02X}", byte);
            }
            Frame::Sample(sample) => {
                stats.samples += 1;
                if self.sessions.is_recording() {
                    info!("{}", sample);
                } else {
                    debug!("{}", sample);
                }
                if let Err(e) = self.sessions.on_sample(&sample) {
                    self.storage_failed(e);
                }
            }
            Frame::Malformed { length } => {
                stats.malformed += 1;
                warn!(length, data = %to_hex(data), "Malformed frame");
                self.emit(SupervisorEvent::FrameRejected { length });
            }
        }
    }

    fn storage_failed(&self, e: Error) {
        error!("{}", e);
        self.emit(SupervisorEvent::StorageFailed {
            error: e.to_string(),
        });
    }

    fn set_state(&mut self, to: ConnectionState) {
        let from = self.state;
        if from == to {
            return;
        }
        self.state = to;
        debug!("State {} -> {}", from, to);
        self.emit(SupervisorEvent::StateChanged { from, to });
    }

    fn emit(&self, event: SupervisorEvent) {
        // Ignore error if no receivers
        let _ = self.events.send(event);
    }
}

/// Sleep for `delay`; returns `true` if cancelled first.
async fn sleep_or_cancel(delay: Duration, shutdown: &CancellationToken) -> bool {
    tokio::select! {
        _ = shutdown.cancelled() => true,
        _ = sleep(delay) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swingsense_types::SampleRecord;

    #[test]
    fn test_config_defaults() {
        let config = SupervisorConfig::default();
        assert_eq!(config.scan_timeout, Duration::from_secs(5));
        assert_eq!(config.rescan_delay, Duration::from_millis(500));
        assert_eq!(config.liveness_interval, Duration::from_secs(1));
        assert_eq!(config.channel, IMU_CHARACTERISTIC);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_rejects_slow_liveness_poll() {
        let config = SupervisorConfig::new().liveness_interval(Duration::from_secs(2));
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let config = SupervisorConfig::new().liveness_interval(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_rejects_bad_reconnect() {
        let config =
            SupervisorConfig::new().reconnect(ReconnectOptions::new().backoff_multiplier(0.9));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_rejects_zero_scan_timeout() {
        let config = SupervisorConfig::new().scan_timeout(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ConnectionState::Subscribing.to_string(), "subscribing");
        assert_eq!(ConnectionState::Disconnected.to_string(), "disconnected");
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_samples_logged_at_info_while_recording() {
        let dir = tempfile::tempdir().unwrap();
        let sessions = SessionManager::new(dir.path(), "swing");
        let mut supervisor = Supervisor::new(
            Arc::new(crate::mock::MockTransport::new()),
            sessions,
            SupervisorConfig::default(),
        )
        .unwrap();

        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let sample = SampleRecord::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0).to_bytes();
        let mut stats = LinkStats::default();
        tracing::subscriber::with_default(subscriber, || {
            supervisor.dispatch(&sample, &mut stats);
            supervisor.dispatch(&[0x01], &mut stats);
            supervisor.dispatch(&sample, &mut stats);
            supervisor.dispatch(&[0x02], &mut stats);
        });

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert_eq!(output.matches("IMU | Accel:").count(), 1);
        assert_eq!(stats.samples, 2);
    }

    #[test]
    fn test_link_stats_serialization() {
        let stats = LinkStats {
            frames: 5,
            samples: 3,
            control: 2,
            ..Default::default()
        };
        let json = serde_json::to_string(&stats).unwrap();
        assert!(json.contains("\"samples\":3"));
    }
}
