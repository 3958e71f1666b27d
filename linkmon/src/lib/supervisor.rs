//! The connection supervisor: brings the wireless link up and keeps it up.
//!
//! `init` and `init_from_list` block until associated. `monitor` is meant to be called on every
//! pass of the caller's main loop. It returns at once while the link is up and blocks in the
//! same reset-and-retry cycle as `init` once the link is found down. Retries are unbounded
//! unless `SupervisorConfig::max_attempts` is set, and a `CancelToken` can abort them.

use std::sync::Arc;
use std::time::Duration;

pub use data_model::{is_error_status, is_neutral_status, is_success_status};
use data_model::{Credential, CredentialError, LinkStatus, NetworkInfo};
use thiserror::Error;

use crate::link::{CancelToken, LinkState};
use crate::logger::Logger;
use crate::radio::{Clock, Console, Radio, RadioError};

/// How long a single association attempt may take
pub const CONNECT_WAIT_MS: u64 = 5_000;
/// Gap between status polls while waiting
pub const CONNECT_POLL_MS: u64 = 250;
pub const SCAN_TIMEOUT_MS: u64 = 5_000;

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("no candidate networks supplied")]
    EmptyCandidateList,
    #[error("network scan failed: {0}")]
    ScanFailed(#[source] RadioError),
    #[error("no known network found")]
    NoKnownNetwork,
    #[error("invalid credential: {0}")]
    InvalidCredential(#[from] CredentialError),
    #[error("no network has been associated yet")]
    NotInitialized,
    #[error("gave up after {attempts} connection attempts")]
    RetriesExhausted { attempts: u32 },
    #[error("connection attempt cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorConfig {
    pub connect_wait_ms: u64,
    pub poll_interval_ms: u64,
    pub scan_timeout_ms: u64,
    /// Cap on attempts per connect loop, `None` keeps trying forever
    pub max_attempts: Option<u32>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        SupervisorConfig {
            connect_wait_ms: CONNECT_WAIT_MS,
            poll_interval_ms: CONNECT_POLL_MS,
            scan_timeout_ms: SCAN_TIMEOUT_MS,
            max_attempts: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Associating,
    Connected,
    Recovering,
}

/// Result of one `monitor` pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkCheck {
    /// Link was up, nothing done
    Healthy,
    /// Link was down and has been re-established
    Recovered { outage_ms: u64, attempts: u32 },
}

/// How one bounded wait for the link ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    Connected,
    Failed(LinkStatus),
    TimedOut(LinkStatus),
}

pub struct Supervisor<'a, R: Radio, C: Clock> {
    radio: R,
    clock: C,
    console: Arc<dyn Console>,
    link: LinkState,
    logger: Option<&'a Logger>,
    cancel: CancelToken,
    config: SupervisorConfig,
    phase: Phase,
}

impl<'a, R: Radio, C: Clock> Supervisor<'a, R, C> {
    pub fn new(
        radio: R,
        clock: C,
        console: Arc<dyn Console>,
        link: LinkState,
        config: SupervisorConfig,
    ) -> Self {
        Supervisor {
            radio,
            clock,
            console,
            link,
            logger: None,
            cancel: CancelToken::new(),
            config,
            phase: Phase::Uninitialized,
        }
    }

    /// Report state changes through `logger`
    pub fn with_logger(mut self, logger: &'a Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn link(&self) -> &LinkState {
        &self.link
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    /// Associate with `ssid`, blocking until connected
    pub fn init(&mut self, ssid: &str, password: &str, hostname: &str) -> Result<(), SupervisorError> {
        let credential = Credential::new(ssid, password)?;

        self.radio.set_hostname(hostname);
        self.link.set_active(credential.clone());
        self.set_phase(Phase::Associating);

        self.console.write_line(&format!("Connecting to {ssid}:"));
        self.radio
            .begin_association(credential.ssid(), credential.password());

        self.connect_loop()?;

        self.link.set_connected(true);
        self.set_phase(Phase::Connected);
        self.console.write_line(&format!(
            "Connected to {ssid} with IP {}",
            self.radio.current_address()
        ));
        Ok(())
    }

    /// Scan, then associate with the first of `candidates` (raw `"ssid:password"` entries, in
    /// order of preference) that is visible. Malformed entries are skipped with a warning.
    pub fn init_from_list<S: AsRef<str>>(
        &mut self,
        candidates: &[S],
        hostname: &str,
    ) -> Result<Credential, SupervisorError> {
        if candidates.is_empty() {
            return Err(SupervisorError::EmptyCandidateList);
        }

        let visible = self.list_networks()?;
        if visible.is_empty() {
            return Err(SupervisorError::NoKnownNetwork);
        }

        for (index, entry) in candidates.iter().enumerate() {
            let credential = match Credential::parse(entry.as_ref()) {
                Ok(credential) => credential,
                Err(e) => {
                    self.warn(&format!("Skipping network entry #{index}: {e}"));
                    continue;
                }
            };

            if visible.iter().any(|network| network.ssid == credential.ssid()) {
                log::debug!("Known network '{credential}' is visible");
                self.init(credential.ssid(), credential.password(), hostname)?;
                return Ok(credential);
            }
        }

        self.console.write_line("No known network found");
        Err(SupervisorError::NoKnownNetwork)
    }

    /// Scan for networks and print what was found
    pub fn list_networks(&mut self) -> Result<Vec<NetworkInfo>, SupervisorError> {
        self.console.write_line("** Scanning Networks **");
        let timeout = Duration::from_millis(self.config.scan_timeout_ms);
        let networks = match self.radio.scan_networks(timeout) {
            Ok(networks) => networks,
            Err(e) => {
                self.console
                    .write_line(&format!("Couldn't get a wifi connection: {e}"));
                return Err(SupervisorError::ScanFailed(e));
            }
        };

        self.console
            .write_line(&format!("Number of available networks: {}", networks.len()));
        for (index, network) in networks.iter().enumerate() {
            self.console.write_line(&format!("{index}) {network}"));
        }
        Ok(networks)
    }

    /// Check the link once, and if it is down reconnect with the stored credential
    pub fn monitor(&mut self) -> Result<LinkCheck, SupervisorError> {
        let status = self.radio.query_status();
        if is_success_status(status) {
            // a loop that gave up may have left an association that completed later
            if self.phase != Phase::Connected && self.link.active().is_some() {
                self.link.set_connected(true);
                self.set_phase(Phase::Connected);
            }
            return Ok(LinkCheck::Healthy);
        }

        let Some(credential) = self.link.active() else {
            return Err(SupervisorError::NotInitialized);
        };

        log::debug!("Link check returned '{status}'");
        let was_connected = self.link.is_connected();
        self.link.set_connected(false);
        self.set_phase(Phase::Recovering);

        let reconnect_start_ms = self.clock.now_ms();
        self.reset_connection(&credential);
        let attempts = self.connect_loop()?;
        let outage_ms = self.clock.now_ms().saturating_sub(reconnect_start_ms);

        // Mark the link up first so the reports below reach the collector
        self.link.set_connected(true);
        self.set_phase(Phase::Connected);

        if was_connected {
            if let Some(logger) = self.logger {
                logger.log_error(&format!(
                    "WiFi connection was lost: took {:.2}s to reconnect.",
                    outage_ms as f64 / 1000.0
                ));
            }
        }

        let connected = format!(
            "Connected to {} with IP {}",
            self.radio.current_ssid(),
            self.radio.current_address()
        );
        if let Some(logger) = self.logger {
            logger.log(&connected);
        }
        self.console.write_line(&connected);

        Ok(LinkCheck::Recovered {
            outage_ms,
            attempts,
        })
    }

    /// Received signal strength of the active association in dBm
    pub fn get_signal_strength(&self) -> i32 {
        self.radio.signal_strength()
    }

    /// Run bounded waits until one connects, resetting the radio after each failure.
    /// Returns the number of attempts it took.
    fn connect_loop(&mut self) -> Result<u32, SupervisorError> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let status = match self.wait_for_link()? {
                Attempt::Connected => return Ok(attempts),
                Attempt::Failed(status) | Attempt::TimedOut(status) => status,
            };

            self.console.write_line(&format!("\tResult: {status}"));
            if let Some(max) = self.config.max_attempts {
                if attempts >= max {
                    return Err(SupervisorError::RetriesExhausted { attempts });
                }
            }

            // The credential is always stored before the first wait
            let credential = self.link.active().ok_or(SupervisorError::NotInitialized)?;
            self.reset_connection(&credential);
        }
    }

    /// Poll until the link is up, an error status shows up, or the wait window closes
    fn wait_for_link(&mut self) -> Result<Attempt, SupervisorError> {
        let deadline = self.clock.now_ms() + self.config.connect_wait_ms;
        loop {
            if self.cancel.is_cancelled() {
                return Err(SupervisorError::Cancelled);
            }

            let status = self.radio.query_status();
            if is_success_status(status) {
                return Ok(Attempt::Connected);
            }
            if is_error_status(status) {
                return Ok(Attempt::Failed(status));
            }
            if self.clock.now_ms() >= deadline {
                return Ok(Attempt::TimedOut(status));
            }

            self.clock.sleep_ms(self.config.poll_interval_ms);
        }
    }

    fn reset_connection(&mut self, credential: &Credential) {
        self.console
            .write_line("WiFi disconnected, trying to reconnect...");
        self.radio.disassociate();
        self.radio.set_station_mode();
        self.radio
            .begin_association(credential.ssid(), credential.password());
    }

    fn warn(&self, message: &str) {
        log::warn!("{message}");
        if let Some(logger) = self.logger {
            logger.log_warn(message);
        }
    }

    fn set_phase(&mut self, phase: Phase) {
        if self.phase != phase {
            log::debug!("Supervisor {:?} -> {:?}", self.phase, phase);
            self.phase = phase;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_utils::{MockClock, MockRadio, RadioCall, RecordingConsole};
    use data_model::LinkStatus::*;

    fn supervisor(
        radio: MockRadio,
        config: SupervisorConfig,
    ) -> (Supervisor<'static, MockRadio, MockClock>, MockClock, Arc<RecordingConsole>) {
        let clock = MockClock::starting_at(1_000);
        let console = Arc::new(RecordingConsole::new());
        let supervisor = Supervisor::new(
            radio,
            clock.clone(),
            console.clone(),
            LinkState::new(),
            config,
        );
        (supervisor, clock, console)
    }

    #[test]
    fn init_connects_on_first_attempt() {
        let radio = MockRadio::new().with_statuses([Idle, Idle]);
        let (mut sup, clock, console) = supervisor(radio.clone(), SupervisorConfig::default());

        sup.init("home", "secret123", "node-7").unwrap();

        assert!(sup.link().is_connected());
        assert_eq!(sup.phase(), Phase::Connected);
        assert_eq!(sup.link().active().unwrap().ssid(), "home");
        assert_eq!(
            radio.calls(),
            vec![
                RadioCall::SetHostname("node-7".into()),
                RadioCall::BeginAssociation {
                    ssid: "home".into(),
                    password: "secret123".into()
                },
            ]
        );
        assert_eq!(clock.sleeps(), 2);
        assert!(console.contains("Connected to home with IP 10.0.0.7"));
    }

    #[test]
    fn error_status_resets_without_waiting_out_the_window() {
        let radio = MockRadio::new().with_statuses([ConnectFailed, NoSsidAvailable]);
        let (mut sup, clock, console) = supervisor(radio.clone(), SupervisorConfig::default());

        sup.init("home", "secret123", "node-7").unwrap();

        assert_eq!(clock.sleeps(), 0);
        assert_eq!(radio.associations().len(), 3);
        assert!(console.contains("\tResult: Connect failed"));
        assert!(console.contains("\tResult: No SSID available"));
    }

    #[test]
    fn timeout_resets_and_retries() {
        let config = SupervisorConfig {
            connect_wait_ms: 1_000,
            poll_interval_ms: 250,
            ..SupervisorConfig::default()
        };
        // five polls fill the first window, the sixth query starts the second attempt
        let radio = MockRadio::new().with_statuses([Idle; 5]);
        let (mut sup, _clock, _console) = supervisor(radio.clone(), config);

        sup.init("home", "secret123", "node-7").unwrap();

        let calls = radio.calls();
        assert_eq!(radio.associations().len(), 2);
        assert!(calls.contains(&RadioCall::Disassociate));
        assert!(calls.contains(&RadioCall::StationMode));
    }

    #[test]
    fn attempt_cap_ends_the_loop() {
        let config = SupervisorConfig {
            max_attempts: Some(3),
            ..SupervisorConfig::default()
        };
        let radio = MockRadio::new().then_status(ConnectFailed);
        let (mut sup, _clock, _console) = supervisor(radio.clone(), config);

        let err = sup.init("home", "secret123", "node-7").unwrap_err();

        assert!(matches!(err, SupervisorError::RetriesExhausted { attempts: 3 }));
        assert!(!sup.link().is_connected());
        assert_eq!(radio.associations().len(), 3);
    }

    #[test]
    fn cancelled_loop_returns() {
        let radio = MockRadio::new().then_status(Idle);
        let (sup, _clock, _console) = supervisor(radio, SupervisorConfig::default());
        let token = CancelToken::new();
        let mut sup = sup.with_cancel_token(token.clone());
        token.cancel();

        let err = sup.init("home", "secret123", "node-7").unwrap_err();
        assert!(matches!(err, SupervisorError::Cancelled));
    }

    #[test]
    fn invalid_credential_is_rejected_before_touching_the_radio() {
        let radio = MockRadio::new();
        let (mut sup, _clock, _console) = supervisor(radio.clone(), SupervisorConfig::default());

        let err = sup.init("", "pw", "node-7").unwrap_err();

        assert!(matches!(
            err,
            SupervisorError::InvalidCredential(CredentialError::EmptySsid)
        ));
        assert!(radio.calls().is_empty());
        assert_eq!(sup.phase(), Phase::Uninitialized);
    }

    #[test]
    fn ssid_with_separator_is_rejected() {
        let radio = MockRadio::new();
        let (mut sup, _clock, _console) = supervisor(radio.clone(), SupervisorConfig::default());

        let err = sup.init("ho:me", "pw", "node-7").unwrap_err();

        assert!(matches!(
            err,
            SupervisorError::InvalidCredential(CredentialError::SsidContainsSeparator)
        ));
        assert!(radio.associations().is_empty());
    }

    #[test]
    fn late_association_after_giving_up_is_adopted() {
        let config = SupervisorConfig {
            max_attempts: Some(1),
            ..SupervisorConfig::default()
        };
        let radio = MockRadio::new().with_statuses([ConnectFailed]);
        let (mut sup, _clock, _console) = supervisor(radio, config);

        assert!(matches!(
            sup.init("home", "secret123", "node-7"),
            Err(SupervisorError::RetriesExhausted { attempts: 1 })
        ));
        assert!(!sup.link().is_connected());

        // the association already begun has since completed
        assert_eq!(sup.monitor().unwrap(), LinkCheck::Healthy);
        assert!(sup.link().is_connected());
        assert_eq!(sup.phase(), Phase::Connected);
    }

    #[test]
    fn monitor_before_init_is_an_error() {
        let radio = MockRadio::new().with_statuses([Disconnected]);
        let (mut sup, _clock, _console) = supervisor(radio, SupervisorConfig::default());

        assert!(matches!(sup.monitor(), Err(SupervisorError::NotInitialized)));
    }

    #[test]
    fn monitor_healthy_touches_nothing() {
        let radio = MockRadio::new();
        let (mut sup, clock, console) = supervisor(radio.clone(), SupervisorConfig::default());
        sup.init("home", "secret123", "node-7").unwrap();
        radio.clear_calls();
        let before = sup.link().snapshot();
        let lines = console.lines().len();
        let queries = radio.status_queries();

        assert_eq!(sup.monitor().unwrap(), LinkCheck::Healthy);

        assert_eq!(sup.link().snapshot(), before);
        assert!(radio.calls().is_empty());
        assert_eq!(sup.radio().status_queries(), queries + 1);
        assert_eq!(console.lines().len(), lines);
        assert_eq!(clock.sleeps(), 0);
    }

    #[test]
    fn list_networks_prints_table() {
        let radio = MockRadio::new().with_networks(&[("home", -40), ("lab", -70)]);
        let (mut sup, _clock, console) = supervisor(radio, SupervisorConfig::default());

        let networks = sup.list_networks().unwrap();

        assert_eq!(networks.len(), 2);
        assert!(console.contains("Number of available networks: 2"));
        assert!(console.contains("1) lab\tSignal: -70 dBm\tEncryption: WPA2_PSK"));
    }

    #[test]
    fn signal_strength_is_stable() {
        let radio = MockRadio::new().with_rssi(-63);
        let (sup, _clock, _console) = supervisor(radio, SupervisorConfig::default());

        assert_eq!(sup.get_signal_strength(), -63);
        assert_eq!(sup.get_signal_strength(), sup.get_signal_strength());
    }
}
