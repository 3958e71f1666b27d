//! Scriptable stand-ins for the radio, clock, console and transport, exported for
//! integration tests.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use data_model::{AuthMethod, LinkStatus, NetworkInfo};
use parking_lot::Mutex;

use crate::radio::{Clock, Console, Radio, RadioError};
use crate::syslog::Transport;

/// Everything the supervisor asked the radio to do, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioCall {
    SetHostname(String),
    BeginAssociation { ssid: String, password: String },
    Disassociate,
    StationMode,
    Scan(Duration),
}

struct MockRadioState {
    statuses: VecDeque<LinkStatus>,
    then: LinkStatus,
    scan: Result<Vec<NetworkInfo>, String>,
    associated_ssid: String,
    address: String,
    rssi: i32,
    calls: Vec<RadioCall>,
    status_queries: usize,
}

/// Radio that replays a script of statuses, one per `query_status`, then repeats a fixed
/// status forever (`Connected` unless changed with `then_status`).
#[derive(Clone)]
pub struct MockRadio {
    state: Arc<Mutex<MockRadioState>>,
}

impl Default for MockRadio {
    fn default() -> Self {
        MockRadio::new()
    }
}

impl MockRadio {
    pub fn new() -> Self {
        MockRadio {
            state: Arc::new(Mutex::new(MockRadioState {
                statuses: VecDeque::new(),
                then: LinkStatus::Connected,
                scan: Ok(vec![]),
                associated_ssid: String::new(),
                address: "10.0.0.7".to_string(),
                rssi: -55,
                calls: vec![],
                status_queries: 0,
            })),
        }
    }

    pub fn with_statuses<I: IntoIterator<Item = LinkStatus>>(self, statuses: I) -> Self {
        self.push_statuses(statuses);
        self
    }

    pub fn then_status(self, status: LinkStatus) -> Self {
        self.set_then_status(status);
        self
    }

    /// Visible networks, given as `(ssid, rssi)`
    pub fn with_networks(self, networks: &[(&str, i32)]) -> Self {
        self.state.lock().scan = Ok(networks
            .iter()
            .map(|(ssid, rssi)| NetworkInfo {
                ssid: ssid.to_string(),
                rssi: *rssi,
                auth: AuthMethod::Wpa2Psk,
            })
            .collect());
        self
    }

    pub fn with_scan_error(self, message: &str) -> Self {
        self.state.lock().scan = Err(message.to_string());
        self
    }

    pub fn with_rssi(self, rssi: i32) -> Self {
        self.state.lock().rssi = rssi;
        self
    }

    /// Append to the status script, e.g. to simulate a later loss of the link
    pub fn push_statuses<I: IntoIterator<Item = LinkStatus>>(&self, statuses: I) {
        self.state.lock().statuses.extend(statuses);
    }

    pub fn set_then_status(&self, status: LinkStatus) {
        self.state.lock().then = status;
    }

    pub fn calls(&self) -> Vec<RadioCall> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// `(ssid, password)` of every association started
    pub fn associations(&self) -> Vec<(String, String)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                RadioCall::BeginAssociation { ssid, password } => Some((ssid, password)),
                _ => None,
            })
            .collect()
    }

    pub fn status_queries(&self) -> usize {
        self.state.lock().status_queries
    }
}

impl Radio for MockRadio {
    fn set_hostname(&mut self, name: &str) {
        self.state
            .lock()
            .calls
            .push(RadioCall::SetHostname(name.to_string()));
    }

    fn begin_association(&mut self, ssid: &str, password: &str) {
        let mut state = self.state.lock();
        state.associated_ssid = ssid.to_string();
        state.calls.push(RadioCall::BeginAssociation {
            ssid: ssid.to_string(),
            password: password.to_string(),
        });
    }

    fn disassociate(&mut self) {
        self.state.lock().calls.push(RadioCall::Disassociate);
    }

    fn set_station_mode(&mut self) {
        self.state.lock().calls.push(RadioCall::StationMode);
    }

    fn query_status(&mut self) -> LinkStatus {
        let mut state = self.state.lock();
        state.status_queries += 1;
        let then = state.then;
        state.statuses.pop_front().unwrap_or(then)
    }

    fn scan_networks(&mut self, timeout: Duration) -> Result<Vec<NetworkInfo>, RadioError> {
        let mut state = self.state.lock();
        state.calls.push(RadioCall::Scan(timeout));
        state.scan.clone().map_err(RadioError::Scan)
    }

    fn current_ssid(&self) -> String {
        self.state.lock().associated_ssid.clone()
    }

    fn current_address(&self) -> String {
        self.state.lock().address.clone()
    }

    fn signal_strength(&self) -> i32 {
        self.state.lock().rssi
    }
}

/// Clock that only moves when something sleeps on it
#[derive(Clone, Default)]
pub struct MockClock {
    now: Arc<AtomicU64>,
    sleeps: Arc<AtomicUsize>,
}

impl MockClock {
    pub fn starting_at(now_ms: u64) -> Self {
        MockClock {
            now: Arc::new(AtomicU64::new(now_ms)),
            sleeps: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn sleeps(&self) -> usize {
        self.sleeps.load(Ordering::SeqCst)
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }

    fn sleep_ms(&self, duration_ms: u64) {
        self.sleeps.fetch_add(1, Ordering::SeqCst);
        self.advance(duration_ms);
    }
}

#[derive(Default)]
pub struct RecordingConsole {
    lines: Mutex<Vec<String>>,
}

impl RecordingConsole {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    pub fn contains(&self, fragment: &str) -> bool {
        self.lines.lock().iter().any(|line| line.contains(fragment))
    }
}

impl Console for RecordingConsole {
    fn write_line(&self, text: &str) {
        self.lines.lock().push(text.to_string());
    }
}

/// Transport that keeps every datagram instead of sending it
#[derive(Clone, Default)]
pub struct RecordingTransport {
    datagrams: Arc<Mutex<Vec<Vec<u8>>>>,
    fail: Arc<AtomicBool>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following `send` fail
    pub fn fail_sends(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn datagrams(&self) -> Vec<Vec<u8>> {
        self.datagrams.lock().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.datagrams()
            .iter()
            .map(|d| String::from_utf8_lossy(d).into_owned())
            .collect()
    }
}

impl Transport for RecordingTransport {
    fn send(&self, datagram: &[u8]) -> io::Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "collector unreachable",
            ));
        }
        self.datagrams.lock().push(datagram.to_vec());
        Ok(())
    }
}
