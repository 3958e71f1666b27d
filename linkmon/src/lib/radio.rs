use std::io;
use std::thread;
use std::time::{Duration, Instant};

use data_model::{LinkStatus, NetworkInfo};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RadioError {
    #[error("scan did not complete within {0:?}")]
    ScanTimeout(Duration),
    #[error("scan failed: {0}")]
    Scan(String),
    #[error("scanning is not supported by this radio")]
    Unsupported,
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// The station-mode primitives of a wireless network stack.
///
/// Association is asynchronous: `begin_association` only starts it, and progress is observed
/// by polling `query_status`.
pub trait Radio {
    /// Name the device announces on the network
    fn set_hostname(&mut self, name: &str);

    fn begin_association(&mut self, ssid: &str, password: &str);

    fn disassociate(&mut self);

    /// Put the interface (back) into client mode
    fn set_station_mode(&mut self);

    fn query_status(&mut self) -> LinkStatus;

    /// Scan for visible networks, giving up after `timeout`
    fn scan_networks(&mut self, timeout: Duration) -> Result<Vec<NetworkInfo>, RadioError>;

    fn current_ssid(&self) -> String;

    fn current_address(&self) -> String;

    /// Received signal strength of the active association in dBm
    fn signal_strength(&self) -> i32;
}

/// Millisecond clock and delay
pub trait Clock {
    fn now_ms(&self) -> u64;

    fn sleep_ms(&self, duration_ms: u64);
}

/// Local, always available output for status lines and log fallback
pub trait Console {
    fn write_line(&self, text: &str);
}

/// `Clock` backed by the OS monotonic clock
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        SystemClock {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        SystemClock::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    fn sleep_ms(&self, duration_ms: u64) {
        thread::sleep(Duration::from_millis(duration_ms));
    }
}

#[derive(Default)]
pub struct StdoutConsole;

impl Console for StdoutConsole {
    fn write_line(&self, text: &str) {
        println!("{text}");
    }
}

#[cfg(test)]
mod test {
    use super::{Clock, SystemClock};

    #[test]
    fn system_clock_advances_across_sleep() {
        let clock = SystemClock::new();
        let before = clock.now_ms();
        clock.sleep_ms(5);
        assert!(clock.now_ms() >= before + 5);
    }
}
