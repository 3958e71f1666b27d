//! `Radio` for a Linux host, driving NetworkManager with `nmcli` and reading link details with
//! `iw`. Association runs as a child `nmcli` process so that `begin_association` returns at once
//! and progress is picked up by `query_status`.

use std::io;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use linkmon::{LinkStatus, NetworkInfo, Radio, RadioError};

pub(crate) const DEFAULT_INTERFACE: &str = "wlan0";

pub(crate) struct HostRadio {
    interface: String,
    pending: Option<Child>,
    spawn_failed: bool,
    was_connected: bool,
}

impl HostRadio {
    pub(crate) fn new(interface: &str) -> Self {
        HostRadio {
            interface: interface.to_owned(),
            pending: None,
            spawn_failed: false,
            was_connected: false,
        }
    }

    fn nmcli(&self, args: &[&str]) -> io::Result<String> {
        run("nmcli", args)
    }

    fn iw(&self, args: &[&str]) -> io::Result<String> {
        run("iw", args)
    }

    fn kill_pending(&mut self) {
        if let Some(mut child) = self.pending.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }

    /// Status of an association still being worked on by a child `nmcli`, if any
    fn pending_status(&mut self) -> Option<LinkStatus> {
        let child = self.pending.as_mut()?;
        match child.try_wait() {
            Ok(None) => Some(LinkStatus::Idle),
            Ok(Some(exit)) => {
                self.pending = None;
                if exit.success() {
                    None
                } else {
                    log::debug!("nmcli connect exited with {exit}");
                    Some(LinkStatus::ConnectFailed)
                }
            }
            Err(e) => {
                log::warn!("Could not check on nmcli connect: {e}");
                self.pending = None;
                Some(LinkStatus::ConnectFailed)
            }
        }
    }
}

impl Drop for HostRadio {
    fn drop(&mut self) {
        self.kill_pending();
    }
}

impl Radio for HostRadio {
    fn set_hostname(&mut self, name: &str) {
        // DHCP announces the system hostname
        if let Err(e) = self.nmcli(&["general", "hostname", name]) {
            log::warn!("Could not set hostname to '{name}': {e}");
        }
    }

    fn begin_association(&mut self, ssid: &str, password: &str) {
        self.kill_pending();

        let mut command = Command::new("nmcli");
        command.args(["device", "wifi", "connect", ssid]);
        if !password.is_empty() {
            command.args(["password", password]);
        }
        command
            .args(["ifname", self.interface.as_str()])
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        match command.spawn() {
            Ok(child) => self.pending = Some(child),
            Err(e) => {
                log::warn!("Could not start nmcli to connect to '{ssid}': {e}");
                self.spawn_failed = true;
            }
        }
    }

    fn disassociate(&mut self) {
        self.kill_pending();
        if let Err(e) = self.nmcli(&["device", "disconnect", self.interface.as_str()]) {
            log::debug!("nmcli disconnect: {e}");
        }
    }

    fn set_station_mode(&mut self) {
        if let Err(e) = self.nmcli(&["radio", "wifi", "on"]) {
            log::warn!("Could not switch wifi radio on: {e}");
        }
    }

    fn query_status(&mut self) -> LinkStatus {
        if std::mem::take(&mut self.spawn_failed) {
            return LinkStatus::ConnectFailed;
        }
        if let Some(status) = self.pending_status() {
            return status;
        }

        let status = match self.nmcli(&["-t", "-f", "DEVICE,STATE", "device"]) {
            Ok(output) => parse_device_state(&output, &self.interface),
            Err(e) => {
                log::warn!("Could not query device state: {e}");
                LinkStatus::NoShield
            }
        };

        match status {
            LinkStatus::Connected => self.was_connected = true,
            LinkStatus::Disconnected if self.was_connected => {
                self.was_connected = false;
                return LinkStatus::ConnectionLost;
            }
            _ => {}
        }
        status
    }

    #[cfg(feature = "scan")]
    fn scan_networks(&mut self, timeout: Duration) -> Result<Vec<NetworkInfo>, RadioError> {
        use std::sync::mpsc;
        use std::thread;

        // wifiscanner has no timeout of its own
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("wifi-scan".into())
            .spawn(move || {
                if tx.send(wifiscanner::scan()).is_err() {
                    log::debug!("Scan finished after its result was no longer wanted");
                }
            })?;

        match rx.recv_timeout(timeout) {
            Ok(Ok(wifis)) => Ok(wifis
                .iter()
                .map(|wifi| NetworkInfo {
                    ssid: wifi.ssid.clone(),
                    rssi: parse_signal_level(&wifi.signal_level),
                    auth: linkmon::AuthMethod::from_security(&wifi.security),
                })
                .collect()),
            Ok(Err(e)) => Err(RadioError::Scan(format!("{e:?}"))),
            Err(_) => Err(RadioError::ScanTimeout(timeout)),
        }
    }

    #[cfg(not(feature = "scan"))]
    fn scan_networks(&mut self, _timeout: Duration) -> Result<Vec<NetworkInfo>, RadioError> {
        Err(RadioError::Unsupported)
    }

    fn current_ssid(&self) -> String {
        self.iw(&["dev", self.interface.as_str(), "info"])
            .ok()
            .and_then(|output| parse_ssid(&output))
            .unwrap_or_default()
    }

    fn current_address(&self) -> String {
        self.nmcli(&["-g", "IP4.ADDRESS", "device", "show", self.interface.as_str()])
            .ok()
            .and_then(|output| parse_address(&output))
            .unwrap_or_else(|| "0.0.0.0".to_owned())
    }

    fn signal_strength(&self) -> i32 {
        self.iw(&["dev", self.interface.as_str(), "link"])
            .ok()
            .and_then(|output| parse_link_signal(&output))
            .unwrap_or(0)
    }
}

fn run(program: &str, args: &[&str]) -> io::Result<String> {
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| io::Error::new(io::ErrorKind::NotFound, format!("Could not execute '{program}': {e}")))?;

    if !output.status.success() {
        return Err(io::Error::other(
            String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// State of `interface` from `nmcli -t -f DEVICE,STATE device`
fn parse_device_state(data: &str, interface: &str) -> LinkStatus {
    for line in data.lines() {
        let Some((device, state)) = line.trim().split_once(':') else {
            continue;
        };
        if device != interface {
            continue;
        }
        return match state {
            s if s.starts_with("connected") => LinkStatus::Connected,
            s if s.starts_with("connecting") => LinkStatus::Idle,
            "disconnected" | "deactivating" => LinkStatus::Disconnected,
            "unavailable" | "unmanaged" => LinkStatus::NoShield,
            _ => LinkStatus::Idle,
        };
    }

    LinkStatus::NoShield
}

/// SSID from `iw dev <interface> info`
fn parse_ssid(data: &str) -> Option<String> {
    data.lines()
        .find_map(|line| line.trim().strip_prefix("ssid "))
        .map(|ssid| ssid.trim().to_owned())
}

/// First IPv4 address, without prefix length, from `nmcli -g IP4.ADDRESS device show`
fn parse_address(data: &str) -> Option<String> {
    let first = data.lines().next()?.split('|').next()?.trim();
    let address = first.split('/').next()?.trim();
    (!address.is_empty()).then(|| address.to_owned())
}

/// Signal from `iw dev <interface> link`, e.g. `signal: -52 dBm`
fn parse_link_signal(data: &str) -> Option<i32> {
    data.lines()
        .find_map(|line| line.trim().strip_prefix("signal:"))
        .map(parse_signal_level)
}

fn parse_signal_level(level: &str) -> i32 {
    level
        .trim()
        .trim_end_matches("dBm")
        .trim()
        .parse::<f64>()
        .map(|dbm| dbm.round() as i32)
        .unwrap_or(0)
}
