use std::fmt::{self, Debug, Display, Formatter};
use std::str::FromStr;

use serde_derive::{Deserialize, Serialize};
use thiserror::Error;

/// Longest SSID a radio stack will accept (802.11 limit).
pub const SSID_MAX: usize = 32;
/// Longest WPA passphrase a radio stack will accept.
pub const PASSWORD_MAX: usize = 63;

/// Separator between ssid and password in a raw network entry.
pub const CREDENTIAL_SEPARATOR: char = ':';

/// Status code reported by the radio stack for the station interface
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LinkStatus {
    NoShield,
    Idle,
    NoSsidAvailable,
    ScanCompleted,
    Connected,
    ConnectFailed,
    ConnectionLost,
    Disconnected,
    /// Any code the radio stack reports that has no named meaning here
    Other(u8),
}

impl LinkStatus {
    /// Map a raw radio-stack status code to a `LinkStatus`
    pub const fn from_code(code: u8) -> Self {
        match code {
            0 => LinkStatus::Idle,
            1 => LinkStatus::NoSsidAvailable,
            2 => LinkStatus::ScanCompleted,
            3 => LinkStatus::Connected,
            4 => LinkStatus::ConnectFailed,
            5 => LinkStatus::ConnectionLost,
            6 => LinkStatus::Disconnected,
            255 => LinkStatus::NoShield,
            other => LinkStatus::Other(other),
        }
    }

    pub const fn code(self) -> u8 {
        match self {
            LinkStatus::Idle => 0,
            LinkStatus::NoSsidAvailable => 1,
            LinkStatus::ScanCompleted => 2,
            LinkStatus::Connected => 3,
            LinkStatus::ConnectFailed => 4,
            LinkStatus::ConnectionLost => 5,
            LinkStatus::Disconnected => 6,
            LinkStatus::NoShield => 255,
            LinkStatus::Other(code) => code,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            LinkStatus::NoShield => "No shield",
            LinkStatus::Idle => "Idle",
            LinkStatus::NoSsidAvailable => "No SSID available",
            LinkStatus::ScanCompleted => "Scan completed",
            LinkStatus::Connected => "Connected",
            LinkStatus::ConnectFailed => "Connect failed",
            LinkStatus::ConnectionLost => "Connection lost",
            LinkStatus::Disconnected => "Disconnected",
            LinkStatus::Other(_) => "unknown return",
        }
    }
}

impl Display for LinkStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            LinkStatus::Other(code) => write!(f, "{} ({code})", self.label()),
            _ => f.write_str(self.label()),
        }
    }
}

/// True for statuses that mean the current association attempt has failed
pub fn is_error_status(status: LinkStatus) -> bool {
    matches!(
        status,
        LinkStatus::NoSsidAvailable | LinkStatus::ConnectFailed | LinkStatus::ConnectionLost
    )
}

/// True only when the station is associated
pub fn is_success_status(status: LinkStatus) -> bool {
    matches!(status, LinkStatus::Connected)
}

/// True for every status that is neither an error nor success: keep waiting.
pub fn is_neutral_status(status: LinkStatus) -> bool {
    match status {
        LinkStatus::Idle | LinkStatus::ScanCompleted | LinkStatus::Disconnected => true,
        other => !is_error_status(other) && !is_success_status(other),
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CredentialError {
    #[error("missing ':' between ssid and password")]
    MissingSeparator,
    #[error("ssid is empty")]
    EmptySsid,
    #[error("ssid contains the ':' separator")]
    SsidContainsSeparator,
    #[error("ssid is {0} bytes, the limit is 32")]
    SsidTooLong(usize),
    #[error("password is {0} bytes, the limit is 63")]
    PasswordTooLong(usize),
}

/// An ssid and password pair used to associate with a network
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    ssid: String,
    password: String,
}

impl Credential {
    pub fn new(ssid: &str, password: &str) -> Result<Self, CredentialError> {
        if ssid.is_empty() {
            return Err(CredentialError::EmptySsid);
        }
        if ssid.contains(CREDENTIAL_SEPARATOR) {
            return Err(CredentialError::SsidContainsSeparator);
        }
        if ssid.len() > SSID_MAX {
            return Err(CredentialError::SsidTooLong(ssid.len()));
        }
        if password.len() > PASSWORD_MAX {
            return Err(CredentialError::PasswordTooLong(password.len()));
        }
        Ok(Credential {
            ssid: ssid.to_owned(),
            password: password.to_owned(),
        })
    }

    /// Parse a raw `"ssid:password"` entry. Only the first colon separates the two,
    /// so passwords may contain colons and ssids may not.
    pub fn parse(entry: &str) -> Result<Self, CredentialError> {
        let (ssid, password) = entry
            .split_once(CREDENTIAL_SEPARATOR)
            .ok_or(CredentialError::MissingSeparator)?;
        Credential::new(ssid, password)
    }

    pub fn ssid(&self) -> &str {
        &self.ssid
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl FromStr for Credential {
    type Err = CredentialError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Credential::parse(s)
    }
}

// Never print the password
impl Debug for Credential {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("ssid", &self.ssid)
            .field("password", &"***")
            .finish()
    }
}

impl Display for Credential {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.ssid)
    }
}

/// Security used by a visible network
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthMethod {
    Open,
    Wep,
    WpaPsk,
    Wpa2Psk,
    WpaWpa2Psk,
    Wpa2Enterprise,
    Wpa3Psk,
    Wpa2Wpa3Psk,
    WapiPsk,
    Unknown(u8),
}

impl AuthMethod {
    /// Map a raw radio-stack authentication mode code
    pub const fn from_code(code: u8) -> Self {
        match code {
            0 => AuthMethod::Open,
            1 => AuthMethod::Wep,
            2 => AuthMethod::WpaPsk,
            3 => AuthMethod::Wpa2Psk,
            4 => AuthMethod::WpaWpa2Psk,
            5 => AuthMethod::Wpa2Enterprise,
            6 => AuthMethod::Wpa3Psk,
            7 => AuthMethod::Wpa2Wpa3Psk,
            8 => AuthMethod::WapiPsk,
            other => AuthMethod::Unknown(other),
        }
    }

    /// Interpret the free-form security column printed by host scanners,
    /// e.g. `"WPA1 WPA2"`, `"WPA2 802.1X"` or `"--"` for an open network.
    pub fn from_security(security: &str) -> Self {
        let upper = security.trim().to_ascii_uppercase();
        let tokens: Vec<&str> = upper
            .split(|c: char| c.is_whitespace() || c == '/' || c == ',')
            .filter(|t| !t.is_empty())
            .collect();

        if tokens.is_empty() || tokens.iter().all(|t| *t == "--" || *t == "OPEN" || *t == "NONE") {
            return AuthMethod::Open;
        }

        let has = |name: &str| tokens.iter().any(|t| *t == name);
        let wpa1 = has("WPA") || has("WPA1");
        let wpa2 = has("WPA2");
        let wpa3 = has("WPA3") || has("SAE");

        if has("802.1X") || has("EAP") || has("ENTERPRISE") {
            AuthMethod::Wpa2Enterprise
        } else if wpa2 && wpa3 {
            AuthMethod::Wpa2Wpa3Psk
        } else if wpa3 {
            AuthMethod::Wpa3Psk
        } else if wpa1 && wpa2 {
            AuthMethod::WpaWpa2Psk
        } else if wpa2 {
            AuthMethod::Wpa2Psk
        } else if wpa1 {
            AuthMethod::WpaPsk
        } else if has("WEP") {
            AuthMethod::Wep
        } else if has("WAPI") {
            AuthMethod::WapiPsk
        } else {
            AuthMethod::Unknown(u8::MAX)
        }
    }
}

impl Display for AuthMethod {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            AuthMethod::Open => write!(f, "Open"),
            AuthMethod::Wep => write!(f, "WEP"),
            AuthMethod::WpaPsk => write!(f, "WPA_PSK"),
            AuthMethod::Wpa2Psk => write!(f, "WPA2_PSK"),
            AuthMethod::WpaWpa2Psk => write!(f, "WPA_WPA2_PSK"),
            AuthMethod::Wpa2Enterprise => write!(f, "WPA2_ENTERPRISE"),
            AuthMethod::Wpa3Psk => write!(f, "WPA3_PSK"),
            AuthMethod::Wpa2Wpa3Psk => write!(f, "WPA2_WPA3_PSK"),
            AuthMethod::WapiPsk => write!(f, "WAPI_PSK"),
            AuthMethod::Unknown(code) => write!(f, "unknown={code}"),
        }
    }
}

/// One network seen during a scan
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetworkInfo {
    pub ssid: String,
    /// Received signal strength in dBm
    pub rssi: i32,
    pub auth: AuthMethod,
}

impl Display for NetworkInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\tSignal: {} dBm\tEncryption: {}",
            self.ssid, self.rssi, self.auth
        )
    }
}

/// Severity attached to a message sent to the log collector
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warn,
    Info,
    Debug,
}

impl Severity {
    /// syslog severity number
    pub const fn code(self) -> u8 {
        match self {
            Severity::Error => 3,
            Severity::Warn => 4,
            Severity::Info => 6,
            Severity::Debug => 7,
        }
    }
}

impl Display for Severity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warn => write!(f, "warn"),
            Severity::Info => write!(f, "info"),
            Severity::Debug => write!(f, "debug"),
        }
    }
}

/// syslog facility tag, fixed for the lifetime of a logger
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Facility {
    #[default]
    Kern,
    User,
    Daemon,
    Local0,
    Local1,
    Local2,
    Local3,
    Local4,
    Local5,
    Local6,
    Local7,
}

impl Facility {
    pub const fn code(self) -> u8 {
        match self {
            Facility::Kern => 0,
            Facility::User => 1,
            Facility::Daemon => 3,
            Facility::Local0 => 16,
            Facility::Local1 => 17,
            Facility::Local2 => 18,
            Facility::Local3 => 19,
            Facility::Local4 => 20,
            Facility::Local5 => 21,
            Facility::Local6 => 22,
            Facility::Local7 => 23,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(LinkStatus::NoSsidAvailable)]
    #[case(LinkStatus::ConnectFailed)]
    #[case(LinkStatus::ConnectionLost)]
    fn error_statuses_are_only_errors(#[case] status: LinkStatus) {
        assert!(is_error_status(status));
        assert!(!is_success_status(status));
        assert!(!is_neutral_status(status));
    }

    #[test]
    fn connected_is_only_success() {
        assert!(is_success_status(LinkStatus::Connected));
        assert!(!is_error_status(LinkStatus::Connected));
        assert!(!is_neutral_status(LinkStatus::Connected));
    }

    #[rstest]
    #[case(LinkStatus::Idle)]
    #[case(LinkStatus::ScanCompleted)]
    #[case(LinkStatus::Disconnected)]
    #[case(LinkStatus::NoShield)]
    #[case(LinkStatus::Other(42))]
    fn everything_else_is_neutral(#[case] status: LinkStatus) {
        assert!(is_neutral_status(status));
        assert!(!is_error_status(status));
        assert!(!is_success_status(status));
    }

    #[test]
    fn every_code_has_exactly_one_class() {
        for code in 0..=u8::MAX {
            let status = LinkStatus::from_code(code);
            let classes = [
                is_error_status(status),
                is_success_status(status),
                is_neutral_status(status),
            ];
            assert_eq!(classes.iter().filter(|c| **c).count(), 1, "{status:?}");
            assert_eq!(status.code(), code);
        }
    }

    #[test]
    fn parse_splits_on_first_colon() {
        let credential = Credential::parse("ssid:pa:ss").unwrap();
        assert_eq!(credential.ssid(), "ssid");
        assert_eq!(credential.password(), "pa:ss");
    }

    #[test]
    fn parse_allows_empty_password() {
        let credential: Credential = "cafe:".parse().unwrap();
        assert_eq!(credential.ssid(), "cafe");
        assert_eq!(credential.password(), "");
    }

    #[rstest]
    #[case("noseparator", CredentialError::MissingSeparator)]
    #[case(":secret", CredentialError::EmptySsid)]
    fn malformed_entries_are_rejected(#[case] entry: &str, #[case] expected: CredentialError) {
        assert_eq!(Credential::parse(entry), Err(expected));
    }

    #[rstest]
    #[case("ho:me", "pw", CredentialError::SsidContainsSeparator)]
    #[case(":", "pw", CredentialError::SsidContainsSeparator)]
    #[case("", "pw", CredentialError::EmptySsid)]
    fn new_rejects_bad_ssids(
        #[case] ssid: &str,
        #[case] password: &str,
        #[case] expected: CredentialError,
    ) {
        assert_eq!(Credential::new(ssid, password), Err(expected));
    }

    #[test]
    fn length_limits() {
        let long_ssid = format!("{}:pw", "s".repeat(SSID_MAX + 1));
        assert_eq!(
            Credential::parse(&long_ssid),
            Err(CredentialError::SsidTooLong(SSID_MAX + 1))
        );

        let long_password = format!("home:{}", "p".repeat(PASSWORD_MAX + 1));
        assert_eq!(
            Credential::parse(&long_password),
            Err(CredentialError::PasswordTooLong(PASSWORD_MAX + 1))
        );

        let at_limit = format!("{}:{}", "s".repeat(SSID_MAX), "p".repeat(PASSWORD_MAX));
        assert!(Credential::parse(&at_limit).is_ok());
    }

    #[test]
    fn debug_hides_password() {
        let credential = Credential::new("home", "secret123").unwrap();
        let printed = format!("{credential:?}");
        assert!(printed.contains("home"));
        assert!(!printed.contains("secret123"));
    }

    #[rstest]
    #[case("", AuthMethod::Open)]
    #[case("--", AuthMethod::Open)]
    #[case("WEP", AuthMethod::Wep)]
    #[case("WPA1", AuthMethod::WpaPsk)]
    #[case("WPA2", AuthMethod::Wpa2Psk)]
    #[case("WPA1 WPA2", AuthMethod::WpaWpa2Psk)]
    #[case("WPA2 802.1X", AuthMethod::Wpa2Enterprise)]
    #[case("WPA3", AuthMethod::Wpa3Psk)]
    #[case("WPA2 WPA3", AuthMethod::Wpa2Wpa3Psk)]
    #[case("mystery", AuthMethod::Unknown(u8::MAX))]
    fn security_strings(#[case] security: &str, #[case] expected: AuthMethod) {
        assert_eq!(AuthMethod::from_security(security), expected);
    }

    #[test]
    fn network_line() {
        let network = NetworkInfo {
            ssid: "lab".into(),
            rssi: -61,
            auth: AuthMethod::from_code(3),
        };
        assert_eq!(
            network.to_string(),
            "lab\tSignal: -61 dBm\tEncryption: WPA2_PSK"
        );
    }

    #[test]
    fn severity_codes() {
        assert_eq!(Severity::Error.code(), 3);
        assert_eq!(Severity::Warn.code(), 4);
        assert_eq!(Severity::Info.code(), 6);
        assert_eq!(Severity::Debug.code(), 7);
        assert_eq!(Severity::Warn.to_string(), "warn");
    }

    #[test]
    fn facility_from_config() {
        #[derive(serde_derive::Deserialize)]
        struct Wrapper {
            facility: Facility,
        }
        let wrapper: Wrapper = toml::from_str("facility = \"Local3\"\n").unwrap();
        assert_eq!(wrapper.facility, Facility::Local3);
        assert_eq!(wrapper.facility.code(), 19);
        assert_eq!(Facility::default(), Facility::Kern);
    }
}
