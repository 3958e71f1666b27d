use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, io};

use data_model::Facility;
use serde_derive::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::logger::{LoggerConfig, DEFAULT_APP_NAME};
use crate::supervisor::{SupervisorConfig, CONNECT_POLL_MS, CONNECT_WAIT_MS, SCAN_TIMEOUT_MS};
use crate::syslog::SyslogProtocol;

pub const CONFIG_FILE_NAME: &str = "linkmon.toml";
const DEFAULT_PERIOD_SECONDS: u64 = 10;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} config file not found")]
    NotFound(String),
    #[error("Could not read config file: {0}")]
    Io(#[from] io::Error),
    #[error("Could not parse toml config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid collector url '{url}': {source}")]
    CollectorUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct WifiSpec {
    /// Name the device announces, defaults to one derived from the machine id
    pub hostname: Option<String>,
    /// Known networks as `"ssid:password"`, in order of preference
    #[serde(default)]
    pub networks: Vec<String>,
    /// Wireless interface for host radios
    pub interface: Option<String>,
    pub connect_wait_ms: Option<u64>,
    pub poll_interval_ms: Option<u64>,
    pub scan_timeout_ms: Option<u64>,
    pub max_attempts: Option<u32>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct LogSpec {
    /// `udp://host[:port]` of the syslog collector
    pub collector: Option<String>,
    pub app_name: Option<String>,
    pub facility: Option<Facility>,
    pub protocol: Option<SyslogProtocol>,
    pub local_only: Option<bool>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct MonitorSpec {
    /// Seconds between link checks
    pub period_seconds: Option<u64>,
}

#[derive(Default, Serialize, Deserialize)]
pub struct Config {
    pub wifi: Option<WifiSpec>,
    pub log: Option<LogSpec>,
    pub monitor: Option<MonitorSpec>,
    #[serde(skip)]
    pub period_duration: Duration,
    #[serde(skip)]
    pub collector_url: Option<Url>,
}

impl Config {
    pub fn networks(&self) -> &[String] {
        self.wifi.as_ref().map(|w| w.networks.as_slice()).unwrap_or_default()
    }

    pub fn hostname(&self) -> Option<&str> {
        self.wifi.as_ref().and_then(|w| w.hostname.as_deref())
    }

    pub fn interface(&self) -> Option<&str> {
        self.wifi.as_ref().and_then(|w| w.interface.as_deref())
    }

    pub fn supervisor_config(&self) -> SupervisorConfig {
        let wifi = self.wifi.as_ref();
        SupervisorConfig {
            connect_wait_ms: wifi
                .and_then(|w| w.connect_wait_ms)
                .unwrap_or(CONNECT_WAIT_MS),
            poll_interval_ms: wifi
                .and_then(|w| w.poll_interval_ms)
                .unwrap_or(CONNECT_POLL_MS),
            scan_timeout_ms: wifi
                .and_then(|w| w.scan_timeout_ms)
                .unwrap_or(SCAN_TIMEOUT_MS),
            max_attempts: wifi.and_then(|w| w.max_attempts),
        }
    }

    /// Logger settings, stamped with the hostname actually in use
    pub fn logger_config(&self, hostname: &str) -> LoggerConfig {
        let log = self.log.as_ref();
        LoggerConfig {
            hostname: hostname.to_owned(),
            app_name: log
                .and_then(|l| l.app_name.clone())
                .unwrap_or_else(|| DEFAULT_APP_NAME.to_owned()),
            facility: log.and_then(|l| l.facility).unwrap_or_default(),
            protocol: log.and_then(|l| l.protocol).unwrap_or_default(),
            local_only: log.and_then(|l| l.local_only).unwrap_or(false),
        }
    }
}

pub fn find_config_file(file_name: &str) -> Result<PathBuf, ConfigError> {
    let mut dir = env::current_dir().ok();

    // Loop until no parent director exists. (i.e. stop at "/")
    while let Some(directory) = dir {
        let config_path = directory.join(file_name);

        if config_path.exists() {
            return Ok(config_path);
        }

        dir = directory.parent().map(|p| p.to_path_buf());
    }

    Err(ConfigError::NotFound(file_name.to_owned()))
}

pub fn read_config(config_file_path: &Path) -> Result<Config, ConfigError> {
    let config_string = std::fs::read_to_string(config_file_path)?;
    parse_config(&config_string)
}

pub fn parse_config(config_string: &str) -> Result<Config, ConfigError> {
    let mut config: Config = toml::from_str(config_string)?;

    config.period_duration = Duration::from_secs(
        config
            .monitor
            .as_ref()
            .and_then(|spec| spec.period_seconds)
            .unwrap_or(DEFAULT_PERIOD_SECONDS),
    );

    config.collector_url = match config.log.as_ref().and_then(|l| l.collector.as_ref()) {
        Some(url_string) => {
            Some(
                Url::parse(url_string).map_err(|source| ConfigError::CollectorUrl {
                    url: url_string.clone(),
                    source,
                })?,
            )
        }
        None => None,
    };

    Ok(config)
}
