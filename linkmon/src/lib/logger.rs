use std::sync::Arc;

use data_model::{Facility, Severity};

use crate::link::LinkState;
use crate::radio::Console;
use crate::syslog::{SyslogProtocol, SyslogRecord, Transport};

pub const DEFAULT_APP_NAME: &str = "linkmon";

/// Marker printed in front of messages that could not go to the collector
pub const LINK_DOWN_MARKER: &str = "WiFi disconnected: Syslog serial fallback";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggerConfig {
    pub hostname: String,
    pub app_name: String,
    pub facility: Facility,
    pub protocol: SyslogProtocol,
    /// Keep messages on the console even while the link is up
    pub local_only: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        LoggerConfig {
            hostname: String::new(),
            app_name: DEFAULT_APP_NAME.to_owned(),
            facility: Facility::Kern,
            protocol: SyslogProtocol::Ietf,
            local_only: false,
        }
    }
}

/// Severity-tagged messages to a remote syslog collector, or to the console while the link is
/// down. Every `log_*` returns whether the message was handled as configured: `false` means it
/// did not reach the collector. Nothing here ever fails loudly.
pub struct Logger {
    transport: Box<dyn Transport>,
    console: Arc<dyn Console>,
    link: LinkState,
    config: LoggerConfig,
}

impl Logger {
    pub fn new(
        config: LoggerConfig,
        transport: Box<dyn Transport>,
        console: Arc<dyn Console>,
        link: LinkState,
    ) -> Self {
        if config.local_only {
            log::info!("Remote logging disabled: messages stay on the console");
        }
        Logger {
            transport,
            console,
            link,
            config,
        }
    }

    pub fn config(&self) -> &LoggerConfig {
        &self.config
    }

    pub fn log(&self, message: &str) -> bool {
        self.log_info(message)
    }

    pub fn log_debug(&self, message: &str) -> bool {
        self.log_at(Severity::Debug, message)
    }

    pub fn log_info(&self, message: &str) -> bool {
        self.log_at(Severity::Info, message)
    }

    pub fn log_warn(&self, message: &str) -> bool {
        self.log_at(Severity::Warn, message)
    }

    pub fn log_error(&self, message: &str) -> bool {
        self.log_at(Severity::Error, message)
    }

    pub fn log_at(&self, severity: Severity, message: &str) -> bool {
        if !self.link.is_connected() {
            self.console
                .write_line(&format!("{LINK_DOWN_MARKER} [{severity}]: {message}"));
            return false;
        }

        if self.config.local_only {
            self.console.write_line(&format!("[{severity}] {message}"));
            return true;
        }

        let record = SyslogRecord {
            severity,
            facility: self.config.facility,
            hostname: &self.config.hostname,
            app_name: &self.config.app_name,
            message,
        };
        match self.transport.send(&record.encode(self.config.protocol)) {
            Ok(()) => true,
            Err(e) => {
                log::debug!("Could not send {severity} message to collector: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_utils::{RecordingConsole, RecordingTransport};

    fn logger(local_only: bool) -> (Logger, LinkState, RecordingTransport, Arc<RecordingConsole>) {
        let link = LinkState::new();
        let transport = RecordingTransport::new();
        let console = Arc::new(RecordingConsole::new());
        let config = LoggerConfig {
            hostname: "node-7".into(),
            local_only,
            ..LoggerConfig::default()
        };
        let logger = Logger::new(
            config,
            Box::new(transport.clone()),
            console.clone(),
            link.clone(),
        );
        (logger, link, transport, console)
    }

    #[test]
    fn disconnected_falls_back_to_console() {
        let (logger, _link, transport, console) = logger(false);

        assert!(!logger.log_debug("a"));
        assert!(!logger.log_info("b"));
        assert!(!logger.log_warn("c"));
        assert!(!logger.log_error("d"));
        assert!(!logger.log("e"));

        assert!(transport.datagrams().is_empty());
        assert_eq!(
            console.lines(),
            vec![
                format!("{LINK_DOWN_MARKER} [debug]: a"),
                format!("{LINK_DOWN_MARKER} [info]: b"),
                format!("{LINK_DOWN_MARKER} [warn]: c"),
                format!("{LINK_DOWN_MARKER} [error]: d"),
                format!("{LINK_DOWN_MARKER} [info]: e"),
            ]
        );
    }

    #[test]
    fn connected_sends_one_datagram_per_message() {
        let (logger, link, transport, console) = logger(false);
        link.set_connected(true);

        assert!(logger.log_error("boom"));
        assert!(logger.log("fine"));

        assert_eq!(
            transport.messages(),
            vec![
                "<3>1 - node-7 linkmon - - - \u{FEFF}boom".to_string(),
                "<6>1 - node-7 linkmon - - - \u{FEFF}fine".to_string(),
            ]
        );
        assert!(console.lines().is_empty());
    }

    #[test]
    fn local_only_keeps_messages_on_console() {
        let (logger, link, transport, console) = logger(true);
        link.set_connected(true);

        assert!(logger.log_warn("careful"));
        assert!(transport.datagrams().is_empty());
        assert_eq!(console.lines(), vec!["[warn] careful".to_string()]);
    }

    #[test]
    fn transport_failure_is_reported_not_raised() {
        let (logger, link, transport, _console) = logger(false);
        link.set_connected(true);
        transport.fail_sends(true);

        assert!(!logger.log_info("lost"));
        assert!(transport.datagrams().is_empty());
    }
}
