//! Supervise a wireless station link and report on it through syslog.
//!
//! A [`Supervisor`] brings the link up (directly, or by picking the first visible network from
//! a list) and is then polled with [`Supervisor::monitor`] to bring it back whenever it drops.
//! A [`Logger`] sends severity-tagged messages to a remote collector while the link is up and
//! falls back to the console while it is down. Both share one [`LinkState`].

pub mod config;
pub mod link;
pub mod logger;
pub mod radio;
pub mod supervisor;
pub mod syslog;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use data_model::{AuthMethod, Credential, Facility, LinkStatus, NetworkInfo, Severity};
pub use link::{CancelToken, LinkState, SupervisorState};
pub use logger::{Logger, LoggerConfig};
pub use radio::{Clock, Console, Radio, RadioError, StdoutConsole, SystemClock};
pub use supervisor::{
    is_error_status, is_neutral_status, is_success_status, LinkCheck, Phase, Supervisor,
    SupervisorConfig, SupervisorError,
};
pub use syslog::{SyslogProtocol, Transport, UdpTransport};
