use std::sync::mpsc::{Receiver, RecvTimeoutError};

use linkmon::config::Config;
use linkmon::{Clock, LinkCheck, Logger, Radio, Supervisor, SupervisorError};

/// Associate with the first visible known network, then check the link once per period until
/// told to exit.
pub(crate) fn monitor_loop<R: Radio, C: Clock>(
    supervisor: &mut Supervisor<'_, R, C>,
    logger: &Logger,
    config: &Config,
    hostname: &str,
    term_receiver: Receiver<()>,
) -> Result<(), SupervisorError> {
    match supervisor.init_from_list(config.networks(), hostname) {
        Ok(credential) => {
            logger.log_info(&format!("{hostname} associated with '{credential}'"));
        }
        Err(SupervisorError::Cancelled) => {
            println!("Exiting");
            return Ok(());
        }
        Err(e) => return Err(e),
    }

    // A "sleep", interruptible by a message to exit
    loop {
        match term_receiver.recv_timeout(config.period_duration) {
            Err(RecvTimeoutError::Timeout) => {}
            _ => break,
        }

        match supervisor.monitor() {
            Ok(LinkCheck::Healthy) => {
                logger.log_debug(&format!(
                    "Signal strength: {} dBm",
                    supervisor.get_signal_strength()
                ));
            }
            Ok(LinkCheck::Recovered {
                outage_ms,
                attempts,
            }) => log::info!("Link back after {attempts} attempt(s), {outage_ms}ms down"),
            Err(SupervisorError::Cancelled) => break,
            Err(e) => return Err(e),
        }
    }

    println!("Exiting");

    Ok(())
}
