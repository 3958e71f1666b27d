use std::error::Error;
use std::io;
use std::sync::mpsc::channel;
use std::sync::Arc;

use linkmon::config::{find_config_file, read_config, Config, CONFIG_FILE_NAME};
use linkmon::{
    CancelToken, Console, LinkState, Logger, StdoutConsole, Supervisor, SystemClock, Transport,
    UdpTransport,
};
use machineid_rs::{Encryption, HWIDComponent, IdBuilder};
use tracing_subscriber::EnvFilter;

use host::{HostRadio, DEFAULT_INTERFACE};

mod host;
mod monitor;

/// Stands in for the collector when none is configured, so messages stay on the console
struct NoCollector;

impl Transport for NoCollector {
    fn send(&self, _datagram: &[u8]) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::NotConnected,
            "no syslog collector configured",
        ))
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config_file_path = find_config_file(CONFIG_FILE_NAME)?;
    let config = read_config(&config_file_path)?;
    println!("Config file loaded from: \"{}\"", config_file_path.display());

    let hostname = match config.hostname() {
        Some(name) => name.to_owned(),
        None => default_hostname()?,
    };
    println!("Hostname = {hostname}");

    let link = LinkState::new();
    let console: Arc<dyn Console> = Arc::new(StdoutConsole);
    let logger = build_logger(&config, &hostname, console.clone(), link.clone())?;
    let logger_config = logger.config();
    log::info!(
        "Logging as '{}' on {} with facility {:?}",
        logger_config.app_name,
        logger_config.hostname,
        logger_config.facility
    );

    let cancel = CancelToken::new();
    let (tx, rx) = channel();
    let handler_cancel = cancel.clone();
    ctrlc::set_handler(move || {
        handler_cancel.cancel();
        if let Err(e) = tx.send(()) {
            log::debug!("Could not send signal on channel: {e}");
        }
    })?;

    let radio = HostRadio::new(config.interface().unwrap_or(DEFAULT_INTERFACE));
    let mut supervisor = Supervisor::new(
        radio,
        SystemClock::new(),
        console,
        link,
        config.supervisor_config(),
    )
    .with_logger(&logger)
    .with_cancel_token(cancel);

    monitor::monitor_loop(&mut supervisor, &logger, &config, &hostname, rx)?;

    Ok(())
}

fn build_logger(
    config: &Config,
    hostname: &str,
    console: Arc<dyn Console>,
    link: LinkState,
) -> Result<Logger, io::Error> {
    let mut logger_config = config.logger_config(hostname);

    let transport: Box<dyn Transport> = match &config.collector_url {
        Some(url) => {
            let transport = UdpTransport::from_url(url)?;
            println!("Logging to syslog collector at {}", transport.collector());
            Box::new(transport)
        }
        None => {
            logger_config.local_only = true;
            Box::new(NoCollector)
        }
    };

    Ok(Logger::new(logger_config, transport, console, link))
}

/// A hostname that is stable for this machine
fn default_hostname() -> Result<String, io::Error> {
    let mut builder = IdBuilder::new(Encryption::SHA256);
    builder
        .add_component(HWIDComponent::CPUID)
        .add_component(HWIDComponent::SystemID);
    let id = builder
        .build("linkmon")
        .map_err(|_| io::Error::new(io::ErrorKind::NotFound, "Could not build unique machine id"))?;

    Ok(format!(
        "linkmon-{}",
        id.chars().take(8).collect::<String>().to_ascii_lowercase()
    ))
}
