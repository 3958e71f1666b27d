//! syslog records and the datagram transport that carries them to a collector.

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};

use data_model::{Facility, Severity};
use serde_derive::{Deserialize, Serialize};
use url::Url;

pub const DEFAULT_SYSLOG_PORT: u16 = 514;
const NIL: &str = "-";
const BOM: &str = "\u{FEFF}";

/// Wire format of a record
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SyslogProtocol {
    /// RFC 5424
    #[default]
    Ietf,
    /// RFC 3164
    Bsd,
}

/// One message for the collector. Everything a datagram carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyslogRecord<'a> {
    pub severity: Severity,
    pub facility: Facility,
    pub hostname: &'a str,
    pub app_name: &'a str,
    pub message: &'a str,
}

impl SyslogRecord<'_> {
    pub fn priority(&self) -> u8 {
        self.facility.code() * 8 + self.severity.code()
    }

    pub fn encode(&self, protocol: SyslogProtocol) -> Vec<u8> {
        let text = match protocol {
            // no timestamp, procid, msgid or structured data
            SyslogProtocol::Ietf => format!(
                "<{}>1 {NIL} {} {} {NIL} {NIL} {NIL} {BOM}{}",
                self.priority(),
                or_nil(self.hostname),
                or_nil(self.app_name),
                self.message
            ),
            SyslogProtocol::Bsd => format!(
                "<{}>{} {}: {}",
                self.priority(),
                self.hostname,
                self.app_name,
                self.message
            ),
        };
        text.into_bytes()
    }
}

fn or_nil(field: &str) -> &str {
    if field.is_empty() {
        NIL
    } else {
        field
    }
}

/// Best-effort, connectionless delivery of one datagram
pub trait Transport {
    fn send(&self, datagram: &[u8]) -> io::Result<()>;
}

/// Sends datagrams to a fixed collector address over UDP
pub struct UdpTransport {
    socket: UdpSocket,
    collector: SocketAddr,
}

impl UdpTransport {
    pub fn new(host: &str, port: u16) -> io::Result<Self> {
        let collector = (host, port).to_socket_addrs()?.next().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("Could not resolve syslog collector '{host}'"),
            )
        })?;
        let bind_addr = if collector.is_ipv4() {
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
        } else {
            SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
        };
        let socket = UdpSocket::bind(bind_addr)?;
        socket.set_nonblocking(true)?;
        Ok(UdpTransport { socket, collector })
    }

    /// Build from a `udp://host[:port]` url, the port defaulting to 514
    pub fn from_url(url: &Url) -> io::Result<Self> {
        let host = url.host_str().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("No host in syslog collector url '{url}'"),
            )
        })?;
        // Url keeps the brackets around IPv6 literals
        let host = host.trim_start_matches('[').trim_end_matches(']');
        UdpTransport::new(host, url.port().unwrap_or(DEFAULT_SYSLOG_PORT))
    }

    pub fn collector(&self) -> SocketAddr {
        self.collector
    }
}

impl Transport for UdpTransport {
    fn send(&self, datagram: &[u8]) -> io::Result<()> {
        let sent = self.socket.send_to(datagram, self.collector)?;
        if sent == datagram.len() {
            Ok(())
        } else {
            Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("Sent {sent} of {} bytes", datagram.len()),
            ))
        }
    }
}
