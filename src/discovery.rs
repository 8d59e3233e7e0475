//! Bridge discovery via SSDP.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use log::debug;

use crate::errors::Error;
use crate::runtime::{self, AsyncUdpSocket, Instant, UdpSocket};

type Result<T> = std::result::Result<T, Error>;

/// How long [`discover_bridges`] listens when the caller has no preference.
pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(5);

const SSDP_ADDR: &str = "239.255.255.250:1900";

const M_SEARCH: &str = "M-SEARCH * HTTP/1.1\r\n\
HOST: 239.255.255.250:1900\r\n\
MAN: \"ssdp:discover\"\r\n\
MX: 3\r\n\
ST: ssdp:all\r\n\r\n";

/// A bridge that answered the discovery request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredBridge {
    pub address: IpAddr,
    /// Present when the bridge announced it
    pub bridge_id: Option<String>,
}

/// Discover Hue bridges on the local network.
///
/// Sends an SSDP search and collects every bridge that answers before
/// `discovery_timeout` ends. Reaching the timeout is not an error; whatever
/// answered so far is returned.
///
/// # Examples
///
/// ```ignore
/// use hue_mirror::{DEFAULT_DISCOVERY_TIMEOUT, discover_bridges};
///
/// let bridges = discover_bridges(DEFAULT_DISCOVERY_TIMEOUT).await?;
/// for bridge in bridges {
///     println!("{} {:?}", bridge.address, bridge.bridge_id);
/// }
/// ```
pub async fn discover_bridges(discovery_timeout: Duration) -> Result<Vec<DiscoveredBridge>> {
    let socket = UdpSocket::bind("0.0.0.0:0")
        .await
        .map_err(|e| Error::socket("bind", e))?;

    socket
        .send_to(M_SEARCH.as_bytes(), SSDP_ADDR)
        .await
        .map_err(|e| Error::socket("send_to", e))?;

    let mut discovered: HashMap<IpAddr, DiscoveredBridge> = HashMap::new();
    let start = Instant::now();
    let mut buffer = [0u8; 2048];
    let recv_timeout = Duration::from_millis(500);

    while start.elapsed() < discovery_timeout {
        match runtime::timeout(recv_timeout, socket.recv_from(&mut buffer)).await {
            Ok(Ok((size, addr))) => {
                let response = String::from_utf8_lossy(&buffer[..size]);
                if let Some(bridge_id) = parse_response(&response) {
                    let address = match addr {
                        SocketAddr::V4(v4) => IpAddr::V4(*v4.ip()),
                        SocketAddr::V6(v6) => IpAddr::V6(*v6.ip()),
                    };
                    debug!("bridge {:?} answered from {}", bridge_id, address);
                    discovered
                        .entry(address)
                        .and_modify(|known| {
                            if known.bridge_id.is_none() {
                                known.bridge_id = bridge_id.clone();
                            }
                        })
                        .or_insert(DiscoveredBridge { address, bridge_id });
                }
            }
            Ok(Err(e)) => {
                debug!("SSDP receive failed: {}", e);
                continue;
            }
            Err(_) => continue,
        }
    }

    Ok(discovered.into_values().collect())
}

/// Check whether an SSDP response came from a Hue bridge.
///
/// Returns `None` for other devices, otherwise the announced bridge id.
fn parse_response(response: &str) -> Option<Option<String>> {
    let mut is_bridge = false;
    let mut bridge_id = None;
    for line in response.lines() {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if name.trim().eq_ignore_ascii_case("hue-bridgeid") {
            is_bridge = true;
            bridge_id = Some(value.to_string());
        } else if value.contains("IpBridge") {
            is_bridge = true;
        }
    }
    is_bridge.then_some(bridge_id)
}
