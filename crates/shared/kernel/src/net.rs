use if_addrs::IfAddr;
use tracing::debug;

const LOOPBACK: &str = "127.0.0.1";

/// First non-loopback IPv4 address of this machine, or `127.0.0.1`.
#[must_use]
pub fn local_ip() -> String {
    let found = if_addrs::get_if_addrs().ok().and_then(|interfaces| {
        interfaces.into_iter().find_map(|iface| match iface.addr {
            IfAddr::V4(ref v4) if !iface.is_loopback() => Some(v4.ip.to_string()),
            _ => None,
        })
    });

    found.unwrap_or_else(|| {
        debug!("No external IPv4 interface found, falling back to loopback");
        LOOPBACK.to_owned()
    })
}
