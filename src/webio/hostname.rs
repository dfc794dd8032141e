use std::net::{Ipv4Addr, Ipv6Addr};
use url::{Host, Url};

/// Hosts reserved for documentation and examples (RFC 2606, 1918, 5737, 3849).
///
/// Links to these are placeholders by convention and are never fetched.
pub fn is_documentation_hostname(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => {
            let domain = domain.to_ascii_lowercase();
            domain == "localhost"
                || domain.contains("example.com")
                || domain.contains("example.org")
                || domain.contains("example.net")
                || domain.ends_with(".example")
        }
        Some(Host::Ipv4(ip)) => is_documentation_ipv4(ip),
        Some(Host::Ipv6(ip)) => is_documentation_ipv6(ip),
        None => false,
    }
}

fn is_documentation_ipv4(ip: Ipv4Addr) -> bool {
    let [a, b, c, _] = ip.octets();
    ip.is_loopback()
        || ip.is_unspecified()
        || a == 10
        || (a == 192 && b == 168)
        || (a == 172 && (16..=31).contains(&b))
        || (a == 192 && b == 0 && c == 2)
        || (a == 198 && b == 51 && c == 100)
        || (a == 203 && b == 0 && c == 113)
}

fn is_documentation_ipv6(ip: Ipv6Addr) -> bool {
    let segments = ip.segments();
    ip.is_unspecified() || ip.is_loopback() || (segments[0] == 0x2001 && segments[1] == 0x0db8)
}
