//! Geolocation lookup with private-address short-circuiting.

use std::net::IpAddr;
use std::str::FromStr;

/// GeoIP result. Fields default to `"Unknown"` — click rows never store
/// NULL geo values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeoInfo {
    pub country: String,
    pub region: String,
    pub city: String,
}

impl GeoInfo {
    fn unknown() -> Self {
        Self {
            country: "Unknown".to_string(),
            region: "Unknown".to_string(),
            city: "Unknown".to_string(),
        }
    }
}

/// MaxMind City reader opened once at startup. A missing database file is
/// non-fatal: lookups return `"Unknown"` fields and a warning is logged.
pub struct GeoResolver {
    reader: Option<maxminddb::Reader<Vec<u8>>>,
}

impl GeoResolver {
    pub fn open(path: &str) -> Self {
        let reader = match maxminddb::Reader::open_readfile(path) {
            Ok(reader) => Some(reader),
            Err(e) => {
                tracing::warn!(
                    geoip_path = %path,
                    error = %e,
                    "GeoIP database not available. Clicks stored with Unknown geo fields."
                );
                None
            }
        };
        Self { reader }
    }

    /// Resolve `ip` to country/region/city.
    ///
    /// Private, loopback and link-local addresses short-circuit to
    /// `"Unknown"` without touching the reader — they can never resolve and
    /// local traffic should not depend on the database being present.
    pub fn lookup(&self, ip: &str) -> GeoInfo {
        let Ok(addr) = IpAddr::from_str(ip) else {
            return GeoInfo::unknown();
        };
        if is_private_ip(addr) {
            return GeoInfo::unknown();
        }
        let Some(reader) = &self.reader else {
            return GeoInfo::unknown();
        };
        let Ok(record) = reader.lookup::<maxminddb::geoip2::City>(addr) else {
            return GeoInfo::unknown();
        };

        let country = record
            .country
            .as_ref()
            .and_then(|c| c.iso_code)
            .map(|s| s.to_string());
        let region = record
            .subdivisions
            .as_ref()
            .and_then(|subs| subs.first())
            .and_then(|sub| sub.names.as_ref())
            .and_then(|names| names.get("en"))
            .map(|s| s.to_string());
        let city = record
            .city
            .as_ref()
            .and_then(|c| c.names.as_ref())
            .and_then(|names| names.get("en"))
            .map(|s| s.to_string());

        GeoInfo {
            country: country.unwrap_or_else(|| "Unknown".to_string()),
            region: region.unwrap_or_else(|| "Unknown".to_string()),
            city: city.unwrap_or_else(|| "Unknown".to_string()),
        }
    }
}

fn is_private_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unspecified()
                || v6.is_unique_local()
                || v6.is_unicast_link_local()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn private_and_local_ips_short_circuit() {
        let resolver = GeoResolver::open("/nonexistent/GeoLite2-City.mmdb");
        for ip in ["127.0.0.1", "10.0.0.5", "192.168.1.1", "::1", "0.0.0.0"] {
            assert_eq!(resolver.lookup(ip), GeoInfo::unknown(), "ip {ip}");
        }
    }

    #[test]
    fn unparseable_ip_is_unknown() {
        let resolver = GeoResolver::open("/nonexistent/GeoLite2-City.mmdb");
        assert_eq!(resolver.lookup("unknown"), GeoInfo::unknown());
    }
}
