use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};

use super::ConfigError;

pub const DEFAULT_SNMP_PORT: u16 = 161;

/// SNMP-агент, который опрашивает мост.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    pub address: Ipv4Addr,
    pub port: u16,
}

impl Endpoint {
    /// Разбирает `ip=<IPv4>;port=<port>`. Регистр ключей и порядок не важны;
    /// `port` по умолчанию 161.
    pub fn parse(connection_string: &str) -> Result<Self, ConfigError> {
        let lowered = connection_string.to_lowercase();
        let wrong = || ConfigError::SnmpConnectionString(connection_string.to_string());

        let parts: Vec<&str> = lowered.split(';').collect();
        if parts.len() > 2 {
            return Err(wrong());
        }

        let mut address = None;
        let mut port = DEFAULT_SNMP_PORT;

        for part in parts.iter().map(|p| p.trim()) {
            if let Some(ip) = part.strip_prefix("ip=") {
                address = Some(
                    ip.trim()
                        .parse::<Ipv4Addr>()
                        .map_err(|_| ConfigError::SnmpAddress(ip.to_string()))?,
                );
            } else if let Some(p) = part.strip_prefix("port=") {
                port = p
                    .trim()
                    .parse::<u16>()
                    .ok()
                    .filter(|p| *p != 0)
                    .ok_or_else(|| ConfigError::SnmpPort(p.to_string()))?;
            } else {
                return Err(wrong());
            }
        }

        let address = address.ok_or_else(wrong)?;
        Ok(Self { address, port })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::from((self.address, self.port))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ip_and_port() {
        let endpoint = Endpoint::parse("ip=192.168.88.35;port=161").unwrap();
        assert_eq!(endpoint.address, Ipv4Addr::new(192, 168, 88, 35));
        assert_eq!(endpoint.port, 161);
        assert_eq!(endpoint.to_string(), "192.168.88.35:161");
    }

    #[test]
    fn key_order_and_case_do_not_matter() {
        let endpoint = Endpoint::parse("PORT=1161;IP=10.0.0.5").unwrap();
        assert_eq!(endpoint.socket_addr(), "10.0.0.5:1161".parse().unwrap());
    }

    #[test]
    fn port_defaults_to_161() {
        assert_eq!(Endpoint::parse("ip=10.0.0.5").unwrap().port, 161);
    }

    #[test]
    fn more_than_two_parts_is_rejected() {
        let err = Endpoint::parse("ip=10.0.0.5;port=161;extra=1").unwrap_err();
        assert!(matches!(err, ConfigError::SnmpConnectionString(_)));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn unknown_or_empty_parts_are_rejected() {
        assert!(matches!(
            Endpoint::parse("ip=10.0.0.5;community=public"),
            Err(ConfigError::SnmpConnectionString(_))
        ));
        assert!(matches!(
            Endpoint::parse("ip=10.0.0.5;"),
            Err(ConfigError::SnmpConnectionString(_))
        ));
        assert!(matches!(
            Endpoint::parse("port=161"),
            Err(ConfigError::SnmpConnectionString(_))
        ));
    }

    #[test]
    fn bad_port_has_its_own_error() {
        for port in ["abc", "-1", "70000", "0"] {
            let err = Endpoint::parse(&format!("ip=10.0.0.5;port={}", port)).unwrap_err();
            assert_eq!(err.exit_code(), 2, "port {}", port);
        }
    }

    #[test]
    fn bad_address_has_its_own_error() {
        let err = Endpoint::parse("ip=10.0.0.500;port=161").unwrap_err();
        assert!(matches!(err, ConfigError::SnmpAddress(_)));
    }
}
