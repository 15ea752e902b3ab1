//! Hub configuration, loaded from environment variables. Every option has a
//! default; the hub runs with zero configuration (no TURN relay, no TLS, no
//! push).

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Static file root served at `/`.
    pub public_dir: PathBuf,
    /// TURN server URLs handed to clients (comma-separated in the env).
    pub turn_urls: Vec<String>,
    /// Shared secret for deriving short-lived TURN credentials.
    pub turn_secret: Option<String>,
    /// Lifetime of a derived TURN credential.
    pub turn_username_ttl_seconds: u64,
    /// Relay port range of the TURN deployment, for capacity estimates.
    pub turn_relay_min_port: Option<u16>,
    pub turn_relay_max_port: Option<u16>,
    /// PEM paths; both set means the hub terminates TLS itself.
    pub tls_key_path: Option<PathBuf>,
    pub tls_cert_path: Option<PathBuf>,
    /// VAPID key material; all three set enables the push sink.
    pub vapid_public_key: Option<String>,
    pub vapid_private_key: Option<String>,
    pub vapid_subject: Option<String>,
    /// Log the effective configuration at startup.
    pub startup_log: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            public_dir: PathBuf::from("public"),
            turn_urls: Vec::new(),
            turn_secret: None,
            turn_username_ttl_seconds: 3600,
            turn_relay_min_port: None,
            turn_relay_max_port: None,
            tls_key_path: None,
            tls_cert_path: None,
            vapid_public_key: None,
            vapid_private_key: None,
            vapid_subject: None,
            startup_log: true,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: optional_var("HOST").unwrap_or(defaults.host),
            port: parsed_var("PORT").unwrap_or(defaults.port),
            public_dir: optional_var("PUBLIC_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.public_dir),
            turn_urls: optional_var("TURN_URLS")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
            turn_secret: optional_var("TURN_SECRET"),
            turn_username_ttl_seconds: parsed_var("TURN_USERNAME_TTL_SECONDS")
                .unwrap_or(defaults.turn_username_ttl_seconds),
            turn_relay_min_port: parsed_var("TURN_RELAY_MIN_PORT"),
            turn_relay_max_port: parsed_var("TURN_RELAY_MAX_PORT"),
            tls_key_path: optional_var("TLS_KEY_PATH").map(PathBuf::from),
            tls_cert_path: optional_var("TLS_CERT_PATH").map(PathBuf::from),
            vapid_public_key: optional_var("VAPID_PUBLIC_KEY"),
            vapid_private_key: optional_var("VAPID_PRIVATE_KEY"),
            vapid_subject: optional_var("VAPID_SUBJECT"),
            startup_log: optional_var("STARTUP_LOG")
                .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
                .unwrap_or(defaults.startup_log),
        }
    }

    /// The hub serves HTTPS/WSS when both PEM paths are present.
    pub fn tls_enabled(&self) -> bool {
        self.tls_key_path.is_some() && self.tls_cert_path.is_some()
    }

    /// The push sink needs the full VAPID triple.
    pub fn push_enabled(&self) -> bool {
        self.vapid_public_key.is_some()
            && self.vapid_private_key.is_some()
            && self.vapid_subject.is_some()
    }

    /// Size of the configured relay port range, when fully specified.
    pub fn relay_ports_total(&self) -> Option<u32> {
        match (self.turn_relay_min_port, self.turn_relay_max_port) {
            (Some(min), Some(max)) if max >= min => Some(u32::from(max - min) + 1),
            _ => None,
        }
    }
}

fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn parsed_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    optional_var(name).and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relay_ports_total_counts_inclusive_range() {
        let cfg = Config {
            turn_relay_min_port: Some(49152),
            turn_relay_max_port: Some(49251),
            ..Config::default()
        };
        assert_eq!(cfg.relay_ports_total(), Some(100));
    }

    #[test]
    fn relay_ports_total_requires_ordered_pair() {
        let cfg = Config {
            turn_relay_min_port: Some(5000),
            turn_relay_max_port: Some(4000),
            ..Config::default()
        };
        assert_eq!(cfg.relay_ports_total(), None);
        assert_eq!(Config::default().relay_ports_total(), None);
    }

    #[test]
    fn single_port_range_is_one() {
        let cfg = Config {
            turn_relay_min_port: Some(5000),
            turn_relay_max_port: Some(5000),
            ..Config::default()
        };
        assert_eq!(cfg.relay_ports_total(), Some(1));
    }

    #[test]
    fn push_needs_all_three_vapid_vars() {
        let mut cfg = Config {
            vapid_public_key: Some("pub".into()),
            vapid_private_key: Some("priv".into()),
            ..Config::default()
        };
        assert!(!cfg.push_enabled());
        cfg.vapid_subject = Some("mailto:ops@example.net".into());
        assert!(cfg.push_enabled());
    }

    #[test]
    fn tls_needs_both_paths() {
        let mut cfg = Config {
            tls_cert_path: Some("cert.pem".into()),
            ..Config::default()
        };
        assert!(!cfg.tls_enabled());
        cfg.tls_key_path = Some("key.pem".into());
        assert!(cfg.tls_enabled());
    }
}
