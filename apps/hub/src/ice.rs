//! ICE server configuration and time-limited TURN credentials
//! (coturn REST-API convention, HMAC-SHA1 over the expiry username).

use std::net::IpAddr;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha1::Sha1;
use utoipa::ToSchema;

use crate::config::Config;

/// Public STUN fallback handed to every client.
pub const PUBLIC_STUN_URL: &str = "stun:stun.l.google.com:19302";

/// Advisory set on the hello frame when the relay can only serve loopback
/// clients.
pub const TURN_LOOPBACK_WARNING: &str =
    "TURN is configured with a loopback address; remote peers cannot reach the relay.";

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct IceServer {
    pub urls: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IceConfig {
    pub ice_servers: Vec<IceServer>,
}

/// Build the ICE configuration for one client: always the public STUN
/// server, plus a TURN entry when a shared secret is configured. The TURN
/// username is the credential's unix expiry; the credential is
/// `base64(hmac-sha1(secret, username))`.
pub fn ice_config(config: &Config) -> IceConfig {
    let mut ice_servers = vec![IceServer {
        urls: vec![PUBLIC_STUN_URL.to_string()],
        username: None,
        credential: None,
    }];

    if let Some(secret) = config.turn_secret.as_deref() {
        if !config.turn_urls.is_empty() {
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("time went backwards")
                .as_secs();
            let username = (now + config.turn_username_ttl_seconds).to_string();

            let mut mac = Hmac::<Sha1>::new_from_slice(secret.as_bytes())
                .expect("HMAC accepts any key length");
            mac.update(username.as_bytes());
            let credential =
                base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes());

            ice_servers.push(IceServer {
                urls: config.turn_urls.clone(),
                username: Some(username),
                credential: Some(credential),
            });
        }
    }

    IceConfig { ice_servers }
}

/// `host:port` portion of a TURN/STUN URL, query string stripped.
pub fn turn_host(url: &str) -> Option<String> {
    let rest = match url.split_once(':') {
        Some((scheme, rest)) if matches!(scheme, "turn" | "turns" | "stun" | "stuns") => rest,
        _ => url,
    };
    let host = rest.split('?').next().unwrap_or(rest);
    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}

/// The warning for clients that will not be able to reach a loopback relay.
pub fn loopback_warning(config: &Config, client: IpAddr) -> Option<&'static str> {
    if turn_is_loopback(config) && !client.is_loopback() {
        Some(TURN_LOOPBACK_WARNING)
    } else {
        None
    }
}

fn turn_is_loopback(config: &Config) -> bool {
    config.turn_urls.iter().any(|url| {
        turn_host(url).is_some_and(|hostport| {
            let host = hostport
                .rsplit_once(':')
                .map(|(h, _)| h)
                .unwrap_or(hostport.as_str());
            matches!(host, "localhost" | "127.0.0.1" | "::1" | "[::1]")
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(turn_urls: Vec<&str>, secret: Option<&str>) -> Config {
        Config {
            turn_urls: turn_urls.into_iter().map(String::from).collect(),
            turn_secret: secret.map(String::from),
            ..Config::default()
        }
    }

    #[test]
    fn turn_host_strips_scheme_and_query() {
        assert_eq!(
            turn_host("turn:turn.example.net:3478?transport=udp"),
            Some("turn.example.net:3478".to_string())
        );
        assert_eq!(
            turn_host("turns:relay.example.org:5349"),
            Some("relay.example.org:5349".to_string())
        );
        assert_eq!(turn_host("turn:"), None);
    }

    #[test]
    fn stun_only_without_secret() {
        let cfg = config_with(vec!["turn:relay:3478"], None);
        let ice = ice_config(&cfg);
        assert_eq!(ice.ice_servers.len(), 1);
        assert_eq!(ice.ice_servers[0].urls[0], PUBLIC_STUN_URL);
    }

    #[test]
    fn turn_entry_carries_expiry_username_and_hmac() {
        let cfg = config_with(vec!["turn:relay:3478"], Some("s3cret"));
        let ice = ice_config(&cfg);
        assert_eq!(ice.ice_servers.len(), 2);

        let turn = &ice.ice_servers[1];
        let expiry: u64 = turn.username.as_deref().unwrap().parse().unwrap();
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();
        assert!(expiry > now);
        assert!(expiry <= now + cfg.turn_username_ttl_seconds + 1);

        // HMAC-SHA1 digests are 20 bytes.
        let raw = base64::engine::general_purpose::STANDARD
            .decode(turn.credential.as_deref().unwrap())
            .unwrap();
        assert_eq!(raw.len(), 20);
    }

    #[test]
    fn loopback_warning_only_for_remote_clients() {
        let cfg = config_with(vec!["turn:127.0.0.1:3478"], Some("s"));
        assert!(loopback_warning(&cfg, "203.0.113.9".parse().unwrap()).is_some());
        assert!(loopback_warning(&cfg, "127.0.0.1".parse().unwrap()).is_none());

        let cfg = config_with(vec!["turn:turn.example.net:3478"], Some("s"));
        assert!(loopback_warning(&cfg, "203.0.113.9".parse().unwrap()).is_none());
    }
}
