//! Derived voice-capacity statistics, recomputed on demand.

use serde::Serialize;

use crate::config::Config;
use crate::ice;

/// Config-derived inputs that never change for the process lifetime.
#[derive(Debug, Clone)]
pub struct StatsBase {
    /// `host:port` of the first configured TURN URL.
    pub turn_host: Option<String>,
    /// Size of the configured relay port range.
    pub relay_ports_total: Option<u32>,
}

impl StatsBase {
    pub fn from_config(config: &Config) -> Self {
        Self {
            turn_host: config.turn_urls.first().and_then(|u| ice::turn_host(u)),
            relay_ports_total: config.relay_ports_total(),
        }
    }
}

/// Snapshot of call activity and relay-capacity estimates, attached to the
/// hello frame and every presence broadcast.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceStats {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn_host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relay_ports_total: Option<u32>,
    pub active_calls: u32,
    pub peer_links_estimate: u32,
    pub relay_ports_used_estimate: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity_calls_estimate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_conference_users_estimate: Option<u32>,
}

impl VoiceStats {
    /// Compute from the current room sizes. A room only counts as an active
    /// call with two or more members; each k-member room contributes
    /// `k*(k-1)/2` peer links, and every link is assumed to hold two relay
    /// ports in the worst case.
    pub fn compute(base: &StatsBase, room_sizes: impl Iterator<Item = usize>) -> Self {
        let mut active_calls = 0u32;
        let mut peer_links = 0u32;
        for k in room_sizes {
            if k >= 2 {
                active_calls += 1;
            }
            let k = k as u32;
            peer_links += k * k.saturating_sub(1) / 2;
        }

        let relay_ports_used_estimate = match base.relay_ports_total {
            Some(total) => (2 * peer_links).min(total),
            None => 2 * peer_links,
        };
        let capacity_calls_estimate = base.relay_ports_total.map(|total| total / 2);
        let max_conference_users_estimate =
            capacity_calls_estimate.map(max_users_for_link_budget);

        Self {
            turn_host: base.turn_host.clone(),
            relay_ports_total: base.relay_ports_total,
            active_calls,
            peer_links_estimate: peer_links,
            relay_ports_used_estimate,
            capacity_calls_estimate,
            max_conference_users_estimate,
        }
    }
}

/// Largest k such that `k*(k-1)/2 <= links`, from the quadratic root
/// `(1 + sqrt(1 + 8*links)) / 2`.
fn max_users_for_link_budget(links: u32) -> u32 {
    let root = (1.0 + (1.0 + 8.0 * f64::from(links)).sqrt()) / 2.0;
    root.floor() as u32
}
