//! Node identity resolution (spec.md §4.5): a stable `node_id`/`node_ip`
//! pair every cluster-aware component tags its rows with.

use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use crate::domain::errors::IdentityError;
use crate::domain::models::Config;

#[derive(Debug, Clone)]
pub struct NodeIdentity {
    pub node_id: String,
    pub node_ip: String,
}

impl NodeIdentity {
    /// Resolve `node_id` via the 5-step precedence of spec.md §4.5: explicit
    /// config, `NODE_ID`/`POD_NAME` env vars, a persisted `.node_id` file,
    /// finally a derived id persisted back for next time. `node_ip` is always
    /// the host's primary non-loopback IPv4 address.
    pub fn resolve(config: &Config, node_id_path: &Path) -> Result<Self, IdentityError> {
        let node_ip = primary_ipv4()?;

        let node_id = config
            .cluster
            .node_id
            .clone()
            .filter(|s| !s.is_empty())
            .or_else(|| config.node_id.clone().filter(|s| !s.is_empty()))
            .or_else(|| std::env::var("NODE_ID").ok().filter(|s| !s.is_empty()))
            .or_else(|| std::env::var("POD_NAME").ok().filter(|s| !s.is_empty()))
            .or_else(|| read_persisted(node_id_path))
            .map(Ok)
            .unwrap_or_else(|| {
                let derived = derive_node_id(&local_hostname(), &node_ip);
                persist(node_id_path, &derived)?;
                Ok(derived)
            })?;

        Ok(Self { node_id, node_ip })
    }
}

fn read_persisted(path: &Path) -> Option<String> {
    std::fs::read_to_string(path)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn persist(path: &Path, node_id: &str) -> Result<(), IdentityError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|source| IdentityError::FileWrite {
                path: path.display().to_string(),
                source,
            })?;
        }
    }
    std::fs::write(path, node_id).map_err(|source| IdentityError::FileWrite {
        path: path.display().to_string(),
        source,
    })
}

/// No MAC address enumeration in `std`; the hostname plus the resolved
/// primary IP stands in for it (DESIGN.md open question #4).
fn derive_node_id(hostname: &str, node_ip: &str) -> String {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    hostname.hash(&mut hasher);
    node_ip.hash(&mut hasher);
    format!("node-{:016x}", hasher.finish())
}

fn local_hostname() -> String {
    std::fs::read_to_string("/proc/sys/kernel/hostname")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| std::env::var("HOSTNAME").ok())
        .unwrap_or_else(|| "unknown-host".to_string())
}

/// The "connect a UDP socket, read back the local address" trick for finding
/// the primary outbound IPv4 address without a routing-table dependency —
/// no packet is actually sent for a UDP `connect()`.
fn primary_ipv4() -> Result<String, IdentityError> {
    let socket = std::net::UdpSocket::bind("0.0.0.0:0").map_err(IdentityError::NoPrimaryAddress)?;
    socket.connect("8.8.8.8:80").map_err(IdentityError::NoPrimaryAddress)?;
    let addr = socket.local_addr().map_err(IdentityError::NoPrimaryAddress)?;
    Ok(addr.ip().to_string())
}

/// Default location for the persisted node id file, relative to the
/// process's working directory (spec.md §6).
pub fn default_node_id_path() -> PathBuf {
    PathBuf::from(".clustermux/.node_id")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_node_id_is_deterministic_for_the_same_inputs() {
        let a = derive_node_id("host-1", "10.0.0.5");
        let b = derive_node_id("host-1", "10.0.0.5");
        assert_eq!(a, b);
    }

    #[test]
    fn derive_node_id_differs_across_hosts() {
        let a = derive_node_id("host-1", "10.0.0.5");
        let b = derive_node_id("host-2", "10.0.0.5");
        assert_ne!(a, b);
    }

    #[test]
    fn persist_then_read_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".node_id");
        persist(&path, "node-abc123").unwrap();
        assert_eq!(read_persisted(&path), Some("node-abc123".to_string()));
    }

    #[test]
    fn read_persisted_is_none_when_file_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".node_id");
        assert_eq!(read_persisted(&path), None);
    }

    #[test]
    fn resolve_prefers_explicit_cluster_node_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".node_id");
        let mut config = Config::default();
        config.cluster.node_id = Some("node-explicit".to_string());
        let identity = NodeIdentity::resolve(&config, &path).unwrap();
        assert_eq!(identity.node_id, "node-explicit");
    }
}
