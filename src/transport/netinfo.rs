//! Active network interface detection.
//!
//! Backs the connectivity gate that runs before a measurement and the
//! network type reported in the results. On Linux the kernel's view in
//! `/sys/class/net` is used; elsewhere connectivity is assumed and the type
//! is reported as unknown.

use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::Path;

/// Kind of link the measurement ran over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NetworkType {
    WiFi,
    Mobile,
    Ethernet,
    Unknown,
}

impl NetworkType {
    /// Preference when several interfaces are up at once.
    fn rank(self) -> u8 {
        match self {
            NetworkType::Ethernet => 3,
            NetworkType::WiFi => 2,
            NetworkType::Mobile => 1,
            NetworkType::Unknown => 0,
        }
    }
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            NetworkType::WiFi => "WiFi",
            NetworkType::Mobile => "Mobile",
            NetworkType::Ethernet => "Ethernet",
            NetworkType::Unknown => "Unknown",
        };
        f.write_str(label)
    }
}

/// ARP hardware type of loopback devices.
const ARPHRD_LOOPBACK: &str = "772";
/// ARP hardware type of Ethernet-framed devices.
const ARPHRD_ETHER: &str = "1";

const MOBILE_PREFIXES: [&str; 4] = ["wwan", "rmnet", "ppp", "ccmni"];

/// Detect the active network, or `None` when no interface is usable.
pub fn detect_active_network() -> Option<NetworkType> {
    #[cfg(target_os = "linux")]
    {
        detect_from_sysfs(Path::new("/sys/class/net"))
    }

    #[cfg(not(target_os = "linux"))]
    {
        Some(NetworkType::Unknown)
    }
}

/// Scan a `/sys/class/net`-shaped directory for usable interfaces.
pub fn detect_from_sysfs(root: &Path) -> Option<NetworkType> {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            log::debug!("Cannot read {}: {}", root.display(), e);
            return None;
        }
    };

    entries
        .filter_map(Result::ok)
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            let network = classify_interface(&name, &entry.path());
            if let Some(network) = network {
                log::debug!("Interface {} is up ({})", name, network);
            }
            network
        })
        .max_by_key(|network| network.rank())
}

fn read_attr(dir: &Path, attr: &str) -> Option<String> {
    fs::read_to_string(dir.join(attr)).ok().map(|s| s.trim().to_string())
}

/// Classify one interface, or `None` if it is loopback or not up.
fn classify_interface(name: &str, dir: &Path) -> Option<NetworkType> {
    let hw_type = read_attr(dir, "type");
    if name == "lo" || hw_type.as_deref() == Some(ARPHRD_LOOPBACK) {
        return None;
    }

    let is_up = match read_attr(dir, "operstate").as_deref() {
        Some("up") => true,
        // Point-to-point and tunnel devices often report "unknown"
        Some("unknown") => read_attr(dir, "carrier").as_deref() == Some("1"),
        _ => false,
    };
    if !is_up {
        return None;
    }

    if dir.join("wireless").exists() || dir.join("phy80211").exists() {
        return Some(NetworkType::WiFi);
    }

    if MOBILE_PREFIXES.iter().any(|prefix| name.starts_with(prefix)) {
        return Some(NetworkType::Mobile);
    }

    // Virtual devices (bridges, veth pairs) have no backing `device` link
    if hw_type.as_deref() == Some(ARPHRD_ETHER) && dir.join("device").exists()
    {
        return Some(NetworkType::Ethernet);
    }

    Some(NetworkType::Unknown)
}
