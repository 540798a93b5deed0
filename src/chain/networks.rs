//! Networks the wizard can onboard onto.

use serde::Serialize;

/// A supported network and its GLM token contract.
#[derive(Debug, Clone, Serialize)]
pub struct NetworkInfo {
    pub chain_id: u64,
    pub name: &'static str,
    /// ERC-20 contract address of GLM (or tGLM) on this network.
    pub glm_contract: &'static str,
}

/// Supported networks, production first.
pub static NETWORKS: &[NetworkInfo] = &[
    NetworkInfo {
        chain_id: 137,
        name: "Polygon",
        glm_contract: "0x0b220b82f3ea3b7f6d9a1d8ab58930c064a2b5bf",
    },
    NetworkInfo {
        chain_id: 80001,
        name: "Mumbai",
        glm_contract: "0x2036807b0b3aaf5b1858ee822d0e111fddac7018",
    },
];

/// Look up a supported network by chain id.
pub fn by_chain_id(chain_id: u64) -> Option<&'static NetworkInfo> {
    NETWORKS.iter().find(|n| n.chain_id == chain_id)
}

pub fn is_supported(chain_id: u64) -> bool {
    by_chain_id(chain_id).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn polygon_and_mumbai_are_supported() {
        assert!(is_supported(137));
        assert!(is_supported(80001));
        assert!(!is_supported(1));
        assert!(!is_supported(0));
    }

    #[test]
    fn lookup_returns_matching_entry() {
        let polygon = by_chain_id(137).unwrap();
        assert_eq!(polygon.name, "Polygon");
        assert!(polygon.glm_contract.starts_with("0x"));
    }

    #[test]
    fn contract_addresses_are_lowercase_hex() {
        for network in NETWORKS {
            let hex = network.glm_contract.strip_prefix("0x").unwrap();
            assert_eq!(hex.len(), 40, "{} contract length", network.name);
            assert!(
                hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()),
                "{} contract should be lowercase hex",
                network.name
            );
        }
    }
}
