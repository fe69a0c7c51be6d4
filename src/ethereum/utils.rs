use alloy::primitives::Address;
use anyhow::{anyhow, Result};
use std::str::FromStr;

/// Validates an address string and parses it. Mixed case is accepted
/// without enforcing the EIP-55 checksum.
pub fn validate_address(address: &str) -> Result<Address> {
    let address = address.trim();

    if address.is_empty() {
        return Err(anyhow!("Address cannot be empty"));
    }

    if !address.starts_with("0x") && !address.starts_with("0X") {
        return Err(anyhow!(
            "Invalid address format: '{}'. Addresses must start with '0x'",
            address
        ));
    }

    if address.len() != 42 {
        return Err(anyhow!(
            "Invalid address length: '{}'. Addresses must be exactly 42 characters (0x + 40 hex characters)",
            address
        ));
    }

    let hex_part = &address[2..];
    if !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(anyhow!(
            "Invalid address format: '{}'. Contains non-hexadecimal characters",
            address
        ));
    }

    Address::from_str(hex_part).map_err(|e| anyhow!("Invalid address: '{}'. Error: {}", address, e))
}

pub fn is_well_formed_address(address: &str) -> bool {
    validate_address(address).is_ok()
}

/// Lowercase `0x`-prefixed rendering.
pub fn format_address(address: &Address) -> String {
    format!("0x{}", hex::encode(address.as_slice()))
}

/// Validates a network name against the configured set.
pub fn validate_network(network: &str, available_networks: &[String]) -> Result<()> {
    if network.is_empty() {
        return Err(anyhow!("Network name cannot be empty"));
    }

    if !available_networks.iter().any(|n| n == network) {
        return Err(anyhow!(
            "Unknown network: '{}'. Available networks: {}",
            network,
            available_networks.join(", ")
        ));
    }

    Ok(())
}

/// Upper-cases the first letter of every alphabetic run and lower-cases the
/// rest, so `velodrome_v2` becomes `Velodrome_V2`.
pub fn title_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut prev_is_alpha = false;

    for c in input.chars() {
        if c.is_alphabetic() {
            if prev_is_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_is_alpha = true;
        } else {
            out.push(c);
            prev_is_alpha = false;
        }
    }

    out
}

/// Short hint for an explorer failure, used in log lines.
pub fn interpret_explorer_error(error: &str) -> &'static str {
    if error.contains("rate limit") || error.contains("429") {
        "explorer rate limit hit, requests are paced but the key may be missing or shared"
    } else if error.contains("Invalid API Key") || error.contains("403") {
        "explorer rejected the API key, check the network's api_key setting"
    } else if error.contains("timed out") {
        "explorer did not answer within the request timeout"
    } else if error.contains("connection") || error.contains("dns") {
        "cannot reach the explorer endpoint"
    } else {
        "explorer lookup failed"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_address() {
        assert!(validate_address("0x742d35Cc6435C9c1c72c5E7b18BaB7e1DB7a5d6e").is_ok());
        assert!(validate_address("0x0000000000000000000000000000000000000000").is_ok());

        assert!(validate_address("").is_err());
        assert!(validate_address("not_an_address").is_err());
        assert!(validate_address("0x123").is_err());
        assert!(validate_address("742d35Cc6435C9c1c72c5E7b18BaB7e1DB7a5d6e").is_err());
        assert!(validate_address("0xgg2d35Cc6435C9c1c72c5E7b18BaB7e1DB7a5d6e").is_err());
        // 39 hex digits
        assert!(!is_well_formed_address("0x7E01d4eE1cC7a9c0c6a8a7e8a9b0c1d2e3f4a5b"));
    }

    #[test]
    fn test_format_address_is_lowercase() {
        let address = validate_address("0x7a250d5630B4cF539739dF2C5dAcb4c659F2488D").unwrap();
        assert_eq!(
            format_address(&address),
            "0x7a250d5630b4cf539739df2c5dacb4c659f2488d"
        );
    }

    #[test]
    fn test_validate_network() {
        let networks = vec!["ethereum".to_string(), "polygon".to_string()];

        assert!(validate_network("ethereum", &networks).is_ok());
        assert!(validate_network("polygon", &networks).is_ok());
        assert!(validate_network("solana", &networks).is_err());
        assert!(validate_network("", &networks).is_err());
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("aave"), "Aave");
        assert_eq!(title_case("velodrome_v2"), "Velodrome_V2");
        assert_eq!(title_case("velodrome v2"), "Velodrome V2");
        assert_eq!(title_case("camelotv2"), "Camelotv2");
        assert_eq!(title_case("GMX"), "Gmx");
    }
}
