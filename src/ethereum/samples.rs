//! Built-in interfaces used when no explorer answer is available.

use super::{InputParam, InterfaceEntry};

/// Sample interfaces keyed by a contract-name fragment, scanned in order.
#[derive(Debug, Clone)]
pub struct SampleInterfaces {
    samples: Vec<(String, Vec<InterfaceEntry>)>,
    generic: Vec<InterfaceEntry>,
}

impl Default for SampleInterfaces {
    fn default() -> Self {
        Self::builtin()
    }
}

impl SampleInterfaces {
    pub fn new(samples: Vec<(String, Vec<InterfaceEntry>)>, generic: Vec<InterfaceEntry>) -> Self {
        Self { samples, generic }
    }

    /// First sample whose key appears, case-insensitively, in the address
    /// or the name.
    pub fn find(&self, address: &str, name: &str) -> Option<(&str, &[InterfaceEntry])> {
        let address = address.to_lowercase();
        let name = name.to_lowercase();

        self.samples.iter().find_map(|(key, abi)| {
            let key_lower = key.to_lowercase();
            if address.contains(&key_lower) || name.contains(&key_lower) {
                Some((key.as_str(), abi.as_slice()))
            } else {
                None
            }
        })
    }

    pub fn generic(&self) -> &[InterfaceEntry] {
        &self.generic
    }

    pub fn builtin() -> Self {
        let samples = vec![
            ("LendingPool".to_string(), lending_pool()),
            (
                "UniswapV2Factory".to_string(),
                vec![event(
                    "PairCreated",
                    &[
                        ("token0", "address", true),
                        ("token1", "address", true),
                        ("pair", "address", false),
                        ("", "uint256", false),
                    ],
                )],
            ),
            (
                "UniswapV2Router".to_string(),
                vec![event(
                    "SwapETHForTokens",
                    &[
                        ("amountIn", "uint256", false),
                        ("amountOutMin", "uint256", false),
                        ("path", "address[]", false),
                        ("to", "address", false),
                        ("deadline", "uint256", false),
                    ],
                )],
            ),
            (
                "Comptroller".to_string(),
                vec![
                    event(
                        "MarketEntered",
                        &[("cToken", "address", false), ("account", "address", false)],
                    ),
                    event(
                        "MarketExited",
                        &[("cToken", "address", false), ("account", "address", false)],
                    ),
                ],
            ),
        ];

        Self::new(samples, erc20())
    }
}

fn event(name: &str, inputs: &[(&str, &str, bool)]) -> InterfaceEntry {
    InterfaceEntry::event(
        name,
        inputs
            .iter()
            .map(|(name, ty, indexed)| InputParam::new(name, ty, *indexed))
            .collect(),
    )
}

fn lending_pool() -> Vec<InterfaceEntry> {
    vec![
        event(
            "Deposit",
            &[
                ("reserve", "address", true),
                ("user", "address", false),
                ("onBehalfOf", "address", true),
                ("amount", "uint256", false),
                ("referral", "uint16", true),
            ],
        ),
        event(
            "Withdraw",
            &[
                ("reserve", "address", true),
                ("user", "address", true),
                ("to", "address", true),
                ("amount", "uint256", false),
            ],
        ),
        event(
            "Borrow",
            &[
                ("reserve", "address", true),
                ("user", "address", false),
                ("onBehalfOf", "address", true),
                ("amount", "uint256", false),
                ("borrowRateMode", "uint256", false),
                ("borrowRate", "uint256", false),
                ("referral", "uint16", true),
            ],
        ),
    ]
}

/// `Transfer` and `Approval` only.
pub fn erc20() -> Vec<InterfaceEntry> {
    vec![
        event(
            "Transfer",
            &[
                ("from", "address", true),
                ("to", "address", true),
                ("value", "uint256", false),
            ],
        ),
        event(
            "Approval",
            &[
                ("owner", "address", true),
                ("spender", "address", true),
                ("value", "uint256", false),
            ],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_matches_name_case_insensitively() {
        let samples = SampleInterfaces::builtin();

        let (key, abi) = samples
            .find("0x7d2768dE32b0b80b7a3454c06BdAc94A69DDc7A9", "lendingpoolcore")
            .unwrap();
        assert_eq!(key, "LendingPool");
        assert_eq!(abi.len(), 3);

        let (key, _) = samples.find("0x0", "UniswapV2Router02").unwrap();
        assert_eq!(key, "UniswapV2Router");

        assert!(samples.find("0x0", "GMXVault").is_none());
    }

    #[test]
    fn test_find_matches_address() {
        let samples = SampleInterfaces::new(
            vec![("deadbeef".to_string(), erc20())],
            Vec::new(),
        );
        assert!(samples.find("0xDEADBEEF00000000000000000000000000000000", "Thing").is_some());
    }

    #[test]
    fn test_generic_is_erc20() {
        let samples = SampleInterfaces::builtin();
        let names: Vec<_> = samples
            .generic()
            .iter()
            .filter_map(|e| e.name.as_deref())
            .collect();
        assert_eq!(names, vec!["Transfer", "Approval"]);
    }
}
