pub mod abi;
pub mod events;
pub mod explorer;
pub mod registry;
pub mod samples;
pub mod utils;

use serde::{Deserialize, Serialize};

/// Where a candidate contract address came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateOrigin {
    /// Curated ground truth from the known-contract registry.
    Registry,
    /// Synthesized from the protocol's name category.
    Heuristic,
    /// Derived from a hash of the protocol and network names.
    Deterministic,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateContract {
    pub address: String,
    pub name: String,
    pub origin: CandidateOrigin,
}

/// Where an interface description came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterfaceSource {
    LiveExplorer,
    SampleMatch,
    GenericFallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceResult {
    /// Set only when the explorer itself reported verified source code.
    pub verified: bool,
    pub source: InterfaceSource,
    pub abi: Vec<InterfaceEntry>,
}

impl InterfaceResult {
    pub fn is_fallback(&self) -> bool {
        self.source != InterfaceSource::LiveExplorer
    }
}

/// One item of a JSON ABI. Only `event` entries matter downstream, the
/// others are kept so a fetched ABI survives a serialize round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceEntry {
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub inputs: Vec<InputParam>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anonymous: Option<bool>,
}

impl InterfaceEntry {
    pub fn event(name: &str, inputs: Vec<InputParam>) -> Self {
        Self {
            kind: "event".to_string(),
            name: Some(name.to_string()),
            inputs,
            anonymous: Some(false),
        }
    }

    pub fn is_event(&self) -> bool {
        self.kind == "event"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputParam {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub ty: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub indexed: bool,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub components: Vec<InputParam>,
}

impl InputParam {
    pub fn new(name: &str, ty: &str, indexed: bool) -> Self {
        Self {
            name: name.to_string(),
            ty: ty.to_string(),
            indexed,
            components: Vec::new(),
        }
    }
}

/// Explorers sometimes emit `null` where a field is expected; treat it like
/// a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Parse the JSON-encoded ABI string an explorer returns.
pub fn parse_abi(raw: &str) -> serde_json::Result<Vec<InterfaceEntry>> {
    serde_json::from_str(raw)
}
