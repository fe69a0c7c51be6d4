//! Event signature extraction from contract ABIs.
//!
//! Signatures use the `Name(param type indexed, param type)` form: each
//! parameter is its name, a space, its ABI type, and ` indexed` when it is
//! a topic. A parameter without a name renders as just its type, so the name
//! is lost on the way back through [`parse_signature`].

use alloy::json_abi::{Event, EventParam, Param};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use super::{InputParam, InterfaceEntry};

/// Semantic bucket for an event, in matching priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Transfer,
    Swap,
    Lending,
    Staking,
    Governance,
    Bridge,
    Other,
}

impl EventCategory {
    pub const ALL: [EventCategory; 7] = [
        EventCategory::Transfer,
        EventCategory::Swap,
        EventCategory::Lending,
        EventCategory::Staking,
        EventCategory::Governance,
        EventCategory::Bridge,
        EventCategory::Other,
    ];

    fn keywords(&self) -> &'static [&'static str] {
        match self {
            EventCategory::Transfer => &["transfer", "send", "receive"],
            EventCategory::Swap => &["swap", "trade", "exchange"],
            EventCategory::Lending => &["deposit", "withdraw", "borrow", "repay", "lend"],
            EventCategory::Staking => &["stake", "unstake", "reward", "claim"],
            EventCategory::Governance => &["vote", "proposal", "governance"],
            EventCategory::Bridge => &["bridge", "lock", "unlock", "mint", "burn"],
            EventCategory::Other => &[],
        }
    }

    /// Category of a signature, judged by its lower-cased event name.
    pub fn of(signature: &str) -> Self {
        let name = base_name(signature).to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.keywords().iter().any(|k| name.contains(k)))
            .unwrap_or(EventCategory::Other)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDetail {
    pub name: String,
    pub signature: String,
    /// Solidity canonical form, e.g. `Transfer(address,address,uint256)`.
    pub canonical: String,
    /// Event selector (topic 0); anonymous events have none.
    pub topic: Option<String>,
    pub anonymous: bool,
    pub inputs: Vec<InputParam>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedParam {
    /// `None` when the source parameter had no name.
    pub name: Option<String>,
    pub ty: String,
    pub indexed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSignature {
    pub name: String,
    pub params: Vec<ParsedParam>,
}

fn format_param(param: &InputParam) -> String {
    if param.indexed {
        format!("{} {} indexed", param.name, param.ty)
    } else {
        format!("{} {}", param.name, param.ty)
    }
}

/// Empty string when the event has no name.
pub fn format_signature(entry: &InterfaceEntry) -> String {
    let name = match entry.name.as_deref() {
        Some(name) if !name.is_empty() => name,
        _ => return String::new(),
    };

    let params: Vec<String> = entry.inputs.iter().map(format_param).collect();
    format!("{}({})", name, params.join(", "))
}

fn abi_param(param: &InputParam) -> Param {
    Param {
        ty: param.ty.clone(),
        name: param.name.clone(),
        components: param.components.iter().map(abi_param).collect(),
        internal_type: None,
    }
}

/// The entry as an alloy event, which owns canonical type expansion
/// (tuples included) and selector hashing.
fn abi_event(name: &str, entry: &InterfaceEntry) -> Event {
    let inputs = entry
        .inputs
        .iter()
        .map(|param| EventParam {
            ty: param.ty.clone(),
            name: param.name.clone(),
            indexed: param.indexed,
            components: param.components.iter().map(abi_param).collect(),
            internal_type: None,
        })
        .collect();

    Event {
        name: name.to_string(),
        inputs,
        anonymous: entry.anonymous.unwrap_or(false),
    }
}

/// Formatted signatures of every named event in the ABI, in ABI order.
pub fn extract_signatures(abi: &[InterfaceEntry]) -> Vec<String> {
    let signatures: Vec<String> = abi
        .iter()
        .filter(|entry| entry.is_event())
        .map(format_signature)
        .filter(|signature| !signature.is_empty())
        .collect();

    debug!("Extracted {} events from ABI", signatures.len());
    signatures
}

pub fn extract_details(abi: &[InterfaceEntry]) -> Vec<EventDetail> {
    abi.iter()
        .filter(|entry| entry.is_event())
        .filter_map(|entry| {
            let signature = format_signature(entry);
            if signature.is_empty() {
                return None;
            }
            let name = entry.name.clone().unwrap_or_default();
            let event = abi_event(&name, entry);
            let anonymous = event.anonymous;
            let canonical = event.signature();
            let topic = (!anonymous).then(|| format!("0x{}", hex::encode(event.selector())));

            Some(EventDetail {
                name,
                signature,
                canonical,
                topic,
                anonymous,
                inputs: entry.inputs.clone(),
            })
        })
        .collect()
}

pub fn event_names(abi: &[InterfaceEntry]) -> Vec<String> {
    abi.iter()
        .filter(|entry| entry.is_event())
        .filter_map(|entry| entry.name.clone())
        .filter(|name| !name.is_empty())
        .collect()
}

pub fn filter_by_name(abi: &[InterfaceEntry], names: &[&str]) -> Vec<String> {
    extract_signatures(abi)
        .into_iter()
        .filter(|signature| names.contains(&base_name(signature)))
        .collect()
}

fn base_name(signature: &str) -> &str {
    signature.split('(').next().unwrap_or_default().trim()
}

/// Every category is present in the map, possibly empty.
pub fn categorize<S: AsRef<str>>(signatures: &[S]) -> BTreeMap<EventCategory, Vec<String>> {
    let mut categories: BTreeMap<EventCategory, Vec<String>> =
        EventCategory::ALL.iter().map(|c| (*c, Vec::new())).collect();

    for signature in signatures {
        let signature = signature.as_ref();
        categories
            .entry(EventCategory::of(signature))
            .or_default()
            .push(signature.to_string());
    }

    categories
}

/// Name and parameter list. The `)` must come after the first `(`, so
/// strings like `)Foo(` are rejected even though both characters appear.
fn split_signature(signature: &str) -> Option<(&str, &str)> {
    let open = signature.find('(')?;
    let rest = &signature[open + 1..];
    let close = rest.find(')')?;
    Some((&signature[..open], &rest[..close]))
}

/// Structural check: a name, both parentheses, and parameters that each
/// carry a type plus a name or `indexed` marker.
pub fn validate_signature(signature: &str) -> bool {
    let Some((name, params)) = split_signature(signature) else {
        return false;
    };

    if name.trim().is_empty() {
        return false;
    }

    if params.trim().is_empty() {
        return true;
    }

    params
        .split(',')
        .all(|param| param.split_whitespace().count() >= 2)
}

/// Inverse of signature formatting. Parameters rendered without a name
/// come back with `name: None`.
pub fn parse_signature(signature: &str) -> Option<ParsedSignature> {
    let (name, params) = split_signature(signature)?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let mut parsed = Vec::new();
    if !params.trim().is_empty() {
        for param in params.split(',') {
            let mut tokens: Vec<&str> = param.split_whitespace().collect();
            let indexed = tokens.len() > 1 && tokens.last() == Some(&"indexed");
            if indexed {
                tokens.pop();
            }

            let param = match tokens.as_slice() {
                [ty] => ParsedParam {
                    name: None,
                    ty: ty.to_string(),
                    indexed,
                },
                [name, ty] => ParsedParam {
                    name: Some(name.to_string()),
                    ty: ty.to_string(),
                    indexed,
                },
                _ => return None,
            };
            parsed.push(param);
        }
    }

    Some(ParsedSignature {
        name: name.to_string(),
        params: parsed,
    })
}
