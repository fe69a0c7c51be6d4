use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::ethereum::abi::AbiRetriever;
use crate::ethereum::events::{self, EventCategory};
use crate::ethereum::explorer::ExplorerClient;
use crate::ethereum::registry::{CandidateResolver, ContractRegistry, ContractResolver};
use crate::ethereum::samples::SampleInterfaces;
use crate::ethereum::{utils, CandidateContract, CandidateOrigin, InterfaceResult, InterfaceSource};
use crate::output;

/// One row of the protocol worklist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub protocol: String,
    pub category: String,
    pub network: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verified {
    Yes,
    No,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub protocol: String,
    pub category: String,
    pub network: String,
    pub contract_address: String,
    pub contract_name: String,
    pub verified: Verified,
    pub events: Vec<String>,
    pub origin: CandidateOrigin,
    /// Absent when no interface could be retrieved at all.
    pub source: Option<InterfaceSource>,
}

impl ResultRecord {
    pub fn is_verified(&self) -> bool {
        self.verified == Verified::Yes
    }
}

/// How a single contract was handled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ContractOutcome {
    /// The explorer answered, verified or not.
    Clean { address: String },
    /// Events come from sample or generic data.
    Degraded { address: String, source: InterfaceSource },
    /// Recorded as unverified with no events.
    Failed { address: String, reason: String },
}

/// How a work item was handled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemOutcome {
    Processed {
        protocol: String,
        network: String,
        contracts: Vec<ContractOutcome>,
    },
    Skipped {
        protocol: String,
        network: String,
        reason: String,
    },
    Failed {
        protocol: String,
        network: String,
        error: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionSummary {
    pub total_contracts: usize,
    pub verified_contracts: usize,
    pub unverified_contracts: usize,
    pub total_events: usize,
    pub protocols_processed: usize,
    pub networks_covered: Vec<String>,
    pub network_count: usize,
    pub categories_covered: Vec<String>,
    pub category_count: usize,
    pub contracts_by_origin: BTreeMap<CandidateOrigin, usize>,
    pub contracts_by_source: BTreeMap<InterfaceSource, usize>,
    pub degraded_contracts: usize,
    pub failed_contracts: usize,
    pub skipped_items: usize,
    pub failed_items: usize,
    /// Addresses that are not `0x` + 40 hex digits. Counted, never dropped.
    pub malformed_addresses: usize,
    pub events_by_category: BTreeMap<EventCategory, usize>,
}

impl CollectionSummary {
    pub fn from_results(records: &[ResultRecord], outcomes: &[ItemOutcome]) -> Self {
        let mut summary = CollectionSummary {
            total_contracts: records.len(),
            ..Default::default()
        };

        let mut protocols = BTreeSet::new();
        let mut networks = BTreeSet::new();
        let mut categories = BTreeSet::new();

        for record in records {
            if record.is_verified() {
                summary.verified_contracts += 1;
            } else {
                summary.unverified_contracts += 1;
            }
            summary.total_events += record.events.len();
            protocols.insert(record.protocol.as_str());
            networks.insert(record.network.clone());
            categories.insert(record.category.clone());

            *summary.contracts_by_origin.entry(record.origin).or_default() += 1;
            if let Some(source) = record.source {
                *summary.contracts_by_source.entry(source).or_default() += 1;
            }
            if !utils::is_well_formed_address(&record.contract_address) {
                summary.malformed_addresses += 1;
            }
            for (category, signatures) in events::categorize(&record.events) {
                *summary.events_by_category.entry(category).or_default() += signatures.len();
            }
        }

        for outcome in outcomes {
            match outcome {
                ItemOutcome::Processed { contracts, .. } => {
                    for contract in contracts {
                        match contract {
                            ContractOutcome::Clean { .. } => {}
                            ContractOutcome::Degraded { .. } => summary.degraded_contracts += 1,
                            ContractOutcome::Failed { .. } => summary.failed_contracts += 1,
                        }
                    }
                }
                ItemOutcome::Skipped { .. } => summary.skipped_items += 1,
                ItemOutcome::Failed { .. } => summary.failed_items += 1,
            }
        }

        summary.protocols_processed = protocols.len();
        summary.network_count = networks.len();
        summary.networks_covered = networks.into_iter().collect();
        summary.category_count = categories.len();
        summary.categories_covered = categories.into_iter().collect();
        summary
    }
}

#[derive(Debug, Clone, Default)]
pub struct CollectionReport {
    pub records: Vec<ResultRecord>,
    pub outcomes: Vec<ItemOutcome>,
    pub summary: CollectionSummary,
}

#[derive(Debug, Clone)]
pub struct CollectorOptions {
    pub pacing: Duration,
    /// Zero disables snapshots.
    pub snapshot_interval: usize,
    pub snapshot_dir: Option<PathBuf>,
    pub count_fallback_as_verified: bool,
}

impl Default for CollectorOptions {
    fn default() -> Self {
        Self {
            pacing: Duration::from_millis(500),
            snapshot_interval: 500,
            snapshot_dir: None,
            count_fallback_as_verified: false,
        }
    }
}

#[derive(Debug)]
struct Pipeline {
    resolver: Box<dyn CandidateResolver>,
    retriever: AbiRetriever,
    pacing: Duration,
    count_fallback_as_verified: bool,
}

struct ProtocolRun {
    records: Vec<ResultRecord>,
    contracts: Vec<ContractOutcome>,
}

impl Pipeline {
    async fn process_protocol(&self, item: &WorkItem) -> ProtocolRun {
        let candidates = self.resolver.resolve(&item.protocol, &item.network);
        let interfaces = self
            .retriever
            .retrieve_many(&candidates, &item.network)
            .await;

        let mut run = ProtocolRun {
            records: Vec::with_capacity(candidates.len()),
            contracts: Vec::with_capacity(candidates.len()),
        };

        for candidate in candidates {
            info!(
                protocol = %item.protocol,
                network = %item.network,
                address = %candidate.address,
                "Processing contract {}",
                candidate.name
            );

            // a list may name the same address twice
            let interface = interfaces.get(&candidate.address).cloned();
            let (record, outcome) = self.build_record(item, candidate, interface);

            info!("Processed {} - {} events found", record.contract_name, record.events.len());
            run.records.push(record);
            run.contracts.push(outcome);

            if !self.pacing.is_zero() {
                tokio::time::sleep(self.pacing).await;
            }
        }

        run
    }

    fn build_record(
        &self,
        item: &WorkItem,
        candidate: CandidateContract,
        interface: Option<InterfaceResult>,
    ) -> (ResultRecord, ContractOutcome) {
        let mut record = ResultRecord {
            protocol: item.protocol.clone(),
            category: item.category.clone(),
            network: item.network.clone(),
            contract_address: candidate.address.clone(),
            contract_name: candidate.name,
            verified: Verified::No,
            events: Vec::new(),
            origin: candidate.origin,
            source: None,
        };

        let Some(interface) = interface else {
            error!(
                protocol = %item.protocol,
                network = %item.network,
                address = %candidate.address,
                "No interface for contract, recording as unverified"
            );
            let outcome = ContractOutcome::Failed {
                address: candidate.address,
                reason: "interface retrieval failed".to_string(),
            };
            return (record, outcome);
        };

        let verified =
            interface.verified || (self.count_fallback_as_verified && interface.is_fallback());
        if verified {
            record.verified = Verified::Yes;
        }
        record.events = events::extract_signatures(&interface.abi);
        record.source = Some(interface.source);

        let outcome = if interface.is_fallback() {
            ContractOutcome::Degraded {
                address: candidate.address,
                source: interface.source,
            }
        } else {
            ContractOutcome::Clean {
                address: candidate.address,
            }
        };

        (record, outcome)
    }
}

/// Drives resolve, retrieve and extract over a worklist. Nothing short of a
/// snapshot write needs I/O, and a failed write is only logged.
#[derive(Debug)]
pub struct Collector {
    pipeline: Arc<Pipeline>,
    networks: Vec<String>,
    options: CollectorOptions,
}

impl Collector {
    pub fn new(
        resolver: impl CandidateResolver + 'static,
        retriever: AbiRetriever,
        networks: Vec<String>,
        options: CollectorOptions,
    ) -> Self {
        let pipeline = Pipeline {
            resolver: Box::new(resolver),
            retriever,
            pacing: options.pacing,
            count_fallback_as_verified: options.count_fallback_as_verified,
        };

        Self {
            pipeline: Arc::new(pipeline),
            networks,
            options,
        }
    }

    pub async fn from_config(config: &Config, explorer: Arc<dyn ExplorerClient>) -> Result<Self> {
        let mut registry = ContractRegistry::builtin();
        if let Some(path) = &config.collector.registry_file {
            registry.extend_from_file(path).await?;
        }

        let retriever = AbiRetriever::new(
            explorer,
            SampleInterfaces::builtin(),
            config.collector.concurrency,
        );

        let options = CollectorOptions {
            pacing: Duration::from_millis(config.collector.pacing_ms),
            snapshot_interval: config.collector.snapshot_interval,
            snapshot_dir: Some(config.collector.output_dir.clone()),
            count_fallback_as_verified: config.collector.count_fallback_as_verified,
        };

        Ok(Self::new(
            ContractResolver::new(registry),
            retriever,
            config.supported_networks(),
            options,
        ))
    }

    pub async fn run(&self, items: &[WorkItem]) -> CollectionReport {
        info!("Starting DeFi protocol data collection for {} work items", items.len());

        let mut records = Vec::new();
        let mut outcomes = Vec::with_capacity(items.len());
        let mut processed = 0usize;

        for (i, item) in items.iter().enumerate() {
            if let Err(e) = utils::validate_network(&item.network, &self.networks) {
                warn!("Skipping {}: {}", item.protocol, e);
                outcomes.push(ItemOutcome::Skipped {
                    protocol: item.protocol.clone(),
                    network: item.network.clone(),
                    reason: e.to_string(),
                });
                continue;
            }

            info!("Progress: {}/{} - {}", i + 1, items.len(), item.protocol);
            outcomes.push(self.process_item(item, &mut records).await);

            processed += 1;
            if self.options.snapshot_interval > 0 && processed % self.options.snapshot_interval == 0 {
                self.write_snapshot(&records, processed).await;
            }
        }

        let summary = CollectionSummary::from_results(&records, &outcomes);
        info!(
            "Collection complete: {} contracts, {} verified, {} events",
            summary.total_contracts, summary.verified_contracts, summary.total_events
        );

        CollectionReport {
            records,
            outcomes,
            summary,
        }
    }

    /// Runs one protocol in its own task so a panic stays contained.
    async fn process_item(&self, item: &WorkItem, records: &mut Vec<ResultRecord>) -> ItemOutcome {
        let pipeline = self.pipeline.clone();
        let task_item = item.clone();
        let joined =
            tokio::spawn(async move { pipeline.process_protocol(&task_item).await }).await;

        match joined {
            Ok(run) => {
                records.extend(run.records);
                ItemOutcome::Processed {
                    protocol: item.protocol.clone(),
                    network: item.network.clone(),
                    contracts: run.contracts,
                }
            }
            Err(e) => {
                error!(
                    protocol = %item.protocol,
                    network = %item.network,
                    "Error processing protocol: {}",
                    e
                );
                ItemOutcome::Failed {
                    protocol: item.protocol.clone(),
                    network: item.network.clone(),
                    error: e.to_string(),
                }
            }
        }
    }

    async fn write_snapshot(&self, records: &[ResultRecord], processed: usize) {
        let Some(dir) = &self.options.snapshot_dir else {
            return;
        };

        let path = dir.join(output::snapshot_file_name(chrono::Utc::now()));
        match output::save_json(records, &path).await {
            Ok(()) => info!("Saved intermediate results for {} protocols to {:?}", processed, path),
            Err(e) => warn!("Failed to save intermediate results: {}", e),
        }
    }
}
