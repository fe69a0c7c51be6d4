use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::explorer::{ExplorerAbi, ExplorerClient};
use super::samples::SampleInterfaces;
use super::{utils, CandidateContract, InterfaceResult, InterfaceSource};

pub const DEFAULT_CONCURRENCY: usize = 5;

#[derive(Debug)]
struct RetrieverInner {
    explorer: Arc<dyn ExplorerClient>,
    samples: SampleInterfaces,
    semaphore: Arc<Semaphore>,
}

/// Fetches contract interfaces from the explorer, falling back to sample
/// data. Cheap to clone; clones share the concurrency limit.
#[derive(Debug, Clone)]
pub struct AbiRetriever {
    inner: Arc<RetrieverInner>,
}

impl AbiRetriever {
    pub fn new(
        explorer: Arc<dyn ExplorerClient>,
        samples: SampleInterfaces,
        concurrency: usize,
    ) -> Self {
        Self {
            inner: Arc::new(RetrieverInner {
                explorer,
                samples,
                semaphore: Arc::new(Semaphore::new(concurrency.max(1))),
            }),
        }
    }

    /// Interface for one candidate. A live "not verified" answer is final;
    /// any explorer failure drops through to sample data.
    pub async fn retrieve(
        &self,
        candidate: &CandidateContract,
        network: &str,
    ) -> Option<InterfaceResult> {
        let explorer = &self.inner.explorer;

        if !explorer.has_endpoint(network) {
            debug!(network, "No explorer endpoint, using sample data");
        } else {
            match explorer.fetch_abi(network, &candidate.address).await {
                Ok(ExplorerAbi::Verified(abi)) => {
                    return Some(InterfaceResult {
                        verified: true,
                        source: InterfaceSource::LiveExplorer,
                        abi,
                    });
                }
                Ok(ExplorerAbi::NotVerified) => {
                    info!(network, address = %candidate.address, "Contract not verified");
                    return Some(InterfaceResult {
                        verified: false,
                        source: InterfaceSource::LiveExplorer,
                        abi: Vec::new(),
                    });
                }
                Err(e) if e.is_expected() => {
                    debug!(network, address = %candidate.address, "{}", e);
                }
                Err(e) => {
                    let message = e.to_string();
                    warn!(
                        network,
                        address = %candidate.address,
                        "ABI lookup failed ({}): {}",
                        utils::interpret_explorer_error(&message),
                        message
                    );
                }
            }
        }

        self.fallback(candidate)
    }

    fn fallback(&self, candidate: &CandidateContract) -> Option<InterfaceResult> {
        let samples = &self.inner.samples;

        if let Some((key, abi)) = samples.find(&candidate.address, &candidate.name) {
            info!(address = %candidate.address, "Using sample ABI for pattern: {}", key);
            return Some(InterfaceResult {
                verified: false,
                source: InterfaceSource::SampleMatch,
                abi: abi.to_vec(),
            });
        }

        let generic = samples.generic();
        if generic.is_empty() {
            return None;
        }

        info!(address = %candidate.address, "Using generic ABI");
        Some(InterfaceResult {
            verified: false,
            source: InterfaceSource::GenericFallback,
            abi: generic.to_vec(),
        })
    }

    /// Retrieve every candidate concurrently, at most `concurrency` lookups
    /// in flight. Lookups that fail or panic are left out of the map.
    pub async fn retrieve_many(
        &self,
        candidates: &[CandidateContract],
        network: &str,
    ) -> HashMap<String, InterfaceResult> {
        let mut tasks = JoinSet::new();

        for candidate in candidates.iter().cloned() {
            let retriever = self.clone();
            let network = network.to_string();
            let semaphore = self.inner.semaphore.clone();

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok()?;
                let result = retriever.retrieve(&candidate, &network).await?;
                Some((candidate.address, result))
            });
        }

        let mut results = HashMap::with_capacity(candidates.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some((address, result))) => {
                    results.insert(address, result);
                }
                Ok(None) => {}
                Err(e) => error!(network, "Batch fetch error: {}", e),
            }
        }

        for candidate in candidates {
            if !results.contains_key(&candidate.address) {
                warn!(network, address = %candidate.address, "No interface retrieved");
            }
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExplorerError;
    use crate::ethereum::{CandidateOrigin, InputParam, InterfaceEntry};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Debug, Default)]
    struct FakeExplorer {
        networks: HashSet<String>,
        verified: HashMap<String, Vec<InterfaceEntry>>,
        unverified: HashSet<String>,
        panics: HashSet<String>,
        delay: Duration,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        calls: AtomicUsize,
    }

    impl FakeExplorer {
        fn on(network: &str) -> Self {
            Self {
                networks: [network.to_string()].into_iter().collect(),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl ExplorerClient for FakeExplorer {
        fn has_endpoint(&self, network: &str) -> bool {
            self.networks.contains(network)
        }

        async fn fetch_abi(
            &self,
            _network: &str,
            address: &str,
        ) -> Result<ExplorerAbi, ExplorerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.panics.contains(address) {
                panic!("explorer blew up for {}", address);
            }
            if let Some(abi) = self.verified.get(address) {
                return Ok(ExplorerAbi::Verified(abi.clone()));
            }
            if self.unverified.contains(address) {
                return Ok(ExplorerAbi::NotVerified);
            }
            Err(ExplorerError::Timeout)
        }
    }

    fn candidate(address: &str, name: &str) -> CandidateContract {
        CandidateContract {
            address: address.to_string(),
            name: name.to_string(),
            origin: CandidateOrigin::Registry,
        }
    }

    fn retriever(explorer: FakeExplorer) -> (AbiRetriever, Arc<FakeExplorer>) {
        let explorer = Arc::new(explorer);
        let retriever = AbiRetriever::new(
            explorer.clone(),
            SampleInterfaces::builtin(),
            DEFAULT_CONCURRENCY,
        );
        (retriever, explorer)
    }

    #[tokio::test]
    async fn test_live_verified() {
        let mut explorer = FakeExplorer::on("ethereum");
        explorer.verified.insert(
            "0x1".to_string(),
            vec![InterfaceEntry::event(
                "Swap",
                vec![InputParam::new("amount", "uint256", false)],
            )],
        );
        let (retriever, _) = retriever(explorer);

        let result = retriever
            .retrieve(&candidate("0x1", "Router"), "ethereum")
            .await
            .unwrap();
        assert!(result.verified);
        assert_eq!(result.source, InterfaceSource::LiveExplorer);
        assert_eq!(result.abi.len(), 1);
    }

    #[tokio::test]
    async fn test_not_verified_is_terminal() {
        let mut explorer = FakeExplorer::on("ethereum");
        explorer.unverified.insert("0x2".to_string());
        let (retriever, _) = retriever(explorer);

        // the name would match a sample, but the explorer answer wins
        let result = retriever
            .retrieve(&candidate("0x2", "LendingPool"), "ethereum")
            .await
            .unwrap();
        assert!(!result.verified);
        assert_eq!(result.source, InterfaceSource::LiveExplorer);
        assert!(result.abi.is_empty());
    }

    #[tokio::test]
    async fn test_failure_falls_back_to_sample() {
        let (retriever, _) = retriever(FakeExplorer::on("ethereum"));

        let result = retriever
            .retrieve(&candidate("0x3", "Comptroller"), "ethereum")
            .await
            .unwrap();
        assert!(!result.verified);
        assert_eq!(result.source, InterfaceSource::SampleMatch);
        assert_eq!(result.abi[0].name.as_deref(), Some("MarketEntered"));
    }

    #[tokio::test]
    async fn test_no_endpoint_skips_explorer() {
        let (retriever, explorer) = retriever(FakeExplorer::on("ethereum"));

        let result = retriever
            .retrieve(&candidate("0x4", "GMXVault"), "fantom")
            .await
            .unwrap();
        assert_eq!(result.source, InterfaceSource::GenericFallback);
        assert_eq!(explorer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_generic_yields_none() {
        let explorer: Arc<dyn ExplorerClient> = Arc::new(FakeExplorer::default());
        let retriever = AbiRetriever::new(explorer, SampleInterfaces::new(vec![], vec![]), 1);
        assert!(retriever
            .retrieve(&candidate("0x5", "Anything"), "ethereum")
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_retrieve_many_respects_ceiling_and_isolates_failures() {
        let mut explorer = FakeExplorer::on("ethereum");
        explorer.delay = Duration::from_millis(20);

        let candidates: Vec<_> = (0..20)
            .map(|i| candidate(&format!("0x{:040x}", i), &format!("Contract{}", i)))
            .collect();
        for c in candidates.iter().take(10) {
            explorer.verified.insert(
                c.address.clone(),
                vec![InterfaceEntry::event("Ping", Vec::new())],
            );
        }
        for c in candidates.iter().skip(17) {
            explorer.panics.insert(c.address.clone());
        }

        let (retriever, explorer) = retriever(explorer);
        let results = retriever.retrieve_many(&candidates, "ethereum").await;

        assert_eq!(explorer.calls.load(Ordering::SeqCst), 20);
        assert!(explorer.max_in_flight.load(Ordering::SeqCst) <= DEFAULT_CONCURRENCY);
        assert_eq!(results.len(), 17);
        for c in candidates.iter().skip(17) {
            assert!(!results.contains_key(&c.address));
        }
        let live = results
            .values()
            .filter(|r| r.source == InterfaceSource::LiveExplorer)
            .count();
        assert_eq!(live, 10);
    }
}
