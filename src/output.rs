use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use tokio::fs;
use tracing::{debug, info};

use crate::collector::{ResultRecord, WorkItem};

pub const RESULTS_FILE: &str = "defi_protocols_contracts_events.json";
pub const SUMMARY_FILE: &str = "collection_summary.json";
pub const RESULTS_CSV_FILE: &str = "defi_protocols_contracts_events.csv";

pub fn snapshot_file_name(at: DateTime<Utc>) -> String {
    format!("intermediate_results_{}.json", at.timestamp())
}

/// Pretty-printed JSON, creating parent directories as needed.
pub async fn save_json<T: Serialize + ?Sized, P: AsRef<Path>>(value: &T, path: P) -> Result<()> {
    let path = path.as_ref();
    let content = serde_json::to_string_pretty(value)
        .map_err(|e| anyhow!("Failed to serialize {:?}: {}", path, e))?;

    ensure_parent(path).await?;
    fs::write(path, content)
        .await
        .map_err(|e| anyhow!("Failed to write {:?}: {}", path, e))?;

    debug!("Saved data to {:?}", path);
    Ok(())
}

async fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| anyhow!("Failed to create directory {:?}: {}", parent, e))?;
        }
    }
    Ok(())
}

/// Reads a `protocol,category,network` CSV. Header names and fields are
/// trimmed.
pub async fn load_worklist<P: AsRef<Path>>(path: P) -> Result<Vec<WorkItem>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .await
        .map_err(|e| anyhow!("Failed to read worklist {:?}: {}", path, e))?;

    let items = parse_worklist(&content).map_err(|e| anyhow!("Invalid worklist {:?}: {}", path, e))?;
    info!("Loaded {} protocols from {:?}", items.len(), path);
    Ok(items)
}

pub fn parse_worklist(content: &str) -> Result<Vec<WorkItem>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let mut items = Vec::new();
    for row in reader.deserialize() {
        let item: WorkItem = row?;
        items.push(item);
    }
    Ok(items)
}

/// CSV export of the result records, list fields joined with `"; "`.
pub async fn export_csv<P: AsRef<Path>>(records: &[ResultRecord], path: P) -> Result<()> {
    let path = path.as_ref();
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer.write_record([
        "protocol",
        "category",
        "network",
        "contract_address",
        "contract_name",
        "verified",
        "events",
        "origin",
        "source",
    ])?;

    for record in records {
        let verified = if record.is_verified() { "yes" } else { "no" };
        let origin = serde_json::to_value(record.origin)?;
        let source = match record.source {
            Some(source) => serde_json::to_value(source)?,
            None => serde_json::Value::Null,
        };
        writer.write_record([
            record.protocol.as_str(),
            record.category.as_str(),
            record.network.as_str(),
            record.contract_address.as_str(),
            record.contract_name.as_str(),
            verified,
            record.events.join("; ").as_str(),
            origin.as_str().unwrap_or_default(),
            source.as_str().unwrap_or_default(),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow!("Failed to flush CSV: {}", e))?;

    ensure_parent(path).await?;
    fs::write(path, bytes)
        .await
        .map_err(|e| anyhow!("Failed to write {:?}: {}", path, e))?;

    info!("Exported {} records to {:?}", records.len(), path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::Verified;
    use crate::ethereum::{CandidateOrigin, InterfaceSource};
    use chrono::TimeZone;

    #[test]
    fn test_parse_worklist_trims() {
        let items = parse_worklist(
            "protocol, category ,network\naave, lending, ethereum\n velodrome_v2 ,dexs,optimism\n",
        )
        .unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].protocol, "aave");
        assert_eq!(items[0].category, "lending");
        assert_eq!(items[1].protocol, "velodrome_v2");
        assert_eq!(items[1].network, "optimism");
    }

    #[test]
    fn test_parse_worklist_rejects_missing_columns() {
        assert!(parse_worklist("protocol,network\naave,ethereum\n").is_err());
    }

    #[test]
    fn test_snapshot_file_name() {
        let at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        assert_eq!(snapshot_file_name(at), "intermediate_results_1700000000.json");
    }

    #[tokio::test]
    async fn test_save_json_and_export_csv() {
        let dir = tempfile::tempdir().unwrap();
        let records = vec![ResultRecord {
            protocol: "aave".to_string(),
            category: "lending".to_string(),
            network: "ethereum".to_string(),
            contract_address: "0x7d2768dE32b0b80b7a3454c06BdAc94A69DDc7A9".to_string(),
            contract_name: "LendingPool".to_string(),
            verified: Verified::Yes,
            events: vec!["Deposit(amount uint256)".to_string(), "Borrow(amount uint256)".to_string()],
            origin: CandidateOrigin::Registry,
            source: Some(InterfaceSource::LiveExplorer),
        }];

        let json_path = dir.path().join("nested").join(RESULTS_FILE);
        save_json(&records, &json_path).await.unwrap();
        let saved: Vec<ResultRecord> =
            serde_json::from_str(&tokio::fs::read_to_string(&json_path).await.unwrap()).unwrap();
        assert_eq!(saved, records);

        let csv_path = dir.path().join(RESULTS_CSV_FILE);
        export_csv(&records, &csv_path).await.unwrap();
        let csv = tokio::fs::read_to_string(&csv_path).await.unwrap();
        let mut lines = csv.lines();
        assert!(lines.next().unwrap().starts_with("protocol,category,network"));
        let row = lines.next().unwrap();
        assert!(row.contains("Deposit(amount uint256); Borrow(amount uint256)"));
        assert!(row.ends_with("registry,live_explorer"));
    }
}
