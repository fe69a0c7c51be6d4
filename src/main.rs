use anyhow::Result;
use clap::{Arg, Command};
use defi_event_collector::{
    collector::Collector,
    config::Config,
    ethereum::explorer::EtherscanClient,
    output,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    match run().await {
        Ok(code) => code,
        Err(e) => {
            error!("Collection failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<ExitCode> {
    let matches = Command::new("defi-event-collector")
        .version("0.1.0")
        .about("Collects contract addresses and event signatures for DeFi protocols")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Path to configuration file"),
        )
        .arg(
            Arg::new("input")
                .short('i')
                .long("input")
                .value_name("CSV")
                .default_value("protocols.csv")
                .help("Worklist CSV with protocol,category,network columns"),
        )
        .arg(
            Arg::new("output-dir")
                .short('o')
                .long("output-dir")
                .value_name("DIR")
                .help("Directory for results, summary and snapshots"),
        )
        .arg(
            Arg::new("concurrency")
                .long("concurrency")
                .value_name("N")
                .value_parser(clap::value_parser!(usize))
                .help("Explorer lookups in flight at once"),
        )
        .arg(
            Arg::new("pacing-ms")
                .long("pacing-ms")
                .value_name("MS")
                .value_parser(clap::value_parser!(u64))
                .help("Pause after each contract in milliseconds"),
        )
        .arg(
            Arg::new("csv")
                .long("csv")
                .help("Also export results as CSV")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .help("Generate a sample configuration file and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("config-path")
                .long("config-path")
                .help("Print the default configuration file path and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    if matches.get_flag("generate-config") {
        println!("{}", Config::generate_sample());
        return Ok(ExitCode::SUCCESS);
    }

    if matches.get_flag("config-path") {
        println!("{}", Config::default_config_path()?.display());
        return Ok(ExitCode::SUCCESS);
    }

    let config_path = matches.get_one::<String>("config").map(|s| s.as_str());
    let mut config = Config::load_or_default(config_path).await;

    if let Some(dir) = matches.get_one::<String>("output-dir") {
        config.collector.output_dir = PathBuf::from(dir);
    }
    if let Some(concurrency) = matches.get_one::<usize>("concurrency") {
        config.collector.concurrency = *concurrency;
    }
    if let Some(pacing) = matches.get_one::<u64>("pacing-ms") {
        config.collector.pacing_ms = *pacing;
    }
    config.validate()?;

    info!("Starting DeFi event collector");
    info!("Supported networks: {}", config.supported_networks().join(", "));

    let input = matches
        .get_one::<String>("input")
        .map(String::as_str)
        .unwrap_or("protocols.csv");
    let items = output::load_worklist(input).await?;

    let explorer = Arc::new(EtherscanClient::from_config(&config)?);
    let collector = Collector::from_config(&config, explorer).await?;
    let report = collector.run(&items).await;

    let output_dir = &config.collector.output_dir;
    let results_path = output_dir.join(output::RESULTS_FILE);
    output::save_json(&report.records, &results_path).await?;
    output::save_json(&report.summary, output_dir.join(output::SUMMARY_FILE)).await?;
    if matches.get_flag("csv") {
        output::export_csv(&report.records, output_dir.join(output::RESULTS_CSV_FILE)).await?;
    }

    let summary = &report.summary;
    info!("Results saved to {:?}", results_path);
    info!(
        "Contracts: {} total, {} verified, {} unverified, {} events",
        summary.total_contracts,
        summary.verified_contracts,
        summary.unverified_contracts,
        summary.total_events
    );
    info!(
        "Protocols: {}, networks: {}, categories: {}",
        summary.protocols_processed, summary.network_count, summary.category_count
    );

    if summary.verified_contracts == 0 {
        warn!("No contract was verified by an explorer");
        return Ok(ExitCode::FAILURE);
    }

    Ok(ExitCode::SUCCESS)
}
