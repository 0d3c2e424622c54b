use clap::{Arg, Command};
use log::LevelFilter;
use std::process;
use std::sync::Arc;

use tunnel_sentry::config::Config;
use tunnel_sentry::dispatcher::AlertDispatcher;
use tunnel_sentry::domain::DomainExtractor;
use tunnel_sentry::pipeline::Pipeline;
use tunnel_sentry::reassembly::ReassemblyStore;
use tunnel_sentry::scorer::Scorer;
use tunnel_sentry::server::{self, AppState};

#[tokio::main]
async fn main() {
    let matches = Command::new("tunnel-sentry")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Detects covert exfiltration hidden in chunked message traffic")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("/etc/tunnel-sentry.yaml"),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .value_name("FILE")
                .help("Generate a default configuration file")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("test-config")
                .long("test-config")
                .help("Test configuration validity and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let log_level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if let Some(generate_path) = matches.get_one::<String>("generate-config") {
        match Config::default().to_file(generate_path) {
            Ok(()) => println!("Generated default configuration: {generate_path}"),
            Err(e) => {
                eprintln!("Failed to generate configuration: {e}");
                process::exit(1);
            }
        }
        return;
    }

    let config_path = matches.get_one::<String>("config").unwrap();
    let config = if std::path::Path::new(config_path).exists() {
        match Config::from_file(config_path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error loading configuration {config_path}: {e}");
                process::exit(1);
            }
        }
    } else {
        log::warn!("Configuration file {config_path} not found, using defaults");
        Config::default()
    };

    if matches.get_flag("test-config") {
        println!("Configuration OK");
        println!("  listen_addr: {}", config.listen_addr);
        println!(
            "  model_path: {}",
            config.model_path.as_deref().unwrap_or("(heuristic scorer)")
        );
        println!(
            "  alert_url: {}",
            config.alert_url.as_deref().unwrap_or("(dispatch disabled)")
        );
        println!("  alert_threshold: {}", config.alert_threshold);
        return;
    }

    if let Err(e) = run(config).await {
        log::error!("Fatal: {e}");
        process::exit(1);
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    let scorer = Scorer::from_model_path(config.model_path.as_deref());
    let pipeline = Pipeline::new(
        scorer,
        DomainExtractor::new()?,
        AlertDispatcher::new(
            config.alert_url.clone(),
            config.alert_api_key.clone(),
            config.dispatch_timeout_seconds,
        )?,
        config.alert_threshold,
    );

    let state = AppState {
        store: Arc::new(ReassemblyStore::new()),
        pipeline: Arc::new(pipeline),
    };
    server::run(&config.listen_addr, state).await
}
