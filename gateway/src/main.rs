mod config;

use aggregator::catalog::CATALOG;
use aggregator::errors::GatewayError;
use aggregator::metrics_defs::ALL_METRICS;
use clap::{Args, Parser};
use config::{Config, ConfigError, LoggingConfig, MetricsConfig};
use metrics_exporter_statsd::StatsdBuilder;
use shared::metrics_defs::describe_all;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(about = "Player profile aggregation gateway")]
enum CliCommand {
    /// Serve the gateway and admin listeners
    Run(ConfigArgs),
    /// Load and validate a config file, then exit
    ValidateConfig(ConfigArgs),
    /// Print the fields the aggregation endpoint can return
    Fields,
}

#[derive(Args)]
struct ConfigArgs {
    #[arg(long)]
    config_file_path: PathBuf,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to set up metrics: {0}")]
    Metrics(String),
    #[error("failed to start runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

fn main() -> Result<(), CliError> {
    let cli = CliCommand::parse();

    match cli {
        CliCommand::Run(args) => {
            let config = Config::from_file(&args.config_file_path)?;
            let _sentry = init_tracing(config.common.logging.as_ref());
            init_metrics(config.common.metrics.as_ref())?;

            let credential = config.gateway.upstream.load_credential();
            tracing::info!(
                listener = %format!("{}:{}", config.gateway.listener.host, config.gateway.listener.port),
                upstream = %config.gateway.upstream.base_url,
                "Starting gateway"
            );

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(aggregator::run(config.gateway, credential))?;
        }
        CliCommand::ValidateConfig(args) => {
            Config::from_file(&args.config_file_path)?;
            println!("{}: ok", args.config_file_path.display());
        }
        CliCommand::Fields => {
            for field in CATALOG {
                let depends_on: Vec<_> = field.depends_on.iter().map(|r| r.name()).collect();
                println!("{:<18} {}", field.name, depends_on.join(", "));
            }
        }
    }

    Ok(())
}

/// Installs the fmt subscriber, plus the Sentry layer when a DSN is configured.
///
/// The returned guard flushes pending Sentry events on drop.
fn init_tracing(logging: Option<&LoggingConfig>) -> Option<sentry::ClientInitGuard> {
    let guard = logging.map(|logging| {
        sentry::init((
            logging.sentry_dsn.as_str(),
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(guard.as_ref().map(|_| sentry::integrations::tracing::layer()))
        .init();

    guard
}

fn init_metrics(config: Option<&MetricsConfig>) -> Result<(), CliError> {
    let Some(config) = config else {
        return Ok(());
    };

    let recorder = StatsdBuilder::from(config.statsd_host.as_str(), config.statsd_port)
        .build(Some("gateway"))
        .map_err(|e| CliError::Metrics(e.to_string()))?;
    metrics::set_global_recorder(recorder).map_err(|e| CliError::Metrics(e.to_string()))?;
    describe_all(ALL_METRICS);

    Ok(())
}
