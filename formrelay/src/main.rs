mod config;

use clap::{Args, Parser};
use config::{CommonConfig, Config, ConfigError, MetricsConfig, default_log_level};
use metrics_exporter_statsd::StatsdBuilder;
use relay::config::{Config as RelayConfig, ValidationError};
use relay::errors::RelayError;
use relay::handler::Relay;
use relay::payload::SubmissionPayload;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "formrelay", about = "Relays custom HTML form posts to a hosted form")]
enum CliCommand {
    /// Serve the relay and admin listeners
    Relay(ConfigArgs),
    /// Relay one submission and print the status line
    Submit(SubmitArgs),
    /// Parse and validate a config file
    CheckConfig(ConfigArgs),
}

#[derive(Args)]
struct ConfigArgs {
    #[arg(long)]
    config_path: PathBuf,
}

#[derive(Args)]
struct SubmitArgs {
    #[command(flatten)]
    config: ConfigArgs,
    /// Form field as key=value, repeatable
    #[arg(long = "field", short = 'f', value_parser = parse_field)]
    fields: Vec<(String, String)>,
}

fn parse_field(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got '{s}'")),
    }
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid relay config: {0}")]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Relay(#[from] RelayError),
    #[error("config file has no relay section")]
    MissingRelayConfig,
    #[error("could not start metrics exporter: {0}")]
    Metrics(String),
    #[error("could not start runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

fn main() -> ExitCode {
    let cli = CliCommand::parse();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: CliCommand) -> Result<ExitCode, CliError> {
    match cli {
        CliCommand::CheckConfig(args) => {
            let (_, relay_config) = load(&args)?;
            relay_config.validate()?;
            println!("Config OK");
            Ok(ExitCode::SUCCESS)
        }
        CliCommand::Relay(args) => {
            let (common, relay_config) = load(&args)?;
            let _sentry = init_observability(&common)?;

            println!("Starting relay");
            runtime()?.block_on(serve(relay_config))?;
            Ok(ExitCode::SUCCESS)
        }
        CliCommand::Submit(args) => {
            let (common, relay_config) = load(&args.config)?;
            relay_config.form.validate()?;
            let _sentry = init_observability(&common)?;

            let payload: SubmissionPayload = args.fields.into_iter().collect();
            let status = runtime()?.block_on(async {
                let relay = Relay::try_new(&relay_config.form)?;
                Ok::<_, RelayError>(relay.relay(payload).await)
            })?;

            println!("{status}");
            match status.is_ok() {
                true => Ok(ExitCode::SUCCESS),
                false => Ok(ExitCode::FAILURE),
            }
        }
    }
}

fn load(args: &ConfigArgs) -> Result<(CommonConfig, RelayConfig), CliError> {
    let Config { common, relay: relay_section } = Config::from_file(&args.config_path)?;
    let relay_config = relay_section.ok_or(CliError::MissingRelayConfig)?;
    Ok((common, relay_config))
}

fn runtime() -> Result<tokio::runtime::Runtime, CliError> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?)
}

async fn serve(config: RelayConfig) -> Result<(), RelayError> {
    tokio::select! {
        result = relay::run(config) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl+C, shutting down");
            Ok(())
        }
    }
}

/// Sets up logging, Sentry and StatsD. The returned guard flushes Sentry on drop.
fn init_observability(common: &CommonConfig) -> Result<Option<sentry::ClientInitGuard>, CliError> {
    let level = common
        .logging
        .as_ref()
        .map(|l| l.level.clone())
        .unwrap_or_else(default_log_level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let sentry_guard = common
        .logging
        .as_ref()
        .and_then(|l| l.sentry_dsn.as_deref())
        .map(|dsn| {
            sentry::init((
                dsn,
                sentry::ClientOptions {
                    release: sentry::release_name!(),
                    ..Default::default()
                },
            ))
        });
    let sentry_layer = sentry_guard
        .as_ref()
        .map(|_| sentry::integrations::tracing::layer());

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(sentry_layer)
        .init();

    if let Some(metrics_config) = &common.metrics {
        init_metrics(metrics_config)?;
    }

    Ok(sentry_guard)
}

fn init_metrics(config: &MetricsConfig) -> Result<(), CliError> {
    let recorder = StatsdBuilder::from(config.statsd_host.clone(), config.statsd_port)
        .build(Some(config.prefix.as_str()))
        .map_err(|e| CliError::Metrics(e.to_string()))?;

    metrics::set_global_recorder(recorder).map_err(|e| CliError::Metrics(e.to_string()))?;
    shared::metrics_defs::describe_all(relay::metrics_defs::ALL_METRICS);

    tracing::info!(
        host = %config.statsd_host,
        port = config.statsd_port,
        "Sending metrics to StatsD"
    );
    Ok(())
}
