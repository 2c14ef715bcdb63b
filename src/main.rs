use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tdoa_locator::api::formatting::{CsvFormatter, OutputTarget, ResultFormatter, TextFormatter};
use tdoa_locator::api::server;
use tdoa_locator::processing::{BatchProcessor, MeasurementParser};
use tdoa_locator::utils::config::{ConfigurationManager, LocatorConfig};
use tdoa_locator::Method;

#[derive(Parser, Debug)]
#[command(name = "tdoa", version, about = "TDOA emitter positioning")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Solve every record of a measurement document
    Locate {
        /// JSON file with receiver positions and timestamps
        #[arg(short, long = "gnb", value_name = "FILE")]
        gnb: PathBuf,
        /// 1 (linear) or 2 (nonlinear)
        #[arg(short, long, default_value = "1")]
        method: Method,
        /// `stdout` or a file path
        #[arg(short, long, default_value = "stdout")]
        output: OutputTarget,
        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Time windowed solves over static geometry and timestamp rounds
    Benchmark {
        /// JSON file with receiver positions and measurement rounds
        #[arg(short, long, value_name = "FILE")]
        receiver: PathBuf,
        #[arg(short, long, default_value = "1")]
        method: Method,
        /// Rounds averaged per solve
        #[arg(short, long)]
        window_size: Option<usize>,
        /// Solve windows in parallel
        #[arg(short, long)]
        parallel: bool,
        #[arg(short, long, default_value = "stdout")]
        output: OutputTarget,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Run the HTTP locate service
    Serve {
        #[arg(long)]
        ip_address: Option<String>,
        #[arg(long)]
        port: Option<u16>,
        #[arg(long)]
        api_endpoint: Option<String>,
        #[arg(long)]
        thread_num: Option<usize>,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<ConfigurationManager> {
    match path {
        Some(path) => ConfigurationManager::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display())),
        None => Ok(ConfigurationManager::new()),
    }
}

/// Re-validate after command-line overrides
fn finish_config(manager: ConfigurationManager) -> anyhow::Result<LocatorConfig> {
    let validation = ConfigurationManager::validate(manager.config());
    for warning in &validation.warnings {
        warn!("{}", warning);
    }
    if let Some(error) = validation.errors.into_iter().next() {
        bail!(error);
    }
    Ok(manager.into_config())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Locate {
            gnb,
            method,
            output,
            config,
        } => {
            let config = finish_config(load_config(config.as_ref())?)?;
            info!(file = %gnb.display(), %method, "locating");

            let records = MeasurementParser::from_config(&config.input)
                .load_measurements(&gnb)
                .with_context(|| format!("reading {}", gnb.display()))?;
            let items = BatchProcessor::from_config(&config, method).process_records(&records);

            let mut out = output.open().with_context(|| format!("opening {}", output))?;
            TextFormatter.write_report(&mut out, &items, output.is_stdout())?;
        }
        Command::Benchmark {
            receiver,
            method,
            window_size,
            parallel,
            output,
            config,
        } => {
            let mut manager = load_config(config.as_ref())?;
            if let Some(window_size) = window_size {
                manager.config_mut().batch.window_size = window_size;
            }
            if parallel {
                manager.config_mut().batch.parallel = true;
            }
            let config = finish_config(manager)?;
            info!(
                file = %receiver.display(),
                %method,
                window_size = config.batch.window_size,
                parallel = config.batch.parallel,
                "benchmarking"
            );

            let document = MeasurementParser::from_config(&config.input)
                .load_geometry(&receiver)
                .with_context(|| format!("reading {}", receiver.display()))?;
            let items = BatchProcessor::from_config(&config, method).process_rounds(&document, config.batch.window_size)?;

            let mut out = output.open().with_context(|| format!("opening {}", output))?;
            CsvFormatter.write_report(&mut out, &items, output.is_stdout())?;
        }
        Command::Serve {
            ip_address,
            port,
            api_endpoint,
            thread_num,
            config,
        } => {
            let mut manager = load_config(config.as_ref())?;
            {
                let server = &mut manager.config_mut().server;
                if let Some(ip_address) = ip_address {
                    server.ip_address = ip_address;
                }
                if let Some(port) = port {
                    server.port = port;
                }
                if let Some(api_endpoint) = api_endpoint {
                    server.api_endpoint = api_endpoint;
                }
                if let Some(thread_num) = thread_num {
                    server.thread_num = thread_num;
                }
            }
            let config = finish_config(manager)?;

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(config.server.thread_num)
                .enable_all()
                .build()
                .context("building async runtime")?;
            runtime.block_on(server::serve(config))?;
        }
    }

    Ok(())
}
