use clap::{Parser, Subcommand};
use log::{error, info};
use shardline::shardline::config::PipelineConfig;
use shardline::shardline::server::{PipelineController, ShutdownCoordinator, SignalListener};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "shardline")]
#[command(about = "Kafka to sharded Redis ingestion pipeline")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the ingestion pipeline
    Server {
        /// YAML configuration file
        #[arg(long, short)]
        config: PathBuf,

        /// Validate and print the configuration, then exit
        #[arg(long)]
        test: bool,
    },
}

fn init_logging(default_level: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
}

async fn run_server(config: PipelineConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut controller = PipelineController::new(config);
    controller.init().await?;

    let coordinator = ShutdownCoordinator::new();
    let signals = coordinator.subscribe();
    let listener = SignalListener::install()?;
    tokio::spawn(async move { coordinator.forward_os_signals(listener).await });

    controller.start()?;
    let report = controller.serve(signals).await?;
    if !report.all_graceful() {
        error!("{}", report);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Server { config, test } => {
            let config = match PipelineConfig::from_file(&config) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("{}", e);
                    return ExitCode::FAILURE;
                }
            };

            if test {
                match config.to_pretty_string() {
                    Ok(dump) => println!("{}", dump),
                    Err(e) => {
                        eprintln!("{}", e);
                        return ExitCode::FAILURE;
                    }
                }
                println!("configuration test is successful");
                return ExitCode::SUCCESS;
            }

            init_logging(&config.logging.level);
            info!("Starting {}", config.summary());

            match run_server(config).await {
                Ok(()) => {
                    info!("shardline exited");
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    error!("shardline failed: {}", e);
                    ExitCode::FAILURE
                }
            }
        }
    }
}
