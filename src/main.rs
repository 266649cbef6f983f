use clap::{Parser, Subcommand};
use std::path::Path;
use std::sync::Arc;

use native_host::application::errors::HostError;
use native_host::application::services::{ControlOutcome, ControlService};
use native_host::application::NativeHost;
use native_host::infrastructure::adapters::console::ConsoleAdapter;
use native_host::infrastructure::config::Config;

#[derive(Parser)]
#[command(name = "native-host")]
#[command(about = "Host for legacy native bot plugins", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.yaml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the host with an interactive console
    Run,
    /// Load every plugin, print them and exit
    List,
    /// Show version
    Version,
    /// Generate default config
    InitConfig,
}

fn main() {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run => with_runtime(run_host(load_config(&cli.config))),
        Commands::List => with_runtime(list_plugins(load_config(&cli.config))),
        Commands::Version => {
            println!("native-host v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::InitConfig => init_config(),
    };

    if let Err(e) = result {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn load_config(config_path: &str) -> Config {
    if Path::new(config_path).exists() {
        Config::load(config_path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config: {}, using defaults", e);
            Config::load_env()
        })
    } else {
        Config::load_env()
    }
}

fn with_runtime<F>(future: F) -> Result<(), HostError>
where
    F: std::future::Future<Output = Result<(), HostError>>,
{
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(future)
}

async fn run_host(config: Config) -> Result<(), HostError> {
    let console = Arc::new(ConsoleAdapter::new(config.host.name.clone()));
    let host = NativeHost::start(config, console.clone()).await?;
    let control = ControlService::new(host.clone());

    println!("{}", control.list());
    println!("Type /online to enable plugins, /help for commands");

    loop {
        let Some(input) = console.read_line("> ").await else {
            break;
        };
        if input.is_empty() {
            continue;
        }

        match control.handle_line(&input).await {
            ControlOutcome::Reply(reply) => println!("{}", reply),
            ControlOutcome::Quit => break,
        }
        console.set_online(host.is_online());
    }

    host.shutdown().await;
    Ok(())
}

async fn list_plugins(config: Config) -> Result<(), HostError> {
    let console = Arc::new(ConsoleAdapter::new(config.host.name.clone()));
    let host = NativeHost::start(config, console).await?;
    print!("{}", ControlService::new(host.clone()).list());
    host.shutdown().await;
    Ok(())
}

fn init_config() -> Result<(), HostError> {
    let yaml = Config::default().to_yaml()?;
    println!("{}", yaml);
    println!("\nSave this to config.yaml and adjust as needed.");
    Ok(())
}
