//! ticksim CLI: run components, the scheduler or the message broker.

use clap::{Args, Parser, Subcommand};
use log::info;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use ticksim::config::{find_config, read_configs};
use ticksim::core::channels::{BackendRegistry, Broker, Transport};
use ticksim::core::execution::{run_all, MasterScheduler, RunConfig, Runnable};
use ticksim::{create_simulations, Component, DeviceRegistry, InverseWiring, SimError, SimTime};
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "ticksim")]
#[command(version, about = "ticksim: distributed delta-cycle simulation of time-driven devices")]
struct Cli {
    /// Log filter used when RUST_LOG is not set.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ChannelArgs {
    /// Channel backend name.
    #[arg(long, default_value = "broker")]
    backend: String,

    /// Address of the message broker.
    #[arg(long, default_value = "127.0.0.1:7878")]
    broker: SocketAddr,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single component.
    Device {
        /// Name of the component in the config file.
        name: String,

        /// Path to the component configs (YAML or JSON).
        config: PathBuf,

        #[command(flatten)]
        channel: ChannelArgs,
    },

    /// Run only the master scheduler.
    Scheduler {
        /// Path to the component configs (YAML or JSON).
        config: PathBuf,

        #[command(flatten)]
        channel: ChannelArgs,

        /// Stop before simulated time passes this value.
        #[arg(long)]
        stop_at: Option<SimTime>,
    },

    /// Run the scheduler and every component in this process.
    All {
        /// Path to the component configs (YAML or JSON).
        config: PathBuf,

        /// Channel backend name.
        #[arg(long, default_value = "internal")]
        backend: String,

        /// Address of the message broker, for the broker backend.
        #[arg(long, default_value = "127.0.0.1:7878")]
        broker: SocketAddr,

        /// Stop before simulated time passes this value.
        #[arg(long)]
        stop_at: Option<SimTime>,
    },

    /// Run the message broker.
    Broker {
        /// Address to listen on.
        #[arg(long, default_value = "127.0.0.1:7878")]
        listen: SocketAddr,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_level.as_str())).init();

    let shutdown = CancellationToken::new();
    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, shutting down");
            on_signal.cancel();
        }
    });

    let result = match cli.command {
        Commands::Device { name, config, channel } => {
            let run = RunConfig::new()
                .with_backend(channel.backend)
                .with_broker_addr(channel.broker);
            run_device(&name, &config, &run, shutdown).await
        }
        Commands::Scheduler {
            config,
            channel,
            stop_at,
        } => {
            let run = RunConfig::new()
                .with_backend(channel.backend)
                .with_broker_addr(channel.broker)
                .with_stop_at(stop_at);
            run_scheduler(&config, &run, shutdown).await
        }
        Commands::All {
            config,
            backend,
            broker,
            stop_at,
        } => {
            let run = RunConfig::new()
                .with_backend(backend)
                .with_broker_addr(broker)
                .with_stop_at(stop_at);
            run_everything(&config, &run, shutdown).await
        }
        Commands::Broker { listen } => run_broker(listen, shutdown).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Transport for processes that only hold part of the simulation
fn remote_transport(run: &RunConfig) -> Result<Arc<dyn Transport>, SimError> {
    Ok(BackendRegistry::standard().create_remote(&run.backend, &run.channel)?)
}

async fn run_device(
    name: &str,
    path: &Path,
    run: &RunConfig,
    shutdown: CancellationToken,
) -> Result<(), SimError> {
    let configs = read_configs(path)?;
    let config = find_config(&configs, name)?;
    let device = DeviceRegistry::with_builtin_devices().build(&config.device)?;
    let component: Box<dyn Runnable> =
        Box::new(Component::new(config.name.clone(), device, remote_transport(run)?));
    info!("Running component {} ({})", config.name, config.device.kind());
    run_all(vec![component], shutdown).await
}

async fn run_scheduler(path: &Path, run: &RunConfig, shutdown: CancellationToken) -> Result<(), SimError> {
    let configs = read_configs(path)?;
    let wiring = InverseWiring::from_component_configs(&configs)?;
    let scheduler: Box<dyn Runnable> =
        Box::new(MasterScheduler::new(Arc::new(wiring), remote_transport(run)?).with_stop_at(run.stop_at));
    run_all(vec![scheduler], shutdown).await
}

async fn run_everything(path: &Path, run: &RunConfig, shutdown: CancellationToken) -> Result<(), SimError> {
    let configs = read_configs(path)?;
    let wiring = InverseWiring::from_component_configs(&configs)?;
    let transport = BackendRegistry::standard().create(&run.backend, &run.channel)?;

    let components = create_simulations(&configs, &DeviceRegistry::with_builtin_devices(), transport.clone())?;
    let mut units: Vec<Box<dyn Runnable>> = components
        .into_iter()
        .map(|component| Box::new(component) as Box<dyn Runnable>)
        .collect();
    units.push(Box::new(
        MasterScheduler::new(Arc::new(wiring), transport).with_stop_at(run.stop_at),
    ));
    run_all(units, shutdown).await
}

async fn run_broker(listen: SocketAddr, shutdown: CancellationToken) -> Result<(), SimError> {
    let broker = Broker::bind(listen).await?;
    info!("Broker listening on {}", broker.local_addr()?);
    broker.serve(shutdown).await?;
    Ok(())
}
