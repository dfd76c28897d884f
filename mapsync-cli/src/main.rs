use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use mapsync_core::hlc::{Hlc, HlcTimestamp};
use mapsync_core::logging::{init_logging_with_config, LogLevel};
use mapsync_core::shutdown::{install_signal_handlers, ShutdownCoordinator};
use mapsync_core::sync::StaticTokenProvider;
use mapsync_core::test_utils::{random_edit_for, test_rng_with_seed, SimulatedRoom};
use mapsync_core::Config;
use rand::Rng;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Parser, Debug)]
#[command(name = "mapsync")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Set the log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Enable JSON formatted logging
    #[arg(long)]
    json_logs: bool,

    /// Configuration file; environment variables override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run peers against an in-process relay and check they converge
    Simulate {
        #[arg(long, default_value_t = 3)]
        peers: usize,

        #[arg(long, default_value_t = 20)]
        rounds: usize,

        /// Seed for edits and peer selection; defaults to
        /// `session.peer_selection_seed`, then a random one
        #[arg(long)]
        seed: Option<u64>,

        /// Distinct entities per subject
        #[arg(long, default_value_t = 5)]
        entities: u32,
    },

    /// Work with hybrid logical clock timestamps
    Hlc {
        #[command(subcommand)]
        action: HlcAction,
    },

    /// Print or check configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum HlcAction {
    /// Print fresh timestamps from the system clock
    Tick {
        #[arg(long, default_value_t = 1)]
        count: usize,
    },
    /// Decode a serialized timestamp
    Parse { timestamp: String },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Validate a configuration file
    Check { path: PathBuf },
    /// Write the default configuration to a file
    Init { path: PathBuf },
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => Config::from_env().context("reading environment")?,
    };

    if let Some(level) = &args.log_level {
        config.logging.level = level.parse::<LogLevel>().unwrap_or_else(|_| {
            eprintln!("Invalid log level '{}', using 'info'", level);
            LogLevel::Info
        });
    }
    if args.json_logs {
        config.logging.json_format = true;
    }

    config.validate()?;
    Ok(config)
}

/// Token the simulated peers present to the in-process relay
const SIMULATION_TOKEN: &str = "mapsync-simulate";

async fn simulate(
    config: &Config,
    peers: usize,
    rounds: usize,
    seed: u64,
    entities: u32,
    shutdown: &ShutdownCoordinator,
) -> Result<()> {
    if peers == 0 {
        bail!("at least one peer is needed");
    }

    println!("seed: {seed}");
    let provider = StaticTokenProvider::new(SIMULATION_TOKEN);
    let endpoint = config.sync.token_endpoint.as_str();

    let mut rng = test_rng_with_seed(seed);
    let mut room = SimulatedRoom::from_config(config, seed);
    for index in 0..peers {
        let peer = room.add_peer(&format!("peer-{index}"), 1_000_000);
        if !room.connect_with_token(peer, &provider, endpoint).await {
            bail!("peer-{index} could not join the relay");
        }
    }
    room.settle()?;

    for round in 0..rounds {
        if shutdown.is_shutting_down().await {
            warn!(round, "Interrupted, checking what has synced so far");
            break;
        }
        for index in 0..room.len() {
            if !rng.random_bool(0.7) {
                continue;
            }
            let skew = rng.random_range(0..50);
            let edit = random_edit_for(&mut rng, room.subjects(), entities);
            let peer = room.peer_mut(index);
            peer.wall.advance(skew);
            peer.engine.commit(edit)?;
        }

        // Now and then a peer drops out and comes back
        if peers > 1 && rng.random_bool(0.2) {
            let index = rng.random_range(0..peers);
            room.disconnect(index);
            room.settle()?;
            if !room.connect_with_token(index, &provider, endpoint).await {
                bail!("peer-{index} could not rejoin the relay");
            }
        }

        let handled = room.settle()?;
        debug!(round, handled, "Round settled");
    }

    let documents = room.documents();
    let reference = documents[0].snapshot();
    let diverged = documents.iter().filter(|doc| doc.snapshot() != reference).count();

    for peer in room.peers() {
        let stats = peer.engine.stats();
        println!(
            "{:<8} log={:<5} local={:<4} remote={:<5} superseded={:<4} sent={:<5} received={}",
            peer.engine.log().node_id(),
            peer.engine.log().len(),
            stats.local_operations,
            stats.remote_operations,
            stats.superseded_operations,
            stats.messages_sent,
            stats.messages_received,
        );
    }

    if diverged > 0 {
        bail!("{diverged} of {peers} documents diverged");
    }
    info!(peers, rounds, entities = reference.len(), "All documents converged");
    println!("converged: {} entities across {} peers", reference.len(), peers);
    Ok(())
}

fn hlc(config: &Config, action: HlcAction) -> Result<()> {
    match action {
        HlcAction::Tick { count } => {
            let mut clock: Hlc = config.clock()?;
            for _ in 0..count {
                println!("{}", clock.tick_serialized());
            }
        }
        HlcAction::Parse { timestamp } => {
            let parsed = HlcTimestamp::parse(&timestamp)?;
            println!("walltime: {}", parsed.walltime);
            println!("counter:  {}", parsed.counter);
            println!("node_id:  {}", parsed.node_id);
        }
    }
    Ok(())
}

fn config_command(config: &Config, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            print!("{}", toml::to_string_pretty(config)?);
        }
        ConfigAction::Check { path } => {
            let checked = Config::from_file(&path)?;
            checked.validate()?;
            println!("{}: ok", path.display());
        }
        ConfigAction::Init { path } => {
            if path.exists() {
                bail!("{} already exists", path.display());
            }
            Config::default().save_to_file(&path)?;
            println!("wrote {}", path.display());
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    init_logging_with_config(config.log_config())?;
    mapsync_core::metrics::init_metrics();

    info!("mapsync CLI started");

    match args.command {
        Some(Command::Simulate { peers, rounds, seed, entities }) => {
            let coordinator = Arc::new(ShutdownCoordinator::new(config.session.shutdown_grace));
            install_signal_handlers(coordinator.clone());
            let seed = seed.or(config.session.peer_selection_seed).unwrap_or_else(rand::random);
            simulate(&config, peers, rounds, seed, entities, &coordinator).await?;
        }
        Some(Command::Hlc { action }) => hlc(&config, action)?,
        Some(Command::Config { action }) => config_command(&config, action)?,
        None => {
            warn!("No command specified. Use --help for usage information.");
        }
    }

    info!("mapsync CLI finished");

    Ok(())
}
