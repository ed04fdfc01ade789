/// Cadence daemon - playback engine driven by stdin commands
use anyhow::Context;
use cadence_core::{
    FileSnapshotStore, FileStore, Library, SnapshotStore, TrackId, TrackRepository,
};
use cadence_daemon::{Action, DaemonConfig, DaemonError, LineCommand};
use cadence_playback::{
    PlayCountLedger, PlaybackCommand, PlaybackHandle, PlaybackOrchestrator, PlaybackService,
    PlayerSnapshot, SimulatedBackend, SimulationMode,
};
use clap::{Parser, Subcommand};
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "cadence-daemon")]
#[command(about = "Cadence playback engine driven by stdin commands", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "CADENCE_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the engine, reading commands from stdin
    Run,
    /// Print the saved queue snapshot as JSON
    Snapshot,
    /// Print the play-count record of a track
    Plays {
        /// Track id
        id: TrackId,
    },
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing; logs go to stderr so stdout stays machine-readable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cadence_daemon=info,cadence_playback=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();

    let config = DaemonConfig::load(cli.config.as_deref())?;
    config.validate()?;

    match cli.command {
        Commands::Run => run(&config)?,
        Commands::Snapshot => print_snapshot(&config)?,
        Commands::Plays { id } => print_plays(&config, id)?,
    }

    Ok(())
}

fn run(config: &DaemonConfig) -> anyhow::Result<()> {
    tracing::info!("Starting Cadence daemon");
    tracing::info!("Data directory: {}", config.storage.data_dir.display());

    std::fs::create_dir_all(&config.storage.data_dir).with_context(|| {
        format!(
            "cannot create data directory {}",
            config.storage.data_dir.display()
        )
    })?;

    let library = Arc::new(Library::load_manifest(&config.storage.library_manifest)?);
    tracing::info!("Library loaded ({} tracks)", library.len());

    let mode = if config.simulation.realtime {
        SimulationMode::Realtime
    } else {
        SimulationMode::Manual
    };
    let (backend, sim) = SimulatedBackend::new(mode);
    sim.register_tracks(&library.tracks());

    let orchestrator = PlaybackOrchestrator::builder(backend, library.clone())
        .config(config.playback.clone())
        .ledger_store(FileStore::open(config.playcount_path())?)
        .snapshot_store(FileSnapshotStore::new(config.snapshot_path()))
        .build();

    let service = PlaybackService::spawn(orchestrator)?;
    let handle = service.handle();

    let _info = handle.subscribe_info(|message| println!("info: {message}"));
    let _errors = handle.subscribe_errors(|message| println!("error: {message}"));

    handle.send(PlaybackCommand::LoadState)?;
    print_status(&handle)?;

    for line in io::stdin().lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let action = line
            .parse::<LineCommand>()
            .and_then(|command| command.into_action(library.as_ref(), now_ms()));

        match action {
            Ok(Action::Send(command)) => handle.send(command)?,
            Ok(Action::PrintStatus) => print_status(&handle)?,
            Ok(Action::Quit) => break,
            Err(e @ (DaemonError::InvalidCommand(_) | DaemonError::Core(_))) => {
                println!("error: {e}");
            }
            Err(e) => return Err(e.into()),
        }
    }

    handle.send(PlaybackCommand::SaveState)?;
    // Replies only after the save has run
    print_status(&handle)?;
    service.shutdown();

    tracing::info!("Cadence daemon stopped");
    Ok(())
}

fn print_status(handle: &PlaybackHandle) -> anyhow::Result<()> {
    let status = handle.now_playing()?;
    println!("{}", serde_json::to_string(&status)?);
    Ok(())
}

fn print_snapshot(config: &DaemonConfig) -> anyhow::Result<()> {
    let store = FileSnapshotStore::new(config.snapshot_path());
    let snapshot = match store.load()? {
        Some(contents) => PlayerSnapshot::decode(&contents)?,
        None => PlayerSnapshot::default(),
    };
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

fn print_plays(config: &DaemonConfig, id: TrackId) -> anyhow::Result<()> {
    let ledger = PlayCountLedger::new(Box::new(FileStore::open(config.playcount_path())?));
    let record = ledger.record(id);
    println!("{}", serde_json::to_string(&record)?);

    // Title is a convenience; the record stands on its own
    if let Ok(library) = Library::load_manifest(&config.storage.library_manifest) {
        if let Ok(Some(track)) = library.get_track(id) {
            tracing::info!("Track {}: {} - {}", id, track.artist, track.title);
        }
    }
    Ok(())
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
