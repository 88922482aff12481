mod journal;
mod vault;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use journal_audio_core::platform::{DirectoryValueStore, MemoryKeyStore};
use journal_audio_core::{JournalAudioConfig, JournalAudioServices};

/// Walk through secure audio journaling: record, seal, play back, export.
#[derive(Parser)]
#[command(name = "journal-audio", version)]
struct Cli {
    /// Working directory for recordings, transient files and stored values.
    ///
    /// Keys are held in memory for one run only. Anything an earlier run left
    /// here cannot be opened again, so commands clean up what they store.
    #[arg(long, env = "JOURNAL_AUDIO_ROOT")]
    root: Option<PathBuf>,

    /// JSON configuration file. Directories in it override `--root`.
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Record a tone, seal it, then play it back through a transient file.
    Journal {
        #[arg(long, default_value = "demo-entry")]
        journal_id: String,

        /// Seconds of audio to capture.
        #[arg(long, default_value_t = 2)]
        seconds: u64,

        /// Pause this many milliseconds into the capture, for the same length.
        #[arg(long)]
        pause_ms: Option<u64>,

        /// Keep the sealed file for inspection. Its key still ends with this run.
        #[arg(long)]
        keep: bool,
    },
    /// Store a secret value, export it under a password and import it again.
    Vault {
        #[arg(long, default_value = "demo.token")]
        key: String,

        #[arg(long)]
        value: String,

        #[arg(long, env = "JOURNAL_AUDIO_EXPORT_PASSWORD")]
        password: String,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), String> {
    let root = cli
        .root
        .unwrap_or_else(|| std::env::temp_dir().join("journal-audio-demo"));
    let config = match &cli.config {
        Some(path) => JournalAudioConfig::from_json_file(path).map_err(|e| e.to_string())?,
        None => JournalAudioConfig::rooted_at(&root),
    };

    let values = DirectoryValueStore::open(root.join("values")).map_err(|e| e.to_string())?;
    let services = JournalAudioServices::new(config, Arc::new(MemoryKeyStore::new()), Arc::new(values))
        .map_err(|e| e.to_string())?;

    match cli.command {
        Command::Journal {
            journal_id,
            seconds,
            pause_ms,
            keep,
        } => journal::run(&services, &journal_id, seconds, pause_ms, keep),
        Command::Vault { key, value, password } => vault::run(&services, &key, &value, &password),
    }
}
