//! Typing Telemetry - re-analyse a recorded typing session
//!
//! Reads a session recording, drives it through a fresh engine and prints
//! the resulting report as JSON.

use anyhow::{Context, Result};
use clap::Parser;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use typing_telemetry::{EngineConfig, GhostTrack, PersonalHistory, Session, SessionRecording};

/// re-analyse a recorded typing session and print its report
#[derive(Parser, Debug)]
#[clap(version, about)]
struct Cli {
    /// recorded session (JSON)
    recording: PathBuf,

    /// ghost track (JSON) to race against
    #[clap(short = 'g', long)]
    ghost: Option<PathBuf>,

    /// personal history (JSON) to compare with
    #[clap(short = 'H', long)]
    history: Option<PathBuf>,

    /// fold this session into the history file afterwards
    #[clap(long, requires = "history")]
    update_history: bool,

    /// configuration file (default: user config directory)
    #[clap(short = 'c', long)]
    config: Option<PathBuf>,

    /// write the report to a file instead of stdout
    #[clap(short = 'o', long)]
    output: Option<PathBuf>,

    /// write a new ghost here when the session is a personal best
    #[clap(long)]
    save_ghost: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EngineConfig::load_from(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::load().unwrap_or_else(|e| {
            log::warn!("using default configuration: {}", e);
            EngineConfig::default()
        }),
    };

    let recording: SessionRecording = read_json(&cli.recording)?;
    let ghost = match &cli.ghost {
        Some(path) => Some(Arc::new(read_json::<GhostTrack>(path)?)),
        None => None,
    };
    let mut history = match &cli.history {
        Some(path) if path.exists() => Some(read_json::<PersonalHistory>(path)?),
        Some(_) => Some(PersonalHistory::new()),
        None => None,
    };

    let mut session = Session::replay_recording(&recording, config, ghost)
        .context("re-analysing recording")?;
    if let Some(h) = &history {
        session = session.with_history(h.clone());
    }

    let drifted = session
        .entries()
        .iter()
        .zip(&recording.entries)
        .filter(|(replayed, recorded)| replayed.snapshot != recorded.snapshot)
        .count();
    if drifted > 0 {
        log::warn!(
            "{} snapshot(s) differ from the recording; was it made with another configuration?",
            drifted
        );
    }

    let replayed = session.end_session();
    let report = session.report()?;

    match &cli.output {
        Some(path) => {
            report
                .export_json(path)
                .with_context(|| format!("writing report {}", path.display()))?;
            log::info!("report written to {}", path.display());
        }
        None => println!("{}", report.to_json()?),
    }

    if let Some(path) = &cli.save_ghost {
        if let Some(track) = replayed.promote_to_ghost() {
            write_json(path, &track)?;
            log::info!("new ghost written to {}", path.display());
        }
    }

    if cli.update_history {
        if let (Some(h), Some(path)) = (history.as_mut(), &cli.history) {
            h.record(&replayed);
            write_json(path, h)?;
        }
    }

    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("writing {}", path.display()))
}
