//! seqkit CLI: inspect and re-export pattern MIDI files.
//!
//! Usage:
//!   seqkit inspect song.mid
//!   seqkit export song.mid -o flat.mid --song
//!
//! Set `RUST_LOG=debug` to see dropped events and skipped tracks.

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use sk_master::{ExportMode, ExportOptions, ImportOptions, Session, SessionError};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "seqkit", about = "Pattern sequencer MIDI file tool")]
struct Cli {
    /// Link notes that wrap around the end of a pattern
    #[arg(long, global = true)]
    link_wrap: bool,
    /// Drop data bytes that have no running status instead of recovering
    #[arg(long, global = true)]
    strict_running_status: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the patterns of a file
    Inspect { input: PathBuf },
    /// Read a file and write it back out
    Export {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Flatten each pattern through its triggers
        #[arg(long)]
        song: bool,
        /// Leave out sequencer metadata
        #[arg(long)]
        no_seqspec: bool,
        /// Write triggers without transposition
        #[arg(long)]
        legacy_triggers: bool,
        /// Key, scale and background are song-wide
        #[arg(long)]
        global_key_scale: bool,
        /// File division; defaults to the input's
        #[arg(long)]
        ppqn: Option<u16>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let import = ImportOptions {
        link_wrap: cli.link_wrap,
        recover_running_status: !cli.strict_running_status,
    };

    let result = match cli.command {
        Commands::Inspect { input } => load(&input, &import).map(|session| inspect(&session)),
        Commands::Export {
            input,
            output,
            song,
            no_seqspec,
            legacy_triggers,
            global_key_scale,
            ppqn,
        } => load(&input, &import).and_then(|session| {
            let mut options = ExportOptions {
                mode: if song { ExportMode::Song } else { ExportMode::Regular },
                ..ExportOptions::default()
            };
            options.writer.seqspec = !no_seqspec;
            options.writer.legacy_triggers = legacy_triggers;
            options.writer.global_key_scale = global_key_scale;
            if let Some(ppqn) = ppqn.or_else(|| session.get(0).map(|s| s.snapshot().info.ppqn)) {
                options.ppqn = ppqn;
            }
            export(&session, &options, &output)
        }),
    };

    if let Err(msg) = result {
        eprintln!("{msg}");
        process::exit(1);
    }
}

fn load(path: &Path, options: &ImportOptions) -> Result<Session, String> {
    let data = fs::read(path).map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    let mut session = Session::new();
    let report = session
        .import(&data, options)
        .map_err(|e| format!("Failed to parse {}: {}", path.display(), e))?;
    for (i, track) in report.tracks.iter().enumerate() {
        if track.truncated || track.dropped > 0 {
            eprintln!("Track {i}: {} events dropped, truncated: {}", track.dropped, track.truncated);
        }
    }
    Ok(session)
}

fn inspect(session: &Session) {
    println!("Patterns: {}", session.len());
    println!();
    for (i, shared) in session.iter().enumerate() {
        let seq = shared.snapshot();
        let info = &seq.info;
        let channel = info.channel.map_or_else(|| "free".to_string(), |c| (c + 1).to_string());
        println!("{:3} {:<24} ch {:>4}  {}/{}  len {:>6}", i, info.name, channel, info.beats_per_bar, info.beat_width, seq.length());
        println!(
            "    events {:>5}  notes {:>4}  triggers {:>3}{}",
            seq.events.len(),
            seq.events.note_count(),
            seq.triggers.len(),
            if seq.triggers.any_transposed() { " (transposed)" } else { "" }
        );
    }
}

fn export(session: &Session, options: &ExportOptions, output: &Path) -> Result<(), String> {
    let (bytes, report) = session.export(options).map_err(|e| match e {
        SessionError::NothingToExport(report) => {
            format!("Nothing to export: all {} tracks were skipped", report.failures.len())
        }
        other => format!("Export failed: {other}"),
    })?;
    for failure in &report.failures {
        eprintln!("Skipped track {} ({}): {}", failure.index, failure.name, failure.error);
    }
    fs::write(output, &bytes).map_err(|e| format!("Failed to write {}: {}", output.display(), e))?;
    println!("Wrote {} tracks, {} bytes to {}", report.exported.len(), bytes.len(), output.display());
    Ok(())
}
