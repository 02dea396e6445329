use anyhow::Context;
use clap::{Parser, ValueEnum};
use serde::Serialize;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver};
use std::thread;

use scrollterm::config::Settings;
use scrollterm::logging::init_tracing;
use scrollterm::{CloseConfig, CommandConfig, HistoryConfig, Session, Snapshot, TermSize};

/// Run a command in a pseudo-terminal and print everything that scrolled past.
#[derive(Parser, Debug)]
#[command(name = "scrollterm", version, about)]
struct Cli {
    /// Settings file (defaults to the user config directory)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// History buffer size in bytes
    #[arg(long, value_name = "BYTES")]
    history_size: Option<usize>,

    /// Buffer usage fraction (0.0 - 1.0) at which history is flushed to stdout
    #[arg(long, value_name = "FRACTION")]
    threshold: Option<f32>,

    /// Terminal rows
    #[arg(long)]
    rows: Option<u16>,

    /// Terminal columns
    #[arg(long)]
    cols: Option<u16>,

    /// Final output format
    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Command to run, with its arguments
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Serialize)]
struct SnapshotView {
    screen: Vec<String>,
    history: Vec<String>,
    missed: usize,
}

impl From<&Snapshot> for SnapshotView {
    fn from(snapshot: &Snapshot) -> Self {
        Self {
            screen: snapshot.screen.iter().map(|l| l.trim_end().to_string()).collect(),
            history: snapshot
                .history_lines()
                .iter()
                .map(|l| l.trim_end().to_string())
                .collect(),
            missed: snapshot.missed,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    }
    .context("loading settings")?;

    let size = TermSize::new(
        pick_dimension(cli.rows, settings.terminal.rows, TermSize::DEFAULT.rows),
        pick_dimension(cli.cols, settings.terminal.cols, TermSize::DEFAULT.cols),
    );

    let mut history = HistoryConfig::from(&settings.history);
    if let Some(bytes) = cli.history_size {
        history = history.with_size(bytes);
    }
    if let Some(threshold) = cli.threshold {
        history = history.with_threshold(threshold);
    }
    let mut printer = None;
    if cli.format == Format::Text {
        let (chunks, pending) = mpsc::channel();
        history = history.on_threshold_with_fetch(move |snapshot| {
            let _ = chunks.send(snapshot);
        });
        printer = Some(
            thread::Builder::new()
                .name("scrollterm-print".to_string())
                .spawn(move || print_chunks(pending))?,
        );
    }

    let session = Session::start(CommandConfig::new(cli.command.clone()).with_size(size), history)
        .with_context(|| format!("starting {:?}", cli.command))?;
    session.set_close_config(CloseConfig::from(&settings.close))?;

    let outcome = session.wait()?;
    if let Some(error) = &outcome.copy_error {
        tracing::warn!(%error, "Output may be incomplete");
    }

    let snapshot = session.fetch();
    session.close()?;
    // Releases the threshold callback, which ends the printer once every
    // queued chunk is out.
    drop(session);
    let chunk_missed = match printer {
        Some(printer) => printer
            .join()
            .map_err(|_| anyhow::anyhow!("history printer panicked"))??,
        None => 0,
    };

    let mut out = io::stdout().lock();
    match cli.format {
        Format::Text => {
            print_lines(&mut out, &snapshot.history_lines())?;
            print_lines(&mut out, &trim_blank_tail(&snapshot.screen))?;
            let total_missed = chunk_missed + snapshot.missed;
            if total_missed > 0 {
                tracing::info!(missed = total_missed, "Some history lines were dropped");
            }
        }
        Format::Json => {
            serde_json::to_writer_pretty(&mut out, &SnapshotView::from(&snapshot))?;
            writeln!(out)?;
        }
    }
    out.flush()?;
    drop(out);

    std::process::exit(outcome.exit_code as i32);
}

/// Flag, then settings file, then default. Zero counts as unset.
fn pick_dimension(flag: Option<u16>, configured: u16, default: u16) -> u16 {
    flag.filter(|&n| n > 0)
        .or(Some(configured).filter(|&n| n > 0))
        .unwrap_or(default)
}

/// Prints threshold chunks in arrival order; returns the lines they reported missed.
fn print_chunks(pending: Receiver<Snapshot>) -> io::Result<usize> {
    let mut missed = 0;
    for snapshot in pending {
        missed += snapshot.missed;
        let mut out = io::stdout().lock();
        print_lines(&mut out, &snapshot.history_lines())?;
        out.flush()?;
    }
    Ok(missed)
}

fn print_lines(out: &mut impl Write, lines: &[String]) -> io::Result<()> {
    for line in lines {
        writeln!(out, "{}", line.trim_end())?;
    }
    Ok(())
}

/// Drops the empty rows below the last written one.
fn trim_blank_tail(screen: &[String]) -> Vec<String> {
    let end = screen
        .iter()
        .rposition(|line| !line.trim().is_empty())
        .map_or(0, |last| last + 1);
    screen[..end].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_keeps_hyphenated_arguments() {
        let cli = Cli::try_parse_from(["scrollterm", "--rows", "10", "ls", "-la", "--color"]).unwrap();
        assert_eq!(cli.rows, Some(10));
        assert_eq!(cli.command, vec!["ls", "-la", "--color"]);
        assert_eq!(cli.format, Format::Text);
    }

    #[test]
    fn command_is_required() {
        assert!(Cli::try_parse_from(["scrollterm"]).is_err());
    }

    #[test]
    fn json_format_parses() {
        let cli = Cli::try_parse_from(["scrollterm", "--format", "json", "true"]).unwrap();
        assert_eq!(cli.format, Format::Json);
    }

    #[test]
    fn dimensions_fall_back_per_axis() {
        assert_eq!(pick_dimension(Some(5), 40, 24), 5);
        assert_eq!(pick_dimension(None, 40, 24), 40);
        assert_eq!(pick_dimension(Some(0), 0, 24), 24);
    }

    #[test]
    fn trim_blank_tail_keeps_interior_blanks() {
        let screen = vec![
            "a   ".to_string(),
            "    ".to_string(),
            "b".to_string(),
            "   ".to_string(),
        ];
        assert_eq!(trim_blank_tail(&screen), vec!["a   ", "    ", "b"]);
        assert!(trim_blank_tail(&["  ".to_string()]).is_empty());
    }

    #[test]
    fn snapshot_view_trims_rows() {
        let snapshot = Snapshot {
            screen: vec!["top   ".to_string()],
            history: b"old  \r\n".to_vec(),
            missed: 1,
        };
        let view = SnapshotView::from(&snapshot);
        assert_eq!(view.screen, vec!["top"]);
        assert_eq!(view.history, vec!["old"]);
        assert_eq!(view.missed, 1);
    }
}
