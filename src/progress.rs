//! Build progress reporting.
//!
//! Long stages (conversion, loading, hot marking) emit [`ProgressEvent`]s to
//! a [`ProgressReporter`]. Progress goes to **stderr** so the stage
//! summaries on stdout stay parseable. This is an operational signal only;
//! nothing downstream depends on it.

use std::io::Write;

/// A single progress event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Script conversion: file `n` of `total` finished.
    Converting { file: String, n: u64, total: u64 },
    /// Loader: `n` of `total` files of a group read and normalized.
    Reading { group: String, n: u64, total: u64 },
    /// Loader: `n` rows of a group inserted so far.
    Inserting { group: String, n: u64 },
    /// Hot marker: `n` poems flagged so far.
    Marking { n: u64 },
}

/// Receives progress events. Implementations write to stderr (human or JSON).
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Human-friendly progress on stderr: "load 唐诗  inserted  15,000 rows".
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: ProgressEvent) {
        let line = match &event {
            ProgressEvent::Converting { file, n, total } => format!(
                "convert  {} / {}  {}\n",
                format_number(*n),
                format_number(*total),
                file
            ),
            ProgressEvent::Reading { group, n, total } => format!(
                "load {}  read  {} / {} files\n",
                group,
                format_number(*n),
                format_number(*total)
            ),
            ProgressEvent::Inserting { group, n } => {
                format!("load {}  inserted  {} rows\n", group, format_number(*n))
            }
            ProgressEvent::Marking { n } => format!("mark-hot  {} marked\n", format_number(*n)),
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ProgressEvent) {
        let obj = match &event {
            ProgressEvent::Converting { file, n, total } => serde_json::json!({
                "event": "progress",
                "stage": "convert",
                "file": file,
                "n": n,
                "total": total
            }),
            ProgressEvent::Reading { group, n, total } => serde_json::json!({
                "event": "progress",
                "stage": "read",
                "group": group,
                "n": n,
                "total": total
            }),
            ProgressEvent::Inserting { group, n } => serde_json::json!({
                "event": "progress",
                "stage": "insert",
                "group": group,
                "n": n
            }),
            ProgressEvent::Marking { n } => serde_json::json!({
                "event": "progress",
                "stage": "mark-hot",
                "n": n
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
