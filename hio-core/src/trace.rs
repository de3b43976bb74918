//! Per-rank I/O event tracer (`spec.md` §4.J/§6.6): an append-only text log
//! of timed operations, one file per rank under `<base>/trace/trace.<rank>`.
//! Unsynchronized and best-effort — a trace write never surfaces an error
//! to the caller beyond the initial `open` (`spec.md` §4.J).
//!
//! This is distinct from the `tracing`-crate diagnostics used elsewhere in
//! the crate (mode downgrades, clamp warnings): that is operator-facing
//! logging, this is the dataset's own on-disk event record, read back by
//! nothing in this crate but kept for post-hoc performance analysis, as in
//! the source system.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// `<identifier>::<id>:<event>:<v1>:<v2>:<start_us>:<stop_us>:<duration_us>`
pub struct Tracer {
    file: Option<File>,
}

impl Tracer {
    /// Opens (creating parents via the caller's directory bootstrap)
    /// `<base>/trace/trace.<rank>`. A failure to open is swallowed: tracing
    /// is strictly best-effort, never a reason to fail dataset open.
    pub fn open(base: &Path, rank: u64) -> Self {
        let path = crate::path::trace_file(base, rank);
        let file = OpenOptions::new().create(true).append(true).open(&path);
        match file {
            Ok(f) => Tracer { file: Some(f) },
            Err(e) => {
                tracing::warn!(path = ?path, error = %e, "could not open trace file, tracing disabled");
                Tracer { file: None }
            }
        }
    }

    pub fn disabled() -> Self {
        Tracer { file: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.file.is_some()
    }

    /// Records one timed event. `start`/`stop` are microseconds since the
    /// Unix epoch; best-effort — write errors are logged, never returned.
    pub fn record(&mut self, identifier: &str, id: u64, event: &str, v1: i64, v2: i64, start_us: u64, stop_us: u64) {
        let Some(file) = self.file.as_mut() else { return };
        let duration_us = stop_us.saturating_sub(start_us);
        let line = format!(
            "{identifier}::{id}:{event}:{v1}:{v2}:{start_us}:{stop_us}:{duration_us}\n"
        );
        if let Err(e) = file.write_all(line.as_bytes()) {
            tracing::warn!(error = %e, "trace write failed");
        }
    }

    /// Convenience wrapper: times `f`, then records the event with the
    /// elapsed microseconds as both `stop_us` and `duration_us`'s inputs.
    pub fn timed<T>(&mut self, identifier: &str, id: u64, event: &str, v1: i64, v2: i64, f: impl FnOnce() -> T) -> T {
        let start = now_us();
        let out = f();
        let stop = now_us();
        self.record(identifier, id, event, v1, v2, start, stop);
        out
    }
}

pub(crate) fn now_us() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_micros() as u64
}
