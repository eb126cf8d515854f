//! Match rendering and the shared output sink.
//!
//! Each file task renders its matches into a private [`FileBuffer`] with no
//! locking at all, then hands the finished buffer to the [`Sink`], which
//! holds the output mutex exactly once per file no matter how many matches
//! the file produced. Heading mode groups matches under the file path; flat
//! mode prefixes every line with it.

use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use tracing::error;

use crate::results::MatchSpan;

/// What the sink emits per match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Every matching line.
    Standard,
    /// Only the names of files that match.
    FilesWithMatches,
    /// Only `file:count` tallies.
    CountOnly,
}

/// Rendering switches resolved once at sink construction.
#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    pub color: bool,
    pub heading: bool,
}

// SGR palette: magenta paths, green line numbers, cyan separators, bold red
// match text.
const SGR_PATH: &[u8] = b"\x1b[35m";
const SGR_LINENO: &[u8] = b"\x1b[32m";
const SGR_SEP: &[u8] = b"\x1b[36m";
const SGR_MATCH: &[u8] = b"\x1b[1;31m";
const SGR_RESET: &[u8] = b"\x1b[0m";

/// Per-file accumulation buffer. Lives for the duration of one file task.
#[derive(Debug, Default)]
pub struct FileBuffer {
    buf: Vec<u8>,
    heading_written: bool,
    match_count: u64,
}

impl FileBuffer {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn match_count(&self) -> u64 {
        self.match_count
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Renders one matching line into the buffer.
    pub fn push_match(
        &mut self,
        opts: &RenderOptions,
        path: &Path,
        line_number: u64,
        line: &[u8],
        span: MatchSpan,
    ) {
        self.match_count += 1;
        if opts.heading {
            if !self.heading_written {
                self.heading_written = true;
                self.push_path(opts, path);
                self.buf.push(b'\n');
            }
        } else {
            self.push_path(opts, path);
            self.push_sep(opts);
        }
        self.push_line_number(opts, line_number);
        self.push_sep(opts);
        self.push_content(opts, line, span);
    }

    fn push_path(&mut self, opts: &RenderOptions, path: &Path) {
        if opts.color {
            self.buf.extend_from_slice(SGR_PATH);
        }
        self.buf
            .extend_from_slice(path.to_string_lossy().as_bytes());
        if opts.color {
            self.buf.extend_from_slice(SGR_RESET);
        }
    }

    fn push_line_number(&mut self, opts: &RenderOptions, line_number: u64) {
        if opts.color {
            self.buf.extend_from_slice(SGR_LINENO);
        }
        self.buf
            .extend_from_slice(line_number.to_string().as_bytes());
        if opts.color {
            self.buf.extend_from_slice(SGR_RESET);
        }
    }

    fn push_sep(&mut self, opts: &RenderOptions) {
        if opts.color {
            self.buf.extend_from_slice(SGR_SEP);
            self.buf.push(b':');
            self.buf.extend_from_slice(SGR_RESET);
        } else {
            self.buf.push(b':');
        }
    }

    fn push_content(&mut self, opts: &RenderOptions, line: &[u8], span: MatchSpan) {
        if opts.color && !span.is_empty() && span.end <= line.len() {
            self.buf.extend_from_slice(&line[..span.start]);
            self.buf.extend_from_slice(SGR_MATCH);
            self.buf.extend_from_slice(&line[span.start..span.end]);
            self.buf.extend_from_slice(SGR_RESET);
            self.buf.extend_from_slice(&line[span.end..]);
        } else {
            self.buf.extend_from_slice(line);
        }
        self.buf.push(b'\n');
    }
}

struct SinkState {
    writer: Box<dyn Write + Send>,
    wrote_any_file: bool,
    failed: bool,
}

/// The single shared consumer of rendered output.
///
/// All writes happen under one mutex; a write failure latches the sink into
/// a failed state that the caller turns into a fatal exit.
pub struct Sink {
    state: Mutex<SinkState>,
    opts: RenderOptions,
}

impl Sink {
    pub fn new(writer: Box<dyn Write + Send>, color: bool, heading: bool) -> Self {
        Sink {
            state: Mutex::new(SinkState {
                writer,
                wrote_any_file: false,
                failed: false,
            }),
            opts: RenderOptions { color, heading },
        }
    }

    pub fn render_options(&self) -> RenderOptions {
        self.opts
    }

    /// True once any write has failed.
    pub fn failed(&self) -> bool {
        self.state.lock().map(|s| s.failed).unwrap_or(true)
    }

    /// Writes one file's accumulated matches under a single lock.
    pub fn flush_file(&self, buffer: &FileBuffer) {
        if buffer.is_empty() {
            return;
        }
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        if state.failed {
            return;
        }
        // In heading mode a blank line separates consecutive files.
        if self.opts.heading && state.wrote_any_file {
            if let Err(e) = state.writer.write_all(b"\n") {
                Self::record_failure(&mut state, e);
                return;
            }
        }
        if let Err(e) = state.writer.write_all(&buffer.buf) {
            Self::record_failure(&mut state, e);
            return;
        }
        state.wrote_any_file = true;
    }

    /// Emits a bare file name (files-with-matches mode).
    pub fn write_file_name(&self, path: &Path) {
        let mut line = Vec::new();
        if self.opts.color {
            line.extend_from_slice(SGR_PATH);
        }
        line.extend_from_slice(path.to_string_lossy().as_bytes());
        if self.opts.color {
            line.extend_from_slice(SGR_RESET);
        }
        line.push(b'\n');
        self.write_raw(&line);
    }

    /// Emits one `file:count` line (count-only mode).
    pub fn write_count(&self, path: &Path, count: u64) {
        let mut line = Vec::new();
        if self.opts.color {
            line.extend_from_slice(SGR_PATH);
        }
        line.extend_from_slice(path.to_string_lossy().as_bytes());
        if self.opts.color {
            line.extend_from_slice(SGR_RESET);
            line.extend_from_slice(SGR_SEP);
            line.push(b':');
            line.extend_from_slice(SGR_RESET);
        } else {
            line.push(b':');
        }
        line.extend_from_slice(count.to_string().as_bytes());
        line.push(b'\n');
        self.write_raw(&line);
    }

    /// Flushes the underlying writer; call once after the search finishes.
    pub fn flush(&self) {
        if let Ok(mut state) = self.state.lock() {
            if !state.failed {
                if let Err(e) = state.writer.flush() {
                    Self::record_failure(&mut state, e);
                }
            }
        }
    }

    fn write_raw(&self, bytes: &[u8]) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        if state.failed {
            return;
        }
        if let Err(e) = state.writer.write_all(bytes) {
            Self::record_failure(&mut state, e);
            return;
        }
        state.wrote_any_file = true;
    }

    fn record_failure(state: &mut SinkState, err: std::io::Error) {
        error!("write to output failed: {err}");
        state.failed = true;
    }
}
