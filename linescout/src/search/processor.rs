//! Single-file search: read, sniff, iterate lines, render matches.
//!
//! Files up to 128 MiB are memory-mapped; anything larger goes through a
//! streaming buffered reader so the file never materializes in memory at
//! once. Files with a NUL byte in their first 8 KiB are presumed binary and
//! skipped silently.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use memmap2::Mmap;
use tracing::trace;

use crate::errors::SearchResult;
use crate::output::{FileBuffer, OutputMode, RenderOptions, Sink};
use crate::results::SearchStats;
use crate::search::matcher::PatternMatcher;
use crate::simd;

const MMAP_THRESHOLD: u64 = 128 * 1024 * 1024;
const STREAM_BUFFER_CAPACITY: usize = 64 * 1024;
const BINARY_SNIFF_WINDOW: usize = 8 * 1024;

/// Searches one file and emits its results through the sink.
pub(crate) fn process_file(
    path: &Path,
    matcher: &PatternMatcher,
    sink: &Sink,
    stats: &SearchStats,
    mode: OutputMode,
) -> SearchResult<()> {
    let file = File::open(path)?;
    let metadata = file.metadata()?;
    if !metadata.is_file() {
        trace!("skipping non-regular file {}", path.display());
        return Ok(());
    }
    if metadata.len() == 0 {
        stats.record_file(0);
        return Ok(());
    }

    if metadata.len() <= MMAP_THRESHOLD {
        let mmap = unsafe { Mmap::map(&file) }?;
        search_mapped(path, &mmap[..], matcher, sink, stats, mode)
    } else {
        search_streaming(path, file, matcher, sink, stats, mode)
    }
}

fn looks_binary(window: &[u8]) -> bool {
    simd::find_byte(&window[..window.len().min(BINARY_SNIFF_WINDOW)], 0).is_some()
}

fn search_mapped(
    path: &Path,
    content: &[u8],
    matcher: &PatternMatcher,
    sink: &Sink,
    stats: &SearchStats,
    mode: OutputMode,
) -> SearchResult<()> {
    if looks_binary(content) {
        trace!("skipping binary file {}", path.display());
        return Ok(());
    }

    let mut scan = FileScan::new(path, matcher, sink, mode);
    let mut pos = 0;
    while pos < content.len() {
        let end = simd::find_newline(&content[pos..]).map_or(content.len(), |i| pos + i);
        if !scan.visit_line(&content[pos..end]) {
            break;
        }
        pos = end + 1;
    }
    scan.finish(stats);
    Ok(())
}

fn search_streaming(
    path: &Path,
    file: File,
    matcher: &PatternMatcher,
    sink: &Sink,
    stats: &SearchStats,
    mode: OutputMode,
) -> SearchResult<()> {
    let mut reader = BufReader::with_capacity(STREAM_BUFFER_CAPACITY, file);
    if looks_binary(reader.fill_buf()?) {
        trace!("skipping binary file {}", path.display());
        return Ok(());
    }

    let mut scan = FileScan::new(path, matcher, sink, mode);
    let mut line = Vec::with_capacity(256);
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            break;
        }
        let content = match line.last().copied() {
            Some(b'\n') => &line[..line.len() - 1],
            _ => &line[..],
        };
        if !scan.visit_line(content) {
            break;
        }
    }
    scan.finish(stats);
    Ok(())
}

/// Per-file scanning state: the match counter, line counter, and the output
/// buffer that gets flushed in one piece at the end.
struct FileScan<'a> {
    path: &'a Path,
    matcher: &'a PatternMatcher,
    sink: &'a Sink,
    mode: OutputMode,
    opts: RenderOptions,
    buffer: FileBuffer,
    line_number: u64,
    count: u64,
}

impl<'a> FileScan<'a> {
    fn new(path: &'a Path, matcher: &'a PatternMatcher, sink: &'a Sink, mode: OutputMode) -> Self {
        FileScan {
            path,
            matcher,
            sink,
            mode,
            opts: sink.render_options(),
            buffer: FileBuffer::new(),
            line_number: 0,
            count: 0,
        }
    }

    /// Processes one line; returns false when the rest of the file can be
    /// skipped (files-with-matches mode stops at the first hit).
    fn visit_line(&mut self, line: &[u8]) -> bool {
        self.line_number += 1;
        let Some(span) = self.matcher.find_first(line) else {
            return true;
        };
        self.count += 1;
        match self.mode {
            OutputMode::FilesWithMatches => {
                self.sink.write_file_name(self.path);
                false
            }
            OutputMode::CountOnly => true,
            OutputMode::Standard => {
                self.buffer
                    .push_match(&self.opts, self.path, self.line_number, line, span);
                true
            }
        }
    }

    fn finish(self, stats: &SearchStats) {
        match self.mode {
            OutputMode::CountOnly if self.count > 0 => {
                self.sink.write_count(self.path, self.count)
            }
            OutputMode::Standard => self.sink.flush_file(&self.buffer),
            _ => {}
        }
        stats.record_file(self.count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn run(content: &[u8], pattern: &str, mode: OutputMode) -> (String, u64, u64) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("input.txt");
        std::fs::write(&path, content).unwrap();

        let matcher = PatternMatcher::new(pattern.as_bytes(), false, false).unwrap();
        let out = SharedBuf::default();
        let sink = Sink::new(Box::new(out.clone()), false, false);
        let stats = SearchStats::new();
        process_file(&path, &matcher, &sink, &stats, mode).unwrap();

        let summary = stats.snapshot();
        let text = out.text().replace(&path.display().to_string(), "FILE");
        (text, summary.total_matches, summary.files_searched)
    }

    #[test]
    fn test_standard_mode_renders_matching_lines() {
        let (text, matches, searched) = run(
            b"first needle\nnothing\nsecond needle here\n",
            "needle",
            OutputMode::Standard,
        );
        assert_eq!(text, "FILE:1:first needle\nFILE:3:second needle here\n");
        assert_eq!(matches, 2);
        assert_eq!(searched, 1);
    }

    #[test]
    fn test_no_trailing_newline() {
        let (text, matches, _) = run(b"needle at end", "needle", OutputMode::Standard);
        assert_eq!(text, "FILE:1:needle at end\n");
        assert_eq!(matches, 1);
    }

    #[test]
    fn test_count_mode() {
        let (text, matches, _) = run(
            b"needle\nneedle\nno\nneedle\n",
            "needle",
            OutputMode::CountOnly,
        );
        assert_eq!(text, "FILE:3\n");
        assert_eq!(matches, 3);
    }

    #[test]
    fn test_count_mode_silent_without_matches() {
        let (text, matches, _) = run(b"nothing here\n", "needle", OutputMode::CountOnly);
        assert_eq!(text, "");
        assert_eq!(matches, 0);
    }

    #[test]
    fn test_files_with_matches_stops_early() {
        let (text, matches, _) = run(
            b"needle\nneedle\nneedle\n",
            "needle",
            OutputMode::FilesWithMatches,
        );
        // One name, and only the first match is ever counted.
        assert_eq!(text, "FILE\n");
        assert_eq!(matches, 1);
    }

    #[test]
    fn test_binary_file_skipped() {
        let (text, matches, searched) = run(
            b"needle\x00binary data needle\n",
            "needle",
            OutputMode::Standard,
        );
        assert_eq!(text, "");
        assert_eq!(matches, 0);
        assert_eq!(searched, 0);
    }

    #[test]
    fn test_empty_file() {
        let (text, matches, searched) = run(b"", "needle", OutputMode::Standard);
        assert_eq!(text, "");
        assert_eq!(matches, 0);
        assert_eq!(searched, 1);
    }
}
