//! The work-stealing parallel walker.
//!
//! Every worker thread owns one Chase–Lev deque. Directory tasks expand into
//! child tasks pushed onto the discovering worker's own deque (depth-first,
//! LIFO); idle workers steal from victims in randomized order. A global
//! in-flight counter, incremented per enqueue and decremented per completed
//! task, drives termination: when a worker finds every deque empty and the
//! counter at zero, no task exists or can ever appear again.
//!
//! With a single thread the identical loop runs inline on the caller,
//! which makes output ordering deterministic.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use tracing::{debug, info, trace, warn};

use crate::config::SearchConfig;
use crate::deque::{Steal, Stealer, Worker};
use crate::errors::{SearchError, SearchResult};
use crate::filters::{is_always_ignored, is_hidden, GlobFilter};
use crate::ignore::{IgnoreFile, IgnoreMatcher};
use crate::output::{OutputMode, Sink};
use crate::results::{SearchStats, SearchSummary};
use crate::search::matcher::PatternMatcher;
use crate::search::processor;

/// A unit of walker work.
enum Task {
    /// Search this file.
    File(PathBuf),
    /// Enumerate this directory, carrying the ignore chain accumulated on
    /// the way down.
    Dir {
        path: PathBuf,
        depth: usize,
        ignores: IgnoreMatcher,
    },
}

struct WalkContext<'a> {
    config: &'a SearchConfig,
    matcher: &'a PatternMatcher,
    glob_filter: &'a GlobFilter,
    sink: &'a Sink,
    stats: &'a SearchStats,
    in_flight: &'a AtomicUsize,
    mode: OutputMode,
}

/// Runs a full search: compiles the pattern, walks the roots with the
/// configured number of workers, and streams results into `sink`.
pub fn search(config: &SearchConfig, sink: &Sink) -> SearchResult<SearchSummary> {
    let matcher = PatternMatcher::new(
        config.pattern.as_bytes(),
        config.ignore_case,
        config.word_boundary,
    )?;
    let glob_filter = GlobFilter::new(&config.globs);
    let stats = SearchStats::new();
    let in_flight = AtomicUsize::new(0);
    let mode = if config.count_only {
        OutputMode::CountOnly
    } else if config.files_with_matches {
        OutputMode::FilesWithMatches
    } else {
        OutputMode::Standard
    };

    info!(pattern = %config.pattern, threads = config.thread_count.get(), "starting search");

    let thread_count = config.thread_count.get();
    let workers: Vec<Worker<Task>> = (0..thread_count).map(|_| Worker::new()).collect();
    let stealers: Vec<Stealer<Task>> = workers.iter().map(Worker::stealer).collect();

    for root in config.roots() {
        let task = match fs::metadata(&root) {
            Ok(md) if md.is_dir() => Task::Dir {
                path: root,
                depth: 0,
                ignores: IgnoreMatcher::empty(),
            },
            Ok(md) if md.is_file() => Task::File(root),
            Ok(_) => {
                warn!("skipping non-regular path {}", root.display());
                continue;
            }
            Err(e) => {
                warn!("cannot access {}: {e}", root.display());
                continue;
            }
        };
        in_flight.fetch_add(1, Ordering::SeqCst);
        workers[0].push(task);
    }

    let ctx = WalkContext {
        config,
        matcher: &matcher,
        glob_filter: &glob_filter,
        sink,
        stats: &stats,
        in_flight: &in_flight,
        mode,
    };

    if thread_count == 1 {
        for worker in workers {
            worker_loop(0, &worker, &stealers, &ctx);
        }
    } else {
        thread::scope(|s| {
            let ctx = &ctx;
            let stealers = &stealers;
            for (index, worker) in workers.into_iter().enumerate() {
                s.spawn(move || worker_loop(index, &worker, stealers, ctx));
            }
        });
    }

    sink.flush();
    let summary = stats.snapshot();
    info!(
        matches = summary.total_matches,
        files = summary.files_searched,
        "search complete"
    );

    if sink.failed() {
        return Err(SearchError::Io(io::Error::new(
            io::ErrorKind::BrokenPipe,
            "failed to write search results",
        )));
    }
    Ok(summary)
}

fn worker_loop(index: usize, worker: &Worker<Task>, stealers: &[Stealer<Task>], ctx: &WalkContext) {
    let mut rng = XorShift::new(index as u64);
    loop {
        if let Some(task) = worker.pop() {
            run_task(task, worker, ctx);
            ctx.in_flight.fetch_sub(1, Ordering::SeqCst);
            continue;
        }
        if let Some(task) = steal_task(index, stealers, &mut rng) {
            run_task(task, worker, ctx);
            ctx.in_flight.fetch_sub(1, Ordering::SeqCst);
            continue;
        }
        if ctx.in_flight.load(Ordering::SeqCst) == 0 {
            break;
        }
        thread::yield_now();
    }
}

/// Tries every other worker's deque once, starting at a random victim.
fn steal_task(index: usize, stealers: &[Stealer<Task>], rng: &mut XorShift) -> Option<Task> {
    let n = stealers.len();
    if n <= 1 {
        return None;
    }
    let offset = rng.next_below(n);
    for k in 0..n {
        let victim = (offset + k) % n;
        if victim == index {
            continue;
        }
        loop {
            match stealers[victim].steal() {
                Steal::Success(task) => return Some(task),
                Steal::Retry => continue,
                Steal::Empty => break,
            }
        }
    }
    None
}

fn run_task(task: Task, worker: &Worker<Task>, ctx: &WalkContext) {
    match task {
        Task::File(path) => {
            if let Err(e) =
                processor::process_file(&path, ctx.matcher, ctx.sink, ctx.stats, ctx.mode)
            {
                warn!("skipping {}: {e}", path.display());
            }
        }
        Task::Dir {
            path,
            depth,
            ignores,
        } => walk_dir(&path, depth, ignores, worker, ctx),
    }
}

fn walk_dir(
    dir: &Path,
    depth: usize,
    ignores: IgnoreMatcher,
    worker: &Worker<Task>,
    ctx: &WalkContext,
) {
    // A .gitignore in this directory governs everything at and below it.
    let ignores = if ctx.config.no_ignore {
        ignores
    } else {
        match fs::read(dir.join(".gitignore")) {
            Ok(content) => {
                trace!("loaded .gitignore from {}", dir.display());
                let file = IgnoreFile::parse(ignore_root(dir), &content);
                if file.is_empty() {
                    ignores
                } else {
                    ignores.extended(file)
                }
            }
            Err(_) => ignores,
        }
    };

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("cannot read directory {}: {e}", dir.display());
            return;
        }
    };

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!("bad entry in {}: {e}", dir.display());
                continue;
            }
        };
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !ctx.config.hidden && is_hidden(&name) {
            continue;
        }
        let file_type = match entry.file_type() {
            Ok(ft) => ft,
            Err(e) => {
                debug!("cannot stat {}: {e}", entry.path().display());
                continue;
            }
        };
        let child = join_path(dir, &name);

        if file_type.is_dir() {
            if is_always_ignored(&name) {
                continue;
            }
            if !ctx.config.no_ignore && ignores.is_ignored(&child, true) {
                continue;
            }
            if let Some(max) = ctx.config.max_depth {
                if depth + 1 > max {
                    continue;
                }
            }
            enqueue(
                worker,
                ctx,
                Task::Dir {
                    path: child,
                    depth: depth + 1,
                    ignores: ignores.clone(),
                },
            );
        } else if file_type.is_file() {
            if !ctx.glob_filter.is_empty() && !ctx.glob_filter.matches(&child) {
                continue;
            }
            if !ctx.config.no_ignore && ignores.is_ignored(&child, false) {
                continue;
            }
            enqueue(worker, ctx, Task::File(child));
        } else {
            trace!("skipping non-regular entry {}", child.display());
        }
    }
}

fn enqueue(worker: &Worker<Task>, ctx: &WalkContext, task: Task) {
    ctx.in_flight.fetch_add(1, Ordering::SeqCst);
    worker.push(task);
}

/// The scope directory recorded on an ignore file; `.` becomes the empty
/// path so that relative child paths strip cleanly.
fn ignore_root(dir: &Path) -> PathBuf {
    if dir.as_os_str() == "." {
        PathBuf::new()
    } else {
        dir.to_path_buf()
    }
}

/// Joins without manufacturing `./`-prefixed paths out of the default root.
fn join_path(dir: &Path, name: &str) -> PathBuf {
    if dir.as_os_str() == "." {
        PathBuf::from(name)
    } else {
        dir.join(name)
    }
}

/// A small xorshift generator for the steal order; one per worker, no
/// coordination.
struct XorShift(u64);

impl XorShift {
    fn new(seed: u64) -> Self {
        XorShift(seed.wrapping_mul(0x9E3779B97F4A7C15) | 1)
    }

    fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    fn next_below(&mut self, bound: usize) -> usize {
        (self.next() % bound as u64) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::num::NonZeroUsize;
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

    #[test]
    fn test_search_tempdir_tree() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "has needle\nplain\n").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/b.txt"), "another needle\n").unwrap();

        let config = SearchConfig {
            pattern: "needle".to_string(),
            paths: vec![dir.path().to_path_buf()],
            thread_count: NonZeroUsize::new(2).unwrap(),
            ..Default::default()
        };

        let out = SharedBuf::default();
        let sink = Sink::new(Box::new(out.clone()), false, false);
        let summary = search(&config, &sink).unwrap();

        assert_eq!(summary.total_matches, 2);
        assert_eq!(summary.files_with_matches, 2);
        let mut lines: Vec<String> = out.text().lines().map(String::from).collect();
        lines.sort();
        assert!(lines[0].ends_with("a.txt:1:has needle"));
        assert!(lines[1].ends_with("b.txt:1:another needle"));
    }

    #[test]
    fn test_invalid_pattern_fails_before_walking() {
        let config = SearchConfig {
            pattern: "(broken".to_string(),
            ..Default::default()
        };
        let sink = Sink::new(Box::new(SharedBuf::default()), false, false);
        assert!(matches!(
            search(&config, &sink),
            Err(SearchError::Pattern(_))
        ));
    }
}
