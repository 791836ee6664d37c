use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::error::Result;

/// Shared state for a group of readers and writers.
///
/// A context holds two things:
///
/// * a queue of human readable diagnostics, pushed whenever a reader gives
///   up on a quoting convention or an operation fails, and
/// * a registry of pending temporary files that writers have created but
///   not yet committed.
///
/// Contexts are cheap to clone; clones share the same state. Readers and
/// writers built without an explicit context each get their own.
///
/// Every live context is known to the process wide signal handler
/// installed by [`Context::cleanup_on_signals`].
///
/// # Example
///
/// ```
/// use stdcsv::{Context, ReaderBuilder, Record};
///
/// let ctx = Context::new();
/// let mut rdr = ReaderBuilder::new().context(ctx.clone()).build();
/// let mut rec = Record::new();
/// assert!(rdr.parse(b"\"open", &mut rec).is_err());
/// assert_eq!(ctx.drain_diagnostics(), vec![
///     "Line 1: RFC4180 Qualifier issue.".to_string(),
/// ]);
/// ```
#[derive(Clone)]
pub struct Context {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    diagnostics: Mutex<VecDeque<String>>,
    pending: Mutex<HashMap<u64, PathBuf>>,
    next_id: AtomicU64,
}

/// Every context created in this process. Dead entries are pruned whenever
/// a new context is added.
static LIVE: Mutex<Vec<Weak<Inner>>> = Mutex::new(Vec::new());

/// Set once the signal thread is running.
static SIGNAL_THREAD: Mutex<bool> = Mutex::new(false);

impl Default for Context {
    fn default() -> Context {
        let inner = Arc::new(Inner::default());
        let mut live = lock(&LIVE);
        live.retain(|w| w.strong_count() > 0);
        live.push(Arc::downgrade(&inner));
        Context { inner }
    }
}

impl Context {
    /// Create a new context with no diagnostics and no pending files.
    pub fn new() -> Context {
        Context::default()
    }

    /// Add a message to the end of the diagnostic queue.
    pub fn push_diagnostic<S: Into<String>>(&self, msg: S) {
        lock(&self.inner.diagnostics).push_back(msg.into());
    }

    /// A copy of every queued diagnostic, oldest first.
    pub fn diagnostics(&self) -> Vec<String> {
        lock(&self.inner.diagnostics).iter().cloned().collect()
    }

    /// Remove and return every queued diagnostic, oldest first.
    pub fn drain_diagnostics(&self) -> Vec<String> {
        lock(&self.inner.diagnostics).drain(..).collect()
    }

    /// Drain the diagnostic queue to stderr, one message per line.
    pub fn print_diagnostics(&self) {
        for msg in self.drain_diagnostics() {
            eprintln!("{}", msg);
        }
    }

    /// The paths of all temporary files not yet committed.
    pub fn pending(&self) -> Vec<PathBuf> {
        lock(&self.inner.pending).values().cloned().collect()
    }

    /// Delete every pending temporary file.
    ///
    /// Returns the number of files removed. Files that are already gone
    /// are not counted.
    pub fn remove_pending(&self) -> usize {
        let paths: Vec<PathBuf> =
            lock(&self.inner.pending).drain().map(|(_, p)| p).collect();
        let mut removed = 0;
        for path in paths {
            match fs::remove_file(&path) {
                Ok(()) => {
                    log::debug!("removed pending file {}", path.display());
                    removed += 1;
                }
                Err(err) => {
                    log::debug!(
                        "could not remove {}: {}",
                        path.display(),
                        err
                    );
                }
            }
        }
        removed
    }

    /// Remove pending temporary files when the process is interrupted.
    ///
    /// This installs a single handler for the whole process, on a thread
    /// that waits for SIGINT, SIGTERM, SIGHUP or SIGQUIT. When one arrives,
    /// the pending files of every live context are deleted, including the
    /// private contexts of readers and writers built without one, and then
    /// the process exits with status 1. Calling this again, on any context,
    /// has no further effect.
    ///
    /// On platforms without Unix signals this does nothing.
    pub fn cleanup_on_signals(&self) -> Result<()> {
        let mut installed = lock(&SIGNAL_THREAD);
        if !*installed {
            spawn_signal_thread()?;
            *installed = true;
        }
        Ok(())
    }

    /// Track a temporary file until the returned guard is dropped.
    pub(crate) fn register(&self, path: &Path) -> Registration {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.inner.pending).insert(id, path.to_path_buf());
        Registration { ctx: self.clone(), id }
    }
}

/// Delete the pending files of every live context, returning how many were
/// removed.
#[cfg(unix)]
fn remove_all_pending() -> usize {
    let live: Vec<Arc<Inner>> =
        lock(&LIVE).iter().filter_map(Weak::upgrade).collect();
    live.into_iter().map(|inner| Context { inner }.remove_pending()).sum()
}

#[cfg(unix)]
fn spawn_signal_thread() -> Result<()> {
    use signal_hook::consts::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
    use signal_hook::iterator::Signals;

    use crate::error::IoResultExt;

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP, SIGQUIT])
        .context("install signal handlers")?;
    std::thread::Builder::new()
        .name("stdcsv-signals".to_string())
        .spawn(move || {
            if let Some(sig) = signals.forever().next() {
                let n = remove_all_pending();
                log::warn!(
                    "caught signal {}, removed {} pending file(s)",
                    sig,
                    n
                );
                std::process::exit(1);
            }
        })
        .context("spawn signal thread")?;
    Ok(())
}

#[cfg(not(unix))]
fn spawn_signal_thread() -> Result<()> {
    Ok(())
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("diagnostics", &lock(&self.inner.diagnostics).len())
            .field("pending", &lock(&self.inner.pending).len())
            .finish()
    }
}

/// A pending file's entry in a context. Dropping it forgets the file
/// without touching it on disk.
pub(crate) struct Registration {
    ctx: Context,
    id: u64,
}

impl Drop for Registration {
    fn drop(&mut self) {
        lock(&self.ctx.inner.pending).remove(&self.id);
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration").field("id", &self.id).finish()
    }
}

/// Lock a mutex, ignoring poisoning. Every critical section here leaves the
/// data consistent even if it panics.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
