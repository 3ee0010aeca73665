//! Worker fan-out shared by the classification and generation passes.
//!
//! Both passes run one synchronous, CPU-bound worker per file on a scoped
//! rayon pool and join before anything is merged. Worker failures (errors
//! or panics) are caught at the worker boundary and attributed to the file;
//! after the join a single failure is surfaced as-is and several are
//! surfaced together.

use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::cell::{Cell, RefCell};
use std::error::Error;
use std::fmt;
use std::panic::{self, catch_unwind, AssertUnwindSafe, PanicHookInfo};
use std::sync::{Arc, Once};

use rayon::prelude::*;

/// Error type workers hand back across the fan-out boundary.
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Thread pool settings for a fan-out.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParallelConfig {
    /// Run workers on a thread pool; `false` runs them on the caller's thread.
    pub parallel: bool,
    /// Worker threads (0 = rayon default).
    pub num_threads: usize,
    /// Stack size per worker thread in bytes.
    pub stack_size: usize,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        ParallelConfig {
            parallel: true,
            num_threads: 0,
            stack_size: 8 * 1024 * 1024,
        }
    }
}

impl ParallelConfig {
    pub fn sequential() -> Self {
        ParallelConfig {
            parallel: false,
            ..Self::default()
        }
    }

    pub fn with_threads(num_threads: usize) -> Self {
        ParallelConfig {
            num_threads,
            ..Self::default()
        }
    }
}

/// Run `work` once per item and return after every call has finished.
///
/// No ordering is guaranteed between calls. Uses a scoped pool so no
/// threads outlive the call; if the pool cannot be built the items run
/// sequentially on the calling thread.
pub fn for_each<T, F>(config: &ParallelConfig, items: &[T], work: F)
where
    T: Sync,
    F: Fn(usize, &T) + Sync + Send,
{
    if !config.parallel || items.len() <= 1 {
        items.iter().enumerate().for_each(|(i, item)| work(i, item));
        return;
    }

    let work = &work;
    let pooled = rayon::ThreadPoolBuilder::new()
        .num_threads(config.num_threads)
        .stack_size(config.stack_size)
        .build_scoped(rayon::ThreadBuilder::run, |pool| {
            pool.install(|| {
                items
                    .par_iter()
                    .enumerate()
                    .for_each(|(i, item)| work(i, item));
            });
        });

    if let Err(e) = pooled {
        tracing::warn!("failed to create thread pool ({e}), running sequentially");
        items.iter().enumerate().for_each(|(i, item)| work(i, item));
    }
}

/// Run one worker, converting errors and panics into a `WorkerError`
/// attributed to `path`.
pub fn catch_worker<R, F>(path: &str, work: F) -> Result<R, WorkerError>
where
    F: FnOnce() -> Result<R, BoxError>,
{
    install_panic_hook();
    let outer = CAPTURING.with(|c| c.replace(true));
    let result = catch_unwind(AssertUnwindSafe(work));
    CAPTURING.with(|c| c.set(outer));
    let trace = PANIC_TRACE.with(|t| t.borrow_mut().take());

    match result {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(error)) => Err(WorkerError::from_error(path, error)),
        Err(payload) => Err(WorkerError::from_panic(
            path,
            payload.as_ref(),
            trace.unwrap_or_default(),
        )),
    }
}

thread_local! {
    /// Set while this thread runs a worker inside `catch_worker`.
    static CAPTURING: Cell<bool> = const { Cell::new(false) };
    /// Location and backtrace of the last worker panic on this thread.
    static PANIC_TRACE: RefCell<Option<Vec<String>>> = const { RefCell::new(None) };
}

static PANIC_HOOK: Once = Once::new();

/// Chains a hook in front of the existing one that records where a worker
/// panicked. Panics outside `catch_worker` only reach the previous hook.
fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if CAPTURING.with(Cell::get) {
                let trace = panic_trace(info);
                PANIC_TRACE.with(|t| *t.borrow_mut() = Some(trace));
            }
            previous(info);
        }));
    });
}

/// `panicked at file:line:col`, then the backtrace frames when
/// `RUST_BACKTRACE` enables capture.
fn panic_trace(info: &PanicHookInfo<'_>) -> Vec<String> {
    let mut trace = Vec::new();
    if let Some(location) = info.location() {
        trace.push(format!(
            "panicked at {}:{}:{}",
            location.file(),
            location.line(),
            location.column()
        ));
    }
    let backtrace = Backtrace::capture();
    if backtrace.status() == BacktraceStatus::Captured {
        trace.extend(backtrace.to_string().lines().map(str::to_string));
    }
    trace
}

/// One failed worker.
#[derive(Clone, Debug)]
pub struct WorkerError {
    /// File the worker was processing.
    pub path: String,
    pub message: String,
    /// Cause chain (error sources), outermost first; for a panic, the
    /// panic location followed by any captured backtrace.
    pub trace: Vec<String>,
    pub panicked: bool,
    source: Option<Arc<dyn Error + Send + Sync + 'static>>,
}

impl WorkerError {
    pub fn from_error(path: impl Into<String>, error: BoxError) -> Self {
        let mut trace = Vec::new();
        let mut cause = error.source();
        while let Some(inner) = cause {
            trace.push(inner.to_string());
            cause = inner.source();
        }
        WorkerError {
            path: path.into(),
            message: error.to_string(),
            trace,
            panicked: false,
            source: Some(Arc::from(error)),
        }
    }

    pub fn from_panic(
        path: impl Into<String>,
        payload: &(dyn Any + Send),
        trace: Vec<String>,
    ) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "worker panicked".to_string()
        };
        WorkerError {
            path: path.into(),
            message,
            trace,
            panicked: true,
            source: None,
        }
    }

    /// The error the worker returned, if it returned one rather than panicking.
    pub fn worker_error(&self) -> Option<&(dyn Error + Send + Sync + 'static)> {
        self.source.as_deref()
    }

    /// Message followed by the trace, one entry per line.
    pub fn trace_text(&self) -> String {
        let prefix = if self.panicked { "\n  " } else { "\n  caused by: " };
        let mut text = self.message.clone();
        for line in &self.trace {
            text.push_str(prefix);
            text.push_str(line.trim_start());
        }
        text
    }
}

impl fmt::Display for WorkerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = if self.panicked { "panicked" } else { "failed" };
        write!(f, "worker for `{}` {what}: {}", self.path, self.message)
    }
}

impl Error for WorkerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn Error + 'static))
    }
}

/// Failures collected from one fan-out.
#[derive(Clone, Debug)]
pub enum FanOutError {
    Single(WorkerError),
    Aggregate(Vec<WorkerError>),
}

impl FanOutError {
    /// `None` when nothing failed. Aggregates are ordered by path.
    pub fn from_failures(mut failures: Vec<WorkerError>) -> Option<Self> {
        match failures.len() {
            0 => None,
            1 => failures.pop().map(FanOutError::Single),
            _ => {
                failures.sort_by(|a, b| a.path.cmp(&b.path));
                Some(FanOutError::Aggregate(failures))
            }
        }
    }

    pub fn failures(&self) -> &[WorkerError] {
        match self {
            FanOutError::Single(one) => std::slice::from_ref(one),
            FanOutError::Aggregate(all) => all,
        }
    }
}

impl fmt::Display for FanOutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FanOutError::Single(one) => fmt::Display::fmt(one, f),
            FanOutError::Aggregate(all) => {
                write!(f, "{} workers failed", all.len())?;
                for failure in all {
                    write!(f, "\n  {failure}")?;
                }
                Ok(())
            }
        }
    }
}

impl Error for FanOutError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            FanOutError::Single(one) => Some(one),
            FanOutError::Aggregate(_) => None,
        }
    }
}
