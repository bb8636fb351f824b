//! Process-wide diagnostic settings.
//!
//! The setters in this module change the state of the whole process. Concurrent calls race,
//! and the last write wins.

use std::cell::RefCell;
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use log::{LevelFilter, Log, Metadata, Record};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::errors::{KakeraError, Result};

static LOGGER: Logger = Logger;

static CAPTURE_HELD: AtomicBool = AtomicBool::new(false);
static CAPTURE_SINK: Mutex<Option<Box<dyn Write + Send>>> = Mutex::new(None);

static SEED: AtomicU64 = AtomicU64::new(0);
static SEED_GENERATION: AtomicU64 = AtomicU64::new(0);

thread_local! {
    static THREAD_RNG: RefCell<Option<(u64, StdRng)>> = RefCell::new(None);
}

/// Logger writing `[LEVEL] target: message` lines to the standard error or to the active
/// capture.
pub struct Logger;

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    // Level filtering is done by the facade macros.
    fn log(&self, record: &Record) {
        let line = format!(
            "[{}] {}: {}\n",
            record.level(),
            record.target(),
            record.args()
        );
        let mut sink = CAPTURE_SINK.lock().unwrap_or_else(PoisonError::into_inner);
        match sink.as_mut() {
            Some(sink) => {
                let _ = sink.write_all(line.as_bytes());
            }
            None => {
                let _ = std::io::stderr().write_all(line.as_bytes());
            }
        }
    }

    fn flush(&self) {
        let mut sink = CAPTURE_SINK.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(sink) = sink.as_mut() {
            let _ = sink.flush();
        }
    }
}

/// Installs [`Logger`] as the global logger with the `INFO` level.
///
/// Nothing happens when another logger is already installed.
pub fn init_logger() {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(LevelFilter::Info);
    }
}

/// Converts a numeric severity into a level filter.
///
/// 0 is `INFO`, 1 is `WARNING`, 2 is `ERROR`, and 3 or more disables the output. Negative values
/// enable everything.
pub fn level_filter(min_log_level: i32) -> LevelFilter {
    match min_log_level {
        i32::MIN..=-1 => LevelFilter::Trace,
        0 => LevelFilter::Info,
        1 => LevelFilter::Warn,
        2 => LevelFilter::Error,
        _ => LevelFilter::Off,
    }
}

/// Sets the minimum severity of diagnostic messages.
pub fn set_min_log_level(min_log_level: i32) {
    log::set_max_level(level_filter(min_log_level));
}

/// Seeds the random generators used by sampling calls without an explicit seed.
///
/// Every thread reseeds its generator from `seed` at its next sampling call.
pub fn set_random_generator_seed(seed: u64) {
    SEED.store(seed, Ordering::SeqCst);
    SEED_GENERATION.fetch_add(1, Ordering::SeqCst);
}

/// Runs `f` with the random generator of the current thread.
pub(crate) fn with_thread_rng<F, T>(f: F) -> T
where
    F: FnOnce(&mut StdRng) -> T,
{
    THREAD_RNG.with(|cell| {
        let mut state = cell.borrow_mut();
        let generation = SEED_GENERATION.load(Ordering::SeqCst);
        let outdated = state.as_ref().map_or(true, |(g, _)| *g != generation);
        if outdated {
            let rng = if generation == 0 {
                StdRng::from_entropy()
            } else {
                StdRng::seed_from_u64(SEED.load(Ordering::SeqCst))
            };
            *state = Some((generation, rng));
        }
        match state.as_mut() {
            Some((_, rng)) => f(rng),
            None => f(&mut StdRng::from_entropy()),
        }
    })
}

/// Guard of an active capture. Dropping it flushes the sink and releases the capture.
pub struct CaptureGuard {
    _private: (),
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        let sink = CAPTURE_SINK
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(mut sink) = sink {
            let _ = sink.flush();
        }
        CAPTURE_HELD.store(false, Ordering::SeqCst);
    }
}

/// Redirects messages of [`Logger`] into `sink` until the returned guard is dropped.
///
/// # Errors
///
/// [`KakeraError::Concurrency`] is returned immediately when another capture is active.
pub fn capture<W>(sink: W) -> Result<CaptureGuard>
where
    W: Write + Send + 'static,
{
    if CAPTURE_HELD
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return Err(KakeraError::concurrency(
            "diagnostic output is already being captured",
        ));
    }
    *CAPTURE_SINK.lock().unwrap_or_else(PoisonError::into_inner) = Some(Box::new(sink));
    Ok(CaptureGuard { _private: () })
}
