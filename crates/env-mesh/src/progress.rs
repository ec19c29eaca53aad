//! Progress reporting and cancellation for mesh builds.
//!
//! A build reports once per refinement generation. The callback returns
//! `false` to cancel, and the build then stops with
//! [`MeshError::Cancelled`](crate::MeshError::Cancelled).
//!
//! # Example
//!
//! ```ignore
//! use env_mesh::progress::ProgressCallback;
//!
//! let callback: ProgressCallback = Box::new(|progress| {
//!     println!("{}% complete: {}", progress.percent(), progress.message);
//!     true // Continue processing (return false to cancel)
//! });
//!
//! let mesh = MeshBuilder::new(config)?.build_with_progress(Some(&callback))?;
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::tracing_ext::log_progress;

/// Snapshot of a build, passed to callbacks once per refinement generation.
#[derive(Debug, Clone)]
pub struct Progress {
    /// Generation about to be refined (0-based).
    pub generation: u64,

    /// Upper bound on the number of generations (`split_depth + 1`).
    pub generations: u64,

    /// Cells evaluated in this generation.
    pub active_cells: usize,

    pub message: String,

    /// Time since the build started.
    pub elapsed: Duration,
}

impl Progress {
    pub fn new(generation: u64, generations: u64, active_cells: usize, message: impl Into<String>) -> Self {
        Self {
            generation,
            generations,
            active_cells,
            message: message.into(),
            elapsed: Duration::ZERO,
        }
    }

    /// Share of the generation budget used, 0.0 to 1.0.
    ///
    /// Refinement often stops before the last generation, so this is an
    /// upper bound on the remaining work, not an estimate of it.
    #[inline]
    pub fn fraction(&self) -> f64 {
        if self.generations == 0 {
            0.0
        } else {
            (self.generation as f64 / self.generations as f64).min(1.0)
        }
    }

    #[inline]
    pub fn percent(&self) -> u32 {
        (self.fraction() * 100.0).round() as u32
    }

    /// Whether this is the last generation the split depth allows.
    #[inline]
    pub fn is_final_generation(&self) -> bool {
        self.generation + 1 >= self.generations
    }
}

/// Callback function for progress reporting.
///
/// Returns `true` to continue, `false` to request cancellation.
pub type ProgressCallback = Box<dyn Fn(&Progress) -> bool + Send + Sync>;

/// Tracks the generation of a build and remembers cancellation.
#[derive(Debug)]
pub struct ProgressTracker {
    generation: AtomicU64,
    generations: u64,
    cancelled: AtomicBool,
    started: Instant,
}

impl ProgressTracker {
    pub fn new(generations: u64) -> Self {
        Self {
            generation: AtomicU64::new(0),
            generations,
            cancelled: AtomicBool::new(false),
            started: Instant::now(),
        }
    }

    #[inline]
    pub fn set_generation(&self, generation: u64) {
        self.generation.store(generation, Ordering::Relaxed);
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn snapshot(&self, active_cells: usize, message: impl Into<String>) -> Progress {
        Progress {
            generation: self.generation(),
            generations: self.generations,
            active_cells,
            message: message.into(),
            elapsed: self.started.elapsed(),
        }
    }

    /// Log the current generation and pass it to the callback, if any.
    ///
    /// Returns `false` if the callback requested cancellation now or earlier.
    pub fn report(&self, callback: Option<&ProgressCallback>, active_cells: usize, message: impl Into<String>) -> bool {
        if self.is_cancelled() {
            return false;
        }
        let progress = self.snapshot(active_cells, message);
        log_progress(&progress);
        let Some(callback) = callback else {
            return true;
        };

        let should_continue = callback(&progress);
        if !should_continue {
            self.cancel();
        }
        should_continue
    }
}
