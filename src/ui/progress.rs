//! Progress indicators for manifest scans
//!
//! Uses `linya` for allocation-free, concurrency-optimized progress bars.
//! Both releases of a tag diff scan at once, each on its own bar.

use linya::{Bar, Progress};
use std::sync::{Arc, Mutex};

/// Multi-bar progress for parallel scans
/// Thread-safe wrapper, cloned into each release pipeline
#[derive(Clone)]
pub struct ScanProgress {
  progress: Arc<Mutex<Progress>>,
}

impl ScanProgress {
  pub fn new() -> Self {
    Self {
      progress: Arc::new(Mutex::new(Progress::new())),
    }
  }

  /// Add a new bar with a label and total
  pub fn add_bar(&self, total: usize, label: impl Into<String>) -> Option<ScanBar> {
    let mut progress = self.progress.lock().ok()?;
    let bar = progress.bar(total, label.into());
    Some(ScanBar {
      progress: Arc::clone(&self.progress),
      bar,
    })
  }
}

impl Default for ScanProgress {
  fn default() -> Self {
    Self::new()
  }
}

/// One bar of a [`ScanProgress`]
pub struct ScanBar {
  progress: Arc<Mutex<Progress>>,
  bar: Bar,
}

impl ScanBar {
  /// Increment by one (thread-safe); a poisoned lock only loses the redraw.
  pub fn inc(&self) {
    if let Ok(mut progress) = self.progress.lock() {
      progress.inc_and_draw(&self.bar, 1);
    }
  }
}
