use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;

const REFRESH: Duration = Duration::from_millis(100);

/// Progress bar sized to the candidate keyspace of a run.
pub fn new_bar(keyspace: u64) -> ProgressBar {
    let pb = ProgressBar::new(keyspace);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {human_pos}/{human_len} ({percent}%) {per_sec} eta {eta}")
            .expect("Invalid progress bar template")
            .progress_chars("#>-"),
    );
    pb
}

/// Polls `counter` into `pb` until `done` is set, then writes the final
/// count once more.
pub fn spawn_updater(pb: ProgressBar, counter: Arc<AtomicU64>, done: Arc<AtomicBool>) -> JoinHandle<()> {
    thread::spawn(move || {
        while !done.load(Ordering::Relaxed) {
            thread::sleep(REFRESH);
            pb.set_position(counter.load(Ordering::Relaxed));
        }
        pb.set_position(counter.load(Ordering::Relaxed));
    })
}

/// Waits for the updater. Returns false, after logging, if it panicked.
pub fn join_updater(handle: JoinHandle<()>) -> bool {
    match handle.join() {
        Ok(()) => true,
        Err(e) => {
            let message = e
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| e.downcast_ref::<String>().cloned())
                .unwrap_or_default();
            warn!(%message, "progress updater panicked");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_updater_writes_final_count() {
        let pb = ProgressBar::hidden();
        let counter = Arc::new(AtomicU64::new(42));
        let done = Arc::new(AtomicBool::new(true));

        let handle = spawn_updater(pb.clone(), counter, done);
        assert!(join_updater(handle));
        assert_eq!(pb.position(), 42);
    }

    #[test]
    fn test_panicked_updater_is_reported() {
        let handle: JoinHandle<()> = thread::spawn(|| panic!("draw target gone"));
        assert!(!join_updater(handle));
    }
}
