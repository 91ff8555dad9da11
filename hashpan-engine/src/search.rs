//! The per-run search context and the single-prefix search loop.

use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::candidate::{Candidate, CandidateGenerator, Prefix, SUFFIX_COUNT};
use crate::digest::{Digester, Sha1Digest};
use crate::error::Error;
use crate::filter::{MatchFilter, MatchMode, TargetSet};
use crate::scheduler::{self, PrefixOrder, RankedPrefix, RunSummary};

/// How many candidates a worker checks between flushing its progress count
/// and looking at the stop flag.
pub const DEFAULT_PROGRESS_BATCH: u32 = 1 << 16;

/// Settings for one search run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchConfig {
    /// Worker threads pulling prefixes off the queue.
    pub threads: usize,
    /// Account suffixes searched per prefix, `0..suffix_limit`.
    pub suffix_limit: u32,
    pub mode: MatchMode,
    pub order: PrefixOrder,
    pub progress_batch: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            threads: std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
            suffix_limit: SUFFIX_COUNT,
            mode: MatchMode::Consume,
            order: PrefixOrder::Frequency,
            progress_batch: DEFAULT_PROGRESS_BATCH,
        }
    }
}

impl SearchConfig {
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    /// Clamped to the full 10^9 suffix space.
    pub fn with_suffix_limit(mut self, limit: u32) -> Self {
        self.suffix_limit = limit.min(SUFFIX_COUNT);
        self
    }

    pub fn with_mode(mut self, mode: MatchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_order(mut self, order: PrefixOrder) -> Self {
        self.order = order;
        self
    }

    pub fn with_progress_batch(mut self, batch: u32) -> Self {
        self.progress_batch = batch.max(1);
        self
    }

    pub fn suffix_range(&self) -> Range<u32> {
        0..self.suffix_limit
    }
}

/// A candidate whose digest is one of the targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    pub candidate: Candidate,
    pub digest: Sha1Digest,
}

impl Match {
    pub fn pan(&self) -> &str {
        self.candidate.as_str()
    }

    /// Canonical (base64) encoding of the matched digest.
    pub fn encoded_digest(&self) -> String {
        self.digest.to_base64()
    }
}

/// How a prefix search ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixStatus {
    /// Every suffix in range was checked.
    Exhausted,
    /// The run was stopped part way through.
    Interrupted,
}

#[derive(Debug, Clone)]
pub struct PrefixReport {
    pub prefix: Prefix,
    pub status: PrefixStatus,
    /// Candidates digested and tested.
    pub checked: u64,
    pub matches: usize,
    /// First suffix not checked; the range end when exhausted.
    pub next_suffix: u32,
    pub elapsed: Duration,
}

/// Everything the scheduler reports back while a run is in progress.
#[derive(Debug)]
pub enum SearchEvent {
    Started { prefix: Prefix, rank: usize },
    Matched(Match),
    Finished(PrefixReport),
    Failed { prefix: String, error: Error },
}

/// Shared state for one run: the filter built from the targets, the stop
/// flag and the progress counter. Workers borrow it; nothing is global.
pub struct SearchEngine {
    filter: MatchFilter,
    config: SearchConfig,
    stop: Arc<AtomicBool>,
    checked: Arc<AtomicU64>,
}

impl SearchEngine {
    pub fn new(targets: TargetSet, config: SearchConfig) -> Self {
        Self {
            filter: MatchFilter::new(targets),
            config,
            stop: Arc::new(AtomicBool::new(false)),
            checked: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn filter(&self) -> &MatchFilter {
        &self.filter
    }

    /// Flag that, once set, makes workers wind down at the next batch
    /// boundary. Safe to set from a signal handler thread.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /// Counter of candidates checked so far, shared with progress reporting.
    pub fn progress_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.checked)
    }

    pub fn candidates_checked(&self) -> u64 {
        self.checked.load(Ordering::Relaxed)
    }

    /// Total candidates a run over `prefixes` prefixes will check.
    pub fn keyspace_size(&self, prefixes: usize) -> u64 {
        prefixes as u64 * self.config.suffix_limit as u64
    }

    /// Targets not matched yet, sorted.
    pub fn remaining(&self) -> Vec<Sha1Digest> {
        self.filter.targets().remaining()
    }

    /// Tests the known numbers themselves against the targets. Entries that
    /// are not 16 digit Luhn-valid numbers are skipped.
    pub fn check_sample<I, S>(&self, sample: I) -> Vec<Match>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut digester = Digester::new();
        let mut found = Vec::new();

        for entry in sample {
            let candidate = match Candidate::parse(entry.as_ref().trim()) {
                Ok(c) => c,
                Err(e) => {
                    debug!(error = %e, "skipping sample entry");
                    continue;
                }
            };
            let digest = digester.digest(candidate.as_bytes());
            if self.filter.check(&digest, self.config.mode) {
                found.push(Match { candidate, digest });
            }
        }

        found
    }

    /// Searches one prefix on the calling thread, handing each match to
    /// `on_match` as soon as it is found (in ascending suffix order).
    ///
    /// If `on_match` panics the panic propagates, and in consume mode the
    /// target it was handed is put back, so searching the prefix again finds
    /// it again.
    pub fn search_prefix<F>(&self, prefix: Prefix, mut on_match: F) -> PrefixReport
    where
        F: FnMut(Match),
    {
        let start = Instant::now();
        let mode = self.config.mode;
        let batch = self.config.progress_batch.max(1);

        let mut generator = CandidateGenerator::with_range(prefix, self.config.suffix_range());
        let mut digester = Digester::new();
        let mut checked = 0u64;
        let mut pending = 0u32;
        let mut matches = 0usize;

        let status = if self.is_stopped() {
            PrefixStatus::Interrupted
        } else {
            loop {
                let Some(pan) = generator.next_candidate() else {
                    break PrefixStatus::Exhausted;
                };

                let digest = digester.digest(pan);
                if self.filter.check(&digest, mode) {
                    matches += 1;
                    let found = Match { candidate: Candidate::from(pan), digest };
                    // a consumed target goes back if the match never reached the caller
                    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| on_match(found))) {
                        if mode == MatchMode::Consume {
                            self.filter.restore(&digest);
                        }
                        panic::resume_unwind(payload);
                    }
                }

                pending += 1;
                if pending == batch {
                    self.checked.fetch_add(pending as u64, Ordering::Relaxed);
                    checked += pending as u64;
                    pending = 0;
                    if self.is_stopped() && generator.remaining() > 0 {
                        break PrefixStatus::Interrupted;
                    }
                }
            }
        };

        self.checked.fetch_add(pending as u64, Ordering::Relaxed);
        checked += pending as u64;

        let report = PrefixReport {
            prefix,
            status,
            checked,
            matches,
            next_suffix: generator.next_suffix(),
            elapsed: start.elapsed(),
        };
        debug!(%prefix, ?status, checked, matches, "prefix search finished");
        report
    }

    /// Searches every prefix in `prefixes` (already in priority order) across
    /// the worker pool. See [`scheduler::run`].
    pub fn run<F>(&self, prefixes: &[RankedPrefix], on_event: F) -> RunSummary
    where
        F: Fn(SearchEvent) + Sync,
    {
        scheduler::run(self, prefixes, on_event)
    }

    /// Derives and ranks prefixes from the known numbers, then runs them.
    pub fn run_sample<I, S, F>(&self, sample: I, on_event: F) -> RunSummary
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        F: Fn(SearchEvent) + Sync,
    {
        let prefixes = scheduler::derive_prefixes(sample, self.config.order);
        self.run(&prefixes, on_event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefix(s: &str) -> Prefix {
        Prefix::parse(s).unwrap()
    }

    fn engine(pans: &[&str], config: SearchConfig) -> SearchEngine {
        let targets = pans.iter().map(|p| Sha1Digest::of(p.as_bytes())).collect();
        SearchEngine::new(targets, config)
    }

    #[test]
    fn test_config_defaults() {
        let config = SearchConfig::default();
        assert!(config.threads >= 1);
        assert_eq!(config.suffix_limit, SUFFIX_COUNT);
        assert_eq!(config.mode, MatchMode::Consume);
        assert_eq!(config.order, PrefixOrder::Frequency);
        assert_eq!(config.with_suffix_limit(u32::MAX).suffix_limit, SUFFIX_COUNT);
    }

    #[test]
    fn test_finds_visa_test_number() {
        let engine = engine(&["4000000000000002"], SearchConfig::default().with_suffix_limit(1_000));

        let mut found = Vec::new();
        let report = engine.search_prefix(prefix("400000"), |m| found.push(m));

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].pan(), "4000000000000002");
        assert_eq!(found[0].candidate.suffix(), 0);
        assert_eq!(found[0].encoded_digest(), "HcawoK16aghGw+SeAEj0Qgy5RbI=");
        assert_eq!(report.status, PrefixStatus::Exhausted);
        assert_eq!(report.checked, 1_000);
        assert_eq!(report.matches, 1);
        assert_eq!(report.next_suffix, 1_000);
        assert!(engine.remaining().is_empty());
        assert_eq!(engine.candidates_checked(), 1_000);
    }

    #[test]
    fn test_matches_in_suffix_order() {
        let p = prefix("411111");
        let pans: Vec<String> = [700u32, 3, 250].iter().map(|&s| Candidate::new(&p, s).to_string()).collect();
        let pans: Vec<&str> = pans.iter().map(String::as_str).collect();
        let engine = engine(&pans, SearchConfig::default().with_suffix_limit(1_000));

        let mut suffixes = Vec::new();
        engine.search_prefix(p, |m| suffixes.push(m.candidate.suffix()));
        assert_eq!(suffixes, vec![3, 250, 700]);
    }

    #[test]
    fn test_retain_mode_reports_again() {
        let config = SearchConfig::default().with_suffix_limit(10).with_mode(MatchMode::Retain);
        let engine = engine(&["4000000000000002"], config);

        let first = engine.search_prefix(prefix("400000"), |_| {});
        let second = engine.search_prefix(prefix("400000"), |_| {});
        assert_eq!(first.matches, 1);
        assert_eq!(second.matches, 1);
        assert_eq!(engine.remaining().len(), 1);
    }

    #[test]
    fn test_consume_mode_reports_once() {
        let engine = engine(&["4000000000000002"], SearchConfig::default().with_suffix_limit(10));

        assert_eq!(engine.search_prefix(prefix("400000"), |_| {}).matches, 1);
        assert_eq!(engine.search_prefix(prefix("400000"), |_| {}).matches, 0);
    }

    #[test]
    fn test_stop_interrupts_at_batch_boundary() {
        let p = prefix("400000");
        let late = Candidate::new(&p, 900).to_string();
        let config = SearchConfig::default().with_suffix_limit(1_000).with_progress_batch(16);
        let engine = engine(&["4000000000000002", late.as_str()], config);

        let mut found = Vec::new();
        let report = engine.search_prefix(p, |m| {
            found.push(m);
            engine.stop();
        });

        assert_eq!(report.status, PrefixStatus::Interrupted);
        assert_eq!(report.checked, 16);
        assert_eq!(report.next_suffix, 16);
        assert_eq!(found.len(), 1);
        assert_eq!(engine.remaining().len(), 1);
    }

    #[test]
    fn test_stopped_engine_does_no_work() {
        let engine = engine(&["4000000000000002"], SearchConfig::default().with_suffix_limit(10));
        engine.stop();
        let report = engine.search_prefix(prefix("400000"), |_| panic!("no match expected"));
        assert_eq!(report.status, PrefixStatus::Interrupted);
        assert_eq!(report.checked, 0);
    }

    #[test]
    fn test_check_sample() {
        let engine = engine(&["4000000000000002", "5555555555554444"], SearchConfig::default());

        let found = engine.check_sample([
            "4000000000000002",
            " 4111111111111111 ",
            "5555555555554444\n",
            "4000000000000003",
            "40000",
        ]);

        let pans: Vec<_> = found.iter().map(Match::pan).collect();
        assert_eq!(pans, vec!["4000000000000002", "5555555555554444"]);
        assert!(engine.remaining().is_empty());
    }

    #[test]
    fn test_panicking_sink_keeps_target() {
        let p = prefix("400000");
        let target = Candidate::new(&p, 5).to_string();
        let engine = engine(&[target.as_str()], SearchConfig::default().with_suffix_limit(100));

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            engine.search_prefix(p, |_| panic!("sink failed"))
        }));
        assert!(outcome.is_err());
        assert_eq!(engine.remaining(), vec![Sha1Digest::of(target.as_bytes())]);

        let mut suffixes = Vec::new();
        let report = engine.search_prefix(p, |m| suffixes.push(m.candidate.suffix()));
        assert_eq!(suffixes, vec![5]);
        assert_eq!(report.matches, 1);
        assert!(engine.remaining().is_empty());
    }

    #[test]
    fn test_keyspace_size() {
        let engine = engine(&[], SearchConfig::default().with_suffix_limit(1_000));
        assert_eq!(engine.keyspace_size(3), 3_000);
    }
}
