//! Prefix ranking and the worker pool that searches prefixes in priority
//! order.
//!
//! Prefixes are handed out through a zero-capacity channel fed by a single
//! producer. A send only completes when some idle worker takes the prefix, so
//! the next prefix dispatched is always the highest ranked one not yet taken,
//! however many workers are busy. Completion order is not ordered.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, bounded};
use tracing::{debug, error, info, warn};

use crate::candidate::{PREFIX_LEN, Prefix};
use crate::error::Error;
use crate::search::{PrefixStatus, SearchEngine, SearchEvent};

/// Order in which derived prefixes are searched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrefixOrder {
    /// Most frequent in the sample first; ties keep first-seen order.
    #[default]
    Frequency,
    /// Order of first appearance in the sample.
    FirstSeen,
}

/// A distinct prefix taken from the known numbers.
///
/// `prefix` is kept as text: it is only validated when a worker picks it
/// up, so a malformed entry fails that one unit of work and nothing else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedPrefix {
    pub prefix: String,
    pub occurrences: usize,
    /// Index of the sample entry the prefix first appeared in.
    pub first_seen: usize,
}

impl RankedPrefix {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into(), occurrences: 1, first_seen: 0 }
    }
}

/// Takes the first 6 characters of each known number, deduplicates, and
/// ranks them. Entries shorter than 6 characters (after trimming) are
/// skipped.
pub fn derive_prefixes<I, S>(sample: I, order: PrefixOrder) -> Vec<RankedPrefix>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut ranked: Vec<RankedPrefix> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for (line, entry) in sample.into_iter().enumerate() {
        let entry = entry.as_ref().trim();
        let Some((last, c)) = entry.char_indices().nth(PREFIX_LEN - 1) else {
            if !entry.is_empty() {
                warn!(line, entry, "sample entry too short for a prefix, skipping");
            }
            continue;
        };
        let prefix = &entry[..last + c.len_utf8()];

        match index.get(prefix) {
            Some(&i) => ranked[i].occurrences += 1,
            None => {
                index.insert(prefix.to_string(), ranked.len());
                ranked.push(RankedPrefix { prefix: prefix.to_string(), occurrences: 1, first_seen: line });
            }
        }
    }

    if order == PrefixOrder::Frequency {
        // stable, so equal counts stay in first-seen order
        ranked.sort_by(|a, b| b.occurrences.cmp(&a.occurrences));
    }
    ranked
}

/// Totals for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Prefixes whose whole range was searched.
    pub completed: usize,
    /// Prefixes cut short by a stop request.
    pub interrupted: usize,
    pub failed: usize,
    /// Prefixes never started because the run was stopped first.
    pub skipped: usize,
    pub matches: usize,
    pub checked: u64,
    pub elapsed: Duration,
}

#[derive(Default)]
struct WorkerTally {
    completed: usize,
    interrupted: usize,
    failed: usize,
    skipped: usize,
    matches: usize,
    checked: u64,
}

/// Searches `prefixes` (highest priority first) on `engine.config().threads`
/// workers, reporting progress through `on_event` from the worker threads.
///
/// A failing prefix, including one whose search or event handler panics,
/// is reported once as
/// [`SearchEvent::Failed`] and does not affect the others. Once the engine
/// is stopped no further prefixes are dispatched.
pub fn run<F>(engine: &SearchEngine, prefixes: &[RankedPrefix], on_event: F) -> RunSummary
where
    F: Fn(SearchEvent) + Sync,
{
    let start = Instant::now();
    let workers = engine.config().threads.max(1).min(prefixes.len());
    info!(prefixes = prefixes.len(), workers, suffixes = engine.config().suffix_limit, "starting search");

    let mut summary = RunSummary::default();
    if workers == 0 {
        return summary;
    }

    let (tx, rx) = bounded::<(usize, &RankedPrefix)>(0);
    let on_event = &on_event;

    let (sent, tallies) = thread::scope(|s| {
        let handles: Vec<_> = (0..workers)
            .map(|id| {
                let rx = rx.clone();
                thread::Builder::new()
                    .name(format!("hashpan-worker-{id}"))
                    .spawn_scoped(s, move || worker(engine, rx, on_event))
            })
            .collect();
        drop(rx);

        let mut sent = 0usize;
        if handles.iter().any(Result::is_ok) {
            for (rank, ranked) in prefixes.iter().enumerate() {
                if engine.is_stopped() || tx.send((rank, ranked)).is_err() {
                    break;
                }
                sent += 1;
            }
        }
        drop(tx);

        let tallies: Vec<WorkerTally> = handles
            .into_iter()
            .filter_map(|handle| match handle {
                Ok(handle) => handle.join().ok(),
                Err(e) => {
                    error!(error = %e, "failed to spawn worker");
                    None
                }
            })
            .collect();
        (sent, tallies)
    });

    summary.skipped = prefixes.len() - sent;
    for tally in tallies {
        summary.completed += tally.completed;
        summary.interrupted += tally.interrupted;
        summary.failed += tally.failed;
        summary.skipped += tally.skipped;
        summary.matches += tally.matches;
        summary.checked += tally.checked;
    }
    summary.elapsed = start.elapsed();

    info!(
        completed = summary.completed,
        interrupted = summary.interrupted,
        failed = summary.failed,
        skipped = summary.skipped,
        matches = summary.matches,
        checked = summary.checked,
        "search finished"
    );
    summary
}

fn worker<F>(engine: &SearchEngine, rx: Receiver<(usize, &RankedPrefix)>, on_event: &F) -> WorkerTally
where
    F: Fn(SearchEvent) + Sync,
{
    let mut tally = WorkerTally::default();

    for (rank, ranked) in rx.iter() {
        if engine.is_stopped() {
            tally.skipped += 1;
            continue;
        }

        let prefix = match Prefix::parse(&ranked.prefix) {
            Ok(prefix) => prefix,
            Err(error) => {
                warn!(prefix = %ranked.prefix, %error, "prefix rejected");
                tally.failed += 1;
                emit(on_event, SearchEvent::Failed { prefix: ranked.prefix.clone(), error });
                continue;
            }
        };

        debug!(%prefix, rank, occurrences = ranked.occurrences, "dispatched");

        // every caller callback for this prefix runs inside the guard
        let mut delivered = 0usize;
        let mut checked = None;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            on_event(SearchEvent::Started { prefix, rank });
            let report = engine.search_prefix(prefix, |m| {
                on_event(SearchEvent::Matched(m));
                delivered += 1;
            });
            let status = report.status;
            checked = Some(report.checked);
            on_event(SearchEvent::Finished(report));
            status
        }));

        tally.matches += delivered;
        tally.checked += checked.unwrap_or(0);

        match outcome {
            Ok(PrefixStatus::Exhausted) => tally.completed += 1,
            Ok(PrefixStatus::Interrupted) => tally.interrupted += 1,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(%prefix, %message, "prefix search panicked");
                tally.failed += 1;
                emit(
                    on_event,
                    SearchEvent::Failed {
                        prefix: prefix.to_string(),
                        error: Error::WorkerPanicked { prefix: prefix.to_string(), message },
                    },
                );
            }
        }
    }

    tally
}

/// Delivers an event outside any prefix guard; a panicking handler is
/// logged and otherwise ignored.
fn emit<F>(on_event: &F, event: SearchEvent)
where
    F: Fn(SearchEvent) + Sync,
{
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| on_event(event))) {
        error!(message = %panic_message(payload.as_ref()), "event handler panicked");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        String::from("<non-string panic payload>")
    }
}
