//! Text lines written to stdout.

use std::time::Duration;

use hashpan_engine::{Match, RunSummary, Sha1Digest};

/// `card# - <pan> - hash <base64>`
pub fn format_match(m: &Match) -> String {
    format!("card# - {} - hash {}", m.pan(), m.encoded_digest())
}

/// `undeciphered - <base64>`
pub fn format_undeciphered(digest: &Sha1Digest) -> String {
    format!("undeciphered - {}", digest.to_base64())
}

pub fn format_summary(summary: &RunSummary, sample_matches: usize, remaining: usize) -> String {
    format!(
        "searched {} prefixes ({} interrupted, {} failed, {} skipped), {} candidates in {}: \
         {} matches ({} from sample), {} undeciphered",
        summary.completed,
        summary.interrupted,
        summary.failed,
        summary.skipped,
        summary.checked,
        format_duration(summary.elapsed),
        summary.matches + sample_matches,
        sample_matches,
        remaining,
    )
}

fn format_duration(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    if secs >= 3600 {
        format!("{}h{:02}m{:02}s", secs / 3600, (secs / 60) % 60, secs % 60)
    } else if secs >= 60 {
        format!("{}m{:02}s", secs / 60, secs % 60)
    } else {
        format!("{:.2}s", elapsed.as_secs_f64())
    }
}
