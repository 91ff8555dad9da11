//! Recovers 16 digit card numbers from their leaked, unsalted SHA1 digests.
//!
//! Card numbers have little entropy once the issuer prefix is known: 6 prefix
//! digits, 9 account digits and a Luhn check digit leave 10^9 candidates per
//! prefix. The engine takes the prefixes seen in a sample of known numbers,
//! enumerates every candidate behind each one, and tests the SHA1 digest of
//! each candidate against the target set.
//!
//! Membership is tested in two stages. A bit-packed quick-check table
//! ([`QuickCheckBitmap`]) rejects nearly every digest with a few memory
//! loads; survivors go to an exact lookup in a concurrent set
//! ([`TargetSet`]). Prefixes are searched in priority order by a pool of
//! worker threads ([`scheduler`]).
//!
//! ```no_run
//! use hashpan_engine::{SearchConfig, SearchEngine, SearchEvent, TargetSet};
//!
//! let targets = TargetSet::from_encoded(["HcawoK16aghGw+SeAEj0Qgy5RbI="])?;
//! let engine = SearchEngine::new(targets, SearchConfig::default());
//!
//! engine.run_sample(["4000001234567899"], |event| {
//!     if let SearchEvent::Matched(m) = event {
//!         println!("{} - {}", m.pan(), m.encoded_digest());
//!     }
//! });
//! # Ok::<(), hashpan_engine::Error>(())
//! ```

pub mod candidate;
pub mod digest;
mod error;
pub mod filter;
pub mod luhn;
pub mod scheduler;
pub mod search;

pub use candidate::{Candidate, CandidateGenerator, Prefix};
pub use digest::{Digester, Sha1Digest};
pub use error::Error;
pub use filter::{MatchFilter, MatchMode, QuickCheckBitmap, TargetSet};
pub use scheduler::{PrefixOrder, RankedPrefix, RunSummary, derive_prefixes};
pub use search::{Match, PrefixReport, PrefixStatus, SearchConfig, SearchEngine, SearchEvent};
