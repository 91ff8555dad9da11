use hashpan_engine::{Candidate, Prefix, Sha1Digest};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Issuer prefixes that show up in real samples.
pub const PREFIXES: &[&str] = &["400000", "411111", "510510", "555555", "601100", "371449"];

/// Generates `count` Luhn-valid card numbers spread over [`PREFIXES`].
/// Uses a fixed seed for reproducible benchmark results.
pub fn generate_random_pans(count: usize) -> Vec<Candidate> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..count)
        .map(|_| {
            let prefix = Prefix::parse(PREFIXES[rng.gen_range(0..PREFIXES.len())]).unwrap();
            Candidate::new(&prefix, rng.gen_range(0..1_000_000_000))
        })
        .collect()
}

/// Digests of `count` random card numbers, for use as a target set.
pub fn generate_target_digests(count: usize) -> Vec<Sha1Digest> {
    generate_random_pans(count).iter().map(|pan| Sha1Digest::of(pan.as_bytes())).collect()
}
