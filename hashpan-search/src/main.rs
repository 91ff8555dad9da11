use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use hashpan_engine::candidate::SUFFIX_COUNT;
use hashpan_engine::{MatchMode, PrefixOrder, SearchConfig, SearchEngine, SearchEvent, derive_prefixes};
use hashpan_search::{
    Error, HASHES_FILE, PANS_FILE, data_dir_from_env, format_match, format_summary, format_undeciphered,
    join_updater, load_hashes, load_pans, new_bar, spawn_updater,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "hashpan-search")]
#[command(about = "Recover card numbers from leaked SHA1 hashes using a sample of known numbers")]
struct Args {
    /// Known card numbers, one per line (default: $HASHPAN_DATA_DIR/pans.txt)
    #[arg(long)]
    pans: Option<PathBuf>,

    /// Leaked SHA1 hashes, base64 or hex, one per line (default: $HASHPAN_DATA_DIR/hashes.txt)
    #[arg(long)]
    hashes: Option<PathBuf>,

    /// Number of worker threads (default: available parallelism)
    #[arg(short = 'j', long)]
    threads: Option<usize>,

    /// Account suffixes to search per prefix
    #[arg(long, default_value_t = SUFFIX_COUNT)]
    limit: u32,

    /// Keep matched hashes in the target set and report every candidate hitting them
    #[arg(long)]
    keep_matched: bool,

    /// Search prefixes in order of first appearance instead of by frequency
    #[arg(long)]
    first_seen_order: bool,

    /// Do not test the known card numbers themselves before searching
    #[arg(long)]
    skip_sample_check: bool,

    /// Disable progress bar
    #[arg(long)]
    no_progress: bool,
}

fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = SearchConfig::default().with_suffix_limit(args.limit);
    if let Some(threads) = args.threads {
        if threads == 0 {
            return Err(Error::InvalidArgs);
        }
        config = config.with_threads(threads);
    }
    if args.keep_matched {
        config = config.with_mode(MatchMode::Retain);
    }
    if args.first_seen_order {
        config = config.with_order(PrefixOrder::FirstSeen);
    }

    let data_dir = data_dir_from_env();
    let pans_path = args.pans.unwrap_or_else(|| data_dir.join(PANS_FILE));
    let hashes_path = args.hashes.unwrap_or_else(|| data_dir.join(HASHES_FILE));

    let pans = load_pans(&pans_path)?;
    let targets = load_hashes(&hashes_path)?;
    info!(pans = pans.len(), hashes = targets.len(), "loaded inputs");

    let engine = SearchEngine::new(targets, config);

    let stop = engine.stop_handle();
    ctrlc::set_handler(move || {
        eprintln!("\nStopping, finishing current batch...");
        stop.store(true, Ordering::SeqCst);
    })?;

    let sample_matches = if args.skip_sample_check {
        0
    } else {
        let found = engine.check_sample(&pans);
        for m in &found {
            println!("{}", format_match(m));
        }
        found.len()
    };

    let prefixes = derive_prefixes(&pans, engine.config().order);
    let keyspace = engine.keyspace_size(prefixes.len());
    println!(
        "Searching {} prefixes ({} candidates) for {} hashes using {} threads",
        prefixes.len(),
        keyspace,
        engine.filter().targets().len(),
        engine.config().threads
    );

    let progress_bar = (!args.no_progress).then(|| new_bar(keyspace));
    let done = Arc::new(AtomicBool::new(false));
    let updater = progress_bar
        .clone()
        .map(|pb| spawn_updater(pb, engine.progress_counter(), Arc::clone(&done)));

    let print = |line: String| match &progress_bar {
        Some(pb) => pb.println(line),
        None => println!("{line}"),
    };

    let summary = engine.run(&prefixes, |event| match event {
        SearchEvent::Matched(m) => print(format_match(&m)),
        SearchEvent::Failed { prefix, error } => warn!(%prefix, %error, "prefix failed"),
        SearchEvent::Started { .. } | SearchEvent::Finished(_) => {}
    });

    done.store(true, Ordering::Relaxed);
    if let Some(handle) = updater {
        join_updater(handle);
    }
    if let Some(pb) = progress_bar {
        pb.set_position(engine.candidates_checked());
        if engine.is_stopped() {
            pb.abandon_with_message("interrupted");
        } else {
            pb.finish_with_message("done");
        }
    }

    let remaining = engine.remaining();
    for digest in &remaining {
        println!("{}", format_undeciphered(digest));
    }

    println!("{}", format_summary(&summary, sample_matches, remaining.len()));
    Ok(())
}
