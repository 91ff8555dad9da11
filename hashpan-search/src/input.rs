use std::fs;
use std::path::{Path, PathBuf};

use hashpan_engine::TargetSet;
use tracing::{debug, warn};

use crate::error::Error;

/// Environment variable naming the directory that holds the input files.
pub const HASHPAN_DATA_DIR_ENV: &str = "HASHPAN_DATA_DIR";

/// Default file name for the known card numbers.
pub const PANS_FILE: &str = "pans.txt";

/// Default file name for the leaked hashes.
pub const HASHES_FILE: &str = "hashes.txt";

/// Returns the input directory from the HASHPAN_DATA_DIR environment
/// variable, or the current directory.
pub fn data_dir_from_env() -> PathBuf {
    std::env::var(HASHPAN_DATA_DIR_ENV).map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("."))
}

/// Reads one record per line, trimming whitespace and dropping blank lines.
pub fn read_lines(path: &Path) -> Result<Vec<String>, Error> {
    if !path.exists() {
        return Err(Error::MissingInput { path: path.to_path_buf() });
    }
    let contents = fs::read_to_string(path)?;
    let lines: Vec<String> =
        contents.lines().map(str::trim).filter(|l| !l.is_empty()).map(String::from).collect();
    debug!(path = %path.display(), records = lines.len(), "read input");
    Ok(lines)
}

/// Loads the known card numbers. Entries are kept as text; short or
/// malformed ones are dealt with when prefixes are derived.
pub fn load_pans(path: &Path) -> Result<Vec<String>, Error> {
    let pans = read_lines(path)?;
    if pans.is_empty() {
        return Err(Error::EmptyInput { what: "card numbers" });
    }
    Ok(pans)
}

/// Loads and decodes the leaked hashes. Any malformed line aborts the load;
/// duplicates collapse into one target.
pub fn load_hashes(path: &Path) -> Result<TargetSet, Error> {
    let lines = read_lines(path)?;
    if lines.is_empty() {
        return Err(Error::EmptyInput { what: "hashes" });
    }
    let targets = TargetSet::from_encoded(&lines)?;
    if targets.len() < lines.len() {
        warn!(duplicates = lines.len() - targets.len(), "duplicate hashes in input");
    }
    Ok(targets)
}
