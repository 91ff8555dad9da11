pub mod error;
pub mod input;
pub mod progress;
pub mod report;

pub use error::Error;
pub use input::{HASHES_FILE, HASHPAN_DATA_DIR_ENV, PANS_FILE, data_dir_from_env, load_hashes, load_pans};
pub use progress::{join_updater, new_bar, spawn_updater};
pub use report::{format_match, format_summary, format_undeciphered};
