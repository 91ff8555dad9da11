use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Engine(#[from] hashpan_engine::Error),

    #[error("Input file '{path}' does not exist. Pass its location or set HASHPAN_DATA_DIR.")]
    MissingInput { path: PathBuf },

    #[error("No {what} found in input")]
    EmptyInput { what: &'static str },

    #[error("--threads must be at least 1")]
    InvalidArgs,

    #[error("Failed to install interrupt handler: {0}")]
    Signal(#[from] ctrlc::Error),
}
