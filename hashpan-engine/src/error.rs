#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("prefix '{prefix}' must be exactly 6 ASCII digits")]
    InvalidPrefix { prefix: String },

    #[error("expected {expected} ASCII digits, got '{value}'")]
    InvalidDigits { expected: usize, value: String },

    #[error("'{pan}' fails the Luhn check")]
    InvalidCheckDigit { pan: String },

    #[error("'{value}' is not a base64 or hex encoded SHA1 digest")]
    InvalidDigestEncoding { value: String },

    #[error("SHA1 digest must be 20 bytes, got {len}")]
    InvalidDigestLength { len: usize },

    #[error("worker panicked while searching prefix {prefix}: {message}")]
    WorkerPanicked { prefix: String, message: String },
}
