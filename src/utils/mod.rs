//! Utility modules.

pub mod file;
pub mod retry;
pub mod text;

pub use file::{DEFAULT_MAX_FILE_SIZE, calculate_checksum, is_text_file, read_file_content};
pub use retry::{RetryConfig, RetryResult, Retryable, with_retry};
pub use text::{meaningful_len, preview};
