//! Errors for domain value parsing

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Text did not name a known value
    #[error("Parse error: {0}")]
    Parse(String),
}
