//! Type definitions for fpauth

pub mod error;
pub mod operation;
pub mod verdict;

pub use error::{Error, Result};
pub use operation::{Operation, UserId};
pub use verdict::Verdict;
