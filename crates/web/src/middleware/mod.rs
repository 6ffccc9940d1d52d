//! Built-in middleware.
//!
//! [`Recovery`] is installed by the engine itself as the first global middleware;
//! the others are opt-in.

mod access_log;
mod date_header;
mod recovery;

pub use access_log::AccessLog;
pub use date_header::DateHeader;
pub use recovery::Recovery;
pub(crate) use recovery::panic_message;
