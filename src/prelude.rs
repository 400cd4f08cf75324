/// Crate-wide result type with an optional success payload
pub type BResult<T = ()> = Result<T, BootstrapError>;

pub use crate::core::*;
pub use crate::error::BootstrapError;
pub use crate::logger::*;
pub use slog::{crit, debug, error, info, o, warn};
