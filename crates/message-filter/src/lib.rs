//! Message filter engine.
//!
//! Compiles a user-supplied JavaScript predicate once per poll session and
//! evaluates it per record:
//!
//! ```text
//! function filter(key, content, headers, offset, partition) { return ...; }
//! ```
//!
//! The script runs inside an embedded engine with no I/O bindings. Each
//! evaluation gets a fresh realm, so no state carries over between records.
//! Loop iterations, recursion depth and wall-clock time are bounded, and a
//! run past its deadline is stopped rather than left spinning.

mod error;
mod evaluator;
mod filter;

pub use error::{FilterError, Result};
pub use filter::{CompiledFilter, FilterInput, FilterLimits, MessageFilter};
