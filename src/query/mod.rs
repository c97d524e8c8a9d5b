//! Event query engine
//!
//! Filters timestamped [`EventRecord`]s with a CloudWatch-style JSON filter
//! pattern and yields matches most recent first:
//!
//! ```text
//! { $.state = "FAILED" && $.latency >= 500 && $.message = "*timeout*" }
//! ```
//!
//! A pattern is parsed into a [`QueryPattern`], compiled once into a
//! [`CompiledPattern`], and then applied lazily by [`query`].

mod engine;
mod grammar;
pub mod lexer;
mod pattern;
mod record;

pub use engine::{query, query_with_options, InvalidPattern, Query, QueryOptions, QueryResults, RecordId};
pub use pattern::{
    CompiledPattern, Comparison, FieldSelector, NonNumericField, Operand, Operator, PatternError,
    QueryPattern,
};
pub use record::{EventRecord, RecordError};
