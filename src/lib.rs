//! stackscope - a learning companion for infrastructure templates and event logs
//!
//! This library loads CloudFormation-style JSON templates, resolves their
//! intrinsic references against caller-supplied values, and filters
//! timestamped audit/log events with CloudWatch-style filter patterns.
//!
//! # Example
//!
//! ```rust
//! use stackscope::{load_and_resolve, ParameterContext};
//!
//! let template = br#"{
//!     "Resources": {
//!         "Bucket": {
//!             "Type": "AWS::S3::Bucket",
//!             "Properties": {"BucketName": {"Fn::Sub": "my-${Env}-bucket"}}
//!         }
//!     }
//! }"#;
//!
//! let ctx = ParameterContext::new().with_parameter("Env", "prod");
//! let doc = load_and_resolve(template, &ctx).unwrap();
//! assert!(doc.to_json().contains("my-prod-bucket"));
//! ```

pub mod context;
pub mod document;
pub mod error;
pub mod parser;
pub mod query;
pub mod template;

pub use context::{ContextError, ParameterContext, PseudoParameters, PseudoValue};
pub use document::{load, load_str, Document, KeyPath, LoadError, Mapping, Placeholder, Value};
pub use error::ParseError;
pub use query::{
    query, query_with_options, CompiledPattern, EventRecord, InvalidPattern, PatternError, Query,
    QueryOptions, QueryPattern, QueryResults, RecordError,
};
pub use template::{resolve, ResolveError};

use thiserror::Error;

/// Errors that can occur in the load-then-resolve pipeline
#[derive(Debug, Error)]
pub enum TemplateError {
    /// Error while loading
    #[error("load error: {0}")]
    Load(#[from] LoadError),

    /// Error while resolving
    #[error("resolve error: {0}")]
    Resolve(#[from] ResolveError),
}

impl TemplateError {
    /// Format the error with source context when it carries a span
    pub fn format(&self, source: &str, filename: &str) -> String {
        match self {
            TemplateError::Load(err) => err.format(source, filename),
            TemplateError::Resolve(err) => err.to_string(),
        }
    }
}

/// Load a template from raw bytes and resolve it in one call
pub fn load_and_resolve(raw: &[u8], ctx: &ParameterContext) -> Result<Document, TemplateError> {
    let doc = load(raw)?;
    let resolved = resolve(&doc, ctx)?;
    Ok(resolved)
}
