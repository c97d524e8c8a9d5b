//! Reference resolution for loaded templates
//!
//! The resolver walks a [`Document`](crate::document::Document) and replaces
//! every placeholder with a concrete value taken from a
//! [`ParameterContext`](crate::context::ParameterContext):
//!
//! ```text
//! {"Fn::Sub": "my-${Env}-bucket"}   with Env = "prod"   =>   "my-prod-bucket"
//! ```
//!
//! Parameters declared under `Parameters` contribute defaults and constraints;
//! named conditions under `Conditions` drive `Fn::If` and the `Condition` key of
//! resources and outputs.

mod condition;
mod error;
mod registry;
mod resolver;

pub use condition::ConditionExpr;
pub use error::ResolveError;
pub use registry::{Declarations, ParameterDecl};
pub use resolver::{resolve, ResolutionContext};
