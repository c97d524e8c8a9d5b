//! JSON parser shared by the template loader and event record decoding

pub mod ast;
mod grammar;
pub mod lexer;

pub use ast::*;
pub use grammar::{parse, MAX_DEPTH};
