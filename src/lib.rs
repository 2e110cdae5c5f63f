#![doc = include_str!("../README.md")]

mod cache;
mod error;
pub mod function;
pub mod include;
mod model;
mod parser;
pub mod preprocessor;
mod rewriter;
mod source;
pub mod tokenizer;
mod value;

pub use cache::*;
pub use error::*;
pub use model::*;
pub use rewriter::*;
pub use source::*;
pub use value::*;

pub use glam;
