//! pyhf JSON format parser

pub mod model;
pub mod schema;
pub mod simplemodels;

#[cfg(test)]
mod tests;

pub use model::*;
pub use schema::*;
