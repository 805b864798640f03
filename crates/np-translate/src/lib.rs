//! # np-translate
//!
//! Model loading for npimpact.
//!
//! Supports:
//! - pyhf JSON workspaces (with a named-dataset extension)
//! - multi-workspace store files, queried by workspace / measurement / dataset name

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod pyhf;
pub mod store;

pub use pyhf::*;
pub use store::{DEFAULT_WORKSPACE, LoadedModel, ModelSource, ModelStore, load_model};
