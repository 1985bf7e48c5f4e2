//! Declarative multi-step work scripts: chain transactions and web2 calls
//! composed into sequences and conditional branches, serialized to a
//! portable id-indexed document and executed elsewhere.

pub mod actions;
pub mod config;
pub mod document;
pub mod dsl;
pub mod error;
pub mod runtime;

pub use dsl::builder::DemosWork;
pub use dsl::{Script, WorkRef};
pub use error::WorkError;
pub use runtime::engine::Executor;
