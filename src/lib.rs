//! Outlining of order-independent loops into accelerator kernels.
//!
//! [`outline::OffloadPass`] rewrites an [`ir::Program`] so that every
//! eligible loop runs either on the CPU or as a launched kernel, chosen at
//! run time. [`eval`] executes programs before and after the pass, and
//! [`manifest`] describes the generated kernels to a backend.

pub mod api;
pub mod config;
pub mod diagnostic;
pub mod error;
pub mod eval;
pub mod ir;
pub mod manifest;
pub mod outline;
pub mod syntax;

// Re-exports keep the short `crate::X` paths used across the pass.
pub use config::project;
pub use syntax::lexeme;
pub use syntax::span;

pub use api::*;
