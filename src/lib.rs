//! compfl - Spectrum-based fault localization for compiler regressions
//!
//! Given a compiler bug with a known passing and failing configuration, this
//! library searches for closely related passing and failing configurations,
//! collects the compiler's own statement coverage under each one, and ranks
//! the compiler's source files by suspiciousness.

pub mod cli;
pub mod configuration;
pub mod corpus;
pub mod coverage;
pub mod error;
pub mod metrics;
pub mod oracle;
pub mod pipeline;
pub mod search;
pub mod settings;
pub mod spectrum;
pub mod storage;
pub mod toolchain;
pub mod validator;
