//! Record sources
//!
//! Readers that turn delimited or line-oriented input into [`RawRecord`]s,
//! keeping only the allow-listed columns. Readers are lazy iterators of
//! `Result<RawRecord, CadenceError>` so the pipeline can stop at the first
//! source failure and still finalize what it already ingested.
//!
//! [`RawRecord`]: crate::types::RawRecord

mod adapter;

pub use adapter::*;
pub(crate) use adapter::column_position;
