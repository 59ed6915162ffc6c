//! Cached source of installation tokens.
//!
//! [`InstallationTokenSource`] owns the current token for one
//! `(app, installation)` pair and is the only place refresh happens: callers
//! re-ask the source on every dispatch attempt and never hold a token across
//! attempts, so expiry is handled centrally. Reads of a still-fresh token are
//! lock-free; a refresh is performed by exactly one caller while concurrent
//! callers wait for its result.

mod source;

pub use source::InstallationTokenSource;
