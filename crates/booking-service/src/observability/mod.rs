//! Observability for the booking service.
//!
//! Instrumentation uses `#[instrument(skip_all)]` with explicitly listed
//! fields. Meeting ids, slot ids, roles and phases are safe to log.
//! Signatures, private keys (sealed or not) and payload plaintext never appear
//! in fields or messages.

pub mod metrics;
