//! Fuzzing library for lti-gateway.
//!
//! This crate provides fuzzing targets for the inbound parsing surface:
//! OAuth `Authorization` headers, percent-decoding and launch verification.
//!
//! # Usage
//!
//! ```bash
//! cd crates/lti-fuzz
//! cargo +nightly fuzz run fuzz_launch_verify -- -max_total_time=60
//! ```

pub use lti_gateway::{oauth, verify};
