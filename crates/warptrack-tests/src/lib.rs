//! Integration test crate for WarpTrack.
//!
//! This crate exists solely to hold cross-crate integration tests.
//! It renders synthetic sequences with warptrack-core and tracks them
//! end to end with warptrack-tracking.

#[cfg(test)]
mod common;

#[cfg(test)]
mod sequences;

#[cfg(test)]
mod failures;


#[cfg(test)]
mod pyramids;
