//! Garbage collection for Keepsake.
//!
//! A sweep removes two kinds of garbage:
//!
//! - the staging image set, once it is older than the caller's cutoff;
//! - every version of a singleton asset other than the one named by its
//!   current pointer, read fresh at sweep time.
//!
//! Alias and pointer keys are never removed. An asset kind without a pointer
//! has no verifiable current version, so nothing of that kind is deleted.
//!
//! Sweeps walk the explicit indexes kept by the image and asset stores. A
//! full-scan policy additionally walks every key, for data written before the
//! indexes existed.

pub mod sweep;

pub use sweep::{GarbageCollector, SweepPolicy, SweepReport};
