//! Async playback engine for recorded sensor sequences
//!
//! Streams point-cloud frames with ground truth and competing detector
//! predictions at a target rate, keeping a bounded prefetch window ahead of
//! the playback cursor so advancement is not blocked on fetch latency.
//! Retrieved frames are scored through [`boxeval`] before being exposed as
//! the current frame.
//!
//! Layering, bottom up:
//!
//! - [`source`] — abstract frame source and payload decoding
//! - [`fetch`] — timeout-guarded fetch with a fixed retry-delay sequence
//! - [`frame_fetcher`] — whole-frame fetch through the source
//! - [`prefetch`] — bounded sliding window of in-flight fetches
//! - [`evaluate`] — per-branch tp/fp/fn scoring and delay simulation
//! - [`controller`] — the playback state machine and its observables

pub mod controller;
pub mod error;
pub mod evaluate;
pub mod fetch;
pub mod frame_fetcher;
pub mod manifest;
pub mod prefetch;
pub mod source;

pub use controller::{StreamController, StreamOptions, StreamStatus};
pub use error::{Result, StreamError};
pub use evaluate::{BranchEvaluation, DelayPolicy, StreamedFrame};
pub use fetch::{fetch_with_retry, RetryPolicy};
pub use frame_fetcher::{FrameFetcher, RawFrame};
pub use manifest::{FrameDescriptor, Manifest};
pub use prefetch::PrefetchScheduler;
pub use source::{BoxFile, FrameSource, RawBox};
