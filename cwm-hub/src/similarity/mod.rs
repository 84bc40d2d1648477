//! Similarity gate
//!
//! Decides whether a frame differs enough from the same client's previous
//! frame to be worth sending to the classifier.

pub mod cache;
pub mod fingerprint;
pub mod gate;
pub mod ssim;

pub use cache::SimilarityCache;
pub use fingerprint::{CenterCropLocator, FingerprintExtractor, FrameFingerprint, Region, RegionLocator};
pub use gate::{GateDecision, SimilarityGate};
