//! Similarity gate decision logic

use cwm_common::config::HubConfig;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::cache::SimilarityCache;
use super::fingerprint::{FingerprintExtractor, Region, RegionLocator};
use super::ssim::mean_ssim;
use crate::error::{Error, Result};

/// Outcome of comparing a frame with its predecessor
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GateDecision {
    /// No live predecessor existed; the frame was not compared
    pub is_first_frame: bool,
    /// SSIM against the predecessor, None on the first frame
    pub similarity_score: Option<f64>,
    /// Score fell below the threshold (always true on the first frame)
    pub is_noticeable_change: bool,
    pub region_of_interest: Region,
}

impl GateDecision {
    /// Whether the frame should go on to the classifier
    pub fn should_analyze(&self) -> bool {
        self.is_first_frame || self.is_noticeable_change
    }
}

/// Perceptual similarity gate with a per-client fingerprint cache
pub struct SimilarityGate {
    extractor: FingerprintExtractor,
    cache: SimilarityCache,
    threshold: f64,
}

impl SimilarityGate {
    pub fn new(extractor: FingerprintExtractor, cache: SimilarityCache, threshold: f64) -> Self {
        Self {
            extractor,
            cache,
            threshold,
        }
    }

    /// Build a gate from hub configuration
    pub fn from_config(config: &HubConfig, locator: Arc<dyn RegionLocator>) -> Self {
        Self::new(
            FingerprintExtractor::new(locator, config.roi_size, config.roi_margin),
            SimilarityCache::new(
                config.similarity_cache_capacity,
                Duration::from_secs(config.similarity_cache_ttl_secs),
            ),
            config.similarity_threshold,
        )
    }

    /// Compare `frame` with the previous frame from `client_id`
    ///
    /// On success the cache holds this frame's fingerprint, whatever the
    /// decision. On `InvalidFrame` the cache is left untouched.
    pub async fn evaluate(&self, client_id: &str, frame: &[u8]) -> Result<GateDecision> {
        let extractor = self.extractor.clone();
        let owned = frame.to_vec();
        let fingerprint = tokio::task::spawn_blocking(move || extractor.extract(&owned))
            .await
            .map_err(|e| {
                Error::Common(cwm_common::Error::Task(format!("fingerprint: {}", e)))
            })??;
        let fingerprint = Arc::new(fingerprint);
        let region = fingerprint.region();

        let Some(previous) = self.cache.swap(client_id, Arc::clone(&fingerprint)).await else {
            debug!(client_id, "First frame for client");
            return Ok(GateDecision {
                is_first_frame: true,
                similarity_score: None,
                is_noticeable_change: true,
                region_of_interest: region,
            });
        };

        let score = mean_ssim(previous.sample(), fingerprint.sample());
        let score = (score * 10_000.0).round() / 10_000.0;
        let is_noticeable_change = score < self.threshold;

        debug!(
            client_id,
            similarity = score,
            threshold = self.threshold,
            noticeable = is_noticeable_change,
            "Compared frame with previous"
        );

        Ok(GateDecision {
            is_first_frame: false,
            similarity_score: Some(score),
            is_noticeable_change,
            region_of_interest: region,
        })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Underlying fingerprint cache
    pub fn cache(&self) -> &SimilarityCache {
        &self.cache
    }
}
