//! Class-wide low-attention alert
//!
//! Edge-triggered: the alert fires once when the inattentive share of the
//! class reaches the threshold, then stays quiet until re-armed.

use cwm_common::attention::AttentionLabel;

/// Share of tracked students whose label is inattentive
///
/// Returns `None` when no students are tracked.
pub fn inattentive_ratio<'a, I>(labels: I) -> Option<f64>
where
    I: IntoIterator<Item = &'a AttentionLabel>,
{
    let (total, inattentive) = labels.into_iter().fold((0usize, 0usize), |(t, i), label| {
        (t + 1, i + usize::from(*label == AttentionLabel::Inattentive))
    });

    (total > 0).then(|| inattentive as f64 / total as f64)
}

/// Edge-triggered alert latch for one class
#[derive(Debug, Clone)]
pub struct AlertAggregator {
    threshold: f64,
    has_triggered: bool,
}

impl AlertAggregator {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            has_triggered: false,
        }
    }

    /// Whether this call is the rising edge of a low-attention episode
    ///
    /// `labels` holds the latest raw label of every tracked student.
    pub fn compute_alert_flag<'a, I>(&mut self, labels: I) -> bool
    where
        I: IntoIterator<Item = &'a AttentionLabel>,
    {
        let Some(ratio) = inattentive_ratio(labels) else {
            return false;
        };

        if ratio >= self.threshold && !self.has_triggered {
            self.has_triggered = true;
            return true;
        }

        false
    }

    /// Re-arm the latch
    pub fn reset(&mut self) {
        self.has_triggered = false;
    }

    pub fn has_triggered(&self) -> bool {
        self.has_triggered
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use AttentionLabel::{Attentive as A, Inattentive as I};

    #[test]
    fn test_fires_once_per_episode() {
        let mut alert = AlertAggregator::new(0.5);
        let class = [A, I, A, I];

        assert!(alert.compute_alert_flag(&class));
        assert!(alert.has_triggered());
        assert!(!alert.compute_alert_flag(&class));

        let worse = [I, I, I, A];
        assert!(!alert.compute_alert_flag(&worse));

        alert.reset();
        assert!(alert.compute_alert_flag(&class));
    }

    #[test]
    fn test_below_threshold_does_not_fire() {
        let mut alert = AlertAggregator::new(0.5);
        assert!(!alert.compute_alert_flag(&[A, A, A, I]));
        assert!(!alert.has_triggered());
        // Still armed when the ratio rises later
        assert!(alert.compute_alert_flag(&[A, A, I, I]));
    }

    #[test]
    fn test_empty_class_never_fires() {
        let mut alert = AlertAggregator::new(0.0);
        assert!(!alert.compute_alert_flag(&[]));
        assert_eq!(inattentive_ratio(&[]), None);
    }

    #[test]
    fn test_ratio() {
        assert_eq!(inattentive_ratio(&[A, I, I, I]), Some(0.75));
        assert_eq!(inattentive_ratio(&[A]), Some(0.0));
    }
}
