//! Matches a live face embedding against the enrolled gallery.
//!
//! Distance is the raw sum of squared element-wise differences. It is not
//! normalized or bounded: identical faces score 0.0 and different faces
//! score well above 1.0, so the threshold is calibrated to this scale.

use std::sync::Arc;

use crate::events::{Event, EventSink, MatchedFace};
use crate::gallery::EnrolledSample;

/// Sentinel distance larger than any plausible real distance. Returned for
/// length-mismatched comparisons and used as the "no match yet" seed in
/// the per-user reduction; the threshold filter excludes it.
pub const NO_MATCH_DISTANCE: f32 = 100.0;

/// Default ceiling on the per-user minimum distance for a match.
pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.4;

pub struct Matcher {
    threshold: f32,
    sink: Arc<dyn EventSink>,
}

impl Matcher {
    pub fn new(threshold: f32, sink: Arc<dyn EventSink>) -> Self {
        Self { threshold, sink }
    }

    /// Sum of squared element-wise differences between two embeddings.
    ///
    /// A length mismatch is a wiring error (wrong model against the
    /// gallery), not bad input: it is reported on the sink and degrades to
    /// [`NO_MATCH_DISTANCE`] so one bad comparison cannot stop the session.
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() {
            self.sink.emit(&Event::log(format!(
                "embedding length mismatch: {} vs {}",
                a.len(),
                b.len()
            )));
            tracing::warn!(live = a.len(), enrolled = b.len(), "embedding length mismatch");
            return NO_MATCH_DISTANCE;
        }
        a.iter()
            .zip(b.iter())
            .map(|(x, y)| (x - y) * (x - y))
            .sum()
    }

    /// Reduce the gallery to the minimum distance per user, then keep the
    /// users whose minimum is within the threshold.
    ///
    /// Output order is each user's first appearance in the gallery, not
    /// distance order; downstream candidate selection relies on that.
    pub fn match_all(&self, gallery: &[EnrolledSample], live: &[f32]) -> Vec<MatchedFace> {
        let mut per_user: Vec<(&str, f32)> = Vec::new();

        for sample in gallery {
            let dist = self.distance(live, &sample.embedding);
            match per_user
                .iter_mut()
                .find(|(login, _)| *login == sample.user_login)
            {
                Some((_, best)) => *best = best.min(dist),
                None => per_user.push((&sample.user_login, dist)),
            }
        }

        per_user
            .into_iter()
            .filter(|(_, dist)| *dist <= self.threshold)
            .map(|(login, dist)| MatchedFace::new(login, dist))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{MemorySink, NullSink};

    fn sample(login: &str, embedding: Vec<f32>) -> EnrolledSample {
        EnrolledSample {
            user_login: login.to_string(),
            image_path: format!("validated_images/{login}/0.jpg").into(),
            embedding,
        }
    }

    fn matcher() -> Matcher {
        Matcher::new(DEFAULT_MATCH_THRESHOLD, Arc::new(NullSink))
    }

    #[test]
    fn test_distance_identity_is_zero() {
        let m = matcher();
        let e = vec![0.1, -0.5, 2.0];
        assert_eq!(m.distance(&e, &e), 0.0);
    }

    #[test]
    fn test_distance_is_symmetric() {
        let m = matcher();
        let a = vec![0.5, 1.0, -0.25];
        let b = vec![0.0, 0.75, 0.25];
        assert_eq!(m.distance(&a, &b), m.distance(&b, &a));
    }

    #[test]
    fn test_distance_is_sum_of_squared_diffs() {
        let m = matcher();
        // (1-0)^2 + (2-0)^2 = 5, unbounded above 1.0 by design of the metric
        assert_eq!(m.distance(&[1.0, 2.0], &[0.0, 0.0]), 5.0);
    }

    #[test]
    fn test_length_mismatch_degrades_to_sentinel_and_reports() {
        let sink = Arc::new(MemorySink::new());
        let m = Matcher::new(DEFAULT_MATCH_THRESHOLD, sink.clone());
        assert_eq!(m.distance(&[1.0, 2.0], &[1.0]), NO_MATCH_DISTANCE);
        assert_eq!(sink.events_of_type("log").len(), 1);
    }

    #[test]
    fn test_mismatched_user_is_excluded_not_fatal() {
        let m = matcher();
        let gallery = vec![
            sample("alice", vec![0.0, 0.0, 0.0]),
            sample("bob", vec![0.0]), // wrong dimension
        ];
        let matched = m.match_all(&gallery, &[0.0, 0.0, 0.0]);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].user_login, "alice");
    }

    #[test]
    fn test_per_user_minimum_reduction() {
        let m = matcher();
        // alice has one far sample and one close sample; the close one wins.
        let gallery = vec![
            sample("alice", vec![3.0, 3.0]),
            sample("alice", vec![0.1, 0.0]),
        ];
        let matched = m.match_all(&gallery, &[0.0, 0.0]);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].distance, 0.01);
    }

    #[test]
    fn test_threshold_excludes_distant_users() {
        let m = matcher();
        let gallery = vec![
            sample("alice", vec![0.0, 0.0]),
            sample("bob", vec![5.0, 5.0]),
        ];
        let matched = m.match_all(&gallery, &[0.0, 0.0]);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].user_login, "alice");
    }

    #[test]
    fn test_output_preserves_first_appearance_order() {
        let m = matcher();
        // bob is the better match but alice appears first in the gallery.
        let gallery = vec![
            sample("alice", vec![0.3, 0.0]),
            sample("bob", vec![0.1, 0.0]),
            sample("alice", vec![0.4, 0.0]),
        ];
        let matched = m.match_all(&gallery, &[0.0, 0.0]);
        let logins: Vec<&str> = matched.iter().map(|f| f.user_login.as_str()).collect();
        assert_eq!(logins, vec!["alice", "bob"]);
    }

    #[test]
    fn test_empty_gallery_matches_nothing() {
        let m = matcher();
        assert!(m.match_all(&[], &[0.0, 0.0]).is_empty());
    }
}
