//! Nearest-neighbor identity matching with a distance threshold.

use crate::registry::FaceRegistry;
use crate::types::Embedding;

/// Default Euclidean distance threshold for a positive match.
pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.6;

/// Outcome of matching one probe embedding. `name: None` means Unknown.
#[derive(Debug, Clone)]
pub struct MatchDecision {
    pub name: Option<String>,
    /// Distance to the nearest registry entry (infinite for an empty registry).
    pub distance: f32,
}

/// Stateless matcher: full-registry distance scan, global argmin, then a
/// threshold test on the winner only.
#[derive(Debug, Clone)]
pub struct NearestMatcher {
    threshold: f32,
}

impl NearestMatcher {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Decide the identity of `probe` against `registry`.
    ///
    /// Ties on distance go to the first occurrence in registry order. Only
    /// the global minimum's pass/fail is consulted; there is no fallback to
    /// a different candidate that happens to pass the threshold.
    pub fn identify(&self, probe: &Embedding, registry: &FaceRegistry) -> MatchDecision {
        let entries = registry.entries();
        if entries.is_empty() {
            return MatchDecision {
                name: None,
                distance: f32::INFINITY,
            };
        }

        let distances: Vec<f32> = entries
            .iter()
            .map(|e| probe.euclidean_distance(&e.embedding))
            .collect();
        let passes: Vec<bool> = distances.iter().map(|&d| d <= self.threshold).collect();

        let mut best = 0;
        for (i, &d) in distances.iter().enumerate().skip(1) {
            if d < distances[best] {
                best = i;
            }
        }

        MatchDecision {
            name: passes[best].then(|| entries[best].name.clone()),
            distance: distances[best],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::KnownIdentity;

    fn registry_of(pairs: &[(&str, &[f32])]) -> FaceRegistry {
        FaceRegistry::from_entries(
            pairs
                .iter()
                .map(|(name, values)| KnownIdentity {
                    name: name.to_string(),
                    embedding: Embedding::new(values.to_vec()),
                })
                .collect(),
        )
    }

    #[test]
    fn nearest_within_threshold_wins() {
        let registry = registry_of(&[
            ("alice", &[0.0, 0.0]),
            ("bob", &[10.0, 0.0]),
        ]);
        let probe = Embedding::new(vec![0.1, 0.0]);

        let decision = NearestMatcher::new(0.6).identify(&probe, &registry);
        assert_eq!(decision.name.as_deref(), Some("alice"));
        assert!((decision.distance - 0.1).abs() < 1e-6);
    }

    #[test]
    fn nearest_beyond_threshold_is_unknown() {
        let registry = registry_of(&[
            ("alice", &[0.0, 0.0]),
            ("bob", &[10.0, 0.0]),
        ]);
        let probe = Embedding::new(vec![2.0, 0.0]);

        let decision = NearestMatcher::new(0.6).identify(&probe, &registry);
        // The nearest candidate (alice, distance 2.0) fails the threshold;
        // the decision must be Unknown, never a different candidate.
        assert_eq!(decision.name, None);
        assert!((decision.distance - 2.0).abs() < 1e-6);
    }

    #[test]
    fn argmin_is_consulted_before_the_threshold() {
        // bob passes the threshold but alice is strictly nearer and also
        // passes; the winner must be the global minimum, not merely any
        // passing candidate.
        let registry = registry_of(&[
            ("bob", &[0.5, 0.0]),
            ("alice", &[0.1, 0.0]),
        ]);
        let probe = Embedding::new(vec![0.0, 0.0]);

        let decision = NearestMatcher::new(0.6).identify(&probe, &registry);
        assert_eq!(decision.name.as_deref(), Some("alice"));
    }

    #[test]
    fn distance_ties_break_to_first_registry_entry() {
        let registry = registry_of(&[
            ("first", &[1.0, 0.0]),
            ("second", &[-1.0, 0.0]),
        ]);
        let probe = Embedding::new(vec![0.0, 0.0]);

        let decision = NearestMatcher::new(2.0).identify(&probe, &registry);
        assert_eq!(decision.name.as_deref(), Some("first"));
    }

    #[test]
    fn exact_threshold_distance_still_matches() {
        let registry = registry_of(&[("alice", &[0.6, 0.0])]);
        let probe = Embedding::new(vec![0.0, 0.0]);

        let decision = NearestMatcher::new(0.6).identify(&probe, &registry);
        assert_eq!(decision.name.as_deref(), Some("alice"));
    }

    #[test]
    fn empty_registry_degrades_to_unknown() {
        let registry = FaceRegistry::from_entries(vec![]);
        let probe = Embedding::new(vec![0.0]);

        let decision = NearestMatcher::new(0.6).identify(&probe, &registry);
        assert_eq!(decision.name, None);
        assert!(decision.distance.is_infinite());
    }
}
