//! Ghost competitor ranking

use std::cmp::Ordering;

use tracing::debug;

use super::{cosine_similarity, CandidateHotel, DiscoveryQuery, GhostMatch};
use crate::domain::hotel::Hotel;
use crate::shared::errors::DiscoveryError;
use crate::shared::types::DiscoveryConfig;

/// Ranks untracked catalog hotels by similarity to the target hotel
pub struct DiscoveryEngine {
    embedding_dim: Option<usize>,
}

impl DiscoveryEngine {
    pub fn new(config: &DiscoveryConfig) -> Self {
        Self {
            embedding_dim: config.embedding_dim,
        }
    }

    /// Build a ranking over `pool`. Hotels already tracked by the user
    /// (`tracked`, target included) are excluded before ranking.
    pub fn discover<'a>(
        &self,
        target: &Hotel,
        target_embedding: Option<&'a [f32]>,
        pool: &'a [CandidateHotel],
        tracked: &[Hotel],
        query: DiscoveryQuery,
    ) -> Result<GhostRanking<'a>, DiscoveryError> {
        let target_embedding = match target_embedding {
            Some(embedding) if !embedding.is_empty() => embedding,
            _ => return Err(DiscoveryError::EmbeddingUnavailable(target.name.clone())),
        };
        if let Some(expected) = self.embedding_dim {
            if target_embedding.len() != expected {
                return Err(DiscoveryError::DimensionMismatch {
                    expected,
                    actual: target_embedding.len(),
                });
            }
        }

        let candidates: Vec<&CandidateHotel> = pool
            .iter()
            .filter(|c| {
                !tracked
                    .iter()
                    .any(|h| h.matches_listing(&c.id, &c.name, &c.location))
            })
            .filter(|c| {
                let comparable = c.embedding.len() == target_embedding.len();
                if !comparable {
                    debug!(
                        "Skipping candidate {}: embedding has {} dims, expected {}",
                        c.id,
                        c.embedding.len(),
                        target_embedding.len()
                    );
                }
                comparable
            })
            .collect();

        Ok(GhostRanking {
            target_embedding,
            candidates,
            query,
        })
    }
}

/// Ranked discovery results. Scoring happens on iteration and every call
/// to `iter` starts over.
#[derive(Debug, Clone)]
pub struct GhostRanking<'a> {
    target_embedding: &'a [f32],
    candidates: Vec<&'a CandidateHotel>,
    query: DiscoveryQuery,
}

impl<'a> GhostRanking<'a> {
    /// Descending similarity, ties by candidate id ascending, at most `top_k`
    pub fn iter(&self) -> impl Iterator<Item = GhostMatch> + '_ {
        let mut scored: Vec<(f32, &CandidateHotel)> = self
            .candidates
            .iter()
            .map(|c| (cosine_similarity(self.target_embedding, &c.embedding), *c))
            .filter(|(score, _)| *score >= self.query.min_similarity)
            .collect();

        scored.sort_by(|(score_a, a), (score_b, b)| {
            score_b
                .partial_cmp(score_a)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });

        scored
            .into_iter()
            .take(self.query.top_k)
            .map(|(similarity, c)| GhostMatch {
                candidate_id: c.id.clone(),
                name: c.name.clone(),
                location: c.location.clone(),
                similarity,
            })
    }

    /// Number of candidates left after exclusion, before scoring
    pub fn pool_size(&self) -> usize {
        self.candidates.len()
    }
}

impl<'r, 'a> IntoIterator for &'r GhostRanking<'a> {
    type Item = GhostMatch;
    type IntoIter = Box<dyn Iterator<Item = GhostMatch> + 'r>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::hotel::Hotel;
    use crate::shared::utils::generate_id;
    use chrono::Utc;

    fn hotel(name: &str, external_ref: Option<&str>, is_target: bool) -> Hotel {
        Hotel {
            id: generate_id(),
            user_id: generate_id(),
            name: name.to_string(),
            location: "Lisbon".to_string(),
            is_target_hotel: is_target,
            currency: "EUR".to_string(),
            created_at: Utc::now(),
            external_ref: external_ref.map(|s| s.to_string()),
            star_rating: Some(4),
        }
    }

    fn candidate(id: &str, name: &str, embedding: Vec<f32>) -> CandidateHotel {
        CandidateHotel {
            id: id.to_string(),
            name: name.to_string(),
            location: "Lisbon".to_string(),
            category: "boutique".to_string(),
            description: String::new(),
            star_rating: Some(4),
            embedding,
        }
    }

    fn query(top_k: usize, min_similarity: f32) -> DiscoveryQuery {
        DiscoveryQuery { top_k, min_similarity }
    }

    #[test]
    fn test_ranking_order_and_ties() {
        let engine = DiscoveryEngine::new(&DiscoveryConfig::default());
        let target = hotel("Home", None, true);
        let target_embedding = vec![1.0, 0.0];
        let pool = vec![
            candidate("c-3", "Close", vec![0.9, 0.1]),
            candidate("c-2", "Twin B", vec![2.0, 0.0]),
            candidate("c-1", "Twin A", vec![1.0, 0.0]),
            candidate("c-4", "Far", vec![0.0, 1.0]),
        ];

        let ranking = engine
            .discover(&target, Some(&target_embedding), &pool, &[target.clone()], query(10, 0.0))
            .unwrap();
        let ids: Vec<String> = ranking.iter().map(|m| m.candidate_id).collect();
        assert_eq!(ids, vec!["c-1", "c-2", "c-3", "c-4"]);

        let scores: Vec<f32> = ranking.iter().map(|m| m.similarity).collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_top_k_and_min_similarity() {
        let engine = DiscoveryEngine::new(&DiscoveryConfig::default());
        let target = hotel("Home", None, true);
        let target_embedding = vec![1.0, 0.0];
        let pool = vec![
            candidate("a", "A", vec![1.0, 0.0]),
            candidate("b", "B", vec![1.0, 0.2]),
            candidate("c", "C", vec![1.0, 1.0]),
            candidate("d", "D", vec![0.0, 1.0]),
        ];

        let ranking = engine
            .discover(&target, Some(&target_embedding), &pool, &[], query(2, 0.5))
            .unwrap();
        let ids: Vec<String> = ranking.iter().map(|m| m.candidate_id).collect();
        assert_eq!(ids, vec!["a", "b"]);

        let ranking = engine
            .discover(&target, Some(&target_embedding), &pool, &[], query(10, 0.5))
            .unwrap();
        // d is orthogonal and falls under the floor
        assert_eq!(ranking.iter().count(), 3);
        assert!(ranking.iter().all(|m| m.similarity >= 0.5));
    }

    #[test]
    fn test_excludes_tracked_competitors() {
        let engine = DiscoveryEngine::new(&DiscoveryConfig::default());
        let target = hotel("Home", Some("cat-home"), true);
        let tracked = vec![
            target.clone(),
            hotel("Rival By Ref", Some("cat-1"), false),
            hotel("Rival By Name", None, false),
        ];
        let target_embedding = vec![1.0, 0.0];
        let pool = vec![
            candidate("cat-home", "Home", vec![1.0, 0.0]),
            candidate("cat-1", "Renamed Listing", vec![1.0, 0.0]),
            candidate("cat-2", "rival by name", vec![1.0, 0.0]),
            candidate("cat-3", "Ghost", vec![1.0, 0.1]),
        ];

        let ranking = engine
            .discover(&target, Some(&target_embedding), &pool, &tracked, query(10, 0.0))
            .unwrap();
        assert_eq!(ranking.pool_size(), 1);
        let ids: Vec<String> = (&ranking).into_iter().map(|m| m.candidate_id).collect();
        assert_eq!(ids, vec!["cat-3"]);
    }

    #[test]
    fn test_missing_target_embedding() {
        let engine = DiscoveryEngine::new(&DiscoveryConfig::default());
        let target = hotel("Home", None, true);
        let pool = vec![candidate("a", "A", vec![1.0])];

        let result = engine.discover(&target, None, &pool, &[], query(5, 0.0));
        assert!(matches!(result, Err(DiscoveryError::EmbeddingUnavailable(name)) if name == "Home"));

        let empty: Vec<f32> = Vec::new();
        let result = engine.discover(&target, Some(&empty), &pool, &[], query(5, 0.0));
        assert!(matches!(result, Err(DiscoveryError::EmbeddingUnavailable(_))));
    }

    #[test]
    fn test_dimension_checks() {
        let engine = DiscoveryEngine::new(&DiscoveryConfig {
            embedding_dim: Some(3),
            ..DiscoveryConfig::default()
        });
        let target = hotel("Home", None, true);
        let pool = vec![
            candidate("a", "A", vec![1.0, 0.0, 0.0]),
            candidate("b", "B", vec![1.0, 0.0]),
        ];

        let short = vec![1.0, 0.0];
        let result = engine.discover(&target, Some(&short), &pool, &[], query(5, 0.0));
        assert_eq!(
            result.unwrap_err(),
            DiscoveryError::DimensionMismatch { expected: 3, actual: 2 }
        );

        let full = vec![1.0, 0.0, 0.0];
        let ranking = engine.discover(&target, Some(&full), &pool, &[], query(5, 0.0)).unwrap();
        let ids: Vec<String> = ranking.iter().map(|m| m.candidate_id).collect();
        assert_eq!(ids, vec!["a"]);
    }

    #[test]
    fn test_restartable() {
        let engine = DiscoveryEngine::new(&DiscoveryConfig::default());
        let target = hotel("Home", None, true);
        let target_embedding = vec![0.5, 0.5];
        let pool = vec![
            candidate("a", "A", vec![1.0, 0.0]),
            candidate("b", "B", vec![0.5, 0.6]),
        ];
        let ranking = engine
            .discover(&target, Some(&target_embedding), &pool, &[], query(5, 0.0))
            .unwrap();

        let first: Vec<GhostMatch> = ranking.iter().collect();
        let second: Vec<GhostMatch> = ranking.iter().collect();
        assert_eq!(first, second);
        assert_eq!(first[0].candidate_id, "b");
    }
}
