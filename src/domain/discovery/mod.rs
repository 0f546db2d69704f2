//! Discovery domain - ghost competitor search by embedding similarity

mod discovery_engine;
mod similarity;

pub use discovery_engine::{DiscoveryEngine, GhostRanking};
pub use similarity::cosine_similarity;

use serde::{Deserialize, Serialize};

/// An untracked hotel from the catalog, with its profile embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateHotel {
    pub id: String,
    pub name: String,
    pub location: String,
    pub category: String,
    pub description: String,
    pub star_rating: Option<u8>,
    pub embedding: Vec<f32>,
}

/// One ranked discovery result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GhostMatch {
    pub candidate_id: String,
    pub name: String,
    pub location: String,
    pub similarity: f32,
}

/// Ranking parameters
#[derive(Debug, Clone, Copy)]
pub struct DiscoveryQuery {
    pub top_k: usize,
    pub min_similarity: f32,
}
