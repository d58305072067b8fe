use clap::ValueEnum;
use serde::*;
use std::fs;
use std::path::Path;

use crate::error::AnalysisError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum AttributionMode {
    // Each party instance counts for at most one roster
    Exclusive,
    // Every roster with enough members present counts the instance
    Overlapping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtensionPool {
    MediumNeighbors,
    AllNeighbors,
}

// Knobs for one run of the ego expansion + weight component detection.
// The team roster search and the looser community search use the same procedure with different numbers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionParams {
    pub min_community_size: usize,

    pub hub_min_strength: u64,          // Sum of edge weights
    pub hub_min_degree: usize,

    pub strong_edge_weight: u32,
    pub medium_edge_weight: u32,
    pub min_strong_neighbors: usize,

    pub cluster_link_weight: u32,       // Edge weight that pulls a neighbor into a cluster
    pub extension_link_weight: u32,
    pub extension_min_links: usize,
    pub extension_pool: ExtensionPool,
    pub max_extended_size: Option<usize>,

    pub max_component_size: Option<usize>,
    pub max_candidate_size: Option<usize>,

    pub novelty_overlap: f64,           // Candidates overlapping an accepted one by more than this are dropped
    pub consolidation_overlap: f64,
}

impl DetectionParams {
    pub fn strict() -> Self {
        Self {
            min_community_size: 2,

            hub_min_strength: 50,
            hub_min_degree: 3,

            strong_edge_weight: 15,
            medium_edge_weight: 8,
            min_strong_neighbors: 2,

            cluster_link_weight: 8,
            extension_link_weight: 5,
            extension_min_links: 2,
            extension_pool: ExtensionPool::MediumNeighbors,
            max_extended_size: Some(10),

            max_component_size: Some(15),
            max_candidate_size: Some(15),

            novelty_overlap: 0.6,
            consolidation_overlap: 0.85,
        }
    }

    pub fn relaxed() -> Self {
        Self {
            min_community_size: 2,

            hub_min_strength: 15,
            hub_min_degree: 2,

            strong_edge_weight: 6,
            medium_edge_weight: 3,
            min_strong_neighbors: 1,

            cluster_link_weight: 3,
            extension_link_weight: 2,
            extension_min_links: 1,
            extension_pool: ExtensionPool::AllNeighbors,
            max_extended_size: None,

            max_component_size: None,
            max_candidate_size: None,

            novelty_overlap: 0.6,
            consolidation_overlap: 0.80,
        }
    }
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self::strict()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RosterContext {
    pub min_matches_for_connection: u32,
    pub min_team_matches: usize,
    pub min_roster_size: usize,
    pub max_roster_size: usize,

    pub team_detection: DetectionParams,
    #[serde(deserialize_with = "relaxed_overrides")]
    pub community_detection: DetectionParams,
    pub detect_communities: bool,

    pub community_similarity_threshold: f64,    // Jaccard
    pub small_community_size: usize,
    pub min_small_merge_strength: f64,

    pub min_non_party_matches: u32,
    pub non_party_weight_divisor: u32,

    pub attribution_mode: AttributionMode,
    pub min_attribution_share: f64,
    pub min_members_present: usize,

    pub top_lineups: usize,
}

impl Default for RosterContext {
    fn default() -> Self {
        Self {
            min_matches_for_connection: 5,
            min_team_matches: 10,
            min_roster_size: 2,
            max_roster_size: 10,

            team_detection: DetectionParams::strict(),
            community_detection: DetectionParams::relaxed(),
            detect_communities: true,

            community_similarity_threshold: 0.65,
            small_community_size: 10,
            min_small_merge_strength: 2.0,

            min_non_party_matches: 20,
            non_party_weight_divisor: 3,

            attribution_mode: AttributionMode::Exclusive,
            min_attribution_share: 0.3,
            min_members_present: 2,

            top_lineups: 5,
        }
    }
}

// A partial `community_detection` block in a config file patches the relaxed preset, not the strict one.
fn relaxed_overrides<'de, D>(deserializer: D) -> Result<DetectionParams, D::Error> where
    D: Deserializer<'de> {
    let patch = serde_json::Map::<String, serde_json::Value>::deserialize(deserializer)?;
    let mut value = serde_json::to_value(DetectionParams::relaxed()).map_err(de::Error::custom)?;
    if let serde_json::Value::Object(fields) = &mut value {
        fields.extend(patch);
    }

    serde_json::from_value(value).map_err(de::Error::custom)
}

impl RosterContext {
    // Missing fields in the file keep their defaults. Values are taken as-is, there's no range checking.
    pub fn from_file(path: &Path) -> Result<Self, AnalysisError> {
        let data = fs::read_to_string(path).map_err(|source| AnalysisError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&data).map_err(|source| AnalysisError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    // Team detection with its smallest community tied to the smallest roster, so undersized candidates
    // can't shadow a valid roster in the novelty filter.
    pub fn team_params(&self) -> DetectionParams {
        DetectionParams {
            min_community_size: self.min_roster_size,
            ..self.team_detection.clone()
        }
    }

    pub fn is_roster_size(&self, size: usize) -> bool {
        (self.min_roster_size..=self.max_roster_size).contains(&size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let ctx: RosterContext = serde_json::from_str(
            r#"{ "min_team_matches": 3, "team_detection": { "strong_edge_weight": 20 }, "attribution_mode": "overlapping" }"#,
        )
        .unwrap();

        assert_eq!(ctx.min_team_matches, 3);
        assert_eq!(ctx.min_matches_for_connection, 5);
        assert_eq!(ctx.team_detection.strong_edge_weight, 20);
        assert_eq!(ctx.team_detection.medium_edge_weight, 8);
        assert_eq!(ctx.community_detection.strong_edge_weight, 6);
        assert_eq!(ctx.attribution_mode, AttributionMode::Overlapping);
    }

    #[test]
    fn partial_community_block_patches_relaxed_preset() {
        let ctx: RosterContext = serde_json::from_str(
            r#"{ "community_detection": { "hub_min_degree": 4 } }"#,
        )
        .unwrap();

        assert_eq!(ctx.community_detection.hub_min_degree, 4);
        assert_eq!(ctx.community_detection.strong_edge_weight, 6);
        assert_eq!(ctx.community_detection.max_candidate_size, None);
        assert_eq!(ctx.community_detection.extension_pool, ExtensionPool::AllNeighbors);
    }

    #[test]
    fn team_params_follow_min_roster_size() {
        let mut ctx = RosterContext::default();
        ctx.min_roster_size = 4;
        ctx.team_detection.strong_edge_weight = 12;

        let params = ctx.team_params();
        assert_eq!(params.min_community_size, 4);
        assert_eq!(params.strong_edge_weight, 12);
        assert_eq!(ctx.community_detection.min_community_size, 2);
    }

    #[test]
    fn roster_size_bounds_are_inclusive() {
        let ctx = RosterContext::default();
        assert!(!ctx.is_roster_size(1));
        assert!(ctx.is_roster_size(2));
        assert!(ctx.is_roster_size(10));
        assert!(!ctx.is_roster_size(11));
    }

    #[test]
    fn config_file_parse_error_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roster.json");
        fs::write(&path, "{ not json").unwrap();

        let err = RosterContext::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("roster.json"));
    }
}
