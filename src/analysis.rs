use log::{info, warn};
use rayon::prelude::*;

use crate::attribution::*;
use crate::community::*;
use crate::consolidate::*;
use crate::data_loader::AnalysisData;
use crate::party_graph::*;
use crate::report::{CommunityRecord, RosterRecord};
use crate::roster_context::RosterContext;
use crate::roster_stats::calculate_roster_stats;

#[derive(Debug, Default)]
pub struct AnalysisOutcome {
    pub rosters: Vec<RosterRecord>,
    pub communities: Vec<CommunityRecord>,
}

// records -> party graph + instances -> candidate rosters -> exclusive match credit -> roster stats.
// The looser community search runs on the same graph extended with non-party co-play.
pub fn analyze_rosters(data: &AnalysisData, roster_context: &RosterContext) -> AnalysisOutcome {
    let Some((graph, instances)) = build_party_graph(&data.participation, roster_context) else {
        warn!("No party data found in the dataset. Nothing to detect.");
        return AnalysisOutcome::default();
    };

    if graph.node_count() == 0 {
        info!("Roster network is empty. Skipping roster detection.");
        return AnalysisOutcome::default();
    }

    let rosters = find_rosters(&graph, &instances, data, roster_context);

    let communities = if roster_context.detect_communities {
        find_communities(&graph, data, roster_context)
    } else {
        Vec::new()
    };

    AnalysisOutcome { rosters, communities }
}

pub fn find_rosters(graph: &PartyGraph, instances: &[PartyInstance], data: &AnalysisData, roster_context: &RosterContext) -> Vec<RosterRecord> {
    let index = build_party_index(instances);

    // Roster numbers follow the candidate list, before any size filtering
    let (numbers, rosters): (Vec<usize>, Vec<Community>) = detect_communities(graph, &roster_context.team_params())
        .into_iter()
        .enumerate()
        .filter(|(_, c)| roster_context.is_roster_size(c.len()))
        .map(|(i, c)| (i + 1, c))
        .unzip();
    info!("{} potential core rosters to analyze.", rosters.len());

    let assigned = attribute_matches(&rosters, instances, &index, roster_context);

    let analyzed: Vec<Option<RosterRecord>> = rosters.par_iter()
        .zip(numbers.par_iter())
        .zip(assigned.par_iter())
        .map(|((roster, &number), assigned)| {
            let stats = calculate_roster_stats(roster, assigned, instances, &data.wins, roster_context)?;
            Some(RosterRecord::new(number, roster, &stats, graph, &data.players))
        })
        .collect();

    let mut records: Vec<RosterRecord> = analyzed.into_iter().flatten().collect();
    records.sort_by(|a, b| b.stats_overall.matches.cmp(&a.stats_overall.matches));

    info!("Successfully analyzed {} final rosters.", records.len());
    records
}

pub fn find_communities(graph: &PartyGraph, data: &AnalysisData, roster_context: &RosterContext) -> Vec<CommunityRecord> {
    let extended = extend_with_team_play(graph, &data.participation, roster_context);

    let communities = detect_communities(&extended, &roster_context.community_detection);
    let communities = consolidate_by_similarity(communities, roster_context.community_similarity_threshold);
    let communities = merge_small_into_large(communities, &extended, roster_context);

    let mut records: Vec<CommunityRecord> = communities.iter()
        .enumerate()
        .filter(|(_, c)| c.len() >= roster_context.min_roster_size)
        .map(|(i, c)| CommunityRecord::new(i + 1, c, &data.players))
        .collect();
    records.sort_by(|a, b| b.player_count.cmp(&a.player_count));

    info!("Found {} communities.", records.len());
    records
}
