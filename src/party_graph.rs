use log::info;
use petgraph::graphmap::UnGraphMap;
use std::collections::{BTreeMap, BTreeSet};

use crate::data_loader::*;
use crate::roster_context::RosterContext;

// Nodes are player ids, edge weight is the number of party instances the two players shared
pub type PartyGraph = UnGraphMap<PlayerId, u32>;

pub const UNKNOWN_MODE: &str = "Unknown";

// One group of players who queued together for one team in one match.
// Player list is sorted and deduplicated, so it doubles as a canonical lineup key.
#[derive(Debug, Clone, PartialEq)]
pub struct PartyInstance {
    pub match_id: MatchId,
    pub team_id: TeamId,
    pub game_type: Option<String>,
    pub is_ranked: Option<bool>,
    pub players: Vec<PlayerId>,
}

impl PartyInstance {
    pub fn mode(&self) -> &str {
        self.game_type.as_deref().unwrap_or(UNKNOWN_MODE)
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.players.binary_search(&id).is_ok()
    }
}

// Builds the party graph and the party instance list from participation records.
// Only rows with a party id are used. Returns None if there are none, meaning there's nothing to detect.
// Instances are ordered by (match id, party id).
pub fn build_party_graph(records: &[ParticipationRecord], roster_context: &RosterContext) -> Option<(PartyGraph, Vec<PartyInstance>)> {
    let instances = party_instances(records);
    if instances.is_empty() {
        return None;
    }
    info!("Found {} unique party instances to analyze.", instances.len());

    let pair_counts = pair_counts(&instances);
    info!("Found {} unique player pairings from party data.", pair_counts.len());

    let mut graph = PartyGraph::new();
    for ((a, b), count) in pair_counts {
        if count < roster_context.min_matches_for_connection { continue; }
        graph.add_edge(a, b, count);
    }

    info!("Roster network built: {} players and {} reliable connections (at least {} shared parties).",
        graph.node_count(),
        graph.edge_count(),
        roster_context.min_matches_for_connection,
    );

    Some((graph, instances))
}

pub fn party_instances(records: &[ParticipationRecord]) -> Vec<PartyInstance> {
    let mut groups: BTreeMap<(MatchId, &str), Vec<&ParticipationRecord>> = BTreeMap::new();
    for r in records {
        let Some(party_id) = r.party_id.as_deref() else { continue; };
        groups.entry((r.match_id, party_id)).or_default().push(r);
    }

    groups.into_values()
        .map(|rows| {
            // Every member of a party plays on the same team, so the first row speaks for all of them
            let first = rows[0];
            let players: BTreeSet<PlayerId> = rows.iter().map(|r| r.user_id).collect();

            PartyInstance {
                match_id: first.match_id,
                team_id: first.team_id,
                game_type: first.game_type.clone(),
                is_ranked: first.is_ranked,
                players: players.into_iter().collect(),
            }
        })
        .collect()
}

// Counts, for every unordered player pair (smaller id first), the instances containing both.
pub fn pair_counts(instances: &[PartyInstance]) -> BTreeMap<(PlayerId, PlayerId), u32> {
    let mut counts = BTreeMap::new();

    for party in instances {
        if party.players.len() < 2 { continue; }

        for (i, &a) in party.players.iter().enumerate() {
            for &b in &party.players[i + 1..] {
                *counts.entry((a, b)).or_insert(0) += 1;
            }
        }
    }

    counts
}

// Adds connections for players who were often on the same team without queueing together.
// Party edges are never overridden. New edges get a reduced weight so they rank below party evidence.
// Only used for the community search, never for team rosters.
pub fn extend_with_team_play(graph: &PartyGraph, records: &[ParticipationRecord], roster_context: &RosterContext) -> PartyGraph {
    let mut teams: BTreeMap<(MatchId, TeamId), BTreeSet<PlayerId>> = BTreeMap::new();
    for r in records {
        teams.entry((r.match_id, r.team_id)).or_default().insert(r.user_id);
    }

    let mut same_team: BTreeMap<(PlayerId, PlayerId), u32> = BTreeMap::new();
    for players in teams.values() {
        let players: Vec<PlayerId> = players.iter().copied().collect();
        for (i, &a) in players.iter().enumerate() {
            for &b in &players[i + 1..] {
                *same_team.entry((a, b)).or_insert(0) += 1;
            }
        }
    }
    info!("Found {} unique player pairings from same-team matches.", same_team.len());

    let mut extended = graph.clone();
    let mut added = 0;
    for ((a, b), count) in same_team {
        if count < roster_context.min_non_party_matches || extended.contains_edge(a, b) { continue; }

        let weight = count.checked_div(roster_context.non_party_weight_divisor).unwrap_or(count);
        extended.add_edge(a, b, weight);
        added += 1;
    }

    info!("Extended network: {} players and {} connections ({} from non-party play).",
        extended.node_count(),
        extended.edge_count(),
        added,
    );

    extended
}

pub fn edge_weight(graph: &PartyGraph, a: PlayerId, b: PlayerId) -> Option<u32> {
    graph.edge_weight(a, b).copied()
}

pub fn has_link(graph: &PartyGraph, a: PlayerId, b: PlayerId, min_weight: u32) -> bool {
    edge_weight(graph, a, b).is_some_and(|w| w >= min_weight)
}

// Weighted degree
pub fn strength(graph: &PartyGraph, node: PlayerId) -> u64 {
    graph.edges(node).map(|(_, _, w)| *w as u64).sum()
}

pub fn sorted_neighbors(graph: &PartyGraph, node: PlayerId) -> Vec<PlayerId> {
    let mut neighbors: Vec<PlayerId> = graph.neighbors(node).collect();
    neighbors.sort_unstable();
    neighbors
}

pub fn sorted_nodes(graph: &PartyGraph) -> Vec<PlayerId> {
    let mut nodes: Vec<PlayerId> = graph.nodes().collect();
    nodes.sort_unstable();
    nodes
}

// (sum of weights, number of edges) of the subgraph induced by members
pub fn internal_edges(graph: &PartyGraph, members: &BTreeSet<PlayerId>) -> (u64, usize) {
    let mut weight_sum = 0;
    let mut edge_count = 0;

    for (i, &a) in members.iter().enumerate() {
        for &b in members.iter().skip(i + 1) {
            if let Some(w) = edge_weight(graph, a, b) {
                weight_sum += w as u64;
                edge_count += 1;
            }
        }
    }

    (weight_sum, edge_count)
}
