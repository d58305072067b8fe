use serde::*;
use std::collections::BTreeMap;

use crate::community::Community;
use crate::data_loader::{MatchWinLookup, PlayerId};
use crate::party_graph::{internal_edges, PartyGraph, PartyInstance};
use crate::roster_context::RosterContext;
use crate::util::{ratio_or_zero, round_to};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ModeStats {
    pub wins: u32,
    pub losses: u32,
    pub matches: u32,
    pub win_rate: f64,
}

impl ModeStats {
    fn add(&mut self, other: &ModeStats) {
        self.wins += other.wins;
        self.losses += other.losses;
        self.matches += other.matches;
    }

    // Undecided matches (no known winner) count as played but not towards the rate
    fn update_win_rate(&mut self) {
        self.win_rate = ratio_or_zero(self.wins as f64, (self.wins + self.losses) as f64);
    }
}

#[derive(Debug, Clone)]
pub struct RosterStats {
    pub total_matches: usize,
    pub stats_by_mode: BTreeMap<String, ModeStats>,
    pub attendance: BTreeMap<PlayerId, usize>,
    // Most frequent exact lineups (every player in the party, sorted), most common first
    pub lineups: Vec<(Vec<PlayerId>, usize)>,
}

impl RosterStats {
    pub fn overall(&self) -> ModeStats {
        let mut overall = ModeStats::default();
        for stats in self.stats_by_mode.values() {
            overall.add(stats);
        }
        overall.update_win_rate();
        overall
    }

    pub fn matches_played(&self, id: PlayerId) -> usize {
        self.attendance.get(&id).copied().unwrap_or(0)
    }

    // Percent of the roster's matches the player was in, one decimal
    pub fn attendance_percent(&self, id: PlayerId) -> f64 {
        round_to(ratio_or_zero(self.matches_played(id) as f64, self.total_matches as f64) * 100.0, 1)
    }
}

// Statistics over the party instances credited to one roster. Returns None for rosters with fewer than
// min_team_matches of them, those never make it into the results.
pub fn calculate_roster_stats(roster: &Community, assigned: &[usize], instances: &[PartyInstance], wins: &MatchWinLookup, roster_context: &RosterContext) -> Option<RosterStats> {
    if assigned.is_empty() || assigned.len() < roster_context.min_team_matches {
        return None;
    }

    let mut stats_by_mode: BTreeMap<String, ModeStats> = BTreeMap::new();
    let mut attendance: BTreeMap<PlayerId, usize> = BTreeMap::new();
    let mut lineup_counts: BTreeMap<&[PlayerId], usize> = BTreeMap::new();

    for &idx in assigned {
        let party = &instances[idx];

        let stats = stats_by_mode.entry(party.mode().to_string()).or_default();
        stats.matches += 1;
        match wins.winner(party.match_id) {
            Some(winner) if winner == party.team_id => stats.wins += 1,
            Some(_) => stats.losses += 1,
            None => {}
        }

        for p in party.players.iter().filter(|&p| roster.contains(p)) {
            *attendance.entry(*p).or_insert(0) += 1;
        }

        *lineup_counts.entry(party.players.as_slice()).or_insert(0) += 1;
    }

    for stats in stats_by_mode.values_mut() {
        stats.update_win_rate();
    }

    // Ties keep the smaller lineup first
    let mut lineups: Vec<(Vec<PlayerId>, usize)> = lineup_counts.into_iter()
        .map(|(lineup, count)| (lineup.to_vec(), count))
        .collect();
    lineups.sort_by(|a, b| b.1.cmp(&a.1));
    lineups.truncate(roster_context.top_lineups);

    Some(RosterStats {
        total_matches: assigned.len(),
        stats_by_mode,
        attendance,
        lineups,
    })
}

// Mean edge weight inside the roster, 0 without internal edges. Two decimals
pub fn average_connection_strength(graph: &PartyGraph, roster: &Community) -> f64 {
    let (weight_sum, edge_count) = internal_edges(graph, roster);
    round_to(ratio_or_zero(weight_sum as f64, edge_count as f64), 2)
}
