// Builders for hand-made and seeded random party data, shared by the unit tests.

use rand::prelude::*;
use std::collections::BTreeSet;

use crate::community::Community;
use crate::data_loader::*;
use crate::party_graph::*;

pub fn record(match_id: MatchId, party_id: Option<&str>, user_id: PlayerId, team_id: TeamId, mode: &str) -> ParticipationRecord {
    ParticipationRecord {
        match_id,
        party_id: party_id.map(str::to_string),
        user_id,
        team_id,
        game_type: Some(mode.to_string()),
        is_ranked: Some(true),
    }
}

pub fn party_rows(match_id: MatchId, party_id: &str, team_id: TeamId, mode: &str, players: &[PlayerId]) -> Vec<ParticipationRecord> {
    players.iter().map(|&p| record(match_id, Some(party_id), p, team_id, mode)).collect()
}

pub fn instance(match_id: MatchId, team_id: TeamId, mode: &str, players: &[PlayerId]) -> PartyInstance {
    let players: BTreeSet<PlayerId> = players.iter().copied().collect();

    PartyInstance {
        match_id,
        team_id,
        game_type: Some(mode.to_string()),
        is_ranked: Some(true),
        players: players.into_iter().collect(),
    }
}

pub fn graph_from_edges(edges: &[(PlayerId, PlayerId, u32)]) -> PartyGraph {
    let mut graph = PartyGraph::new();
    for &(a, b, w) in edges {
        graph.add_edge(a, b, w);
    }
    graph
}

pub fn set(ids: &[PlayerId]) -> Community {
    ids.iter().copied().collect()
}

pub fn match_table(results: &[(MatchId, Option<TeamId>)]) -> MatchWinLookup {
    let matches: Vec<MatchRecord> = results.iter()
        .map(|&(match_id, winning_team)| MatchRecord { match_id, winning_team, game_type: None, is_ranked: None })
        .collect();

    MatchWinLookup::from_matches(&matches)
}

// Random matches between two teams drawn from a fixed player pool. A few friend groups are
// favoured so the graph actually has dense spots. Same seed, same records.
pub fn random_party_records(seed: u64, matches: u64, pool: u64) -> Vec<ParticipationRecord> {
    let mut rng = StdRng::seed_from_u64(seed);
    let modes = ["Duel", "Small Team", "Large Team"];

    let friend_groups: Vec<Vec<PlayerId>> = (0..pool / 5)
        .map(|g| (g * 5..(g * 5 + 5).min(pool)).collect())
        .collect();

    let mut records = Vec::new();
    for match_id in 0..matches {
        let mode = modes[rng.random_range(0..modes.len())];

        let mut used = BTreeSet::new();
        for team_id in 0..2 {
            let group = &friend_groups[rng.random_range(0..friend_groups.len())];
            let party_size = rng.random_range(1..=group.len());
            let mut members: Vec<PlayerId> = group.choose_multiple(&mut rng, party_size).copied().collect();

            // Occasional stranger joining the party
            if rng.random_bool(0.2) {
                members.push(rng.random_range(0..pool));
            }
            members.retain(|p| used.insert(*p));

            let party = format!("party-{team_id}");
            for p in members {
                records.push(record(match_id, Some(&party), p, team_id as TeamId, mode));
            }

            // Solo queue filler on the same team
            let filler = rng.random_range(0..pool);
            if used.insert(filler) {
                records.push(record(match_id, None, filler, team_id as TeamId, mode));
            }
        }
    }

    records
}
