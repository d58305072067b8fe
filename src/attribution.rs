use log::info;
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

use crate::community::Community;
use crate::data_loader::{MatchId, PlayerId};
use crate::party_graph::PartyInstance;
use crate::roster_context::{AttributionMode, RosterContext};

// Inverted index: player id -> positions in the party instance list, ascending.
// Built once so per-roster lookups never rescan the whole list.
pub type PartyIndex = BTreeMap<PlayerId, Vec<usize>>;

pub fn build_party_index(instances: &[PartyInstance]) -> PartyIndex {
    let mut index = PartyIndex::new();
    for (idx, party) in instances.iter().enumerate() {
        for &p in &party.players {
            index.entry(p).or_default().push(idx);
        }
    }
    index
}

// Party instances (positions) credited to each roster, at most one per match, same order as rosters.
pub fn attribute_matches(rosters: &[Community], instances: &[PartyInstance], index: &PartyIndex, roster_context: &RosterContext) -> Vec<Vec<usize>> {
    let assigned = match roster_context.attribution_mode {
        AttributionMode::Exclusive => attribute_exclusive(rosters, instances, index, roster_context),
        AttributionMode::Overlapping => attribute_overlapping(rosters, instances, index, roster_context),
    };

    let credited: usize = assigned.iter().map(Vec::len).sum();
    info!("Credited {} party instances across {} rosters ({:?} attribution).", credited, rosters.len(), roster_context.attribution_mode);

    assigned
}

// Every match goes to at most one roster, through one of its party instances: the pairing with the
// highest share of the instance's players, then the most members present, then the earliest instance and
// roster. It needs min_members_present members and a share of at least min_attribution_share, otherwise
// nobody gets the match. This is what stops a player sitting in two rosters, or a roster split over two
// parties, from counting the same game twice.
pub fn attribute_exclusive(rosters: &[Community], instances: &[PartyInstance], index: &PartyIndex, roster_context: &RosterContext) -> Vec<Vec<usize>> {
    let mut member_of: BTreeMap<PlayerId, Vec<usize>> = BTreeMap::new();
    for (r, roster) in rosters.iter().enumerate() {
        for &p in roster {
            member_of.entry(p).or_default().push(r);
        }
    }

    let mut touched: BTreeMap<MatchId, BTreeSet<usize>> = BTreeMap::new();
    for idx in member_of.keys().filter_map(|p| index.get(p)).flatten() {
        touched.entry(instances[*idx].match_id).or_default().insert(*idx);
    }

    let mut assigned = vec![Vec::new(); rosters.len()];
    for parties in touched.values() {
        // (roster, instance, share, count)
        let mut best: Option<(usize, usize, f64, usize)> = None;

        for &idx in parties {
            let party = &instances[idx];

            let mut present: BTreeMap<usize, usize> = BTreeMap::new();
            for p in &party.players {
                for &r in member_of.get(p).into_iter().flatten() {
                    *present.entry(r).or_insert(0) += 1;
                }
            }

            for (r, count) in present {
                if count < roster_context.min_members_present { continue; }

                let share = count as f64 / party.players.len() as f64;
                let better = match best {
                    None => true,
                    Some((_, _, best_share, best_count)) => share > best_share || (share == best_share && count > best_count),
                };
                if better {
                    best = Some((r, idx, share, count));
                }
            }
        }

        if let Some((r, idx, share, _)) = best {
            if share >= roster_context.min_attribution_share {
                assigned[r].push(idx);
            }
        }
    }

    assigned
}

// Earlier counting rule: each roster independently takes every instance with enough of its members,
// so overlapping rosters can share games.
pub fn attribute_overlapping(rosters: &[Community], instances: &[PartyInstance], index: &PartyIndex, roster_context: &RosterContext) -> Vec<Vec<usize>> {
    rosters.par_iter()
        .map(|roster| {
            let relevant: BTreeSet<usize> = roster.iter()
                .filter_map(|p| index.get(p))
                .flatten()
                .copied()
                .collect();

            // First qualifying instance per match, so a split roster still counts the game once
            let mut credited: BTreeSet<MatchId> = BTreeSet::new();
            relevant.into_iter()
                .filter(|&idx| {
                    let party = &instances[idx];
                    let present = party.players.iter().filter(|&&p| roster.contains(&p)).count();
                    present >= roster_context.min_members_present && credited.insert(party.match_id)
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;

    #[test]
    fn index_lists_positions_per_player() {
        let instances = vec![instance(1, 0, "Duel", &[1, 2]), instance(2, 0, "Duel", &[2, 3])];
        let index = build_party_index(&instances);

        assert_eq!(index[&1], vec![0]);
        assert_eq!(index[&2], vec![0, 1]);
        assert_eq!(index[&3], vec![1]);
    }

    #[test]
    fn higher_share_wins_the_match() {
        // R1 has two of four players, R2 only one
        let instances = vec![instance(1, 0, "Large Team", &[1, 2, 3, 4])];
        let rosters = vec![set(&[1, 2, 10]), set(&[3, 11, 12])];
        let index = build_party_index(&instances);

        let assigned = attribute_exclusive(&rosters, &instances, &index, &RosterContext::default());

        assert_eq!(assigned, vec![vec![0], vec![]]);
    }

    #[test]
    fn share_ties_go_to_larger_count_then_earlier_roster() {
        let instances = vec![
            instance(1, 0, "Large Team", &[1, 2, 3, 4, 5, 6]),
            instance(2, 0, "Duel", &[1, 2, 3, 4]),
        ];
        let rosters = vec![set(&[1, 2]), set(&[3, 4]), set(&[4, 5, 6])];
        let index = build_party_index(&instances);

        let assigned = attribute_exclusive(&rosters, &instances, &index, &RosterContext::default());

        // Match 1: 2/6, 2/6 (4 is also in R3), 3/6 -> R3. Match 2: 2/4 vs 2/4 -> R1
        assert_eq!(assigned, vec![vec![1], vec![], vec![0]]);
    }

    #[test]
    fn low_share_is_left_unassigned() {
        let instances = vec![instance(1, 0, "Large Team", &[1, 2, 3, 4, 5, 6, 7, 8])];
        let rosters = vec![set(&[1, 2])];
        let index = build_party_index(&instances);

        let assigned = attribute_exclusive(&rosters, &instances, &index, &RosterContext::default());
        assert_eq!(assigned, vec![Vec::<usize>::new()]);
    }

    #[test]
    fn overlapping_mode_counts_for_everyone() {
        let instances = vec![instance(1, 0, "Large Team", &[1, 2, 3, 4])];
        let rosters = vec![set(&[1, 2]), set(&[2, 3]), set(&[4, 9])];
        let index = build_party_index(&instances);

        let mut roster_context = RosterContext::default();
        roster_context.attribution_mode = AttributionMode::Overlapping;

        let assigned = attribute_matches(&rosters, &instances, &index, &roster_context);
        assert_eq!(assigned, vec![vec![0], vec![0], vec![]]);
    }

    #[test]
    fn exclusive_sets_are_disjoint() {
        let records = random_party_records(21, 800, 35);
        let instances = crate::party_graph::party_instances(&records);
        let index = build_party_index(&instances);

        let rosters: Vec<Community> = (0..7u64)
            .map(|g| (g * 5..g * 5 + 5).chain([(g * 5 + 7) % 35]).collect())
            .collect();

        let assigned = attribute_exclusive(&rosters, &instances, &index, &RosterContext::default());

        let mut seen = BTreeSet::new();
        for idx in assigned.iter().flatten() {
            let match_id = instances[*idx].match_id;
            assert!(seen.insert(match_id), "match {match_id} credited twice");
        }
        assert!(assigned.iter().any(|a| !a.is_empty()));
    }

    #[test]
    fn split_roster_counts_the_game_once() {
        // One match: the roster queued as two parties on team 0, the other roster on team 1
        let instances = vec![
            instance(1, 0, "Large Team", &[1, 2]),
            instance(1, 0, "Large Team", &[3, 4]),
            instance(1, 1, "Large Team", &[5, 6]),
        ];
        let rosters = vec![set(&[1, 2, 3, 4]), set(&[5, 6])];
        let index = build_party_index(&instances);

        let assigned = attribute_exclusive(&rosters, &instances, &index, &RosterContext::default());
        assert_eq!(assigned, vec![vec![0], vec![]]);

        let mut roster_context = RosterContext::default();
        roster_context.attribution_mode = AttributionMode::Overlapping;
        let overlapping = attribute_matches(&rosters, &instances, &index, &roster_context);
        assert_eq!(overlapping, vec![vec![0], vec![2]]);
    }

    #[test]
    fn best_party_of_a_match_decides() {
        // R2 fills its whole party, R1 only half of the first one
        let instances = vec![
            instance(1, 0, "Large Team", &[1, 2, 3, 4]),
            instance(1, 1, "Large Team", &[7, 8]),
        ];
        let rosters = vec![set(&[1, 2]), set(&[7, 8])];
        let index = build_party_index(&instances);

        let assigned = attribute_exclusive(&rosters, &instances, &index, &RosterContext::default());
        assert_eq!(assigned, vec![vec![], vec![1]]);
    }
}
