use log::{debug, info};

use crate::community::Community;
use crate::party_graph::{edge_weight, PartyGraph};
use crate::roster_context::RosterContext;
use crate::util::{jaccard_similarity, overlap_ratio};

// Merges communities whose overlap (shared / smaller size) reaches the threshold.
// Passes are repeated until one makes no merge, so no two returned communities still qualify.
pub fn consolidate_by_overlap(communities: Vec<Community>, overlap_threshold: f64) -> Vec<Community> {
    let before = communities.len();
    let consolidated = merge_to_fixed_point(communities, |acc, other| overlap_ratio(acc, other) >= overlap_threshold);

    info!("Consolidated {} communities into {} (overlap >= {:.0}%).", before, consolidated.len(), overlap_threshold * 100.0);
    consolidated
}

// Same as above with Jaccard similarity as the merge trigger. Used for the looser community output.
pub fn consolidate_by_similarity(communities: Vec<Community>, similarity_threshold: f64) -> Vec<Community> {
    let before = communities.len();
    let merged = merge_to_fixed_point(communities, |acc, other| jaccard_similarity(acc, other) >= similarity_threshold);

    info!("Merged {} communities into {} (similarity >= {:.0}%).", before, merged.len(), similarity_threshold * 100.0);
    merged
}

fn merge_to_fixed_point<F>(mut communities: Vec<Community>, should_merge: F) -> Vec<Community> where
    F: Fn(&Community, &Community) -> bool {
    loop {
        let count = communities.len();
        communities = merge_pass(communities, &should_merge);

        // A pass that merged anything returns fewer groups
        if communities.len() == count {
            return communities;
        }
    }
}

// One sweep in input order. Each unconsumed community seeds an accumulator that keeps folding in any
// unconsumed community meeting the predicate, rescanning until a full scan adds nothing.
fn merge_pass<F>(communities: Vec<Community>, should_merge: &F) -> Vec<Community> where
    F: Fn(&Community, &Community) -> bool {
    let mut consumed = vec![false; communities.len()];
    let mut merged = Vec::new();

    for i in 0..communities.len() {
        if consumed[i] { continue; }
        consumed[i] = true;

        let mut acc = communities[i].clone();
        let mut merges_made = true;
        while merges_made {
            merges_made = false;

            for (j, other) in communities.iter().enumerate() {
                if consumed[j] || !should_merge(&acc, other) { continue; }

                acc.extend(other.iter().copied());
                consumed[j] = true;
                merges_made = true;
                debug!("Merged community of {} players into group, new size {}", other.len(), acc.len());
            }
        }

        merged.push(acc);
    }

    merged
}

// Folds communities smaller than small_community_size into the large community they're most tied to.
// Tie strength is the summed edge weight between the groups divided by the small group's size, and has to
// exceed min_small_merge_strength. Small groups without a target stay if they meet the minimum roster size.
// Strength is measured against the large groups as they were before any merge.
pub fn merge_small_into_large(communities: Vec<Community>, graph: &PartyGraph, roster_context: &RosterContext) -> Vec<Community> {
    let (small, large): (Vec<Community>, Vec<Community>) = communities.into_iter()
        .partition(|c| c.len() < roster_context.small_community_size);

    info!("Found {} small communities and {} large communities.", small.len(), large.len());

    let mut merged = large.clone();
    for community in small {
        let mut best: Option<(usize, f64)> = None;

        for (idx, target) in large.iter().enumerate() {
            let strength = normalized_connection(graph, &community, target);
            if strength <= roster_context.min_small_merge_strength { continue; }

            if best.is_none_or(|(_, s)| strength > s) {
                best = Some((idx, strength));
            }
        }

        match best {
            Some((idx, strength)) => {
                debug!("Merged small community of {} players into community of {} (strength {:.1})",
                    community.len(), merged[idx].len(), strength);
                merged[idx].extend(community);
            }
            None => {
                if community.len() >= roster_context.min_roster_size {
                    merged.push(community);
                }
            }
        }
    }

    info!("After merging small communities: {} communities.", merged.len());
    merged
}

fn normalized_connection(graph: &PartyGraph, small: &Community, large: &Community) -> f64 {
    if small.is_empty() { return 0.0; }

    let mut total: u64 = 0;
    for &a in small {
        for &b in large {
            if a == b { continue; }
            total += edge_weight(graph, a, b).unwrap_or(0) as u64;
        }
    }

    total as f64 / small.len() as f64
}
