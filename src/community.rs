use log::{debug, info};
use petgraph::algo::tarjan_scc;
use rayon::prelude::*;
use std::collections::BTreeSet;

use crate::consolidate::consolidate_by_overlap;
use crate::data_loader::PlayerId;
use crate::party_graph::*;
use crate::roster_context::{DetectionParams, ExtensionPool};
use crate::util::overlap_ratio;

// A candidate group of players. Ordered so every traversal goes by ascending player id
pub type Community = BTreeSet<PlayerId>;

// Finds overlapping player groups in the graph:
//  1. local communities around every hub node (ego expansion)
//  2. connected components of the strong-edge subgraph
//  3. novelty filter, dropping candidates that mostly repeat an accepted one
//  4. consolidation of near-identical groups found from different hubs
// Heuristic and local, there's no optimality here. Small overlaps between results are allowed on purpose
// so a player can sit in two neighbouring circles.
pub fn detect_communities(graph: &PartyGraph, params: &DetectionParams) -> Vec<Community> {
    let hubs = find_hubs(graph, params);
    info!("Analyzing {} hub nodes for local communities...", hubs.len());

    // Each hub is independent. Collecting keeps hub order, so the result doesn't depend on scheduling
    let ego: Vec<Vec<Community>> = hubs.par_iter()
        .map(|&hub| ego_communities(graph, hub, params))
        .collect();

    let mut candidates: Vec<Community> = ego.into_iter().flatten().collect();
    candidates.extend(weight_components(graph, params));

    let novel = filter_novel(candidates, params);
    info!("Found {} distinct overlapping communities.", novel.len());

    let consolidated = consolidate_by_overlap(novel, params.consolidation_overlap);
    info!("Final count after consolidation: {} communities.", consolidated.len());

    consolidated
}

pub fn find_hubs(graph: &PartyGraph, params: &DetectionParams) -> Vec<PlayerId> {
    sorted_nodes(graph).into_iter()
        .filter(|&n| graph.neighbors(n).count() >= params.hub_min_degree && strength(graph, n) >= params.hub_min_strength)
        .collect()
}

// Communities that include the hub. Strong and medium neighbours are clustered by their mutual links,
// each cluster plus the hub becomes a candidate, then it picks up leftover neighbours tied into the cluster.
pub fn ego_communities(graph: &PartyGraph, hub: PlayerId, params: &DetectionParams) -> Vec<Community> {
    let mut strong = Vec::new();
    let mut medium = Vec::new();

    for n in sorted_neighbors(graph, hub) {
        let Some(w) = edge_weight(graph, hub, n) else { continue; };

        if w >= params.strong_edge_weight {
            strong.push(n);
        } else if w >= params.medium_edge_weight {
            medium.push(n);
        }
    }

    if strong.len() < params.min_strong_neighbors {
        return Vec::new();
    }

    let mut pool: Vec<PlayerId> = strong.iter().chain(&medium).copied().collect();
    pool.sort_unstable();

    let extension_pool = match params.extension_pool {
        ExtensionPool::MediumNeighbors => &medium,
        ExtensionPool::AllNeighbors => &pool,
    };

    let mut communities = Vec::new();
    for cluster in cluster_neighbors(graph, &pool, params.cluster_link_weight) {
        let mut community: Community = cluster.iter().copied().collect();
        community.insert(hub);

        for &candidate in extension_pool {
            if cluster.contains(&candidate) { continue; }
            if params.max_extended_size.is_some_and(|cap| community.len() >= cap) { break; }

            let links = cluster.iter()
                .filter(|&&member| has_link(graph, candidate, member, params.extension_link_weight))
                .count();

            if links >= params.extension_min_links {
                community.insert(candidate);
            }
        }

        if community.len() >= params.min_community_size {
            communities.push(community);
        }
    }

    communities
}

// Greedy grouping of a neighbour set. The smallest unclustered id seeds a cluster, which absorbs any other
// unclustered neighbour linked to one of its members by at least min_link_weight, until nothing changes.
// Only clusters of two or more are returned.
pub fn cluster_neighbors(graph: &PartyGraph, neighbors: &[PlayerId], min_link_weight: u32) -> Vec<Vec<PlayerId>> {
    let mut remaining: BTreeSet<PlayerId> = neighbors.iter().copied().collect();
    let mut clusters = Vec::new();

    while let Some(seed) = remaining.pop_first() {
        let mut cluster = vec![seed];

        loop {
            let absorbed: Vec<PlayerId> = remaining.iter()
                .copied()
                .filter(|&c| cluster.iter().any(|&m| has_link(graph, c, m, min_link_weight)))
                .collect();

            if absorbed.is_empty() { break; }

            for c in absorbed {
                remaining.remove(&c);
                cluster.push(c);
            }
        }

        if cluster.len() >= 2 {
            cluster.sort_unstable();
            clusters.push(cluster);
        }
    }

    clusters
}

// Connected components of the subgraph keeping only edges of at least strong_edge_weight
pub fn weight_components(graph: &PartyGraph, params: &DetectionParams) -> Vec<Community> {
    let mut strong_edges: Vec<(PlayerId, PlayerId, u32)> = graph.all_edges()
        .filter(|(_, _, w)| **w >= params.strong_edge_weight)
        .map(|(a, b, w)| (a.min(b), a.max(b), *w))
        .collect();
    strong_edges.sort_unstable();

    let strong_graph = PartyGraph::from_edges(strong_edges);

    let mut components: Vec<Community> = tarjan_scc(&strong_graph).into_iter()
        .map(|component| component.into_iter().collect::<Community>())
        .filter(|c| c.len() >= params.min_community_size)
        .filter(|c| params.max_component_size.is_none_or(|max| c.len() <= max))
        .collect();
    components.sort_unstable_by_key(|c| c.first().copied());

    components
}

// Accepts candidates in order, skipping those overlapping an already accepted group by more than
// novelty_overlap, and those outside the size bounds.
pub fn filter_novel(candidates: Vec<Community>, params: &DetectionParams) -> Vec<Community> {
    let mut accepted: Vec<Community> = Vec::new();

    for candidate in candidates {
        if candidate.len() < params.min_community_size { continue; }
        if params.max_candidate_size.is_some_and(|max| candidate.len() > max) { continue; }

        if let Some(existing) = accepted.iter().find(|a| overlap_ratio(a, &candidate) > params.novelty_overlap) {
            debug!("Dropped candidate of {} players, mostly covered by a group of {}", candidate.len(), existing.len());
            continue;
        }

        accepted.push(candidate);
    }

    accepted
}
