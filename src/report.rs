use chrono::Utc;
use log::info;
use serde::*;
use std::collections::BTreeMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::analysis::AnalysisOutcome;
use crate::community::Community;
use crate::data_loader::{Player, PlayerDirectory, PlayerId};
use crate::error::AnalysisError;
use crate::party_graph::PartyGraph;
use crate::roster_context::{AttributionMode, RosterContext};
use crate::roster_stats::{average_connection_strength, ModeStats, RosterStats};

// The one document a run produces. The serving layer reads these field names, keep them stable.
#[derive(Serialize, Debug)]
pub struct AnalysisReport {
    pub analysis_date: String,
    pub config: ReportConfig,
    pub summary: ReportSummary,
    pub rosters: Vec<RosterRecord>,
    pub communities: Vec<CommunityRecord>,
}

#[derive(Serialize, Debug)]
pub struct ReportConfig {
    pub min_matches_for_connection: u32,
    pub min_team_matches: usize,
    pub min_roster_size: usize,
    pub max_roster_size: usize,
    pub attribution_mode: AttributionMode,
}

#[derive(Serialize, Debug)]
pub struct ReportSummary {
    pub total_rosters_found: usize,
    pub total_communities_found: usize,
}

#[derive(Serialize, Debug, Clone)]
pub struct RosterRecord {
    pub roster_id: String,
    pub team_name: String,
    pub player_count: usize,
    pub roster: Vec<RosterMember>,
    pub stats_overall: ModeStats,
    pub stats_by_mode: BTreeMap<String, ModeStats>,
    pub avg_connection_strength: f64,
    pub most_common_lineups: Vec<LineupRecord>,
}

#[derive(Serialize, Debug, Clone)]
pub struct RosterMember {
    pub user_id: PlayerId,
    pub name: String,
    pub country: String,
    pub matches_played_with_team: usize,
    pub attendance_percent: f64,
}

#[derive(Serialize, Debug, Clone)]
pub struct LineupRecord {
    pub lineup_names: Vec<String>,
    pub count: usize,
}

#[derive(Serialize, Debug, Clone)]
pub struct CommunityRecord {
    pub community_id: String,
    pub community_name: String,
    pub player_count: usize,
    pub roster: Vec<Player>,
}

impl AnalysisReport {
    pub fn new(outcome: AnalysisOutcome, roster_context: &RosterContext) -> Self {
        Self {
            analysis_date: Utc::now().to_rfc3339(),
            config: ReportConfig {
                min_matches_for_connection: roster_context.min_matches_for_connection,
                min_team_matches: roster_context.min_team_matches,
                min_roster_size: roster_context.min_roster_size,
                max_roster_size: roster_context.max_roster_size,
                attribution_mode: roster_context.attribution_mode,
            },
            summary: ReportSummary {
                total_rosters_found: outcome.rosters.len(),
                total_communities_found: outcome.communities.len(),
            },
            rosters: outcome.rosters,
            communities: outcome.communities,
        }
    }
}

impl RosterRecord {
    // Members are listed by attendance, most regular first. The squad is named after that player.
    pub fn new(number: usize, roster: &Community, stats: &RosterStats, graph: &PartyGraph, players: &PlayerDirectory) -> Self {
        let mut members: Vec<RosterMember> = roster.iter()
            .map(|&id| {
                let player = players.player(id);
                RosterMember {
                    user_id: id,
                    name: player.name,
                    country: player.country,
                    matches_played_with_team: stats.matches_played(id),
                    attendance_percent: stats.attendance_percent(id),
                }
            })
            .collect();
        members.sort_by(|a, b| b.matches_played_with_team.cmp(&a.matches_played_with_team));

        let team_name = match members.first() {
            Some(top) => format!("{}'s Squad", top.name),
            None => format!("Roster {number}"),
        };

        let most_common_lineups = stats.lineups.iter()
            .map(|(lineup, count)| LineupRecord {
                lineup_names: lineup.iter().map(|&id| players.name(id)).collect(),
                count: *count,
            })
            .collect();

        Self {
            roster_id: format!("roster_{number}"),
            team_name,
            player_count: roster.len(),
            roster: members,
            stats_overall: stats.overall(),
            stats_by_mode: stats.stats_by_mode.clone(),
            avg_connection_strength: average_connection_strength(graph, roster),
            most_common_lineups,
        }
    }
}

impl CommunityRecord {
    pub fn new(number: usize, community: &Community, players: &PlayerDirectory) -> Self {
        let mut roster: Vec<Player> = community.iter().map(|&id| players.player(id)).collect();
        roster.sort_by(|a, b| a.name.cmp(&b.name));

        Self {
            community_id: format!("community_{number}"),
            community_name: format!("Community {number}"),
            player_count: community.len(),
            roster,
        }
    }
}

// Serializes everything first, then swaps the file into place, so a failed run never leaves half a document behind
pub fn write_report(report: &AnalysisReport, path: &Path) -> Result<(), AnalysisError> {
    let write_error = |source| AnalysisError::Write { path: path.to_path_buf(), source };

    let json = serde_json::to_vec_pretty(report)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_error)?;
    }

    let tmp_path = path.with_extension("json.tmp");
    {
        let mut writer = BufWriter::new(fs::File::create(&tmp_path).map_err(write_error)?);
        writer.write_all(&json).map_err(write_error)?;
        writer.flush().map_err(write_error)?;
    }
    fs::rename(&tmp_path, path).map_err(write_error)?;

    info!("Saved detailed results to {}.", path.display());
    Ok(())
}

pub fn output_report(rosters: &[RosterRecord], count: usize) {
    println!("=== Top {} Rosters Discovered ===", count.min(rosters.len()));

    for (i, r) in rosters.iter().take(count).enumerate() {
        let overall = &r.stats_overall;

        println!();
        println!("|{0:3}. | {1:30} | {2:4}W-{3:<4}L | {4:2} players | {5:5} matches",
            i + 1,
            r.team_name,
            overall.wins,
            overall.losses,
            r.player_count,
            overall.matches,
        );

        for p in &r.roster {
            println!("|      - {0:24} ({1:7}) | {2:5.1}% attendance ({3} games)",
                p.name,
                p.country,
                p.attendance_percent,
                p.matches_played_with_team,
            );
        }

        for (mode, stats) in &r.stats_by_mode {
            println!("|      * {0:24} | {1:4}W-{2:<4}L | {3:5} games | {4:5.1}% WR",
                mode,
                stats.wins,
                stats.losses,
                stats.matches,
                stats.win_rate * 100.0,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_loader::PlayerRecord;
    use crate::roster_stats::calculate_roster_stats;
    use crate::test_support::*;

    fn directory() -> PlayerDirectory {
        PlayerDirectory::from_records(vec![
            PlayerRecord { user_id: 1, name: Some("Zed".to_string()), country_code: Some("DE".to_string()) },
            PlayerRecord { user_id: 2, name: Some("Amy".to_string()), country_code: None },
        ])
    }

    #[test]
    fn roster_record_is_named_after_top_attendance() {
        let mut instances: Vec<_> = (0..6).map(|m| instance(m, 0, "Duel", &[1, 2])).collect();
        instances.push(instance(6, 0, "Duel", &[2, 3]));
        instances.push(instance(7, 0, "Duel", &[2, 3]));
        let assigned: Vec<usize> = (0..8).collect();

        let mut roster_context = RosterContext::default();
        roster_context.min_team_matches = 1;

        let roster = set(&[1, 2, 3]);
        let stats = calculate_roster_stats(&roster, &assigned, &instances, &match_table(&[]), &roster_context).unwrap();
        let graph = graph_from_edges(&[(1, 2, 6), (2, 3, 2)]);

        let record = RosterRecord::new(4, &roster, &stats, &graph, &directory());

        assert_eq!(record.roster_id, "roster_4");
        assert_eq!(record.team_name, "Amy's Squad");
        assert_eq!(record.player_count, 3);
        assert_eq!(record.roster[0].attendance_percent, 100.0);
        assert_eq!(record.roster[1].name, "Zed");
        assert_eq!(record.roster[1].attendance_percent, 75.0);
        assert_eq!(record.roster[2].name, "Player_3");
        assert_eq!(record.roster[2].country, "Unknown");
        assert_eq!(record.avg_connection_strength, 4.0);
        assert_eq!(record.most_common_lineups[0].lineup_names, vec!["Zed", "Amy"]);
        assert_eq!(record.most_common_lineups[0].count, 6);
    }

    #[test]
    fn community_members_sorted_by_name() {
        let record = CommunityRecord::new(2, &set(&[1, 2]), &directory());

        assert_eq!(record.community_id, "community_2");
        assert_eq!(record.community_name, "Community 2");
        assert_eq!(record.roster[0].name, "Amy");
        assert_eq!(record.roster[1].name, "Zed");
    }

    #[test]
    fn report_is_written_whole() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("roster_analysis_results.json");

        let outcome = AnalysisOutcome { rosters: Vec::new(), communities: vec![CommunityRecord::new(1, &set(&[1, 2]), &directory())] };
        let report = AnalysisReport::new(outcome, &RosterContext::default());
        write_report(&report, &path).unwrap();

        let written: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["summary"]["total_rosters_found"], 0);
        assert_eq!(written["summary"]["total_communities_found"], 1);
        assert_eq!(written["config"]["min_team_matches"], 10);
        assert_eq!(written["config"]["attribution_mode"], "exclusive");
        assert_eq!(written["communities"][0]["roster"][1]["country"], "DE");
        assert!(!path.with_extension("json.tmp").exists());
    }
}
