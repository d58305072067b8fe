#![allow(dead_code)]

mod analysis;
mod attribution;
mod community;
mod consolidate;
mod data_loader;
mod error;
mod party_graph;
mod report;
mod roster_context;
mod roster_stats;
mod util;
#[cfg(test)]
mod test_support;

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use std::path::PathBuf;

use analysis::*;
use data_loader::*;
use report::*;
use roster_context::*;

/*
    Batch run over a full historical snapshot. Reads the tables prepared by the acquisition pipeline,
    writes one results document for the serving layer. Thresholds live in RosterContext, a JSON file
    can override any of them and the flags below override the file.
*/

#[derive(Debug, Parser)]
#[command(name = "core-rosters", version)]
#[command(about = "Detects premade core rosters from party match data and computes their statistics")]
struct Args {
    /// Directory holding match_players.csv, matches.csv and players_with_countries.csv
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Where to write the results document
    #[arg(long, default_value = "data/roster_analysis_results.json")]
    output: PathBuf,

    /// JSON file with analysis parameters (missing fields keep their defaults)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Shared parties needed before two players are connected
    #[arg(long)]
    min_connection: Option<u32>,

    /// Matches a roster needs to be reported
    #[arg(long)]
    min_team_matches: Option<usize>,

    #[arg(long)]
    min_roster_size: Option<usize>,

    #[arg(long)]
    max_roster_size: Option<usize>,

    /// How party instances are credited to rosters
    #[arg(long, value_enum)]
    attribution: Option<AttributionMode>,

    /// Skip the looser community search
    #[arg(long)]
    no_communities: bool,

    /// Rosters to print in the console summary
    #[arg(long, default_value_t = 5)]
    top: usize,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn roster_context(&self) -> Result<RosterContext> {
        let mut roster_context = match &self.config {
            Some(path) => RosterContext::from_file(path).context("loading analysis parameters")?,
            None => RosterContext::default(),
        };

        if let Some(v) = self.min_connection { roster_context.min_matches_for_connection = v; }
        if let Some(v) = self.min_team_matches { roster_context.min_team_matches = v; }
        if let Some(v) = self.min_roster_size { roster_context.min_roster_size = v; }
        if let Some(v) = self.max_roster_size { roster_context.max_roster_size = v; }
        if let Some(v) = self.attribution { roster_context.attribution_mode = v; }
        if self.no_communities { roster_context.detect_communities = false; }

        Ok(roster_context)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    let roster_context = args.roster_context()?;
    log::debug!("{roster_context:?}");

    let data = load_data(&args.data_dir)
        .with_context(|| format!("loading input tables from {}", args.data_dir.display()))?;

    let outcome = analyze_rosters(&data, &roster_context);
    let report = AnalysisReport::new(outcome, &roster_context);

    output_report(&report.rosters, args.top);

    write_report(&report, &args.output)
        .with_context(|| format!("saving results to {}", args.output.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config_defaults() {
        let args = Args::parse_from([
            "core-rosters",
            "--min-team-matches", "4",
            "--attribution", "overlapping",
            "--no-communities",
        ]);
        let roster_context = args.roster_context().unwrap();

        assert_eq!(roster_context.min_team_matches, 4);
        assert_eq!(roster_context.min_matches_for_connection, 5);
        assert_eq!(roster_context.attribution_mode, AttributionMode::Overlapping);
        assert!(!roster_context.detect_communities);
        assert_eq!(args.data_dir, PathBuf::from("data"));
    }
}
