use log::info;
use serde::de::DeserializeOwned;
use serde::*;
use serde_aux::field_attributes::{deserialize_number_from_string, deserialize_option_number_from_string};
use std::collections::HashMap;
use std::path::Path;

use crate::error::AnalysisError;

pub type PlayerId = u64;
pub type MatchId = u64;
pub type TeamId = i64;

pub const PARTICIPATION_TABLE: &str = "match_players.csv";
pub const MATCH_TABLE: &str = "matches.csv";
pub const PLAYER_TABLE: &str = "players_with_countries.csv";

pub const UNKNOWN_COUNTRY: &str = "Unknown";

// Everything the engine needs from the acquisition pipeline, loaded fully into memory up front.
#[derive(Debug)]
pub struct AnalysisData {
    pub participation: Vec<ParticipationRecord>,
    pub wins: MatchWinLookup,
    pub players: PlayerDirectory,
}

// Loads the three input tables from data_dir. All of them have to exist before anything is read,
// a missing table aborts the run.
// Participation rows without a mode or ranked flag borrow them from the match table, the same way
// the acquisition pipeline merges them.
pub fn load_data(data_dir: &Path) -> Result<AnalysisData, AnalysisError> {
    let participation_path = data_dir.join(PARTICIPATION_TABLE);
    let match_path = data_dir.join(MATCH_TABLE);
    let player_path = data_dir.join(PLAYER_TABLE);

    for path in [&participation_path, &match_path, &player_path] {
        if !path.is_file() {
            return Err(AnalysisError::MissingInput { path: path.clone() });
        }
    }

    let mut participation: Vec<ParticipationRecord> = read_table(&participation_path)?;
    let matches: Vec<MatchRecord> = read_table(&match_path)?;
    let players: Vec<PlayerRecord> = read_table(&player_path)?;

    // First row per match id wins, later duplicates are ignored
    let mut match_index: HashMap<MatchId, &MatchRecord> = HashMap::new();
    for m in &matches {
        match_index.entry(m.match_id).or_insert(m);
    }

    for row in &mut participation {
        let Some(m) = match_index.get(&row.match_id) else { continue; };

        if row.game_type.is_none() {
            row.game_type = m.game_type.clone();
        }
        if row.is_ranked.is_none() {
            row.is_ranked = m.is_ranked;
        }
    }

    let wins = MatchWinLookup::from_matches(&matches);
    let players = PlayerDirectory::from_records(players);

    info!("Loaded {} player-match records, {} matches, {} players.",
        participation.len(),
        wins.len(),
        players.len(),
    );

    Ok(AnalysisData { participation, wins, players })
}

fn read_table<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, AnalysisError> {
    let csv_error = |source| AnalysisError::Csv { path: path.to_path_buf(), source };

    let mut reader = csv::Reader::from_path(path).map_err(csv_error)?;
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row.map_err(csv_error)?);
    }

    Ok(rows)
}

#[derive(Deserialize, Debug, Clone)]
pub struct ParticipationRecord {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub match_id: MatchId,
    // Rows without a party id weren't queued together and never enter the graph
    #[serde(default)]
    pub party_id: Option<String>,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub user_id: PlayerId,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub team_id: TeamId,
    #[serde(default)]
    pub game_type: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_flag")]
    pub is_ranked: Option<bool>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct MatchRecord {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub match_id: MatchId,
    #[serde(default, deserialize_with = "deserialize_option_number_from_string")]
    pub winning_team: Option<TeamId>,
    #[serde(default)]
    pub game_type: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_flag")]
    pub is_ranked: Option<bool>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct PlayerRecord {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub user_id: PlayerId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename(deserialize = "countryCode"), default)]
    pub country_code: Option<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Player {
    pub user_id: PlayerId,
    pub name: String,
    pub country: String,
}

impl Player {
    pub fn placeholder(user_id: PlayerId) -> Self {
        Self {
            user_id,
            name: placeholder_name(user_id),
            country: UNKNOWN_COUNTRY.to_string(),
        }
    }
}

pub fn placeholder_name(user_id: PlayerId) -> String {
    format!("Player_{user_id}")
}

// Read-only player identity lookup. Unknown ids get deterministic placeholders rather than failing
#[derive(Debug, Default)]
pub struct PlayerDirectory {
    players: HashMap<PlayerId, Player>,
}

impl PlayerDirectory {
    pub fn from_records(records: Vec<PlayerRecord>) -> Self {
        let mut players = HashMap::new();

        for r in records {
            let name = r.name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| placeholder_name(r.user_id));
            let country = r.country_code
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_COUNTRY.to_string());

            players.entry(r.user_id).or_insert(Player { user_id: r.user_id, name, country });
        }

        Self { players }
    }

    pub fn player(&self, user_id: PlayerId) -> Player {
        self.players.get(&user_id).cloned().unwrap_or_else(|| Player::placeholder(user_id))
    }

    pub fn name(&self, user_id: PlayerId) -> String {
        match self.players.get(&user_id) {
            Some(p) => p.name.clone(),
            None => placeholder_name(user_id),
        }
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }
}

// Match id to winning team id. Matches without a usable winner are simply absent, which makes them undecided
#[derive(Debug, Default)]
pub struct MatchWinLookup {
    winners: HashMap<MatchId, Option<TeamId>>,
}

impl MatchWinLookup {
    pub fn from_matches(matches: &[MatchRecord]) -> Self {
        let mut winners = HashMap::new();
        for m in matches {
            // Negative team ids are the export's marker for "no winner"
            winners.entry(m.match_id).or_insert(m.winning_team.filter(|w| *w >= 0));
        }

        Self { winners }
    }

    pub fn winner(&self, match_id: MatchId) -> Option<TeamId> {
        self.winners.get(&match_id).copied().flatten()
    }

    pub fn len(&self) -> usize {
        self.winners.len()
    }
}

// Accepts true/false in any case, 0/1 and empty cells. Anything unreadable counts as missing
fn deserialize_optional_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error> where
    D: Deserializer<'de> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
        Float(f64),
        Text(String),
    }

    Ok(match Option::<Flag>::deserialize(deserializer)? {
        None => None,
        Some(Flag::Bool(b)) => Some(b),
        Some(Flag::Int(i)) => Some(i != 0),
        Some(Flag::Float(f)) => Some(f != 0.0),
        Some(Flag::Text(s)) => match s.trim().to_lowercase().as_str() {
            "true" | "t" | "yes" => Some(true),
            "false" | "f" | "no" => Some(false),
            _ => None,
        },
    })
}
