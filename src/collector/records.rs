//! Tournament records built by the collectors.
//!
//! Images stay in memory and are persisted as PNG files by the writer; the
//! JSON form carries only the structured data.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::Local;
use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::error::CollectorError;

pub fn timestamp_now() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// One character slot of a round lineup.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Character {
    /// Slot index, 1..=5
    pub position: u32,
    /// `None` until an icon matched or the naming step filled it in
    pub name: Option<String>,
    #[serde(skip)]
    pub image: Option<RgbaImage>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Round {
    pub round_index: u8,
    pub characters: Vec<Character>,
    #[serde(skip)]
    pub combined_image: Option<RgbaImage>,
    #[serde(skip)]
    pub result_image: Option<RgbaImage>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_index: Option<u32>,
    pub rounds: BTreeMap<u8, Round>,
    #[serde(skip)]
    pub profile_image: Option<RgbaImage>,
    #[serde(skip)]
    pub team_image: Option<RgbaImage>,
}

impl User {
    pub fn add_round(&mut self, round: Round) {
        self.rounds.insert(round.round_index, round);
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Group {
    pub group_number: u32,
    pub users: Vec<User>,
    pub timestamp: String,
    #[serde(skip)]
    pub combined_image: Option<RgbaImage>,
    #[serde(skip)]
    pub result_image: Option<RgbaImage>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BattleResult {
    Victory,
    Defeat,
    Unknown,
}

/// One bracket match, results from the left player's side.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Battle {
    pub left_user_id: String,
    pub right_user_id: String,
    pub results: Vec<BattleResult>,
    #[serde(skip)]
    pub image: Option<RgbaImage>,
}

impl Battle {
    /// Left player's wins minus losses; `Unknown` rounds count as neither.
    pub fn score(&self) -> (usize, usize) {
        let wins = self.results.iter().filter(|r| **r == BattleResult::Victory).count();
        let losses = self.results.iter().filter(|r| **r == BattleResult::Defeat).count();
        (wins, losses)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TournamentStage {
    #[serde(rename = "64->32")]
    Stage64To32,
    #[serde(rename = "32->16")]
    Stage32To16,
    #[serde(rename = "16->8")]
    Stage16To8,
    #[serde(rename = "8->4")]
    Stage8To4,
    #[serde(rename = "4->2")]
    Stage4To2,
    #[serde(rename = "2->1")]
    Stage2To1,
}

impl TournamentStage {
    pub const PROMOTION: [TournamentStage; 3] = [
        TournamentStage::Stage64To32,
        TournamentStage::Stage32To16,
        TournamentStage::Stage16To8,
    ];
    pub const CHAMPIONSHIP: [TournamentStage; 3] = [
        TournamentStage::Stage8To4,
        TournamentStage::Stage4To2,
        TournamentStage::Stage2To1,
    ];

    pub fn is_promotion(&self) -> bool {
        Self::PROMOTION.contains(self)
    }

    /// Directory-safe name, e.g. `STAGE_8_4`.
    pub fn dir_name(&self) -> &'static str {
        match self {
            TournamentStage::Stage64To32 => "STAGE_64_32",
            TournamentStage::Stage32To16 => "STAGE_32_16",
            TournamentStage::Stage16To8 => "STAGE_16_8",
            TournamentStage::Stage8To4 => "STAGE_8_4",
            TournamentStage::Stage4To2 => "STAGE_4_2",
            TournamentStage::Stage2To1 => "STAGE_2_1",
        }
    }

    fn bounds(&self) -> (u32, u32) {
        match self {
            TournamentStage::Stage64To32 => (64, 32),
            TournamentStage::Stage32To16 => (32, 16),
            TournamentStage::Stage16To8 => (16, 8),
            TournamentStage::Stage8To4 => (8, 4),
            TournamentStage::Stage4To2 => (4, 2),
            TournamentStage::Stage2To1 => (2, 1),
        }
    }
}

impl fmt::Display for TournamentStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (from, to) = self.bounds();
        write!(f, "{}->{}", from, to)
    }
}

impl FromStr for TournamentStage {
    type Err = CollectorError;

    /// Accepts `8->4`, `8-4`, `8_4` and `STAGE_8_4`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let body = trimmed
            .strip_prefix("STAGE_")
            .or_else(|| trimmed.strip_prefix("stage_"))
            .unwrap_or(trimmed);
        let normalized = body.replace("->", "_").replace('-', "_");
        let all = TournamentStage::PROMOTION
            .iter()
            .chain(TournamentStage::CHAMPIONSHIP.iter());
        for stage in all {
            let (from, to) = stage.bounds();
            if normalized == format!("{}_{}", from, to) {
                return Ok(*stage);
            }
        }
        Err(CollectorError::InvalidStage(s.to_string()))
    }
}

/// Battles of one bracket stage (and group, for promotion stages).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: TournamentStage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_number: Option<u32>,
    pub battles: Vec<Battle>,
    pub timestamp: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_parsing() {
        assert_eq!("8->4".parse::<TournamentStage>().unwrap(), TournamentStage::Stage8To4);
        assert_eq!("64-32".parse::<TournamentStage>().unwrap(), TournamentStage::Stage64To32);
        assert_eq!("STAGE_2_1".parse::<TournamentStage>().unwrap(), TournamentStage::Stage2To1);
        assert!("8->2".parse::<TournamentStage>().is_err());
        assert_eq!(TournamentStage::Stage32To16.to_string(), "32->16");
    }

    #[test]
    fn test_json_skips_images() {
        let mut user = User {
            user_id: "123".into(),
            profile_image: Some(RgbaImage::new(2, 2)),
            ..User::default()
        };
        user.add_round(Round {
            round_index: 1,
            characters: vec![Character {
                position: 1,
                name: None,
                image: Some(RgbaImage::new(1, 1)),
            }],
            ..Round::default()
        });

        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["user_id"], "123");
        assert!(json.get("profile_image").is_none());
        assert!(json.get("group_number").is_none());
        assert_eq!(json["rounds"]["1"]["characters"][0]["name"], serde_json::Value::Null);
    }

    #[test]
    fn test_stage_record_serializes_stage_label() {
        let record = StageRecord {
            stage: TournamentStage::Stage4To2,
            group_number: None,
            battles: vec![Battle {
                left_user_id: "a".into(),
                right_user_id: "b".into(),
                results: vec![BattleResult::Victory, BattleResult::Defeat, BattleResult::Victory],
                image: None,
            }],
            timestamp: timestamp_now(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["stage"], "4->2");
        assert_eq!(json["battles"][0]["results"][1], "Defeat");
        assert_eq!(record.battles[0].score(), (2, 1));
    }
}
