//! Hierarchical tournament collectors.
//!
//! This module provides:
//! - `Navigator`: click/capture/detect primitives at reference resolution
//! - `runner`: the state-machine driver shared by every format
//! - Formats: group batch, 64-player, championship and promotion brackets
//! - `replay`: per-round screen recordings of bracket matches
//! - `writer`: the JSON + PNG output tree

pub mod battle;
pub mod bracket;
pub mod clipboard;
pub mod group_batch;
pub mod imaging;
pub mod layout;
pub mod lineup;
pub mod navigator;
pub mod records;
pub mod replay;
pub mod runner;
pub mod state;
pub mod tournament_64;
pub mod writer;

pub use bracket::{ChampionshipFormat, PromotionFormat, PromotionNode};
pub use group_batch::GroupBatchFormat;
pub use navigator::{Navigator, Platform, StepError, StepResult};
pub use records::{
    Battle, BattleResult, Character, Group, Round, StageRecord, TournamentStage, User,
};
pub use replay::{ReplayFormat, ReplayNode, ReplayRecord};
pub use runner::{
    CollectionRun, CollectionRunner, CollectorFormat, RecordSink, RunOutcome, RunReport, SkipReason,
};
pub use state::{CancelToken, CollectorState};
pub use tournament_64::Tournament64Format;
pub use writer::{OutputLayout, OutputWriter};
