//! Output tree for finalized records.
//!
//! ```text
//! <session>/groups/group_{n}/                      group batch
//!     data.json  combined.png  result.png
//!     user_{id}_profile.png  user_{id}_team.png
//!     user_{id}/round_{r}/combined.png  result.png  character_{p}.png
//! <session>/01_tournament_64_player/group_{n}/     64-player
//!     data.json  player_{i}.json  player_{i}_profile.png  player_{i}_team.png
//!     player_{i}/round_{r}/combined.png  result.png  character_{p}.png
//! <session>/02_tournament_promotion/{STAGE}/group_{n}/data.json  battle_{i}.png
//! <session>/03_tournament_championship/{STAGE}/data.json  battle_{i}.png
//! <session>/04_tournament_replays/{STAGE}/[group_{n}/]data.json
//!     match_{i}/Round_{r}.mp4
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use image::RgbaImage;
use serde::Serialize;
use tracing::{debug, info};

use super::records::{Group, StageRecord, User};
use super::replay::ReplayRecord;
use super::runner::RecordSink;
use crate::error::Result;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputLayout {
    GroupBatch,
    Tournament64,
    Promotion,
    Championship,
    Replays,
}

impl OutputLayout {
    pub fn dir_name(&self) -> &'static str {
        match self {
            OutputLayout::GroupBatch => "groups",
            OutputLayout::Tournament64 => "01_tournament_64_player",
            OutputLayout::Promotion => "02_tournament_promotion",
            OutputLayout::Championship => "03_tournament_championship",
            OutputLayout::Replays => "04_tournament_replays",
        }
    }
}

/// Keeps user ids usable as file name parts.
pub fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "unknown".to_string()
    } else {
        cleaned
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(std::io::Error::from)?;
    fs::write(path, json)?;
    debug!("Wrote {}", path.display());
    Ok(())
}

fn write_image(path: &Path, image: Option<&RgbaImage>) -> Result<()> {
    if let Some(image) = image {
        image.save(path)?;
        debug!("Wrote {}", path.display());
    }
    Ok(())
}

pub struct OutputWriter {
    base: PathBuf,
    layout: OutputLayout,
}

impl OutputWriter {
    /// Writer rooted at `<session_dir>/<layout dir>`.
    pub fn new(session_dir: &Path, layout: OutputLayout) -> Result<Self> {
        let base = session_dir.join(layout.dir_name());
        fs::create_dir_all(&base)?;
        Ok(Self { base, layout })
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn write_group(&self, group: &Group) -> Result<PathBuf> {
        let dir = self.base.join(format!("group_{}", group.group_number));
        fs::create_dir_all(&dir)?;

        write_json(&dir.join("data.json"), group)?;
        write_image(&dir.join("combined.png"), group.combined_image.as_ref())?;
        write_image(&dir.join("result.png"), group.result_image.as_ref())?;

        for (i, user) in group.users.iter().enumerate() {
            match self.layout {
                OutputLayout::Tournament64 => {
                    let prefix = format!("player_{}", user.player_index.unwrap_or(i as u32 + 1));
                    write_json(&dir.join(format!("{}.json", prefix)), user)?;
                    self.write_user_images(&dir, &prefix, user)?;
                    self.write_rounds(&dir.join(&prefix), user)?;
                }
                _ => {
                    let prefix = format!("user_{}", sanitize(&user.user_id));
                    self.write_user_images(&dir, &prefix, user)?;
                    self.write_rounds(&dir.join(&prefix), user)?;
                }
            }
        }
        info!("Saved group {} data to {}", group.group_number, dir.display());
        Ok(dir)
    }

    fn write_user_images(&self, dir: &Path, prefix: &str, user: &User) -> Result<()> {
        write_image(
            &dir.join(format!("{}_profile.png", prefix)),
            user.profile_image.as_ref(),
        )?;
        write_image(
            &dir.join(format!("{}_team.png", prefix)),
            user.team_image.as_ref(),
        )
    }

    fn write_rounds(&self, dir: &Path, user: &User) -> Result<()> {
        for round in user.rounds.values() {
            let round_dir = dir.join(format!("round_{}", round.round_index));
            fs::create_dir_all(&round_dir)?;
            write_image(&round_dir.join("combined.png"), round.combined_image.as_ref())?;
            write_image(&round_dir.join("result.png"), round.result_image.as_ref())?;
            for character in &round.characters {
                write_image(
                    &round_dir.join(format!("character_{}.png", character.position)),
                    character.image.as_ref(),
                )?;
            }
        }
        Ok(())
    }

    pub fn write_stage(&self, record: &StageRecord) -> Result<PathBuf> {
        let mut dir = self.base.join(record.stage.dir_name());
        if let Some(group) = record.group_number {
            dir = dir.join(format!("group_{}", group));
        }
        fs::create_dir_all(&dir)?;

        write_json(&dir.join("data.json"), record)?;
        for (i, battle) in record.battles.iter().enumerate() {
            write_image(
                &dir.join(format!("battle_{}.png", i + 1)),
                battle.image.as_ref(),
            )?;
        }
        info!("Saved stage data to {}", dir.join("data.json").display());
        Ok(dir)
    }

    /// The videos are already in place; only the index is written.
    pub fn write_replay(&self, record: &ReplayRecord) -> Result<PathBuf> {
        let mut dir = self.base.join(record.stage.dir_name());
        if let Some(group) = record.group_number {
            dir = dir.join(format!("group_{}", group));
        }
        fs::create_dir_all(&dir)?;

        write_json(&dir.join("data.json"), record)?;
        info!("Saved replay index to {}", dir.join("data.json").display());
        Ok(dir)
    }
}

impl RecordSink<Group> for OutputWriter {
    fn persist(&mut self, record: &Group) -> Result<()> {
        self.write_group(record).map(|_| ())
    }
}

impl RecordSink<StageRecord> for OutputWriter {
    fn persist(&mut self, record: &StageRecord) -> Result<()> {
        self.write_stage(record).map(|_| ())
    }
}

impl RecordSink<ReplayRecord> for OutputWriter {
    fn persist(&mut self, record: &ReplayRecord) -> Result<()> {
        self.write_replay(record).map(|_| ())
    }
}
