//! Bracket stages: championship (8->4, 4->2, 2->1) and promotion
//! (64->32, 32->16, 16->8 per group).

use std::fmt;

use tracing::{debug, info};

use super::battle::collect_battle;
use super::layout::{battle_result, championship, promotion};
use super::navigator::{Navigator, StepResult};
use super::records::{timestamp_now, Battle, StageRecord, TournamentStage};
use super::runner::CollectorFormat;
use super::tournament_64::CHEER_IMAGE;
use crate::capture::{Point, Region};
use crate::error::CollectorError;

pub const CHAMPION_BUTTON: &str = "CHAMPION_BUTTON";
pub const BUTTON_16: &str = "BUTTON_16";
/// Optional anchor of the championship bracket screen.
pub const CHAMPIONSHIP_MARKER: &str = "CHAMPIONSHIP_BRACKET";

/// Button that opens the decisive battle of a later-round match.
#[derive(Clone, Copy)]
struct DecisiveButton {
    key: &'static str,
    region: Region,
    click: Point,
}

/// `None` when the catalog has no template for the button.
fn button_visible(nav: &mut Navigator, button: &DecisiveButton) -> StepResult<Option<bool>> {
    if !nav.catalog().contains(button.key) {
        return Ok(None);
    }
    Ok(Some(nav.is_present_in(button.key, button.region)?))
}

/// Every match of a first-round stage.
fn walk_all<T, F>(nav: &mut Navigator, positions: &[Point], read: &mut F) -> StepResult<Vec<T>>
where
    F: FnMut(&mut Navigator) -> StepResult<T>,
{
    let mut matches = Vec::with_capacity(positions.len());
    for (i, position) in positions.iter().enumerate() {
        debug!("Opening match {}", i + 1);
        nav.click(*position)?;
        matches.push(read(nav)?);
    }
    Ok(matches)
}

/// Every match, switching to the decisive battle where its button shows.
fn walk_decisive<T, F>(
    nav: &mut Navigator,
    positions: &[Point],
    button: DecisiveButton,
    read: &mut F,
) -> StepResult<Vec<T>>
where
    F: FnMut(&mut Navigator) -> StepResult<T>,
{
    let mut matches = Vec::with_capacity(positions.len());
    for position in positions {
        nav.click(*position)?;
        if button_visible(nav, &button)? == Some(true) {
            nav.click(button.click)?;
        }
        matches.push(read(nav)?);
    }
    Ok(matches)
}

/// The final: only the match carrying the button is the deciding one, the
/// other is closed unread.
fn walk_final<T, F>(
    nav: &mut Navigator,
    positions: &[Point],
    button: DecisiveButton,
    open_with_button: bool,
    read: &mut F,
) -> StepResult<Vec<T>>
where
    F: FnMut(&mut Navigator) -> StepResult<T>,
{
    for (i, position) in positions.iter().enumerate() {
        nav.click(*position)?;
        if button_visible(nav, &button)? == Some(false) {
            debug!("Match {} is not the final, closing", i + 1);
            nav.click(battle_result::CLOSE)?;
            continue;
        }
        if open_with_button {
            nav.click(button.click)?;
        }
        return Ok(vec![read(nav)?]);
    }
    Ok(Vec::new())
}

/// Opens every match of `stage` that counts and hands its battle result
/// screen to `read`, which must close it again.
pub fn walk_stage<T, F>(nav: &mut Navigator, stage: TournamentStage, read: &mut F) -> StepResult<Vec<T>>
where
    F: FnMut(&mut Navigator) -> StepResult<T>,
{
    let semi_final: Vec<Point> = (1..=2).map(championship::stage_4_2_position).collect();
    let later: Vec<Point> = (1..=2).map(promotion::stage_32_16_position).collect();
    match stage {
        TournamentStage::Stage8To4 => {
            let positions: Vec<Point> = (1..=4).map(championship::stage_8_4_position).collect();
            walk_all(nav, &positions, read)
        }
        TournamentStage::Stage4To2 => {
            walk_decisive(nav, &semi_final, ChampionshipFormat::BUTTON, read)
        }
        TournamentStage::Stage2To1 => {
            walk_final(nav, &semi_final, ChampionshipFormat::BUTTON, false, read)
        }
        TournamentStage::Stage64To32 => {
            let positions: Vec<Point> = (1..=4).map(promotion::stage_64_32_position).collect();
            walk_all(nav, &positions, read)
        }
        TournamentStage::Stage32To16 => walk_decisive(
            nav,
            &later,
            PromotionFormat::button(battle_result::STAGE_32_16),
            read,
        ),
        TournamentStage::Stage16To8 => walk_final(
            nav,
            &later,
            PromotionFormat::button(battle_result::STAGE_16_8),
            true,
            read,
        ),
    }
}

/// Opens a promotion group's tab, or confirms the championship bracket.
pub fn enter_bracket(nav: &mut Navigator, group: Option<u32>) -> StepResult<()> {
    match group {
        Some(group) => {
            nav.click(promotion::group_button(group))?;
            nav.confirm(CHEER_IMAGE)
        }
        None => nav.confirm(CHAMPIONSHIP_MARKER),
    }
}

fn stage_record(stage: TournamentStage, group: Option<u32>, battles: Vec<Battle>) -> StageRecord {
    info!("Collected {} battles for {}", battles.len(), stage);
    StageRecord {
        stage,
        group_number: group,
        battles,
        timestamp: timestamp_now(),
    }
}

pub struct ChampionshipFormat;

impl ChampionshipFormat {
    const BUTTON: DecisiveButton = DecisiveButton {
        key: CHAMPION_BUTTON,
        region: championship::CHAMPION_BUTTON_REGION,
        click: championship::STAGE_4_2_BUTTON,
    };
}

impl CollectorFormat for ChampionshipFormat {
    type Node = TournamentStage;
    type Record = StageRecord;

    fn name(&self) -> &'static str {
        "championship"
    }

    fn default_nodes(&self) -> Vec<TournamentStage> {
        TournamentStage::CHAMPIONSHIP.to_vec()
    }

    fn validate(&self, stage: &TournamentStage) -> Result<(), CollectorError> {
        if TournamentStage::CHAMPIONSHIP.contains(stage) {
            Ok(())
        } else {
            Err(CollectorError::InvalidStage(stage.to_string()))
        }
    }

    fn locate_entry(&mut self, nav: &mut Navigator, _stage: &TournamentStage) -> StepResult<()> {
        enter_bracket(nav, None)
    }

    fn collect(&mut self, nav: &mut Navigator, stage: &TournamentStage) -> StepResult<StageRecord> {
        let battles = walk_stage(nav, *stage, &mut collect_battle)?;
        Ok(stage_record(*stage, None, battles))
    }

    fn return_to_list(&mut self, nav: &mut Navigator, _stage: &TournamentStage) -> StepResult<()> {
        nav.checkpoint()
    }

    fn recover(&mut self, nav: &mut Navigator, _stage: &TournamentStage) -> StepResult<()> {
        nav.click(battle_result::CLOSE)
    }

    fn abandon_entry(&mut self, nav: &mut Navigator, _stage: &TournamentStage) -> StepResult<()> {
        nav.checkpoint()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PromotionNode {
    pub stage: TournamentStage,
    pub group: u32,
}

impl fmt::Display for PromotionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group {} {}", self.group, self.stage)
    }
}

pub struct PromotionFormat;

impl PromotionFormat {
    /// Nodes for the given stages of the given groups, group by group.
    pub fn nodes(stages: &[TournamentStage], groups: &[u32]) -> Vec<PromotionNode> {
        let stages = if stages.is_empty() {
            TournamentStage::PROMOTION.to_vec()
        } else {
            stages.to_vec()
        };
        let groups: Vec<u32> = if groups.is_empty() {
            (1..=promotion::GROUPS).collect()
        } else {
            groups.to_vec()
        };

        groups
            .iter()
            .flat_map(|group| {
                stages.iter().map(move |stage| PromotionNode {
                    stage: *stage,
                    group: *group,
                })
            })
            .collect()
    }

    fn button(click: Point) -> DecisiveButton {
        DecisiveButton {
            key: BUTTON_16,
            region: promotion::BUTTON_16_REGION,
            click,
        }
    }
}

impl CollectorFormat for PromotionFormat {
    type Node = PromotionNode;
    type Record = StageRecord;

    fn name(&self) -> &'static str {
        "promotion"
    }

    fn default_nodes(&self) -> Vec<PromotionNode> {
        Self::nodes(&[], &[])
    }

    fn validate(&self, node: &PromotionNode) -> Result<(), CollectorError> {
        if !node.stage.is_promotion() {
            return Err(CollectorError::InvalidStage(node.stage.to_string()));
        }
        if !(1..=promotion::GROUPS).contains(&node.group) {
            return Err(CollectorError::InvalidGroupNumber {
                number: node.group,
                max: promotion::GROUPS,
            });
        }
        Ok(())
    }

    fn locate_entry(&mut self, nav: &mut Navigator, node: &PromotionNode) -> StepResult<()> {
        enter_bracket(nav, Some(node.group))
    }

    fn collect(&mut self, nav: &mut Navigator, node: &PromotionNode) -> StepResult<StageRecord> {
        let battles = walk_stage(nav, node.stage, &mut collect_battle)?;
        Ok(stage_record(node.stage, Some(node.group), battles))
    }

    fn return_to_list(&mut self, nav: &mut Navigator, _node: &PromotionNode) -> StepResult<()> {
        nav.checkpoint()
    }

    fn recover(&mut self, nav: &mut Navigator, _node: &PromotionNode) -> StepResult<()> {
        nav.click(battle_result::CLOSE)
    }

    /// No battle screen is open yet when the group tab fails to load.
    fn abandon_entry(&mut self, nav: &mut Navigator, _node: &PromotionNode) -> StepResult<()> {
        nav.checkpoint()
    }
}
