//! Battle replays: each round of a bracket match is replayed in the client
//! and screen-recorded on its own.
//!
//! ```text
//! <root>/{STAGE}/[group_{n}/]match_{i}/Round_{r}.mp4
//! ```

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::bracket::{enter_bracket, walk_stage, PromotionFormat};
use super::layout::{battle_result, promotion};
use super::navigator::{Navigator, StepResult};
use super::records::{timestamp_now, TournamentStage};
use super::runner::CollectorFormat;
use crate::config::CollectorConfig;
use crate::error::CollectorError;
use crate::recording::{RecordingBackend, RecordingSession};

/// Marker of the statistics screen shown once a replayed battle ends.
pub const STATISTIC_IMAGE: &str = "STATISTIC_IMAGE";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoundReplay {
    pub round_index: u8,
    /// `None` when the recorder could not be started for the round.
    pub video: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchReplay {
    pub match_index: u32,
    pub rounds: Vec<RoundReplay>,
}

impl MatchReplay {
    pub fn recorded(&self) -> usize {
        self.rounds.iter().filter(|r| r.video.is_some()).count()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReplayRecord {
    pub stage: TournamentStage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_number: Option<u32>,
    pub matches: Vec<MatchReplay>,
    pub timestamp: String,
}

/// A bracket stage to replay; promotion stages name their group.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReplayNode {
    pub stage: TournamentStage,
    pub group: Option<u32>,
}

impl fmt::Display for ReplayNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.group {
            Some(group) => write!(f, "group {} {}", group, self.stage),
            None => write!(f, "{}", self.stage),
        }
    }
}

impl ReplayNode {
    /// Promotion stages group by group, then championship stages.
    ///
    /// No stages means every stage; `groups` only applies to promotion.
    pub fn nodes(stages: &[TournamentStage], groups: &[u32]) -> Vec<ReplayNode> {
        let all: Vec<TournamentStage> = if stages.is_empty() {
            TournamentStage::PROMOTION
                .iter()
                .chain(TournamentStage::CHAMPIONSHIP.iter())
                .copied()
                .collect()
        } else {
            stages.to_vec()
        };
        let (promotion, championship): (Vec<_>, Vec<_>) =
            all.into_iter().partition(|s| s.is_promotion());

        let mut nodes: Vec<ReplayNode> = Vec::new();
        if !promotion.is_empty() {
            nodes.extend(
                PromotionFormat::nodes(&promotion, groups)
                    .into_iter()
                    .map(|n| ReplayNode {
                        stage: n.stage,
                        group: Some(n.group),
                    }),
            );
        }
        nodes.extend(championship.into_iter().map(|stage| ReplayNode { stage, group: None }));
        nodes
    }

    fn dir(&self, root: &Path) -> PathBuf {
        let dir = root.join(self.stage.dir_name());
        match self.group {
            Some(group) => dir.join(format!("group_{}", group)),
            None => dir,
        }
    }
}

/// Replays every round of the open battle result screen into `dir`, then
/// closes it.
///
/// A round whose recording cannot start is still played through so the
/// client advances; its `video` stays `None`.
pub fn record_match<B: RecordingBackend>(
    nav: &mut Navigator,
    session: &mut RecordingSession<B>,
    dir: &Path,
    match_index: u32,
    timeout: Duration,
) -> StepResult<MatchReplay> {
    fs::create_dir_all(dir).map_err(CollectorError::from)?;

    let mut rounds = Vec::with_capacity(battle_result::ROUNDS as usize);
    for round in 1..=battle_result::ROUNDS {
        nav.click(battle_result::play_position(round))?;

        let filename = format!("Round_{}.mp4", round);
        let video = match session.start(dir, &filename) {
            Ok(true) => session.output_path().map(Path::to_path_buf),
            Ok(false) => None,
            Err(e) => {
                warn!("Match {} round {}: recording unavailable: {}", match_index, round, e);
                None
            }
        };

        let ended = nav.wait_until(STATISTIC_IMAGE, timeout);
        session.stop();
        ended?;
        debug!("Match {} round {} replayed", match_index, round);

        nav.click(battle_result::REPLAY_NEXT)?;
        rounds.push(RoundReplay {
            round_index: round,
            video,
        });
    }

    nav.click(battle_result::CLOSE)?;
    let replay = MatchReplay { match_index, rounds };
    info!(
        "Match {}: {}/{} rounds recorded",
        match_index,
        replay.recorded(),
        battle_result::ROUNDS
    );
    Ok(replay)
}

pub struct ReplayFormat<B: RecordingBackend> {
    session: RecordingSession<B>,
    root: PathBuf,
    timeout: Duration,
}

impl<B: RecordingBackend> ReplayFormat<B> {
    /// Videos land under `root`, one directory per stage and group.
    pub fn new(session: RecordingSession<B>, root: &Path, config: &CollectorConfig) -> Self {
        Self {
            session,
            root: root.to_path_buf(),
            timeout: Duration::from_millis(config.timing.replay_timeout_ms),
        }
    }
}

impl<B: RecordingBackend> CollectorFormat for ReplayFormat<B> {
    type Node = ReplayNode;
    type Record = ReplayRecord;

    fn name(&self) -> &'static str {
        "replay"
    }

    fn default_nodes(&self) -> Vec<ReplayNode> {
        ReplayNode::nodes(&[], &[])
    }

    fn validate(&self, node: &ReplayNode) -> Result<(), CollectorError> {
        match (node.stage.is_promotion(), node.group) {
            (true, Some(group)) if !(1..=promotion::GROUPS).contains(&group) => {
                Err(CollectorError::InvalidGroupNumber {
                    number: group,
                    max: promotion::GROUPS,
                })
            }
            (true, Some(_)) | (false, None) => Ok(()),
            _ => Err(CollectorError::InvalidStage(node.to_string())),
        }
    }

    fn locate_entry(&mut self, nav: &mut Navigator, node: &ReplayNode) -> StepResult<()> {
        enter_bracket(nav, node.group)
    }

    fn collect(&mut self, nav: &mut Navigator, node: &ReplayNode) -> StepResult<ReplayRecord> {
        let dir = node.dir(&self.root);
        let session = &mut self.session;
        let timeout = self.timeout;
        let mut index = 0;

        let matches = walk_stage(nav, node.stage, &mut |nav: &mut Navigator| {
            index += 1;
            record_match(nav, session, &dir.join(format!("match_{}", index)), index, timeout)
        })?;

        info!("Replayed {} matches for {}", matches.len(), node);
        Ok(ReplayRecord {
            stage: node.stage,
            group_number: node.group,
            matches,
            timestamp: timestamp_now(),
        })
    }

    fn return_to_list(&mut self, nav: &mut Navigator, _node: &ReplayNode) -> StepResult<()> {
        nav.checkpoint()
    }

    fn recover(&mut self, nav: &mut Navigator, _node: &ReplayNode) -> StepResult<()> {
        self.session.stop();
        nav.click(battle_result::CLOSE)
    }

    fn abandon_entry(&mut self, nav: &mut Navigator, _node: &ReplayNode) -> StepResult<()> {
        nav.checkpoint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::Point;
    use crate::collector::layout::championship;
    use crate::collector::runner::{CollectionRunner, RunOutcome, SkipReason};
    use crate::testing::{attach, noise_image, paste_scaled, test_config, FakeRecorder, FakeWindow};
    use crate::vision::{Template, TemplateCatalog};
    use tempfile::tempdir;

    fn keep(_: &ReplayRecord) -> Result<(), CollectorError> {
        Ok(())
    }

    fn scale(point: Point) -> Point {
        point.scaled(716.0 / 3580.0, 403.0 / 2014.0)
    }

    /// Statistics template, and a window showing it when `painted`.
    fn statistics(painted: bool) -> (FakeWindow, TemplateCatalog) {
        let window = FakeWindow::new(716, 403);
        let stat = noise_image(200, 100, 71);
        if painted {
            paste_scaled(&window, &stat, 2200, 1860, 0.2);
        }
        let catalog = TemplateCatalog::new(
            vec![Template::new(
                STATISTIC_IMAGE,
                stat,
                0.8,
                Some(battle_result::STATISTIC_REGION),
            )],
            vec![],
        );
        (window, catalog)
    }

    fn eight_to_four() -> Vec<ReplayNode> {
        vec![ReplayNode {
            stage: TournamentStage::Stage8To4,
            group: None,
        }]
    }

    #[test]
    fn test_every_round_recorded_separately() {
        let (window, catalog) = statistics(true);
        let config = test_config();
        let mut nav = attach(&window, catalog, &config);
        let recorder = FakeRecorder::default();
        let root = tempdir().unwrap();
        let mut format =
            ReplayFormat::new(RecordingSession::new(recorder.clone()), root.path(), &config);

        let run = CollectionRunner::new(&config.recovery)
            .run(&mut format, &mut nav, &mut keep, &eight_to_four())
            .unwrap();

        assert_eq!(run.report.outcome, RunOutcome::Completed);
        let record = &run.records[0];
        assert_eq!(record.matches.len(), 4);
        assert!(record.matches.iter().all(|m| m.recorded() == 5));
        assert_eq!(recorder.count("start"), 20);
        assert_eq!(recorder.count("stop"), 20);
        assert_eq!(
            record.matches[0].rounds[0].video,
            Some(root.path().join("STAGE_8_4").join("match_1").join("Round_1.mp4"))
        );
        assert!(root.path().join("STAGE_8_4/match_4").is_dir());

        let mut first_match = vec![scale(championship::stage_8_4_position(1))];
        for round in 1..=5 {
            first_match.push(scale(battle_result::play_position(round)));
            first_match.push(scale(battle_result::REPLAY_NEXT));
        }
        first_match.push(scale(battle_result::CLOSE));
        assert_eq!(window.clicks()[..12], first_match[..]);
    }

    #[test]
    fn test_recording_failure_keeps_walking() {
        let (window, catalog) = statistics(true);
        let config = test_config();
        let mut nav = attach(&window, catalog, &config);
        let recorder = FakeRecorder::default();
        recorder.fail_on("Round_3.mp4");
        let root = tempdir().unwrap();
        let mut format =
            ReplayFormat::new(RecordingSession::new(recorder.clone()), root.path(), &config);

        let run = CollectionRunner::new(&config.recovery)
            .run(&mut format, &mut nav, &mut keep, &eight_to_four())
            .unwrap();

        assert!(run.report.skipped.is_empty());
        let record = &run.records[0];
        assert_eq!(record.matches.len(), 4);
        for replay in &record.matches {
            assert_eq!(replay.rounds.len(), 5);
            assert_eq!(replay.rounds[2].video, None);
            assert!(replay.rounds[3].video.is_some());
        }
        assert_eq!(recorder.count("fail"), 4);
        assert_eq!(recorder.count("stop"), 16);
    }

    #[test]
    fn test_replay_that_never_ends_skips_stage() {
        let (window, catalog) = statistics(false);
        let mut config = test_config();
        config.timing.replay_timeout_ms = 0;
        let mut nav = attach(&window, catalog, &config);
        let recorder = FakeRecorder::default();
        let root = tempdir().unwrap();
        let mut format =
            ReplayFormat::new(RecordingSession::new(recorder.clone()), root.path(), &config);

        let run = CollectionRunner::new(&config.recovery)
            .run(&mut format, &mut nav, &mut keep, &eight_to_four())
            .unwrap();

        assert!(run.records.is_empty());
        assert_eq!(run.report.skipped[0].0, "8->4");
        assert!(matches!(run.report.skipped[0].1, SkipReason::StageIncomplete(_)));
        // Initial try plus two recoveries, each stopped before giving up
        assert_eq!(recorder.count("start"), 3);
        assert_eq!(recorder.count("stop"), 3);
    }

    #[test]
    fn test_nodes_cover_both_brackets() {
        let all = ReplayNode::nodes(&[], &[2]);
        assert_eq!(all.len(), 6);
        assert_eq!(all[0].to_string(), "group 2 64->32");
        assert_eq!(all[5].to_string(), "2->1");

        let championship_only = ReplayNode::nodes(&[TournamentStage::Stage4To2], &[]);
        assert_eq!(
            championship_only,
            vec![ReplayNode {
                stage: TournamentStage::Stage4To2,
                group: None
            }]
        );
        assert_eq!(ReplayNode::nodes(&[TournamentStage::Stage16To8], &[]).len(), 8);
    }

    #[test]
    fn test_validation_pairs_stage_and_group() {
        let config = test_config();
        let root = tempdir().unwrap();
        let format = ReplayFormat::new(
            RecordingSession::new(FakeRecorder::default()),
            root.path(),
            &config,
        );

        let node = |stage, group| ReplayNode { stage, group };
        assert!(format.validate(&node(TournamentStage::Stage32To16, Some(8))).is_ok());
        assert!(format.validate(&node(TournamentStage::Stage2To1, None)).is_ok());
        assert!(matches!(
            format.validate(&node(TournamentStage::Stage64To32, Some(9))),
            Err(CollectorError::InvalidGroupNumber { number: 9, max: 8 })
        ));
        assert!(matches!(
            format.validate(&node(TournamentStage::Stage64To32, None)),
            Err(CollectorError::InvalidStage(_))
        ));
        assert!(matches!(
            format.validate(&node(TournamentStage::Stage8To4, Some(1))),
            Err(CollectorError::InvalidStage(_))
        ));
    }
}
