//! 64-player tournament: eight groups of eight players on the promotion
//! bracket screen.

use tracing::info;

use super::layout::{promotion, team_info};
use super::lineup::collect_user;
use super::navigator::{Navigator, StepResult};
use super::records::{timestamp_now, Group};
use super::runner::CollectorFormat;
use crate::config::CollectorConfig;
use crate::error::CollectorError;

/// Anchor of the bracket screen, visible once a group tab has loaded.
pub const CHEER_IMAGE: &str = "CHEER_IMAGE";

pub struct Tournament64Format {
    rounds: Vec<u8>,
}

impl Tournament64Format {
    pub fn new(config: &CollectorConfig) -> Self {
        Self {
            rounds: config.rounds.clone(),
        }
    }
}

impl CollectorFormat for Tournament64Format {
    type Node = u32;
    type Record = Group;

    fn name(&self) -> &'static str {
        "64-player"
    }

    fn default_nodes(&self) -> Vec<u32> {
        (1..=promotion::GROUPS).collect()
    }

    fn validate(&self, group: &u32) -> Result<(), CollectorError> {
        if (1..=promotion::GROUPS).contains(group) {
            Ok(())
        } else {
            Err(CollectorError::InvalidGroupNumber {
                number: *group,
                max: promotion::GROUPS,
            })
        }
    }

    fn locate_entry(&mut self, nav: &mut Navigator, group: &u32) -> StepResult<()> {
        info!("Navigating to group {}", group);
        nav.click(promotion::group_button(*group))?;
        nav.confirm(CHEER_IMAGE)
    }

    fn collect(&mut self, nav: &mut Navigator, group: &u32) -> StepResult<Group> {
        let mut users = Vec::with_capacity(promotion::PLAYERS as usize);
        for index in 1..=promotion::PLAYERS {
            info!("Collecting player {} in group {}", index, group);
            let mut user = collect_user(nav, promotion::player_position(index), &self.rounds)?;
            user.group_number = Some(*group);
            user.player_index = Some(index);
            users.push(user);
        }

        Ok(Group {
            group_number: *group,
            users,
            timestamp: timestamp_now(),
            combined_image: None,
            result_image: None,
        })
    }

    /// Group tabs stay visible on the bracket screen.
    fn return_to_list(&mut self, nav: &mut Navigator, _group: &u32) -> StepResult<()> {
        nav.checkpoint()
    }

    fn recover(&mut self, nav: &mut Navigator, _group: &u32) -> StepResult<()> {
        nav.click(team_info::CLOSE)
    }

    /// Entry only switches group tabs, so there is no overlay to close.
    fn abandon_entry(&mut self, nav: &mut Navigator, _group: &u32) -> StepResult<()> {
        nav.checkpoint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::Point;
    use crate::collector::runner::{CollectionRunner, RunOutcome, SkipReason};
    use crate::testing::{attach, noise_image, paste_scaled, test_config, FakeWindow};
    use crate::vision::{Template, TemplateCatalog};

    const WIDTH: u32 = 358;
    const HEIGHT: u32 = 201;

    fn scaled(point: Point) -> Point {
        point.scaled(WIDTH as f64 / 3580.0, HEIGHT as f64 / 2014.0)
    }

    fn keep(_: &Group) -> Result<(), CollectorError> {
        Ok(())
    }

    fn cheer_catalog() -> (TemplateCatalog, image::RgbaImage) {
        let cheer = noise_image(200, 100, 31);
        let catalog = TemplateCatalog::new(
            vec![Template::new(
                CHEER_IMAGE,
                cheer.clone(),
                0.8,
                Some(promotion::CHEER_REGION),
            )],
            vec![],
        );
        (catalog, cheer)
    }

    #[test]
    fn test_group_one_has_players_and_rounds() {
        let window = FakeWindow::new(716, 403);
        let (catalog, cheer) = cheer_catalog();
        paste_scaled(&window, &cheer, 1600, 1750, 0.2);
        let config = test_config();
        let mut nav = attach(&window, catalog, &config);
        let mut format = Tournament64Format::new(&config);

        let run = CollectionRunner::new(&config.recovery)
            .run(&mut format, &mut nav, &mut keep, &[1])
            .unwrap();

        assert_eq!(run.report.outcome, RunOutcome::Completed);
        let group = &run.records[0];
        assert_eq!(group.group_number, 1);
        assert_eq!(group.users.len(), 8);
        for (i, user) in group.users.iter().enumerate() {
            assert_eq!(user.player_index, Some(i as u32 + 1));
            assert_eq!(user.rounds.len(), 5);
            assert!(!user.user_id.is_empty());
        }
    }

    #[test]
    fn test_later_groups_never_touch_group_one() {
        let window = FakeWindow::new(WIDTH, HEIGHT);
        let config = test_config();
        let mut nav = attach(&window, TemplateCatalog::default(), &config);
        let mut format = Tournament64Format::new(&config);

        let nodes: Vec<u32> = (2..=8).collect();
        let run = CollectionRunner::new(&config.recovery)
            .run(&mut format, &mut nav, &mut keep, &nodes)
            .unwrap();

        assert_eq!(run.records.len(), 7);
        let group_one = scaled(promotion::group_button(1));
        assert!(!window.clicks().contains(&group_one));
        for group in 2..=8 {
            assert!(window.clicks().contains(&scaled(promotion::group_button(group))));
        }
    }

    #[test]
    fn test_interrupt_after_group_three() {
        let window = FakeWindow::new(WIDTH, HEIGHT);
        let config = test_config();
        let mut nav = attach(&window, TemplateCatalog::default(), &config);
        let cancel = nav.cancel_token().clone();
        let mut format = Tournament64Format::new(&config);
        let mut persisted = Vec::new();
        let mut sink = |group: &Group| -> Result<(), CollectorError> {
            persisted.push(group.group_number);
            if group.group_number == 3 {
                cancel.cancel();
            }
            Ok(())
        };

        let run = CollectionRunner::new(&config.recovery)
            .run(&mut format, &mut nav, &mut sink, &[])
            .unwrap();

        assert_eq!(
            run.records.iter().map(|g| g.group_number).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(
            run.report.outcome,
            RunOutcome::Interrupted {
                processed: 3,
                total: 8
            }
        );
        assert_eq!(persisted, vec![1, 2, 3]);
        assert!(!window.clicks().contains(&scaled(promotion::group_button(4))));
    }

    #[test]
    fn test_group_nine_rejected() {
        let window = FakeWindow::new(WIDTH, HEIGHT);
        let config = test_config();
        let mut nav = attach(&window, TemplateCatalog::default(), &config);
        let mut format = Tournament64Format::new(&config);

        let result =
            CollectionRunner::new(&config.recovery).run(&mut format, &mut nav, &mut keep, &[9]);

        assert!(matches!(
            result,
            Err(CollectorError::InvalidGroupNumber { number: 9, max: 8 })
        ));
        assert!(window.clicks().is_empty());
        assert_eq!(window.captures(), 0);
    }

    #[test]
    fn test_missing_anchor_skips_groups() {
        let window = FakeWindow::new(716, 403);
        let (catalog, _) = cheer_catalog();
        let config = test_config();
        let mut nav = attach(&window, catalog, &config);
        let mut format = Tournament64Format::new(&config);

        let run = CollectionRunner::new(&config.recovery)
            .run(&mut format, &mut nav, &mut keep, &[1, 2])
            .unwrap();

        assert!(run.records.is_empty());
        assert_eq!(run.report.skipped.len(), 2);
        assert!(run
            .report
            .skipped
            .iter()
            .all(|(_, reason)| matches!(reason, SkipReason::NavigationFailed(_))));
        // Two anchor detections per group, no lineup captures
        assert_eq!(window.captures(), 4);
        let scale = |p: Point| p.scaled(716.0 / 3580.0, 403.0 / 2014.0);
        assert_eq!(
            window.clicks(),
            vec![
                scale(promotion::group_button(1)),
                scale(promotion::group_button(2))
            ]
        );
    }
}
