//! Group batch: 64 groups of four players, opened one by one from the
//! group selector.

use tracing::{info, warn};

use super::imaging::combine_horizontal;
use super::layout::{group_detail, group_selection, team_info};
use super::lineup::collect_user;
use super::navigator::{Navigator, StepResult};
use super::records::{timestamp_now, Group};
use super::runner::CollectorFormat;
use crate::config::{CollectorConfig, CombineConfig};
use crate::error::CollectorError;

pub const MAX_GROUPS: u32 = 64;

/// Shown while the group selector is open.
pub const SELECTION_MARKER: &str = "GROUP_SELECTION";
/// Shown once a group's detail screen has loaded.
pub const DETAIL_MARKER: &str = "GROUP_DETAIL";

pub struct GroupBatchFormat {
    rounds: Vec<u8>,
    combine: CombineConfig,
}

impl GroupBatchFormat {
    pub fn new(config: &CollectorConfig) -> Self {
        Self {
            rounds: config.rounds.clone(),
            combine: config.combine,
        }
    }
}

impl CollectorFormat for GroupBatchFormat {
    type Node = u32;
    type Record = Group;

    fn name(&self) -> &'static str {
        "group batch"
    }

    fn default_nodes(&self) -> Vec<u32> {
        (1..=MAX_GROUPS).collect()
    }

    fn validate(&self, group: &u32) -> Result<(), CollectorError> {
        if (1..=MAX_GROUPS).contains(group) {
            Ok(())
        } else {
            Err(CollectorError::InvalidGroupNumber {
                number: *group,
                max: MAX_GROUPS,
            })
        }
    }

    fn locate_entry(&mut self, nav: &mut Navigator, group: &u32) -> StepResult<()> {
        nav.click(group_detail::GROUP_BUTTON)?;
        nav.confirm(SELECTION_MARKER)?;
        nav.click(group_selection::group_position(*group))?;
        info!("Clicked on group {}", group);
        nav.click(group_selection::CONFIRM)?;
        nav.confirm(DETAIL_MARKER)
    }

    fn collect(&mut self, nav: &mut Navigator, group: &u32) -> StepResult<Group> {
        nav.settle();
        let result_image = nav.capture(Some(group_detail::RESULT_REGION))?;

        let mut users = Vec::with_capacity(group_detail::USERS as usize);
        for index in 1..=group_detail::USERS {
            let mut user = collect_user(nav, group_detail::avatar_position(index), &self.rounds)?;
            user.group_number = Some(*group);
            users.push(user);
        }

        let teams: Vec<_> = users.iter().filter_map(|u| u.team_image.as_ref()).collect();
        let combined_image = combine_horizontal(
            &teams,
            self.combine.horizontal_gap,
            self.combine.boundary_gap,
        );
        if combined_image.is_none() {
            warn!("Group {} has no team images to combine", group);
        }

        Ok(Group {
            group_number: *group,
            users,
            timestamp: timestamp_now(),
            combined_image,
            result_image: Some(result_image),
        })
    }

    /// The next group is opened straight from the detail screen.
    fn return_to_list(&mut self, nav: &mut Navigator, _group: &u32) -> StepResult<()> {
        nav.checkpoint()
    }

    fn recover(&mut self, nav: &mut Navigator, _group: &u32) -> StepResult<()> {
        if nav.catalog().contains(SELECTION_MARKER) && nav.is_present(SELECTION_MARKER)? {
            nav.click(group_selection::CLOSE)
        } else {
            nav.click(team_info::CLOSE)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::Point;
    use crate::collector::runner::{CollectionRunner, RunOutcome};
    use crate::testing::{attach, test_config, FakeWindow};
    use crate::vision::TemplateCatalog;

    const WIDTH: u32 = 358;
    const HEIGHT: u32 = 201;

    fn scaled(point: Point) -> Point {
        point.scaled(WIDTH as f64 / 3580.0, HEIGHT as f64 / 2014.0)
    }

    fn keep(_: &Group) -> Result<(), CollectorError> {
        Ok(())
    }

    #[test]
    fn test_group_collects_four_users() {
        let window = FakeWindow::new(WIDTH, HEIGHT);
        let config = test_config();
        let mut nav = attach(&window, TemplateCatalog::default(), &config);
        let mut format = GroupBatchFormat::new(&config);

        let run = CollectionRunner::new(&config.recovery)
            .run(&mut format, &mut nav, &mut keep, &[5])
            .unwrap();

        assert_eq!(run.report.outcome, RunOutcome::Completed);
        let group = &run.records[0];
        assert_eq!(group.group_number, 5);
        assert_eq!(group.users.len(), 4);
        assert!(group.users.iter().all(|u| u.rounds.len() == 5));
        assert!(group.users.iter().all(|u| u.group_number == Some(5)));
        assert!(group.combined_image.is_some());
        assert!(group.result_image.is_some());

        let clicks = window.clicks();
        assert_eq!(clicks[0], scaled(group_detail::GROUP_BUTTON));
        assert_eq!(clicks[1], scaled(group_selection::group_position(5)));
        assert_eq!(clicks[2], scaled(group_selection::CONFIRM));
    }

    #[test]
    fn test_group_out_of_range_fails_first() {
        let window = FakeWindow::new(WIDTH, HEIGHT);
        let config = test_config();
        let mut nav = attach(&window, TemplateCatalog::default(), &config);
        let mut format = GroupBatchFormat::new(&config);

        let result =
            CollectionRunner::new(&config.recovery).run(&mut format, &mut nav, &mut keep, &[1, 65]);

        assert!(matches!(
            result,
            Err(CollectorError::InvalidGroupNumber { number: 65, max: 64 })
        ));
        assert!(window.clicks().is_empty());
        assert_eq!(window.captures(), 0);
    }

    #[test]
    fn test_window_closed_mid_run_aborts() {
        let window = FakeWindow::new(WIDTH, HEIGHT);
        // One group takes 3 entry clicks plus 10 per user
        window.close_after_clicks(50);
        let mut config = test_config();
        config.rounds = vec![1, 2, 3, 4, 5];
        let mut nav = attach(&window, TemplateCatalog::default(), &config);
        let mut format = GroupBatchFormat::new(&config);

        let run = CollectionRunner::new(&config.recovery)
            .run(&mut format, &mut nav, &mut keep, &[1, 2, 3])
            .unwrap();

        assert_eq!(run.records.len(), 1);
        assert_eq!(run.report.finalized, vec!["1"]);
        assert!(matches!(run.report.outcome, RunOutcome::Aborted { .. }));
    }
}
