//! Result overlay of one bracket match.

use tracing::{info, warn};

use super::layout::{battle_result, team_info};
use super::lineup::read_profile;
use super::navigator::{Navigator, StepResult};
use super::records::{Battle, BattleResult};
use crate::capture::Point;

pub const WIN: &str = "WIN";
pub const LOSE: &str = "LOSE";

fn copy_player_id(nav: &mut Navigator, avatar: Point) -> StepResult<String> {
    nav.click(avatar)?;
    let (user_id, _) = read_profile(nav, false)?;
    nav.click(team_info::CLOSE)?;
    Ok(user_id)
}

/// Reads the left player's result for one round from its badge.
fn round_result(nav: &mut Navigator, round: u8) -> StepResult<BattleResult> {
    let region = battle_result::round_result_region(round);
    if nav.catalog().contains(WIN) && nav.is_present_in(WIN, region)? {
        return Ok(BattleResult::Victory);
    }
    if nav.catalog().contains(LOSE) && nav.is_present_in(LOSE, region)? {
        return Ok(BattleResult::Defeat);
    }
    warn!("Could not determine battle result for round {}", round);
    Ok(BattleResult::Unknown)
}

/// Collects the match whose result overlay is currently open, then closes it.
pub fn collect_battle(nav: &mut Navigator) -> StepResult<Battle> {
    let left_user_id = copy_player_id(nav, battle_result::LEFT_USER)?;
    let right_user_id = copy_player_id(nav, battle_result::RIGHT_USER)?;

    let mut results = Vec::with_capacity(battle_result::ROUNDS as usize);
    for round in 1..=battle_result::ROUNDS {
        results.push(round_result(nav, round)?);
    }

    nav.settle();
    let image = nav.capture(Some(battle_result::TOTAL_REGION))?;
    nav.click(battle_result::CLOSE)?;

    let battle = Battle {
        left_user_id,
        right_user_id,
        results,
        image: Some(image),
    };
    let (wins, losses) = battle.score();
    info!(
        "Battle {} vs {}: {}-{}",
        battle.left_user_id, battle.right_user_id, wins, losses
    );
    Ok(battle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{attach, noise_image, test_config, FakeWindow};
    use crate::vision::{Template, TemplateCatalog};

    #[test]
    fn test_battle_reads_badges_per_round() {
        // Reference-sized window so badges sit at their layout coordinates
        let window = FakeWindow::new(3580, 2014);
        let win = noise_image(40, 24, 21);
        let lose = noise_image(40, 24, 22);
        for round in [1u8, 2, 4] {
            let r = battle_result::round_result_region(round);
            window.paint(&win, r.start_x + 20, r.start_y + 10);
        }
        let r = battle_result::round_result_region(3);
        window.paint(&lose, r.start_x + 30, r.start_y + 12);

        let catalog = TemplateCatalog::new(
            vec![
                Template::new(WIN, win, 0.9, None),
                Template::new(LOSE, lose, 0.9, None),
            ],
            vec![],
        );
        let mut nav = attach(&window, catalog, &test_config());

        let battle = collect_battle(&mut nav).unwrap();

        assert_eq!(battle.left_user_id, "user-001");
        assert_eq!(battle.right_user_id, "user-002");
        assert_eq!(
            battle.results,
            vec![
                BattleResult::Victory,
                BattleResult::Victory,
                BattleResult::Defeat,
                BattleResult::Victory,
                BattleResult::Unknown,
            ]
        );
        let image = battle.image.unwrap();
        assert_eq!(image.dimensions(), (910, 636));
        assert_eq!(*window.clicks().last().unwrap(), battle_result::CLOSE);
    }

    #[test]
    fn test_battle_without_badge_templates_is_unknown() {
        let window = FakeWindow::new(358, 201);
        let mut nav = attach(&window, TemplateCatalog::default(), &test_config());

        let battle = collect_battle(&mut nav).unwrap();

        assert!(battle.results.iter().all(|r| *r == BattleResult::Unknown));
        assert_eq!(battle.results.len(), 5);
    }
}
