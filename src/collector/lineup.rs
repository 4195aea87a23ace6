//! Lineup of one player: profile, five rounds, five characters per round.

use image::RgbaImage;
use tracing::{debug, info, warn};

use super::imaging::combine_vertical;
use super::layout::{profile, team_info};
use super::navigator::{Navigator, StepResult};
use super::records::{Character, Round, User};
use super::state::CollectorState;
use crate::capture::Point;
use crate::error::CollectorError;

/// Rounds to visit, ascending and without duplicates, limited to 1..=5.
pub fn ordered_rounds(rounds: &[u8]) -> Vec<u8> {
    let mut ordered: Vec<u8> = rounds
        .iter()
        .copied()
        .filter(|r| (1..=team_info::ROUNDS).contains(r))
        .collect();
    ordered.sort_unstable();
    ordered.dedup();
    ordered
}

/// Marker confirming a round tab became active.
pub fn round_marker(round: u8) -> String {
    format!("ROUND_{}_SELECTED", round)
}

/// Opens the profile from the lineup overlay and copies the player id,
/// optionally capturing the profile card before closing it.
///
/// Leaves the lineup overlay open.
pub fn read_profile(nav: &mut Navigator, with_image: bool) -> StepResult<(String, Option<RgbaImage>)> {
    nav.click(team_info::AVATAR)?;
    nav.click(profile::COPY_ID)?;
    let user_id = nav.read_clipboard()?;
    if user_id.is_empty() {
        return Err(CollectorError::Clipboard("copied user id is empty".into()).into());
    }
    info!("Captured user ID: {}", user_id);

    let image = if with_image {
        nav.settle();
        Some(nav.capture(Some(profile::REGION))?)
    } else {
        None
    };
    nav.click(profile::CLOSE)?;
    Ok((user_id, image))
}

/// Clicks `open` to show a player's lineup, collects it and closes the overlay.
pub fn collect_user(nav: &mut Navigator, open: Point, rounds: &[u8]) -> StepResult<User> {
    nav.click(open)?;
    let (user_id, profile_image) = read_profile(nav, true)?;
    let mut user = User {
        user_id,
        profile_image,
        ..User::default()
    };

    for round_index in ordered_rounds(rounds) {
        let round = collect_round(nav, round_index)?;
        user.add_round(round);
    }

    nav.click(team_info::CLOSE)?;
    nav.enter(CollectorState::AtGroupDetail);

    let images: Vec<_> = user
        .rounds
        .values()
        .filter_map(|r| r.combined_image.as_ref())
        .collect();
    user.team_image = combine_vertical(&images);
    Ok(user)
}

fn collect_round(nav: &mut Navigator, round_index: u8) -> StepResult<Round> {
    nav.enter(CollectorState::AtRoundDetail);
    nav.click(team_info::round_button(round_index))?;
    nav.confirm(&round_marker(round_index))?;
    nav.settle();
    debug!("Round {} selected", round_index);

    let combined = nav.capture(Some(team_info::ROUND_REGION))?;
    let tab = nav.capture(Some(team_info::round_tab_region(round_index)))?;

    nav.enter(CollectorState::AtCharacterOverlay);
    let mut characters = Vec::with_capacity(team_info::CHARACTERS as usize);
    for position in 1..=team_info::CHARACTERS {
        let image = nav.capture(Some(team_info::character_region(position)))?;
        let name = nav.identify_character(&image)?;
        if name.is_none() {
            warn!(
                "No character matched round {} position {}",
                round_index, position
            );
        }
        characters.push(Character {
            position,
            name,
            image: Some(image),
        });
    }

    Ok(Round {
        round_index,
        characters,
        combined_image: Some(combined),
        result_image: Some(tab),
    })
}
