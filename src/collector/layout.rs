//! Screen layout of the arena UI at reference resolution (3580x2014).
//!
//! The navigator scales every point and region to the live window.

use crate::capture::{Point, Region};

/// Group selector of the group batch screen (5 columns, 64 groups).
pub mod group_selection {
    use super::*;

    pub const START: Point = Point::new(1466, 437);
    pub const ROW_SPACING: u32 = 92;
    pub const COLUMN_SPACING: u32 = 161;
    pub const PER_ROW: u32 = 5;
    pub const CONFIRM: Point = Point::new(1964, 1786);
    pub const CLOSE: Point = Point::new(2228, 260);

    /// Button of group `number` (1-based).
    pub fn group_position(number: u32) -> Point {
        let index = number.saturating_sub(1);
        Point::new(
            START.x + (index % PER_ROW) * COLUMN_SPACING,
            START.y + (index / PER_ROW) * ROW_SPACING,
        )
    }
}

/// Detail screen of one group: four users and the group result.
pub mod group_detail {
    use super::*;

    pub const USERS: u32 = 4;
    pub const GROUP_BUTTON: Point = Point::new(1790, 583);
    pub const RESULT_REGION: Region = Region::new(1268, 685, 1054, 980);

    pub fn avatar_position(user: u32) -> Point {
        Point::new(1381, 800 + user.saturating_sub(1) * 244)
    }
}

/// Lineup overlay: five round tabs, five character slots per round.
pub mod team_info {
    use super::*;

    pub const ROUNDS: u8 = 5;
    pub const CHARACTERS: u32 = 5;
    pub const SLOT_WIDTH: u32 = 160;
    pub const SLOT_HEIGHT: u32 = 235;
    pub const SLOT_GAP: u32 = 22;
    pub const ROUND_REGION: Region = Region::new(1342, 1060, 896, 356);
    pub const AVATAR: Point = Point::new(1447, 796);
    pub const CLOSE: Point = Point::new(2208, 634);

    pub fn round_button(round: u8) -> Point {
        Point::new(1427 + (round.saturating_sub(1) as u32) * 178, 984)
    }

    /// Tab area around a round button, kept as the round's result image.
    pub fn round_tab_region(round: u8) -> Region {
        let center = round_button(round);
        Region::new(center.x - 80, center.y - 36, 160, 72)
    }

    pub fn character_region(position: u32) -> Region {
        Region::new(
            1347 + position.saturating_sub(1) * (SLOT_GAP + SLOT_WIDTH),
            1060,
            SLOT_WIDTH,
            SLOT_HEIGHT,
        )
    }
}

/// Player profile page opened from the lineup avatar.
pub mod profile {
    use super::*;

    pub const COPY_ID: Point = Point::new(1866, 647);
    pub const CLOSE: Point = Point::new(2248, 187);
    pub const REGION: Region = Region::new(1312, 472, 958, 916);
}

/// Battle result overlay of a bracket match.
pub mod battle_result {
    use super::*;

    pub const ROUNDS: u8 = 5;
    pub const LEFT_USER: Point = Point::new(1420, 1020);
    pub const RIGHT_USER: Point = Point::new(2034, 1012);
    pub const CLOSE: Point = Point::new(2208, 490);
    /// Opens the decisive 32->16 (and 4->2) battle once the winner button shows.
    pub const STAGE_32_16: Point = Point::new(2035, 1620);
    pub const STAGE_16_8: Point = Point::new(1540, 1620);
    pub const TOTAL_REGION: Region = Region::new(1335, 900, 910, 636);
    /// Statistics button shown once a replayed battle ends.
    pub const STATISTIC_REGION: Region = Region::new(2177, 1840, 280, 160);
    /// Leaves a finished replay for the battle result screen.
    pub const REPLAY_NEXT: Point = Point::new(1800, 1760);

    /// Replay button of round `round` (1-based).
    pub fn play_position(round: u8) -> Point {
        Point::new(2170, 1150 + (round.saturating_sub(1) as u32) * 86)
    }

    /// Win/lose badge of round `round` (1-based), for the left player.
    pub fn round_result_region(round: u8) -> Region {
        Region::new(
            1577,
            1124 + (round.saturating_sub(1) as u32) * (37 + 48),
            94,
            48,
        )
    }
}

/// Promotion bracket (64 players in 8 groups).
pub mod promotion {
    use super::*;

    pub const GROUPS: u32 = 8;
    pub const PLAYERS: u32 = 8;
    pub const CHEER_REGION: Region = Region::new(1486, 1699, 700, 220);
    pub const CHEER_BUTTON: Point = Point::new(1793, 1812);
    pub const BUTTON_16_REGION: Region = Region::new(1462, 1570, 160, 82);

    pub fn group_button(group: u32) -> Point {
        Point::new(250 + group.saturating_sub(1) * 440, 508)
    }

    /// Four first-round matches, two rows of two.
    pub fn stage_64_32_position(index: u32) -> Point {
        let i = index.saturating_sub(1);
        Point::new(1645 + (i % 2) * 284, 839 + (i / 2) * 736)
    }

    pub fn stage_32_16_position(index: u32) -> Point {
        if index <= 1 {
            Point::new(1848, 1074)
        } else {
            Point::new(1730, 1315)
        }
    }

    /// Player avatars, two columns of four.
    pub fn player_position(index: u32) -> Point {
        let i = index.saturating_sub(1);
        let x = if i % 2 == 0 { 1335 } else { 1335 + 907 };
        let y = match i / 2 {
            0 => 700,
            1 => 700 + 255,
            2 => 700 + 255 + 489,
            _ => 700 + 255 + 489 + 255,
        };
        Point::new(x, y)
    }
}

/// Championship bracket (final 8).
pub mod championship {
    use super::*;

    pub const CHAMPION_BUTTON_REGION: Region = Region::new(1477, 1580, 130, 72);
    pub const STAGE_4_2_BUTTON: Point = Point::new(2036, 1618);

    pub fn stage_8_4_position(index: u32) -> Point {
        let i = index.saturating_sub(1);
        Point::new(1655 + (i % 2) * 260, 765 + (i / 2) * 740)
    }

    pub fn stage_4_2_position(index: u32) -> Point {
        if index <= 1 {
            Point::new(1842, 1000)
        } else {
            Point::new(1730, 1244)
        }
    }
}
