//! Pure scoring rules: streak multipliers, tier labels, and the per-session
//! score sheet. Nothing here touches shared state; the room registry and the
//! solo session both call into these functions.

use crate::types::{INTEGRITY_PENALTY, INTEGRITY_RECOVERY, MAX_TIME, TIME_BONUS};
use serde::{Deserialize, Serialize};

pub const BASE_POINTS: u64 = 100;
/// Base points when the previous accept was under this many milliseconds ago.
pub const FAST_SUBMIT_WINDOW_MS: i64 = 3000;
pub const FAST_SUBMIT_POINTS: u64 = 150;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tier {
    Stable,
    X2,
    HyperLink,
    Overclock,
    GodSync,
}

/// Point multiplier for the current streak, evaluated before the streak is
/// incremented for the answer being scored.
pub fn multiplier(streak: u32) -> u64 {
    match streak {
        s if s >= 10 => 5,
        s if s >= 5 => 3,
        s if s >= 3 => 2,
        _ => 1,
    }
}

pub fn tier(streak: u32) -> Tier {
    match streak {
        s if s >= 15 => Tier::GodSync,
        s if s >= 10 => Tier::Overclock,
        s if s >= 5 => Tier::HyperLink,
        s if s >= 3 => Tier::X2,
        _ => Tier::Stable,
    }
}

/// Points awarded for a correct answer.
pub fn points(streak: u32, overclock: bool) -> u64 {
    BASE_POINTS * multiplier(streak) * if overclock { 2 } else { 1 }
}

/// Points with the original's fast-submit base bump: a player chaining
/// accepts under 3 s apart earns 150 base instead of 100.
pub fn points_with_pace(streak: u32, overclock: bool, millis_since_last: i64) -> u64 {
    let base = if millis_since_last < FAST_SUBMIT_WINDOW_MS {
        FAST_SUBMIT_POINTS
    } else {
        BASE_POINTS
    };
    base * multiplier(streak) * if overclock { 2 } else { 1 }
}

/// End-of-game classification shown on the sign-off screen.
pub fn classification(score: u64) -> &'static str {
    match score {
        s if s >= 8000 => "NEURAL_GOD",
        s if s >= 4000 => "SYNC_ELITE",
        _ => "DATA_GHOST",
    }
}

/// Level derived from score; passed to the oracle as a difficulty hint.
pub fn level_for_score(score: u64) -> u32 {
    (score / 2000) as u32 + 1
}

/// Per-session score state: score, high-score watermark, streak, countdown,
/// and the bounded integrity resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreSheet {
    pub score: u64,
    pub high_score: u64,
    pub streak: u32,
    pub time_remaining: u32,
    pub integrity: u8,
}

impl ScoreSheet {
    pub fn new(high_score: u64) -> Self {
        Self {
            score: 0,
            high_score,
            streak: 0,
            time_remaining: MAX_TIME,
            integrity: 100,
        }
    }

    /// Apply a correct answer: award points (multiplier read from the
    /// pre-increment streak), bump the streak, refill time and integrity.
    /// Returns the points awarded.
    pub fn apply_match(&mut self, overclock: bool) -> u64 {
        let gained = points(self.streak, overclock);
        self.score += gained;
        self.streak += 1;
        self.time_remaining = (self.time_remaining + TIME_BONUS).min(MAX_TIME);
        self.integrity = self.integrity.saturating_add(INTEGRITY_RECOVERY).min(100);
        if self.score > self.high_score {
            self.high_score = self.score;
        }
        gained
    }

    /// Apply a genuine wrong guess (not a duplicate): reset the streak and
    /// drain integrity. Score is untouched.
    pub fn apply_miss(&mut self) {
        self.streak = 0;
        self.integrity = self.integrity.saturating_sub(INTEGRITY_PENALTY);
    }

    pub fn tier(&self) -> Tier {
        tier(self.streak)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiplier_tiers() {
        assert_eq!(multiplier(0), 1);
        assert_eq!(multiplier(2), 1);
        assert_eq!(multiplier(3), 2);
        assert_eq!(multiplier(4), 2);
        assert_eq!(multiplier(5), 3);
        assert_eq!(multiplier(9), 3);
        assert_eq!(multiplier(10), 5);
        assert_eq!(multiplier(100), 5);
    }

    #[test]
    fn tier_labels() {
        assert_eq!(tier(0), Tier::Stable);
        assert_eq!(tier(3), Tier::X2);
        assert_eq!(tier(5), Tier::HyperLink);
        assert_eq!(tier(10), Tier::Overclock);
        assert_eq!(tier(15), Tier::GodSync);
    }

    #[test]
    fn overclock_doubles_every_tier() {
        for streak in [0, 3, 5, 10, 15] {
            assert_eq!(points(streak, true), points(streak, false) * 2);
        }
    }

    #[test]
    fn fast_pace_raises_base_points() {
        assert_eq!(points_with_pace(0, false, 5000), 100);
        assert_eq!(points_with_pace(0, false, 1200), 150);
        assert_eq!(points_with_pace(5, false, 1200), 450);
    }

    #[test]
    fn score_sheet_match_updates_everything() {
        let mut sheet = ScoreSheet::new(0);
        sheet.time_remaining = 10;
        sheet.integrity = 50;

        let gained = sheet.apply_match(false);
        assert_eq!(gained, 100);
        assert_eq!(sheet.score, 100);
        assert_eq!(sheet.high_score, 100);
        assert_eq!(sheet.streak, 1);
        assert_eq!(sheet.time_remaining, 13);
        assert_eq!(sheet.integrity, 55);
    }

    #[test]
    fn score_sheet_time_and_integrity_are_capped() {
        let mut sheet = ScoreSheet::new(0);
        sheet.time_remaining = MAX_TIME;
        sheet.integrity = 98;
        sheet.apply_match(false);
        assert_eq!(sheet.time_remaining, MAX_TIME);
        assert_eq!(sheet.integrity, 100);
    }

    #[test]
    fn score_sheet_miss_resets_streak_and_drains_integrity() {
        let mut sheet = ScoreSheet::new(0);
        sheet.integrity = 50;
        sheet.apply_match(false);
        sheet.apply_match(false);
        assert_eq!(sheet.streak, 2);

        sheet.apply_miss();
        assert_eq!(sheet.streak, 0);
        assert_eq!(sheet.integrity, 45); // +5 +5 -15
        assert_eq!(sheet.score, 200); // unchanged by the miss
    }

    #[test]
    fn integrity_floors_at_zero() {
        let mut sheet = ScoreSheet::new(0);
        sheet.integrity = 10;
        sheet.apply_miss();
        assert_eq!(sheet.integrity, 0);
    }

    #[test]
    fn high_score_is_a_watermark() {
        let mut sheet = ScoreSheet::new(250);
        sheet.apply_match(false);
        assert_eq!(sheet.high_score, 250);
        sheet.apply_match(false);
        assert_eq!(sheet.score, 200);
        sheet.apply_match(false); // streak 2 -> +100 => 300
        assert_eq!(sheet.high_score, 300);
    }

    #[test]
    fn classification_thresholds() {
        assert_eq!(classification(0), "DATA_GHOST");
        assert_eq!(classification(4000), "SYNC_ELITE");
        assert_eq!(classification(8000), "NEURAL_GOD");
    }

    #[test]
    fn level_scales_with_score() {
        assert_eq!(level_for_score(0), 1);
        assert_eq!(level_for_score(1999), 1);
        assert_eq!(level_for_score(2000), 2);
        assert_eq!(level_for_score(6500), 4);
    }
}
