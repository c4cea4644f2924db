//! XP levels.

use serde::{Deserialize, Serialize};

/// Displayed "next threshold" once the top level is reached.
const TOP_LEVEL_CAP: u64 = 2000;

/// `(level, title, band start)`; each band ends where the next begins.
const LEVELS: [(u8, &str, u64); 4] = [
    (1, "Observer", 0),
    (2, "The Witness", 100),
    (3, "Gap Architect", 300),
    (4, "Master of Agency", 600),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelInfo {
    pub level: u8,
    pub title: String,
    pub next_threshold: u64,
    #[serde(rename = "currentXP")]
    pub current_xp: u64,
    /// Progress through the current band, 0 to 100.
    pub progress_percent: f64,
}

/// Look up the level for an XP total.
///
/// ```
/// use impulse_tracker::level_info;
///
/// assert_eq!(level_info(0).level, 1);
/// assert_eq!(level_info(100).title, "The Witness");
/// assert_eq!(level_info(450).progress_percent, 50.0);
/// assert_eq!(level_info(5000).next_threshold, 2000);
/// ```
pub fn level_info(xp: u64) -> LevelInfo {
    let index = LEVELS
        .iter()
        .rposition(|&(_, _, start)| xp >= start)
        .unwrap_or(0);
    let (level, title, band_start) = LEVELS[index];
    let band_end = LEVELS
        .get(index + 1)
        .map_or(TOP_LEVEL_CAP, |&(_, _, start)| start);

    let progress = (xp - band_start) as f64 / (band_end - band_start) as f64 * 100.0;

    LevelInfo {
        level,
        title: title.to_string(),
        next_threshold: band_end,
        current_xp: xp,
        progress_percent: progress.clamp(0.0, 100.0),
    }
}
