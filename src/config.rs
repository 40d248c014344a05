use std::ops::RangeInclusive;

pub const DEFAULT_STORAGE_KEY: &str = "partnerPickerData";
pub const DEFAULT_ROSTER_URL: &str = "assets/roster.json";

const SPIN_DURATION_MS: u32 = 4_000;
const MIN_SPIN_TURNS: u32 = 4;
const MAX_SPIN_TURNS: u32 = 8;

/// Application settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickerConfig {
    pub storage_key: String,
    pub roster_url: String,
    pub spin_duration_ms: u32,
    pub spin_turns: RangeInclusive<u32>,
}

impl Default for PickerConfig {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_owned(),
            roster_url: DEFAULT_ROSTER_URL.to_owned(),
            spin_duration_ms: SPIN_DURATION_MS,
            spin_turns: MIN_SPIN_TURNS..=MAX_SPIN_TURNS,
        }
    }
}
