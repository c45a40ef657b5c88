use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Slot type a candidate fills.
///
/// Declaration order is the natural output order (starters, backup maps).
/// The allocation order is a separate constant, [`ALLOCATION_PRIORITY`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    #[serde(alias = "gol", alias = "GOL")]
    Goalkeeper,
    #[serde(alias = "lat", alias = "LAT")]
    Fullback,
    #[serde(alias = "zag", alias = "ZAG")]
    Defender,
    #[serde(alias = "mei", alias = "MEI")]
    Midfielder,
    #[serde(alias = "ata", alias = "ATA")]
    Attacker,
    #[serde(alias = "tec", alias = "TEC")]
    Coach,
}

/// Order in which the greedy construction fills categories.
pub const ALLOCATION_PRIORITY: [Category; 6] = [
    Category::Attacker,
    Category::Midfielder,
    Category::Defender,
    Category::Fullback,
    Category::Goalkeeper,
    Category::Coach,
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown category: '{0}'")]
pub struct UnknownCategory(pub String);

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Goalkeeper,
        Category::Fullback,
        Category::Defender,
        Category::Midfielder,
        Category::Attacker,
        Category::Coach,
    ];

    /// Short three-letter code used by the market feed.
    pub fn code(self) -> &'static str {
        match self {
            Self::Goalkeeper => "gol",
            Self::Fullback => "lat",
            Self::Defender => "zag",
            Self::Midfielder => "mei",
            Self::Attacker => "ata",
            Self::Coach => "tec",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Goalkeeper => "goalkeeper",
            Self::Fullback => "fullback",
            Self::Defender => "defender",
            Self::Midfielder => "midfielder",
            Self::Attacker => "attacker",
            Self::Coach => "coach",
        }
    }
}

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let s = raw.trim().to_ascii_lowercase();
        Category::ALL
            .into_iter()
            .find(|c| c.code() == s || c.name() == s)
            .ok_or_else(|| UnknownCategory(raw.to_string()))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_codes_and_names() {
        assert_eq!("ATA".parse::<Category>().unwrap(), Category::Attacker);
        assert_eq!(" goalkeeper ".parse::<Category>().unwrap(), Category::Goalkeeper);
        assert_eq!("tec".parse::<Category>().unwrap(), Category::Coach);
        assert!("striker".parse::<Category>().is_err());
    }

    #[test]
    fn priority_covers_every_category_once() {
        let mut seen = ALLOCATION_PRIORITY.to_vec();
        seen.sort();
        assert_eq!(seen, Category::ALL.to_vec());
    }

    #[test]
    fn serde_accepts_codes() {
        let c: Category = serde_json::from_str("\"mei\"").unwrap();
        assert_eq!(c, Category::Midfielder);
        assert_eq!(serde_json::to_string(&Category::Fullback).unwrap(), "\"fullback\"");
    }
}
