//! Rank table: the ordered quality tiers a pip can be classified into.

use image::Rgb;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single quality tier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rank {
    /// Display name, unique within a table (e.g. "SS")
    pub name: String,
    /// Reference color in the capture color space (RGB)
    pub color: Rgb<u8>,
    /// Position in the table; higher is better
    pub ordinal: u8,
}

/// Rank entry as written in config.json.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RankConfig {
    pub name: String,
    /// RGB reference color
    pub color: [u8; 3],
}

impl RankConfig {
    fn new(name: &str, color: [u8; 3]) -> Self {
        Self {
            name: name.to_string(),
            color,
        }
    }
}

/// Default tiers, lowest quality first.
pub fn default_rank_configs() -> Vec<RankConfig> {
    vec![
        RankConfig::new("F", [170, 170, 170]),
        RankConfig::new("D", [106, 190, 48]),
        RankConfig::new("C", [66, 135, 245]),
        RankConfig::new("B", [168, 85, 247]),
        RankConfig::new("A", [250, 204, 21]),
        RankConfig::new("S", [249, 115, 22]),
        RankConfig::new("SS", [239, 68, 68]),
    ]
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RankTableError {
    #[error("rank table is empty")]
    Empty,
    #[error("rank '{0}' is defined more than once")]
    DuplicateRank(String),
    #[error("too many ranks ({0}), at most 256 are supported")]
    TooMany(usize),
}

/// Immutable, ordered set of ranks. Built once at startup.
#[derive(Clone, Debug)]
pub struct RankTable {
    ranks: Vec<Rank>,
}

impl RankTable {
    /// Builds a table from config entries. Ordinals follow list order.
    pub fn from_configs(configs: &[RankConfig]) -> Result<Self, RankTableError> {
        if configs.is_empty() {
            return Err(RankTableError::Empty);
        }
        if configs.len() > 256 {
            return Err(RankTableError::TooMany(configs.len()));
        }

        let mut ranks: Vec<Rank> = Vec::with_capacity(configs.len());
        for (i, cfg) in configs.iter().enumerate() {
            if ranks.iter().any(|r| r.name == cfg.name) {
                return Err(RankTableError::DuplicateRank(cfg.name.clone()));
            }
            ranks.push(Rank {
                name: cfg.name.clone(),
                color: Rgb(cfg.color),
                ordinal: i as u8,
            });
        }

        Ok(Self { ranks })
    }

    /// Ranks in ascending ordinal order.
    pub fn iter(&self) -> impl Iterator<Item = &Rank> {
        self.ranks.iter()
    }

    pub fn len(&self) -> usize {
        self.ranks.len()
    }

    pub fn get(&self, name: &str) -> Option<&Rank> {
        self.ranks.iter().find(|r| r.name == name)
    }

    pub fn ordinal_of(&self, name: &str) -> Option<u8> {
        self.get(name).map(|r| r.ordinal)
    }

    /// The single highest rank.
    #[cfg(any(windows, test))]
    pub fn top(&self) -> &Rank {
        // Construction guarantees at least one rank
        &self.ranks[self.ranks.len() - 1]
    }

    /// The lowest rank.
    pub fn lowest(&self) -> &Rank {
        &self.ranks[0]
    }
}

impl Default for RankTable {
    fn default() -> Self {
        let ranks = default_rank_configs()
            .into_iter()
            .enumerate()
            .map(|(i, cfg)| Rank {
                name: cfg.name,
                color: Rgb(cfg.color),
                ordinal: i as u8,
            })
            .collect();
        Self { ranks }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_order() {
        let table = RankTable::default();
        assert_eq!(table.len(), 7);
        assert_eq!(table.lowest().name, "F");
        assert_eq!(table.top().name, "SS");
        assert!(table.ordinal_of("SS").unwrap() > table.ordinal_of("S").unwrap());
        assert_eq!(table.ordinal_of("X"), None);
    }

    #[test]
    fn test_from_configs_rejects_duplicates() {
        let configs = vec![
            RankConfig::new("A", [1, 2, 3]),
            RankConfig::new("A", [4, 5, 6]),
        ];
        assert_eq!(
            RankTable::from_configs(&configs).unwrap_err(),
            RankTableError::DuplicateRank("A".to_string())
        );
        assert_eq!(RankTable::from_configs(&[]).unwrap_err(), RankTableError::Empty);
    }

    #[test]
    fn test_from_configs_assigns_ordinals() {
        let table = RankTable::from_configs(&default_rank_configs()).unwrap();
        let ordinals: Vec<u8> = table.iter().map(|r| r.ordinal).collect();
        assert_eq!(ordinals, vec![0, 1, 2, 3, 4, 5, 6]);
    }
}
