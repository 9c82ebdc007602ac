//! Core domain types shared across the crate.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An input the bot can send to the game for one tick.
///
/// The declaration order doubles as the tie-break order: when several
/// actions share the best value estimate, the earliest variant wins, so
/// the bot prefers doing nothing over jumping and jumping over ducking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Action {
    /// Keep running, press nothing.
    Idle,
    /// Press jump (up arrow / space).
    Jump,
    /// Hold duck (down arrow).
    Duck,
}

impl Action {
    /// Number of distinct actions.
    pub const COUNT: usize = 3;

    /// All actions in tie-break priority order.
    pub const ALL: [Action; Action::COUNT] = [Action::Idle, Action::Jump, Action::Duck];

    /// Stable index of this action, usable as an array offset.
    pub fn index(self) -> usize {
        match self {
            Action::Idle => 0,
            Action::Jump => 1,
            Action::Duck => 2,
        }
    }

    /// Look an action up by its stable index.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidActionIndex`] if `index` is out of range.
    pub fn from_index(index: usize) -> Result<Self, crate::Error> {
        Action::ALL
            .get(index)
            .copied()
            .ok_or(crate::Error::InvalidActionIndex {
                index,
                max: Action::COUNT - 1,
            })
    }

    /// Short lowercase label for logs and exports.
    pub fn label(self) -> &'static str {
        match self {
            Action::Idle => "idle",
            Action::Jump => "jump",
            Action::Duck => "duck",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Kind of obstacle reported by the game scrape.
///
/// `None` covers both an empty obstacle slot and any kind the scrape does
/// not recognize; the two are deliberately indistinguishable to the learner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ObstacleKind {
    SmallCactus,
    LargeCactus,
    Pterodactyl,
    None,
}

impl ObstacleKind {
    /// Parse the type string the game exposes on its obstacle objects.
    /// Unrecognized strings fold into [`ObstacleKind::None`].
    pub fn from_scrape(name: &str) -> Self {
        match name {
            "CACTUS_SMALL" => ObstacleKind::SmallCactus,
            "CACTUS_LARGE" => ObstacleKind::LargeCactus,
            "PTERODACTYL" => ObstacleKind::Pterodactyl,
            _ => ObstacleKind::None,
        }
    }

    /// Short lowercase label for logs and exports.
    pub fn label(self) -> &'static str {
        match self {
            ObstacleKind::SmallCactus => "small-cactus",
            ObstacleKind::LargeCactus => "large-cactus",
            ObstacleKind::Pterodactyl => "pterodactyl",
            ObstacleKind::None => "none",
        }
    }

    /// Whether this kind represents a real obstacle.
    pub fn is_present(self) -> bool {
        !matches!(self, ObstacleKind::None)
    }
}

impl fmt::Display for ObstacleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}
