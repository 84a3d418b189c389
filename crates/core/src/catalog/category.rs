//! The fixed set of catalog categories.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// A catalog section.
///
/// The set is closed: every stored catalog carries all five sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    TopRated,
    Latest,
    Pc,
    Game,
    Editing,
}

impl Category {
    /// All categories in display order.
    pub const ALL: [Category; 5] =
        [Category::TopRated, Category::Latest, Category::Pc, Category::Game, Category::Editing];

    /// Wire name used as the key in the stored document.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::TopRated => "top-rated",
            Category::Latest => "latest",
            Category::Pc => "pc",
            Category::Game => "game",
            Category::Editing => "editing",
        }
    }

    pub fn is_latest(&self) -> bool {
        matches!(self, Category::Latest)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| Error::InvalidInput(format!("unknown category: {s}")))
    }
}
