//! Category labels.
//!
//! The set of categories is fixed and small: one per cube color. At most one
//! physical object of a given category is expected in view at a time, which is
//! what lets the tracker key its state by category alone.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A tracked object class. Declaration order is the canonical ordering used
/// for deterministic expiry output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    White,
    Yellow,
    Red,
    Orange,
    Blue,
    Green,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::White,
        Category::Yellow,
        Category::Red,
        Category::Orange,
        Category::Blue,
        Category::Green,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::White => "white",
            Category::Yellow => "yellow",
            Category::Red => "red",
            Category::Orange => "orange",
            Category::Blue => "blue",
            Category::Green => "green",
        }
    }

    /// Cube face associated with the color.
    pub fn face_name(self) -> &'static str {
        match self {
            Category::White => "Frente",
            Category::Yellow => "Atras",
            Category::Red => "Encima",
            Category::Orange => "Embaixo",
            Category::Blue => "Direita",
            Category::Green => "Esquerda",
        }
    }

    /// Lenient parse used on classifier output: anything outside the known set
    /// (including the literal "unknown") maps to `None`.
    pub fn parse_guess(label: &str) -> Option<Category> {
        label.parse().ok()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let label = s.trim().to_lowercase();
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == label)
            .ok_or_else(|| anyhow!("unknown category label: {:?}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("RED".parse::<Category>().unwrap(), Category::Red);
        assert_eq!(" Blue ".parse::<Category>().unwrap(), Category::Blue);
    }

    #[test]
    fn unknown_labels_are_none() {
        assert_eq!(Category::parse_guess("unknown"), None);
        assert_eq!(Category::parse_guess("red2"), None);
        assert_eq!(Category::parse_guess(""), None);
    }

    #[test]
    fn ordering_follows_declaration() {
        let mut shuffled = vec![Category::Green, Category::White, Category::Red];
        shuffled.sort();
        assert_eq!(
            shuffled,
            vec![Category::White, Category::Red, Category::Green]
        );
    }

    #[test]
    fn face_names_are_distinct() {
        let mut faces: Vec<_> = Category::ALL.iter().map(|c| c.face_name()).collect();
        faces.sort();
        faces.dedup();
        assert_eq!(faces.len(), Category::ALL.len());
    }

    #[test]
    fn serde_uses_lowercase_labels() {
        let json = serde_json::to_string(&Category::Orange).unwrap();
        assert_eq!(json, "\"orange\"");
        let back: Category = serde_json::from_str("\"yellow\"").unwrap();
        assert_eq!(back, Category::Yellow);
    }
}
