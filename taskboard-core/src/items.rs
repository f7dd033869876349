// SPDX-License-Identifier: MIT OR Apache-2.0

//! Draggable list items and the scopes they are ordered in.
//!
//! Every item lives inside exactly one parent scope: cards inside stacks, stacks inside panels and
//! panels inside boards. Within a scope the positions of all siblings form a dense, zero-based
//! sequence `0..N`.
use std::fmt::Display;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Id;

/// Zero-based position of an item inside its scope.
pub type Position = i64;

/// The three levels of ordered items.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Panel,
    Stack,
    Card,
}

impl ItemKind {
    pub const ALL: [ItemKind; 3] = [ItemKind::Panel, ItemKind::Stack, ItemKind::Card];

    /// Kind of the scope items of this kind are ordered in.
    pub fn scope(&self) -> ScopeKind {
        match self {
            ItemKind::Panel => ScopeKind::Board,
            ItemKind::Stack => ScopeKind::Panel,
            ItemKind::Card => ScopeKind::Stack,
        }
    }

    /// Kind of the items which use an item of this kind as their scope.
    pub fn children(&self) -> Option<ItemKind> {
        match self {
            ItemKind::Panel => Some(ItemKind::Stack),
            ItemKind::Stack => Some(ItemKind::Card),
            ItemKind::Card => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Panel => "panel",
            ItemKind::Stack => "stack",
            ItemKind::Card => "card",
        }
    }
}

impl Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Containers items can be ordered in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeKind {
    Board,
    Panel,
    Stack,
}

impl ScopeKind {
    /// Returns the item kind when the scope itself is an ordered item.
    pub fn as_item(&self) -> Option<ItemKind> {
        match self {
            ScopeKind::Board => None,
            ScopeKind::Panel => Some(ItemKind::Panel),
            ScopeKind::Stack => Some(ItemKind::Stack),
        }
    }

    /// Item kind which is ordered inside this scope.
    pub fn items(&self) -> ItemKind {
        match self {
            ScopeKind::Board => ItemKind::Panel,
            ScopeKind::Panel => ItemKind::Stack,
            ScopeKind::Stack => ItemKind::Card,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeKind::Board => "board",
            ScopeKind::Panel => "panel",
            ScopeKind::Stack => "stack",
        }
    }
}

impl Display for ScopeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// User-editable fields of an ordered item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFields {
    pub title: String,
    pub description: Option<String>,
}

impl ItemFields {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Checks that the title is present.
    pub fn validate(&self) -> Result<(), ItemError> {
        if self.title.trim().is_empty() {
            return Err(ItemError::EmptyTitle);
        }
        Ok(())
    }
}

/// A card, stack or panel with its position inside its parent scope.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderedItem {
    pub id: Id,
    pub kind: ItemKind,
    pub scope: Id,
    pub position: Position,
    #[serde(flatten)]
    pub fields: ItemFields,
}

/// Requested changes of an ordered item.
///
/// Both parts are optional. Field changes and the move are applied together or not at all.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemUpdate {
    pub fields: Option<ItemFields>,
    pub position: Option<Position>,
}

impl ItemUpdate {
    pub fn fields(fields: ItemFields) -> Self {
        Self {
            fields: Some(fields),
            position: None,
        }
    }

    pub fn position(position: Position) -> Self {
        Self {
            fields: None,
            position: Some(position),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ItemError {
    #[error("title can not be empty")]
    EmptyTitle,
}
