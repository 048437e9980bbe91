use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One user's reaction to a post or comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub user_id: Uuid,
    pub is_like: bool,
    pub display_name: String,
}

/// A per-item reaction ledger: at most one entry per user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReactionSet(Vec<Reaction>);

/// What a toggle did to the set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionOutcome {
    /// New entry appended.
    Added,
    /// Existing entry switched like<->dislike in place.
    Replaced,
    /// Same reaction applied twice: entry removed.
    Removed,
}

impl ReactionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deserialization adapter for the `likes` column. The stored value has
    /// historically been a JSON array, a doubly-encoded JSON string, or
    /// NULL/empty; this is the single place those encodings are reconciled.
    /// Unreadable values decode as the empty set.
    pub fn from_column(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Self::default();
        };
        let raw = raw.trim();
        if raw.is_empty() {
            return Self::default();
        }
        if let Ok(entries) = serde_json::from_str::<Vec<Reaction>>(raw) {
            return Self(entries);
        }
        // Doubly-encoded: a JSON string containing the array.
        if let Ok(inner) = serde_json::from_str::<String>(raw) {
            if let Ok(entries) = serde_json::from_str::<Vec<Reaction>>(&inner) {
                return Self(entries);
            }
        }
        Self::default()
    }

    /// Canonical column encoding: always a JSON array.
    pub fn to_column(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_else(|_| "[]".into())
    }

    /// Apply a like/dislike from `user_id`. Same reaction twice removes it,
    /// the opposite reaction replaces the entry in place, otherwise a new
    /// entry is appended. The set never holds two entries for one user.
    pub fn toggle(&mut self, user_id: Uuid, is_like: bool, display_name: &str) -> ReactionOutcome {
        if let Some(pos) = self.0.iter().position(|r| r.user_id == user_id) {
            if self.0[pos].is_like == is_like {
                self.0.remove(pos);
                ReactionOutcome::Removed
            } else {
                self.0[pos] = Reaction {
                    user_id,
                    is_like,
                    display_name: display_name.to_string(),
                };
                ReactionOutcome::Replaced
            }
        } else {
            self.0.push(Reaction {
                user_id,
                is_like,
                display_name: display_name.to_string(),
            });
            ReactionOutcome::Added
        }
    }

    pub fn count(&self, is_like: bool) -> usize {
        self.0.iter().filter(|r| r.is_like == is_like).count()
    }

    /// `Some(true)` = liked, `Some(false)` = disliked, `None` = no reaction.
    pub fn status_for(&self, user_id: Uuid) -> Option<bool> {
        self.0
            .iter()
            .find(|r| r.user_id == user_id)
            .map(|r| r.is_like)
    }

    pub fn display_names(&self, is_like: bool) -> Vec<String> {
        self.0
            .iter()
            .filter(|r| r.is_like == is_like)
            .map(|r| r.display_name.clone())
            .collect()
    }

    /// Likes minus dislikes; drives the "popular" post ordering.
    pub fn score(&self) -> i64 {
        self.count(true) as i64 - self.count(false) as i64
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Reaction> {
        self.0.iter()
    }
}
