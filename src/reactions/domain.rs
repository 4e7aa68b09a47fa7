// Reaction values and their SQLite column encoding
use std::fmt;
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

use crate::db::models::{CommentId, PostId};

/// A non-neutral position on a target. Neutral is `Option::<Stance>::None`,
/// so "liked and disliked" has no representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stance {
    Like,
    Dislike,
}

impl Stance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stance::Like => "like",
            Stance::Dislike => "dislike",
        }
    }

    /// The toggle state machine.
    ///
    /// Pressing the button matching the current stance returns to neutral;
    /// any other press moves to the pressed stance.
    pub fn toggle(current: Option<Stance>, pressed: Stance) -> Option<Stance> {
        match current {
            Some(stance) if stance == pressed => None,
            _ => Some(pressed),
        }
    }
}

impl fmt::Display for Stance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown stance: {0}")]
pub struct UnknownStance(pub String);

impl FromStr for Stance {
    type Err = UnknownStance;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "like" => Ok(Stance::Like),
            "dislike" => Ok(Stance::Dislike),
            other => Err(UnknownStance(other.to_string())),
        }
    }
}

impl ToSql for Stance {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Stance {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Post,
    Comment,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Post => "post",
            TargetKind::Comment => "comment",
        }
    }
}

impl ToSql for TargetKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

/// What a reaction is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReactionTarget {
    Post(PostId),
    Comment(CommentId),
}

impl ReactionTarget {
    pub fn kind(&self) -> TargetKind {
        match self {
            ReactionTarget::Post(_) => TargetKind::Post,
            ReactionTarget::Comment(_) => TargetKind::Comment,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            ReactionTarget::Post(id) => id.0,
            ReactionTarget::Comment(id) => id.0,
        }
    }
}

impl fmt::Display for ReactionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind().as_str(), self.id())
    }
}

/// Aggregate likes/dislikes on one target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counts {
    pub likes: i64,
    pub dislikes: i64,
}

/// What a toggle left behind: the actor's stance and the new totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReactionOutcome {
    pub stance: Option<Stance>,
    pub counts: Counts,
}

#[cfg(test)]
mod tests {
    use super::*;

    use Stance::{Dislike, Like};

    #[test]
    fn toggle_table() {
        let table = [
            (None, Like, Some(Like)),
            (None, Dislike, Some(Dislike)),
            (Some(Like), Like, None),
            (Some(Like), Dislike, Some(Dislike)),
            (Some(Dislike), Like, Some(Like)),
            (Some(Dislike), Dislike, None),
        ];
        for (current, pressed, expected) in table {
            assert_eq!(
                Stance::toggle(current, pressed),
                expected,
                "{:?} + {:?}",
                current,
                pressed
            );
        }
    }

    #[test]
    fn like_like_returns_to_neutral() {
        let s = Stance::toggle(None, Like);
        assert_eq!(Stance::toggle(s, Like), None);
    }

    #[test]
    fn like_dislike_dislike_ends_neutral() {
        let s = Stance::toggle(None, Like);
        let s = Stance::toggle(s, Dislike);
        assert_eq!(s, Some(Dislike));
        assert_eq!(Stance::toggle(s, Dislike), None);
    }

    #[test]
    fn stance_parses_form_values() {
        assert_eq!("like".parse::<Stance>(), Ok(Like));
        assert_eq!("dislike".parse::<Stance>(), Ok(Dislike));
        assert_eq!(
            "both".parse::<Stance>(),
            Err(UnknownStance("both".to_string()))
        );
    }

    #[test]
    fn target_accessors() {
        let t = ReactionTarget::Comment(CommentId(9));
        assert_eq!(t.kind(), TargetKind::Comment);
        assert_eq!(t.id(), 9);
        assert_eq!(t.to_string(), "comment 9");
    }
}
