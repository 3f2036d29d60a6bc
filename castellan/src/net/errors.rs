//! Wire-level error taxonomy.
//!
//! Every failure a client can observe collapses into one of these kinds;
//! the engine's `GameError` carries the detail and maps onto a kind here.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;

use crate::game::GameError;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Validation,
    Unauthorized,
    IllegalPhase,
    IllegalAction,
    NotFound,
    Conflict,
    Overload,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Validation => "VALIDATION",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::IllegalPhase => "ILLEGAL_PHASE",
            Self::IllegalAction => "ILLEGAL_ACTION",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::Overload => "OVERLOAD",
            Self::Internal => "INTERNAL",
        };
        write!(f, "{repr}")
    }
}

impl From<&GameError> for ErrorKind {
    fn from(err: &GameError) -> Self {
        match err {
            GameError::NotHost => Self::Unauthorized,
            GameError::IllegalPhase { .. } | GameError::GameAlreadyStarted => Self::IllegalPhase,
            GameError::NotYourTurn
            | GameError::IllegalPieces
            | GameError::WrongCount { .. }
            | GameError::IllegalDeclaration { .. }
            | GameError::RoomFull
            | GameError::SeatOccupied { .. }
            | GameError::NameTaken { .. }
            | GameError::SeatsUnfilled { .. } => Self::IllegalAction,
            GameError::NoSuchSeat { .. } | GameError::SeatEmpty { .. } => Self::NotFound,
            GameError::SafeMode | GameError::Internal(_) => Self::Internal,
        }
    }
}

/// A typed error destined for one channel.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct WireError {
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl WireError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl From<&GameError> for WireError {
    fn from(err: &GameError) -> Self {
        let wire = Self::new(ErrorKind::from(err), err.to_string());
        match err {
            // Scenario-visible detail: the legal set the client may retry with.
            GameError::IllegalDeclaration { allowed, .. } => {
                wire.with_details(json!({ "allowed_declarations": allowed }))
            }
            GameError::WrongCount { expected, got } => {
                wire.with_details(json!({ "expected": expected, "got": got }))
            }
            _ => wire,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_serialize_screaming_snake() {
        assert_eq!(
            serde_json::to_value(ErrorKind::IllegalAction).unwrap(),
            serde_json::json!("ILLEGAL_ACTION")
        );
        assert_eq!(
            serde_json::to_value(ErrorKind::NotFound).unwrap(),
            serde_json::json!("NOT_FOUND")
        );
    }

    #[test]
    fn illegal_declaration_carries_the_allowed_set() {
        let err = GameError::IllegalDeclaration {
            value: 1,
            allowed: vec![0, 2, 3, 4, 5, 6, 7, 8],
        };
        let wire = WireError::from(&err);
        assert_eq!(wire.kind, ErrorKind::IllegalAction);
        assert_eq!(
            wire.details.unwrap()["allowed_declarations"],
            serde_json::json!([0, 2, 3, 4, 5, 6, 7, 8])
        );
    }

    #[test]
    fn host_violations_are_unauthorized() {
        assert_eq!(ErrorKind::from(&GameError::NotHost), ErrorKind::Unauthorized);
    }
}
