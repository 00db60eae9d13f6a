//! Order stages and actor roles.
//!
//! Both are closed enumerations. Their wire form (serde and `Display`) is
//! the stable string used in audit exports and configuration files:
//! `SCREAMING_SNAKE_CASE` for stages, lowercase for roles.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One discrete position in an order's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Placed,
    Confirmed,
    Preparing,
    ReadyForPickup,
    PickedUp,
    Delivered,
    Cancelled,
}

impl Stage {
    /// Stage every new order starts in.
    pub const INITIAL: Stage = Stage::Placed;

    /// All stages in lifecycle order.
    pub const ALL: [Stage; 7] = [
        Stage::Placed,
        Stage::Confirmed,
        Stage::Preparing,
        Stage::ReadyForPickup,
        Stage::PickedUp,
        Stage::Delivered,
        Stage::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Placed => "PLACED",
            Stage::Confirmed => "CONFIRMED",
            Stage::Preparing => "PREPARING",
            Stage::ReadyForPickup => "READY_FOR_PICKUP",
            Stage::PickedUp => "PICKED_UP",
            Stage::Delivered => "DELIVERED",
            Stage::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a stage or role name does not parse.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}' (expected one of: {expected})")]
pub struct ParseNameError {
    pub kind: &'static str,
    pub value: String,
    pub expected: String,
}

impl FromStr for Stage {
    type Err = ParseNameError;

    /// Accepts the canonical name in any ASCII case, with `-` or `_`
    /// separators (`ready-for-pickup`, `READY_FOR_PICKUP`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        Stage::ALL
            .into_iter()
            .find(|stage| stage.as_str() == normalized)
            .ok_or_else(|| ParseNameError {
                kind: "stage",
                value: s.to_string(),
                expected: Stage::ALL
                    .iter()
                    .map(|st| st.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}

/// The capacity in which a request is made. Distinct from actor identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorRole {
    Customer,
    Restaurant,
    Driver,
    Admin,
}

impl ActorRole {
    pub const ALL: [ActorRole; 4] = [
        ActorRole::Customer,
        ActorRole::Restaurant,
        ActorRole::Driver,
        ActorRole::Admin,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActorRole::Customer => "customer",
            ActorRole::Restaurant => "restaurant",
            ActorRole::Driver => "driver",
            ActorRole::Admin => "admin",
        }
    }
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActorRole {
    type Err = ParseNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        ActorRole::ALL
            .into_iter()
            .find(|role| role.as_str() == normalized)
            .ok_or_else(|| ParseNameError {
                kind: "actor role",
                value: s.to_string(),
                expected: ActorRole::ALL
                    .iter()
                    .map(|r| r.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_wire_names_match_display() {
        for stage in Stage::ALL {
            let json = serde_json::to_string(&stage).unwrap();
            assert_eq!(json, format!("\"{}\"", stage));
        }
    }

    #[test]
    fn stage_parses_loose_spellings() {
        assert_eq!("ready-for-pickup".parse::<Stage>(), Ok(Stage::ReadyForPickup));
        assert_eq!("picked_up".parse::<Stage>(), Ok(Stage::PickedUp));
        assert_eq!(" DELIVERED ".parse::<Stage>(), Ok(Stage::Delivered));
    }

    #[test]
    fn unknown_stage_lists_expected_names() {
        let err = "SHIPPED".parse::<Stage>().unwrap_err();
        assert_eq!(err.value, "SHIPPED");
        assert!(err.expected.contains("READY_FOR_PICKUP"));
        assert!(err.to_string().contains("unknown stage 'SHIPPED'"));
    }

    #[test]
    fn role_round_trips_through_serde() {
        let role: ActorRole = serde_json::from_str("\"driver\"").unwrap();
        assert_eq!(role, ActorRole::Driver);
        assert_eq!(serde_json::to_string(&ActorRole::Admin).unwrap(), "\"admin\"");
    }

    #[test]
    fn role_typo_is_rejected() {
        assert!("drivr".parse::<ActorRole>().is_err());
        assert_eq!("Restaurant".parse::<ActorRole>(), Ok(ActorRole::Restaurant));
    }
}
