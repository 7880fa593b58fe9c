//! Dialogue state: which answer the bot is waiting for, and what has
//! been collected so far.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::pricing::Price;

/// Material (and subtype, if the material has them) picked by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub material: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
}

/// A fully specified order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub selection: Selection,
    /// Meters.
    pub width: Decimal,
    /// Meters.
    pub height: Decimal,
    pub quantity: u32,
}

/// The current step, carrying exactly the answers collected before it.
///
/// Progresses linearly: AwaitingMaterial → [AwaitingSubtype] →
/// AwaitingWidth → AwaitingHeight → AwaitingQuantity → Completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    AwaitingMaterial,
    AwaitingSubtype {
        material: String,
    },
    AwaitingWidth {
        selection: Selection,
    },
    AwaitingHeight {
        selection: Selection,
        width: Decimal,
    },
    AwaitingQuantity {
        selection: Selection,
        width: Decimal,
        height: Decimal,
    },
    Completed {
        order: Order,
        price: Price,
    },
}

impl Step {
    pub fn kind(&self) -> StepKind {
        match self {
            Self::AwaitingMaterial => StepKind::AwaitingMaterial,
            Self::AwaitingSubtype { .. } => StepKind::AwaitingSubtype,
            Self::AwaitingWidth { .. } => StepKind::AwaitingWidth,
            Self::AwaitingHeight { .. } => StepKind::AwaitingHeight,
            Self::AwaitingQuantity { .. } => StepKind::AwaitingQuantity,
            Self::Completed { .. } => StepKind::Completed,
        }
    }
}

/// Field-less mirror of [`Step`] for logging and transition checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    AwaitingMaterial,
    AwaitingSubtype,
    AwaitingWidth,
    AwaitingHeight,
    AwaitingQuantity,
    Completed,
}

impl StepKind {
    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: StepKind) -> bool {
        use StepKind::*;
        matches!(
            (self, target),
            (AwaitingMaterial, AwaitingSubtype)
                | (AwaitingMaterial, AwaitingWidth)
                | (AwaitingSubtype, AwaitingWidth)
                | (AwaitingWidth, AwaitingHeight)
                | (AwaitingHeight, AwaitingQuantity)
                | (AwaitingQuantity, Completed)
        )
    }
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::AwaitingMaterial => "awaiting_material",
            Self::AwaitingSubtype => "awaiting_subtype",
            Self::AwaitingWidth => "awaiting_width",
            Self::AwaitingHeight => "awaiting_height",
            Self::AwaitingQuantity => "awaiting_quantity",
            Self::Completed => "completed",
        };
        write!(f, "{s}")
    }
}

/// One user's pricing conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub step: Step,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// A fresh session waiting for the material choice.
    pub fn new(user_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            step: Step::AwaitingMaterial,
            started_at: now,
            updated_at: now,
        }
    }

    pub fn kind(&self) -> StepKind {
        self.step.kind()
    }

    /// Move to `next`. Returns an error if the step order would be violated.
    pub fn advance(&mut self, next: Step, now: DateTime<Utc>) -> Result<StepKind, String> {
        let (from, to) = (self.kind(), next.kind());
        if !from.can_transition_to(to) {
            return Err(format!("Cannot transition from {from} to {to}"));
        }
        self.step = next;
        self.updated_at = now;
        Ok(to)
    }
}
