use std::fmt::{Display, Formatter};

use anyhow::Result;
use ql::prelude::{Action, ModelActionType, QlError};

/// The two things a player can do
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum JumpAction {
    Idle,
    Jump,
}

impl Action for JumpAction {
    const ACTION_SPACE: ModelActionType = 2;

    fn numeric(&self) -> ModelActionType {
        match self {
            JumpAction::Idle => 0,
            JumpAction::Jump => 1,
        }
    }

    fn try_from_numeric(value: ModelActionType) -> Result<Self> {
        match value {
            0 => Ok(JumpAction::Idle),
            1 => Ok(JumpAction::Jump),
            _ => Err(QlError(format!("action value {} out of range (0..{})", value, Self::ACTION_SPACE)).into()),
        }
    }
}

impl Display for JumpAction {
    fn fmt(
        &self,
        f: &mut Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}
