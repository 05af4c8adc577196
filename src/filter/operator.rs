//! Filter operators and their wire symbols

use serde::{Deserialize, Serialize};
use std::fmt;

/// Comparison operator of a filter condition
///
/// Each variant carries its wire symbol and whether it accepts the
/// negate / case-insensitive modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operator {
    /// Equal
    Eq,
    /// Greater than
    Gt,
    /// Greater than or equal
    Gte,
    /// Less than
    Lt,
    /// Less than or equal
    Lte,
    /// Substring match
    Contains,
    /// Prefix match
    StartsWith,
    /// Suffix match
    EndsWith,
}

impl Operator {
    /// Every operator, in the order a selection menu lists them
    pub const ALL: [Operator; 8] = [
        Operator::Eq,
        Operator::Gt,
        Operator::Gte,
        Operator::Lt,
        Operator::Lte,
        Operator::Contains,
        Operator::StartsWith,
        Operator::EndsWith,
    ];

    /// Symbol the backend expects after `field=`
    pub const fn symbol(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Gt => ">>",
            Operator::Gte => ">=",
            Operator::Lt => "<<",
            Operator::Lte => "<=",
            Operator::Contains => "@",
            Operator::StartsWith => "^",
            Operator::EndsWith => "$",
        }
    }

    /// Whether negation and case-insensitivity apply to this operator
    pub const fn modifiers(self) -> bool {
        matches!(
            self,
            Operator::Eq | Operator::Contains | Operator::StartsWith | Operator::EndsWith
        )
    }

    /// Short name used in configs and CLI arguments
    pub const fn name(self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::Contains => "contains",
            Operator::StartsWith => "startsWith",
            Operator::EndsWith => "endsWith",
        }
    }

    /// Look up an operator by its short name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
