use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use crate::model::statutory::StatutoryKind;

/// Whether a line item adds to or subtracts from net pay.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FieldType {
    Earning,
    Deduction,
}

impl FieldType {
    /// Signed contribution of a stored (non-negative) amount.
    pub fn signed(self, amount: Decimal) -> Decimal {
        match self {
            FieldType::Earning => amount,
            FieldType::Deduction => -amount,
        }
    }
}

/// Reference to the base a derived field is computed from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldRef {
    /// Another field in the same template, by name.
    Field(String),
    /// Sum of all earnings that are not themselves derived from gross.
    Gross,
}

impl std::fmt::Display for FieldRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldRef::Field(name) => write!(f, "{}", name),
            FieldRef::Gross => write!(f, "gross"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CalculationBasis {
    Fixed {
        #[serde(default)]
        prorate: bool,
    },
    PercentageOf {
        base: FieldRef,
        /// Fraction, `0.40` for 40%.
        percentage: Decimal,
    },
    Statutory {
        statutory: StatutoryKind,
        base: FieldRef,
    },
    PerOvertimeHour {
        rate: Decimal,
    },
}

impl CalculationBasis {
    pub fn base(&self) -> Option<&FieldRef> {
        match self {
            CalculationBasis::PercentageOf { base, .. } | CalculationBasis::Statutory { base, .. } => {
                Some(base)
            }
            CalculationBasis::Fixed { .. } | CalculationBasis::PerOvertimeHour { .. } => None,
        }
    }
}

impl Default for CalculationBasis {
    fn default() -> Self {
        CalculationBasis::Fixed { prorate: false }
    }
}

/// Company-level definition of an earning or deduction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentField {
    pub id: u64,
    pub company_id: u64,
    pub name: String,
    pub field_type: FieldType,
    pub default_amount: Option<Decimal>,
    #[serde(default)]
    pub calculation_basis: CalculationBasis,
}
