use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cpq::bom::BomResult;
use crate::cpq::classifier::ClassificationResult;
use crate::cpq::pricing::PricingResult;
use crate::cpq::risk::{RiskLevel, SreResult};
use crate::cpq::validation::ValidationResult;
use crate::domain::request::QuoteRequest;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuotationId(pub String);

impl QuotationId {
    pub fn generate() -> Self {
        Self(format!("QT-{}", Uuid::new_v4()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatingMode {
    Informational,
    InternalEstimate,
    Formal,
}

impl OperatingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Informational => "informational",
            Self::InternalEstimate => "internal_estimate",
            Self::Formal => "formal",
        }
    }
}

impl std::str::FromStr for OperatingMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "informational" | "info" => Ok(Self::Informational),
            "internal_estimate" | "estimate" | "internal" => Ok(Self::InternalEstimate),
            "formal" => Ok(Self::Formal),
            other => Err(format!(
                "unsupported operating mode `{other}` (expected informational|internal_estimate|formal)"
            )),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotationStatus {
    Draft,
    Validated,
    RequiresReview,
    Blocked,
}

/// A default value the pipeline used in place of customer data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assumption {
    pub field: String,
    pub value: String,
    pub reason: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuotationOutput {
    pub id: QuotationId,
    pub correlation_id: String,
    pub created_at: DateTime<Utc>,
    pub catalog_fingerprint: String,
    pub mode: OperatingMode,
    pub level: RiskLevel,
    pub status: QuotationStatus,
    pub confidence_score: f64,
    pub assumptions_used: Vec<Assumption>,
    pub classification: ClassificationResult,
    /// Request after default assumptions were applied.
    pub request: QuoteRequest,
    pub risk: SreResult,
    pub bom: BomResult,
    pub pricing: PricingResult,
    pub validation: ValidationResult,
}

impl QuotationOutput {
    pub fn is_blocked(&self) -> bool {
        self.status == QuotationStatus::Blocked
    }
}

#[cfg(test)]
mod tests {
    use super::{OperatingMode, QuotationId};

    #[test]
    fn generated_ids_carry_prefix_and_are_unique() {
        let first = QuotationId::generate();
        let second = QuotationId::generate();
        assert!(first.0.starts_with("QT-"));
        assert_ne!(first, second);
    }

    #[test]
    fn operating_mode_parses_cli_spellings() {
        assert_eq!("internal-estimate".parse::<OperatingMode>(), Ok(OperatingMode::InternalEstimate));
        assert_eq!("FORMAL".parse::<OperatingMode>(), Ok(OperatingMode::Formal));
        assert!("strict".parse::<OperatingMode>().is_err());
    }
}
