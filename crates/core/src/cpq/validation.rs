use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::cpq::bom::BomResult;
use crate::cpq::pricing::PricingResult;
use crate::cpq::risk::{SpanStatus, SreResult};
use crate::domain::quotation::OperatingMode;
use crate::domain::request::QuoteRequest;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationLayer {
    Integrity,
    Technical,
    Commercial,
    Mathematical,
}

impl ValidationLayer {
    pub fn letter(&self) -> char {
        match self {
            Self::Integrity => 'A',
            Self::Technical => 'B',
            Self::Commercial => 'C',
            Self::Mathematical => 'D',
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub layer: ValidationLayer,
    pub code: String,
    pub severity: Severity,
    pub message: String,
    #[serde(default)]
    pub downgraded: bool,
}

impl ValidationIssue {
    fn new(layer: ValidationLayer, code: &str, severity: Severity, message: impl Into<String>) -> Self {
        Self { layer, code: code.to_string(), severity, message: message.into(), downgraded: false }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub issues: Vec<ValidationIssue>,
    pub critical_count: usize,
    pub warning_count: usize,
    pub can_emit_formal: bool,
    pub span_status: SpanStatus,
}

impl ValidationResult {
    pub fn has_code(&self, code: &str) -> bool {
        self.issues.iter().any(|issue| issue.code == code)
    }

    pub fn has_mathematical_critical(&self) -> bool {
        self.issues.iter().any(|issue| {
            issue.layer == ValidationLayer::Mathematical && issue.severity == Severity::Critical
        })
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ValidationInput<'a> {
    pub request: &'a QuoteRequest,
    pub risk: &'a SreResult,
    pub bom: &'a BomResult,
    pub pricing: &'a PricingResult,
    pub mode: OperatingMode,
}

pub trait ValidationEngine: Send + Sync {
    fn validate(&self, input: &ValidationInput<'_>) -> ValidationResult;
}

#[derive(Clone, Debug, Default)]
pub struct DeterministicValidationEngine;

impl ValidationEngine for DeterministicValidationEngine {
    fn validate(&self, input: &ValidationInput<'_>) -> ValidationResult {
        validate_quotation(input)
    }
}

pub fn validate_quotation(input: &ValidationInput<'_>) -> ValidationResult {
    let mut issues = Vec::new();
    integrity_checks(input, &mut issues);
    technical_checks(input, &mut issues);
    commercial_checks(input, &mut issues);
    mathematical_checks(input, &mut issues);

    let issues = apply_mode_policy(issues, input.mode);
    let critical_count = issues.iter().filter(|issue| issue.severity == Severity::Critical).count();
    let warning_count = issues.iter().filter(|issue| issue.severity == Severity::Warning).count();

    tracing::debug!(
        event_name = "quote.validation.completed",
        mode = input.mode.as_str(),
        critical_count,
        warning_count,
        "quotation validated"
    );

    ValidationResult {
        issues,
        critical_count,
        warning_count,
        can_emit_formal: input.mode == OperatingMode::Formal && critical_count == 0,
        span_status: input.risk.span_status,
    }
}

/// Outside formal mode, critical issues of layers A to C become warnings.
/// Mathematical issues keep their severity in every mode.
pub fn apply_mode_policy(issues: Vec<ValidationIssue>, mode: OperatingMode) -> Vec<ValidationIssue> {
    issues
        .into_iter()
        .map(|mut issue| {
            if downgrades(issue.layer, mode) && issue.severity == Severity::Critical {
                issue.severity = Severity::Warning;
                issue.downgraded = true;
            }
            issue
        })
        .collect()
}

fn downgrades(layer: ValidationLayer, mode: OperatingMode) -> bool {
    match (layer, mode) {
        (ValidationLayer::Mathematical, _) => false,
        (_, OperatingMode::Formal) => false,
        (_, OperatingMode::InternalEstimate | OperatingMode::Informational) => true,
    }
}

fn integrity_checks(input: &ValidationInput<'_>, issues: &mut Vec<ValidationIssue>) {
    let layer = ValidationLayer::Integrity;
    if input.request.family.is_none() {
        issues.push(ValidationIssue::new(layer, "FAMILY_MISSING", Severity::Critical, "product family not identified"));
    }
    if input.request.thickness_mm.is_none() {
        issues.push(ValidationIssue::new(layer, "THICKNESS_MISSING", Severity::Critical, "panel thickness not given"));
    }
    if !input.pricing.missing_prices.is_empty() {
        let skus = input.pricing.missing_prices.iter().map(|missing| missing.sku.as_str()).collect::<Vec<_>>();
        issues.push(ValidationIssue::new(
            layer,
            "PRICES_MISSING",
            Severity::Critical,
            format!("items without catalog price: {}", skus.join(", ")),
        ));
    }
}

fn technical_checks(input: &ValidationInput<'_>, issues: &mut Vec<ValidationIssue>) {
    let layer = ValidationLayer::Technical;
    if input.request.is_roof() && input.request.span_m.is_none() {
        issues.push(ValidationIssue::new(layer, "SPAN_MISSING", Severity::Critical, "roof request without span"));
    }

    match input.risk.span_status {
        SpanStatus::ExceedsCapacity => {
            let ratio = input.risk.span_ratio.unwrap_or_default();
            let alternatives = if input.risk.alternative_thicknesses.is_empty() {
                "no thicker panel of the same family covers it".to_string()
            } else {
                let listed = input
                    .risk
                    .alternative_thicknesses
                    .iter()
                    .map(|thickness| format!("{thickness} mm"))
                    .collect::<Vec<_>>();
                format!("consider {}", listed.join(" or "))
            };
            issues.push(ValidationIssue::new(
                layer,
                "SPAN_EXCEEDS_CAPACITY",
                Severity::Critical,
                format!("span is {:.0}% of panel capacity; {alternatives}", ratio * 100.0),
            ));
        }
        SpanStatus::NotVerified if input.request.span_m.is_some() => {
            issues.push(ValidationIssue::new(
                layer,
                "SPAN_NOT_VERIFIED",
                Severity::Warning,
                "span capacity could not be checked against the span table",
            ));
        }
        _ => {}
    }

    if input.bom.items.is_empty() {
        issues.push(ValidationIssue::new(layer, "BOM_EMPTY", Severity::Critical, "bill of materials is empty"));
    }
}

fn commercial_checks(input: &ValidationInput<'_>, issues: &mut Vec<ValidationIssue>) {
    let layer = ValidationLayer::Commercial;
    if input.request.shipping_requested && input.request.location.is_none() {
        issues.push(ValidationIssue::new(
            layer,
            "SHIPPING_LOCATION_MISSING",
            Severity::Critical,
            "shipping requested without a destination",
        ));
    }
    if input.request.is_roof() && input.bom.accessory_count() == 0 {
        issues.push(ValidationIssue::new(
            layer,
            "ROOF_ACCESSORIES_MISSING",
            Severity::Warning,
            "roof quotation lists no accessories",
        ));
    }
}

fn mathematical_checks(input: &ValidationInput<'_>, issues: &mut Vec<ValidationIssue>) {
    let layer = ValidationLayer::Mathematical;
    if !input.bom.items.is_empty() && input.pricing.grand_subtotal <= Decimal::ZERO {
        issues.push(ValidationIssue::new(
            layer,
            "TOTAL_NOT_POSITIVE",
            Severity::Critical,
            "bill of materials has items but the total is not positive",
        ));
    }
    if !input.pricing.is_consistent() {
        issues.push(ValidationIssue::new(
            layer,
            "SUBTOTAL_MISMATCH",
            Severity::Critical,
            format!(
                "panel {} + accessories {} does not match total {}",
                input.pricing.panel_subtotal, input.pricing.accessory_subtotal, input.pricing.grand_subtotal
            ),
        ));
    }
}
