//! Offline quality scoring for finished quotations.
//!
//! A report starts from 100, subtracts penalties, adds bonuses and is clamped
//! to `[0, 100]`. Every adjustment is listed so regressions can be traced to
//! the rule that moved the score. Nothing here runs on the live request path.

pub mod harness;

use serde::{Deserialize, Serialize};

use crate::cpq::risk::SpanStatus;
use crate::domain::quotation::{OperatingMode, QuotationOutput, QuotationStatus};

pub const BASE_SCORE: i32 = 100;

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Adjustment {
    pub code: String,
    /// Negative for penalties, positive for bonuses.
    pub points: i32,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityReport {
    pub score: u32,
    pub adjustments: Vec<Adjustment>,
}

impl QualityReport {
    pub fn penalties(&self) -> impl Iterator<Item = &Adjustment> {
        self.adjustments.iter().filter(|adjustment| adjustment.points < 0)
    }

    pub fn bonuses(&self) -> impl Iterator<Item = &Adjustment> {
        self.adjustments.iter().filter(|adjustment| adjustment.points > 0)
    }

    pub fn has(&self, code: &str) -> bool {
        self.adjustments.iter().any(|adjustment| adjustment.code == code)
    }
}

// ---------------------------------------------------------------------------
// Evaluator
// ---------------------------------------------------------------------------

pub trait QualityEvaluator: Send + Sync {
    fn evaluate(&self, output: &QuotationOutput) -> QualityReport;
}

#[derive(Clone, Debug, Default)]
pub struct DeterministicQualityEvaluator;

impl QualityEvaluator for DeterministicQualityEvaluator {
    fn evaluate(&self, output: &QuotationOutput) -> QualityReport {
        evaluate_quotation(output)
    }
}

pub fn evaluate_quotation(output: &QuotationOutput) -> QualityReport {
    let mut adjustments = Vec::new();
    let mut push = |code: &str, points: i32, detail: String| {
        adjustments.push(Adjustment { code: code.to_string(), points, detail });
    };

    let risk = &output.risk;
    let has_alternatives = !risk.alternative_thicknesses.is_empty();
    if risk.span_status == SpanStatus::ExceedsCapacity {
        if has_alternatives {
            push("SPAN_OVERRUN_WITH_ALTERNATIVE", -10, format!("span ratio {:?}", risk.span_ratio));
        } else {
            push("SPAN_OVERRUN", -30, format!("span ratio {:?} with no thicker option", risk.span_ratio));
        }
    }

    if !output.pricing.is_consistent() || output.validation.has_mathematical_critical() {
        push("MATH_INCONSISTENT", -25, "subtotals do not add up".to_string());
    }

    let missing = output.pricing.missing_prices.len();
    if missing > 0 {
        let points = match missing {
            1 => -10,
            2 => -15,
            _ => -20,
        };
        push("MISSING_PRICES", points, format!("{missing} item(s) without price"));
    }

    let notes = output.bom.notes.len();
    if notes > 0 {
        let points = -5 * i32::try_from(notes.min(3)).unwrap_or(3);
        push("BOM_NOTES", points, format!("{notes} bom note(s)"));
    }

    let criticals = output.validation.critical_count;
    if criticals > 0 {
        let extra = i32::try_from((criticals - 1).min(3)).unwrap_or(3);
        let points = -(15 + 5 * extra);
        push("CRITICAL_ISSUES", points, format!("{criticals} critical validation issue(s)"));
    }

    if output.mode == OperatingMode::InternalEstimate
        && output.status == QuotationStatus::Blocked
        && !output.validation.has_mathematical_critical()
    {
        push("UNNECESSARY_BLOCK", -10, "internal estimate blocked without math failure".to_string());
    }

    let undeclared = output
        .request
        .assumed_fields
        .iter()
        .filter(|field| !output.assumptions_used.iter().any(|assumption| &assumption.field == *field))
        .cloned()
        .collect::<Vec<_>>();
    if !undeclared.is_empty() {
        push("UNDECLARED_ASSUMPTION", -5, format!("assumed without record: {}", undeclared.join(", ")));
    }

    let request = &output.request;
    let otherwise_valid =
        request.family.is_some() && request.geometry.is_sizable() && criticals == 0;
    if otherwise_valid && !output.bom.has_panels() {
        push("NO_PANELS", -15, "sizable request produced no panels".to_string());
    }

    if has_alternatives {
        push("ALTERNATIVE_SUGGESTED", 5, format!("{:?} mm", risk.alternative_thicknesses));
    }
    if request.contact.is_complete() {
        push("CONTACT_COMPLETE", 2, "name and phone or email".to_string());
    }
    if risk.total <= 10 {
        push("VERY_LOW_RISK", 3, format!("sre {}", risk.total));
    }

    let raw = BASE_SCORE + adjustments.iter().map(|adjustment| adjustment.points).sum::<i32>();
    let score = u32::try_from(raw.clamp(0, 100)).unwrap_or(0);

    tracing::debug!(
        event_name = "quote.quality.evaluated",
        correlation_id = %output.correlation_id,
        score,
        adjustments = adjustments.len(),
        "quotation quality evaluated"
    );

    QualityReport { score, adjustments }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{evaluate_quotation, DeterministicQualityEvaluator, QualityEvaluator};
    use crate::cpq::bom::BomNote;
    use crate::cpq::catalog::{CatalogHandle, CatalogSnapshot};
    use crate::cpq::pricing::MissingPrice;
    use crate::cpq::risk::SpanStatus;
    use crate::cpq::{DefaultQuotationPipeline, PipelineSettings, QuotationPipeline, QuoteContext};
    use crate::domain::quotation::{OperatingMode, QuotationOutput, QuotationStatus};

    fn quote(text: &str, mode: Option<OperatingMode>) -> QuotationOutput {
        let snapshot = CatalogSnapshot::builtin().expect("builtin catalog");
        let pipeline = DefaultQuotationPipeline::with_settings(
            CatalogHandle::new(snapshot),
            PipelineSettings::default(),
        );
        pipeline.quote(text, &QuoteContext { mode_override: mode, correlation_id: None })
    }

    fn missing(sku: &str) -> MissingPrice {
        MissingPrice { sku: sku.to_string(), slot: None, reason: "test".to_string() }
    }

    fn note(code: &str) -> BomNote {
        BomNote { code: code.to_string(), message: "test".to_string() }
    }

    #[test]
    fn score_stays_within_bounds() {
        let mut output = quote("hola", None);
        output.pricing.missing_prices = vec![missing("A"), missing("B"), missing("C")];
        output.bom.notes = vec![note("A"), note("B"), note("C"), note("D")];
        output.validation.critical_count = 6;
        output.risk.span_status = SpanStatus::ExceedsCapacity;
        output.pricing.grand_subtotal = Decimal::ONE;

        let report = evaluate_quotation(&output);
        assert_eq!(report.score, 0);
        assert!(report.has("SPAN_OVERRUN"));
        assert!(report.has("MATH_INCONSISTENT"));
    }

    #[test]
    fn penalty_tiers_and_caps() {
        let mut output = quote("isodec eps 100 mm techo 10 x 5, estructura metalica, luz 3 m", None);
        output.pricing.missing_prices = vec![missing("A"), missing("B")];
        output.bom.notes = vec![note("A"), note("B"), note("C"), note("D")];
        output.validation.critical_count = 2;

        let report = evaluate_quotation(&output);
        let points = |code: &str| {
            report
                .adjustments
                .iter()
                .find(|adjustment| adjustment.code == code)
                .map(|adjustment| adjustment.points)
        };
        assert_eq!(points("MISSING_PRICES"), Some(-15));
        assert_eq!(points("BOM_NOTES"), Some(-15));
        assert_eq!(points("CRITICAL_ISSUES"), Some(-20));
    }

    #[test]
    fn overrun_with_alternative_is_softened_and_rewarded() {
        let output = quote("isoroof 3g 30 mm techo, luz 3.0 m, 8 paneles de 4 m", None);
        assert_eq!(output.risk.span_status, SpanStatus::ExceedsCapacity);
        assert!(!output.risk.alternative_thicknesses.is_empty());

        let report = DeterministicQualityEvaluator.evaluate(&output);
        assert!(report.has("SPAN_OVERRUN_WITH_ALTERNATIVE"));
        assert!(report.has("ALTERNATIVE_SUGGESTED"));
        assert!(!report.has("SPAN_OVERRUN"));
    }

    #[test]
    fn undeclared_assumption_and_unnecessary_block_are_penalized() {
        let mut output = quote("isodec eps 100 mm techo 10 paneles de 6 m", Some(OperatingMode::InternalEstimate));
        output.assumptions_used.clear();
        output.status = QuotationStatus::Blocked;

        let report = evaluate_quotation(&output);
        assert!(report.has("UNDECLARED_ASSUMPTION"));
        assert!(report.has("UNNECESSARY_BLOCK"));
    }

    #[test]
    fn complete_contact_earns_bonus() {
        let output = quote(
            "isopanel eps 100 mm pared 12 x 3. Nombre: Ana Perez, tel 099 123 456",
            None,
        );
        let report = evaluate_quotation(&output);
        assert!(report.has("CONTACT_COMPLETE"));
        assert!(report.bonuses().count() >= 1);
    }
}
