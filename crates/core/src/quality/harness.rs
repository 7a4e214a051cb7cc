//! Regression suite runner and seeded stress harness.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::cpq::classifier::RequestType;
use crate::cpq::risk::{R_DATA_CAP, R_GEOMETRY_CAP, R_SPAN_CAP, R_SYSTEM_CAP};
use crate::cpq::{QuotationPipeline, QuoteContext};
use crate::domain::quotation::{OperatingMode, QuotationOutput, QuotationStatus};
use crate::quality::QualityEvaluator;

// ---------------------------------------------------------------------------
// Regression suite
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RegressionExpectation {
    #[serde(default)]
    pub request_type: Option<RequestType>,
    #[serde(default)]
    pub forbidden_statuses: Vec<QuotationStatus>,
    #[serde(default)]
    pub min_score: Option<u32>,
    #[serde(default)]
    pub incomplete_fields: Vec<String>,
    #[serde(default)]
    pub expects_alternatives: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegressionCase {
    pub name: String,
    pub text: String,
    #[serde(default)]
    pub mode: Option<OperatingMode>,
    #[serde(default)]
    pub expect: RegressionExpectation,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CaseOutcome {
    pub name: String,
    pub passed: bool,
    pub score: u32,
    pub status: QuotationStatus,
    pub failures: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegressionSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub cases: Vec<CaseOutcome>,
}

impl RegressionSummary {
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

pub fn run_regression<P, E>(pipeline: &P, evaluator: &E, cases: &[RegressionCase]) -> RegressionSummary
where
    P: QuotationPipeline + ?Sized,
    E: QualityEvaluator + ?Sized,
{
    let outcomes = cases
        .iter()
        .map(|case| {
            let context = QuoteContext {
                mode_override: case.mode,
                correlation_id: Some(format!("regress-{}", case.name)),
            };
            let output = pipeline.quote(&case.text, &context);
            let report = evaluator.evaluate(&output);
            let failures = check_expectation(&case.expect, &output, report.score);
            CaseOutcome {
                name: case.name.clone(),
                passed: failures.is_empty(),
                score: report.score,
                status: output.status,
                failures,
            }
        })
        .collect::<Vec<_>>();

    let passed = outcomes.iter().filter(|outcome| outcome.passed).count();
    let summary = RegressionSummary {
        total: outcomes.len(),
        passed,
        failed: outcomes.len() - passed,
        cases: outcomes,
    };

    tracing::info!(
        event_name = "quality.regression.completed",
        total = summary.total,
        failed = summary.failed,
        "regression suite completed"
    );
    summary
}

fn check_expectation(expect: &RegressionExpectation, output: &QuotationOutput, score: u32) -> Vec<String> {
    let mut failures = Vec::new();

    if let Some(expected) = expect.request_type {
        let actual = output.classification.request_type;
        if actual != expected {
            failures.push(format!("request type {} != expected {}", actual.as_str(), expected.as_str()));
        }
    }
    if expect.forbidden_statuses.contains(&output.status) {
        failures.push(format!("status {:?} is not allowed", output.status));
    }
    if let Some(min_score) = expect.min_score {
        if score < min_score {
            failures.push(format!("score {score} below minimum {min_score}"));
        }
    }
    for field in &expect.incomplete_fields {
        if !output.request.is_incomplete(field) {
            failures.push(format!("field `{field}` expected incomplete"));
        }
    }
    if expect.expects_alternatives && output.risk.alternative_thicknesses.is_empty() {
        failures.push("expected alternative thicknesses".to_string());
    }

    failures
}

pub fn default_regression_cases() -> Vec<RegressionCase> {
    vec![
        RegressionCase {
            name: "roof_estimate_missing_span".to_string(),
            text: "presupuesto estimado isodec eps 100 mm para techo, 10 paneles de 6 m".to_string(),
            mode: None,
            expect: RegressionExpectation {
                request_type: Some(RequestType::RoofSystem),
                forbidden_statuses: vec![QuotationStatus::Blocked],
                min_score: Some(40),
                incomplete_fields: vec!["span".to_string()],
                expects_alternatives: false,
            },
        },
        RegressionCase {
            name: "roof_span_overrun".to_string(),
            text: "isoroof 3g 30 mm techo, luz 4 m, 8 paneles de 4 m".to_string(),
            mode: None,
            expect: RegressionExpectation {
                request_type: Some(RequestType::RoofSystem),
                forbidden_statuses: vec![QuotationStatus::Validated, QuotationStatus::Draft],
                min_score: None,
                incomplete_fields: Vec::new(),
                expects_alternatives: true,
            },
        },
        RegressionCase {
            name: "formal_wall".to_string(),
            text: "cotizacion formal isopanel eps 100 mm pared 12 x 3, estructura metalica".to_string(),
            mode: None,
            expect: RegressionExpectation {
                request_type: Some(RequestType::WallSystem),
                forbidden_statuses: vec![QuotationStatus::Blocked, QuotationStatus::Draft],
                ..RegressionExpectation::default()
            },
        },
        RegressionCase {
            name: "formal_roof_without_span".to_string(),
            text: "isodec eps 150 mm techo 10 x 6".to_string(),
            mode: Some(OperatingMode::Formal),
            expect: RegressionExpectation {
                forbidden_statuses: vec![QuotationStatus::Validated, QuotationStatus::Draft],
                incomplete_fields: vec!["span".to_string()],
                ..RegressionExpectation::default()
            },
        },
        RegressionCase {
            name: "information_request".to_string(),
            text: "que es la diferencia entre eps y pir? quiero informacion".to_string(),
            mode: None,
            expect: RegressionExpectation {
                request_type: Some(RequestType::InfoOnly),
                forbidden_statuses: vec![QuotationStatus::Blocked, QuotationStatus::Validated],
                ..RegressionExpectation::default()
            },
        },
        RegressionCase {
            name: "unreadable_text".to_string(),
            text: "asdf ??? ###".to_string(),
            mode: None,
            expect: RegressionExpectation {
                request_type: Some(RequestType::InfoOnly),
                forbidden_statuses: vec![QuotationStatus::Blocked],
                incomplete_fields: vec!["family".to_string(), "thickness".to_string()],
                ..RegressionExpectation::default()
            },
        },
    ]
}

// ---------------------------------------------------------------------------
// Stress harness
// ---------------------------------------------------------------------------

const FAMILY_FRAGMENTS: &[&str] = &[
    "isodec eps 100 mm",
    "isodec eps 150mm",
    "isodec pir 50 mm",
    "isoroof 3g 30 mm",
    "isoroof 50mm",
    "isopanel eps 100 mm",
    "isowall pir 80 mm",
    "isofrig 100 mm",
    "isodec",
    "panel sandwich",
    "",
];
const USAGE_FRAGMENTS: &[&str] = &["para techo", "techo a dos aguas", "pared", "camara frigorifica", "roof", ""];
const STRUCTURE_FRAGMENTS: &[&str] =
    &["estructura metalica", "sobre hormigon", "tirantes de madera", "steel frame", ""];
const GEOMETRY_FRAGMENTS: &[&str] = &[
    "10 paneles de 6 m",
    "8 x 5",
    "ancho 7 m largo 12 m",
    "60 m2",
    "12 paneles de 14 m y 4 de 3,5 m",
    "10 por",
    "",
];
const EXTRA_FRAGMENTS: &[&str] = &[
    "envio a salto",
    "incluir flete",
    "ver plano adjunto",
    "techo mariposa",
    "con empalme",
    "tel 099 123 456",
    "cotizacion formal",
    "presupuesto estimado",
    "solo goteros",
    "",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StressConfig {
    pub seed: u64,
    pub iterations: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self { seed: 42, iterations: 200 }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StressViolation {
    pub index: usize,
    pub invariant: String,
    pub detail: String,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoreStats {
    pub min: u32,
    pub max: u32,
    pub mean: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StressReport {
    pub seed: u64,
    pub iterations: usize,
    pub violations: Vec<StressViolation>,
    pub scores: Option<ScoreStats>,
}

impl StressReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Composes `count` order texts from fixed fragments. Same seed, same texts.
pub fn generate_texts(seed: u64, count: usize) -> Vec<String> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let mut parts = [
                FAMILY_FRAGMENTS,
                USAGE_FRAGMENTS,
                STRUCTURE_FRAGMENTS,
                GEOMETRY_FRAGMENTS,
                EXTRA_FRAGMENTS,
            ]
            .iter()
            .filter_map(|fragments| fragments.choose(&mut rng).copied())
            .filter(|fragment| !fragment.is_empty())
            .map(str::to_string)
            .collect::<Vec<_>>();
            if rng.gen_bool(0.5) {
                let span = rng.gen_range(10..=60);
                parts.push(format!("luz {}.{} m", span / 10, span % 10));
            }
            parts.shuffle(&mut rng);
            parts.join(", ")
        })
        .collect()
}

/// Digest of an output with its identifier and timestamp left out.
pub fn structural_fingerprint(output: &QuotationOutput) -> String {
    let mut value = serde_json::to_value(output).unwrap_or(serde_json::Value::Null);
    if let Some(map) = value.as_object_mut() {
        map.remove("id");
        map.remove("created_at");
    }
    let mut hasher = Sha256::new();
    hasher.update(value.to_string().as_bytes());
    format!("sha256:{:x}", hasher.finalize())
}

pub fn run_stress<P, E>(pipeline: &P, evaluator: &E, config: StressConfig) -> StressReport
where
    P: QuotationPipeline + ?Sized,
    E: QualityEvaluator + ?Sized,
{
    let texts = generate_texts(config.seed, config.iterations);
    let mut violations = Vec::new();
    let mut scores = Vec::with_capacity(texts.len());

    for (index, text) in texts.iter().enumerate() {
        let context =
            QuoteContext { mode_override: None, correlation_id: Some(format!("stress-{index}")) };
        let first = pipeline.quote(text, &context);
        let second = pipeline.quote(text, &context);

        let mut violate = |invariant: &str, detail: String| {
            violations.push(StressViolation {
                index,
                invariant: invariant.to_string(),
                detail,
                text: text.clone(),
            });
        };

        let risk = &first.risk;
        if risk.r_data > R_DATA_CAP
            || risk.r_span > R_SPAN_CAP
            || risk.r_geometry > R_GEOMETRY_CAP
            || risk.r_system > R_SYSTEM_CAP
        {
            violate(
                "component_caps",
                format!(
                    "data={} span={} geometry={} system={}",
                    risk.r_data, risk.r_span, risk.r_geometry, risk.r_system
                ),
            );
        }
        if first.mode == OperatingMode::InternalEstimate
            && first.is_blocked()
            && !first.validation.has_mathematical_critical()
        {
            violate("estimate_not_blocked_by_missing_data", format!("status {:?}", first.status));
        }
        let mut skus = first.pricing.missing_prices.iter().map(|missing| &missing.sku).collect::<Vec<_>>();
        let reported = skus.len();
        skus.sort();
        skus.dedup();
        if skus.len() != reported {
            violate("missing_prices_unique", format!("{reported} entries for {} skus", skus.len()));
        }
        if !first.pricing.is_consistent() {
            violate("subtotal_arithmetic", format!("grand subtotal {}", first.pricing.grand_subtotal));
        }
        if structural_fingerprint(&first) != structural_fingerprint(&second) {
            violate("idempotence", "repeated run produced a different structure".to_string());
        }

        scores.push(evaluator.evaluate(&first).score);
    }

    let stats = score_stats(&scores);
    tracing::info!(
        event_name = "quality.stress.completed",
        seed = config.seed,
        iterations = config.iterations,
        violations = violations.len(),
        "stress run completed"
    );

    StressReport { seed: config.seed, iterations: config.iterations, violations, scores: stats }
}

fn score_stats(scores: &[u32]) -> Option<ScoreStats> {
    let min = *scores.iter().min()?;
    let max = *scores.iter().max()?;
    let sum: u64 = scores.iter().map(|score| u64::from(*score)).sum();
    Some(ScoreStats { min, max, mean: sum as f64 / scores.len() as f64 })
}

#[cfg(test)]
mod tests {
    use super::{
        default_regression_cases, generate_texts, run_regression, run_stress, structural_fingerprint,
        RegressionCase, RegressionExpectation, StressConfig,
    };
    use crate::cpq::catalog::{CatalogHandle, CatalogSnapshot};
    use crate::cpq::classifier::RequestType;
    use crate::cpq::{DefaultQuotationPipeline, PipelineSettings, QuotationPipeline, QuoteContext};
    use crate::quality::DeterministicQualityEvaluator;

    fn pipeline() -> DefaultQuotationPipeline {
        let snapshot = CatalogSnapshot::builtin().expect("builtin catalog");
        DefaultQuotationPipeline::with_settings(CatalogHandle::new(snapshot), PipelineSettings::default())
    }

    #[test]
    fn builtin_regression_suite_passes() {
        let summary =
            run_regression(&pipeline(), &DeterministicQualityEvaluator, &default_regression_cases());
        let failures = summary
            .cases
            .iter()
            .filter(|case| !case.passed)
            .map(|case| format!("{}: {:?}", case.name, case.failures))
            .collect::<Vec<_>>();
        assert!(summary.all_passed(), "{failures:?}");
        assert_eq!(summary.total, default_regression_cases().len());
    }

    #[test]
    fn failing_expectation_is_reported_with_reason() {
        let cases = vec![RegressionCase {
            name: "wrong_type".to_string(),
            text: "isopanel 100 mm pared 10 x 3".to_string(),
            mode: None,
            expect: RegressionExpectation {
                request_type: Some(RequestType::RoofSystem),
                min_score: Some(101),
                ..RegressionExpectation::default()
            },
        }];

        let summary = run_regression(&pipeline(), &DeterministicQualityEvaluator, &cases);
        assert_eq!(summary.failed, 1);
        let failures = &summary.cases[0].failures;
        assert_eq!(failures.len(), 2, "{failures:?}");
        assert!(failures[0].contains("request type"));
    }

    #[test]
    fn text_generation_is_seeded() {
        assert_eq!(generate_texts(7, 20), generate_texts(7, 20));
        assert_ne!(generate_texts(7, 20), generate_texts(8, 20));
    }

    #[test]
    fn fingerprint_ignores_id_and_timestamp() {
        let pipeline = pipeline();
        let context = QuoteContext { mode_override: None, correlation_id: Some("fp".to_string()) };
        let first = pipeline.quote("isodec 100 mm techo 10 x 5, luz 3 m", &context);
        let second = pipeline.quote("isodec 100 mm techo 10 x 5, luz 3 m", &context);
        assert_ne!(first.id, second.id);
        assert_eq!(structural_fingerprint(&first), structural_fingerprint(&second));
    }

    #[test]
    fn stress_run_holds_invariants() {
        let report =
            run_stress(&pipeline(), &DeterministicQualityEvaluator, StressConfig { seed: 11, iterations: 60 });
        assert!(report.is_clean(), "{:?}", report.violations);
        let scores = report.scores.expect("scores for non-empty run");
        assert!(scores.min <= scores.max);
        assert!(scores.max <= 100);
    }
}
