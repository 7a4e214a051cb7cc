//! Structural risk estimate (SRE).
//!
//! `SRE = R_data + R_span + R_geometry + R_system`. Every component is
//! non-negative and capped on its own, so the total never exceeds 120.

use serde::{Deserialize, Serialize};

use crate::cpq::catalog::RuleCatalog;
use crate::domain::product::{ProductFamily, Usage};
use crate::domain::request::{
    QuoteRequest, FIELD_DIMENSIONS, FIELD_SPAN, FIELD_STRUCTURE_TYPE, FIELD_THICKNESS,
};

pub const R_DATA_CAP: u32 = 40;
pub const R_SPAN_CAP: u32 = 50;
pub const R_GEOMETRY_CAP: u32 = 15;
pub const R_SYSTEM_CAP: u32 = 15;

const LONG_PANEL_M: f64 = 12.0;
const THIN_PANEL_MM: u32 = 50;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    FormalCertified,
    TechnicalConditioned,
    CommercialQuick,
    TechnicalBlock,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanStatus {
    WithinCapacity,
    ExceedsCapacity,
    NotVerified,
    NotApplicable,
}

/// Upper bounds (inclusive) of the first three risk levels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskBands {
    pub formal_certified_max: u32,
    pub technical_conditioned_max: u32,
    pub commercial_quick_max: u32,
}

impl Default for RiskBands {
    fn default() -> Self {
        Self { formal_certified_max: 30, technical_conditioned_max: 60, commercial_quick_max: 85 }
    }
}

impl RiskBands {
    pub fn level_for(&self, total: u32) -> RiskLevel {
        if total <= self.formal_certified_max {
            RiskLevel::FormalCertified
        } else if total <= self.technical_conditioned_max {
            RiskLevel::TechnicalConditioned
        } else if total <= self.commercial_quick_max {
            RiskLevel::CommercialQuick
        } else {
            RiskLevel::TechnicalBlock
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskFactor {
    pub component: String,
    pub code: String,
    pub points: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SreResult {
    pub total: u32,
    pub level: RiskLevel,
    pub r_data: u32,
    pub r_span: u32,
    pub r_geometry: u32,
    pub r_system: u32,
    pub span_ratio: Option<f64>,
    pub max_span_m: Option<f64>,
    pub span_status: SpanStatus,
    /// Thicker panels of the same family that cover the requested span.
    pub alternative_thicknesses: Vec<u32>,
    pub factors: Vec<RiskFactor>,
}

impl SreResult {
    pub fn span_exceeds_capacity(&self) -> bool {
        self.span_status == SpanStatus::ExceedsCapacity
    }
}

pub trait RiskEngine: Send + Sync {
    fn assess(&self, request: &QuoteRequest, rules: &RuleCatalog) -> SreResult;
}

#[derive(Clone, Debug, Default)]
pub struct DeterministicRiskEngine {
    bands: RiskBands,
}

impl DeterministicRiskEngine {
    pub fn new(bands: RiskBands) -> Self {
        Self { bands }
    }
}

impl RiskEngine for DeterministicRiskEngine {
    fn assess(&self, request: &QuoteRequest, rules: &RuleCatalog) -> SreResult {
        assess_request(request, rules, &self.bands)
    }
}

pub fn assess_request(request: &QuoteRequest, rules: &RuleCatalog, bands: &RiskBands) -> SreResult {
    let mut factors = Vec::new();

    let r_data = data_risk(request, &mut factors);
    let span = span_risk(request, rules);
    if span.points > 0 {
        factors.push(factor("span", "SPAN_RATIO", span.points));
    }
    let r_geometry = geometry_risk(request, &mut factors);
    let r_system = system_risk(request, &mut factors);

    let total = r_data + span.points + r_geometry + r_system;
    let level = if span.ratio.is_some_and(|ratio| ratio > 1.0) {
        RiskLevel::TechnicalBlock
    } else {
        bands.level_for(total)
    };

    tracing::debug!(
        event_name = "quote.risk.assessed",
        total,
        r_data,
        r_span = span.points,
        r_geometry,
        r_system,
        level = ?level,
        "structural risk assessed"
    );

    SreResult {
        total,
        level,
        r_data,
        r_span: span.points,
        r_geometry,
        r_system,
        span_ratio: span.ratio,
        max_span_m: span.max_span_m,
        span_status: span.status,
        alternative_thicknesses: span.alternatives,
        factors,
    }
}

fn factor(component: &str, code: &str, points: u32) -> RiskFactor {
    RiskFactor { component: component.to_string(), code: code.to_string(), points }
}

fn data_risk(request: &QuoteRequest, factors: &mut Vec<RiskFactor>) -> u32 {
    let checks = [
        (request.is_roof() && request.is_incomplete(FIELD_SPAN), "MISSING_SPAN", 40),
        (request.is_incomplete(FIELD_THICKNESS), "MISSING_THICKNESS", 25),
        (request.is_incomplete(FIELD_STRUCTURE_TYPE), "MISSING_STRUCTURE_TYPE", 15),
        (request.is_incomplete(FIELD_DIMENSIONS), "INCOMPLETE_DIMENSIONS", 20),
        (request.drawing_reference, "UNRESOLVED_DRAWING_REFERENCE", 25),
    ];

    let mut raw = 0;
    for (applies, code, points) in checks {
        if applies {
            raw += points;
            factors.push(factor("data", code, points));
        }
    }
    raw.min(R_DATA_CAP)
}

struct SpanAssessment {
    points: u32,
    ratio: Option<f64>,
    max_span_m: Option<f64>,
    status: SpanStatus,
    alternatives: Vec<u32>,
}

impl SpanAssessment {
    fn without_ratio(status: SpanStatus) -> Self {
        Self { points: 0, ratio: None, max_span_m: None, status, alternatives: Vec::new() }
    }
}

/// Points for a span-to-capacity ratio. Non-decreasing in `ratio`.
pub fn span_points(ratio: f64) -> u32 {
    if ratio <= 0.60 {
        0
    } else if ratio <= 0.75 {
        10
    } else if ratio <= 0.85 {
        20
    } else if ratio <= 1.00 {
        30
    } else {
        R_SPAN_CAP
    }
}

fn span_risk(request: &QuoteRequest, rules: &RuleCatalog) -> SpanAssessment {
    let usage = request.usage.or_else(|| request.family.map(|family| family.default_usage()));
    if usage == Some(Usage::Wall) {
        return SpanAssessment::without_ratio(SpanStatus::NotApplicable);
    }
    // A default span says nothing about the real support spacing.
    if request.is_assumed(FIELD_SPAN) {
        return SpanAssessment::without_ratio(SpanStatus::NotVerified);
    }

    let (Some(span_m), Some(family), Some(thickness_mm)) =
        (request.span_m, request.family, request.thickness_mm)
    else {
        return SpanAssessment::without_ratio(SpanStatus::NotVerified);
    };
    let Some(max_span_m) = rules.max_span(family, request.sub_family, thickness_mm) else {
        return SpanAssessment::without_ratio(SpanStatus::NotVerified);
    };

    let ratio = span_m / max_span_m;
    let exceeds = ratio > 1.0;
    let alternatives = if exceeds {
        thicker_alternatives(request, rules, family, thickness_mm, span_m)
    } else {
        Vec::new()
    };

    SpanAssessment {
        points: span_points(ratio).min(R_SPAN_CAP),
        ratio: Some(ratio),
        max_span_m: Some(max_span_m),
        status: if exceeds { SpanStatus::ExceedsCapacity } else { SpanStatus::WithinCapacity },
        alternatives,
    }
}

fn thicker_alternatives(
    request: &QuoteRequest,
    rules: &RuleCatalog,
    family: ProductFamily,
    thickness_mm: u32,
    span_m: f64,
) -> Vec<u32> {
    let mut thicknesses = rules
        .span_entries_for(family, request.sub_family)
        .into_iter()
        .filter(|entry| entry.thickness_mm > thickness_mm && entry.max_span_m >= span_m)
        .map(|entry| entry.thickness_mm)
        .collect::<Vec<_>>();
    thicknesses.sort_unstable();
    thicknesses.dedup();
    thicknesses
}

fn geometry_risk(request: &QuoteRequest, factors: &mut Vec<RiskFactor>) -> u32 {
    let geometry = &request.geometry;
    let checks = [
        (geometry.slopes == Some(2), "TWO_SLOPES", 5),
        (geometry.slopes == Some(4), "FOUR_SLOPES", 8),
        (geometry.butterfly, "BUTTERFLY_ROOF", 10),
        (geometry.longest_panel_m().is_some_and(|length| length > LONG_PANEL_M), "LONG_PANELS", 10),
        (geometry.mid_span_joint, "MID_SPAN_JOINT", 5),
    ];

    let mut raw = 0;
    for (applies, code, points) in checks {
        if applies {
            raw += points;
            factors.push(factor("geometry", code, points));
        }
    }
    raw.min(R_GEOMETRY_CAP)
}

fn system_risk(request: &QuoteRequest, factors: &mut Vec<RiskFactor>) -> u32 {
    let Some(family) = request.family else { return 0 };
    let usage = request.usage.unwrap_or_else(|| family.default_usage());
    if usage == Usage::Wall {
        return 0;
    }

    let sensitivity = match family {
        ProductFamily::Isoroof => 10,
        ProductFamily::Isofrig => 8,
        ProductFamily::Isodec => 5,
        ProductFamily::Isopanel | ProductFamily::Isowall => 3,
    };
    factors.push(factor("system", "FAMILY_SENSITIVITY", sensitivity));

    let mut raw = sensitivity;
    if request.thickness_mm.is_some_and(|thickness| thickness < THIN_PANEL_MM) {
        raw += 5;
        factors.push(factor("system", "THIN_PANEL", 5));
    }
    raw.min(R_SYSTEM_CAP)
}

#[cfg(test)]
mod tests {
    use super::{
        assess_request, span_points, DeterministicRiskEngine, RiskBands, RiskEngine, RiskLevel,
        SpanStatus, R_DATA_CAP, R_GEOMETRY_CAP, R_SYSTEM_CAP,
    };
    use crate::cpq::catalog::CatalogSnapshot;
    use crate::domain::product::{ProductFamily, SubFamily, Usage};
    use crate::domain::request::{Geometry, PanelLine, QuoteRequest};

    fn roof_request(family: ProductFamily, thickness_mm: u32, span_m: f64) -> QuoteRequest {
        QuoteRequest {
            family: Some(family),
            thickness_mm: Some(thickness_mm),
            usage: Some(Usage::Roof),
            span_m: Some(span_m),
            geometry: Geometry {
                panel_lines: vec![PanelLine { count: 4, length_m: 5.0 }],
                ..Geometry::default()
            },
            ..QuoteRequest::default()
        }
    }

    #[test]
    fn span_over_capacity_forces_block_and_suggests_thicker_panels() {
        let catalog = CatalogSnapshot::builtin().expect("catalog");
        let mut request = roof_request(ProductFamily::Isoroof, 30, 4.0);
        request.sub_family = Some(SubFamily::ThreeG);

        let result = DeterministicRiskEngine::default().assess(&request, &catalog.rules);

        let ratio = result.span_ratio.expect("ratio");
        assert!((ratio - 4.0 / 2.8).abs() < 1e-9);
        assert_eq!(result.r_span, 50);
        assert_eq!(result.span_status, SpanStatus::ExceedsCapacity);
        assert_eq!(result.alternative_thicknesses, vec![80]);
        assert_eq!(result.level, RiskLevel::TechnicalBlock);
    }

    #[test]
    fn wall_usage_is_not_applicable_even_with_span() {
        let catalog = CatalogSnapshot::builtin().expect("catalog");
        let mut request = roof_request(ProductFamily::Isopanel, 100, 9.0);
        request.usage = Some(Usage::Wall);

        let result = assess_request(&request, &catalog.rules, &RiskBands::default());
        assert_eq!(result.span_status, SpanStatus::NotApplicable);
        assert_eq!(result.r_span, 0);
        assert_eq!(result.r_system, 0);
        assert_eq!(result.span_ratio, None);
    }

    #[test]
    fn assumed_span_is_never_checked_against_capacity() {
        let catalog = CatalogSnapshot::builtin().expect("catalog");
        let mut request = roof_request(ProductFamily::Isoroof, 30, 4.0);
        request.sub_family = Some(SubFamily::ThreeG);
        request.assumed_fields.push("span".to_string());
        request.incomplete_fields.push("span".to_string());

        let result = assess_request(&request, &catalog.rules, &RiskBands::default());
        assert_eq!(result.span_status, SpanStatus::NotVerified);
        assert_eq!(result.r_span, 0);
        assert_eq!(result.span_ratio, None);
        assert!(result.alternative_thicknesses.is_empty());
        assert_ne!(result.level, RiskLevel::TechnicalBlock);
    }

    #[test]
    fn span_component_grows_with_span_for_fixed_panel() {
        let catalog = CatalogSnapshot::builtin().expect("catalog");
        let mut previous_span = 0;
        let mut previous_total = 0;
        for tenths in 5..=60 {
            let span_m = f64::from(tenths) / 10.0;
            let mut request = roof_request(ProductFamily::Isoroof, 30, span_m);
            request.sub_family = Some(SubFamily::ThreeG);

            let result = assess_request(&request, &catalog.rules, &RiskBands::default());
            assert!(result.r_span >= previous_span, "span {span_m}");
            assert!(result.total >= previous_total, "span {span_m}");
            previous_span = result.r_span;
            previous_total = result.total;
        }
        assert_eq!(previous_span, 50);
    }

    #[test]
    fn unknown_thickness_in_span_table_is_not_verified() {
        let catalog = CatalogSnapshot::builtin().expect("catalog");
        let request = roof_request(ProductFamily::Isodec, 120, 3.0);
        let result = assess_request(&request, &catalog.rules, &RiskBands::default());
        assert_eq!(result.span_status, SpanStatus::NotVerified);
        assert_eq!(result.r_span, 0);
    }

    #[test]
    fn data_risk_is_capped() {
        let catalog = CatalogSnapshot::builtin().expect("catalog");
        let request = QuoteRequest {
            usage: Some(Usage::Roof),
            drawing_reference: true,
            incomplete_fields: ["family", "thickness", "structure_type", "span", "dimensions"]
                .into_iter()
                .map(String::from)
                .collect(),
            ..QuoteRequest::default()
        };

        let result = assess_request(&request, &catalog.rules, &RiskBands::default());
        assert_eq!(result.r_data, R_DATA_CAP);
        assert!(result.factors.iter().any(|factor| factor.code == "MISSING_SPAN"));
    }

    #[test]
    fn geometry_and_system_components_respect_caps() {
        let catalog = CatalogSnapshot::builtin().expect("catalog");
        let mut request = roof_request(ProductFamily::Isoroof, 30, 1.0);
        request.geometry = Geometry {
            panel_lines: vec![PanelLine { count: 2, length_m: 13.0 }],
            slopes: Some(4),
            butterfly: true,
            mid_span_joint: true,
            ..Geometry::default()
        };

        let result = assess_request(&request, &catalog.rules, &RiskBands::default());
        assert_eq!(result.r_geometry, R_GEOMETRY_CAP);
        assert_eq!(result.r_system, R_SYSTEM_CAP);
    }

    #[test]
    fn span_points_never_decrease_with_ratio() {
        let mut previous = 0;
        for step in 0..=300 {
            let points = span_points(f64::from(step) / 100.0);
            assert!(points >= previous, "ratio {step}");
            previous = points;
        }
        assert_eq!(span_points(0.60), 0);
        assert_eq!(span_points(0.61), 10);
        assert_eq!(span_points(1.0), 30);
        assert_eq!(span_points(1.01), 50);
    }

    #[test]
    fn bands_map_totals_to_levels() {
        let bands = RiskBands::default();
        assert_eq!(bands.level_for(30), RiskLevel::FormalCertified);
        assert_eq!(bands.level_for(31), RiskLevel::TechnicalConditioned);
        assert_eq!(bands.level_for(85), RiskLevel::CommercialQuick);
        assert_eq!(bands.level_for(86), RiskLevel::TechnicalBlock);
    }
}
