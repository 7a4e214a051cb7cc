//! Default assumptions applied to incomplete requests outside formal mode.

use serde::{Deserialize, Serialize};

use crate::cpq::catalog::RuleCatalog;
use crate::domain::product::{StructureType, Usage};
use crate::domain::quotation::{Assumption, OperatingMode};
use crate::domain::request::{QuoteRequest, FIELD_SPAN, FIELD_STRUCTURE_TYPE, FIELD_WIDTH};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssumptionDefaults {
    pub roof_span_m: f64,
    pub cold_room_span_m: f64,
    pub roof_structure: StructureType,
    pub wall_structure: StructureType,
    pub cold_room_structure: StructureType,
}

impl Default for AssumptionDefaults {
    fn default() -> Self {
        Self {
            roof_span_m: 2.0,
            cold_room_span_m: 2.5,
            roof_structure: StructureType::Metal,
            wall_structure: StructureType::Metal,
            cold_room_structure: StructureType::Metal,
        }
    }
}

impl AssumptionDefaults {
    pub fn span_for(&self, usage: Usage) -> Option<f64> {
        match usage {
            Usage::Roof => Some(self.roof_span_m),
            Usage::ColdRoom => Some(self.cold_room_span_m),
            Usage::Wall => None,
        }
    }

    pub fn structure_for(&self, usage: Usage) -> StructureType {
        match usage {
            Usage::Roof => self.roof_structure,
            Usage::Wall => self.wall_structure,
            Usage::ColdRoom => self.cold_room_structure,
        }
    }
}

/// Returns the effective request and the assumptions that produced it.
/// Formal mode never assumes anything.
pub fn apply_assumptions(
    request: &QuoteRequest,
    mode: OperatingMode,
    defaults: &AssumptionDefaults,
    rules: &RuleCatalog,
) -> (QuoteRequest, Vec<Assumption>) {
    let mut effective = request.clone();
    let mut assumptions = Vec::new();
    if mode == OperatingMode::Formal {
        return (effective, assumptions);
    }

    let usage = effective.usage.or_else(|| effective.family.map(|family| family.default_usage()));

    if effective.span_m.is_none() {
        if let Some((usage, span_m)) = usage.and_then(|usage| Some((usage, defaults.span_for(usage)?))) {
            effective.span_m = Some(span_m);
            record(
                &mut effective,
                &mut assumptions,
                FIELD_SPAN,
                format!("{span_m:.2}"),
                format!("default span for {usage} usage"),
            );
        }
    }

    if effective.structure_type.is_none() {
        if let Some(usage) = usage {
            let structure = defaults.structure_for(usage);
            effective.structure_type = Some(structure);
            record(
                &mut effective,
                &mut assumptions,
                FIELD_STRUCTURE_TYPE,
                structure.to_string(),
                format!("default structure for {usage} usage"),
            );
        }
    }

    if effective.geometry.width_m.is_none() && !effective.geometry.panel_lines.is_empty() {
        let usable_width = effective.family.and_then(|family| {
            effective
                .thickness_mm
                .and_then(|thickness| rules.panel_spec(family, effective.sub_family, thickness))
                .or_else(|| rules.family_panel(family))
                .map(|spec| spec.usable_width_m)
        });
        if let Some(usable_width) = usable_width {
            let width_m = f64::from(effective.geometry.total_panel_count()) * usable_width;
            effective.geometry.width_m = Some(width_m);
            record(
                &mut effective,
                &mut assumptions,
                FIELD_WIDTH,
                format!("{width_m:.2}"),
                format!("panel count x usable width {usable_width:.2} m"),
            );
        }
    }

    (effective, assumptions)
}

fn record(
    request: &mut QuoteRequest,
    assumptions: &mut Vec<Assumption>,
    field: &str,
    value: String,
    reason: String,
) {
    request.assumed_fields.push(field.to_string());
    assumptions.push(Assumption { field: field.to_string(), value, reason });
}
