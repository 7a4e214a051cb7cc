use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::product::{ProductFamily, StructureType, SubFamily, Usage};

pub const FIELD_FAMILY: &str = "family";
pub const FIELD_THICKNESS: &str = "thickness";
pub const FIELD_USAGE: &str = "usage";
pub const FIELD_STRUCTURE_TYPE: &str = "structure_type";
pub const FIELD_SPAN: &str = "span";
pub const FIELD_DIMENSIONS: &str = "dimensions";
pub const FIELD_WIDTH: &str = "width";
pub const FIELD_LOCATION: &str = "location";

/// A run of identical panels, e.g. "10 paneles de 6 m".
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PanelLine {
    pub count: u32,
    pub length_m: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub panel_lines: Vec<PanelLine>,
    pub width_m: Option<f64>,
    pub length_m: Option<f64>,
    pub area_m2: Option<f64>,
    pub slopes: Option<u8>,
    pub butterfly: bool,
    pub mid_span_joint: bool,
}

impl Geometry {
    pub fn total_panel_count(&self) -> u32 {
        self.panel_lines.iter().fold(0, |total: u32, line| total.saturating_add(line.count))
    }

    pub fn longest_panel_m(&self) -> Option<f64> {
        let from_lines =
            self.panel_lines.iter().fold(None, |longest, line| max_opt(longest, Some(line.length_m)));
        max_opt(from_lines, self.length_m)
    }

    /// True when there is enough geometry to size panels.
    pub fn is_sizable(&self) -> bool {
        !self.panel_lines.is_empty()
            || (self.width_m.is_some() && self.length_m.is_some())
            || self.area_m2.is_some()
    }
}

fn max_opt(current: Option<f64>, next: Option<f64>) -> Option<f64> {
    match (current, next) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, None) => a,
        (None, b) => b,
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl ContactInfo {
    pub fn is_complete(&self) -> bool {
        self.name.is_some() && (self.phone.is_some() || self.email.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.phone.is_none() && self.email.is_none()
    }
}

/// Structured order extracted from free text.
///
/// Fields the parser could not extract stay `None` and are named in
/// `incomplete_fields`. Values filled by default assumptions are named in
/// `assumed_fields`; they remain listed as incomplete because the customer
/// never supplied them.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub raw_text: String,
    pub family: Option<ProductFamily>,
    pub sub_family: Option<SubFamily>,
    pub thickness_mm: Option<u32>,
    pub usage: Option<Usage>,
    pub structure_type: Option<StructureType>,
    pub span_m: Option<f64>,
    pub geometry: Geometry,
    pub location: Option<String>,
    pub contact: ContactInfo,
    pub shipping_requested: bool,
    pub accessories_mentioned: Vec<String>,
    pub drawing_reference: bool,
    pub incomplete_fields: Vec<String>,
    pub missing_reasons: BTreeMap<String, String>,
    pub assumed_fields: Vec<String>,
    pub parse_notes: Vec<String>,
}

impl QuoteRequest {
    pub fn is_incomplete(&self, field: &str) -> bool {
        self.incomplete_fields.iter().any(|candidate| candidate == field)
    }

    pub fn is_assumed(&self, field: &str) -> bool {
        self.assumed_fields.iter().any(|candidate| candidate == field)
    }

    pub fn is_roof(&self) -> bool {
        matches!(self.usage, Some(Usage::Roof))
    }

    /// Construction-system key used by the rule catalog, e.g. `isodec_roof`.
    pub fn system_key(&self) -> Option<String> {
        let family = self.family?;
        let usage = self.usage.unwrap_or_else(|| family.default_usage());
        Some(format!("{}_{}", family.as_str(), usage.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::{Geometry, PanelLine, QuoteRequest};
    use crate::domain::product::{ProductFamily, Usage};

    #[test]
    fn longest_panel_considers_lines_and_length() {
        let geometry = Geometry {
            panel_lines: vec![
                PanelLine { count: 3, length_m: 6.0 },
                PanelLine { count: 2, length_m: 13.5 },
            ],
            length_m: Some(8.0),
            ..Geometry::default()
        };
        assert_eq!(geometry.longest_panel_m(), Some(13.5));
        assert_eq!(geometry.total_panel_count(), 5);
        assert!(geometry.is_sizable());
    }

    #[test]
    fn width_without_length_is_not_sizable() {
        let geometry = Geometry { width_m: Some(5.0), ..Geometry::default() };
        assert!(!geometry.is_sizable());
    }

    #[test]
    fn system_key_falls_back_to_family_usage() {
        let request = QuoteRequest { family: Some(ProductFamily::Isowall), ..QuoteRequest::default() };
        assert_eq!(request.system_key().as_deref(), Some("isowall_wall"));

        let roof_request = QuoteRequest {
            family: Some(ProductFamily::Isofrig),
            usage: Some(Usage::Roof),
            ..QuoteRequest::default()
        };
        assert_eq!(roof_request.system_key().as_deref(), Some("isofrig_roof"));
    }
}
