//! Parametric bill of materials.
//!
//! A request is expanded against the construction system named by its system
//! key. Accessories are chosen per slot through [`PRIORITY_CHAIN`]; the first
//! tier that yields an entry wins and the tier is recorded on the item.

use serde::{Deserialize, Serialize};

use crate::cpq::catalog::{
    AccessoryEntry, FixationFamily, ItemUnit, PanelSpec, QuantityBasis, RuleCatalog, SlotContext,
    SlotRule, SystemRule,
};
use crate::domain::product::{ProductFamily, SubFamily};
use crate::domain::request::QuoteRequest;

const CEIL_EPSILON: f64 = 1e-9;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupTier {
    ExactFamilyThickness,
    FamilyAnyThickness,
    SubFamilyGeneric,
    Universal,
}

pub const PRIORITY_CHAIN: [LookupTier; 4] = [
    LookupTier::ExactFamilyThickness,
    LookupTier::FamilyAnyThickness,
    LookupTier::SubFamilyGeneric,
    LookupTier::Universal,
];

/// What an accessory has to be compatible with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LookupKey {
    pub family: Option<ProductFamily>,
    pub sub_family: Option<SubFamily>,
    pub thickness_mm: Option<u32>,
}

impl LookupTier {
    pub fn matches(&self, entry: &AccessoryEntry, key: &LookupKey) -> bool {
        match self {
            Self::ExactFamilyThickness => {
                key.family.is_some()
                    && entry.family == key.family
                    && key.thickness_mm.is_some()
                    && entry.thickness_mm == key.thickness_mm
            }
            Self::FamilyAnyThickness => key.family.is_some() && entry.family == key.family,
            Self::SubFamilyGeneric => {
                entry.family.is_none()
                    && !entry.universal
                    && key.sub_family.is_some_and(|sub| entry.sub_families.contains(&sub))
            }
            Self::Universal => entry.universal,
        }
    }
}

/// Walks the priority chain for one slot.
pub fn select_accessory<'a>(
    rules: &'a RuleCatalog,
    slot: &str,
    key: &LookupKey,
) -> Option<(&'a AccessoryEntry, LookupTier)> {
    let candidates = rules.accessories_for_slot(slot);
    PRIORITY_CHAIN.iter().find_map(|tier| {
        let mut matching = candidates.iter().copied().filter(|entry| tier.matches(entry, key));
        let chosen = match tier {
            LookupTier::FamilyAnyThickness => closest_thickness(matching, key.thickness_mm),
            _ => matching.next(),
        };
        chosen.map(|entry| (entry, *tier))
    })
}

/// Thickness-agnostic entries first, then the nearest thickness. Equal
/// distances go to the thicker entry, then to catalog order.
fn closest_thickness<'a>(
    entries: impl Iterator<Item = &'a AccessoryEntry>,
    requested_mm: Option<u32>,
) -> Option<&'a AccessoryEntry> {
    entries
        .enumerate()
        .min_by_key(|(index, entry)| {
            let rank = match (entry.thickness_mm, requested_mm) {
                (None, _) => (0u8, 0u32, 0u8),
                (Some(_), None) => (1, 0, 0),
                (Some(thickness), Some(requested)) => {
                    (1, thickness.abs_diff(requested), u8::from(thickness < requested))
                }
            };
            (rank, *index)
        })
        .map(|(_, entry)| entry)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BomItemType {
    Panel,
    Accessory,
    Fixation,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BomItem {
    pub item_type: BomItemType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot: Option<String>,
    pub sku: String,
    pub description: String,
    pub quantity: u32,
    pub unit: ItemUnit,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub piece_length_m: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area_m2: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection_tier: Option<LookupTier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<ProductFamily>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_family: Option<SubFamily>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thickness_mm: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BomNote {
    pub code: String,
    pub message: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BomResult {
    pub system_key: Option<String>,
    pub area_m2: f64,
    pub panel_count: u32,
    pub supports_per_panel: u32,
    pub fixation_points: u32,
    pub items: Vec<BomItem>,
    pub notes: Vec<BomNote>,
}

impl BomResult {
    pub fn has_panels(&self) -> bool {
        self.items.iter().any(|item| item.item_type == BomItemType::Panel)
    }

    pub fn accessory_count(&self) -> usize {
        self.items.iter().filter(|item| item.item_type != BomItemType::Panel).count()
    }

    fn note(&mut self, code: &str, message: impl Into<String>) {
        self.notes.push(BomNote { code: code.to_string(), message: message.into() });
    }
}

pub trait BomEngine: Send + Sync {
    fn expand(&self, request: &QuoteRequest, rules: &RuleCatalog) -> BomResult;
}

#[derive(Clone, Debug, Default)]
pub struct DeterministicBomEngine;

impl BomEngine for DeterministicBomEngine {
    fn expand(&self, request: &QuoteRequest, rules: &RuleCatalog) -> BomResult {
        expand_request(request, rules)
    }
}

/// Panel runs actually placed: `(count, length_m)`.
struct PanelRuns {
    runs: Vec<(u32, f64)>,
    usable_width_m: Option<f64>,
}

impl PanelRuns {
    fn panel_count(&self) -> u32 {
        self.runs.iter().fold(0, |total, (count, _)| total.saturating_add(*count))
    }

    fn longest_m(&self) -> Option<f64> {
        self.runs.iter().map(|(_, length)| *length).reduce(f64::max)
    }
}

/// Geometric measures a quantity basis multiplies.
struct Measures {
    panels: u32,
    width_m: Option<f64>,
    length_m: Option<f64>,
    area_m2: f64,
    fixation_points: u32,
}

impl Measures {
    fn for_basis(&self, basis: QuantityBasis) -> Option<f64> {
        match basis {
            QuantityBasis::PerPanel => Some(f64::from(self.panels)),
            QuantityBasis::PerWidthM => self.width_m,
            QuantityBasis::PerLengthM => self.length_m,
            QuantityBasis::PerPerimeterM => {
                Some(2.0 * (self.width_m? + self.length_m?))
            }
            QuantityBasis::PerAreaM2 => (self.area_m2 > 0.0).then_some(self.area_m2),
            QuantityBasis::PerFixationPoint => Some(f64::from(self.fixation_points)),
            QuantityBasis::Fixed => Some(1.0),
        }
    }
}

/// Rounds a positive measure up to whole pieces, clamped to `u32::MAX`.
pub fn ceil_count(value: f64) -> u32 {
    if value.is_nan() || value <= 0.0 {
        return 0;
    }
    let pieces = (value - CEIL_EPSILON).ceil().max(1.0);
    if pieces >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        pieces as u32
    }
}

pub fn expand_request(request: &QuoteRequest, rules: &RuleCatalog) -> BomResult {
    let mut bom = BomResult::default();

    let Some(system_key) = request.system_key() else {
        bom.note("SYSTEM_UNKNOWN", "product family not identified; no construction system selected");
        return bom;
    };
    bom.system_key = Some(system_key.clone());
    let Some(system) = rules.system(&system_key) else {
        bom.note("SYSTEM_NOT_FOUND", format!("no construction system `{system_key}` in rule catalog"));
        return bom;
    };

    let panel_spec = request
        .thickness_mm
        .and_then(|thickness| rules.panel_spec(system.family, request.sub_family, thickness));
    let runs = panel_runs(request, rules, system, panel_spec, &mut bom);

    let mut items = Vec::new();
    match panel_spec {
        Some(spec) => {
            for (count, length_m) in &runs.runs {
                items.push(BomItem {
                    item_type: BomItemType::Panel,
                    slot: None,
                    sku: spec.sku.clone(),
                    description: spec.description.clone(),
                    quantity: *count,
                    unit: ItemUnit::Area,
                    piece_length_m: Some(*length_m),
                    area_m2: Some(f64::from(*count) * length_m * spec.usable_width_m),
                    selection_tier: None,
                    family: Some(spec.family),
                    sub_family: spec.sub_family,
                    thickness_mm: Some(spec.thickness_mm),
                });
            }
        }
        None => bom.note(
            "PANEL_SPEC_UNRESOLVED",
            match request.thickness_mm {
                Some(thickness) => format!("no {} panel of {thickness} mm in catalog", system.family),
                None => format!("{} panel thickness unknown; panels not listed", system.family),
            },
        ),
    }

    let panel_count = runs.panel_count();
    let supports_per_panel = supports_for(runs.longest_m(), request.span_m, system);
    let fixation_points = runs
        .runs
        .iter()
        .try_fold(0u32, |total, (count, length)| {
            count.checked_mul(supports_for(Some(*length), request.span_m, system))?.checked_add(total)
        })
        .and_then(|supports| supports.checked_mul(system.points_per_support));
    let fixation_points = match fixation_points {
        Some(points) => points,
        None => {
            bom.note(
                "QUANTITY_OVERFLOW",
                "fixation point count exceeds the countable range; quantities are capped",
            );
            u32::MAX
        }
    };

    let covered_area: f64 = match runs.usable_width_m {
        Some(width) => runs.runs.iter().map(|(count, length)| f64::from(*count) * length * width).sum(),
        None => 0.0,
    };
    let area_m2 = if covered_area > 0.0 {
        covered_area
    } else {
        let geometry = &request.geometry;
        geometry
            .area_m2
            .or_else(|| Some(geometry.width_m? * geometry.length_m?))
            .unwrap_or(0.0)
    };

    let measures = Measures {
        panels: panel_count,
        width_m: request.geometry.width_m.or_else(|| {
            let width = runs.usable_width_m? * f64::from(panel_count);
            (width > 0.0).then_some(width)
        }),
        length_m: request.geometry.length_m.or_else(|| runs.longest_m()),
        area_m2,
        fixation_points,
    };

    let key = LookupKey {
        family: Some(system.family),
        sub_family: request.sub_family.or_else(|| panel_spec.and_then(|spec| spec.sub_family)),
        thickness_mm: request.thickness_mm,
    };
    let context = SlotContext {
        slopes: request.geometry.slopes,
        butterfly: request.geometry.butterfly,
        structure: request.structure_type,
    };

    for rule in system.slots.iter().filter(|rule| rule.applies(&context)) {
        if let Some(item) = slot_item(rules, rule, &key, &measures, BomItemType::Accessory, &mut bom) {
            items.push(item);
        }
    }

    match request.structure_type {
        Some(structure) => {
            let fixation_family = FixationFamily::for_structure(structure);
            for rule in system.fixation.rules_for(fixation_family).iter().filter(|rule| rule.applies(&context)) {
                if let Some(item) = slot_item(rules, rule, &key, &measures, BomItemType::Fixation, &mut bom) {
                    items.push(item);
                }
            }
        }
        None => bom.note(
            "FIXATION_STRUCTURE_UNKNOWN",
            "structure type unknown; fixation hardware not listed",
        ),
    }

    let merged = merge_items(items, &mut bom);
    bom.items = merged;
    bom.area_m2 = area_m2;
    bom.panel_count = panel_count;
    bom.supports_per_panel = supports_per_panel;
    bom.fixation_points = fixation_points;

    tracing::debug!(
        event_name = "quote.bom.expanded",
        system_key = %system_key,
        items = bom.items.len(),
        notes = bom.notes.len(),
        panel_count,
        "bill of materials expanded"
    );

    bom
}

fn panel_runs(
    request: &QuoteRequest,
    rules: &RuleCatalog,
    system: &SystemRule,
    panel_spec: Option<&PanelSpec>,
    bom: &mut BomResult,
) -> PanelRuns {
    let usable_width_m = panel_spec
        .or_else(|| rules.family_panel(system.family))
        .map(|spec| spec.usable_width_m);
    let geometry = &request.geometry;

    if !geometry.panel_lines.is_empty() {
        let runs = geometry.panel_lines.iter().map(|line| (line.count, line.length_m)).collect();
        return PanelRuns { runs, usable_width_m };
    }

    match (geometry.width_m, geometry.length_m, usable_width_m) {
        (Some(width), Some(length), Some(usable)) => {
            PanelRuns { runs: vec![(ceil_count(width / usable), length)], usable_width_m }
        }
        _ => {
            bom.note(
                "PANEL_LAYOUT_UNKNOWN",
                "no panel list or width and length; panel count not computed",
            );
            PanelRuns { runs: Vec::new(), usable_width_m }
        }
    }
}

fn supports_for(length_m: Option<f64>, span_m: Option<f64>, system: &SystemRule) -> u32 {
    match (length_m, span_m) {
        (Some(length), Some(span)) if span > 0.0 => ceil_count(length / span).saturating_add(1),
        _ => system.default_supports_per_panel,
    }
}

fn slot_item(
    rules: &RuleCatalog,
    rule: &SlotRule,
    key: &LookupKey,
    measures: &Measures,
    item_type: BomItemType,
    bom: &mut BomResult,
) -> Option<BomItem> {
    let Some((entry, tier)) = select_accessory(rules, &rule.slot, key) else {
        bom.note("SLOT_UNRESOLVED", format!("no catalog entry for slot `{}`", rule.slot));
        return None;
    };
    let Some(measure) = measures.for_basis(rule.basis) else {
        bom.note(
            "SLOT_MEASURE_UNKNOWN",
            format!("slot `{}` needs {:?} which is unknown", rule.slot, rule.basis),
        );
        return None;
    };

    let raw = measure * rule.factor;
    let (quantity, area_m2) = match (entry.unit, entry.piece_length_m) {
        (ItemUnit::Linear, Some(piece_length)) => (ceil_count(raw / piece_length), None),
        (ItemUnit::Area, _) => (ceil_count(raw), Some(raw)),
        _ => (ceil_count(raw), None),
    };
    if quantity == 0 {
        bom.note(
            "SLOT_ZERO_QUANTITY",
            format!("slot `{}` resolved to `{}` with zero quantity; not listed", rule.slot, entry.sku),
        );
        return None;
    }

    Some(BomItem {
        item_type,
        slot: Some(rule.slot.clone()),
        sku: entry.sku.clone(),
        description: entry.description.clone(),
        quantity,
        unit: entry.unit,
        piece_length_m: entry.piece_length_m,
        area_m2,
        selection_tier: Some(tier),
        family: None,
        sub_family: None,
        thickness_mm: None,
    })
}

/// Merges items with the same SKU and piece length, keeping first-seen order.
fn merge_items(items: Vec<BomItem>, bom: &mut BomResult) -> Vec<BomItem> {
    let mut merged: Vec<BomItem> = Vec::with_capacity(items.len());
    for item in items {
        let existing = merged.iter_mut().find(|candidate| {
            candidate.sku == item.sku && candidate.piece_length_m == item.piece_length_m
        });
        match existing {
            Some(existing) => {
                existing.quantity = match existing.quantity.checked_add(item.quantity) {
                    Some(quantity) => quantity,
                    None => {
                        bom.note(
                            "QUANTITY_OVERFLOW",
                            format!("merged quantity for `{}` is capped", item.sku),
                        );
                        u32::MAX
                    }
                };
                existing.area_m2 = match (existing.area_m2, item.area_m2) {
                    (Some(left), Some(right)) => Some(left + right),
                    (left, right) => left.or(right),
                };
            }
            None => merged.push(item),
        }
    }
    merged
}
