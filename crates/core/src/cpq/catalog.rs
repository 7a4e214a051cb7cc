//! Read-only rule and price catalogs.
//!
//! A [`CatalogSnapshot`] is loaded once (from TOML) and shared behind an `Arc`.
//! Hosting layers replace it atomically through [`CatalogHandle::swap`]; runs
//! that already hold a snapshot keep using it until they finish.

use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::domain::product::{ProductFamily, StructureType, SubFamily, Usage};

const BUILTIN_CATALOG: &str = include_str!("../../catalog/default.toml");

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemUnit {
    Each,
    Linear,
    Area,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantityBasis {
    PerPanel,
    PerWidthM,
    PerLengthM,
    PerPerimeterM,
    PerAreaM2,
    PerFixationPoint,
    Fixed,
}

/// One logical accessory slot of a construction system.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SlotRule {
    pub slot: String,
    pub basis: QuantityBasis,
    #[serde(default = "default_factor")]
    pub factor: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_slopes: Option<u8>,
    #[serde(default)]
    pub butterfly_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structure: Option<StructureType>,
}

fn default_factor() -> f64 {
    1.0
}

/// Facts a slot condition is evaluated against.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SlotContext {
    pub slopes: Option<u8>,
    pub butterfly: bool,
    pub structure: Option<StructureType>,
}

impl SlotRule {
    pub fn applies(&self, context: &SlotContext) -> bool {
        if let Some(min_slopes) = self.min_slopes {
            if context.slopes.unwrap_or(0) < min_slopes {
                return false;
            }
        }
        if self.butterfly_only && !context.butterfly {
            return false;
        }
        match self.structure {
            Some(required) => context.structure == Some(required),
            None => true,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FixationSets {
    /// Threaded-rod hardware used on metal and concrete structures.
    #[serde(default)]
    pub rod: Vec<SlotRule>,
    /// Saddle and screw hardware used on wood structures.
    #[serde(default)]
    pub saddle: Vec<SlotRule>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixationFamily {
    RodBased,
    SaddleBased,
}

impl FixationFamily {
    pub fn for_structure(structure: StructureType) -> Self {
        match structure {
            StructureType::Metal | StructureType::Concrete => Self::RodBased,
            StructureType::Wood => Self::SaddleBased,
        }
    }
}

impl FixationSets {
    pub fn rules_for(&self, family: FixationFamily) -> &[SlotRule] {
        match family {
            FixationFamily::RodBased => &self.rod,
            FixationFamily::SaddleBased => &self.saddle,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SystemRule {
    pub key: String,
    pub family: ProductFamily,
    pub usage: Usage,
    pub default_supports_per_panel: u32,
    pub points_per_support: u32,
    #[serde(default)]
    pub slots: Vec<SlotRule>,
    #[serde(default)]
    pub fixation: FixationSets,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PanelSpec {
    pub family: ProductFamily,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_family: Option<SubFamily>,
    pub thickness_mm: u32,
    pub usable_width_m: f64,
    pub sku: String,
    pub description: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AccessoryEntry {
    pub slot: String,
    pub sku: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<ProductFamily>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thickness_mm: Option<u32>,
    #[serde(default)]
    pub sub_families: Vec<SubFamily>,
    #[serde(default)]
    pub universal: bool,
    pub unit: ItemUnit,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub piece_length_m: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpanCapacity {
    pub family: ProductFamily,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_family: Option<SubFamily>,
    pub thickness_mm: u32,
    pub max_span_m: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleCatalog {
    #[serde(default)]
    pub systems: Vec<SystemRule>,
    #[serde(default)]
    pub panels: Vec<PanelSpec>,
    #[serde(default)]
    pub accessories: Vec<AccessoryEntry>,
    #[serde(default)]
    pub span_table: Vec<SpanCapacity>,
}

/// Keys a sub-family-qualified entry against a request that may not know its
/// sub-family. Exact sub-family matches win over unqualified entries.
fn sub_family_rank(entry: Option<SubFamily>, requested: Option<SubFamily>) -> Option<u8> {
    match (entry, requested) {
        (Some(entry), Some(requested)) if entry == requested => Some(0),
        (Some(_), Some(_)) => None,
        (None, _) => Some(1),
        (Some(_), None) => Some(2),
    }
}

impl RuleCatalog {
    pub fn system(&self, key: &str) -> Option<&SystemRule> {
        self.systems.iter().find(|system| system.key == key)
    }

    pub fn panel_spec(
        &self,
        family: ProductFamily,
        sub_family: Option<SubFamily>,
        thickness_mm: u32,
    ) -> Option<&PanelSpec> {
        self.panels
            .iter()
            .filter(|panel| panel.family == family && panel.thickness_mm == thickness_mm)
            .filter_map(|panel| sub_family_rank(panel.sub_family, sub_family).map(|rank| (rank, panel)))
            .min_by_key(|(rank, _)| *rank)
            .map(|(_, panel)| panel)
    }

    /// First panel spec of a family, used when only the family is known.
    pub fn family_panel(&self, family: ProductFamily) -> Option<&PanelSpec> {
        self.panels.iter().find(|panel| panel.family == family)
    }

    pub fn max_span(
        &self,
        family: ProductFamily,
        sub_family: Option<SubFamily>,
        thickness_mm: u32,
    ) -> Option<f64> {
        self.span_table
            .iter()
            .filter(|entry| entry.family == family && entry.thickness_mm == thickness_mm)
            .filter_map(|entry| sub_family_rank(entry.sub_family, sub_family).map(|rank| (rank, entry)))
            .min_by_key(|(rank, _)| *rank)
            .map(|(_, entry)| entry.max_span_m)
    }

    /// Span entries of the same family, ordered by thickness.
    pub fn span_entries_for(
        &self,
        family: ProductFamily,
        sub_family: Option<SubFamily>,
    ) -> Vec<&SpanCapacity> {
        let mut entries = self
            .span_table
            .iter()
            .filter(|entry| entry.family == family)
            .filter(|entry| sub_family_rank(entry.sub_family, sub_family).is_some())
            .collect::<Vec<_>>();
        entries.sort_by_key(|entry| entry.thickness_mm);
        entries
    }

    pub fn accessories_for_slot(&self, slot: &str) -> Vec<&AccessoryEntry> {
        self.accessories.iter().filter(|entry| entry.slot == slot).collect()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PanelPrice {
    pub family: ProductFamily,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_family: Option<SubFamily>,
    pub thickness_mm: u32,
    pub unit_price: Decimal,
    #[serde(default = "default_panel_unit")]
    pub unit: ItemUnit,
}

fn default_panel_unit() -> ItemUnit {
    ItemUnit::Area
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItemPrice {
    pub sku: String,
    pub unit_price: Decimal,
    pub unit: ItemUnit,
}

/// Tax-inclusive sale prices.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceCatalog {
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub panel_prices: Vec<PanelPrice>,
    #[serde(default)]
    pub item_prices: Vec<ItemPrice>,
}

impl PriceCatalog {
    pub fn panel_price(
        &self,
        family: ProductFamily,
        sub_family: Option<SubFamily>,
        thickness_mm: u32,
    ) -> Option<&PanelPrice> {
        self.panel_prices
            .iter()
            .filter(|price| price.family == family && price.thickness_mm == thickness_mm)
            .filter_map(|price| sub_family_rank(price.sub_family, sub_family).map(|rank| (rank, price)))
            .min_by_key(|(rank, _)| *rank)
            .map(|(_, price)| price)
    }

    pub fn item_price(&self, sku: &str) -> Option<&ItemPrice> {
        self.item_prices.iter().find(|price| price.sku == sku)
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("could not read catalog `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse catalog: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("catalog validation failed: {0}")]
    Validation(String),
}

#[derive(Debug, Default, Deserialize)]
struct CatalogDocument {
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    systems: Vec<SystemRule>,
    #[serde(default)]
    panels: Vec<PanelSpec>,
    #[serde(default)]
    accessories: Vec<AccessoryEntry>,
    #[serde(default)]
    span_table: Vec<SpanCapacity>,
    #[serde(default)]
    panel_prices: Vec<PanelPrice>,
    #[serde(default)]
    item_prices: Vec<ItemPrice>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CatalogSnapshot {
    pub rules: RuleCatalog,
    pub prices: PriceCatalog,
    fingerprint: String,
}

impl CatalogSnapshot {
    pub fn new(rules: RuleCatalog, prices: PriceCatalog) -> Result<Self, CatalogError> {
        validate(&rules, &prices)?;
        let fingerprint = fingerprint_for(&rules, &prices);
        Ok(Self { rules, prices, fingerprint })
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, CatalogError> {
        let document = toml::from_str::<CatalogDocument>(raw)?;
        let rules = RuleCatalog {
            systems: document.systems,
            panels: document.panels,
            accessories: document.accessories,
            span_table: document.span_table,
        };
        let prices = PriceCatalog {
            currency: document.currency.unwrap_or_else(|| "USD".to_string()),
            panel_prices: document.panel_prices,
            item_prices: document.item_prices,
        };
        Self::new(rules, prices)
    }

    /// Sample catalog bundled with the crate.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_toml_str(BUILTIN_CATALOG)
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

fn validate(rules: &RuleCatalog, prices: &PriceCatalog) -> Result<(), CatalogError> {
    let mut system_keys = BTreeSet::new();
    for system in &rules.systems {
        if !system_keys.insert(system.key.as_str()) {
            return Err(CatalogError::Validation(format!("duplicate system key `{}`", system.key)));
        }
        if system.default_supports_per_panel < 2 {
            return Err(CatalogError::Validation(format!(
                "system `{}` must declare at least 2 default supports per panel",
                system.key
            )));
        }
    }

    for panel in &rules.panels {
        if panel.usable_width_m <= 0.0 {
            return Err(CatalogError::Validation(format!(
                "panel `{}` must have a positive usable width",
                panel.sku
            )));
        }
    }

    for entry in &rules.span_table {
        if entry.max_span_m <= 0.0 {
            return Err(CatalogError::Validation(format!(
                "span entry {} {}mm must have a positive max span",
                entry.family, entry.thickness_mm
            )));
        }
    }

    for entry in &rules.accessories {
        if entry.unit == ItemUnit::Linear && entry.piece_length_m.map_or(true, |length| length <= 0.0) {
            return Err(CatalogError::Validation(format!(
                "linear accessory `{}` must declare a positive piece length",
                entry.sku
            )));
        }
    }

    let mut price_skus = BTreeSet::new();
    for price in &prices.item_prices {
        if !price_skus.insert(price.sku.as_str()) {
            return Err(CatalogError::Validation(format!("duplicate item price `{}`", price.sku)));
        }
        if price.unit_price <= Decimal::ZERO {
            return Err(CatalogError::Validation(format!(
                "item price `{}` must be positive",
                price.sku
            )));
        }
    }

    for price in &prices.panel_prices {
        if price.unit_price <= Decimal::ZERO {
            return Err(CatalogError::Validation(format!(
                "panel price {} {}mm must be positive",
                price.family, price.thickness_mm
            )));
        }
    }

    Ok(())
}

fn fingerprint_for(rules: &RuleCatalog, prices: &PriceCatalog) -> String {
    let canonical = serde_json::to_string(&(rules, prices))
        .unwrap_or_else(|error| format!("serialization_error:{error}"));
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    format!("sha256:{:x}", hasher.finalize())
}

/// Shared, swappable reference to the current catalog snapshot.
#[derive(Clone, Debug)]
pub struct CatalogHandle {
    current: Arc<RwLock<Arc<CatalogSnapshot>>>,
}

impl CatalogHandle {
    pub fn new(snapshot: CatalogSnapshot) -> Self {
        Self { current: Arc::new(RwLock::new(Arc::new(snapshot))) }
    }

    pub fn current(&self) -> Arc<CatalogSnapshot> {
        let guard = self.current.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&*guard)
    }

    /// Installs `snapshot` and returns the one it replaced.
    pub fn swap(&self, snapshot: CatalogSnapshot) -> Arc<CatalogSnapshot> {
        let mut guard = self.current.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::replace(&mut *guard, Arc::new(snapshot))
    }
}
