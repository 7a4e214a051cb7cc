use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::cpq::bom::{BomItem, BomItemType, BomResult};
use crate::cpq::catalog::{ItemUnit, PriceCatalog};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingTraceStep {
    pub stage: String,
    pub detail: String,
    pub amount: Decimal,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingTrace {
    pub currency: String,
    pub steps: Vec<PricingTraceStep>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PricedLine {
    pub sku: String,
    pub description: String,
    pub item_type: BomItemType,
    pub quantity: u32,
    pub unit: ItemUnit,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingPrice {
    pub sku: String,
    pub slot: Option<String>,
    pub reason: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PricingResult {
    pub currency: String,
    pub lines: Vec<PricedLine>,
    pub panel_subtotal: Decimal,
    /// Accessories and fixation hardware.
    pub accessory_subtotal: Decimal,
    pub grand_subtotal: Decimal,
    pub missing_prices: Vec<MissingPrice>,
    /// Catalog prices already include tax; none is added here.
    pub tax_included: bool,
    pub trace: PricingTrace,
}

impl PricingResult {
    /// Subtotals agree with each other and with the priced lines.
    pub fn is_consistent(&self) -> bool {
        let line_sum: Decimal = self.lines.iter().map(|line| line.line_total).sum();
        self.grand_subtotal == self.panel_subtotal + self.accessory_subtotal
            && line_sum == self.grand_subtotal
    }
}

pub trait PricingEngine: Send + Sync {
    fn price(&self, bom: &BomResult, prices: &PriceCatalog) -> PricingResult;
}

#[derive(Clone, Debug, Default)]
pub struct DeterministicPricingEngine;

impl PricingEngine for DeterministicPricingEngine {
    fn price(&self, bom: &BomResult, prices: &PriceCatalog) -> PricingResult {
        price_bom_with_trace(bom, prices)
    }
}

/// Unit price, valuation unit and line total for one BOM item, or the reason
/// it cannot be valued.
fn value_item(item: &BomItem, prices: &PriceCatalog) -> Result<(Decimal, ItemUnit, Decimal), String> {
    let (unit_price, unit) = match item.item_type {
        BomItemType::Panel => {
            let (Some(family), Some(thickness_mm)) = (item.family, item.thickness_mm) else {
                return Err("panel item without family and thickness".to_string());
            };
            let price = prices
                .panel_price(family, item.sub_family, thickness_mm)
                .ok_or_else(|| format!("no panel price for {family} {thickness_mm} mm"))?;
            (price.unit_price, price.unit)
        }
        BomItemType::Accessory | BomItemType::Fixation => {
            let price = prices
                .item_price(&item.sku)
                .ok_or_else(|| format!("sku `{}` not in price catalog", item.sku))?;
            (price.unit_price, price.unit)
        }
    };

    let quantity = Decimal::from(item.quantity);
    let total = match unit {
        ItemUnit::Each => quantity.checked_mul(unit_price),
        ItemUnit::Linear => {
            let piece_length = item
                .piece_length_m
                .ok_or_else(|| "linear price but item has no piece length".to_string())?;
            quantity.checked_mul(measure(piece_length)?).and_then(|length| length.checked_mul(unit_price))
        }
        ItemUnit::Area => {
            let area = item.area_m2.ok_or_else(|| "area price but item has no area".to_string())?;
            measure(area)?.checked_mul(unit_price)
        }
    }
    .ok_or_else(|| format!("line total for `{}` exceeds the decimal range", item.sku))?;

    Ok((unit_price, unit, total.round_dp(2)))
}

fn measure(value: f64) -> Result<Decimal, String> {
    Decimal::from_f64(value)
        .map(|decimal| decimal.round_dp(4))
        .ok_or_else(|| format!("measure {value} is not representable"))
}

pub fn price_bom_with_trace(bom: &BomResult, prices: &PriceCatalog) -> PricingResult {
    let mut lines = Vec::new();
    let mut missing_prices: Vec<MissingPrice> = Vec::new();
    let mut steps = Vec::new();
    let mut panel_subtotal = Decimal::ZERO;
    let mut accessory_subtotal = Decimal::ZERO;

    for item in &bom.items {
        match value_item(item, prices) {
            Ok((unit_price, unit, line_total)) => {
                steps.push(PricingTraceStep {
                    stage: "line".to_string(),
                    detail: format!("{} x{} @ {unit_price} per {unit:?}", item.sku, item.quantity),
                    amount: line_total,
                });
                match item.item_type {
                    BomItemType::Panel => panel_subtotal += line_total,
                    BomItemType::Accessory | BomItemType::Fixation => accessory_subtotal += line_total,
                }
                lines.push(PricedLine {
                    sku: item.sku.clone(),
                    description: item.description.clone(),
                    item_type: item.item_type,
                    quantity: item.quantity,
                    unit,
                    unit_price,
                    line_total,
                });
            }
            Err(reason) => {
                if !missing_prices.iter().any(|missing| missing.sku == item.sku) {
                    missing_prices.push(MissingPrice {
                        sku: item.sku.clone(),
                        slot: item.slot.clone(),
                        reason,
                    });
                }
            }
        }
    }

    let grand_subtotal = panel_subtotal + accessory_subtotal;
    steps.push(PricingTraceStep {
        stage: "panel_subtotal".to_string(),
        detail: "sum(panel lines)".to_string(),
        amount: panel_subtotal,
    });
    steps.push(PricingTraceStep {
        stage: "accessory_subtotal".to_string(),
        detail: "sum(accessory and fixation lines)".to_string(),
        amount: accessory_subtotal,
    });
    steps.push(PricingTraceStep {
        stage: "grand_subtotal".to_string(),
        detail: "panel_subtotal + accessory_subtotal (tax included)".to_string(),
        amount: grand_subtotal,
    });

    tracing::debug!(
        event_name = "quote.pricing.completed",
        lines = lines.len(),
        missing = missing_prices.len(),
        grand_subtotal = %grand_subtotal,
        "bill of materials priced"
    );

    PricingResult {
        currency: prices.currency.clone(),
        lines,
        panel_subtotal,
        accessory_subtotal,
        grand_subtotal,
        missing_prices,
        tax_included: true,
        trace: PricingTrace { currency: prices.currency.clone(), steps },
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{price_bom_with_trace, DeterministicPricingEngine, PricingEngine};
    use crate::cpq::bom::{BomItem, BomItemType, BomResult};
    use crate::cpq::catalog::{ItemPrice, ItemUnit, PanelPrice, PriceCatalog};
    use crate::domain::product::{ProductFamily, SubFamily};

    fn catalog() -> PriceCatalog {
        PriceCatalog {
            currency: "USD".to_string(),
            panel_prices: vec![PanelPrice {
                family: ProductFamily::Isodec,
                sub_family: Some(SubFamily::Eps),
                thickness_mm: 100,
                unit_price: Decimal::new(4607, 2),
                unit: ItemUnit::Area,
            }],
            item_prices: vec![
                ItemPrice { sku: "GOT-1".to_string(), unit_price: Decimal::new(685, 2), unit: ItemUnit::Linear },
                ItemPrice { sku: "TOR-1".to_string(), unit_price: Decimal::new(30, 2), unit: ItemUnit::Each },
            ],
        }
    }

    fn accessory(sku: &str, quantity: u32, unit: ItemUnit, piece_length_m: Option<f64>) -> BomItem {
        BomItem {
            item_type: BomItemType::Accessory,
            slot: Some("slot".to_string()),
            sku: sku.to_string(),
            description: sku.to_string(),
            quantity,
            unit,
            piece_length_m,
            area_m2: None,
            selection_tier: None,
            family: None,
            sub_family: None,
            thickness_mm: None,
        }
    }

    fn panel(quantity: u32, area_m2: f64) -> BomItem {
        BomItem {
            item_type: BomItemType::Panel,
            slot: None,
            sku: "ISODEC-EPS-100".to_string(),
            description: "Isodec".to_string(),
            quantity,
            unit: ItemUnit::Area,
            piece_length_m: Some(6.0),
            area_m2: Some(area_m2),
            selection_tier: None,
            family: Some(ProductFamily::Isodec),
            sub_family: Some(SubFamily::Eps),
            thickness_mm: Some(100),
        }
    }

    #[test]
    fn values_lines_by_price_unit() {
        let bom = BomResult {
            items: vec![
                panel(10, 67.2),
                accessory("GOT-1", 4, ItemUnit::Linear, Some(3.0)),
                accessory("TOR-1", 80, ItemUnit::Each, None),
            ],
            ..BomResult::default()
        };

        let result = DeterministicPricingEngine.price(&bom, &catalog());

        // 67.2 m2 x 46.07 = 3095.904 -> 3095.90
        assert_eq!(result.panel_subtotal, Decimal::new(309_590, 2));
        // 4 x 3 m x 6.85 = 82.20 and 80 x 0.30 = 24.00
        assert_eq!(result.accessory_subtotal, Decimal::new(10_620, 2));
        assert_eq!(result.grand_subtotal, Decimal::new(320_210, 2));
        assert!(result.tax_included);
        assert!(result.is_consistent());
        assert_eq!(result.trace.steps.last().map(|step| step.stage.as_str()), Some("grand_subtotal"));
    }

    #[test]
    fn unpriced_sku_is_excluded_and_reported_once() {
        let bom = BomResult {
            items: vec![
                accessory("TOR-1", 10, ItemUnit::Each, None),
                accessory("NOPE-1", 3, ItemUnit::Each, None),
                accessory("NOPE-1", 2, ItemUnit::Linear, Some(3.0)),
            ],
            ..BomResult::default()
        };

        let result = price_bom_with_trace(&bom, &catalog());
        assert_eq!(result.missing_prices.len(), 1);
        assert_eq!(result.missing_prices[0].sku, "NOPE-1");
        assert_eq!(result.grand_subtotal, Decimal::new(300, 2));
        assert!(result.is_consistent());
    }

    #[test]
    fn linear_price_without_piece_length_is_missing() {
        let bom = BomResult {
            items: vec![accessory("GOT-1", 4, ItemUnit::Each, None)],
            ..BomResult::default()
        };

        let result = price_bom_with_trace(&bom, &catalog());
        assert!(result.lines.is_empty());
        assert!(result.missing_prices[0].reason.contains("piece length"));
        assert_eq!(result.grand_subtotal, Decimal::ZERO);
    }

    #[test]
    fn panel_without_matching_price_is_missing() {
        let mut item = panel(4, 20.0);
        item.thickness_mm = Some(250);
        let bom = BomResult { items: vec![item], ..BomResult::default() };

        let result = price_bom_with_trace(&bom, &catalog());
        assert_eq!(result.missing_prices.len(), 1);
        assert_eq!(result.panel_subtotal, Decimal::ZERO);
    }
}
