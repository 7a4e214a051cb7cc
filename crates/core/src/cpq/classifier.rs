use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::cpq::text::{has_phrase, has_whole_phrase, normalize_words};
use crate::domain::quotation::OperatingMode;

pub const DEFAULT_TIE_RATIO: f64 = 0.85;
pub const MIN_CONFIDENCE: f64 = 0.2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    RoofSystem,
    WallSystem,
    CombinedRoom,
    AccessoriesOnly,
    Update,
    Waterproofing,
    ConventionalSheet,
    PostSale,
    InfoOnly,
    Mixed,
}

impl RequestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RoofSystem => "roof_system",
            Self::WallSystem => "wall_system",
            Self::CombinedRoom => "combined_room",
            Self::AccessoriesOnly => "accessories_only",
            Self::Update => "update",
            Self::Waterproofing => "waterproofing",
            Self::ConventionalSheet => "conventional_sheet",
            Self::PostSale => "post_sale",
            Self::InfoOnly => "info_only",
            Self::Mixed => "mixed",
        }
    }
}

/// Keyword banks, one per category. Every keyword present in the text adds
/// one point to its category.
const CATEGORY_BANKS: &[(RequestType, &[&str])] = &[
    (
        RequestType::RoofSystem,
        &["techo", "cubierta", "tejado", "azotea", "roof", "isodec", "isoroof", "aguas", "cumbrera"],
    ),
    (
        RequestType::WallSystem,
        &["pared", "muro", "fachada", "cerramiento", "tabique", "wall", "isopanel", "isowall"],
    ),
    (
        RequestType::CombinedRoom,
        &["camara", "frigorific", "cuarto frio", "cold room", "isofrig", "techo y pared"],
    ),
    (
        RequestType::AccessoriesOnly,
        &["solo accesorios", "solo perfiles", "only accessories", "accesorios sueltos", "repuesto"],
    ),
    (
        RequestType::Update,
        &["actualizar", "modificar la cotizacion", "cambiar la cotizacion", "agregar a la cotizacion", "update", "revision"],
    ),
    (
        RequestType::Waterproofing,
        &["impermeabiliz", "membrana", "filtracion", "gotera", "waterproof", "leak"],
    ),
    (
        RequestType::ConventionalSheet,
        &["chapa", "trapezoidal", "sinusoidal", "zinc", "sheet metal", "corrugated"],
    ),
    (
        RequestType::PostSale,
        &["reclamo", "garantia", "devolucion", "factura", "entrega pendiente", "warranty", "complaint", "refund"],
    ),
    (
        RequestType::InfoOnly,
        &["informacion", "que es", "diferencia entre", "ficha tecnica", "catalogo", "consulta", "information", "what is"],
    ),
];

const FORMAL_KEYWORDS: &[&str] =
    &["cotizacion formal", "formal", "para el cliente", "oficial", "customer facing"];
const ESTIMATE_KEYWORDS: &[&str] = &[
    "estimado",
    "estimada",
    "estimacion",
    "aproximado",
    "aproximada",
    "presupuesto rapido",
    "interno",
    "estimate",
    "estimated",
    "ballpark",
    "rough",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeSource {
    Detected,
    Default,
    Caller,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub request_type: RequestType,
    pub mode: OperatingMode,
    pub mode_source: ModeSource,
    pub confidence: f64,
    /// `category:keyword` pairs, in bank order.
    pub matched_signals: Vec<String>,
    pub scores: BTreeMap<RequestType, u32>,
}

pub trait Classifier: Send + Sync {
    fn classify(&self, text: &str, mode_override: Option<OperatingMode>) -> ClassificationResult;
}

#[derive(Clone, Debug)]
pub struct DeterministicClassifier {
    tie_ratio: f64,
}

impl DeterministicClassifier {
    pub fn new(tie_ratio: f64) -> Self {
        Self { tie_ratio }
    }
}

impl Default for DeterministicClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_TIE_RATIO)
    }
}

impl Classifier for DeterministicClassifier {
    fn classify(&self, text: &str, mode_override: Option<OperatingMode>) -> ClassificationResult {
        classify_text(text, mode_override, self.tie_ratio)
    }
}

pub fn classify_text(
    text: &str,
    mode_override: Option<OperatingMode>,
    tie_ratio: f64,
) -> ClassificationResult {
    let normalized = normalize_words(text);

    let mut scores = BTreeMap::new();
    let mut matched_signals = Vec::new();
    for (category, keywords) in CATEGORY_BANKS {
        let mut score = 0u32;
        for keyword in keywords.iter().filter(|keyword| has_phrase(&normalized, keyword)) {
            score += 1;
            matched_signals.push(format!("{}:{keyword}", category.as_str()));
        }
        scores.insert(*category, score);
    }

    let (request_type, confidence) = pick_request_type(&scores, tie_ratio);
    let (mode, mode_source) = match mode_override {
        Some(mode) => (mode, ModeSource::Caller),
        None => detect_mode(&normalized, request_type),
    };
    tracing::debug!(
        event_name = "quote.classifier.classified",
        request_type = ?request_type,
        mode = ?mode,
        confidence,
        "request classified"
    );

    ClassificationResult { request_type, mode, mode_source, confidence, matched_signals, scores }
}

fn pick_request_type(scores: &BTreeMap<RequestType, u32>, tie_ratio: f64) -> (RequestType, f64) {
    let total: u32 = scores.values().sum();
    if total == 0 {
        return (RequestType::InfoOnly, MIN_CONFIDENCE);
    }

    // Bank order decides between equal scores before the tie rule applies.
    let mut ranked = CATEGORY_BANKS
        .iter()
        .map(|(category, _)| (*category, scores.get(category).copied().unwrap_or(0)))
        .collect::<Vec<_>>();
    ranked.sort_by(|left, right| right.1.cmp(&left.1));

    let (top_type, top_score) = ranked[0];
    let second_score = ranked.get(1).map_or(0, |(_, score)| *score);
    let share = f64::from(top_score) / f64::from(total);

    let near_tie = second_score > 0 && f64::from(second_score) >= tie_ratio * f64::from(top_score);
    if near_tie {
        return (RequestType::Mixed, clamp_confidence(share * 0.5));
    }
    (top_type, clamp_confidence(share))
}

fn clamp_confidence(value: f64) -> f64 {
    value.clamp(MIN_CONFIDENCE, 1.0)
}

fn detect_mode(normalized: &str, request_type: RequestType) -> (OperatingMode, ModeSource) {
    if FORMAL_KEYWORDS.iter().any(|keyword| has_whole_phrase(normalized, keyword)) {
        return (OperatingMode::Formal, ModeSource::Detected);
    }
    if ESTIMATE_KEYWORDS.iter().any(|keyword| has_whole_phrase(normalized, keyword)) {
        return (OperatingMode::InternalEstimate, ModeSource::Detected);
    }
    if request_type == RequestType::InfoOnly {
        return (OperatingMode::Informational, ModeSource::Default);
    }
    (OperatingMode::InternalEstimate, ModeSource::Default)
}
