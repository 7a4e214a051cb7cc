//! Tolerant extraction of a [`QuoteRequest`] from free order text.
//!
//! Parsing never fails. Every tracked field that cannot be extracted is left
//! empty and listed in `incomplete_fields` with a reason. When a value could
//! come from several phrasings the resolution order is explicit units, then
//! explicit keywords, then bare-number heuristics.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::cpq::text::{fold_lowercase, has_phrase, normalize_words};
use crate::domain::product::{ProductFamily, StructureType, SubFamily, Usage};
use crate::domain::request::{
    ContactInfo, Geometry, PanelLine, QuoteRequest, FIELD_DIMENSIONS, FIELD_FAMILY,
    FIELD_LOCATION, FIELD_SPAN, FIELD_STRUCTURE_TYPE, FIELD_THICKNESS, FIELD_USAGE,
};

const NUM: &str = r"(\d+(?:\.\d+)?)";
const METRES: &str = r"(?:metros|metres|meters|mts|mt|m)\b";
const PANEL_NOUNS: &str = r"(?:paneles|panels|panel|placas|chapas|unidades|piezas|u)";
/// Readings above these bounds are discarded as implausible.
const MAX_PANEL_COUNT: u32 = 5_000;
const MAX_TOTAL_PANEL_COUNT: u32 = 20_000;
const MAX_DIMENSION_M: f64 = 1_000.0;
const MAX_AREA_M2: f64 = 100_000.0;

static RE_DECIMAL_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d),(\d)").expect("decimal comma pattern"));
static RE_FAMILY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(isodec|isoroof|isopanel|isowall|isofrig)\b").expect("family pattern")
});
static RE_SUB_FAMILY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(eps|pir|3g|foil|plus)\b").expect("sub-family pattern"));
static RE_THICKNESS_UNIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"{NUM}\s*(mm|cm)\b")).expect("thickness unit pattern"));
static RE_THICKNESS_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\b(?:espesor|grosor|thickness)\s*(?:de|of|:|=)?\s*{NUM}"))
        .expect("thickness label pattern")
});
static RE_THICKNESS_FAMILY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:isodec|isoroof|isopanel|isowall|isofrig)\s*(?:eps|pir|3g|foil|plus)?\s*(\d{2,3})\b(\s*(?:x|por|m\b|mts|metros))?",
    )
    .expect("family thickness pattern")
});
static RE_SPAN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"\b(?:luz|vano|span|entre apoyos|apoyos cada)\s*(?:libre\s*)?(?:es de|de|of|:|=)?\s*{NUM}\s*(cm|metros|mts|mt|m)?\b"
    ))
    .expect("span pattern")
});
static RE_PANEL_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\b(\d+)\s*{PANEL_NOUNS}\s*(?:de|of|x|por)\s*{NUM}\s*{METRES}"))
        .expect("panel line pattern")
});
static RE_PANEL_MORE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^\s*(?:,|\+|\by\b|\band\b|\bmas\b)\s*(\d+)\s*{PANEL_NOUNS}?\s*(?:de|of|x|por)\s*{NUM}\s*{METRES}"
    ))
    .expect("panel continuation pattern")
});
static RE_DIMENSIONS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"{NUM}\s*(?:metros|mts|m)?\s*(?:x|por|by|\*)\s*{NUM}\s*(?:metros|mts|m)?"
    ))
    .expect("dimension pattern")
});
static RE_WIDTH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\b(?:ancho|width|frente)\s*(?:es de|de|of|:|=)?\s*{NUM}"))
        .expect("width pattern")
});
static RE_LENGTH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\b(?:largo|length|longitud|fondo)\s*(?:es de|de|of|:|=)?\s*{NUM}"))
        .expect("length pattern")
});
static RE_AREA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"{NUM}\s*(?:m2|mts2|metros cuadrados|sqm|square meters|square metres)"
    ))
    .expect("area pattern")
});
static RE_LOCATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:envio|enviar|flete|entrega|entregar|shipping|delivery|deliver|transporte)\s+(?:a|en|to|hasta|para|in)\s+(?:la ciudad de\s+)?([a-z][a-z ]{1,40})",
    )
    .expect("location pattern")
});
static RE_EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}").expect("email pattern")
});
static RE_PHONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:\b(?:tel|telefono|cel|celular|movil|phone|whatsapp|wpp)\b\.?\s*:?\s*(\+?\d[\d -]{5,}\d))|(\+\d[\d -]{7,}\d)",
    )
    .expect("phone pattern")
});
static RE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:\bme llamo|\bmi nombre es|\bnombre\s*:|\bname\s*:|\bmy name is|\bcontacto\s*:|\batte\.?|\bsaludos,?)\s*([a-z]+(?:\s+[a-z]+)?)",
    )
    .expect("name pattern")
});

const ROOF_KEYWORDS: &[&str] = &["techo", "cubierta", "tejado", "azotea", "roof"];
const WALL_KEYWORDS: &[&str] = &["pared", "muro", "fachada", "cerramiento", "tabique", "wall"];
const COLD_ROOM_KEYWORDS: &[&str] =
    &["camara", "frigorific", "cuarto frio", "cold room", "freezer"];

const STRUCTURE_SYNONYMS: &[(StructureType, &[&str])] = &[
    (StructureType::Metal, &["metal", "acero", "hierro", "steel", "perfiles c", "estructura metalica"]),
    (StructureType::Concrete, &["hormigon", "concreto", "concrete", "losa", "cemento", "mamposteria"]),
    (StructureType::Wood, &["madera", "wood", "timber", "tirantes"]),
];

const FOUR_SLOPES: &[&str] = &["cuatro aguas", "4 aguas", "hip roof", "four slopes", "4 slopes"];
const TWO_SLOPES: &[&str] = &["dos aguas", "2 aguas", "gable", "two slopes", "2 slopes"];
const ONE_SLOPE: &[&str] =
    &["un agua", "una agua", "1 agua", "monopitch", "single slope", "one slope", "shed roof"];
const BUTTERFLY: &[&str] = &["mariposa", "butterfly"];
const MID_SPAN_JOINT: &[&str] =
    &["empalme", "junta intermedia", "union intermedia", "solape", "traslape", "splice", "mid span joint"];
const DRAWING_REFERENCE: &[&str] = &[
    "ver plano",
    "segun plano",
    "plano adjunto",
    "adjunto plano",
    "ver croquis",
    "croquis",
    "see drawing",
    "see plan",
    "as per drawing",
];
const SHIPPING: &[&str] = &[
    "envio",
    "enviar",
    "flete",
    "entrega en",
    "entregar en",
    "shipping",
    "delivery",
    "deliver to",
    "transporte",
];
const ACCESSORY_MENTIONS: &[(&str, &[&str])] = &[
    ("gotero", &["gotero", "drip"]),
    ("cumbrera", &["cumbrera", "ridge"]),
    ("canalon", &["canalon", "gutter"]),
    ("babeta", &["babeta", "flashing"]),
    ("tornillo", &["tornillo", "screw"]),
    ("silicona", &["silicona", "sellador", "sealant"]),
    ("perfil", &["perfil", "profile"]),
    ("varilla", &["varilla", "threaded rod"]),
    ("caballete", &["caballete", "saddle"]),
    ("taco", &["taco", "anchor"]),
];
const LOCATION_STOP_WORDS: &[&str] =
    &[" con ", " y ", " with ", " and ", " por ", " para ", " contacto", " tel", " mi ", " el dia"];
const NAME_STOP_WORDS: &[&str] =
    &["tel", "telefono", "cel", "celular", "y", "de", "email", "mail", "phone", "and"];

/// A parsed value or the reason it could not be parsed.
#[derive(Clone, Debug, PartialEq)]
pub enum Extraction<T> {
    Found(T),
    Missing(String),
}

impl<T> Extraction<T> {
    pub fn from_option(value: Option<T>, reason: impl Into<String>) -> Self {
        match value {
            Some(value) => Self::Found(value),
            None => Self::Missing(reason.into()),
        }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Found(value) => Some(value),
            Self::Missing(_) => None,
        }
    }
}

#[derive(Debug, Default)]
struct Gaps {
    fields: Vec<String>,
    reasons: BTreeMap<String, String>,
}

impl Gaps {
    fn take<T>(&mut self, field: &str, extraction: Extraction<T>) -> Option<T> {
        match extraction {
            Extraction::Found(value) => Some(value),
            Extraction::Missing(reason) => {
                self.fields.push(field.to_string());
                self.reasons.insert(field.to_string(), reason);
                None
            }
        }
    }

    fn record(&mut self, field: &str, reason: impl Into<String>) {
        self.fields.push(field.to_string());
        self.reasons.insert(field.to_string(), reason.into());
    }
}

pub trait RequestParser: Send + Sync {
    fn parse(&self, text: &str) -> QuoteRequest;
}

#[derive(Clone, Debug, Default)]
pub struct DeterministicParser;

impl RequestParser for DeterministicParser {
    fn parse(&self, text: &str) -> QuoteRequest {
        parse_request(text)
    }
}

pub fn parse_request(text: &str) -> QuoteRequest {
    let folded = RE_DECIMAL_COMMA.replace_all(&fold_lowercase(text), "$1.$2").into_owned();
    let words = normalize_words(text);
    let mut gaps = Gaps::default();
    let mut parse_notes = Vec::new();

    let family = gaps.take(
        FIELD_FAMILY,
        Extraction::from_option(
            extract_family(&folded),
            "no product family named (isodec, isoroof, isopanel, isowall, isofrig)",
        ),
    );
    let sub_family = extract_sub_family(&folded);
    let thickness_mm = gaps.take(
        FIELD_THICKNESS,
        Extraction::from_option(extract_thickness(&folded), "no thickness in mm or cm"),
    );

    let usage = match (extract_usage(&words), family) {
        (Some(usage), _) => Some(usage),
        (None, Some(family)) => {
            let usage = family.default_usage();
            parse_notes.push(format!("usage inferred as {usage} from family {family}"));
            Some(usage)
        }
        (None, None) => {
            gaps.record(FIELD_USAGE, "no usage keyword and no family to infer it from");
            None
        }
    };

    let structure_type = gaps.take(
        FIELD_STRUCTURE_TYPE,
        Extraction::from_option(
            extract_structure(&words),
            "no structure keyword (metal, hormigon, madera)",
        ),
    );

    let span_extraction =
        Extraction::from_option(extract_span(&folded), "no span (luz, vano, entre apoyos) given");
    let span_m = match usage {
        Some(usage) if usage.has_span() => gaps.take(FIELD_SPAN, span_extraction),
        _ => span_extraction.value().copied(),
    };

    let geometry = extract_geometry(&folded, &words, &mut parse_notes);
    if !geometry.is_sizable() {
        let reason = match (geometry.width_m, geometry.length_m) {
            (Some(_), None) => "width given without length",
            (None, Some(_)) => "length given without width",
            _ => "no panel list, width x length pair or area",
        };
        gaps.record(FIELD_DIMENSIONS, reason);
    }

    let shipping_requested = SHIPPING.iter().any(|keyword| has_phrase(&words, keyword));
    let location = if shipping_requested {
        gaps.take(
            FIELD_LOCATION,
            Extraction::from_option(extract_location(&folded), "shipping requested without a destination"),
        )
    } else {
        None
    };
    tracing::debug!(
        event_name = "quote.parser.parsed",
        incomplete_fields = ?gaps.fields,
        panel_lines = geometry.panel_lines.len(),
        "order text parsed"
    );

    QuoteRequest {
        raw_text: text.to_string(),
        family,
        sub_family,
        thickness_mm,
        usage,
        structure_type,
        span_m,
        geometry,
        location,
        contact: extract_contact(&folded),
        shipping_requested,
        accessories_mentioned: extract_accessory_mentions(&words),
        drawing_reference: DRAWING_REFERENCE.iter().any(|keyword| has_phrase(&words, keyword)),
        incomplete_fields: gaps.fields,
        missing_reasons: gaps.reasons,
        assumed_fields: Vec::new(),
        parse_notes,
    }
}

fn capture_f64(captures: &Captures<'_>, index: usize) -> Option<f64> {
    captures.get(index)?.as_str().parse::<f64>().ok()
}

fn extract_family(folded: &str) -> Option<ProductFamily> {
    let captures = RE_FAMILY.captures(folded)?;
    match captures.get(1)?.as_str() {
        "isodec" => Some(ProductFamily::Isodec),
        "isoroof" => Some(ProductFamily::Isoroof),
        "isopanel" => Some(ProductFamily::Isopanel),
        "isowall" => Some(ProductFamily::Isowall),
        "isofrig" => Some(ProductFamily::Isofrig),
        _ => None,
    }
}

fn extract_sub_family(folded: &str) -> Option<SubFamily> {
    let captures = RE_SUB_FAMILY.captures(folded)?;
    match captures.get(1)?.as_str() {
        "eps" => Some(SubFamily::Eps),
        "pir" => Some(SubFamily::Pir),
        "3g" => Some(SubFamily::ThreeG),
        "foil" => Some(SubFamily::Foil),
        "plus" => Some(SubFamily::Plus),
        _ => None,
    }
}

fn plausible_thickness(value_mm: f64) -> Option<u32> {
    (10.0..=300.0).contains(&value_mm).then(|| value_mm.round() as u32)
}

fn extract_thickness(folded: &str) -> Option<u32> {
    for captures in RE_THICKNESS_UNIT.captures_iter(folded) {
        let Some(value) = capture_f64(&captures, 1) else { continue };
        let value_mm = match captures.get(2).map(|unit| unit.as_str()) {
            Some("cm") => value * 10.0,
            _ => value,
        };
        if let Some(thickness) = plausible_thickness(value_mm) {
            return Some(thickness);
        }
    }

    if let Some(thickness) = RE_THICKNESS_LABEL
        .captures_iter(folded)
        .find_map(|captures| capture_f64(&captures, 1).and_then(plausible_thickness))
    {
        return Some(thickness);
    }

    RE_THICKNESS_FAMILY
        .captures_iter(folded)
        .filter(|captures| captures.get(2).is_none())
        .find_map(|captures| capture_f64(&captures, 1).and_then(plausible_thickness))
}

fn extract_usage(words: &str) -> Option<Usage> {
    let mentions = |keywords: &[&str]| keywords.iter().any(|keyword| has_phrase(words, keyword));
    if mentions(COLD_ROOM_KEYWORDS) {
        Some(Usage::ColdRoom)
    } else if mentions(ROOF_KEYWORDS) {
        Some(Usage::Roof)
    } else if mentions(WALL_KEYWORDS) {
        Some(Usage::Wall)
    } else {
        None
    }
}

fn extract_structure(words: &str) -> Option<StructureType> {
    STRUCTURE_SYNONYMS
        .iter()
        .find(|(_, synonyms)| synonyms.iter().any(|synonym| has_phrase(words, synonym)))
        .map(|(structure, _)| *structure)
}

fn extract_span(folded: &str) -> Option<f64> {
    RE_SPAN.captures_iter(folded).find_map(|captures| {
        let value = capture_f64(&captures, 1)?;
        let span = match captures.get(2).map(|unit| unit.as_str()) {
            Some("cm") => value / 100.0,
            _ => value,
        };
        (0.1..=30.0).contains(&span).then_some(span)
    })
}

fn extract_panel_lines(folded: &str, notes: &mut Vec<String>) -> Vec<PanelLine> {
    let mut lines = Vec::new();
    let mut dropped = 0usize;
    let mut position = 0;

    while let Some(captures) = RE_PANEL_LINE.captures_at(folded, position) {
        let Some(whole) = captures.get(0) else { break };
        push_panel_line(&mut lines, &captures, &mut dropped);
        position = whole.end();

        while let Some(more) = RE_PANEL_MORE.captures(&folded[position..]) {
            let Some(more_whole) = more.get(0) else { break };
            push_panel_line(&mut lines, &more, &mut dropped);
            position += more_whole.end();
        }
    }

    if dropped > 0 {
        notes.push(format!(
            "{dropped} panel line(s) ignored past {MAX_TOTAL_PANEL_COUNT} panels in total"
        ));
    }
    lines
}

fn push_panel_line(lines: &mut Vec<PanelLine>, captures: &Captures<'_>, dropped: &mut usize) {
    let count = captures.get(1).and_then(|count| count.as_str().parse::<u32>().ok());
    let length = capture_f64(captures, 2);
    let (Some(count), Some(length_m)) = (count, length) else { return };
    if !(1..=MAX_PANEL_COUNT).contains(&count) || length_m <= 0.0 || length_m > 30.0 {
        return;
    }

    let placed: u32 = lines.iter().map(|line| line.count).sum();
    if placed + count > MAX_TOTAL_PANEL_COUNT {
        *dropped += 1;
        return;
    }
    lines.push(PanelLine { count, length_m });
}

fn extract_geometry(folded: &str, words: &str, notes: &mut Vec<String>) -> Geometry {
    let panel_lines = extract_panel_lines(folded, notes);

    let labeled_width = RE_WIDTH.captures(folded).and_then(|captures| capture_f64(&captures, 1));
    let labeled_length = RE_LENGTH.captures(folded).and_then(|captures| capture_f64(&captures, 1));
    let pair = RE_DIMENSIONS
        .captures(folded)
        .and_then(|captures| Some((capture_f64(&captures, 1)?, capture_f64(&captures, 2)?)));

    let width_m = labeled_width.or_else(|| pair.map(|(first, _)| first));
    let length_m = labeled_length.or_else(|| pair.map(|(_, second)| second));
    if pair.is_some() && (labeled_width.is_none() || labeled_length.is_none()) {
        notes.push("unlabeled dimension pair read as width x length".to_string());
    }

    let area_m2 = RE_AREA.captures(folded).and_then(|captures| capture_f64(&captures, 1));

    let slopes = if FOUR_SLOPES.iter().any(|keyword| has_phrase(words, keyword)) {
        Some(4)
    } else if TWO_SLOPES.iter().any(|keyword| has_phrase(words, keyword)) {
        Some(2)
    } else if ONE_SLOPE.iter().any(|keyword| has_phrase(words, keyword)) {
        Some(1)
    } else {
        None
    };

    Geometry {
        panel_lines,
        width_m: width_m.filter(|value| *value > 0.0 && *value <= MAX_DIMENSION_M),
        length_m: length_m.filter(|value| *value > 0.0 && *value <= MAX_DIMENSION_M),
        area_m2: area_m2.filter(|value| *value > 0.0 && *value <= MAX_AREA_M2),
        slopes,
        butterfly: BUTTERFLY.iter().any(|keyword| has_phrase(words, keyword)),
        mid_span_joint: MID_SPAN_JOINT.iter().any(|keyword| has_phrase(words, keyword)),
    }
}

fn extract_location(folded: &str) -> Option<String> {
    let captured = RE_LOCATION.captures(folded)?.get(1)?.as_str().to_string();
    let padded = format!("{captured} ");
    let cut = LOCATION_STOP_WORDS
        .iter()
        .filter_map(|stop| padded.find(stop))
        .min()
        .unwrap_or(padded.len());
    let location = padded[..cut].trim().to_string();
    (!location.is_empty()).then_some(location)
}

fn extract_contact(folded: &str) -> ContactInfo {
    let email = RE_EMAIL.find(folded).map(|found| found.as_str().to_string());
    let phone = RE_PHONE.captures(folded).and_then(|captures| {
        let raw = captures.get(1).or_else(|| captures.get(2))?.as_str();
        let digits = raw.chars().filter(|c| c.is_ascii_digit() || *c == '+').collect::<String>();
        (digits.len() >= 7).then_some(digits)
    });
    let name = RE_NAME.captures(folded).and_then(|captures| {
        let raw = captures.get(1)?.as_str();
        let kept = raw
            .split_whitespace()
            .take_while(|word| !NAME_STOP_WORDS.contains(word))
            .map(title_case)
            .collect::<Vec<_>>();
        (!kept.is_empty()).then(|| kept.join(" "))
    });

    ContactInfo { name, phone, email }
}

fn title_case(word: &str) -> String {
    let mut characters = word.chars();
    match characters.next() {
        Some(first) => first.to_uppercase().chain(characters).collect(),
        None => String::new(),
    }
}

fn extract_accessory_mentions(words: &str) -> Vec<String> {
    ACCESSORY_MENTIONS
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|keyword| has_phrase(words, keyword)))
        .map(|(name, _)| (*name).to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{parse_request, DeterministicParser, Extraction, RequestParser};
    use crate::domain::product::{ProductFamily, StructureType, SubFamily, Usage};
    use crate::domain::request::PanelLine;

    #[test]
    fn parses_complete_roof_order() {
        let request = parse_request(
            "Cotización Isodec EPS 100 mm para techo a dos aguas sobre estructura metálica, \
             luz de 4,5 m, 10 paneles de 6 m. Envío a Montevideo.",
        );

        assert_eq!(request.family, Some(ProductFamily::Isodec));
        assert_eq!(request.sub_family, Some(SubFamily::Eps));
        assert_eq!(request.thickness_mm, Some(100));
        assert_eq!(request.usage, Some(Usage::Roof));
        assert_eq!(request.structure_type, Some(StructureType::Metal));
        assert_eq!(request.span_m, Some(4.5));
        assert_eq!(request.geometry.slopes, Some(2));
        assert_eq!(request.geometry.panel_lines, vec![PanelLine { count: 10, length_m: 6.0 }]);
        assert!(request.shipping_requested);
        assert_eq!(request.location.as_deref(), Some("montevideo"));
        assert!(request.incomplete_fields.is_empty(), "{:?}", request.incomplete_fields);
    }

    #[test]
    fn missing_span_on_roof_is_tracked_with_reason() {
        let request = parse_request("isodec 100mm techo 8x5 estructura de madera");
        assert!(request.is_incomplete("span"));
        assert!(request.missing_reasons.contains_key("span"));
        assert_eq!(request.structure_type, Some(StructureType::Wood));
    }

    #[test]
    fn wall_requests_do_not_track_span() {
        let request = parse_request("isopanel 100 mm pared 12 x 3 hormigon");
        assert_eq!(request.usage, Some(Usage::Wall));
        assert!(!request.is_incomplete("span"));
        assert_eq!(request.structure_type, Some(StructureType::Concrete));
    }

    #[test]
    fn mixed_length_enumeration_is_split_into_lines() {
        let request = parse_request("Isoroof 30 mm: 10 paneles de 6 m y 5 de 4,5 m, luz 2 m");
        assert_eq!(
            request.geometry.panel_lines,
            vec![PanelLine { count: 10, length_m: 6.0 }, PanelLine { count: 5, length_m: 4.5 }]
        );
        assert_eq!(request.geometry.total_panel_count(), 15);
        assert_eq!(request.span_m, Some(2.0));
    }

    #[test]
    fn panel_lines_past_total_bound_are_ignored_with_note() {
        let text = format!("isodec eps 100 mm techo, luz 1 m, {}", "5000 paneles de 30 m, ".repeat(6));
        let request = parse_request(&text);

        assert_eq!(request.geometry.panel_lines.len(), 4);
        assert_eq!(request.geometry.total_panel_count(), 20_000);
        assert!(request.parse_notes.iter().any(|note| note.contains("2 panel line(s) ignored")));
    }

    #[test]
    fn thickness_units_are_normalized_to_millimetres() {
        assert_eq!(parse_request("isodec de 10 cm").thickness_mm, Some(100));
        assert_eq!(parse_request("espesor 150 isodec").thickness_mm, Some(150));
        assert_eq!(parse_request("isoroof 3g 50 techo").thickness_mm, Some(50));
        assert_eq!(parse_request("isodec 10x5").thickness_mm, None);
    }

    #[test]
    fn labeled_dimensions_win_over_unlabeled_pair() {
        let request = parse_request("techo isodec ancho 7 m largo 12 m");
        assert_eq!(request.geometry.width_m, Some(7.0));
        assert_eq!(request.geometry.length_m, Some(12.0));

        let english = parse_request("roof width: 4 length: 9");
        assert_eq!(english.geometry.width_m, Some(4.0));
        assert_eq!(english.geometry.length_m, Some(9.0));
    }

    #[test]
    fn unlabeled_pair_takes_first_number_as_width() {
        // Customers often write length first; the pair is still read as width x length.
        let request = parse_request("techo isodec 10 por 5");
        assert_eq!(request.geometry.width_m, Some(10.0));
        assert_eq!(request.geometry.length_m, Some(5.0));
        assert!(request.parse_notes.iter().any(|note| note.contains("width x length")));
    }

    #[test]
    fn explicit_area_makes_geometry_sizable() {
        let request = parse_request("necesito 60 m² de isowall 50mm");
        assert_eq!(request.geometry.area_m2, Some(60.0));
        assert!(!request.is_incomplete("dimensions"));
        assert_eq!(request.usage, Some(Usage::Wall));
        assert!(request.parse_notes.iter().any(|note| note.contains("inferred")));
    }

    #[test]
    fn span_in_centimetres_is_converted() {
        let request = parse_request("isofrig 100mm camara, apoyos cada 250 cm");
        assert_eq!(request.usage, Some(Usage::ColdRoom));
        assert_eq!(request.span_m, Some(2.5));
    }

    #[test]
    fn geometry_flags_and_drawing_reference() {
        let request =
            parse_request("techo mariposa con empalme en el medio, ver plano adjunto, 4 aguas");
        assert!(request.geometry.butterfly);
        assert!(request.geometry.mid_span_joint);
        assert!(request.drawing_reference);
        assert_eq!(request.geometry.slopes, Some(4));
    }

    #[test]
    fn shipping_without_destination_is_incomplete() {
        let request = parse_request("isodec 100 mm techo, incluir flete");
        assert!(request.shipping_requested);
        assert!(request.is_incomplete("location"));
    }

    #[test]
    fn contact_data_is_extracted() {
        let request = parse_request(
            "Me llamo Ana Suárez, tel: 099 123 456, mail ana.suarez@example.com. Techo isodec",
        );
        assert_eq!(request.contact.name.as_deref(), Some("Ana Suarez"));
        assert_eq!(request.contact.phone.as_deref(), Some("099123456"));
        assert_eq!(request.contact.email.as_deref(), Some("ana.suarez@example.com"));
        assert!(request.contact.is_complete());
    }

    #[test]
    fn accessory_mentions_are_canonicalized() {
        let request = parse_request("solo goteros y cumbrera, más silicona");
        assert_eq!(request.accessories_mentioned, vec!["gotero", "cumbrera", "silicona"]);
    }

    #[test]
    fn garbage_input_yields_incomplete_request() {
        let parser = DeterministicParser;
        for text in ["", "???", "1 2 3 4 5 6", "x por x", "ñññ ¿¿ 💥", "luz de m", "10 paneles de"] {
            let request = parser.parse(text);
            assert!(request.is_incomplete("family"), "{text}");
            assert!(request.is_incomplete("dimensions") || request.geometry.is_sizable(), "{text}");
        }
    }

    #[test]
    fn extraction_helpers_report_reason() {
        let missing: Extraction<u32> = Extraction::from_option(None, "nothing");
        assert_eq!(missing, Extraction::Missing("nothing".to_string()));
        assert_eq!(Extraction::from_option(Some(3), "unused").value(), Some(&3));
    }
}
