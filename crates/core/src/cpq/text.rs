//! Text normalization shared by the classifier and the parser.

/// Lowercases and strips Spanish diacritics, keeping punctuation intact.
pub fn fold_lowercase(text: &str) -> String {
    text.chars().flat_map(char::to_lowercase).map(fold_accent).collect()
}

/// Folded text reduced to single-space separated alphanumeric words.
pub fn normalize_words(text: &str) -> String {
    let folded = fold_lowercase(text);
    let mut sanitized = String::with_capacity(folded.len());
    for character in folded.chars() {
        if character.is_alphanumeric() {
            sanitized.push(character);
        } else {
            sanitized.push(' ');
        }
    }
    sanitized.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whether `phrase` starts a word in `normalized`. Prefix matching lets
/// "techo" match "techos" and "pared" match "paredes".
pub fn has_phrase(normalized: &str, phrase: &str) -> bool {
    let needle = format!(" {phrase}");
    let haystack = format!(" {normalized}");
    haystack.contains(&needle)
}

/// Whether `phrase` occurs in `normalized` as whole words, with no prefix
/// reading: "formal" does not match "formalmente".
pub fn has_whole_phrase(normalized: &str, phrase: &str) -> bool {
    let needle = format!(" {phrase} ");
    let haystack = format!(" {normalized} ");
    haystack.contains(&needle)
}

fn fold_accent(character: char) -> char {
    match character {
        'á' | 'à' | 'ä' | 'â' => 'a',
        'é' | 'è' | 'ë' | 'ê' => 'e',
        'í' | 'ì' | 'ï' | 'î' => 'i',
        'ó' | 'ò' | 'ö' | 'ô' => 'o',
        'ú' | 'ù' | 'ü' | 'û' => 'u',
        'ñ' => 'n',
        'ç' => 'c',
        '²' => '2',
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::{fold_lowercase, has_phrase, has_whole_phrase, normalize_words};

    #[test]
    fn folds_accents_and_case() {
        assert_eq!(fold_lowercase("Cotización TÉCNICA 60 m²"), "cotizacion tecnica 60 m2");
    }

    #[test]
    fn word_normalization_drops_punctuation() {
        assert_eq!(normalize_words("Techo, a dos-aguas!!"), "techo a dos aguas");
    }

    #[test]
    fn phrase_matching_is_anchored_at_word_start() {
        let text = normalize_words("Necesito techos para el galpon");
        assert!(has_phrase(&text, "techo"));
        assert!(!has_phrase(&text, "echo"));
        assert!(has_phrase(&text, "para el"));
    }

    #[test]
    fn whole_phrase_needs_both_word_boundaries() {
        let text = normalize_words("Lo necesito formalmente, cotizacion formal");
        assert!(has_whole_phrase(&text, "cotizacion formal"));
        assert!(has_whole_phrase(&text, "formal"));
        assert!(!has_whole_phrase(&normalize_words("lo necesito formalmente"), "formal"));
        assert!(!has_whole_phrase(&text, "necesito formal"));
    }
}
