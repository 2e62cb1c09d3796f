//! Localized UI strings and quote styles.
//!
//! The phrase table is a static map from an English key to one translation
//! per supported language; the quote style controls which entities smart
//! typography substitutes for quotation marks.

use lazy_static::lazy_static;
use std::collections::HashMap;

/// Supported interface languages, selected by the `language` metadata key or
/// the CLI `-l` flag (ISO 639-1 codes).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Language {
    #[default]
    English,
    Spanish,
    German,
    French,
    Dutch,
    Swedish,
    Hebrew,
}

impl Language {
    pub fn from_code(code: &str) -> Option<Language> {
        match code.trim().to_ascii_lowercase().as_str() {
            "en" => Some(Language::English),
            "es" => Some(Language::Spanish),
            "de" => Some(Language::German),
            "fr" => Some(Language::French),
            "nl" => Some(Language::Dutch),
            "sv" => Some(Language::Swedish),
            "he" => Some(Language::Hebrew),
            _ => None,
        }
    }

    fn index(self) -> usize {
        match self {
            Language::English => 0,
            Language::Spanish => 1,
            Language::German => 2,
            Language::French => 3,
            Language::Dutch => 4,
            Language::Swedish => 5,
            Language::Hebrew => 6,
        }
    }

    /// The quote style a document in this language uses unless overridden by
    /// the `quoteslanguage` metadata key.
    pub fn default_quote_style(self) -> QuoteStyle {
        match self {
            Language::English | Language::Hebrew => QuoteStyle::English,
            Language::Spanish => QuoteStyle::Spanish,
            Language::German => QuoteStyle::German,
            Language::French => QuoteStyle::French,
            Language::Dutch => QuoteStyle::Dutch,
            Language::Swedish => QuoteStyle::Swedish,
        }
    }
}

/// Quote substitution styles for smart typography.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum QuoteStyle {
    #[default]
    English,
    Dutch,
    French,
    German,
    GermanGuill,
    Spanish,
    Swedish,
}

impl QuoteStyle {
    pub fn from_code(code: &str) -> Option<QuoteStyle> {
        match code.trim().to_ascii_lowercase().as_str() {
            "en" | "english" => Some(QuoteStyle::English),
            "nl" | "dutch" => Some(QuoteStyle::Dutch),
            "fr" | "french" => Some(QuoteStyle::French),
            "de" | "german" => Some(QuoteStyle::German),
            "germanguillemets" | "germanguill" => Some(QuoteStyle::GermanGuill),
            "es" | "spanish" => Some(QuoteStyle::Spanish),
            "sv" | "swedish" => Some(QuoteStyle::Swedish),
            _ => None,
        }
    }

    pub fn left_single(self) -> &'static str {
        match self {
            QuoteStyle::Swedish => "&#8217;",
            QuoteStyle::French => "&#39;",
            QuoteStyle::German => "&#8218;",
            QuoteStyle::GermanGuill => "&#8250;",
            _ => "&#8216;",
        }
    }

    pub fn right_single(self) -> &'static str {
        match self {
            QuoteStyle::German => "&#8216;",
            QuoteStyle::GermanGuill => "&#8249;",
            _ => "&#8217;",
        }
    }

    pub fn left_double(self) -> &'static str {
        match self {
            QuoteStyle::Dutch | QuoteStyle::German => "&#8222;",
            QuoteStyle::GermanGuill => "&#187;",
            QuoteStyle::French | QuoteStyle::Spanish => "&#171;",
            QuoteStyle::Swedish => "&#8221;",
            _ => "&#8220;",
        }
    }

    pub fn right_double(self) -> &'static str {
        match self {
            QuoteStyle::German => "&#8220;",
            QuoteStyle::GermanGuill => "&#171;",
            QuoteStyle::French | QuoteStyle::Spanish => "&#187;",
            _ => "&#8221;",
        }
    }
}

const LANGUAGE_COUNT: usize = 7;

lazy_static! {
    /// phrase -> one translation per language, indexed by `Language::index`.
    static ref PHRASES: HashMap<&'static str, [&'static str; LANGUAGE_COUNT]> = {
        let mut map = HashMap::new();
        map.insert(
            "return to body",
            [
                "return to body",
                "Regresar al texto",
                "Zum Haupttext",
                "Retour au texte principal",
                "return to body",
                "return to body",
                "חזור/י לגוף הטקסט",
            ],
        );
        map.insert(
            "see footnote",
            [
                "see footnote",
                "Ver nota a pie de página",
                "Siehe Fußnote",
                "Voir note de bas de page",
                "see footnote",
                "see footnote",
                "ראה/י הערה",
            ],
        );
        map.insert(
            "see citation",
            [
                "see citation",
                "Ver referencia",
                "Siehe Zitat",
                "Voir citation",
                "see citation",
                "see citation",
                "ראה/י ציטוט",
            ],
        );
        map.insert(
            "see glossary",
            [
                "see glossary",
                "Ver glosario",
                "Siehe Glossar",
                "Voir glossaire",
                "see glossary",
                "see glossary",
                "ראה/י מילון מונחים",
            ],
        );
        map
    };
}

/// Look up a UI phrase for the given language. Unknown phrases fall back to
/// the key itself, so renderers can use plain English literals as keys.
pub fn localize(phrase: &'static str, language: Language) -> &'static str {
    PHRASES
        .get(phrase)
        .map(|translations| translations[language.index()])
        .unwrap_or(phrase)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn localizes_known_phrases() {
        assert_eq!(localize("see footnote", Language::German), "Siehe Fußnote");
        assert_eq!(localize("see footnote", Language::English), "see footnote");
        assert_eq!(
            localize("return to body", Language::French),
            "Retour au texte principal"
        );
    }

    #[test]
    fn unknown_phrase_falls_back_to_key() {
        assert_eq!(localize("not a phrase", Language::Spanish), "not a phrase");
    }

    #[test]
    fn quote_styles_differ_by_language() {
        assert_eq!(QuoteStyle::English.left_double(), "&#8220;");
        assert_eq!(QuoteStyle::German.left_double(), "&#8222;");
        assert_eq!(QuoteStyle::French.left_double(), "&#171;");
    }
}
