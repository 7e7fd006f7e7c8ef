//! Language name to short language code lookup.

/// Known language names and their ISO 639-1 codes.
const LANGUAGES: &[(&str, &str)] = &[
    ("arabic", "ar"),
    ("chinese", "zh"),
    ("czech", "cs"),
    ("danish", "da"),
    ("dutch", "nl"),
    ("english", "en"),
    ("finnish", "fi"),
    ("french", "fr"),
    ("german", "de"),
    ("greek", "el"),
    ("hebrew", "he"),
    ("hungarian", "hu"),
    ("italian", "it"),
    ("japanese", "ja"),
    ("korean", "ko"),
    ("norwegian", "no"),
    ("polish", "pl"),
    ("portuguese", "pt"),
    ("russian", "ru"),
    ("spanish", "es"),
    ("swedish", "sv"),
    ("turkish", "tr"),
];

/// Short code for a human-readable language name (`"English"` -> `"en"`).
///
/// Values that already are a known short code map to themselves.
pub fn short_language(name: &str) -> Option<&'static str> {
    let name = name.trim().to_ascii_lowercase();
    LANGUAGES
        .iter()
        .find(|(long, short)| *long == name || *short == name)
        .map(|&(_, short)| short)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_language() {
        assert_eq!(short_language("english"), Some("en"));
        assert_eq!(short_language("Japanese"), Some("ja"));
        assert_eq!(short_language("fr"), Some("fr"));
        assert_eq!(short_language("klingon"), None);
        assert_eq!(short_language(""), None);
    }
}
