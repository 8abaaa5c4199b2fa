//! Supported language codes.
//! A deliberately short, static table: the provider may know more, but the
//! gateway only accepts what it is prepared to cache and audit.

pub const SUPPORTED_LANGUAGES: &[(&str, &str)] = &[
    ("pt", "Português"),
    ("en", "English"),
    ("es", "Español"),
    ("fr", "Français"),
    ("de", "Deutsch"),
    ("it", "Italiano"),
    ("ja", "日本語"),
    ("zh", "中文"),
    ("ru", "Русский"),
    ("ar", "العربية"),
];

pub fn is_supported(code: &str) -> bool {
    SUPPORTED_LANGUAGES.iter().any(|(c, _)| *c == code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_are_supported() {
        assert!(is_supported("pt"));
        assert!(is_supported("ja"));
    }

    #[test]
    fn unknown_and_meta_codes_are_not() {
        assert!(!is_supported("xx"));
        assert!(!is_supported("PT"));
        // "auto" is a request-level marker, not a language.
        assert!(!is_supported("auto"));
    }
}
