//! IRI-safe value encoding
//!
//! Template values destined for IRIs are Unicode-normalized and then
//! percent-encoded. The safe set follows RFC 3986 unreserved characters
//! plus the sub-delims and `:` / `@`, which are legal in IRI path
//! segments; everything else is percent-encoded per UTF-8 byte.

use unicode_normalization::UnicodeNormalization;

/// Unicode normalization form applied before percent-encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NormalizationForm {
    /// Canonical composition (the default)
    #[default]
    Nfc,
    /// Canonical decomposition
    Nfd,
    /// Compatibility composition
    Nfkc,
    /// Compatibility decomposition
    Nfkd,
}

/// Apply a Unicode normalization form
pub fn normalize(value: &str, form: NormalizationForm) -> String {
    match form {
        NormalizationForm::Nfc => value.nfc().collect(),
        NormalizationForm::Nfd => value.nfd().collect(),
        NormalizationForm::Nfkc => value.nfkc().collect(),
        NormalizationForm::Nfkd => value.nfkd().collect(),
    }
}

fn is_iri_safe(c: char) -> bool {
    matches!(c,
        'A'..='Z' | 'a'..='z' | '0'..='9'
        | '-' | '.' | '_' | '~'
        | '!' | '$' | '&' | '\'' | '(' | ')' | '*' | '+' | ',' | ';' | '='
        | ':' | '@'
    )
}

/// Normalize and percent-encode a template value for use inside an IRI
///
/// Hex digits are upper-case by default; pass `upper_case = false` for the
/// legacy lower-case form.
pub fn iri_safe(value: &str, form: NormalizationForm, upper_case: bool) -> String {
    let normalized = normalize(value, form);
    let mut result = String::with_capacity(normalized.len());
    let mut buf = [0u8; 4];

    for c in normalized.chars() {
        if is_iri_safe(c) {
            result.push(c);
        } else {
            for byte in c.encode_utf8(&mut buf).as_bytes() {
                if upper_case {
                    result.push_str(&format!("%{byte:02X}"));
                } else {
                    result.push_str(&format!("%{byte:02x}"));
                }
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_characters_untouched() {
        let input = "AZaz09-._~!$&'()*+,;=:@";
        assert_eq!(iri_safe(input, NormalizationForm::Nfc, true), input);
    }

    #[test]
    fn test_space_and_slash_encoded() {
        assert_eq!(
            iri_safe("with space", NormalizationForm::Nfc, true),
            "with%20space"
        );
        assert_eq!(
            iri_safe("a/b", NormalizationForm::Nfc, true),
            "a%2Fb"
        );
    }

    #[test]
    fn test_unicode_nfc_then_encode() {
        // "héllo" with a decomposed e + combining acute normalizes to the
        // composed form before encoding.
        let decomposed = "he\u{0301}llo";
        assert_eq!(
            iri_safe(decomposed, NormalizationForm::Nfc, true),
            "h%C3%A9llo"
        );
        // NFD keeps the combining mark separate.
        assert_eq!(
            iri_safe("héllo", NormalizationForm::Nfd, true),
            "he%CC%81llo"
        );
    }

    #[test]
    fn test_hex_case() {
        assert_eq!(iri_safe("héllo", NormalizationForm::Nfc, true), "h%C3%A9llo");
        assert_eq!(iri_safe("héllo", NormalizationForm::Nfc, false), "h%c3%a9llo");
    }

    #[test]
    fn test_multibyte() {
        assert_eq!(
            iri_safe("你好", NormalizationForm::Nfc, true),
            "%E4%BD%A0%E5%A5%BD"
        );
    }
}
