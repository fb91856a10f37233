//! E.164 phone normalization helpers. Pure string transforms, no I/O.

use once_cell::sync::Lazy;
use regex::Regex;

/// `+` followed by 7-15 digits, first digit 1-9.
static E164_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+[1-9]\d{6,14}$").expect("static E.164 pattern"));

pub fn is_valid_e164(s: &str) -> bool {
    E164_RE.is_match(s)
}

/// Normalize free-form user input into E.164.
///
/// Trims, maps a leading "00" to "+", drops every non-digit character except
/// a single leading "+" (repeated leading "+" collapse to one), and prepends
/// "+" to an all-digit result. Returns None when the result is not a valid
/// E.164 number.
pub fn normalize(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    let rest = trimmed.strip_prefix("00").unwrap_or(trimmed);
    let digits: String = rest.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }

    let candidate = format!("+{}", digits);
    if is_valid_e164(&candidate) {
        Some(candidate)
    } else {
        None
    }
}

/// Build a WhatsApp deep link for `phone`, optionally carrying a prefilled
/// message. Returns None when the phone does not normalize.
pub fn wa_link(phone: &str, text: Option<&str>) -> Option<String> {
    let normalized = normalize(phone)?;
    let digits = normalized.trim_start_matches('+');
    match text {
        Some(t) if !t.is_empty() => Some(format!("https://wa.me/{}?text={}", digits, urlencoded(t))),
        _ => Some(format!("https://wa.me/{}", digits)),
    }
}

/// Simple URL-encoding for query parameter values.
fn urlencoded(s: &str) -> String {
    let mut result = String::with_capacity(s.len() * 2);
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(byte as char);
            }
            _ => {
                result.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_e164_requires_plus_and_nonzero_lead() {
        assert!(is_valid_e164("+14155552671"));
        assert!(!is_valid_e164("14155552671"));
        assert!(!is_valid_e164("+0123456"));
        assert!(!is_valid_e164(""));
        assert!(!is_valid_e164("+"));
    }

    #[test]
    fn valid_e164_length_boundaries() {
        // 7 digits after "+" is the minimum, 15 the maximum.
        assert!(!is_valid_e164("+123456"));
        assert!(is_valid_e164("+1234567"));
        assert!(is_valid_e164("+123456789012345"));
        assert!(!is_valid_e164("+1234567890123456"));
    }

    #[test]
    fn normalize_maps_leading_double_zero_to_plus() {
        assert_eq!(normalize("0014155552671").as_deref(), Some("+14155552671"));
    }

    #[test]
    fn normalize_strips_punctuation_and_prepends_plus() {
        // 10 digits with a nonzero lead is inside the 7-15 window, so the
        // number is accepted as-is even without an explicit country code.
        assert_eq!(normalize("415-555-2671").as_deref(), Some("+4155552671"));
        assert_eq!(normalize(" +1 (415) 555-2671 ").as_deref(), Some("+14155552671"));
    }

    #[test]
    fn normalize_collapses_repeated_leading_plus() {
        assert_eq!(normalize("++14155552671").as_deref(), Some("+14155552671"));
    }

    #[test]
    fn normalize_rejects_out_of_range_lengths() {
        assert_eq!(normalize("123456"), None);
        assert_eq!(normalize("1234567890123456"), None);
        // Leading zero after normalization fails the first-digit rule.
        assert_eq!(normalize("+01234567"), None);
    }

    #[test]
    fn normalize_rejects_digit_free_input() {
        assert_eq!(normalize(""), None);
        assert_eq!(normalize("   "), None);
        assert_eq!(normalize("call me"), None);
        assert_eq!(normalize("+"), None);
    }

    #[test]
    fn wa_link_with_and_without_text() {
        assert_eq!(
            wa_link("+14155552671", Some("hi")).as_deref(),
            Some("https://wa.me/14155552671?text=hi")
        );
        assert_eq!(
            wa_link("+14155552671", None).as_deref(),
            Some("https://wa.me/14155552671")
        );
        assert_eq!(
            wa_link("+14155552671", Some("")).as_deref(),
            Some("https://wa.me/14155552671")
        );
        assert_eq!(wa_link("nope", Some("hi")), None);
    }

    #[test]
    fn wa_link_urlencodes_text() {
        assert_eq!(
            wa_link("0014155552671", Some("happy birthday! 🎂")).as_deref(),
            Some("https://wa.me/14155552671?text=happy%20birthday%21%20%F0%9F%8E%82")
        );
    }

    mod proptest_normalize {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn normalize_never_panics(s in "\\PC{0,100}") {
                let _ = normalize(&s);
            }

            #[test]
            fn normalize_output_is_always_valid(s in ".*") {
                if let Some(out) = normalize(&s) {
                    prop_assert!(is_valid_e164(&out));
                }
            }

            #[test]
            fn normalize_is_idempotent(s in "\\+?[0-9 ()-]{0,30}") {
                if let Some(out) = normalize(&s) {
                    prop_assert_eq!(normalize(&out), Some(out.clone()));
                }
            }
        }
    }
}
