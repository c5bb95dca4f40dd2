//! Normalization and validation of Brazilian document and address fields.

use base64::{engine::general_purpose::STANDARD, Engine};

/// Strips everything but ASCII digits.
pub fn only_digits(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Normalizes a CNPJ to its 14 digits and validates both check digits.
pub fn normalize_cnpj(value: &str) -> Option<String> {
    let digits = only_digits(value);
    if digits.len() != 14 {
        return None;
    }

    let numbers: Vec<u32> = digits.chars().filter_map(|c| c.to_digit(10)).collect();
    if numbers.iter().all(|&d| d == numbers[0]) {
        return None;
    }

    let first = cnpj_check_digit(&numbers[..12]);
    let second = cnpj_check_digit(&numbers[..13]);
    if numbers[12] == first && numbers[13] == second {
        Some(digits)
    } else {
        None
    }
}

fn cnpj_check_digit(numbers: &[u32]) -> u32 {
    // weights run 2..=9 from the rightmost digit, wrapping back to 2
    let sum: u32 = numbers
        .iter()
        .rev()
        .enumerate()
        .map(|(i, d)| d * (2 + (i as u32 % 8)))
        .sum();
    let rest = sum % 11;
    if rest < 2 {
        0
    } else {
        11 - rest
    }
}

pub fn normalize_cep(value: &str) -> Option<String> {
    let digits = only_digits(value);
    (digits.len() == 8).then_some(digits)
}

const STATES: [&str; 27] = [
    "AC", "AL", "AP", "AM", "BA", "CE", "DF", "ES", "GO", "MA", "MT", "MS", "MG", "PA", "PB",
    "PR", "PE", "PI", "RJ", "RN", "RS", "RO", "RR", "SC", "SP", "SE", "TO",
];

/// Upper-cases a two-letter state code, rejecting unknown ones.
pub fn normalize_state(value: &str) -> Option<String> {
    let upper = value.trim().to_uppercase();
    STATES.contains(&upper.as_str()).then_some(upper)
}

pub fn normalize_email(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Trims a string and turns blank input into `None`.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Accepts base64 data URLs (`data:image/...;base64,...`) or http(s) links.
pub fn is_valid_image(value: &str) -> bool {
    if let Some(rest) = value.strip_prefix("data:image/") {
        return match rest.split_once(";base64,") {
            Some((subtype, payload)) => {
                !subtype.is_empty() && !payload.is_empty() && STANDARD.decode(payload).is_ok()
            }
            None => false,
        };
    }
    value.starts_with("https://") || value.starts_with("http://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_cnpj_formats() {
        assert_eq!(
            normalize_cnpj("11.222.333/0001-81"),
            Some("11222333000181".to_string())
        );
        assert_eq!(
            normalize_cnpj("11222333000181"),
            Some("11222333000181".to_string())
        );
        assert_eq!(
            normalize_cnpj("45.723.174/0001-10"),
            Some("45723174000110".to_string())
        );
    }

    #[test]
    fn test_invalid_cnpj() {
        assert_eq!(normalize_cnpj("11.222.333/0001-82"), None);
        assert_eq!(normalize_cnpj("1122233300018"), None);
        assert_eq!(normalize_cnpj("00000000000000"), None);
        assert_eq!(normalize_cnpj("11111111111111"), None);
        assert_eq!(normalize_cnpj(""), None);
    }

    #[test]
    fn test_cep() {
        assert_eq!(normalize_cep("01001-000"), Some("01001000".to_string()));
        assert_eq!(normalize_cep("0100100"), None);
        assert_eq!(normalize_cep("abc"), None);
    }

    #[test]
    fn test_state() {
        assert_eq!(normalize_state(" sp "), Some("SP".to_string()));
        assert_eq!(normalize_state("XX"), None);
    }

    #[test]
    fn test_email_and_blank() {
        assert_eq!(normalize_email("  Ana@Example.COM "), "ana@example.com");
        assert_eq!(non_blank(Some("   ".to_string())), None);
        assert_eq!(non_blank(Some(" oi ".to_string())), Some("oi".to_string()));
        assert_eq!(non_blank(None), None);
    }

    #[test]
    fn test_image_values() {
        assert!(is_valid_image("data:image/png;base64,iVBORw0KGgo="));
        assert!(is_valid_image("https://cdn.example.com/a.png"));
        assert!(!is_valid_image("data:text/plain;base64,aGk="));
        assert!(!is_valid_image("ftp://example.com/a.png"));
    }

    #[test]
    fn test_image_payload_must_decode() {
        assert!(!is_valid_image("data:image/png;base64,@@@"));
        assert!(!is_valid_image("data:image/png;base64,"));
        assert!(!is_valid_image("data:image/png,iVBORw0KGgo="));
        assert!(!is_valid_image("data:image/;base64,iVBORw0KGgo="));
    }
}
