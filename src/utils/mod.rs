//! Small string helpers shared by handlers.

use rand::Rng;

const INVITE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Strip one trailing slash, leaving the root path untouched
pub fn normalize_path(path: &str) -> &str {
    if path == "/" {
        return path;
    }
    path.strip_suffix('/').unwrap_or(path)
}

/// Uppercase the first character and lowercase the rest ("ecuador" -> "Ecuador")
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.as_str().to_lowercase().chars()).collect(),
        None => String::new(),
    }
}

/// Flag emoji for an ISO 3166-1 alpha-2 code ("ec" -> 🇪🇨)
pub fn iso_to_emoji(iso2: &str) -> String {
    iso2.to_uppercase()
        .chars()
        .filter_map(|c| char::from_u32(127397 + c as u32))
        .collect()
}

/// Combine a local number and a calling code into E.164.
///
/// Every non-digit of the local number is dropped: `("099 800-1122", "593")` gives `+593998001122`.
pub fn format_to_e164(phone: &str, code: &str) -> String {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    let local = digits.strip_prefix('0').unwrap_or(&digits);
    format!("+{}{}", code, local)
}

/// Random `XXXX-XXXX` code of uppercase letters and digits
pub fn generate_invite_code() -> String {
    let mut rng = rand::rng();
    let mut raw: String = (0..8)
        .map(|_| INVITE_ALPHABET[rng.random_range(0..INVITE_ALPHABET.len())] as char)
        .collect();
    raw.insert(4, '-');
    raw
}
