//! Common regex patterns for invoice field normalization.

use lazy_static::lazy_static;
use regex::Regex;

/// A number with optional thousands separators and decimals.
///
/// Grouped form is tried first so `1,234.56` is read whole.
const NUMBER: &str = r"\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?|\.\d+";

/// English month names, full or abbreviated.
const MONTH: &str = r"jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?";

lazy_static! {
    // Amount patterns
    pub static ref AMOUNT_PATTERN: Regex = Regex::new(
        &format!(r"(-)?({NUMBER})")
    ).unwrap();

    pub static ref CURRENCY_PREFIXED: Regex = Regex::new(
        &format!(r"(?i)(-)?(?:US\$|USD|\$)\s*(-)?({NUMBER})")
    ).unwrap();

    pub static ref CURRENCY_SUFFIXED: Regex = Regex::new(
        &format!(r"(?i)(-)?({NUMBER})\s*(?:USD\b|\$)")
    ).unwrap();

    // Date patterns
    pub static ref DATE_ISO: Regex = Regex::new(
        r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b"
    ).unwrap();

    pub static ref DATE_SLASH: Regex = Regex::new(
        r"\b(\d{1,2})/(\d{1,2})/(\d{4}|\d{2})\b"
    ).unwrap();

    pub static ref DATE_DASH: Regex = Regex::new(
        r"\b(\d{1,2})[-.](\d{1,2})[-.](\d{4}|\d{2})\b"
    ).unwrap();

    pub static ref DATE_MONTH_FIRST: Regex = Regex::new(
        &format!(r"(?i)\b({MONTH})\.?\s+(\d{{1,2}})(?:st|nd|rd|th)?,?\s+(\d{{4}})\b")
    ).unwrap();

    pub static ref DATE_DAY_FIRST: Regex = Regex::new(
        &format!(r"(?i)\b(\d{{1,2}})(?:st|nd|rd|th)?\s+({MONTH})\.?,?\s+(\d{{4}})\b")
    ).unwrap();

    // Identifier token in free text
    pub static ref IDENTIFIER_TOKEN: Regex = Regex::new(
        r"[A-Za-z0-9](?:[A-Za-z0-9/_\-]*[A-Za-z0-9])?"
    ).unwrap();
}
