//! Recipient extraction helpers for tier-1 rules.
//!
//! Speech-to-text renders addresses the way they were spoken: "jane at
//! example dot com", "me", a bare first name. These helpers normalize
//! spoken forms and fall back to pattern extraction when the address book
//! has no answer.

use crate::collab::ContactBook;
use once_cell::sync::Lazy;
use regex::Regex;

/// Which address-book field a lookup wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactField {
    /// Email address.
    Email,
    /// Phone number.
    Phone,
}

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\w.-]+@[\w.-]+\.\w+").expect("email regex"));
static US_PHONE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\+?1?[-\s]?\(?\d{3}\)?[-\s]?\d{3}[-\s]?\d{4}").expect("US phone regex")
});
static INTL_PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\+\d{1,3}[-\s]?\d{3,14}").expect("intl phone regex"));
static SPOKEN_TLD_RES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"\s+dot\s+com\b", ".com"),
        (r"\s+dot\s+org\b", ".org"),
        (r"\s+dot\s+net\b", ".net"),
        (r"\s+dot\s+io\b", ".io"),
        (r"\s+dot\s+dev\b", ".dev"),
    ]
    .into_iter()
    .map(|(pattern, replacement)| (Regex::new(pattern).expect("tld regex"), replacement))
    .collect()
});
static SPOKEN_DOT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+dot\s+").expect("dot regex"));
static SPOKEN_AT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+at\s+").expect("at regex"));

/// Convert a spoken email into address form:
/// "jane at example dot com" → "jane@example.com".
#[must_use]
pub fn normalize_spoken_email(text: &str) -> String {
    let mut t = text.trim().to_lowercase();
    for (re, replacement) in SPOKEN_TLD_RES.iter() {
        t = re.replace_all(&t, *replacement).into_owned();
    }
    t = SPOKEN_DOT_RE.replace_all(&t, ".").into_owned();
    t = SPOKEN_AT_RE.replace_all(&t, "@").into_owned();
    t
}

/// Extract a clean email address from text, or return the trimmed text
/// when no address pattern is present (spoken forms pass through).
#[must_use]
pub fn extract_clean_email(text: &str) -> String {
    EMAIL_RE
        .find(text)
        .map_or_else(|| text.trim().to_owned(), |m| m.as_str().to_owned())
}

/// Extract a clean phone number from text, or return the trimmed text
/// when no phone pattern is present.
#[must_use]
pub fn extract_clean_phone(text: &str) -> String {
    for re in [&*US_PHONE_RE, &*INTL_PHONE_RE] {
        if let Some(m) = re.find(text) {
            return m.as_str().to_owned();
        }
    }
    text.trim().to_owned()
}

/// Look up a contact field by spoken name.
///
/// "me" / "myself" / "my" resolve to the owner contact. Alias matching is
/// the contact book's concern.
#[must_use]
pub fn lookup_contact(book: &dyn ContactBook, name: &str, field: ContactField) -> Option<String> {
    let needle = name.trim().to_lowercase();
    let contact = if matches!(needle.as_str(), "me" | "myself" | "my") {
        book.owner()
    } else {
        book.lookup(&needle)
    }?;
    match field {
        ContactField::Email => contact.email,
        ContactField::Phone => contact.phone,
    }
}
