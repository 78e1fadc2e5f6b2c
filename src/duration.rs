//! Spoken-duration parsing.
//!
//! Converts natural-language time spans ("an hour and a half", "forty five
//! minutes", "2 hours") into seconds. Unrecognized input yields `None`;
//! callers treat an unparsed duration as "no explicit deadline", never as
//! an error.

use once_cell::sync::Lazy;
use regex::Regex;

/// Spoken number words and their values. "half" maps to 30 units
/// unconditionally; standalone "half"/"a half" is handled separately as
/// half an hour, which is the minutes-biased reading of ambient speech.
const SPOKEN_NUMBERS: &[(&str, u64)] = &[
    ("one", 1),
    ("two", 2),
    ("three", 3),
    ("four", 4),
    ("five", 5),
    ("six", 6),
    ("seven", 7),
    ("eight", 8),
    ("nine", 9),
    ("ten", 10),
    ("eleven", 11),
    ("twelve", 12),
    ("thirteen", 13),
    ("fourteen", 14),
    ("fifteen", 15),
    ("sixteen", 16),
    ("seventeen", 17),
    ("eighteen", 18),
    ("nineteen", 19),
    ("twenty", 20),
    ("thirty", 30),
    ("forty", 40),
    ("fifty", 50),
    ("sixty", 60),
    ("seventy", 70),
    ("eighty", 80),
    ("ninety", 90),
    ("forty five", 45),
    ("a", 1),
    ("an", 1),
    ("half", 30),
];

const HALF_HOUR_SECS: u64 = 1_800;

static AND_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+and\s+").expect("and split regex"));

/// `<number phrase> <unit>`, unit suffixes longest-first so "seconds"
/// never half-matches as "sec" + trailing junk.
static NUMBER_UNIT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<num>.+?)\s+(?P<unit>seconds?|secs?|minutes?|mins?|hours?|hrs?)$")
        .expect("number-unit regex")
});

fn lookup_spoken(word: &str) -> Option<u64> {
    SPOKEN_NUMBERS
        .iter()
        .find(|(w, _)| *w == word)
        .map(|(_, v)| *v)
}

fn unit_secs(unit: &str) -> u64 {
    if unit.starts_with("sec") {
        1
    } else if unit.starts_with("min") {
        60
    } else {
        3_600
    }
}

/// Parse a spoken number phrase into an integer.
///
/// Handles digits, direct word lookup (including multi-word entries like
/// "forty five"), and compound tens+ones ("twenty five"), which is valid
/// only when the tens part is ≥ 20 and the ones part is < 10.
#[must_use]
pub fn parse_spoken_number(text: &str) -> Option<u64> {
    let text = text.trim().to_lowercase();
    if let Some(value) = lookup_spoken(&text) {
        return Some(value);
    }
    if let Ok(value) = text.parse::<u64>() {
        return Some(value);
    }
    let parts: Vec<&str> = text.split_whitespace().collect();
    if parts.len() == 2
        && let Some(tens) = lookup_spoken(parts[0])
        && let Some(ones) = lookup_spoken(parts[1])
        && tens >= 20
        && ones < 10
    {
        return Some(tens + ones);
    }
    None
}

/// Parse a spoken duration string into seconds.
///
/// Compound phrases split on "and"; fixed phrases like "half an hour"
/// resolve directly. Returns `None` when nothing in the text parses.
///
/// ```
/// use earshot::duration::parse_spoken_duration;
///
/// assert_eq!(parse_spoken_duration("thirty minutes"), Some(1800));
/// assert_eq!(parse_spoken_duration("an hour and a half"), Some(5400));
/// assert_eq!(parse_spoken_duration("blorp"), None);
/// ```
#[must_use]
pub fn parse_spoken_duration(text: &str) -> Option<u64> {
    let mut text = text.trim().to_lowercase();
    let mut total: u64 = 0;
    let mut found = false;

    // Fixed phrases first, removed so the remainder still parses.
    for phrase in ["half an hour", "half hour"] {
        if text.contains(phrase) {
            total += HALF_HOUR_SECS;
            text = text.replace(phrase, "");
            found = true;
        }
    }

    for part in AND_SPLIT.split(&text) {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        // Standalone "a half" after "and": half of the previous unit, with
        // no unit context available. Read as half an hour.
        if part == "a half" || part == "half" {
            total += HALF_HOUR_SECS;
            found = true;
            continue;
        }

        if let Some(caps) = NUMBER_UNIT.captures(part)
            && let Some(value) = parse_spoken_number(&caps["num"])
        {
            total += value * unit_secs(&caps["unit"]);
            found = true;
        }
    }

    found.then_some(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_spoken_minutes() {
        assert_eq!(parse_spoken_duration("thirty minutes"), Some(1_800));
    }

    #[test]
    fn digit_hours() {
        assert_eq!(parse_spoken_duration("2 hours"), Some(7_200));
    }

    #[test]
    fn half_an_hour() {
        assert_eq!(parse_spoken_duration("half an hour"), Some(1_800));
        assert_eq!(parse_spoken_duration("half hour"), Some(1_800));
    }

    #[test]
    fn hour_and_a_half() {
        assert_eq!(parse_spoken_duration("an hour and a half"), Some(5_400));
    }

    #[test]
    fn compound_tens_and_ones() {
        assert_eq!(parse_spoken_duration("forty five minutes"), Some(2_700));
        assert_eq!(parse_spoken_duration("twenty five minutes"), Some(1_500));
    }

    #[test]
    fn article_units() {
        assert_eq!(parse_spoken_duration("an hour"), Some(3_600));
        assert_eq!(parse_spoken_duration("a minute"), Some(60));
    }

    #[test]
    fn seconds_units() {
        assert_eq!(parse_spoken_duration("ten seconds"), Some(10));
        assert_eq!(parse_spoken_duration("45 secs"), Some(45));
    }

    #[test]
    fn abbreviated_units() {
        assert_eq!(parse_spoken_duration("five mins"), Some(300));
        assert_eq!(parse_spoken_duration("2 hrs"), Some(7_200));
    }

    #[test]
    fn unparseable_is_none() {
        assert_eq!(parse_spoken_duration("blorp"), None);
        assert_eq!(parse_spoken_duration(""), None);
        assert_eq!(parse_spoken_duration("soon"), None);
    }

    #[test]
    fn number_without_unit_is_none() {
        assert_eq!(parse_spoken_duration("thirty"), None);
    }

    #[test]
    fn multiple_and_parts_sum() {
        assert_eq!(
            parse_spoken_duration("two hours and ten minutes"),
            Some(7_800)
        );
    }

    #[test]
    fn spoken_number_direct() {
        assert_eq!(parse_spoken_number("thirty"), Some(30));
        assert_eq!(parse_spoken_number("forty five"), Some(45));
        assert_eq!(parse_spoken_number("17"), Some(17));
        assert_eq!(parse_spoken_number("an"), Some(1));
    }

    #[test]
    fn spoken_number_compound_gate() {
        // Compound is only valid for tens >= 20 with a ones digit.
        assert_eq!(parse_spoken_number("twenty five"), Some(25));
        assert_eq!(parse_spoken_number("ten five"), None);
        assert_eq!(parse_spoken_number("twenty twelve"), None);
    }

    #[test]
    fn spoken_number_garbage() {
        assert_eq!(parse_spoken_number("splendid"), None);
        assert_eq!(parse_spoken_number("one two three"), None);
    }
}
