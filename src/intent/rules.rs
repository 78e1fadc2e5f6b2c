//! Tier-1 deterministic intent rules.
//!
//! A fixed-priority list of categories (email, text, reminder, search,
//! note, order, calendar), each with ordered pattern rules. The first
//! rule in the first matching category wins, making tier-1 classification
//! a pure function of the input text: no external calls, identical text
//! always yields identical intent and params.
//!
//! Note runs before order so "add that to my list" is a note, not a
//! shopping order.

use crate::collab::ContactBook;
use crate::duration::parse_spoken_duration;
use crate::intent::recipient::{
    ContactField, extract_clean_email, extract_clean_phone, lookup_contact,
    normalize_spoken_email,
};
use crate::pipeline::messages::{ActionRequest, IntentKind};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Max characters of conversation context embedded in params.
const CONTEXT_PARAM_LEN: usize = 500;
/// Max characters of an email body promoted to the subject line.
const SUBJECT_LEN: usize = 50;

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("tier-1 rule regex")
}

// ── Email ───────────────────────────────────────────────────────────

static EMAIL_RULES: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        re(r"^(?:send\s+an?\s+)?email\s+(?:to\s+)?(.+)$"),
        re(r"^shoot\s+an?\s+email\s+(?:to\s+)?(.+)$"),
        re(r"^send\s+a\s+message\s+to\s+(.+?)\s+via\s+email(?:\s+(.*))?$"),
        re(r"^email\s+(\S+)\s+about\s+(.+)$"),
    ]
});

static EMAIL_BODY_SEP: Lazy<Regex> =
    Lazy::new(|| re(r"\s+(?:saying|about|that says|with message|with body)\s+"));

// ── Text / message ──────────────────────────────────────────────────

#[derive(Clone, Copy, PartialEq)]
enum TextRule {
    /// Recipient and message both inside one capture, split heuristically.
    Generic,
    /// "text me saying X": the owner is the implied recipient.
    ToOwner,
    /// Recipient in group 1, message in group 2.
    Pair,
    /// "tell X ...": also splits on "to".
    Tell,
}

static TEXT_RULES: Lazy<Vec<(Regex, TextRule)>> = Lazy::new(|| {
    vec![
        (
            re(r"^(?:send\s+(?:me\s+)?a?\s*)?(?:text|message)\s+(?:to\s+)?(.+)$"),
            TextRule::Generic,
        ),
        (
            re(r"^(?:text|message)\s+(?:me\s+)?(?:saying|that)\s+(.+)$"),
            TextRule::ToOwner,
        ),
        (
            re(r"^shoot\s+(\S+)\s+a\s+text(?:\s+(.*))?$"),
            TextRule::Pair,
        ),
        (
            re(r"^let\s+(\S+)\s+know\s+(?:that\s+)?(.+)$"),
            TextRule::Pair,
        ),
        (re(r"^tell\s+(.+)$"), TextRule::Tell),
    ]
});

static SAYING_THAT_SEP: Lazy<Regex> = Lazy::new(|| re(r"\s+(?:saying|that)\s+"));
static TO_THAT_SEP: Lazy<Regex> = Lazy::new(|| re(r"\s+(?:to|that)\s+"));

// ── Reminder ────────────────────────────────────────────────────────

static REMINDER_RULES: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        re(r"^(?:set\s+a\s+)?remind(?:er)?\s*(?:me\s+)?(?:in\s+(.+?)\s+to\s+(.+)|to\s+(.+)|(.+))$"),
        re(r"^follow\s+up\s+with\s+(.+?)(?:\s+in\s+(.+))?$"),
        re(r"^(?:don'?t\s+forget|make\s+sure\s+(?:i|we))\s+(?:to\s+)?(.+)$"),
        re(r"^can\s+you\s+remind\s+(?:me\s+)?(?:to\s+)?(.+)$"),
    ]
});

static DIGIT_TIME_SUFFIX: Lazy<Regex> =
    Lazy::new(|| re(r"\bin\s+(\d+\s*(?:minutes?|mins?|hours?|hrs?|seconds?|secs?))\b"));
static SPOKEN_TIME_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    re(r"\bin\s+((?:(?:one|two|three|four|five|six|seven|eight|nine|ten|eleven|twelve|thirteen|fourteen|fifteen|sixteen|seventeen|eighteen|nineteen|twenty|thirty|forty|fifty|sixty|seventy|eighty|ninety|forty five|an?|half)\s*)+)\s*(seconds?|secs?|minutes?|mins?|hours?|hrs?)\b")
});

// ── Search ──────────────────────────────────────────────────────────

static SEARCH_RULE: Lazy<Regex> = Lazy::new(|| {
    re(r"^(?:look\s+up|search\s+(?:for\s+)?|find\s+out\s+|research\s+|what\s+is\s+|what\s+are\s+|who\s+is\s+|look\s+into\s+)(.+)$")
});

// ── Note ────────────────────────────────────────────────────────────

static NOTE_RULES: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        re(r"^(?:remember|note|make\s+a\s+note|save\s+this)\s*(?:that\s+)?(.+)?$"),
        re(r"^(?:write\s+that\s+down|jot\s+(?:that\s+)?down|save\s+that)(?:\s*[:\-]\s*(.+))?$"),
        re(r"^add\s+(?:that\s+)?to\s+my\s+(?:notes?|list)(?:\s*[:\-]\s*(.+))?$"),
    ]
});

// ── Order / shopping ────────────────────────────────────────────────

static SHOPPING_LIST_RULE: Lazy<Regex> =
    Lazy::new(|| re(r"^add\s+(.+?)\s+to\s+(?:the\s+)?shopping\s+list$"));
static ORDER_RULE: Lazy<Regex> =
    Lazy::new(|| re(r"^(?:order|buy)\s+(.+?)(?:\s+from\s+(.+?))?(?:\s+for\s+(pickup|delivery))?$"));

// ── Calendar ────────────────────────────────────────────────────────

#[derive(Clone, Copy)]
enum CalendarRule {
    /// event, with, when from three groups.
    Generic,
    /// "set up a meeting with X": event is derived, X is the attendee.
    Meeting,
    /// "put/add X on my calendar".
    Put,
    /// Bare "calendar X".
    Bare,
}

static CALENDAR_RULES: Lazy<Vec<(Regex, CalendarRule)>> = Lazy::new(|| {
    vec![
        (
            re(r"^(?:schedule|book)\s+(?:a\s+)?(.+?)(?:\s+with\s+(.+?))?(?:\s+(?:on|at|for)\s+(.+))?$"),
            CalendarRule::Generic,
        ),
        (
            re(r"^set\s+up\s+(?:a\s+)?meeting\s+with\s+(.+?)(?:\s+(?:on|at|for)\s+(.+))?$"),
            CalendarRule::Meeting,
        ),
        (
            re(r"^(?:put|add)\s+(?:that\s+|the\s+)?(.+?)\s+(?:on|to)\s+(?:my\s+)?calendar(?:\s+(?:for|on|at)\s+(.+))?$"),
            CalendarRule::Put,
        ),
        (
            re(r"^book\s+(?:a\s+)?time\s+(?:for|to)\s+(.+?)(?:\s+(?:on|at|for)\s+(.+))?$"),
            CalendarRule::Generic,
        ),
        (re(r"^calendar\s+(.+)$"), CalendarRule::Bare),
    ]
});

// ── Entry point ─────────────────────────────────────────────────────

/// Run the tier-1 rules over a command text.
///
/// `context_text` is the trailing conversation context used to fill empty
/// bodies; `contacts` backs recipient lookups. Returns `None` when no
/// category matches; the caller falls through to tier 2.
#[must_use]
pub fn classify_tier1(
    text: &str,
    context_text: &str,
    contacts: &dyn ContactBook,
) -> Option<ActionRequest> {
    let cmd = text.trim().to_lowercase();
    if cmd.is_empty() {
        return None;
    }

    for rule in EMAIL_RULES.iter() {
        if let Some(caps) = rule.captures(&cmd) {
            return Some(parse_email(&caps, text, context_text, contacts));
        }
    }
    for (rule, kind) in TEXT_RULES.iter() {
        if let Some(caps) = rule.captures(&cmd) {
            return Some(parse_text(&caps, *kind, text, context_text, contacts));
        }
    }
    for (index, rule) in REMINDER_RULES.iter().enumerate() {
        if let Some(caps) = rule.captures(&cmd) {
            return Some(parse_reminder(&caps, index, text));
        }
    }
    if let Some(caps) = SEARCH_RULE.captures(&cmd) {
        let query = caps.get(1).map_or("", |m| m.as_str()).trim();
        return Some(
            ActionRequest::tier1(IntentKind::Search, text)
                .with_param("query", query)
                .with_param("context", truncate_chars(context_text, CONTEXT_PARAM_LEN)),
        );
    }
    for rule in NOTE_RULES.iter() {
        if let Some(caps) = rule.captures(&cmd) {
            return Some(parse_note(&caps, text, context_text));
        }
    }
    if let Some(caps) = SHOPPING_LIST_RULE.captures(&cmd) {
        let item = caps.get(1).map_or("", |m| m.as_str()).trim();
        return Some(
            ActionRequest::tier1(IntentKind::Order, text)
                .with_param("item", item)
                .with_param("store", "")
                .with_param("method", "")
                .with_param("context", truncate_chars(context_text, CONTEXT_PARAM_LEN)),
        );
    }
    if let Some(caps) = ORDER_RULE.captures(&cmd) {
        return Some(
            ActionRequest::tier1(IntentKind::Order, text)
                .with_param("item", group(&caps, 1))
                .with_param("store", group(&caps, 2))
                .with_param("method", group(&caps, 3))
                .with_param("context", truncate_chars(context_text, CONTEXT_PARAM_LEN)),
        );
    }
    for (rule, kind) in CALENDAR_RULES.iter() {
        if let Some(caps) = rule.captures(&cmd) {
            return Some(parse_calendar(&caps, *kind, text));
        }
    }

    None
}

fn group<'a>(caps: &'a Captures<'_>, index: usize) -> &'a str {
    caps.get(index).map_or("", |m| m.as_str()).trim()
}

fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

fn parse_email(
    caps: &Captures<'_>,
    raw_text: &str,
    context_text: &str,
    contacts: &dyn ContactBook,
) -> ActionRequest {
    let rest = group(caps, 1);
    let (recipient_part, body) = if !group(caps, 2).is_empty() {
        (rest.to_owned(), group(caps, 2).to_owned())
    } else {
        let mut parts = EMAIL_BODY_SEP.splitn(rest, 2);
        let recipient = parts.next().unwrap_or(rest).trim().to_owned();
        let body = parts.next().map_or(String::new(), |b| b.trim().to_owned());
        (recipient, body)
    };

    let to_addr = lookup_contact(contacts, &recipient_part, ContactField::Email)
        .unwrap_or_else(|| {
            let normalized = normalize_spoken_email(&recipient_part);
            if normalized.contains('@') {
                extract_clean_email(&normalized)
            } else {
                extract_clean_email(&recipient_part)
            }
        });

    let subject = truncate_chars(&body, SUBJECT_LEN);
    let body = if body.is_empty() {
        context_text.to_owned()
    } else {
        body
    };

    ActionRequest::tier1(IntentKind::Email, raw_text)
        .with_param("to", to_addr)
        .with_param("subject", subject)
        .with_param("body", body)
}

fn parse_text(
    caps: &Captures<'_>,
    kind: TextRule,
    raw_text: &str,
    context_text: &str,
    contacts: &dyn ContactBook,
) -> ActionRequest {
    let (mut recipient_part, mut message) = if kind == TextRule::ToOwner {
        ("me".to_owned(), group(caps, 1).to_owned())
    } else if !group(caps, 2).is_empty() {
        (group(caps, 1).to_owned(), group(caps, 2).to_owned())
    } else {
        let rest = group(caps, 1);
        let mut parts: Vec<&str> = SAYING_THAT_SEP.splitn(rest, 2).collect();
        if parts.len() == 1 && matches!(kind, TextRule::Tell) {
            parts = TO_THAT_SEP.splitn(rest, 2).collect();
        }
        if parts.len() > 1 {
            (parts[0].trim().to_owned(), parts[1].trim().to_owned())
        } else {
            // No separator: if the first token is a known contact, it is
            // the recipient and the remainder is the message.
            let words: Vec<&str> = rest.split_whitespace().collect();
            if words.len() >= 2
                && lookup_contact(contacts, words[0], ContactField::Phone).is_some()
            {
                (words[0].to_owned(), words[1..].join(" "))
            } else {
                (rest.to_owned(), String::new())
            }
        }
    };

    if matches!(recipient_part.as_str(), "me" | "me a text" | "myself") {
        if let Some(owner) = contacts.owner() {
            recipient_part = owner.name;
        }
    }

    let to = lookup_contact(contacts, &recipient_part, ContactField::Phone)
        .unwrap_or_else(|| extract_clean_phone(&recipient_part));

    if message.is_empty() {
        message = context_text.to_owned();
    }

    ActionRequest::tier1(IntentKind::Text, raw_text)
        .with_param("to", to)
        .with_param("message", message)
}

fn parse_reminder(caps: &Captures<'_>, rule_index: usize, raw_text: &str) -> ActionRequest {
    let (mut task, mut when) = match rule_index {
        0 => {
            let when = group(caps, 1).to_owned();
            let task = [2, 3, 4]
                .into_iter()
                .map(|i| group(caps, i))
                .find(|g| !g.is_empty())
                .unwrap_or("")
                .to_owned();
            (task, when)
        }
        1 => (
            format!("follow up with {}", group(caps, 1)),
            group(caps, 2).to_owned(),
        ),
        _ => (group(caps, 1).to_owned(), String::new()),
    };

    // Trailing time phrase, digits first: "do X in 30 minutes".
    if when.is_empty()
        && let Some(m) = DIGIT_TIME_SUFFIX.captures(&task)
        && let (Some(whole), Some(phrase)) = (m.get(0), m.get(1))
    {
        when = phrase.as_str().to_owned();
        task = trim_task(&task[..whole.start()]);
    }
    // Then spoken numbers: "do X in thirty minutes".
    if when.is_empty()
        && let Some(m) = SPOKEN_TIME_SUFFIX.captures(&task)
        && let (Some(whole), Some(number), Some(unit)) = (m.get(0), m.get(1), m.get(2))
    {
        when = format!("{} {}", number.as_str().trim(), unit.as_str());
        task = trim_task(&task[..whole.start()]);
    }

    let mut request = ActionRequest::tier1(IntentKind::Reminder, raw_text)
        .with_param("task", task)
        .with_param("when", when.clone());
    if let Some(seconds) = parse_spoken_duration(&when) {
        request = request.with_json_param("when_seconds", serde_json::json!(seconds));
    }
    request
}

fn trim_task(task: &str) -> String {
    task.trim()
        .trim_end_matches(['.', ','])
        .trim_end()
        .to_owned()
}

fn parse_note(caps: &Captures<'_>, raw_text: &str, context_text: &str) -> ActionRequest {
    let mut content = (1..=caps.len().saturating_sub(1))
        .map(|i| group(caps, i))
        .find(|g| !g.is_empty())
        .unwrap_or("")
        .to_owned();
    if content.is_empty() {
        content = context_text.to_owned();
    }
    ActionRequest::tier1(IntentKind::Note, raw_text)
        .with_param("content", content)
        .with_param("context", truncate_chars(context_text, CONTEXT_PARAM_LEN))
}

fn parse_calendar(caps: &Captures<'_>, kind: CalendarRule, raw_text: &str) -> ActionRequest {
    let (event, with_person, when) = match kind {
        CalendarRule::Generic => (
            group(caps, 1).to_owned(),
            group(caps, 2).to_owned(),
            group(caps, 3).to_owned(),
        ),
        CalendarRule::Meeting => (
            format!("meeting with {}", group(caps, 1)),
            group(caps, 1).to_owned(),
            group(caps, 2).to_owned(),
        ),
        CalendarRule::Put => (
            group(caps, 1).to_owned(),
            String::new(),
            group(caps, 2).to_owned(),
        ),
        CalendarRule::Bare => (group(caps, 1).to_owned(), String::new(), String::new()),
    };

    ActionRequest::tier1(IntentKind::Calendar, raw_text)
        .with_param("event", event)
        .with_param("with", with_person)
        .with_param("when", when)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::collab::{ContactRecord, StaticContacts};

    fn contacts() -> StaticContacts {
        StaticContacts::new(vec![
            ContactRecord {
                name: "David".to_owned(),
                aliases: Vec::new(),
                email: Some("david@example.com".to_owned()),
                phone: Some("+15551230000".to_owned()),
                is_owner: true,
            },
            ContactRecord {
                name: "Sarah".to_owned(),
                aliases: vec!["sara".to_owned()],
                email: Some("sarah@example.com".to_owned()),
                phone: Some("+15559870000".to_owned()),
                is_owner: false,
            },
        ])
    }

    fn classify(text: &str) -> Option<ActionRequest> {
        classify_tier1(text, "", &contacts())
    }

    #[test]
    fn email_with_known_contact_and_body() {
        let request = classify("email sarah saying lunch moved to noon").unwrap();
        assert_eq!(request.intent, IntentKind::Email);
        assert_eq!(request.param("to"), Some("sarah@example.com"));
        assert_eq!(request.param("body"), Some("lunch moved to noon"));
        assert_eq!(request.param("subject"), Some("lunch moved to noon"));
    }

    #[test]
    fn email_spoken_address() {
        let request = classify("send an email to jane at example dot com saying hello").unwrap();
        assert_eq!(request.param("to"), Some("jane@example.com"));
        assert_eq!(request.param("body"), Some("hello"));
    }

    #[test]
    fn email_about_pattern() {
        let request = classify("email sarah about the renewal deadline").unwrap();
        assert_eq!(request.intent, IntentKind::Email);
        assert_eq!(request.param("to"), Some("sarah@example.com"));
        assert_eq!(request.param("body"), Some("the renewal deadline"));
    }

    #[test]
    fn email_empty_body_falls_back_to_context() {
        let request =
            classify_tier1("email sarah", "we pushed the launch to friday", &contacts()).unwrap();
        assert_eq!(request.param("body"), Some("we pushed the launch to friday"));
        assert_eq!(request.param("subject"), Some(""));
    }

    #[test]
    fn text_with_saying_separator() {
        let request = classify("text sarah saying running ten minutes late").unwrap();
        assert_eq!(request.intent, IntentKind::Text);
        assert_eq!(request.param("to"), Some("+15559870000"));
        assert_eq!(request.param("message"), Some("running ten minutes late"));
    }

    #[test]
    fn text_first_token_contact_split() {
        let request = classify("text sarah the demo is working").unwrap();
        assert_eq!(request.param("to"), Some("+15559870000"));
        assert_eq!(request.param("message"), Some("the demo is working"));
    }

    #[test]
    fn text_me_resolves_to_owner() {
        let request = classify("text me saying pick up the dry cleaning").unwrap();
        assert_eq!(request.param("to"), Some("+15551230000"));
        assert_eq!(request.param("message"), Some("pick up the dry cleaning"));
    }

    #[test]
    fn tell_splits_on_to() {
        let request = classify("tell sarah to check the build").unwrap();
        assert_eq!(request.intent, IntentKind::Text);
        assert_eq!(request.param("to"), Some("+15559870000"));
        assert_eq!(request.param("message"), Some("check the build"));
    }

    #[test]
    fn let_know_pattern() {
        let request = classify("let sarah know that dinner is at seven").unwrap();
        assert_eq!(request.param("to"), Some("+15559870000"));
        assert_eq!(request.param("message"), Some("dinner is at seven"));
    }

    #[test]
    fn reminder_with_leading_duration() {
        let request = classify("remind me in thirty minutes to call mom").unwrap();
        assert_eq!(request.intent, IntentKind::Reminder);
        assert_eq!(request.param("task"), Some("call mom"));
        assert_eq!(request.param("when"), Some("thirty minutes"));
        assert_eq!(
            request.params.get("when_seconds").and_then(|v| v.as_u64()),
            Some(1_800)
        );
    }

    #[test]
    fn reminder_with_trailing_digit_duration() {
        let request = classify("remind me to stretch in 20 minutes").unwrap();
        assert_eq!(request.param("task"), Some("stretch"));
        assert_eq!(request.param("when"), Some("20 minutes"));
        assert_eq!(
            request.params.get("when_seconds").and_then(|v| v.as_u64()),
            Some(1_200)
        );
    }

    #[test]
    fn reminder_with_trailing_spoken_duration() {
        let request = classify("remind me to water the plants in forty five minutes").unwrap();
        assert_eq!(request.param("task"), Some("water the plants"));
        assert_eq!(request.param("when"), Some("forty five minutes"));
        assert_eq!(
            request.params.get("when_seconds").and_then(|v| v.as_u64()),
            Some(2_700)
        );
    }

    #[test]
    fn reminder_without_duration() {
        let request = classify("don't forget to submit the expense report").unwrap();
        assert_eq!(request.intent, IntentKind::Reminder);
        assert_eq!(request.param("task"), Some("submit the expense report"));
        assert_eq!(request.param("when"), Some(""));
        assert!(!request.params.contains_key("when_seconds"));
    }

    #[test]
    fn follow_up_reminder() {
        let request = classify("follow up with sarah in an hour").unwrap();
        assert_eq!(request.param("task"), Some("follow up with sarah"));
        assert_eq!(
            request.params.get("when_seconds").and_then(|v| v.as_u64()),
            Some(3_600)
        );
    }

    #[test]
    fn search_rules() {
        for text in [
            "look up the flight status",
            "what is the capital of estonia",
            "search for thai places nearby",
        ] {
            let request = classify(text).unwrap();
            assert_eq!(request.intent, IntentKind::Search, "{text}");
            assert!(!request.param("query").unwrap().is_empty());
        }
    }

    #[test]
    fn note_before_order_for_my_list() {
        let request = classify("add that to my list: backup the database").unwrap();
        assert_eq!(request.intent, IntentKind::Note);
        assert_eq!(request.param("content"), Some("backup the database"));
    }

    #[test]
    fn note_falls_back_to_context() {
        let request =
            classify_tier1("write that down", "the vendor quote was 12k", &contacts()).unwrap();
        assert_eq!(request.intent, IntentKind::Note);
        assert_eq!(request.param("content"), Some("the vendor quote was 12k"));
    }

    #[test]
    fn shopping_list_is_order() {
        let request = classify("add oat milk to the shopping list").unwrap();
        assert_eq!(request.intent, IntentKind::Order);
        assert_eq!(request.param("item"), Some("oat milk"));
    }

    #[test]
    fn order_with_store_and_method() {
        let request = classify("order a keyboard from the hardware store for delivery").unwrap();
        assert_eq!(request.intent, IntentKind::Order);
        assert_eq!(request.param("item"), Some("a keyboard"));
        assert_eq!(request.param("store"), Some("the hardware store"));
        assert_eq!(request.param("method"), Some("delivery"));
    }

    #[test]
    fn calendar_schedule_with_attendee_and_time() {
        let request = classify("schedule a review with sarah on thursday").unwrap();
        assert_eq!(request.intent, IntentKind::Calendar);
        assert_eq!(request.param("event"), Some("review"));
        assert_eq!(request.param("with"), Some("sarah"));
        assert_eq!(request.param("when"), Some("thursday"));
    }

    #[test]
    fn calendar_meeting_pattern() {
        let request = classify("set up a meeting with sarah for tuesday morning").unwrap();
        assert_eq!(request.param("event"), Some("meeting with sarah"));
        assert_eq!(request.param("with"), Some("sarah"));
        assert_eq!(request.param("when"), Some("tuesday morning"));
    }

    #[test]
    fn calendar_put_pattern() {
        let request = classify("put the dentist appointment on my calendar for monday").unwrap();
        assert_eq!(request.intent, IntentKind::Calendar);
        assert_eq!(request.param("event"), Some("dentist appointment"));
        assert_eq!(request.param("when"), Some("monday"));
    }

    #[test]
    fn unmatched_text_returns_none() {
        assert!(classify("mumbling about nothing in particular").is_none());
        assert!(classify("").is_none());
    }

    #[test]
    fn tier1_is_deterministic() {
        let a = classify("remind me in thirty minutes to call mom").unwrap();
        let b = classify("remind me in thirty minutes to call mom").unwrap();
        assert_eq!(a.intent, b.intent);
        assert_eq!(a.params, b.params);
        assert_eq!(a.confidence, b.confidence);
    }

    #[test]
    fn classification_is_case_insensitive() {
        let request = classify("Remind Me To Call Mom").unwrap();
        assert_eq!(request.intent, IntentKind::Reminder);
        assert_eq!(request.param("task"), Some("call mom"));
    }
}
