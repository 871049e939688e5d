//! Free-text hygiene: noise filtering of survey answers before they are
//! summarized, and flattening of whatever the summarizer sends back.

use log::debug;
use serde_json::Value as JSValue;
use std::collections::HashSet;

use crate::config::Summarizer;

/// Answers that carry no information.
const NOISE: [&str; 36] = [
    "ras",
    "r.a.s",
    "aucun",
    "aucune",
    "aucuns",
    "aucunes",
    "rien",
    "néant",
    "x",
    "-",
    "/",
    ".",
    "..",
    "...",
    "ok",
    "0",
    "je ne sais pas",
    "ne sait pas",
    "je sais pas",
    "pas de sujet",
    "pas de sujet particulier",
    "pas de particulier",
    "pas d'idée",
    "pas d’idée",
    "pas d'idée particulière",
    "pas d’idée particulière",
    "pas concerné",
    "sans réponse",
    "non",
    "merci",
    "pas de suggestion",
    "aucune suggestion",
    "je n'en ai pas",
    "pas à ma connaissance",
    "n/a",
    "na",
];

const BULLET_CHARS: &[char] = &[' ', '-', '–', '—', '·', '•'];

/// Keys probed, in order, when a reply comes back as a JSON object.
const SUMMARY_KEYS: [&str; 7] = [
    "résumé", "resume", "synthese", "synthèse", "summary", "text", "content",
];

/// Wider probe used on the raw reply of the service.
const REPLY_KEYS: [&str; 9] = [
    "résumé", "resume", "synthese", "synthèse", "summary", "text", "content", "result", "output",
];

pub fn is_noise(s: &str) -> bool {
    let t = s.trim().to_lowercase();
    t.is_empty() || t.chars().count() <= 2 || NOISE.contains(&t.as_str())
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<&str>>().join(" ")
}

/// Drops empty and non-informative answers, normalizes spacing and bullets,
/// then removes case-insensitive duplicates, keeping the first occurrence.
///
/// Applying it twice gives the same list as applying it once.
pub fn clean_list<S: AsRef<str>>(items: &[S]) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut res: Vec<String> = Vec::new();
    for item in items.iter() {
        let raw = item.as_ref().trim();
        if is_noise(raw) {
            continue;
        }
        let collapsed = collapse_whitespace(raw);
        let txt = collapsed.trim_matches(BULLET_CHARS);
        // The bullets may have hidden a noise answer ("- ok").
        if is_noise(txt) {
            continue;
        }
        if seen.insert(txt.to_lowercase()) {
            res.push(txt.to_string());
        }
    }
    res
}

/// Turns the raw reply of a summarizer into text.
pub fn flatten_reply(reply: &JSValue) -> String {
    match reply {
        JSValue::Null => "".to_string(),
        JSValue::String(s) => s.trim().to_string(),
        JSValue::Object(m) => {
            for k in REPLY_KEYS.iter() {
                if let Some(JSValue::String(s)) = m.get(*k) {
                    if !s.trim().is_empty() {
                        return s.trim().to_string();
                    }
                }
            }
            reply.to_string()
        }
        JSValue::Array(l) => l
            .iter()
            .map(|x| match x {
                JSValue::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<String>>()
            .join(" ")
            .trim()
            .to_string(),
        other => other.to_string(),
    }
}

/// Accepts a plain sentence or a JSON document (`{"résumé": "..."}`) and
/// returns a single flat sentence.
pub fn unwrap_summary_text(text: &str) -> String {
    let t = text.trim();
    if t.is_empty() {
        return "".to_string();
    }

    let bracketed =
        (t.starts_with('{') && t.ends_with('}')) || (t.starts_with('[') && t.ends_with(']'));
    if bracketed {
        if let Ok(obj) = serde_json::from_str::<JSValue>(t) {
            if let JSValue::Object(m) = &obj {
                for k in SUMMARY_KEYS.iter() {
                    if let Some(JSValue::String(s)) = m.get(*k) {
                        if !s.trim().is_empty() {
                            return s.trim().to_string();
                        }
                    }
                }
            }
            return collapse_whitespace(t);
        }
    }

    // Double quotes first, then single quotes.
    collapse_whitespace(t.trim_matches('"').trim_matches('\''))
}

/// Calls the summarizer and brings the reply down to one sentence.
/// Failures give an empty string.
pub fn summarize_text(summarizer: &dyn Summarizer, instruction: &str) -> String {
    match summarizer.summarize(instruction) {
        Ok(reply) => unwrap_summary_text(&flatten_reply(&reply)),
        Err(e) => {
            debug!("summarize_text: summarizer failed: {}", e);
            "".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn noise_is_dropped() {
        let l = clean_list(&["RAS", "-", "  ", "ok", "Je ne sais pas", "ab"]);
        assert!(l.is_empty());
    }

    #[test]
    fn dedup_keeps_first_spelling() {
        let l = clean_list(&["Foo bar", "foo   BAR", "Baz quux"]);
        assert_eq!(l, vec!["Foo bar".to_string(), "Baz quux".to_string()]);
        let l = clean_list(&["Foo", "foo", "Bar"]);
        assert_eq!(l, vec!["Foo".to_string(), "Bar".to_string()]);
    }

    #[test]
    fn bullets_and_spaces() {
        let l = clean_list(&["• Gestes   d'urgence —", "- ok", "– Bilan\tvital"]);
        assert_eq!(
            l,
            vec!["Gestes d'urgence".to_string(), "Bilan vital".to_string()]
        );
    }

    #[test]
    fn filtering_is_idempotent() {
        let inputs = vec![
            "  - Massage cardiaque ",
            "massage cardiaque",
            "- ras",
            "Défibrillateur •",
            "x y",
            "—  Position latérale   de sécurité",
            "pas d’idée",
            "..",
        ];
        let once = clean_list(&inputs);
        let twice = clean_list(&once);
        assert_eq!(once, twice);
        assert!(!once.is_empty());
    }

    #[test]
    fn unwrap_plain_and_quoted() {
        assert_eq!(unwrap_summary_text("  \"Très  bien.\"  "), "Très bien.");
        assert_eq!(unwrap_summary_text(""), "");
        assert_eq!(unwrap_summary_text("\"'Bien.'\""), "Bien.");
        assert_eq!(unwrap_summary_text("'\"Bien.\"'"), "\"Bien.\"");
        assert_eq!(
            unwrap_summary_text("Une phrase\nsur deux lignes"),
            "Une phrase sur deux lignes"
        );
    }

    #[test]
    fn unwrap_json() {
        assert_eq!(
            unwrap_summary_text(r#"{"résumé": " Formation appréciée. "}"#),
            "Formation appréciée."
        );
        assert_eq!(unwrap_summary_text(r#"{"synthese": "Ok."}"#), "Ok.");
        assert_eq!(
            unwrap_summary_text(r#"{"autre":   "x"}"#),
            r#"{"autre": "x"}"#
        );
        assert_eq!(unwrap_summary_text("[\"a\",  \"b\"]"), "[\"a\", \"b\"]");
        // Not JSON after all: treated as text.
        assert_eq!(unwrap_summary_text("{pas du json}"), "{pas du json}");
    }

    #[test]
    fn flatten_shapes() {
        assert_eq!(flatten_reply(&json!({"summary": "S."})), "S.");
        assert_eq!(flatten_reply(&json!({"output": "O."})), "O.");
        assert_eq!(flatten_reply(&json!(["a", "b"])), "a b");
        assert_eq!(flatten_reply(&json!(null)), "");
        assert_eq!(flatten_reply(&json!({"x": 1})), r#"{"x":1}"#);
    }
}
