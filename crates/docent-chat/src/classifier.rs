//! Rule-based intent classification.
//!
//! Maps raw user text to a tagged [`Intent`]. Slash commands win over every
//! other rule; then search triggers, bookmark triggers, and finally plain
//! conversation.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use docent_core::types::{Message, Role};

// =============================================================================
// Patterns
// =============================================================================

static HOTKEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^/([A-Za-z][\w-]*)(?:\s+(.*))?$").unwrap());

static SEARCH_TRIGGERS: &[&str] = &[
    "search for",
    "find",
    "look for",
    "tell me about",
    "what is",
    "explain",
    "show me",
    "information about",
];

static BOOKMARK_TRIGGERS: &[&str] = &["bookmark", "save", "remember"];

// Stop words for keyword extraction
static STOP_WORDS: &[&str] = &[
    "a", "an", "the", "is", "are", "was", "were", "am", "be", "been", "being",
    "have", "has", "had", "do", "does", "did", "will", "would", "shall", "should",
    "may", "might", "must", "can", "could", "i", "me", "my", "we", "our", "you",
    "your", "he", "she", "it", "they", "them", "his", "her", "its", "their",
    "what", "which", "who", "whom", "this", "that", "these", "those", "of", "in",
    "to", "for", "with", "on", "at", "from", "by", "about", "as", "into", "through",
    "and", "but", "or", "not", "no", "so", "if", "then", "than", "too", "very",
    "just", "also", "up", "out", "all", "any", "some", "how", "when", "where", "why",
    "find", "show", "search", "look", "tell", "explain", "information", "please",
    "more", "anything", "something", "there", "here",
];

pub const SEARCH_CONFIDENCE: f32 = 0.8;
pub const BOOKMARK_CONFIDENCE: f32 = 0.7;
pub const CONVERSATION_CONFIDENCE: f32 = 0.6;
pub const COMMAND_CONFIDENCE: f32 = 1.0;

// =============================================================================
// Intent types
// =============================================================================

/// Classified purpose of a user message, with its parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    Search { query: String, keywords: Vec<String> },
    Command { name: String, args: String },
    Bookmark { query: String },
    Conversation { query: String },
}

/// Intent tag without parameters, used for logging and metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntentKind {
    Search,
    Command,
    Bookmark,
    Conversation,
}

impl IntentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentKind::Search => "search",
            IntentKind::Command => "command",
            IntentKind::Bookmark => "bookmark",
            IntentKind::Conversation => "conversation",
        }
    }
}

impl fmt::Display for IntentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of [`classify`]: the intent and a confidence in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct IntentResult {
    pub intent: Intent,
    pub confidence: f32,
}

impl IntentResult {
    pub fn kind(&self) -> IntentKind {
        match self.intent {
            Intent::Search { .. } => IntentKind::Search,
            Intent::Command { .. } => IntentKind::Command,
            Intent::Bookmark { .. } => IntentKind::Bookmark,
            Intent::Conversation { .. } => IntentKind::Conversation,
        }
    }
}

// =============================================================================
// Classification
// =============================================================================

/// Classify a user message.
///
/// `recent_context` is the recent conversation of the session, oldest first.
/// It is only consulted when a search message carries no keywords of its
/// own, e.g. "explain that".
pub fn classify(message: &str, recent_context: &[Message]) -> IntentResult {
    let trimmed = message.trim();

    if let Some((name, args)) = parse_hotkey(trimmed) {
        return IntentResult {
            intent: Intent::Command { name, args },
            confidence: COMMAND_CONFIDENCE,
        };
    }

    let lower = trimmed.to_lowercase();

    if SEARCH_TRIGGERS.iter().any(|t| lower.contains(t)) {
        let mut keywords = extract_keywords(trimmed);
        if keywords.is_empty() {
            if let Some(previous) = recent_context
                .iter()
                .rev()
                .find(|m| m.role == Role::User)
            {
                keywords = extract_keywords(&previous.content);
            }
        }
        return IntentResult {
            intent: Intent::Search {
                query: message.to_string(),
                keywords,
            },
            confidence: SEARCH_CONFIDENCE,
        };
    }

    if BOOKMARK_TRIGGERS.iter().any(|t| lower.contains(t)) {
        return IntentResult {
            intent: Intent::Bookmark {
                query: message.to_string(),
            },
            confidence: BOOKMARK_CONFIDENCE,
        };
    }

    IntentResult {
        intent: Intent::Conversation {
            query: message.to_string(),
        },
        confidence: CONVERSATION_CONFIDENCE,
    }
}

/// Split `/name args` into a lower-cased name and trimmed raw args.
pub fn parse_hotkey(message: &str) -> Option<(String, String)> {
    let caps = HOTKEY_RE.captures(message.trim())?;
    let name = caps.get(1)?.as_str().to_lowercase();
    let args = caps
        .get(2)
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default();
    Some((name, args))
}

/// Content words of `text`: lower-cased alphanumeric tokens of at least
/// three characters, stop words removed, first occurrence kept.
pub fn extract_keywords(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    text.split(|c: char| !c.is_alphanumeric())
        .filter_map(|w| {
            let clean = w.to_lowercase();
            if clean.chars().count() < 3 || STOP_WORDS.contains(&clean.as_str()) {
                return None;
            }
            seen.insert(clean.clone()).then_some(clean)
        })
        .collect()
}

/// Jaccard similarity of the keyword sets of two texts.
pub fn similarity(a: &str, b: &str) -> f32 {
    let a: BTreeSet<String> = extract_keywords(a).into_iter().collect();
    let b: BTreeSet<String> = extract_keywords(b).into_iter().collect();
    let union = a.union(&b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(&b).count() as f32 / union as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use docent_core::types::Session;

    fn message(role: Role, content: &str) -> Message {
        Message::new(Session::new("default").id, role, content)
    }

    // ---- Hotkey commands ----

    #[test]
    fn test_command_plain() {
        let result = classify("/help", &[]);
        assert_eq!(
            result.intent,
            Intent::Command {
                name: "help".to_string(),
                args: String::new()
            }
        );
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn test_command_with_args() {
        let result = classify("  /Theme   ocean  ", &[]);
        assert_eq!(
            result.intent,
            Intent::Command {
                name: "theme".to_string(),
                args: "ocean".to_string()
            }
        );
    }

    #[test]
    fn test_command_beats_search_trigger() {
        let result = classify("/history tell me about rust", &[]);
        assert_eq!(result.kind(), IntentKind::Command);
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn test_unknown_command_still_command() {
        let result = classify("/frobnicate now", &[]);
        assert_eq!(
            result.intent,
            Intent::Command {
                name: "frobnicate".to_string(),
                args: "now".to_string()
            }
        );
    }

    #[test]
    fn test_slash_without_letter_is_not_command() {
        assert_eq!(classify("/", &[]).kind(), IntentKind::Conversation);
        assert_eq!(classify("/123", &[]).kind(), IntentKind::Conversation);
        assert_eq!(classify("a/b", &[]).kind(), IntentKind::Conversation);
    }

    // ---- Search ----

    #[test]
    fn test_tell_me_about_is_search() {
        let result = classify("tell me about quantum computing", &[]);
        assert_eq!(result.confidence, 0.8);
        match result.intent {
            Intent::Search { query, keywords } => {
                assert_eq!(query, "tell me about quantum computing");
                assert_eq!(keywords, vec!["quantum", "computing"]);
            }
            other => panic!("expected search, got {:?}", other),
        }
    }

    #[test]
    fn test_search_triggers_case_insensitive() {
        for msg in [
            "Search for tokio docs",
            "FIND the config file",
            "look for readme",
            "What is ownership?",
            "Explain lifetimes",
            "show me the api guide",
            "information about deployment",
        ] {
            assert_eq!(classify(msg, &[]).kind(), IntentKind::Search, "{}", msg);
        }
    }

    #[test]
    fn test_followup_takes_keywords_from_context() {
        let context = vec![
            message(Role::User, "tell me about borrow checking"),
            message(Role::Assistant, "The borrow checker..."),
        ];
        match classify("explain that", &context).intent {
            Intent::Search { keywords, .. } => assert_eq!(keywords, vec!["borrow", "checking"]),
            other => panic!("expected search, got {:?}", other),
        }
    }

    #[test]
    fn test_followup_without_context_has_no_keywords() {
        match classify("explain that", &[]).intent {
            Intent::Search { keywords, .. } => assert!(keywords.is_empty()),
            other => panic!("expected search, got {:?}", other),
        }
    }

    // ---- Bookmark and conversation ----

    #[test]
    fn test_bookmark_triggers() {
        for msg in ["bookmark this", "please save it", "Remember that one"] {
            let result = classify(msg, &[]);
            assert_eq!(result.kind(), IntentKind::Bookmark, "{}", msg);
            assert_eq!(result.confidence, 0.7);
        }
    }

    #[test]
    fn test_conversation_fallback() {
        let result = classify("hello there", &[]);
        assert_eq!(
            result.intent,
            Intent::Conversation {
                query: "hello there".to_string()
            }
        );
        assert_eq!(result.confidence, 0.6);
    }

    #[test]
    fn test_empty_message_is_conversation() {
        assert_eq!(classify("", &[]).kind(), IntentKind::Conversation);
        assert_eq!(classify("   \n", &[]).kind(), IntentKind::Conversation);
    }

    #[test]
    fn test_classify_is_deterministic() {
        let a = classify("find the rust book", &[]);
        let b = classify("find the rust book", &[]);
        assert_eq!(a, b);
    }

    // ---- Keywords and similarity ----

    #[test]
    fn test_extract_keywords_filters_and_dedupes() {
        assert_eq!(
            extract_keywords("The Rust book, the RUST reference and an FAQ!"),
            vec!["rust", "book", "reference", "faq"]
        );
    }

    #[test]
    fn test_extract_keywords_empty() {
        assert!(extract_keywords("").is_empty());
        assert!(extract_keywords("is it on?").is_empty());
    }

    #[test]
    fn test_similarity_bounds() {
        assert_eq!(similarity("rust tokio", "rust tokio"), 1.0);
        assert_eq!(similarity("rust", "python"), 0.0);
        assert_eq!(similarity("", ""), 0.0);
        let s = similarity("rust async runtime", "rust runtime internals");
        assert!(s > 0.0 && s < 1.0);
    }

    #[test]
    fn test_intent_kind_display() {
        assert_eq!(IntentKind::Search.to_string(), "search");
        assert_eq!(IntentKind::Conversation.as_str(), "conversation");
    }
}
