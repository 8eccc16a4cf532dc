//! User-facing reply texts and model prompts.

use std::fmt::Write;

use docent_core::types::{Message, SearchResult};

use crate::error::ChatError;

pub const NO_RESULTS: &str = "I couldn't find any documents matching your query. \
    Could you try rephrasing or using different keywords?";

pub const TIMEOUT_APOLOGY: &str = "⏰ I apologize, but the request timed out. \
    This might be due to:\n\n\
    • Slow internet connection\n\
    • High server load\n\
    • Search service issues\n\n\
    Please try again in a moment or check your connection.";

const NO_PREVIEW: &str = "No preview available";

const FOLLOW_UP: &str = "Would you like me to provide more details about any of these documents?";

/// Apology for a failure that was not a timeout.
pub fn error_apology(err: &ChatError) -> String {
    format!(
        "I apologize, but I encountered an error while processing your message: {}",
        err
    )
}

/// Apology matching the kind of failure.
pub fn apology_for(err: &ChatError) -> String {
    if err.is_timeout() {
        TIMEOUT_APOLOGY.to_string()
    } else {
        error_apology(err)
    }
}

/// List the first `max_shown` documents with title and preview.
pub fn format_search_reply(documents: &[SearchResult], max_shown: usize) -> String {
    if documents.is_empty() {
        return NO_RESULTS.to_string();
    }

    let mut text = format!(
        "I found {} documents related to your query. Here are the highlights:\n\n",
        documents.len()
    );
    for (i, doc) in documents.iter().take(max_shown).enumerate() {
        let preview = if doc.content_preview.trim().is_empty() {
            NO_PREVIEW
        } else {
            doc.content_preview.as_str()
        };
        let _ = write!(text, "{}. **{}**\n   {}\n\n", i + 1, doc.title, preview);
    }
    text.push_str(FOLLOW_UP);
    text
}

/// Prompt for a conversational turn, with prior turns inlined.
pub fn conversation_prompt(context: &[Message], message: &str) -> String {
    let mut prompt = String::new();
    if !context.is_empty() {
        prompt.push_str("Previous conversation:\n");
        for m in context {
            let _ = writeln!(prompt, "{}: {}", m.role, m.content);
        }
        prompt.push('\n');
    }
    let _ = write!(
        prompt,
        "User: {}\n\nPlease provide a helpful and conversational response.",
        message
    );
    prompt
}

pub fn recommendation_prompt(query: &str) -> String {
    format!(
        "Based on the search for '{}', provide a short, conversational recommendation \
         for what to explore next. Keep it to one or two sentences.",
        query.trim()
    )
}

pub fn analysis_prompt(file_path: &str) -> String {
    format!(
        "Analyze the document at: {}. Provide a summary, key topics, and insights.",
        file_path
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use docent_core::types::{Metadata, Role, Session};
    use std::time::Duration;

    fn doc(title: &str, preview: &str) -> SearchResult {
        SearchResult {
            id: title.to_lowercase(),
            title: title.to_string(),
            file_path: String::new(),
            content_preview: preview.to_string(),
            relevance_score: 0.5,
            file_type: String::new(),
            size: 0,
            metadata: Metadata::new(),
        }
    }

    // ---- Search replies ----

    #[test]
    fn test_format_search_reply_lists_highlights() {
        let docs = vec![
            doc("Qubits", "Basics of qubits"),
            doc("Gates", "Quantum gates"),
        ];
        let text = format_search_reply(&docs, 3);
        assert!(text.starts_with("I found 2 documents related to your query."));
        assert!(text.contains("1. **Qubits**\n   Basics of qubits\n\n"));
        assert!(text.contains("2. **Gates**\n   Quantum gates\n\n"));
        assert!(text.ends_with(FOLLOW_UP));
    }

    #[test]
    fn test_format_search_reply_caps_listing() {
        let docs: Vec<SearchResult> = (0..5).map(|i| doc(&format!("Doc{}", i), "p")).collect();
        let text = format_search_reply(&docs, 3);
        assert!(text.contains("I found 5 documents"));
        assert!(text.contains("3. **Doc2**"));
        assert!(!text.contains("Doc3"));
    }

    #[test]
    fn test_format_search_reply_empty_preview() {
        let text = format_search_reply(&[doc("Empty", "")], 3);
        assert!(text.contains(NO_PREVIEW));
    }

    #[test]
    fn test_format_search_reply_no_results() {
        assert_eq!(format_search_reply(&[], 3), NO_RESULTS);
    }

    // ---- Apologies ----

    #[test]
    fn test_apology_for_timeout() {
        let text = apology_for(&ChatError::Timeout(Duration::from_secs(1)));
        assert_eq!(text, TIMEOUT_APOLOGY);
        assert!(text.contains("Slow internet connection"));
        assert!(text.contains("High server load"));
    }

    #[test]
    fn test_apology_for_other_error() {
        let text = apology_for(&ChatError::Model("quota exceeded".to_string()));
        assert_eq!(
            text,
            "I apologize, but I encountered an error while processing your message: \
             model error: quota exceeded"
        );
    }

    // ---- Prompts ----

    #[test]
    fn test_conversation_prompt_with_context() {
        let sid = Session::new("default").id;
        let context = vec![
            Message::new(sid, Role::User, "hi"),
            Message::new(sid, Role::Assistant, "hello"),
        ];
        let prompt = conversation_prompt(&context, "how are you?");
        assert_eq!(
            prompt,
            "Previous conversation:\nuser: hi\nassistant: hello\n\n\
             User: how are you?\n\nPlease provide a helpful and conversational response."
        );
    }

    #[test]
    fn test_conversation_prompt_without_context() {
        let prompt = conversation_prompt(&[], "hey");
        assert!(prompt.starts_with("User: hey"));
    }

    #[test]
    fn test_recommendation_prompt_quotes_query() {
        assert!(recommendation_prompt(" rust ").contains("'rust'"));
    }
}
