//! Add CLI command.
//!
//! Stores a manually entered conversation. Each `--text` value and each
//! blank-line separated paragraph of a `--file` becomes one message.

use super::{io_error, read_paragraphs};
use crate::Result;
use crate::models::{Conversation, ConversationId, ConversationSource, Message, MessageRole};
use crate::storage::ConversationStore;
use std::io::Write;
use std::path::PathBuf;

/// Add command handler.
#[derive(Debug, Clone, Default)]
pub struct AddCommand {
    /// Conversation title.
    pub title: String,
    /// Import source name.
    pub source: Option<String>,
    /// Explicit conversation id; generated when unset.
    pub id: Option<String>,
    /// Inline message texts.
    pub texts: Vec<String>,
    /// Files whose paragraphs become messages.
    pub files: Vec<PathBuf>,
}

impl AddCommand {
    /// Saves the conversation and its messages, then prints the new id.
    ///
    /// # Errors
    ///
    /// Returns an error if the title is blank, a file cannot be read, or
    /// the store write fails.
    pub fn execute(&self, store: &dyn ConversationStore, out: &mut dyn Write) -> Result<Conversation> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(crate::Error::InvalidInput("title must not be empty".to_string()));
        }

        let source = self
            .source
            .as_deref()
            .map_or(ConversationSource::Manual, ConversationSource::parse);
        let mut conversation = Conversation::new(title, source);
        if let Some(id) = self.id.as_deref().filter(|id| !id.trim().is_empty()) {
            conversation = conversation.with_id(ConversationId::new(id.trim()));
        }

        let mut contents: Vec<String> = self
            .texts
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        for file in &self.files {
            contents.extend(read_paragraphs(file)?);
        }

        let messages: Vec<Message> = contents
            .into_iter()
            .enumerate()
            .map(|(position, content)| {
                let position = u32::try_from(position).unwrap_or(u32::MAX);
                Message::new(conversation.id.clone(), MessageRole::User, content, position)
            })
            .collect();

        store.save_conversation(&conversation)?;
        if !messages.is_empty() {
            store.add_messages(&messages)?;
        }
        tracing::info!(
            conversation_id = %conversation.id,
            messages = messages.len(),
            "Added conversation"
        );

        writeln!(
            out,
            "Added conversation {} ({} messages)",
            conversation.id,
            messages.len()
        )
        .map_err(io_error)?;
        Ok(conversation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryConversationStore;

    #[test]
    fn test_add_with_texts_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("chat.txt");
        std::fs::write(&file, "First paragraph.\n\n\nSecond\nparagraph.\n").unwrap();

        let store = InMemoryConversationStore::new();
        let command = AddCommand {
            title: " Rust lifetimes ".to_string(),
            source: Some("claude".to_string()),
            id: Some("c-1".to_string()),
            texts: vec!["Inline".to_string(), "   ".to_string()],
            files: vec![file],
        };
        let mut out = Vec::new();
        let conversation = command.execute(&store, &mut out).unwrap();

        assert_eq!(conversation.id.as_str(), "c-1");
        assert_eq!(conversation.title, "Rust lifetimes");
        assert_eq!(conversation.source, ConversationSource::Claude);
        assert_eq!(
            store.conversation_documents(&conversation.id).unwrap(),
            vec!["Inline", "First paragraph.", "Second\nparagraph."]
        );
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Added conversation c-1 (3 messages)\n"
        );
    }

    #[test]
    fn test_blank_title_rejected() {
        let store = InMemoryConversationStore::new();
        let command = AddCommand {
            title: "  ".to_string(),
            ..AddCommand::default()
        };
        let result = command.execute(&store, &mut Vec::new());
        assert!(matches!(result, Err(crate::Error::InvalidInput(_))));
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let store = InMemoryConversationStore::new();
        let command = AddCommand {
            title: "Title".to_string(),
            files: vec![PathBuf::from("/nonexistent/chat.txt")],
            ..AddCommand::default()
        };
        assert!(command.execute(&store, &mut Vec::new()).is_err());
        assert_eq!(store.count().unwrap(), 0);
    }
}
