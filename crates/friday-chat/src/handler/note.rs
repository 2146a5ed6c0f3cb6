use std::sync::Arc;

use async_trait::async_trait;

use super::ChatHandler;
use crate::collaborators::{NewNote, NoteStore};
use crate::error::HandlerError;
use crate::intent::Action;
use crate::types::{ChatContext, ChatResponse};

const MAX_DERIVED_TITLE_CHARS: usize = 60;

/// Saves a note to the notes store.
pub struct NoteHandler {
    notes: Arc<dyn NoteStore>,
    default_folder: String,
}

impl NoteHandler {
    pub fn new(notes: Arc<dyn NoteStore>, default_folder: impl Into<String>) -> Self {
        Self {
            notes,
            default_folder: default_folder.into(),
        }
    }
}

/// First line of `content`, shortened at a word boundary.
fn derive_title(content: &str) -> String {
    let first_line = content.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
    if first_line.chars().count() <= MAX_DERIVED_TITLE_CHARS {
        return first_line.to_string();
    }
    let cut: String = first_line.chars().take(MAX_DERIVED_TITLE_CHARS).collect();
    match cut.rfind(' ') {
        Some(i) if i > 0 => format!("{}...", &cut[..i]),
        _ => format!("{}...", cut),
    }
}

#[async_trait]
impl ChatHandler for NoteHandler {
    fn name(&self) -> &'static str {
        "note"
    }

    async fn handle(&self, ctx: &ChatContext) -> Result<ChatResponse, HandlerError> {
        let data = match &ctx.intent.action {
            Action::NoteCreate(Some(data)) => data,
            _ => return Err(HandlerError::validation("What should the note say?")),
        };

        let (title, content) = match (data.title.clone(), data.content.clone()) {
            (Some(title), Some(content)) => (title, content),
            (Some(title), None) => (title.clone(), title),
            (None, Some(content)) => (derive_title(&content), content),
            (None, None) => return Err(HandlerError::validation("What should the note say?")),
        };

        let note = NewNote {
            title,
            content,
            folder: data
                .folder
                .clone()
                .unwrap_or_else(|| self.default_folder.clone()),
            tags: data.tags.clone(),
        };
        let saved = self
            .notes
            .create_note(note, ctx.now)
            .map_err(|e| HandlerError::failed("save note", e))?;

        let folder = if saved.folder.is_empty() {
            "the vault".to_string()
        } else {
            saved.folder
        };
        Ok(ChatResponse::final_answer(format!(
            "📝 Note saved: '{}' in {}",
            saved.title, folder
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::{Intent, NoteData};
    use crate::testing::{context, friday_afternoon};
    use crate::vault::VaultNoteStore;

    fn intent(title: Option<&str>, content: Option<&str>, folder: Option<&str>) -> Intent {
        Intent::new(Action::NoteCreate(Some(NoteData {
            title: title.map(String::from),
            content: content.map(String::from),
            folder: folder.map(String::from),
            tags: vec![],
        })))
    }

    #[test]
    fn test_derive_title() {
        assert_eq!(derive_title("\n  Buy milk\nand eggs"), "Buy milk");
        let long = "word ".repeat(30);
        let title = derive_title(&long);
        assert!(title.ends_with("..."));
        assert!(title.chars().count() <= MAX_DERIVED_TITLE_CHARS + 3);
    }

    #[tokio::test]
    async fn test_saves_note_in_default_folder() {
        let dir = tempfile::tempdir().unwrap();
        let handler = NoteHandler::new(Arc::new(VaultNoteStore::new(dir.path())), "Inbox");

        let ctx = context(
            "note: buy milk",
            intent(None, Some("Buy milk on the way home"), None),
            friday_afternoon(),
        );
        let response = handler.handle(&ctx).await.unwrap();
        assert!(response.is_final);
        assert_eq!(
            response.answer,
            "📝 Note saved: 'Buy milk on the way home' in Inbox"
        );
        assert!(dir.path().join("Inbox/buy-milk-on-the-way-home.md").exists());
    }

    #[tokio::test]
    async fn test_saves_note_in_named_folder() {
        let dir = tempfile::tempdir().unwrap();
        let handler = NoteHandler::new(Arc::new(VaultNoteStore::new(dir.path())), "Inbox");

        let ctx = context(
            "msg",
            intent(Some("Garden"), Some("Tomatoes in May"), Some("Projects")),
            friday_afternoon(),
        );
        let response = handler.handle(&ctx).await.unwrap();
        assert_eq!(response.answer, "📝 Note saved: 'Garden' in Projects");
    }

    #[tokio::test]
    async fn test_requires_content() {
        let dir = tempfile::tempdir().unwrap();
        let handler = NoteHandler::new(Arc::new(VaultNoteStore::new(dir.path())), "Inbox");

        let ctx = context("msg", intent(None, None, None), friday_afternoon());
        assert!(matches!(
            handler.handle(&ctx).await,
            Err(HandlerError::Validation(_))
        ));

        let ctx = context("msg", Intent::new(Action::NoteCreate(None)), friday_afternoon());
        assert!(handler.handle(&ctx).await.is_err());
    }
}
