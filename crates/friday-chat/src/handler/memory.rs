//! Save, list and forget facts through an optional [`MemoryStore`].

use std::sync::Arc;

use async_trait::async_trait;

use super::ChatHandler;
use crate::collaborators::{MemoryItem, MemoryStore};
use crate::error::HandlerError;
use crate::intent::{Action, MemoryData};
use crate::types::{ChatContext, ChatResponse};

const LIST_LIMIT: usize = 15;
const PREVIEW_CHARS: usize = 80;

pub struct MemoryHandler {
    store: Option<Arc<dyn MemoryStore>>,
}

impl MemoryHandler {
    pub fn new(store: Option<Arc<dyn MemoryStore>>) -> Self {
        Self { store }
    }

    fn save(
        &self,
        store: &dyn MemoryStore,
        ctx: &ChatContext,
        data: Option<&MemoryData>,
    ) -> Result<ChatResponse, HandlerError> {
        let content = data
            .and_then(|d| d.content.as_deref())
            .ok_or_else(|| HandlerError::validation("What should I remember?"))?;
        let saved = store
            .save(content, ctx.now)
            .map_err(|e| HandlerError::failed("save memory", e))?;

        let mut response =
            ChatResponse::final_answer(format!("🧠 Got it! I'll remember: \"{}\"", saved.content));
        response.used_memory = true;
        response.extracted_memory = Some(saved.content);
        Ok(response)
    }

    fn list(&self, store: &dyn MemoryStore) -> Result<ChatResponse, HandlerError> {
        let items = store
            .list(LIST_LIMIT)
            .map_err(|e| HandlerError::failed("list memories", e))?;
        let answer = if items.is_empty() {
            "I haven't stored any memories yet.".to_string()
        } else {
            let lines: Vec<String> = items
                .iter()
                .map(|m| format!("- {} (ID: {})", preview(&m.content), m.id))
                .collect();
            format!("🧠 Your memories:\n\n{}", lines.join("\n"))
        };
        let mut response = ChatResponse::final_answer(answer);
        response.used_memory = true;
        response.memory_items = items.into_iter().map(|m| m.content).collect();
        Ok(response)
    }

    /// Forget by id when one is given, otherwise the best match for the text.
    fn delete(
        &self,
        store: &dyn MemoryStore,
        data: Option<&MemoryData>,
    ) -> Result<ChatResponse, HandlerError> {
        let data = data.ok_or_else(|| HandlerError::validation("Which memory should I forget?"))?;

        if let Some(raw) = data.memory_id.as_deref() {
            let id: i64 = raw
                .trim()
                .parse()
                .map_err(|_| HandlerError::validation(format!("'{}' is not a memory ID.", raw)))?;
            let removed = store
                .delete(id)
                .map_err(|e| HandlerError::failed("delete memory", e))?;
            return Ok(ChatResponse::final_answer(if removed {
                format!("🗑️ Memory {} deleted.", id)
            } else {
                format!("No memory with ID {}.", id)
            }));
        }

        let query = data
            .content
            .as_deref()
            .ok_or_else(|| HandlerError::validation("Which memory should I forget?"))?;
        let best: Option<MemoryItem> = store
            .search(query, 1)
            .map_err(|e| HandlerError::failed("search memories", e))?
            .into_iter()
            .next();
        match best {
            Some(item) => {
                store
                    .delete(item.id)
                    .map_err(|e| HandlerError::failed("delete memory", e))?;
                Ok(ChatResponse::final_answer(format!(
                    "🗑️ Deleted memory: \"{}\"",
                    preview(&item.content)
                )))
            }
            None => Ok(ChatResponse::final_answer(format!(
                "No memory found matching '{}'.",
                query
            ))),
        }
    }
}

fn preview(content: &str) -> String {
    if content.chars().count() <= PREVIEW_CHARS {
        return content.to_string();
    }
    let cut: String = content.chars().take(PREVIEW_CHARS).collect();
    format!("{}...", cut)
}

#[async_trait]
impl ChatHandler for MemoryHandler {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn handle(&self, ctx: &ChatContext) -> Result<ChatResponse, HandlerError> {
        let store = match &self.store {
            Some(store) => store.as_ref(),
            None => return Ok(ChatResponse::final_answer("Memory is not enabled.")),
        };
        match &ctx.intent.action {
            Action::MemorySave(data) => self.save(store, ctx, data.as_ref()),
            Action::MemoryList => self.list(store),
            Action::MemoryDelete(data) => self.delete(store, data.as_ref()),
            other => Err(HandlerError::validation(format!(
                "The memory handler cannot handle '{}'.",
                other.name()
            ))),
        }
    }
}
