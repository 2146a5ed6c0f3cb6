//! Default handler: open conversation, optionally grounded in the notes vault
//! and in remembered facts.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use super::ChatHandler;
use crate::collaborators::{KnowledgeBase, MemoryStore};
use crate::error::HandlerError;
use crate::types::{ChatContext, ChatResponse};

const DEFAULT_CHUNK_LIMIT: usize = 4;
const DEFAULT_MEMORY_LIMIT: usize = 5;

pub struct GeneralHandler {
    knowledge: Option<Arc<dyn KnowledgeBase>>,
    memory: Option<Arc<dyn MemoryStore>>,
    chunk_limit: usize,
    memory_limit: usize,
}

impl GeneralHandler {
    pub fn new(knowledge: Option<Arc<dyn KnowledgeBase>>) -> Self {
        Self {
            knowledge,
            memory: None,
            chunk_limit: DEFAULT_CHUNK_LIMIT,
            memory_limit: DEFAULT_MEMORY_LIMIT,
        }
    }

    pub fn with_memory(mut self, memory: Option<Arc<dyn MemoryStore>>) -> Self {
        self.memory = memory;
        self
    }

    /// Notes context section plus the chunk sources, when any matched.
    async fn notes(&self, ctx: &ChatContext) -> Option<(String, Vec<String>)> {
        let knowledge = match (&self.knowledge, ctx.intent.use_rag) {
            (Some(kb), true) => kb,
            _ => return None,
        };
        let chunks = match knowledge.search(&ctx.message, self.chunk_limit).await {
            Ok(chunks) => chunks,
            Err(e) => {
                warn!(error = %e, "Knowledge search failed, answering without notes");
                return None;
            }
        };
        if chunks.is_empty() {
            return None;
        }
        let section = chunks
            .iter()
            .map(|c| format!("[{}]\n{}", c.source, c.text.trim()))
            .collect::<Vec<_>>()
            .join("\n\n");
        Some((section, chunks.into_iter().map(|c| c.source).collect()))
    }

    /// Memories section plus the matched facts.
    fn memories(&self, ctx: &ChatContext) -> Option<(String, Vec<String>)> {
        let memory = match (&self.memory, ctx.intent.use_memory) {
            (Some(store), true) => store,
            _ => return None,
        };
        let items = match memory.search(&ctx.message, self.memory_limit) {
            Ok(items) => items,
            Err(e) => {
                warn!(error = %e, "Memory search failed, answering without memories");
                return None;
            }
        };
        if items.is_empty() {
            return None;
        }
        let facts: Vec<String> = items.into_iter().map(|m| m.content).collect();
        let section = facts
            .iter()
            .map(|f| format!("[Memory] {}", f.trim()))
            .collect::<Vec<_>>()
            .join("\n");
        Some((section, facts))
    }
}

#[async_trait]
impl ChatHandler for GeneralHandler {
    fn name(&self) -> &'static str {
        "general"
    }

    async fn handle(&self, ctx: &ChatContext) -> Result<ChatResponse, HandlerError> {
        let notes = self.notes(ctx).await;
        let memories = self.memories(ctx);

        let mut sections = Vec::new();
        if let Some((section, _)) = &notes {
            sections.push(format!("### From your notes\n{}", section));
        }
        if let Some((section, _)) = &memories {
            sections.push(format!("### From your memories\n{}", section));
        }

        let mut response = ChatResponse::needs_synthesis(Some(sections.join("\n\n")));
        if let Some((_, sources)) = notes {
            response.used_rag = true;
            response.context_chunks = sources;
        }
        if let Some((_, facts)) = memories {
            response.used_memory = true;
            response.memory_items = facts;
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::RetrievedChunk;
    use crate::error::ServiceError;
    use crate::intent::{Action, Intent};
    use crate::memory::SqliteMemoryStore;

    struct FixedKb(Result<Vec<RetrievedChunk>, String>);

    #[async_trait]
    impl KnowledgeBase for FixedKb {
        async fn search(&self, _q: &str, _l: usize) -> Result<Vec<RetrievedChunk>, ServiceError> {
            self.0.clone().map_err(ServiceError)
        }
    }

    fn ctx(use_rag: bool) -> ChatContext {
        let mut intent = Intent::new(Action::General);
        intent.use_rag = use_rag;
        ChatContext {
            session_id: "s".to_string(),
            message: "what about the garden?".to_string(),
            intent,
            history: vec![],
            last_user_message: None,
            now: chrono::Utc::now(),
        }
    }

    fn chunk(source: &str) -> RetrievedChunk {
        RetrievedChunk {
            source: source.to_string(),
            text: "tomatoes in May".to_string(),
            score: 1.0,
        }
    }

    #[tokio::test]
    async fn test_without_knowledge_base() {
        let response = GeneralHandler::new(None).handle(&ctx(true)).await.unwrap();
        assert!(!response.is_final);
        assert!(!response.used_rag);
        assert!(response.context_for_llm.is_none());
    }

    #[tokio::test]
    async fn test_with_chunks() {
        let kb: Arc<dyn KnowledgeBase> = Arc::new(FixedKb(Ok(vec![chunk("garden.md")])));
        let response = GeneralHandler::new(Some(kb)).handle(&ctx(true)).await.unwrap();
        assert!(!response.is_final);
        assert!(response.used_rag);
        assert_eq!(response.context_chunks, vec!["garden.md".to_string()]);
        assert!(response
            .context_for_llm
            .unwrap()
            .contains("[garden.md]\ntomatoes in May"));
    }

    #[tokio::test]
    async fn test_rag_not_requested() {
        let kb: Arc<dyn KnowledgeBase> = Arc::new(FixedKb(Ok(vec![chunk("garden.md")])));
        let response = GeneralHandler::new(Some(kb)).handle(&ctx(false)).await.unwrap();
        assert!(!response.used_rag);
    }

    #[tokio::test]
    async fn test_search_failure_is_not_an_error() {
        let kb: Arc<dyn KnowledgeBase> = Arc::new(FixedKb(Err("index missing".to_string())));
        let response = GeneralHandler::new(Some(kb)).handle(&ctx(true)).await.unwrap();
        assert!(!response.used_rag);
        assert!(!response.is_final);
    }

    fn memory_ctx(message: &str, use_rag: bool) -> ChatContext {
        let mut ctx = ctx(use_rag);
        ctx.message = message.to_string();
        ctx.intent.use_memory = true;
        ctx
    }

    fn memory_with(facts: &[&str]) -> Arc<dyn MemoryStore> {
        let store = SqliteMemoryStore::in_memory().unwrap();
        for fact in facts {
            store.save(fact, chrono::Utc::now()).unwrap();
        }
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_memory_hits_become_context() {
        let handler = GeneralHandler::new(None)
            .with_memory(Some(memory_with(&["Sister lives in Porto", "Allergic to peanuts"])));
        let response = handler
            .handle(&memory_ctx("where does my sister live?", false))
            .await
            .unwrap();

        assert!(!response.is_final);
        assert!(response.used_memory);
        assert!(!response.used_rag);
        assert_eq!(response.memory_items, vec!["Sister lives in Porto".to_string()]);
        assert_eq!(
            response.context_for_llm.as_deref(),
            Some("### From your memories\n[Memory] Sister lives in Porto")
        );
    }

    #[tokio::test]
    async fn test_memory_and_notes_are_merged() {
        let kb: Arc<dyn KnowledgeBase> = Arc::new(FixedKb(Ok(vec![chunk("garden.md")])));
        let handler = GeneralHandler::new(Some(kb))
            .with_memory(Some(memory_with(&["Garden gets sun after 2pm"])));
        let response = handler
            .handle(&memory_ctx("what about the garden?", true))
            .await
            .unwrap();

        assert!(response.used_rag && response.used_memory);
        let context = response.context_for_llm.unwrap();
        let notes = context.find("### From your notes").unwrap();
        let memories = context.find("### From your memories").unwrap();
        assert!(notes < memories);
        assert!(context.contains("[Memory] Garden gets sun after 2pm"));
    }

    #[tokio::test]
    async fn test_memory_not_requested() {
        let handler = GeneralHandler::new(None).with_memory(Some(memory_with(&["Sister lives in Porto"])));
        let mut ctx = memory_ctx("where does my sister live?", false);
        ctx.intent.use_memory = false;
        let response = handler.handle(&ctx).await.unwrap();
        assert!(!response.used_memory);
        assert!(response.memory_items.is_empty());
        assert!(response.context_for_llm.is_none());
    }
}
