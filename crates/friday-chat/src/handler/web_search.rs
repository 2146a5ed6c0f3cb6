use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use super::ChatHandler;
use crate::collaborators::WebSearch;
use crate::error::HandlerError;
use crate::types::{ChatContext, ChatResponse};

const RESULT_LIMIT: usize = 5;

const WEB_SYSTEM_PROMPT: &str = "You are Friday, a concise personal assistant. Answer the \
    user's question from the web results provided. Cite the sources you rely on by URL. If the \
    results do not answer the question, say so.";

/// Grounds the answer in web search results. Without a search provider, or
/// when the search fails, the question is answered like a general one.
pub struct WebSearchHandler {
    search: Option<Arc<dyn WebSearch>>,
}

impl WebSearchHandler {
    pub fn new(search: Option<Arc<dyn WebSearch>>) -> Self {
        Self { search }
    }
}

#[async_trait]
impl ChatHandler for WebSearchHandler {
    fn name(&self) -> &'static str {
        "web_search"
    }

    async fn handle(&self, ctx: &ChatContext) -> Result<ChatResponse, HandlerError> {
        let search = match &self.search {
            Some(s) => s,
            None => return Ok(ChatResponse::needs_synthesis(None)),
        };
        let hits = match search.search(&ctx.message, RESULT_LIMIT).await {
            Ok(hits) if !hits.is_empty() => hits,
            Ok(_) => return Ok(ChatResponse::needs_synthesis(None)),
            Err(e) => {
                warn!(error = %e, "Web search failed, answering without results");
                return Ok(ChatResponse::needs_synthesis(None));
            }
        };

        let context = hits
            .iter()
            .enumerate()
            .map(|(i, h)| format!("[{}] {}\n{}\n{}", i + 1, h.title, h.url, h.snippet))
            .collect::<Vec<_>>()
            .join("\n\n");
        let mut response =
            ChatResponse::needs_synthesis(Some(context)).with_system_prompt(WEB_SYSTEM_PROMPT);
        response.used_web = true;
        response.answer = hits
            .iter()
            .map(|h| format!("- {} ({})", h.title, h.url))
            .collect::<Vec<_>>()
            .join("\n");
        response.web_results = hits.into_iter().map(|h| h.url).collect();
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::SearchHit;
    use crate::error::ServiceError;
    use crate::intent::{Action, Intent};
    use crate::testing::{context, friday_afternoon};

    struct FixedSearch(Result<Vec<SearchHit>, String>);

    #[async_trait]
    impl WebSearch for FixedSearch {
        async fn search(&self, _q: &str, limit: usize) -> Result<Vec<SearchHit>, ServiceError> {
            assert_eq!(limit, RESULT_LIMIT);
            self.0.clone().map_err(ServiceError)
        }
    }

    fn ctx() -> ChatContext {
        context(
            "who won the match yesterday?",
            Intent::new(Action::WebSearch),
            friday_afternoon(),
        )
    }

    #[tokio::test]
    async fn test_results_become_context() {
        let hits = vec![SearchHit {
            title: "Match report".to_string(),
            url: "https://example.org/report".to_string(),
            snippet: "Home side won 2-1".to_string(),
        }];
        let handler = WebSearchHandler::new(Some(Arc::new(FixedSearch(Ok(hits)))));
        let response = handler.handle(&ctx()).await.unwrap();

        assert!(!response.is_final);
        assert!(response.used_web);
        assert_eq!(response.web_results, vec!["https://example.org/report".to_string()]);
        assert!(response.context_for_llm.unwrap().contains("Home side won 2-1"));
        assert!(response.system_prompt_override.is_some());
        assert_eq!(response.answer, "- Match report (https://example.org/report)");
    }

    #[tokio::test]
    async fn test_falls_back_to_general() {
        let handler = WebSearchHandler::new(None);
        let response = handler.handle(&ctx()).await.unwrap();
        assert!(!response.is_final);
        assert!(!response.used_web);

        let handler = WebSearchHandler::new(Some(Arc::new(FixedSearch(Err("quota".to_string())))));
        let response = handler.handle(&ctx()).await.unwrap();
        assert!(!response.used_web);
        assert!(response.context_for_llm.is_none());
    }
}
