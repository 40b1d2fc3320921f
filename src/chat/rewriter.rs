use std::sync::Arc;

use crate::core::errors::ApiError;
use crate::llm::{ChatMessage, ChatRequest, LlmProvider};
use super::prompt::standalone_question_prompt;

/// Turns a follow-up question into one that can be searched on its own.
#[derive(Clone)]
pub struct QuestionRewriter {
    llm: Arc<dyn LlmProvider>,
    model: String,
    temperature: Option<f64>,
}

impl QuestionRewriter {
    pub fn new(llm: Arc<dyn LlmProvider>, model: String, temperature: Option<f64>) -> Self {
        Self {
            llm,
            model,
            temperature,
        }
    }

    pub async fn rewrite(&self, question: &str, chat_history: &str) -> Result<String, ApiError> {
        let prompt = standalone_question_prompt(chat_history, question);
        let request = ChatRequest::new(vec![ChatMessage::user(prompt)])
            .with_temperature(self.temperature);
        let output = self.llm.chat(request, &self.model).await?;
        let standalone = output.trim().to_string();
        tracing::debug!(standalone = %standalone, "Rewrote question");
        Ok(standalone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::testing::FakeLlm;

    #[tokio::test]
    async fn sends_single_prompt_and_trims_output() {
        let llm = Arc::new(FakeLlm::new("  Which mentor knows visual learning?\n", &[]));
        let rewriter = QuestionRewriter::new(llm.clone(), "gpt-test".to_string(), Some(0.0));

        let standalone = rewriter
            .rewrite("and her?", "Who is Ada?\nAda is a mentor.")
            .await
            .unwrap();
        assert_eq!(standalone, "Which mentor knows visual learning?");

        let calls = llm.chat_calls();
        assert_eq!(calls.len(), 1);
        let (request, model) = &calls[0];
        assert_eq!(model, "gpt-test");
        assert_eq!(request.temperature, Some(0.0));
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].role, "user");
        assert!(request.messages[0]
            .content
            .contains("conversation history: Who is Ada?\nAda is a mentor.\n"));
        assert!(request.messages[0].content.contains("question: and her?\n"));
    }

    #[tokio::test]
    async fn propagates_provider_failure() {
        let llm = Arc::new(FakeLlm::failing_chat());
        let rewriter = QuestionRewriter::new(llm, "gpt-test".to_string(), None);
        let err = rewriter.rewrite("q", "").await.unwrap_err();
        assert!(matches!(err, ApiError::Upstream(_)));
    }
}
