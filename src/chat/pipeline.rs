use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::core::config::{LlmSettings, PromptSettings, RagSettings};
use crate::core::errors::ApiError;
use crate::llm::{ChatMessage, ChatRequest, LlmProvider};
use crate::rag::{combine_documents_within, RetrievedDocument, Retriever};
use super::history::format_conv_history;
use super::prompt::AnswerPrompt;
use super::rewriter::QuestionRewriter;
use super::state::ConversationStateStore;
use super::types::{Message, Role};

/// Everything computed before the answer call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparedTurn {
    pub standalone_question: String,
    pub documents: Vec<RetrievedDocument>,
    pub context: String,
    pub system_prompt: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent {
    Delta(String),
    Done(Message),
    Failed(String),
}

pub type TurnStream = mpsc::Receiver<TurnEvent>;

/// Rewrite, retrieve, combine, then stream the answer.
#[derive(Clone)]
pub struct RetrievalPipeline {
    llm: Arc<dyn LlmProvider>,
    rewriter: QuestionRewriter,
    retriever: Retriever,
    prompt: AnswerPrompt,
    chat_model: String,
    temperature: Option<f64>,
    max_context_chars: Option<usize>,
}

impl RetrievalPipeline {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        rewriter: QuestionRewriter,
        retriever: Retriever,
        prompt: AnswerPrompt,
        chat_model: String,
        temperature: Option<f64>,
        max_context_chars: Option<usize>,
    ) -> Self {
        Self {
            llm,
            rewriter,
            retriever,
            prompt,
            chat_model,
            temperature,
            max_context_chars,
        }
    }

    pub fn from_settings(
        llm: Arc<dyn LlmProvider>,
        retriever: Retriever,
        llm_settings: &LlmSettings,
        rag: &RagSettings,
        prompts: &PromptSettings,
    ) -> Self {
        let rewriter = QuestionRewriter::new(
            llm.clone(),
            llm_settings.rewrite_model.clone(),
            llm_settings.rewrite_temperature,
        );
        Self::new(
            llm,
            rewriter,
            retriever,
            AnswerPrompt::new(prompts),
            llm_settings.chat_model.clone(),
            llm_settings.temperature,
            rag.max_context_chars,
        )
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub async fn prepare(&self, question: &str, chat_history: &str) -> Result<PreparedTurn, ApiError> {
        let standalone_question = self.rewriter.rewrite(question, chat_history).await?;
        let documents = self.retriever.retrieve(&standalone_question).await?;
        let context = combine_documents_within(&documents, self.max_context_chars);
        let system_prompt = self.prompt.render(&context, question);
        Ok(PreparedTurn {
            standalone_question,
            documents,
            context,
            system_prompt,
        })
    }

    /// Appends the user message, runs the chain and starts streaming the
    /// answer. The assistant message is committed through `state.done` only
    /// once the model finishes and the consumer is still listening.
    ///
    /// Failures before the stream starts are returned directly; the user
    /// message stays in the state.
    pub async fn submit_user_message(
        &self,
        state: Arc<dyn ConversationStateStore>,
        content: &str,
    ) -> Result<TurnStream, ApiError> {
        let current = state.get().with_message(Message::user(content));
        state.update(current.clone());

        let chat_history = format_conv_history(&current.contents());
        let prepared = self.prepare(content, &chat_history).await?;
        tracing::info!(
            chat_id = %current.chat_id,
            documents = prepared.documents.len(),
            context_chars = prepared.context.len(),
            "Prepared answer prompt"
        );

        let mut messages = vec![ChatMessage::system(prepared.system_prompt)];
        messages.extend(current.messages.iter().filter_map(to_model_message));
        let request = ChatRequest::new(messages).with_temperature(self.temperature);
        let mut deltas = self.llm.stream_chat(request, &self.chat_model).await?;

        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(async move {
            let mut answer = String::new();
            while let Some(delta) = deltas.recv().await {
                match delta {
                    Ok(text) => {
                        answer.push_str(&text);
                        if tx.send(TurnEvent::Delta(text)).await.is_err() {
                            tracing::debug!("Turn consumer went away; discarding answer");
                            return;
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Answer stream failed: {}", e);
                        let _ = tx.send(TurnEvent::Failed(e.to_string())).await;
                        return;
                    }
                }
            }

            if tx.is_closed() {
                return;
            }
            let message = Message::assistant(answer);
            let final_state = state.get().with_message(message.clone());
            match state.done(final_state).await {
                Ok(()) => {
                    let _ = tx.send(TurnEvent::Done(message)).await;
                }
                Err(e) => {
                    tracing::error!("Failed to finish turn: {}", e);
                    let _ = tx.send(TurnEvent::Failed(e.to_string())).await;
                }
            }
        });

        Ok(rx)
    }
}

fn to_model_message(message: &Message) -> Option<ChatMessage> {
    if message.role == Role::Data {
        return None;
    }
    Some(ChatMessage {
        role: message.role.as_str().to_string(),
        content: message.content.clone(),
        name: message.name.clone(),
    })
}
