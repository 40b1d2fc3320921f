use crate::core::config::PromptSettings;

pub const FALLBACK_ANSWER: &str = "I'm sorry, I don't know the answer to that.";

pub fn standalone_question_prompt(chat_history: &str, question: &str) -> String {
    format!(
        "Given some conversation history (if any) and a question, convert the question to a standalone question.\n\
         conversation history: {chat_history}\n\
         question: {question}\n\
         standalone question:"
    )
}

fn default_persona(support_email: &str) -> String {
    format!(
        "You are a helpful and enthusiastic support bot who, based on a student statement or question, \
         the context provided, and the conversation history, can return recommendations for mentor profiles. \
         Try to find the answer in the context. If the answer is not given in the context, find the answer \
         in the conversation history if possible. If you really don't know the answer, say \"{FALLBACK_ANSWER}\" \
         And direct the questioner to email {support_email}. Don't try to make up an answer. \
         Always speak as if you were chatting to a friend."
    )
}

/// Builds the system prompt for the answer call.
#[derive(Debug, Clone)]
pub struct AnswerPrompt {
    persona: String,
}

impl AnswerPrompt {
    pub fn new(settings: &PromptSettings) -> Self {
        let persona = match &settings.persona {
            Some(custom) => custom.replace("{support_email}", &settings.support_email),
            None => default_persona(&settings.support_email),
        };
        Self { persona }
    }

    pub fn render(&self, context: &str, question: &str) -> String {
        format!(
            "{}\ncontext: {context}\nquestion: {question}\nanswer: ",
            self.persona
        )
    }
}

impl Default for AnswerPrompt {
    fn default() -> Self {
        Self::new(&PromptSettings::default())
    }
}
