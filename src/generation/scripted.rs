use super::LanguageModel;
use crate::error::GenerationError;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Language model that replays canned replies and records every prompt
///
/// Replies are consumed in order; once exhausted the default reply is used.
/// Replies stream word by word. Used to exercise retrieval without a model server.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String, String>>>,
    default_reply: String,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new(default_reply: impl Into<String>) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            default_reply: default_reply.into(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Queue a reply for the next call
    pub fn then_reply(self, reply: impl Into<String>) -> Self {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(Ok(reply.into()));
        }
        self
    }

    /// Queue a model failure for the next call
    pub fn then_fail(self, message: impl Into<String>) -> Self {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(Err(message.into()));
        }
        self
    }

    /// Prompts received so far, oldest first
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|prompts| prompts.clone())
            .unwrap_or_default()
    }
}

impl LanguageModel for ScriptedModel {
    fn generate(
        &self,
        prompt: &str,
        on_token: &mut dyn FnMut(&str),
    ) -> Result<String, GenerationError> {
        self.prompts
            .lock()
            .map_err(|e| GenerationError::TaskFailed(e.to_string()))?
            .push(prompt.to_string());

        let next = self
            .replies
            .lock()
            .map_err(|e| GenerationError::TaskFailed(e.to_string()))?
            .pop_front();

        let reply = match next {
            Some(Ok(reply)) => reply,
            Some(Err(message)) => return Err(GenerationError::ModelError(message)),
            None => self.default_reply.clone(),
        };

        for word in reply.split_inclusive(' ') {
            on_token(word);
        }

        Ok(reply)
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replays_in_order_then_default() {
        let model = ScriptedModel::new("default")
            .then_reply("first")
            .then_fail("boom");

        assert_eq!(model.generate("p1", &mut |_| {}).unwrap(), "first");
        assert!(matches!(
            model.generate("p2", &mut |_| {}),
            Err(GenerationError::ModelError(m)) if m == "boom"
        ));
        assert_eq!(model.generate("p3", &mut |_| {}).unwrap(), "default");
        assert_eq!(model.prompts(), vec!["p1", "p2", "p3"]);
    }

    #[test]
    fn test_streams_words() {
        let model = ScriptedModel::new("Paris is lovely");
        let mut tokens = Vec::new();
        model
            .generate("q", &mut |t| tokens.push(t.to_string()))
            .unwrap();
        assert_eq!(tokens, vec!["Paris ", "is ", "lovely"]);
        assert_eq!(tokens.concat(), "Paris is lovely");
    }
}
