use super::context::SessionContext;
use super::conversation_state::{ConversationState, Turn};

/// Everything that belongs to one user's chat: the turns and the context
/// gathered from them. A new session starts empty.
#[derive(Debug, Default)]
pub struct Session {
    conversation: ConversationState,
    context: SessionContext,
}

impl Session {
    pub fn new() -> Self {
        Self {
            conversation: ConversationState::new(),
            context: SessionContext::new(),
        }
    }

    pub fn record_user(&mut self, text: &str) {
        self.conversation.append(Turn::user(text));
        self.context.observe_user_text(text);
    }

    pub fn record_assistant(&mut self, text: &str) {
        self.conversation.append(Turn::assistant(text));
    }

    pub fn conversation(&self) -> &ConversationState {
        &self.conversation
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }
}
