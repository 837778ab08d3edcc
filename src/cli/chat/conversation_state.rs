/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Role name used by the Gemini `contents` list.
    pub fn gemini_role(self) -> &'static str {
        match self {
            Role::Assistant => "model",
            Role::User => "user",
        }
    }
}

/// One message of the conversation. Fields are private so a turn cannot
/// change after it has been recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    role: Role,
    text: String,
}

impl Turn {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Append-only list of turns in chronological order.
#[derive(Debug, Default)]
pub struct ConversationState {
    turns: Vec<Turn>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self { turns: Vec::new() }
    }

    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn all(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
