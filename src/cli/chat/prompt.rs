use rustyline::{Config, Editor, Result};

const DEFAULT_PROMPT: &str = "What is your question? ";

pub fn generate_prompt(custom_prompt: Option<&str>) -> String {
    custom_prompt.unwrap_or(DEFAULT_PROMPT).to_string()
}

pub fn rl() -> Result<Editor<()>> {
    let config = Config::builder()
        .history_ignore_space(true)
        .history_ignore_dups(true)
        .auto_add_history(false)
        .build();
    Editor::with_config(config)
}
