use std::io::{BufRead, Write};

use parking_lot::Mutex;

use crate::AssetResult;

/// The only answer that lets a destructive run proceed
pub const AFFIRMATIVE: &str = "yes";

/// Source of answers to yes/no questions
pub trait Prompt: Send + Sync {
    /// Show `message` and return the answer with its line terminator removed
    fn ask(&self, message: &str) -> AssetResult<String>;
}

/// Asks on standard output and reads one line from standard input
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinPrompt;

impl Prompt for StdinPrompt {
    fn ask(&self, message: &str) -> AssetResult<String> {
        let mut stdout = std::io::stdout().lock();
        write!(stdout, "{message}")?;
        stdout.flush()?;

        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line)?;
        Ok(strip_line_terminator(&line).to_string())
    }
}

/// Replays fixed answers and records every question asked
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
    answers: Mutex<Vec<String>>,
    asked: Mutex<Vec<String>>,
}

impl ScriptedPrompt {
    /// Answers are handed out in order; an exhausted script answers with an empty line
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut answers: Vec<String> = answers.into_iter().map(Into::into).collect();
        answers.reverse();
        Self {
            answers: Mutex::new(answers),
            asked: Mutex::new(Vec::new()),
        }
    }

    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().clone()
    }
}

impl Prompt for ScriptedPrompt {
    fn ask(&self, message: &str) -> AssetResult<String> {
        self.asked.lock().push(message.to_string());
        let answer = self.answers.lock().pop().unwrap_or_default();
        Ok(strip_line_terminator(&answer).to_string())
    }
}

impl<P: Prompt + ?Sized> Prompt for std::sync::Arc<P> {
    fn ask(&self, message: &str) -> AssetResult<String> {
        (**self).ask(message)
    }
}

/// How a destructive run is confirmed
pub enum Confirmation {
    /// Proceed without asking
    NoInput,
    /// Ask and proceed only on [`AFFIRMATIVE`]
    Interactive(Box<dyn Prompt>),
}

impl Confirmation {
    pub fn stdin() -> Self {
        Confirmation::Interactive(Box::new(StdinPrompt))
    }

    pub fn with_prompt<P: Prompt + 'static>(prompt: P) -> Self {
        Confirmation::Interactive(Box::new(prompt))
    }

    /// Whether the run may proceed after showing `message`
    pub fn confirm(&self, message: &str) -> AssetResult<bool> {
        match self {
            Confirmation::NoInput => Ok(true),
            Confirmation::Interactive(prompt) => Ok(prompt.ask(message)? == AFFIRMATIVE),
        }
    }
}

impl std::fmt::Debug for Confirmation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Confirmation::NoInput => f.write_str("NoInput"),
            Confirmation::Interactive(_) => f.write_str("Interactive"),
        }
    }
}

fn strip_line_terminator(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}
