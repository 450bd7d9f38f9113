use std::{ops::ControlFlow, path::Path};

use rustyline::{error::ReadlineError, Editor};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error<E> {
    #[error(transparent)]
    Readline(ReadlineError),
    #[error("Eval failed: {0:?}")]
    EvalError(E),
}

pub trait Repl {
    type Error: std::fmt::Debug;
    const PROMPT: &'static str = ">> ";
    fn history(&self) -> Option<&Path> {
        None
    }
    fn evaluate(&mut self, input: String) -> Result<ControlFlow<()>, Self::Error>;
    fn interrupted(&mut self) {}
}

pub fn start_repl<R: Repl>(mut repl: R) -> Result<(), Error<R::Error>> {
    let mut editor = Editor::<()>::new();
    if let Some(history) = repl.history() {
        editor.load_history(history).ok();
    }
    let mut input: Option<String> = None;
    loop {
        match editor.readline(R::PROMPT) {
            Ok(mut line) if line.ends_with('\\') => {
                line.pop();
                line.push('\n');
                if let Some(input) = input.as_mut() {
                    input.push_str(line.as_str());
                } else {
                    input = Some(line);
                }
            }
            Ok(line) => {
                let input = if let Some(mut input) = input.take() {
                    input.push_str(line.as_str());
                    input
                } else {
                    line
                };
                if !input.trim().is_empty() {
                    editor.add_history_entry(input.as_str());
                }
                let flow = repl.evaluate(input).map_err(Error::EvalError)?;
                if let Some(history) = repl.history() {
                    editor.save_history(history).map_err(Error::Readline)?;
                }
                if flow.is_break() {
                    break Ok(());
                }
            }
            Err(ReadlineError::Interrupted) => {
                input = None;
                repl.interrupted();
            }
            Err(ReadlineError::Eof) => break Ok(()),
            Err(e) => break Err(Error::Readline(e)),
        }
    }
}
