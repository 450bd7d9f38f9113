use std::{
    fs,
    io::{self, IsTerminal, Write},
    ops::ControlFlow,
    path::{Path, PathBuf},
    sync::atomic::Ordering,
};

use anyhow::{Context as _, Result};
use ariadne::{Color, Config, Fmt, Label, Report, ReportKind, Source};
use clap::Parser as ClapParser;
use util::repl;

use crate::{
    evaluator::{EvalError, Event},
    parser::ParseError,
    session::{Outcome, Session},
    term::Term,
};

mod compiler;
mod diagram;
mod environment;
mod evaluator;
mod parser;
mod prelude;
mod session;
mod substitution;
mod term;

#[derive(ClapParser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Files of statements to run, one per line, before the interactive session starts.
    scripts: Vec<PathBuf>,
    /// Keep the line-editor history in this file.
    #[arg(long)]
    history: Option<PathBuf>,
    /// Print every intermediate term while reducing.
    #[arg(long)]
    trace: bool,
    /// Give up after this many reduction steps instead of running until interrupted.
    #[arg(long)]
    max_steps: Option<usize>,
    /// Maximum width of `:diagram` output, in characters.
    #[arg(long, default_value_t = 250)]
    diagram_width: usize,
    /// Maximum height of `:diagram` output, in lines.
    #[arg(long, default_value_t = 50)]
    diagram_height: usize,
}

fn build_report(e: &ParseError, color: bool) -> Report {
    let label = match e {
        ParseError::UndefinedMacro { .. } => "not bound by any `NAME := ...`",
        ParseError::UnboundResultReference { .. } => "nothing has been evaluated yet",
        ParseError::UnbalancedParentheses { .. } => "this parenthesis is never matched",
        ParseError::MalformedAbstraction { .. } => "in this abstraction",
        ParseError::UnexpectedToken { .. } => "unexpected here",
        ParseError::InvalidMacroName { .. } => "names are uppercase letters only",
    };
    let label = Label::new(e.span()).with_message(format!("{}", label.fg(color.then_some(Color::Red))));
    Report::build(ReportKind::Error, (), e.span().start)
        .with_config(Config::default().with_color(color))
        .with_message(e)
        .with_label(if color { label.with_color(Color::Red) } else { label })
        .finish()
}

enum CommandError<'a> {
    Session(&'a str, session::Error),
    Io(io::Error),
}
impl<'a> From<(&'a str, session::Error)> for CommandError<'a> {
    fn from((input, e): (&'a str, session::Error)) -> Self {
        CommandError::Session(input, e)
    }
}
impl From<io::Error> for CommandError<'_> {
    fn from(e: io::Error) -> Self {
        CommandError::Io(e)
    }
}
type CommandResult<'a, T = ()> = Result<T, CommandError<'a>>;

struct Repl<W: Write = io::Stdout> {
    session: Session,
    out: W,
    history: Option<PathBuf>,
    trace: bool,
    diagram_width: usize,
    diagram_height: usize,
}
impl<W: Write> Repl<W> {
    fn new(cli: &Cli, out: W) -> Self {
        Self {
            session: Session::new(cli.max_steps),
            out,
            history: cli.history.clone(),
            trace: cli.trace,
            diagram_width: cli.diagram_width,
            diagram_height: cli.diagram_height,
        }
    }

    fn tokenize<'i>(&mut self, input: &'i str) -> CommandResult<'i> {
        let tokens = parser::tokenize(input)
            .map_err(|e| (input, session::Error::from(e)))?
            .iter()
            .map(|token| token.value().to_string())
            .collect::<Vec<_>>();
        writeln!(self.out, "{}", tokens.join(" "))?;
        Ok(())
    }

    fn parse<'i>(&mut self, input: &'i str) -> CommandResult<'i> {
        let term = self.session.parse(input).map_err(|e| (input, e))?;
        writeln!(self.out, "{}", term.to_top_level_string())?;
        Ok(())
    }

    fn step<'i>(&mut self, input: &'i str) -> CommandResult<'i> {
        match self.session.step(input).map_err(|e| (input, e))? {
            Some(term) => writeln!(self.out, "Out: {}", term.to_top_level_string())?,
            None => writeln!(self.out, "Already in normal form")?,
        }
        Ok(())
    }

    fn normalized<'i>(&self, input: &'i str) -> CommandResult<'i, Term> {
        let term = self.session.parse(input).map_err(|e| (input, e))?;
        Ok(self
            .session
            .normalize(term, |_| {})
            .map_err(|e| (input, e))?)
    }

    fn diagram<'i>(&mut self, input: &'i str) -> CommandResult<'i> {
        let term = self.normalized(input)?;
        writeln!(
            self.out,
            "{}",
            diagram::render(&term, self.diagram_width, self.diagram_height)
        )?;
        Ok(())
    }

    fn equivalent<'i>(&mut self, input: &'i str) -> CommandResult<'i> {
        let (lhs, rhs) = input.split_once('=').unwrap_or((input, ""));
        let lhs = self.normalized(lhs)?;
        let rhs = self.normalized(rhs)?;
        if lhs.alpha_eq(&rhs) {
            writeln!(self.out, "Equivalent")?;
        } else {
            writeln!(self.out, "Not equivalent")?;
        }
        Ok(())
    }

    fn show_environment<'i>(&mut self) -> CommandResult<'i> {
        let env = self.session.environment();
        for (name, term) in env.macros() {
            writeln!(self.out, "{name} := {}", term.to_top_level_string())?;
        }
        if let Some(term) = env.last_result() {
            writeln!(self.out, "_ = {}", term.to_top_level_string())?;
        }
        Ok(())
    }

    fn run_statement<'i>(&mut self, input: &'i str) -> CommandResult<'i> {
        let trace = self.trace;
        let outcome = self
            .session
            .execute(input, |event| {
                if !trace {
                    return;
                }
                match event {
                    Event::Renamed { from, to } => eprintln!("      α-converting {from} to {to}"),
                    Event::Reduced { step, term } => {
                        eprintln!("{step:>5} -> {}", term.to_top_level_string())
                    }
                }
            })
            .map_err(|e| (input, e))?;
        if let Outcome::Evaluated(term) = outcome {
            writeln!(self.out, "Out: {}", term.to_top_level_string())?;
        }
        Ok(())
    }

    fn show_help<'i>(&mut self) -> CommandResult<'i> {
        writeln!(
            self.out,
            "{}",
            r#"
NAME := term        -- bind a macro (uppercase letters), also sets _
term                -- reduce to normal form and print it, sets _
:tokenize   term    -- show tokenized term
:parse      term    -- show parsed term with macros expanded
:step       term    -- contract a single redex, sets _
:diagram    term    -- draw the normal form as a Tromp diagram
:equiv  term = term -- compare normal forms up to renaming of bound variables
:env                -- list bound macros
:help               -- show this message
:quit               -- leave
Write λ as \, and `_` for the last result.
        "#
            .trim()
        )?;
        Ok(())
    }

    fn handle_repl_input<'i>(&mut self, input: &'i str) -> CommandResult<'i, ControlFlow<()>> {
        let (cmd, input) = if let Some(stripped) = input.trim_start().strip_prefix(':') {
            stripped
                .trim_start()
                .split_once(' ')
                .unwrap_or((stripped.trim(), ""))
        } else {
            ("", input)
        };
        match cmd {
            "to" | "tokenize" => self.tokenize(input)?,
            "p" | "parse" => self.parse(input)?,
            "s" | "step" => self.step(input)?,
            "d" | "diagram" => self.diagram(input)?,
            "e" | "equiv" => self.equivalent(input)?,
            "env" => self.show_environment()?,
            "" => self.run_statement(input)?,
            "h" | "he" | "hel" | "help" => self.show_help()?,
            "q" | "quit" => return Ok(ControlFlow::Break(())),
            _ => {
                eprintln!("Unknown command {cmd}");
                self.show_help()?;
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    fn run_script(&mut self, script: &str) -> Result<ControlFlow<()>> {
        for line in script.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if repl::Repl::evaluate(self, line.to_string())?.is_break() {
                return Ok(ControlFlow::Break(()));
            }
        }
        Ok(ControlFlow::Continue(()))
    }
}
impl<W: Write> repl::Repl for Repl<W> {
    type Error = anyhow::Error;
    const PROMPT: &'static str = "In: ";
    fn history(&self) -> Option<&Path> {
        self.history.as_deref()
    }
    fn evaluate(&mut self, input: String) -> Result<ControlFlow<()>, Self::Error> {
        match self.handle_repl_input(&input) {
            Ok(flow) => Ok(flow),
            Err(CommandError::Io(e)) => Err(e.into()),
            Err(CommandError::Session(_, session::Error::Eval(EvalError::Interrupted))) => {
                writeln!(self.out, "^C")?;
                Ok(ControlFlow::Continue(()))
            }
            Err(CommandError::Session(_, session::Error::Eval(e))) => {
                eprintln!("Error: {e}");
                Ok(ControlFlow::Continue(()))
            }
            Err(CommandError::Session(source, session::Error::Parse(e))) => {
                build_report(&e, io::stderr().is_terminal()).eprint(Source::from(source))?;
                Ok(ControlFlow::Continue(()))
            }
        }
    }
    fn interrupted(&mut self) {
        println!("^C");
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut interpreter = Repl::new(&cli, io::stdout());

    let interrupt = interpreter.session.interrupt_flag();
    ctrlc::set_handler(move || interrupt.store(true, Ordering::Relaxed))
        .context("Failed to install the Ctrl-C handler")?;

    for path in &cli.scripts {
        let script = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        if interpreter.run_script(&script)?.is_break() {
            return Ok(());
        }
    }

    println!("Untyped lambda calculus, normal-order reduction. :h to show help");
    println!();
    repl::start_repl(interpreter)?;
    Ok(())
}
