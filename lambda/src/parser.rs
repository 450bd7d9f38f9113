use std::rc::Rc;

use chumsky::{prelude::*, Stream};
use thiserror::Error;

use crate::{compiler, environment::Environment, prelude::*, term::Term};

pub trait SimpleParser<I: Clone + std::hash::Hash, O>: Parser<I, O, Error = Simple<I>> {}
impl<I: Clone + std::hash::Hash, O, T> SimpleParser<I, O> for T where
    T: Parser<I, O, Error = Simple<I>>
{
}

#[derive(PartialEq, Eq, Hash, Clone, derive_more::Display, Debug)]
pub enum Token {
    #[display(fmt = "λ")]
    Lambda,
    #[display(fmt = ".")]
    Dot,
    #[display(fmt = "(")]
    LParen,
    #[display(fmt = ")")]
    RParen,
    #[display(fmt = ":=")]
    Bind,
    #[display(fmt = "_")]
    LastResult,
    #[display(fmt = "{}", "_0")]
    Var(Name),
    #[display(fmt = "{}", "_0")]
    Macro(String),
    #[display(fmt = "{}", "_0")]
    Unknown(char),
}

pub fn lexer() -> impl SimpleParser<char, Vec<Spanned<Token>>> {
    let token = choice((
        just('λ').or(just('\\')).to(Token::Lambda),
        just('.').to(Token::Dot),
        just('(').to(Token::LParen),
        just(')').to(Token::RParen),
        just(":=").to(Token::Bind),
        just('_').to(Token::LastResult),
        filter(char::is_ascii_lowercase).map(Token::Var),
        filter(char::is_ascii_uppercase)
            .repeated()
            .at_least(1)
            .collect::<String>()
            .map(Token::Macro),
        filter(|c: &char| !c.is_whitespace()).map(Token::Unknown),
    ));
    token
        .map_with_span(Spanned)
        .padded()
        .repeated()
        .padded()
        .then_ignore(end())
}

#[derive(PartialEq, Eq, Clone, Copy, derive_more::Display, Debug)]
pub enum Malformation {
    #[display(fmt = "missing `.` after parameter list")]
    MissingDot,
    #[display(fmt = "empty parameter list")]
    EmptyParameters,
    #[display(fmt = "invalid character `{}` in parameter list", "_0")]
    InvalidParameter(char),
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ParseError {
    #[error("Unknown macro `{name}`")]
    UndefinedMacro { name: String, span: Span },
    #[error("No previous result to refer to with `_`")]
    UnboundResultReference { span: Span },
    #[error("Unbalanced parentheses")]
    UnbalancedParentheses { span: Span },
    #[error("Malformed abstraction: {malformation}")]
    MalformedAbstraction {
        malformation: Malformation,
        span: Span,
    },
    #[error("Unexpected {found}")]
    UnexpectedToken { found: String, span: Span },
    #[error("Invalid macro name `{name}`, expected uppercase letters only")]
    InvalidMacroName { name: String, span: Span },
}
pub type Result<T> = std::result::Result<T, ParseError>;

impl ParseError {
    pub fn span(&self) -> Span {
        match self {
            ParseError::UndefinedMacro { span, .. }
            | ParseError::UnboundResultReference { span }
            | ParseError::UnbalancedParentheses { span }
            | ParseError::MalformedAbstraction { span, .. }
            | ParseError::UnexpectedToken { span, .. }
            | ParseError::InvalidMacroName { span, .. } => span.clone(),
        }
    }

    fn unexpected(e: Simple<Token>) -> Self {
        // Only an abstraction's parameter list ever waits for a `.`
        if e.expected().any(|expected| expected == &Some(Token::Dot)) {
            return ParseError::MalformedAbstraction {
                malformation: Malformation::MissingDot,
                span: e.span(),
            };
        }
        ParseError::UnexpectedToken {
            found: e
                .found()
                .map_or_else(|| "end of input".to_string(), |found| format!("`{found}`")),
            span: e.span(),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Syntax {
    Var(Name),
    Macro(Identifier),
    LastResult,
    /// Everything between `λ` and `.`, spanning both.
    Abs(Spanned<Vec<Spanned<Token>>>, Rc<Spanned<Syntax>>),
    Apply(Rc<Spanned<Syntax>>, Rc<Spanned<Syntax>>),
}

#[derive(PartialEq, Eq, Debug)]
pub enum Statement {
    Bind(Identifier, Term),
    Evaluate(Term),
    Empty,
}

fn parentheses() -> impl SimpleParser<Token, ()> {
    recursive(|group: Recursive<_, (), _>| {
        let nested = just(Token::LParen)
            .map_with_span(|_, span| span)
            .then_ignore(group)
            .then(just(Token::RParen).or_not())
            .validate(|(open, close), _, emit| {
                if close.is_none() {
                    emit(Simple::custom(open, "unclosed `(`"))
                }
            });
        choice((nested, none_of([Token::LParen, Token::RParen]).ignored()))
            .repeated()
            .ignored()
    })
    .then_ignore(end())
}

fn term_parser() -> impl SimpleParser<Token, Spanned<Syntax>> {
    recursive(|term: Recursive<_, Spanned<Syntax>, _>| {
        let atom = choice((
            select! {
                Token::Var(name) => Syntax::Var(name),
                Token::Macro(name) => Syntax::Macro(name.into()),
                Token::LastResult => Syntax::LastResult,
            }
            .map_with_span(Spanned),
            term.clone()
                .delimited_by(just(Token::LParen), just(Token::RParen)),
        ));

        // λxy.M, the body extending as far right as the enclosing group
        let abstraction = just(Token::Lambda)
            .ignore_then(
                none_of([Token::Dot, Token::RParen])
                    .map_with_span(Spanned)
                    .repeated(),
            )
            .then_ignore(just(Token::Dot))
            .map_with_span(Spanned)
            .then(term)
            .map(|(params, body)| Syntax::Abs(params, body.into()))
            .map_with_span(Spanned)
            .labelled("abstraction");

        let operand = choice((abstraction, atom));
        operand
            .clone()
            .then(operand.repeated())
            .foldl(|lhs, rhs| {
                let span = merge_span(&lhs.span(), &rhs.span());
                Spanned(Syntax::Apply(lhs.into(), rhs.into()), span)
            })
    })
    .labelled("term")
}

fn bind_parser() -> impl SimpleParser<Token, (Spanned<Vec<Spanned<Token>>>, Spanned<Syntax>)> {
    none_of([Token::Bind])
        .map_with_span(Spanned)
        .repeated()
        .then_ignore(just(Token::Bind))
        .map_with_span(Spanned)
        .then(term_parser())
        .then_ignore(end())
}

pub fn tokenize(s: &str) -> Result<Vec<Spanned<Token>>> {
    // Every non-whitespace character lexes to some token, so failures are only defensive.
    lexer().parse(s).map_err(|es| {
        let span = es.first().map(|e| e.span()).unwrap_or(0..0);
        ParseError::UnexpectedToken {
            found: s.chars().skip(span.start).take(span.len()).collect(),
            span,
        }
    })
}

fn run<O>(
    parser: impl SimpleParser<Token, O>,
    tokens: &[Spanned<Token>],
    eoi: &Span,
) -> std::result::Result<O, Vec<Simple<Token>>> {
    parser.parse(Stream::from_iter(
        eoi.clone(),
        tokens.iter().cloned().map(Into::into),
    ))
}

fn end_of_input(s: &str) -> Span {
    let len = s.chars().count();
    len..len + 1
}

fn first_error(es: Vec<Simple<Token>>, eoi: &Span, f: impl Fn(Simple<Token>) -> ParseError) -> ParseError {
    es.into_iter().next().map_or_else(
        || ParseError::UnexpectedToken {
            found: "end of input".to_string(),
            span: eoi.clone(),
        },
        f,
    )
}

fn check_parentheses(tokens: &[Spanned<Token>], eoi: &Span) -> Result<()> {
    run(parentheses(), tokens, eoi).map_err(|es| {
        first_error(es, eoi, |e| ParseError::UnbalancedParentheses { span: e.span() })
    })
}

fn parse_syntax(tokens: &[Spanned<Token>], eoi: &Span) -> Result<Spanned<Syntax>> {
    check_parentheses(tokens, eoi)?;
    run(term_parser().then_ignore(end()), tokens, eoi)
        .map_err(|es| first_error(es, eoi, ParseError::unexpected))
}

pub fn parse_term(s: &str, env: &Environment) -> Result<Term> {
    let tokens = tokenize(s)?;
    let syntax = parse_syntax(&tokens, &end_of_input(s))?;
    compiler::compile(&syntax, env)
}

pub fn parse_statement(s: &str, env: &Environment) -> Result<Statement> {
    let tokens = tokenize(s)?;
    let eoi = end_of_input(s);
    if tokens.is_empty() {
        return Ok(Statement::Empty);
    }
    if !tokens.iter().any(|t| t.value() == &Token::Bind) {
        let syntax = parse_syntax(&tokens, &eoi)?;
        return compiler::compile(&syntax, env).map(Statement::Evaluate);
    }
    check_parentheses(&tokens, &eoi)?;
    let (target, syntax) = run(bind_parser(), &tokens, &eoi)
        .map_err(|es| first_error(es, &eoi, ParseError::unexpected))?;
    let name = match target.as_slice() {
        [Spanned(Token::Macro(name), _)] => Identifier::from(name.as_str()),
        [] => {
            return Err(ParseError::InvalidMacroName {
                name: String::new(),
                span: target.span(),
            })
        }
        names => {
            let span = merge_span(&names[0].span(), &names[names.len() - 1].span());
            return Err(ParseError::InvalidMacroName {
                name: s.chars().skip(span.start).take(span.len()).collect(),
                span,
            });
        }
    };
    let term = compiler::compile(&syntax, env)?;
    Ok(Statement::Bind(name, term))
}
