use crate::{
    environment::Environment,
    parser::{Malformation, ParseError, Result, Syntax, Token},
    prelude::*,
    term::Term,
};

fn parameter(param: &Spanned<Token>) -> Result<Name> {
    match param.value() {
        Token::Var(name) => Ok(*name),
        other => Err(ParseError::MalformedAbstraction {
            malformation: Malformation::InvalidParameter(
                other.to_string().chars().next().unwrap_or('?'),
            ),
            span: param.span(),
        }),
    }
}

pub fn compile(syntax: &Spanned<Syntax>, env: &Environment) -> Result<Term> {
    match syntax.value() {
        Syntax::Var(name) => Ok(Term::var(*name)),
        Syntax::Macro(name) => env.get(name).ok_or_else(|| ParseError::UndefinedMacro {
            name: name.to_string(),
            span: syntax.span(),
        }),
        Syntax::LastResult => env
            .last_result()
            .ok_or_else(|| ParseError::UnboundResultReference {
                span: syntax.span(),
            }),
        Syntax::Abs(params, body) => {
            if params.is_empty() {
                return Err(ParseError::MalformedAbstraction {
                    malformation: Malformation::EmptyParameters,
                    span: params.span(),
                });
            }
            let params = params.iter().map(parameter).collect::<Result<Vec<_>>>()?;
            let body = compile(body, env)?;
            Ok(params
                .into_iter()
                .rev()
                .fold(body, |body, param| Term::abs(param, body)))
        }
        Syntax::Apply(function, argument) => Ok(Term::apply(
            compile(function, env)?,
            compile(argument, env)?,
        )),
    }
}
