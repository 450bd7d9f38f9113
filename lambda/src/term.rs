use std::collections::BTreeSet;

use crate::prelude::*;

#[derive(PartialEq, Eq, Clone, Debug)]
pub enum Term {
    /// `x`
    Var(Name),
    /// `λx.t`
    Abs(Name, Box<Term>),
    /// `t t`
    Apply(Box<Term>, Box<Term>),
}

pub trait TermVisitor<T> {
    fn visit_var(&mut self, name: Name) -> T;
    fn visit_abs(&mut self, param: Name, body: &Term) -> T;
    fn visit_apply(&mut self, function: &Term, argument: &Term) -> T;
}

impl Term {
    pub fn var(name: Name) -> Self {
        Term::Var(name)
    }
    pub fn abs(param: Name, body: Term) -> Self {
        Term::Abs(param, body.into())
    }
    pub fn apply(function: Term, argument: Term) -> Self {
        Term::Apply(function.into(), argument.into())
    }

    pub fn accept<T>(&self, visitor: &mut impl TermVisitor<T>) -> T {
        match self {
            Term::Var(name) => visitor.visit_var(*name),
            Term::Abs(param, body) => visitor.visit_abs(*param, body),
            Term::Apply(function, argument) => visitor.visit_apply(function, argument),
        }
    }

    pub fn free_variables(&self) -> BTreeSet<Name> {
        match self {
            Term::Var(name) => BTreeSet::from([*name]),
            Term::Abs(param, body) => {
                let mut free = body.free_variables();
                free.remove(param);
                free
            }
            Term::Apply(function, argument) => {
                let mut free = function.free_variables();
                free.extend(argument.free_variables());
                free
            }
        }
    }

    pub fn bound_variables(&self) -> BTreeSet<Name> {
        match self {
            Term::Var(_) => BTreeSet::new(),
            Term::Abs(param, body) => {
                let mut bound = body.bound_variables();
                bound.insert(*param);
                bound
            }
            Term::Apply(function, argument) => {
                let mut bound = function.bound_variables();
                bound.extend(argument.bound_variables());
                bound
            }
        }
    }

    pub fn is_redex(&self) -> bool {
        matches!(self, Term::Apply(function, _) if matches!(function.as_ref(), Term::Abs(_, _)))
    }

    pub fn is_normal(&self) -> bool {
        match self {
            Term::Var(_) => true,
            Term::Abs(_, body) => body.is_normal(),
            Term::Apply(function, argument) => {
                !self.is_redex() && function.is_normal() && argument.is_normal()
            }
        }
    }

    /// Structural equality up to the names of bound variables.
    pub fn alpha_eq(&self, other: &Term) -> bool {
        fn rec(lhs: &Term, rhs: &Term, lhs_scope: &mut Vec<Name>, rhs_scope: &mut Vec<Name>) -> bool {
            match (lhs, rhs) {
                (Term::Var(x), Term::Var(y)) => {
                    let i = lhs_scope.iter().rposition(|n| n == x);
                    let j = rhs_scope.iter().rposition(|n| n == y);
                    match (i, j) {
                        (None, None) => x == y,
                        (Some(i), Some(j)) => lhs_scope.len() - i == rhs_scope.len() - j,
                        _ => false,
                    }
                }
                (Term::Abs(x, lhs_body), Term::Abs(y, rhs_body)) => {
                    lhs_scope.push(*x);
                    rhs_scope.push(*y);
                    let eq = rec(lhs_body, rhs_body, lhs_scope, rhs_scope);
                    lhs_scope.pop();
                    rhs_scope.pop();
                    eq
                }
                (Term::Apply(lf, la), Term::Apply(rf, ra)) => {
                    rec(lf, rf, lhs_scope, rhs_scope) && rec(la, ra, lhs_scope, rhs_scope)
                }
                _ => false,
            }
        }
        rec(self, other, &mut vec![], &mut vec![])
    }

    pub fn to_top_level_string(&self) -> String {
        let rendered = self.to_string();
        match rendered.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
            Some(inner) => inner.to_string(),
            None => rendered,
        }
    }

    fn render(&self) -> String {
        match self {
            Term::Var(name) => name.to_string(),
            Term::Abs(param, body) => {
                let body = body.render();
                let body = match body.strip_prefix('(') {
                    Some(inner) => &inner[..inner.len() - 1],
                    None => body.as_str(),
                };
                format!("(λ{param}.{body})")
            }
            Term::Apply(function, argument) => {
                let lhs = function.render();
                let rhs = argument.render();
                match (function.as_ref(), argument.as_ref()) {
                    (Term::Var(_), Term::Var(_)) => format!("({lhs} {rhs})"),
                    (Term::Apply(_, _), Term::Var(_)) => {
                        format!("{} {rhs})", &lhs[..lhs.len() - 1])
                    }
                    (Term::Apply(_, _), _) => format!("{}{rhs})", &lhs[..lhs.len() - 1]),
                    _ => format!("({lhs}{rhs})"),
                }
            }
        }
    }
}

impl std::fmt::Display for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}
