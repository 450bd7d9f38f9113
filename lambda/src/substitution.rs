use std::{
    collections::BTreeSet,
    ops::Bound::{Excluded, Unbounded},
};

use crate::{evaluator::EvalError, prelude::*, term::Term};

impl Term {
    /// Returns whether anything was replaced.
    pub fn substitute(
        &mut self,
        before: Name,
        after: &Term,
        renamed: &mut dyn FnMut(Name, Name),
    ) -> Result<bool, EvalError> {
        if matches!(self, Term::Var(name) if *name == before) {
            *self = after.clone();
            return Ok(true);
        }
        match self {
            Term::Var(_) => Ok(false),
            Term::Abs(param, body) => {
                if *param == before || !body.free_variables().contains(&before) {
                    return Ok(false);
                }
                let free = after.free_variables();
                if free.contains(param) {
                    let fresh = fresh_name(*param, &free, body)
                        .ok_or(EvalError::NamesExhausted { binder: *param })?;
                    body.rename(*param, fresh);
                    renamed(*param, fresh);
                    *param = fresh;
                }
                body.substitute(before, after, renamed)
            }
            Term::Apply(function, argument) => {
                let lhs = function.substitute(before, after, renamed)?;
                let rhs = argument.substitute(before, after, renamed)?;
                Ok(lhs || rhs)
            }
        }
    }

    pub fn rename(&mut self, before: Name, after: Name) {
        match self {
            Term::Var(name) => {
                if *name == before {
                    *name = after;
                }
            }
            Term::Abs(param, body) => {
                if *param != before && *param != after {
                    body.rename(before, after);
                }
            }
            Term::Apply(function, argument) => {
                function.rename(before, after);
                argument.rename(before, after);
            }
        }
    }
}

// The letter after `param` that neither `free` nor `body` uses, wrapping around.
fn fresh_name(param: Name, free: &BTreeSet<Name>, body: &Term) -> Option<Name> {
    let bound = body.bound_variables();
    let body_free = body.free_variables();
    let candidates = ALPHABET
        .filter(|c| !free.contains(c) && !bound.contains(c) && !body_free.contains(c))
        .collect::<BTreeSet<_>>();
    candidates
        .range((Excluded(param), Unbounded))
        .next()
        .or_else(|| candidates.iter().next())
        .copied()
        .filter(|&fresh| fresh != param)
}
