use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;

use crate::{prelude::*, term::Term};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EvalError {
    #[error("Reduction interrupted")]
    Interrupted,
    #[error("No normal form reached within {0} steps")]
    StepLimitExceeded(usize),
    #[error("Ran out of fresh names while renaming `{binder}`")]
    NamesExhausted { binder: Name },
}
pub type Result<T> = std::result::Result<T, EvalError>;

#[derive(PartialEq, Eq, Debug)]
pub enum Event<'a> {
    Renamed { from: Name, to: Name },
    Reduced { step: usize, term: &'a Term },
}

fn beta(term: &mut Term, renamed: &mut dyn FnMut(Name, Name)) -> Result<bool> {
    let Term::Apply(function, argument) = term else {
        return Ok(false);
    };
    let Term::Abs(param, body) = function.as_mut() else {
        return Ok(false);
    };
    let param = *param;
    let mut body = std::mem::replace(body.as_mut(), Term::Var(param));
    body.substitute(param, argument.as_ref(), renamed)?;
    *term = body;
    Ok(true)
}

pub fn reduce(term: &mut Term, renamed: &mut dyn FnMut(Name, Name)) -> Result<bool> {
    if beta(term, renamed)? {
        return Ok(true);
    }
    match term {
        Term::Var(_) => Ok(false),
        Term::Abs(_, body) => reduce(body, renamed),
        Term::Apply(lhs, rhs) => Ok(reduce(lhs, renamed)? || reduce(rhs, renamed)?),
    }
}

pub struct Evaluator<'a> {
    interrupt: &'a AtomicBool,
    max_steps: Option<usize>,
}

impl<'a> Evaluator<'a> {
    pub fn new(interrupt: &'a AtomicBool) -> Self {
        Self {
            interrupt,
            max_steps: None,
        }
    }

    pub fn with_max_steps(mut self, max_steps: Option<usize>) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn normalize(&self, mut term: Term, mut observe: impl FnMut(Event)) -> Result<Term> {
        let mut steps = 0;
        loop {
            if self.interrupt.load(Ordering::Relaxed) {
                return Err(EvalError::Interrupted);
            }
            if self.max_steps.is_some_and(|limit| steps >= limit) {
                return if term.is_normal() {
                    Ok(term)
                } else {
                    Err(EvalError::StepLimitExceeded(steps))
                };
            }
            let reduced = reduce(&mut term, &mut |from, to| {
                observe(Event::Renamed { from, to })
            })?;
            if !reduced {
                return Ok(term);
            }
            steps += 1;
            observe(Event::Reduced {
                step: steps,
                term: &term,
            });
        }
    }
}

#[cfg(test)]
mod test {
    use std::{sync::Arc, thread, time::Duration};

    use super::*;
    use crate::term::test::{app, lam, v};

    fn step(term: &mut Term) -> Result<bool> {
        reduce(term, &mut |_, _| {})
    }

    fn omega() -> Term {
        let half = lam("x", app([v('x'), v('x')]));
        app([half.clone(), half])
    }

    #[test]
    fn test_beta() {
        let mut term = app([lam("x", app([v('x'), v('x')])), v('y')]);
        assert!(step(&mut term).unwrap());
        assert_eq!(term, app([v('y'), v('y')]));
    }

    #[test]
    fn test_capture_avoiding_reduction() {
        let mut term = app([lam("xy", v('x')), v('y')]);
        assert!(step(&mut term).unwrap());
        assert_eq!(term, lam("z", v('y')));
        assert_eq!(term.to_top_level_string(), "λz.y");
    }

    #[test]
    fn test_leftmost_outermost_first() {
        // (λx.x)((λy.y) z)
        let inner = app([lam("y", v('y')), v('z')]);
        let mut term = app([lam("x", v('x')), inner.clone()]);
        assert!(step(&mut term).unwrap());
        assert_eq!(term, inner);
        assert!(step(&mut term).unwrap());
        assert_eq!(term, v('z'));
        assert!(!step(&mut term).unwrap());
    }

    #[test]
    fn test_function_before_argument() {
        // x ((λa.a) b) ((λc.c) d): the left argument goes first
        let mut term = app([
            v('x'),
            app([lam("a", v('a')), v('b')]),
            app([lam("c", v('c')), v('d')]),
        ]);
        assert!(step(&mut term).unwrap());
        assert_eq!(term, app([v('x'), v('b'), app([lam("c", v('c')), v('d')])]));
    }

    #[test]
    fn test_reduces_under_abstraction() {
        let mut term = lam("f", app([lam("x", v('x')), v('f')]));
        assert!(step(&mut term).unwrap());
        assert_eq!(term, lam("f", v('f')));
    }

    #[test]
    fn test_normal_form_is_fixed_point() {
        let mut term = v('x');
        assert!(!step(&mut term).unwrap());
        let mut term = lam("x", v('x'));
        assert!(!step(&mut term).unwrap());
        assert_eq!(term, lam("x", v('x')));
    }

    #[test]
    fn test_normalize() {
        // (λfx.f (f x)) (λy.y) z
        let twice = lam("fx", app([v('f'), app([v('f'), v('x')])]));
        let term = app([twice, lam("y", v('y')), v('z')]);
        let interrupt = AtomicBool::new(false);
        let result = Evaluator::new(&interrupt).normalize(term, |_| {});
        assert_eq!(result, Ok(v('z')));
    }

    #[test]
    fn test_observer_sees_every_step() {
        let term = app([lam("x", v('x')), app([lam("y", v('y')), v('z')])]);
        let interrupt = AtomicBool::new(false);
        let mut seen = vec![];
        let result = Evaluator::new(&interrupt)
            .normalize(term, |event| {
                if let Event::Reduced { step, term } = event {
                    seen.push((step, term.clone()));
                }
            })
            .unwrap();
        assert_eq!(result, v('z'));
        assert_eq!(
            seen,
            vec![(1, app([lam("y", v('y')), v('z')])), (2, v('z'))]
        );
    }

    #[test]
    fn test_observer_sees_renames() {
        // (λx.λy.x) y
        let term = app([lam("xy", v('x')), v('y')]);
        let interrupt = AtomicBool::new(false);
        let mut events = vec![];
        Evaluator::new(&interrupt)
            .normalize(term, |event| events.push(format!("{event:?}")))
            .unwrap();
        assert_eq!(
            events,
            vec![
                format!("{:?}", Event::Renamed { from: 'y', to: 'z' }),
                format!(
                    "{:?}",
                    Event::Reduced {
                        step: 1,
                        term: &lam("z", v('y'))
                    }
                ),
            ]
        );
    }

    #[test]
    fn test_step_limit() {
        let interrupt = AtomicBool::new(false);
        let evaluator = Evaluator::new(&interrupt).with_max_steps(Some(100));
        assert_eq!(
            evaluator.normalize(omega(), |_| {}),
            Err(EvalError::StepLimitExceeded(100))
        );
        // Reaching normal form exactly at the limit is still a success.
        let evaluator = Evaluator::new(&interrupt).with_max_steps(Some(1));
        assert_eq!(
            evaluator.normalize(app([lam("x", v('x')), v('y')]), |_| {}),
            Ok(v('y'))
        );
    }

    #[test]
    fn test_divergence_is_interruptible() {
        let interrupt = Arc::new(AtomicBool::new(false));
        let flag = interrupt.clone();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            flag.store(true, Ordering::Relaxed);
        });
        let mut steps = 0;
        let result = Evaluator::new(&interrupt).normalize(omega(), |event| {
            if let Event::Reduced { step, term } = event {
                steps = step;
                assert_eq!(term, &omega());
            }
        });
        canceller.join().unwrap();
        assert_eq!(result, Err(EvalError::Interrupted));
        assert!(steps > 0);
    }
}
