use std::sync::{atomic::AtomicBool, atomic::Ordering, Arc};

use thiserror::Error;

use crate::{
    environment::Environment,
    evaluator::{self, EvalError, Evaluator, Event},
    parser::{self, ParseError, Statement},
    prelude::*,
    term::Term,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Eval(#[from] EvalError),
}
pub type Result<T> = std::result::Result<T, Error>;

#[derive(PartialEq, Eq, Debug)]
pub enum Outcome {
    Bound(Identifier),
    Evaluated(Term),
    Nothing,
}

#[derive(Default)]
pub struct Session {
    env: Environment,
    interrupt: Arc<AtomicBool>,
    max_steps: Option<usize>,
}

impl Session {
    pub fn new(max_steps: Option<usize>) -> Self {
        Self {
            max_steps,
            ..Self::default()
        }
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        self.interrupt.clone()
    }

    pub fn parse(&self, input: &str) -> Result<Term> {
        Ok(parser::parse_term(input, &self.env)?)
    }

    pub fn normalize(&self, term: Term, observe: impl FnMut(Event)) -> Result<Term> {
        self.interrupt.store(false, Ordering::Relaxed);
        let evaluator = Evaluator::new(&self.interrupt).with_max_steps(self.max_steps);
        Ok(evaluator.normalize(term, observe)?)
    }

    /// `None` when the term was already in normal form.
    pub fn step(&mut self, input: &str) -> Result<Option<Term>> {
        let mut term = self.parse(input)?;
        if !evaluator::reduce(&mut term, &mut |_, _| {})? {
            return Ok(None);
        }
        self.env.set_last_result(term.clone());
        Ok(Some(term))
    }

    pub fn execute(&mut self, input: &str, observe: impl FnMut(Event)) -> Result<Outcome> {
        match parser::parse_statement(input, &self.env)? {
            Statement::Bind(name, term) => {
                self.env.set_last_result(term.clone());
                self.env.bind(name.clone(), term);
                Ok(Outcome::Bound(name))
            }
            Statement::Evaluate(term) => {
                let term = self.normalize(term, observe)?;
                self.env.set_last_result(term.clone());
                Ok(Outcome::Evaluated(term))
            }
            Statement::Empty => Ok(Outcome::Nothing),
        }
    }
}

#[cfg(test)]
mod test {
    use std::{thread, time::Duration};

    use super::*;
    use crate::term::test::{app, lam, v};

    fn run(session: &mut Session, input: &str) -> Result<Outcome> {
        session.execute(input, |_| {})
    }

    fn evaluated(session: &mut Session, input: &str) -> Term {
        match run(session, input) {
            Ok(Outcome::Evaluated(term)) => term,
            other => panic!("`{input}` gave {other:?}"),
        }
    }

    #[test]
    fn test_successor_of_one() {
        let mut session = Session::default();
        assert_eq!(
            run(&mut session, "ONE := λfx.f x"),
            Ok(Outcome::Bound("ONE".into()))
        );
        run(&mut session, "INC := λnfx.f (n f x)").unwrap();
        run(&mut session, "TWO := λfx.f (f x)").unwrap();
        let result = evaluated(&mut session, "INC ONE");
        assert!(result.alpha_eq(&session.environment().get("TWO").unwrap()));
        assert_eq!(result.to_top_level_string(), "λf.λx.f(f x)");
    }

    #[test]
    fn test_blank_lines_are_ignored() {
        let mut session = Session::default();
        run(&mut session, "ID := λx.x").unwrap();
        for line in ["", "   ", "\t", " \t  "] {
            assert_eq!(run(&mut session, line), Ok(Outcome::Nothing));
        }
        assert_eq!(session.environment().last_result(), Some(lam("x", v('x'))));
    }

    #[test]
    fn test_alpha_equivalent_results() {
        let mut session = Session::default();
        let x = evaluated(&mut session, "λx.x");
        let y = evaluated(&mut session, "(λz.z) (λy.y)");
        assert!(x.alpha_eq(&y));
    }

    #[test]
    fn test_capture_is_avoided() {
        let mut session = Session::default();
        assert_eq!(evaluated(&mut session, "(λxy.x) y"), lam("z", v('y')));
    }

    #[test]
    fn test_arithmetic() {
        let mut session = Session::default();
        for line in [
            "ZERO := λfx.x",
            "INC := λnfx.f (n f x)",
            "PLUS := λmn.m INC n",
            "MULT := λmnf.m (n f)",
            "TWO := INC (INC ZERO)",
            "THREE := INC TWO",
        ] {
            run(&mut session, line).unwrap();
        }
        let six = evaluated(&mut session, "MULT TWO THREE");
        let five = evaluated(&mut session, "PLUS TWO THREE");
        let church = |n: usize| {
            lam("fx", (0..n).fold(v('x'), |acc, _| app([v('f'), acc])))
        };
        assert!(six.alpha_eq(&church(6)));
        assert!(five.alpha_eq(&church(5)));
    }

    #[test]
    fn test_booleans_and_pairs() {
        let mut session = Session::default();
        for line in [
            "TRUE := λxy.x",
            "FALSE := λxy.y",
            "NOT := λp.p FALSE TRUE",
            "PAIR := λxyf.f x y",
            "SECOND := λp.p FALSE",
        ] {
            run(&mut session, line).unwrap();
        }
        let t = evaluated(&mut session, "NOT (NOT TRUE)");
        assert!(t.alpha_eq(&lam("xy", v('x'))));
        assert_eq!(evaluated(&mut session, "SECOND (PAIR a b)"), v('b'));
    }

    #[test]
    fn test_last_result() {
        let mut session = Session::default();
        assert_eq!(
            run(&mut session, "_"),
            Err(Error::Parse(ParseError::UnboundResultReference { span: 0..1 }))
        );
        evaluated(&mut session, "λx.x");
        assert_eq!(evaluated(&mut session, "_ y"), v('y'));
        assert_eq!(evaluated(&mut session, "_"), v('y'));
        run(&mut session, "K := λab.a").unwrap();
        assert_eq!(session.environment().last_result(), Some(lam("ab", v('a'))));
    }

    #[test]
    fn test_bind_does_not_reduce() {
        let mut session = Session::default();
        run(&mut session, "R := (λx.x) y").unwrap();
        assert_eq!(
            session.environment().get("R"),
            Some(app([lam("x", v('x')), v('y')]))
        );
    }

    #[test]
    fn test_errors_leave_environment_untouched() {
        let mut session = Session::default();
        run(&mut session, "ID := λx.x").unwrap();
        assert!(matches!(
            run(&mut session, "ID := λx.NOPE"),
            Err(Error::Parse(ParseError::UndefinedMacro { .. }))
        ));
        assert!(matches!(
            run(&mut session, "bad := λx.x"),
            Err(Error::Parse(ParseError::InvalidMacroName { .. }))
        ));
        assert_eq!(session.environment().get("ID"), Some(lam("x", v('x'))));
        assert_eq!(session.environment().last_result(), Some(lam("x", v('x'))));
        assert_eq!(run(&mut session, ""), Ok(Outcome::Nothing));
    }

    #[test]
    fn test_divergence_is_cancelled_cleanly() {
        let mut session = Session::default();
        run(&mut session, "OMEGA := (λx.x x)(λx.x x)").unwrap();
        let before = session.environment().last_result();

        let flag = session.interrupt_flag();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            flag.store(true, Ordering::Relaxed);
        });
        assert_eq!(
            run(&mut session, "OMEGA"),
            Err(Error::Eval(EvalError::Interrupted))
        );
        canceller.join().unwrap();

        assert_eq!(session.environment().last_result(), before);
        assert_eq!(evaluated(&mut session, "(λx.x) z"), v('z'));
    }

    #[test]
    fn test_single_steps() {
        let mut session = Session::default();
        assert_eq!(
            session.step("(λx.x) ((λy.y) z)"),
            Ok(Some(app([lam("y", v('y')), v('z')])))
        );
        assert_eq!(session.step("_"), Ok(Some(v('z'))));
        assert_eq!(session.step("_"), Ok(None));
        assert_eq!(session.environment().last_result(), Some(v('z')));
    }

    #[test]
    fn test_step_limit() {
        let mut session = Session::new(Some(10));
        assert_eq!(
            run(&mut session, "(λx.x x)(λx.x x)"),
            Err(Error::Eval(EvalError::StepLimitExceeded(10)))
        );
    }
}
