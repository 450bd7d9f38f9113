use std::rc::Rc;

use rpds::RedBlackTreeMap;

use crate::{prelude::*, term::Term};

#[derive(Default, Clone, Debug)]
pub struct Environment {
    macros: RedBlackTreeMap<Identifier, Rc<Term>>,
    last_result: Option<Rc<Term>>,
}

impl Environment {
    pub fn get(&self, name: &str) -> Option<Term> {
        self.macros.get(name).map(|term| term.as_ref().clone())
    }

    pub fn last_result(&self) -> Option<Term> {
        self.last_result.as_deref().cloned()
    }

    pub fn bind(&mut self, name: Identifier, term: Term) {
        self.macros = self.macros.insert(name, term.into());
    }

    pub fn set_last_result(&mut self, term: Term) {
        self.last_result = Some(term.into());
    }

    pub fn macros(&self) -> impl Iterator<Item = (&Identifier, &Term)> {
        self.macros.iter().map(|(name, term)| (name, term.as_ref()))
    }
}
