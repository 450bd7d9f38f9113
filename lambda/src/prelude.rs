use std::rc::Rc;

pub type Name = char;
pub type Identifier = Rc<str>;

pub const ALPHABET: std::ops::RangeInclusive<Name> = 'a'..='z';

pub type Span = std::ops::Range<usize>;
pub fn merge_span(lhs: &Span, rhs: &Span) -> Span {
    std::ops::Range {
        start: std::cmp::min(lhs.start, rhs.start),
        end: std::cmp::max(lhs.end, rhs.end),
    }
}

#[derive(derive_more::Deref, Clone, PartialEq, Eq, Debug)]
pub struct Spanned<T>(#[deref] pub T, pub Span);
impl<T> Spanned<T> {
    pub fn value(&self) -> &T {
        &self.0
    }
    pub fn span(&self) -> Span {
        self.1.clone()
    }
}
impl<T> From<Spanned<T>> for (T, Span) {
    fn from(Spanned(value, span): Spanned<T>) -> Self {
        (value, span)
    }
}
