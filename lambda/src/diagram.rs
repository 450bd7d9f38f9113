use crate::{
    prelude::*,
    term::{Term, TermVisitor},
};

// leftmost and rightmost leaf
type Ports = (usize, usize);

#[derive(Default)]
struct Layout {
    scope: Vec<Name>,
    binders: Vec<usize>,
    // per leaf, how far down its line currently reaches
    depths: Vec<usize>,
    // (level, first leaf, last leaf)
    abstractions: Vec<(usize, usize, usize)>,
    applications: Vec<(usize, usize, usize)>,
}

impl TermVisitor<Ports> for Layout {
    fn visit_var(&mut self, name: Name) -> Ports {
        // Free variables hang from the top edge.
        let level = self.scope.iter().rposition(|n| *n == name).unwrap_or(0);
        let leaf = self.binders.len();
        self.binders.push(level);
        self.depths.push(self.scope.len());
        (leaf, leaf)
    }

    fn visit_abs(&mut self, param: Name, body: &Term) -> Ports {
        let level = self.scope.len();
        let first = self.binders.len();
        self.scope.push(param);
        let ports = body.accept(self);
        self.scope.pop();
        self.abstractions.push((level, first, self.binders.len() - 1));
        ports
    }

    fn visit_apply(&mut self, function: &Term, argument: &Term) -> Ports {
        let (_, left) = function.accept(self);
        let (right, _) = argument.accept(self);
        let level = self.depths[left].max(self.depths[right]);
        self.applications.push((left, right, level));
        self.depths[left] = level + 1;
        self.depths[right] = level + 1;
        (left, right)
    }
}

struct Canvas {
    width: usize,
    cells: Vec<Vec<bool>>,
}

impl Canvas {
    fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            cells: vec![vec![false; width]; height],
        }
    }

    fn hline(&mut self, y: usize, xs: std::ops::RangeInclusive<usize>) {
        for x in xs {
            self.cells[y][x] = true;
        }
    }

    fn vline(&mut self, x: usize, ys: std::ops::Range<usize>) {
        for y in ys {
            self.cells[y][x] = true;
        }
    }

    fn lines(&self) -> impl Iterator<Item = String> + '_ {
        self.cells.chunks(2).map(|rows| {
            let line = (0..self.width)
                .map(|x| {
                    let top = rows[0][x];
                    let bottom = rows.get(1).map_or(false, |row| row[x]);
                    match (top, bottom) {
                        (false, false) => ' ',
                        (true, false) => '▀',
                        (false, true) => '▄',
                        (true, true) => '█',
                    }
                })
                .collect::<String>();
            line.trim_end().to_string()
        })
    }
}

pub fn render(term: &Term, max_width: usize, max_height: usize) -> String {
    let mut layout = Layout::default();
    let (output, _) = term.accept(&mut layout);
    // The output wire of the whole term dangles one level below everything else.
    layout.depths[output] += 1;

    let width = layout.binders.len() * 4;
    let height = layout.depths.iter().copied().max().unwrap_or(0) * 2;
    let mut canvas = Canvas::new(width, height);
    for (leaf, (&binder, &depth)) in layout.binders.iter().zip(&layout.depths).enumerate() {
        canvas.vline(leaf * 4 + 1, binder * 2..(depth * 2).saturating_sub(1));
    }
    for &(level, first, last) in &layout.abstractions {
        canvas.hline(level * 2, first * 4..=last * 4 + 2);
    }
    for &(left, right, level) in &layout.applications {
        canvas.hline(level * 2, left * 4 + 1..=right * 4 + 1);
    }

    canvas
        .lines()
        .take(max_height)
        .map(|line| line.chars().take(max_width).collect::<String>())
        .collect::<Vec<_>>()
        .join("\n")
}
