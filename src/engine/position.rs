//! Template positions - stable ordering keys for rendered components.
//!
//! A component's position is the path of child indexes from the page root
//! to its `<view>` node. Each block items contribute their live index cell,
//! so a reorder updates positions in place. Sorting by [`Position::key`]
//! gives template order with collection order inside each blocks, no matter
//! in which order the components were created.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

#[derive(Clone, Default)]
pub struct Position {
    segments: Vec<Rc<Cell<usize>>>,
}

impl Position {
    pub fn root() -> Self {
        Self::default()
    }

    /// Position of the `index`th child.
    pub fn child(&self, index: usize) -> Self {
        self.child_cell(Rc::new(Cell::new(index)))
    }

    /// Position whose last segment follows a live cell.
    pub fn child_cell(&self, index: Rc<Cell<usize>>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(index);
        Self { segments }
    }

    /// Current sort key.
    pub fn key(&self) -> Vec<usize> {
        self.segments.iter().map(|segment| segment.get()).collect()
    }
}

impl fmt::Debug for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Position{:?}", self.key())
    }
}
