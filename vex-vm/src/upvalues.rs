//! Open/closed upvalue cells (spec.md §4.7, §9: "upvalue open/closed
//! cells"). While a frame is live, a captured variable is an `Open(slot)`
//! pointing at the shared value stack; once the frame returns the cell is
//! closed, copying the value out so it outlives the stack slot. Two
//! closures capturing the same enclosing local share one cell, so `open`
//! is kept sorted by stack slot and deduplicated on lookup, mirroring
//! clox's `openUpvalues` linked list.

use std::cell::RefCell;
use std::rc::Rc;

use vex_bytecode::{Upvalue, Value};

#[derive(Default)]
pub struct OpenUpvalues {
    /// Kept sorted descending by slot index, as clox keeps its linked list,
    /// so closing "from this slot up" is a simple prefix scan.
    entries: Vec<(usize, Rc<RefCell<Upvalue>>)>,
}

impl OpenUpvalues {
    pub fn find_or_create(&mut self, slot: usize) -> Rc<RefCell<Upvalue>> {
        if let Some((_, cell)) = self.entries.iter().find(|(s, _)| *s == slot) {
            return Rc::clone(cell);
        }
        let cell = Rc::new(RefCell::new(Upvalue::Open(slot)));
        let pos = self.entries.iter().position(|(s, _)| *s < slot).unwrap_or(self.entries.len());
        self.entries.insert(pos, (slot, Rc::clone(&cell)));
        cell
    }

    /// Closes every open cell at or above `from_slot`, copying the current
    /// stack value into the cell and dropping it from the open list. Called
    /// when a frame returns or a block scope holding captured locals ends.
    pub fn close_from(&mut self, from_slot: usize, stack: &[Value]) {
        self.entries.retain(|(slot, cell)| {
            if *slot >= from_slot {
                let value = stack.get(*slot).cloned().unwrap_or(Value::Nil);
                *cell.borrow_mut() = Upvalue::Closed(value);
                false
            } else {
                true
            }
        });
    }
}
