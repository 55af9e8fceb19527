//! The renderable-object capability set and the display stack.
//!
//! A display is anything the scene can draw, pick and select. Composite
//! displays own their sub-displays as plain fields; nested components are
//! separate displays reached through `components`, so the scene can flatten
//! the whole tree into an ordered stack once and replay it every frame.

use std::cell::RefCell;
use std::rc::Rc;

use glam::Mat4;

use crate::error::Result;
use crate::scene::{Frame, Scene};

/// Rendering pass a stack entry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pass {
    /// Visible frame
    Screen,
    /// Offscreen picking
    Ident,
}

/// A display's declaration of participation in one pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackSlot {
    pub pass: Pass,
    /// Lower draws first; solids before overlays, overlays before markers
    pub priority: i32,
}

pub const PRIORITY_SOLID: i32 = 1;
pub const PRIORITY_ANNOTATION: i32 = 2;
pub const PRIORITY_MARKER: i32 = 3;

/// Input event routed to the display under the cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    Click,
    DoubleClick,
    Hover,
}

pub type DisplayHandle = Rc<RefCell<dyn Display>>;

/// Capability set of every renderable object
pub trait Display {
    /// Draw into the current screen target
    fn render(&mut self, frame: &Frame);

    /// Draw idents into the bound ident target, offset by `start_ident`;
    /// returns the number of distinct idents this display contributes.
    /// Callers must thread a monotonically increasing, non-overlapping
    /// offset across all displays of one pass.
    fn identify(&mut self, _frame: &Frame, _start_ident: u32) -> u32 {
        0
    }

    /// React to an input event on one of this display's elements. `group`
    /// is the stack entry that produced the hit.
    fn control(&mut self, _frame: &Frame, _group: u32, _ident: u32, _event: ControlEvent) {}

    /// Set the selection state of the given ident groups
    fn select(&mut self, _idents: &[u32], _state: bool) {}

    fn selected(&self, _ident: u32) -> bool {
        false
    }

    /// Passes this display participates in
    fn stack(&self) -> Vec<StackSlot> {
        vec![
            StackSlot { pass: Pass::Screen, priority: PRIORITY_SOLID },
            StackSlot { pass: Pass::Ident, priority: PRIORITY_SOLID },
        ]
    }

    /// Nested displays rendered through their own stack entries
    fn components(&self) -> Vec<DisplayHandle> {
        Vec::new()
    }

    /// Object pose, re-derived per frame for space-anchored components
    fn set_world(&mut self, _world: Mat4) {}
}

/// Deferred display construction: lets geometry be declared before the GL
/// context and scene exist.
pub trait Displayable {
    fn display(&self, scene: &mut Scene) -> Result<DisplayHandle>;
}

// ── Stack flattening and ordering ────────────────────────────

/// One scheduled draw of the flattened display tree
#[derive(Clone)]
pub struct StackEntry {
    /// Index path from the scene roots to the display
    pub scope: Vec<usize>,
    pub pass: Pass,
    pub priority: i32,
    /// Declaration order, the tie-break for equal priorities
    pub seq: u32,
    pub target: DisplayHandle,
}

/// Flatten a display tree into stack entries, traversal order preserved
pub fn flatten_stack(displays: &[DisplayHandle]) -> Vec<StackEntry> {
    let mut entries = Vec::new();
    let mut seq = 0;
    for (i, handle) in displays.iter().enumerate() {
        visit(handle, &[i], &mut entries, &mut seq);
    }
    entries
}

fn visit(handle: &DisplayHandle, scope: &[usize], entries: &mut Vec<StackEntry>, seq: &mut u32) {
    let (slots, children) = {
        let display = handle.borrow();
        (display.stack(), display.components())
    };
    for slot in slots {
        entries.push(StackEntry {
            scope: scope.to_vec(),
            pass: slot.pass,
            priority: slot.priority,
            seq: *seq,
            target: handle.clone(),
        });
        *seq += 1;
    }
    for (i, child) in children.iter().enumerate() {
        let mut child_scope = scope.to_vec();
        child_scope.push(i);
        visit(child, &child_scope, entries, seq);
    }
}

/// Indices of the entries of one pass, in execution order: ascending
/// priority, declaration order breaking ties.
pub fn pass_order(entries: &[StackEntry], pass: Pass) -> Vec<usize> {
    let mut order: Vec<usize> = (0..entries.len())
        .filter(|&i| entries[i].pass == pass)
        .collect();
    order.sort_by_key(|&i| (entries[i].priority, entries[i].seq));
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Probe {
        priority: i32,
        children: Vec<DisplayHandle>,
    }

    impl Probe {
        fn handle(priority: i32) -> DisplayHandle {
            Rc::new(RefCell::new(Probe { priority, children: Vec::new() }))
        }

        fn with_children(priority: i32, children: Vec<DisplayHandle>) -> DisplayHandle {
            Rc::new(RefCell::new(Probe { priority, children }))
        }
    }

    impl Display for Probe {
        fn render(&mut self, _frame: &Frame) {}

        fn stack(&self) -> Vec<StackSlot> {
            vec![
                StackSlot { pass: Pass::Screen, priority: self.priority },
                StackSlot { pass: Pass::Ident, priority: self.priority },
            ]
        }

        fn components(&self) -> Vec<DisplayHandle> {
            self.children.clone()
        }
    }

    #[test]
    fn priority_order_is_stable() {
        // A(2), B(1), C(2), D(0) must execute D, B, A, C.
        // Each probe declares a screen and an ident slot, so screen slots
        // carry the even seq numbers: A=0, B=2, C=4, D=6.
        let displays = vec![
            Probe::handle(2),
            Probe::handle(1),
            Probe::handle(2),
            Probe::handle(0),
        ];
        let entries = flatten_stack(&displays);
        let order = pass_order(&entries, Pass::Screen);
        let seqs: Vec<u32> = order.iter().map(|&i| entries[i].seq).collect();
        assert_eq!(seqs, vec![6, 2, 0, 4]);
    }

    #[test]
    fn passes_are_partitioned() {
        let displays = vec![Probe::handle(1), Probe::handle(2)];
        let entries = flatten_stack(&displays);
        assert_eq!(entries.len(), 4);
        assert_eq!(pass_order(&entries, Pass::Screen).len(), 2);
        assert_eq!(pass_order(&entries, Pass::Ident).len(), 2);
    }

    #[test]
    fn components_recurse_with_scope() {
        let root = Probe::with_children(1, vec![Probe::handle(5)]);
        let entries = flatten_stack(&[root]);
        assert_eq!(entries.len(), 4);
        let leaf_entries: Vec<_> = entries.iter().filter(|e| e.scope == vec![0, 0]).collect();
        assert_eq!(leaf_entries.len(), 2);
        // lower priority puts the root ahead of its component
        let order = pass_order(&entries, Pass::Screen);
        assert_eq!(entries[order[0]].scope, vec![0]);
        assert_eq!(entries[order[1]].scope, vec![0, 0]);
    }
}
