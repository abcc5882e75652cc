//! Nesting guard to keep deeply nested input from overflowing the stack.

use std::cell::Cell;
use std::rc::Rc;

/// Maximum nesting of expressions, types and blocks before the parser gives
/// up on a file.
///
/// Parsing and checking run on threads sized for this depth; callers that
/// parse on their own thread need a matching stack.
pub const MAX_NEST_DEPTH: usize = 10_000;

/// RAII guard that tracks recursion depth.
///
/// Decrements the shared depth on drop.
///
/// ```ignore
/// fn parse_unary(p: &mut Parser) -> Expr {
///     let Some(_guard) = p.nest() else { return Expr::bad(p.pos()) };
///     // ... recursive parsing ...
/// }
/// ```
pub struct DepthGuard {
    depth: Rc<Cell<usize>>,
}

impl DepthGuard {
    /// Enter one level. `None` when the limit is reached; the depth is left
    /// unchanged in that case.
    pub fn new(depth: Rc<Cell<usize>>) -> Option<Self> {
        let level = depth.get() + 1;
        if level > MAX_NEST_DEPTH {
            return None;
        }
        depth.set(level);
        Some(DepthGuard { depth })
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        self.depth.set(self.depth.get() - 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_guard_within_limit() {
        let depth = Rc::new(Cell::new(0));
        {
            let _g1 = DepthGuard::new(Rc::clone(&depth)).unwrap();
            let _g2 = DepthGuard::new(Rc::clone(&depth)).unwrap();
            assert_eq!(depth.get(), 2);
        }
        assert_eq!(depth.get(), 0);
    }

    #[test]
    fn test_depth_guard_exceeds_limit() {
        let depth = Rc::new(Cell::new(MAX_NEST_DEPTH));
        assert!(DepthGuard::new(Rc::clone(&depth)).is_none());
        assert_eq!(depth.get(), MAX_NEST_DEPTH);
    }
}
