//! Descent path recorded by insert and remove for the upward rebalancing pass.

/// Upper bound on tree height.
///
/// The sparsest AVL tree of height 48 holds `F(50) - 1` nodes, more than
/// the `u32` slot index space can address, so no reachable tree is deeper.
pub(crate) const MAX_DEPTH: usize = 48;

/// Which child a descent step took.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Dir {
    Left,
    Right,
}

impl Dir {
    /// Change in `height(right) - height(left)` when this side grows by one.
    #[inline]
    pub(crate) fn grow_delta(self) -> i8 {
        match self {
            Dir::Left => -1,
            Dir::Right => 1,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Step {
    pub(crate) node: u32,
    pub(crate) dir: Dir,
}

/// Fixed-capacity stack of [`Step`]s, kept on the call stack.
pub(crate) struct Path {
    steps: [Step; MAX_DEPTH],
    len: usize,
}

impl Path {
    #[inline]
    pub(crate) fn new() -> Self {
        Self {
            steps: [Step { node: 0, dir: Dir::Left }; MAX_DEPTH],
            len: 0,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub(crate) fn push(&mut self, node: u32, dir: Dir) {
        assert!(self.len < MAX_DEPTH, "descent path exceeds {} levels", MAX_DEPTH);
        self.steps[self.len] = Step { node, dir };
        self.len += 1;
    }

    #[inline]
    pub(crate) fn pop(&mut self) -> Option<Step> {
        if self.len == 0 {
            return None;
        }
        self.len -= 1;
        Some(self.steps[self.len])
    }

    /// Innermost recorded step, i.e. the parent link of whatever the caller
    /// is currently looking at.
    #[inline]
    pub(crate) fn top(&self) -> Option<Step> {
        self.len.checked_sub(1).map(|i| self.steps[i])
    }

    /// Step at `depth`, counted from the root.
    #[inline]
    pub(crate) fn get(&self, depth: usize) -> Option<Step> {
        if depth < self.len {
            Some(self.steps[depth])
        } else {
            None
        }
    }

    /// Overwrite the step at `depth`.
    #[inline]
    pub(crate) fn set(&mut self, depth: usize, node: u32, dir: Dir) {
        debug_assert!(depth < self.len);
        self.steps[depth] = Step { node, dir };
    }
}
