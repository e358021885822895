//! Debug-only reentry check for master sets.
//!
//! A master set runs client callbacks (`hash`, `equal`, `merge`,
//! `validate`) while its canonical map is mutably borrowed. A callback that
//! calls back into the same master set would observe a half-updated chain,
//! so in debug builds such a call panics naming the interrupted operation.
//! In release builds the check compiles to nothing.

#[cfg(debug_assertions)]
use core::cell::Cell;
use core::marker::PhantomData;

#[derive(Debug)]
pub(crate) struct ReentryCheck {
    #[cfg(debug_assertions)]
    active: Cell<Option<&'static str>>,
    // Single-threaded like the master set that owns it.
    _nosend: PhantomData<*mut ()>,
}

impl ReentryCheck {
    pub(crate) const fn new() -> Self {
        Self {
            #[cfg(debug_assertions)]
            active: Cell::new(None),
            _nosend: PhantomData,
        }
    }

    /// Mark `op` as running until the returned guard drops.
    #[inline]
    pub(crate) fn enter(&self, op: &'static str) -> ReentryGuard<'_> {
        #[cfg(debug_assertions)]
        {
            if let Some(outer) = self.active.get() {
                panic!("MasterSet::{op} called from a key strategy callback during MasterSet::{outer}");
            }
            self.active.set(Some(op));
            return ReentryGuard { owner: self };
        }

        #[cfg(not(debug_assertions))]
        {
            let _ = op;
            return ReentryGuard { _z: PhantomData };
        }
    }
}

impl Default for ReentryCheck {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) struct ReentryGuard<'a> {
    #[cfg(debug_assertions)]
    owner: &'a ReentryCheck,
    #[cfg(not(debug_assertions))]
    _z: PhantomData<&'a ()>,
}

impl Drop for ReentryGuard<'_> {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        self.owner.active.set(None);
    }
}
