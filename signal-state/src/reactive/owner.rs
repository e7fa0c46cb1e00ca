//! Owning contexts.
//!
//! An [`Owner`] keeps effects alive and collects teardown callbacks for
//! anything else bound to a context's lifetime (spawned tasks, external
//! subscriptions). Disposing the owner, explicitly or by dropping it, stops
//! every effect and runs every callback exactly once.

use parking_lot::Mutex;

use super::effect::Effect;

type Cleanup = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct OwnerState {
    disposed: bool,
    effects: Vec<Effect>,
    cleanups: Vec<Cleanup>,
}

/// A reactive owning context.
#[derive(Default)]
pub struct Owner {
    state: Mutex<OwnerState>,
}

impl Owner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep `effect` alive until this owner is disposed.
    ///
    /// An effect adopted by an already disposed owner is disposed at once.
    pub fn adopt(&self, effect: Effect) {
        let mut state = self.state.lock();
        if state.disposed {
            drop(state);
            effect.dispose();
            return;
        }
        state.effects.push(effect);
    }

    /// Run `cleanup` when this owner is disposed.
    ///
    /// Runs immediately if the owner is already disposed.
    pub fn on_dispose(&self, cleanup: impl FnOnce() + Send + 'static) {
        let mut state = self.state.lock();
        if state.disposed {
            drop(state);
            cleanup();
            return;
        }
        state.cleanups.push(Box::new(cleanup));
    }

    /// Dispose every adopted effect and run every cleanup.
    ///
    /// Later calls are no-ops.
    pub fn dispose(&self) {
        let (effects, cleanups) = {
            let mut state = self.state.lock();
            if state.disposed {
                return;
            }
            state.disposed = true;
            (
                std::mem::take(&mut state.effects),
                std::mem::take(&mut state.cleanups),
            )
        };

        for effect in &effects {
            effect.dispose();
        }
        for cleanup in cleanups {
            cleanup();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }

    /// Number of effects currently kept alive.
    pub fn effect_count(&self) -> usize {
        self.state.lock().effects.len()
    }
}

impl Drop for Owner {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for Owner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Owner")
            .field("disposed", &state.disposed)
            .field("effects", &state.effects.len())
            .field("cleanups", &state.cleanups.len())
            .finish()
    }
}
