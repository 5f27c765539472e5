//! Binding scopes - ownership of everything a rendered subtree registered.
//!
//! Every subtree rendered in live mode gets a [`BindingScope`]. Bindings
//! put their model subscriptions in it, components put their destroy hook
//! in it, and structural regions open child scopes for their branches and
//! items. Stopping a scope tears all of that down, children first.
//!
//! ```ignore
//! let scope = BindingScope::new();
//! scope.track(model.subscribe("open", |_| Ok(())));
//! scope.on_dispose(|| tracing::debug!("gone"));
//! scope.stop(); // unsubscribes, then runs the callback
//! ```

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::model::Subscription;

/// Teardown callback registered on a scope.
pub type Cleanup = Box<dyn FnOnce()>;

#[derive(Default)]
struct ScopeInner {
    stopped: Cell<bool>,
    cleanups: RefCell<Vec<Cleanup>>,
    children: RefCell<Vec<BindingScope>>,
}

/// Shared handle to a teardown scope. Clones refer to the same scope.
#[derive(Clone, Default)]
pub struct BindingScope {
    inner: Rc<ScopeInner>,
}

impl fmt::Debug for BindingScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingScope")
            .field("stopped", &self.inner.stopped.get())
            .field("cleanups", &self.inner.cleanups.borrow().len())
            .field("children", &self.inner.children.borrow().len())
            .finish()
    }
}

impl BindingScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a scope that stops when this one stops.
    ///
    /// A child of a stopped scope starts out stopped.
    pub fn child(&self) -> BindingScope {
        let child = BindingScope::new();
        if self.is_stopped() {
            child.inner.stopped.set(true);
            return child;
        }
        let mut children = self.inner.children.borrow_mut();
        children.retain(|existing| !existing.is_stopped());
        children.push(child.clone());
        child
    }

    /// Run `cleanup` when the scope stops. Runs it now if already stopped.
    pub fn on_dispose(&self, cleanup: impl FnOnce() + 'static) {
        if self.is_stopped() {
            cleanup();
        } else {
            self.inner.cleanups.borrow_mut().push(Box::new(cleanup));
        }
    }

    /// Unsubscribe `subscription` when the scope stops.
    pub fn track(&self, subscription: Subscription) {
        self.on_dispose(move || subscription.unsubscribe());
    }

    /// Stop child scopes (newest first), then run cleanups in reverse
    /// registration order. Stopping twice does nothing.
    pub fn stop(&self) {
        if self.inner.stopped.replace(true) {
            return;
        }
        let children = std::mem::take(&mut *self.inner.children.borrow_mut());
        for child in children.iter().rev() {
            child.stop();
        }
        // Cleanups may register more cleanups; those run immediately since
        // the scope is already marked stopped.
        let cleanups = std::mem::take(&mut *self.inner.cleanups.borrow_mut());
        for cleanup in cleanups.into_iter().rev() {
            cleanup();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Model;

    #[test]
    fn test_cleanups_run_in_reverse() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let scope = BindingScope::new();
        for i in 0..3 {
            let log = log.clone();
            scope.on_dispose(move || log.borrow_mut().push(i));
        }
        scope.stop();
        assert_eq!(*log.borrow(), vec![2, 1, 0]);
    }

    #[test]
    fn test_children_stop_before_parent_cleanups() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let parent = BindingScope::new();
        let child = parent.child();

        let parent_log = log.clone();
        parent.on_dispose(move || parent_log.borrow_mut().push("parent"));
        let child_log = log.clone();
        child.on_dispose(move || child_log.borrow_mut().push("child"));

        parent.stop();
        assert!(child.is_stopped());
        assert_eq!(*log.borrow(), vec!["child", "parent"]);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let count = Rc::new(Cell::new(0));
        let scope = BindingScope::new();
        let counter = count.clone();
        scope.on_dispose(move || counter.set(counter.get() + 1));
        scope.stop();
        scope.stop();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_on_dispose_after_stop_runs_immediately() {
        let scope = BindingScope::new();
        scope.stop();
        let ran = Rc::new(Cell::new(false));
        let flag = ran.clone();
        scope.on_dispose(move || flag.set(true));
        assert!(ran.get());
        assert!(scope.child().is_stopped());
    }

    #[test]
    fn test_track_unsubscribes() {
        let model = Model::new();
        let scope = BindingScope::new();
        scope.track(model.subscribe("a", |_| Ok(())));
        assert_eq!(model.subscription_count(), 1);
        scope.stop();
        assert_eq!(model.subscription_count(), 0);
    }

    #[test]
    fn test_stopped_children_are_pruned() {
        let parent = BindingScope::new();
        for _ in 0..5 {
            parent.child().stop();
        }
        let _live = parent.child();
        assert_eq!(parent.inner.children.borrow().len(), 1);
    }
}
