//! Model Adapter - Path-scoped access to an observable JSON store.
//!
//! The engine consumes only `get`, `set`, and `subscribe`. A [`Model`] is a
//! cheap handle onto a shared store, rooted at some path; every path given to
//! a handle is relative to that root.
//!
//! # Notification
//!
//! Subscriptions are an explicit path-keyed table. A write at path P calls
//! every listener whose path is P, an ancestor of P, or a descendant of P
//! (see [`path::affects`]). The cascade is synchronous: `set` returns only
//! after every listener, and every write those listeners perform, is done.
//!
//! Listeners removed while a cascade is running are never called, even if
//! they matched the write that started it.
//!
//! ```ignore
//! let model = Model::new();
//! let sub = model.subscribe("open", |_| Ok(()));
//! model.set("open", true)?;
//! sub.unsubscribe();
//! ```

pub mod path;

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use serde_json::Value;

use crate::error::{ViewError, ViewResult};

/// Callback run when a subscribed path changes. Receives the changed absolute path.
pub type Listener = Rc<dyn Fn(&str) -> ViewResult<()>>;

struct Store {
    root: RefCell<Value>,
    listeners: RefCell<BTreeMap<u64, (String, Listener)>>,
    next_id: Cell<u64>,
}

/// Handle onto a shared observable store, scoped at a path.
#[derive(Clone)]
pub struct Model {
    store: Rc<Store>,
    at: String,
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model").field("at", &self.at).finish()
    }
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}

impl Model {
    /// Create an empty store and return a handle at its root.
    pub fn new() -> Self {
        Self::with_data(Value::Null)
    }

    /// Create a store holding `data`.
    pub fn with_data(data: Value) -> Self {
        Self {
            store: Rc::new(Store {
                root: RefCell::new(data),
                listeners: RefCell::new(BTreeMap::new()),
                next_id: Cell::new(0),
            }),
            at: String::new(),
        }
    }

    /// Absolute path this handle is rooted at.
    pub fn path(&self) -> &str {
        &self.at
    }

    /// Handle rooted at `path` relative to this one.
    pub fn scope(&self, path: &str) -> Model {
        Model {
            store: self.store.clone(),
            at: self.absolute(path),
        }
    }

    /// Handle at the store root.
    pub fn root(&self) -> Model {
        Model {
            store: self.store.clone(),
            at: String::new(),
        }
    }

    /// Whether two handles share a store.
    pub fn same_store(&self, other: &Model) -> bool {
        Rc::ptr_eq(&self.store, &other.store)
    }

    /// Absolute store path for `path` under this handle.
    pub fn absolute(&self, path: &str) -> String {
        path::join(&self.at, path)
    }

    /// Current value at `path`, or `Value::Null` when absent.
    pub fn get(&self, path: &str) -> Value {
        let root = self.store.root.borrow();
        path::lookup(&root, &self.absolute(path))
            .cloned()
            .unwrap_or(Value::Null)
    }

    /// Write `value` at `path` and notify affected listeners.
    ///
    /// Writing the value already present is a no-op. Returns the first
    /// listener error of the cascade; later listeners still run.
    pub fn set(&self, path: &str, value: impl Into<Value>) -> ViewResult<()> {
        let absolute = self.absolute(path);
        let value = value.into();
        let changed = {
            let mut root = self.store.root.borrow_mut();
            let slot = path::slot_mut(&mut root, &absolute).ok_or_else(|| {
                ViewError::InvalidPath {
                    path: absolute.clone(),
                }
            })?;
            if *slot == value {
                false
            } else {
                *slot = value;
                true
            }
        };
        if changed {
            self.store.notify(&absolute)
        } else {
            Ok(())
        }
    }

    /// Remove the value at `path`, returning it.
    pub fn del(&self, path: &str) -> ViewResult<Value> {
        let absolute = self.absolute(path);
        let removed = path::take(&mut self.store.root.borrow_mut(), &absolute);
        match removed {
            Some(value) => {
                self.store.notify(&absolute)?;
                Ok(value)
            }
            None => Ok(Value::Null),
        }
    }

    /// Append to the array at `path` (creating it), returning the new length.
    pub fn push(&self, path: &str, value: impl Into<Value>) -> ViewResult<usize> {
        let value = value.into();
        let len = self.with_array(path, |items| {
            items.push(value);
            items.len()
        })?;
        Ok(len)
    }

    /// Insert into the array at `path`. Indexes past the end append.
    pub fn insert(&self, path: &str, index: usize, value: impl Into<Value>) -> ViewResult<()> {
        let value = value.into();
        self.with_array(path, |items| {
            let index = index.min(items.len());
            items.insert(index, value);
        })
    }

    /// Remove one element from the array at `path`.
    pub fn remove(&self, path: &str, index: usize) -> ViewResult<Option<Value>> {
        self.with_array(path, |items| {
            (index < items.len()).then(|| items.remove(index))
        })
    }

    /// Move one element of the array at `path` from `from` to `to`.
    pub fn move_item(&self, path: &str, from: usize, to: usize) -> ViewResult<()> {
        self.with_array(path, |items| {
            if from < items.len() {
                let item = items.remove(from);
                let to = to.min(items.len());
                items.insert(to, item);
            }
        })
    }

    fn with_array<R>(&self, path: &str, f: impl FnOnce(&mut Vec<Value>) -> R) -> ViewResult<R> {
        let absolute = self.absolute(path);
        let result = {
            let mut root = self.store.root.borrow_mut();
            let invalid = || ViewError::InvalidPath {
                path: absolute.clone(),
            };
            let slot = path::slot_mut(&mut root, &absolute).ok_or_else(invalid)?;
            if slot.is_null() {
                *slot = Value::Array(Vec::new());
            }
            match slot {
                Value::Array(items) => f(items),
                _ => return Err(invalid()),
            }
        };
        self.store.notify(&absolute)?;
        Ok(result)
    }

    /// Subscribe `listener` to changes at, above, or below `path`.
    pub fn subscribe(
        &self,
        path: &str,
        listener: impl Fn(&str) -> ViewResult<()> + 'static,
    ) -> Subscription {
        let id = self.store.next_id.get();
        self.store.next_id.set(id + 1);
        self.store
            .listeners
            .borrow_mut()
            .insert(id, (self.absolute(path), Rc::new(listener)));
        Subscription {
            store: Rc::downgrade(&self.store),
            id,
        }
    }

    /// Number of live subscriptions on the whole store.
    pub fn subscription_count(&self) -> usize {
        self.store.listeners.borrow().len()
    }
}

impl Store {
    fn notify(&self, changed: &str) -> ViewResult<()> {
        // Snapshot ids: listeners may subscribe or unsubscribe while we run.
        let ids: Vec<u64> = self
            .listeners
            .borrow()
            .iter()
            .filter(|(_, (subscribed, _))| path::affects(subscribed, changed))
            .map(|(id, _)| *id)
            .collect();

        let mut first_error = None;
        for id in ids {
            let listener = self
                .listeners
                .borrow()
                .get(&id)
                .map(|(_, listener)| listener.clone());
            let Some(listener) = listener else { continue };
            if let Err(err) = listener(changed) {
                tracing::error!(path = changed, error = %err, "listener failed during update");
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// Handle to one listener. Dropping it does not unsubscribe.
#[derive(Debug, Clone)]
pub struct Subscription {
    store: Weak<Store>,
    id: u64,
}

impl Subscription {
    /// Remove the listener. Safe to call more than once.
    pub fn unsubscribe(&self) {
        if let Some(store) = self.store.upgrade() {
            store.listeners.borrow_mut().remove(&self.id);
        }
    }

    /// Whether the listener is still registered.
    pub fn is_active(&self) -> bool {
        self.store
            .upgrade()
            .is_some_and(|store| store.listeners.borrow().contains_key(&self.id))
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("listeners", &self.listeners.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_set() {
        let model = Model::new();
        assert_eq!(model.get("open"), Value::Null);
        model.set("open", true).unwrap();
        assert_eq!(model.get("open"), json!(true));
    }

    #[test]
    fn test_scoped_handles_share_store() {
        let model = Model::new();
        let scoped = model.scope("_components.c0");
        scoped.set("expression", "happy").unwrap();
        assert_eq!(model.get("_components.c0.expression"), json!("happy"));
        assert_eq!(scoped.path(), "_components.c0");
        assert!(scoped.same_store(&model));
    }

    #[test]
    fn test_subscribe_fires_on_related_paths() {
        let model = Model::new();
        let hits = Rc::new(RefCell::new(Vec::new()));
        let hits_clone = hits.clone();
        let _sub = model.subscribe("user", move |changed| {
            hits_clone.borrow_mut().push(changed.to_string());
            Ok(())
        });

        model.set("user.name", "ada").unwrap();
        model.set("other", 1).unwrap();
        model.set("user", json!({"name": "grace"})).unwrap();

        assert_eq!(*hits.borrow(), vec!["user.name", "user"]);
    }

    #[test]
    fn test_same_value_does_not_notify() {
        let model = Model::new();
        let count = Rc::new(Cell::new(0));
        let count_clone = count.clone();
        let _sub = model.subscribe("open", move |_| {
            count_clone.set(count_clone.get() + 1);
            Ok(())
        });

        model.set("open", true).unwrap();
        model.set("open", true).unwrap();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_unsubscribe() {
        let model = Model::new();
        let count = Rc::new(Cell::new(0));
        let count_clone = count.clone();
        let sub = model.subscribe("open", move |_| {
            count_clone.set(count_clone.get() + 1);
            Ok(())
        });
        assert!(sub.is_active());
        sub.unsubscribe();
        sub.unsubscribe();
        assert!(!sub.is_active());

        model.set("open", true).unwrap();
        assert_eq!(count.get(), 0);
        assert_eq!(model.subscription_count(), 0);
    }

    #[test]
    fn test_unsubscribed_during_cascade_is_skipped() {
        let model = Model::new();
        let late_calls = Rc::new(Cell::new(0));

        let victim: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let victim_clone = victim.clone();
        let _first = model.subscribe("flag", move |_| {
            if let Some(sub) = victim_clone.borrow().as_ref() {
                sub.unsubscribe();
            }
            Ok(())
        });
        let late_clone = late_calls.clone();
        *victim.borrow_mut() = Some(model.subscribe("flag", move |_| {
            late_clone.set(late_clone.get() + 1);
            Ok(())
        }));

        model.set("flag", true).unwrap();
        assert_eq!(late_calls.get(), 0);
    }

    #[test]
    fn test_listener_may_write_model() {
        let model = Model::new();
        let writer = model.clone();
        let _sub = model.subscribe("first", move |_| writer.set("second", 2));
        model.set("first", 1).unwrap();
        assert_eq!(model.get("second"), json!(2));
    }

    #[test]
    fn test_listener_error_returned_after_cascade() {
        let model = Model::new();
        let ran = Rc::new(Cell::new(false));
        let ran_clone = ran.clone();
        let _failing = model.subscribe("x", |_| {
            Err(ViewError::UnknownView {
                is: "missing".to_string(),
            })
        });
        let _after = model.subscribe("x", move |_| {
            ran_clone.set(true);
            Ok(())
        });

        assert!(matches!(model.set("x", 1), Err(ViewError::UnknownView { .. })));
        assert!(ran.get());
    }

    #[test]
    fn test_array_operations() {
        let model = Model::new();
        assert_eq!(model.push("items", "a").unwrap(), 1);
        model.push("items", "c").unwrap();
        model.insert("items", 1, "b").unwrap();
        assert_eq!(model.get("items"), json!(["a", "b", "c"]));

        model.move_item("items", 0, 2).unwrap();
        assert_eq!(model.get("items"), json!(["b", "c", "a"]));

        assert_eq!(model.remove("items", 1).unwrap(), Some(json!("c")));
        assert_eq!(model.remove("items", 9).unwrap(), None);
        assert_eq!(model.get("items"), json!(["b", "a"]));
    }

    #[test]
    fn test_del() {
        let model = Model::with_data(json!({"a": {"b": 1}}));
        assert_eq!(model.del("a.b").unwrap(), json!(1));
        assert_eq!(model.del("a.b").unwrap(), Value::Null);
        assert_eq!(model.get("a"), json!({}));
    }

    #[test]
    fn test_invalid_path() {
        let model = Model::with_data(json!({"title": "x"}));
        assert!(matches!(
            model.set("title.length", 1),
            Err(ViewError::InvalidPath { .. })
        ));
        assert!(model.push("title", 1).is_err());
    }

    #[test]
    fn test_out_of_range_index_is_invalid() {
        let model = Model::with_data(json!({"items": [1]}));
        assert!(matches!(
            model.set("items.18446744073709551615", 1),
            Err(ViewError::InvalidPath { .. })
        ));
        assert!(model.set("items.5", 1).is_err());
        model.set("items.1", 2).unwrap();
        assert_eq!(model.get("items"), json!([1, 2]));
    }
}
