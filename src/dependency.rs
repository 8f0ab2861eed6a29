//! Live dependency instances.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::navigation::{ChangeCallback, PathNavigator, Token};
use crate::value::{ObjectRef, Value};

/// Callback for whole-value re-evaluation: the monitored chain changed
/// somewhere, so the owning property's computed value may have changed.
pub type ReevaluateCallback = Arc<dyn Fn(&Value) + Send + Sync>;

/// Callback for element-level re-evaluation, used by collection-scoped
/// dependencies where a single element's property changed.
pub type ElementCallback = Arc<dyn Fn(&Value, &str) + Send + Sync>;

/// A live monitor linking a model property to values it is computed from.
pub trait Dependency: Send + Sync {
    /// Set the element-level callback. Dependencies without per-element
    /// granularity ignore this slot.
    fn set_reevaluate_element_callback(&self, callback: ElementCallback);

    /// Set the whole-value callback.
    fn set_reevaluate_callback(&self, callback: ReevaluateCallback);

    /// Tear down the monitor chain.
    fn dispose(&self);
}

/// A dependency on a captured external object, monitored through a token
/// chain over its property path.
pub struct ExternalDependency {
    root: Option<Arc<dyn Token>>,
    reevaluate: Arc<Mutex<Option<ReevaluateCallback>>>,
}

impl ExternalDependency {
    /// Attach a monitor for `path` on `target`.
    pub fn new(target: &ObjectRef, path: &str, navigator: &PathNavigator) -> Self {
        let reevaluate: Arc<Mutex<Option<ReevaluateCallback>>> = Arc::new(Mutex::new(None));
        let slot = reevaluate.clone();
        let callback: ChangeCallback = Arc::new(move |element: &Value, _path: &str| {
            let callback = slot.lock().clone();
            if let Some(callback) = callback {
                callback(element);
            }
        });
        let root = navigator.resolve(Some(Value::Object(target.clone())), path, callback);
        Self { root, reevaluate }
    }
}

impl Dependency for ExternalDependency {
    /// External objects require the entire value to be re-evaluated, so the
    /// element-level slot is ignored.
    fn set_reevaluate_element_callback(&self, _callback: ElementCallback) {}

    fn set_reevaluate_callback(&self, callback: ReevaluateCallback) {
        *self.reevaluate.lock() = Some(callback);
    }

    fn dispose(&self) {
        if let Some(root) = &self.root {
            root.dispose();
        }
    }
}

impl Drop for ExternalDependency {
    fn drop(&mut self) {
        self.dispose();
    }
}
