//! Path navigation: live monitor chains over dotted property paths.
//!
//! A [`PathNavigator`] resolves `(target, "A.B.C")` into a chain of
//! [`Token`]s, one per path segment. Each token subscribes to its current
//! target's change event, reads the segment value through the process-wide
//! accessor cache, and owns the token for the remainder of the path resolved
//! against that value. When a segment's value is replaced at runtime the
//! token discards and rebuilds its downstream chain against the new value,
//! then reports the change upward.
//!
//! A missing target (absent or `Null`) resolves to no token at all; the chain
//! silently ends there and is re-resolved the next time the owning segment
//! changes. This is the expected shape for partially-populated object graphs,
//! not an error.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::event::{ChangeHandler, Subscription};
use crate::reader::{reader_for, PropertyReader};
use crate::value::Value;

/// Callback invoked when a monitored path changes: receives the token's
/// current target and the dot-joined name of what changed beneath it.
pub type ChangeCallback = Arc<dyn Fn(&Value, &str) + Send + Sync>;

/// One link in a live monitor chain.
///
/// Tokens are chained: each owns the monitor for the remainder of its path,
/// resolved against the current value of its own segment.
pub trait Token: Send + Sync {
    /// Re-point the token at a new target, unsubscribing from the previous
    /// one and re-resolving the remaining path against the new target.
    fn acquire_target(&self, target: Option<Value>);

    /// The next token in the chain, if the remaining path is resolvable.
    fn next(&self) -> Option<Arc<dyn Token>>;

    /// Unsubscribe and cascade disposal down the chain.
    fn dispose(&self);
}

/// Builds tokens for one kind of target.
pub trait TokenFactory: Send + Sync {
    /// Build a token monitoring `path` on `target`, or `None` if this factory
    /// does not handle the target.
    fn parse_next(
        &self,
        target: &Value,
        path: &str,
        callback: ChangeCallback,
        navigator: &PathNavigator,
    ) -> Option<Arc<dyn Token>>;
}

/// Resolves property paths into token chains by probing its factories in
/// order.
///
/// Cheap to clone; clones share the factory list.
#[derive(Clone)]
pub struct PathNavigator {
    factories: Arc<Vec<Box<dyn TokenFactory>>>,
}

impl PathNavigator {
    /// A navigator using the given factories, probed in order.
    pub fn new(factories: Vec<Box<dyn TokenFactory>>) -> Self {
        Self {
            factories: Arc::new(factories),
        }
    }

    /// The standard navigator: member tokens only.
    pub fn standard() -> Self {
        Self::new(vec![Box::new(MemberTokenFactory)])
    }

    /// Resolve `path` against `target`, producing the root of a token chain.
    ///
    /// An absent or `Null` target resolves to `None`.
    pub fn resolve(
        &self,
        target: Option<Value>,
        path: &str,
        callback: ChangeCallback,
    ) -> Option<Arc<dyn Token>> {
        let target = target.filter(|value| !value.is_null())?;
        self.factories
            .iter()
            .find_map(|factory| factory.parse_next(&target, path, callback.clone(), self))
    }
}

impl Default for PathNavigator {
    fn default() -> Self {
        Self::standard()
    }
}

/// Token factory for member-access segments.
pub struct MemberTokenFactory;

impl TokenFactory for MemberTokenFactory {
    fn parse_next(
        &self,
        target: &Value,
        path: &str,
        callback: ChangeCallback,
        navigator: &PathNavigator,
    ) -> Option<Arc<dyn Token>> {
        let (name, remaining) = match path.find('.') {
            Some(index) => (&path[..index], Some(path[index + 1..].to_string())),
            None => (path, None),
        };
        Some(MemberToken::spawn(
            target.clone(),
            name.to_string(),
            remaining,
            callback,
            navigator.clone(),
        ))
    }
}

#[derive(Default)]
struct TokenState {
    current_target: Option<Value>,
    subscription: Option<Subscription>,
    reader: Option<Arc<dyn PropertyReader>>,
    next: Option<Arc<dyn Token>>,
    disposed: bool,
}

/// Monitors one property-path segment on one currently-resolved object.
///
/// An empty segment name is the whole-object monitor: it matches every
/// change notification on its target and reports the incoming name.
pub struct MemberToken {
    property_name: String,
    remaining_path: Option<String>,
    callback: ChangeCallback,
    navigator: PathNavigator,
    // The registry holds the handler weakly; this is the only strong
    // reference, so an undisposed chain self-detaches when dropped.
    handler: Arc<ChangeHandler>,
    weak: Weak<MemberToken>,
    state: Mutex<TokenState>,
}

impl MemberToken {
    pub(crate) fn spawn(
        target: Value,
        property_name: String,
        remaining_path: Option<String>,
        callback: ChangeCallback,
        navigator: PathNavigator,
    ) -> Arc<dyn Token> {
        let token = Arc::new_cyclic(|weak: &Weak<MemberToken>| {
            let on_change = weak.clone();
            let handler: Arc<ChangeHandler> = Arc::new(move |property: &str| {
                if let Some(token) = on_change.upgrade() {
                    token.target_property_changed(property);
                }
            });
            MemberToken {
                property_name,
                remaining_path,
                callback,
                navigator,
                handler,
                weak: weak.clone(),
                state: Mutex::new(TokenState::default()),
            }
        });
        token.acquire_target(Some(target));
        token
    }

    /// The monitored segment name.
    pub fn property_name(&self) -> &str {
        &self.property_name
    }

    /// The path left to monitor beyond this segment.
    pub fn remaining_path(&self) -> Option<&str> {
        self.remaining_path.as_deref()
    }

    fn resolve_remainder(&self, value: Option<Value>) -> Option<Arc<dyn Token>> {
        let remaining = self.remaining_path.as_deref()?;
        let bubble = self.weak.clone();
        let callback: ChangeCallback = Arc::new(move |_element: &Value, name: &str| {
            if let Some(token) = bubble.upgrade() {
                token.downstream_changed(name);
            }
        });
        self.navigator.resolve(value, remaining, callback)
    }

    fn target_property_changed(&self, property: &str) {
        if self.property_name.is_empty() || property == self.property_name {
            self.handle_current_target_changed(property);
        }
    }

    /// Re-read the segment value, rebuild the downstream chain, then report.
    ///
    /// The callback runs after the state lock is released so it may freely
    /// read back through the chain.
    fn handle_current_target_changed(&self, changed: &str) {
        let reported = if self.property_name.is_empty() {
            changed.to_string()
        } else {
            self.property_name.clone()
        };
        let target = {
            let mut state = self.state.lock();
            if state.disposed {
                return;
            }
            let value = match (&state.current_target, &state.reader) {
                (Some(Value::Object(object)), Some(reader)) => reader.read(object.as_ref()),
                _ => None,
            };
            let next = self.resolve_remainder(value);
            if let Some(old) = state.next.take() {
                old.dispose();
            }
            state.next = next;
            state.current_target.clone()
        };
        if let Some(target) = target {
            (self.callback)(&target, &reported);
        }
    }

    fn downstream_changed(&self, name: &str) {
        let target = {
            let state = self.state.lock();
            if state.disposed {
                return;
            }
            state.current_target.clone()
        };
        if let Some(target) = target {
            (self.callback)(&target, &format!("{}.{}", self.property_name, name));
        }
    }
}

impl Token for MemberToken {
    fn acquire_target(&self, target: Option<Value>) {
        let mut state = self.state.lock();
        if state.disposed {
            return;
        }
        // Dropping the old subscription unsubscribes from the previous
        // target before the new one is monitored.
        state.subscription = None;
        state.reader = None;
        state.current_target = target.filter(|value| !value.is_null());
        let next = match &state.current_target {
            Some(Value::Object(object)) => {
                if let Some(event) = object.change_event() {
                    state.subscription = Some(event.subscribe(&self.handler));
                }
                if !self.property_name.is_empty() {
                    state.reader = Some(reader_for(object.type_name(), &self.property_name));
                }
                let value = state
                    .reader
                    .as_ref()
                    .and_then(|reader| reader.read(object.as_ref()));
                self.resolve_remainder(value)
            }
            _ => None,
        };
        if let Some(old) = state.next.take() {
            old.dispose();
        }
        state.next = next;
    }

    fn next(&self) -> Option<Arc<dyn Token>> {
        self.state.lock().next.clone()
    }

    fn dispose(&self) {
        let next = {
            let mut state = self.state.lock();
            if state.disposed {
                return;
            }
            state.disposed = true;
            state.subscription = None;
            state.reader = None;
            state.current_target = None;
            state.next.take()
        };
        if let Some(next) = next {
            next.dispose();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::value::Record;

    use super::*;

    fn counting_callback() -> (ChangeCallback, Arc<Mutex<Vec<String>>>) {
        let names = Arc::new(Mutex::new(Vec::new()));
        let seen = names.clone();
        let callback: ChangeCallback = Arc::new(move |_target: &Value, name: &str| {
            seen.lock().push(name.to_string());
        });
        (callback, names)
    }

    #[test]
    fn missing_target_resolves_to_no_token() {
        let navigator = PathNavigator::standard();
        let (callback, _) = counting_callback();
        assert!(navigator.resolve(None, "Name", callback.clone()).is_none());
        assert!(navigator
            .resolve(Some(Value::Null), "Name", callback)
            .is_none());
    }

    #[test]
    fn single_segment_reports_matching_changes_only() {
        let customer = Record::new("Customer");
        customer.set("Name", "Paul");
        let navigator = PathNavigator::standard();
        let (callback, names) = counting_callback();
        let token = navigator
            .resolve(Some(Value::from(customer.clone())), "Name", callback)
            .unwrap();

        customer.set("Name", "Jack");
        customer.set("Other", 1);
        assert_eq!(*names.lock(), vec!["Name"]);
        token.dispose();
    }

    #[test]
    fn chain_is_rebuilt_when_an_intermediate_segment_changes() {
        let inner = Record::new("Inner");
        inner.set("C", 1);
        let outer = Record::new("Outer");
        outer.set("B", Value::from(inner.clone()));

        let navigator = PathNavigator::standard();
        let (callback, names) = counting_callback();
        let token = navigator
            .resolve(Some(Value::from(outer.clone())), "B.C", callback)
            .unwrap();
        assert!(token.next().is_some());

        let replacement = Record::new("Inner");
        replacement.set("C", 2);
        outer.set("B", Value::from(replacement.clone()));
        assert_eq!(*names.lock(), vec!["B"]);

        // The old subtree is detached; only the replacement is monitored.
        inner.set("C", 3);
        assert_eq!(*names.lock(), vec!["B"]);
        replacement.set("C", 4);
        assert_eq!(*names.lock(), vec!["B", "B.C"]);
        token.dispose();
    }

    #[test]
    fn null_intermediate_terminates_silently_and_recovers() {
        let outer = Record::new("Outer");
        outer.set("B", Value::Null);

        let navigator = PathNavigator::standard();
        let (callback, names) = counting_callback();
        let token = navigator
            .resolve(Some(Value::from(outer.clone())), "B.C", callback)
            .unwrap();
        assert!(token.next().is_none());

        let inner = Record::new("Inner");
        inner.set("C", 1);
        outer.set("B", Value::from(inner.clone()));
        assert_eq!(*names.lock(), vec!["B"]);
        assert!(token.next().is_some());

        inner.set("C", 2);
        assert_eq!(*names.lock(), vec!["B", "B.C"]);
        token.dispose();
    }

    #[test]
    fn empty_path_matches_any_property() {
        let customer = Record::new("Customer");
        let navigator = PathNavigator::standard();
        let (callback, names) = counting_callback();
        let token = navigator
            .resolve(Some(Value::from(customer.clone())), "", callback)
            .unwrap();

        customer.set("Name", "Paul");
        customer.set("Age", 23);
        assert_eq!(*names.lock(), vec!["Name", "Age"]);
        token.dispose();
    }

    #[test]
    fn dispose_cascades_and_unsubscribes() {
        let inner = Record::new("Inner");
        inner.set("C", 1);
        let outer = Record::new("Outer");
        outer.set("B", Value::from(inner.clone()));

        let navigator = PathNavigator::standard();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let callback: ChangeCallback = Arc::new(move |_target: &Value, _name: &str| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let token = navigator
            .resolve(Some(Value::from(outer.clone())), "B.C", callback)
            .unwrap();

        token.dispose();
        outer.set("B", Value::Null);
        inner.set("C", 2);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(outer.change_event().unwrap().subscriber_count(), 0);
        assert_eq!(inner.change_event().unwrap().subscriber_count(), 0);
    }

    #[test]
    fn dropping_the_chain_detaches_without_explicit_disposal() {
        let customer = Record::new("Customer");
        customer.set("Name", "Paul");
        let navigator = PathNavigator::standard();
        let (callback, names) = counting_callback();
        let token = navigator
            .resolve(Some(Value::from(customer.clone())), "Name", callback)
            .unwrap();

        drop(token);
        customer.set("Name", "Jack");
        assert!(names.lock().is_empty());
        assert_eq!(customer.change_event().unwrap().subscriber_count(), 0);
    }
}
