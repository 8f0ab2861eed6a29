//! The dynamic value and object model that expressions and bindings flow over.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::event::PropertyChangedEvent;

/// Shared handle to a dynamic object.
pub type ObjectRef = Arc<dyn DynamicObject>;

/// A weakly-typed runtime value.
///
/// `Object` values compare by reference identity; everything else compares
/// structurally. Clone is cheap for objects and lists (both are `Arc`-backed).
#[derive(Clone)]
pub enum Value {
    /// The absent value. Member access over `Null` terminates a chain.
    Null,
    /// A boolean.
    Bool(bool),
    /// A 64-bit integer.
    Int(i64),
    /// A 64-bit float.
    Float(f64),
    /// A string.
    Str(String),
    /// A dynamic object.
    Object(ObjectRef),
    /// An ordered list of values.
    List(Arc<Vec<Value>>),
}

impl Value {
    /// Returns `true` for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the object handle if this is an object value.
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Returns the string slice if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(text) => Some(text),
            _ => None,
        }
    }

    /// Returns the integer if this is an integer value.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(number) => Some(*number),
            _ => None,
        }
    }

    /// Returns the boolean if this is a boolean value.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(flag) => Some(*flag),
            _ => None,
        }
    }

    /// The kind tag of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Any,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::Str(_) => ValueKind::Str,
            Value::Object(_) => ValueKind::Object,
            Value::List(_) => ValueKind::List,
        }
    }

    /// Short kind name, used in operator error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Object(_) => "object",
            Value::List(_) => "list",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::List(a), Value::List(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(flag) => write!(f, "{flag}"),
            Value::Int(number) => write!(f, "{number}"),
            Value::Float(number) => write!(f, "{number}"),
            Value::Str(text) => write!(f, "{text:?}"),
            Value::Object(object) => write!(f, "{}", object.type_name()),
            Value::List(items) => f.debug_list().entries(items.iter()).finish(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(flag) => write!(f, "{flag}"),
            Value::Int(number) => write!(f, "{number}"),
            Value::Float(number) => write!(f, "{number}"),
            Value::Str(text) => write!(f, "{text}"),
            Value::Object(object) => write!(f, "{}", object.type_name()),
            Value::List(items) => {
                write!(f, "[")?;
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(flag: bool) -> Self {
        Value::Bool(flag)
    }
}

impl From<i64> for Value {
    fn from(number: i64) -> Self {
        Value::Int(number)
    }
}

impl From<i32> for Value {
    fn from(number: i32) -> Self {
        Value::Int(number as i64)
    }
}

impl From<f64> for Value {
    fn from(number: f64) -> Self {
        Value::Float(number)
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::Str(text.to_string())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Value::Str(text)
    }
}

impl From<ObjectRef> for Value {
    fn from(object: ObjectRef) -> Self {
        Value::Object(object)
    }
}

impl<T: DynamicObject + 'static> From<Arc<T>> for Value {
    fn from(object: Arc<T>) -> Self {
        Value::Object(object)
    }
}

/// Kind tags for declared property types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// No declared type.
    Any,
    /// Boolean.
    Bool,
    /// Integer.
    Int,
    /// Float.
    Float,
    /// String.
    Str,
    /// Dynamic object.
    Object,
    /// List of values.
    List,
    /// Command object.
    Command,
}

/// An introspectable object with string-named properties.
///
/// This trait is the substrate that stands in for the reflective object model
/// of a managed runtime: property reads and writes go through string names,
/// and objects that support change notification expose their event through
/// [`DynamicObject::change_event`]. Objects that return `None` there are
/// treated as inert values by the dependency machinery.
pub trait DynamicObject: Send + Sync {
    /// The object's type name. Dependency definitions and operator error
    /// messages identify objects by this name rather than by identity.
    fn type_name(&self) -> &str;

    /// Read a property value, or `None` if the object has no such property.
    fn read(&self, property: &str) -> Option<Value>;

    /// Write a property value. Returns `false` if the property does not
    /// exist or refuses writes.
    fn write(&self, property: &str, value: Value) -> bool {
        let _ = (property, value);
        false
    }

    /// The names of the object's properties, in a stable order.
    fn property_names(&self) -> Vec<String> {
        Vec::new()
    }

    /// The object's change-notification event, if it publishes one.
    fn change_event(&self) -> Option<&PropertyChangedEvent> {
        None
    }

    /// Downcasting support.
    fn as_any(&self) -> &dyn Any;
}

/// A dictionary-backed dynamic object.
///
/// `Record` is the generic stand-in for application business objects: a named
/// bag of string-keyed values that raises a change notification whenever one
/// of them is stored. [`Record::silent`] builds a variant with no change
/// event, which the closure pre-evaluator treats as a captured environment.
pub struct Record {
    type_name: String,
    values: Mutex<Vec<(String, Value)>>,
    changed: Option<PropertyChangedEvent>,
}

impl Record {
    /// Create an observable record.
    pub fn new(type_name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            type_name: type_name.into(),
            values: Mutex::new(Vec::new()),
            changed: Some(PropertyChangedEvent::new()),
        })
    }

    /// Create a record with no change notification.
    pub fn silent(type_name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            type_name: type_name.into(),
            values: Mutex::new(Vec::new()),
            changed: None,
        })
    }

    /// Store a value and raise a change notification for the property.
    ///
    /// A notification is raised on every call, whether or not the stored
    /// value differs from the previous one.
    pub fn set(&self, property: &str, value: impl Into<Value>) {
        let value = value.into();
        {
            let mut values = self.values.lock();
            match values.iter_mut().find(|(name, _)| name == property) {
                Some(entry) => entry.1 = value,
                None => values.push((property.to_string(), value)),
            }
        }
        if let Some(changed) = &self.changed {
            changed.raise(property);
        }
    }

    /// Read a stored value.
    pub fn get(&self, property: &str) -> Option<Value> {
        let values = self.values.lock();
        values
            .iter()
            .find(|(name, _)| name == property)
            .map(|(_, value)| value.clone())
    }
}

impl DynamicObject for Record {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn read(&self, property: &str) -> Option<Value> {
        self.get(property)
    }

    fn write(&self, property: &str, value: Value) -> bool {
        self.set(property, value);
        true
    }

    fn property_names(&self) -> Vec<String> {
        self.values.lock().iter().map(|(name, _)| name.clone()).collect()
    }

    fn change_event(&self) -> Option<&PropertyChangedEvent> {
        self.changed.as_ref()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::event::ChangeHandler;

    use super::*;

    #[test]
    fn record_stores_and_notifies() {
        let record = Record::new("Customer");
        let count = Arc::new(AtomicUsize::new(0));

        let counter = count.clone();
        let handler: Arc<ChangeHandler> = Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let event = record.change_event().unwrap();
        let _subscription = event.subscribe(&handler);

        record.set("FirstName", "Paul");
        assert_eq!(record.get("FirstName"), Some(Value::from("Paul")));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn silent_record_has_no_event() {
        let record = Record::silent("Environment");
        record.set("captured", 1);
        assert!(record.change_event().is_none());
        assert_eq!(record.get("captured"), Some(Value::Int(1)));
    }

    #[test]
    fn property_names_keep_insertion_order() {
        let record = Record::new("Customer");
        record.set("FirstName", "Paul");
        record.set("LastName", "Stovell");
        record.set("FirstName", "Jack");
        assert_eq!(record.property_names(), vec!["FirstName", "LastName"]);
    }

    #[test]
    fn object_values_compare_by_identity() {
        let a = Record::new("Customer");
        let b = Record::new("Customer");
        assert_eq!(Value::from(a.clone()), Value::from(a.clone()));
        assert_ne!(Value::from(a), Value::from(b));
    }
}
