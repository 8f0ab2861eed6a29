//! Process-wide property accessor cache.
//!
//! Token chains re-read path segment values on every change notification, so
//! accessor resolution is memoized once per `(type name, property name)` pair
//! for the lifetime of the process. The map is append-only and lock-free;
//! concurrent model construction from multiple threads is safe. A benign race
//! on first resolution may build two readers, one of which wins the insert.
//!
//! [`register_reader`] installs a specialized accessor ahead of first
//! resolution, for types whose property reads should not go through
//! [`DynamicObject::read`].

use std::sync::{Arc, OnceLock};

use crate::value::{DynamicObject, Value};

/// Reads one property from a dynamic object.
pub trait PropertyReader: Send + Sync {
    /// Read the property value from `target`, or `None` if the target has no
    /// such property.
    fn read(&self, target: &dyn DynamicObject) -> Option<Value>;
}

struct DynamicReader {
    property: String,
}

impl PropertyReader for DynamicReader {
    fn read(&self, target: &dyn DynamicObject) -> Option<Value> {
        target.read(&self.property)
    }
}

type ReaderMap = papaya::HashMap<String, Arc<dyn PropertyReader>, ahash::RandomState>;

static READERS: OnceLock<ReaderMap> = OnceLock::new();

fn readers() -> &'static ReaderMap {
    READERS.get_or_init(|| papaya::HashMap::with_hasher(ahash::RandomState::new()))
}

fn cache_key(type_name: &str, property: &str) -> String {
    format!("{type_name}-{property}")
}

/// Resolve the accessor for `property` on objects of type `type_name`,
/// memoizing the result process-wide.
pub fn reader_for(type_name: &str, property: &str) -> Arc<dyn PropertyReader> {
    let key = cache_key(type_name, property);
    let map = readers();
    let pinned = map.pin();
    if let Some(reader) = pinned.get(&key) {
        return reader.clone();
    }
    let reader: Arc<dyn PropertyReader> = Arc::new(DynamicReader {
        property: property.to_string(),
    });
    pinned.insert(key, reader.clone());
    reader
}

/// Install a specialized accessor for a `(type name, property name)` pair.
///
/// Replaces any previously cached reader for the pair.
pub fn register_reader(type_name: &str, property: &str, reader: Arc<dyn PropertyReader>) {
    readers().pin().insert(cache_key(type_name, property), reader);
}
