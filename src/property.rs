//! Property definitions.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::definition::DependencyDefinition;
use crate::dependency::Dependency;
use crate::error::ModelError;
use crate::navigation::PathNavigator;
use crate::value::{Value, ValueKind};

/// Computes a property's current value.
pub type Getter = Arc<dyn Fn() -> Result<Value, ModelError> + Send + Sync>;

/// Writes a property's value through to its backing storage.
pub type Setter = Arc<dyn Fn(Value) -> Result<(), ModelError> + Send + Sync>;

struct PropertyInner {
    name: String,
    kind: ValueKind,
    getter: Option<Getter>,
    setter: Option<Setter>,
    pending: Vec<Arc<dyn DependencyDefinition>>,
    attached: Vec<Box<dyn Dependency>>,
    sealed: bool,
}

/// One model property: a name, a declared kind, accessor closures, and the
/// dependencies its value is computed from.
///
/// Structure (name, accessors, dependency list) is mutable until the owning
/// model is sealed; values remain readable and writable afterwards.
pub struct PropertyDefinition {
    inner: Mutex<PropertyInner>,
}

impl PropertyDefinition {
    /// A property with no accessors and no dependencies.
    pub fn new(name: &str, kind: ValueKind) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(PropertyInner {
                name: name.to_string(),
                kind,
                getter: None,
                setter: None,
                pending: Vec::new(),
                attached: Vec::new(),
                sealed: false,
            }),
        })
    }

    /// The property name.
    pub fn name(&self) -> String {
        self.inner.lock().name.clone()
    }

    /// The declared value kind.
    pub fn value_kind(&self) -> ValueKind {
        self.inner.lock().kind
    }

    /// A property with no setter is read-only.
    pub fn is_read_only(&self) -> bool {
        self.inner.lock().setter.is_none()
    }

    /// Whether the property has been sealed.
    pub fn is_sealed(&self) -> bool {
        self.inner.lock().sealed
    }

    /// Rename the property. Fails once sealed.
    pub fn rename(&self, name: &str) -> Result<&Self, ModelError> {
        let mut inner = self.not_sealed()?;
        inner.name = name.to_string();
        drop(inner);
        Ok(self)
    }

    /// Prefix the property's name. Fails once sealed.
    pub fn with_prefix(&self, prefix: &str) -> Result<&Self, ModelError> {
        let mut inner = self.not_sealed()?;
        inner.name = format!("{prefix}{}", inner.name);
        drop(inner);
        Ok(self)
    }

    /// Drop the setter, making the property read-only. Fails once sealed.
    pub fn make_read_only(&self) -> Result<&Self, ModelError> {
        let mut inner = self.not_sealed()?;
        inner.setter = None;
        drop(inner);
        Ok(self)
    }

    /// Install the getter. Fails once sealed.
    pub fn set_getter(&self, getter: Getter) -> Result<(), ModelError> {
        self.not_sealed()?.getter = Some(getter);
        Ok(())
    }

    /// Install or clear the setter. Fails once sealed.
    pub fn set_setter(&self, setter: Option<Setter>) -> Result<(), ModelError> {
        self.not_sealed()?.setter = setter;
        Ok(())
    }

    /// Read the current value.
    ///
    /// Fails when the property has no getter (a write-only or undeclared
    /// accessor is a programming error, not a runtime condition).
    pub fn get_value(&self) -> Result<Value, ModelError> {
        let getter = self.inner.lock().getter.clone();
        match getter {
            Some(getter) => getter(),
            None => Err(ModelError::WriteOnlyProperty { name: self.name() }),
        }
    }

    /// Write a value. Fails when the property is read-only.
    pub fn set_value(&self, value: Value) -> Result<(), ModelError> {
        let setter = self.inner.lock().setter.clone();
        match setter {
            Some(setter) => setter(value),
            None => Err(ModelError::ReadOnlyProperty { name: self.name() }),
        }
    }

    /// Queue a dependency definition for attachment at seal time. Fails once
    /// sealed.
    pub fn add_dependency(
        &self,
        definition: Arc<dyn DependencyDefinition>,
    ) -> Result<(), ModelError> {
        self.not_sealed()?.pending.push(definition);
        Ok(())
    }

    /// The definitions queued for attachment.
    pub fn pending_dependencies(&self) -> Vec<Arc<dyn DependencyDefinition>> {
        self.inner.lock().pending.clone()
    }

    /// Number of live attached dependencies.
    pub fn attached_dependency_count(&self) -> usize {
        self.inner.lock().attached.len()
    }

    /// Attach every pending definition, wiring each monitor to report changes
    /// under this property's name. Idempotent.
    pub(crate) fn seal(
        &self,
        navigator: &PathNavigator,
        notify: Arc<dyn Fn(&str) + Send + Sync>,
    ) -> Result<(), ModelError> {
        let mut inner = self.inner.lock();
        if inner.sealed {
            return Ok(());
        }
        let name = inner.name.clone();
        let pending = std::mem::take(&mut inner.pending);
        for definition in &pending {
            let dependency = definition.attach(navigator)?;
            let notify = notify.clone();
            let property_name = name.clone();
            dependency.set_reevaluate_callback(Arc::new(move |_element: &Value| {
                notify(&property_name);
            }));
            inner.attached.push(dependency);
        }
        inner.sealed = true;
        Ok(())
    }

    /// Dispose and drop every attached dependency.
    pub(crate) fn release(&self) {
        let attached = std::mem::take(&mut self.inner.lock().attached);
        for dependency in &attached {
            dependency.dispose();
        }
    }

    fn not_sealed(&self) -> Result<parking_lot::MutexGuard<'_, PropertyInner>, ModelError> {
        let inner = self.inner.lock();
        if inner.sealed {
            return Err(ModelError::ModelSealed);
        }
        Ok(inner)
    }
}
