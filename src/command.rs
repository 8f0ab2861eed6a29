//! Delegate commands.

use std::any::Any;

use crate::event::PropertyChangedEvent;
use crate::value::{DynamicObject, Value};

type ExecuteFn = Box<dyn Fn(Option<&Value>) + Send + Sync>;
type CanExecuteFn = Box<dyn Fn(Option<&Value>) -> bool + Send + Sync>;

/// A command backed by closures, exposed to the binding layer as an object
/// property.
///
/// Commands are dynamic objects so that a sealed model can hand them out as
/// plain values; the binding layer downcasts via
/// [`DelegateCommand::from_value`] to invoke them.
pub struct DelegateCommand {
    execute: ExecuteFn,
    can_execute: Option<CanExecuteFn>,
    can_execute_changed: PropertyChangedEvent,
}

impl DelegateCommand {
    /// A command that can always execute.
    pub fn new(execute: impl Fn(Option<&Value>) + Send + Sync + 'static) -> Self {
        Self {
            execute: Box::new(execute),
            can_execute: None,
            can_execute_changed: PropertyChangedEvent::new(),
        }
    }

    /// A command with an execution guard.
    pub fn with_can_execute(
        execute: impl Fn(Option<&Value>) + Send + Sync + 'static,
        can_execute: impl Fn(Option<&Value>) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            execute: Box::new(execute),
            can_execute: Some(Box::new(can_execute)),
            can_execute_changed: PropertyChangedEvent::new(),
        }
    }

    /// Invoke the command.
    pub fn execute(&self, parameter: Option<&Value>) {
        (self.execute)(parameter);
    }

    /// Whether the command may execute. Commands without a guard always may.
    pub fn can_execute(&self, parameter: Option<&Value>) -> bool {
        match &self.can_execute {
            Some(can_execute) => can_execute(parameter),
            None => true,
        }
    }

    /// Tell subscribers the guard's answer may have changed.
    pub fn raise_can_execute_changed(&self) {
        self.can_execute_changed.raise("CanExecute");
    }

    /// Event raised by [`DelegateCommand::raise_can_execute_changed`].
    pub fn can_execute_changed(&self) -> &PropertyChangedEvent {
        &self.can_execute_changed
    }

    /// Downcast a property value back to a command.
    pub fn from_value(value: &Value) -> Option<&DelegateCommand> {
        value.as_object()?.as_any().downcast_ref()
    }
}

impl DynamicObject for DelegateCommand {
    fn type_name(&self) -> &str {
        "DelegateCommand"
    }

    fn read(&self, _property: &str) -> Option<Value> {
        None
    }

    fn change_event(&self) -> Option<&PropertyChangedEvent> {
        Some(&self.can_execute_changed)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
