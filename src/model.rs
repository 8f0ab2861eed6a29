//! Models: ordered property registries with a sealing state machine.

use std::any::Any;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::analysis::ExpressionAnalyzer;
use crate::collection::{CollectionDefinition, ModelFactory};
use crate::command::DelegateCommand;
use crate::definition::ExternalDependencyDefinition;
use crate::error::{EvalError, ModelError};
use crate::eval::{evaluate_closures, SafeEvaluator};
use crate::event::PropertyChangedEvent;
use crate::expr::Expr;
use crate::extension::{DuplicateNameValidation, ModelExtension};
use crate::navigation::PathNavigator;
use crate::property::{PropertyDefinition, Setter};
use crate::tracer::{NoopTracer, Tracer};
use crate::value::{DynamicObject, ObjectRef, Value, ValueKind};

/// The one-directional sealing states of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SealState {
    /// Properties and extensions may be added and removed.
    Open,
    /// The extension set is fixed; properties may still be added.
    ExtensionsSealed,
    /// Structure is immutable and dependencies are attached.
    Sealed,
}

struct ModelInner {
    state: SealState,
    properties: Vec<Arc<PropertyDefinition>>,
    extensions: Vec<Arc<dyn ModelExtension>>,
}

/// A model: an insertion-ordered set of property definitions, an extension
/// set, and an aggregate change-notification event.
///
/// Models start open, accumulate properties and extensions, then [`seal`]
/// once: extensions run in priority order, every property's pending
/// dependency definitions attach into live monitors, and structure freezes.
/// A sealed model is itself a [`DynamicObject`], so it can serve as a
/// collection element or nested binding target.
///
/// [`seal`]: Model::seal
pub struct Model {
    type_name: String,
    analyzer: ExpressionAnalyzer,
    navigator: PathNavigator,
    tracer: Arc<dyn Tracer>,
    changed: PropertyChangedEvent,
    declared_extensions: Vec<Arc<dyn ModelExtension>>,
    inner: Mutex<ModelInner>,
}

impl Model {
    /// A model with the default configuration and the built-in validation
    /// extension.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// A builder for customizing the model.
    pub fn builder() -> ModelBuilder {
        ModelBuilder::new()
    }

    /// The model's type name, as reported to the binding layer.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// The current sealing state.
    pub fn state(&self) -> SealState {
        self.inner.lock().state
    }

    /// Whether the model is fully sealed.
    pub fn is_sealed(&self) -> bool {
        self.state() == SealState::Sealed
    }

    /// The aggregate property-changed event.
    pub fn changed(&self) -> &PropertyChangedEvent {
        &self.changed
    }

    /// Raise the aggregate change notification for `property`.
    pub fn raise_property_changed(&self, property: &str) {
        self.tracer.on_property_changed(property);
        self.changed.raise(property);
    }

    /// The declared properties, in declaration order.
    pub fn properties(&self) -> Vec<Arc<PropertyDefinition>> {
        self.inner.lock().properties.clone()
    }

    /// Find a property by name.
    pub fn find_property(&self, name: &str) -> Option<Arc<PropertyDefinition>> {
        self.inner
            .lock()
            .properties
            .iter()
            .find(|property| property.name() == name)
            .cloned()
    }

    /// The registered extensions.
    pub fn extensions(&self) -> Vec<Arc<dyn ModelExtension>> {
        self.inner.lock().extensions.clone()
    }

    /// Add a property definition. Fails once the model is sealed; extensions
    /// may still add properties while they apply.
    pub fn add_property(&self, property: Arc<PropertyDefinition>) -> Result<(), ModelError> {
        let mut inner = self.inner.lock();
        if inner.state == SealState::Sealed {
            return Err(ModelError::ModelSealed);
        }
        inner.properties.push(property);
        Ok(())
    }

    /// Remove a property by identity. Removing a property that is not present
    /// is a no-op.
    pub fn remove_property(&self, property: &Arc<PropertyDefinition>) -> Result<(), ModelError> {
        let mut inner = self.inner.lock();
        if inner.state == SealState::Sealed {
            return Err(ModelError::ModelSealed);
        }
        inner
            .properties
            .retain(|existing| !Arc::ptr_eq(existing, property));
        Ok(())
    }

    /// Register an extension. Adding the same extension reference twice is a
    /// no-op; adding after the extension set is sealed fails.
    pub fn add_extension(&self, extension: Arc<dyn ModelExtension>) -> Result<(), ModelError> {
        let mut inner = self.extensions_open()?;
        if !inner
            .extensions
            .iter()
            .any(|existing| Arc::ptr_eq(existing, &extension))
        {
            inner.extensions.push(extension);
        }
        Ok(())
    }

    /// Remove an extension by identity. Removing an extension that is not
    /// present is a no-op; removing after the extension set is sealed fails.
    pub fn remove_extension(&self, extension: &Arc<dyn ModelExtension>) -> Result<(), ModelError> {
        let mut inner = self.extensions_open()?;
        inner
            .extensions
            .retain(|existing| !Arc::ptr_eq(existing, extension));
        Ok(())
    }

    fn extensions_open(&self) -> Result<parking_lot::MutexGuard<'_, ModelInner>, ModelError> {
        let inner = self.inner.lock();
        match inner.state {
            SealState::Open => Ok(inner),
            SealState::ExtensionsSealed => Err(ModelError::ExtensionsSealed),
            SealState::Sealed => Err(ModelError::ModelSealed),
        }
    }

    /// Seal the model.
    ///
    /// Merges the declared extension table into the extension set, fixes the
    /// set, applies extensions in ascending priority order (stable, so ties
    /// keep registration order), attaches every property's pending
    /// dependencies, and freezes structure. Sealing a sealed model is a
    /// no-op. A seal that failed part-way (for example on duplicate property
    /// names) may be retried after the model is corrected.
    pub fn seal(&self) -> Result<(), ModelError> {
        let extensions = {
            let mut inner = self.inner.lock();
            match inner.state {
                SealState::Sealed => return Ok(()),
                SealState::Open => {
                    let declared = self.declared_extensions.clone();
                    for extension in declared {
                        if !inner
                            .extensions
                            .iter()
                            .any(|existing| Arc::ptr_eq(existing, &extension))
                        {
                            inner.extensions.push(extension);
                        }
                    }
                    inner.state = SealState::ExtensionsSealed;
                }
                SealState::ExtensionsSealed => {}
            }
            let mut extensions = inner.extensions.clone();
            extensions.sort_by_key(|extension| extension.priority());
            extensions
        };

        // Applied outside the structure lock so extensions can add
        // properties.
        for extension in &extensions {
            extension.apply(self)?;
            self.tracer.on_extension_applied(extension.priority());
        }

        let properties = self.inner.lock().properties.clone();
        let hub = self.changed.clone();
        let tracer = self.tracer.clone();
        let notify: Arc<dyn Fn(&str) + Send + Sync> = Arc::new(move |property: &str| {
            tracer.on_property_changed(property);
            hub.raise(property);
        });
        for property in &properties {
            let name = property.name();
            for definition in property.pending_dependencies() {
                self.tracer
                    .on_dependency_attached(&name, &definition.to_string());
            }
            property.seal(&self.navigator, notify.clone())?;
        }

        self.inner.lock().state = SealState::Sealed;
        self.tracer.on_model_sealed(&self.type_name);
        Ok(())
    }

    /// Dispose every attached dependency, unsubscribing from everything the
    /// model was watching.
    ///
    /// Dropping the model has the same effect; disposing explicitly releases
    /// subscriptions on shared objects promptly.
    pub fn dispose(&self) {
        for property in self.inner.lock().properties.iter() {
            property.release();
        }
    }

    /// Read a property value by name.
    pub fn read(&self, name: &str) -> Result<Value, ModelError> {
        self.find_property(name)
            .ok_or_else(|| ModelError::UnknownProperty {
                name: name.to_string(),
            })?
            .get_value()
    }

    /// Write a property value by name.
    pub fn write(&self, name: &str, value: Value) -> Result<(), ModelError> {
        self.find_property(name)
            .ok_or_else(|| ModelError::UnknownProperty {
                name: name.to_string(),
            })?
            .set_value(value)
    }

    fn build_property(
        &self,
        name: &str,
        kind: ValueKind,
    ) -> Result<Arc<PropertyDefinition>, ModelError> {
        let property = PropertyDefinition::new(name, kind);
        self.add_property(property.clone())?;
        Ok(property)
    }

    fn add_dependencies(
        &self,
        property: &Arc<PropertyDefinition>,
        expression: &Expr,
    ) -> Result<(), ModelError> {
        for definition in self.analyzer.discover(expression) {
            self.tracer
                .on_dependency_discovered(&property.name(), &definition.to_string());
            property.add_dependency(definition)?;
        }
        Ok(())
    }

    /// Declare a read-only property computed by `getter`.
    ///
    /// The expression is closure-pre-evaluated, validated against the safe
    /// evaluator's supported subset, and analyzed for dependencies; when any
    /// of them changes after sealing, the model raises a change notification
    /// for `name`.
    pub fn property(
        &self,
        name: &str,
        kind: ValueKind,
        getter: Expr,
    ) -> Result<Arc<PropertyDefinition>, ModelError> {
        let expression = evaluate_closures(&getter);
        let evaluator = Arc::new(SafeEvaluator::new(expression.clone())?);
        let property = self.build_property(name, kind)?;
        property.set_getter(Arc::new(move || Ok(evaluator.evaluate()?)))?;
        self.add_dependencies(&property, &expression)?;
        Ok(property)
    }

    /// Declare a read-write property computed by `getter` and written through
    /// `setter`.
    pub fn property_with_setter(
        &self,
        name: &str,
        kind: ValueKind,
        getter: Expr,
        setter: Setter,
    ) -> Result<Arc<PropertyDefinition>, ModelError> {
        let property = self.property(name, kind, getter)?;
        property.set_setter(Some(setter))?;
        Ok(property)
    }

    /// Declare a property from a single member-access expression.
    ///
    /// The property takes its name from the outermost member access
    /// (unwrapping one unary conversion if present). The getter re-evaluates
    /// the expression on every read; the setter re-resolves the member's base
    /// object on every write and writes through it, so the referenced target
    /// can be replaced at runtime without re-declaring the property.
    pub fn lambda_property(&self, getter: Expr) -> Result<Arc<PropertyDefinition>, ModelError> {
        let expression = evaluate_closures(&getter);
        let body = match expression {
            Expr::Unary { operand, .. } => *operand,
            other => other,
        };
        let Expr::Member {
            base: member_base,
            name: member_name,
            ..
        } = &body
        else {
            return Err(EvalError::Unsupported { kind: body.kind() }.into());
        };
        let member_name = member_name.clone();
        let member_base = member_base.clone();

        let evaluator = Arc::new(SafeEvaluator::new(body.clone())?);
        let property = self.build_property(&member_name, ValueKind::Any)?;
        property.set_getter(Arc::new(move || Ok(evaluator.evaluate()?)))?;

        if let Some(base) = member_base {
            let target_evaluator = Arc::new(SafeEvaluator::new(*base)?);
            let property_name = member_name.clone();
            property.set_setter(Some(Arc::new(move |value: Value| {
                match target_evaluator.evaluate()? {
                    Value::Object(target) => {
                        if target.write(&property_name, value) {
                            Ok(())
                        } else {
                            Err(ModelError::ReadOnlyProperty {
                                name: property_name.clone(),
                            })
                        }
                    }
                    _ => Err(ModelError::UnresolvedSetterTarget {
                        name: property_name.clone(),
                    }),
                }
            })))?;
        }

        self.add_dependencies(&property, &body)?;
        Ok(property)
    }

    /// Declare a command property with no parameter.
    pub fn command(
        &self,
        name: &str,
        action: impl Fn() + Send + Sync + 'static,
    ) -> Result<Arc<PropertyDefinition>, ModelError> {
        self.command_property(name, DelegateCommand::new(move |_| action()))
    }

    /// Declare a command property with an execution guard.
    pub fn command_can_execute(
        &self,
        name: &str,
        action: impl Fn() + Send + Sync + 'static,
        can_execute: impl Fn() -> bool + Send + Sync + 'static,
    ) -> Result<Arc<PropertyDefinition>, ModelError> {
        self.command_property(
            name,
            DelegateCommand::with_can_execute(move |_| action(), move |_| can_execute()),
        )
    }

    /// Declare a command property whose action receives the command
    /// parameter.
    pub fn parameterized_command(
        &self,
        name: &str,
        action: impl Fn(Option<&Value>) + Send + Sync + 'static,
    ) -> Result<Arc<PropertyDefinition>, ModelError> {
        self.command_property(name, DelegateCommand::new(action))
    }

    /// Declare a parameterized command property with an execution guard.
    pub fn parameterized_command_can_execute(
        &self,
        name: &str,
        action: impl Fn(Option<&Value>) + Send + Sync + 'static,
        can_execute: impl Fn(Option<&Value>) -> bool + Send + Sync + 'static,
    ) -> Result<Arc<PropertyDefinition>, ModelError> {
        self.command_property(name, DelegateCommand::with_can_execute(action, can_execute))
    }

    fn command_property(
        &self,
        name: &str,
        command: DelegateCommand,
    ) -> Result<Arc<PropertyDefinition>, ModelError> {
        let property = self.build_property(name, ValueKind::Command)?;
        let value = Value::from(Arc::new(command));
        property.set_getter(Arc::new(move || Ok(value.clone())))?;
        Ok(property)
    }

    /// Bulk-register a passthrough property for every property `source`
    /// reports.
    ///
    /// Reads and writes go straight through to the source. When the source
    /// supports change notification, each property also depends on its own
    /// name on the source, so source mutations re-notify through the model.
    pub fn all_properties(
        &self,
        source: &ObjectRef,
    ) -> Result<Vec<Arc<PropertyDefinition>>, ModelError> {
        let mut added = Vec::new();
        for name in source.property_names() {
            let property = self.build_property(&name, ValueKind::Any)?;

            let read_source = source.clone();
            let read_name = name.clone();
            property.set_getter(Arc::new(move || {
                Ok(read_source.read(&read_name).unwrap_or(Value::Null))
            }))?;

            let write_source = source.clone();
            let write_name = name.clone();
            property.set_setter(Some(Arc::new(move |value: Value| {
                if write_source.write(&write_name, value) {
                    Ok(())
                } else {
                    Err(ModelError::ReadOnlyProperty {
                        name: write_name.clone(),
                    })
                }
            })))?;

            if source.change_event().is_some() {
                property.add_dependency(Arc::new(ExternalDependencyDefinition::new(
                    &name,
                    source.clone(),
                )))?;
            }
            added.push(property);
        }
        Ok(added)
    }

    /// Declare a collection property whose elements are wrapped as child
    /// models.
    ///
    /// Every read re-evaluates `items` and builds a fresh list of sealed
    /// child models; dependencies of the items expression re-notify the
    /// collection property as a whole.
    pub fn collection(&self, name: &str, items: Expr) -> Result<CollectionDefinition, ModelError> {
        let expression = evaluate_closures(&items);
        let evaluator = Arc::new(SafeEvaluator::new(expression.clone())?);
        let property = self.build_property(name, ValueKind::List)?;
        let factory = Arc::new(ModelFactory::new());

        let build = factory.clone();
        property.set_getter(Arc::new(move || {
            let elements: Vec<Value> = match evaluator.evaluate()? {
                Value::List(items) => items.as_ref().clone(),
                Value::Null => Vec::new(),
                other => vec![other],
            };
            let mut models = Vec::with_capacity(elements.len());
            for element in &elements {
                let model: ObjectRef = build.build(element)?;
                models.push(Value::Object(model));
            }
            Ok(Value::List(Arc::new(models)))
        }))?;

        self.add_dependencies(&property, &expression)?;
        Ok(CollectionDefinition::new(property, factory))
    }
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}

impl DynamicObject for Model {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn read(&self, property: &str) -> Option<Value> {
        self.find_property(property)?.get_value().ok()
    }

    fn write(&self, property: &str, value: Value) -> bool {
        self.find_property(property)
            .map(|definition| definition.set_value(value).is_ok())
            .unwrap_or(false)
    }

    fn property_names(&self) -> Vec<String> {
        self.properties()
            .iter()
            .map(|property| property.name())
            .collect()
    }

    fn change_event(&self) -> Option<&PropertyChangedEvent> {
        Some(&self.changed)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Configures and builds a [`Model`].
pub struct ModelBuilder {
    type_name: String,
    analyzer: ExpressionAnalyzer,
    navigator: PathNavigator,
    tracer: Arc<dyn Tracer>,
    extensions: Vec<Arc<dyn ModelExtension>>,
}

impl ModelBuilder {
    /// A builder with the standard analyzer, navigator, and no tracer.
    pub fn new() -> Self {
        Self {
            type_name: "Model".to_string(),
            analyzer: ExpressionAnalyzer::standard(),
            navigator: PathNavigator::standard(),
            tracer: Arc::new(NoopTracer),
            extensions: Vec::new(),
        }
    }

    /// The type name the model reports as a dynamic object.
    pub fn type_name(mut self, name: impl Into<String>) -> Self {
        self.type_name = name.into();
        self
    }

    /// Replace the dependency analyzer.
    pub fn analyzer(mut self, analyzer: ExpressionAnalyzer) -> Self {
        self.analyzer = analyzer;
        self
    }

    /// Replace the path navigator used to attach dependencies.
    pub fn navigator(mut self, navigator: PathNavigator) -> Self {
        self.navigator = navigator;
        self
    }

    /// Install a tracer.
    pub fn tracer(mut self, tracer: Arc<dyn Tracer>) -> Self {
        self.tracer = tracer;
        self
    }

    /// Declare an extension, merged into the extension set at first seal.
    ///
    /// This is the registration-table counterpart of annotating a model
    /// type: extensions declared here are discovered when the model seals,
    /// not when it is built.
    pub fn extension(mut self, extension: Arc<dyn ModelExtension>) -> Self {
        self.extensions.push(extension);
        self
    }

    /// Build the model. The built-in duplicate-name validation is always
    /// part of the declared extension table.
    pub fn build(mut self) -> Model {
        self.extensions.push(Arc::new(DuplicateNameValidation));
        Model {
            type_name: self.type_name,
            analyzer: self.analyzer,
            navigator: self.navigator,
            tracer: self.tracer,
            changed: PropertyChangedEvent::new(),
            declared_extensions: self.extensions,
            inner: Mutex::new(ModelInner {
                state: SealState::Open,
                properties: Vec::new(),
                extensions: Vec::new(),
            }),
        }
    }
}

impl Default for ModelBuilder {
    fn default() -> Self {
        Self::new()
    }
}
