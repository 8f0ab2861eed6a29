//! Collection properties: lists of elements wrapped as child models.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::ModelError;
use crate::model::Model;
use crate::property::PropertyDefinition;
use crate::value::Value;

type EditorFn = Box<dyn Fn(&Value, &Model) -> Result<(), ModelError> + Send + Sync>;

/// Builds a sealed child model around one collection element.
///
/// Every element gets bulk passthrough properties for whatever its object
/// reports, then each registered editor runs to reshape the child model
/// before it is sealed.
pub struct ModelFactory {
    editors: Mutex<Vec<EditorFn>>,
}

impl ModelFactory {
    /// A factory with no editors.
    pub fn new() -> Self {
        Self {
            editors: Mutex::new(Vec::new()),
        }
    }

    /// Register an editor, applied to every subsequently built child model.
    pub fn add(&self, editor: impl Fn(&Value, &Model) -> Result<(), ModelError> + Send + Sync + 'static) {
        self.editors.lock().push(Box::new(editor));
    }

    /// Build and seal a child model for `element`.
    pub fn build(&self, element: &Value) -> Result<Arc<Model>, ModelError> {
        let model = Model::new();
        if let Value::Object(source) = element {
            model.all_properties(source)?;
        }
        {
            let editors = self.editors.lock();
            for editor in editors.iter() {
                editor(element, &model)?;
            }
        }
        model.seal()?;
        Ok(Arc::new(model))
    }
}

impl Default for ModelFactory {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to a declared collection property.
///
/// Editors registered through [`CollectionDefinition::each`] shape the child
/// model built for every element the next time the collection is read.
pub struct CollectionDefinition {
    property: Arc<PropertyDefinition>,
    factory: Arc<ModelFactory>,
}

impl CollectionDefinition {
    pub(crate) fn new(property: Arc<PropertyDefinition>, factory: Arc<ModelFactory>) -> Self {
        Self { property, factory }
    }

    /// Register an editor for element models.
    pub fn each(
        &self,
        editor: impl Fn(&Value, &Model) -> Result<(), ModelError> + Send + Sync + 'static,
    ) -> &Self {
        self.factory.add(editor);
        self
    }

    /// The underlying property definition.
    pub fn property(&self) -> &Arc<PropertyDefinition> {
        &self.property
    }
}
