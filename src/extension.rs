//! Model extensions.

use std::collections::HashSet;

use crate::error::ModelError;
use crate::model::Model;

/// A named, priority-ordered operation applied to a model exactly once at
/// seal time.
///
/// Lower priorities run first; ties keep registration order. An extension's
/// `apply` step may add properties to the model, but adding or removing
/// extensions from inside `apply` fails because the extension set is already
/// sealed by then.
pub trait ModelExtension: Send + Sync {
    /// The relative order in which the extension runs. Lower values run
    /// first.
    fn priority(&self) -> i32;

    /// Apply the extension to `model`.
    fn apply(&self, model: &Model) -> Result<(), ModelError>;
}

/// Seal-time validation that no two properties share a name.
///
/// Runs at maximum priority so it sees every property, including those added
/// by other extensions. Comparison is case-sensitive.
pub struct DuplicateNameValidation;

impl ModelExtension for DuplicateNameValidation {
    fn priority(&self) -> i32 {
        i32::MAX
    }

    fn apply(&self, model: &Model) -> Result<(), ModelError> {
        let mut seen = HashSet::new();
        let mut duplicates: Vec<String> = Vec::new();
        for property in model.properties() {
            let name = property.name();
            if !seen.insert(name.clone()) && !duplicates.contains(&name) {
                duplicates.push(name);
            }
        }
        if duplicates.is_empty() {
            Ok(())
        } else {
            Err(ModelError::DuplicateProperties { names: duplicates })
        }
    }
}
