//! Dependency definitions: immutable descriptors of discovered dependencies.
//!
//! A definition records what to watch (a root plus a dotted property path)
//! without watching anything yet. Attaching a definition at model-seal time
//! produces the live [`Dependency`]. Definitions compare equal when their
//! display strings match exactly, which is how the analyzer deduplicates
//! discoveries: the string names the root's *type*, not its identity, so two
//! captures of the same shape over the same type read as the same dependency.

use std::fmt;

use crate::dependency::{Dependency, ExternalDependency};
use crate::error::ModelError;
use crate::navigation::PathNavigator;
use crate::value::ObjectRef;

/// A static, pre-attachment description of a dependency.
pub trait DependencyDefinition: fmt::Display + Send + Sync {
    /// Attach the definition, producing a live monitor.
    fn attach(&self, navigator: &PathNavigator) -> Result<Box<dyn Dependency>, ModelError>;
}

/// A dependency on a captured runtime object.
///
/// An empty path means the whole object: any property change on it triggers
/// re-evaluation.
pub struct ExternalDependencyDefinition {
    path: String,
    target: ObjectRef,
}

impl ExternalDependencyDefinition {
    /// A definition for `path` on `target`.
    pub fn new(path: &str, target: ObjectRef) -> Self {
        Self {
            path: path.to_string(),
            target,
        }
    }

    /// The dotted property path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The captured object.
    pub fn target(&self) -> &ObjectRef {
        &self.target
    }
}

impl fmt::Display for ExternalDependencyDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "external '{}' on '{}'",
            self.path,
            self.target.type_name()
        )
    }
}

impl DependencyDefinition for ExternalDependencyDefinition {
    fn attach(&self, navigator: &PathNavigator) -> Result<Box<dyn Dependency>, ModelError> {
        Ok(Box::new(ExternalDependency::new(
            &self.target,
            &self.path,
            navigator,
        )))
    }
}

/// A dependency on a path rooted at a type-level member.
///
/// Static dependencies are discovered, displayed, and deduplicated like any
/// other, but no live monitor exists for them: attaching one fails.
pub struct StaticDependencyDefinition {
    path: String,
    owner: String,
    member: String,
}

impl StaticDependencyDefinition {
    /// A definition for `path` rooted at `owner::member`. The path includes
    /// the root member's own name as its first segment.
    pub fn new(path: &str, owner: &str, member: &str) -> Self {
        Self {
            path: path.to_string(),
            owner: owner.to_string(),
            member: member.to_string(),
        }
    }

    /// The dotted property path, starting at the static member's name.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The owner type name.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// The static member name.
    pub fn member(&self) -> &str {
        &self.member
    }
}

impl fmt::Display for StaticDependencyDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "static '{}' on '{}'", self.path, self.owner)
    }
}

impl DependencyDefinition for StaticDependencyDefinition {
    fn attach(&self, _navigator: &PathNavigator) -> Result<Box<dyn Dependency>, ModelError> {
        Err(ModelError::UnattachableDependency {
            definition: self.to_string(),
        })
    }
}
