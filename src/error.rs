//! Error types for model construction and expression evaluation.

use std::sync::Arc;

use crate::expr::{BinaryOp, ExprKind};

/// Errors raised while declaring, sealing, or accessing a model.
///
/// Structural errors (`ModelSealed`, `ExtensionsSealed`, `DuplicateProperties`)
/// indicate precondition violations in the calling code and are never retried
/// internally. They surface synchronously from the declaration or seal call
/// that triggered them.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ModelError {
    /// The model has been sealed and its structure can no longer change.
    #[error("the operation could not be performed because the model has been sealed")]
    ModelSealed,

    /// Extensions can no longer be added or removed.
    ///
    /// This is reported when an extension's `apply` step (or any caller after
    /// the first seal began) tries to mutate the extension set.
    #[error("extensions cannot be added or removed because the model's extensions have been sealed")]
    ExtensionsSealed,

    /// Two or more properties share a name.
    ///
    /// Reported by the built-in validation extension at seal time. `names`
    /// lists each duplicated name once, in declaration order.
    #[error("one or more properties have duplicate names: {}", names.join(", "))]
    DuplicateProperties {
        /// The duplicated property names.
        names: Vec<String>,
    },

    /// A write was attempted on a property declared without a setter.
    #[error("property '{name}' is read-only")]
    ReadOnlyProperty {
        /// The property name.
        name: String,
    },

    /// A read was attempted on a property declared without a getter.
    #[error("property '{name}' has no getter")]
    WriteOnlyProperty {
        /// The property name.
        name: String,
    },

    /// No property with the given name is declared on the model.
    #[error("no property named '{name}' is defined on the model")]
    UnknownProperty {
        /// The requested property name.
        name: String,
    },

    /// A dependency definition of a kind that cannot produce a live monitor.
    ///
    /// Static member dependencies are discovered and deduplicated but cannot
    /// be attached; sealing a property that carries one reports this error.
    #[error("dependency {definition} cannot be attached")]
    UnattachableDependency {
        /// Display form of the offending definition.
        definition: String,
    },

    /// A lambda-declared setter could not resolve the object to write to.
    #[error("the setter target for property '{name}' could not be resolved")]
    UnresolvedSetterTarget {
        /// The property name.
        name: String,
    },

    /// An expression failed to validate or evaluate.
    #[error(transparent)]
    Eval(#[from] EvalError),

    /// An extension's apply step failed with a user-defined error.
    #[error("extension failed: {0}")]
    Extension(Arc<anyhow::Error>),
}

impl ModelError {
    /// Wrap a user-defined error for propagation out of an extension.
    pub fn extension(error: impl Into<anyhow::Error>) -> Self {
        ModelError::Extension(Arc::new(error.into()))
    }
}

/// Errors raised by the safe expression evaluator.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EvalError {
    /// The expression contains a node kind outside the evaluable subset.
    ///
    /// This indicates a programming error in the property declaration, not a
    /// runtime condition, and is reported when the evaluator is built.
    #[error("expressions of kind {kind:?} are not supported")]
    Unsupported {
        /// The offending node kind.
        kind: ExprKind,
    },

    /// A parameter reference had no supplied value.
    #[error("no parameter named '{name}' was supplied")]
    UnknownParameter {
        /// The parameter name.
        name: String,
    },

    /// A binary operator was applied to operands it cannot combine.
    #[error("operator {op:?} cannot be applied to {left} and {right}")]
    InvalidOperands {
        /// The operator.
        op: BinaryOp,
        /// Kind name of the left operand.
        left: &'static str,
        /// Kind name of the right operand.
        right: &'static str,
    },

    /// Integer division by zero.
    #[error("attempted to divide by zero")]
    DivisionByZero,

    /// A method embedded in a call node failed.
    #[error("method '{name}' failed: {error}")]
    Method {
        /// The method name from the call node.
        name: String,
        /// The underlying user error.
        error: Arc<anyhow::Error>,
    },
}
