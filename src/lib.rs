//! Bindflow: runtime property binding with automatic dependency tracking.
//!
//! This crate builds observable "model" objects whose properties are declared
//! at runtime from expression trees rather than compiled as struct fields.
//! When a property is declared, its expression is statically analyzed to
//! discover every external object and property path it reads; when the model
//! is sealed, live change monitors attach to those paths so that any upstream
//! mutation re-raises a change notification for the owning property, even
//! when intermediate objects in a path are replaced at runtime.
//!
//! # Key features
//!
//! - **Expression-dependency analysis**: member-access chains in a getter
//!   expression become dependency definitions automatically
//! - **Live path monitoring**: a token chain watches every segment of a
//!   dotted path and rebuilds itself when an intermediate value is swapped
//! - **Sealing state machine**: models accumulate properties and extensions
//!   while open, then seal once into an immutable, fully-wired structure
//! - **Safe evaluation**: getters built from member-access expressions keep
//!   working while the objects they traverse come and go, yielding `Null`
//!   instead of failing on a broken chain
//! - **Macro-free**: expressions are plain values, no codegen involved
//!
//! # Example
//!
//! ```
//! use bindflow::{BinaryOp, Expr, Model, ObjectRef, Record, Value, ValueKind};
//!
//! let customer = Record::new("Customer");
//! customer.set("FirstName", "Paul");
//! customer.set("LastName", "Stovell");
//! let customer: ObjectRef = customer;
//!
//! let model = Model::new();
//! let full_name = Expr::binary(
//!     BinaryOp::Add,
//!     Expr::property_path(&customer, "FirstName"),
//!     Expr::binary(
//!         BinaryOp::Add,
//!         Expr::constant(" "),
//!         Expr::property_path(&customer, "LastName"),
//!     ),
//! );
//! model.property("FullName", ValueKind::Str, full_name).unwrap();
//! model.seal().unwrap();
//!
//! assert_eq!(model.read("FullName").unwrap(), Value::from("Paul Stovell"));
//! ```
//!
//! After sealing, mutating `FirstName` or `LastName` on the customer raises
//! the model's aggregate change notification for `FullName`.

#![deny(missing_docs)]

mod analysis;
mod collection;
mod command;
mod definition;
mod dependency;
mod error;
mod eval;
mod event;
mod expr;
mod extension;
mod flatten;
mod model;
mod navigation;
mod property;
mod reader;
pub mod tracer;
mod value;

pub use analysis::{
    DependencyExtractor, ExpressionAnalyzer, ExternalDependencyExtractor,
    StaticDependencyExtractor,
};
pub use collection::{CollectionDefinition, ModelFactory};
pub use command::DelegateCommand;
pub use definition::{
    DependencyDefinition, ExternalDependencyDefinition, StaticDependencyDefinition,
};
pub use dependency::{Dependency, ElementCallback, ExternalDependency, ReevaluateCallback};
pub use error::{EvalError, ModelError};
pub use eval::{evaluate_closures, partial_eval, SafeEvaluator};
pub use event::{ChangeHandler, PropertyChangedEvent, Subscription};
pub use expr::{BinaryOp, Expr, ExprKind, Method, MethodKind, UnaryOp};
pub use extension::{DuplicateNameValidation, ModelExtension};
pub use flatten::flatten;
pub use model::{Model, ModelBuilder, SealState};
pub use navigation::{
    ChangeCallback, MemberToken, MemberTokenFactory, PathNavigator, Token, TokenFactory,
};
pub use property::{Getter, PropertyDefinition, Setter};
pub use reader::{reader_for, register_reader, PropertyReader};
pub use value::{DynamicObject, ObjectRef, Record, Value, ValueKind};
