//! An introspectable expression tree.
//!
//! Expressions are the declaration currency of the crate: a property's getter
//! is an [`Expr`] describing how its value is computed from captured objects.
//! The tree is read-only input to the analysis and evaluation machinery, which
//! never mutates nodes in place.
//!
//! Method-call nodes carry their resolved callable inline (a [`Method`]), the
//! same way a host-runtime expression node carries a resolved method handle,
//! so evaluation needs no dispatch tables.

use std::fmt;
use std::sync::Arc;

use crate::value::{ObjectRef, Value};

/// Node-kind tags, used for flattener stop sets and error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExprKind {
    /// Binary operator application.
    Binary,
    /// Ternary conditional.
    Conditional,
    /// Captured constant value.
    Constant,
    /// Invocation of a lambda-valued expression.
    Invocation,
    /// Lambda definition.
    Lambda,
    /// List construction with element initializers.
    ListInit,
    /// Member (property) access.
    MemberAccess,
    /// Object construction with member initializers.
    MemberInit,
    /// Method call.
    MethodCall,
    /// Array construction.
    NewArray,
    /// Object construction.
    NewObject,
    /// Parameter reference.
    Parameter,
    /// Runtime type test.
    TypeTest,
    /// Unary operator application.
    Unary,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    /// Addition, or string concatenation when either operand is a string.
    Add,
    /// Subtraction.
    Subtract,
    /// Multiplication.
    Multiply,
    /// Division.
    Divide,
    /// Equality.
    Equal,
    /// Inequality.
    NotEqual,
    /// Less-than.
    LessThan,
    /// Less-than-or-equal.
    LessOrEqual,
    /// Greater-than.
    GreaterThan,
    /// Greater-than-or-equal.
    GreaterOrEqual,
    /// Boolean conjunction.
    And,
    /// Boolean disjunction.
    Or,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// Boolean negation.
    Not,
    /// Arithmetic negation.
    Negate,
    /// A representation-only conversion wrapper.
    Convert,
}

/// How a [`Method`] binds to its arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    /// Instance method: the call node's target is prepended to the argument
    /// list.
    Instance,
    /// Free function.
    Static,
    /// Extension-style free function: the first argument is a receiver, and a
    /// missing receiver terminates the chain instead of invoking.
    Extension,
}

type MethodFn = Arc<dyn Fn(&[Value]) -> anyhow::Result<Value> + Send + Sync>;

/// A resolved callable embedded in a method-call node.
#[derive(Clone)]
pub struct Method {
    name: String,
    kind: MethodKind,
    func: MethodFn,
}

impl Method {
    /// An instance method. The callable receives the receiver as its first
    /// argument, followed by the call arguments.
    pub fn instance(
        name: impl Into<String>,
        func: impl Fn(&[Value]) -> anyhow::Result<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            kind: MethodKind::Instance,
            func: Arc::new(func),
        }
    }

    /// A free function.
    pub fn static_fn(
        name: impl Into<String>,
        func: impl Fn(&[Value]) -> anyhow::Result<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            kind: MethodKind::Static,
            func: Arc::new(func),
        }
    }

    /// An extension-style free function.
    pub fn extension(
        name: impl Into<String>,
        func: impl Fn(&[Value]) -> anyhow::Result<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            kind: MethodKind::Extension,
            func: Arc::new(func),
        }
    }

    /// The method name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The binding kind.
    pub fn kind(&self) -> MethodKind {
        self.kind
    }

    /// Invoke the callable.
    pub fn invoke(&self, arguments: &[Value]) -> anyhow::Result<Value> {
        (self.func)(arguments)
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

/// An expression-tree node.
#[derive(Debug, Clone)]
pub enum Expr {
    /// Binary operator application. `conversion` carries an optional
    /// user-defined conversion sub-expression and is usually absent.
    Binary {
        /// The operator.
        op: BinaryOp,
        /// Optional conversion sub-expression.
        conversion: Option<Box<Expr>>,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
    /// Ternary conditional.
    Conditional {
        /// The condition.
        test: Box<Expr>,
        /// Value when the condition holds.
        if_true: Box<Expr>,
        /// Value when the condition does not hold.
        if_false: Box<Expr>,
    },
    /// A captured constant value.
    Constant(Value),
    /// Invocation of a lambda-valued expression.
    Invocation {
        /// The lambda-valued expression.
        target: Box<Expr>,
        /// Call arguments.
        arguments: Vec<Expr>,
    },
    /// A lambda definition.
    Lambda {
        /// Parameter references, each an [`Expr::Parameter`].
        parameters: Vec<Expr>,
        /// The lambda body.
        body: Box<Expr>,
    },
    /// List construction with element initializers.
    ListInit {
        /// The construction expression.
        new_expr: Box<Expr>,
        /// Element expressions.
        items: Vec<Expr>,
    },
    /// Member (property) access. A node with no base and an `owner` type name
    /// is a static member reference.
    Member {
        /// The expression the member is read from, absent for static members.
        base: Option<Box<Expr>>,
        /// Owner type name, present for static members.
        owner: Option<String>,
        /// The member name.
        name: String,
    },
    /// Object construction followed by member assignments.
    MemberInit {
        /// The construction expression.
        new_expr: Box<Expr>,
        /// Member assignments.
        bindings: Vec<(String, Expr)>,
    },
    /// A method call.
    MethodCall {
        /// The resolved callable.
        method: Method,
        /// The receiver expression, absent for free functions.
        target: Option<Box<Expr>>,
        /// Call arguments.
        arguments: Vec<Expr>,
    },
    /// Array construction.
    NewArray {
        /// Element expressions.
        items: Vec<Expr>,
    },
    /// Object construction.
    NewObject {
        /// Constructor arguments.
        arguments: Vec<Expr>,
    },
    /// A parameter reference.
    Parameter(String),
    /// A runtime type test.
    TypeTest {
        /// The tested expression.
        operand: Box<Expr>,
        /// The type name tested against.
        type_name: String,
    },
    /// Unary operator application.
    Unary {
        /// The operator.
        op: UnaryOp,
        /// The operand.
        operand: Box<Expr>,
    },
}

impl Expr {
    /// The node-kind tag of this expression.
    pub fn kind(&self) -> ExprKind {
        match self {
            Expr::Binary { .. } => ExprKind::Binary,
            Expr::Conditional { .. } => ExprKind::Conditional,
            Expr::Constant(_) => ExprKind::Constant,
            Expr::Invocation { .. } => ExprKind::Invocation,
            Expr::Lambda { .. } => ExprKind::Lambda,
            Expr::ListInit { .. } => ExprKind::ListInit,
            Expr::Member { .. } => ExprKind::MemberAccess,
            Expr::MemberInit { .. } => ExprKind::MemberInit,
            Expr::MethodCall { .. } => ExprKind::MethodCall,
            Expr::NewArray { .. } => ExprKind::NewArray,
            Expr::NewObject { .. } => ExprKind::NewObject,
            Expr::Parameter(_) => ExprKind::Parameter,
            Expr::TypeTest { .. } => ExprKind::TypeTest,
            Expr::Unary { .. } => ExprKind::Unary,
        }
    }

    /// A constant node.
    pub fn constant(value: impl Into<Value>) -> Expr {
        Expr::Constant(value.into())
    }

    /// A constant node capturing an object.
    pub fn object(object: &ObjectRef) -> Expr {
        Expr::Constant(Value::Object(object.clone()))
    }

    /// An instance member access.
    pub fn member(base: Expr, name: impl Into<String>) -> Expr {
        Expr::Member {
            base: Some(Box::new(base)),
            owner: None,
            name: name.into(),
        }
    }

    /// A static member reference.
    pub fn static_member(owner: impl Into<String>, name: impl Into<String>) -> Expr {
        Expr::Member {
            base: None,
            owner: Some(owner.into()),
            name: name.into(),
        }
    }

    /// A member-access chain over a captured object, one segment per dotted
    /// path element.
    pub fn property_path(object: &ObjectRef, path: &str) -> Expr {
        let mut expr = Expr::object(object);
        for segment in path.split('.') {
            expr = Expr::member(expr, segment);
        }
        expr
    }

    /// A binary operator application with no conversion.
    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            op,
            conversion: None,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// A unary operator application.
    pub fn unary(op: UnaryOp, operand: Expr) -> Expr {
        Expr::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    /// A parameter reference.
    pub fn parameter(name: impl Into<String>) -> Expr {
        Expr::Parameter(name.into())
    }

    /// A method call.
    pub fn call(method: Method, target: Option<Expr>, arguments: Vec<Expr>) -> Expr {
        Expr::MethodCall {
            method,
            target: target.map(Box::new),
            arguments,
        }
    }
}
