//! Expression evaluation.
//!
//! Two pieces live here:
//!
//! - [`evaluate_closures`]: partial evaluation that folds captured-environment
//!   reads into constants before an expression is analyzed or evaluated
//!   repeatedly. A member chain over a non-notifying captured object carries
//!   no external dependency, so its value is fixed at declaration time.
//! - [`SafeEvaluator`]: evaluates the restricted expression subset (constant,
//!   member access, binary operator, method call, parameter reference)
//!   against live objects, substituting an internal *terminated* marker when
//!   any link in a chain is missing. `evaluate` maps terminated to `Null`,
//!   so getters built from member-access expressions keep working while the
//!   objects they traverse come and go.

use std::collections::HashMap;

use crate::error::EvalError;
use crate::expr::{BinaryOp, Expr, MethodKind};
use crate::value::Value;

/// Result of evaluating one node: a value, or a terminated chain.
enum Evaluated {
    Value(Value),
    Terminated,
}

/// Evaluates a restricted expression shape against live objects.
///
/// Construction validates the shape: any node kind outside the supported
/// subset fails immediately with [`EvalError::Unsupported`], so declaration
/// errors surface at declaration time rather than on first read.
pub struct SafeEvaluator {
    expression: Expr,
    parameters: HashMap<String, Value>,
}

impl SafeEvaluator {
    /// Build an evaluator with no parameters.
    pub fn new(expression: Expr) -> Result<Self, EvalError> {
        Self::with_parameters(expression, HashMap::new())
    }

    /// Build an evaluator with named parameter values.
    pub fn with_parameters(
        expression: Expr,
        parameters: HashMap<String, Value>,
    ) -> Result<Self, EvalError> {
        validate(&expression)?;
        Ok(Self {
            expression,
            parameters,
        })
    }

    /// Evaluate the expression. A terminated chain yields `Null`.
    pub fn evaluate(&self) -> Result<Value, EvalError> {
        match self.eval(&self.expression)? {
            Evaluated::Value(value) => Ok(value),
            Evaluated::Terminated => Ok(Value::Null),
        }
    }

    fn eval(&self, expression: &Expr) -> Result<Evaluated, EvalError> {
        match expression {
            Expr::Constant(value) => Ok(Evaluated::Value(value.clone())),
            Expr::Parameter(name) => {
                let value = self
                    .parameters
                    .get(name)
                    .ok_or_else(|| EvalError::UnknownParameter { name: name.clone() })?;
                if value.is_null() {
                    Ok(Evaluated::Terminated)
                } else {
                    Ok(Evaluated::Value(value.clone()))
                }
            }
            Expr::Member { base, name, .. } => {
                let Some(base) = base else {
                    // A static member read has no live root to resolve
                    // against; the chain terminates.
                    return Ok(Evaluated::Terminated);
                };
                match self.eval(base)? {
                    Evaluated::Value(Value::Object(object)) => {
                        Ok(Evaluated::Value(object.read(name).unwrap_or(Value::Null)))
                    }
                    _ => Ok(Evaluated::Terminated),
                }
            }
            Expr::Binary {
                op, left, right, ..
            } => {
                let left = match self.eval(left)? {
                    Evaluated::Value(value) => value,
                    Evaluated::Terminated => return Ok(Evaluated::Terminated),
                };
                let right = match self.eval(right)? {
                    Evaluated::Value(value) => value,
                    Evaluated::Terminated => return Ok(Evaluated::Terminated),
                };
                apply_binary(*op, left, right).map(Evaluated::Value)
            }
            Expr::MethodCall {
                method,
                target,
                arguments,
            } => {
                let mut values = Vec::with_capacity(arguments.len() + 1);
                for argument in arguments {
                    match self.eval(argument)? {
                        Evaluated::Value(value) => values.push(value),
                        Evaluated::Terminated => values.push(Value::Null),
                    }
                }
                match method.kind() {
                    MethodKind::Instance => {
                        let Some(target) = target else {
                            return Ok(Evaluated::Terminated);
                        };
                        let receiver = match self.eval(target)? {
                            Evaluated::Value(value) if !value.is_null() => value,
                            _ => return Ok(Evaluated::Terminated),
                        };
                        values.insert(0, receiver);
                    }
                    MethodKind::Extension => {
                        // An extension call whose receiver argument is
                        // missing behaves like a broken member chain.
                        if values.first().is_some_and(Value::is_null) {
                            return Ok(Evaluated::Terminated);
                        }
                    }
                    MethodKind::Static => {}
                }
                method
                    .invoke(&values)
                    .map(Evaluated::Value)
                    .map_err(|error| EvalError::Method {
                        name: method.name().to_string(),
                        error: std::sync::Arc::new(error),
                    })
            }
            other => Err(EvalError::Unsupported { kind: other.kind() }),
        }
    }
}

fn validate(expression: &Expr) -> Result<(), EvalError> {
    match expression {
        Expr::Constant(_) | Expr::Parameter(_) => Ok(()),
        Expr::Member { base, .. } => match base {
            Some(base) => validate(base),
            None => Ok(()),
        },
        Expr::Binary { left, right, .. } => {
            validate(left)?;
            validate(right)
        }
        Expr::MethodCall {
            target, arguments, ..
        } => {
            if let Some(target) = target {
                validate(target)?;
            }
            arguments.iter().try_for_each(validate)
        }
        other => Err(EvalError::Unsupported { kind: other.kind() }),
    }
}

fn apply_binary(op: BinaryOp, left: Value, right: Value) -> Result<Value, EvalError> {
    use BinaryOp::*;
    use Value::*;

    let invalid = |left: &Value, right: &Value| EvalError::InvalidOperands {
        op,
        left: left.kind_name(),
        right: right.kind_name(),
    };

    match op {
        Add => match (left, right) {
            (Int(a), Int(b)) => Ok(Int(a + b)),
            (Float(a), Float(b)) => Ok(Float(a + b)),
            (Int(a), Float(b)) => Ok(Float(a as f64 + b)),
            (Float(a), Int(b)) => Ok(Float(a + b as f64)),
            // Null concatenates as the empty string, like a missing link in
            // a formatted display value.
            (Str(a), b) => Ok(Str(format!("{a}{b}"))),
            (a, Str(b)) => Ok(Str(format!("{a}{b}"))),
            (a, b) => Err(invalid(&a, &b)),
        },
        Subtract => match (left, right) {
            (Int(a), Int(b)) => Ok(Int(a - b)),
            (Float(a), Float(b)) => Ok(Float(a - b)),
            (Int(a), Float(b)) => Ok(Float(a as f64 - b)),
            (Float(a), Int(b)) => Ok(Float(a - b as f64)),
            (a, b) => Err(invalid(&a, &b)),
        },
        Multiply => match (left, right) {
            (Int(a), Int(b)) => Ok(Int(a * b)),
            (Float(a), Float(b)) => Ok(Float(a * b)),
            (Int(a), Float(b)) => Ok(Float(a as f64 * b)),
            (Float(a), Int(b)) => Ok(Float(a * b as f64)),
            (a, b) => Err(invalid(&a, &b)),
        },
        Divide => match (left, right) {
            (Int(_), Int(0)) => Err(EvalError::DivisionByZero),
            (Int(a), Int(b)) => Ok(Int(a / b)),
            (Float(a), Float(b)) => Ok(Float(a / b)),
            (Int(a), Float(b)) => Ok(Float(a as f64 / b)),
            (Float(a), Int(b)) => Ok(Float(a / b as f64)),
            (a, b) => Err(invalid(&a, &b)),
        },
        Equal => Ok(Bool(left == right)),
        NotEqual => Ok(Bool(left != right)),
        LessThan | LessOrEqual | GreaterThan | GreaterOrEqual => {
            let ordering = match (&left, &right) {
                (Int(a), Int(b)) => a.partial_cmp(b),
                (Float(a), Float(b)) => a.partial_cmp(b),
                (Int(a), Float(b)) => (*a as f64).partial_cmp(b),
                (Float(a), Int(b)) => a.partial_cmp(&(*b as f64)),
                (Str(a), Str(b)) => a.partial_cmp(b),
                _ => None,
            };
            let Some(ordering) = ordering else {
                return Err(invalid(&left, &right));
            };
            Ok(Bool(match op {
                LessThan => ordering.is_lt(),
                LessOrEqual => ordering.is_le(),
                GreaterThan => ordering.is_gt(),
                _ => ordering.is_ge(),
            }))
        }
        And => match (left, right) {
            (Bool(a), Bool(b)) => Ok(Bool(a && b)),
            (a, b) => Err(invalid(&a, &b)),
        },
        Or => match (left, right) {
            (Bool(a), Bool(b)) => Ok(Bool(a || b)),
            (a, b) => Err(invalid(&a, &b)),
        },
    }
}

/// Fold captured-environment reads in `expression` into constants.
///
/// A node is foldable when it is a constant, or a member access over a
/// captured object with no change notification (the closure-environment
/// shape). Chains over notifying objects are left intact so the dependency
/// analyzer can see them.
pub fn evaluate_closures(expression: &Expr) -> Expr {
    partial_eval(expression, &|candidate| match candidate {
        Expr::Constant(_) => true,
        Expr::Member {
            base: Some(base), ..
        } => matches!(
            base.as_ref(),
            Expr::Constant(Value::Object(object)) if object.change_event().is_none()
        ),
        _ => false,
    })
}

/// Partial evaluation: replace every maximal subtree whose nodes all satisfy
/// `can_evaluate` with a constant holding the subtree's value.
///
/// Subtrees that fail to evaluate are left unchanged.
pub fn partial_eval(expression: &Expr, can_evaluate: &dyn Fn(&Expr) -> bool) -> Expr {
    let (reduced, evaluable) = reduce(expression, can_evaluate);
    if evaluable {
        fold(reduced)
    } else {
        reduced
    }
}

fn fold(expression: Expr) -> Expr {
    if matches!(expression, Expr::Constant(_)) {
        return expression;
    }
    let evaluated = SafeEvaluator::new(expression.clone()).and_then(|evaluator| evaluator.evaluate());
    match evaluated {
        Ok(value) => Expr::Constant(value),
        Err(_) => expression,
    }
}

fn fold_if(expression: Expr, evaluable: bool) -> Expr {
    if evaluable {
        fold(expression)
    } else {
        expression
    }
}

/// Bottom-up nomination: returns the rebuilt expression (with evaluable
/// subtrees folded wherever the parent itself is not evaluable) and whether
/// the whole subtree is evaluable.
fn reduce(expression: &Expr, can_evaluate: &dyn Fn(&Expr) -> bool) -> (Expr, bool) {
    let self_ok = can_evaluate(expression);
    match expression {
        Expr::Constant(_) | Expr::Parameter(_) => (expression.clone(), self_ok),
        Expr::Member { base, owner, name } => {
            let Some(base) = base else {
                return (expression.clone(), self_ok);
            };
            let (reduced, ok) = reduce(base, can_evaluate);
            let evaluable = self_ok && ok;
            let base = if evaluable { reduced } else { fold_if(reduced, ok) };
            (
                Expr::Member {
                    base: Some(Box::new(base)),
                    owner: owner.clone(),
                    name: name.clone(),
                },
                evaluable,
            )
        }
        Expr::Binary {
            op,
            conversion,
            left,
            right,
        } => {
            let (conversion, conversion_ok) = reduce_opt(conversion, can_evaluate);
            let (left, left_ok) = reduce(left, can_evaluate);
            let (right, right_ok) = reduce(right, can_evaluate);
            let evaluable = self_ok && conversion_ok && left_ok && right_ok;
            let rebuilt = Expr::Binary {
                op: *op,
                conversion: conversion.map(|c| Box::new(fold_if(c, conversion_ok && !evaluable))),
                left: Box::new(fold_if_not(left, left_ok, evaluable)),
                right: Box::new(fold_if_not(right, right_ok, evaluable)),
            };
            (rebuilt, evaluable)
        }
        Expr::Conditional {
            test,
            if_true,
            if_false,
        } => {
            let (test, test_ok) = reduce(test, can_evaluate);
            let (if_true, true_ok) = reduce(if_true, can_evaluate);
            let (if_false, false_ok) = reduce(if_false, can_evaluate);
            let evaluable = self_ok && test_ok && true_ok && false_ok;
            let rebuilt = Expr::Conditional {
                test: Box::new(fold_if_not(test, test_ok, evaluable)),
                if_true: Box::new(fold_if_not(if_true, true_ok, evaluable)),
                if_false: Box::new(fold_if_not(if_false, false_ok, evaluable)),
            };
            (rebuilt, evaluable)
        }
        Expr::Invocation { target, arguments } => {
            let (target, target_ok) = reduce(target, can_evaluate);
            let (arguments, arguments_ok) = reduce_all(arguments, can_evaluate);
            let evaluable = self_ok && target_ok && arguments_ok.iter().all(|ok| *ok);
            let rebuilt = Expr::Invocation {
                target: Box::new(fold_if_not(target, target_ok, evaluable)),
                arguments: fold_each(arguments, &arguments_ok, evaluable),
            };
            (rebuilt, evaluable)
        }
        Expr::Lambda { parameters, body } => {
            let (body, body_ok) = reduce(body, can_evaluate);
            let evaluable = self_ok && body_ok;
            let rebuilt = Expr::Lambda {
                parameters: parameters.clone(),
                body: Box::new(fold_if_not(body, body_ok, evaluable)),
            };
            (rebuilt, evaluable)
        }
        Expr::ListInit { new_expr, items } => {
            let (new_expr, new_ok) = reduce(new_expr, can_evaluate);
            let (items, items_ok) = reduce_all(items, can_evaluate);
            let evaluable = self_ok && new_ok && items_ok.iter().all(|ok| *ok);
            let rebuilt = Expr::ListInit {
                new_expr: Box::new(fold_if_not(new_expr, new_ok, evaluable)),
                items: fold_each(items, &items_ok, evaluable),
            };
            (rebuilt, evaluable)
        }
        Expr::MemberInit { new_expr, bindings } => {
            let (new_expr, new_ok) = reduce(new_expr, can_evaluate);
            let mut rebuilt_bindings = Vec::with_capacity(bindings.len());
            let mut bindings_ok = true;
            for (name, binding) in bindings {
                let (binding, ok) = reduce(binding, can_evaluate);
                bindings_ok &= ok;
                rebuilt_bindings.push((name.clone(), binding, ok));
            }
            let evaluable = self_ok && new_ok && bindings_ok;
            let rebuilt = Expr::MemberInit {
                new_expr: Box::new(fold_if_not(new_expr, new_ok, evaluable)),
                bindings: rebuilt_bindings
                    .into_iter()
                    .map(|(name, binding, ok)| (name, fold_if_not(binding, ok, evaluable)))
                    .collect(),
            };
            (rebuilt, evaluable)
        }
        Expr::MethodCall {
            method,
            target,
            arguments,
        } => {
            let (target, target_ok) = reduce_opt(target, can_evaluate);
            let (arguments, arguments_ok) = reduce_all(arguments, can_evaluate);
            let evaluable = self_ok && target_ok && arguments_ok.iter().all(|ok| *ok);
            let rebuilt = Expr::MethodCall {
                method: method.clone(),
                target: target.map(|t| Box::new(fold_if_not(t, target_ok, evaluable))),
                arguments: fold_each(arguments, &arguments_ok, evaluable),
            };
            (rebuilt, evaluable)
        }
        Expr::NewArray { items } => {
            let (items, items_ok) = reduce_all(items, can_evaluate);
            let evaluable = self_ok && items_ok.iter().all(|ok| *ok);
            let rebuilt = Expr::NewArray {
                items: fold_each(items, &items_ok, evaluable),
            };
            (rebuilt, evaluable)
        }
        Expr::NewObject { arguments } => {
            let (arguments, arguments_ok) = reduce_all(arguments, can_evaluate);
            let evaluable = self_ok && arguments_ok.iter().all(|ok| *ok);
            let rebuilt = Expr::NewObject {
                arguments: fold_each(arguments, &arguments_ok, evaluable),
            };
            (rebuilt, evaluable)
        }
        Expr::TypeTest { operand, type_name } => {
            let (operand, operand_ok) = reduce(operand, can_evaluate);
            let evaluable = self_ok && operand_ok;
            let rebuilt = Expr::TypeTest {
                operand: Box::new(fold_if_not(operand, operand_ok, evaluable)),
                type_name: type_name.clone(),
            };
            (rebuilt, evaluable)
        }
        Expr::Unary { op, operand } => {
            let (operand, operand_ok) = reduce(operand, can_evaluate);
            let evaluable = self_ok && operand_ok;
            let rebuilt = Expr::Unary {
                op: *op,
                operand: Box::new(fold_if_not(operand, operand_ok, evaluable)),
            };
            (rebuilt, evaluable)
        }
    }
}

/// Fold a child when it is evaluable but its parent is not.
fn fold_if_not(expression: Expr, evaluable: bool, parent_evaluable: bool) -> Expr {
    if evaluable && !parent_evaluable {
        fold(expression)
    } else {
        expression
    }
}

fn fold_each(expressions: Vec<Expr>, evaluable: &[bool], parent_evaluable: bool) -> Vec<Expr> {
    expressions
        .into_iter()
        .zip(evaluable)
        .map(|(expression, ok)| fold_if_not(expression, *ok, parent_evaluable))
        .collect()
}

fn reduce_all(expressions: &[Expr], can_evaluate: &dyn Fn(&Expr) -> bool) -> (Vec<Expr>, Vec<bool>) {
    let mut rebuilt = Vec::with_capacity(expressions.len());
    let mut flags = Vec::with_capacity(expressions.len());
    for expression in expressions {
        let (expression, ok) = reduce(expression, can_evaluate);
        rebuilt.push(expression);
        flags.push(ok);
    }
    (rebuilt, flags)
}

fn reduce_opt(
    expression: &Option<Box<Expr>>,
    can_evaluate: &dyn Fn(&Expr) -> bool,
) -> (Option<Expr>, bool) {
    match expression {
        Some(expression) => {
            let (expression, ok) = reduce(expression, can_evaluate);
            (Some(expression), ok)
        }
        None => (None, true),
    }
}

#[cfg(test)]
mod tests {
    use crate::error::EvalError;
    use crate::expr::{ExprKind, Method};
    use crate::value::{ObjectRef, Record};

    use super::*;

    #[test]
    fn evaluates_member_chains() {
        let city = Record::new("City");
        city.set("Name", "Brisbane");
        let customer = Record::new("Customer");
        customer.set("City", Value::from(city));
        let customer: ObjectRef = customer;

        let evaluator = SafeEvaluator::new(Expr::property_path(&customer, "City.Name")).unwrap();
        assert_eq!(evaluator.evaluate().unwrap(), Value::from("Brisbane"));
    }

    #[test]
    fn missing_link_terminates_to_null() {
        let customer: ObjectRef = Record::new("Customer");
        let evaluator = SafeEvaluator::new(Expr::property_path(&customer, "City.Name")).unwrap();
        assert_eq!(evaluator.evaluate().unwrap(), Value::Null);
    }

    #[test]
    fn static_member_reads_terminate() {
        let expression = Expr::member(Expr::static_member("Clock", "Now"), "Hour");
        let evaluator = SafeEvaluator::new(expression).unwrap();
        assert_eq!(evaluator.evaluate().unwrap(), Value::Null);
    }

    #[test]
    fn unsupported_shapes_fail_at_construction() {
        let expression = Expr::Conditional {
            test: Box::new(Expr::constant(true)),
            if_true: Box::new(Expr::constant(1)),
            if_false: Box::new(Expr::constant(2)),
        };
        match SafeEvaluator::new(expression) {
            Err(EvalError::Unsupported { kind }) => assert_eq!(kind, ExprKind::Conditional),
            other => panic!("unexpected result: {:?}", other.err()),
        }
    }

    #[test]
    fn parameters_are_looked_up_by_name() {
        let mut parameters = HashMap::new();
        parameters.insert("x".to_string(), Value::Int(40));
        let expression = Expr::binary(BinaryOp::Add, Expr::parameter("x"), Expr::constant(2));
        let evaluator = SafeEvaluator::with_parameters(expression, parameters).unwrap();
        assert_eq!(evaluator.evaluate().unwrap(), Value::Int(42));
    }

    #[test]
    fn unknown_parameters_are_an_error() {
        let evaluator = SafeEvaluator::new(Expr::parameter("missing")).unwrap();
        assert!(matches!(
            evaluator.evaluate(),
            Err(EvalError::UnknownParameter { .. })
        ));
    }

    #[test]
    fn string_concatenation_treats_null_as_empty() {
        let customer: ObjectRef = Record::new("Customer");
        let expression = Expr::binary(
            BinaryOp::Add,
            Expr::constant("Name: "),
            Expr::member(Expr::object(&customer), "Name"),
        );
        let evaluator = SafeEvaluator::new(expression).unwrap();
        assert_eq!(evaluator.evaluate().unwrap(), Value::from("Name: "));
    }

    #[test]
    fn integer_division_by_zero_is_an_error() {
        let expression = Expr::binary(BinaryOp::Divide, Expr::constant(1), Expr::constant(0));
        let evaluator = SafeEvaluator::new(expression).unwrap();
        assert!(matches!(
            evaluator.evaluate(),
            Err(EvalError::DivisionByZero)
        ));
    }

    #[test]
    fn comparisons_mix_numeric_kinds() {
        let expression = Expr::binary(
            BinaryOp::LessThan,
            Expr::constant(1),
            Expr::constant(1.5),
        );
        let evaluator = SafeEvaluator::new(expression).unwrap();
        assert_eq!(evaluator.evaluate().unwrap(), Value::Bool(true));
    }

    #[test]
    fn instance_calls_on_missing_receivers_terminate() {
        let customer: ObjectRef = Record::new("Customer");
        let upper = Method::instance("ToUpper", |values| {
            Ok(Value::from(values[0].to_string().to_uppercase()))
        });
        let expression = Expr::call(
            upper,
            Some(Expr::property_path(&customer, "Name")),
            Vec::new(),
        );
        let evaluator = SafeEvaluator::new(expression).unwrap();
        assert_eq!(evaluator.evaluate().unwrap(), Value::Null);
    }

    #[test]
    fn extension_calls_with_missing_receiver_argument_terminate() {
        let trim = Method::extension("Trim", |values| {
            Ok(Value::from(values[0].to_string().trim().to_string()))
        });
        let expression = Expr::call(trim, None, vec![Expr::constant(Value::Null)]);
        let evaluator = SafeEvaluator::new(expression).unwrap();
        assert_eq!(evaluator.evaluate().unwrap(), Value::Null);

        let trim = Method::static_fn("Trim", |values| {
            Ok(Value::from(values[0].to_string().trim().to_string()))
        });
        let expression = Expr::call(trim, None, vec![Expr::constant(Value::Null)]);
        let evaluator = SafeEvaluator::new(expression).unwrap();
        assert_eq!(evaluator.evaluate().unwrap(), Value::from(""));
    }

    #[test]
    fn closure_folding_replaces_environment_reads() {
        let customer = Record::new("Customer");
        customer.set("Name", "Paul");
        let environment = Record::silent("Environment");
        environment.set("customer", Value::from(customer.clone()));
        let environment: ObjectRef = environment;

        let expression = Expr::member(
            Expr::member(Expr::object(&environment), "customer"),
            "Name",
        );
        let folded = evaluate_closures(&expression);

        match &folded {
            Expr::Member { base: Some(base), name, .. } => {
                assert_eq!(name, "Name");
                match base.as_ref() {
                    Expr::Constant(Value::Object(object)) => {
                        assert_eq!(object.type_name(), "Customer")
                    }
                    other => panic!("environment read was not folded: {other:?}"),
                }
            }
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn closure_folding_leaves_notifying_chains_intact() {
        let customer: ObjectRef = Record::new("Customer");
        let expression = Expr::property_path(&customer, "Name");
        let folded = evaluate_closures(&expression);
        assert_eq!(folded.kind(), ExprKind::MemberAccess);
    }

    #[test]
    fn fully_constant_expressions_fold_to_a_constant() {
        let environment = Record::silent("Environment");
        environment.set("answer", 42);
        let environment: ObjectRef = environment;

        let folded = evaluate_closures(&Expr::member(Expr::object(&environment), "answer"));
        match folded {
            Expr::Constant(Value::Int(42)) => {}
            other => panic!("unexpected shape: {other:?}"),
        }
    }
}
