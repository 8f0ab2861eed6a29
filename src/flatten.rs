//! Expression-tree flattening.
//!
//! Given a root expression and a set of node kinds to stop at, [`flatten`]
//! produces the pre-order, left-to-right sequence of sub-expressions that are
//! either of a stop kind (collected without descending further) or structural
//! leaves (constants and parameter references). Absent optional
//! sub-expressions, such as a binary node's missing conversion, are skipped.

use crate::expr::{Expr, ExprKind};

/// Flatten `expression`, stopping at any node whose kind appears in
/// `stop_at`.
pub fn flatten<'a>(expression: &'a Expr, stop_at: &[ExprKind]) -> Vec<&'a Expr> {
    let mut found = Vec::new();
    traverse(expression, stop_at, &mut found);
    found
}

fn traverse_all<'a>(expressions: &'a [Expr], stop_at: &[ExprKind], found: &mut Vec<&'a Expr>) {
    for expression in expressions {
        traverse(expression, stop_at, found);
    }
}

fn traverse_opt<'a>(
    expression: &'a Option<Box<Expr>>,
    stop_at: &[ExprKind],
    found: &mut Vec<&'a Expr>,
) {
    if let Some(expression) = expression {
        traverse(expression, stop_at, found);
    }
}

fn traverse<'a>(expression: &'a Expr, stop_at: &[ExprKind], found: &mut Vec<&'a Expr>) {
    if stop_at.contains(&expression.kind()) {
        // An expression we are interested in; keep it without descending.
        found.push(expression);
        return;
    }
    match expression {
        Expr::Binary {
            conversion,
            left,
            right,
            ..
        } => {
            traverse_opt(conversion, stop_at, found);
            traverse(left, stop_at, found);
            traverse(right, stop_at, found);
        }
        Expr::Conditional {
            test,
            if_true,
            if_false,
        } => {
            traverse(if_false, stop_at, found);
            traverse(if_true, stop_at, found);
            traverse(test, stop_at, found);
        }
        Expr::Constant(_) => found.push(expression),
        Expr::Invocation { target, arguments } => {
            traverse_all(arguments, stop_at, found);
            traverse(target, stop_at, found);
        }
        Expr::Lambda { parameters, body } => {
            traverse_all(parameters, stop_at, found);
            traverse(body, stop_at, found);
        }
        Expr::ListInit { new_expr, items } => {
            traverse_all(items, stop_at, found);
            traverse(new_expr, stop_at, found);
        }
        Expr::Member { base, .. } => traverse_opt(base, stop_at, found),
        Expr::MemberInit { new_expr, bindings } => {
            for (_, binding) in bindings {
                traverse(binding, stop_at, found);
            }
            traverse(new_expr, stop_at, found);
        }
        Expr::MethodCall {
            target, arguments, ..
        } => {
            traverse_all(arguments, stop_at, found);
            traverse_opt(target, stop_at, found);
        }
        Expr::NewArray { items } => traverse_all(items, stop_at, found),
        Expr::NewObject { arguments } => traverse_all(arguments, stop_at, found),
        Expr::Parameter(_) => found.push(expression),
        Expr::TypeTest { operand, .. } => traverse(operand, stop_at, found),
        Expr::Unary { operand, .. } => traverse(operand, stop_at, found),
    }
}

#[cfg(test)]
mod tests {
    use crate::expr::BinaryOp;
    use crate::value::{ObjectRef, Record, Value};

    use super::*;

    fn customer() -> ObjectRef {
        let record = Record::new("Customer");
        record.set("FirstName", "Paul");
        record.set("LastName", "Stovell");
        record
    }

    #[test]
    fn stops_at_member_access_without_descending() {
        let customer = customer();
        let expression = Expr::binary(
            BinaryOp::Add,
            Expr::property_path(&customer, "FirstName"),
            Expr::property_path(&customer, "LastName"),
        );

        let found = flatten(&expression, &[ExprKind::MemberAccess]);
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|e| e.kind() == ExprKind::MemberAccess));
    }

    #[test]
    fn collects_leaves_when_not_stopped() {
        let expression = Expr::binary(
            BinaryOp::Add,
            Expr::constant(1),
            Expr::binary(BinaryOp::Multiply, Expr::parameter("x"), Expr::constant(2)),
        );

        let found = flatten(&expression, &[]);
        let kinds: Vec<_> = found.iter().map(|e| e.kind()).collect();
        assert_eq!(
            kinds,
            vec![ExprKind::Constant, ExprKind::Parameter, ExprKind::Constant]
        );
    }

    #[test]
    fn skips_absent_conversion() {
        let expression = Expr::binary(BinaryOp::Add, Expr::constant(1), Expr::constant(2));
        let found = flatten(&expression, &[ExprKind::Constant]);
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn member_chain_is_a_single_stop() {
        let customer = customer();
        let expression = Expr::property_path(&customer, "Address.City.Name");
        let found = flatten(&expression, &[ExprKind::MemberAccess]);
        assert_eq!(found.len(), 1);
        match found[0] {
            Expr::Member { name, .. } => assert_eq!(name, "Name"),
            other => panic!("unexpected node: {other:?}"),
        }
    }

    #[test]
    fn descends_into_member_base_when_members_are_not_stops() {
        let customer = customer();
        let expression = Expr::property_path(&customer, "FirstName");
        let found = flatten(&expression, &[ExprKind::Constant]);
        assert_eq!(found.len(), 1);
        match found[0] {
            Expr::Constant(Value::Object(_)) => {}
            other => panic!("unexpected node: {other:?}"),
        }
    }
}
