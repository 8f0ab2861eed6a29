//! Expression-dependency analysis.
//!
//! Extractors flatten an expression down to its member-access chains, walk
//! each chain upward to find its root, and classify the root as a dependency.
//! The shared walk lives in the [`DependencyExtractor`] trait's provided
//! `extract`; implementations supply only the root classification. Extractors
//! never fail: shapes they do not recognize simply produce nothing.

use std::collections::HashSet;
use std::sync::Arc;

use crate::definition::{
    DependencyDefinition, ExternalDependencyDefinition, StaticDependencyDefinition,
};
use crate::expr::{Expr, ExprKind};
use crate::flatten::flatten;
use crate::value::Value;

/// Extracts dependency definitions from an expression tree.
pub trait DependencyExtractor: Send + Sync {
    /// Classify the root of a member-access chain, producing a definition
    /// when the root is a recognized dependency root.
    ///
    /// `path` is the dot-joined chain accumulated above the root; `None` when
    /// the flattened node was not a member access at all.
    fn extract_from_root(
        &self,
        root: &Expr,
        path: Option<&str>,
    ) -> Option<Arc<dyn DependencyDefinition>>;

    /// Extract every dependency within `expression`.
    ///
    /// Flattens the expression stopping at member accesses, walks each chain
    /// up to its root, classifies, and recurses into roots of true member
    /// chains that no classifier matched (a method call's arguments may hold
    /// further dependencies).
    fn extract(&self, expression: &Expr) -> Vec<Arc<dyn DependencyDefinition>> {
        let mut results = Vec::new();
        for child in flatten(expression, &[ExprKind::MemberAccess]) {
            let (root, path, traverse) = match child {
                Expr::Member { base, name, .. } => {
                    let mut accumulated = name.clone();
                    let mut current = base.as_deref();
                    loop {
                        match current {
                            Some(Expr::Member {
                                base: inner,
                                name: inner_name,
                                ..
                            }) => {
                                accumulated = format!("{inner_name}.{accumulated}");
                                match inner.as_deref() {
                                    Some(next) => current = Some(next),
                                    // A member with no base: the chain roots
                                    // at a static member reference.
                                    None => break,
                                }
                            }
                            _ => break,
                        }
                    }
                    (current, Some(accumulated), true)
                }
                other => (Some(other), None, false),
            };
            let Some(root) = root else { continue };
            if let Some(definition) = self.extract_from_root(root, path.as_deref()) {
                results.push(definition);
            } else if traverse {
                results.extend(self.extract(root));
            }
        }
        results
    }
}

/// Finds dependencies on captured external objects.
///
/// Matches a constant object root when the accumulated path is non-empty, or
/// when the path is empty but the object supports change notification (a
/// whole-object dependency).
pub struct ExternalDependencyExtractor;

impl DependencyExtractor for ExternalDependencyExtractor {
    fn extract_from_root(
        &self,
        root: &Expr,
        path: Option<&str>,
    ) -> Option<Arc<dyn DependencyDefinition>> {
        let Expr::Constant(Value::Object(target)) = root else {
            return None;
        };
        if path.is_some() || target.change_event().is_some() {
            Some(Arc::new(ExternalDependencyDefinition::new(
                path.unwrap_or(""),
                target.clone(),
            )))
        } else {
            None
        }
    }
}

/// Finds dependencies on paths rooted at static members.
pub struct StaticDependencyExtractor;

impl DependencyExtractor for StaticDependencyExtractor {
    fn extract_from_root(
        &self,
        root: &Expr,
        path: Option<&str>,
    ) -> Option<Arc<dyn DependencyDefinition>> {
        let Expr::Member {
            base: None,
            owner,
            name,
        } = root
        else {
            return None;
        };
        Some(Arc::new(StaticDependencyDefinition::new(
            path.unwrap_or(name),
            owner.as_deref().unwrap_or_default(),
            name,
        )))
    }
}

/// Runs a set of extractors over expressions and deduplicates the results.
pub struct ExpressionAnalyzer {
    extractors: Vec<Arc<dyn DependencyExtractor>>,
}

impl ExpressionAnalyzer {
    /// An analyzer over the given extractors, run in order.
    pub fn new(extractors: Vec<Arc<dyn DependencyExtractor>>) -> Self {
        Self { extractors }
    }

    /// The standard analyzer: external objects, then static members.
    pub fn standard() -> Self {
        Self::new(vec![
            Arc::new(ExternalDependencyExtractor),
            Arc::new(StaticDependencyExtractor),
        ])
    }

    /// Discover every dependency in `expression`, deduplicated by display
    /// string (case-sensitive, exact), preserving first-seen order.
    pub fn discover(&self, expression: &Expr) -> Vec<Arc<dyn DependencyDefinition>> {
        let mut seen = HashSet::new();
        let mut results = Vec::new();
        for extractor in &self.extractors {
            for definition in extractor.extract(expression) {
                if seen.insert(definition.to_string()) {
                    results.push(definition);
                }
            }
        }
        results
    }
}

impl Default for ExpressionAnalyzer {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use crate::expr::{BinaryOp, Method};
    use crate::value::{ObjectRef, Record};

    use super::*;

    fn strings(definitions: &[Arc<dyn DependencyDefinition>]) -> Vec<String> {
        definitions.iter().map(|d| d.to_string()).collect()
    }

    #[test]
    fn member_chain_roots_at_the_captured_object() {
        let customer: ObjectRef = Record::new("Customer");
        let expression = Expr::property_path(&customer, "Address.City");

        let found = ExpressionAnalyzer::standard().discover(&expression);
        assert_eq!(strings(&found), vec!["external 'Address.City' on 'Customer'"]);
    }

    #[test]
    fn each_chain_in_a_binary_expression_is_found() {
        let customer: ObjectRef = Record::new("Customer");
        let expression = Expr::binary(
            BinaryOp::Add,
            Expr::property_path(&customer, "FirstName"),
            Expr::binary(
                BinaryOp::Add,
                Expr::constant(" "),
                Expr::property_path(&customer, "LastName"),
            ),
        );

        let found = ExpressionAnalyzer::standard().discover(&expression);
        assert_eq!(
            strings(&found),
            vec![
                "external 'FirstName' on 'Customer'",
                "external 'LastName' on 'Customer'",
            ]
        );
    }

    #[test]
    fn duplicate_paths_are_deduplicated_by_text() {
        let customer: ObjectRef = Record::new("Customer");
        let expression = Expr::binary(
            BinaryOp::Add,
            Expr::property_path(&customer, "Name"),
            Expr::property_path(&customer, "Name"),
        );

        let found = ExpressionAnalyzer::standard().discover(&expression);
        assert_eq!(strings(&found), vec!["external 'Name' on 'Customer'"]);
    }

    #[test]
    fn captures_of_the_same_shape_produce_identical_text() {
        let first: ObjectRef = Record::new("Customer");
        let second: ObjectRef = Record::new("Customer");
        let analyzer = ExpressionAnalyzer::standard();

        let a = analyzer.discover(&Expr::property_path(&first, "Name"));
        let b = analyzer.discover(&Expr::property_path(&second, "Name"));
        assert_eq!(strings(&a), strings(&b));
    }

    #[test]
    fn bare_notifying_constant_is_a_whole_object_dependency() {
        let customer: ObjectRef = Record::new("Customer");
        let expression = Expr::object(&customer);

        let found = ExpressionAnalyzer::standard().discover(&expression);
        assert_eq!(strings(&found), vec!["external '' on 'Customer'"]);
    }

    #[test]
    fn bare_silent_constant_is_not_a_dependency() {
        let environment: ObjectRef = Record::silent("Environment");
        let expression = Expr::object(&environment);

        let found = ExpressionAnalyzer::standard().discover(&expression);
        assert!(found.is_empty());
    }

    #[test]
    fn static_chain_roots_at_the_owner_type() {
        let expression = Expr::member(Expr::static_member("Clock", "Now"), "Hour");

        let found = ExpressionAnalyzer::standard().discover(&expression);
        assert_eq!(strings(&found), vec!["static 'Now.Hour' on 'Clock'"]);
    }

    #[test]
    fn single_segment_static_reference_is_not_a_dependency() {
        let expression = Expr::static_member("Clock", "Now");

        let found = ExpressionAnalyzer::standard().discover(&expression);
        assert!(found.is_empty());
    }

    #[test]
    fn method_call_roots_are_traversed_for_nested_dependencies() {
        let repository: ObjectRef = Record::new("Repository");
        let load = Method::instance("Load", |_| Ok(Value::Null));
        let expression = Expr::member(
            Expr::call(
                load,
                Some(Expr::object(&repository)),
                vec![Expr::property_path(&repository, "Filter")],
            ),
            "Name",
        );

        let found = ExpressionAnalyzer::standard().discover(&expression);
        assert_eq!(
            strings(&found),
            vec![
                "external 'Filter' on 'Repository'",
                "external '' on 'Repository'",
            ]
        );
    }
}
