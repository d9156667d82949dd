use curate_protocol::{Container, Context};
use serde_json::Value;

use crate::catalog::{Namespace, RuleDefinition, WherePredicate};

impl Namespace {
    /// First rule, in catalog order, that applies to `context`.
    #[must_use]
    pub fn match_rule(&self, context: &Context) -> Option<&RuleDefinition> {
        let found = self.rules().iter().find(|rule| rule.matches(context));
        match found {
            Some(rule) => log::debug!(
                "{} {} matched template {}",
                context.container_type,
                describe(context.current()),
                rule.id()
            ),
            None => log::debug!(
                "{} {} matched no template",
                context.container_type,
                describe(context.current())
            ),
        }
        found
    }
}

/// Free-function form of [`Namespace::match_rule`].
#[must_use]
pub fn match_rules<'n>(context: &Context, namespace: &'n Namespace) -> Option<&'n RuleDefinition> {
    namespace.match_rule(context)
}

impl RuleDefinition {
    #[must_use]
    pub fn matches(&self, context: &Context) -> bool {
        if self.container_type() != context.container_type {
            return false;
        }
        if let Some(parent) = self.parent_container_type() {
            if context.parent_container_type != Some(parent) {
                return false;
            }
        }
        let container = context.current();
        self.predicates()
            .iter()
            .all(|predicate| container.is_some_and(|c| predicate.accepts(c)))
    }
}

impl WherePredicate {
    /// Scalar attributes need membership; array attributes need overlap.
    #[must_use]
    pub fn accepts(&self, container: &Container) -> bool {
        match container.get(&self.attribute) {
            None | Some(Value::Null) => false,
            Some(Value::Array(values)) => values.iter().any(|v| self.accepted.contains(v)),
            Some(value) => self.accepted.contains(value),
        }
    }
}

fn describe(container: Option<&Container>) -> &str {
    container
        .and_then(|c| c.name().or_else(|| c.label()).or_else(|| c.id()))
        .unwrap_or("<unnamed>")
}
