// src/rules/engine.rs

use super::expr::{Context, Expr};
use super::template::ActionTemplate;
use crate::error::RuleError;
use std::fmt;
use tracing::{debug, warn};

/// A named condition and the message produced when it holds.
#[derive(Debug, Clone)]
pub struct Rule {
    name: String,
    condition_source: String,
    condition: Expr,
    action: ActionTemplate,
    description: Option<String>,
}

impl Rule {
    pub fn new(name: impl Into<String>, condition: &str, action: &str) -> Result<Self, RuleError> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(RuleError::validation("rule name cannot be empty"));
        }

        Ok(Self {
            name,
            condition_source: condition.trim().to_string(),
            condition: Expr::parse(condition)?,
            action: ActionTemplate::parse(action)?,
            description: None,
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn condition(&self) -> &Expr {
        &self.condition
    }

    /// The condition as written.
    pub fn condition_source(&self) -> &str {
        &self.condition_source
    }

    pub fn action(&self) -> &ActionTemplate {
        &self.action
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Rendered action message if the condition holds.
    pub fn fire(&self, ctx: &Context) -> Result<Option<String>, RuleError> {
        if self.condition.matches(ctx)? {
            Ok(Some(self.action.render(ctx)))
        } else {
            Ok(None)
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: when {} -> \"{}\"",
            self.name, self.condition_source, self.action
        )
    }
}

/// Ordered rule set evaluated against one context at a time.
#[derive(Debug, Clone, Default)]
pub struct LogicEngine {
    rules: Vec<Rule>,
}

impl LogicEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_rule(&mut self, rule: Rule) {
        debug!(rule = %rule.name, "Rule added");
        self.rules.push(rule);
    }

    /// Removes every rule named `name`; returns how many were removed.
    pub fn remove_rule(&mut self, name: &str) -> usize {
        let before = self.rules.len();
        self.rules.retain(|rule| rule.name != name);
        before - self.rules.len()
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// One line per firing rule, in insertion order. A rule whose condition
    /// cannot be evaluated yields `"{name}: ERROR - {error}"` and does not
    /// stop the others.
    pub fn evaluate(&self, ctx: &Context) -> Vec<String> {
        let mut results = Vec::new();
        for rule in &self.rules {
            match rule.fire(ctx) {
                Ok(Some(message)) => {
                    debug!(rule = %rule.name, "Rule fired");
                    results.push(format!("{}: {}", rule.name, message));
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(rule = %rule.name, error = %e, "Rule evaluation failed");
                    results.push(format!("{}: ERROR - {}", rule.name, e));
                }
            }
        }
        results
    }
}

impl Extend<Rule> for LogicEngine {
    fn extend<T: IntoIterator<Item = Rule>>(&mut self, iter: T) {
        iter.into_iter().for_each(|rule| self.add_rule(rule));
    }
}
