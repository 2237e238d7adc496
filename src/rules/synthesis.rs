// src/rules/synthesis.rs

//! Turns natural-language rule descriptions into [`Rule`]s through a
//! schema-constrained generation call.

use super::engine::Rule;
use crate::client::GenerativeClient;
use crate::error::{RuleError, SynthesisError};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, instrument, warn};

/// A context field the generated conditions may reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextField {
    pub name: String,
    pub kind: String,
    pub description: String,
}

impl ContextField {
    pub fn new(name: &str, kind: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: kind.to_string(),
            description: description.to_string(),
        }
    }
}

/// Order-processing fields offered to the model when none are configured.
pub fn default_context_fields() -> Vec<ContextField> {
    vec![
        ContextField::new("quantity", "number", "Number of items in the order"),
        ContextField::new("order_total", "number", "Total order amount in dollars"),
        ContextField::new("is_new_customer", "bool", "Whether this is a first-time customer"),
        ContextField::new(
            "membership_tier",
            "string",
            "Customer tier: 'basic', 'premium' or 'vip'",
        ),
        ContextField::new("month", "string", "Current month name, e.g. 'December'"),
        ContextField::new("loyalty_points", "number", "Customer's loyalty points"),
        ContextField::new("category", "string", "Product category"),
    ]
}

/// Response schema sent with every synthesis request.
pub fn rule_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "name": {
                "type": "STRING",
                "description": "Short snake_case identifier for the rule"
            },
            "condition": {
                "type": "STRING",
                "description": "Boolean expression over ctx, e.g. ctx.get('quantity', 0) >= 10"
            },
            "action_message": {
                "type": "STRING",
                "description": "Message produced when the condition holds; may use {field} placeholders"
            },
            "description": {
                "type": "STRING",
                "description": "One sentence explaining the rule"
            }
        },
        "required": ["name", "condition", "action_message"]
    })
}

/// Structured output expected back from the model.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RuleDefinition {
    pub name: String,
    pub condition: String,
    pub action_message: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl RuleDefinition {
    pub fn compile(self) -> Result<Rule, RuleError> {
        let rule = Rule::new(self.name, &self.condition, &self.action_message)?;
        Ok(match self.description {
            Some(description) if !description.trim().is_empty() => {
                rule.with_description(description)
            }
            _ => rule,
        })
    }
}

/// Generates rules with any [`GenerativeClient`].
#[derive(Debug)]
pub struct RuleSynthesizer<'a, C: ?Sized> {
    client: &'a C,
    model: Option<String>,
    fields: Vec<ContextField>,
}

impl<'a, C: GenerativeClient + ?Sized> RuleSynthesizer<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self {
            client,
            model: None,
            fields: default_context_fields(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_fields(mut self, fields: Vec<ContextField>) -> Self {
        self.fields = fields;
        self
    }

    pub fn prompt(&self, description: &str) -> String {
        let fields = self
            .fields
            .iter()
            .map(|f| format!("- {} ({}): {}", f.name, f.kind, f.description))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "You are a rule engine assistant. Convert the following business rule \
             description into a structured rule.\n\n\
             Rule description: \"{description}\"\n\n\
             The condition is evaluated against a context object `ctx` with these fields:\n\
             {fields}\n\n\
             Write the condition using only ctx.get('field', default) lookups, string and \
             number literals, lists like ['a', 'b'], comparisons (== != < <= > >=), \
             membership (in, not in) and the boolean operators and, or, not. \
             Function calls and arithmetic are not available.\n\
             The action message may include context values as {{field}}."
        )
    }

    /// Like [`generate_rule`](Self::generate_rule) but reports why synthesis failed.
    #[instrument(level = "debug", skip(self))]
    pub async fn try_generate_rule(&self, description: &str) -> Result<Rule, SynthesisError> {
        let value = self
            .client
            .call_structured(&self.prompt(description), &rule_schema(), self.model.as_deref())
            .await?;
        let definition: RuleDefinition = serde_json::from_value(value).map_err(RuleError::from)?;
        let rule = definition.compile()?;

        let unknown: Vec<&str> = rule
            .condition()
            .fields()
            .into_iter()
            .filter(|name| !self.fields.iter().any(|f| f.name == *name))
            .collect();
        if !unknown.is_empty() {
            warn!(rule = %rule.name(), fields = ?unknown, "Rule references unknown context fields");
        }

        info!(rule = %rule.name(), condition = %rule.condition_source(), "Rule generated");
        Ok(rule)
    }

    /// One rule per description, or `None` if anything went wrong.
    pub async fn generate_rule(&self, description: &str) -> Option<Rule> {
        match self.try_generate_rule(description).await {
            Ok(rule) => Some(rule),
            Err(e) => {
                warn!(description, error = %e, "Rule synthesis failed");
                None
            }
        }
    }

    /// Generates rules one description at a time, skipping failures.
    pub async fn generate_rules<I>(&self, descriptions: I) -> Vec<Rule>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut rules = Vec::new();
        for description in descriptions {
            if let Some(rule) = self.generate_rule(description.as_ref()).await {
                rules.push(rule);
            }
        }
        rules
    }
}

/// Shorthand for a default [`RuleSynthesizer`] over `client`.
pub async fn generate_rule<C>(client: &C, description: &str) -> Option<Rule>
where
    C: GenerativeClient + ?Sized,
{
    RuleSynthesizer::new(client).generate_rule(description).await
}
