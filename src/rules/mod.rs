//! Business rules: a closed condition language, action templates, an
//! evaluation engine and model-driven synthesis of new rules.

pub mod engine;
pub mod expr;
pub mod synthesis;
pub mod template;

pub use engine::{LogicEngine, Rule};
pub use expr::{Context, Expr};
pub use synthesis::{
    default_context_fields, generate_rule, rule_schema, ContextField, RuleDefinition,
    RuleSynthesizer,
};
pub use template::ActionTemplate;
