// src/rules/template.rs

use super::expr::Context;
use crate::error::RuleError;
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Text(String),
    Field {
        name: String,
        precision: Option<usize>,
    },
}

/// Action message with `{field}` placeholders.
///
/// `{{` and `}}` produce literal braces and `{field:.2f}` fixes the number
/// of decimals. If any placeholder names a field missing from the context,
/// rendering returns the raw template unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl ActionTemplate {
    pub fn parse(raw: &str) -> Result<Self, RuleError> {
        let mut segments = Vec::new();
        let mut text = String::new();
        let mut chars = raw.char_indices().peekable();

        while let Some((pos, c)) = chars.next() {
            let doubled = chars.peek().is_some_and(|(_, next)| *next == c);
            match c {
                '{' | '}' if doubled => {
                    chars.next();
                    text.push(c);
                }
                '}' => return Err(RuleError::parse(pos, "single '}' in action template")),
                '{' => {
                    let mut inner = String::new();
                    loop {
                        match chars.next() {
                            Some((_, '}')) => break,
                            Some((_, ch)) => inner.push(ch),
                            None => {
                                return Err(RuleError::parse(
                                    pos,
                                    "unclosed '{' in action template",
                                ))
                            }
                        }
                    }
                    if !text.is_empty() {
                        segments.push(Segment::Text(std::mem::take(&mut text)));
                    }
                    segments.push(parse_placeholder(pos, &inner)?);
                }
                c => text.push(c),
            }
        }
        if !text.is_empty() {
            segments.push(Segment::Text(text));
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Names of every placeholder, in order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Field { name, .. } => Some(name.as_str()),
            Segment::Text(_) => None,
        })
    }

    pub fn render(&self, ctx: &Context) -> String {
        let mut out = String::with_capacity(self.raw.len());
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Field { name, precision } => match ctx.get(name) {
                    Some(value) => out.push_str(&format_value(value, *precision)),
                    None => return self.raw.clone(),
                },
            }
        }
        out
    }
}

impl fmt::Display for ActionTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn parse_placeholder(pos: usize, inner: &str) -> Result<Segment, RuleError> {
    let (name, spec) = match inner.split_once(':') {
        Some((name, spec)) => (name.trim(), Some(spec)),
        None => (inner.trim(), None),
    };

    if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Err(RuleError::parse(
            pos,
            format!("invalid placeholder '{{{inner}}}'"),
        ));
    }

    let precision = spec
        .map(|spec| {
            spec.strip_prefix('.')
                .and_then(|digits| digits.strip_suffix('f'))
                .and_then(|digits| digits.parse::<usize>().ok())
                .ok_or_else(|| RuleError::parse(pos, format!("unsupported format ':{spec}'")))
        })
        .transpose()?;

    Ok(Segment::Field {
        name: name.to_string(),
        precision,
    })
}

fn format_value(value: &Value, precision: Option<usize>) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => match (n.as_f64(), precision) {
            (Some(f), Some(precision)) => format!("{f:.precision$}"),
            (Some(f), None) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => {
                format!("{}", f as i64)
            }
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}
