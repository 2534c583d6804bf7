// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Status-check expressions
//!
//! An [`Expression`] wraps a JSONPath filter predicate such as
//! `@.status.state=="stable"` and decides whether a single object satisfies it.
//!
//! JSONPath filters only operate on lists, so the predicate is compiled into
//! the template `{$.items[?(<condition>)]}` and evaluated against a synthetic
//! document whose `items` list holds the object under test. The object matches
//! when the filter returns exactly one result.
//!
//! # Supported syntax
//!
//! - `$` (document root) and `@` (current item) anchored paths
//! - `.field`, `['field']`, `["field"]` - object field access
//! - `[n]` - array index, negative counts from the end
//! - `.*`, `[*]` - wildcard over object values or array items
//! - `[?(<predicate>)]` - filter, where the predicate is either a bare path
//!   (existence test) or `<operand> <op> <operand>` with `==`, `!=`, `<`,
//!   `<=`, `>`, `>=`
//! - literals: single or double quoted strings, integers, floats, `true`, `false`
//!
//! Comparing against a field that is absent on the object is an evaluation
//! error, not a silent mismatch.

use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::fmt;
use std::iter::Peekable;
use std::str::Chars;
use std::sync::OnceLock;

use crate::error::{Error, Result};

/// Name of the synthetic list the object is wrapped in
const LIST_NAME: &str = "items";

/// Result of evaluating an expression against one object
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Matched,
    NotMatched,
    /// The condition compares a field that the object does not have
    FieldNotFound(String),
}

/// A boolean JSONPath condition, compiled on first use
#[derive(Clone, Default)]
pub struct Expression {
    condition: String,
    compiled: OnceLock<std::result::Result<Template, String>>,
}

impl Expression {
    pub fn new(condition: impl Into<String>) -> Self {
        Self {
            condition: condition.into(),
            compiled: OnceLock::new(),
        }
    }

    pub fn condition(&self) -> &str {
        &self.condition
    }

    /// Parse the condition, memoizing the result (including failures)
    pub fn compile(&self) -> Result<()> {
        self.template().map(|_| ())
    }

    fn template(&self) -> Result<&Template> {
        self.compiled
            .get_or_init(|| {
                if self.condition.trim().is_empty() {
                    return Err("empty condition".to_string());
                }
                let source = format!("{{$.{}[?({})]}}", LIST_NAME, self.condition);
                Parser::new(&source).template()
            })
            .as_ref()
            .map_err(|e| {
                Error::invalid_status_check(format!(
                    "unable to parse jsonpath {:?}: {}",
                    self.condition, e
                ))
            })
    }

    /// Evaluate the condition, reporting absent fields separately from errors
    pub fn evaluate(&self, obj: &Value) -> Result<Outcome> {
        let template = self.template()?;

        let mut list = Map::new();
        list.insert(LIST_NAME.to_string(), Value::Array(vec![obj.clone()]));
        let document = Value::Object(list);

        match template.path.eval(&document, &document) {
            Ok(results) if results.len() == 1 => Ok(Outcome::Matched),
            Ok(_) => Ok(Outcome::NotMatched),
            Err(EvalError::FieldNotFound(field)) => Ok(Outcome::FieldNotFound(field)),
            Err(EvalError::Invalid(what)) => Err(Error::invalid_status_check(format!(
                "failed to execute condition {:?} on object {}: {}",
                self.condition,
                describe(obj),
                what
            ))),
        }
    }

    /// True if the object satisfies the condition.
    ///
    /// Syntax errors, evaluation errors and references to absent fields are all
    /// reported as [`Error::InvalidStatusCheck`].
    pub fn matches(&self, obj: &Value) -> Result<bool> {
        match self.evaluate(obj)? {
            Outcome::Matched => Ok(true),
            Outcome::NotMatched => Ok(false),
            Outcome::FieldNotFound(field) => Err(Error::invalid_status_check(format!(
                "failed to execute condition {:?} on object {}: {} is not found",
                self.condition,
                describe(obj),
                field
            ))),
        }
    }
}

impl fmt::Debug for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expression")
            .field("condition", &self.condition)
            .field("compiled", &self.compiled.get().map(|r| r.is_ok()))
            .finish()
    }
}

impl PartialEq for Expression {
    fn eq(&self, other: &Self) -> bool {
        self.condition == other.condition
    }
}

impl Eq for Expression {}

/// Short identification of an object for diagnostics
fn describe(obj: &Value) -> String {
    let kind = obj.get("kind").and_then(Value::as_str).unwrap_or("object");
    let name = obj
        .get("metadata")
        .and_then(|m| m.get("name"))
        .and_then(Value::as_str)
        .unwrap_or("<unnamed>");
    format!("{}/{}", kind, name)
}

// ---------------------------------------------------------------------------
// Syntax tree

#[derive(Debug, Clone)]
struct Template {
    path: Path,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Root {
    Document,
    Current,
}

#[derive(Debug, Clone)]
struct Path {
    root: Root,
    segments: Vec<Segment>,
}

#[derive(Debug, Clone)]
enum Segment {
    Field(String),
    Index(i64),
    Wildcard,
    Filter(Box<Predicate>),
}

#[derive(Debug, Clone)]
enum Predicate {
    Exists(Path),
    Compare {
        left: Operand,
        op: CompareOp,
        right: Operand,
    },
}

#[derive(Debug, Clone)]
enum Operand {
    Path(Path),
    Literal(Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }

    fn accepts(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::Ne => ordering != Ordering::Equal,
            Self::Lt => ordering == Ordering::Less,
            Self::Le => ordering != Ordering::Greater,
            Self::Gt => ordering == Ordering::Greater,
            Self::Ge => ordering != Ordering::Less,
        }
    }
}

// ---------------------------------------------------------------------------
// Parser

/// Characters that end an unquoted field name
fn is_field_delimiter(c: char) -> bool {
    c.is_whitespace() || ".[]()=!<>'\"{}".contains(c)
}

struct Parser<'a> {
    chars: Peekable<Chars<'a>>,
    pos: usize,
}

type ParseResult<T> = std::result::Result<T, String>;

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
            pos: 0,
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn expect(&mut self, expected: char) -> ParseResult<()> {
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            Some(c) => Err(format!(
                "expected '{}' at position {}, found '{}'",
                expected,
                self.pos - 1,
                c
            )),
            None => Err(format!("expected '{}', found end of input", expected)),
        }
    }

    /// `{` path `}` and nothing after it
    fn template(mut self) -> ParseResult<Template> {
        self.skip_whitespace();
        self.expect('{')?;
        self.skip_whitespace();
        let path = self.path()?;
        self.skip_whitespace();
        self.expect('}')?;
        self.skip_whitespace();
        if let Some(c) = self.peek() {
            return Err(format!("unexpected '{}' at position {}", c, self.pos));
        }
        Ok(Template { path })
    }

    fn path(&mut self) -> ParseResult<Path> {
        let root = match self.bump() {
            Some('$') => Root::Document,
            Some('@') => Root::Current,
            Some(c) => return Err(format!("path must start with '$' or '@', found '{}'", c)),
            None => return Err("expected a path, found end of input".to_string()),
        };

        let mut segments = Vec::new();
        loop {
            match self.peek() {
                Some('.') => {
                    self.bump();
                    if self.peek() == Some('*') {
                        self.bump();
                        segments.push(Segment::Wildcard);
                        continue;
                    }
                    let field = self.field_name();
                    if field.is_empty() {
                        return Err(format!("missing field name at position {}", self.pos));
                    }
                    segments.push(Segment::Field(field));
                }
                Some('[') => {
                    self.bump();
                    segments.push(self.bracket()?);
                }
                _ => break,
            }
        }

        Ok(Path { root, segments })
    }

    fn field_name(&mut self) -> String {
        let mut field = String::new();
        while let Some(c) = self.peek() {
            if is_field_delimiter(c) {
                break;
            }
            field.push(c);
            self.bump();
        }
        field
    }

    /// Everything after an opening `[` up to and including the matching `]`
    fn bracket(&mut self) -> ParseResult<Segment> {
        self.skip_whitespace();
        let segment = match self.peek() {
            Some('?') => {
                self.bump();
                self.skip_whitespace();
                self.expect('(')?;
                let predicate = self.predicate()?;
                self.skip_whitespace();
                self.expect(')')?;
                Segment::Filter(Box::new(predicate))
            }
            Some('*') => {
                self.bump();
                Segment::Wildcard
            }
            Some(q @ ('\'' | '"')) => {
                self.bump();
                Segment::Field(self.quoted(q)?)
            }
            Some(c) if c == '-' || c.is_ascii_digit() => match self.number()? {
                Value::Number(n) => match n.as_i64() {
                    Some(index) => Segment::Index(index),
                    None => return Err(format!("array index must be an integer, found {}", n)),
                },
                other => return Err(format!("invalid array index {}", other)),
            },
            Some(c) => {
                return Err(format!(
                    "unexpected '{}' in brackets at position {}",
                    c, self.pos
                ));
            }
            None => return Err("unterminated '['".to_string()),
        };
        self.skip_whitespace();
        self.expect(']')?;
        Ok(segment)
    }

    fn predicate(&mut self) -> ParseResult<Predicate> {
        self.skip_whitespace();
        let left = self.operand()?;
        self.skip_whitespace();

        if self.peek() == Some(')') {
            return match left {
                Operand::Path(path) => Ok(Predicate::Exists(path)),
                Operand::Literal(value) => Err(format!(
                    "filter must test a path, found literal {}",
                    value
                )),
            };
        }

        let op = self.compare_op()?;
        self.skip_whitespace();
        let right = self.operand()?;
        Ok(Predicate::Compare { left, op, right })
    }

    fn compare_op(&mut self) -> ParseResult<CompareOp> {
        let first = self
            .bump()
            .ok_or_else(|| "expected comparison operator, found end of input".to_string())?;
        let followed_by_eq = self.peek() == Some('=');
        let op = match (first, followed_by_eq) {
            ('=', true) => CompareOp::Eq,
            ('!', true) => CompareOp::Ne,
            ('<', true) => CompareOp::Le,
            ('>', true) => CompareOp::Ge,
            ('<', false) => CompareOp::Lt,
            ('>', false) => CompareOp::Gt,
            _ => {
                return Err(format!(
                    "unrecognized operator '{}' at position {}",
                    first,
                    self.pos - 1
                ));
            }
        };
        if followed_by_eq {
            self.bump();
        }
        Ok(op)
    }

    fn operand(&mut self) -> ParseResult<Operand> {
        match self.peek() {
            Some('@' | '$') => Ok(Operand::Path(self.path()?)),
            Some(q @ ('\'' | '"')) => {
                self.bump();
                Ok(Operand::Literal(Value::String(self.quoted(q)?)))
            }
            Some(c) if c == '-' || c.is_ascii_digit() => Ok(Operand::Literal(self.number()?)),
            Some(c) if c.is_ascii_alphabetic() => {
                let word = self.field_name();
                match word.as_str() {
                    "true" => Ok(Operand::Literal(Value::Bool(true))),
                    "false" => Ok(Operand::Literal(Value::Bool(false))),
                    _ => Err(format!("unrecognized identifier '{}'", word)),
                }
            }
            Some(c) => Err(format!("unexpected '{}' at position {}", c, self.pos)),
            None => Err("expected an operand, found end of input".to_string()),
        }
    }

    /// Body of a quoted string; the opening quote is already consumed
    fn quoted(&mut self, quote: char) -> ParseResult<String> {
        let mut text = String::new();
        loop {
            match self.bump() {
                Some('\\') => match self.bump() {
                    Some(c) => text.push(c),
                    None => return Err("unterminated string".to_string()),
                },
                Some(c) if c == quote => return Ok(text),
                Some(c) => text.push(c),
                None => return Err("unterminated string".to_string()),
            }
        }
    }

    fn number(&mut self) -> ParseResult<Value> {
        let mut text = String::new();
        if self.peek() == Some('-') {
            text.push('-');
            self.bump();
        }
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == '.' || c == 'e' || c == 'E' {
                text.push(c);
                self.bump();
            } else {
                break;
            }
        }
        if let Ok(int) = text.parse::<i64>() {
            return Ok(Value::from(int));
        }
        text.parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| format!("invalid number '{}'", text))
    }
}

// ---------------------------------------------------------------------------
// Evaluation

#[derive(Debug)]
enum EvalError {
    FieldNotFound(String),
    Invalid(String),
}

type EvalResult<T> = std::result::Result<T, EvalError>;

impl Path {
    fn eval<'v>(&self, document: &'v Value, current: &'v Value) -> EvalResult<Vec<&'v Value>> {
        let start = match self.root {
            Root::Document => document,
            Root::Current => current,
        };
        let mut values = vec![start];
        for segment in &self.segments {
            values = segment.apply(values, document)?;
        }
        Ok(values)
    }

    /// Render the path the way it was written, for diagnostics
    fn display(&self) -> String {
        let mut out = String::from(match self.root {
            Root::Document => "$",
            Root::Current => "@",
        });
        for segment in &self.segments {
            match segment {
                Segment::Field(name) => {
                    out.push('.');
                    out.push_str(name);
                }
                Segment::Index(i) => out.push_str(&format!("[{}]", i)),
                Segment::Wildcard => out.push_str("[*]"),
                Segment::Filter(_) => out.push_str("[?(...)]"),
            }
        }
        out
    }
}

impl Segment {
    fn apply<'v>(&self, values: Vec<&'v Value>, document: &'v Value) -> EvalResult<Vec<&'v Value>> {
        let mut results = Vec::new();
        match self {
            Segment::Field(name) => {
                results.extend(values.into_iter().filter_map(|v| v.get(name.as_str())));
                if results.is_empty() {
                    return Err(EvalError::FieldNotFound(name.clone()));
                }
            }
            Segment::Index(index) => {
                for value in values {
                    let items = value.as_array().ok_or_else(|| {
                        EvalError::Invalid(format!("{} is not array or slice", kind_of(value)))
                    })?;
                    let len = items.len() as i64;
                    let resolved = if *index < 0 { len + index } else { *index };
                    if resolved < 0 || resolved >= len {
                        return Err(EvalError::Invalid(format!(
                            "array index out of bounds: index {}, length {}",
                            index, len
                        )));
                    }
                    results.push(&items[resolved as usize]);
                }
            }
            Segment::Wildcard => {
                for value in values {
                    match value {
                        Value::Array(items) => results.extend(items.iter()),
                        Value::Object(map) => results.extend(map.values()),
                        _ => {}
                    }
                }
            }
            Segment::Filter(predicate) => {
                for value in values {
                    let items = value.as_array().ok_or_else(|| {
                        EvalError::Invalid(format!("{} is not array or slice", kind_of(value)))
                    })?;
                    for item in items {
                        if predicate.test(document, item)? {
                            results.push(item);
                        }
                    }
                }
            }
        }
        Ok(results)
    }
}

impl Predicate {
    fn test(&self, document: &Value, item: &Value) -> EvalResult<bool> {
        match self {
            Predicate::Exists(path) => Ok(path
                .eval(document, item)
                .map(|found| !found.is_empty())
                .unwrap_or(false)),
            Predicate::Compare { left, op, right } => {
                let lhs = left.resolve(document, item)?;
                let rhs = right.resolve(document, item)?;
                compare(lhs, *op, rhs)
            }
        }
    }
}

impl Operand {
    fn resolve<'v>(&'v self, document: &'v Value, item: &'v Value) -> EvalResult<&'v Value> {
        match self {
            Operand::Literal(value) => Ok(value),
            Operand::Path(path) => {
                let found = path.eval(document, item)?;
                match found.as_slice() {
                    [single] => Ok(single),
                    [] => Err(EvalError::FieldNotFound(path.display())),
                    _ => Err(EvalError::Invalid(format!(
                        "{} resolves to {} elements, can only compare one element at a time",
                        path.display(),
                        found.len()
                    ))),
                }
            }
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "map",
    }
}

fn compare(lhs: &Value, op: CompareOp, rhs: &Value) -> EvalResult<bool> {
    let ordering = match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => a.cmp(&b),
            _ => {
                let (a, b) = (a.as_f64().unwrap_or(f64::NAN), b.as_f64().unwrap_or(f64::NAN));
                a.partial_cmp(&b).ok_or_else(|| {
                    EvalError::Invalid(format!("cannot compare {} and {}", a, b))
                })?
            }
        },
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Bool(a), Value::Bool(b)) if matches!(op, CompareOp::Eq | CompareOp::Ne) => {
            a.cmp(b)
        }
        (Value::Null, Value::Null) if matches!(op, CompareOp::Eq | CompareOp::Ne) => {
            Ordering::Equal
        }
        _ => {
            return Err(EvalError::Invalid(format!(
                "incompatible types for comparison: {} {} {}",
                kind_of(lhs),
                op.symbol(),
                kind_of(rhs)
            )));
        }
    };
    Ok(op.accepts(ordering))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resource(state: &str) -> Value {
        json!({
            "apiVersion": "example.com/v1",
            "kind": "Resource",
            "metadata": {"name": "test-resource", "namespace": "target-infra"},
            "status": {"state": state, "replicas": 3, "ready": true}
        })
    }

    #[test]
    fn test_match_equal_string() {
        let expr = Expression::new(r#"@.status.state=="stable""#);
        assert!(expr.matches(&resource("stable")).unwrap());
        assert!(!expr.matches(&resource("pending")).unwrap());
    }

    #[test]
    fn test_single_quotes_and_spaces() {
        let expr = Expression::new("@.status.state == 'stable'");
        assert!(expr.matches(&resource("stable")).unwrap());
    }

    #[test]
    fn test_not_equal() {
        let expr = Expression::new(r#"@.status.state!="stable""#);
        assert!(!expr.matches(&resource("stable")).unwrap());
        assert!(expr.matches(&resource("pending")).unwrap());
    }

    #[test]
    fn test_numeric_comparisons() {
        let obj = resource("stable");
        assert!(Expression::new("@.status.replicas==3").matches(&obj).unwrap());
        assert!(Expression::new("@.status.replicas>=3").matches(&obj).unwrap());
        assert!(Expression::new("@.status.replicas>2").matches(&obj).unwrap());
        assert!(Expression::new("@.status.replicas<3.5").matches(&obj).unwrap());
        assert!(!Expression::new("@.status.replicas<=2").matches(&obj).unwrap());
        assert!(!Expression::new("@.status.replicas<-1").matches(&obj).unwrap());
    }

    #[test]
    fn test_bool_comparison() {
        let obj = resource("stable");
        assert!(Expression::new("@.status.ready==true").matches(&obj).unwrap());
        assert!(!Expression::new("@.status.ready==false").matches(&obj).unwrap());
        assert!(Expression::new("@.status.ready<true").matches(&obj).is_err());
    }

    #[test]
    fn test_existence_filter() {
        let obj = resource("stable");
        assert!(Expression::new("@.status.state").matches(&obj).unwrap());
        // existence test never errors on absent fields
        assert!(!Expression::new("@.status.missing").matches(&obj).unwrap());
    }

    #[test]
    fn test_bracket_and_index_access() {
        let obj = json!({
            "metadata": {"name": "x", "labels": {"app.kubernetes.io/name": "web"}},
            "status": {"conditions": [
                {"type": "Ready", "status": "True"},
                {"type": "Synced", "status": "False"}
            ]}
        });
        assert!(
            Expression::new(r#"@.metadata.labels['app.kubernetes.io/name']=="web""#)
                .matches(&obj)
                .unwrap()
        );
        assert!(
            Expression::new(r#"@.status.conditions[0].status=="True""#)
                .matches(&obj)
                .unwrap()
        );
        assert!(
            Expression::new(r#"@.status.conditions[-1].type=="Synced""#)
                .matches(&obj)
                .unwrap()
        );
    }

    #[test]
    fn test_nested_filter() {
        let obj = json!({
            "metadata": {"name": "x"},
            "status": {"conditions": [
                {"type": "Ready", "status": "True"},
                {"type": "Synced", "status": "False"}
            ]}
        });
        let expr = Expression::new(r#"@.status.conditions[?(@.type=="Ready")].status=="True""#);
        assert!(expr.matches(&obj).unwrap());
    }

    #[test]
    fn test_missing_field_is_error_not_mismatch() {
        let expr = Expression::new(r#"@.status.phase=="Running""#);
        let err = expr.matches(&resource("stable")).unwrap_err();
        assert!(matches!(err, Error::InvalidStatusCheck { .. }));
        assert!(err.to_string().contains("is not found"));

        assert_eq!(
            expr.evaluate(&resource("stable")).unwrap(),
            Outcome::FieldNotFound("phase".to_string())
        );
    }

    #[test]
    fn test_missing_status_block() {
        let expr = Expression::new(r#"@.status.state=="stable""#);
        let obj = json!({"kind": "Resource", "metadata": {"name": "bare"}});
        assert_eq!(
            expr.evaluate(&obj).unwrap(),
            Outcome::FieldNotFound("status".to_string())
        );
    }

    #[test]
    fn test_malformed_conditions() {
        let obj = resource("stable");
        for condition in [
            "",
            "   ",
            r#"@.status.state[=="stable""#,
            r#"@.status.state=="stable"#,
            "@.status.state===",
            "@.status.state=~'x'",
            "status.state=='stable'",
            "@.status.state=='stable')]}{$.x",
            "'stable'",
            "@.status.state==stable",
        ] {
            let expr = Expression::new(condition);
            let err = expr.matches(&obj).unwrap_err();
            assert!(
                matches!(err, Error::InvalidStatusCheck { .. }),
                "condition {:?} gave {:?}",
                condition,
                err
            );
        }
    }

    #[test]
    fn test_incompatible_types() {
        let expr = Expression::new("@.status.state==3");
        let err = expr.matches(&resource("stable")).unwrap_err();
        assert!(err.to_string().contains("incompatible types"));
    }

    #[test]
    fn test_compile_is_memoized() {
        let expr = Expression::new(r#"@.status.state=="stable""#);
        assert!(expr.compiled.get().is_none());
        expr.compile().unwrap();
        assert!(expr.compiled.get().is_some());
        // reuse across calls and clones
        let cloned = expr.clone();
        assert!(cloned.compiled.get().is_some());
        assert!(cloned.matches(&resource("stable")).unwrap());

        let bad = Expression::new("@.status[");
        assert!(bad.compile().is_err());
        assert!(bad.compiled.get().is_some());
        assert!(bad.compile().is_err());
    }

    #[test]
    fn test_concurrent_first_use() {
        let expr = std::sync::Arc::new(Expression::new(r#"@.status.state=="stable""#));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let expr = expr.clone();
                std::thread::spawn(move || expr.matches(&resource("stable")).unwrap())
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap());
        }
    }

    #[test]
    fn test_equality_ignores_compilation_state() {
        let a = Expression::new("@.status.state=='x'");
        let b = Expression::new("@.status.state=='x'");
        a.compile().unwrap();
        assert_eq!(a, b);
    }
}
