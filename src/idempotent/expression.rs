//! Key expressions evaluated over a protected call
//!
//! A deliberately small expression language:
//!
//! ```text
//! expr     := term ('+' term)*
//! term     := 'literal' | number | variable
//! variable := '#' ident accessor*
//! accessor := '.' ident | '[' index ']' | '[' 'key' ']'
//! ```
//!
//! Variables resolve against argument names first, then positional
//! aliases (`#p0`, `#a0`), then `#root.methodName`, `#root.targetClass`
//! and `#root.args`. `+` adds two numbers and concatenates anything else.

use super::model::Invocation;
use serde_json::Value;
use std::iter::Peekable;
use std::str::CharIndices;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason} (at {position} in '{source_text}')")]
pub struct KeyExpressionError {
    pub source_text: String,
    pub position: usize,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
enum Accessor {
    Field(String),
    Index(usize),
}

#[derive(Debug, Clone, PartialEq)]
enum Root {
    Variable(String),
    MethodName,
    TargetClass,
    Args,
}

#[derive(Debug, Clone, PartialEq)]
enum Term {
    Literal(Value),
    Path { root: Root, accessors: Vec<Accessor> },
}

/// A parsed key expression, reusable across calls
#[derive(Debug, Clone, PartialEq)]
pub struct KeyExpression {
    source: String,
    terms: Vec<Term>,
}

impl KeyExpression {
    pub fn parse(source: &str) -> Result<Self, KeyExpressionError> {
        let mut parser = Parser::new(source);
        let mut terms = vec![parser.term()?];
        loop {
            parser.skip_whitespace();
            match parser.peek() {
                None => break,
                Some('+') => {
                    parser.bump();
                    terms.push(parser.term()?);
                }
                Some(c) => return Err(parser.error(format!("unexpected '{c}'"))),
            }
        }
        Ok(Self {
            source: source.to_string(),
            terms,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate to the key segment; null or blank results are errors
    pub fn evaluate(&self, invocation: &Invocation) -> Result<String, KeyExpressionError> {
        let mut acc: Option<Value> = None;
        for term in &self.terms {
            let value = self.resolve(term, invocation)?;
            acc = Some(match acc {
                None => value,
                Some(left) => concat(left, value),
            });
        }

        let rendered = match acc {
            Some(Value::Null) | None => return Err(self.error(0, "expression evaluated to null")),
            Some(value) => render(&value),
        };
        if rendered.trim().is_empty() {
            return Err(self.error(0, "expression evaluated to a blank key"));
        }
        Ok(rendered)
    }

    fn resolve(&self, term: &Term, invocation: &Invocation) -> Result<Value, KeyExpressionError> {
        let (root, accessors) = match term {
            Term::Literal(value) => return Ok(value.clone()),
            Term::Path { root, accessors } => (root, accessors),
        };

        let mut current = match root {
            Root::MethodName => Value::String(invocation.method.clone()),
            Root::TargetClass => Value::String(invocation.target_type.clone()),
            Root::Args => Value::Array(invocation.args.iter().map(|a| a.value.clone()).collect()),
            Root::Variable(name) => self.variable(name, invocation)?,
        };

        for accessor in accessors {
            current = match (accessor, current) {
                (Accessor::Field(field), Value::Object(mut map)) => {
                    map.remove(field).unwrap_or(Value::Null)
                }
                (Accessor::Index(i), Value::Array(mut items)) if *i < items.len() => {
                    items.swap_remove(*i)
                }
                (Accessor::Index(i), Value::Array(items)) => {
                    return Err(self.error(
                        0,
                        format!("index {i} out of bounds for {} elements", items.len()),
                    ))
                }
                (Accessor::Field(field), _) => {
                    return Err(self.error(0, format!("cannot read field '{field}' here")))
                }
                (Accessor::Index(i), _) => {
                    return Err(self.error(0, format!("cannot index [{i}] a non-array value")))
                }
            };
        }
        Ok(current)
    }

    fn variable(&self, name: &str, invocation: &Invocation) -> Result<Value, KeyExpressionError> {
        if let Some(value) = invocation.arg_value(name) {
            return Ok(value.clone());
        }
        let positional = name
            .strip_prefix('p')
            .or_else(|| name.strip_prefix('a'))
            .and_then(|index| index.parse::<usize>().ok());
        match positional.and_then(|i| invocation.args.get(i)) {
            Some(arg) => Ok(arg.value.clone()),
            None => Err(self.error(0, format!("unknown variable '#{name}'"))),
        }
    }

    fn error(&self, position: usize, reason: impl Into<String>) -> KeyExpressionError {
        KeyExpressionError {
            source_text: self.source.clone(),
            position,
            reason: reason.into(),
        }
    }
}

fn concat(left: Value, right: Value) -> Value {
    match (&left, &right) {
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(x), Some(y)) => x
                .checked_add(y)
                .map(Value::from)
                .unwrap_or_else(|| Value::from(x as f64 + y as f64)),
            _ => Value::from(a.as_f64().unwrap_or(0.0) + b.as_f64().unwrap_or(0.0)),
        },
        _ => Value::String(format!("{}{}", render(&left), render(&right))),
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

struct Parser<'a> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn bump(&mut self) -> Option<char> {
        self.chars.next().map(|(_, c)| c)
    }

    fn position(&mut self) -> usize {
        self.chars
            .peek()
            .map(|(i, _)| *i)
            .unwrap_or(self.source.len())
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn error(&mut self, reason: impl Into<String>) -> KeyExpressionError {
        KeyExpressionError {
            source_text: self.source.to_string(),
            position: self.position(),
            reason: reason.into(),
        }
    }

    fn term(&mut self) -> Result<Term, KeyExpressionError> {
        self.skip_whitespace();
        match self.peek() {
            Some('\'') => Ok(Term::Literal(Value::String(self.string_literal()?))),
            Some(c) if c.is_ascii_digit() || c == '-' => self.number(),
            Some('#') => self.path(),
            Some(c) => Err(self.error(format!("unexpected '{c}'"))),
            None => Err(self.error("expected a term")),
        }
    }

    fn string_literal(&mut self) -> Result<String, KeyExpressionError> {
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string literal")),
                Some('\'') if self.peek() == Some('\'') => {
                    self.bump();
                    out.push('\'');
                }
                Some('\'') => return Ok(out),
                Some(c) => out.push(c),
            }
        }
    }

    fn number(&mut self) -> Result<Term, KeyExpressionError> {
        let mut raw = String::new();
        if self.peek() == Some('-') {
            raw.push('-');
            self.bump();
        }
        while let Some(c) = self.peek().filter(|c| c.is_ascii_digit() || *c == '.') {
            raw.push(c);
            self.bump();
        }
        if let Ok(int) = raw.parse::<i64>() {
            return Ok(Term::Literal(Value::from(int)));
        }
        match raw.parse::<f64>() {
            Ok(float) => Ok(Term::Literal(Value::from(float))),
            Err(_) => Err(self.error(format!("invalid number '{raw}'"))),
        }
    }

    fn identifier(&mut self) -> Result<String, KeyExpressionError> {
        let mut ident = String::new();
        while let Some(c) = self.peek().filter(|c| c.is_alphanumeric() || *c == '_') {
            ident.push(c);
            self.bump();
        }
        if ident.is_empty() {
            return Err(self.error("expected an identifier"));
        }
        Ok(ident)
    }

    fn path(&mut self) -> Result<Term, KeyExpressionError> {
        self.bump();
        let head = self.identifier()?;
        let root = if head == "root" {
            if self.bump() != Some('.') {
                return Err(self.error("expected '.' after #root"));
            }
            match self.identifier()?.as_str() {
                "methodName" => Root::MethodName,
                "targetClass" => Root::TargetClass,
                "args" => Root::Args,
                other => return Err(self.error(format!("unknown #root property '{other}'"))),
            }
        } else {
            Root::Variable(head)
        };

        let mut accessors = Vec::new();
        loop {
            match self.peek() {
                Some('.') => {
                    self.bump();
                    accessors.push(Accessor::Field(self.identifier()?));
                }
                Some('[') => {
                    self.bump();
                    self.skip_whitespace();
                    let accessor = if self.peek() == Some('\'') {
                        Accessor::Field(self.string_literal()?)
                    } else {
                        let mut digits = String::new();
                        while let Some(c) = self.peek().filter(char::is_ascii_digit) {
                            digits.push(c);
                            self.bump();
                        }
                        let index = digits
                            .parse::<usize>()
                            .map_err(|_| self.error("expected an index"))?;
                        Accessor::Index(index)
                    };
                    self.skip_whitespace();
                    if self.bump() != Some(']') {
                        return Err(self.error("expected ']'"));
                    }
                    accessors.push(accessor);
                }
                _ => break,
            }
        }
        Ok(Term::Path { root, accessors })
    }
}
