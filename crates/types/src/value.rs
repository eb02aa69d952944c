//! Parameter values carried by template commands.
//!
//! Every parameter of a command holds exactly one [`CompositeValue`]:
//!
//! - a literal known when the template is parsed (`count=3`, `name="my app"`)
//! - a reference to an earlier declaration (`vpc=$myvpc`), resolved to that
//!   declaration's result once it has run
//! - a hole (`keypair={instance.keypair}`) filled by the operator at run time
//!
//! The canonical text form of each value is produced by its `Display`
//! implementation and is re-parsed by the engine's text codec.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// Literal payload of an interface value, or the resolved form of any value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    /// Free-form text.
    String(String),
    /// JSON number (integer or float).
    Number(Number),
    /// `true` or `false`.
    Bool(bool),
    /// Flat list of scalar literals (`[a,b,3]`).
    List(Vec<Literal>),
}

impl Literal {
    /// Converts an opaque JSON value into a literal.
    ///
    /// Returns `None` for `null`, objects, and arrays holding anything but
    /// strings, numbers and booleans: those have no text form.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Array(items) => items.iter().map(Self::scalar_from_json).collect::<Option<Vec<_>>>().map(Self::List),
            scalar => Self::scalar_from_json(scalar),
        }
    }

    fn scalar_from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(text) => Some(Self::String(text.clone())),
            Value::Number(number) => Some(Self::Number(number.clone())),
            Value::Bool(flag) => Some(Self::Bool(*flag)),
            Value::Array(_) | Value::Null | Value::Object(_) => None,
        }
    }

    /// True when the canonical text form re-parses: lists hold scalars only.
    pub fn is_representable(&self) -> bool {
        match self {
            Self::List(items) => items.iter().all(|item| !matches!(item, Self::List(_))),
            _ => true,
        }
    }

    /// Converts the literal into its JSON equivalent.
    pub fn to_json(&self) -> Value {
        match self {
            Self::String(text) => Value::String(text.clone()),
            Self::Number(number) => Value::Number(number.clone()),
            Self::Bool(flag) => Value::Bool(*flag),
            Self::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
        }
    }

    /// Returns the text when this literal is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(text) => Some(text),
            _ => None,
        }
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Literal {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for Literal {
    fn from(value: i64) -> Self {
        Self::Number(Number::from(value))
    }
}

impl From<u64> for Literal {
    fn from(value: u64) -> Self {
        Self::Number(Number::from(value))
    }
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Vec<Literal>> for Literal {
    fn from(value: Vec<Literal>) -> Self {
        Self::List(value)
    }
}

/// Canonical text form.
///
/// Nested lists have none: the grammar only accepts flat lists. Check
/// [`Literal::is_representable`] before rendering values of unknown shape.
impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_assert!(self.is_representable(), "nested list literals have no text form");
        match self {
            Self::String(text) if is_bare_word(text) => f.write_str(text),
            Self::String(text) => write_quoted(f, text),
            Self::Number(number) => write!(f, "{number}"),
            Self::Bool(flag) => write!(f, "{flag}"),
            Self::List(items) => {
                f.write_str("[")?;
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

/// A parameter value: literal, reference, or hole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompositeValue {
    /// Value known at parse time.
    Interface(Literal),
    /// Name of an earlier declaration whose result supplies the value.
    Reference(String),
    /// Name of an input slot filled at execution time.
    Hole(String),
}

impl CompositeValue {
    /// Builds an interface value from anything convertible into a literal.
    pub fn literal(value: impl Into<Literal>) -> Self {
        Self::Interface(value.into())
    }

    /// Builds a reference to the declaration named `identifier`.
    pub fn reference(identifier: impl Into<String>) -> Self {
        Self::Reference(identifier.into())
    }

    /// Builds a hole named `name`.
    pub fn hole(name: impl Into<String>) -> Self {
        Self::Hole(name.into())
    }

    /// Returns the referenced identifier for reference values.
    pub fn as_reference(&self) -> Option<&str> {
        match self {
            Self::Reference(identifier) => Some(identifier),
            _ => None,
        }
    }

    /// Returns the hole name for hole values.
    pub fn as_hole(&self) -> Option<&str> {
        match self {
            Self::Hole(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for CompositeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interface(literal) => write!(f, "{literal}"),
            Self::Reference(identifier) => write!(f, "${identifier}"),
            Self::Hole(name) => write!(f, "{{{name}}}"),
        }
    }
}

/// Characters that terminate an unquoted word.
pub fn is_word_delimiter(character: char) -> bool {
    character.is_whitespace() || matches!(character, '=' | ',' | '[' | ']')
}

/// Interprets an unquoted word as a literal.
///
/// `true`/`false` become booleans, anything JSON accepts as a number becomes a
/// number, everything else stays text.
pub fn classify_bare_word(word: &str) -> Literal {
    match word {
        "true" => Literal::Bool(true),
        "false" => Literal::Bool(false),
        _ => match word.parse::<Number>() {
            Ok(number) => Literal::Number(number),
            Err(_) => Literal::String(word.to_string()),
        },
    }
}

/// Returns true when `text` survives being written without quotes.
fn is_bare_word(text: &str) -> bool {
    let Some(first) = text.chars().next() else {
        return false;
    };
    if matches!(first, '$' | '{' | '"' | '\'' | '#') {
        return false;
    }
    if text.chars().any(is_word_delimiter) {
        return false;
    }
    matches!(classify_bare_word(text), Literal::String(_))
}

fn write_quoted(f: &mut fmt::Formatter<'_>, text: &str) -> fmt::Result {
    f.write_str("\"")?;
    for character in text.chars() {
        match character {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            '\r' => f.write_str("\\r")?,
            other => write!(f, "{other}")?,
        }
    }
    f.write_str("\"")
}
