use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{DbError, DbResult};

/// Size in bytes of one stored attribute
pub const ATTR_SIZE: usize = 16;

/// Longest string an attribute can hold (one byte is kept for the terminator)
pub const MAX_STRING_LEN: usize = ATTR_SIZE - 1;

static NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?$").expect("number pattern is valid")
});

/// Represents an attribute type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttrType {
    Number,
    Str,
}

impl AttrType {
    /// Code stored in the attribute catalog
    pub fn code(self) -> i32 {
        match self {
            AttrType::Number => 0,
            AttrType::Str => 1,
        }
    }

    pub fn from_code(code: i32) -> DbResult<Self> {
        match code {
            0 => Ok(AttrType::Number),
            1 => Ok(AttrType::Str),
            other => Err(DbError::AttrTypeMismatch(format!(
                "unknown attribute type code {}",
                other
            ))),
        }
    }

    /// Parse a type name as written in `CREATE TABLE`
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "NUM" | "NUMBER" => Some(AttrType::Number),
            "STR" | "STRING" => Some(AttrType::Str),
            _ => None,
        }
    }
}

impl fmt::Display for AttrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrType::Number => write!(f, "NUM"),
            AttrType::Str => write!(f, "STR"),
        }
    }
}

/// Represents a single attribute value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Str(String),
}

impl Value {
    pub fn attr_type(&self) -> AttrType {
        match self {
            Value::Number(_) => AttrType::Number,
            Value::Str(_) => AttrType::Str,
        }
    }

    /// Convert user input to a value of the given type
    pub fn parse(text: &str, attr_type: AttrType) -> DbResult<Self> {
        match attr_type {
            AttrType::Number => {
                let text = text.trim();
                if !NUMBER.is_match(text) {
                    return Err(DbError::AttrTypeMismatch(format!(
                        "{:?} is not a number",
                        text
                    )));
                }
                text.parse::<f64>()
                    .map(Value::Number)
                    .map_err(|e| DbError::AttrTypeMismatch(e.to_string()))
            }
            AttrType::Str => {
                if text.len() > MAX_STRING_LEN {
                    return Err(DbError::ValueTooLong(text.to_string()));
                }
                Ok(Value::Str(text.to_string()))
            }
        }
    }

    /// Encode into the fixed-size on-disk form
    ///
    /// Numbers are little-endian `f64` in the first 8 bytes; strings are NUL padded.
    pub fn encode(&self) -> DbResult<[u8; ATTR_SIZE]> {
        let mut bytes = [0u8; ATTR_SIZE];
        match self {
            Value::Number(n) => bytes[..8].copy_from_slice(&n.to_le_bytes()),
            Value::Str(s) => {
                if s.len() > MAX_STRING_LEN {
                    return Err(DbError::ValueTooLong(s.clone()));
                }
                bytes[..s.len()].copy_from_slice(s.as_bytes());
            }
        }
        Ok(bytes)
    }

    /// Decode a stored attribute
    pub fn decode(bytes: &[u8], attr_type: AttrType) -> Self {
        match attr_type {
            AttrType::Number => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(&bytes[..8]);
                Value::Number(f64::from_le_bytes(buf))
            }
            AttrType::Str => {
                let field = &bytes[..ATTR_SIZE.min(bytes.len())];
                let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
                Value::Str(String::from_utf8_lossy(&field[..end]).into_owned())
            }
        }
    }

    /// Order two values; numbers sort before strings
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (Value::Str(a), Value::Str(b)) => a.as_bytes().cmp(b.as_bytes()),
            (Value::Number(_), Value::Str(_)) => Ordering::Less,
            (Value::Str(_), Value::Number(_)) => Ordering::Greater,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            Value::Number(_) => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Str(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::Str(s) => write!(f, "{}", s),
        }
    }
}

/// Comparison operator of a search condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    /// Whether `stored.compare(target)` satisfies the operator
    pub fn matches(self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Ge => ordering != Ordering::Less,
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "=" | "==" => Some(CompareOp::Eq),
            "!=" | "<>" => Some(CompareOp::Ne),
            "<" => Some(CompareOp::Lt),
            "<=" => Some(CompareOp::Le),
            ">" => Some(CompareOp::Gt),
            ">=" => Some(CompareOp::Ge),
            _ => None,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        };
        write!(f, "{}", symbol)
    }
}
