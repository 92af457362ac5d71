//! Argument handling for host functions
//!
//! Host functions pop their parameters left to right. A missing trailing
//! parameter is `None`; a parameter that is present but of the wrong type
//! (an explicit `nil` included) is an error. There is no coercion.

use std::collections::VecDeque;
use std::fmt;

use mlua::{MultiValue, Value};
use thiserror::Error;

/// Coarse classification of a script value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Nil,
    Boolean,
    Number,
    String,
    Table,
    Function,
    Other(&'static str),
}

impl ValueKind {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Nil => Self::Nil,
            Value::Boolean(_) => Self::Boolean,
            Value::Integer(_) | Value::Number(_) => Self::Number,
            Value::String(_) => Self::String,
            Value::Table(_) => Self::Table,
            Value::Function(_) => Self::Function,
            other => Self::Other(other.type_name()),
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Nil => "nil",
            Self::Boolean => "boolean",
            Self::Number => "number",
            Self::String => "string",
            Self::Table => "table",
            Self::Function => "function",
            Self::Other(name) => name,
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgError {
    #[error("bad argument #{position}: {expected} expected, got {found}")]
    TypeMismatch {
        position: usize,
        expected: &'static str,
        found: ValueKind,
    },

    #[error("bad argument #{position}: {expected} expected, got no value")]
    Missing {
        position: usize,
        expected: &'static str,
    },
}

impl From<ArgError> for mlua::Error {
    fn from(err: ArgError) -> Self {
        mlua::Error::runtime(err.to_string())
    }
}

/// Remaining arguments of a host function call
#[derive(Debug)]
pub struct Args {
    values: VecDeque<Value>,
    position: usize,
}

impl Args {
    pub fn new(values: MultiValue) -> Self {
        Self {
            values: values.into_iter().collect(),
            position: 0,
        }
    }

    fn pop(&mut self) -> Option<Value> {
        let value = self.values.pop_front()?;
        self.position += 1;
        Some(value)
    }

    /// Next argument as a string, `None` when exhausted
    pub fn pop_string(&mut self) -> Result<Option<String>, ArgError> {
        match self.pop() {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(String::from(s.to_string_lossy()))),
            Some(other) => Err(ArgError::TypeMismatch {
                position: self.position,
                expected: "string",
                found: ValueKind::of(&other),
            }),
        }
    }

    /// Next argument as a string, which must be present
    pub fn require_string(&mut self) -> Result<String, ArgError> {
        let position = self.position + 1;
        self.pop_string()?.ok_or(ArgError::Missing {
            position,
            expected: "string",
        })
    }

    /// All remaining arguments as strings
    pub fn rest_strings(&mut self) -> Result<Vec<String>, ArgError> {
        let mut strings = Vec::with_capacity(self.values.len());
        while let Some(s) = self.pop_string()? {
            strings.push(s);
        }
        Ok(strings)
    }
}
