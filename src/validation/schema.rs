//! Declarative form schemas.
//!
//! A schema lists the fields a form accepts. Validation visits every field in
//! declaration order and reports all failures at once.

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::FieldError;

#[derive(Debug, Clone, Copy)]
pub enum Kind {
    Str { min: usize, max: Option<usize> },
    Email { min: usize, max: Option<usize> },
    Float,
    Int,
}

#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub kind: Kind,
    pub required: bool,
}

impl Field {
    pub const fn str(name: &'static str) -> Self {
        Self {
            name,
            kind: Kind::Str { min: 0, max: None },
            required: false,
        }
    }

    pub const fn email(name: &'static str) -> Self {
        Self {
            name,
            kind: Kind::Email { min: 0, max: None },
            required: false,
        }
    }

    pub const fn float(name: &'static str) -> Self {
        Self {
            name,
            kind: Kind::Float,
            required: false,
        }
    }

    pub const fn int(name: &'static str) -> Self {
        Self {
            name,
            kind: Kind::Int,
            required: false,
        }
    }

    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Character bounds; turns numeric fields into plain strings.
    pub const fn length(mut self, min: usize, max: usize) -> Self {
        let max = Some(max);
        self.kind = match self.kind {
            Kind::Email { .. } => Kind::Email { min, max },
            _ => Kind::Str { min, max },
        };
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Float(f64),
    Int(i32),
}

/// Values that passed a schema, keyed by field name. Absent optional fields
/// have no entry.
#[derive(Debug, Default)]
pub struct Validated {
    values: HashMap<&'static str, Value>,
}

impl Validated {
    pub fn str(&mut self, name: &str) -> Option<String> {
        match self.values.remove(name) {
            Some(Value::Str(s)) => Some(s),
            _ => None,
        }
    }

    pub fn float(&mut self, name: &str) -> Option<f64> {
        match self.values.remove(name) {
            Some(Value::Float(v)) => Some(v),
            _ => None,
        }
    }

    pub fn int(&mut self, name: &str) -> Option<i32> {
        match self.values.remove(name) {
            Some(Value::Int(v)) => Some(v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Schema(pub &'static [Field]);

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
}

impl Schema {
    /// Empty or whitespace-only values count as absent.
    pub fn validate(&self, input: &HashMap<String, String>) -> Result<Validated, Vec<FieldError>> {
        let mut validated = Validated::default();
        let mut errors = Vec::new();

        for field in self.0 {
            let raw = input.get(field.name).filter(|v| !v.trim().is_empty());
            let Some(raw) = raw else {
                if field.required {
                    errors.push(FieldError::new(field.name, "value_error.missing", "field required"));
                }
                continue;
            };
            match check(field, raw) {
                Ok(value) => {
                    validated.values.insert(field.name, value);
                }
                Err(e) => errors.push(e),
            }
        }

        if errors.is_empty() {
            Ok(validated)
        } else {
            Err(errors)
        }
    }
}

fn check(field: &Field, raw: &str) -> Result<Value, FieldError> {
    match field.kind {
        Kind::Str { min, max } => {
            check_length(field.name, raw, min, max)?;
            Ok(Value::Str(raw.to_string()))
        }
        Kind::Email { min, max } => {
            let email = normalize_email(raw);
            check_length(field.name, &email, min, max)?;
            if !EMAIL_RE.is_match(&email) {
                return Err(FieldError::new(
                    field.name,
                    "value_error.email",
                    "value is not a valid email address",
                ));
            }
            Ok(Value::Str(email))
        }
        Kind::Float => raw
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(Value::Float)
            .ok_or_else(|| FieldError::new(field.name, "type_error.float", "value is not a valid float")),
        Kind::Int => raw.trim().parse::<i32>().map(Value::Int).map_err(|_| {
            FieldError::new(field.name, "type_error.integer", "value is not a valid integer")
        }),
    }
}

/// Canonical form emails are stored and looked up in.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn check_length(name: &str, raw: &str, min: usize, max: Option<usize>) -> Result<(), FieldError> {
    let chars = raw.chars().count();
    if chars < min {
        return Err(FieldError::new(
            name,
            "value_error.any_str.min_length",
            format!("ensure this value has at least {min} characters"),
        ));
    }
    if let Some(max) = max.filter(|max| chars > *max) {
        return Err(FieldError::new(
            name,
            "value_error.any_str.max_length",
            format!("ensure this value has at most {max} characters"),
        ));
    }
    Ok(())
}
