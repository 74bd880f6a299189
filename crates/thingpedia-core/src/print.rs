//! Serialization of syntax trees back to source text
//!
//! The layout is deterministic: printing the same tree twice yields the same
//! text, and the output parses back to an equivalent tree.

use std::fmt::Write;
use thiserror::Error;

use crate::ast::*;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SerializeError {
    #[error("Cannot serialize non-finite number {0}")]
    NonFiniteNumber(f64),
    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),
    #[error("Example #{0} in dataset {1} has an empty program")]
    EmptyProgram(usize, String),
    #[error("Formatting failed")]
    Format(#[from] std::fmt::Error),
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_class_name(s: &str) -> bool {
    !s.is_empty()
        && s.split('.').all(|seg| {
            !seg.is_empty()
                && seg
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        })
}

fn check_identifier(s: &str) -> Result<&str, SerializeError> {
    if is_identifier(s) {
        Ok(s)
    } else {
        Err(SerializeError::InvalidIdentifier(s.to_string()))
    }
}

fn check_class_name(s: &str) -> Result<&str, SerializeError> {
    if is_class_name(s) {
        Ok(s)
    } else {
        Err(SerializeError::InvalidIdentifier(s.to_string()))
    }
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('"');
}

fn write_number(out: &mut String, n: f64) -> Result<(), SerializeError> {
    if !n.is_finite() {
        return Err(SerializeError::NonFiniteNumber(n));
    }
    write!(out, "{}", n)?;
    Ok(())
}

fn write_value(out: &mut String, value: &Value) -> Result<(), SerializeError> {
    match value {
        Value::String(s) => write_string(out, s),
        Value::Number(n) => write_number(out, *n)?,
        Value::Boolean(b) => write!(out, "{}", b)?,
        Value::Measure(n, unit) => {
            write_number(out, *n)?;
            out.push_str(check_identifier(unit)?);
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_value(out, item)?;
            }
            out.push(']');
        }
        Value::Object(entries) => {
            out.push('{');
            write_named_values(out, entries)?;
            out.push('}');
        }
        Value::ArgMap(entries) => {
            out.push_str("makeArgMap(");
            for (i, (name, type_)) in entries.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write!(out, "{}:{}", check_identifier(name)?, type_)?;
            }
            out.push(')');
        }
        Value::Enum(name) => write!(out, "enum({})", check_identifier(name)?)?,
        Value::Entity { value, entity_type } => {
            write_string(out, value);
            write!(out, "^^{}", entity_type)?;
        }
        Value::Undefined => out.push_str("$?"),
    }
    Ok(())
}

fn write_named_values(out: &mut String, entries: &[(String, Value)]) -> Result<(), SerializeError> {
    for (i, (name, value)) in entries.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write!(out, "{}=", check_identifier(name)?)?;
        write_value(out, value)?;
    }
    Ok(())
}

/// One `#_[k=v]` / `#[k=v]` block per line, each prefixed by `indent`
fn write_annotations(
    out: &mut String,
    indent: &str,
    metadata: &Annotations,
    annotations: &Annotations,
) -> Result<(), SerializeError> {
    for (prefix, list) in [("#_[", metadata), ("#[", annotations)] {
        for (key, value) in list.iter() {
            write!(out, "\n{}{}{}=", indent, prefix, check_identifier(key)?)?;
            write_value(out, value)?;
            out.push(']');
        }
    }
    Ok(())
}

/// Inline annotations, space separated, used for parameters
fn write_inline_annotations(
    out: &mut String,
    metadata: &Annotations,
    annotations: &Annotations,
) -> Result<(), SerializeError> {
    for (prefix, list) in [("#_[", metadata), ("#[", annotations)] {
        for (key, value) in list.iter() {
            write!(out, " {}{}=", prefix, check_identifier(key)?)?;
            write_value(out, value)?;
            out.push(']');
        }
    }
    Ok(())
}

impl ClassDef {
    pub fn prettyprint(&self) -> Result<String, SerializeError> {
        let mut out = String::new();
        self.write(&mut out)?;
        Ok(out)
    }

    fn write(&self, out: &mut String) -> Result<(), SerializeError> {
        if self.is_abstract {
            out.push_str("abstract ");
        }
        write!(out, "class @{}", check_class_name(&self.kind)?)?;
        if !self.extends.is_empty() {
            out.push_str(" extends ");
            for (i, parent) in self.extends.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write!(out, "@{}", check_class_name(parent)?)?;
            }
        }
        write_annotations(out, "", &self.metadata, &self.annotations)?;
        out.push_str(" {\n");

        for import in &self.imports {
            write!(
                out,
                "  import {} from @{}(",
                check_identifier(&import.facet)?,
                check_class_name(&import.module)?
            )?;
            write_named_values(out, &import.args)?;
            out.push_str(");\n");
        }

        for entity in &self.entities {
            out.push('\n');
            write!(out, "  entity {}", check_identifier(&entity.name)?)?;
            write_annotations(out, "  ", &entity.metadata, &entity.annotations)?;
            out.push_str(";\n");
        }

        for function in &self.functions {
            out.push('\n');
            out.push_str("  ");
            if function.is_monitorable {
                out.push_str("monitorable ");
            }
            if function.is_list {
                out.push_str("list ");
            }
            write!(out, "{} {}(", function.kind, check_identifier(&function.name)?)?;
            for (i, param) in function.params.iter().enumerate() {
                if i > 0 {
                    out.push_str(",\n    ");
                }
                write!(
                    out,
                    "{} {} : {}",
                    param.direction,
                    check_identifier(&param.name)?,
                    param.type_
                )?;
                write_inline_annotations(out, &param.metadata, &param.annotations)?;
            }
            out.push(')');
            write_annotations(out, "  ", &function.metadata, &function.annotations)?;
            out.push_str(";\n");
        }

        out.push_str("}\n");
        Ok(())
    }
}

impl Dataset {
    pub fn prettyprint(&self) -> Result<String, SerializeError> {
        let mut out = String::new();
        self.write(&mut out)?;
        Ok(out)
    }

    fn write(&self, out: &mut String) -> Result<(), SerializeError> {
        write!(out, "dataset @{} language ", check_class_name(&self.name)?)?;
        write_string(out, &self.language);
        write_annotations(out, "", &Annotations::new(), &self.annotations)?;
        out.push_str(" {\n");

        for (i, example) in self.examples.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            let program = example.body.text.trim();
            if program.is_empty() {
                return Err(SerializeError::EmptyProgram(i, self.name.clone()));
            }
            write!(out, "  {}", example.type_)?;
            if !example.args.is_empty() {
                out.push_str(" (");
                for (j, (name, type_)) in example.args.iter().enumerate() {
                    if j > 0 {
                        out.push_str(", ");
                    }
                    write!(out, "{} : {}", check_identifier(name)?, type_)?;
                }
                out.push(')');
            }
            write!(out, " := {}", program)?;
            write_annotations(out, "  ", &example.metadata, &example.annotations)?;
            out.push_str(";\n");
        }

        out.push_str("}\n");
        Ok(())
    }
}

impl Library {
    pub fn prettyprint(&self) -> Result<String, SerializeError> {
        let mut out = String::new();
        for (i, class) in self.classes.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            class.write(&mut out)?;
        }
        for (i, dataset) in self.datasets.iter().enumerate() {
            if i > 0 || !self.classes.is_empty() {
                out.push('\n');
            }
            dataset.write(&mut out)?;
        }
        Ok(out)
    }
}
