//! Syntax tree for the manifest and dataset language
//!
//! The tree covers what the loader and indexer need: class headers with
//! their annotations, `import` statements (loader and config mixins),
//! function signatures, and datasets of example programs. Example bodies
//! are kept verbatim together with the primitive invocations found in them.

use std::fmt;

/// A literal value appearing in annotations and mixin arguments
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Number(f64),
    Boolean(bool),
    /// A number with a unit, e.g. `5min`
    Measure(f64, String),
    Array(Vec<Value>),
    /// `{ key=value, ... }`, in declaration order
    Object(Vec<(String, Value)>),
    /// `makeArgMap(name:Type, ...)`, in declaration order
    ArgMap(Vec<(String, String)>),
    /// `enum(name)`
    Enum(String),
    /// `"value"^^entity:type`
    Entity { value: String, entity_type: String },
    /// `$?`
    Undefined,
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Short name of the value's shape, for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Number(_) => "number",
            Value::Boolean(_) => "boolean",
            Value::Measure(..) => "measure",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::ArgMap(_) => "argument map",
            Value::Enum(_) => "enum",
            Value::Entity { .. } => "entity",
            Value::Undefined => "undefined",
        }
    }
}

/// Ordered `key=value` annotation list (`#_[...]` or `#[...]`)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Annotations(pub Vec<(String, Value)>);

impl Annotations {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Set a key, replacing an earlier value in place
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, Value)> {
        self.0.iter()
    }
}

/// A parsed source document: any number of classes and datasets
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Library {
    pub classes: Vec<ClassDef>,
    pub datasets: Vec<Dataset>,
}

/// A device class manifest
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDef {
    pub kind: String,
    pub is_abstract: bool,
    pub extends: Vec<String>,
    pub imports: Vec<ImportStmt>,
    pub entities: Vec<EntityDef>,
    pub functions: Vec<FunctionDef>,
    /// Natural-language annotations (`#_[...]`)
    pub metadata: Annotations,
    /// Implementation annotations (`#[...]`)
    pub annotations: Annotations,
}

impl ClassDef {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            is_abstract: false,
            extends: Vec::new(),
            imports: Vec::new(),
            entities: Vec::new(),
            functions: Vec::new(),
            metadata: Annotations::new(),
            annotations: Annotations::new(),
        }
    }

    /// The `import <facet> from @module(...)` statement for a facet, if any
    pub fn import(&self, facet: &str) -> Option<&ImportStmt> {
        self.imports.iter().find(|i| i.facet == facet)
    }

    pub fn function(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.iter().find(|f| f.name == name)
    }
}

/// `import <facet> from @<module>(<args>);`
#[derive(Debug, Clone, PartialEq)]
pub struct ImportStmt {
    pub facet: String,
    pub module: String,
    pub args: Vec<(String, Value)>,
}

impl ImportStmt {
    pub fn arg(&self, name: &str) -> Option<&Value> {
        self.args.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }
}

/// `entity <name> ...;`
#[derive(Debug, Clone, PartialEq)]
pub struct EntityDef {
    pub name: String,
    pub metadata: Annotations,
    pub annotations: Annotations,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Query,
    Action,
}

impl fmt::Display for FunctionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionKind::Query => write!(f, "query"),
            FunctionKind::Action => write!(f, "action"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub kind: FunctionKind,
    pub name: String,
    pub is_list: bool,
    pub is_monitorable: bool,
    pub params: Vec<ParamDef>,
    pub metadata: Annotations,
    pub annotations: Annotations,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamDirection {
    InReq,
    InOpt,
    Out,
}

impl fmt::Display for ParamDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamDirection::InReq => write!(f, "in req"),
            ParamDirection::InOpt => write!(f, "in opt"),
            ParamDirection::Out => write!(f, "out"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamDef {
    pub direction: ParamDirection,
    pub name: String,
    /// Type expression, kept verbatim (e.g. `Entity(tt:picture)`)
    pub type_: String,
    pub metadata: Annotations,
    pub annotations: Annotations,
}

/// `dataset @<name> language "<tag>" { <examples> }`
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub name: String,
    pub language: String,
    pub examples: Vec<Example>,
    pub annotations: Annotations,
}

impl Dataset {
    pub fn new(name: impl Into<String>, language: impl Into<String>, examples: Vec<Example>) -> Self {
        Self {
            name: name.into(),
            language: language.into(),
            examples,
            annotations: Annotations::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExampleType {
    Query,
    Action,
    Stream,
    Program,
}

impl fmt::Display for ExampleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExampleType::Query => write!(f, "query"),
            ExampleType::Action => write!(f, "action"),
            ExampleType::Stream => write!(f, "stream"),
            ExampleType::Program => write!(f, "program"),
        }
    }
}

/// One example program in a dataset
#[derive(Debug, Clone, PartialEq)]
pub struct Example {
    pub type_: ExampleType,
    /// Placeholder arguments, `(p_name : Type, ...)`
    pub args: Vec<(String, String)>,
    pub body: ProgramSource,
    pub metadata: Annotations,
    pub annotations: Annotations,
}

impl Example {
    /// The `#[id=N]` annotation, if present
    pub fn id(&self) -> Option<i64> {
        self.annotations
            .get("id")
            .and_then(Value::as_number)
            .map(|n| n as i64)
    }

    /// The `#_[utterances=[...]]` annotation
    pub fn utterances(&self) -> Vec<&str> {
        self.metadata
            .get("utterances")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Every primitive invocation in the program body, in source order
    pub fn iterate_primitives(&self) -> impl Iterator<Item = &Invocation> {
        self.body.invocations.iter()
    }
}

/// Verbatim program text plus the invocations it contains
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramSource {
    pub text: String,
    pub invocations: Vec<Invocation>,
}

/// A single call of a device function or builtin inside a program
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub selector: Selector,
    pub channel: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    /// A concrete device, `@com.twitter(id=...)`
    Device {
        kind: String,
        attributes: Vec<(String, Value)>,
    },
    /// `now`, `notify`, `return`
    Builtin(String),
}

impl Selector {
    pub fn is_device(&self) -> bool {
        matches!(self, Selector::Device { .. })
    }

    pub fn kind(&self) -> Option<&str> {
        match self {
            Selector::Device { kind, .. } => Some(kind),
            Selector::Builtin(_) => None,
        }
    }
}
