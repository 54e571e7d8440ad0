//! Attribute schemas for resource kinds
//!
//! A schema lists every attribute a kind exposes together with its
//! mutability class. The planner relies on it to decide which attributes
//! take part in diffing and whether a change can be applied in place.

use serde::Serialize;
use std::fmt;

/// Value type of an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    String,
    Bool,
    Int,
    /// One of a fixed set of strings
    Enum(&'static [&'static str]),
    /// Nested list of blocks
    List,
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => write!(f, "string"),
            Self::Bool => write!(f, "bool"),
            Self::Int => write!(f, "int"),
            Self::Enum(values) => write!(f, "enum({})", values.join("|")),
            Self::List => write!(f, "list"),
        }
    }
}

/// Mutability class of an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Must be declared
    Required,
    /// May be declared, otherwise a default applies
    Optional,
    /// Set by the remote side only
    Computed,
    /// May be declared; when omitted the remote value is kept
    OptionalComputed,
}

impl Mode {
    /// Whether users can set this attribute
    pub fn is_declarable(&self) -> bool {
        !matches!(self, Self::Computed)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Required => "required",
            Self::Optional => "optional",
            Self::Computed => "computed",
            Self::OptionalComputed => "optional+computed",
        };
        f.write_str(s)
    }
}

/// A single attribute definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attribute {
    pub name: &'static str,
    pub kind: AttributeType,
    pub mode: Mode,
    /// Changing the value requires destroying and recreating the instance
    pub force_new: bool,
    /// Default shown in schema output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    pub description: &'static str,
}

impl Attribute {
    const fn new(name: &'static str, kind: AttributeType, mode: Mode) -> Self {
        Self {
            name,
            kind,
            mode,
            force_new: false,
            default: None,
            description: "",
        }
    }

    pub const fn required(name: &'static str, kind: AttributeType) -> Self {
        Self::new(name, kind, Mode::Required)
    }

    pub const fn optional(name: &'static str, kind: AttributeType) -> Self {
        Self::new(name, kind, Mode::Optional)
    }

    pub const fn computed(name: &'static str, kind: AttributeType) -> Self {
        Self::new(name, kind, Mode::Computed)
    }

    pub const fn optional_computed(name: &'static str, kind: AttributeType) -> Self {
        Self::new(name, kind, Mode::OptionalComputed)
    }

    /// Mark the attribute as requiring replacement when changed
    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn default_value(mut self, value: impl fmt::Display) -> Self {
        self.default = Some(value.to_string());
        self
    }

    pub fn describe(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }
}

/// Schema of a resource kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Schema {
    pub type_name: &'static str,
    pub attributes: Vec<Attribute>,
}

impl Schema {
    pub fn new(type_name: &'static str, attributes: Vec<Attribute>) -> Self {
        Self {
            type_name,
            attributes,
        }
    }

    /// Look up an attribute by name
    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Attributes users can declare, in schema order
    pub fn declarable(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.iter().filter(|a| a.mode.is_declarable())
    }

    /// Whether any declarable attribute can change without replacement
    pub fn supports_update(&self) -> bool {
        self.declarable().any(|a| !a.force_new)
    }
}
