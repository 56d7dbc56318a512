//! Type system for the AST
//!
//! Only literal typing and explicit casts produce concrete types here; every
//! other expression carries `DataType::Invalid` until the binder runs.

use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataType {
    /// Not yet derived (resolved by the binder)
    Invalid,
    Boolean,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Decimal,
    Timestamp,
    Date,
    Varchar,
    Varbinary,
}

impl DataType {
    /// Look up a SQL type name as written in DDL or casts.
    pub fn from_sql_name(name: &str) -> Option<Self> {
        let ty = match name.to_ascii_lowercase().as_str() {
            "bool" | "boolean" => DataType::Boolean,
            "tinyint" => DataType::TinyInt,
            "smallint" | "int2" => DataType::SmallInt,
            "int" | "integer" | "int4" => DataType::Integer,
            "bigint" | "int8" => DataType::BigInt,
            "decimal" | "numeric" | "real" | "float" | "float4" | "float8" | "double" => {
                DataType::Decimal
            }
            "timestamp" => DataType::Timestamp,
            "date" => DataType::Date,
            "varchar" | "char" | "character" | "text" => DataType::Varchar,
            "varbinary" | "bytea" => DataType::Varbinary,
            _ => return None,
        };
        Some(ty)
    }
}

/// Constant values produced by literals
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Decimal(f64),
    String(String),
}

impl Value {
    /// The type a literal carries by its own representation.
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Null => DataType::Invalid,
            Value::Boolean(_) => DataType::Boolean,
            Value::Integer(_) => DataType::Integer,
            Value::Decimal(_) => DataType::Decimal,
            Value::String(_) => DataType::Varchar,
        }
    }
}

// Decimals compare bitwise so that equality stays consistent with hashing.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Decimal(a), Value::Decimal(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Boolean(b) => b.hash(state),
            Value::Integer(i) => i.hash(state),
            Value::Decimal(f) => f.to_bits().hash(state),
            Value::String(s) => s.hash(state),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::String(s) => write!(f, "{}", s),
        }
    }
}
