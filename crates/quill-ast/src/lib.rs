//! Quill abstract syntax tree
//!
//! Statement and expression nodes produced by the SQL transform, the arena
//! that owns them for the lifetime of one parse, structural equality and
//! hashing, traversal, and the JSON document codec.

pub mod arena;
pub mod codec;
pub mod error;
pub mod expression;
pub mod statement;
pub mod structural;
pub mod types;
pub mod visit;

pub use arena::{Arena, ArenaContents, ArenaId, Deserialized, ExprHandle, StmtHandle};
pub use codec::{deserialize, deserialize_with, fingerprint, serialize, Codec, DecodeOptions, Document};
pub use error::{Error, Result};
pub use expression::*;
pub use statement::*;
pub use structural::{structural_hash, Bound, Structural};
pub use types::{DataType, Value};
pub use visit::{walk_expression, walk_select, walk_statement, walk_table_ref, Handles, Visitor};
