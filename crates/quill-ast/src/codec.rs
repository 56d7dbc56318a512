//! Document codec
//!
//! Every node becomes a JSON object carrying its kind under `"type"`, its own
//! fields, and its children embedded in place. Slots that hold an arena
//! handle embed the referenced expression, so a document is self-contained.
//!
//! Decoding cannot know which arena the result will live in. Handles it
//! produces are detached and index into [`Deserialized::expressions`];
//! [`Arena::splice`](crate::arena::Arena::splice) binds them.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Map;
use sha2::{Digest, Sha256};

use crate::arena::{Arena, Deserialized, ExprHandle};
use crate::error::{Error, Result};
use crate::expression::*;
use crate::statement::*;
use crate::types::{DataType, Value};

pub type Document = serde_json::Value;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DecodeOptions {
    /// Maximum nesting of expressions, selects, table references and
    /// statements
    pub max_depth: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self { max_depth: 128 }
    }
}

/// Encode `node`, resolving its handles through `arena`.
pub fn serialize<T: Codec>(node: &T, arena: &Arena) -> Result<Document> {
    node.encode(&Encoder { arena })
}

pub fn deserialize<T: Codec>(doc: &Document) -> Result<Deserialized<T>> {
    deserialize_with(doc, &DecodeOptions::default())
}

pub fn deserialize_with<T: Codec>(doc: &Document, options: &DecodeOptions) -> Result<Deserialized<T>> {
    let mut decoder = Decoder {
        expressions: Vec::new(),
        depth: 0,
        max_depth: options.max_depth,
    };
    let node = T::decode(doc, &mut decoder)?;
    tracing::trace!(expressions = decoder.expressions.len(), "decoded document");
    Ok(Deserialized {
        node,
        expressions: decoder.expressions,
    })
}

/// SHA-256 of the compact document, hex encoded. Structurally equal nodes
/// produce the same fingerprint.
pub fn fingerprint<T: Codec>(node: &T, arena: &Arena) -> Result<String> {
    let json = serde_json::to_string(&serialize(node, arena)?)?;
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

pub struct Encoder<'a> {
    arena: &'a Arena,
}

pub struct Decoder {
    expressions: Vec<Expression>,
    depth: usize,
    max_depth: usize,
}

impl Decoder {
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth >= self.max_depth {
            return Err(Error::DepthLimitExceeded(self.max_depth));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn register(&mut self, expr: Expression) -> ExprHandle {
        self.expressions.push(expr);
        ExprHandle::detached(self.expressions.len() - 1)
    }
}

pub trait Codec: Sized {
    fn encode(&self, enc: &Encoder<'_>) -> Result<Document>;
    fn decode(doc: &Document, dec: &mut Decoder) -> Result<Self>;
}

/// Object under construction
struct Object(Map<String, Document>);

impl Object {
    fn tagged(tag: impl Serialize) -> Result<Self> {
        let mut map = Map::new();
        map.insert("type".to_string(), serde_json::to_value(tag)?);
        Ok(Self(map))
    }

    fn plain() -> Self {
        Self(Map::new())
    }

    fn leaf(mut self, key: &str, value: impl Serialize) -> Result<Self> {
        self.0.insert(key.to_string(), serde_json::to_value(value)?);
        Ok(self)
    }

    fn opt_leaf<T: Serialize>(self, key: &str, value: Option<T>) -> Result<Self> {
        match value {
            Some(value) => self.leaf(key, value),
            None => Ok(self),
        }
    }

    fn node<T: Codec>(mut self, key: &str, node: &T, enc: &Encoder<'_>) -> Result<Self> {
        self.0.insert(key.to_string(), node.encode(enc)?);
        Ok(self)
    }

    fn opt_node<T: Codec>(self, key: &str, node: Option<&T>, enc: &Encoder<'_>) -> Result<Self> {
        match node {
            Some(node) => self.node(key, node, enc),
            None => Ok(self),
        }
    }

    fn done(self) -> Document {
        Document::Object(self.0)
    }
}

/// Field reader over one object; every failure names the node kind and field.
struct Fields<'d> {
    kind: String,
    map: &'d Map<String, Document>,
}

impl<'d> Fields<'d> {
    fn open(doc: &'d Document, kind: &str) -> Result<Self> {
        let map = doc
            .as_object()
            .ok_or_else(|| Error::mismatch(kind, "", "expected an object"))?;
        Ok(Self {
            kind: kind.to_string(),
            map,
        })
    }

    /// Read the `"type"` discriminant; later errors report it as the kind.
    fn tag<T: DeserializeOwned>(&mut self) -> Result<T> {
        let tag = self.leaf("type")?;
        if let Some(name) = self.map.get("type").and_then(Document::as_str) {
            self.kind = name.to_string();
        }
        Ok(tag)
    }

    fn mismatch(&self, field: &str, reason: impl Into<String>) -> Error {
        Error::mismatch(&self.kind, field, reason)
    }

    fn get(&self, field: &str) -> Result<&'d Document> {
        self.map
            .get(field)
            .ok_or_else(|| self.mismatch(field, "missing field"))
    }

    fn opt(&self, field: &str) -> Option<&'d Document> {
        self.map.get(field).filter(|value| !value.is_null())
    }

    fn leaf<T: DeserializeOwned>(&self, field: &str) -> Result<T> {
        T::deserialize(self.get(field)?).map_err(|e| self.mismatch(field, e.to_string()))
    }

    fn opt_leaf<T: DeserializeOwned>(&self, field: &str) -> Result<Option<T>> {
        self.opt(field)
            .map(|value| T::deserialize(value).map_err(|e| self.mismatch(field, e.to_string())))
            .transpose()
    }

    fn node<T: Codec>(&self, field: &str, dec: &mut Decoder) -> Result<T> {
        T::decode(self.get(field)?, dec)
    }

    fn opt_node<T: Codec>(&self, field: &str, dec: &mut Decoder) -> Result<Option<T>> {
        self.opt(field).map(|doc| T::decode(doc, dec)).transpose()
    }

    fn operands<const N: usize>(&self, dec: &mut Decoder) -> Result<[Expression; N]> {
        let children: Vec<Expression> = self.node("children", dec)?;
        let found = children.len();
        <[Expression; N]>::try_from(children)
            .map_err(|_| self.mismatch("children", format!("expected {} operands, found {}", N, found)))
    }
}

impl<T: Codec> Codec for Vec<T> {
    fn encode(&self, enc: &Encoder<'_>) -> Result<Document> {
        Ok(Document::Array(
            self.iter().map(|item| item.encode(enc)).collect::<Result<_>>()?,
        ))
    }

    fn decode(doc: &Document, dec: &mut Decoder) -> Result<Self> {
        let items = doc
            .as_array()
            .ok_or_else(|| Error::mismatch("list", "", "expected an array"))?;
        items.iter().map(|item| T::decode(item, dec)).collect()
    }
}

impl<T: Codec> Codec for Box<T> {
    fn encode(&self, enc: &Encoder<'_>) -> Result<Document> {
        self.as_ref().encode(enc)
    }

    fn decode(doc: &Document, dec: &mut Decoder) -> Result<Self> {
        T::decode(doc, dec).map(Box::new)
    }
}

impl Codec for ExprHandle {
    fn encode(&self, enc: &Encoder<'_>) -> Result<Document> {
        enc.arena.expression(*self)?.encode(enc)
    }

    fn decode(doc: &Document, dec: &mut Decoder) -> Result<Self> {
        let expr = Expression::decode(doc, dec)?;
        Ok(dec.register(expr))
    }
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

impl Codec for WhenClause {
    fn encode(&self, enc: &Encoder<'_>) -> Result<Document> {
        Ok(Object::plain()
            .node("when", &self.condition, enc)?
            .node("then", &self.result, enc)?
            .done())
    }

    fn decode(doc: &Document, dec: &mut Decoder) -> Result<Self> {
        let f = Fields::open(doc, "WHEN")?;
        Ok(WhenClause {
            condition: f.node("when", dec)?,
            result: f.node("then", dec)?,
        })
    }
}

impl Codec for Expression {
    fn encode(&self, enc: &Encoder<'_>) -> Result<Document> {
        let mut obj = Object::tagged(self.expression_type())?
            .leaf("return_type", self.return_type)?
            .opt_leaf("alias", self.alias.as_ref())?;
        if !self.name.is_empty() {
            obj = obj.leaf("display_name", &self.name)?;
        }
        let obj = match &self.kind {
            ExprKind::Constant(value) => obj.leaf("value", value)?,
            ExprKind::Column(col) => obj
                .opt_leaf("table", col.table.as_ref())?
                .leaf("column", &col.column)?,
            ExprKind::Star => obj,
            ExprKind::Parameter(index) => obj.leaf("index", index)?,
            ExprKind::Operator { operands, .. } | ExprKind::Boolean { operands, .. } => {
                obj.node("children", operands, enc)?
            }
            ExprKind::Comparison { left, right, .. } => {
                let children = Document::Array(vec![left.encode(enc)?, right.encode(enc)?]);
                obj.leaf("children", children)?
            }
            ExprKind::Function { name, args } => obj.leaf("function", name)?.node("children", args, enc)?,
            ExprKind::Aggregate { distinct, args, .. } => {
                obj.leaf("distinct", distinct)?.node("children", args, enc)?
            }
            ExprKind::Case { clauses, default } => obj
                .node("clauses", clauses, enc)?
                .opt_node("default", default.as_ref(), enc)?,
            ExprKind::Cast(operand) => {
                obj.leaf("children", Document::Array(vec![operand.encode(enc)?]))?
            }
            ExprKind::Subquery(select) => obj.node("select", select, enc)?,
        };
        Ok(obj.done())
    }

    fn decode(doc: &Document, dec: &mut Decoder) -> Result<Self> {
        dec.nested(|dec| {
            let mut f = Fields::open(doc, "expression")?;
            let ty: ExpressionType = f.tag()?;

            let kind = if let Some(op) = OperatorType::from_expression_type(ty) {
                ExprKind::Operator {
                    op,
                    operands: f.node("children", dec)?,
                }
            } else if let Some(op) = ComparisonType::from_expression_type(ty) {
                let [left, right] = f.operands::<2>(dec)?;
                ExprKind::Comparison {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                }
            } else if let Some(op) = BoolOp::from_expression_type(ty) {
                ExprKind::Boolean {
                    op,
                    operands: f.node("children", dec)?,
                }
            } else if let Some(func) = AggregateType::from_expression_type(ty) {
                ExprKind::Aggregate {
                    func,
                    distinct: f.leaf("distinct")?,
                    args: f.node("children", dec)?,
                }
            } else {
                match ty {
                    ExpressionType::ValueConstant => ExprKind::Constant(f.leaf::<Value>("value")?),
                    ExpressionType::ColumnValue => ExprKind::Column(ColumnRef {
                        table: f.opt_leaf("table")?,
                        column: f.leaf("column")?,
                    }),
                    ExpressionType::Star => ExprKind::Star,
                    ExpressionType::ValueParameter => ExprKind::Parameter(f.leaf("index")?),
                    ExpressionType::Function => ExprKind::Function {
                        name: f.leaf("function")?,
                        args: f.node("children", dec)?,
                    },
                    ExpressionType::OperatorCaseExpr => ExprKind::Case {
                        clauses: f.node("clauses", dec)?,
                        default: f.opt_node("default", dec)?,
                    },
                    ExpressionType::OperatorCast => {
                        let [operand] = f.operands::<1>(dec)?;
                        ExprKind::Cast(Box::new(operand))
                    }
                    ExpressionType::RowSubquery => ExprKind::Subquery(f.node("select", dec)?),
                    other => return Err(f.mismatch("type", format!("unhandled expression type {:?}", other))),
                }
            };

            Ok(Expression {
                kind,
                return_type: f.leaf::<DataType>("return_type")?,
                alias: f.opt_leaf("alias")?,
                name: f.opt_leaf("display_name")?.unwrap_or_default(),
            })
        })
    }
}

// ---------------------------------------------------------------------------
// SELECT and table references
// ---------------------------------------------------------------------------

impl Codec for OrderByItem {
    fn encode(&self, enc: &Encoder<'_>) -> Result<Document> {
        Ok(Object::plain()
            .node("expr", &self.expr, enc)?
            .leaf("order", self.order)?
            .done())
    }

    fn decode(doc: &Document, dec: &mut Decoder) -> Result<Self> {
        let f = Fields::open(doc, "ORDER BY")?;
        Ok(OrderByItem {
            expr: f.node("expr", dec)?,
            order: f.leaf("order")?,
        })
    }
}

impl Codec for SelectStatement {
    fn encode(&self, enc: &Encoder<'_>) -> Result<Document> {
        let mut obj = Object::tagged(StatementType::Select)?
            .node("select", &self.select, enc)?
            .leaf("distinct", self.distinct)?
            .opt_node("from", self.from.as_ref(), enc)?
            .opt_node("where", self.where_clause.as_ref(), enc)?;
        if let Some(group_by) = &self.group_by {
            let group = Object::plain()
                .node("columns", &group_by.columns, enc)?
                .opt_node("having", group_by.having.as_ref(), enc)?
                .done();
            obj = obj.leaf("group_by", group)?;
        }
        if let Some(order_by) = &self.order_by {
            obj = obj.node("order_by", &order_by.items, enc)?;
        }
        Ok(obj
            .opt_leaf("limit", self.limit)?
            .opt_node("union_select", self.union_select.as_ref(), enc)?
            .leaf("union_all", self.union_all)?
            .done())
    }

    fn decode(doc: &Document, dec: &mut Decoder) -> Result<Self> {
        dec.nested(|dec| {
            let mut f = Fields::open(doc, "select")?;
            let ty: StatementType = f.tag()?;
            if ty != StatementType::Select {
                return Err(f.mismatch("type", "expected SELECT"));
            }

            let group_by = match f.opt("group_by") {
                Some(group) => {
                    let g = Fields::open(group, "GROUP BY")?;
                    Some(GroupByDescription {
                        columns: g.node("columns", dec)?,
                        having: g.opt_node("having", dec)?,
                    })
                }
                None => None,
            };

            Ok(SelectStatement {
                select: f.node("select", dec)?,
                distinct: f.leaf("distinct")?,
                from: f.opt_node("from", dec)?,
                where_clause: f.opt_node("where", dec)?,
                group_by,
                order_by: f
                    .opt_node("order_by", dec)?
                    .map(|items| OrderByDescription { items }),
                limit: f.opt_leaf("limit")?,
                union_select: f.opt_node("union_select", dec)?,
                union_all: f.leaf("union_all")?,
            })
        })
    }
}

impl Codec for TableRef {
    fn encode(&self, enc: &Encoder<'_>) -> Result<Document> {
        let obj = Object::tagged(self.reference_type())?.opt_leaf("alias", self.alias.as_ref())?;
        let obj = match &self.kind {
            TableRefKind::Base(info) => obj.leaf("table", info)?,
            TableRefKind::Select(select) => obj.node("select", select, enc)?,
            TableRefKind::Join(join) => obj.node("join", join, enc)?,
            TableRefKind::List(list) => obj.node("list", list, enc)?,
        };
        Ok(obj.done())
    }

    fn decode(doc: &Document, dec: &mut Decoder) -> Result<Self> {
        dec.nested(|dec| {
            let mut f = Fields::open(doc, "table reference")?;
            let kind = match f.tag::<TableReferenceType>()? {
                TableReferenceType::Name => TableRefKind::Base(f.leaf("table")?),
                TableReferenceType::Select => TableRefKind::Select(f.node("select", dec)?),
                TableReferenceType::Join => TableRefKind::Join(f.node("join", dec)?),
                TableReferenceType::CrossProduct => TableRefKind::List(f.node("list", dec)?),
            };
            Ok(TableRef {
                kind,
                alias: f.opt_leaf("alias")?,
            })
        })
    }
}

impl Codec for JoinDefinition {
    fn encode(&self, enc: &Encoder<'_>) -> Result<Document> {
        Ok(Object::tagged("JOIN")?
            .leaf("join_type", self.join_type)?
            .node("left", &self.left, enc)?
            .node("right", &self.right, enc)?
            .opt_node("condition", self.condition.as_ref(), enc)?
            .done())
    }

    fn decode(doc: &Document, dec: &mut Decoder) -> Result<Self> {
        let mut f = Fields::open(doc, "join")?;
        let tag: String = f.tag()?;
        if tag != "JOIN" {
            return Err(f.mismatch("type", "expected JOIN"));
        }
        Ok(JoinDefinition {
            join_type: f.leaf("join_type")?,
            left: f.node("left", dec)?,
            right: f.node("right", dec)?,
            condition: f.opt_node("condition", dec)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Statement parts
// ---------------------------------------------------------------------------

impl Codec for UpdateClause {
    fn encode(&self, enc: &Encoder<'_>) -> Result<Document> {
        Ok(Object::plain()
            .leaf("column", &self.column)?
            .node("value", &self.value, enc)?
            .done())
    }

    fn decode(doc: &Document, dec: &mut Decoder) -> Result<Self> {
        let f = Fields::open(doc, "SET")?;
        Ok(UpdateClause {
            column: f.leaf("column")?,
            value: f.node("value", dec)?,
        })
    }
}

impl Codec for ColumnDefinition {
    fn encode(&self, enc: &Encoder<'_>) -> Result<Document> {
        Ok(Object::plain()
            .leaf("name", &self.name)?
            .leaf("data_type", self.data_type)?
            .opt_leaf("varlen", self.varlen)?
            .leaf("nullable", self.nullable)?
            .leaf("primary", self.primary)?
            .leaf("unique", self.unique)?
            .opt_node("default", self.default.as_ref(), enc)?
            .opt_node("check", self.check.as_ref(), enc)?
            .done())
    }

    fn decode(doc: &Document, dec: &mut Decoder) -> Result<Self> {
        let f = Fields::open(doc, "column definition")?;
        Ok(ColumnDefinition {
            name: f.leaf("name")?,
            data_type: f.leaf("data_type")?,
            varlen: f.opt_leaf("varlen")?,
            nullable: f.leaf("nullable")?,
            primary: f.leaf("primary")?,
            unique: f.leaf("unique")?,
            default: f.opt_node("default", dec)?,
            check: f.opt_node("check", dec)?,
        })
    }
}

impl Codec for IndexAttribute {
    fn encode(&self, enc: &Encoder<'_>) -> Result<Document> {
        let obj = Object::plain();
        let obj = match self {
            IndexAttribute::Column(name) => obj.leaf("column", name)?,
            IndexAttribute::Expr(handle) => obj.node("expr", handle, enc)?,
        };
        Ok(obj.done())
    }

    fn decode(doc: &Document, dec: &mut Decoder) -> Result<Self> {
        let f = Fields::open(doc, "index attribute")?;
        if let Some(column) = f.opt_leaf("column")? {
            return Ok(IndexAttribute::Column(column));
        }
        Ok(IndexAttribute::Expr(f.node("expr", dec)?))
    }
}

// ---------------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------------

impl Codec for Statement {
    fn encode(&self, enc: &Encoder<'_>) -> Result<Document> {
        let obj = Object::tagged(self.statement_type())?;
        let obj = match self {
            Statement::Select(select) => return select.encode(enc),
            Statement::Insert(s) => {
                let obj = obj.leaf("table", &s.table)?.leaf("columns", &s.columns)?;
                match &s.source {
                    InsertSource::Values(rows) => obj.node("values", rows, enc)?,
                    InsertSource::Select(select) => obj.node("select", select, enc)?,
                }
            }
            Statement::Update(s) => obj
                .node("table", &s.table, enc)?
                .node("clauses", &s.clauses, enc)?
                .opt_node("where", s.where_clause.as_ref(), enc)?,
            Statement::Delete(s) => obj
                .node("table", &s.table, enc)?
                .opt_node("where", s.where_clause.as_ref(), enc)?,
            Statement::CreateTable(s) => obj
                .leaf("table", &s.table)?
                .leaf("if_not_exists", s.if_not_exists)?
                .node("columns", &s.columns, enc)?
                .leaf("primary_key", &s.primary_key)?
                .leaf("foreign_keys", &s.foreign_keys)?,
            Statement::CreateDatabase(s) => obj.leaf("name", &s.name)?,
            Statement::CreateFunction(s) => obj
                .leaf("name", &s.name)?
                .leaf("replace", s.replace)?
                .leaf("parameters", &s.parameters)?
                .leaf("return_type", s.return_type)?
                .leaf("language", s.language)?
                .leaf("body", &s.body)?,
            Statement::CreateIndex(s) => obj
                .leaf("name", &s.name)?
                .leaf("table", &s.table)?
                .leaf("unique", s.unique)?
                .leaf("index_type", s.index_type)?
                .node("attributes", &s.attributes, enc)?,
            Statement::CreateSchema(s) => obj
                .leaf("name", &s.name)?
                .leaf("if_not_exists", s.if_not_exists)?,
            Statement::CreateTrigger(s) => obj
                .leaf("name", &s.name)?
                .leaf("table", &s.table)?
                .leaf("function", &s.function)?
                .leaf("args", &s.args)?
                .leaf("columns", &s.columns)?
                .opt_node("when", s.when.as_ref(), enc)?
                .leaf("timing", s.timing)?
                .leaf("events", &s.events)?
                .leaf("for_each_row", s.for_each_row)?,
            Statement::CreateView(s) => obj.leaf("name", &s.name)?.node("select", &s.select, enc)?,
            Statement::Drop(s) => obj
                .leaf("drop_type", s.drop_type)?
                .leaf("name", &s.name)?
                .opt_leaf("table", s.table.as_ref())?
                .leaf("if_exists", s.if_exists)?
                .leaf("cascade", s.cascade)?,
            Statement::Copy(s) => obj
                .opt_node("table", s.table.as_ref(), enc)?
                .opt_node("select", s.select.as_ref(), enc)?
                .leaf("columns", &s.columns)?
                .opt_leaf("file_path", s.file_path.as_ref())?
                .leaf("is_from", s.is_from)?
                .leaf("format", s.format)?
                .leaf("delimiter", s.delimiter)?
                .leaf("quote", s.quote)?
                .leaf("escape", s.escape)?,
            Statement::Explain(s) => obj.node("statement", &s.statement, enc)?,
            Statement::Prepare(s) => obj
                .leaf("name", &s.name)?
                .leaf("parameter_types", &s.parameter_types)?
                .node("query", &s.query, enc)?,
            Statement::Execute(s) => obj.leaf("name", &s.name)?.node("parameters", &s.parameters, enc)?,
            Statement::Transaction(s) => obj.leaf("transaction_type", s.transaction_type)?,
            Statement::VariableSet(s) => obj
                .leaf("name", &s.name)?
                .node("values", &s.values, enc)?
                .leaf("is_set_default", s.is_set_default)?,
            Statement::Analyze(s) => obj
                .opt_node("table", s.table.as_ref(), enc)?
                .leaf("columns", &s.columns)?,
        };
        Ok(obj.done())
    }

    fn decode(doc: &Document, dec: &mut Decoder) -> Result<Self> {
        let mut f = Fields::open(doc, "statement")?;
        let ty: StatementType = f.tag()?;
        if ty == StatementType::Select {
            return SelectStatement::decode(doc, dec).map(Statement::Select);
        }

        dec.nested(|dec| {
            Ok(match ty {
                StatementType::Select => unreachable!("handled above"),
                StatementType::Insert => {
                    let source = match f.opt("values") {
                        Some(values) => InsertSource::Values(Codec::decode(values, dec)?),
                        None => InsertSource::Select(f.node("select", dec)?),
                    };
                    Statement::Insert(InsertStatement {
                        table: f.leaf("table")?,
                        columns: f.leaf("columns")?,
                        source,
                    })
                }
                StatementType::Update => Statement::Update(UpdateStatement {
                    table: f.node("table", dec)?,
                    clauses: f.node("clauses", dec)?,
                    where_clause: f.opt_node("where", dec)?,
                }),
                StatementType::Delete => Statement::Delete(DeleteStatement {
                    table: f.node("table", dec)?,
                    where_clause: f.opt_node("where", dec)?,
                }),
                StatementType::CreateTable => Statement::CreateTable(CreateTableStatement {
                    table: f.leaf("table")?,
                    if_not_exists: f.leaf("if_not_exists")?,
                    columns: f.node("columns", dec)?,
                    primary_key: f.leaf("primary_key")?,
                    foreign_keys: f.leaf("foreign_keys")?,
                }),
                StatementType::CreateDatabase => Statement::CreateDatabase(CreateDatabaseStatement {
                    name: f.leaf("name")?,
                }),
                StatementType::CreateFunction => Statement::CreateFunction(CreateFunctionStatement {
                    name: f.leaf("name")?,
                    replace: f.leaf("replace")?,
                    parameters: f.leaf("parameters")?,
                    return_type: f.leaf("return_type")?,
                    language: f.leaf("language")?,
                    body: f.leaf("body")?,
                }),
                StatementType::CreateIndex => Statement::CreateIndex(CreateIndexStatement {
                    name: f.leaf("name")?,
                    table: f.leaf("table")?,
                    unique: f.leaf("unique")?,
                    index_type: f.leaf("index_type")?,
                    attributes: f.node("attributes", dec)?,
                }),
                StatementType::CreateSchema => Statement::CreateSchema(CreateSchemaStatement {
                    name: f.leaf("name")?,
                    if_not_exists: f.leaf("if_not_exists")?,
                }),
                StatementType::CreateTrigger => Statement::CreateTrigger(CreateTriggerStatement {
                    name: f.leaf("name")?,
                    table: f.leaf("table")?,
                    function: f.leaf("function")?,
                    args: f.leaf("args")?,
                    columns: f.leaf("columns")?,
                    when: f.opt_node("when", dec)?,
                    timing: f.leaf("timing")?,
                    events: f.leaf("events")?,
                    for_each_row: f.leaf("for_each_row")?,
                }),
                StatementType::CreateView => Statement::CreateView(CreateViewStatement {
                    name: f.leaf("name")?,
                    select: f.node("select", dec)?,
                }),
                StatementType::Drop => Statement::Drop(DropStatement {
                    drop_type: f.leaf("drop_type")?,
                    name: f.leaf("name")?,
                    table: f.opt_leaf("table")?,
                    if_exists: f.leaf("if_exists")?,
                    cascade: f.leaf("cascade")?,
                }),
                StatementType::Copy => Statement::Copy(CopyStatement {
                    table: f.opt_node("table", dec)?,
                    select: f.opt_node("select", dec)?,
                    columns: f.leaf("columns")?,
                    file_path: f.opt_leaf("file_path")?,
                    is_from: f.leaf("is_from")?,
                    format: f.leaf("format")?,
                    delimiter: f.leaf("delimiter")?,
                    quote: f.leaf("quote")?,
                    escape: f.leaf("escape")?,
                }),
                StatementType::Explain => Statement::Explain(ExplainStatement {
                    statement: f.node("statement", dec)?,
                }),
                StatementType::Prepare => Statement::Prepare(PrepareStatement {
                    name: f.leaf("name")?,
                    parameter_types: f.leaf("parameter_types")?,
                    query: f.node("query", dec)?,
                }),
                StatementType::Execute => Statement::Execute(ExecuteStatement {
                    name: f.leaf("name")?,
                    parameters: f.node("parameters", dec)?,
                }),
                StatementType::Transaction => Statement::Transaction(TransactionStatement {
                    transaction_type: f.leaf("transaction_type")?,
                }),
                StatementType::VariableSet => Statement::VariableSet(VariableSetStatement {
                    name: f.leaf("name")?,
                    values: f.node("values", dec)?,
                    is_set_default: f.leaf("is_set_default")?,
                }),
                StatementType::Analyze => Statement::Analyze(AnalyzeStatement {
                    table: f.opt_node("table", dec)?,
                    columns: f.leaf("columns")?,
                }),
            })
        })
    }
}
