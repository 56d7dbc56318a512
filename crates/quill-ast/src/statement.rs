//! Statement nodes
//!
//! Statements own their table references and sub-statements. Every slot that
//! holds an expression stores an [`ExprHandle`] into the arena instead.

use serde::{Deserialize, Serialize};

use crate::arena::ExprHandle;
use crate::types::DataType;

/// Flat kind tag of a statement, used as the document discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatementType {
    Select,
    Insert,
    Update,
    Delete,
    CreateTable,
    CreateDatabase,
    CreateFunction,
    CreateIndex,
    CreateSchema,
    CreateTrigger,
    CreateView,
    Drop,
    Copy,
    Explain,
    Prepare,
    Execute,
    Transaction,
    VariableSet,
    Analyze,
}

#[derive(Debug, Clone)]
pub enum Statement {
    Select(SelectStatement),
    Insert(InsertStatement),
    Update(UpdateStatement),
    Delete(DeleteStatement),
    CreateTable(CreateTableStatement),
    CreateDatabase(CreateDatabaseStatement),
    CreateFunction(CreateFunctionStatement),
    CreateIndex(CreateIndexStatement),
    CreateSchema(CreateSchemaStatement),
    CreateTrigger(CreateTriggerStatement),
    CreateView(CreateViewStatement),
    Drop(DropStatement),
    Copy(CopyStatement),
    Explain(ExplainStatement),
    Prepare(PrepareStatement),
    Execute(ExecuteStatement),
    Transaction(TransactionStatement),
    VariableSet(VariableSetStatement),
    Analyze(AnalyzeStatement),
}

impl Statement {
    pub fn statement_type(&self) -> StatementType {
        match self {
            Statement::Select(_) => StatementType::Select,
            Statement::Insert(_) => StatementType::Insert,
            Statement::Update(_) => StatementType::Update,
            Statement::Delete(_) => StatementType::Delete,
            Statement::CreateTable(_) => StatementType::CreateTable,
            Statement::CreateDatabase(_) => StatementType::CreateDatabase,
            Statement::CreateFunction(_) => StatementType::CreateFunction,
            Statement::CreateIndex(_) => StatementType::CreateIndex,
            Statement::CreateSchema(_) => StatementType::CreateSchema,
            Statement::CreateTrigger(_) => StatementType::CreateTrigger,
            Statement::CreateView(_) => StatementType::CreateView,
            Statement::Drop(_) => StatementType::Drop,
            Statement::Copy(_) => StatementType::Copy,
            Statement::Explain(_) => StatementType::Explain,
            Statement::Prepare(_) => StatementType::Prepare,
            Statement::Execute(_) => StatementType::Execute,
            Statement::Transaction(_) => StatementType::Transaction,
            Statement::VariableSet(_) => StatementType::VariableSet,
            Statement::Analyze(_) => StatementType::Analyze,
        }
    }

    pub fn as_select(&self) -> Option<&SelectStatement> {
        match self {
            Statement::Select(select) => Some(select),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// SELECT
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct SelectStatement {
    pub select: Vec<ExprHandle>,
    pub distinct: bool,
    pub from: Option<TableRef>,
    pub where_clause: Option<ExprHandle>,
    pub group_by: Option<GroupByDescription>,
    pub order_by: Option<OrderByDescription>,
    pub limit: Option<LimitDescription>,
    /// Next arm of a UNION chain
    pub union_select: Option<Box<SelectStatement>>,
    /// `union_select` is joined with UNION ALL rather than UNION
    pub union_all: bool,
}

#[derive(Debug, Clone, Default)]
pub struct GroupByDescription {
    pub columns: Vec<ExprHandle>,
    pub having: Option<ExprHandle>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Asc,
    Desc,
}

#[derive(Debug, Clone)]
pub struct OrderByItem {
    pub expr: ExprHandle,
    pub order: OrderType,
}

#[derive(Debug, Clone, Default)]
pub struct OrderByDescription {
    pub items: Vec<OrderByItem>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LimitDescription {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

// ---------------------------------------------------------------------------
// Table references
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    pub table: String,
}

impl TableInfo {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            database: None,
            schema: None,
            table: table.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TableReferenceType {
    Name,
    Select,
    Join,
    CrossProduct,
}

#[derive(Debug, Clone)]
pub enum TableRefKind {
    Base(TableInfo),
    Select(Box<SelectStatement>),
    Join(Box<JoinDefinition>),
    /// Comma-separated FROM list
    List(Vec<TableRef>),
}

#[derive(Debug, Clone)]
pub struct TableRef {
    pub kind: TableRefKind,
    pub alias: Option<String>,
}

impl TableRef {
    pub fn base(info: TableInfo, alias: Option<String>) -> Self {
        Self {
            kind: TableRefKind::Base(info),
            alias,
        }
    }

    pub fn reference_type(&self) -> TableReferenceType {
        match self.kind {
            TableRefKind::Base(_) => TableReferenceType::Name,
            TableRefKind::Select(_) => TableReferenceType::Select,
            TableRefKind::Join(_) => TableReferenceType::Join,
            TableRefKind::List(_) => TableReferenceType::CrossProduct,
        }
    }

    pub fn table_name(&self) -> Option<&str> {
        match &self.kind {
            TableRefKind::Base(info) => Some(&info.table),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Outer,
    Cross,
    Semi,
}

#[derive(Debug, Clone)]
pub struct JoinDefinition {
    pub join_type: JoinType,
    pub left: TableRef,
    pub right: TableRef,
    pub condition: Option<ExprHandle>,
}

// ---------------------------------------------------------------------------
// DML
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum InsertSource {
    Values(Vec<Vec<ExprHandle>>),
    Select(Box<SelectStatement>),
}

#[derive(Debug, Clone)]
pub struct InsertStatement {
    pub table: TableInfo,
    pub columns: Vec<String>,
    pub source: InsertSource,
}

#[derive(Debug, Clone)]
pub struct UpdateClause {
    pub column: String,
    pub value: ExprHandle,
}

#[derive(Debug, Clone)]
pub struct UpdateStatement {
    pub table: TableRef,
    pub clauses: Vec<UpdateClause>,
    pub where_clause: Option<ExprHandle>,
}

/// DELETE, and TRUNCATE as a DELETE without a predicate.
#[derive(Debug, Clone)]
pub struct DeleteStatement {
    pub table: TableRef,
    pub where_clause: Option<ExprHandle>,
}

// ---------------------------------------------------------------------------
// DDL
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FkAction {
    NoAction,
    Restrict,
    Cascade,
    SetNull,
    SetDefault,
}

impl FkAction {
    /// Maps a single-character action code; unknown codes mean NO ACTION.
    pub fn from_code(code: char) -> Self {
        match code {
            'a' => FkAction::NoAction,
            'r' => FkAction::Restrict,
            'c' => FkAction::Cascade,
            'n' => FkAction::SetNull,
            'd' => FkAction::SetDefault,
            _ => FkAction::NoAction,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FkMatch {
    Simple,
    Partial,
    Full,
}

impl FkMatch {
    /// Maps a single-character match code; unknown codes mean SIMPLE.
    pub fn from_code(code: char) -> Self {
        match code {
            'f' => FkMatch::Full,
            'p' => FkMatch::Partial,
            's' => FkMatch::Simple,
            _ => FkMatch::Simple,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForeignKeyDefinition {
    #[serde(default)]
    pub name: Option<String>,
    pub columns: Vec<String>,
    pub ref_table: TableInfo,
    pub ref_columns: Vec<String>,
    pub on_delete: FkAction,
    pub on_update: FkAction,
    pub match_type: FkMatch,
}

#[derive(Debug, Clone)]
pub struct ColumnDefinition {
    pub name: String,
    pub data_type: DataType,
    /// Declared length for VARCHAR(n) and friends
    pub varlen: Option<u32>,
    pub nullable: bool,
    pub primary: bool,
    pub unique: bool,
    pub default: Option<ExprHandle>,
    pub check: Option<ExprHandle>,
}

#[derive(Debug, Clone)]
pub struct CreateTableStatement {
    pub table: TableInfo,
    pub if_not_exists: bool,
    pub columns: Vec<ColumnDefinition>,
    /// Table-level PRIMARY KEY (...) columns
    pub primary_key: Vec<String>,
    pub foreign_keys: Vec<ForeignKeyDefinition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CreateDatabaseStatement {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CreateSchemaStatement {
    pub name: String,
    pub if_not_exists: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IndexType {
    Btree,
    Hash,
}

#[derive(Debug, Clone)]
pub enum IndexAttribute {
    Column(String),
    Expr(ExprHandle),
}

#[derive(Debug, Clone)]
pub struct CreateIndexStatement {
    pub name: String,
    pub table: TableInfo,
    pub unique: bool,
    pub index_type: IndexType,
    pub attributes: Vec<IndexAttribute>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FuncParameter {
    #[serde(default)]
    pub name: Option<String>,
    pub data_type: DataType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FuncLanguage {
    Sql,
    Plpgsql,
    C,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CreateFunctionStatement {
    pub name: String,
    pub replace: bool,
    pub parameters: Vec<FuncParameter>,
    pub return_type: DataType,
    pub language: FuncLanguage,
    pub body: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerTiming {
    Before,
    After,
    InsteadOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerEvent {
    Insert,
    Update,
    Delete,
    Truncate,
}

#[derive(Debug, Clone)]
pub struct CreateTriggerStatement {
    pub name: String,
    pub table: TableInfo,
    pub function: String,
    pub args: Vec<String>,
    /// UPDATE OF column list
    pub columns: Vec<String>,
    pub when: Option<ExprHandle>,
    pub timing: TriggerTiming,
    pub events: Vec<TriggerEvent>,
    pub for_each_row: bool,
}

#[derive(Debug, Clone)]
pub struct CreateViewStatement {
    pub name: String,
    pub select: Box<SelectStatement>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DropType {
    Database,
    Table,
    Schema,
    Index,
    View,
    Trigger,
    PreparedStatement,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DropStatement {
    pub drop_type: DropType,
    pub name: String,
    /// Owning table for DROP TRIGGER ... ON table
    pub table: Option<String>,
    pub if_exists: bool,
    pub cascade: bool,
}

// ---------------------------------------------------------------------------
// Utility statements
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExternalFileFormat {
    Csv,
    Text,
    Binary,
}

#[derive(Debug, Clone)]
pub struct CopyStatement {
    pub table: Option<TableRef>,
    pub select: Option<Box<SelectStatement>>,
    pub columns: Vec<String>,
    /// `None` means STDIN/STDOUT
    pub file_path: Option<String>,
    pub is_from: bool,
    pub format: ExternalFileFormat,
    pub delimiter: char,
    pub quote: char,
    pub escape: char,
}

#[derive(Debug, Clone)]
pub struct ExplainStatement {
    pub statement: Box<Statement>,
}

#[derive(Debug, Clone)]
pub struct PrepareStatement {
    pub name: String,
    pub parameter_types: Vec<DataType>,
    pub query: Box<Statement>,
}

#[derive(Debug, Clone)]
pub struct ExecuteStatement {
    pub name: String,
    pub parameters: Vec<ExprHandle>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Begin,
    Commit,
    Rollback,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransactionStatement {
    pub transaction_type: TransactionType,
}

#[derive(Debug, Clone)]
pub struct VariableSetStatement {
    pub name: String,
    pub values: Vec<ExprHandle>,
    pub is_set_default: bool,
}

/// ANALYZE, with VACUUM ANALYZE treated the same way
#[derive(Debug, Clone)]
pub struct AnalyzeStatement {
    pub table: Option<TableRef>,
    pub columns: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fk_action_codes() {
        assert_eq!(FkAction::from_code('a'), FkAction::NoAction);
        assert_eq!(FkAction::from_code('r'), FkAction::Restrict);
        assert_eq!(FkAction::from_code('c'), FkAction::Cascade);
        assert_eq!(FkAction::from_code('n'), FkAction::SetNull);
        assert_eq!(FkAction::from_code('d'), FkAction::SetDefault);
        for code in ['x', 'A', ' ', '\0'] {
            assert_eq!(FkAction::from_code(code), FkAction::NoAction);
        }
    }

    #[test]
    fn test_fk_match_codes() {
        assert_eq!(FkMatch::from_code('f'), FkMatch::Full);
        assert_eq!(FkMatch::from_code('p'), FkMatch::Partial);
        assert_eq!(FkMatch::from_code('s'), FkMatch::Simple);
        assert_eq!(FkMatch::from_code('q'), FkMatch::Simple);
    }

    #[test]
    fn test_reference_types() {
        let base = TableRef::base(TableInfo::new("t"), None);
        assert_eq!(base.reference_type(), TableReferenceType::Name);
        assert_eq!(base.table_name(), Some("t"));

        let list = TableRef {
            kind: TableRefKind::List(vec![base.clone(), base]),
            alias: None,
        };
        assert_eq!(list.reference_type(), TableReferenceType::CrossProduct);
        assert_eq!(list.table_name(), None);
    }
}
