//! Quill SQL parser
//!
//! Turns query text into [`quill_ast`] nodes. Pest produces the parse tree;
//! the transform walks it and fills a fresh [`Arena`] per call.

mod error;
mod grammar;
mod transform;

use pest::Parser;
use quill_ast::{Arena, ArenaContents, ExprHandle, Expression, Statement, StmtHandle};

pub use error::{Error, Result};
pub use grammar::{QuillParser, Rule};

use transform::Transformer;

/// Nesting allowed before a parse is rejected.
pub const DEFAULT_MAX_DEPTH: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    pub max_depth: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Statements of one query string and the arena that owns them.
#[derive(Debug)]
pub struct ParseResult {
    arena: Arena,
    statements: Vec<StmtHandle>,
}

impl ParseResult {
    /// Top-level statements in source order.
    pub fn statements(&self) -> &[StmtHandle] {
        &self.statements
    }

    pub fn statement(&self, handle: StmtHandle) -> Result<&Statement> {
        Ok(self.arena.statement(handle)?)
    }

    /// Every expression registered during the parse, in registration order.
    pub fn expressions(&self) -> Result<Vec<ExprHandle>> {
        Ok(self.arena.expressions()?)
    }

    pub fn expression(&self, handle: ExprHandle) -> Result<&Expression> {
        Ok(self.arena.expression(handle)?)
    }

    /// Fill in display names for every registered expression.
    pub fn derive_names(&mut self) -> Result<()> {
        Ok(self.arena.derive_names()?)
    }

    /// Move every node out; handles into this result stop resolving.
    pub fn take_ownership(&mut self) -> Result<ArenaContents> {
        self.statements.clear();
        Ok(self.arena.take_ownership()?)
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn arena_mut(&mut self) -> &mut Arena {
        &mut self.arena
    }

    pub fn into_arena(self) -> Arena {
        self.arena
    }
}

/// Parse query text with default options.
pub fn parse(sql: &str) -> Result<ParseResult> {
    parse_with(sql, &ParseOptions::default())
}

pub fn parse_with(sql: &str, options: &ParseOptions) -> Result<ParseResult> {
    let mut pairs = QuillParser::parse(Rule::statements, sql)?;
    let root = pairs
        .next()
        .ok_or_else(|| Error::malformed("statements", "root"))?;

    let mut arena = Arena::new();
    let statements = Transformer::new(&mut arena, options.max_depth).statements(root)?;
    tracing::debug!(
        statements = statements.len(),
        expressions = arena.expression_count(),
        "parsed query"
    );

    Ok(ParseResult { arena, statements })
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_ast::{
        AggregateType, BoolOp, ComparisonType, DataType, ExprKind, FkAction, FkMatch, InsertSource, JoinType,
        OperatorType, OrderType, TableRefKind, Value,
    };

    fn single(sql: &str) -> (ParseResult, StmtHandle) {
        let result = parse(sql).unwrap();
        assert_eq!(result.statements().len(), 1, "expected one statement in {sql}");
        let handle = result.statements()[0];
        (result, handle)
    }

    fn where_expr(sql: &str) -> Expression {
        let (result, handle) = single(sql);
        let select = result.statement(handle).unwrap().as_select().unwrap().clone();
        result.expression(select.where_clause.unwrap()).unwrap().clone()
    }

    #[test]
    fn test_parse_select_basic() {
        let (result, handle) = single("SELECT a, count(b) FROM t WHERE a > 1 ORDER BY a DESC LIMIT 5 OFFSET 2");
        let select = result.statement(handle).unwrap().as_select().unwrap();

        assert_eq!(select.select.len(), 2);
        assert!(matches!(
            result.expression(select.select[1]).unwrap().kind,
            ExprKind::Aggregate { func: AggregateType::Count, distinct: false, .. }
        ));
        assert_eq!(select.from.as_ref().unwrap().table_name(), Some("t"));

        let filter = result.expression(select.where_clause.unwrap()).unwrap();
        let ExprKind::Comparison { op: ComparisonType::GreaterThan, left, right } = &filter.kind else {
            panic!("expected a > comparison, got {:?}", filter.kind);
        };
        assert!(matches!(&left.kind, ExprKind::Column(col) if col.table.is_none() && col.column == "a"));
        assert!(matches!(right.kind, ExprKind::Constant(Value::Integer(1))));

        let order = select.order_by.as_ref().unwrap();
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].order, OrderType::Desc);

        let limit = select.limit.unwrap();
        assert_eq!(limit.limit, Some(5));
        assert_eq!(limit.offset, Some(2));
    }

    #[test]
    fn test_empty_input() {
        assert!(parse("").unwrap().statements().is_empty());
        assert!(parse(" ;; -- nothing\n").unwrap().statements().is_empty());
    }

    #[test]
    fn test_multiple_statements() {
        let result = parse("BEGIN; SELECT 1; COMMIT;").unwrap();
        assert_eq!(result.statements().len(), 3);
    }

    #[test]
    fn test_syntax_error() {
        assert!(matches!(parse("SELECT FROM WHERE"), Err(Error::Syntax(_))));
    }

    #[test]
    fn test_precedence() {
        let expr = where_expr("SELECT * FROM t WHERE a = 1 OR b = 2 AND c = 3");
        let ExprKind::Boolean { op: BoolOp::Or, operands } = &expr.kind else {
            panic!("expected OR, got {:?}", expr.kind);
        };
        assert_eq!(operands.len(), 2);
        assert!(matches!(operands[1].kind, ExprKind::Boolean { op: BoolOp::And, .. }));

        let expr = where_expr("SELECT * FROM t WHERE a + b * 2 > 0");
        let ExprKind::Comparison { left, .. } = &expr.kind else {
            panic!("expected comparison");
        };
        let ExprKind::Operator { op: OperatorType::Plus, operands } = &left.kind else {
            panic!("expected plus");
        };
        assert!(matches!(operands[1].kind, ExprKind::Operator { op: OperatorType::Multiply, .. }));
    }

    #[test]
    fn test_connectives_flatten() {
        let expr = where_expr("SELECT * FROM t WHERE a AND (b AND c) AND d");
        let ExprKind::Boolean { op: BoolOp::And, operands } = &expr.kind else {
            panic!("expected AND");
        };
        assert_eq!(operands.len(), 4);
    }

    #[test]
    fn test_negative_literal_folds() {
        let expr = where_expr("SELECT * FROM t WHERE a = -5");
        let ExprKind::Comparison { right, .. } = &expr.kind else {
            panic!("expected comparison");
        };
        assert!(matches!(right.kind, ExprKind::Constant(Value::Integer(-5))));
    }

    #[test]
    fn test_min_integer_stays_integer() {
        let expr = where_expr("SELECT * FROM t WHERE a = -9223372036854775808");
        let ExprKind::Comparison { right, .. } = &expr.kind else {
            panic!("expected comparison");
        };
        assert!(matches!(right.kind, ExprKind::Constant(Value::Integer(i64::MIN))));

        let expr = where_expr("SELECT * FROM t WHERE a = 9223372036854775808");
        let ExprKind::Comparison { right, .. } = &expr.kind else {
            panic!("expected comparison");
        };
        assert!(matches!(right.kind, ExprKind::Constant(Value::Decimal(_))));
    }

    #[test]
    fn test_infinite_decimal_rejected() {
        for sql in [
            "SELECT 1e400 FROM t".to_string(),
            format!("SELECT {} FROM t", "9".repeat(400)),
        ] {
            assert!(
                matches!(parse(&sql), Err(Error::MalformedExternalTree { .. })),
                "accepted {sql}"
            );
        }
        assert!(parse("SELECT 1e300 FROM t").is_ok());
    }

    #[test]
    fn test_union_all_is_recorded() {
        let (result, handle) = single("SELECT a FROM t UNION SELECT b FROM u UNION ALL SELECT c FROM v");
        let select = result.statement(handle).unwrap().as_select().unwrap();
        assert!(!select.union_all);
        let second = select.union_select.as_deref().unwrap();
        assert!(second.union_all);
        let third = second.union_select.as_deref().unwrap();
        assert!(!third.union_all);
        assert!(third.union_select.is_none());
    }

    #[test]
    fn test_between_rewrites() {
        let expr = where_expr("SELECT * FROM t WHERE a NOT BETWEEN 1 AND 10");
        let ExprKind::Boolean { op: BoolOp::Not, operands } = &expr.kind else {
            panic!("expected NOT");
        };
        let ExprKind::Boolean { op: BoolOp::And, operands } = &operands[0].kind else {
            panic!("expected AND");
        };
        assert!(matches!(
            operands[0].kind,
            ExprKind::Comparison { op: ComparisonType::GreaterThanOrEqualTo, .. }
        ));
        assert!(matches!(
            operands[1].kind,
            ExprKind::Comparison { op: ComparisonType::LessThanOrEqualTo, .. }
        ));
    }

    #[test]
    fn test_predicates() {
        let expr = where_expr("SELECT * FROM t WHERE a IS NOT NULL");
        assert!(matches!(expr.kind, ExprKind::Operator { op: OperatorType::IsNotNull, .. }));

        let expr = where_expr("SELECT * FROM t WHERE a NOT IN (1, 2, 3)");
        let ExprKind::Operator { op: OperatorType::NotIn, operands } = &expr.kind else {
            panic!("expected NOT IN");
        };
        assert_eq!(operands.len(), 4);

        let expr = where_expr("SELECT * FROM t WHERE name LIKE 'a%'");
        assert!(matches!(expr.kind, ExprKind::Comparison { op: ComparisonType::Like, .. }));

        let expr = where_expr("SELECT * FROM t WHERE a IS NOT DISTINCT FROM b");
        assert!(matches!(expr.kind, ExprKind::Boolean { op: BoolOp::Not, .. }));
    }

    #[test]
    fn test_simple_case_compares_operand() {
        let (result, handle) = single("SELECT CASE x WHEN 1 THEN 'one' ELSE 'many' END FROM t");
        let select = result.statement(handle).unwrap().as_select().unwrap();
        let expr = result.expression(select.select[0]).unwrap();
        let ExprKind::Case { clauses, default } = &expr.kind else {
            panic!("expected CASE");
        };
        assert_eq!(clauses.len(), 1);
        assert!(matches!(clauses[0].condition.kind, ExprKind::Comparison { op: ComparisonType::Equal, .. }));
        assert!(default.is_some());
    }

    #[test]
    fn test_casts() {
        let (result, handle) = single("SELECT CAST(a AS VARCHAR), b::int FROM t");
        let select = result.statement(handle).unwrap().as_select().unwrap();
        assert_eq!(result.expression(select.select[0]).unwrap().return_type, DataType::Varchar);
        assert_eq!(result.expression(select.select[1]).unwrap().return_type, DataType::Integer);
    }

    #[test]
    fn test_identifier_case() {
        let (result, handle) = single("SELECT Foo, \"Bar\" FROM T");
        let select = result.statement(handle).unwrap().as_select().unwrap();
        let ExprKind::Column(first) = &result.expression(select.select[0]).unwrap().kind else {
            panic!("expected column");
        };
        let ExprKind::Column(second) = &result.expression(select.select[1]).unwrap().kind else {
            panic!("expected column");
        };
        assert_eq!(first.column, "foo");
        assert_eq!(second.column, "Bar");
        assert_eq!(select.from.as_ref().unwrap().table_name(), Some("t"));
    }

    #[test]
    fn test_joins_are_left_deep() {
        let (result, handle) = single("SELECT * FROM a JOIN b ON a.id = b.id LEFT OUTER JOIN c ON b.id = c.id");
        let select = result.statement(handle).unwrap().as_select().unwrap();
        let TableRefKind::Join(outer) = &select.from.as_ref().unwrap().kind else {
            panic!("expected join");
        };
        assert_eq!(outer.join_type, JoinType::Left);
        assert_eq!(outer.right.table_name(), Some("c"));
        let TableRefKind::Join(inner) = &outer.left.kind else {
            panic!("expected nested join");
        };
        assert_eq!(inner.join_type, JoinType::Inner);
        assert!(inner.condition.is_some());
    }

    #[test]
    fn test_from_list() {
        let (result, handle) = single("SELECT * FROM a, b x");
        let select = result.statement(handle).unwrap().as_select().unwrap();
        let TableRefKind::List(items) = &select.from.as_ref().unwrap().kind else {
            panic!("expected list");
        };
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].alias.as_deref(), Some("x"));
    }

    #[test]
    fn test_insert_values() {
        let (result, handle) = single("INSERT INTO t (a, b) VALUES (1, 'x'), (2, 'y')");
        let Statement::Insert(insert) = result.statement(handle).unwrap() else {
            panic!("expected insert");
        };
        assert_eq!(insert.columns, vec!["a", "b"]);
        let InsertSource::Values(rows) = &insert.source else {
            panic!("expected values");
        };
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].len(), 2);
    }

    #[test]
    fn test_truncate_is_delete() {
        let (result, handle) = single("TRUNCATE TABLE t");
        let Statement::Delete(delete) = result.statement(handle).unwrap() else {
            panic!("expected delete");
        };
        assert!(delete.where_clause.is_none());
        assert_eq!(delete.table.table_name(), Some("t"));
    }

    #[test]
    fn test_foreign_keys() {
        let (result, handle) = single(
            "CREATE TABLE o (id INT PRIMARY KEY, c INT REFERENCES cust (id) ON DELETE CASCADE, \
             d INT, FOREIGN KEY (d) REFERENCES dept (id) MATCH FULL ON UPDATE SET NULL)",
        );
        let Statement::CreateTable(create) = result.statement(handle).unwrap() else {
            panic!("expected create table");
        };
        assert!(create.columns[0].primary);
        assert!(!create.columns[0].nullable);
        assert_eq!(create.foreign_keys.len(), 2);
        assert_eq!(create.foreign_keys[0].on_delete, FkAction::Cascade);
        assert_eq!(create.foreign_keys[0].on_update, FkAction::NoAction);
        assert_eq!(create.foreign_keys[1].match_type, FkMatch::Full);
        assert_eq!(create.foreign_keys[1].on_update, FkAction::SetNull);
        assert_eq!(create.foreign_keys[1].ref_columns, vec!["id"]);
    }

    #[test]
    fn test_unsupported_statement() {
        match parse("ALTER TABLE t ADD COLUMN x INT") {
            Err(Error::UnsupportedConstruct(what)) => assert!(what.contains("ALTER")),
            other => panic!("expected unsupported, got {:?}", other.map(|r| r.statements().len())),
        }
    }

    #[test]
    fn test_distinct_on_scalar_function_rejected() {
        assert!(matches!(
            parse("SELECT lower(DISTINCT a) FROM t"),
            Err(Error::UnsupportedConstruct(_))
        ));
    }

    #[test]
    fn test_parameter_zero_is_malformed() {
        match parse("SELECT * FROM t WHERE a = $0") {
            Err(Error::MalformedExternalTree { kind, field }) => {
                assert_eq!(kind, "parameter");
                assert_eq!(field, "index");
            }
            other => panic!("expected malformed tree, got {:?}", other.map(|r| r.statements().len())),
        }
        let expr = where_expr("SELECT * FROM t WHERE a = $2");
        let ExprKind::Comparison { right, .. } = &expr.kind else {
            panic!("expected comparison");
        };
        assert!(matches!(right.kind, ExprKind::Parameter(1)));
    }

    #[test]
    fn test_depth_limit() {
        let nested = format!("SELECT {}1{} FROM t", "(".repeat(40), ")".repeat(40));
        assert!(matches!(
            parse_with(&nested, &ParseOptions { max_depth: 16 }),
            Err(Error::DepthLimitExceeded(16))
        ));
        assert!(parse(&nested).is_ok());
    }

    #[test]
    fn test_not_chain_counts_toward_depth() {
        let chain = format!("SELECT * FROM t WHERE {}a", "NOT ".repeat(60));
        assert!(matches!(
            parse_with(&chain, &ParseOptions { max_depth: 16 }),
            Err(Error::DepthLimitExceeded(16))
        ));

        let expr = where_expr("SELECT * FROM t WHERE NOT NOT a");
        let ExprKind::Boolean { op: BoolOp::Not, operands } = &expr.kind else {
            panic!("expected NOT, got {:?}", expr.kind);
        };
        assert!(matches!(operands[0].kind, ExprKind::Boolean { op: BoolOp::Not, .. }));
    }

    #[test]
    fn test_take_ownership_invalidates_handles() {
        let mut result = parse("SELECT a FROM t").unwrap();
        let handle = result.statements()[0];
        let expr = result.expressions().unwrap()[0];

        let contents = result.take_ownership().unwrap();
        assert_eq!(contents.statements.len(), 1);
        assert_eq!(contents.expressions.len(), 1);
        assert!(result.statements().is_empty());
        assert!(result.statement(handle).is_err());
        assert!(result.expression(expr).is_err());
    }

    #[test]
    fn test_derive_names() {
        let mut result = parse("SELECT a + 1, max(b) AS top FROM t").unwrap();
        result.derive_names().unwrap();
        let names: Vec<String> = result
            .expressions()
            .unwrap()
            .into_iter()
            .map(|h| result.expression(h).unwrap().name().to_string())
            .collect();
        assert_eq!(names, vec!["a + 1", "top"]);
    }
}
