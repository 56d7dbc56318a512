//! Parse, serialize, deserialize and compare whole statements.

use std::collections::HashSet;

use quill_ast::{
    deserialize, deserialize_with, fingerprint, serialize, structural_hash, walk_expression, Arena, DecodeOptions,
    Deserialized, ExprKind, Expression, Statement, Visitor,
};
use quill_parser::parse;

fn first_statement(sql: &str) -> (quill_parser::ParseResult, Statement) {
    let result = parse(sql).unwrap();
    let stmt = result.statement(result.statements()[0]).unwrap().clone();
    (result, stmt)
}

/// Serialize, decode into a fresh arena, and hand back both sides.
fn round_trip(sql: &str) -> (quill_parser::ParseResult, Statement, Arena, Statement) {
    let (result, stmt) = first_statement(sql);
    let doc = serialize(&stmt, result.arena()).unwrap();
    let decoded: Deserialized<Statement> = deserialize(&doc).unwrap();
    let mut arena = Arena::new();
    let copy = arena.splice(decoded).unwrap();
    (result, stmt, arena, copy)
}

#[test]
fn test_select_end_to_end() {
    let (result, stmt, arena, copy) = round_trip("SELECT a, count(b) FROM t WHERE a > 1 GROUP BY a ORDER BY a LIMIT 5");

    assert_eq!(result.arena().bind(&stmt).unwrap(), arena.bind(&copy).unwrap());
    assert_eq!(
        fingerprint(&stmt, result.arena()).unwrap(),
        fingerprint(&copy, &arena).unwrap()
    );

    let doc = serialize(&stmt, result.arena()).unwrap();
    assert_eq!(doc["type"], "SELECT");
    assert_eq!(doc["select"][1]["type"], "AGGREGATE_COUNT");
    assert_eq!(doc["where"]["type"], "COMPARE_GREATER_THAN");
    assert_eq!(doc["limit"]["limit"], 5);
}

#[test]
fn test_union_chain_round_trip() {
    let (result, stmt, arena, copy) = round_trip("SELECT a FROM t UNION SELECT b FROM u UNION ALL SELECT c FROM v");

    let select = stmt.as_select().unwrap();
    let second = select.union_select.as_deref().unwrap();
    assert!(second.union_select.is_some());

    let decoded = copy.as_select().unwrap();
    let decoded_second = decoded.union_select.as_deref().unwrap();
    assert_eq!(
        result.arena().bind(second).unwrap(),
        arena.bind(decoded_second).unwrap()
    );
    assert_eq!(arena.expression_count(), 3);
}

#[test]
fn test_decoded_expressions_are_arena_scoped() {
    let (result, stmt) = first_statement("SELECT x FROM (SELECT a AS x FROM t WHERE a IN (SELECT b FROM u)) s");
    let doc = serialize(&stmt, result.arena()).unwrap();
    let decoded: Deserialized<Statement> = deserialize(&doc).unwrap();
    // x, a AS x, the IN predicate, and b inside its subquery
    assert_eq!(decoded.expressions.len(), 4);
    let aliased: Vec<_> = decoded.expressions.iter().filter_map(|e| e.alias.as_deref()).collect();
    assert_eq!(aliased, vec!["x"]);
}

#[test]
fn test_aggregate_names_ignore_case() {
    let (result, stmt) = first_statement("SELECT MIN(a), Max(b), cOUNT(c), median(d) FROM t");
    let doc = serialize(&stmt, result.arena()).unwrap();
    let types: Vec<&str> = doc["select"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["type"].as_str().unwrap())
        .collect();
    assert_eq!(types, vec!["AGGREGATE_MIN", "AGGREGATE_MAX", "AGGREGATE_COUNT", "FUNCTION"]);
    assert_eq!(doc["select"][3]["function"], "median");
}

#[test]
fn test_count_star_gets_star_argument() {
    let (result, stmt) = first_statement("SELECT count(*) FROM t");
    let select = stmt.as_select().unwrap();
    let ExprKind::Aggregate { args, .. } = &result.expression(select.select[0]).unwrap().kind else {
        panic!("expected aggregate");
    };
    assert!(matches!(args.as_slice(), [Expression { kind: ExprKind::Star, .. }]));
}

#[test]
fn test_identical_queries_hash_alike() {
    let sql = "SELECT a + 1 FROM t WHERE b = 'x' AND c IS NULL";
    let (left, left_stmt) = first_statement(sql);
    let (right, right_stmt) = first_statement(sql);
    let (other, other_stmt) = first_statement("SELECT a + 2 FROM t WHERE b = 'x' AND c IS NULL");

    assert_eq!(
        structural_hash(&left_stmt, left.arena()),
        structural_hash(&right_stmt, right.arena())
    );

    let mut seen = HashSet::new();
    assert!(seen.insert(left.arena().bind(&left_stmt).unwrap()));
    assert!(!seen.insert(right.arena().bind(&right_stmt).unwrap()));
    assert!(seen.insert(other.arena().bind(&other_stmt).unwrap()));
}

#[test]
fn test_distinct_queries_hash_apart() {
    let samples = [
        "SELECT a + b FROM t",
        "SELECT a - b FROM t",
        "SELECT a * b FROM t",
        "SELECT * FROM t WHERE a < b",
        "SELECT * FROM t WHERE b < a",
        "SELECT * FROM t WHERE a > b",
        "SELECT * FROM t WHERE a = 1",
        "SELECT * FROM t WHERE a = 1.5",
        "SELECT * FROM t WHERE a = '1'",
        "SELECT a FROM t",
        "SELECT a FROM u",
        "SELECT a AS b FROM t",
        "SELECT DISTINCT a FROM t",
        "SELECT count(a) FROM t",
        "SELECT count(DISTINCT a) FROM t",
        "SELECT sum(a) FROM t",
        "SELECT a FROM t UNION SELECT a FROM t",
        "SELECT a FROM t UNION ALL SELECT a FROM t",
        "SELECT a FROM t JOIN u ON a = b",
        "SELECT a FROM t LEFT JOIN u ON a = b",
        "DELETE FROM t WHERE a = 1",
        "UPDATE t SET a = 1",
        "DROP TABLE t",
        "DROP VIEW t",
        "BEGIN",
        "COMMIT",
        "ROLLBACK",
    ];
    let hashes: Vec<(u64, &str)> = samples
        .iter()
        .map(|sql| {
            let (result, stmt) = first_statement(sql);
            (structural_hash(&stmt, result.arena()), *sql)
        })
        .collect();
    for (i, (left, left_sql)) in hashes.iter().enumerate() {
        for (right, right_sql) in &hashes[i + 1..] {
            assert_ne!(left, right, "{left_sql} and {right_sql} hash alike");
        }
    }
}

#[test]
fn test_union_all_keeps_its_own_fingerprint() {
    let (union, union_stmt) = first_statement("SELECT a FROM t UNION SELECT a FROM t");
    let (all, all_stmt, arena, copy) = round_trip("SELECT a FROM t UNION ALL SELECT a FROM t");

    assert!(copy.as_select().unwrap().union_all);
    assert_eq!(all.arena().bind(&all_stmt).unwrap(), arena.bind(&copy).unwrap());
    assert_ne!(union.arena().bind(&union_stmt).unwrap(), all.arena().bind(&all_stmt).unwrap());
    assert_ne!(
        fingerprint(&union_stmt, union.arena()).unwrap(),
        fingerprint(&all_stmt, all.arena()).unwrap()
    );
}

#[test]
fn test_decimal_constants_round_trip() {
    let (result, stmt, arena, copy) = round_trip("SELECT 2.5, -0.25, 25e9 FROM t");
    assert_eq!(result.arena().bind(&stmt).unwrap(), arena.bind(&copy).unwrap());
}

#[test]
fn test_clone_is_equal() {
    let (result, stmt) = first_statement("SELECT DISTINCT a FROM t JOIN u ON t.id = u.id WHERE a LIKE 'q%'");
    let copy = stmt.clone();
    assert_eq!(result.arena().bind(&stmt).unwrap(), result.arena().bind(&copy).unwrap());
}

#[test]
fn test_create_table_round_trip() {
    let (result, stmt, arena, copy) = round_trip(
        "CREATE TABLE IF NOT EXISTS s.orders (\
           id BIGINT PRIMARY KEY, \
           name VARCHAR(40) NOT NULL DEFAULT 'none', \
           qty INT CHECK (qty > 0), \
           cust INT REFERENCES customers (id) ON DELETE SET DEFAULT)",
    );
    assert_eq!(result.arena().bind(&stmt).unwrap(), arena.bind(&copy).unwrap());

    let Statement::CreateTable(create) = &copy else {
        panic!("expected create table");
    };
    assert!(create.if_not_exists);
    assert_eq!(create.table.schema.as_deref(), Some("s"));
    assert_eq!(create.columns[1].varlen, Some(40));
    assert!(create.columns[1].default.is_some());
    assert!(create.columns[2].check.is_some());
    assert_eq!(create.foreign_keys[0].columns, vec!["cust"]);
}

#[test]
fn test_utility_statements_round_trip() {
    for sql in [
        "UPDATE t SET a = a + 1, b = 'x' WHERE id = $1",
        "DELETE FROM t WHERE a IS NULL",
        "INSERT INTO t SELECT * FROM u",
        "CREATE UNIQUE INDEX ix ON t USING hash (a, (b + 1), lower(c))",
        "CREATE VIEW v AS SELECT a FROM t",
        "CREATE TRIGGER trg BEFORE INSERT OR UPDATE OF a ON t FOR EACH ROW WHEN (a > 0) EXECUTE FUNCTION f('x', 1)",
        "COPY t (a, b) FROM 'data.csv' WITH (FORMAT csv, DELIMITER '|')",
        "COPY (SELECT a FROM t) TO STDOUT",
        "EXPLAIN SELECT a FROM t",
        "PREPARE q (INT, TEXT) AS SELECT a FROM t WHERE a = $1",
        "EXECUTE q (1, 'x')",
        "SET search_path TO public, other",
        "ANALYZE t (a)",
    ] {
        let (result, stmt, arena, copy) = round_trip(sql);
        assert_eq!(
            result.arena().bind(&stmt).unwrap(),
            arena.bind(&copy).unwrap(),
            "round trip changed {sql}"
        );
    }
}

#[test]
fn test_decode_depth_limit() {
    let nested = format!("SELECT {}1{} FROM t", "(a + ".repeat(20), ")".repeat(20));
    let (result, stmt) = first_statement(&nested);
    let doc = serialize(&stmt, result.arena()).unwrap();
    let decoded = deserialize_with::<Statement>(&doc, &DecodeOptions { max_depth: 8 });
    assert!(matches!(decoded, Err(quill_ast::Error::DepthLimitExceeded(8))));
}

#[derive(Default)]
struct Columns(Vec<String>);

impl Visitor for Columns {
    fn visit_expression(&mut self, arena: &Arena, expr: &Expression) -> quill_ast::Result<()> {
        if let ExprKind::Column(col) = &expr.kind {
            self.0.push(col.column.clone());
        }
        walk_expression(self, arena, expr)
    }
}

#[test]
fn test_visitor_reaches_subqueries() {
    let (result, stmt) = first_statement("SELECT a FROM t WHERE b IN (SELECT c FROM u WHERE d = 1)");
    let mut columns = Columns::default();
    columns.visit_statement(result.arena(), &stmt).unwrap();
    columns.0.sort();
    assert_eq!(columns.0, vec!["a", "b", "c", "d"]);
}
