//! Structural equality and hashing
//!
//! Two nodes are equal when their kind tags, own fields and children match
//! pairwise in order. Handles are compared by what they resolve to, each side
//! through its own arena, so trees living in different arenas (for example a
//! tree and its decoded copy) still compare equal. A handle that does not
//! resolve is never equal to anything.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::arena::{Arena, ExprHandle};
use crate::expression::{ExprKind, Expression, WhenClause};
use crate::statement::*;

pub trait Structural {
    fn structural_eq(&self, arena: &Arena, other: &Self, other_arena: &Arena) -> bool;
    fn structural_hash<H: Hasher>(&self, arena: &Arena, state: &mut H);
}

/// A node paired with the arena its handles resolve in. Implements
/// `PartialEq`, `Eq` and `Hash` structurally.
///
/// `Eq` is reflexive only for nodes whose handles all resolve in the bound
/// arena. A node reaching a dangling handle compares unequal even to itself,
/// so keep such nodes out of hash sets and maps.
pub struct Bound<'a, T: ?Sized> {
    pub(crate) node: &'a T,
    pub(crate) arena: &'a Arena,
}

impl<'a, T: ?Sized> Bound<'a, T> {
    pub fn node(&self) -> &'a T {
        self.node
    }

    pub fn arena(&self) -> &'a Arena {
        self.arena
    }
}

impl<T: Structural> PartialEq for Bound<'_, T> {
    fn eq(&self, other: &Self) -> bool {
        self.node.structural_eq(self.arena, other.node, other.arena)
    }
}

impl<T: Structural> Eq for Bound<'_, T> {}

impl<T: Structural> Hash for Bound<'_, T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.node.structural_hash(self.arena, state)
    }
}

impl<T: fmt::Debug + ?Sized> fmt::Debug for Bound<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} @ arena {}", self.node, self.arena.id())
    }
}

/// 64-bit structural hash of a node.
pub fn structural_hash<T: Structural>(node: &T, arena: &Arena) -> u64 {
    let mut hasher = DefaultHasher::new();
    node.structural_hash(arena, &mut hasher);
    hasher.finish()
}

const DANGLING: u8 = 0xff;

impl Structural for ExprHandle {
    fn structural_eq(&self, arena: &Arena, other: &Self, other_arena: &Arena) -> bool {
        match (arena.expression(*self), other_arena.expression(*other)) {
            (Ok(a), Ok(b)) => a.structural_eq(arena, b, other_arena),
            _ => false,
        }
    }

    fn structural_hash<H: Hasher>(&self, arena: &Arena, state: &mut H) {
        match arena.expression(*self) {
            Ok(expr) => expr.structural_hash(arena, state),
            Err(_) => DANGLING.hash(state),
        }
    }
}

impl<T: Structural> Structural for Option<T> {
    fn structural_eq(&self, arena: &Arena, other: &Self, other_arena: &Arena) -> bool {
        match (self, other) {
            (Some(a), Some(b)) => a.structural_eq(arena, b, other_arena),
            (None, None) => true,
            _ => false,
        }
    }

    fn structural_hash<H: Hasher>(&self, arena: &Arena, state: &mut H) {
        self.is_some().hash(state);
        if let Some(inner) = self {
            inner.structural_hash(arena, state);
        }
    }
}

impl<T: Structural> Structural for Vec<T> {
    fn structural_eq(&self, arena: &Arena, other: &Self, other_arena: &Arena) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .zip(other)
                .all(|(a, b)| a.structural_eq(arena, b, other_arena))
    }

    fn structural_hash<H: Hasher>(&self, arena: &Arena, state: &mut H) {
        self.len().hash(state);
        for item in self {
            item.structural_hash(arena, state);
        }
    }
}

impl<T: Structural> Structural for Box<T> {
    fn structural_eq(&self, arena: &Arena, other: &Self, other_arena: &Arena) -> bool {
        self.as_ref().structural_eq(arena, other.as_ref(), other_arena)
    }

    fn structural_hash<H: Hasher>(&self, arena: &Arena, state: &mut H) {
        self.as_ref().structural_hash(arena, state)
    }
}

impl Structural for WhenClause {
    fn structural_eq(&self, arena: &Arena, other: &Self, other_arena: &Arena) -> bool {
        self.condition.structural_eq(arena, &other.condition, other_arena)
            && self.result.structural_eq(arena, &other.result, other_arena)
    }

    fn structural_hash<H: Hasher>(&self, arena: &Arena, state: &mut H) {
        self.condition.structural_hash(arena, state);
        self.result.structural_hash(arena, state);
    }
}

impl Structural for Expression {
    fn structural_eq(&self, arena: &Arena, other: &Self, other_arena: &Arena) -> bool {
        if self.return_type != other.return_type || self.alias != other.alias {
            return false;
        }
        match (&self.kind, &other.kind) {
            (ExprKind::Constant(a), ExprKind::Constant(b)) => a == b,
            (ExprKind::Column(a), ExprKind::Column(b)) => a == b,
            (ExprKind::Star, ExprKind::Star) => true,
            (ExprKind::Parameter(a), ExprKind::Parameter(b)) => a == b,
            (
                ExprKind::Operator { op, operands },
                ExprKind::Operator { op: other_op, operands: other_operands },
            ) => op == other_op && operands.structural_eq(arena, other_operands, other_arena),
            (
                ExprKind::Comparison { op, left, right },
                ExprKind::Comparison { op: other_op, left: other_left, right: other_right },
            ) => {
                op == other_op
                    && left.structural_eq(arena, other_left, other_arena)
                    && right.structural_eq(arena, other_right, other_arena)
            }
            (
                ExprKind::Boolean { op, operands },
                ExprKind::Boolean { op: other_op, operands: other_operands },
            ) => op == other_op && operands.structural_eq(arena, other_operands, other_arena),
            (
                ExprKind::Function { name, args },
                ExprKind::Function { name: other_name, args: other_args },
            ) => name == other_name && args.structural_eq(arena, other_args, other_arena),
            (
                ExprKind::Aggregate { func, distinct, args },
                ExprKind::Aggregate { func: other_func, distinct: other_distinct, args: other_args },
            ) => {
                func == other_func
                    && distinct == other_distinct
                    && args.structural_eq(arena, other_args, other_arena)
            }
            (
                ExprKind::Case { clauses, default },
                ExprKind::Case { clauses: other_clauses, default: other_default },
            ) => {
                clauses.structural_eq(arena, other_clauses, other_arena)
                    && default.structural_eq(arena, other_default, other_arena)
            }
            (ExprKind::Cast(a), ExprKind::Cast(b)) => a.structural_eq(arena, b, other_arena),
            (ExprKind::Subquery(a), ExprKind::Subquery(b)) => a.structural_eq(arena, b, other_arena),
            _ => false,
        }
    }

    fn structural_hash<H: Hasher>(&self, arena: &Arena, state: &mut H) {
        self.expression_type().hash(state);
        self.return_type.hash(state);
        self.alias.hash(state);
        match &self.kind {
            ExprKind::Constant(value) => value.hash(state),
            ExprKind::Column(col) => col.hash(state),
            ExprKind::Parameter(index) => index.hash(state),
            ExprKind::Function { name, .. } => name.hash(state),
            ExprKind::Aggregate { distinct, .. } => distinct.hash(state),
            ExprKind::Case { default, .. } => default.is_some().hash(state),
            ExprKind::Subquery(select) => select.structural_hash(arena, state),
            ExprKind::Star
            | ExprKind::Operator { .. }
            | ExprKind::Comparison { .. }
            | ExprKind::Boolean { .. }
            | ExprKind::Cast(_) => {}
        }
        for child in self.children() {
            child.structural_hash(arena, state);
        }
    }
}

impl Structural for SelectStatement {
    fn structural_eq(&self, arena: &Arena, other: &Self, other_arena: &Arena) -> bool {
        self.distinct == other.distinct
            && self.limit == other.limit
            && self.select.structural_eq(arena, &other.select, other_arena)
            && self.from.structural_eq(arena, &other.from, other_arena)
            && self.where_clause.structural_eq(arena, &other.where_clause, other_arena)
            && self.group_by.structural_eq(arena, &other.group_by, other_arena)
            && self.order_by.structural_eq(arena, &other.order_by, other_arena)
            && self.union_all == other.union_all
            && self.union_select.structural_eq(arena, &other.union_select, other_arena)
    }

    fn structural_hash<H: Hasher>(&self, arena: &Arena, state: &mut H) {
        StatementType::Select.hash(state);
        self.distinct.hash(state);
        self.limit.hash(state);
        self.select.structural_hash(arena, state);
        self.from.structural_hash(arena, state);
        self.where_clause.structural_hash(arena, state);
        self.group_by.structural_hash(arena, state);
        self.order_by.structural_hash(arena, state);
        self.union_all.hash(state);
        self.union_select.structural_hash(arena, state);
    }
}

impl Structural for GroupByDescription {
    fn structural_eq(&self, arena: &Arena, other: &Self, other_arena: &Arena) -> bool {
        self.columns.structural_eq(arena, &other.columns, other_arena)
            && self.having.structural_eq(arena, &other.having, other_arena)
    }

    fn structural_hash<H: Hasher>(&self, arena: &Arena, state: &mut H) {
        self.columns.structural_hash(arena, state);
        self.having.structural_hash(arena, state);
    }
}

impl Structural for OrderByItem {
    fn structural_eq(&self, arena: &Arena, other: &Self, other_arena: &Arena) -> bool {
        self.order == other.order && self.expr.structural_eq(arena, &other.expr, other_arena)
    }

    fn structural_hash<H: Hasher>(&self, arena: &Arena, state: &mut H) {
        self.order.hash(state);
        self.expr.structural_hash(arena, state);
    }
}

impl Structural for OrderByDescription {
    fn structural_eq(&self, arena: &Arena, other: &Self, other_arena: &Arena) -> bool {
        self.items.structural_eq(arena, &other.items, other_arena)
    }

    fn structural_hash<H: Hasher>(&self, arena: &Arena, state: &mut H) {
        self.items.structural_hash(arena, state);
    }
}

impl Structural for TableRef {
    fn structural_eq(&self, arena: &Arena, other: &Self, other_arena: &Arena) -> bool {
        if self.alias != other.alias {
            return false;
        }
        match (&self.kind, &other.kind) {
            (TableRefKind::Base(a), TableRefKind::Base(b)) => a == b,
            (TableRefKind::Select(a), TableRefKind::Select(b)) => a.structural_eq(arena, b, other_arena),
            (TableRefKind::Join(a), TableRefKind::Join(b)) => a.structural_eq(arena, b, other_arena),
            (TableRefKind::List(a), TableRefKind::List(b)) => a.structural_eq(arena, b, other_arena),
            _ => false,
        }
    }

    fn structural_hash<H: Hasher>(&self, arena: &Arena, state: &mut H) {
        self.reference_type().hash(state);
        self.alias.hash(state);
        match &self.kind {
            TableRefKind::Base(info) => info.hash(state),
            TableRefKind::Select(select) => select.structural_hash(arena, state),
            TableRefKind::Join(join) => join.structural_hash(arena, state),
            TableRefKind::List(list) => list.structural_hash(arena, state),
        }
    }
}

impl Structural for JoinDefinition {
    fn structural_eq(&self, arena: &Arena, other: &Self, other_arena: &Arena) -> bool {
        self.join_type == other.join_type
            && self.left.structural_eq(arena, &other.left, other_arena)
            && self.right.structural_eq(arena, &other.right, other_arena)
            && self.condition.structural_eq(arena, &other.condition, other_arena)
    }

    fn structural_hash<H: Hasher>(&self, arena: &Arena, state: &mut H) {
        self.join_type.hash(state);
        self.left.structural_hash(arena, state);
        self.right.structural_hash(arena, state);
        self.condition.structural_hash(arena, state);
    }
}

impl Structural for UpdateClause {
    fn structural_eq(&self, arena: &Arena, other: &Self, other_arena: &Arena) -> bool {
        self.column == other.column && self.value.structural_eq(arena, &other.value, other_arena)
    }

    fn structural_hash<H: Hasher>(&self, arena: &Arena, state: &mut H) {
        self.column.hash(state);
        self.value.structural_hash(arena, state);
    }
}

impl Structural for ColumnDefinition {
    fn structural_eq(&self, arena: &Arena, other: &Self, other_arena: &Arena) -> bool {
        self.name == other.name
            && self.data_type == other.data_type
            && self.varlen == other.varlen
            && self.nullable == other.nullable
            && self.primary == other.primary
            && self.unique == other.unique
            && self.default.structural_eq(arena, &other.default, other_arena)
            && self.check.structural_eq(arena, &other.check, other_arena)
    }

    fn structural_hash<H: Hasher>(&self, arena: &Arena, state: &mut H) {
        self.name.hash(state);
        self.data_type.hash(state);
        self.varlen.hash(state);
        (self.nullable, self.primary, self.unique).hash(state);
        self.default.structural_hash(arena, state);
        self.check.structural_hash(arena, state);
    }
}

impl Structural for IndexAttribute {
    fn structural_eq(&self, arena: &Arena, other: &Self, other_arena: &Arena) -> bool {
        match (self, other) {
            (IndexAttribute::Column(a), IndexAttribute::Column(b)) => a == b,
            (IndexAttribute::Expr(a), IndexAttribute::Expr(b)) => a.structural_eq(arena, b, other_arena),
            _ => false,
        }
    }

    fn structural_hash<H: Hasher>(&self, arena: &Arena, state: &mut H) {
        match self {
            IndexAttribute::Column(name) => (0u8, name).hash(state),
            IndexAttribute::Expr(handle) => {
                1u8.hash(state);
                handle.structural_hash(arena, state);
            }
        }
    }
}

impl Structural for InsertSource {
    fn structural_eq(&self, arena: &Arena, other: &Self, other_arena: &Arena) -> bool {
        match (self, other) {
            (InsertSource::Values(a), InsertSource::Values(b)) => a.structural_eq(arena, b, other_arena),
            (InsertSource::Select(a), InsertSource::Select(b)) => a.structural_eq(arena, b, other_arena),
            _ => false,
        }
    }

    fn structural_hash<H: Hasher>(&self, arena: &Arena, state: &mut H) {
        match self {
            InsertSource::Values(rows) => {
                0u8.hash(state);
                rows.structural_hash(arena, state);
            }
            InsertSource::Select(select) => {
                1u8.hash(state);
                select.structural_hash(arena, state);
            }
        }
    }
}

impl Structural for Statement {
    fn structural_eq(&self, arena: &Arena, other: &Self, other_arena: &Arena) -> bool {
        use Statement as S;
        match (self, other) {
            (S::Select(a), S::Select(b)) => a.structural_eq(arena, b, other_arena),
            (S::Insert(a), S::Insert(b)) => {
                a.table == b.table
                    && a.columns == b.columns
                    && a.source.structural_eq(arena, &b.source, other_arena)
            }
            (S::Update(a), S::Update(b)) => {
                a.table.structural_eq(arena, &b.table, other_arena)
                    && a.clauses.structural_eq(arena, &b.clauses, other_arena)
                    && a.where_clause.structural_eq(arena, &b.where_clause, other_arena)
            }
            (S::Delete(a), S::Delete(b)) => {
                a.table.structural_eq(arena, &b.table, other_arena)
                    && a.where_clause.structural_eq(arena, &b.where_clause, other_arena)
            }
            (S::CreateTable(a), S::CreateTable(b)) => {
                a.table == b.table
                    && a.if_not_exists == b.if_not_exists
                    && a.primary_key == b.primary_key
                    && a.foreign_keys == b.foreign_keys
                    && a.columns.structural_eq(arena, &b.columns, other_arena)
            }
            (S::CreateIndex(a), S::CreateIndex(b)) => {
                a.name == b.name
                    && a.table == b.table
                    && a.unique == b.unique
                    && a.index_type == b.index_type
                    && a.attributes.structural_eq(arena, &b.attributes, other_arena)
            }
            (S::CreateTrigger(a), S::CreateTrigger(b)) => {
                a.name == b.name
                    && a.table == b.table
                    && a.function == b.function
                    && a.args == b.args
                    && a.columns == b.columns
                    && a.timing == b.timing
                    && a.events == b.events
                    && a.for_each_row == b.for_each_row
                    && a.when.structural_eq(arena, &b.when, other_arena)
            }
            (S::CreateView(a), S::CreateView(b)) => {
                a.name == b.name && a.select.structural_eq(arena, &b.select, other_arena)
            }
            (S::Copy(a), S::Copy(b)) => {
                a.columns == b.columns
                    && a.file_path == b.file_path
                    && a.is_from == b.is_from
                    && a.format == b.format
                    && (a.delimiter, a.quote, a.escape) == (b.delimiter, b.quote, b.escape)
                    && a.table.structural_eq(arena, &b.table, other_arena)
                    && a.select.structural_eq(arena, &b.select, other_arena)
            }
            (S::Explain(a), S::Explain(b)) => a.statement.structural_eq(arena, &b.statement, other_arena),
            (S::Prepare(a), S::Prepare(b)) => {
                a.name == b.name
                    && a.parameter_types == b.parameter_types
                    && a.query.structural_eq(arena, &b.query, other_arena)
            }
            (S::Execute(a), S::Execute(b)) => {
                a.name == b.name && a.parameters.structural_eq(arena, &b.parameters, other_arena)
            }
            (S::VariableSet(a), S::VariableSet(b)) => {
                a.name == b.name
                    && a.is_set_default == b.is_set_default
                    && a.values.structural_eq(arena, &b.values, other_arena)
            }
            (S::Analyze(a), S::Analyze(b)) => {
                a.columns == b.columns && a.table.structural_eq(arena, &b.table, other_arena)
            }
            (S::CreateDatabase(a), S::CreateDatabase(b)) => a == b,
            (S::CreateFunction(a), S::CreateFunction(b)) => a == b,
            (S::CreateSchema(a), S::CreateSchema(b)) => a == b,
            (S::Drop(a), S::Drop(b)) => a == b,
            (S::Transaction(a), S::Transaction(b)) => a == b,
            _ => false,
        }
    }

    fn structural_hash<H: Hasher>(&self, arena: &Arena, state: &mut H) {
        self.statement_type().hash(state);
        match self {
            Statement::Select(s) => s.structural_hash(arena, state),
            Statement::Insert(s) => {
                s.table.hash(state);
                s.columns.hash(state);
                s.source.structural_hash(arena, state);
            }
            Statement::Update(s) => {
                s.table.structural_hash(arena, state);
                s.clauses.structural_hash(arena, state);
                s.where_clause.structural_hash(arena, state);
            }
            Statement::Delete(s) => {
                s.table.structural_hash(arena, state);
                s.where_clause.structural_hash(arena, state);
            }
            Statement::CreateTable(s) => {
                s.table.hash(state);
                s.if_not_exists.hash(state);
                s.primary_key.hash(state);
                s.foreign_keys.hash(state);
                s.columns.structural_hash(arena, state);
            }
            Statement::CreateIndex(s) => {
                (&s.name, &s.table, s.unique, s.index_type).hash(state);
                s.attributes.structural_hash(arena, state);
            }
            Statement::CreateTrigger(s) => {
                (&s.name, &s.table, &s.function, &s.args, &s.columns).hash(state);
                (s.timing, &s.events, s.for_each_row).hash(state);
                s.when.structural_hash(arena, state);
            }
            Statement::CreateView(s) => {
                s.name.hash(state);
                s.select.structural_hash(arena, state);
            }
            Statement::Copy(s) => {
                (&s.columns, &s.file_path, s.is_from, s.format).hash(state);
                (s.delimiter, s.quote, s.escape).hash(state);
                s.table.structural_hash(arena, state);
                s.select.structural_hash(arena, state);
            }
            Statement::Explain(s) => s.statement.structural_hash(arena, state),
            Statement::Prepare(s) => {
                s.name.hash(state);
                s.parameter_types.hash(state);
                s.query.structural_hash(arena, state);
            }
            Statement::Execute(s) => {
                s.name.hash(state);
                s.parameters.structural_hash(arena, state);
            }
            Statement::VariableSet(s) => {
                s.name.hash(state);
                s.is_set_default.hash(state);
                s.values.structural_hash(arena, state);
            }
            Statement::Analyze(s) => {
                s.columns.hash(state);
                s.table.structural_hash(arena, state);
            }
            Statement::CreateDatabase(s) => s.hash(state),
            Statement::CreateFunction(s) => s.hash(state),
            Statement::CreateSchema(s) => s.hash(state),
            Statement::Drop(s) => s.hash(state),
            Statement::Transaction(s) => s.hash(state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::{AggregateType, ComparisonType};
    use crate::types::Value;

    fn count(arg: Expression) -> Expression {
        Expression::new(ExprKind::Aggregate {
            func: AggregateType::Count,
            distinct: false,
            args: vec![arg],
        })
    }

    #[test]
    fn test_equal_across_arenas() {
        let mut left = Arena::new();
        let mut right = Arena::new();
        // pad one arena so the handle indices differ
        right.add_expression(Expression::constant(Value::Null)).unwrap();

        let a = left.add_expression(count(Expression::column(None, "b"))).unwrap();
        let b = right.add_expression(count(Expression::column(None, "b"))).unwrap();
        assert_ne!(a.index(), b.index());
        assert_eq!(left.bind(&a).unwrap(), right.bind(&b).unwrap());
        assert_eq!(structural_hash(&a, &left), structural_hash(&b, &right));
    }

    #[test]
    fn test_child_order_matters() {
        let arena = Arena::new();
        let x = Expression::comparison(
            ComparisonType::LessThan,
            Expression::column(None, "a"),
            Expression::column(None, "b"),
        );
        let y = Expression::comparison(
            ComparisonType::LessThan,
            Expression::column(None, "b"),
            Expression::column(None, "a"),
        );
        assert_ne!(arena.bind(&x).unwrap(), arena.bind(&y).unwrap());
        assert_ne!(structural_hash(&x, &arena), structural_hash(&y, &arena));
    }

    #[test]
    fn test_kind_tag_matters() {
        let arena = Arena::new();
        let x = Expression::comparison(
            ComparisonType::Equal,
            Expression::column(None, "a"),
            Expression::constant(Value::Integer(1)),
        );
        let mut y = x.clone();
        if let ExprKind::Comparison { op, .. } = &mut y.kind {
            *op = ComparisonType::NotEqual;
        }
        assert_ne!(arena.bind(&x).unwrap(), arena.bind(&y).unwrap());
    }

    #[test]
    fn test_clone_is_equal_and_independent() {
        let arena = Arena::new();
        let original = count(Expression::column(Some("t"), "b"));
        let mut copy = original.clone();
        assert_eq!(arena.bind(&original).unwrap(), arena.bind(&copy).unwrap());

        copy.derive_name();
        if let ExprKind::Aggregate { distinct, .. } = &mut copy.kind {
            *distinct = true;
        }
        assert!(original.name().is_empty());
        assert_ne!(arena.bind(&original).unwrap(), arena.bind(&copy).unwrap());
    }

    #[test]
    fn test_dangling_handle_never_equal() {
        let mut arena = Arena::new();
        let handle = arena.add_expression(Expression::column(None, "a")).unwrap();
        let other = Arena::new();
        assert!(!handle.structural_eq(&arena, &handle, &other));
        assert!(handle.structural_eq(&arena, &handle, &arena));
    }

    #[test]
    fn test_dangling_bound_is_not_reflexive() {
        let mut arena = Arena::new();
        let handle = arena.add_expression(Expression::column(None, "a")).unwrap();
        let other = Arena::new();
        assert_eq!(arena.bind(&handle).unwrap(), arena.bind(&handle).unwrap());
        assert_ne!(other.bind(&handle).unwrap(), other.bind(&handle).unwrap());
    }
}
