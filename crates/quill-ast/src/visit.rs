//! Traversal over AST nodes
//!
//! [`Visitor`] dispatches per node family and resolves handles through the
//! arena as it goes; override a method to act on that family and call the
//! matching `walk_*` function to keep descending. [`Handles`] enumerates every
//! arena handle a node holds, for rebinding during splice and import.

use crate::arena::{Arena, ExprHandle};
use crate::error::Result;
use crate::expression::{ExprKind, Expression};
use crate::statement::*;

/// Mutable access to every arena handle stored in a node, in field order.
pub trait Handles {
    fn try_for_each_handle_mut(
        &mut self,
        f: &mut dyn FnMut(&mut ExprHandle) -> Result<()>,
    ) -> Result<()>;
}

impl Handles for ExprHandle {
    fn try_for_each_handle_mut(
        &mut self,
        f: &mut dyn FnMut(&mut ExprHandle) -> Result<()>,
    ) -> Result<()> {
        f(self)
    }
}

impl<T: Handles> Handles for Option<T> {
    fn try_for_each_handle_mut(
        &mut self,
        f: &mut dyn FnMut(&mut ExprHandle) -> Result<()>,
    ) -> Result<()> {
        match self {
            Some(inner) => inner.try_for_each_handle_mut(f),
            None => Ok(()),
        }
    }
}

impl<T: Handles> Handles for Vec<T> {
    fn try_for_each_handle_mut(
        &mut self,
        f: &mut dyn FnMut(&mut ExprHandle) -> Result<()>,
    ) -> Result<()> {
        self.iter_mut().try_for_each(|item| item.try_for_each_handle_mut(f))
    }
}

impl<T: Handles> Handles for Box<T> {
    fn try_for_each_handle_mut(
        &mut self,
        f: &mut dyn FnMut(&mut ExprHandle) -> Result<()>,
    ) -> Result<()> {
        self.as_mut().try_for_each_handle_mut(f)
    }
}

impl Handles for Expression {
    fn try_for_each_handle_mut(
        &mut self,
        f: &mut dyn FnMut(&mut ExprHandle) -> Result<()>,
    ) -> Result<()> {
        if let ExprKind::Subquery(select) = &mut self.kind {
            return select.try_for_each_handle_mut(f);
        }
        self.children_mut()
            .into_iter()
            .try_for_each(|child| child.try_for_each_handle_mut(f))
    }
}

impl Handles for SelectStatement {
    fn try_for_each_handle_mut(
        &mut self,
        f: &mut dyn FnMut(&mut ExprHandle) -> Result<()>,
    ) -> Result<()> {
        self.select.try_for_each_handle_mut(f)?;
        self.from.try_for_each_handle_mut(f)?;
        self.where_clause.try_for_each_handle_mut(f)?;
        if let Some(group_by) = &mut self.group_by {
            group_by.columns.try_for_each_handle_mut(f)?;
            group_by.having.try_for_each_handle_mut(f)?;
        }
        if let Some(order_by) = &mut self.order_by {
            for item in &mut order_by.items {
                f(&mut item.expr)?;
            }
        }
        self.union_select.try_for_each_handle_mut(f)
    }
}

impl Handles for TableRef {
    fn try_for_each_handle_mut(
        &mut self,
        f: &mut dyn FnMut(&mut ExprHandle) -> Result<()>,
    ) -> Result<()> {
        match &mut self.kind {
            TableRefKind::Base(_) => Ok(()),
            TableRefKind::Select(select) => select.try_for_each_handle_mut(f),
            TableRefKind::Join(join) => join.try_for_each_handle_mut(f),
            TableRefKind::List(list) => list.try_for_each_handle_mut(f),
        }
    }
}

impl Handles for JoinDefinition {
    fn try_for_each_handle_mut(
        &mut self,
        f: &mut dyn FnMut(&mut ExprHandle) -> Result<()>,
    ) -> Result<()> {
        self.left.try_for_each_handle_mut(f)?;
        self.right.try_for_each_handle_mut(f)?;
        self.condition.try_for_each_handle_mut(f)
    }
}

impl Handles for Statement {
    fn try_for_each_handle_mut(
        &mut self,
        f: &mut dyn FnMut(&mut ExprHandle) -> Result<()>,
    ) -> Result<()> {
        match self {
            Statement::Select(select) => select.try_for_each_handle_mut(f),
            Statement::Insert(insert) => match &mut insert.source {
                InsertSource::Values(rows) => rows.try_for_each_handle_mut(f),
                InsertSource::Select(select) => select.try_for_each_handle_mut(f),
            },
            Statement::Update(update) => {
                update.table.try_for_each_handle_mut(f)?;
                for clause in &mut update.clauses {
                    f(&mut clause.value)?;
                }
                update.where_clause.try_for_each_handle_mut(f)
            }
            Statement::Delete(delete) => {
                delete.table.try_for_each_handle_mut(f)?;
                delete.where_clause.try_for_each_handle_mut(f)
            }
            Statement::CreateTable(create) => {
                for column in &mut create.columns {
                    column.default.try_for_each_handle_mut(f)?;
                    column.check.try_for_each_handle_mut(f)?;
                }
                Ok(())
            }
            Statement::CreateIndex(create) => {
                for attribute in &mut create.attributes {
                    if let IndexAttribute::Expr(handle) = attribute {
                        f(handle)?;
                    }
                }
                Ok(())
            }
            Statement::CreateTrigger(create) => create.when.try_for_each_handle_mut(f),
            Statement::CreateView(create) => create.select.try_for_each_handle_mut(f),
            Statement::Copy(copy) => {
                copy.table.try_for_each_handle_mut(f)?;
                copy.select.try_for_each_handle_mut(f)
            }
            Statement::Explain(explain) => explain.statement.try_for_each_handle_mut(f),
            Statement::Prepare(prepare) => prepare.query.try_for_each_handle_mut(f),
            Statement::Execute(execute) => execute.parameters.try_for_each_handle_mut(f),
            Statement::VariableSet(set) => set.values.try_for_each_handle_mut(f),
            Statement::Analyze(analyze) => analyze.table.try_for_each_handle_mut(f),
            Statement::CreateDatabase(_)
            | Statement::CreateFunction(_)
            | Statement::CreateSchema(_)
            | Statement::Drop(_)
            | Statement::Transaction(_) => Ok(()),
        }
    }
}

/// Per-family traversal hooks. Every method defaults to its `walk_*`.
pub trait Visitor {
    fn visit_statement(&mut self, arena: &Arena, stmt: &Statement) -> Result<()> {
        walk_statement(self, arena, stmt)
    }

    fn visit_select(&mut self, arena: &Arena, select: &SelectStatement) -> Result<()> {
        walk_select(self, arena, select)
    }

    fn visit_table_ref(&mut self, arena: &Arena, table: &TableRef) -> Result<()> {
        walk_table_ref(self, arena, table)
    }

    fn visit_expression(&mut self, arena: &Arena, expr: &Expression) -> Result<()> {
        walk_expression(self, arena, expr)
    }
}

fn visit_handle<V: Visitor + ?Sized>(v: &mut V, arena: &Arena, handle: ExprHandle) -> Result<()> {
    let expr = arena.expression(handle)?;
    v.visit_expression(arena, expr)
}

fn visit_handles<V: Visitor + ?Sized>(v: &mut V, arena: &Arena, handles: &[ExprHandle]) -> Result<()> {
    handles.iter().try_for_each(|h| visit_handle(v, arena, *h))
}

pub fn walk_statement<V: Visitor + ?Sized>(v: &mut V, arena: &Arena, stmt: &Statement) -> Result<()> {
    match stmt {
        Statement::Select(select) => v.visit_select(arena, select),
        Statement::Insert(insert) => match &insert.source {
            InsertSource::Values(rows) => rows.iter().try_for_each(|row| visit_handles(v, arena, row)),
            InsertSource::Select(select) => v.visit_select(arena, select),
        },
        Statement::Update(update) => {
            v.visit_table_ref(arena, &update.table)?;
            for clause in &update.clauses {
                visit_handle(v, arena, clause.value)?;
            }
            update.where_clause.map_or(Ok(()), |h| visit_handle(v, arena, h))
        }
        Statement::Delete(delete) => {
            v.visit_table_ref(arena, &delete.table)?;
            delete.where_clause.map_or(Ok(()), |h| visit_handle(v, arena, h))
        }
        Statement::CreateTable(create) => {
            for column in &create.columns {
                if let Some(h) = column.default {
                    visit_handle(v, arena, h)?;
                }
                if let Some(h) = column.check {
                    visit_handle(v, arena, h)?;
                }
            }
            Ok(())
        }
        Statement::CreateIndex(create) => {
            for attribute in &create.attributes {
                if let IndexAttribute::Expr(h) = attribute {
                    visit_handle(v, arena, *h)?;
                }
            }
            Ok(())
        }
        Statement::CreateTrigger(create) => create.when.map_or(Ok(()), |h| visit_handle(v, arena, h)),
        Statement::CreateView(create) => v.visit_select(arena, &create.select),
        Statement::Copy(copy) => {
            if let Some(table) = &copy.table {
                v.visit_table_ref(arena, table)?;
            }
            match &copy.select {
                Some(select) => v.visit_select(arena, select),
                None => Ok(()),
            }
        }
        Statement::Explain(explain) => v.visit_statement(arena, &explain.statement),
        Statement::Prepare(prepare) => v.visit_statement(arena, &prepare.query),
        Statement::Execute(execute) => visit_handles(v, arena, &execute.parameters),
        Statement::VariableSet(set) => visit_handles(v, arena, &set.values),
        Statement::Analyze(analyze) => match &analyze.table {
            Some(table) => v.visit_table_ref(arena, table),
            None => Ok(()),
        },
        Statement::CreateDatabase(_)
        | Statement::CreateFunction(_)
        | Statement::CreateSchema(_)
        | Statement::Drop(_)
        | Statement::Transaction(_) => Ok(()),
    }
}

pub fn walk_select<V: Visitor + ?Sized>(v: &mut V, arena: &Arena, select: &SelectStatement) -> Result<()> {
    visit_handles(v, arena, &select.select)?;
    if let Some(from) = &select.from {
        v.visit_table_ref(arena, from)?;
    }
    if let Some(h) = select.where_clause {
        visit_handle(v, arena, h)?;
    }
    if let Some(group_by) = &select.group_by {
        visit_handles(v, arena, &group_by.columns)?;
        if let Some(h) = group_by.having {
            visit_handle(v, arena, h)?;
        }
    }
    if let Some(order_by) = &select.order_by {
        for item in &order_by.items {
            visit_handle(v, arena, item.expr)?;
        }
    }
    match &select.union_select {
        Some(next) => v.visit_select(arena, next),
        None => Ok(()),
    }
}

pub fn walk_table_ref<V: Visitor + ?Sized>(v: &mut V, arena: &Arena, table: &TableRef) -> Result<()> {
    match &table.kind {
        TableRefKind::Base(_) => Ok(()),
        TableRefKind::Select(select) => v.visit_select(arena, select),
        TableRefKind::Join(join) => {
            v.visit_table_ref(arena, &join.left)?;
            v.visit_table_ref(arena, &join.right)?;
            join.condition.map_or(Ok(()), |h| visit_handle(v, arena, h))
        }
        TableRefKind::List(list) => list.iter().try_for_each(|t| v.visit_table_ref(arena, t)),
    }
}

pub fn walk_expression<V: Visitor + ?Sized>(v: &mut V, arena: &Arena, expr: &Expression) -> Result<()> {
    if let ExprKind::Subquery(select) = &expr.kind {
        return v.visit_select(arena, select);
    }
    expr.children()
        .into_iter()
        .try_for_each(|child| v.visit_expression(arena, child))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::{ColumnRef, ComparisonType};
    use crate::types::Value;

    #[derive(Default)]
    struct Columns(Vec<ColumnRef>);

    impl Visitor for Columns {
        fn visit_expression(&mut self, arena: &Arena, expr: &Expression) -> Result<()> {
            if let ExprKind::Column(col) = &expr.kind {
                self.0.push(col.clone());
            }
            walk_expression(self, arena, expr)
        }
    }

    #[test]
    fn test_visitor_reaches_nested_subquery() {
        let mut arena = Arena::new();
        let inner_item = arena.add_expression(Expression::column(None, "b")).unwrap();
        let subquery = Expression::new(ExprKind::Subquery(Box::new(SelectStatement {
            select: vec![inner_item],
            ..Default::default()
        })));
        let cond = arena
            .add_expression(Expression::comparison(
                ComparisonType::Equal,
                Expression::column(None, "a"),
                subquery,
            ))
            .unwrap();
        let stmt = Statement::Select(SelectStatement {
            select: vec![],
            where_clause: Some(cond),
            ..Default::default()
        });

        let mut columns = Columns::default();
        columns.visit_statement(&arena, &stmt).unwrap();
        let names: Vec<_> = columns.0.iter().map(|c| c.column.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_handles_enumerated_in_field_order() {
        let mut arena = Arena::new();
        let a = arena.add_expression(Expression::constant(Value::Integer(1))).unwrap();
        let b = arena.add_expression(Expression::constant(Value::Integer(2))).unwrap();
        let mut stmt = Statement::Select(SelectStatement {
            select: vec![a],
            where_clause: Some(b),
            ..Default::default()
        });
        let mut seen = Vec::new();
        stmt.try_for_each_handle_mut(&mut |h: &mut ExprHandle| {
            seen.push(h.index());
            Ok(())
        })
        .unwrap();
        assert_eq!(seen, vec![0, 1]);
    }
}
