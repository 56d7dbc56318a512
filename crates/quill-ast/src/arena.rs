//! Per-parse node storage
//!
//! An [`Arena`] owns every registered expression and every top-level
//! statement built while transforming one query string. Nodes refer back into
//! it through index handles stamped with the arena's id, so a handle used
//! against the wrong arena, or after [`Arena::take_ownership`], is detected
//! instead of silently resolving to something else.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Error, Result};
use crate::expression::Expression;
use crate::statement::Statement;
use crate::structural::Bound;
use crate::visit::Handles;

static NEXT_ARENA_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArenaId(u64);

impl ArenaId {
    /// Id carried by handles of a freshly deserialized node, before splicing.
    pub const DETACHED: ArenaId = ArenaId(0);

    fn next() -> Self {
        ArenaId(NEXT_ARENA_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ArenaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == ArenaId::DETACHED {
            write!(f, "detached")
        } else {
            write!(f, "#{}", self.0)
        }
    }
}

/// Non-owning reference to an expression held by an arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExprHandle {
    arena: ArenaId,
    index: usize,
}

impl ExprHandle {
    pub(crate) fn detached(index: usize) -> Self {
        Self {
            arena: ArenaId::DETACHED,
            index,
        }
    }

    pub fn arena(&self) -> ArenaId {
        self.arena
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

/// Non-owning reference to a top-level statement held by an arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StmtHandle {
    arena: ArenaId,
    index: usize,
}

impl StmtHandle {
    pub fn arena(&self) -> ArenaId {
        self.arena
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

/// Everything an arena owned, handed over by [`Arena::take_ownership`].
#[derive(Debug)]
pub struct ArenaContents {
    pub statements: Vec<Statement>,
    pub expressions: Vec<Expression>,
}

/// Result of decoding a document: the node plus the arena-scoped expressions
/// it produced. Handles inside `node` (and inside `expressions`) index into
/// `expressions` until [`Arena::splice`] binds them.
#[derive(Debug)]
pub struct Deserialized<T> {
    pub node: T,
    pub expressions: Vec<Expression>,
}

#[derive(Debug)]
pub struct Arena {
    id: ArenaId,
    expressions: Vec<Expression>,
    statements: Vec<Statement>,
    taken: bool,
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

impl Arena {
    pub fn new() -> Self {
        Self {
            id: ArenaId::next(),
            expressions: Vec::new(),
            statements: Vec::new(),
            taken: false,
        }
    }

    pub fn id(&self) -> ArenaId {
        self.id
    }

    /// Whether ownership was transferred out; a taken arena resolves nothing.
    pub fn is_taken(&self) -> bool {
        self.taken
    }

    pub fn expression_count(&self) -> usize {
        self.expressions.len()
    }

    pub fn statement_count(&self) -> usize {
        self.statements.len()
    }

    fn ensure_live(&self, index: usize) -> Result<()> {
        if self.taken {
            return Err(Error::DanglingReference {
                arena: self.id,
                index,
            });
        }
        Ok(())
    }

    fn check(&self, arena: ArenaId, index: usize, len: usize) -> Result<()> {
        if self.taken || arena != self.id || index >= len {
            return Err(Error::DanglingReference { arena, index });
        }
        Ok(())
    }

    pub fn add_expression(&mut self, expr: Expression) -> Result<ExprHandle> {
        self.ensure_live(self.expressions.len())?;
        self.expressions.push(expr);
        Ok(ExprHandle {
            arena: self.id,
            index: self.expressions.len() - 1,
        })
    }

    pub fn add_statement(&mut self, stmt: Statement) -> Result<StmtHandle> {
        self.ensure_live(self.statements.len())?;
        self.statements.push(stmt);
        Ok(StmtHandle {
            arena: self.id,
            index: self.statements.len() - 1,
        })
    }

    pub fn expression(&self, handle: ExprHandle) -> Result<&Expression> {
        self.check(handle.arena, handle.index, self.expressions.len())?;
        Ok(&self.expressions[handle.index])
    }

    pub fn expression_mut(&mut self, handle: ExprHandle) -> Result<&mut Expression> {
        self.check(handle.arena, handle.index, self.expressions.len())?;
        Ok(&mut self.expressions[handle.index])
    }

    pub fn statement(&self, handle: StmtHandle) -> Result<&Statement> {
        self.check(handle.arena, handle.index, self.statements.len())?;
        Ok(&self.statements[handle.index])
    }

    pub fn statement_mut(&mut self, handle: StmtHandle) -> Result<&mut Statement> {
        self.check(handle.arena, handle.index, self.statements.len())?;
        Ok(&mut self.statements[handle.index])
    }

    /// Handles to every statement, in insertion order.
    pub fn statements(&self) -> Result<Vec<StmtHandle>> {
        self.ensure_live(0)?;
        Ok((0..self.statements.len())
            .map(|index| StmtHandle { arena: self.id, index })
            .collect())
    }

    /// Handles to every expression, in insertion order.
    pub fn expressions(&self) -> Result<Vec<ExprHandle>> {
        self.ensure_live(0)?;
        Ok((0..self.expressions.len())
            .map(|index| ExprHandle { arena: self.id, index })
            .collect())
    }

    /// Move every owned node out. The arena stays empty and refuses all
    /// further registration and lookups.
    pub fn take_ownership(&mut self) -> Result<ArenaContents> {
        self.ensure_live(0)?;
        self.taken = true;
        tracing::trace!(
            arena = %self.id,
            statements = self.statements.len(),
            expressions = self.expressions.len(),
            "arena ownership transferred"
        );
        Ok(ArenaContents {
            statements: std::mem::take(&mut self.statements),
            expressions: std::mem::take(&mut self.expressions),
        })
    }

    /// Derive display names for every registered expression.
    pub fn derive_names(&mut self) -> Result<()> {
        self.ensure_live(0)?;
        for expr in &mut self.expressions {
            expr.derive_name();
        }
        Ok(())
    }

    /// Register the expressions of a decoded node and bind its handles here.
    pub fn splice<T: Handles>(&mut self, decoded: Deserialized<T>) -> Result<T> {
        self.ensure_live(self.expressions.len())?;
        let offset = self.expressions.len();
        let count = decoded.expressions.len();
        let id = self.id;
        let mut bind = |handle: &mut ExprHandle| -> Result<()> {
            if handle.arena != ArenaId::DETACHED || handle.index >= count {
                return Err(Error::DanglingReference {
                    arena: handle.arena,
                    index: handle.index,
                });
            }
            handle.arena = id;
            handle.index += offset;
            Ok(())
        };

        let mut node = decoded.node;
        let mut expressions = decoded.expressions;
        for expr in &mut expressions {
            expr.try_for_each_handle_mut(&mut bind)?;
        }
        node.try_for_each_handle_mut(&mut bind)?;
        self.expressions.extend(expressions);
        Ok(node)
    }

    /// Deep-copy `node` out of `from` into this arena. Every expression its
    /// handles reach is copied and registered here, and the handles of the
    /// returned node point into `self`.
    pub fn import<T: Handles + Clone>(&mut self, node: &T, from: &Arena) -> Result<T> {
        let mut copy = node.clone();
        copy.try_for_each_handle_mut(&mut |handle: &mut ExprHandle| {
            let source = from.expression(*handle)?;
            let imported = self.import(source, from)?;
            *handle = self.add_expression(imported)?;
            Ok(())
        })?;
        Ok(copy)
    }

    /// Pair a node with this arena for structural comparison and hashing.
    pub fn bind<'a, T: ?Sized>(&'a self, node: &'a T) -> Result<Bound<'a, T>> {
        self.ensure_live(0)?;
        Ok(Bound { node, arena: self })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement::{SelectStatement, Statement};
    use crate::types::Value;

    #[test]
    fn test_handles_preserve_insertion_order() {
        let mut arena = Arena::new();
        let a = arena.add_expression(Expression::constant(Value::Integer(1))).unwrap();
        let b = arena.add_expression(Expression::constant(Value::Integer(2))).unwrap();
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(arena.expressions().unwrap(), vec![a, b]);
        assert!(matches!(
            arena.expression(b).unwrap().kind,
            crate::expression::ExprKind::Constant(Value::Integer(2))
        ));
    }

    #[test]
    fn test_foreign_handle_is_rejected() {
        let mut first = Arena::new();
        let second = Arena::new();
        let handle = first.add_expression(Expression::constant(Value::Null)).unwrap();
        assert!(matches!(
            second.expression(handle),
            Err(Error::DanglingReference { .. })
        ));
    }

    #[test]
    fn test_take_ownership_empties_arena() {
        let mut arena = Arena::new();
        let expr = arena.add_expression(Expression::column(None, "a")).unwrap();
        let stmt = arena
            .add_statement(Statement::Select(SelectStatement {
                select: vec![expr],
                ..Default::default()
            }))
            .unwrap();

        let contents = arena.take_ownership().unwrap();
        assert_eq!(contents.statements.len(), 1);
        assert_eq!(contents.expressions.len(), 1);

        assert!(arena.is_taken());
        assert_eq!(arena.expression_count(), 0);
        assert!(matches!(arena.expression(expr), Err(Error::DanglingReference { .. })));
        assert!(matches!(arena.statement(stmt), Err(Error::DanglingReference { .. })));
        assert!(arena.statements().is_err());
        assert!(arena.add_expression(Expression::constant(Value::Null)).is_err());
        assert!(arena.take_ownership().is_err());
    }
}
