//! Expression nodes
//!
//! An [`Expression`] owns its operands. The only place an expression reaches
//! back into the arena is through a subquery, whose [`SelectStatement`] holds
//! handles for its own slots.

use serde::{Deserialize, Serialize};

use crate::statement::SelectStatement;
use crate::types::{DataType, Value};

/// Flat kind tag of an expression, used as the document discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExpressionType {
    OperatorPlus,
    OperatorMinus,
    OperatorMultiply,
    OperatorDivide,
    OperatorMod,
    OperatorConcat,
    OperatorUnaryMinus,
    OperatorIsNull,
    OperatorIsNotNull,
    OperatorExists,
    OperatorNot,
    OperatorCast,
    OperatorCaseExpr,
    CompareEqual,
    CompareNotEqual,
    CompareLessThan,
    CompareLessThanOrEqualTo,
    CompareGreaterThan,
    CompareGreaterThanOrEqualTo,
    CompareLike,
    CompareNotLike,
    CompareIsDistinctFrom,
    CompareIn,
    CompareNotIn,
    ConjunctionAnd,
    ConjunctionOr,
    AggregateCount,
    AggregateSum,
    AggregateMin,
    AggregateMax,
    AggregateAvg,
    Function,
    ColumnValue,
    ValueConstant,
    ValueParameter,
    Star,
    RowSubquery,
}

/// Operators over an ordered operand list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorType {
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,
    Concat,
    UnaryMinus,
    IsNull,
    IsNotNull,
    Exists,
    /// First operand is the needle, the rest the candidates (or one subquery)
    In,
    NotIn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonType {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqualTo,
    GreaterThan,
    GreaterThanOrEqualTo,
    Like,
    NotLike,
    IsDistinctFrom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoolOp {
    And,
    Or,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateType {
    Count,
    Sum,
    Min,
    Max,
    Avg,
}

const OPERATORS: &[(OperatorType, ExpressionType, &str)] = &[
    (OperatorType::Plus, ExpressionType::OperatorPlus, "+"),
    (OperatorType::Minus, ExpressionType::OperatorMinus, "-"),
    (OperatorType::Multiply, ExpressionType::OperatorMultiply, "*"),
    (OperatorType::Divide, ExpressionType::OperatorDivide, "/"),
    (OperatorType::Modulo, ExpressionType::OperatorMod, "%"),
    (OperatorType::Concat, ExpressionType::OperatorConcat, "||"),
    (OperatorType::UnaryMinus, ExpressionType::OperatorUnaryMinus, "-"),
    (OperatorType::IsNull, ExpressionType::OperatorIsNull, "IS NULL"),
    (OperatorType::IsNotNull, ExpressionType::OperatorIsNotNull, "IS NOT NULL"),
    (OperatorType::Exists, ExpressionType::OperatorExists, "EXISTS"),
    (OperatorType::In, ExpressionType::CompareIn, "IN"),
    (OperatorType::NotIn, ExpressionType::CompareNotIn, "NOT IN"),
];

const COMPARISONS: &[(ComparisonType, ExpressionType, &str)] = &[
    (ComparisonType::Equal, ExpressionType::CompareEqual, "="),
    (ComparisonType::NotEqual, ExpressionType::CompareNotEqual, "<>"),
    (ComparisonType::LessThan, ExpressionType::CompareLessThan, "<"),
    (ComparisonType::LessThanOrEqualTo, ExpressionType::CompareLessThanOrEqualTo, "<="),
    (ComparisonType::GreaterThan, ExpressionType::CompareGreaterThan, ">"),
    (ComparisonType::GreaterThanOrEqualTo, ExpressionType::CompareGreaterThanOrEqualTo, ">="),
    (ComparisonType::Like, ExpressionType::CompareLike, "LIKE"),
    (ComparisonType::NotLike, ExpressionType::CompareNotLike, "NOT LIKE"),
    (ComparisonType::IsDistinctFrom, ExpressionType::CompareIsDistinctFrom, "IS DISTINCT FROM"),
];

const BOOL_OPS: &[(BoolOp, ExpressionType, &str)] = &[
    (BoolOp::And, ExpressionType::ConjunctionAnd, "AND"),
    (BoolOp::Or, ExpressionType::ConjunctionOr, "OR"),
    (BoolOp::Not, ExpressionType::OperatorNot, "NOT"),
];

const AGGREGATES: &[(AggregateType, ExpressionType, &str)] = &[
    (AggregateType::Count, ExpressionType::AggregateCount, "count"),
    (AggregateType::Sum, ExpressionType::AggregateSum, "sum"),
    (AggregateType::Min, ExpressionType::AggregateMin, "min"),
    (AggregateType::Max, ExpressionType::AggregateMax, "max"),
    (AggregateType::Avg, ExpressionType::AggregateAvg, "avg"),
];

fn forward<K: Copy + PartialEq>(table: &[(K, ExpressionType, &'static str)], key: K) -> (ExpressionType, &'static str) {
    table
        .iter()
        .find(|(k, _, _)| *k == key)
        .map(|(_, t, s)| (*t, *s))
        .unwrap_or_else(|| unreachable!("every operator kind has a table entry"))
}

fn backward<K: Copy>(table: &[(K, ExpressionType, &'static str)], ty: ExpressionType) -> Option<K> {
    table.iter().find(|(_, t, _)| *t == ty).map(|(k, _, _)| *k)
}

impl OperatorType {
    pub fn expression_type(self) -> ExpressionType {
        forward(OPERATORS, self).0
    }

    pub fn from_expression_type(ty: ExpressionType) -> Option<Self> {
        backward(OPERATORS, ty)
    }

    pub fn symbol(self) -> &'static str {
        forward(OPERATORS, self).1
    }
}

impl ComparisonType {
    pub fn expression_type(self) -> ExpressionType {
        forward(COMPARISONS, self).0
    }

    pub fn from_expression_type(ty: ExpressionType) -> Option<Self> {
        backward(COMPARISONS, ty)
    }

    pub fn symbol(self) -> &'static str {
        forward(COMPARISONS, self).1
    }
}

impl BoolOp {
    pub fn expression_type(self) -> ExpressionType {
        forward(BOOL_OPS, self).0
    }

    pub fn from_expression_type(ty: ExpressionType) -> Option<Self> {
        backward(BOOL_OPS, ty)
    }

    pub fn symbol(self) -> &'static str {
        forward(BOOL_OPS, self).1
    }
}

impl AggregateType {
    pub fn expression_type(self) -> ExpressionType {
        forward(AGGREGATES, self).0
    }

    pub fn from_expression_type(ty: ExpressionType) -> Option<Self> {
        backward(AGGREGATES, ty)
    }

    /// Matches a function name against the aggregate set, ignoring case.
    pub fn from_name(name: &str) -> Option<Self> {
        AGGREGATES
            .iter()
            .find(|(_, _, s)| s.eq_ignore_ascii_case(name))
            .map(|(k, _, _)| *k)
    }

    pub fn name(self) -> &'static str {
        forward(AGGREGATES, self).1
    }
}

/// Unresolved column reference; the binder resolves it later.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnRef {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    pub column: String,
}

#[derive(Debug, Clone)]
pub struct WhenClause {
    pub condition: Expression,
    pub result: Expression,
}

/// The form of an expression together with its own fields and operands.
#[derive(Debug, Clone)]
pub enum ExprKind {
    Constant(Value),
    Column(ColumnRef),
    Star,
    /// Zero-based placeholder index (`$1` is index 0)
    Parameter(u32),
    Operator {
        op: OperatorType,
        operands: Vec<Expression>,
    },
    Comparison {
        op: ComparisonType,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Boolean {
        op: BoolOp,
        operands: Vec<Expression>,
    },
    Function {
        name: String,
        args: Vec<Expression>,
    },
    Aggregate {
        func: AggregateType,
        distinct: bool,
        args: Vec<Expression>,
    },
    Case {
        clauses: Vec<WhenClause>,
        default: Option<Box<Expression>>,
    },
    /// Target type is the expression's return type
    Cast(Box<Expression>),
    Subquery(Box<SelectStatement>),
}

#[derive(Debug, Clone)]
pub struct Expression {
    pub kind: ExprKind,
    pub return_type: DataType,
    pub alias: Option<String>,
    pub(crate) name: String,
}

impl Expression {
    /// Build an expression, typing it from its form where that needs no
    /// catalog lookup.
    pub fn new(kind: ExprKind) -> Self {
        let return_type = match &kind {
            ExprKind::Constant(value) => value.data_type(),
            ExprKind::Comparison { .. } | ExprKind::Boolean { .. } => DataType::Boolean,
            ExprKind::Operator { op, .. } => match op {
                OperatorType::IsNull
                | OperatorType::IsNotNull
                | OperatorType::Exists
                | OperatorType::In
                | OperatorType::NotIn => DataType::Boolean,
                _ => DataType::Invalid,
            },
            _ => DataType::Invalid,
        };
        Self {
            kind,
            return_type,
            alias: None,
            name: String::new(),
        }
    }

    pub fn constant(value: Value) -> Self {
        Self::new(ExprKind::Constant(value))
    }

    pub fn column(table: Option<&str>, column: &str) -> Self {
        Self::new(ExprKind::Column(ColumnRef {
            table: table.map(str::to_string),
            column: column.to_string(),
        }))
    }

    pub fn comparison(op: ComparisonType, left: Expression, right: Expression) -> Self {
        Self::new(ExprKind::Comparison {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn cast(operand: Expression, target: DataType) -> Self {
        let mut expr = Self::new(ExprKind::Cast(Box::new(operand)));
        expr.return_type = target;
        expr
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn expression_type(&self) -> ExpressionType {
        match &self.kind {
            ExprKind::Constant(_) => ExpressionType::ValueConstant,
            ExprKind::Column(_) => ExpressionType::ColumnValue,
            ExprKind::Star => ExpressionType::Star,
            ExprKind::Parameter(_) => ExpressionType::ValueParameter,
            ExprKind::Operator { op, .. } => op.expression_type(),
            ExprKind::Comparison { op, .. } => op.expression_type(),
            ExprKind::Boolean { op, .. } => op.expression_type(),
            ExprKind::Function { .. } => ExpressionType::Function,
            ExprKind::Aggregate { func, .. } => func.expression_type(),
            ExprKind::Case { .. } => ExpressionType::OperatorCaseExpr,
            ExprKind::Cast(_) => ExpressionType::OperatorCast,
            ExprKind::Subquery(_) => ExpressionType::RowSubquery,
        }
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self.kind, ExprKind::Aggregate { .. })
    }

    /// Owned operands in child order. Case clauses contribute condition then
    /// result, followed by the default.
    pub fn children(&self) -> Vec<&Expression> {
        match &self.kind {
            ExprKind::Constant(_)
            | ExprKind::Column(_)
            | ExprKind::Star
            | ExprKind::Parameter(_)
            | ExprKind::Subquery(_) => Vec::new(),
            ExprKind::Operator { operands, .. } | ExprKind::Boolean { operands, .. } => {
                operands.iter().collect()
            }
            ExprKind::Function { args, .. } | ExprKind::Aggregate { args, .. } => args.iter().collect(),
            ExprKind::Comparison { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            ExprKind::Case { clauses, default } => clauses
                .iter()
                .flat_map(|c| [&c.condition, &c.result])
                .chain(default.as_deref())
                .collect(),
            ExprKind::Cast(operand) => vec![operand.as_ref()],
        }
    }

    pub fn children_mut(&mut self) -> Vec<&mut Expression> {
        match &mut self.kind {
            ExprKind::Constant(_)
            | ExprKind::Column(_)
            | ExprKind::Star
            | ExprKind::Parameter(_)
            | ExprKind::Subquery(_) => Vec::new(),
            ExprKind::Operator { operands, .. } | ExprKind::Boolean { operands, .. } => {
                operands.iter_mut().collect()
            }
            ExprKind::Function { args, .. } | ExprKind::Aggregate { args, .. } => {
                args.iter_mut().collect()
            }
            ExprKind::Comparison { left, right, .. } => vec![left.as_mut(), right.as_mut()],
            ExprKind::Case { clauses, default } => {
                let mut out: Vec<&mut Expression> = Vec::with_capacity(clauses.len() * 2 + 1);
                for clause in clauses.iter_mut() {
                    out.push(&mut clause.condition);
                    out.push(&mut clause.result);
                }
                if let Some(default) = default {
                    out.push(default.as_mut());
                }
                out
            }
            ExprKind::Cast(operand) => vec![operand.as_mut()],
        }
    }

    /// Cached display name; empty until [`Expression::derive_name`] runs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Compute the display name of this expression and every descendant,
    /// caching each one. An alias always wins over the derived text.
    pub fn derive_name(&mut self) {
        for child in self.children_mut() {
            child.derive_name();
        }
        if let Some(alias) = &self.alias {
            self.name = alias.clone();
            return;
        }

        let names: Vec<&str> = self.children().into_iter().map(|c| c.name.as_str()).collect();
        let name = match &self.kind {
            ExprKind::Constant(value) => value.to_string(),
            ExprKind::Column(col) => match &col.table {
                Some(table) => format!("{}.{}", table, col.column),
                None => col.column.clone(),
            },
            ExprKind::Star => "*".to_string(),
            ExprKind::Parameter(index) => format!("${}", index + 1),
            ExprKind::Operator { op, .. } => match op {
                OperatorType::UnaryMinus => format!("-{}", names.join("")),
                OperatorType::IsNull | OperatorType::IsNotNull => {
                    format!("{} {}", names.join(""), op.symbol())
                }
                OperatorType::Exists => format!("EXISTS({})", names.join("")),
                OperatorType::In | OperatorType::NotIn => match names.split_first() {
                    Some((needle, rest)) => format!("{} {} ({})", needle, op.symbol(), rest.join(",")),
                    None => op.symbol().to_string(),
                },
                _ => names.join(format!(" {} ", op.symbol()).as_str()),
            },
            ExprKind::Comparison { op, .. } => names.join(format!(" {} ", op.symbol()).as_str()),
            ExprKind::Boolean { op: BoolOp::Not, .. } => format!("NOT {}", names.join("")),
            ExprKind::Boolean { op, .. } => names.join(format!(" {} ", op.symbol()).as_str()),
            ExprKind::Function { name, .. } => format!("{}({})", name, names.join(",")),
            ExprKind::Aggregate { func, distinct, .. } => {
                let prefix = if *distinct { "DISTINCT " } else { "" };
                format!("{}({}{})", func.name(), prefix, names.join(","))
            }
            ExprKind::Case { .. } => "CASE".to_string(),
            ExprKind::Cast(_) => format!("CAST({} AS {:?})", names.join(""), self.return_type),
            ExprKind::Subquery(_) => "SUBQUERY".to_string(),
        };
        self.name = name;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: Vec<Expression>) -> Expression {
        Expression::new(ExprKind::Function {
            name: name.to_string(),
            args,
        })
    }

    #[test]
    fn test_aggregate_names_case_insensitive() {
        assert_eq!(AggregateType::from_name("COUNT"), Some(AggregateType::Count));
        assert_eq!(AggregateType::from_name("Avg"), Some(AggregateType::Avg));
        assert_eq!(AggregateType::from_name("median"), None);
    }

    #[test]
    fn test_tag_tables_round_trip() {
        for (op, ty, _) in OPERATORS {
            assert_eq!(OperatorType::from_expression_type(*ty), Some(*op));
        }
        for (op, ty, _) in COMPARISONS {
            assert_eq!(ComparisonType::from_expression_type(*ty), Some(*op));
        }
        assert_eq!(BoolOp::from_expression_type(ExpressionType::Function), None);
    }

    #[test]
    fn test_derive_name_recurses() {
        let mut expr = call(
            "f",
            vec![Expression::column(None, "a"), Expression::column(Some("t"), "b")],
        );
        assert_eq!(expr.name(), "");
        expr.derive_name();
        assert_eq!(expr.name(), "f(a,t.b)");
        assert_eq!(expr.children()[1].name(), "t.b");
    }

    #[test]
    fn test_alias_wins() {
        let mut expr = Expression::comparison(
            ComparisonType::GreaterThan,
            Expression::column(None, "a"),
            Expression::constant(Value::Integer(1)),
        )
        .with_alias("big");
        expr.derive_name();
        assert_eq!(expr.name(), "big");
        assert_eq!(expr.children()[0].name(), "a");
        assert_eq!(expr.return_type, DataType::Boolean);
    }
}
