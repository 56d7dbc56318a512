//! Parse tree to AST
//!
//! A [`Transformer`] walks the pest pairs of one query string top-down. It
//! builds owned expression trees, registers the root expression of every
//! statement slot in the arena, and registers each top-level statement once
//! it is complete. Keyword tokens are pairs too; flags such as `DISTINCT` or
//! `IF EXISTS` are read from their presence.

use pest::iterators::Pair;
use quill_ast::expression::*;
use quill_ast::statement::*;
use quill_ast::{Arena, DataType, ExprHandle, StmtHandle, Value};

use crate::error::{Error, Result};
use crate::grammar::Rule;

type Node<'i> = Pair<'i, Rule>;

pub(crate) struct Transformer<'a> {
    arena: &'a mut Arena,
    depth: usize,
    max_depth: usize,
}

impl<'a> Transformer<'a> {
    pub(crate) fn new(arena: &'a mut Arena, max_depth: usize) -> Self {
        Self {
            arena,
            depth: 0,
            max_depth,
        }
    }

    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth >= self.max_depth {
            return Err(Error::DepthLimitExceeded(self.max_depth));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn register(&mut self, expr: Expression) -> Result<ExprHandle> {
        Ok(self.arena.add_expression(expr)?)
    }

    fn slot(&mut self, pair: Node<'_>) -> Result<ExprHandle> {
        let expr = self.expr(pair)?;
        self.register(expr)
    }

    fn slots(&mut self, list: Node<'_>) -> Result<Vec<ExprHandle>> {
        children(&list, Rule::expr).map(|e| self.slot(e)).collect()
    }

    fn exprs(&mut self, list: Node<'_>) -> Result<Vec<Expression>> {
        children(&list, Rule::expr).map(|e| self.expr(e)).collect()
    }

    fn where_clause(&mut self, parent: &Node<'_>) -> Result<Option<ExprHandle>> {
        match child(parent, Rule::where_clause) {
            Some(clause) => Ok(Some(self.slot(required(&clause, Rule::expr)?)?)),
            None => Ok(None),
        }
    }

    /// Transform every statement under the `statements` root, registering
    /// each one in order.
    pub(crate) fn statements(&mut self, root: Node<'_>) -> Result<Vec<StmtHandle>> {
        let mut handles = Vec::new();
        for pair in children(&root, Rule::statement) {
            let stmt = self.statement(pair)?;
            tracing::trace!(kind = ?stmt.statement_type(), "transformed statement");
            handles.push(self.arena.add_statement(stmt)?);
        }
        Ok(handles)
    }

    fn statement(&mut self, pair: Node<'_>) -> Result<Statement> {
        let body = first(&pair)?;
        self.nested(|t| t.statement_body(body))
    }

    fn statement_body(&mut self, body: Node<'_>) -> Result<Statement> {
        match body.as_rule() {
            Rule::select_stmt => Ok(Statement::Select(self.select_stmt(body)?)),
            Rule::insert_stmt => self.insert(body),
            Rule::update_stmt => self.update(body),
            Rule::delete_stmt => self.delete(body),
            Rule::truncate_stmt => {
                let table = table_info(&required(&body, Rule::table_name)?)?;
                Ok(Statement::Delete(DeleteStatement {
                    table: TableRef::base(table, None),
                    where_clause: None,
                }))
            }
            Rule::create_table_stmt => self.create_table(body),
            Rule::create_database_stmt => Ok(Statement::CreateDatabase(CreateDatabaseStatement {
                name: identifier(&required(&body, Rule::ident)?)?,
            })),
            Rule::create_schema_stmt => Ok(Statement::CreateSchema(CreateSchemaStatement {
                name: identifier(&required(&body, Rule::ident)?)?,
                if_not_exists: has(&body, Rule::if_not_exists),
            })),
            Rule::create_index_stmt => self.create_index(body),
            Rule::create_function_stmt => create_function(&body),
            Rule::create_trigger_stmt => self.create_trigger(body),
            Rule::create_view_stmt => Ok(Statement::CreateView(CreateViewStatement {
                name: identifier(&required(&body, Rule::ident)?)?,
                select: Box::new(self.select_stmt(required(&body, Rule::select_stmt)?)?),
            })),
            Rule::drop_stmt => drop_stmt(&body),
            Rule::deallocate_stmt => Ok(Statement::Drop(DropStatement {
                drop_type: DropType::PreparedStatement,
                name: identifier(&required(&body, Rule::ident)?)?,
                table: None,
                if_exists: false,
                cascade: false,
            })),
            Rule::copy_stmt => self.copy(body),
            Rule::explain_stmt => Ok(Statement::Explain(ExplainStatement {
                statement: Box::new(self.statement(required(&body, Rule::statement)?)?),
            })),
            Rule::prepare_stmt => {
                let parameter_types = children(&body, Rule::type_name)
                    .map(|ty| type_spec(&ty).map(|(data_type, _)| data_type))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Statement::Prepare(PrepareStatement {
                    name: identifier(&required(&body, Rule::ident)?)?,
                    parameter_types,
                    query: Box::new(self.statement(required(&body, Rule::statement)?)?),
                }))
            }
            Rule::execute_stmt => {
                let parameters = match child(&body, Rule::expr_list) {
                    Some(list) => self.slots(list)?,
                    None => Vec::new(),
                };
                Ok(Statement::Execute(ExecuteStatement {
                    name: identifier(&required(&body, Rule::ident)?)?,
                    parameters,
                }))
            }
            Rule::transaction_stmt => transaction(&body),
            Rule::variable_set_stmt => {
                let values = match child(&body, Rule::expr_list) {
                    Some(list) => self.slots(list)?,
                    None => Vec::new(),
                };
                Ok(Statement::VariableSet(VariableSetStatement {
                    name: identifier(&required(&body, Rule::ident)?)?,
                    values,
                    is_set_default: has(&body, Rule::kw_default),
                }))
            }
            Rule::analyze_stmt => Ok(Statement::Analyze(AnalyzeStatement {
                table: child(&body, Rule::table_name)
                    .map(|name| table_info(&name).map(|info| TableRef::base(info, None)))
                    .transpose()?,
                columns: optional_columns(&body)?,
            })),
            Rule::unsupported_stmt => {
                let keyword = first(&body)?.as_str().to_ascii_uppercase();
                tracing::debug!(%keyword, "statement has no transform");
                Err(Error::unsupported(format!("{} statement", keyword)))
            }
            other => Err(Error::unsupported(format!("{:?}", other))),
        }
    }

    // -----------------------------------------------------------------------
    // SELECT
    // -----------------------------------------------------------------------

    fn select_stmt(&mut self, pair: Node<'_>) -> Result<SelectStatement> {
        self.nested(|t| {
            let mut head = None;
            let mut arms = Vec::new();
            let mut order_by = None;
            let mut limit = None;
            for part in pair.into_inner() {
                match part.as_rule() {
                    Rule::select_core => head = Some(t.select_core(part)?),
                    Rule::union_clause => {
                        let all = has(&part, Rule::kw_all);
                        arms.push((all, t.select_core(required(&part, Rule::select_core)?)?));
                    }
                    Rule::order_clause => order_by = Some(t.order_clause(part)?),
                    Rule::limit_clause => limit = Some(limit_clause(&part)?),
                    _ => {}
                }
            }

            let mut select = head.ok_or_else(|| Error::malformed("select_stmt", "select_core"))?;
            // A UNION B UNION ALL C links A -> B -> C; each link records
            // whether the arm it points at was joined with ALL
            let mut next: Option<(bool, Box<SelectStatement>)> = None;
            for (all, mut arm) in arms.into_iter().rev() {
                if let Some((next_all, next_arm)) = next.take() {
                    arm.union_select = Some(next_arm);
                    arm.union_all = next_all;
                }
                next = Some((all, Box::new(arm)));
            }
            if let Some((all, arm)) = next {
                select.union_select = Some(arm);
                select.union_all = all;
            }
            select.order_by = order_by;
            select.limit = limit;
            Ok(select)
        })
    }

    fn select_core(&mut self, pair: Node<'_>) -> Result<SelectStatement> {
        let mut select = SelectStatement::default();
        for part in pair.into_inner() {
            match part.as_rule() {
                Rule::kw_distinct => select.distinct = true,
                Rule::select_list => {
                    for item in children(&part, Rule::select_item) {
                        select.select.push(self.select_item(item)?);
                    }
                }
                Rule::from_clause => select.from = Some(self.from_clause(part)?),
                Rule::where_clause => select.where_clause = Some(self.slot(required(&part, Rule::expr)?)?),
                Rule::group_clause => {
                    let columns = self.slots(required(&part, Rule::expr_list)?)?;
                    let having = match child(&part, Rule::having_clause) {
                        Some(having) => Some(self.slot(required(&having, Rule::expr)?)?),
                        None => None,
                    };
                    select.group_by = Some(GroupByDescription { columns, having });
                }
                _ => {}
            }
        }
        Ok(select)
    }

    fn select_item(&mut self, pair: Node<'_>) -> Result<ExprHandle> {
        let mut expr = match child(&pair, Rule::expr) {
            Some(expr) => self.expr(expr)?,
            None => Expression::new(ExprKind::Star),
        };
        if let Some(alias) = child(&pair, Rule::alias_clause) {
            expr.alias = Some(alias_of(&alias)?);
        }
        self.register(expr)
    }

    fn order_clause(&mut self, pair: Node<'_>) -> Result<OrderByDescription> {
        let mut items = Vec::new();
        for item in children(&pair, Rule::order_item) {
            let expr = self.slot(required(&item, Rule::expr)?)?;
            let order = if has(&item, Rule::kw_desc) {
                OrderType::Desc
            } else {
                OrderType::Asc
            };
            items.push(OrderByItem { expr, order });
        }
        Ok(OrderByDescription { items })
    }

    fn from_clause(&mut self, pair: Node<'_>) -> Result<TableRef> {
        let mut items = children(&pair, Rule::from_item)
            .map(|item| self.from_item(item))
            .collect::<Result<Vec<_>>>()?;
        if items.len() > 1 {
            return Ok(TableRef {
                kind: TableRefKind::List(items),
                alias: None,
            });
        }
        items.pop().ok_or_else(|| Error::malformed("from_clause", "from_item"))
    }

    fn from_item(&mut self, pair: Node<'_>) -> Result<TableRef> {
        let mut left = self.table_primary(required(&pair, Rule::table_primary)?)?;
        for join in children(&pair, Rule::join_clause) {
            let join_type = match child(&join, Rule::join_kind) {
                Some(kind) => join_kind(&kind)?,
                None => JoinType::Inner,
            };
            let right = self.table_primary(required(&join, Rule::table_primary)?)?;
            let condition = match child(&join, Rule::join_condition) {
                Some(on) => Some(self.slot(required(&on, Rule::expr)?)?),
                None => None,
            };
            left = TableRef {
                kind: TableRefKind::Join(Box::new(JoinDefinition {
                    join_type,
                    left,
                    right,
                    condition,
                })),
                alias: None,
            };
        }
        Ok(left)
    }

    fn table_primary(&mut self, pair: Node<'_>) -> Result<TableRef> {
        self.nested(|t| {
            let kind = match child(&pair, Rule::subquery_table) {
                Some(sub) => TableRefKind::Select(Box::new(t.select_stmt(required(&sub, Rule::select_stmt)?)?)),
                None => TableRefKind::Base(table_info(&required(&pair, Rule::table_name)?)?),
            };
            let alias = child(&pair, Rule::alias_clause)
                .map(|alias| alias_of(&alias))
                .transpose()?;
            Ok(TableRef { kind, alias })
        })
    }

    // -----------------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------------

    /// Transform an `expr` pair. Depth is counted here, once per nested
    /// expression, not once per precedence layer.
    fn expr(&mut self, pair: Node<'_>) -> Result<Expression> {
        let top = first(&pair)?;
        self.nested(|t| t.node(top))
    }

    fn node(&mut self, pair: Node<'_>) -> Result<Expression> {
        match pair.as_rule() {
            Rule::expr => self.expr(pair),
            Rule::or_expr => self.connective(pair, BoolOp::Or, Rule::and_expr),
            Rule::and_expr => self.connective(pair, BoolOp::And, Rule::not_expr),
            Rule::not_expr => {
                let mut inner = pair.into_inner();
                let head = inner.next().ok_or_else(|| Error::malformed("not_expr", "operand"))?;
                if head.as_rule() != Rule::kw_not {
                    return self.node(head);
                }
                let operand = inner.next().ok_or_else(|| Error::malformed("not_expr", "operand"))?;
                // NOT NOT ... recurses once per keyword, so each one counts
                Ok(negation(self.nested(|t| t.node(operand))?))
            }
            Rule::predicate => {
                let left = self.node(required(&pair, Rule::concat_expr)?)?;
                match child(&pair, Rule::predicate_tail) {
                    Some(tail) => self.predicate_tail(left, first(&tail)?),
                    None => Ok(left),
                }
            }
            Rule::concat_expr => {
                let mut operands = children(&pair, Rule::add_expr);
                let head = operands.next().ok_or_else(|| Error::malformed("concat_expr", "operand"))?;
                let mut left = self.node(head)?;
                for next in operands {
                    left = binary(OperatorType::Concat, left, self.node(next)?);
                }
                Ok(left)
            }
            Rule::add_expr | Rule::mul_expr => self.arithmetic(pair),
            Rule::unary_expr => {
                let mut signs: Vec<&str> = children(&pair, Rule::sign_op).map(|s| s.as_str()).collect();
                let operand = required(&pair, Rule::postfix_expr)?;
                // i64::MIN only fits once the minus is attached to the digits
                let min_integer = match signs.last() {
                    Some(&"-") => integer_text(&operand).and_then(|digits| format!("-{digits}").parse::<i64>().ok()),
                    _ => None,
                };
                let mut expr = match min_integer {
                    Some(value) => {
                        signs.pop();
                        Expression::constant(Value::Integer(value))
                    }
                    None => self.node(operand)?,
                };
                for sign in signs.iter().rev() {
                    if *sign == "-" {
                        expr = negate(expr);
                    }
                }
                Ok(expr)
            }
            Rule::postfix_expr => {
                let mut expr = self.node(required(&pair, Rule::primary)?)?;
                for target in children(&pair, Rule::type_name) {
                    let (data_type, _) = type_spec(&target)?;
                    expr = Expression::cast(expr, data_type);
                }
                Ok(expr)
            }
            Rule::primary => self.node(first(&pair)?),
            Rule::parameter => parameter(&pair),
            Rule::literal => literal(&pair),
            Rule::column_ref => column(&pair),
            Rule::cast_expr => {
                let operand = self.expr(required(&pair, Rule::expr)?)?;
                let (data_type, _) = type_spec(&required(&pair, Rule::type_name)?)?;
                Ok(Expression::cast(operand, data_type))
            }
            Rule::case_expr => self.case(pair),
            Rule::exists_expr => {
                let select = self.select_stmt(required(&pair, Rule::select_stmt)?)?;
                Ok(Expression::new(ExprKind::Operator {
                    op: OperatorType::Exists,
                    operands: vec![subquery(select)],
                }))
            }
            Rule::subquery_expr => Ok(subquery(self.select_stmt(required(&pair, Rule::select_stmt)?)?)),
            Rule::paren_expr => self.expr(required(&pair, Rule::expr)?),
            Rule::func_call => self.function(pair),
            Rule::array_expr => Err(Error::unsupported("ARRAY constructor")),
            other => Err(Error::unsupported(format!("{:?}", other))),
        }
    }

    /// AND/OR over `operand_rule` children; nested connectives of the same
    /// kind are flattened into one node.
    fn connective(&mut self, pair: Node<'_>, op: BoolOp, operand_rule: Rule) -> Result<Expression> {
        let mut operands = Vec::new();
        for part in children(&pair, operand_rule) {
            let operand = self.node(part)?;
            let same = operand.alias.is_none()
                && matches!(&operand.kind, ExprKind::Boolean { op: inner, .. } if *inner == op);
            if !same {
                operands.push(operand);
            } else if let ExprKind::Boolean { operands: nested, .. } = operand.kind {
                operands.extend(nested);
            }
        }
        if operands.len() == 1 {
            return operands.pop().ok_or_else(|| Error::malformed(kind(&pair), "operand"));
        }
        if operands.is_empty() {
            return Err(Error::malformed(kind(&pair), "operand"));
        }
        Ok(Expression::new(ExprKind::Boolean { op, operands }))
    }

    fn arithmetic(&mut self, pair: Node<'_>) -> Result<Expression> {
        let rule = kind(&pair);
        let mut inner = pair.into_inner();
        let head = inner.next().ok_or_else(|| Error::malformed(&rule, "operand"))?;
        let mut left = self.node(head)?;
        while let Some(symbol) = inner.next() {
            let op = match symbol.as_str() {
                "+" => OperatorType::Plus,
                "-" => OperatorType::Minus,
                "*" => OperatorType::Multiply,
                "/" => OperatorType::Divide,
                "%" => OperatorType::Modulo,
                _ => return Err(Error::malformed(&rule, "operator")),
            };
            let right = inner.next().ok_or_else(|| Error::malformed(&rule, "operand"))?;
            left = binary(op, left, self.node(right)?);
        }
        Ok(left)
    }

    fn predicate_tail(&mut self, left: Expression, tail: Node<'_>) -> Result<Expression> {
        let negated = has(&tail, Rule::kw_not);
        match tail.as_rule() {
            Rule::comparison_tail => {
                let op = comparison_op(required(&tail, Rule::comp_op)?.as_str())?;
                let right = self.node(required(&tail, Rule::concat_expr)?)?;
                Ok(Expression::comparison(op, left, right))
            }
            Rule::is_tail => match child(&tail, Rule::is_distinct) {
                Some(distinct) => {
                    let right = self.node(required(&distinct, Rule::concat_expr)?)?;
                    let test = Expression::comparison(ComparisonType::IsDistinctFrom, left, right);
                    Ok(if negated { negation(test) } else { test })
                }
                None => {
                    let op = if negated {
                        OperatorType::IsNotNull
                    } else {
                        OperatorType::IsNull
                    };
                    Ok(Expression::new(ExprKind::Operator {
                        op,
                        operands: vec![left],
                    }))
                }
            },
            Rule::in_tail => {
                let mut operands = vec![left];
                match child(&tail, Rule::select_stmt) {
                    Some(select) => operands.push(subquery(self.select_stmt(select)?)),
                    None => operands.extend(self.exprs(required(&tail, Rule::expr_list)?)?),
                }
                let op = if negated { OperatorType::NotIn } else { OperatorType::In };
                Ok(Expression::new(ExprKind::Operator { op, operands }))
            }
            Rule::like_tail => {
                let op = if negated {
                    ComparisonType::NotLike
                } else {
                    ComparisonType::Like
                };
                let pattern = self.node(required(&tail, Rule::concat_expr)?)?;
                Ok(Expression::comparison(op, left, pattern))
            }
            Rule::between_tail => {
                let mut bounds = children(&tail, Rule::concat_expr);
                let (Some(low), Some(high)) = (bounds.next(), bounds.next()) else {
                    return Err(Error::malformed("between_tail", "bound"));
                };
                let low = self.node(low)?;
                let high = self.node(high)?;
                let range = Expression::new(ExprKind::Boolean {
                    op: BoolOp::And,
                    operands: vec![
                        Expression::comparison(ComparisonType::GreaterThanOrEqualTo, left.clone(), low),
                        Expression::comparison(ComparisonType::LessThanOrEqualTo, left, high),
                    ],
                });
                Ok(if negated { negation(range) } else { range })
            }
            other => Err(Error::unsupported(format!("{:?}", other))),
        }
    }

    fn function(&mut self, pair: Node<'_>) -> Result<Expression> {
        let name = identifier(&required(&pair, Rule::ident)?)?;
        let mut args = Vec::new();
        let mut distinct = false;
        if let Some(list) = child(&pair, Rule::func_args) {
            for part in list.into_inner() {
                match part.as_rule() {
                    Rule::star => args.push(Expression::new(ExprKind::Star)),
                    Rule::kw_distinct => distinct = true,
                    Rule::expr_list => args.extend(self.exprs(part)?),
                    _ => {}
                }
            }
        }

        match AggregateType::from_name(&name) {
            Some(func) => Ok(Expression::new(ExprKind::Aggregate {
                func,
                distinct,
                args,
            })),
            None if distinct => Err(Error::unsupported(format!("DISTINCT in call to {}", name))),
            None => Ok(Expression::new(ExprKind::Function { name, args })),
        }
    }

    fn case(&mut self, pair: Node<'_>) -> Result<Expression> {
        // CASE x WHEN v ... compares x = v in each branch
        let operand = match child(&pair, Rule::case_operand) {
            Some(operand) => Some(self.expr(required(&operand, Rule::expr)?)?),
            None => None,
        };

        let mut clauses = Vec::new();
        for when in children(&pair, Rule::when_clause) {
            let mut parts = children(&when, Rule::expr);
            let (Some(condition), Some(result)) = (parts.next(), parts.next()) else {
                return Err(Error::malformed("when_clause", "expr"));
            };
            let mut condition = self.expr(condition)?;
            if let Some(operand) = &operand {
                condition = Expression::comparison(ComparisonType::Equal, operand.clone(), condition);
            }
            clauses.push(WhenClause {
                condition,
                result: self.expr(result)?,
            });
        }

        let default = match child(&pair, Rule::else_clause) {
            Some(default) => Some(Box::new(self.expr(required(&default, Rule::expr)?)?)),
            None => None,
        };
        Ok(Expression::new(ExprKind::Case { clauses, default }))
    }

    // -----------------------------------------------------------------------
    // DML
    // -----------------------------------------------------------------------

    fn insert(&mut self, pair: Node<'_>) -> Result<Statement> {
        let table = table_info(&required(&pair, Rule::table_name)?)?;
        let columns = optional_columns(&pair)?;
        let source = match child(&pair, Rule::values_clause) {
            Some(values) => {
                let mut rows = Vec::new();
                for row in children(&values, Rule::values_row) {
                    rows.push(self.slots(required(&row, Rule::expr_list)?)?);
                }
                InsertSource::Values(rows)
            }
            None => InsertSource::Select(Box::new(self.select_stmt(required(&pair, Rule::select_stmt)?)?)),
        };
        Ok(Statement::Insert(InsertStatement {
            table,
            columns,
            source,
        }))
    }

    fn update(&mut self, pair: Node<'_>) -> Result<Statement> {
        let table = self.table_primary(required(&pair, Rule::table_primary)?)?;
        let mut clauses = Vec::new();
        for set in children(&pair, Rule::set_clause) {
            let column = identifier(&required(&set, Rule::ident)?)?;
            let value = self.slot(required(&set, Rule::expr)?)?;
            clauses.push(UpdateClause { column, value });
        }
        Ok(Statement::Update(UpdateStatement {
            table,
            clauses,
            where_clause: self.where_clause(&pair)?,
        }))
    }

    fn delete(&mut self, pair: Node<'_>) -> Result<Statement> {
        let table = self.table_primary(required(&pair, Rule::table_primary)?)?;
        Ok(Statement::Delete(DeleteStatement {
            table,
            where_clause: self.where_clause(&pair)?,
        }))
    }

    fn copy(&mut self, pair: Node<'_>) -> Result<Statement> {
        let (table, select) = match child(&pair, Rule::copy_query) {
            Some(query) => (
                None,
                Some(Box::new(self.select_stmt(required(&query, Rule::select_stmt)?)?)),
            ),
            None => (
                Some(TableRef::base(table_info(&required(&pair, Rule::table_name)?)?, None)),
                None,
            ),
        };
        let target = first(&required(&pair, Rule::copy_target)?)?;
        let file_path = match target.as_rule() {
            Rule::string => Some(unquote(target.as_str())),
            _ => None,
        };

        let mut copy = CopyStatement {
            table,
            select,
            columns: optional_columns(&pair)?,
            file_path,
            is_from: has(&pair, Rule::kw_from),
            format: ExternalFileFormat::Csv,
            delimiter: ',',
            quote: '"',
            escape: '"',
        };
        if let Some(options) = child(&pair, Rule::copy_options) {
            for option in children(&options, Rule::copy_option) {
                let option = first(&option)?;
                match option.as_rule() {
                    Rule::copy_format => {
                        copy.format = if has(&option, Rule::kw_text) {
                            ExternalFileFormat::Text
                        } else if has(&option, Rule::kw_binary) {
                            ExternalFileFormat::Binary
                        } else {
                            ExternalFileFormat::Csv
                        }
                    }
                    Rule::copy_delimiter => copy.delimiter = single_char(&option)?,
                    Rule::copy_quote => copy.quote = single_char(&option)?,
                    Rule::copy_escape => copy.escape = single_char(&option)?,
                    _ => {}
                }
            }
        }
        Ok(Statement::Copy(copy))
    }

    // -----------------------------------------------------------------------
    // DDL
    // -----------------------------------------------------------------------

    fn create_table(&mut self, pair: Node<'_>) -> Result<Statement> {
        let mut create = CreateTableStatement {
            table: table_info(&required(&pair, Rule::table_name)?)?,
            if_not_exists: has(&pair, Rule::if_not_exists),
            columns: Vec::new(),
            primary_key: Vec::new(),
            foreign_keys: Vec::new(),
        };

        for element in children(&pair, Rule::table_element) {
            let element = first(&element)?;
            match element.as_rule() {
                Rule::column_def => self.column_def(element, &mut create)?,
                Rule::table_constraint => table_constraint(&element, &mut create)?,
                other => return Err(Error::malformed("table_element", format!("{:?}", other))),
            }
        }

        for column in &mut create.columns {
            if create.primary_key.contains(&column.name) {
                column.primary = true;
                column.nullable = false;
            }
        }
        Ok(Statement::CreateTable(create))
    }

    fn column_def(&mut self, pair: Node<'_>, create: &mut CreateTableStatement) -> Result<()> {
        let (data_type, varlen) = type_spec(&required(&pair, Rule::type_name)?)?;
        let mut column = ColumnDefinition {
            name: identifier(&required(&pair, Rule::ident)?)?,
            data_type,
            varlen,
            nullable: true,
            primary: false,
            unique: false,
            default: None,
            check: None,
        };

        for constraint in children(&pair, Rule::column_constraint) {
            let constraint = first(&constraint)?;
            match constraint.as_rule() {
                Rule::not_null => column.nullable = false,
                Rule::null_ok => column.nullable = true,
                Rule::primary_key_attr => {
                    column.primary = true;
                    column.nullable = false;
                }
                Rule::unique_attr => column.unique = true,
                Rule::default_constraint => {
                    column.default = Some(self.slot(required(&constraint, Rule::expr)?)?)
                }
                Rule::check_constraint => column.check = Some(self.slot(required(&constraint, Rule::expr)?)?),
                Rule::references_constraint => {
                    let target = required(&constraint, Rule::fk_target)?;
                    create
                        .foreign_keys
                        .push(foreign_key(&target, vec![column.name.clone()], None)?);
                }
                other => return Err(Error::malformed("column_constraint", format!("{:?}", other))),
            }
        }
        create.columns.push(column);
        Ok(())
    }

    fn create_index(&mut self, pair: Node<'_>) -> Result<Statement> {
        let index_type = match child(&pair, Rule::index_method) {
            Some(method) if has(&method, Rule::kw_hash) => IndexType::Hash,
            _ => IndexType::Btree,
        };

        let mut attributes = Vec::new();
        for elem in children(&pair, Rule::index_elem) {
            let elem = first(&elem)?;
            let attribute = match elem.as_rule() {
                Rule::ident => IndexAttribute::Column(identifier(&elem)?),
                Rule::index_expr => IndexAttribute::Expr(self.slot(required(&elem, Rule::expr)?)?),
                Rule::func_call => {
                    let call = self.nested(|t| t.function(elem))?;
                    IndexAttribute::Expr(self.register(call)?)
                }
                other => return Err(Error::malformed("index_elem", format!("{:?}", other))),
            };
            attributes.push(attribute);
        }

        Ok(Statement::CreateIndex(CreateIndexStatement {
            name: identifier(&required(&pair, Rule::ident)?)?,
            table: table_info(&required(&pair, Rule::table_name)?)?,
            unique: has(&pair, Rule::kw_unique),
            index_type,
            attributes,
        }))
    }

    fn create_trigger(&mut self, pair: Node<'_>) -> Result<Statement> {
        // The trigger's own name comes first, the function it runs second
        let mut names = children(&pair, Rule::ident);
        let (Some(name), Some(function)) = (names.next(), names.next()) else {
            return Err(Error::malformed("create_trigger_stmt", "ident"));
        };

        let timing = required(&pair, Rule::trigger_timing)?;
        let timing = if has(&timing, Rule::kw_before) {
            TriggerTiming::Before
        } else if has(&timing, Rule::kw_after) {
            TriggerTiming::After
        } else {
            TriggerTiming::InsteadOf
        };

        let mut events = Vec::new();
        let mut columns = Vec::new();
        for event in children(&pair, Rule::trigger_event) {
            events.push(match first(&event)?.as_rule() {
                Rule::kw_insert => TriggerEvent::Insert,
                Rule::kw_update => {
                    columns.extend(identifiers(&event)?);
                    TriggerEvent::Update
                }
                Rule::kw_delete => TriggerEvent::Delete,
                Rule::kw_truncate => TriggerEvent::Truncate,
                other => return Err(Error::malformed("trigger_event", format!("{:?}", other))),
            });
        }

        let when = match child(&pair, Rule::trigger_when) {
            Some(when) => Some(self.slot(required(&when, Rule::expr)?)?),
            None => None,
        };

        Ok(Statement::CreateTrigger(CreateTriggerStatement {
            name: identifier(&name)?,
            table: table_info(&required(&pair, Rule::table_name)?)?,
            function: identifier(&function)?,
            args: children(&pair, Rule::trigger_arg)
                .map(|arg| trigger_arg(&arg))
                .collect::<Result<Vec<_>>>()?,
            columns,
            when,
            timing,
            events,
            for_each_row: child(&pair, Rule::trigger_for).is_some_and(|f| has(&f, Rule::kw_row)),
        }))
    }
}

// ---------------------------------------------------------------------------
// Statement helpers that register nothing
// ---------------------------------------------------------------------------

fn create_function(pair: &Node<'_>) -> Result<Statement> {
    let parameters = children(pair, Rule::func_param)
        .map(|param| -> Result<FuncParameter> {
            Ok(FuncParameter {
                name: child(&param, Rule::ident).map(|name| identifier(&name)).transpose()?,
                data_type: type_spec(&required(&param, Rule::type_name)?)?.0,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut language = FuncLanguage::Sql;
    let mut body = Vec::new();
    for option in children(pair, Rule::function_option) {
        let option = first(&option)?;
        match option.as_rule() {
            Rule::function_body => {
                for text in children(&option, Rule::body_string) {
                    body.push(body_text(&first(&text)?));
                }
            }
            Rule::function_language => language = function_language(&option)?,
            _ => {}
        }
    }

    Ok(Statement::CreateFunction(CreateFunctionStatement {
        name: identifier(&required(pair, Rule::ident)?)?,
        replace: has(pair, Rule::or_replace),
        parameters,
        return_type: type_spec(&required(pair, Rule::type_name)?)?.0,
        language,
        body,
    }))
}

fn function_language(pair: &Node<'_>) -> Result<FuncLanguage> {
    let name = match child(pair, Rule::string) {
        Some(text) => unquote(text.as_str()),
        None => identifier(&required(pair, Rule::ident)?)?,
    };
    match name.to_ascii_lowercase().as_str() {
        "sql" => Ok(FuncLanguage::Sql),
        "plpgsql" => Ok(FuncLanguage::Plpgsql),
        "c" => Ok(FuncLanguage::C),
        _ => Err(Error::unsupported(format!("LANGUAGE {}", name))),
    }
}

fn table_constraint(pair: &Node<'_>, create: &mut CreateTableStatement) -> Result<()> {
    let name = child(pair, Rule::ident).map(|name| identifier(&name)).transpose()?;
    for part in pair.clone().into_inner() {
        match part.as_rule() {
            Rule::table_primary_key => create.primary_key = identifiers(&required(&part, Rule::column_list)?)?,
            Rule::table_unique => {
                let columns = identifiers(&required(&part, Rule::column_list)?)?;
                let target = match columns.as_slice() {
                    [only] => create.columns.iter_mut().find(|c| &c.name == only),
                    _ => None,
                };
                match target {
                    Some(column) => column.unique = true,
                    None => return Err(Error::unsupported("UNIQUE constraint over several or undeclared columns")),
                }
            }
            Rule::table_foreign_key => {
                let columns = identifiers(&required(&part, Rule::column_list)?)?;
                let target = required(&part, Rule::fk_target)?;
                create.foreign_keys.push(foreign_key(&target, columns, name.clone())?);
            }
            Rule::table_check => return Err(Error::unsupported("table-level CHECK constraint")),
            _ => {}
        }
    }
    Ok(())
}

fn foreign_key(pair: &Node<'_>, columns: Vec<String>, name: Option<String>) -> Result<ForeignKeyDefinition> {
    let mut fk = ForeignKeyDefinition {
        name,
        columns,
        ref_table: table_info(&required(pair, Rule::table_name)?)?,
        ref_columns: optional_columns(pair)?,
        on_delete: FkAction::NoAction,
        on_update: FkAction::NoAction,
        match_type: FkMatch::Simple,
    };
    for option in children(pair, Rule::fk_option) {
        let option = first(&option)?;
        match option.as_rule() {
            Rule::fk_match => fk.match_type = FkMatch::from_code(match_code(&option)),
            Rule::fk_on_delete => fk.on_delete = FkAction::from_code(action_code(&required(&option, Rule::fk_action)?)),
            Rule::fk_on_update => fk.on_update = FkAction::from_code(action_code(&required(&option, Rule::fk_action)?)),
            _ => {}
        }
    }
    Ok(fk)
}

/// Single-character code for a referential action, as catalogs store it.
fn action_code(pair: &Node<'_>) -> char {
    if has(pair, Rule::kw_restrict) {
        'r'
    } else if has(pair, Rule::kw_cascade) {
        'c'
    } else if has(pair, Rule::kw_set) && has(pair, Rule::kw_null) {
        'n'
    } else if has(pair, Rule::kw_set) && has(pair, Rule::kw_default) {
        'd'
    } else {
        'a'
    }
}

fn match_code(pair: &Node<'_>) -> char {
    if has(pair, Rule::kw_full) {
        'f'
    } else if has(pair, Rule::kw_partial) {
        'p'
    } else {
        's'
    }
}

fn drop_stmt(pair: &Node<'_>) -> Result<Statement> {
    let target = first(&required(pair, Rule::drop_target)?)?;
    let drop_type = match target.as_rule() {
        Rule::drop_database => DropType::Database,
        Rule::drop_table => DropType::Table,
        Rule::drop_schema => DropType::Schema,
        Rule::drop_index => DropType::Index,
        Rule::drop_view => DropType::View,
        Rule::drop_trigger => DropType::Trigger,
        other => return Err(Error::unsupported(format!("{:?}", other))),
    };
    let (name, table) = match drop_type {
        DropType::Table => (qualified_name(&required(&target, Rule::table_name)?)?, None),
        DropType::Trigger => (
            identifier(&required(&target, Rule::ident)?)?,
            Some(qualified_name(&required(&target, Rule::table_name)?)?),
        ),
        _ => (identifier(&required(&target, Rule::ident)?)?, None),
    };
    Ok(Statement::Drop(DropStatement {
        drop_type,
        name,
        table,
        if_exists: has(&target, Rule::if_exists),
        cascade: child(&target, Rule::drop_behavior).is_some_and(|b| has(&b, Rule::kw_cascade)),
    }))
}

fn transaction(pair: &Node<'_>) -> Result<Statement> {
    let transaction_type = match first(pair)?.as_rule() {
        Rule::kw_begin | Rule::kw_start => TransactionType::Begin,
        Rule::kw_commit | Rule::kw_end => TransactionType::Commit,
        Rule::kw_rollback | Rule::kw_abort => TransactionType::Rollback,
        other => return Err(Error::malformed("transaction_stmt", format!("{:?}", other))),
    };
    Ok(Statement::Transaction(TransactionStatement { transaction_type }))
}

fn limit_clause(pair: &Node<'_>) -> Result<LimitDescription> {
    let mut limit = LimitDescription::default();
    let mut offset_next = false;
    for part in pair.clone().into_inner() {
        match part.as_rule() {
            Rule::kw_limit => offset_next = false,
            Rule::kw_offset => offset_next = true,
            Rule::integer => {
                let value = part
                    .as_str()
                    .parse::<i64>()
                    .map_err(|_| Error::malformed("limit_clause", "integer"))?;
                if offset_next {
                    limit.offset = Some(value);
                } else {
                    limit.limit = Some(value);
                }
            }
            _ => {}
        }
    }
    Ok(limit)
}

fn join_kind(pair: &Node<'_>) -> Result<JoinType> {
    Ok(match first(pair)?.as_rule() {
        Rule::kw_inner => JoinType::Inner,
        Rule::kw_left => JoinType::Left,
        Rule::kw_right => JoinType::Right,
        Rule::kw_full => JoinType::Outer,
        Rule::kw_cross => JoinType::Cross,
        Rule::kw_semi => JoinType::Semi,
        other => return Err(Error::malformed("join_kind", format!("{:?}", other))),
    })
}

// ---------------------------------------------------------------------------
// Leaf expressions
// ---------------------------------------------------------------------------

fn literal(pair: &Node<'_>) -> Result<Expression> {
    let token = first(pair)?;
    let text = token.as_str();
    let value = match token.as_rule() {
        // Integers that overflow i64 are kept as decimals
        Rule::integer => match text.parse::<i64>() {
            Ok(value) => Value::Integer(value),
            Err(_) => Value::Decimal(parse_decimal(text)?),
        },
        Rule::decimal => Value::Decimal(parse_decimal(text)?),
        Rule::string => Value::String(unquote(text)),
        Rule::kw_true => Value::Boolean(true),
        Rule::kw_false => Value::Boolean(false),
        Rule::kw_null => Value::Null,
        other => return Err(Error::malformed("literal", format!("{:?}", other))),
    };
    Ok(Expression::constant(value))
}

/// Decimals must be finite; infinities have no document form.
fn parse_decimal(text: &str) -> Result<f64> {
    text.parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| Error::malformed("literal", "decimal"))
}

/// The digits of a bare integer literal operand, without casts or parentheses.
fn integer_text<'i>(operand: &Node<'i>) -> Option<&'i str> {
    let text = operand.as_str().trim_end();
    (!text.is_empty() && text.bytes().all(|b| b.is_ascii_digit())).then_some(text)
}

fn parameter(pair: &Node<'_>) -> Result<Expression> {
    let index = pair.as_str()[1..]
        .parse::<u32>()
        .ok()
        .filter(|n| *n >= 1)
        .ok_or_else(|| Error::malformed("parameter", "index"))?;
    Ok(Expression::new(ExprKind::Parameter(index - 1)))
}

fn column(pair: &Node<'_>) -> Result<Expression> {
    let mut parts = identifiers(pair)?;
    let column = parts.pop().ok_or_else(|| Error::malformed("column_ref", "ident"))?;
    Ok(Expression::new(ExprKind::Column(ColumnRef {
        table: parts.pop(),
        column,
    })))
}

fn binary(op: OperatorType, left: Expression, right: Expression) -> Expression {
    Expression::new(ExprKind::Operator {
        op,
        operands: vec![left, right],
    })
}

fn negation(operand: Expression) -> Expression {
    Expression::new(ExprKind::Boolean {
        op: BoolOp::Not,
        operands: vec![operand],
    })
}

/// Unary minus; numeric literals are folded into a negative constant.
fn negate(operand: Expression) -> Expression {
    let folded = match &operand.kind {
        ExprKind::Constant(Value::Integer(v)) if operand.alias.is_none() => Some(
            v.checked_neg()
                .map_or(Value::Decimal(-(*v as f64)), Value::Integer),
        ),
        ExprKind::Constant(Value::Decimal(v)) if operand.alias.is_none() => Some(Value::Decimal(-v)),
        _ => None,
    };
    folded.map(Expression::constant).unwrap_or_else(|| {
        Expression::new(ExprKind::Operator {
            op: OperatorType::UnaryMinus,
            operands: vec![operand],
        })
    })
}

fn subquery(select: SelectStatement) -> Expression {
    Expression::new(ExprKind::Subquery(Box::new(select)))
}

fn comparison_op(symbol: &str) -> Result<ComparisonType> {
    Ok(match symbol {
        "=" => ComparisonType::Equal,
        "<>" | "!=" => ComparisonType::NotEqual,
        "<" => ComparisonType::LessThan,
        "<=" => ComparisonType::LessThanOrEqualTo,
        ">" => ComparisonType::GreaterThan,
        ">=" => ComparisonType::GreaterThanOrEqualTo,
        _ => return Err(Error::malformed("comp_op", symbol)),
    })
}

// ---------------------------------------------------------------------------
// Names, types and pair navigation
// ---------------------------------------------------------------------------

/// Unquoted identifiers fold to lower case; quoted ones keep their spelling.
fn identifier(pair: &Node<'_>) -> Result<String> {
    let inner = first(pair)?;
    let text = inner.as_str();
    Ok(match inner.as_rule() {
        Rule::quoted_ident => text[1..text.len() - 1].replace("\"\"", "\""),
        _ => text.to_ascii_lowercase(),
    })
}

fn identifiers(pair: &Node<'_>) -> Result<Vec<String>> {
    children(pair, Rule::ident).map(|p| identifier(&p)).collect()
}

fn alias_of(pair: &Node<'_>) -> Result<String> {
    identifier(&required(pair, Rule::ident)?)
}

fn optional_columns(pair: &Node<'_>) -> Result<Vec<String>> {
    match child(pair, Rule::column_list) {
        Some(list) => identifiers(&list),
        None => Ok(Vec::new()),
    }
}

fn table_info(pair: &Node<'_>) -> Result<TableInfo> {
    let mut parts = identifiers(pair)?;
    let table = parts.pop().ok_or_else(|| Error::malformed("table_name", "ident"))?;
    let schema = parts.pop();
    let database = parts.pop();
    Ok(TableInfo {
        database,
        schema,
        table,
    })
}

fn qualified_name(pair: &Node<'_>) -> Result<String> {
    Ok(identifiers(pair)?.join("."))
}

fn type_spec(pair: &Node<'_>) -> Result<(DataType, Option<u32>)> {
    let word = required(pair, Rule::type_word)?;
    let text = word.as_str();
    let base = text.split_whitespace().next().unwrap_or(text);
    let data_type = DataType::from_sql_name(base).ok_or_else(|| Error::unsupported(format!("type {}", text)))?;
    let varlen = match child(pair, Rule::type_modifier) {
        Some(modifier) => Some(
            required(&modifier, Rule::integer)?
                .as_str()
                .parse::<u32>()
                .map_err(|_| Error::malformed("type_modifier", "integer"))?,
        ),
        None => None,
    };
    Ok((data_type, varlen))
}

fn unquote(text: &str) -> String {
    text[1..text.len() - 1].replace("''", "'")
}

fn body_text(pair: &Node<'_>) -> String {
    let text = pair.as_str();
    match pair.as_rule() {
        Rule::dollar_string => text[2..text.len() - 2].to_string(),
        _ => unquote(text),
    }
}

fn trigger_arg(pair: &Node<'_>) -> Result<String> {
    let arg = first(pair)?;
    match arg.as_rule() {
        Rule::string => Ok(unquote(arg.as_str())),
        Rule::ident => identifier(&arg),
        _ => Ok(arg.as_str().to_string()),
    }
}

fn single_char(pair: &Node<'_>) -> Result<char> {
    let text = unquote(required(pair, Rule::string)?.as_str());
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(Error::malformed(kind(pair), "string")),
    }
}

fn kind(pair: &Node<'_>) -> String {
    format!("{:?}", pair.as_rule())
}

fn child<'i>(pair: &Node<'i>, rule: Rule) -> Option<Node<'i>> {
    pair.clone().into_inner().find(|p| p.as_rule() == rule)
}

fn children<'i>(pair: &Node<'i>, rule: Rule) -> impl Iterator<Item = Node<'i>> {
    pair.clone().into_inner().filter(move |p| p.as_rule() == rule)
}

fn has(pair: &Node<'_>, rule: Rule) -> bool {
    child(pair, rule).is_some()
}

fn required<'i>(pair: &Node<'i>, rule: Rule) -> Result<Node<'i>> {
    child(pair, rule).ok_or_else(|| Error::malformed(kind(pair), format!("{:?}", rule)))
}

fn first<'i>(pair: &Node<'i>) -> Result<Node<'i>> {
    pair.clone()
        .into_inner()
        .next()
        .ok_or_else(|| Error::malformed(kind(pair), "body"))
}
