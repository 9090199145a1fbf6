use sqlparser::ast as sql_ast;
use sqlparser::dialect::SQLiteDialect;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::Tokenizer;
use tracing::debug;

use super::placeholders::{Params, number_placeholders};
use crate::core::{Result, StoreError, Value, timestamp_now};
use crate::query::{
    CompareOp, Condition, Delete, Filter, Insert, Projection, Select, Sort, SortDirection,
    Statement, Update,
};

/// Field whose values are normalized to booleans wherever they appear.
const FLAG_FIELD: &str = "active";

/// Translates literal SQL plus positional parameters into a typed [`Statement`].
///
/// Only a constrained grammar is understood: single-table SELECT, INSERT
/// [OR REPLACE] ... VALUES, UPDATE ... SET and DELETE, with conjunctions of
/// comparisons, LIKE patterns and parenthesized OR groups. Anything outside
/// that grammar fails translation instead of silently widening a filter.
pub struct QueryTranslator {
    dialect: SQLiteDialect,
}

impl QueryTranslator {
    pub fn new() -> Self {
        Self {
            dialect: SQLiteDialect {},
        }
    }

    pub fn translate(&self, sql: &str, params: &[Value]) -> Result<Statement> {
        let tokens = Tokenizer::new(&self.dialect, sql)
            .tokenize()
            .map_err(|e| StoreError::ParseError(e.to_string()))?;

        let (tokens, referenced) = number_placeholders(tokens)?;
        if referenced != params.len() {
            return Err(StoreError::ParameterMismatch(format!(
                "statement references {} parameter(s), {} supplied",
                referenced,
                params.len()
            )));
        }

        let mut statements = Parser::new(&self.dialect)
            .with_tokens(tokens)
            .parse_statements()
            .map_err(|e| StoreError::ParseError(e.to_string()))?;

        if statements.len() != 1 {
            return Err(StoreError::UnsupportedStatement(format!(
                "expected exactly one statement, got {}",
                statements.len()
            )));
        }

        let params = Params::new(params);
        let statement = self.convert_statement(statements.remove(0), &params)?;
        debug!(statement = %statement, "translated literal query");
        Ok(statement)
    }

    fn convert_statement(&self, stmt: sql_ast::Statement, params: &Params<'_>) -> Result<Statement> {
        match stmt {
            sql_ast::Statement::Query(query) => {
                Ok(Statement::Select(self.convert_query(*query, params)?))
            }
            sql_ast::Statement::Insert(insert) => {
                Ok(Statement::Insert(self.convert_insert(insert, params)?))
            }
            sql_ast::Statement::Update {
                table,
                assignments,
                selection,
                ..
            } => Ok(Statement::Update(
                self.convert_update(table, assignments, selection, params)?,
            )),
            sql_ast::Statement::Delete(delete) => {
                Ok(Statement::Delete(self.convert_delete(delete, params)?))
            }
            other => Err(StoreError::UnsupportedStatement(other.to_string())),
        }
    }

    fn convert_query(&self, query: sql_ast::Query, params: &Params<'_>) -> Result<Select> {
        let sql_ast::Query {
            with,
            body,
            order_by,
            limit_clause,
            ..
        } = query;

        if with.is_some() {
            return Err(StoreError::UnsupportedStatement(
                "WITH clauses are not supported".into(),
            ));
        }

        let sql_ast::SetExpr::Select(select) = *body else {
            return Err(StoreError::UnsupportedStatement(
                "only plain SELECT queries are supported".into(),
            ));
        };
        let select = *select;

        if select.distinct.is_some() || select.having.is_some() {
            return Err(StoreError::UnsupportedStatement(
                "DISTINCT and HAVING are not supported".into(),
            ));
        }
        match &select.group_by {
            sql_ast::GroupByExpr::Expressions(exprs, _) if exprs.is_empty() => {}
            _ => {
                return Err(StoreError::UnsupportedStatement(
                    "GROUP BY is not supported".into(),
                ));
            }
        }

        let collection = single_table(&select.from)?;
        let projection = convert_projection(select.projection)?;
        let filter = self.convert_selection(select.selection, params)?;
        let sort = convert_order_by(order_by)?;
        let limit = self.convert_limit(limit_clause, params)?;

        Ok(Select {
            collection,
            projection,
            filter,
            sort,
            limit,
        })
    }

    fn convert_insert(&self, insert: sql_ast::Insert, params: &Params<'_>) -> Result<Insert> {
        let collection = clean_identifier(&insert.table.to_string());
        if collection.is_empty() {
            return Err(StoreError::ParseError(
                "INSERT is missing a collection name".into(),
            ));
        }

        if insert.columns.is_empty() {
            return Err(StoreError::ParseError(format!(
                "INSERT INTO {} requires an explicit field list",
                collection
            )));
        }

        let replace = insert.replace_into
            || matches!(insert.or, Some(sql_ast::SqliteOnConflict::Replace));

        let source = insert.source.ok_or_else(|| {
            StoreError::ParseError(format!("INSERT INTO {} requires VALUES", collection))
        })?;
        let sql_ast::SetExpr::Values(values) = *source.body else {
            return Err(StoreError::UnsupportedStatement(
                "only INSERT ... VALUES is supported".into(),
            ));
        };

        let mut rows = values.rows.into_iter();
        let (Some(row), None) = (rows.next(), rows.next()) else {
            return Err(StoreError::UnsupportedStatement(
                "INSERT must provide exactly one VALUES row".into(),
            ));
        };

        if row.len() != insert.columns.len() {
            return Err(StoreError::ParameterMismatch(format!(
                "INSERT INTO {} lists {} field(s) but {} value(s)",
                collection,
                insert.columns.len(),
                row.len()
            )));
        }

        let mut plan = Insert::into(collection);
        plan.replace = replace;
        for (column, expr) in insert.columns.into_iter().zip(row) {
            let value = normalize_field_value(&column.value, self.operand(expr, params)?);
            plan.set(column.value, value);
        }
        plan.stamp_timestamps();

        Ok(plan)
    }

    fn convert_update(
        &self,
        table: sql_ast::TableWithJoins,
        assignments: Vec<sql_ast::Assignment>,
        selection: Option<sql_ast::Expr>,
        params: &Params<'_>,
    ) -> Result<Update> {
        let collection = single_table(std::slice::from_ref(&table))?;
        let mut plan = Update::table(collection);

        for assignment in assignments {
            let field = match assignment.target {
                sql_ast::AssignmentTarget::ColumnName(name) => object_name_tail(&name)?,
                other => {
                    return Err(StoreError::UnsupportedStatement(format!(
                        "unsupported assignment target: {}",
                        other
                    )));
                }
            };
            let value = normalize_field_value(&field, self.operand(assignment.value, params)?);
            plan.assignments.push((field, value));
        }

        plan.filter = self.convert_selection(selection, params)?;
        plan.stamp_timestamp();
        Ok(plan)
    }

    fn convert_delete(&self, delete: sql_ast::Delete, params: &Params<'_>) -> Result<Delete> {
        let tables = match delete.from {
            sql_ast::FromTable::WithFromKeyword(tables)
            | sql_ast::FromTable::WithoutKeyword(tables) => tables,
        };

        Ok(Delete {
            collection: single_table(&tables)?,
            filter: self.convert_selection(delete.selection, params)?,
        })
    }

    fn convert_selection(
        &self,
        selection: Option<sql_ast::Expr>,
        params: &Params<'_>,
    ) -> Result<Filter> {
        let mut filter = Filter::new();
        if let Some(expr) = selection {
            self.collect_conjunction(expr, params, &mut filter)?;
        }
        Ok(filter)
    }

    /// Flattens `a AND b AND ...` into the filter, dropping constant tautologies like `1=1`.
    fn collect_conjunction(
        &self,
        expr: sql_ast::Expr,
        params: &Params<'_>,
        filter: &mut Filter,
    ) -> Result<()> {
        match expr {
            sql_ast::Expr::BinaryOp {
                left,
                op: sql_ast::BinaryOperator::And,
                right,
            } => {
                self.collect_conjunction(*left, params, filter)?;
                self.collect_conjunction(*right, params, filter)
            }
            expr if is_tautology(&expr) => Ok(()),
            sql_ast::Expr::Nested(inner) => self.collect_conjunction(*inner, params, filter),
            expr @ sql_ast::Expr::BinaryOp {
                op: sql_ast::BinaryOperator::Or,
                ..
            } => {
                let mut branches = Vec::new();
                self.collect_disjunction(expr, params, &mut branches)?;
                filter.push(Condition::Any(branches));
                Ok(())
            }
            expr => {
                filter.push(self.convert_condition(expr, params)?);
                Ok(())
            }
        }
    }

    fn collect_disjunction(
        &self,
        expr: sql_ast::Expr,
        params: &Params<'_>,
        branches: &mut Vec<Condition>,
    ) -> Result<()> {
        match expr {
            sql_ast::Expr::BinaryOp {
                left,
                op: sql_ast::BinaryOperator::Or,
                right,
            } => {
                self.collect_disjunction(*left, params, branches)?;
                self.collect_disjunction(*right, params, branches)
            }
            sql_ast::Expr::Nested(inner) => self.collect_disjunction(*inner, params, branches),
            expr => {
                branches.push(self.convert_condition(expr, params)?);
                Ok(())
            }
        }
    }

    fn convert_condition(&self, expr: sql_ast::Expr, params: &Params<'_>) -> Result<Condition> {
        let rendered = expr.to_string();
        let unsupported = || StoreError::UnsupportedCondition(rendered.clone());

        match expr {
            sql_ast::Expr::BinaryOp { left, op, right } => {
                let op = compare_op(&op).ok_or_else(unsupported)?;
                let field = field_name(&left).ok_or_else(unsupported)?;
                let value = normalize_field_value(&field, self.operand(*right, params)?);
                Ok(Condition::Compare { field, op, value })
            }
            sql_ast::Expr::Like {
                negated: false,
                expr,
                pattern,
                escape_char,
                ..
            }
            | sql_ast::Expr::ILike {
                negated: false,
                expr,
                pattern,
                escape_char,
                ..
            } => {
                if escape_char.is_some() {
                    return Err(unsupported());
                }
                let field = field_name(&expr).ok_or_else(unsupported)?;
                let pattern = match self.operand(*pattern, params)? {
                    Value::Text(text) => text,
                    Value::Null => return Err(unsupported()),
                    other => other.to_string(),
                };
                Ok(Condition::Like { field, pattern })
            }
            _ => Err(unsupported()),
        }
    }

    fn operand(&self, expr: sql_ast::Expr, params: &Params<'_>) -> Result<Value> {
        match expr {
            sql_ast::Expr::Value(value) => literal(value.value, params),
            sql_ast::Expr::Nested(inner) => self.operand(*inner, params),
            sql_ast::Expr::UnaryOp {
                op: sql_ast::UnaryOperator::Minus,
                expr,
            } => match self.operand(*expr, params)? {
                Value::Integer(i) => Ok(Value::Integer(-i)),
                Value::Float(f) => Ok(Value::Float(-f)),
                other => Err(StoreError::TypeMismatch(format!(
                    "cannot negate {}",
                    other.type_name()
                ))),
            },
            sql_ast::Expr::Function(function)
                if function.name.to_string().eq_ignore_ascii_case("current_timestamp") =>
            {
                Ok(Value::Text(timestamp_now()))
            }
            other => Err(StoreError::UnsupportedCondition(format!(
                "unsupported operand: {}",
                other
            ))),
        }
    }

    fn convert_limit(
        &self,
        limit_clause: Option<sql_ast::LimitClause>,
        params: &Params<'_>,
    ) -> Result<Option<u64>> {
        let Some(clause) = limit_clause else {
            return Ok(None);
        };

        match clause {
            sql_ast::LimitClause::LimitOffset {
                limit,
                offset: None,
                ..
            } => match limit {
                Some(expr) => {
                    let value = self.operand(expr, params)?;
                    value
                        .as_i64()
                        .and_then(|n| u64::try_from(n).ok())
                        .map(Some)
                        .ok_or_else(|| {
                            StoreError::TypeMismatch(format!("invalid LIMIT value: {}", value))
                        })
                }
                None => Ok(None),
            },
            _ => Err(StoreError::UnsupportedStatement(
                "only LIMIT without OFFSET is supported".into(),
            )),
        }
    }
}

impl Default for QueryTranslator {
    fn default() -> Self {
        Self::new()
    }
}

fn literal(value: sql_ast::Value, params: &Params<'_>) -> Result<Value> {
    match value {
        sql_ast::Value::Placeholder(raw) => params.resolve(&raw),
        sql_ast::Value::Number(n, _) => {
            if let Ok(i) = n.parse::<i64>() {
                Ok(Value::Integer(i))
            } else {
                n.parse::<f64>()
                    .map(Value::Float)
                    .map_err(|_| StoreError::TypeMismatch(format!("Invalid number: {}", n)))
            }
        }
        sql_ast::Value::SingleQuotedString(s) | sql_ast::Value::DoubleQuotedString(s) => {
            Ok(Value::Text(s))
        }
        sql_ast::Value::Boolean(b) => Ok(Value::Boolean(b)),
        sql_ast::Value::Null => Ok(Value::Null),
        other => Err(StoreError::TypeMismatch(format!(
            "Unsupported literal: {}",
            other
        ))),
    }
}

fn normalize_field_value(field: &str, value: Value) -> Value {
    if field == FLAG_FIELD {
        Value::Boolean(value.to_flag())
    } else {
        value
    }
}

fn compare_op(op: &sql_ast::BinaryOperator) -> Option<CompareOp> {
    use sql_ast::BinaryOperator as SqlOp;

    match op {
        SqlOp::Eq => Some(CompareOp::Eq),
        SqlOp::NotEq => Some(CompareOp::NotEq),
        SqlOp::Lt => Some(CompareOp::Lt),
        SqlOp::LtEq => Some(CompareOp::LtEq),
        SqlOp::Gt => Some(CompareOp::Gt),
        SqlOp::GtEq => Some(CompareOp::GtEq),
        _ => None,
    }
}

/// `1=1`, `'a'='a'`, `TRUE`: constants callers use to simplify dynamic WHERE building.
fn is_tautology(expr: &sql_ast::Expr) -> bool {
    match expr {
        sql_ast::Expr::BinaryOp {
            left,
            op: sql_ast::BinaryOperator::Eq,
            right,
        } => match (left.as_ref(), right.as_ref()) {
            (sql_ast::Expr::Value(l), sql_ast::Expr::Value(r)) => {
                l.value == r.value && !matches!(l.value, sql_ast::Value::Placeholder(_))
            }
            _ => false,
        },
        sql_ast::Expr::Value(v) => matches!(v.value, sql_ast::Value::Boolean(true)),
        sql_ast::Expr::Nested(inner) => is_tautology(inner),
        _ => false,
    }
}

fn field_name(expr: &sql_ast::Expr) -> Option<String> {
    match expr {
        sql_ast::Expr::Identifier(ident) => Some(ident.value.clone()),
        sql_ast::Expr::CompoundIdentifier(parts) => parts.last().map(|ident| ident.value.clone()),
        _ => None,
    }
}

fn is_count(expr: &sql_ast::Expr) -> bool {
    matches!(expr, sql_ast::Expr::Function(function) if function.name.to_string().eq_ignore_ascii_case("count"))
}

fn convert_projection(items: Vec<sql_ast::SelectItem>) -> Result<Projection> {
    if let [item] = items.as_slice() {
        match item {
            sql_ast::SelectItem::Wildcard(_) => return Ok(Projection::All),
            sql_ast::SelectItem::UnnamedExpr(expr) if is_count(expr) => {
                return Ok(Projection::Count {
                    alias: expr.to_string(),
                });
            }
            sql_ast::SelectItem::ExprWithAlias { expr, alias } if is_count(expr) => {
                return Ok(Projection::Count {
                    alias: alias.value.clone(),
                });
            }
            _ => {}
        }
    }

    items
        .into_iter()
        .map(|item| match item {
            sql_ast::SelectItem::UnnamedExpr(expr) => field_name(&expr).ok_or_else(|| {
                StoreError::UnsupportedStatement(format!("unsupported select item: {}", expr))
            }),
            other => Err(StoreError::UnsupportedStatement(format!(
                "unsupported select item: {}",
                other
            ))),
        })
        .collect::<Result<Vec<_>>>()
        .map(Projection::Fields)
}

fn convert_order_by(order_by: Option<sql_ast::OrderBy>) -> Result<Option<Sort>> {
    let Some(order_by) = order_by else {
        return Ok(None);
    };

    let sql_ast::OrderByKind::Expressions(exprs) = order_by.kind else {
        return Err(StoreError::UnsupportedStatement(
            "ORDER BY ALL is not supported".into(),
        ));
    };

    let mut exprs = exprs.into_iter();
    let (Some(order), None) = (exprs.next(), exprs.next()) else {
        return Err(StoreError::UnsupportedStatement(
            "ORDER BY supports exactly one field".into(),
        ));
    };

    let field = field_name(&order.expr).ok_or_else(|| {
        StoreError::UnsupportedStatement(format!("unsupported ORDER BY: {}", order.expr))
    })?;

    // asc: Some(true) = ASC, Some(false) = DESC, None = default (ASC)
    let direction = match order.options.asc {
        Some(false) => SortDirection::Desc,
        _ => SortDirection::Asc,
    };

    Ok(Some(Sort { field, direction }))
}

fn single_table(from: &[sql_ast::TableWithJoins]) -> Result<String> {
    match from {
        [] => Err(StoreError::ParseError("no collection name found".into())),
        [table] if table.joins.is_empty() => match &table.relation {
            sql_ast::TableFactor::Table { name, .. } => object_name_tail(name),
            other => Err(StoreError::UnsupportedStatement(format!(
                "unsupported table reference: {}",
                other
            ))),
        },
        _ => Err(StoreError::UnsupportedStatement(
            "joins and multi-table statements are not supported".into(),
        )),
    }
}

fn object_name_tail(name: &sql_ast::ObjectName) -> Result<String> {
    name.0
        .last()
        .map(|part| clean_identifier(&part.to_string()))
        .filter(|ident| !ident.is_empty())
        .ok_or_else(|| StoreError::ParseError("Invalid collection name".into()))
}

fn clean_identifier(raw: &str) -> String {
    let tail = raw.rsplit('.').next().unwrap_or(raw);
    tail.trim_matches(|c| matches!(c, '"' | '`' | '[' | ']'))
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn translate(sql: &str, params: &[Value]) -> Result<Statement> {
        QueryTranslator::new().translate(sql, params)
    }

    fn select(sql: &str, params: &[Value]) -> Select {
        match translate(sql, params).unwrap() {
            Statement::Select(select) => select,
            other => panic!("Expected SELECT, got {:?}", other),
        }
    }

    #[test]
    fn test_select_by_id() {
        let select = select("SELECT * FROM products WHERE id = ?", &[Value::Integer(7)]);
        assert_eq!(select.collection, "products");
        assert_eq!(select.projection, Projection::All);
        assert_eq!(select.filter.conditions(), &[Condition::id(7)]);
        assert!(select.sort.is_none());
    }

    #[test]
    fn test_tautology_prefix_is_stripped() {
        let params = [Value::Text("Tools".into())];
        let with_prefix = select("SELECT * FROM products WHERE 1=1 AND category = ?", &params);
        let without = select("SELECT * FROM products WHERE category = ?", &params);
        assert_eq!(with_prefix, without);

        let only_prefix = select("SELECT * FROM products WHERE 1=1", &[]);
        assert!(only_prefix.filter.is_empty());
    }

    #[test]
    fn test_tautology_keeps_condition_order() {
        let select = select(
            "SELECT * FROM products WHERE 1=1 AND category = ? AND name LIKE ?",
            &[Value::Text("Tools".into()), Value::Text("%saw%".into())],
        );
        assert_eq!(
            select.filter.conditions(),
            &[
                Condition::eq("category", "Tools"),
                Condition::like("name", "%saw%"),
            ]
        );
    }

    #[test]
    fn test_active_is_coerced_to_boolean() {
        for raw in [Value::Integer(1), Value::Text("1".into()), Value::Boolean(true)] {
            let select = select("SELECT * FROM products WHERE active = ?", &[raw]);
            assert_eq!(select.filter.conditions(), &[Condition::eq("active", true)]);
        }

        let select = select("SELECT * FROM products WHERE active = 0", &[]);
        assert_eq!(select.filter.conditions(), &[Condition::eq("active", false)]);
    }

    #[test]
    fn test_or_like_group_becomes_disjunction() {
        let select = select(
            "SELECT * FROM products WHERE active = 1 AND (name LIKE ? OR description LIKE ?) ORDER BY created_at DESC",
            &[Value::Text("%saw%".into()), Value::Text("%saw%".into())],
        );
        assert_eq!(
            select.filter.conditions(),
            &[
                Condition::eq("active", true),
                Condition::any(vec![
                    Condition::like("name", "%saw%"),
                    Condition::like("description", "%saw%"),
                ]),
            ]
        );
        assert_eq!(
            select.sort,
            Some(Sort {
                field: "created_at".into(),
                direction: SortDirection::Desc
            })
        );
    }

    #[test]
    fn test_range_comparisons_and_limit() {
        let select = select(
            "SELECT * FROM orders WHERE created_at >= ? AND total > -1 ORDER BY created_at LIMIT 10",
            &[Value::Text("2024-01-01".into())],
        );
        assert_eq!(
            select.filter.conditions(),
            &[
                Condition::compare("created_at", CompareOp::GtEq, "2024-01-01"),
                Condition::compare("total", CompareOp::Gt, -1),
            ]
        );
        assert_eq!(select.limit, Some(10));
        assert_eq!(select.sort.map(|s| s.direction), Some(SortDirection::Asc));
    }

    #[test]
    fn test_count_projection() {
        let select = select(
            "SELECT COUNT(*) as count FROM orders WHERE user_id = ?",
            &[Value::Integer(3)],
        );
        assert_eq!(
            select.projection,
            Projection::Count {
                alias: "count".into()
            }
        );

        let unaliased = self::select("SELECT COUNT(*) FROM orders", &[]);
        assert_eq!(
            unaliased.projection,
            Projection::Count {
                alias: "COUNT(*)".into()
            }
        );
    }

    #[test]
    fn test_column_projection() {
        let select = select("SELECT id, name FROM products", &[]);
        assert_eq!(
            select.projection,
            Projection::Fields(vec!["id".into(), "name".into()])
        );
    }

    #[test]
    fn test_insert_pairs_fields_and_stamps_timestamps() {
        let statement = translate(
            "INSERT INTO products (name, category, price) VALUES (?, ?, ?)",
            &[
                Value::Text("Widget".into()),
                Value::Text("Tools".into()),
                Value::Float(9.99),
            ],
        )
        .unwrap();

        let Statement::Insert(insert) = statement else {
            panic!("Expected INSERT");
        };
        assert_eq!(insert.collection, "products");
        assert!(!insert.replace);
        assert_eq!(insert.get("name"), Some(&Value::Text("Widget".into())));
        assert_eq!(insert.get("price"), Some(&Value::Float(9.99)));
        assert!(insert.get("created_at").is_some());
        assert_eq!(insert.get("created_at"), insert.get("updated_at"));
    }

    #[test]
    fn test_insert_or_replace() {
        let statement = translate(
            "INSERT OR REPLACE INTO admin_settings (setting_key, setting_value, created_at) VALUES (?, ?, ?)",
            &[
                Value::Text("currency".into()),
                Value::Text("EUR".into()),
                Value::Text("2024-01-01T00:00:00.000Z".into()),
            ],
        )
        .unwrap();

        let Statement::Insert(insert) = statement else {
            panic!("Expected INSERT");
        };
        assert!(insert.replace);
        assert_eq!(
            insert.get("created_at"),
            Some(&Value::Text("2024-01-01T00:00:00.000Z".into()))
        );
        assert_ne!(insert.get("updated_at"), insert.get("created_at"));
    }

    #[test]
    fn test_insert_coerces_active_flag() {
        let statement = translate(
            "INSERT INTO products (id, name, active) VALUES (?, ?, ?)",
            &[Value::Integer(7), Value::Text("Saw".into()), Value::Text("1".into())],
        )
        .unwrap();
        let Statement::Insert(insert) = statement else {
            panic!("Expected INSERT");
        };
        assert_eq!(insert.get("active"), Some(&Value::Boolean(true)));
        assert_eq!(insert.get("id"), Some(&Value::Integer(7)));
    }

    #[test]
    fn test_insert_without_field_list_fails() {
        let err = translate("INSERT INTO products VALUES (?, ?)", &[1.into(), 2.into()]).unwrap_err();
        assert!(matches!(err, StoreError::ParseError(_)));
    }

    #[test]
    fn test_update_binds_set_before_where() {
        let statement = translate(
            "UPDATE products SET name = ?, price = ? WHERE id = ?",
            &[Value::Text("Saw".into()), Value::Float(12.5), Value::Integer(7)],
        )
        .unwrap();

        let Statement::Update(update) = statement else {
            panic!("Expected UPDATE");
        };
        assert_eq!(update.collection, "products");
        assert_eq!(update.assignments[0], ("name".into(), Value::Text("Saw".into())));
        assert_eq!(update.assignments[1], ("price".into(), Value::Float(12.5)));
        assert_eq!(update.filter.conditions(), &[Condition::id(7)]);
        assert!(update.is_assigned("updated_at"));
    }

    #[test]
    fn test_update_with_explicit_indexes() {
        let statement = translate(
            "UPDATE orders SET status = ?2 WHERE id = ?1",
            &[Value::Integer(4), Value::Text("shipped".into())],
        )
        .unwrap();

        let Statement::Update(update) = statement else {
            panic!("Expected UPDATE");
        };
        assert_eq!(
            update.assignments[0],
            ("status".into(), Value::Text("shipped".into()))
        );
        assert_eq!(update.filter.conditions(), &[Condition::id(4)]);
    }

    #[test]
    fn test_update_current_timestamp_is_kept() {
        let statement = translate(
            "UPDATE orders SET status = 'paid', updated_at = CURRENT_TIMESTAMP WHERE id = ?",
            &[Value::Integer(1)],
        )
        .unwrap();
        let Statement::Update(update) = statement else {
            panic!("Expected UPDATE");
        };
        assert_eq!(update.assignments.len(), 2);
        assert!(matches!(&update.assignments[1].1, Value::Text(ts) if ts.ends_with('Z')));
    }

    #[test]
    fn test_update_rejects_computed_assignments() {
        let err = translate(
            "UPDATE products SET stock = stock - ? WHERE id = ?",
            &[Value::Integer(1), Value::Integer(2)],
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedCondition(_)));
    }

    #[test]
    fn test_delete() {
        let statement = translate("DELETE FROM order_items WHERE order_id = ?", &[5.into()]).unwrap();
        assert_eq!(
            statement,
            Statement::Delete(Delete {
                collection: "order_items".into(),
                filter: Filter::from(Condition::eq("order_id", 5)),
            })
        );
    }

    #[test]
    fn test_unsupported_condition_fails() {
        let err = translate(
            "SELECT * FROM orders WHERE status IN ('a', 'b')",
            &[],
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedCondition(_)));

        let err = translate("SELECT * FROM orders WHERE notes IS NULL", &[]).unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedCondition(_)));
    }

    #[test]
    fn test_and_inside_or_fails() {
        let err = translate(
            "SELECT * FROM products WHERE (name LIKE ? OR (category = ? AND active = 1))",
            &["%a%".into(), "Tools".into()],
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedCondition(_)));
    }

    #[test]
    fn test_parameter_count_must_match() {
        let err = translate("SELECT * FROM products WHERE id = ?", &[]).unwrap_err();
        assert!(matches!(err, StoreError::ParameterMismatch(_)));

        let err = translate("SELECT * FROM products", &[Value::Integer(1)]).unwrap_err();
        assert!(matches!(err, StoreError::ParameterMismatch(_)));
    }

    #[test]
    fn test_unsupported_verbs_fail() {
        let err = translate("CREATE TABLE t (id INTEGER)", &[]).unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedStatement(_)));

        let err = translate("DROP TABLE products", &[]).unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedStatement(_)));
    }

    #[test]
    fn test_multi_field_sort_fails() {
        let err = translate("SELECT * FROM products ORDER BY category, name", &[]).unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedStatement(_)));
    }

    #[test]
    fn test_missing_collection_fails() {
        assert!(matches!(
            translate("SELECT 1", &[]),
            Err(StoreError::ParseError(_))
        ));
        assert!(matches!(
            translate("SELECT * FROM", &[]),
            Err(StoreError::ParseError(_))
        ));
    }

    #[test]
    fn test_joins_fail() {
        let err = translate(
            "SELECT * FROM orders o JOIN order_items i ON i.order_id = o.id",
            &[],
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedStatement(_)));
    }

    #[test]
    fn test_qualified_columns_use_last_segment() {
        let select = select("SELECT * FROM orders WHERE orders.user_id = ?", &[3.into()]);
        assert_eq!(select.filter.conditions(), &[Condition::eq("user_id", 3)]);
    }
}
