//! Renders typed statements as parameterized SQLite SQL.

use crate::core::{Result, StoreError, Value};

use super::{Condition, Delete, Filter, Insert, Projection, Select, SortDirection, Statement, Update};

/// SQL text with `?` placeholders and the values bound to them, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedSql {
    pub sql: String,
    pub params: Vec<Value>,
}

pub fn render(statement: &Statement) -> Result<RenderedSql> {
    let mut out = RenderedSql {
        sql: String::new(),
        params: Vec::new(),
    };

    match statement {
        Statement::Select(select) => render_select(select, &mut out)?,
        Statement::Insert(insert) => render_insert(insert, &mut out)?,
        Statement::Update(update) => render_update(update, &mut out)?,
        Statement::Delete(delete) => render_delete(delete, &mut out)?,
    }

    Ok(out)
}

/// Accepts plain identifiers only; everything else could smuggle SQL into the statement.
pub fn quote_identifier(name: &str) -> Result<String> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };

    if !valid {
        return Err(StoreError::InvalidIdentifier(name.to_string()));
    }
    Ok(format!("\"{}\"", name))
}

fn render_select(select: &Select, out: &mut RenderedSql) -> Result<()> {
    let projection = match &select.projection {
        Projection::All => "*".to_string(),
        Projection::Fields(fields) => fields
            .iter()
            .map(|f| quote_identifier(f))
            .collect::<Result<Vec<_>>>()?
            .join(", "),
        Projection::Count { alias } => format!("COUNT(*) AS \"{}\"", alias.replace('"', "\"\"")),
    };

    out.sql = format!(
        "SELECT {} FROM {}",
        projection,
        quote_identifier(&select.collection)?
    );
    render_where(&select.filter, out)?;

    if let Some(sort) = &select.sort {
        let direction = match sort.direction {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        };
        out.sql.push_str(&format!(
            " ORDER BY {} {}",
            quote_identifier(&sort.field)?,
            direction
        ));
    }

    if let Some(limit) = select.limit {
        out.sql.push_str(&format!(" LIMIT {}", limit));
    }

    Ok(())
}

fn render_insert(insert: &Insert, out: &mut RenderedSql) -> Result<()> {
    if insert.fields.is_empty() {
        return Err(StoreError::ParseError(format!(
            "INSERT INTO {} requires at least one field",
            insert.collection
        )));
    }

    let columns = insert
        .fields
        .iter()
        .map(|(name, _)| quote_identifier(name))
        .collect::<Result<Vec<_>>>()?;
    let placeholders = vec!["?"; columns.len()].join(", ");
    let verb = if insert.replace {
        "INSERT OR REPLACE INTO"
    } else {
        "INSERT INTO"
    };

    out.sql = format!(
        "{} {} ({}) VALUES ({})",
        verb,
        quote_identifier(&insert.collection)?,
        columns.join(", "),
        placeholders
    );
    out.params = insert.fields.iter().map(|(_, v)| v.clone()).collect();
    Ok(())
}

fn render_update(update: &Update, out: &mut RenderedSql) -> Result<()> {
    if update.assignments.is_empty() {
        return Err(StoreError::ParseError(format!(
            "UPDATE {} requires at least one assignment",
            update.collection
        )));
    }

    let mut assignments = Vec::with_capacity(update.assignments.len());
    for (name, value) in &update.assignments {
        assignments.push(format!("{} = ?", quote_identifier(name)?));
        out.params.push(value.clone());
    }

    out.sql = format!(
        "UPDATE {} SET {}",
        quote_identifier(&update.collection)?,
        assignments.join(", ")
    );
    render_where(&update.filter, out)
}

fn render_delete(delete: &Delete, out: &mut RenderedSql) -> Result<()> {
    out.sql = format!("DELETE FROM {}", quote_identifier(&delete.collection)?);
    render_where(&delete.filter, out)
}

fn render_where(filter: &Filter, out: &mut RenderedSql) -> Result<()> {
    if filter.is_empty() {
        return Ok(());
    }

    let clauses = filter
        .conditions()
        .iter()
        .map(|condition| render_condition(condition, &mut out.params))
        .collect::<Result<Vec<_>>>()?;

    out.sql.push_str(" WHERE ");
    out.sql.push_str(&clauses.join(" AND "));
    Ok(())
}

fn render_condition(condition: &Condition, params: &mut Vec<Value>) -> Result<String> {
    match condition {
        Condition::Compare { field, op, value } => {
            params.push(value.clone());
            Ok(format!("{} {} ?", quote_identifier(field)?, op.as_sql()))
        }
        Condition::Like { field, pattern } => {
            params.push(Value::Text(pattern.clone()));
            Ok(format!("{} LIKE ?", quote_identifier(field)?))
        }
        Condition::Any(conditions) => {
            if conditions.is_empty() {
                return Err(StoreError::UnsupportedCondition(
                    "empty disjunction".to_string(),
                ));
            }
            let parts = conditions
                .iter()
                .map(|c| render_condition(c, params))
                .collect::<Result<Vec<_>>>()?;
            Ok(format!("({})", parts.join(" OR ")))
        }
    }
}
