//! SQL compilation of query options.
//!
//! Translates [`QueryOptions`] into a SELECT (or COUNT) statement with
//! numbered placeholders. The listed entity's table is referenced by its own
//! name; each joined association is aliased by the association name, and its
//! columns come back as `"association.column"`.

use rusqlite::types::{ToSqlOutput, Value, ValueRef};

use crate::error::{BackendError, ListingError, ListingResult, ValidationError};
use crate::query::{Operator, OperatorCatalog};
use crate::schema::EntitySchema;
use crate::types::{Condition, FieldPath, Predicate, QueryOptions, Scalar, SortDirection};

/// A fragment of SQL with bound parameters.
#[derive(Debug, Clone)]
pub struct SqlFragment {
    /// The SQL text.
    pub sql: String,
    /// Bound parameter values, in placeholder order.
    pub params: Vec<SqlParam>,
}

/// A bound SQL parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    /// String parameter.
    String(String),
    /// Integer parameter.
    Integer(i64),
    /// Float parameter.
    Float(f64),
    /// Null parameter.
    Null,
}

impl SqlParam {
    /// Creates a string parameter.
    pub fn string(s: impl Into<String>) -> Self {
        SqlParam::String(s.into())
    }
}

impl From<&Scalar> for SqlParam {
    fn from(scalar: &Scalar) -> Self {
        match scalar {
            Scalar::Null => SqlParam::Null,
            Scalar::Boolean(b) => SqlParam::Integer(i64::from(*b)),
            Scalar::Integer(i) => SqlParam::Integer(*i),
            Scalar::Float(f) => SqlParam::Float(*f),
            Scalar::Text(s) => SqlParam::String(s.clone()),
        }
    }
}

impl rusqlite::ToSql for SqlParam {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlParam::String(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            SqlParam::Integer(i) => ToSqlOutput::Owned(Value::Integer(*i)),
            SqlParam::Float(f) => ToSqlOutput::Owned(Value::Real(*f)),
            SqlParam::Null => ToSqlOutput::Owned(Value::Null),
        })
    }
}

impl SqlFragment {
    /// Creates a fragment without parameters.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Parameters as a slice of trait objects, ready for rusqlite.
    pub fn bind(&self) -> Vec<&dyn rusqlite::ToSql> {
        self.params.iter().map(|p| p as &dyn rusqlite::ToSql).collect()
    }
}

/// Compiles query options for one entity.
#[derive(Debug, Clone, Copy)]
pub struct SqlCompiler<'a> {
    catalog: &'a dyn OperatorCatalog,
    schema: &'a EntitySchema,
}

impl<'a> SqlCompiler<'a> {
    /// Creates a compiler.
    pub fn new(catalog: &'a dyn OperatorCatalog, schema: &'a EntitySchema) -> Self {
        Self { catalog, schema }
    }

    /// `SELECT COUNT(*)` over the filtered, joined rows.
    pub fn count(&self, options: &QueryOptions) -> ListingResult<SqlFragment> {
        let mut params = Vec::new();
        let mut sql = format!("SELECT COUNT(*) FROM {}", self.from_clause(options));
        self.push_where(options, &mut sql, &mut params)?;
        Ok(SqlFragment { sql, params })
    }

    /// The page fetch: columns, joins, filter, order and pagination.
    pub fn select(&self, options: &QueryOptions) -> ListingResult<SqlFragment> {
        let mut params = Vec::new();
        let mut sql = format!(
            "SELECT {} FROM {}",
            self.select_list(options).join(", "),
            self.from_clause(options)
        );
        self.push_where(options, &mut sql, &mut params)?;

        let order = self.build_order_by(options);
        if !order.is_empty() {
            sql.push(' ');
            sql.push_str(&order);
        }
        let limit = self.build_limit(options);
        if !limit.is_empty() {
            sql.push(' ');
            sql.push_str(&limit);
        }
        Ok(SqlFragment { sql, params })
    }

    fn q(&self, ident: &str) -> String {
        self.catalog.quote_identifier(ident)
    }

    fn column(&self, path: &FieldPath) -> String {
        let owner = path.association.as_deref().unwrap_or(&self.schema.table);
        format!("{}.{}", self.q(owner), self.q(&path.field))
    }

    fn select_list(&self, options: &QueryOptions) -> Vec<String> {
        let local: Vec<&str> = match &options.attributes {
            Some(attributes) => attributes.iter().map(String::as_str).collect(),
            None => self.schema.stored_fields().map(|f| f.name.as_str()).collect(),
        };

        let mut columns: Vec<String> = local
            .into_iter()
            .map(|name| format!("{} AS {}", self.column(&FieldPath::local(name)), self.q(name)))
            .collect();

        for join in &options.includes {
            for attribute in &join.attributes {
                columns.push(format!(
                    "{} AS {}",
                    self.column(&FieldPath::joined(&join.association, attribute)),
                    self.q(&format!("{}.{}", join.association, attribute))
                ));
            }
        }
        columns
    }

    fn from_clause(&self, options: &QueryOptions) -> String {
        let mut from = self.q(&self.schema.table);
        for join in &options.includes {
            from.push_str(&format!(
                " LEFT OUTER JOIN {} AS {} ON {} = {}",
                self.q(&join.table),
                self.q(&join.association),
                self.column(&FieldPath::joined(&join.association, &join.target_key)),
                self.column(&FieldPath::local(&join.foreign_key)),
            ));
        }
        from
    }

    fn push_where(
        &self,
        options: &QueryOptions,
        sql: &mut String,
        params: &mut Vec<SqlParam>,
    ) -> ListingResult<()> {
        let mut predicate = options.where_clause.to_predicate();
        if let Some(scope) = &options.scope {
            let scoped = self.schema.scopes.get(scope).ok_or_else(|| {
                ListingError::Validation(ValidationError::UnknownScope {
                    entity: self.schema.name.clone(),
                    scope: scope.clone(),
                })
            })?;
            predicate = scoped.clone().and(predicate);
        }

        if !predicate.is_neutral() {
            let condition = self.compile_predicate(&predicate, params)?;
            sql.push_str(" WHERE ");
            sql.push_str(&condition);
        }
        Ok(())
    }

    /// Compiles a predicate tree, appending its bound values to `params`.
    pub fn compile_predicate(
        &self,
        predicate: &Predicate,
        params: &mut Vec<SqlParam>,
    ) -> ListingResult<String> {
        match predicate {
            Predicate::And(children) => self.compile_group(children, Operator::And, "1 = 1", params),
            Predicate::Or(children) => self.compile_group(children, Operator::Or, "1 = 0", params),
            Predicate::Not(inner) => Ok(format!(
                "{} ({})",
                self.catalog.token(Operator::Not),
                self.compile_predicate(inner, params)?
            )),
            Predicate::Leaf { path, condition } => {
                Ok(self.compile_condition(&self.column(path), condition, params))
            }
            Predicate::Raw { sql, params: values } => {
                Ok(format!("({})", self.renumber(sql, values, params)?))
            }
        }
    }

    fn compile_group(
        &self,
        children: &[Predicate],
        operator: Operator,
        empty: &str,
        params: &mut Vec<SqlParam>,
    ) -> ListingResult<String> {
        if children.is_empty() {
            return Ok(empty.to_string());
        }
        let parts = children
            .iter()
            .map(|child| self.compile_predicate(child, params).map(|sql| format!("({})", sql)))
            .collect::<ListingResult<Vec<_>>>()?;
        Ok(parts.join(&format!(" {} ", self.catalog.token(operator))))
    }

    fn bind(&self, value: &Scalar, params: &mut Vec<SqlParam>) -> String {
        params.push(SqlParam::from(value));
        self.catalog.placeholder(params.len())
    }

    fn compile_condition(
        &self,
        column: &str,
        condition: &Condition,
        params: &mut Vec<SqlParam>,
    ) -> String {
        let token = |op| self.catalog.token(op);
        match condition {
            Condition::Eq(Scalar::Null) | Condition::IsNull => {
                format!("{} {} NULL", column, token(Operator::Is))
            }
            Condition::Ne(Scalar::Null) | Condition::IsNotNull => {
                format!("{} {} NULL", column, token(Operator::IsNot))
            }
            Condition::Eq(v) => format!("{} {} {}", column, token(Operator::Eq), self.bind(v, params)),
            Condition::Ne(v) => format!("{} {} {}", column, token(Operator::Ne), self.bind(v, params)),
            Condition::Gt(v) => format!("{} {} {}", column, token(Operator::Gt), self.bind(v, params)),
            Condition::Gte(v) => {
                format!("{} {} {}", column, token(Operator::Gte), self.bind(v, params))
            }
            Condition::Lt(v) => format!("{} {} {}", column, token(Operator::Lt), self.bind(v, params)),
            Condition::Lte(v) => {
                format!("{} {} {}", column, token(Operator::Lte), self.bind(v, params))
            }
            Condition::Like(pattern) => format!(
                "{} {} {} ESCAPE '\\'",
                column,
                token(Operator::Like),
                self.bind(&Scalar::text(pattern.clone()), params)
            ),
            Condition::NotLike(pattern) => format!(
                "{} {} {} ESCAPE '\\'",
                column,
                token(Operator::NotLike),
                self.bind(&Scalar::text(pattern.clone()), params)
            ),
            Condition::Within { start, end } => format!(
                "({} {} {} {} {} {} {})",
                column,
                token(Operator::Gte),
                self.bind(start, params),
                token(Operator::And),
                column,
                token(Operator::Lt),
                self.bind(end, params)
            ),
            Condition::In(values) if values.is_empty() => "1 = 0".to_string(),
            Condition::In(values) => {
                // One JSON array parameter, however long the list.
                let list = serde_json::Value::Array(values.iter().map(json_value).collect());
                params.push(SqlParam::String(list.to_string()));
                format!(
                    "{} {} (SELECT value FROM json_each({}))",
                    column,
                    token(Operator::In),
                    self.catalog.placeholder(params.len())
                )
            }
        }
    }

    /// Rewrites the bare `?` placeholders of a raw fragment into numbered ones.
    fn renumber(
        &self,
        sql: &str,
        values: &[Scalar],
        params: &mut Vec<SqlParam>,
    ) -> ListingResult<String> {
        let mut out = String::with_capacity(sql.len());
        let mut quote: Option<char> = None;
        let mut values = values.iter();
        let mut chars = sql.chars().peekable();

        while let Some(c) = chars.next() {
            match (quote, c) {
                (Some(q), c) if c == q => quote = None,
                (None, '\'' | '"') => quote = Some(c),
                (None, '?') if !chars.peek().is_some_and(|n| n.is_ascii_digit()) => {
                    let value = values.next().ok_or_else(|| raw_arity_error(sql))?;
                    out.push_str(&self.bind(value, params));
                    continue;
                }
                _ => {}
            }
            out.push(c);
        }

        if values.next().is_some() {
            return Err(raw_arity_error(sql));
        }
        Ok(out)
    }

    /// `ORDER BY` clause, empty without order terms.
    pub fn build_order_by(&self, options: &QueryOptions) -> String {
        if options.order.is_empty() {
            return String::new();
        }
        let clauses: Vec<String> = options
            .order
            .iter()
            .map(|o| {
                let dir = match o.direction {
                    SortDirection::Ascending => "ASC",
                    SortDirection::Descending => "DESC",
                };
                format!("{} {}", self.column(&o.path), dir)
            })
            .collect();
        format!("ORDER BY {}", clauses.join(", "))
    }

    /// `LIMIT`/`OFFSET` clause, empty without pagination.
    pub fn build_limit(&self, options: &QueryOptions) -> String {
        match (options.limit, options.offset) {
            (Some(limit), Some(offset)) if offset > 0 => format!("LIMIT {} OFFSET {}", limit, offset),
            (Some(limit), _) => format!("LIMIT {}", limit),
            (None, Some(offset)) if offset > 0 => format!("LIMIT -1 OFFSET {}", offset),
            (None, _) => String::new(),
        }
    }
}

fn json_value(scalar: &Scalar) -> serde_json::Value {
    use serde_json::Value as Json;
    match scalar {
        Scalar::Null => Json::Null,
        Scalar::Boolean(b) => Json::from(i64::from(*b)),
        Scalar::Integer(i) => Json::from(*i),
        Scalar::Float(f) => Json::from(*f),
        Scalar::Text(s) => Json::from(s.as_str()),
    }
}

fn raw_arity_error(sql: &str) -> ListingError {
    ListingError::Backend(BackendError::QueryError {
        message: format!("parameter count mismatch in raw predicate: {}", sql),
    })
}
