// Translates the single-table CRUD dialect the engine emits into a small
// executable form. Placeholders are numbered in the order they appear.

use crate::core::Value;
use sqlparser::ast as sql_ast;
use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::Parser;

/// Where an operand's value comes from at execution time.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Operand {
    Placeholder(usize),
    Literal(Value),
}

impl Operand {
    pub fn resolve<'a>(&'a self, parameters: &'a [Value]) -> &'a Value {
        match self {
            Operand::Placeholder(position) => &parameters[*position],
            Operand::Literal(value) => value,
        }
    }
}

/// `column = operand`. A conjunction of these forms every WHERE clause.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Condition {
    pub column: String,
    pub operand: Operand,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Projection {
    All,
    Columns(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Command {
    Select {
        table: String,
        projection: Projection,
        filter: Vec<Condition>,
    },
    Insert {
        table: String,
        columns: Vec<String>,
        values: Vec<Operand>,
    },
    Update {
        table: String,
        assignments: Vec<(String, Operand)>,
        filter: Vec<Condition>,
    },
    Delete {
        table: String,
        filter: Vec<Condition>,
    },
}

impl Command {
    pub fn table(&self) -> &str {
        match self {
            Command::Select { table, .. }
            | Command::Insert { table, .. }
            | Command::Update { table, .. }
            | Command::Delete { table, .. } => table,
        }
    }

    /// Every column the statement names, for validation against the table.
    pub fn referenced_columns(&self) -> Vec<&str> {
        fn filter_columns(filter: &[Condition]) -> Vec<&str> {
            filter.iter().map(|c| c.column.as_str()).collect()
        }

        match self {
            Command::Select { projection, filter, .. } => {
                let mut columns = filter_columns(filter);
                if let Projection::Columns(names) = projection {
                    columns.extend(names.iter().map(String::as_str));
                }
                columns
            }
            Command::Insert { columns, .. } => columns.iter().map(String::as_str).collect(),
            Command::Update { assignments, filter, .. } => {
                let mut columns: Vec<&str> = assignments.iter().map(|(c, _)| c.as_str()).collect();
                columns.extend(filter_columns(filter));
                columns
            }
            Command::Delete { filter, .. } => filter_columns(filter),
        }
    }
}

/// A parsed statement and the number of `?` placeholders it binds.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CompiledStatement {
    pub command: Command,
    pub placeholders: usize,
}

pub(crate) fn compile(sql: &str) -> Result<CompiledStatement, String> {
    let dialect = MySqlDialect {};
    let mut statements = Parser::parse_sql(&dialect, sql).map_err(|e| e.to_string())?;
    if statements.len() != 1 {
        return Err(format!("expected one statement, found {}", statements.len()));
    }
    let statement = statements.remove(0);

    let mut compiler = Compiler::default();
    let command = compiler.statement(statement)?;
    Ok(CompiledStatement {
        command,
        placeholders: compiler.placeholders,
    })
}

#[derive(Default)]
struct Compiler {
    placeholders: usize,
}

impl Compiler {
    fn statement(&mut self, statement: sql_ast::Statement) -> Result<Command, String> {
        match statement {
            sql_ast::Statement::Query(query) => self.select(*query),
            sql_ast::Statement::Insert(insert) => self.insert(insert),
            sql_ast::Statement::Update { table, assignments, selection, .. } => {
                let table = table_factor_name(&table.relation)?;
                let assignments = assignments
                    .into_iter()
                    .map(|assign| {
                        let column = match assign.target {
                            sql_ast::AssignmentTarget::ColumnName(name) if name.0.len() == 1 => {
                                unquote(&name.0[0].to_string())
                            }
                            other => return Err(format!("unsupported assignment target {:?}", other)),
                        };
                        Ok((column, self.operand(assign.value)?))
                    })
                    .collect::<Result<Vec<_>, String>>()?;
                let filter = self.filter(selection)?;
                Ok(Command::Update { table, assignments, filter })
            }
            sql_ast::Statement::Delete(delete) => {
                let tables = match delete.from {
                    sql_ast::FromTable::WithFromKeyword(tables) => tables,
                    sql_ast::FromTable::WithoutKeyword(tables) => tables,
                };
                let [source] = tables.as_slice() else {
                    return Err("DELETE must name exactly one table".to_string());
                };
                let table = table_factor_name(&source.relation)?;
                let filter = self.filter(delete.selection)?;
                Ok(Command::Delete { table, filter })
            }
            other => Err(format!("unsupported statement: {}", other)),
        }
    }

    fn select(&mut self, query: sql_ast::Query) -> Result<Command, String> {
        let sql_ast::SetExpr::Select(select) = *query.body else {
            return Err("only plain SELECT queries are supported".to_string());
        };
        let [source] = select.from.as_slice() else {
            return Err("SELECT must read exactly one table".to_string());
        };
        if !source.joins.is_empty() {
            return Err("joins are not supported".to_string());
        }
        let table = table_factor_name(&source.relation)?;

        let projection = match select.projection.as_slice() {
            [sql_ast::SelectItem::Wildcard(_)] => Projection::All,
            items => Projection::Columns(
                items
                    .iter()
                    .map(|item| match item {
                        sql_ast::SelectItem::UnnamedExpr(sql_ast::Expr::Identifier(ident)) => {
                            Ok(ident.value.clone())
                        }
                        other => Err(format!("unsupported select item {}", other)),
                    })
                    .collect::<Result<Vec<_>, String>>()?,
            ),
        };

        let filter = self.filter(select.selection)?;
        Ok(Command::Select { table, projection, filter })
    }

    fn insert(&mut self, insert: sql_ast::Insert) -> Result<Command, String> {
        let table = unquote(&insert.table.to_string());
        let columns: Vec<String> = insert.columns.into_iter().map(|ident| ident.value).collect();

        let Some(source) = insert.source else {
            return Err("INSERT requires a VALUES clause".to_string());
        };
        let sql_ast::SetExpr::Values(values) = *source.body else {
            return Err("only INSERT ... VALUES is supported".to_string());
        };
        let mut rows = values.rows.into_iter();
        let (Some(row), None) = (rows.next(), rows.next()) else {
            return Err("INSERT must carry exactly one row".to_string());
        };
        if row.len() != columns.len() {
            return Err(format!(
                "INSERT names {} columns but supplies {} values",
                columns.len(),
                row.len()
            ));
        }

        let values = row
            .into_iter()
            .map(|expr| self.operand(expr))
            .collect::<Result<Vec<_>, String>>()?;
        Ok(Command::Insert { table, columns, values })
    }

    fn filter(&mut self, selection: Option<sql_ast::Expr>) -> Result<Vec<Condition>, String> {
        let mut conditions = Vec::new();
        if let Some(expr) = selection {
            self.conjunction(expr, &mut conditions)?;
        }
        Ok(conditions)
    }

    fn conjunction(&mut self, expr: sql_ast::Expr, out: &mut Vec<Condition>) -> Result<(), String> {
        match expr {
            sql_ast::Expr::Nested(inner) => self.conjunction(*inner, out),
            sql_ast::Expr::BinaryOp { left, op: sql_ast::BinaryOperator::And, right } => {
                self.conjunction(*left, out)?;
                self.conjunction(*right, out)
            }
            sql_ast::Expr::BinaryOp { left, op: sql_ast::BinaryOperator::Eq, right } => {
                let column = match *left {
                    sql_ast::Expr::Identifier(ident) => ident.value,
                    other => return Err(format!("left side of '=' must be a column, got {}", other)),
                };
                let operand = self.operand(*right)?;
                out.push(Condition { column, operand });
                Ok(())
            }
            other => Err(format!("unsupported predicate {}", other)),
        }
    }

    fn operand(&mut self, expr: sql_ast::Expr) -> Result<Operand, String> {
        match expr {
            sql_ast::Expr::Value(value) => match value.value {
                sql_ast::Value::Placeholder(_) => {
                    let position = self.placeholders;
                    self.placeholders += 1;
                    Ok(Operand::Placeholder(position))
                }
                sql_ast::Value::Number(n, _) => parse_number(&n).map(Operand::Literal),
                sql_ast::Value::SingleQuotedString(s) | sql_ast::Value::DoubleQuotedString(s) => {
                    Ok(Operand::Literal(Value::Text(s)))
                }
                sql_ast::Value::Null => Ok(Operand::Literal(Value::Null)),
                other => Err(format!("unsupported literal {}", other)),
            },
            sql_ast::Expr::UnaryOp { op: sql_ast::UnaryOperator::Minus, expr } => match self.operand(*expr)? {
                Operand::Literal(Value::Integer(i)) => Ok(Operand::Literal(Value::Integer(-i))),
                Operand::Literal(Value::Double(d)) => Ok(Operand::Literal(Value::Double(-d))),
                _ => Err("unary minus applies to numeric literals only".to_string()),
            },
            sql_ast::Expr::Nested(inner) => self.operand(*inner),
            other => Err(format!("unsupported operand {}", other)),
        }
    }
}

fn table_factor_name(factor: &sql_ast::TableFactor) -> Result<String, String> {
    match factor {
        sql_ast::TableFactor::Table { name, .. } => name
            .0
            .last()
            .map(|part| unquote(&part.to_string()))
            .ok_or_else(|| "empty table name".to_string()),
        other => Err(format!("unsupported table reference {}", other)),
    }
}

fn unquote(name: &str) -> String {
    name.trim_matches(|c| c == '`' || c == '"').to_string()
}

fn parse_number(text: &str) -> Result<Value, String> {
    if let Ok(i) = text.parse::<i64>() {
        return Ok(Value::Integer(i));
    }
    text.parse::<f64>()
        .map(Value::Double)
        .map_err(|_| format!("invalid number '{}'", text))
}
