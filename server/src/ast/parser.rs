//! Recursive-descent parser over [`crate::ast::tokenizer`]'s token
//! stream, turning the admin console's small statement language into
//! [`crate::command::Statement`] values. There is no SQL planner
//! here — that's out of scope — so this grammar is
//! deliberately narrow: one statement per call, no subqueries, no
//! joins, a `WHERE` clause limited to a single equality or range bound.
//! A real wire front-end would replace this module with a full SQL
//! parser/planner and hand the dispatcher the same `Statement` tree.

use std::ops::Bound;

use guocedb_storage::catalog::schema::Column;
use guocedb_storage::txn::IsolationLevel;
use guocedb_storage::value::{DataType, Value};

use crate::ast::token_kind::TokenKind;
use crate::ast::tokenizer::{Token, Tokenizer};
use crate::command::{AggFn, Filter, IndexDefStmt, OrderBy, SelectColumns, Statement};

pub type Result<T> = std::result::Result<T, String>;

pub struct Parser<'a> {
    tokens: Vec<Token<'a>>,
    pos: usize,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Result<Self> {
        let tokens = Tokenizer::new(source).collect::<std::result::Result<Vec<_>, String>>()?;
        Ok(Parser { tokens, pos: 0 })
    }

    fn peek(&self) -> &Token<'a> {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn advance(&mut self) -> Token<'a> {
        let tok = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.peek_kind() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token<'a>> {
        if self.peek_kind() == kind {
            Ok(self.advance())
        } else {
            Err(format!("expected {:?}, found {:?} ({:?})", kind, self.peek_kind(), self.peek().text()))
        }
    }

    fn expect_ident(&mut self) -> Result<String> {
        let tok = self.expect(TokenKind::Ident)?;
        Ok(tok.text().to_string())
    }

    /// Eats the top-level statement terminator, if present.
    fn finish(&mut self) -> Result<()> {
        self.eat(TokenKind::SemiColon);
        if self.peek_kind() != TokenKind::EOI {
            return Err(format!("unexpected trailing input: {:?}", self.peek().text()));
        }
        Ok(())
    }

    pub fn parse_statement(&mut self) -> Result<Statement> {
        let stmt = match self.peek_kind() {
            TokenKind::CREATE => self.parse_create()?,
            TokenKind::DROP => self.parse_drop()?,
            TokenKind::RENAME => self.parse_rename_table()?,
            TokenKind::SHOW => self.parse_show()?,
            TokenKind::USE => self.parse_use()?,
            TokenKind::INSERT => self.parse_insert()?,
            TokenKind::UPDATE => self.parse_update()?,
            TokenKind::DELETE => self.parse_delete()?,
            TokenKind::SELECT => self.parse_select()?,
            TokenKind::BEGIN | TokenKind::START => self.parse_begin()?,
            TokenKind::COMMIT => {
                self.advance();
                Statement::Commit
            }
            TokenKind::ROLLBACK => {
                self.advance();
                Statement::Rollback
            }
            TokenKind::SET => self.parse_set()?,
            TokenKind::Ident if self.peek().text().eq_ignore_ascii_case("ping") => {
                self.advance();
                Statement::Ping
            }
            TokenKind::Ident if self.peek().text().eq_ignore_ascii_case("quit") || self.peek().text().eq_ignore_ascii_case("exit") => {
                self.advance();
                Statement::Quit
            }
            other => return Err(format!("unrecognised statement starting with {:?} ({:?})", other, self.peek().text())),
        };
        self.finish()?;
        Ok(stmt)
    }

    // --- DDL ---

    fn parse_if_not_exists(&mut self) -> bool {
        if self.peek_kind() == TokenKind::IF {
            self.advance();
            let _ = self.eat(TokenKind::NOT);
            let _ = self.eat(TokenKind::EXISTS);
            true
        } else {
            false
        }
    }

    fn parse_if_exists(&mut self) -> bool {
        if self.peek_kind() == TokenKind::IF {
            self.advance();
            let _ = self.eat(TokenKind::EXISTS);
            true
        } else {
            false
        }
    }

    fn parse_create(&mut self) -> Result<Statement> {
        self.expect(TokenKind::CREATE)?;
        let unique = self.eat(TokenKind::UNIQUE);
        match self.peek_kind() {
            TokenKind::DATABASE => {
                self.advance();
                let if_not_exists = self.parse_if_not_exists();
                let name = self.expect_ident()?;
                Ok(Statement::CreateDatabase { name, if_not_exists })
            }
            TokenKind::TABLE => {
                self.advance();
                let if_not_exists = self.parse_if_not_exists();
                let name = self.expect_ident()?;
                let (columns, primary_key, indexes) = self.parse_column_defs()?;
                Ok(Statement::CreateTable { name, columns, primary_key, indexes, if_not_exists })
            }
            TokenKind::INDEX => {
                self.advance();
                let if_not_exists = self.parse_if_not_exists();
                let index_name = self.expect_ident()?;
                self.expect(TokenKind::ON)?;
                let table = self.expect_ident()?;
                let columns = self.parse_column_name_list()?;
                Ok(Statement::CreateIndex { table, index: IndexDefStmt { name: index_name, columns, unique }, if_not_exists })
            }
            other => Err(format!("expected DATABASE, TABLE or INDEX after CREATE, found {:?}", other)),
        }
    }

    fn parse_drop(&mut self) -> Result<Statement> {
        self.expect(TokenKind::DROP)?;
        match self.peek_kind() {
            TokenKind::DATABASE => {
                self.advance();
                let if_exists = self.parse_if_exists();
                let name = self.expect_ident()?;
                Ok(Statement::DropDatabase { name, if_exists })
            }
            TokenKind::TABLE => {
                self.advance();
                let if_exists = self.parse_if_exists();
                let name = self.expect_ident()?;
                Ok(Statement::DropTable { name, if_exists })
            }
            TokenKind::INDEX => {
                self.advance();
                let if_exists = self.parse_if_exists();
                let name = self.expect_ident()?;
                self.expect(TokenKind::ON)?;
                let table = self.expect_ident()?;
                Ok(Statement::DropIndex { table, name, if_exists })
            }
            other => Err(format!("expected DATABASE, TABLE or INDEX after DROP, found {:?}", other)),
        }
    }

    fn parse_rename_table(&mut self) -> Result<Statement> {
        self.expect(TokenKind::RENAME)?;
        self.expect(TokenKind::TABLE)?;
        let old = self.expect_ident()?;
        self.expect(TokenKind::TO)?;
        let new = self.expect_ident()?;
        Ok(Statement::RenameTable { old, new })
    }

    fn parse_show(&mut self) -> Result<Statement> {
        self.expect(TokenKind::SHOW)?;
        match self.peek_kind() {
            TokenKind::DATABASES => {
                self.advance();
                Ok(Statement::ShowDatabases)
            }
            TokenKind::TABLES => {
                self.advance();
                Ok(Statement::ShowTables)
            }
            other => Err(format!("expected DATABASES or TABLES after SHOW, found {:?}", other)),
        }
    }

    fn parse_use(&mut self) -> Result<Statement> {
        self.expect(TokenKind::USE)?;
        let name = self.expect_ident()?;
        Ok(Statement::UseDatabase { name })
    }

    /// `(col type [constraints], ..., PRIMARY KEY (cols), UNIQUE (cols))`
    fn parse_column_defs(&mut self) -> Result<(Vec<Column>, Vec<String>, Vec<IndexDefStmt>)> {
        self.expect(TokenKind::LParen)?;
        let mut columns = Vec::new();
        let mut primary_key = Vec::new();
        let mut indexes = Vec::new();

        loop {
            if self.peek_kind() == TokenKind::PRIMARY {
                self.advance();
                self.expect(TokenKind::KEY)?;
                primary_key = self.parse_column_name_list()?;
            } else if self.peek_kind() == TokenKind::UNIQUE {
                self.advance();
                let _ = self.eat(TokenKind::KEY);
                let cols = self.parse_column_name_list()?;
                indexes.push(IndexDefStmt { name: format!("idx_{}", cols.join("_")), columns: cols, unique: true });
            } else {
                let name = self.expect_ident()?;
                let data_type = self.parse_data_type()?;
                let mut nullable = true;
                let mut auto_increment = false;
                let mut is_pk = false;
                loop {
                    match self.peek_kind() {
                        TokenKind::NOT => {
                            self.advance();
                            self.expect(TokenKind::NULL)?;
                            nullable = false;
                        }
                        TokenKind::NULL => {
                            self.advance();
                            nullable = true;
                        }
                        TokenKind::AUTO_INCREMENT => {
                            self.advance();
                            auto_increment = true;
                        }
                        TokenKind::PRIMARY => {
                            self.advance();
                            self.expect(TokenKind::KEY)?;
                            is_pk = true;
                            nullable = false;
                        }
                        _ => break,
                    }
                }
                if is_pk {
                    primary_key.push(name.clone());
                }
                columns.push(Column { name, data_type, nullable, default: None, auto_increment });
            }

            if self.eat(TokenKind::Comma) {
                continue;
            }
            break;
        }

        self.expect(TokenKind::RParen)?;
        Ok((columns, primary_key, indexes))
    }

    fn parse_column_name_list(&mut self) -> Result<Vec<String>> {
        self.expect(TokenKind::LParen)?;
        let mut names = vec![self.expect_ident()?];
        while self.eat(TokenKind::Comma) {
            names.push(self.expect_ident()?);
        }
        self.expect(TokenKind::RParen)?;
        Ok(names)
    }

    fn parse_data_type(&mut self) -> Result<DataType> {
        let kind = self.peek_kind();
        let data_type = match kind {
            TokenKind::TINYINT => DataType::Int8,
            TokenKind::SMALLINT => DataType::Int16,
            TokenKind::INT => DataType::Int32,
            TokenKind::BIGINT => DataType::Int64,
            TokenKind::BOOLEAN => DataType::Bool,
            TokenKind::FLOAT => DataType::Float32,
            TokenKind::DOUBLE => DataType::Float64,
            TokenKind::TEXT => DataType::String,
            TokenKind::VARBINARY => DataType::Bytes,
            TokenKind::VARCHAR => DataType::String,
            TokenKind::DECIMAL => DataType::Decimal { precision: 0, scale: 0 },
            other => return Err(format!("expected a column type, found {:?}", other)),
        };
        self.advance();

        // VARCHAR(n), DECIMAL(p, s): size arguments are parsed and, for
        // DECIMAL, threaded through; VARCHAR's length is a display-width
        // hint the storage core doesn't enforce (the value system
        // has no bounded-length string type).
        if self.peek_kind() == TokenKind::LParen {
            self.advance();
            let first = self.parse_integer_literal()?;
            let second = if self.eat(TokenKind::Comma) { Some(self.parse_integer_literal()?) } else { None };
            self.expect(TokenKind::RParen)?;
            if let DataType::Decimal { .. } = data_type {
                return Ok(DataType::Decimal { precision: first as u8, scale: second.unwrap_or(0) });
            }
        }
        Ok(data_type)
    }

    fn parse_integer_literal(&mut self) -> Result<i64> {
        let tok = self.expect(TokenKind::LiteralInteger)?;
        tok.text().parse::<i64>().map_err(|e| e.to_string())
    }

    // --- DML ---

    fn parse_insert(&mut self) -> Result<Statement> {
        self.expect(TokenKind::INSERT)?;
        self.expect(TokenKind::INTO)?;
        let table = self.expect_ident()?;
        self.expect(TokenKind::VALUES)?;

        let mut rows = vec![self.parse_value_tuple()?];
        while self.eat(TokenKind::Comma) {
            rows.push(self.parse_value_tuple()?);
        }
        Ok(Statement::Insert { table, rows })
    }

    fn parse_value_tuple(&mut self) -> Result<Vec<Value>> {
        self.expect(TokenKind::LParen)?;
        let mut values = vec![self.parse_value_literal()?];
        while self.eat(TokenKind::Comma) {
            values.push(self.parse_value_literal()?);
        }
        self.expect(TokenKind::RParen)?;
        Ok(values)
    }

    fn parse_value_literal(&mut self) -> Result<Value> {
        let negative = self.eat(TokenKind::Minus);
        let tok = self.advance();
        let value = match tok.kind {
            TokenKind::LiteralInteger => {
                let n: i64 = tok.text().parse().map_err(|e: std::num::ParseIntError| e.to_string())?;
                Value::Int64(if negative { -n } else { n })
            }
            TokenKind::LiteralFloat => {
                let f: f64 = tok.text().parse().map_err(|e: std::num::ParseFloatError| e.to_string())?;
                Value::Float64(if negative { -f } else { f })
            }
            TokenKind::QuotedString => Value::String(unquote(tok.text())),
            TokenKind::NULL => Value::Null,
            TokenKind::Ident if tok.text().eq_ignore_ascii_case("true") => Value::Bool(true),
            TokenKind::Ident if tok.text().eq_ignore_ascii_case("false") => Value::Bool(false),
            other => return Err(format!("expected a literal value, found {:?} ({:?})", other, tok.text())),
        };
        Ok(value)
    }

    fn parse_update(&mut self) -> Result<Statement> {
        self.expect(TokenKind::UPDATE)?;
        let table = self.expect_ident()?;
        self.expect(TokenKind::SET)?;

        let mut assignments = vec![self.parse_assignment()?];
        while self.eat(TokenKind::Comma) {
            assignments.push(self.parse_assignment()?);
        }
        let filter = self.parse_optional_where()?;
        Ok(Statement::Update { table, assignments, filter })
    }

    fn parse_assignment(&mut self) -> Result<(String, Value)> {
        let column = self.expect_ident()?;
        self.expect(TokenKind::Eq)?;
        let value = self.parse_value_literal()?;
        Ok((column, value))
    }

    fn parse_delete(&mut self) -> Result<Statement> {
        self.expect(TokenKind::DELETE)?;
        self.expect(TokenKind::FROM)?;
        let table = self.expect_ident()?;
        let filter = self.parse_optional_where()?;
        Ok(Statement::Delete { table, filter })
    }

    fn parse_select(&mut self) -> Result<Statement> {
        self.expect(TokenKind::SELECT)?;

        let (columns, aggregate) = self.parse_select_list()?;
        self.expect(TokenKind::FROM)?;
        let table = self.expect_ident()?;
        let filter = self.parse_optional_where()?;

        let order_by = if self.eat(TokenKind::ORDER) {
            self.expect(TokenKind::BY)?;
            let column = self.expect_ident()?;
            let descending = if self.eat(TokenKind::DESC) {
                true
            } else {
                let _ = self.eat(TokenKind::ASC);
                false
            };
            Some(OrderBy { column, descending })
        } else {
            None
        };

        let limit = if self.eat(TokenKind::LIMIT) { Some(self.parse_integer_literal()? as u64) } else { None };
        let offset = if self.eat(TokenKind::OFFSET) { Some(self.parse_integer_literal()? as u64) } else { None };

        Ok(Statement::Select { table, columns, filter, aggregate, order_by, limit, offset })
    }

    fn parse_select_list(&mut self) -> Result<(SelectColumns, Option<(AggFn, String)>)> {
        let agg = match self.peek_kind() {
            TokenKind::SUM => Some(AggFn::Sum),
            TokenKind::COUNT => Some(AggFn::Count),
            TokenKind::AVG => Some(AggFn::Avg),
            TokenKind::MIN => Some(AggFn::Min),
            TokenKind::MAX => Some(AggFn::Max),
            _ => None,
        };
        if let Some(agg) = agg {
            self.advance();
            self.expect(TokenKind::LParen)?;
            let column = if self.eat(TokenKind::Star) { "*".to_string() } else { self.expect_ident()? };
            self.expect(TokenKind::RParen)?;
            return Ok((SelectColumns::All, Some((agg, column))));
        }

        if self.eat(TokenKind::Star) {
            return Ok((SelectColumns::All, None));
        }

        let mut names = vec![self.expect_ident()?];
        while self.eat(TokenKind::Comma) {
            names.push(self.expect_ident()?);
        }
        Ok((SelectColumns::Named(names), None))
    }

    fn parse_optional_where(&mut self) -> Result<Option<Filter>> {
        if !self.eat(TokenKind::WHERE) {
            return Ok(None);
        }
        let column = self.expect_ident()?;
        match self.peek_kind() {
            TokenKind::Eq => {
                self.advance();
                let value = self.parse_value_literal()?;
                Ok(Some(Filter::Eq { column, value }))
            }
            TokenKind::Gte => {
                self.advance();
                let lo = self.parse_value_literal()?;
                Ok(Some(Filter::Range { column, lo: Bound::Included(lo), hi: Bound::Unbounded }))
            }
            TokenKind::Lte => {
                self.advance();
                let hi = self.parse_value_literal()?;
                Ok(Some(Filter::Range { column, lo: Bound::Unbounded, hi: Bound::Included(hi) }))
            }
            TokenKind::Gt => {
                self.advance();
                let lo = self.parse_value_literal()?;
                Ok(Some(Filter::Range { column, lo: Bound::Excluded(lo), hi: Bound::Unbounded }))
            }
            TokenKind::Lt => {
                self.advance();
                let hi = self.parse_value_literal()?;
                Ok(Some(Filter::Range { column, lo: Bound::Unbounded, hi: Bound::Excluded(hi) }))
            }
            other => Err(format!("expected a comparison operator in WHERE, found {:?}", other)),
        }
    }

    // --- Transaction control ---

    fn parse_begin(&mut self) -> Result<Statement> {
        if self.eat(TokenKind::START) {
            self.expect(TokenKind::TRANSACTION)?;
        } else {
            self.expect(TokenKind::BEGIN)?;
        }
        Ok(Statement::Begin { isolation: None })
    }

    fn parse_set(&mut self) -> Result<Statement> {
        self.expect(TokenKind::SET)?;
        if self.eat(TokenKind::AUTOCOMMIT) {
            self.expect(TokenKind::Eq)?;
            let tok = self.expect(TokenKind::LiteralInteger)?;
            return Ok(Statement::SetAutocommit(tok.text() != "0"));
        }
        self.expect(TokenKind::TRANSACTION)?;
        self.expect(TokenKind::ISOLATION)?;
        self.expect(TokenKind::LEVEL)?;
        let level = match self.peek_kind() {
            TokenKind::READ => {
                self.advance();
                if self.eat(TokenKind::UNCOMMITTED) {
                    IsolationLevel::ReadUncommitted
                } else {
                    self.expect(TokenKind::COMMITTED)?;
                    IsolationLevel::ReadCommitted
                }
            }
            TokenKind::REPEATABLE => {
                self.advance();
                self.expect(TokenKind::READ)?;
                IsolationLevel::RepeatableRead
            }
            TokenKind::SERIALIZABLE => {
                self.advance();
                IsolationLevel::Serializable
            }
            other => return Err(format!("expected an isolation level, found {:?}", other)),
        };
        Ok(Statement::SetIsolationLevel(level))
    }
}

fn unquote(raw: &str) -> String {
    let inner = &raw[1..raw.len() - 1];
    inner.replace("''", "'").replace("\\'", "'").replace("\\\"", "\"")
}

/// Parses one statement out of a single line of admin-console input.
pub fn parse(source: &str) -> Result<Statement> {
    Parser::new(source)?.parse_statement()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_create_database() {
        let stmt = parse("CREATE DATABASE shop;").unwrap();
        assert!(matches!(stmt, Statement::CreateDatabase { name, if_not_exists: false } if name == "shop"));
    }

    #[test]
    fn parses_create_table_with_primary_key_and_inline_not_null() {
        let stmt = parse("CREATE TABLE users (id INT PRIMARY KEY, name VARCHAR(100) NOT NULL)").unwrap();
        match stmt {
            Statement::CreateTable { name, columns, primary_key, .. } => {
                assert_eq!(name, "users");
                assert_eq!(columns.len(), 2);
                assert_eq!(primary_key, vec!["id".to_string()]);
                assert!(!columns[1].nullable);
            }
            other => panic!("unexpected statement: {:?}", other),
        }
    }

    #[test]
    fn parses_insert_with_multiple_rows() {
        let stmt = parse("INSERT INTO users VALUES (1, 'Alice'), (2, 'Bob')").unwrap();
        match stmt {
            Statement::Insert { table, rows } => {
                assert_eq!(table, "users");
                assert_eq!(rows.len(), 2);
            }
            other => panic!("unexpected statement: {:?}", other),
        }
    }

    #[test]
    fn parses_select_with_where_order_limit() {
        let stmt = parse("SELECT * FROM users WHERE id = 1 ORDER BY name DESC LIMIT 10").unwrap();
        match stmt {
            Statement::Select { table, filter, order_by, limit, .. } => {
                assert_eq!(table, "users");
                assert!(filter.is_some());
                assert!(order_by.unwrap().descending);
                assert_eq!(limit, Some(10));
            }
            other => panic!("unexpected statement: {:?}", other),
        }
    }

    #[test]
    fn parses_sum_aggregate() {
        let stmt = parse("SELECT SUM(balance) FROM accounts").unwrap();
        match stmt {
            Statement::Select { aggregate: Some((AggFn::Sum, column)), .. } => assert_eq!(column, "balance"),
            other => panic!("unexpected statement: {:?}", other),
        }
    }

    #[test]
    fn parses_set_isolation_level() {
        let stmt = parse("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE").unwrap();
        assert!(matches!(stmt, Statement::SetIsolationLevel(IsolationLevel::Serializable)));
    }

    #[test]
    fn parses_begin_commit_rollback() {
        assert!(matches!(parse("BEGIN").unwrap(), Statement::Begin { .. }));
        assert!(matches!(parse("START TRANSACTION").unwrap(), Statement::Begin { .. }));
        assert!(matches!(parse("COMMIT").unwrap(), Statement::Commit));
        assert!(matches!(parse("ROLLBACK").unwrap(), Statement::Rollback));
    }
}
