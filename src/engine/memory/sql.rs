//! Statement parser for the in-memory engine.
//!
//! Covers the statement subset produced by the query builders and the table
//! provisioning DDL. Anything else is a syntax error.

use serde::{Deserialize, Serialize};

use crate::engine::{EngineError, SqlValue};
use crate::query::ComparisonOperator;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Param(String),
    Number(i64),
    Str(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Semicolon,
    Star,
    Op(ComparisonOperator),
}

fn tokenize(input: &str) -> Result<Vec<Token>, EngineError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            ';' => {
                tokens.push(Token::Semicolon);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '=' => {
                tokens.push(Token::Op(ComparisonOperator::Eq));
                i += 1;
            }
            '<' | '>' => {
                let symbol: String = if chars.get(i + 1) == Some(&'=') {
                    i += 2;
                    [c, '='].iter().collect()
                } else {
                    i += 1;
                    c.to_string()
                };
                let op = ComparisonOperator::from_symbol(&symbol)
                    .ok_or_else(|| EngineError::Syntax(format!("unsupported operator {}", symbol)))?;
                tokens.push(Token::Op(op));
            }
            '@' => {
                let start = i + 1;
                i = start;
                while i < chars.len() && is_ident_char(chars[i]) {
                    i += 1;
                }
                if i == start {
                    return Err(EngineError::Syntax("empty parameter name".to_string()));
                }
                tokens.push(Token::Param(chars[start..i].iter().collect()));
            }
            '\'' => {
                let start = i + 1;
                i = start;
                while i < chars.len() && chars[i] != '\'' {
                    i += 1;
                }
                if i >= chars.len() {
                    return Err(EngineError::Syntax("unterminated string literal".to_string()));
                }
                tokens.push(Token::Str(chars[start..i].iter().collect()));
                i += 1;
            }
            c if c.is_ascii_digit() || (c == '-' && chars.get(i + 1).is_some_and(|d| d.is_ascii_digit())) => {
                let start = i;
                i += 1;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let value = text
                    .parse::<i64>()
                    .map_err(|e| EngineError::Syntax(format!("invalid number {}: {}", text, e)))?;
                tokens.push(Token::Number(value));
            }
            c if is_ident_char(c) => {
                let start = i;
                while i < chars.len() && (is_ident_char(chars[i]) || chars[i] == '.') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => {
                return Err(EngineError::Syntax(format!("unexpected character '{}'", other)));
            }
        }
    }

    Ok(tokens)
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Integer,
    Varchar,
    Blob,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub kind: ColumnType,
    pub max_len: Option<usize>,
    pub auto_increment: bool,
    pub not_null: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateTable {
    pub name: String,
    pub if_not_exists: bool,
    pub columns: Vec<ColumnDef>,
    pub primary_key: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateIndex {
    pub table: String,
    pub columns: Vec<String>,
    pub unique: bool,
    pub if_not_exists: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    pub table: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Operand>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    Count,
    All,
    Columns(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub table: String,
    pub left: String,
    pub right: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub projection: Projection,
    pub from: String,
    pub join: Option<Join>,
    pub filter: Option<Expr>,
    pub order_by: Option<(String, bool)>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Column(String),
    Param(String),
    Literal(SqlValue),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Compare {
        left: Operand,
        operator: ComparisonOperator,
        right: Operand,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Begin,
    Commit,
    CreateTable(CreateTable),
    CreateIndex(CreateIndex),
    Insert(Insert),
    Select(Select),
}

/// Parse a script of one or more statements. Semicolons between statements
/// are optional.
pub fn parse_script(input: &str) -> Result<Vec<Statement>, EngineError> {
    let mut parser = Parser {
        tokens: tokenize(input)?,
        pos: 0,
    };
    let mut statements = Vec::new();
    loop {
        while parser.eat(&Token::Semicolon) {}
        if parser.at_end() {
            break;
        }
        statements.push(parser.statement()?);
    }
    Ok(statements)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Result<Token, EngineError> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| EngineError::Syntax("unexpected end of statement".to_string()))?;
        self.pos += 1;
        Ok(token)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token) -> Result<(), EngineError> {
        let found = self.next()?;
        if found != token {
            return Err(EngineError::Syntax(format!(
                "expected {:?}, found {:?}",
                token, found
            )));
        }
        Ok(())
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(word)) if word.eq_ignore_ascii_case(keyword))
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.peek_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), EngineError> {
        if !self.eat_keyword(keyword) {
            return Err(EngineError::Syntax(format!(
                "expected {}, found {:?}",
                keyword,
                self.peek()
            )));
        }
        Ok(())
    }

    fn ident(&mut self) -> Result<String, EngineError> {
        match self.next()? {
            Token::Ident(name) => Ok(name),
            other => Err(EngineError::Syntax(format!(
                "expected identifier, found {:?}",
                other
            ))),
        }
    }

    fn number(&mut self) -> Result<i64, EngineError> {
        match self.next()? {
            Token::Number(n) => Ok(n),
            other => Err(EngineError::Syntax(format!(
                "expected number, found {:?}",
                other
            ))),
        }
    }

    fn ident_list(&mut self) -> Result<Vec<String>, EngineError> {
        self.expect(Token::LParen)?;
        let mut names = vec![self.ident()?];
        while self.eat(&Token::Comma) {
            names.push(self.ident()?);
        }
        self.expect(Token::RParen)?;
        Ok(names)
    }

    fn if_not_exists(&mut self) -> Result<bool, EngineError> {
        if self.eat_keyword("IF") {
            self.expect_keyword("NOT")?;
            self.expect_keyword("EXISTS")?;
            return Ok(true);
        }
        Ok(false)
    }

    fn statement(&mut self) -> Result<Statement, EngineError> {
        if self.eat_keyword("BEGIN") {
            self.eat_keyword("TRANSACTION");
            return Ok(Statement::Begin);
        }
        if self.eat_keyword("COMMIT") {
            return Ok(Statement::Commit);
        }
        if self.eat_keyword("CREATE") {
            if self.eat_keyword("TABLE") {
                return self.create_table();
            }
            let unique = self.eat_keyword("UNIQUE");
            self.expect_keyword("INDEX")?;
            return self.create_index(unique);
        }
        if self.eat_keyword("INSERT") {
            return self.insert();
        }
        if self.eat_keyword("SELECT") {
            return self.select().map(Statement::Select);
        }
        Err(EngineError::Syntax(format!(
            "unsupported statement starting with {:?}",
            self.peek()
        )))
    }

    fn create_table(&mut self) -> Result<Statement, EngineError> {
        let if_not_exists = self.if_not_exists()?;
        let name = self.ident()?;
        self.expect(Token::LParen)?;

        let mut columns = Vec::new();
        let mut primary_key = Vec::new();
        loop {
            if self.eat_keyword("PRIMARY") {
                self.expect_keyword("KEY")?;
                primary_key = self.ident_list()?;
            } else {
                columns.push(self.column_def()?);
            }
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(Token::RParen)?;

        Ok(Statement::CreateTable(CreateTable {
            name,
            if_not_exists,
            columns,
            primary_key,
        }))
    }

    fn column_def(&mut self) -> Result<ColumnDef, EngineError> {
        let name = self.ident()?;
        let type_name = self.ident()?;
        let kind = match type_name.to_ascii_uppercase().as_str() {
            "INTEGER" => ColumnType::Integer,
            "VARCHAR" => ColumnType::Varchar,
            "BLOB" => ColumnType::Blob,
            other => return Err(EngineError::Syntax(format!("unsupported column type {}", other))),
        };

        let mut max_len = None;
        if self.eat(&Token::LBracket) {
            let len = self.number()?;
            if len <= 0 {
                return Err(EngineError::Syntax(format!("invalid column length {}", len)));
            }
            max_len = Some(len as usize);
            self.expect(Token::RBracket)?;
        }

        let mut auto_increment = false;
        let mut not_null = false;
        loop {
            if self.eat_keyword("AUTO_INCREMENT") {
                auto_increment = true;
            } else if self.eat_keyword("NOT") {
                self.expect_keyword("NULL")?;
                not_null = true;
            } else {
                break;
            }
        }

        if auto_increment && kind != ColumnType::Integer {
            return Err(EngineError::Syntax(format!(
                "AUTO_INCREMENT requires INTEGER column: {}",
                name
            )));
        }

        Ok(ColumnDef {
            name,
            kind,
            max_len,
            auto_increment,
            not_null,
        })
    }

    fn create_index(&mut self, unique: bool) -> Result<Statement, EngineError> {
        let if_not_exists = self.if_not_exists()?;
        self.expect_keyword("ON")?;
        let table = self.ident()?;
        let columns = self.ident_list()?;
        Ok(Statement::CreateIndex(CreateIndex {
            table,
            columns,
            unique,
            if_not_exists,
        }))
    }

    fn insert(&mut self) -> Result<Statement, EngineError> {
        self.expect_keyword("INTO")?;
        let table = self.ident()?;
        let columns = self.ident_list()?;
        self.expect_keyword("VALUES")?;

        let mut rows = Vec::new();
        loop {
            self.expect(Token::LParen)?;
            let mut row = vec![self.operand()?];
            while self.eat(&Token::Comma) {
                row.push(self.operand()?);
            }
            self.expect(Token::RParen)?;
            if row.len() != columns.len() {
                return Err(EngineError::Syntax(format!(
                    "row has {} values for {} columns",
                    row.len(),
                    columns.len()
                )));
            }
            rows.push(row);
            if !self.eat(&Token::Comma) {
                break;
            }
        }

        Ok(Statement::Insert(Insert {
            table,
            columns,
            rows,
        }))
    }

    fn select(&mut self) -> Result<Select, EngineError> {
        let projection = self.projection()?;
        self.expect_keyword("FROM")?;
        let from = self.ident()?;

        let mut join = None;
        if self.eat_keyword("INNER") {
            self.expect_keyword("JOIN")?;
            let table = self.ident()?;
            self.expect_keyword("ON")?;
            let left = self.ident()?;
            self.expect(Token::Op(ComparisonOperator::Eq))?;
            let right = self.ident()?;
            join = Some(Join { table, left, right });
        }

        let filter = if self.eat_keyword("WHERE") {
            Some(self.or_expr()?)
        } else {
            None
        };

        let mut order_by = None;
        if self.eat_keyword("ORDER") {
            self.expect_keyword("BY")?;
            let column = self.ident()?;
            let descending = if self.eat_keyword("DESC") {
                true
            } else {
                self.eat_keyword("ASC");
                false
            };
            order_by = Some((column, descending));
        }

        let limit = if self.eat_keyword("LIMIT") {
            let n = self.number()?;
            if n < 0 {
                return Err(EngineError::Syntax(format!("invalid LIMIT {}", n)));
            }
            Some(n as usize)
        } else {
            None
        };

        Ok(Select {
            projection,
            from,
            join,
            filter,
            order_by,
            limit,
        })
    }

    fn projection(&mut self) -> Result<Projection, EngineError> {
        if self.eat(&Token::Star) {
            return Ok(Projection::All);
        }
        if self.peek_keyword("COUNT") && self.tokens.get(self.pos + 1) == Some(&Token::LParen) {
            self.pos += 2;
            self.eat(&Token::Star);
            self.expect(Token::RParen)?;
            return Ok(Projection::Count);
        }
        let mut columns = vec![self.ident()?];
        while self.eat(&Token::Comma) {
            columns.push(self.ident()?);
        }
        Ok(Projection::Columns(columns))
    }

    fn or_expr(&mut self) -> Result<Expr, EngineError> {
        let mut expr = self.and_expr()?;
        while self.eat_keyword("OR") {
            let right = self.and_expr()?;
            expr = Expr::Or(Box::new(expr), Box::new(right));
        }
        Ok(expr)
    }

    fn and_expr(&mut self) -> Result<Expr, EngineError> {
        let mut expr = self.primary_expr()?;
        while self.eat_keyword("AND") {
            let right = self.primary_expr()?;
            expr = Expr::And(Box::new(expr), Box::new(right));
        }
        Ok(expr)
    }

    fn primary_expr(&mut self) -> Result<Expr, EngineError> {
        if self.eat(&Token::LParen) {
            let expr = self.or_expr()?;
            self.expect(Token::RParen)?;
            return Ok(expr);
        }
        let left = self.operand()?;
        let operator = match self.next()? {
            Token::Op(op) => op,
            other => {
                return Err(EngineError::Syntax(format!(
                    "expected comparison operator, found {:?}",
                    other
                )))
            }
        };
        let right = self.operand()?;
        Ok(Expr::Compare {
            left,
            operator,
            right,
        })
    }

    fn operand(&mut self) -> Result<Operand, EngineError> {
        match self.next()? {
            Token::Ident(name) if name.eq_ignore_ascii_case("NULL") => {
                Ok(Operand::Literal(SqlValue::Null))
            }
            Token::Ident(name) => Ok(Operand::Column(name)),
            Token::Param(name) => Ok(Operand::Param(name)),
            Token::Number(n) => Ok(Operand::Literal(SqlValue::Integer(n))),
            Token::Str(s) => Ok(Operand::Literal(SqlValue::Text(s))),
            other => Err(EngineError::Syntax(format!(
                "expected value, found {:?}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_batch_insert() {
        let script = "BEGIN TRANSACTION\nINSERT INTO LOGS (log,uniqueidentifier) VALUES(@log0,@uniqueidentifier0), (@log1,@uniqueidentifier1);\nCOMMIT";
        let statements = parse_script(script).unwrap();
        assert_eq!(statements.len(), 3);
        assert_eq!(statements[0], Statement::Begin);
        assert_eq!(statements[2], Statement::Commit);
        match &statements[1] {
            Statement::Insert(insert) => {
                assert_eq!(insert.table, "LOGS");
                assert_eq!(insert.rows.len(), 2);
                assert_eq!(insert.rows[1][0], Operand::Param("log1".to_string()));
            }
            other => panic!("expected insert, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_create_table() {
        let script = "CREATE TABLE IF NOT EXISTS LOGS(
            id INTEGER AUTO_INCREMENT,
            log VARCHAR[4096] NOT NULL,
            PRIMARY KEY (id)
        )";
        let statements = parse_script(script).unwrap();
        match &statements[0] {
            Statement::CreateTable(table) => {
                assert!(table.if_not_exists);
                assert_eq!(table.columns.len(), 2);
                assert!(table.columns[0].auto_increment);
                assert_eq!(table.columns[1].max_len, Some(4096));
                assert!(table.columns[1].not_null);
                assert_eq!(table.primary_key, vec!["id".to_string()]);
            }
            other => panic!("expected create table, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_select_with_nested_condition() {
        let query = "SELECT LOGS.id,LOGS.log FROM LOGS INNER JOIN TAGS ON LOGS.uniqueidentifier = TAGS.uniqueidentifier WHERE (LOGS.id < @lastid AND (TAGS.tag = @tag0 OR TAGS.tag = @tag1)) ORDER BY LOGS.id DESC LIMIT 256";
        let statements = parse_script(query).unwrap();
        let select = match &statements[0] {
            Statement::Select(select) => select,
            other => panic!("expected select, got {:?}", other),
        };
        assert!(select.join.is_some());
        assert_eq!(select.order_by, Some(("LOGS.id".to_string(), true)));
        assert_eq!(select.limit, Some(256));
        assert!(matches!(select.filter, Some(Expr::And(_, _))));
    }

    #[test]
    fn test_parse_count() {
        let statements = parse_script("SELECT COUNT() FROM LOGS").unwrap();
        match &statements[0] {
            Statement::Select(select) => assert_eq!(select.projection, Projection::Count),
            other => panic!("expected select, got {:?}", other),
        }
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let statements = parse_script("SELECT a FROM t WHERE a = 1 OR b = 2 AND c = 3").unwrap();
        match &statements[0] {
            Statement::Select(select) => {
                assert!(matches!(select.filter, Some(Expr::Or(_, _))));
            }
            other => panic!("expected select, got {:?}", other),
        }
    }

    #[test]
    fn test_syntax_errors() {
        assert!(parse_script("DROP TABLE LOGS").is_err());
        assert!(parse_script("SELECT FROM").is_err());
        assert!(parse_script("SELECT a FROM t WHERE a ! 1").is_err());
        assert!(parse_script("INSERT INTO t (a,b) VALUES(@a0)").is_err());
    }
}
