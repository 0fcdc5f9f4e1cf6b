// Recursive-descent parser for `SELECT [TOP n] * FROM c [WHERE ...]`

use super::filter::{CmpOp, FieldPath, Filter, Operand, StringFunc};
use super::lexer::{tokenize, Token};
use super::{Query, QueryParams, QuerySchema};
use crate::error::CatalogError;
use serde_json::Value;

const KEYWORDS: &[&str] = &["SELECT", "TOP", "FROM", "WHERE", "AND", "OR", "NOT", "AS"];

/// Deepest parenthesis/NOT nesting accepted in a WHERE clause
pub(super) const MAX_NESTING: usize = 64;
/// Most comparisons and function calls accepted in a WHERE clause
pub(super) const MAX_CONDITIONS: usize = 256;

pub(super) struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    alias: String,
    schema: &'a QuerySchema,
    params: &'a QueryParams,
    depth: usize,
    conditions: usize,
}

impl<'a> Parser<'a> {
    pub(super) fn new(
        text: &str,
        schema: &'a QuerySchema,
        params: &'a QueryParams,
    ) -> Result<Self, CatalogError> {
        Ok(Self {
            tokens: tokenize(text)?,
            pos: 0,
            alias: String::new(),
            schema,
            params,
            depth: 0,
            conditions: 0,
        })
    }

    pub(super) fn parse_statement(mut self) -> Result<Query, CatalogError> {
        self.expect_keyword("SELECT")?;

        let top = if self.eat_keyword("TOP") {
            match self.advance() {
                Some(Token::Number(n)) if n >= 0.0 && n.fract() == 0.0 => Some(n as usize),
                other => return Err(unexpected("a row count after TOP", other.as_ref())),
            }
        } else {
            None
        };

        match self.advance() {
            Some(Token::Star) => {}
            other => {
                return Err(CatalogError::Query(format!(
                    "only 'SELECT *' projections are supported, found {}",
                    describe(other.as_ref())
                )))
            }
        }

        self.expect_keyword("FROM")?;
        self.alias = match self.advance() {
            Some(Token::Ident(name)) if !is_keyword(&name) => name,
            other => return Err(unexpected("a container name after FROM", other.as_ref())),
        };
        // `FROM products p` / `FROM products AS p`
        self.eat_keyword("AS");
        let renamed = match self.peek() {
            Some(Token::Ident(name)) if !is_keyword(name) => Some(name.clone()),
            _ => None,
        };
        if let Some(alias) = renamed {
            self.alias = alias;
            self.pos += 1;
        }

        let filter = if self.eat_keyword("WHERE") {
            Some(self.parse_or()?)
        } else {
            None
        };

        if let Some(token) = self.peek() {
            return Err(CatalogError::Query(format!(
                "unexpected '{}' after end of query",
                token
            )));
        }

        Ok(Query { top, filter })
    }

    fn parse_or(&mut self) -> Result<Filter, CatalogError> {
        let mut left = self.parse_and()?;
        while self.eat_keyword("OR") {
            let right = self.parse_and()?;
            left = Filter::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Filter, CatalogError> {
        let mut left = self.parse_unary()?;
        while self.eat_keyword("AND") {
            let right = self.parse_unary()?;
            left = Filter::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Filter, CatalogError> {
        if self.eat_keyword("NOT") {
            let inner = self.nested(Self::parse_unary)?;
            return Ok(Filter::Not(Box::new(inner)));
        }
        if self.peek() == Some(&Token::LParen) {
            self.pos += 1;
            let inner = self.nested(Self::parse_or)?;
            self.expect(Token::RParen)?;
            return Ok(inner);
        }
        self.parse_predicate()
    }

    /// Run `parse` one level deeper, refusing input nested past `MAX_NESTING`.
    fn nested(
        &mut self,
        parse: fn(&mut Self) -> Result<Filter, CatalogError>,
    ) -> Result<Filter, CatalogError> {
        if self.depth >= MAX_NESTING {
            return Err(CatalogError::Query(format!(
                "expression nested too deeply (limit {})",
                MAX_NESTING
            )));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn parse_predicate(&mut self) -> Result<Filter, CatalogError> {
        self.conditions += 1;
        if self.conditions > MAX_CONDITIONS {
            return Err(CatalogError::Query(format!(
                "too many conditions (limit {})",
                MAX_CONDITIONS
            )));
        }

        let name = match self.peek() {
            Some(Token::Ident(name)) => name.clone(),
            other => return Err(unexpected("a condition", other)),
        };

        if name == self.alias {
            let path = self.parse_path()?;
            let op = self.parse_cmp_op()?;
            let rhs = self.parse_literal()?;
            return Ok(Filter::Compare {
                lhs: Operand::Field(path),
                op,
                rhs,
            });
        }

        if self.tokens.get(self.pos + 1) != Some(&Token::LParen) {
            return Err(CatalogError::Query(format!(
                "expected a condition on '{}', found '{}'",
                self.alias, name
            )));
        }
        self.pos += 2;

        let function = name.to_ascii_uppercase();
        match function.as_str() {
            "CONTAINS" | "STARTSWITH" | "ENDSWITH" => {
                let func = match function.as_str() {
                    "CONTAINS" => StringFunc::Contains,
                    "STARTSWITH" => StringFunc::StartsWith,
                    _ => StringFunc::EndsWith,
                };
                let path = self.parse_path()?;
                self.expect(Token::Comma)?;
                let needle = match self.parse_literal()? {
                    Value::String(s) => s,
                    other => {
                        return Err(CatalogError::Query(format!(
                            "{} expects a string argument, got {}",
                            function, other
                        )))
                    }
                };
                let ignore_case = if self.peek() == Some(&Token::Comma) {
                    self.pos += 1;
                    match self.parse_literal()? {
                        Value::Bool(b) => b,
                        other => {
                            return Err(CatalogError::Query(format!(
                                "{} expects a boolean third argument, got {}",
                                function, other
                            )))
                        }
                    }
                } else {
                    false
                };
                self.expect(Token::RParen)?;
                Ok(Filter::StringMatch {
                    func,
                    path,
                    needle,
                    ignore_case,
                })
            }
            "ARRAY_CONTAINS" => {
                let path = self.parse_path()?;
                self.expect(Token::Comma)?;
                let value = self.parse_literal()?;
                self.expect(Token::RParen)?;
                Ok(Filter::ArrayContains { path, value })
            }
            "IS_DEFINED" => {
                let path = self.parse_path()?;
                self.expect(Token::RParen)?;
                Ok(Filter::IsDefined(path))
            }
            "LOWER" | "UPPER" => {
                let path = self.parse_path()?;
                self.expect(Token::RParen)?;
                let lhs = if function == "LOWER" {
                    Operand::Lower(path)
                } else {
                    Operand::Upper(path)
                };
                let op = self.parse_cmp_op()?;
                let rhs = self.parse_literal()?;
                Ok(Filter::Compare { lhs, op, rhs })
            }
            _ => Err(CatalogError::Query(format!(
                "unsupported function '{}'",
                name
            ))),
        }
    }

    fn parse_path(&mut self) -> Result<FieldPath, CatalogError> {
        match self.advance() {
            Some(Token::Ident(name)) if name == self.alias => {}
            other => {
                return Err(CatalogError::Query(format!(
                    "expected a '{}.<field>' reference, found {}",
                    self.alias,
                    describe(other.as_ref())
                )))
            }
        }

        let mut segments = Vec::new();
        while self.peek() == Some(&Token::Dot) {
            self.pos += 1;
            match self.advance() {
                Some(Token::Ident(segment)) => segments.push(segment),
                other => return Err(unexpected("a field name", other.as_ref())),
            }
        }
        if segments.is_empty() {
            return Err(CatalogError::Query(format!(
                "expected a field after '{}'",
                self.alias
            )));
        }

        let path = FieldPath(segments);
        self.schema.check(&path)?;
        Ok(path)
    }

    fn parse_cmp_op(&mut self) -> Result<CmpOp, CatalogError> {
        match self.advance() {
            Some(Token::Eq) => Ok(CmpOp::Eq),
            Some(Token::Ne) => Ok(CmpOp::Ne),
            Some(Token::Lt) => Ok(CmpOp::Lt),
            Some(Token::Le) => Ok(CmpOp::Le),
            Some(Token::Gt) => Ok(CmpOp::Gt),
            Some(Token::Ge) => Ok(CmpOp::Ge),
            other => Err(unexpected("a comparison operator", other.as_ref())),
        }
    }

    fn parse_literal(&mut self) -> Result<Value, CatalogError> {
        match self.advance() {
            Some(Token::Str(s)) => Ok(Value::String(s)),
            Some(Token::Number(n)) => number_value(n),
            Some(Token::Ident(word)) if word.eq_ignore_ascii_case("true") => Ok(Value::Bool(true)),
            Some(Token::Ident(word)) if word.eq_ignore_ascii_case("false") => {
                Ok(Value::Bool(false))
            }
            Some(Token::Ident(word)) if word.eq_ignore_ascii_case("null") => Ok(Value::Null),
            Some(Token::Param(name)) => self
                .params
                .get(&name)
                .cloned()
                .ok_or_else(|| CatalogError::Query(format!("unbound parameter @{}", name))),
            other => Err(unexpected("a literal value", other.as_ref())),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.peek().is_some_and(|t| t.is_keyword(keyword)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), CatalogError> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(unexpected(keyword, self.peek()))
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), CatalogError> {
        match self.advance() {
            Some(token) if token == expected => Ok(()),
            other => Err(unexpected(&format!("'{}'", expected), other.as_ref())),
        }
    }
}

fn is_keyword(word: &str) -> bool {
    KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(word))
}

fn number_value(n: f64) -> Result<Value, CatalogError> {
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        return Ok(Value::from(n as i64));
    }
    serde_json::Number::from_f64(n)
        .map(Value::Number)
        .ok_or_else(|| CatalogError::Query(format!("invalid number {}", n)))
}

fn describe(token: Option<&Token>) -> String {
    match token {
        Some(token) => format!("'{}'", token),
        None => "end of query".to_string(),
    }
}

fn unexpected(expected: &str, found: Option<&Token>) -> CatalogError {
    CatalogError::Query(format!("expected {}, found {}", expected, describe(found)))
}
