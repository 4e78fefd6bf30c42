//! Recursive-descent parser turning a token stream into an [`Expr`] AST.
//!
//! Precedence (loosest to tightest):
//!
//! ```text
//! or_expr        := and_expr (("or" | "||") and_expr)*
//! and_expr       := not_expr (("and" | "&&" | "&" | "|") not_expr)*
//! not_expr       := ("not" | "!") not_expr | comparison
//! comparison     := additive (("==" | "!=" | "<" | "<=" | ">" | ">=") additive)?
//! additive       := multiplicative (("+" | "-") multiplicative)*
//! multiplicative := unary (("*" | "/") unary)*
//! unary          := "-" unary | postfix
//! postfix        := primary ("." call | "[" expr "]")*
//! primary        := number | string | "true" | "false" | "(" expr ")"
//!                  | "[" list "]" | identifier
//! ```

use super::ast::{BinaryOp, ColumnPredicate, Expr, Reduction, UnaryOp};
use super::lexer::{lex, LexError, Token, TokenKind};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error("unexpected end of expression")]
    UnexpectedEof,
    #[error("unexpected token '{0}' at byte {1}")]
    UnexpectedToken(String, usize),
    #[error("unknown method '{0}'")]
    UnknownMethod(String),
    #[error("trailing input after expression: '{0}'")]
    TrailingInput(String),
}

enum CallArg {
    Positional(Expr),
    Keyword(String, Expr),
}

pub fn parse(source: &str) -> Result<Expr, ParseError> {
    let tokens = lex(source)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_or()?;
    parser.expect_eof()?;
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn expect_eof(&self) -> Result<(), ParseError> {
        if self.peek().kind == TokenKind::Eof {
            Ok(())
        } else {
            Err(ParseError::TrailingInput(self.peek().text.clone()))
        }
    }

    fn is_op(&self, text: &str) -> bool {
        self.peek().kind == TokenKind::Operator && self.peek().text == text
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_and()?;
        loop {
            if self.is_op("or") || self.is_op("||") {
                self.advance();
                let rhs = self.parse_and()?;
                lhs = Expr::Binary(BinaryOp::Or, Box::new(lhs), Box::new(rhs));
            } else if self.is_op("|") {
                self.advance();
                let rhs = self.parse_and()?;
                lhs = Expr::Binary(BinaryOp::BitOr, Box::new(lhs), Box::new(rhs));
            } else {
                break;
            }
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_not()?;
        loop {
            if self.is_op("and") || self.is_op("&&") {
                self.advance();
                let rhs = self.parse_not()?;
                lhs = Expr::Binary(BinaryOp::And, Box::new(lhs), Box::new(rhs));
            } else if self.is_op("&") {
                self.advance();
                let rhs = self.parse_not()?;
                lhs = Expr::Binary(BinaryOp::BitAnd, Box::new(lhs), Box::new(rhs));
            } else {
                break;
            }
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Expr, ParseError> {
        if self.is_op("not") || self.is_op("!") {
            self.advance();
            let inner = self.parse_not()?;
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(inner)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let lhs = self.parse_additive()?;
        let op = match self.peek() {
            t if t.kind == TokenKind::Operator && t.text == "==" => Some(BinaryOp::Eq),
            t if t.kind == TokenKind::Operator && t.text == "!=" => Some(BinaryOp::Ne),
            t if t.kind == TokenKind::Operator && t.text == "<" => Some(BinaryOp::Lt),
            t if t.kind == TokenKind::Operator && t.text == "<=" => Some(BinaryOp::Le),
            t if t.kind == TokenKind::Operator && t.text == ">" => Some(BinaryOp::Gt),
            t if t.kind == TokenKind::Operator && t.text == ">=" => Some(BinaryOp::Ge),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let rhs = self.parse_additive()?;
            return Ok(Expr::Binary(op, Box::new(lhs), Box::new(rhs)));
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            if self.is_op("+") {
                self.advance();
                let rhs = self.parse_multiplicative()?;
                lhs = Expr::Binary(BinaryOp::Add, Box::new(lhs), Box::new(rhs));
            } else if self.is_op("-") {
                self.advance();
                let rhs = self.parse_multiplicative()?;
                lhs = Expr::Binary(BinaryOp::Sub, Box::new(lhs), Box::new(rhs));
            } else {
                break;
            }
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_unary()?;
        loop {
            if self.is_op("*") {
                self.advance();
                let rhs = self.parse_unary()?;
                lhs = Expr::Binary(BinaryOp::Mul, Box::new(lhs), Box::new(rhs));
            } else if self.is_op("/") {
                self.advance();
                let rhs = self.parse_unary()?;
                lhs = Expr::Binary(BinaryOp::Div, Box::new(lhs), Box::new(rhs));
            } else {
                break;
            }
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if self.is_op("-") {
            self.advance();
            let inner = self.parse_unary()?;
            return Ok(Expr::Unary(UnaryOp::Neg, Box::new(inner)));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek().kind {
                TokenKind::Dot => {
                    self.advance();
                    expr = self.parse_method(expr)?;
                }
                TokenKind::LeftBracket => {
                    self.advance();
                    let index = self.parse_or()?;
                    self.expect(TokenKind::RightBracket)?;
                    expr = self.apply_index(expr, index)?;
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn apply_index(&self, receiver: Expr, index: Expr) -> Result<Expr, ParseError> {
        match (&receiver, &index) {
            (Expr::Column(name), Expr::Number(n)) if name == "shape" && *n == 0.0 => {
                Ok(Expr::ShapeRow)
            }
            (Expr::Column(table), Expr::Str(col)) => Ok(Expr::TableColumn {
                table: table.clone(),
                column: col.clone(),
            }),
            (Expr::TableColumn { column, .. }, Expr::Str(col)) => Ok(Expr::TableColumn {
                table: column.clone(),
                column: col.clone(),
            }),
            _ => Ok(Expr::Binary(
                BinaryOp::Eq,
                Box::new(receiver),
                Box::new(index),
            )),
        }
    }

    fn parse_method(&mut self, receiver: Expr) -> Result<Expr, ParseError> {
        let name_tok = self.expect(TokenKind::Identifier)?;
        let mut name = name_tok.text;

        // `.str.contains(...)` / `.str.match(...)` — combine the `str`
        // namespace token with the following method name.
        if name == "str" {
            self.expect(TokenKind::Dot)?;
            let sub = self.expect(TokenKind::Identifier)?;
            name = format!("str.{}", sub.text);
        }

        self.expect(TokenKind::LeftParen)?;
        let args = self.parse_call_args()?;
        self.expect(TokenKind::RightParen)?;

        build_call(receiver, &name, args)
    }

    fn parse_call_args(&mut self) -> Result<Vec<CallArg>, ParseError> {
        let mut args = Vec::new();
        if self.peek().kind == TokenKind::RightParen {
            return Ok(args);
        }
        loop {
            // keyword form: identifier "=" expr
            if self.peek().kind == TokenKind::Identifier {
                let save = self.pos;
                let ident = self.advance();
                if self.is_op_eq() {
                    self.advance();
                    let value = self.parse_or()?;
                    args.push(CallArg::Keyword(ident.text, value));
                    if self.peek().kind == TokenKind::Comma {
                        self.advance();
                        continue;
                    } else {
                        break;
                    }
                }
                self.pos = save;
            }
            let value = self.parse_or()?;
            args.push(CallArg::Positional(value));
            if self.peek().kind == TokenKind::Comma {
                self.advance();
                continue;
            }
            break;
        }
        Ok(args)
    }

    /// A lone `=` (as opposed to `==`) used only in `keyword=value` call
    /// arguments. The lexer never produces a bare `=` token kind other
    /// than `Operator("=")`, so this disambiguates from `==`.
    fn is_op_eq(&self) -> bool {
        self.peek().kind == TokenKind::Operator && self.peek().text == "="
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::Number => {
                self.advance();
                let n: f64 = tok.text.parse().map_err(|_| {
                    ParseError::UnexpectedToken(tok.text.clone(), tok.offset)
                })?;
                Ok(Expr::Number(n))
            }
            TokenKind::String => {
                self.advance();
                Ok(Expr::Str(tok.text))
            }
            TokenKind::LeftParen => {
                self.advance();
                let inner = self.parse_or()?;
                self.expect(TokenKind::RightParen)?;
                Ok(inner)
            }
            TokenKind::LeftBracket => {
                self.advance();
                let mut items = Vec::new();
                if self.peek().kind != TokenKind::RightBracket {
                    loop {
                        items.push(self.parse_or()?);
                        if self.peek().kind == TokenKind::Comma {
                            self.advance();
                            continue;
                        }
                        break;
                    }
                }
                self.expect(TokenKind::RightBracket)?;
                Ok(Expr::List(items))
            }
            TokenKind::Identifier => {
                self.advance();
                match tok.text.as_str() {
                    "True" | "true" => Ok(Expr::Bool(true)),
                    "False" | "false" => Ok(Expr::Bool(false)),
                    _ => Ok(Expr::Column(tok.text)),
                }
            }
            TokenKind::Eof => Err(ParseError::UnexpectedEof),
            _ => Err(ParseError::UnexpectedToken(tok.text, tok.offset)),
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        if self.peek().kind == kind {
            Ok(self.advance())
        } else {
            let tok = self.peek().clone();
            Err(ParseError::UnexpectedToken(tok.text, tok.offset))
        }
    }
}

fn build_call(receiver: Expr, name: &str, args: Vec<CallArg>) -> Result<Expr, ParseError> {
    match name {
        "notnull" => Ok(predicate(receiver, ColumnPredicate::NotNull)),
        "notna" => Ok(predicate(receiver, ColumnPredicate::NotNa)),
        "isin" => {
            let arg = first_positional(args, name)?;
            Ok(predicate(receiver, ColumnPredicate::IsIn(Box::new(arg))))
        }
        "duplicated" => {
            let keep_first = args
                .into_iter()
                .find_map(|a| match a {
                    CallArg::Keyword(k, v) if k == "keep" => Some(v),
                    _ => None,
                })
                .map(|v| match v {
                    Expr::Bool(false) => false,
                    Expr::Str(s) if s == "first" => true,
                    _ => true,
                })
                .unwrap_or(true);
            Ok(predicate(receiver, ColumnPredicate::Duplicated { keep_first }))
        }
        "str.contains" => {
            let arg = first_positional(args, name)?;
            Ok(predicate(
                receiver,
                ColumnPredicate::StrContains(Box::new(arg)),
            ))
        }
        "str.match" => {
            let arg = first_positional(args, name)?;
            Ok(predicate(receiver, ColumnPredicate::StrMatch(Box::new(arg))))
        }
        "nunique" => Ok(reduce(receiver, Reduction::NUnique)),
        "all" => Ok(reduce(receiver, Reduction::All)),
        "any" => Ok(reduce(receiver, Reduction::Any)),
        "min" => Ok(reduce(receiver, Reduction::Min)),
        "max" => Ok(reduce(receiver, Reduction::Max)),
        "sum" => Ok(reduce(receiver, Reduction::Sum)),
        "mean" => Ok(reduce(receiver, Reduction::Mean)),
        other => Err(ParseError::UnknownMethod(other.to_owned())),
    }
}

fn first_positional(args: Vec<CallArg>, method: &str) -> Result<Expr, ParseError> {
    args.into_iter()
        .find_map(|a| match a {
            CallArg::Positional(e) => Some(e),
            _ => None,
        })
        .ok_or_else(|| ParseError::UnknownMethod(format!("{method}() missing required argument")))
}

fn predicate(receiver: Expr, predicate: ColumnPredicate) -> Expr {
    Expr::Predicate {
        receiver: Box::new(receiver),
        predicate,
    }
}

fn reduce(receiver: Expr, reduction: Reduction) -> Expr {
    Expr::Reduce {
        receiver: Box::new(receiver),
        reduction,
    }
}
