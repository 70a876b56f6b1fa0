//! Expression parsing and evaluation.
//!
//! Directive expressions are copied byte-for-byte into program text at
//! compile time and only interpreted here, at execution time. The grammar
//! covers what directive templates actually write: `$variable` references
//! with dot/bracket paths, literals, arithmetic, comparisons, boolean
//! logic, and calls to scope callables (`$escape($x)`). Loop headers get
//! their own entry points: `expr as $item` / `expr as $k => $v` for
//! `foreach`, and `init; cond; step` for `for`.

use crate::error::ExecError;
use crate::value::{truthy, Scope, Value};

/// A parsed expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A literal value.
    Literal(serde_json::Value),
    /// A `$name` scope reference.
    Var(String),
    /// `base.field` or `base[index]` access.
    Index(Box<Expr>, Box<Expr>),
    /// Unary operator application.
    Unary(UnOp, Box<Expr>),
    /// Binary operator application.
    Binary(BinOp, Box<Expr>, Box<Expr>),
    /// `$name(args)` — invokes a scope callable.
    Call(String, Vec<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Mul,
    Div,
    Mod,
    Add,
    Sub,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

/// A `foreach` header: `subject as $item` or `subject as $key => $item`.
#[derive(Debug, Clone, PartialEq)]
pub struct ForeachHeader {
    pub subject: Expr,
    pub key: Option<String>,
    pub item: String,
}

/// An assignment usable in `for` init/step position.
#[derive(Debug, Clone, PartialEq)]
pub enum Assign {
    /// `$x = expr`
    Set(String, Expr),
    /// `$x++`
    Incr(String),
    /// `$x--`
    Decr(String),
    /// `$x += expr`
    AddSet(String, Expr),
    /// `$x -= expr`
    SubSet(String, Expr),
}

/// A `for` header: `init; cond; step`, each part optional.
#[derive(Debug, Clone, PartialEq)]
pub struct ForHeader {
    pub init: Option<Assign>,
    pub cond: Option<Expr>,
    pub step: Option<Assign>,
}

/// Parses a full expression; trailing input is an error.
pub fn parse_expr(src: &str) -> Result<Expr, ExecError> {
    let mut parser = Parser::new(src)?;
    let expr = parser.expr()?;
    parser.expect_end()?;
    Ok(expr)
}

/// Parses a `foreach` header.
pub fn parse_foreach_header(src: &str) -> Result<ForeachHeader, ExecError> {
    let mut parser = Parser::new(src)?;
    let subject = parser.expr()?;
    parser.expect_ident("as")?;
    let first = parser.expect_var()?;
    let header = if parser.eat(&Token::FatArrow) {
        let item = parser.expect_var()?;
        ForeachHeader {
            subject,
            key: Some(first),
            item,
        }
    } else {
        ForeachHeader {
            subject,
            key: None,
            item: first,
        }
    };
    parser.expect_end()?;
    Ok(header)
}

/// Parses a `for` header: `init; cond; step`.
pub fn parse_for_header(src: &str) -> Result<ForHeader, ExecError> {
    let parts: Vec<&str> = src.split(';').collect();
    if parts.len() != 3 {
        return Err(ExecError::Expr(format!(
            "for header must have three `;`-separated parts, got `{}`",
            src
        )));
    }
    let init = parse_optional(parts[0], parse_assign)?;
    let cond = parse_optional(parts[1], parse_expr)?;
    let step = parse_optional(parts[2], parse_assign)?;
    Ok(ForHeader { init, cond, step })
}

fn parse_optional<T>(
    src: &str,
    parse: impl Fn(&str) -> Result<T, ExecError>,
) -> Result<Option<T>, ExecError> {
    if src.trim().is_empty() {
        Ok(None)
    } else {
        parse(src).map(Some)
    }
}

/// Parses an assignment (`for` init/step position).
pub fn parse_assign(src: &str) -> Result<Assign, ExecError> {
    let mut parser = Parser::new(src)?;
    let name = parser.expect_var()?;
    let assign = match parser.next()? {
        Token::Op("=") => Assign::Set(name, parser.expr()?),
        Token::Op("+=") => Assign::AddSet(name, parser.expr()?),
        Token::Op("-=") => Assign::SubSet(name, parser.expr()?),
        Token::Op("++") => Assign::Incr(name),
        Token::Op("--") => Assign::Decr(name),
        other => {
            return Err(ExecError::Expr(format!(
                "expected assignment operator, found {:?}",
                other
            )))
        }
    };
    parser.expect_end()?;
    Ok(assign)
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Var(String),
    Ident(String),
    Num(serde_json::Number),
    Str(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    FatArrow,
    Op(&'static str),
    End,
}

fn lex(src: &str) -> Result<Vec<Token>, ExecError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = src.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ch if ch.is_whitespace() => i += 1,
            '$' => {
                i += 1;
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                if i == start {
                    return Err(ExecError::Expr("`$` without a variable name".into()));
                }
                tokens.push(Token::Var(chars[start..i].iter().collect()));
            }
            ch if ch.is_alphabetic() || ch == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            ch if ch.is_ascii_digit() => {
                let start = i;
                let mut is_float = false;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                if i + 1 < chars.len() && chars[i] == '.' && chars[i + 1].is_ascii_digit() {
                    is_float = true;
                    i += 1;
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
                let text: String = chars[start..i].iter().collect();
                let number = if is_float {
                    let f: f64 = text
                        .parse()
                        .map_err(|_| ExecError::Expr(format!("bad number `{}`", text)))?;
                    serde_json::Number::from_f64(f)
                        .ok_or_else(|| ExecError::Expr(format!("bad number `{}`", text)))?
                } else {
                    let n: i64 = text
                        .parse()
                        .map_err(|_| ExecError::Expr(format!("bad number `{}`", text)))?;
                    serde_json::Number::from(n)
                };
                tokens.push(Token::Num(number));
            }
            '\'' | '"' => {
                let quote = c;
                i += 1;
                let mut text = String::new();
                loop {
                    if i >= chars.len() {
                        return Err(ExecError::Expr("unterminated string literal".into()));
                    }
                    let ch = chars[i];
                    if ch == '\\' && i + 1 < chars.len() {
                        let escaped = chars[i + 1];
                        text.push(match escaped {
                            'n' => '\n',
                            't' => '\t',
                            other => other,
                        });
                        i += 2;
                        continue;
                    }
                    if ch == quote {
                        i += 1;
                        break;
                    }
                    text.push(ch);
                    i += 1;
                }
                tokens.push(Token::Str(text));
            }
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
            '.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            _ => {
                let rest: String = chars[i..].iter().take(2).collect();
                let two: Option<&'static str> = match rest.as_str() {
                    "==" => Some("=="),
                    "!=" => Some("!="),
                    "<=" => Some("<="),
                    ">=" => Some(">="),
                    "&&" => Some("&&"),
                    "||" => Some("||"),
                    "++" => Some("++"),
                    "--" => Some("--"),
                    "+=" => Some("+="),
                    "-=" => Some("-="),
                    _ => None,
                };
                if rest == "=>" {
                    tokens.push(Token::FatArrow);
                    i += 2;
                } else if let Some(op) = two {
                    tokens.push(Token::Op(op));
                    i += 2;
                } else {
                    let one: Option<&'static str> = match c {
                        '!' => Some("!"),
                        '<' => Some("<"),
                        '>' => Some(">"),
                        '+' => Some("+"),
                        '-' => Some("-"),
                        '*' => Some("*"),
                        '/' => Some("/"),
                        '%' => Some("%"),
                        '=' => Some("="),
                        _ => None,
                    };
                    match one {
                        Some(op) => {
                            tokens.push(Token::Op(op));
                            i += 1;
                        }
                        None => {
                            return Err(ExecError::Expr(format!(
                                "unexpected character `{}`",
                                c
                            )))
                        }
                    }
                }
            }
        }
    }
    tokens.push(Token::End);
    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Parser (precedence climbing)
// ---------------------------------------------------------------------------

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(src: &str) -> Result<Self, ExecError> {
        Ok(Self {
            tokens: lex(src)?,
            pos: 0,
        })
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn next(&mut self) -> Result<Token, ExecError> {
        let token = self.tokens[self.pos].clone();
        if !matches!(token, Token::End) {
            self.pos += 1;
        }
        Ok(token)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == token {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_op(&mut self, op: &str) -> bool {
        if matches!(self.peek(), Token::Op(o) if *o == op) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_end(&self) -> Result<(), ExecError> {
        match self.peek() {
            Token::End => Ok(()),
            other => Err(ExecError::Expr(format!(
                "unexpected trailing {:?}",
                other
            ))),
        }
    }

    fn expect_var(&mut self) -> Result<String, ExecError> {
        match self.next()? {
            Token::Var(name) => Ok(name),
            other => Err(ExecError::Expr(format!(
                "expected a `$variable`, found {:?}",
                other
            ))),
        }
    }

    fn expect_ident(&mut self, ident: &str) -> Result<(), ExecError> {
        match self.next()? {
            Token::Ident(word) if word == ident => Ok(()),
            other => Err(ExecError::Expr(format!(
                "expected `{}`, found {:?}",
                ident, other
            ))),
        }
    }

    fn expr(&mut self) -> Result<Expr, ExecError> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> Result<Expr, ExecError> {
        let mut left = self.and_expr()?;
        while self.eat_op("||") {
            let right = self.and_expr()?;
            left = Expr::Binary(BinOp::Or, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr, ExecError> {
        let mut left = self.equality()?;
        while self.eat_op("&&") {
            let right = self.equality()?;
            left = Expr::Binary(BinOp::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn equality(&mut self) -> Result<Expr, ExecError> {
        let mut left = self.relational()?;
        loop {
            let op = if self.eat_op("==") {
                BinOp::Eq
            } else if self.eat_op("!=") {
                BinOp::Ne
            } else {
                break;
            };
            let right = self.relational()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn relational(&mut self) -> Result<Expr, ExecError> {
        let mut left = self.additive()?;
        loop {
            let op = if self.eat_op("<=") {
                BinOp::Le
            } else if self.eat_op(">=") {
                BinOp::Ge
            } else if self.eat_op("<") {
                BinOp::Lt
            } else if self.eat_op(">") {
                BinOp::Gt
            } else {
                break;
            };
            let right = self.additive()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn additive(&mut self) -> Result<Expr, ExecError> {
        let mut left = self.multiplicative()?;
        loop {
            let op = if self.eat_op("+") {
                BinOp::Add
            } else if self.eat_op("-") {
                BinOp::Sub
            } else {
                break;
            };
            let right = self.multiplicative()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn multiplicative(&mut self) -> Result<Expr, ExecError> {
        let mut left = self.unary()?;
        loop {
            let op = if self.eat_op("*") {
                BinOp::Mul
            } else if self.eat_op("/") {
                BinOp::Div
            } else if self.eat_op("%") {
                BinOp::Mod
            } else {
                break;
            };
            let right = self.unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, ExecError> {
        if self.eat_op("!") {
            let inner = self.unary()?;
            return Ok(Expr::Unary(UnOp::Not, Box::new(inner)));
        }
        if self.eat_op("-") {
            let inner = self.unary()?;
            return Ok(Expr::Unary(UnOp::Neg, Box::new(inner)));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, ExecError> {
        let mut expr = self.primary()?;
        loop {
            if self.eat(&Token::Dot) {
                let field = match self.next()? {
                    Token::Ident(name) => name,
                    other => {
                        return Err(ExecError::Expr(format!(
                            "expected field name after `.`, found {:?}",
                            other
                        )))
                    }
                };
                expr = Expr::Index(
                    Box::new(expr),
                    Box::new(Expr::Literal(serde_json::Value::String(field))),
                );
            } else if self.eat(&Token::LBracket) {
                let index = self.expr()?;
                if !self.eat(&Token::RBracket) {
                    return Err(ExecError::Expr("expected `]`".into()));
                }
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, ExecError> {
        match self.next()? {
            Token::Var(name) => {
                if self.eat(&Token::LParen) {
                    let mut args = Vec::new();
                    if !self.eat(&Token::RParen) {
                        loop {
                            args.push(self.expr()?);
                            if self.eat(&Token::Comma) {
                                continue;
                            }
                            if self.eat(&Token::RParen) {
                                break;
                            }
                            return Err(ExecError::Expr(
                                "expected `,` or `)` in argument list".into(),
                            ));
                        }
                    }
                    Ok(Expr::Call(name, args))
                } else {
                    Ok(Expr::Var(name))
                }
            }
            Token::Num(n) => Ok(Expr::Literal(serde_json::Value::Number(n))),
            Token::Str(s) => Ok(Expr::Literal(serde_json::Value::String(s))),
            Token::Ident(word) => match word.as_str() {
                "true" => Ok(Expr::Literal(serde_json::Value::Bool(true))),
                "false" => Ok(Expr::Literal(serde_json::Value::Bool(false))),
                "null" => Ok(Expr::Literal(serde_json::Value::Null)),
                other => Err(ExecError::Expr(format!("unexpected word `{}`", other))),
            },
            Token::LParen => {
                let inner = self.expr()?;
                if !self.eat(&Token::RParen) {
                    return Err(ExecError::Expr("expected `)`".into()));
                }
                Ok(inner)
            }
            other => Err(ExecError::Expr(format!("unexpected {:?}", other))),
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Evaluates an expression against a scope.
///
/// Reads of undefined variables yield `null`; invoking an undefined or
/// non-callable name is an error.
pub fn eval(expr: &Expr, scope: &Scope) -> Result<serde_json::Value, ExecError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Var(name) => match scope.get(name) {
            None => Ok(serde_json::Value::Null),
            Some(Value::Data(value)) => Ok(value.clone()),
            Some(Value::Callable(_)) => Err(ExecError::Type(format!(
                "`${}` is a callable, not a value",
                name
            ))),
        },
        Expr::Index(base, index) => {
            let base = eval(base, scope)?;
            let index = eval(index, scope)?;
            Ok(index_value(&base, &index))
        }
        Expr::Unary(op, inner) => {
            let value = eval(inner, scope)?;
            match op {
                UnOp::Not => Ok(serde_json::Value::Bool(!truthy(&value))),
                UnOp::Neg => negate(&value),
            }
        }
        Expr::Binary(op, left, right) => eval_binary(*op, left, right, scope),
        Expr::Call(name, args) => {
            let callable = match scope.get(name) {
                Some(Value::Callable(callable)) => callable.clone(),
                _ => return Err(ExecError::NotCallable(name.clone())),
            };
            let mut evaluated = Vec::with_capacity(args.len());
            for arg in args {
                evaluated.push(eval(arg, scope)?);
            }
            callable(&evaluated)
        }
    }
}

fn index_value(base: &serde_json::Value, index: &serde_json::Value) -> serde_json::Value {
    match base {
        serde_json::Value::Object(map) => {
            let key = match index {
                serde_json::Value::String(s) => s.clone(),
                other => crate::value::format_value(other),
            };
            map.get(&key).cloned().unwrap_or(serde_json::Value::Null)
        }
        serde_json::Value::Array(items) => index
            .as_u64()
            .and_then(|i| items.get(i as usize))
            .cloned()
            .unwrap_or(serde_json::Value::Null),
        _ => serde_json::Value::Null,
    }
}

fn negate(value: &serde_json::Value) -> Result<serde_json::Value, ExecError> {
    if let Some(i) = value.as_i64() {
        return Ok(serde_json::Value::from(-i));
    }
    if let Some(f) = value.as_f64() {
        return number(-f);
    }
    Err(ExecError::Type(format!("cannot negate {}", value)))
}

fn eval_binary(
    op: BinOp,
    left: &Expr,
    right: &Expr,
    scope: &Scope,
) -> Result<serde_json::Value, ExecError> {
    // Short-circuit boolean operators.
    if op == BinOp::And {
        let lhs = eval(left, scope)?;
        if !truthy(&lhs) {
            return Ok(serde_json::Value::Bool(false));
        }
        let rhs = eval(right, scope)?;
        return Ok(serde_json::Value::Bool(truthy(&rhs)));
    }
    if op == BinOp::Or {
        let lhs = eval(left, scope)?;
        if truthy(&lhs) {
            return Ok(serde_json::Value::Bool(true));
        }
        let rhs = eval(right, scope)?;
        return Ok(serde_json::Value::Bool(truthy(&rhs)));
    }

    let lhs = eval(left, scope)?;
    let rhs = eval(right, scope)?;
    match op {
        BinOp::Add => arith(&lhs, &rhs, i64::checked_add, |a, b| a + b),
        BinOp::Sub => arith(&lhs, &rhs, i64::checked_sub, |a, b| a - b),
        BinOp::Mul => arith(&lhs, &rhs, i64::checked_mul, |a, b| a * b),
        BinOp::Div => {
            let (a, b) = as_floats(&lhs, &rhs)?;
            if b == 0.0 {
                return Err(ExecError::Type("division by zero".into()));
            }
            number(a / b)
        }
        BinOp::Mod => {
            let (a, b) = as_ints(&lhs, &rhs)?;
            if b == 0 {
                return Err(ExecError::Type("modulo by zero".into()));
            }
            Ok(serde_json::Value::from(a % b))
        }
        BinOp::Eq => Ok(serde_json::Value::Bool(loose_eq(&lhs, &rhs))),
        BinOp::Ne => Ok(serde_json::Value::Bool(!loose_eq(&lhs, &rhs))),
        BinOp::Lt => compare(&lhs, &rhs, |o| o == std::cmp::Ordering::Less),
        BinOp::Le => compare(&lhs, &rhs, |o| o != std::cmp::Ordering::Greater),
        BinOp::Gt => compare(&lhs, &rhs, |o| o == std::cmp::Ordering::Greater),
        BinOp::Ge => compare(&lhs, &rhs, |o| o != std::cmp::Ordering::Less),
        BinOp::And | BinOp::Or => unreachable!("handled above"),
    }
}

/// Loose equality: numeric comparison when both sides are numbers,
/// structural equality otherwise.
pub fn loose_eq(left: &serde_json::Value, right: &serde_json::Value) -> bool {
    match (left.as_f64(), right.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => left == right,
    }
}

fn arith(
    lhs: &serde_json::Value,
    rhs: &serde_json::Value,
    int_op: impl Fn(i64, i64) -> Option<i64>,
    float_op: impl Fn(f64, f64) -> f64,
) -> Result<serde_json::Value, ExecError> {
    if let (Some(a), Some(b)) = (lhs.as_i64(), rhs.as_i64()) {
        if let Some(result) = int_op(a, b) {
            return Ok(serde_json::Value::from(result));
        }
    }
    let (a, b) = as_floats(lhs, rhs)?;
    number(float_op(a, b))
}

fn as_floats(
    lhs: &serde_json::Value,
    rhs: &serde_json::Value,
) -> Result<(f64, f64), ExecError> {
    match (lhs.as_f64(), rhs.as_f64()) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(ExecError::Type(format!(
            "arithmetic requires numbers, got {} and {}",
            lhs, rhs
        ))),
    }
}

fn as_ints(lhs: &serde_json::Value, rhs: &serde_json::Value) -> Result<(i64, i64), ExecError> {
    match (lhs.as_i64(), rhs.as_i64()) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(ExecError::Type(format!(
            "modulo requires integers, got {} and {}",
            lhs, rhs
        ))),
    }
}

fn number(f: f64) -> Result<serde_json::Value, ExecError> {
    serde_json::Number::from_f64(f)
        .map(serde_json::Value::Number)
        .ok_or_else(|| ExecError::Type(format!("non-finite result {}", f)))
}

fn compare(
    lhs: &serde_json::Value,
    rhs: &serde_json::Value,
    accept: impl Fn(std::cmp::Ordering) -> bool,
) -> Result<serde_json::Value, ExecError> {
    let ordering = if let (Some(a), Some(b)) = (lhs.as_f64(), rhs.as_f64()) {
        a.partial_cmp(&b)
            .ok_or_else(|| ExecError::Type("incomparable numbers".into()))?
    } else if let (serde_json::Value::String(a), serde_json::Value::String(b)) = (lhs, rhs) {
        a.cmp(b)
    } else {
        return Err(ExecError::Type(format!(
            "cannot compare {} and {}",
            lhs, rhs
        )));
    };
    Ok(serde_json::Value::Bool(accept(ordering)))
}

/// Applies an assignment to the scope.
pub fn apply_assign(assign: &Assign, scope: &mut Scope) -> Result<(), ExecError> {
    match assign {
        Assign::Set(name, expr) => {
            let value = eval(expr, scope)?;
            scope.insert(name.clone(), Value::Data(value));
        }
        Assign::Incr(name) => shift(scope, name, 1)?,
        Assign::Decr(name) => shift(scope, name, -1)?,
        Assign::AddSet(name, expr) => {
            let delta = eval(expr, scope)?;
            let current = read_number(scope, name)?;
            let next = arith(&current, &delta, i64::checked_add, |a, b| a + b)?;
            scope.insert(name.clone(), Value::Data(next));
        }
        Assign::SubSet(name, expr) => {
            let delta = eval(expr, scope)?;
            let current = read_number(scope, name)?;
            let next = arith(&current, &delta, i64::checked_sub, |a, b| a - b)?;
            scope.insert(name.clone(), Value::Data(next));
        }
    }
    Ok(())
}

fn shift(scope: &mut Scope, name: &str, delta: i64) -> Result<(), ExecError> {
    let current = read_number(scope, name)?;
    let next = arith(
        &current,
        &serde_json::Value::from(delta),
        i64::checked_add,
        |a, b| a + b,
    )?;
    scope.insert(name.to_string(), Value::Data(next));
    Ok(())
}

/// Reads a variable for numeric update; unset counts as zero.
fn read_number(scope: &Scope, name: &str) -> Result<serde_json::Value, ExecError> {
    match scope.get(name) {
        None => Ok(serde_json::Value::from(0)),
        Some(Value::Data(value)) if value.is_number() => Ok(value.clone()),
        Some(Value::Data(serde_json::Value::Null)) => Ok(serde_json::Value::from(0)),
        Some(other) => Err(ExecError::Type(format!(
            "`${}` is not a number: {:?}",
            name, other
        ))),
    }
}
