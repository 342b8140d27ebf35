//! Decline expressions: user-supplied arithmetic over position, score and fields
//!
//! Compiles expressions like `1 / (_pos + 1)` or
//! `rank > 1 ? 1 / (_pos + 1) : 1` once per request, then evaluates them
//! per window candidate.

use crate::candidate::FieldValues;
use crate::error::Error;
use crate::Result;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};

/// Identifier bound to the intra-group position
pub const POSITION_VAR: &str = "_pos";
/// Identifier bound to the original score
pub const SCORE_VAR: &str = "_score";

/// Deepest allowed nesting of parentheses, conditionals, calls and unary minus
pub const MAX_DEPTH: usize = 64;
/// Longest allowed expression, in tokens. Also bounds the depth of
/// left-leaning operator chains such as `1 + 1 + ... + 1`.
pub const MAX_TOKENS: usize = 1024;

/// A compiled expression.
///
/// Supported syntax:
/// - `_pos`, `_score`: position inside the group and original score
/// - named parameters (constants supplied with the expression)
/// - any other identifier: first value of a resolved field
/// - numeric literals, `+ - * /`, unary `-`, parentheses
/// - comparisons `< <= > >= == !=` evaluating to `1` or `0`
/// - `cond ? a : b`
/// - `log exp sqrt abs` (one argument), `min max pow` (two arguments)
#[derive(Debug, Clone)]
pub struct Expression {
    root: Node,
    fields: Vec<String>,
}

impl Expression {
    /// Compile an expression. `params` become named constants.
    pub fn compile(source: &str, params: &HashMap<String, f64>) -> Result<Self> {
        let tokens = tokenize(source)?;
        if tokens.is_empty() {
            return Err(Error::Config("Empty decline expression".to_string()));
        }
        if tokens.len() > MAX_TOKENS {
            return Err(Error::Config(format!(
                "Decline expression has {} tokens, at most {} are allowed",
                tokens.len(),
                MAX_TOKENS
            )));
        }
        let mut parser = Parser::new(&tokens, params);
        let root = parser.parse_expr()?;
        if let Some(tok) = parser.peek() {
            return Err(Error::Config(format!(
                "Unexpected token {:?} in expression '{}'",
                tok, source
            )));
        }
        let mut fields = BTreeSet::new();
        root.collect_fields(&mut fields);
        Ok(Self {
            root,
            fields: fields.into_iter().collect(),
        })
    }

    /// Fields the expression reads, sorted and deduplicated
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn evaluate(&self, position: usize, score: f32, fields: &FieldValues) -> Result<f64> {
        self.root.eval(&Scope {
            position,
            score,
            fields,
        })
    }
}

// ============================================================================
// Tokenizer
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Comma,
    Question,
    Colon,
    Lt,
    Le,
    Gt,
    Ge,
    EqEq,
    NotEq,
}

fn tokenize(expr: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = expr.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        let next = chars.get(i + 1).copied();
        match ch {
            ' ' | '\t' | '\n' | '\r' => {
                i += 1;
            }
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '?' => {
                tokens.push(Token::Question);
                i += 1;
            }
            ':' => {
                tokens.push(Token::Colon);
                i += 1;
            }
            '<' | '>' | '=' | '!' => {
                let tok = match (ch, next) {
                    ('<', Some('=')) => Token::Le,
                    ('>', Some('=')) => Token::Ge,
                    ('=', Some('=')) => Token::EqEq,
                    ('!', Some('=')) => Token::NotEq,
                    ('<', _) => Token::Lt,
                    ('>', _) => Token::Gt,
                    _ => {
                        return Err(Error::Config(format!(
                            "Unexpected character '{}' in expression",
                            ch
                        )))
                    }
                };
                i += if matches!(tok, Token::Lt | Token::Gt) { 1 } else { 2 };
                tokens.push(tok);
            }
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                // Exponent part: 1e-3, 2E5, 1.5e+2
                if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                    let sign = matches!(chars.get(i + 1).copied(), Some('+') | Some('-'));
                    let digit_at = if sign { i + 2 } else { i + 1 };
                    if !chars.get(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                        return Err(Error::Config(format!(
                            "Invalid number: exponent of '{}' has no digits",
                            chars[start..=i].iter().collect::<String>()
                        )));
                    }
                    i = digit_at;
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
                let num_str: String = chars[start..i].iter().collect();
                let num: f64 = num_str
                    .parse()
                    .map_err(|_| Error::Config(format!("Invalid number: {}", num_str)))?;
                tokens.push(Token::Number(num));
            }
            'a'..='z' | 'A'..='Z' | '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_ascii_alphanumeric() || chars[i] == '_' || chars[i] == '.')
                {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            _ => {
                return Err(Error::Config(format!(
                    "Unexpected character '{}' in expression",
                    ch
                )));
            }
        }
    }

    Ok(tokens)
}

// ============================================================================
// Syntax tree
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Func {
    Log,
    Exp,
    Sqrt,
    Abs,
    Min,
    Max,
    Pow,
}

impl Func {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "log" => Some(Func::Log),
            "exp" => Some(Func::Exp),
            "sqrt" => Some(Func::Sqrt),
            "abs" => Some(Func::Abs),
            "min" => Some(Func::Min),
            "max" => Some(Func::Max),
            "pow" => Some(Func::Pow),
            _ => None,
        }
    }

    fn arity(self) -> usize {
        match self {
            Func::Min | Func::Max | Func::Pow => 2,
            _ => 1,
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Const(f64),
    Position,
    Score,
    Field(String),
    Neg(Box<Node>),
    Binary(BinOp, Box<Node>, Box<Node>),
    Cond(Box<Node>, Box<Node>, Box<Node>),
    Call(Func, Vec<Node>),
}

struct Scope<'a> {
    position: usize,
    score: f32,
    fields: &'a FieldValues,
}

impl Node {
    fn collect_fields(&self, out: &mut BTreeSet<String>) {
        match self {
            Node::Field(name) => {
                out.insert(name.clone());
            }
            Node::Neg(inner) => inner.collect_fields(out),
            Node::Binary(_, l, r) => {
                l.collect_fields(out);
                r.collect_fields(out);
            }
            Node::Cond(c, t, e) => {
                c.collect_fields(out);
                t.collect_fields(out);
                e.collect_fields(out);
            }
            Node::Call(_, args) => args.iter().for_each(|a| a.collect_fields(out)),
            Node::Const(_) | Node::Position | Node::Score => {}
        }
    }

    fn eval(&self, scope: &Scope<'_>) -> Result<f64> {
        Ok(match self {
            Node::Const(v) => *v,
            Node::Position => scope.position as f64,
            Node::Score => scope.score as f64,
            Node::Field(name) => field_number(scope.fields, name)?,
            Node::Neg(inner) => -inner.eval(scope)?,
            Node::Binary(op, l, r) => {
                let l = l.eval(scope)?;
                let r = r.eval(scope)?;
                match op {
                    BinOp::Add => l + r,
                    BinOp::Sub => l - r,
                    BinOp::Mul => l * r,
                    BinOp::Div => l / r,
                    BinOp::Lt => bool_num(l < r),
                    BinOp::Le => bool_num(l <= r),
                    BinOp::Gt => bool_num(l > r),
                    BinOp::Ge => bool_num(l >= r),
                    BinOp::Eq => bool_num(l == r),
                    BinOp::Ne => bool_num(l != r),
                }
            }
            Node::Cond(c, t, e) => {
                if c.eval(scope)? != 0.0 {
                    t.eval(scope)?
                } else {
                    e.eval(scope)?
                }
            }
            Node::Call(func, args) => {
                let a = args[0].eval(scope)?;
                match func {
                    Func::Log => a.ln(),
                    Func::Exp => a.exp(),
                    Func::Sqrt => a.sqrt(),
                    Func::Abs => a.abs(),
                    Func::Min => a.min(args[1].eval(scope)?),
                    Func::Max => a.max(args[1].eval(scope)?),
                    Func::Pow => a.powf(args[1].eval(scope)?),
                }
            }
        })
    }
}

fn bool_num(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

fn field_number(fields: &FieldValues, name: &str) -> Result<f64> {
    let value = fields
        .get(name)
        .and_then(|values| values.first())
        .ok_or_else(|| {
            Error::FieldResolution(format!("Field '{}' has no value for this hit", name))
        })?;
    match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| {
            Error::FieldResolution(format!("Field '{}' is not representable as f64", name))
        }),
        Value::Bool(b) => Ok(bool_num(*b)),
        other => Err(Error::FieldResolution(format!(
            "Field '{}' is not numeric: {}",
            name, other
        ))),
    }
}

// ============================================================================
// Recursive descent parser
// ============================================================================

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    depth: usize,
    params: &'a HashMap<String, f64>,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token], params: &'a HashMap<String, f64>) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
            params,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&Token> {
        let tok = self.tokens.get(self.pos);
        self.pos += 1;
        tok
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(Error::Config(format!(
                "Expression nested too deeply (max {} levels)",
                MAX_DEPTH
            )));
        }
        Ok(())
    }

    fn expect(&mut self, expected: Token, context: &str) -> Result<()> {
        match self.advance() {
            Some(tok) if *tok == expected => Ok(()),
            other => Err(Error::Config(format!(
                "Expected {:?} {}, found {:?}",
                expected, context, other
            ))),
        }
    }

    fn parse_expr(&mut self) -> Result<Node> {
        self.enter()?;
        let node = self.parse_conditional();
        self.depth -= 1;
        node
    }

    // expr = comparison ('?' expr ':' expr)?
    fn parse_conditional(&mut self) -> Result<Node> {
        let cond = self.parse_comparison()?;
        if self.peek() == Some(&Token::Question) {
            self.advance();
            let then = self.parse_expr()?;
            self.expect(Token::Colon, "in conditional")?;
            let otherwise = self.parse_expr()?;
            return Ok(Node::Cond(
                Box::new(cond),
                Box::new(then),
                Box::new(otherwise),
            ));
        }
        Ok(cond)
    }

    // comparison = sum (cmp_op sum)?
    fn parse_comparison(&mut self) -> Result<Node> {
        let left = self.parse_sum()?;
        let op = match self.peek() {
            Some(Token::Lt) => BinOp::Lt,
            Some(Token::Le) => BinOp::Le,
            Some(Token::Gt) => BinOp::Gt,
            Some(Token::Ge) => BinOp::Ge,
            Some(Token::EqEq) => BinOp::Eq,
            Some(Token::NotEq) => BinOp::Ne,
            _ => return Ok(left),
        };
        self.advance();
        let right = self.parse_sum()?;
        Ok(Node::Binary(op, Box::new(left), Box::new(right)))
    }

    // sum = term (('+' | '-') term)*
    fn parse_sum(&mut self) -> Result<Node> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_term()?;
            left = Node::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    // term = unary (('*' | '/') unary)*
    fn parse_term(&mut self) -> Result<Node> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Node::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    // unary = '-' unary | factor
    fn parse_unary(&mut self) -> Result<Node> {
        if self.peek() == Some(&Token::Minus) {
            self.advance();
            self.enter()?;
            let inner = self.parse_unary()?;
            self.depth -= 1;
            return Ok(match inner {
                Node::Const(v) => Node::Const(-v),
                other => Node::Neg(Box::new(other)),
            });
        }
        self.parse_factor()
    }

    // factor = number | ident | func '(' args ')' | '(' expr ')'
    fn parse_factor(&mut self) -> Result<Node> {
        match self.advance().cloned() {
            Some(Token::Number(n)) => Ok(Node::Const(n)),
            Some(Token::Ident(name)) => {
                if self.peek() == Some(&Token::LParen) {
                    return self.parse_call(&name);
                }
                Ok(match name.as_str() {
                    POSITION_VAR => Node::Position,
                    SCORE_VAR => Node::Score,
                    _ => match self.params.get(&name) {
                        Some(v) => Node::Const(*v),
                        None => Node::Field(name),
                    },
                })
            }
            Some(Token::LParen) => {
                let inner = self.parse_expr()?;
                self.expect(Token::RParen, "to close '('")?;
                Ok(inner)
            }
            other => Err(Error::Config(format!("Unexpected token: {:?}", other))),
        }
    }

    fn parse_call(&mut self, name: &str) -> Result<Node> {
        let func = Func::from_name(name)
            .ok_or_else(|| Error::Config(format!("Unknown function: {}", name)))?;
        self.expect(Token::LParen, &format!("after function {}", name))?;
        let mut args = vec![self.parse_expr()?];
        while self.peek() == Some(&Token::Comma) {
            self.advance();
            args.push(self.parse_expr()?);
        }
        self.expect(Token::RParen, "after function arguments")?;
        if args.len() != func.arity() {
            return Err(Error::Config(format!(
                "Function {} takes {} argument(s), got {}",
                name,
                func.arity(),
                args.len()
            )));
        }
        Ok(Node::Call(func, args))
    }
}
