//! Expression language shared by scripted parameters and row conditions.
//!
//! Grammar (lowest to highest precedence):
//!
//! ```text
//! or         = and (("||" | "or") and)*
//! and        = comparison (("&&" | "and") comparison)*
//! comparison = unary (("==" | "!=" | "<" | "<=" | ">" | ">=" | "in") unary)?
//! unary      = ("!" | "not" | "-") unary | primary
//! primary    = literal | path | "?" digits | "[" (or ("," or)*)? "]" | "(" or ")"
//! path       = ident ("." ident)*
//! literal    = int | float | "string" | 'string' | true | false | null
//! ```
//!
//! Parameters are 1-based (`?1` is the first positional value).

use serde_json::{Number, Value};

use crate::error::{Result, ScriptError};

/// Parsed expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Path(Vec<String>),
    Param(usize),
    List(Vec<Expr>),
    Not(Box<Expr>),
    Neg(Box<Expr>),
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    In {
        element: Box<Expr>,
        collection: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl Expr {
    /// Highest positional parameter referenced, or 0 if none.
    pub fn max_param(&self) -> usize {
        match self {
            Expr::Literal(_) | Expr::Path(_) => 0,
            Expr::Param(n) => *n,
            Expr::List(items) => items.iter().map(Expr::max_param).max().unwrap_or(0),
            Expr::Not(inner) | Expr::Neg(inner) => inner.max_param(),
            Expr::Binary { left, right, .. } => left.max_param().max(right.max_param()),
            Expr::In {
                element,
                collection,
            } => element.max_param().max(collection.max_param()),
        }
    }
}

/// Parse an expression string into a tree.
pub fn parse_expression(source: &str) -> Result<Expr> {
    let tokens = tokenize(source)?;
    if tokens.is_empty() {
        return Err(ScriptError::syntax(source, "empty expression"));
    }
    let mut parser = Parser {
        source,
        tokens,
        pos: 0,
        nesting: 0,
    };
    let (expr, _) = parser.parse_or()?;
    if let Some(tok) = parser.peek() {
        return Err(ScriptError::syntax(
            source,
            format!("unexpected token {tok:?} after end of expression"),
        ));
    }
    Ok(expr)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    Param(usize),
    True,
    False,
    Null,
    Dot,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Not,
    Minus,
    In,
}

fn tokenize(source: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    let next_is = |i: usize, c: char| chars.get(i + 1) == Some(&c);

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
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
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '=' if next_is(i, '=') => {
                tokens.push(Token::Eq);
                i += 2;
            }
            '!' if next_is(i, '=') => {
                tokens.push(Token::Ne);
                i += 2;
            }
            '!' => {
                tokens.push(Token::Not);
                i += 1;
            }
            '<' if next_is(i, '=') => {
                tokens.push(Token::Le);
                i += 2;
            }
            '<' => {
                tokens.push(Token::Lt);
                i += 1;
            }
            '>' if next_is(i, '=') => {
                tokens.push(Token::Ge);
                i += 2;
            }
            '>' => {
                tokens.push(Token::Gt);
                i += 1;
            }
            '&' if next_is(i, '&') => {
                tokens.push(Token::And);
                i += 2;
            }
            '|' if next_is(i, '|') => {
                tokens.push(Token::Or);
                i += 2;
            }
            '?' => {
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && chars[end].is_ascii_digit() {
                    end += 1;
                }
                let digits: String = chars[start..end].iter().collect();
                let index: usize = digits.parse().map_err(|_| {
                    ScriptError::syntax(source, "`?` must be followed by a parameter number")
                })?;
                if index == 0 {
                    return Err(ScriptError::syntax(source, "parameters are numbered from ?1"));
                }
                tokens.push(Token::Param(index));
                i = end;
            }
            '"' | '\'' => {
                let quote = c;
                let mut text = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => {
                            return Err(ScriptError::syntax(source, "unterminated string literal"))
                        }
                        Some('\\') => {
                            if let Some(&escaped) = chars.get(i + 1) {
                                text.push(escaped);
                            }
                            i += 2;
                        }
                        Some(&ch) if ch == quote => {
                            i += 1;
                            break;
                        }
                        Some(&ch) => {
                            text.push(ch);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::Str(text));
            }
            c if c.is_ascii_digit() => {
                let start = i;
                let mut is_float = false;
                while i < chars.len() {
                    if chars[i].is_ascii_digit() {
                        i += 1;
                    } else if chars[i] == '.'
                        && !is_float
                        && chars.get(i + 1).is_some_and(|d| d.is_ascii_digit())
                    {
                        is_float = true;
                        i += 1;
                    } else {
                        break;
                    }
                }
                let text: String = chars[start..i].iter().collect();
                if is_float {
                    let f: f64 = text.parse().map_err(|_| {
                        ScriptError::syntax(source, format!("invalid float `{text}`"))
                    })?;
                    tokens.push(Token::Float(f));
                } else {
                    let n: i64 = text.parse().map_err(|_| {
                        ScriptError::syntax(source, format!("invalid integer `{text}`"))
                    })?;
                    tokens.push(Token::Int(n));
                }
            }
            c if c.is_alphabetic() || c == '_' || c == '$' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '$')
                {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(match word.as_str() {
                    "true" => Token::True,
                    "false" => Token::False,
                    "null" => Token::Null,
                    "in" => Token::In,
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    _ => Token::Ident(word),
                });
            }
            other => {
                return Err(ScriptError::syntax(
                    source,
                    format!("unexpected character `{other}`"),
                ));
            }
        }
    }

    Ok(tokens)
}

/// Deepest expression tree the parser accepts. Evaluation and SQL lowering
/// recurse over the tree, so this also bounds their stack use.
pub const MAX_DEPTH: usize = 256;

/// A parsed subtree and its height.
type Node = (Expr, usize);

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    nesting: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<()> {
        if self.eat(&expected) {
            Ok(())
        } else {
            Err(ScriptError::syntax(self.source, format!("expected {what}")))
        }
    }

    fn too_deep(&self) -> ScriptError {
        ScriptError::syntax(self.source, "expression nested too deeply")
    }

    /// Height of a node whose tallest child has height `child`.
    fn parent_of(&self, child: usize) -> Result<usize> {
        let height = child + 1;
        if height > MAX_DEPTH {
            return Err(self.too_deep());
        }
        Ok(height)
    }

    /// Run `f` one parser recursion level deeper.
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.nesting >= MAX_DEPTH {
            return Err(self.too_deep());
        }
        self.nesting += 1;
        let result = f(self);
        self.nesting -= 1;
        result
    }

    fn parse_or(&mut self) -> Result<Node> {
        let (mut left, mut height) = self.parse_and()?;
        while self.eat(&Token::Or) {
            let (right, right_height) = self.parse_and()?;
            height = self.parent_of(height.max(right_height))?;
            left = binary(BinOp::Or, left, right);
        }
        Ok((left, height))
    }

    fn parse_and(&mut self) -> Result<Node> {
        let (mut left, mut height) = self.parse_comparison()?;
        while self.eat(&Token::And) {
            let (right, right_height) = self.parse_comparison()?;
            height = self.parent_of(height.max(right_height))?;
            left = binary(BinOp::And, left, right);
        }
        Ok((left, height))
    }

    fn parse_comparison(&mut self) -> Result<Node> {
        let (left, left_height) = self.parse_unary()?;
        let op = match self.peek() {
            Some(Token::Eq) => BinOp::Eq,
            Some(Token::Ne) => BinOp::Ne,
            Some(Token::Lt) => BinOp::Lt,
            Some(Token::Le) => BinOp::Le,
            Some(Token::Gt) => BinOp::Gt,
            Some(Token::Ge) => BinOp::Ge,
            Some(Token::In) => {
                self.advance();
                let (collection, right_height) = self.parse_unary()?;
                let height = self.parent_of(left_height.max(right_height))?;
                let expr = Expr::In {
                    element: Box::new(left),
                    collection: Box::new(collection),
                };
                return Ok((expr, height));
            }
            _ => return Ok((left, left_height)),
        };
        self.advance();
        let (right, right_height) = self.parse_unary()?;
        let height = self.parent_of(left_height.max(right_height))?;
        Ok((binary(op, left, right), height))
    }

    fn parse_unary(&mut self) -> Result<Node> {
        if self.eat(&Token::Not) {
            let (inner, height) = self.nested(Self::parse_unary)?;
            return Ok((Expr::Not(Box::new(inner)), self.parent_of(height)?));
        }
        if self.eat(&Token::Minus) {
            return match self.nested(Self::parse_unary)? {
                (Expr::Literal(Value::Number(n)), height) => {
                    Ok((Expr::Literal(negate(&n)), height))
                }
                (other, height) => Ok((Expr::Neg(Box::new(other)), self.parent_of(height)?)),
            };
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Node> {
        let leaf = match self.advance() {
            Some(Token::Int(n)) => Expr::Literal(Value::from(n)),
            Some(Token::Float(f)) => {
                Expr::Literal(Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null))
            }
            Some(Token::Str(s)) => Expr::Literal(Value::String(s)),
            Some(Token::True) => Expr::Literal(Value::Bool(true)),
            Some(Token::False) => Expr::Literal(Value::Bool(false)),
            Some(Token::Null) => Expr::Literal(Value::Null),
            Some(Token::Param(n)) => Expr::Param(n),
            Some(Token::Ident(first)) => {
                let mut segments = vec![first];
                while self.eat(&Token::Dot) {
                    match self.advance() {
                        Some(Token::Ident(seg)) => segments.push(seg),
                        Some(Token::Int(idx)) if idx >= 0 => segments.push(idx.to_string()),
                        _ => {
                            return Err(ScriptError::syntax(
                                self.source,
                                "expected a field name after `.`",
                            ))
                        }
                    }
                }
                Expr::Path(segments)
            }
            Some(Token::LParen) => {
                let inner = self.nested(Self::parse_or)?;
                self.expect(Token::RParen, "closing parenthesis `)`")?;
                return Ok(inner);
            }
            Some(Token::LBracket) => {
                let mut items = Vec::new();
                let mut height = 0;
                if !self.eat(&Token::RBracket) {
                    loop {
                        let (item, item_height) = self.nested(Self::parse_or)?;
                        items.push(item);
                        height = height.max(item_height);
                        if self.eat(&Token::Comma) {
                            continue;
                        }
                        self.expect(Token::RBracket, "closing bracket `]`")?;
                        break;
                    }
                }
                return Ok((Expr::List(items), self.parent_of(height)?));
            }
            Some(tok) => {
                return Err(ScriptError::syntax(
                    self.source,
                    format!("unexpected token {tok:?}"),
                ))
            }
            None => return Err(ScriptError::syntax(self.source, "unexpected end of expression")),
        };
        Ok((leaf, 1))
    }
}

fn binary(op: BinOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

/// Arithmetic negation. `i64::MIN` has no integer negation and widens to a
/// float.
pub(crate) fn negate(n: &Number) -> Value {
    if let Some(negated) = n.as_i64().and_then(i64::checked_neg) {
        return Value::from(negated);
    }
    n.as_f64()
        .and_then(|f| Number::from_f64(-f))
        .map(Value::Number)
        .unwrap_or(Value::Null)
}
