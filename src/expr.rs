//! Embedded boolean expression language for `Expression` conditions.
//!
//! Grammar (lowest precedence first):
//!
//! ```text
//! or      := and (("||" | "or") and)*
//! and     := unary (("&&" | "and") unary)*
//! unary   := ("!" | "not") unary | primary
//! primary := "true" | "false" | IDENT | "(" or ")"
//! IDENT   := [A-Za-z_][A-Za-z0-9_]* ("?" | "!")?
//! ```
//!
//! Identifiers name predicates resolved by the caller. Nothing else can be
//! reached from an expression: no calls, no assignment, no host code.
//!
//! Runs of `&&` and `||` parse into flat n-ary nodes, so only parentheses and
//! negation add nesting. Evaluation is stack-based (non-recursive).

use thiserror::Error;

use crate::error::EvaluationError;

/// Nesting limit for parenthesized and negated sub-expressions.
pub const MAX_EXPRESSION_DEPTH: usize = 64;

/// Errors raised while parsing an expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpressionError {
    /// A character that cannot start any token.
    #[error("unexpected character `{ch}` at offset {offset}")]
    UnexpectedChar {
        /// The offending character.
        ch: char,
        /// Byte offset in the source.
        offset: usize,
    },

    /// A token in a position the grammar does not allow.
    #[error("unexpected `{found}` at offset {offset}")]
    UnexpectedToken {
        /// Rendering of the token.
        found: String,
        /// Byte offset in the source.
        offset: usize,
    },

    /// The source ended in the middle of an expression.
    #[error("unexpected end of expression")]
    UnexpectedEnd,

    /// Nesting exceeds [`MAX_EXPRESSION_DEPTH`].
    #[error("expression nested deeper than {max}")]
    TooDeep {
        /// The limit.
        max: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token<'a> {
    Ident(&'a str),
    True,
    False,
    Not,
    And,
    Or,
    LParen,
    RParen,
}

impl Token<'_> {
    fn describe(&self) -> String {
        match self {
            Token::Ident(name) => (*name).to_string(),
            Token::True => "true".to_string(),
            Token::False => "false".to_string(),
            Token::Not => "!".to_string(),
            Token::And => "&&".to_string(),
            Token::Or => "||".to_string(),
            Token::LParen => "(".to_string(),
            Token::RParen => ")".to_string(),
        }
    }
}

fn tokenize(source: &str) -> Result<Vec<(Token<'_>, usize)>, ExpressionError> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b' ' | b'\t' | b'\n' | b'\r' => i += 1,
            b'(' => {
                tokens.push((Token::LParen, i));
                i += 1;
            }
            b')' => {
                tokens.push((Token::RParen, i));
                i += 1;
            }
            b'!' => {
                tokens.push((Token::Not, i));
                i += 1;
            }
            b'&' | b'|' => {
                if bytes.get(i + 1) != Some(&b) {
                    return Err(ExpressionError::UnexpectedChar {
                        ch: b as char,
                        offset: i,
                    });
                }
                let token = if b == b'&' { Token::And } else { Token::Or };
                tokens.push((token, i));
                i += 2;
            }
            b if b.is_ascii_alphabetic() || b == b'_' => {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                // Trailing `?` or `!` is part of the name.
                if i < bytes.len() && (bytes[i] == b'?' || bytes[i] == b'!') {
                    i += 1;
                }
                let word = &source[start..i];
                let token = match word {
                    "true" => Token::True,
                    "false" => Token::False,
                    "not" => Token::Not,
                    "and" => Token::And,
                    "or" => Token::Or,
                    _ => Token::Ident(word),
                };
                tokens.push((token, start));
            }
            _ => {
                let ch = source[i..].chars().next().unwrap_or('\u{fffd}');
                return Err(ExpressionError::UnexpectedChar { ch, offset: i });
            }
        }
    }

    Ok(tokens)
}

/// A parsed expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
    /// Literal `true` or `false`.
    Literal(bool),
    /// A predicate reference.
    Predicate(String),
    /// Negation.
    Not(Box<Expression>),
    /// Short-circuit conjunction of two or more operands.
    All(Vec<Expression>),
    /// Short-circuit disjunction of two or more operands.
    Any(Vec<Expression>),
}

struct Parser<'a> {
    tokens: Vec<(Token<'a>, usize)>,
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token<'a>> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn next(&mut self) -> Option<(Token<'a>, usize)> {
        let item = self.tokens.get(self.pos).cloned();
        if item.is_some() {
            self.pos += 1;
        }
        item
    }

    fn enter(&mut self) -> Result<(), ExpressionError> {
        self.depth += 1;
        if self.depth > MAX_EXPRESSION_DEPTH {
            return Err(ExpressionError::TooDeep {
                max: MAX_EXPRESSION_DEPTH,
            });
        }
        Ok(())
    }

    fn or(&mut self) -> Result<Expression, ExpressionError> {
        let mut operands = vec![self.and()?];
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            operands.push(self.and()?);
        }
        Ok(flatten(operands, Expression::Any))
    }

    fn and(&mut self) -> Result<Expression, ExpressionError> {
        let mut operands = vec![self.unary()?];
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            operands.push(self.unary()?);
        }
        Ok(flatten(operands, Expression::All))
    }

    fn unary(&mut self) -> Result<Expression, ExpressionError> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            self.enter()?;
            let inner = self.unary()?;
            self.depth -= 1;
            return Ok(Expression::Not(Box::new(inner)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expression, ExpressionError> {
        match self.next() {
            None => Err(ExpressionError::UnexpectedEnd),
            Some((Token::True, _)) => Ok(Expression::Literal(true)),
            Some((Token::False, _)) => Ok(Expression::Literal(false)),
            Some((Token::Ident(name), _)) => Ok(Expression::Predicate(name.to_string())),
            Some((Token::LParen, _)) => {
                self.enter()?;
                let inner = self.or()?;
                self.depth -= 1;
                match self.next() {
                    Some((Token::RParen, _)) => Ok(inner),
                    Some((token, offset)) => Err(ExpressionError::UnexpectedToken {
                        found: token.describe(),
                        offset,
                    }),
                    None => Err(ExpressionError::UnexpectedEnd),
                }
            }
            Some((token, offset)) => Err(ExpressionError::UnexpectedToken {
                found: token.describe(),
                offset,
            }),
        }
    }
}

fn flatten(mut operands: Vec<Expression>, node: fn(Vec<Expression>) -> Expression) -> Expression {
    match operands.pop() {
        Some(only) if operands.is_empty() => only,
        Some(last) => {
            operands.push(last);
            node(operands)
        }
        None => node(operands),
    }
}

impl Expression {
    /// Parse an expression from source text.
    pub fn parse(source: &str) -> Result<Expression, ExpressionError> {
        let mut parser = Parser {
            tokens: tokenize(source)?,
            pos: 0,
            depth: 0,
        };
        let expr = parser.or()?;
        match parser.next() {
            None => Ok(expr),
            Some((token, offset)) => Err(ExpressionError::UnexpectedToken {
                found: token.describe(),
                offset,
            }),
        }
    }

    /// Evaluate against a predicate lookup. Operands are evaluated left to
    /// right and `&&`/`||` short-circuit, so a predicate is only invoked when
    /// its value can still change the result.
    pub fn evaluate<F>(&self, lookup: &mut F) -> Result<bool, EvaluationError>
    where
        F: FnMut(&str) -> Result<bool, EvaluationError>,
    {
        enum Frame<'e> {
            Eval(&'e Expression),
            All(std::slice::Iter<'e, Expression>),
            Any(std::slice::Iter<'e, Expression>),
            Not,
        }

        let mut stack = vec![Frame::Eval(self)];
        let mut last = false;

        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Eval(expr) => match expr {
                    Expression::Literal(value) => last = *value,
                    Expression::Predicate(name) => last = lookup(name.as_str())?,
                    Expression::Not(inner) => {
                        stack.push(Frame::Not);
                        stack.push(Frame::Eval(inner));
                    }
                    Expression::All(operands) => {
                        last = true;
                        stack.push(Frame::All(operands.iter()));
                    }
                    Expression::Any(operands) => {
                        last = false;
                        stack.push(Frame::Any(operands.iter()));
                    }
                },
                Frame::All(mut rest) => {
                    if last {
                        if let Some(next) = rest.next() {
                            stack.push(Frame::All(rest));
                            stack.push(Frame::Eval(next));
                        }
                    }
                }
                Frame::Any(mut rest) => {
                    if !last {
                        if let Some(next) = rest.next() {
                            stack.push(Frame::Any(rest));
                            stack.push(Frame::Eval(next));
                        }
                    }
                }
                Frame::Not => last = !last,
            }
        }

        Ok(last)
    }
}

/// Expression text together with its parse result.
///
/// Parsed once when the condition is declared. A syntax error is kept and
/// reported when the rule set is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledExpression {
    source: String,
    parsed: Result<Expression, ExpressionError>,
}

impl CompiledExpression {
    /// Parse `source`.
    pub fn new(source: impl Into<String>) -> Self {
        let source = source.into();
        let parsed = Expression::parse(&source);
        CompiledExpression { source, parsed }
    }

    /// The original text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The syntax error, if the text did not parse.
    pub fn error(&self) -> Option<&ExpressionError> {
        self.parsed.as_ref().err()
    }

    /// The parsed tree, or the syntax error wrapped with the source text.
    pub fn expression(&self) -> Result<&Expression, EvaluationError> {
        self.parsed
            .as_ref()
            .map_err(|e| EvaluationError::expression(self.source.as_str(), e.clone()))
    }
}

/// Parse and evaluate `source` in one step.
pub fn evaluate<F>(source: &str, mut lookup: F) -> Result<bool, EvaluationError>
where
    F: FnMut(&str) -> Result<bool, EvaluationError>,
{
    let expr = Expression::parse(source).map_err(|e| EvaluationError::expression(source, e))?;
    expr.evaluate(&mut lookup)
}
