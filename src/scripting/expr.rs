//! The small expression language used by `if`/`when` tests, `bind`, `foreach` collections and
//! `${}` substitutions.
//!
//! Literals (`null`, `true`, `false`, integers, floats, quoted strings), property paths,
//! comparisons (`==`, `!=`, `<`, `<=`, `>`, `>=` and the `eq`/`neq`/`lt`/`lte`/`gt`/`gte`
//! spellings), `and`/`&&`, `or`/`||`, `!`/`not`, and parentheses.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::error::SqlMapperError;
use crate::reflection::Argument;
use crate::types::RowValues;

use super::context::lookup;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Path(String),
    Int(i64),
    Float(f64),
    Str(String),
    Null,
    True,
    False,
    And,
    Or,
    Not,
    Cmp(CmpOp),
    LParen,
    RParen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Evaluate `expression` against `bindings`.
///
/// # Errors
///
/// Returns `SqlMapperError::ConfigError` on syntax errors or incomparable operands.
pub fn evaluate(
    expression: &str,
    bindings: &BTreeMap<String, Argument>,
) -> Result<Argument, SqlMapperError> {
    let tokens = tokenize(expression).map_err(|e| invalid(expression, &e))?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        bindings,
    };
    let value = parser.or_expr().map_err(|e| invalid(expression, &e))?;
    if parser.pos != parser.tokens.len() {
        return Err(invalid(expression, "unexpected trailing input"));
    }
    Ok(value)
}

/// Evaluate `expression` and apply [`is_truthy`].
///
/// # Errors
///
/// See [`evaluate`].
pub fn evaluate_bool(
    expression: &str,
    bindings: &BTreeMap<String, Argument>,
) -> Result<bool, SqlMapperError> {
    evaluate(expression, bindings).map(|v| is_truthy(&v))
}

/// Null, `false`, zero, empty strings and empty collections are false.
#[must_use]
pub fn is_truthy(value: &Argument) -> bool {
    match value {
        Argument::Null => false,
        Argument::Value(v) => match v {
            RowValues::Null => false,
            RowValues::Bool(b) => *b,
            RowValues::Int(i) => *i != 0,
            RowValues::Float(f) => *f != 0.0,
            RowValues::Text(s) => !s.is_empty(),
            RowValues::Blob(b) => !b.is_empty(),
            RowValues::JSON(json) => !json.is_null(),
            RowValues::Timestamp(_) => true,
        },
        Argument::List(items) => !items.is_empty(),
        Argument::Map(entries) => !entries.is_empty(),
        Argument::Record(_) => true,
    }
}

fn invalid(expression: &str, cause: &str) -> SqlMapperError {
    SqlMapperError::config(format!(
        "Error evaluating expression '{expression}'. Cause: {cause}"
    ))
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
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
            '\'' | '"' => {
                let (text, end) = quoted(&chars, i)?;
                tokens.push(Token::Str(text));
                i = end;
            }
            '=' if next == Some('=') => {
                tokens.push(Token::Cmp(CmpOp::Eq));
                i += 2;
            }
            '!' if next == Some('=') => {
                tokens.push(Token::Cmp(CmpOp::Ne));
                i += 2;
            }
            '!' => {
                tokens.push(Token::Not);
                i += 1;
            }
            '<' | '>' => {
                let or_equal = next == Some('=');
                let op = match (c, or_equal) {
                    ('<', false) => CmpOp::Lt,
                    ('<', true) => CmpOp::Le,
                    (_, false) => CmpOp::Gt,
                    (_, true) => CmpOp::Ge,
                };
                tokens.push(Token::Cmp(op));
                i += if or_equal { 2 } else { 1 };
            }
            '&' if next == Some('&') => {
                tokens.push(Token::And);
                i += 2;
            }
            '|' if next == Some('|') => {
                tokens.push(Token::Or);
                i += 2;
            }
            '-' if next.is_some_and(|n| n.is_ascii_digit()) && !ends_operand(tokens.last()) => {
                let (token, end) = number(&chars, i)?;
                tokens.push(token);
                i = end;
            }
            c if c.is_ascii_digit() => {
                let (token, end) = number(&chars, i)?;
                tokens.push(token);
                i = end;
            }
            c if c.is_alphabetic() || c == '_' => {
                let (word, end) = path(&chars, i)?;
                tokens.push(keyword(word));
                i = end;
            }
            other => return Err(format!("unexpected character '{other}' at position {i}")),
        }
    }
    Ok(tokens)
}

fn ends_operand(token: Option<&Token>) -> bool {
    matches!(
        token,
        Some(
            Token::Path(_)
                | Token::Int(_)
                | Token::Float(_)
                | Token::Str(_)
                | Token::Null
                | Token::True
                | Token::False
                | Token::RParen
        )
    )
}

fn keyword(word: String) -> Token {
    match word.as_str() {
        "null" => Token::Null,
        "true" => Token::True,
        "false" => Token::False,
        "and" => Token::And,
        "or" => Token::Or,
        "not" => Token::Not,
        "eq" => Token::Cmp(CmpOp::Eq),
        "neq" => Token::Cmp(CmpOp::Ne),
        "lt" => Token::Cmp(CmpOp::Lt),
        "lte" => Token::Cmp(CmpOp::Le),
        "gt" => Token::Cmp(CmpOp::Gt),
        "gte" => Token::Cmp(CmpOp::Ge),
        _ => Token::Path(word),
    }
}

fn quoted(chars: &[char], start: usize) -> Result<(String, usize), String> {
    let quote = chars[start];
    let mut out = String::new();
    let mut i = start + 1;
    while let Some(&c) = chars.get(i) {
        match c {
            '\\' => {
                if let Some(&escaped) = chars.get(i + 1) {
                    out.push(escaped);
                }
                i += 2;
            }
            c if c == quote => return Ok((out, i + 1)),
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    Err(format!("unterminated string starting at position {start}"))
}

fn number(chars: &[char], start: usize) -> Result<(Token, usize), String> {
    let mut end = start + 1;
    while chars
        .get(end)
        .is_some_and(|c| c.is_ascii_digit() || *c == '.')
    {
        end += 1;
    }
    let text: String = chars[start..end].iter().collect();
    if text.contains('.') {
        text.parse()
            .map(|f| (Token::Float(f), end))
            .map_err(|_| format!("invalid number '{text}'"))
    } else {
        text.parse()
            .map(|i| (Token::Int(i), end))
            .map_err(|_| format!("invalid number '{text}'"))
    }
}

fn path(chars: &[char], start: usize) -> Result<(String, usize), String> {
    let mut end = start;
    while let Some(&c) = chars.get(end) {
        if c.is_alphanumeric() || c == '_' || c == '.' {
            end += 1;
        } else if c == '[' {
            let close = chars[end..]
                .iter()
                .position(|&c| c == ']')
                .ok_or_else(|| format!("unclosed '[' at position {end}"))?;
            end += close + 1;
        } else {
            break;
        }
    }
    Ok((chars[start..end].iter().collect(), end))
}

struct Parser<'b> {
    tokens: Vec<Token>,
    pos: usize,
    bindings: &'b BTreeMap<String, Argument>,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn or_expr(&mut self) -> Result<Argument, String> {
        let mut lhs = self.and_expr()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let rhs = self.and_expr()?;
            lhs = Argument::from(is_truthy(&lhs) || is_truthy(&rhs));
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Argument, String> {
        let mut lhs = self.not_expr()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let rhs = self.not_expr()?;
            lhs = Argument::from(is_truthy(&lhs) && is_truthy(&rhs));
        }
        Ok(lhs)
    }

    fn not_expr(&mut self) -> Result<Argument, String> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            let value = self.not_expr()?;
            return Ok(Argument::from(!is_truthy(&value)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Argument, String> {
        let lhs = self.primary()?;
        if let Some(Token::Cmp(op)) = self.peek() {
            let op = *op;
            self.pos += 1;
            let rhs = self.primary()?;
            return compare(op, &lhs, &rhs).map(Argument::from);
        }
        Ok(lhs)
    }

    fn primary(&mut self) -> Result<Argument, String> {
        match self.advance() {
            Some(Token::Path(path)) => Ok(lookup(self.bindings, &path).cloned().unwrap_or_default()),
            Some(Token::Int(i)) => Ok(Argument::from(i)),
            Some(Token::Float(f)) => Ok(Argument::from(f)),
            Some(Token::Str(s)) => Ok(Argument::from(s)),
            Some(Token::Null) => Ok(Argument::Null),
            Some(Token::True) => Ok(Argument::from(true)),
            Some(Token::False) => Ok(Argument::from(false)),
            Some(Token::LParen) => {
                let value = self.or_expr()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(value),
                    _ => Err("expected ')'".to_string()),
                }
            }
            Some(other) => Err(format!("unexpected token {other:?}")),
            None => Err("unexpected end of expression".to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Number {
    Int(i64),
    Float(f64),
}

fn as_number(value: &Argument) -> Option<Number> {
    match value.as_value()? {
        RowValues::Int(i) => Some(Number::Int(*i)),
        RowValues::Float(f) => Some(Number::Float(*f)),
        _ => None,
    }
}

fn compare(op: CmpOp, lhs: &Argument, rhs: &Argument) -> Result<bool, String> {
    match op {
        CmpOp::Eq => return Ok(equals(lhs, rhs)),
        CmpOp::Ne => return Ok(!equals(lhs, rhs)),
        _ => {}
    }
    if lhs.is_null() || rhs.is_null() {
        return Ok(false);
    }
    let ordering = ordering(lhs, rhs)
        .ok_or_else(|| format!("cannot compare {} with {}", lhs.value_type(), rhs.value_type()))?;
    Ok(match op {
        CmpOp::Lt => ordering == Ordering::Less,
        CmpOp::Le => ordering != Ordering::Greater,
        CmpOp::Gt => ordering == Ordering::Greater,
        _ => ordering != Ordering::Less,
    })
}

fn equals(lhs: &Argument, rhs: &Argument) -> bool {
    if lhs.is_null() || rhs.is_null() {
        return lhs.is_null() && rhs.is_null();
    }
    if let (Some(a), Some(b)) = (as_number(lhs), as_number(rhs)) {
        return match (a, b) {
            (Number::Int(a), Number::Int(b)) => a == b,
            (Number::Int(a), Number::Float(b)) | (Number::Float(b), Number::Int(a)) => {
                (a as f64) == b
            }
            (Number::Float(a), Number::Float(b)) => a == b,
        };
    }
    lhs == rhs
}

fn ordering(lhs: &Argument, rhs: &Argument) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (as_number(lhs), as_number(rhs)) {
        return match (a, b) {
            (Number::Int(a), Number::Int(b)) => Some(a.cmp(&b)),
            (Number::Int(a), Number::Float(b)) => (a as f64).partial_cmp(&b),
            (Number::Float(a), Number::Int(b)) => a.partial_cmp(&(b as f64)),
            (Number::Float(a), Number::Float(b)) => a.partial_cmp(&b),
        };
    }
    match (lhs.as_value()?, rhs.as_value()?) {
        (RowValues::Text(a), RowValues::Text(b)) => Some(a.cmp(b)),
        (RowValues::Timestamp(a), RowValues::Timestamp(b)) => Some(a.cmp(b)),
        (RowValues::Bool(a), RowValues::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripting::context::PARAMETER_BINDING;

    fn bindings(arg: Argument) -> BTreeMap<String, Argument> {
        let mut map = BTreeMap::new();
        map.insert(PARAMETER_BINDING.to_string(), arg);
        map
    }

    fn truth(expr: &str, arg: Argument) -> bool {
        evaluate_bool(expr, &bindings(arg)).unwrap()
    }

    #[test]
    fn null_checks_and_string_compare() {
        let arg = Argument::map([("name", Argument::from("ann")), ("title", Argument::Null)]);
        assert!(truth("name != null and name != ''", arg.clone()));
        assert!(!truth("title != null", arg.clone()));
        assert!(truth("title == null || name == 'bob'", arg.clone()));
        assert!(truth("not (name == \"bob\")", arg));
    }

    #[test]
    fn numeric_comparisons_mix_ints_and_floats() {
        let arg = Argument::map([("age", Argument::from(30)), ("score", Argument::from(2.5))]);
        assert!(truth("age >= 18 && age lt 65", arg.clone()));
        assert!(truth("score > 2", arg.clone()));
        assert!(truth("age == 30.0", arg.clone()));
        assert!(truth("score > -1", arg));
    }

    #[test]
    fn paths_reach_into_lists() {
        let arg = Argument::map([("ids", Argument::from(vec![5, 6]))]);
        assert!(truth("ids", arg.clone()));
        assert!(truth("ids[1] == 6", arg.clone()));
        assert!(!truth("missing", arg));
    }

    #[test]
    fn truthiness_rules() {
        assert!(!is_truthy(&Argument::from("")));
        assert!(!is_truthy(&Argument::from(0)));
        assert!(!is_truthy(&Argument::List(vec![])));
        assert!(is_truthy(&Argument::from("0")));
    }

    #[test]
    fn syntax_errors_are_reported() {
        let b = bindings(Argument::Null);
        assert!(evaluate("(a == 1", &b).is_err());
        assert!(evaluate("a == 'x", &b).is_err());
        assert!(evaluate("a b", &b).is_err());
        assert!(evaluate("'x' < 1", &b).is_err());
    }
}
