//! Lexer and evaluator for directive expressions
//!
//! ```text
//! expression := term [ '+' literal ]
//! term       := literal | operand [ '.' member ]
//! literal    := [ '-' ] ( decimal | 0x hex | float )
//! ```

use super::context::EvalContext;
use crate::types::{DecoderError, Result, Value};

/// Member offsets may reference other members; this bounds the recursion
pub(crate) const MAX_DEPTH: usize = 8;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(Value),
    Dot,
    Plus,
    Minus,
    End,
}

struct Lexer<'s> {
    src: &'s str,
    pos: usize,
}

impl<'s> Lexer<'s> {
    fn new(src: &'s str) -> Self {
        Self { src, pos: 0 }
    }

    fn peek_char(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) {
        if let Some(c) = self.peek_char() {
            self.pos += c.len_utf8();
        }
    }

    fn eat_while(&mut self, pred: impl Fn(char) -> bool) -> usize {
        let start = self.pos;
        while matches!(self.peek_char(), Some(c) if pred(c)) {
            self.bump();
        }
        self.pos - start
    }

    fn next_token(&mut self) -> Result<Token> {
        self.eat_while(char::is_whitespace);

        let Some(c) = self.peek_char() else {
            return Ok(Token::End);
        };

        match c {
            '.' => {
                self.bump();
                Ok(Token::Dot)
            }
            '+' => {
                self.bump();
                Ok(Token::Plus)
            }
            '-' => {
                self.bump();
                Ok(Token::Minus)
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = self.pos;
                self.eat_while(|c| c.is_ascii_alphanumeric() || c == '_');
                Ok(Token::Ident(self.src[start..self.pos].to_string()))
            }
            c if c.is_ascii_digit() => self.number(),
            other => Err(DecoderError::SyntaxError(format!(
                "unexpected character '{}' in '{}'",
                other, self.src
            ))),
        }
    }

    fn number(&mut self) -> Result<Token> {
        let start = self.pos;
        let rest = &self.src[self.pos..];

        if rest.starts_with("0x") || rest.starts_with("0X") {
            self.pos += 2;
            let digits = self.eat_while(|c| c.is_ascii_hexdigit());
            self.reject_suffix(start)?;
            let text = &self.src[start + 2..self.pos];
            if digits == 0 {
                return Err(self.malformed(start));
            }
            let value = u64::from_str_radix(text, 16).map_err(|_| self.malformed(start))?;
            return Ok(Token::Number(Value::Integer(value as i64)));
        }

        let mut is_float = false;
        self.eat_while(|c| c.is_ascii_digit());
        if self.peek_char() == Some('.') {
            is_float = true;
            self.bump();
            self.eat_while(|c| c.is_ascii_digit());
        }
        if matches!(self.peek_char(), Some('e') | Some('E')) {
            is_float = true;
            self.bump();
            if matches!(self.peek_char(), Some('+') | Some('-')) {
                self.bump();
            }
            if self.eat_while(|c| c.is_ascii_digit()) == 0 {
                return Err(self.malformed(start));
            }
        }
        self.reject_suffix(start)?;

        let text = &self.src[start..self.pos];
        if is_float {
            let value: f64 = text.parse().map_err(|_| self.malformed(start))?;
            Ok(Token::Number(Value::Float(value)))
        } else {
            let value: i64 = text.parse().map_err(|_| self.malformed(start))?;
            Ok(Token::Number(Value::Integer(value)))
        }
    }

    /// A literal must not run straight into letters or another dot
    fn reject_suffix(&mut self, start: usize) -> Result<()> {
        match self.peek_char() {
            Some(c) if c.is_ascii_alphanumeric() || c == '_' || c == '.' => {
                self.eat_while(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
                Err(self.malformed(start))
            }
            _ => Ok(()),
        }
    }

    fn malformed(&self, start: usize) -> DecoderError {
        DecoderError::SyntaxError(format!(
            "malformed numeric literal '{}'",
            &self.src[start..self.pos]
        ))
    }
}

struct Parser<'s, 'c, 'a> {
    lexer: Lexer<'s>,
    ctx: &'c EvalContext<'a>,
    depth: usize,
    current: Token,
}

impl<'s, 'c, 'a> Parser<'s, 'c, 'a> {
    fn advance(&mut self) -> Result<()> {
        self.current = self.lexer.next_token()?;
        Ok(())
    }

    fn expression(&mut self) -> Result<Value> {
        if self.current == Token::End {
            return Err(DecoderError::SyntaxError("empty expression".to_string()));
        }

        let mut value = self.term()?;
        if self.current == Token::Plus {
            self.advance()?;
            let bias = self.literal()?;
            value = value.add(bias);
        }

        if self.current != Token::End {
            return Err(DecoderError::SyntaxError(format!(
                "unexpected input after expression in '{}'",
                self.lexer.src
            )));
        }
        Ok(value)
    }

    fn term(&mut self) -> Result<Value> {
        match self.current.clone() {
            Token::Number(_) | Token::Minus => self.literal(),
            Token::Ident(name) => {
                self.advance()?;
                if self.current != Token::Dot {
                    return self
                        .ctx
                        .operand(&name)
                        .map(Value::Integer)
                        .ok_or_else(|| unknown_identifier(&name));
                }

                self.advance()?;
                let Token::Ident(member) = self.current.clone() else {
                    return Err(DecoderError::SyntaxError(format!(
                        "member name expected after '{}.'",
                        name
                    )));
                };
                self.advance()?;
                self.ctx.field(&name, &member, self.depth)
            }
            other => Err(DecoderError::SyntaxError(format!(
                "operand expected, found {:?}",
                other
            ))),
        }
    }

    fn literal(&mut self) -> Result<Value> {
        let negative = self.current == Token::Minus;
        if negative {
            self.advance()?;
        }

        let Token::Number(value) = self.current else {
            return Err(DecoderError::SyntaxError(format!(
                "numeric literal expected in '{}'",
                self.lexer.src
            )));
        };
        self.advance()?;

        Ok(match (negative, value) {
            (false, v) => v,
            (true, Value::Integer(i)) => Value::Integer(i.wrapping_neg()),
            (true, Value::Float(f)) => Value::Float(-f),
        })
    }
}

fn unknown_identifier(name: &str) -> DecoderError {
    DecoderError::SyntaxError(format!("unknown identifier '{}'", name))
}

/// Evaluate `expression` against the bindings of `ctx`
pub fn evaluate(expression: &str, ctx: &EvalContext<'_>) -> Result<Value> {
    evaluate_at_depth(expression, ctx, 0)
}

pub(crate) fn evaluate_at_depth(expression: &str, ctx: &EvalContext<'_>, depth: usize) -> Result<Value> {
    if depth > MAX_DEPTH {
        return Err(DecoderError::SyntaxError(format!(
            "offset expressions nested too deeply at '{}'",
            expression
        )));
    }

    let mut parser = Parser {
        lexer: Lexer::new(expression),
        ctx,
        depth,
        current: Token::End,
    };
    parser.advance()?;
    parser.expression()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{IntegerType, MemberDefinition, TypedefEntry, TypedefRegistry};
    use std::collections::BTreeMap;

    fn registry() -> TypedefRegistry {
        vec![
            TypedefEntry::new("Pair", 4, false)
                .with_member(MemberDefinition::new("b0", "0", IntegerType::U8))
                .with_member(MemberDefinition::new("b2", "2", IntegerType::U16))
                .with_member(MemberDefinition::new("signed", "0", IntegerType::I8))
                .with_member(MemberDefinition::new("indirect", "val2", IntegerType::U8))
                .with_member(MemberDefinition::new("wide", "2", IntegerType::U32))
                .with_member(MemberDefinition::new("loop", "val1.loop", IntegerType::U8)),
        ]
        .into_iter()
        .collect()
    }

    fn bindings() -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        map.insert("val1".to_string(), "Pair".to_string());
        map
    }

    #[test]
    fn test_literals() {
        let registry = TypedefRegistry::new();
        let ctx = EvalContext::new(&registry);
        assert_eq!(evaluate("42", &ctx).unwrap(), Value::Integer(42));
        assert_eq!(evaluate("0x1F", &ctx).unwrap(), Value::Integer(31));
        assert_eq!(evaluate("-7", &ctx).unwrap(), Value::Integer(-7));
        assert_eq!(evaluate("2.5", &ctx).unwrap(), Value::Float(2.5));
        assert_eq!(evaluate("1e3", &ctx).unwrap(), Value::Float(1000.0));
    }

    #[test]
    fn test_operands() {
        let registry = TypedefRegistry::new();
        let ctx = EvalContext::new(&registry).with_operands([257, 4711, -1, 0]);
        assert_eq!(evaluate("val1", &ctx).unwrap(), Value::Integer(257));
        assert_eq!(evaluate(" val2 ", &ctx).unwrap(), Value::Integer(4711));
        assert_eq!(evaluate("val3", &ctx).unwrap(), Value::Integer(-1));
    }

    #[test]
    fn test_trailing_bias() {
        let registry = TypedefRegistry::new();
        let ctx = EvalContext::new(&registry).with_operands([10, 0, 0, 0]);
        assert_eq!(evaluate("val1+0.5", &ctx).unwrap(), Value::Float(10.5));
        assert_eq!(evaluate("val1 + 2", &ctx).unwrap(), Value::Integer(12));
        assert!(evaluate("val1+val2", &ctx).is_err());
        assert!(evaluate("val1+1+1", &ctx).is_err());
    }

    #[test]
    fn test_member_access() {
        let registry = registry();
        let bindings = bindings();
        let ctx = EvalContext::new(&registry)
            .with_operands([0x1234_56FF, 1, 0, 0])
            .with_bindings(&bindings);

        assert_eq!(evaluate("val1.b0", &ctx).unwrap(), Value::Integer(0xFF));
        assert_eq!(evaluate("val1.b2", &ctx).unwrap(), Value::Integer(0x1234));
        assert_eq!(evaluate("val1.signed", &ctx).unwrap(), Value::Integer(-1));
        assert_eq!(evaluate("val1.indirect", &ctx).unwrap(), Value::Integer(0x56));
        assert_eq!(
            evaluate("val1.b2+0.234", &ctx).unwrap(),
            Value::Float(0x1234 as f64 + 0.234)
        );
    }

    #[test]
    fn test_field_errors() {
        let registry = registry();
        let bindings = bindings();
        let ctx = EvalContext::new(&registry).with_bindings(&bindings);

        assert!(matches!(
            evaluate("val1.missing", &ctx),
            Err(DecoderError::FieldNotFound(_))
        ));
        assert!(matches!(
            evaluate("val2.b0", &ctx),
            Err(DecoderError::FieldNotFound(_))
        ));
        assert!(matches!(
            evaluate("val1.wide", &ctx),
            Err(DecoderError::FieldNotFound(_))
        ));
        assert!(matches!(
            evaluate("val1.loop", &ctx),
            Err(DecoderError::SyntaxError(_))
        ));
    }

    #[test]
    fn test_syntax_errors() {
        let registry = TypedefRegistry::new();
        let ctx = EvalContext::new(&registry);
        for expr in ["", "foo", "12ab", "0x", "1.2.3", "val1 val2", "val1.", "#", "1e"] {
            assert!(
                matches!(evaluate(expr, &ctx), Err(DecoderError::SyntaxError(_))),
                "expected syntax error for '{}'",
                expr
            );
        }
    }
}
