/// Recursive-descent parser for the grammar front-end.
///
/// Produces the `ast` statement/expression tree; `eval` walks it to
/// build the same graph as the line front-end.
use crate::ast::{Argument, Call, Expr, Script, Statement};
use crate::error::ParseError;
use crate::expression::ExprOp;
use crate::span::Span;
use crate::value::ValueData;

pub struct GrammarParser {
    input: Vec<char>,
    pos: usize,
}

impl GrammarParser {
    pub fn new(input: &str) -> Self {
        GrammarParser {
            input: input.chars().collect(),
            pos: 0,
        }
    }

    pub fn parse(&mut self) -> Result<Script, ParseError> {
        let mut statements = Vec::new();
        loop {
            self.skip_trivia();
            if self.is_eof() {
                break;
            }
            statements.push(self.parse_statement()?);
        }
        Ok(Script { statements })
    }

    fn parse_statement(&mut self) -> Result<Statement, ParseError> {
        let start = self.pos;
        let id = self.parse_identifier()?;
        self.skip_trivia();
        match self.peek_char() {
            Some('~') => {
                self.advance();
                self.skip_trivia();
                let distribution = self.parse_call()?;
                self.expect(';')?;
                Ok(Statement::Stochastic {
                    id,
                    distribution,
                    span: Span::new(start, self.pos),
                })
            }
            Some('=') => {
                self.advance();
                self.skip_trivia();
                let value = self.parse_expression()?;
                self.skip_trivia();
                self.expect(';')?;
                Ok(Statement::Deterministic {
                    id,
                    value,
                    span: Span::new(start, self.pos),
                })
            }
            Some(';') => {
                self.advance();
                Ok(Statement::Selection {
                    id,
                    span: Span::new(start, self.pos),
                })
            }
            _ => Err(self.invalid("expected '~', '=' or ';' after identifier", start)),
        }
    }

    fn parse_call(&mut self) -> Result<Call, ParseError> {
        let start = self.pos;
        let name = self.parse_identifier()?;
        self.skip_trivia();
        if self.peek_char() != Some('(') {
            return Err(self.invalid("expected '(' to open an argument list", start));
        }
        self.advance();
        let mut args = Vec::new();
        self.skip_trivia();
        if self.peek_char() != Some(')') {
            loop {
                args.push(self.parse_argument()?);
                self.skip_trivia();
                if self.peek_char() == Some(',') {
                    self.advance();
                    self.skip_trivia();
                } else {
                    break;
                }
            }
        }
        if self.peek_char() != Some(')') {
            return Err(ParseError::UnterminatedCall {
                span: Span::new(start, self.pos),
            });
        }
        self.advance();
        Ok(Call {
            name,
            args,
            span: Span::new(start, self.pos),
        })
    }

    /// `name=expr` or a bare positional expression. A lone `=` marks a
    /// named argument; `==` belongs to the expression.
    fn parse_argument(&mut self) -> Result<Argument, ParseError> {
        let start = self.pos;
        if self
            .peek_char()
            .map_or(false, |c| c.is_ascii_alphabetic() || c == '_')
        {
            let name = self.parse_identifier()?;
            self.skip_trivia();
            if self.peek_char() == Some('=') && self.peek_ahead(1) != Some('=') {
                self.advance();
                self.skip_trivia();
                let value = self.parse_expression()?;
                return Ok(Argument {
                    name: Some(name),
                    value,
                });
            }
            self.pos = start;
        }
        let value = self.parse_expression()?;
        Ok(Argument { name: None, value })
    }

    fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;
        loop {
            self.skip_trivia();
            if self.peek_two_chars() == Some(('|', '|')) {
                self.advance();
                self.advance();
                self.skip_trivia();
                let right = self.parse_and()?;
                left = binary(ExprOp::Or, left, right);
            } else {
                break;
            }
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_bit_or()?;
        loop {
            self.skip_trivia();
            if self.peek_two_chars() == Some(('&', '&')) {
                self.advance();
                self.advance();
                self.skip_trivia();
                let right = self.parse_bit_or()?;
                left = binary(ExprOp::And, left, right);
            } else {
                break;
            }
        }
        Ok(left)
    }

    fn parse_bit_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_bit_and()?;
        loop {
            self.skip_trivia();
            if self.peek_char() == Some('|') && self.peek_ahead(1) != Some('|') {
                self.advance();
                self.skip_trivia();
                let right = self.parse_bit_and()?;
                left = binary(ExprOp::BitOr, left, right);
            } else {
                break;
            }
        }
        Ok(left)
    }

    fn parse_bit_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_equality()?;
        loop {
            self.skip_trivia();
            if self.peek_char() == Some('&') && self.peek_ahead(1) != Some('&') {
                self.advance();
                self.skip_trivia();
                let right = self.parse_equality()?;
                left = binary(ExprOp::BitAnd, left, right);
            } else {
                break;
            }
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_comparison()?;
        self.skip_trivia();
        let op = if self.peek_two_chars() == Some(('=', '=')) {
            Some(ExprOp::Eq)
        } else if self.peek_two_chars() == Some(('!', '=')) {
            Some(ExprOp::Ne)
        } else {
            None
        };
        if let Some(op) = op {
            self.advance();
            self.advance();
            self.skip_trivia();
            let right = self.parse_comparison()?;
            Ok(binary(op, left, right))
        } else {
            Ok(left)
        }
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_range()?;
        self.skip_trivia();
        let op = if self.peek_two_chars() == Some(('<', '=')) {
            self.advance();
            self.advance();
            Some(ExprOp::Le)
        } else if self.peek_two_chars() == Some(('>', '=')) {
            self.advance();
            self.advance();
            Some(ExprOp::Ge)
        } else if self.peek_char() == Some('<') {
            self.advance();
            Some(ExprOp::Lt)
        } else if self.peek_char() == Some('>') {
            self.advance();
            Some(ExprOp::Gt)
        } else {
            None
        };
        if let Some(op) = op {
            self.skip_trivia();
            let right = self.parse_range()?;
            Ok(binary(op, left, right))
        } else {
            Ok(left)
        }
    }

    fn parse_range(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_additive()?;
        self.skip_trivia();
        if self.peek_char() == Some(':') {
            self.advance();
            self.skip_trivia();
            let right = self.parse_additive()?;
            Ok(binary(ExprOp::Range, left, right))
        } else {
            Ok(left)
        }
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            self.skip_trivia();
            let op = match self.peek_char() {
                Some('+') => ExprOp::Add,
                Some('-') => ExprOp::Sub,
                _ => break,
            };
            self.advance();
            self.skip_trivia();
            let right = self.parse_multiplicative()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_power()?;
        loop {
            self.skip_trivia();
            let op = match self.peek_char() {
                Some('*') if self.peek_ahead(1) != Some('*') => ExprOp::Mul,
                Some('/') if self.peek_ahead(1) != Some('/') => ExprOp::Div,
                Some('%') => ExprOp::Mod,
                _ => break,
            };
            self.advance();
            self.skip_trivia();
            let right = self.parse_power()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    /// `**` is right-associative.
    fn parse_power(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_unary()?;
        self.skip_trivia();
        if self.peek_two_chars() == Some(('*', '*')) {
            self.advance();
            self.advance();
            self.skip_trivia();
            let right = self.parse_power()?;
            Ok(binary(ExprOp::Pow, left, right))
        } else {
            Ok(left)
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        self.skip_trivia();
        if self.peek_char() == Some('!') && self.peek_ahead(1) != Some('=') {
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary {
                op: ExprOp::Not,
                operand: Box::new(operand),
            });
        }
        if self.peek_char() == Some('-')
            && self.peek_ahead(1).map_or(false, |c| c.is_ascii_digit())
        {
            self.advance();
            return match self.parse_number()? {
                ValueData::Integer(i) => Ok(Expr::Literal(ValueData::Integer(-i))),
                ValueData::Real(x) => Ok(Expr::Literal(ValueData::Real(-x))),
                _ => unreachable!("parse_number yields numbers"),
            };
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        loop {
            self.skip_trivia();
            if self.peek_char() == Some('[') {
                let start = self.pos;
                self.advance();
                let index = self.parse_expression()?;
                self.skip_trivia();
                if self.peek_char() != Some(']') {
                    return Err(self.invalid("expected ']' to close an index", start));
                }
                self.advance();
                expr = Expr::Index {
                    base: Box::new(expr),
                    index: Box::new(index),
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        self.skip_trivia();
        match self.peek_char() {
            None => Err(ParseError::UnexpectedEof),
            Some('"') => self.parse_string(),
            Some('(') => {
                let start = self.pos;
                self.advance();
                let expr = self.parse_expression()?;
                self.skip_trivia();
                if self.peek_char() != Some(')') {
                    return Err(self.invalid("expected ')' to close a group", start));
                }
                self.advance();
                Ok(expr)
            }
            Some('[') => self.parse_array(),
            Some(c) if c.is_ascii_digit() => self.parse_number().map(Expr::Literal),
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                let start = self.pos;
                let name = self.parse_identifier()?;
                self.skip_trivia();
                if self.peek_char() == Some('(') {
                    self.pos = start;
                    return self.parse_call().map(Expr::Call);
                }
                match name.as_str() {
                    "true" => Ok(Expr::Literal(ValueData::Boolean(true))),
                    "false" => Ok(Expr::Literal(ValueData::Boolean(false))),
                    _ => Ok(Expr::Identifier(name)),
                }
            }
            Some(_) => Err(self.invalid("expected an expression", self.pos)),
        }
    }

    fn parse_array(&mut self) -> Result<Expr, ParseError> {
        let start = self.pos;
        self.advance();
        let mut elements = Vec::new();
        self.skip_trivia();
        if self.peek_char() != Some(']') {
            loop {
                elements.push(self.parse_expression()?);
                self.skip_trivia();
                if self.peek_char() == Some(',') {
                    self.advance();
                    self.skip_trivia();
                } else {
                    break;
                }
            }
        }
        if self.peek_char() != Some(']') {
            return Err(self.invalid("expected ']' to close an array literal", start));
        }
        self.advance();
        Ok(Expr::Array { elements })
    }

    fn parse_string(&mut self) -> Result<Expr, ParseError> {
        let start = self.pos;
        self.advance();
        let mut s = String::new();
        while let Some(&ch) = self.peek_char_ref() {
            if ch == '"' {
                self.advance();
                return Ok(Expr::Literal(ValueData::Str(s)));
            }
            s.push(ch);
            self.advance();
        }
        Err(ParseError::UnterminatedString {
            span: Span::new(start, self.pos),
        })
    }

    fn parse_number(&mut self) -> Result<ValueData, ParseError> {
        let start = self.pos;
        let mut text = String::new();
        let mut is_real = false;
        while let Some(&ch) = self.peek_char_ref() {
            if ch.is_ascii_digit() {
                text.push(ch);
                self.advance();
            } else if ch == '.' && self.peek_ahead(1).map_or(false, |c| c.is_ascii_digit()) {
                is_real = true;
                text.push(ch);
                self.advance();
            } else if (ch == 'e' || ch == 'E') && !text.is_empty() {
                is_real = true;
                text.push(ch);
                self.advance();
                if let Some(sign @ ('+' | '-')) = self.peek_char() {
                    text.push(sign);
                    self.advance();
                }
            } else {
                break;
            }
        }
        if is_real {
            text.parse::<f64>()
                .map(ValueData::Real)
                .map_err(|_| self.invalid("malformed number", start))
        } else {
            text.parse::<i64>()
                .map(ValueData::Integer)
                .map_err(|_| self.invalid("malformed number", start))
        }
    }

    fn parse_identifier(&mut self) -> Result<String, ParseError> {
        let start = self.pos;
        let mut ident = String::new();
        if let Some(&ch) = self.peek_char_ref() {
            if ch.is_ascii_alphabetic() || ch == '_' {
                ident.push(ch);
                self.advance();
            }
        }
        while let Some(&ch) = self.peek_char_ref() {
            if ch.is_ascii_alphanumeric() || ch == '_' || ch == '.' {
                ident.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        if ident.is_empty() {
            return Err(self.invalid("expected an identifier", start));
        }
        Ok(ident)
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek_char() {
                Some(c) if c.is_whitespace() => self.advance(),
                Some('/') if self.peek_ahead(1) == Some('/') => {
                    while let Some(&ch) = self.peek_char_ref() {
                        if ch == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), ParseError> {
        self.skip_trivia();
        if self.peek_char() == Some(expected) {
            self.advance();
            Ok(())
        } else {
            Err(self.invalid(
                match expected {
                    ';' => "expected ';' to end the statement",
                    _ => "unexpected character",
                },
                self.pos,
            ))
        }
    }

    fn invalid(&self, message: &str, start: usize) -> ParseError {
        ParseError::InvalidSyntax {
            message: message.to_string(),
            span: Span::new(start, start + 1),
        }
    }

    fn advance(&mut self) {
        if self.pos < self.input.len() {
            self.pos += 1;
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn peek_char_ref(&self) -> Option<&char> {
        self.input.get(self.pos)
    }

    fn peek_ahead(&self, offset: usize) -> Option<char> {
        self.input.get(self.pos + offset).copied()
    }

    fn peek_two_chars(&self) -> Option<(char, char)> {
        if self.pos + 1 < self.input.len() {
            Some((self.input[self.pos], self.input[self.pos + 1]))
        } else {
            None
        }
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }
}

fn binary(op: ExprOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

pub fn parse(input: &str) -> Result<Script, ParseError> {
    let mut parser = GrammarParser::new(input);
    parser.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_forms() {
        let script = parse("p = 0.5;\nx ~ Bernoulli(p=p);\nx;").unwrap();
        assert_eq!(script.statements.len(), 3);
        assert!(matches!(
            script.statements[0],
            Statement::Deterministic { .. }
        ));
        assert!(matches!(script.statements[1], Statement::Stochastic { .. }));
        assert!(matches!(script.statements[2], Statement::Selection { .. }));
    }

    #[test]
    fn test_precedence() {
        let script = parse("y = a + b * c;").unwrap();
        let value = match &script.statements[0] {
            Statement::Deterministic { value, .. } => value,
            other => panic!("unexpected statement {:?}", other),
        };
        match value {
            Expr::Binary { op, right, .. } => {
                assert_eq!(*op, ExprOp::Add);
                assert!(matches!(
                    **right,
                    Expr::Binary {
                        op: ExprOp::Mul,
                        ..
                    }
                ));
            }
            other => panic!("unexpected expression {:?}", other),
        }
        assert_eq!(value.to_string(), "a+b*c");
    }

    #[test]
    fn test_power_is_right_associative() {
        let script = parse("y = a ** b ** c;").unwrap();
        let value = match &script.statements[0] {
            Statement::Deterministic { value, .. } => value,
            other => panic!("unexpected statement {:?}", other),
        };
        match value {
            Expr::Binary { op, right, .. } => {
                assert_eq!(*op, ExprOp::Pow);
                assert!(matches!(
                    **right,
                    Expr::Binary {
                        op: ExprOp::Pow,
                        ..
                    }
                ));
            }
            other => panic!("unexpected expression {:?}", other),
        }
    }

    #[test]
    fn test_named_and_positional_arguments() {
        let script = parse("x ~ Normal(0.0, sd=1.0);").unwrap();
        let call = match &script.statements[0] {
            Statement::Stochastic { distribution, .. } => distribution,
            other => panic!("unexpected statement {:?}", other),
        };
        assert_eq!(call.args.len(), 2);
        assert!(call.args[0].name.is_none());
        assert_eq!(call.args[1].name.as_deref(), Some("sd"));
    }

    #[test]
    fn test_range_index_and_array() {
        let script = parse("y = xs[0] + sum([1, 2, 3]) + length(1:5);").unwrap();
        assert_eq!(script.statements.len(), 1);
    }

    #[test]
    fn test_missing_semicolon() {
        let err = parse("x = 1").unwrap_err();
        assert!(matches!(err, ParseError::InvalidSyntax { .. }));
    }

    #[test]
    fn test_unterminated_call() {
        let err = parse("x ~ Normal(mean=0.0;").unwrap_err();
        assert!(matches!(err, ParseError::UnterminatedCall { .. }));
    }
}
