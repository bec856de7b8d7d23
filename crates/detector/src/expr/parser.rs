//! Recursive-descent parser, one method per precedence level.

use super::token::{Spanned, Token};
use super::{BinaryOp, Expr, ExprError, UnaryOp};

/// Deepest nesting of parentheses and unary operators accepted.
pub(crate) const MAX_DEPTH: usize = 128;

/// Longest token stream accepted. Operator chains build left-deep trees,
/// so this bounds tree height where `MAX_DEPTH` does not.
pub(crate) const MAX_TOKENS: usize = 1024;

pub(crate) struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
}

impl Parser {
    pub(crate) fn new(tokens: Vec<Spanned>) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    pub(crate) fn parse(mut self) -> Result<Expr, ExprError> {
        if matches!(self.peek(), Token::Eof) {
            return Err(ExprError::new("empty expression", 0));
        }
        if self.tokens.len() > MAX_TOKENS {
            return Err(ExprError::new(
                format!("expression too long (more than {MAX_TOKENS} tokens)"),
                0,
            ));
        }
        let expr = self.parse_or()?;
        match self.peek() {
            Token::Eof => Ok(expr),
            other => Err(ExprError::new(
                format!("unexpected {} after complete expression", other.describe()),
                self.position(),
            )),
        }
    }

    fn peek(&self) -> &Token {
        // The tokenizer always terminates the stream with Eof.
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|(t, _)| t)
            .unwrap_or(&Token::Eof)
    }

    fn position(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|(_, p)| *p)
            .unwrap_or(0)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn parse_or(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_and()?;
        while matches!(self.peek(), Token::Or) {
            self.advance();
            let right = self.parse_and()?;
            left = binary(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_comparison()?;
        while matches!(self.peek(), Token::And) {
            self.advance();
            let right = self.parse_comparison()?;
            left = binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn comparison_op(&self) -> Option<BinaryOp> {
        match self.peek() {
            Token::Greater => Some(BinaryOp::Greater),
            Token::GreaterEq => Some(BinaryOp::GreaterEq),
            Token::Less => Some(BinaryOp::Less),
            Token::LessEq => Some(BinaryOp::LessEq),
            Token::Equal => Some(BinaryOp::Equal),
            Token::NotEqual => Some(BinaryOp::NotEqual),
            _ => None,
        }
    }

    /// Comparisons do not chain: `a < b < c` is rejected.
    fn parse_comparison(&mut self) -> Result<Expr, ExprError> {
        let left = self.parse_additive()?;
        let Some(op) = self.comparison_op() else {
            return Ok(left);
        };
        self.advance();
        let right = self.parse_additive()?;

        if self.comparison_op().is_some() {
            return Err(ExprError::new(
                "comparisons cannot be chained; combine them with '&&'",
                self.position(),
            ));
        }
        Ok(binary(op, left, right))
    }

    fn parse_additive(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = binary(op, left, right);
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_unary()?;
            left = binary(op, left, right);
        }
    }

    /// Every nested sub-expression passes through here, so the depth
    /// bound also keeps evaluation and formatting off deep recursion.
    fn parse_unary(&mut self) -> Result<Expr, ExprError> {
        if self.depth >= MAX_DEPTH {
            return Err(ExprError::new("expression nested too deeply", self.position()));
        }
        self.depth += 1;
        let parsed = self.parse_unary_inner();
        self.depth -= 1;
        parsed
    }

    fn parse_unary_inner(&mut self) -> Result<Expr, ExprError> {
        let op = match self.peek() {
            Token::Minus => UnaryOp::Neg,
            Token::Not => UnaryOp::Not,
            _ => return self.parse_primary(),
        };
        self.advance();
        let operand = self.parse_unary()?;

        // Fold negative literals so `-3` stays a plain number.
        if let (UnaryOp::Neg, Expr::Number(n)) = (op, &operand) {
            return Ok(Expr::Number(-n));
        }
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_primary(&mut self) -> Result<Expr, ExprError> {
        let position = self.position();
        match self.advance() {
            Token::Number(n) => Ok(Expr::Number(n)),
            Token::Str(s) => Ok(Expr::Str(s)),
            Token::True => Ok(Expr::Bool(true)),
            Token::False => Ok(Expr::Bool(false)),
            Token::Input { input, path } => Ok(Expr::Input { input, path }),
            Token::Variable(name) => Ok(Expr::Variable(name)),
            Token::LeftParen => {
                let inner = self.parse_or()?;
                match self.advance() {
                    Token::RightParen => Ok(inner),
                    other => Err(ExprError::new(
                        format!("expected ')' but found {}", other.describe()),
                        self.tokens
                            .get(self.pos.saturating_sub(1))
                            .map(|(_, p)| *p)
                            .unwrap_or(position),
                    )),
                }
            }
            other => Err(ExprError::new(
                format!("expected a value but found {}", other.describe()),
                position,
            )),
        }
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Expr {
        Expr::parse(s).unwrap()
    }

    fn num(n: f64) -> Box<Expr> {
        Box::new(Expr::Number(n))
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        assert_eq!(
            parse("1 + 2 * 3"),
            Expr::Binary {
                op: BinaryOp::Add,
                left: num(1.0),
                right: Box::new(Expr::Binary {
                    op: BinaryOp::Mul,
                    left: num(2.0),
                    right: num(3.0),
                }),
            }
        );
    }

    #[test]
    fn subtraction_is_left_associative() {
        assert_eq!(
            parse("10 - 3 - 2"),
            Expr::Binary {
                op: BinaryOp::Sub,
                left: Box::new(Expr::Binary {
                    op: BinaryOp::Sub,
                    left: num(10.0),
                    right: num(3.0),
                }),
                right: num(2.0),
            }
        );
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let expr = parse("true || false && false");
        match expr {
            Expr::Binary { op: BinaryOp::Or, right, .. } => {
                assert!(matches!(*right, Expr::Binary { op: BinaryOp::And, .. }));
            }
            other => panic!("expected Or at the root, got {other:?}"),
        }
    }

    #[test]
    fn parentheses_override_precedence() {
        assert_eq!(parse("(1 + 2) * 3").to_string(), "((1 + 2) * 3)");
    }

    #[test]
    fn unary_minus_folds_literals() {
        assert_eq!(parse("-3"), Expr::Number(-3.0));
        assert_eq!(parse("--3"), Expr::Number(3.0));
        assert!(matches!(
            parse("-$variable.x"),
            Expr::Unary { op: UnaryOp::Neg, .. }
        ));
    }

    #[test]
    fn source_model_expressions_parse() {
        for source in [
            "$input.PressureInput.sensorData.pressure > 70",
            "$input.PressureInput.sensorData.pressure <= 70",
            "$variable.pressureThresholdBreached + 3",
            "$variable.pressureThresholdBreached - 1",
            "$variable.pressureThresholdBreached > 1",
            "$variable.pressureThresholdBreached <= 1",
            "true",
        ] {
            assert!(Expr::parse(source).is_ok(), "failed to parse {source}");
        }
    }

    #[test]
    fn rejects_malformed_expressions() {
        for source in [
            "",
            "   ",
            "1 +",
            "(1 + 2",
            "1 + 2)",
            "1 < 2 < 3",
            "> 3",
            "1 2",
            "&& true",
        ] {
            assert!(Expr::parse(source).is_err(), "accepted {source:?}");
        }
    }

    #[test]
    fn chained_comparison_message() {
        let err = Expr::parse("1 < 2 < 3").unwrap_err();
        assert!(err.message.contains("chained"));
        assert_eq!(err.position, 6);
    }

    #[test]
    fn deep_nesting_is_rejected() {
        for depth in [MAX_DEPTH + 1, 300] {
            let source = format!("{}1 > 0{}", "(".repeat(depth), ")".repeat(depth));
            let err = Expr::parse(&source).unwrap_err();
            assert!(err.message.contains("nested too deeply"), "{err}");
        }

        let nots = format!("{}true", "!".repeat(MAX_DEPTH + 10));
        assert!(Expr::parse(&nots).unwrap_err().message.contains("nested too deeply"));

        // Far past either bound: still an error, never a crash.
        for depth in [2_000, 50_000] {
            let source = format!("{}1 > 0{}", "(".repeat(depth), ")".repeat(depth));
            assert!(Expr::parse(&source).is_err());
        }
    }

    #[test]
    fn long_operator_chains_are_rejected() {
        let source = format!("1{}", " + 1".repeat(MAX_TOKENS));
        let err = Expr::parse(&source).unwrap_err();
        assert!(err.message.contains("too long"), "{err}");
    }

    #[test]
    fn moderate_nesting_is_accepted() {
        let depth = MAX_DEPTH / 2;
        let source = format!("{}1 > 0{}", "(".repeat(depth), ")".repeat(depth));
        assert!(Expr::parse(&source).is_ok());
    }
}
