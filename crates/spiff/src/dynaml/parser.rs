//! recursive descent parser for dynaml
//!
//! Precedence, lowest first:
//!
//! | level          | syntax                                    |
//! |----------------|-------------------------------------------|
//! | conditional    | `a ? b : c` (right associative)           |
//! | fallback       | `a \|\| b`                                |
//! | logical        | `a -and b`, `a -or b`                     |
//! | comparison     | `==` `!=` `<` `<=` `>` `>=`               |
//! | additive       | `+` `-` and concatenation (`a b`)         |
//! | multiplicative | `*` `/` `%`                               |
//! | unary          | `!a`, `-a`                                |
//! | postfix        | calls `f(a, b)`                           |
//! | primary        | literals, lists, references, `(a)`, keywords |
//!
//! `merge` and `auto` capture the document path of the node they are parsed for.
use super::lexer::{tokenize, Spanned, Token};
use super::{BinaryOp, Expression, LambdaExpr, MergeExpr};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{rule}: {message} (line {line}, column {column})")]
pub struct ParseError {
    pub rule: &'static str,
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl ParseError {
    pub(crate) fn new(
        rule: &'static str,
        message: impl Into<String>,
        line: usize,
        column: usize,
    ) -> Self {
        Self {
            rule,
            message: message.into(),
            line,
            column,
        }
    }
}

type Result<T> = std::result::Result<T, ParseError>;

/// Parse dynaml `source` found at document `path`
pub fn parse(source: &str, path: &[String]) -> Result<Expression> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        path,
    };

    let expression = parser.expression()?;
    if parser.peek() != &Token::End {
        return Err(parser.error("expression", format!("unexpected {:?}", parser.peek())));
    }

    Ok(expression)
}

struct Parser<'p> {
    tokens: Vec<Spanned>,
    pos: usize,
    path: &'p [String],
}

impl<'p> Parser<'p> {
    fn current(&self) -> &Spanned {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek(&self) -> &Token {
        &self.current().token
    }

    fn peek_at(&self, offset: usize) -> Option<&Spanned> {
        self.tokens.get(self.pos + offset)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == token {
            self.advance();
            return true;
        }
        false
    }

    fn expect(&mut self, token: &Token, rule: &'static str) -> Result<()> {
        if self.eat(token) {
            return Ok(());
        }
        Err(self.error(rule, format!("expected {token:?}, got {:?}", self.peek())))
    }

    /// the current token directly follows the previous one
    fn adjacent(&self) -> bool {
        !self.current().spaced
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Token::Identifier(name) if name == keyword)
    }

    fn error(&self, rule: &'static str, message: impl Into<String>) -> ParseError {
        let current = self.current();
        ParseError::new(rule, message, current.line, current.column)
    }

    /// tokens that may start an operand of a concatenation
    fn starts_operand(token: &Token) -> bool {
        matches!(
            token,
            Token::Integer(_)
                | Token::String(_)
                | Token::Identifier(_)
                | Token::LParen
                | Token::LBracket
                | Token::Dot
                | Token::Bang
        )
    }

    fn expression(&mut self) -> Result<Expression> {
        if self.at_keyword("prefer")
            && self
                .peek_at(1)
                .is_some_and(|next| Self::starts_operand(&next.token) || next.token == Token::Minus)
        {
            self.advance();
            let inner = self.conditional()?;
            return Ok(Expression::Prefer(Box::new(inner)));
        }
        self.conditional()
    }

    fn conditional(&mut self) -> Result<Expression> {
        let condition = self.fallback()?;
        if !self.eat(&Token::Question) {
            return Ok(condition);
        }

        let then = self.expression()?;
        self.expect(&Token::Colon, "conditional")?;
        let otherwise = self.expression()?;

        Ok(Expression::Conditional(
            Box::new(condition),
            Box::new(then),
            Box::new(otherwise),
        ))
    }

    fn fallback(&mut self) -> Result<Expression> {
        let mut lhs = self.logical()?;
        while self.eat(&Token::Fallback) {
            let rhs = self.logical()?;
            lhs = binary(BinaryOp::Fallback, lhs, rhs);
        }
        Ok(lhs)
    }

    fn logical(&mut self) -> Result<Expression> {
        let mut lhs = self.comparison()?;
        loop {
            let op = match self.peek() {
                Token::And => BinaryOp::And,
                Token::Or => BinaryOp::Or,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.comparison()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn comparison(&mut self) -> Result<Expression> {
        let mut lhs = self.additive()?;
        loop {
            let op = match self.peek() {
                Token::EqualEqual => BinaryOp::Equal,
                Token::NotEqual => BinaryOp::NotEqual,
                Token::Less => BinaryOp::Less,
                Token::LessEqual => BinaryOp::LessOrEqual,
                Token::Greater => BinaryOp::Greater,
                Token::GreaterEqual => BinaryOp::GreaterOrEqual,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.additive()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn additive(&mut self) -> Result<Expression> {
        let mut lhs = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Subtract,
                token if Self::starts_operand(token) => BinaryOp::Concatenation,
                _ => return Ok(lhs),
            };
            if op != BinaryOp::Concatenation {
                self.advance();
            }
            let rhs = self.multiplicative()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn multiplicative(&mut self) -> Result<Expression> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinaryOp::Multiply,
                Token::Slash => BinaryOp::Divide,
                Token::Percent => BinaryOp::Modulo,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.unary()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn unary(&mut self) -> Result<Expression> {
        match self.peek() {
            Token::Bang => {
                self.advance();
                Ok(Expression::Not(Box::new(self.unary()?)))
            }
            Token::Minus => {
                self.advance();
                if let Token::Integer(value) = self.peek().clone() {
                    if self.adjacent() {
                        self.advance();
                        return Ok(Expression::Integer(-value));
                    }
                }
                let operand = self.unary()?;
                Ok(binary(BinaryOp::Subtract, Expression::Integer(0), operand))
            }
            _ => self.postfix(),
        }
    }

    fn postfix(&mut self) -> Result<Expression> {
        let mut expression = self.primary()?;
        while self.peek() == &Token::LParen && self.adjacent() {
            self.advance();
            let arguments = self.separated(&Token::RParen, "call")?;
            expression = Expression::Call(Box::new(expression), arguments);
        }
        Ok(expression)
    }

    /// comma separated expressions up to and including `close`
    fn separated(&mut self, close: &Token, rule: &'static str) -> Result<Vec<Expression>> {
        let mut entries = vec![];
        if self.eat(close) {
            return Ok(entries);
        }
        loop {
            entries.push(self.expression()?);
            if self.eat(close) {
                return Ok(entries);
            }
            self.expect(&Token::Comma, rule)?;
        }
    }

    fn primary(&mut self) -> Result<Expression> {
        match self.peek().clone() {
            Token::Integer(value) => {
                self.advance();
                Ok(Expression::Integer(value))
            }
            Token::String(value) => {
                self.advance();
                Ok(Expression::String(value))
            }
            Token::LParen => {
                self.advance();
                let inner = self.expression()?;
                self.expect(&Token::RParen, "grouping")?;
                Ok(Expression::Grouped(Box::new(inner)))
            }
            Token::LBracket => {
                self.advance();
                Ok(Expression::List(self.separated(&Token::RBracket, "list")?))
            }
            Token::Dot => {
                self.advance();
                if !self.adjacent() {
                    return Err(self.error("reference", "expected key after '.'"));
                }
                let mut path = vec![String::new()];
                path.extend(self.path()?);
                Ok(Expression::Reference(path))
            }
            Token::Identifier(name) => match name.as_str() {
                "nil" => {
                    self.advance();
                    Ok(Expression::Nil)
                }
                "true" | "false" => {
                    self.advance();
                    Ok(Expression::Boolean(name == "true"))
                }
                "merge" => {
                    self.advance();
                    self.merge()
                }
                "auto" => {
                    self.advance();
                    Ok(Expression::Auto(self.path.to_vec()))
                }
                "lambda" if matches!(self.peek_at(1).map(|s| &s.token), Some(Token::Pipe | Token::Fallback)) => {
                    self.advance();
                    Ok(Expression::Lambda(self.lambda()?))
                }
                "map" if self
                    .peek_at(1)
                    .is_some_and(|next| next.token == Token::LBracket && !next.spaced) =>
                {
                    self.advance();
                    self.advance();
                    self.map()
                }
                _ => Ok(Expression::Reference(self.path()?)),
            },
            other => Err(self.error("primary", format!("unexpected {other:?}"))),
        }
    }

    /// `key(.key|.[N]|[N])*`
    fn path(&mut self) -> Result<Vec<String>> {
        let mut path = vec![];
        match self.advance() {
            Token::Identifier(name) => path.push(name),
            Token::LBracket => path.push(self.index()?),
            other => return Err(self.error("reference", format!("expected key, got {other:?}"))),
        }

        loop {
            let next_adjacent = self.peek_at(1).is_some_and(|next| !next.spaced);
            match self.peek() {
                Token::Dot if self.adjacent() && next_adjacent => {
                    self.advance();
                    match self.advance() {
                        Token::Identifier(name) => path.push(name),
                        Token::Integer(index) => path.push(format!("[{index}]")),
                        Token::LBracket => path.push(self.index()?),
                        other => {
                            return Err(
                                self.error("reference", format!("expected key, got {other:?}"))
                            )
                        }
                    }
                }
                Token::LBracket if self.adjacent() => {
                    self.advance();
                    path.push(self.index()?);
                }
                _ => return Ok(path),
            }
        }
    }

    /// remainder of `[N]`
    fn index(&mut self) -> Result<String> {
        let Token::Integer(index) = self.advance() else {
            return Err(self.error("index", "expected list index"));
        };
        self.expect(&Token::RBracket, "index")?;
        Ok(format!("[{index}]"))
    }

    fn merge(&mut self) -> Result<Expression> {
        let replace = if self.at_keyword("replace") {
            self.advance();
            true
        } else {
            false
        };

        let redirect = match self.peek() {
            Token::Identifier(_) => Some(self.path()?),
            _ => None,
        };

        Ok(Expression::Merge(MergeExpr {
            redirect: redirect.is_some(),
            path: redirect.unwrap_or_else(|| self.path.to_vec()),
            replace,
        }))
    }

    /// `|a,b|->body` or `||->body`
    fn lambda(&mut self) -> Result<LambdaExpr> {
        let params = if self.eat(&Token::Fallback) {
            vec![]
        } else {
            self.expect(&Token::Pipe, "lambda")?;
            self.params()?
        };
        self.expect(&Token::Arrow, "lambda")?;
        let body = self.expression()?;

        Ok(LambdaExpr {
            params,
            body: Box::new(body),
        })
    }

    /// `a, b|`
    fn params(&mut self) -> Result<Vec<String>> {
        let mut params = vec![];
        loop {
            match self.advance() {
                Token::Identifier(name) => params.push(name),
                other => {
                    return Err(self.error("lambda", format!("expected parameter, got {other:?}")))
                }
            }
            match self.advance() {
                Token::Comma => continue,
                Token::Pipe => return Ok(params),
                other => {
                    return Err(self.error("lambda", format!("expected ',' or '|', got {other:?}")))
                }
            }
        }
    }

    /// remainder of `map[collection|x|->body]` or `map[collection|lambda]`
    fn map(&mut self) -> Result<Expression> {
        let collection = self.expression()?;
        self.expect(&Token::Pipe, "map")?;

        let start = self.pos;
        let mapping = match self.params() {
            Ok(params) if self.eat(&Token::Arrow) => Expression::Lambda(LambdaExpr {
                params,
                body: Box::new(self.expression()?),
            }),
            _ => {
                self.pos = start;
                self.expression()?
            }
        };
        self.expect(&Token::RBracket, "map")?;

        Ok(Expression::Map(Box::new(collection), Box::new(mapping)))
    }
}

fn binary(op: BinaryOp, lhs: Expression, rhs: Expression) -> Expression {
    Expression::Binary(op, Box::new(lhs), Box::new(rhs))
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn reference(path: &[&str]) -> Expression {
        Expression::Reference(path.iter().map(|s| s.to_string()).collect())
    }

    fn int(value: i64) -> Expression {
        Expression::Integer(value)
    }

    #[test]
    fn precedence() {
        assert_eq!(
            parse("1 + 2 * 3", &[]).unwrap(),
            binary(BinaryOp::Add, int(1), binary(BinaryOp::Multiply, int(2), int(3)))
        );
        assert_eq!(
            parse("a || b ? 1 : 2", &[]).unwrap(),
            Expression::Conditional(
                Box::new(binary(BinaryOp::Fallback, reference(&["a"]), reference(&["b"]))),
                Box::new(int(1)),
                Box::new(int(2)),
            )
        );
        assert_eq!(
            parse("a == 1 -and b", &[]).unwrap(),
            binary(
                BinaryOp::And,
                binary(BinaryOp::Equal, reference(&["a"]), int(1)),
                reference(&["b"])
            )
        );
    }

    #[test]
    fn conditional_is_right_associative() {
        assert_eq!(
            parse("a ? 1 : b ? 2 : 3", &[]).unwrap(),
            Expression::Conditional(
                Box::new(reference(&["a"])),
                Box::new(int(1)),
                Box::new(Expression::Conditional(
                    Box::new(reference(&["b"])),
                    Box::new(int(2)),
                    Box::new(int(3)),
                )),
            )
        );
    }

    #[test]
    fn concatenation_by_juxtaposition() {
        assert_eq!(
            parse("\"a\" b.c 1", &[]).unwrap(),
            binary(
                BinaryOp::Concatenation,
                binary(
                    BinaryOp::Concatenation,
                    Expression::String("a".into()),
                    reference(&["b", "c"])
                ),
                int(1)
            )
        );
        assert_eq!(
            parse("\"a\" 1 + 2", &[]).unwrap(),
            binary(
                BinaryOp::Add,
                binary(BinaryOp::Concatenation, Expression::String("a".into()), int(1)),
                int(2)
            )
        );
    }

    #[test]
    fn references() {
        assert_eq!(parse("a.b.c", &[]).unwrap(), reference(&["a", "b", "c"]));
        assert_eq!(parse(".a.b", &[]).unwrap(), reference(&["", "a", "b"]));
        assert_eq!(parse("a.[0].b", &[]).unwrap(), reference(&["a", "[0]", "b"]));
        assert_eq!(parse("a[1]", &[]).unwrap(), reference(&["a", "[1]"]));
        assert_eq!(parse("my-key", &[]).unwrap(), reference(&["my-key"]));
    }

    #[test]
    fn merge_and_auto_capture_path() {
        let path = vec!["jobs".to_string(), "web".to_string()];
        assert_eq!(
            parse("merge", &path).unwrap(),
            Expression::Merge(MergeExpr {
                path: path.clone(),
                redirect: false,
                replace: false
            })
        );
        assert_eq!(
            parse("merge replace other.place", &path).unwrap(),
            Expression::Merge(MergeExpr {
                path: vec!["other".into(), "place".into()],
                redirect: true,
                replace: true
            })
        );
        assert_eq!(parse("auto", &path).unwrap(), Expression::Auto(path));
        assert!(matches!(
            parse("merge || nil", &[]).unwrap(),
            Expression::Binary(BinaryOp::Fallback, ..)
        ));
    }

    #[test]
    fn calls_and_lambdas() {
        assert_eq!(
            parse("join(\",\", list)", &[]).unwrap(),
            Expression::Call(
                Box::new(reference(&["join"])),
                vec![Expression::String(",".into()), reference(&["list"])]
            )
        );
        assert_eq!(
            parse("lambda |x, y|->x + y", &[]).unwrap(),
            Expression::Lambda(LambdaExpr {
                params: vec!["x".into(), "y".into()],
                body: Box::new(binary(BinaryOp::Add, reference(&["x"]), reference(&["y"]))),
            })
        );
        assert!(matches!(
            parse("f (x)", &[]).unwrap(),
            Expression::Binary(BinaryOp::Concatenation, ..)
        ));
    }

    #[test]
    fn map_forms() {
        assert_eq!(
            parse("map[list|x|->x * 2]", &[]).unwrap(),
            Expression::Map(
                Box::new(reference(&["list"])),
                Box::new(Expression::Lambda(LambdaExpr {
                    params: vec!["x".into()],
                    body: Box::new(binary(BinaryOp::Multiply, reference(&["x"]), int(2))),
                }))
            )
        );
        assert_eq!(
            parse("map[list|double]", &[]).unwrap(),
            Expression::Map(Box::new(reference(&["list"])), Box::new(reference(&["double"])))
        );
    }

    #[test]
    fn unary() {
        assert_eq!(parse("-3", &[]).unwrap(), int(-3));
        assert_eq!(
            parse("- a", &[]).unwrap(),
            binary(BinaryOp::Subtract, int(0), reference(&["a"]))
        );
        assert_eq!(
            parse("!a", &[]).unwrap(),
            Expression::Not(Box::new(reference(&["a"])))
        );
        assert_eq!(
            parse("a - 3", &[]).unwrap(),
            binary(BinaryOp::Subtract, reference(&["a"]), int(3))
        );
    }

    #[test]
    fn errors_carry_position() {
        let err = parse("1 +", &[]).expect_err("must fail");
        assert_eq!(err.rule, "primary");
        assert_eq!((err.line, err.column), (1, 4));

        let err = parse("foo bar)", &[]).expect_err("must fail");
        assert_eq!(err.rule, "expression");
        assert_eq!(err.column, 8);

        assert!(parse("[1, 2", &[]).is_err());
        assert!(parse("lambda |x|x", &[]).is_err());
    }
}
