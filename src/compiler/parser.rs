//! 规则表达式语法分析：词法单元 -> 未类型化语法树

use super::lexer::{tokenize, Token, TokenKind};
use crate::error::{FinderError, FinderResult};

/// 语法树深度上限：括号、一元运算、比较链与成员访问链都计入，防止类型检查和求值时栈溢出
const MAX_DEPTH: usize = 64;

/// 词法单元数量上限，限制单条规则的规模
const MAX_TOKENS: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::In => "in",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExprKind {
    Ident(String),
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    /// `&&` / `||` 链，展平为操作数列表（至少两个），不随长度加深语法树
    Logical(BinaryOp, Vec<Expr>),
    /// `target.field`
    Member(Box<Expr>, String),
    /// `target[index]`
    Index(Box<Expr>, Box<Expr>),
    /// `func(args)` 或 `target.func(args)`
    Call {
        target: Option<Box<Expr>>,
        func: String,
        args: Vec<Expr>,
    },
}

/// 语法树节点，`pos` 为字节偏移
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expr {
    pub kind: ExprKind,
    pub pos: usize,
}

impl Expr {
    fn new(kind: ExprKind, pos: usize) -> Self {
        Self { kind, pos }
    }
}

/// 解析完整表达式
pub fn parse(src: &str) -> FinderResult<Expr> {
    let tokens = tokenize(src)?;
    if tokens.len() > MAX_TOKENS {
        return Err(FinderError::compile(0, format!("expression too long: {} tokens", tokens.len())));
    }
    let mut parser = Parser {
        tokens,
        cursor: 0,
        depth: 0,
    };
    let expr = parser.parse_or()?;
    let trailing = parser.peek();
    if trailing.kind != TokenKind::Eof {
        return Err(FinderError::compile(
            trailing.pos,
            format!("unexpected {} after expression", trailing.kind.describe()),
        ));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    cursor: usize,
    depth: usize,
}

impl Parser {
    fn parse_or(&mut self) -> FinderResult<Expr> {
        self.enter()?;
        let expr = self.parse_logical(BinaryOp::Or, &TokenKind::OrOr, Self::parse_and)?;
        self.leave();
        Ok(expr)
    }

    fn parse_and(&mut self) -> FinderResult<Expr> {
        self.parse_logical(BinaryOp::And, &TokenKind::AndAnd, Self::parse_relation)
    }

    // 收集同一运算符连接的全部操作数；位置取第一个运算符
    fn parse_logical(
        &mut self,
        op: BinaryOp,
        separator: &TokenKind,
        operand: fn(&mut Self) -> FinderResult<Expr>,
    ) -> FinderResult<Expr> {
        let first = operand(self)?;
        let Some(pos) = self.eat(separator) else {
            return Ok(first);
        };
        let mut operands = vec![first, operand(self)?];
        while self.eat(separator).is_some() {
            operands.push(operand(self)?);
        }
        Ok(Expr::new(ExprKind::Logical(op, operands), pos))
    }

    fn parse_relation(&mut self) -> FinderResult<Expr> {
        let depth = self.depth;
        let mut left = self.parse_unary()?;
        loop {
            let token = self.peek();
            let op = match token.kind {
                TokenKind::EqEq => BinaryOp::Eq,
                TokenKind::NotEq => BinaryOp::Ne,
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::Le => BinaryOp::Le,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::Ge => BinaryOp::Ge,
                TokenKind::In => BinaryOp::In,
                _ => break,
            };
            let pos = token.pos;
            self.cursor += 1;
            self.enter()?;
            let right = self.parse_unary()?;
            left = Expr::new(ExprKind::Binary(op, Box::new(left), Box::new(right)), pos);
        }
        self.depth = depth;
        Ok(left)
    }

    fn parse_unary(&mut self) -> FinderResult<Expr> {
        let op = match self.peek().kind {
            TokenKind::Bang => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Neg,
            _ => return self.parse_member(),
        };
        let pos = self.advance().pos;
        if op == UnaryOp::Neg {
            if let Some(n) = self.negative_literal()? {
                return Ok(Expr::new(ExprKind::Int(n), pos));
            }
        }
        self.enter()?;
        let operand = self.parse_unary()?;
        self.leave();
        Ok(Expr::new(ExprKind::Unary(op, Box::new(operand)), pos))
    }

    fn parse_member(&mut self) -> FinderResult<Expr> {
        let depth = self.depth;
        let mut expr = self.parse_primary()?;
        loop {
            if let Some(pos) = self.eat(&TokenKind::Dot) {
                self.enter()?;
                let name = self.expect_ident("field or method name after '.'")?;
                if self.eat(&TokenKind::LParen).is_some() {
                    let args = self.parse_args(&TokenKind::RParen)?;
                    expr = Expr::new(
                        ExprKind::Call {
                            target: Some(Box::new(expr)),
                            func: name,
                            args,
                        },
                        pos,
                    );
                } else {
                    expr = Expr::new(ExprKind::Member(Box::new(expr), name), pos);
                }
            } else if let Some(pos) = self.eat(&TokenKind::LBracket) {
                self.enter()?;
                let index = self.parse_or()?;
                self.expect(&TokenKind::RBracket)?;
                expr = Expr::new(ExprKind::Index(Box::new(expr), Box::new(index)), pos);
            } else {
                self.depth = depth;
                return Ok(expr);
            }
        }
    }

    // `-` 直接跟整数字面量（且字面量后没有成员访问）时折叠为负数字面量，i64::MIN 由此可写
    fn negative_literal(&mut self) -> FinderResult<Option<i64>> {
        let &TokenKind::Int(magnitude) = &self.peek().kind else {
            return Ok(None);
        };
        let next = &self.tokens[(self.cursor + 1).min(self.tokens.len() - 1)].kind;
        if matches!(next, TokenKind::Dot | TokenKind::LBracket) {
            return Ok(None);
        }
        let pos = self.advance().pos;
        0i64.checked_sub_unsigned(magnitude)
            .map(Some)
            .ok_or_else(|| FinderError::compile(pos, format!("integer literal out of range: -{}", magnitude)))
    }

    fn parse_primary(&mut self) -> FinderResult<Expr> {
        let token = self.advance();
        let pos = token.pos;
        let kind = match token.kind {
            TokenKind::Int(n) => ExprKind::Int(
                i64::try_from(n)
                    .map_err(|_| FinderError::compile(pos, format!("integer literal out of range: {}", n)))?,
            ),
            TokenKind::Str(s) => ExprKind::Str(s),
            TokenKind::True => ExprKind::Bool(true),
            TokenKind::False => ExprKind::Bool(false),
            TokenKind::Ident(name) => {
                if self.eat(&TokenKind::LParen).is_some() {
                    let args = self.parse_args(&TokenKind::RParen)?;
                    ExprKind::Call {
                        target: None,
                        func: name,
                        args,
                    }
                } else {
                    ExprKind::Ident(name)
                }
            }
            TokenKind::LParen => {
                let inner = self.parse_or()?;
                self.expect(&TokenKind::RParen)?;
                return Ok(inner);
            }
            TokenKind::LBracket => ExprKind::List(self.parse_args(&TokenKind::RBracket)?),
            other => {
                return Err(FinderError::compile(pos, format!("unexpected {}", other.describe())));
            }
        };
        Ok(Expr::new(kind, pos))
    }

    // 逗号分隔的参数/元素列表，允许末尾逗号，消费结束符
    fn parse_args(&mut self, close: &TokenKind) -> FinderResult<Vec<Expr>> {
        let mut args = Vec::new();
        if self.eat(close).is_some() {
            return Ok(args);
        }
        loop {
            args.push(self.parse_or()?);
            if self.eat(&TokenKind::Comma).is_some() {
                if self.eat(close).is_some() {
                    return Ok(args);
                }
                continue;
            }
            self.expect(close)?;
            return Ok(args);
        }
    }

    fn enter(&mut self) -> FinderResult<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(FinderError::compile(self.peek().pos, "expression nested too deeply"));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn peek(&self) -> &Token {
        // tokenize 保证末尾是 Eof
        &self.tokens[self.cursor.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.cursor += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> Option<usize> {
        let token = self.peek();
        if &token.kind == kind {
            let pos = token.pos;
            self.cursor += 1;
            Some(pos)
        } else {
            None
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> FinderResult<usize> {
        let token = self.peek();
        if &token.kind == kind {
            let pos = token.pos;
            self.cursor += 1;
            Ok(pos)
        } else {
            Err(FinderError::compile(
                token.pos,
                format!("expected {}, found {}", kind.describe(), token.kind.describe()),
            ))
        }
    }

    fn expect_ident(&mut self, what: &str) -> FinderResult<String> {
        let token = self.advance();
        match token.kind {
            TokenKind::Ident(name) => Ok(name),
            other => Err(FinderError::compile(
                token.pos,
                format!("expected {}, found {}", what, other.describe()),
            )),
        }
    }
}
