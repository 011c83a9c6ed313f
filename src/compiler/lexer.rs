//! 规则表达式词法分析

use std::iter::Peekable;
use std::str::CharIndices;

use crate::error::{FinderError, FinderResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Ident(String),
    /// 十进制字面量的绝对值；符号由语法分析处理
    Int(u64),
    Str(String),
    True,
    False,
    In,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    AndAnd,
    OrOr,
    Bang,
    Minus,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Eof,
}

impl TokenKind {
    /// 错误信息中使用的描述
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Ident(name) => format!("identifier '{}'", name),
            TokenKind::Int(n) => format!("integer {}", n),
            TokenKind::Str(s) => format!("string {:?}", s),
            TokenKind::True => "'true'".to_string(),
            TokenKind::False => "'false'".to_string(),
            TokenKind::In => "'in'".to_string(),
            TokenKind::LParen => "'('".to_string(),
            TokenKind::RParen => "')'".to_string(),
            TokenKind::LBracket => "'['".to_string(),
            TokenKind::RBracket => "']'".to_string(),
            TokenKind::Comma => "','".to_string(),
            TokenKind::Dot => "'.'".to_string(),
            TokenKind::AndAnd => "'&&'".to_string(),
            TokenKind::OrOr => "'||'".to_string(),
            TokenKind::Bang => "'!'".to_string(),
            TokenKind::Minus => "'-'".to_string(),
            TokenKind::EqEq => "'=='".to_string(),
            TokenKind::NotEq => "'!='".to_string(),
            TokenKind::Lt => "'<'".to_string(),
            TokenKind::Le => "'<='".to_string(),
            TokenKind::Gt => "'>'".to_string(),
            TokenKind::Ge => "'>='".to_string(),
            TokenKind::Eof => "end of input".to_string(),
        }
    }
}

/// 词法单元，`pos` 为源文本中的字节偏移
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: usize,
}

/// 将表达式源文本切分为词法单元，末尾总是 `Eof`
pub fn tokenize(src: &str) -> FinderResult<Vec<Token>> {
    let mut lexer = Lexer {
        src,
        chars: src.char_indices().peekable(),
    };
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let done = token.kind == TokenKind::Eof;
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}

struct Lexer<'a> {
    src: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    fn next_token(&mut self) -> FinderResult<Token> {
        self.skip_insignificant();

        let Some((pos, c)) = self.chars.next() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                pos: self.src.len(),
            });
        };

        let kind = match c {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ',' => TokenKind::Comma,
            '.' => TokenKind::Dot,
            '-' => TokenKind::Minus,
            '&' => self.expect_second(pos, '&', TokenKind::AndAnd)?,
            '|' => self.expect_second(pos, '|', TokenKind::OrOr)?,
            '=' => self.expect_second(pos, '=', TokenKind::EqEq)?,
            '!' => self.optional_second('=', TokenKind::NotEq, TokenKind::Bang),
            '<' => self.optional_second('=', TokenKind::Le, TokenKind::Lt),
            '>' => self.optional_second('=', TokenKind::Ge, TokenKind::Gt),
            '"' | '\'' => TokenKind::Str(self.string_literal(pos, c)?),
            c if c.is_ascii_digit() => self.int_literal(pos)?,
            c if c.is_ascii_alphabetic() || c == '_' => self.ident_or_keyword(pos),
            other => {
                return Err(FinderError::compile(pos, format!("unexpected character {:?}", other)));
            }
        };

        Ok(Token { kind, pos })
    }

    // 空白与 `//` 行注释（规则可以写在文件中）
    fn skip_insignificant(&mut self) {
        loop {
            while self.chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}
            let rest = self.chars.peek().map(|&(pos, _)| &self.src[pos..]).unwrap_or("");
            if !rest.starts_with("//") {
                return;
            }
            while self.chars.next_if(|&(_, c)| c != '\n').is_some() {}
        }
    }

    fn expect_second(&mut self, pos: usize, expected: char, kind: TokenKind) -> FinderResult<TokenKind> {
        if self.chars.next_if(|&(_, c)| c == expected).is_some() {
            Ok(kind)
        } else {
            Err(FinderError::compile(pos, format!("expected '{}{}'", expected, expected)))
        }
    }

    fn optional_second(&mut self, second: char, double: TokenKind, single: TokenKind) -> TokenKind {
        if self.chars.next_if(|&(_, c)| c == second).is_some() {
            double
        } else {
            single
        }
    }

    fn string_literal(&mut self, start: usize, quote: char) -> FinderResult<String> {
        let mut parsed = String::new();
        loop {
            let Some((pos, c)) = self.chars.next() else {
                return Err(FinderError::compile(start, "unterminated string literal"));
            };
            match c {
                c if c == quote => return Ok(parsed),
                '\\' => {
                    let Some((_, escaped)) = self.chars.next() else {
                        return Err(FinderError::compile(start, "unterminated string literal"));
                    };
                    let translated = match escaped {
                        '\\' => '\\',
                        '"' => '"',
                        '\'' => '\'',
                        'n' => '\n',
                        'r' => '\r',
                        't' => '\t',
                        other => {
                            return Err(FinderError::compile(pos, format!("invalid escape sequence '\\{}'", other)));
                        }
                    };
                    parsed.push(translated);
                }
                c => parsed.push(c),
            }
        }
    }

    fn int_literal(&mut self, start: usize) -> FinderResult<TokenKind> {
        let mut end = start + 1;
        while let Some((pos, c)) = self.chars.next_if(|(_, c)| c.is_ascii_digit()) {
            end = pos + c.len_utf8();
        }
        let text = &self.src[start..end];
        text.parse::<u64>()
            .map(TokenKind::Int)
            .map_err(|_| FinderError::compile(start, format!("integer literal out of range: {}", text)))
    }

    fn ident_or_keyword(&mut self, start: usize) -> TokenKind {
        let mut end = start + 1;
        while let Some((pos, c)) = self.chars.next_if(|(_, c)| c.is_ascii_alphanumeric() || *c == '_') {
            end = pos + c.len_utf8();
        }
        match &self.src[start..end] {
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "in" => TokenKind::In,
            name => TokenKind::Ident(name.to_string()),
        }
    }
}
