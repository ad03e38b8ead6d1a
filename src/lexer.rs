//! Lexer for the Go subset accepted at the prompt
//!
//! Transforms source code into a stream of tokens, inserting semicolons at
//! line ends the way the Go grammar requires.

use std::iter::Peekable;
use std::str::Chars;

/// Token types
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    Integer(i128),
    Float(f64),
    String(String),
    Char(char),

    Identifier(String),

    // Keywords
    Break,
    Case,
    Chan,
    Const,
    Continue,
    Default,
    Defer,
    Else,
    Fallthrough,
    For,
    Func,
    Go,
    If,
    Import,
    Interface,
    Map,
    Package,
    Range,
    Return,
    Select,
    Struct,
    Switch,
    Type,
    Var,

    // Operators
    Plus,       // +
    Minus,      // -
    Star,       // *
    Slash,      // /
    Percent,    // %
    Amp,        // &
    Pipe,       // |
    Caret,      // ^
    Shl,        // <<
    Shr,        // >>
    AndNot,     // &^
    AndAnd,     // &&
    OrOr,       // ||
    Arrow,      // <-
    Inc,        // ++
    Dec,        // --
    Equal,      // ==
    NotEqual,   // !=
    Less,       // <
    LessEqual,  // <=
    Greater,    // >
    GreaterEqual, // >=
    Not,        // !

    // Assignment
    Assign,     // =
    Define,     // :=
    OpAssign(AssignOp), // += -= ...

    // Delimiters
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,

    // Punctuation
    Comma,
    Dot,
    Ellipsis,
    Colon,
    Semicolon,

    /// A character the grammar has no use for
    Illegal(char),
}

/// Compound assignment operators, e.g. `+=`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    AndNot,
}

/// A token with position information
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
    pub lexeme: String,
}

impl Token {
    pub fn new(kind: TokenKind, line: usize, column: usize, lexeme: String) -> Self {
        Token {
            kind,
            line,
            column,
            lexeme,
        }
    }
}

/// Lexer for tokenizing Go source code
pub struct Lexer<'a> {
    source: Peekable<Chars<'a>>,
    line: usize,
    column: usize,
    /// Whether a newline at this point terminates a statement
    insert_semi: bool,
    done: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Lexer {
            source: source.chars().peekable(),
            line: 1,
            column: 1,
            insert_semi: false,
            done: false,
        }
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.source.next()?;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn peek(&mut self) -> Option<&char> {
        self.source.peek()
    }

    fn peek_is(&mut self, expected: char) -> bool {
        self.peek() == Some(&expected)
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.peek_is(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Skips blanks and comments. Returns the position of a newline that
    /// should become a semicolon, if one was crossed.
    fn skip_whitespace(&mut self) -> Option<(usize, usize)> {
        while let Some(&ch) = self.peek() {
            match ch {
                ' ' | '\t' | '\r' => {
                    self.advance();
                }
                '\n' => {
                    if self.insert_semi {
                        let pos = (self.line, self.column);
                        self.advance();
                        return Some(pos);
                    }
                    self.advance();
                }
                '/' => {
                    let mut chars = self.source.clone();
                    chars.next();
                    if chars.peek() == Some(&'/') {
                        // Line comment: the newline it ends on is handled by the loop
                        self.advance();
                        self.advance();
                        while let Some(&ch) = self.peek() {
                            if ch == '\n' {
                                break;
                            }
                            self.advance();
                        }
                    } else if chars.peek() == Some(&'*') {
                        let pos = (self.line, self.column);
                        self.advance();
                        self.advance();
                        let mut crossed_newline = false;
                        loop {
                            match self.advance() {
                                Some('*') if self.peek_is('/') => {
                                    self.advance();
                                    break;
                                }
                                Some('\n') => crossed_newline = true,
                                None => break,
                                _ => {}
                            }
                        }
                        if crossed_newline && self.insert_semi {
                            return Some(pos);
                        }
                    } else {
                        return None;
                    }
                }
                _ => return None,
            }
        }
        None
    }

    fn scan_escape(&mut self, quote: char) -> Option<char> {
        match self.advance()? {
            'n' => Some('\n'),
            't' => Some('\t'),
            'r' => Some('\r'),
            'a' => Some('\u{07}'),
            'b' => Some('\u{08}'),
            'f' => Some('\u{0C}'),
            'v' => Some('\u{0B}'),
            '0' => Some('\0'),
            '\\' => Some('\\'),
            'x' => {
                let mut digits = String::new();
                for _ in 0..2 {
                    digits.push(self.advance()?);
                }
                u32::from_str_radix(&digits, 16).ok().and_then(char::from_u32)
            }
            'u' => {
                let mut digits = String::new();
                for _ in 0..4 {
                    digits.push(self.advance()?);
                }
                u32::from_str_radix(&digits, 16).ok().and_then(char::from_u32)
            }
            c if c == quote => Some(c),
            c => Some(c),
        }
    }

    fn scan_string(&mut self, line: usize, column: usize) -> Token {
        let mut value = String::new();
        let mut terminated = false;

        while let Some(&ch) = self.peek() {
            if ch == '"' {
                self.advance();
                terminated = true;
                break;
            }
            if ch == '\n' {
                break;
            }
            self.advance();
            if ch == '\\' {
                match self.scan_escape('"') {
                    Some(c) => value.push(c),
                    None => break,
                }
            } else {
                value.push(ch);
            }
        }

        if !terminated {
            return Token::new(TokenKind::Illegal('"'), line, column, "\"".into());
        }
        let lexeme = format!("{:?}", value);
        Token::new(TokenKind::String(value), line, column, lexeme)
    }

    fn scan_raw_string(&mut self, line: usize, column: usize) -> Token {
        let mut value = String::new();
        loop {
            match self.advance() {
                Some('`') => break,
                Some('\r') => {}
                Some(ch) => value.push(ch),
                None => return Token::new(TokenKind::Illegal('`'), line, column, "`".into()),
            }
        }
        let lexeme = format!("`{}`", value);
        Token::new(TokenKind::String(value), line, column, lexeme)
    }

    fn scan_char(&mut self, line: usize, column: usize) -> Token {
        let value = match self.advance() {
            Some('\\') => self.scan_escape('\''),
            Some('\'') | None => None,
            Some(c) => Some(c),
        };
        match (value, self.match_char('\'')) {
            (Some(c), true) => Token::new(TokenKind::Char(c), line, column, format!("{:?}", c)),
            _ => Token::new(TokenKind::Illegal('\''), line, column, "'".into()),
        }
    }

    fn scan_digits(&mut self, text: &mut String, accept: fn(char) -> bool) {
        while let Some(&ch) = self.peek() {
            if accept(ch) {
                text.push(ch);
                self.advance();
            } else if ch == '_' {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn scan_number(&mut self, first: char, line: usize, column: usize) -> Token {
        let mut num_str = String::from(first);

        if first == '0' {
            let radix = match self.peek() {
                Some('x') | Some('X') => Some(16),
                Some('b') | Some('B') => Some(2),
                Some('o') | Some('O') => Some(8),
                _ => None,
            };
            if let Some(radix) = radix {
                self.advance();
                let mut digits = String::new();
                self.scan_digits(&mut digits, |c| c.is_ascii_hexdigit());
                return match i128::from_str_radix(&digits, radix) {
                    Ok(value) => Token::new(TokenKind::Integer(value), line, column, digits),
                    Err(_) => Token::new(TokenKind::Illegal('0'), line, column, digits),
                };
            }
        }

        self.scan_digits(&mut num_str, |c| c.is_ascii_digit());

        let mut is_float = false;
        if self.peek_is('.') {
            // `1..` never occurs in Go, but `x.0` selectors do not start with a digit
            let mut lookahead = self.source.clone();
            lookahead.next();
            let next = lookahead.peek().copied();
            if next.map_or(true, |c| c.is_ascii_digit() || c.is_whitespace() || ")];,eE+-*/".contains(c)) {
                is_float = true;
                num_str.push('.');
                self.advance();
                self.scan_digits(&mut num_str, |c| c.is_ascii_digit());
            }
        }

        if let Some(&ch) = self.peek() {
            if ch == 'e' || ch == 'E' {
                is_float = true;
                num_str.push('e');
                self.advance();
                if let Some(&sign) = self.peek() {
                    if sign == '+' || sign == '-' {
                        num_str.push(sign);
                        self.advance();
                    }
                }
                self.scan_digits(&mut num_str, |c| c.is_ascii_digit());
            }
        }

        if is_float {
            match num_str.parse::<f64>() {
                Ok(value) => Token::new(TokenKind::Float(value), line, column, num_str),
                // `1e` with no exponent digits
                Err(_) => Token::new(TokenKind::Illegal('e'), line, column, num_str),
            }
        } else if num_str.len() > 1 && num_str.starts_with('0') {
            // legacy octal literal
            match i128::from_str_radix(&num_str[1..], 8) {
                Ok(value) => Token::new(TokenKind::Integer(value), line, column, num_str),
                Err(_) => Token::new(TokenKind::Illegal('0'), line, column, num_str),
            }
        } else {
            match num_str.parse::<i128>() {
                Ok(value) => Token::new(TokenKind::Integer(value), line, column, num_str),
                Err(_) => Token::new(TokenKind::Illegal('0'), line, column, num_str),
            }
        }
    }

    fn scan_identifier(&mut self, first: char, line: usize, column: usize) -> Token {
        let mut ident = String::from(first);

        while let Some(&ch) = self.peek() {
            if ch.is_alphanumeric() || ch == '_' {
                ident.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        let kind = match ident.as_str() {
            "break" => TokenKind::Break,
            "case" => TokenKind::Case,
            "chan" => TokenKind::Chan,
            "const" => TokenKind::Const,
            "continue" => TokenKind::Continue,
            "default" => TokenKind::Default,
            "defer" => TokenKind::Defer,
            "else" => TokenKind::Else,
            "fallthrough" => TokenKind::Fallthrough,
            "for" => TokenKind::For,
            "func" => TokenKind::Func,
            "go" => TokenKind::Go,
            "if" => TokenKind::If,
            "import" => TokenKind::Import,
            "interface" => TokenKind::Interface,
            "map" => TokenKind::Map,
            "package" => TokenKind::Package,
            "range" => TokenKind::Range,
            "return" => TokenKind::Return,
            "select" => TokenKind::Select,
            "struct" => TokenKind::Struct,
            "switch" => TokenKind::Switch,
            "type" => TokenKind::Type,
            "var" => TokenKind::Var,
            _ => TokenKind::Identifier(ident.clone()),
        };

        Token::new(kind, line, column, ident)
    }

    fn op(&mut self, kind: TokenKind, line: usize, column: usize, lexeme: &str) -> Token {
        Token::new(kind, line, column, lexeme.to_string())
    }

    fn next_token(&mut self) -> Option<Token> {
        if let Some((line, column)) = self.skip_whitespace() {
            self.insert_semi = false;
            return Some(Token::new(TokenKind::Semicolon, line, column, "\n".into()));
        }

        let line = self.line;
        let column = self.column;

        let ch = match self.advance() {
            Some(ch) => ch,
            None => {
                // the final line of a submission needs no trailing newline
                if self.insert_semi && !self.done {
                    self.done = true;
                    self.insert_semi = false;
                    return Some(Token::new(TokenKind::Semicolon, line, column, "EOF".into()));
                }
                return None;
            }
        };

        let token = match ch {
            '"' => self.scan_string(line, column),
            '`' => self.scan_raw_string(line, column),
            '\'' => self.scan_char(line, column),
            '0'..='9' => self.scan_number(ch, line, column),
            c if c.is_alphabetic() || c == '_' => self.scan_identifier(c, line, column),

            '+' => {
                if self.match_char('+') {
                    self.op(TokenKind::Inc, line, column, "++")
                } else if self.match_char('=') {
                    self.op(TokenKind::OpAssign(AssignOp::Add), line, column, "+=")
                } else {
                    self.op(TokenKind::Plus, line, column, "+")
                }
            }
            '-' => {
                if self.match_char('-') {
                    self.op(TokenKind::Dec, line, column, "--")
                } else if self.match_char('=') {
                    self.op(TokenKind::OpAssign(AssignOp::Sub), line, column, "-=")
                } else {
                    self.op(TokenKind::Minus, line, column, "-")
                }
            }
            '*' => {
                if self.match_char('=') {
                    self.op(TokenKind::OpAssign(AssignOp::Mul), line, column, "*=")
                } else {
                    self.op(TokenKind::Star, line, column, "*")
                }
            }
            '/' => {
                if self.match_char('=') {
                    self.op(TokenKind::OpAssign(AssignOp::Div), line, column, "/=")
                } else {
                    self.op(TokenKind::Slash, line, column, "/")
                }
            }
            '%' => {
                if self.match_char('=') {
                    self.op(TokenKind::OpAssign(AssignOp::Rem), line, column, "%=")
                } else {
                    self.op(TokenKind::Percent, line, column, "%")
                }
            }
            '^' => {
                if self.match_char('=') {
                    self.op(TokenKind::OpAssign(AssignOp::Xor), line, column, "^=")
                } else {
                    self.op(TokenKind::Caret, line, column, "^")
                }
            }
            '&' => {
                if self.match_char('&') {
                    self.op(TokenKind::AndAnd, line, column, "&&")
                } else if self.match_char('^') {
                    if self.match_char('=') {
                        self.op(TokenKind::OpAssign(AssignOp::AndNot), line, column, "&^=")
                    } else {
                        self.op(TokenKind::AndNot, line, column, "&^")
                    }
                } else if self.match_char('=') {
                    self.op(TokenKind::OpAssign(AssignOp::And), line, column, "&=")
                } else {
                    self.op(TokenKind::Amp, line, column, "&")
                }
            }
            '|' => {
                if self.match_char('|') {
                    self.op(TokenKind::OrOr, line, column, "||")
                } else if self.match_char('=') {
                    self.op(TokenKind::OpAssign(AssignOp::Or), line, column, "|=")
                } else {
                    self.op(TokenKind::Pipe, line, column, "|")
                }
            }
            '<' => {
                if self.match_char('-') {
                    self.op(TokenKind::Arrow, line, column, "<-")
                } else if self.match_char('<') {
                    if self.match_char('=') {
                        self.op(TokenKind::OpAssign(AssignOp::Shl), line, column, "<<=")
                    } else {
                        self.op(TokenKind::Shl, line, column, "<<")
                    }
                } else if self.match_char('=') {
                    self.op(TokenKind::LessEqual, line, column, "<=")
                } else {
                    self.op(TokenKind::Less, line, column, "<")
                }
            }
            '>' => {
                if self.match_char('>') {
                    if self.match_char('=') {
                        self.op(TokenKind::OpAssign(AssignOp::Shr), line, column, ">>=")
                    } else {
                        self.op(TokenKind::Shr, line, column, ">>")
                    }
                } else if self.match_char('=') {
                    self.op(TokenKind::GreaterEqual, line, column, ">=")
                } else {
                    self.op(TokenKind::Greater, line, column, ">")
                }
            }
            '=' => {
                if self.match_char('=') {
                    self.op(TokenKind::Equal, line, column, "==")
                } else {
                    self.op(TokenKind::Assign, line, column, "=")
                }
            }
            '!' => {
                if self.match_char('=') {
                    self.op(TokenKind::NotEqual, line, column, "!=")
                } else {
                    self.op(TokenKind::Not, line, column, "!")
                }
            }
            ':' => {
                if self.match_char('=') {
                    self.op(TokenKind::Define, line, column, ":=")
                } else {
                    self.op(TokenKind::Colon, line, column, ":")
                }
            }
            '.' => {
                let mut lookahead = self.source.clone();
                if lookahead.next() == Some('.') && lookahead.next() == Some('.') {
                    self.advance();
                    self.advance();
                    self.op(TokenKind::Ellipsis, line, column, "...")
                } else if self.peek().map_or(false, |c| c.is_ascii_digit()) {
                    let mut text = String::from("0.");
                    self.scan_digits(&mut text, |c| c.is_ascii_digit());
                    match text.parse::<f64>() {
                        Ok(value) => Token::new(TokenKind::Float(value), line, column, text),
                        Err(_) => Token::new(TokenKind::Illegal('0'), line, column, text),
                    }
                } else {
                    self.op(TokenKind::Dot, line, column, ".")
                }
            }

            '(' => self.op(TokenKind::LeftParen, line, column, "("),
            ')' => self.op(TokenKind::RightParen, line, column, ")"),
            '{' => self.op(TokenKind::LeftBrace, line, column, "{"),
            '}' => self.op(TokenKind::RightBrace, line, column, "}"),
            '[' => self.op(TokenKind::LeftBracket, line, column, "["),
            ']' => self.op(TokenKind::RightBracket, line, column, "]"),
            ',' => self.op(TokenKind::Comma, line, column, ","),
            ';' => self.op(TokenKind::Semicolon, line, column, ";"),

            other => Token::new(TokenKind::Illegal(other), line, column, other.to_string()),
        };

        self.insert_semi = matches!(
            token.kind,
            TokenKind::Identifier(_)
                | TokenKind::Integer(_)
                | TokenKind::Float(_)
                | TokenKind::String(_)
                | TokenKind::Char(_)
                | TokenKind::Break
                | TokenKind::Continue
                | TokenKind::Fallthrough
                | TokenKind::Return
                | TokenKind::Inc
                | TokenKind::Dec
                | TokenKind::RightParen
                | TokenKind::RightBracket
                | TokenKind::RightBrace
        );

        Some(token)
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source).map(|t| t.kind).collect()
    }

    #[test]
    fn test_basic_tokens() {
        let tokens = kinds("x := 42");

        assert!(matches!(tokens[0], TokenKind::Identifier(_)));
        assert!(matches!(tokens[1], TokenKind::Define));
        assert!(matches!(tokens[2], TokenKind::Integer(42)));
        assert!(matches!(tokens[3], TokenKind::Semicolon));
        assert_eq!(tokens.len(), 4);
    }

    #[test]
    fn test_semicolon_insertion_after_newline() {
        let tokens = kinds("a := 1\nb := 2\n");
        let semis = tokens
            .iter()
            .filter(|k| matches!(k, TokenKind::Semicolon))
            .count();
        assert_eq!(semis, 2);
    }

    #[test]
    fn test_no_semicolon_after_operator() {
        let tokens = kinds("a := 1 +\n 2");
        assert!(matches!(tokens[3], TokenKind::Plus));
        assert!(matches!(tokens[4], TokenKind::Integer(2)));
    }

    #[test]
    fn test_string_and_raw_string() {
        let tokens = kinds("\"a\\tb\" `c\\d`");
        assert_eq!(tokens[0], TokenKind::String("a\tb".into()));
        assert_eq!(tokens[1], TokenKind::String("c\\d".into()));
    }

    #[test]
    fn test_numbers() {
        let tokens = kinds("0x1F 0b101 017 1.5 2e3 .5");
        assert_eq!(tokens[0], TokenKind::Integer(31));
        assert_eq!(tokens[1], TokenKind::Integer(5));
        assert_eq!(tokens[2], TokenKind::Integer(15));
        assert_eq!(tokens[3], TokenKind::Float(1.5));
        assert_eq!(tokens[4], TokenKind::Float(2000.0));
        assert_eq!(tokens[5], TokenKind::Float(0.5));
    }

    #[test]
    fn test_exponent_without_digits() {
        let tokens = kinds("x := 1e");
        assert_eq!(tokens[2], TokenKind::Illegal('e'));
        assert!(matches!(kinds("2e+")[0], TokenKind::Illegal('e')));
    }

    #[test]
    fn test_operators() {
        let tokens = kinds("a <- b &^= c ... :=");
        assert_eq!(tokens[1], TokenKind::Arrow);
        assert_eq!(tokens[3], TokenKind::OpAssign(AssignOp::AndNot));
        assert_eq!(tokens[5], TokenKind::Ellipsis);
        assert_eq!(tokens[6], TokenKind::Define);
    }

    #[test]
    fn test_rune_literal() {
        let tokens = kinds("'a' '\\n'");
        assert_eq!(tokens[0], TokenKind::Char('a'));
        assert_eq!(tokens[1], TokenKind::Char('\n'));
    }
}
