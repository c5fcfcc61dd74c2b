use std::{iter::Peekable, num::ParseIntError};

use crate::token::{Span, Spanned, Token, TokenKind, KEYWORDS};

pub const SUGGESTED_TOKENS_CAPACITY: usize = 8_192;

/// Lexes the provided string, producing the tokens into the provided buffer.
///
/// Whitespace and comments are discarded. On success, the buffer is
/// terminated by a single [`TokenKind::Eof`] token. The first unrecognized
/// character aborts the scan.
pub fn lex(src: &str, tokens: &mut Vec<Token>) -> Result<(), Spanned<Error>> {
    Lexer::new(src, tokens).lex()
}

/// A convenience function that allocates a new buffer per lexed input and
/// returns it.
pub fn lex_in_new(src: &str) -> Result<Vec<Token>, Spanned<Error>> {
    let mut tokens = Vec::with_capacity(SUGGESTED_TOKENS_CAPACITY);
    lex(src, &mut tokens)?;
    Ok(tokens)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    UnexpectedChar(char),
}

struct Lexer<'src, 'tok> {
    src: &'src str,
    iter: Peekable<std::str::Chars<'src>>,
    cursor: usize,
    current_lo: usize,
    tokens: &'tok mut Vec<Token>,
}

impl Lexer<'_, '_> {
    /// Scans the source string until the input is exhausted.
    fn lex(mut self) -> Result<(), Spanned<Error>> {
        assert_eq!(self.tokens.len(), 0, "must pass clean tokens buffer");
        loop {
            let Some(next) = self.scan_token_kind() else {
                continue;
            };
            if next.is_error() {
                let c = self.substr().chars().next().unwrap_or('\0');
                return Err(self.span().wrap(Error::UnexpectedChar(c)));
            }
            self.produce(next);
            if next == TokenKind::Eof {
                return Ok(());
            }
        }
    }

    /// Tries to scan the current character. Returns `None` for trivia.
    fn scan_token_kind(&mut self) -> Option<TokenKind> {
        use TokenKind::*;
        let kind = match self.mark_advance() {
            '\0' if self.current_lo == self.src.len() => Eof,
            '+' => Plus,
            '-' => Minus,
            '*' => Star,
            '/' => match self.peek() {
                '/' => return self.inline_comment(),
                '*' => return self.multiline_comment(),
                _ => Slash,
            },
            '=' => Eq,
            ';' => Semicolon,
            '(' => LParen,
            ')' => RParen,
            '{' => LBrace,
            '}' => RBrace,
            c if c.is_ascii_alphabetic() => self.identifier_or_keyword(),
            c if c.is_ascii_digit() => self.number(),
            c if is_whitespace(c) => return self.whitespace(),
            _ => ErrorUnexpectedChar,
        };
        Some(kind)
    }

    fn identifier_or_keyword(&mut self) -> TokenKind {
        while self.peek().is_ascii_alphanumeric() {
            self.advance();
        }
        KEYWORDS
            .get(self.substr())
            .copied()
            .unwrap_or(TokenKind::Identifier)
    }

    fn number(&mut self) -> TokenKind {
        while self.peek().is_ascii_digit() {
            self.advance();
        }
        TokenKind::Int
    }

    fn whitespace(&mut self) -> Option<TokenKind> {
        while is_whitespace(self.peek()) {
            self.advance();
        }
        None
    }

    /// Skips a `//` comment up to (but not including) the line break.
    fn inline_comment(&mut self) -> Option<TokenKind> {
        assert_eq!(self.advance(), '/');
        while !self.is_exhausted() && self.peek() != '\n' {
            self.advance();
        }
        None
    }

    /// Skips a `/* */` comment, including its terminator. An unclosed
    /// comment runs until the end of the input.
    fn multiline_comment(&mut self) -> Option<TokenKind> {
        assert_eq!(self.advance(), '*');
        while !self.is_exhausted() {
            if self.advance() == '*' && self.peek() == '/' {
                self.advance();
                break;
            }
        }
        None
    }
}

impl Lexer<'_, '_> {
    /// Constructs a new lexer with the default state.
    fn new<'src, 'tok>(src: &'src str, tokens: &'tok mut Vec<Token>) -> Lexer<'src, 'tok> {
        Lexer {
            src,
            iter: src.chars().peekable(),
            cursor: 0,
            current_lo: 0,
            tokens,
        }
    }

    /// Starts a new token "mark" and advances the iterator.
    fn mark_advance(&mut self) -> char {
        self.current_lo = self.cursor;
        self.advance()
    }

    /// Returns the next character and advances the iterator.
    fn advance(&mut self) -> char {
        self.iter
            .next()
            .inspect(|c| self.cursor += c.len_utf8())
            .unwrap_or('\0')
    }

    /// Returns the next character without advancing the iterator.
    fn peek(&mut self) -> char {
        self.iter.peek().copied().unwrap_or('\0')
    }

    fn is_exhausted(&self) -> bool {
        self.cursor >= self.src.len()
    }

    /// Returns the current span.
    fn span(&self) -> Span {
        Span::new_of_bounds(self.current_lo..self.cursor)
    }

    /// Returns the substring of the current marked bounds.
    fn substr(&self) -> &str {
        self.span().substr(self.src)
    }

    /// Produces a token using the marked bounds.
    fn produce(&mut self, kind: TokenKind) {
        self.tokens.push(Token::new(kind, self.span()));
    }
}

/// ASCII whitespace, plus the vertical tab that
/// [`char::is_ascii_whitespace`] leaves out.
fn is_whitespace(c: char) -> bool {
    c.is_ascii_whitespace() || c == '\x0b'
}

pub mod extract {
    use super::*;

    pub fn int(token: Token, src: &str) -> Result<i64, ParseIntError> {
        debug_assert_eq!(token.kind, TokenKind::Int);
        token.span().substr(src).parse()
    }

    pub fn ident(token: Token, src: &str) -> &str {
        debug_assert_eq!(token.kind, TokenKind::Identifier);
        token.span().substr(src)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn tests_with_span() {
        use TokenKind::*;
        let cases = cases!(match .. {
            "+-*/" => [
                (Plus, 0..1),
                (Minus, 1..2),
                (Star, 2..3),
                (Slash, 3..4),
                (Eof, 4..4),
            ],
            "exit/let/if/elif/else" => [
                (Exit, 0..4),
                (Slash, 4..5),
                (Let, 5..8),
                (Slash, 8..9),
                (If, 9..11),
                (Slash, 11..12),
                (Elif, 12..16),
                (Slash, 16..17),
                (Else, 17..21),
                (Eof, 21..21),
            ],
            "Exit exits elif2 x1y" => [
                (Identifier, 0..4),
                (Identifier, 5..10),
                (Identifier, 11..16),
                (Identifier, 17..20),
                (Eof, 20..20),
            ],
            "1/11/01/123456789" => [
                (Int, 0..1),
                (Slash, 1..2),
                (Int, 2..4),
                (Slash, 4..5),
                (Int, 5..7),
                (Slash, 7..8),
                (Int, 8..17),
                (Eof, 17..17),
            ],
            "12abc" => [(Int, 0..2), (Identifier, 2..5), (Eof, 5..5)],
            "let x = (1);" => [
                (Let, 0..3),
                (Identifier, 4..5),
                (Eq, 6..7),
                (LParen, 8..9),
                (Int, 9..10),
                (RParen, 10..11),
                (Semicolon, 11..12),
                (Eof, 12..12),
            ],
            "{ }{}" => [
                (LBrace, 0..1),
                (RBrace, 2..3),
                (LBrace, 3..4),
                (RBrace, 4..5),
                (Eof, 5..5),
            ],
            "a // line comment\nb" => [
                (Identifier, 0..1),
                (Identifier, 18..19),
                (Eof, 19..19),
            ],
            "// line comment without line break" => [(Eof, 34..34)],
            "1 /* block\n comment */ 2 /**/ 3" => [
                (Int, 0..1),
                (Int, 23..24),
                (Int, 30..31),
                (Eof, 31..31),
            ],
            "a /* ** / */ b" => [(Identifier, 0..1), (Identifier, 13..14), (Eof, 14..14)],
            "x /* unclosed" => [(Identifier, 0..1), (Eof, 13..13)],
            "" => [(Eof, 0..0)],
            " \t\r\n " => [(Eof, 5..5)],
            "a\x0bb\x0c" => [(Identifier, 0..1), (Identifier, 2..3), (Eof, 4..4)],
            "exit(1);\x0bexit(2);" => [
                (Exit, 0..4),
                (LParen, 4..5),
                (Int, 5..6),
                (RParen, 6..7),
                (Semicolon, 7..8),
                (Exit, 9..13),
                (LParen, 13..14),
                (Int, 14..15),
                (RParen, 15..16),
                (Semicolon, 16..17),
                (Eof, 17..17),
            ],
        });

        for (input, tokens) in cases {
            let lexed = lex_in_new(input).expect("failed to lex");
            assert_eq!(lexed, tokens.as_slice());
        }
    }

    #[test]
    fn test_unexpected_char() {
        let cases: &[(&str, char, Span)] = &[
            ("$", '$', Span::new_of_bounds(0..1)),
            ("let x = 5 $ 3;", '$', Span::new_of_bounds(10..11)),
            ("exit(1) % 2", '%', Span::new_of_bounds(8..9)),
            ("my_var", '_', Span::new_of_bounds(2..3)),
            ("a < b", '<', Span::new_of_bounds(2..3)),
            ("é", 'é', Span::new_of_bounds(0..2)),
            ("x\0", '\0', Span::new_of_bounds(1..2)),
        ];
        for &(input, c, span) in cases {
            let error = lex_in_new(input).expect_err("must fail");
            assert_eq!(error, span.wrap(Error::UnexpectedChar(c)), "{input:?}");
        }
    }

    #[test]
    fn test_error_in_comment_is_ignored() {
        let lexed = lex_in_new("// $ %\n/* @ # */ exit").unwrap();
        let kinds: Vec<_> = lexed.iter().map(|t| t.kind).collect();
        assert_eq!(kinds, [TokenKind::Exit, TokenKind::Eof]);
    }

    #[test]
    fn test_relex_meaningful_tokens() {
        let src = "
            let x = 2; // two
            let y = (x+3)*4/ /* odd */ 2;
            if (x - y) { x = 10; } elif (0) { exit(1); } else { exit(y); }
        ";
        let first = lex_in_new(src).unwrap();
        let joined = first
            .iter()
            .map(|t| t.span().substr(src))
            .collect::<Vec<_>>()
            .join(" ");
        let second = lex_in_new(&joined).unwrap();

        let describe = |tokens: &[Token], src: &str| -> Vec<(TokenKind, String)> {
            tokens
                .iter()
                .map(|t| (t.kind, t.span().substr(src).to_owned()))
                .collect()
        };
        assert_eq!(describe(&first, src), describe(&second, &joined));
    }

    #[test]
    fn test_extract() {
        let src = "answer 42";
        let tokens = lex_in_new(src).unwrap();
        assert_eq!(extract::ident(tokens[0], src), "answer");
        assert_eq!(extract::int(tokens[1], src), Ok(42));

        let src = "99999999999999999999";
        let tokens = lex_in_new(src).unwrap();
        assert!(extract::int(tokens[0], src).is_err());
    }

    macro_rules! cases {
        (match .. {
            $($str:expr => [$(($kind:expr, $range:expr)),* $(,)?]),* $(,)?
        }) => {{
            &[$((
                $str,
                vec![
                    $(Token::new($kind, Span::new_of_bounds($range.start..$range.end))),*
                ],
            )),*]
        }};
    }
    use cases;
}
