//! A small PHP-flavoured lexer producing a tagged token stream.
//!
//! It only needs to be precise enough to find declaration keywords outside of
//! strings, comments and inline markup. Tokens carry their kind, their text and
//! their byte offset into the input. Input is raw bytes; a chunked read may cut
//! a multi-byte character, which only affects the lossy token text.

use crate::error::LexError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    InlineHtml,
    OpenTag,
    CloseTag,
    Whitespace,
    Comment,
    Attribute,
    StringLiteral,
    Heredoc,
    Variable,
    Number,
    Identifier,
    Namespace,
    Class,
    Interface,
    Trait,
    Enum,
    NsSeparator,
    DoubleColon,
    Arrow,
    OpenBrace,
    CloseBrace,
    Semicolon,
    Punct,
}

impl TokenKind {
    /// Whitespace and comments.
    pub fn is_trivia(self) -> bool {
        matches!(self, TokenKind::Whitespace | TokenKind::Comment)
    }

    /// `interface`, `trait` and `enum` count as class declarations too, so the
    /// first declaration of any of the four kinds is the one reported.
    pub fn is_class_like(self) -> bool {
        matches!(
            self,
            TokenKind::Class | TokenKind::Interface | TokenKind::Trait | TokenKind::Enum
        )
    }

    /// Tokens after which a keyword is a member name rather than a keyword.
    pub fn is_member_access(self) -> bool {
        matches!(self, TokenKind::DoubleColon | TokenKind::Arrow)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub offset: usize,
}

pub fn tokenize(input: &[u8]) -> Result<Vec<Token>, LexError> {
    Lexer::new(input).run()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Html,
    Code,
}

struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
    mode: Mode,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            pos: 0,
            mode: Mode::Html,
            tokens: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Vec<Token>, LexError> {
        while self.pos < self.input.len() {
            match self.mode {
                Mode::Html => self.lex_html(),
                Mode::Code => self.lex_code()?,
            }
        }
        Ok(self.tokens)
    }

    fn push(&mut self, kind: TokenKind, start: usize) {
        let text = String::from_utf8_lossy(&self.input[start..self.pos]).into_owned();
        self.tokens.push(Token {
            kind,
            text,
            offset: start,
        });
    }

    fn rest(&self) -> &'a [u8] {
        &self.input[self.pos..]
    }

    fn peek(&self, ahead: usize) -> Option<u8> {
        self.input.get(self.pos + ahead).copied()
    }

    fn lex_html(&mut self) {
        let start = self.pos;
        match find_open_tag(self.rest()) {
            Some((at, len)) => {
                if at > 0 {
                    self.pos += at;
                    self.push(TokenKind::InlineHtml, start);
                }
                let tag_start = self.pos;
                self.pos += len;
                self.push(TokenKind::OpenTag, tag_start);
                self.mode = Mode::Code;
            }
            None => {
                self.pos = self.input.len();
                self.push(TokenKind::InlineHtml, start);
            }
        }
    }

    fn lex_code(&mut self) -> Result<(), LexError> {
        let start = self.pos;
        let c = self.input[self.pos];

        if c == 0 {
            return Err(LexError::NulByte { offset: start });
        }

        if c.is_ascii_whitespace() {
            self.eat_while(|b| b.is_ascii_whitespace());
            self.push(TokenKind::Whitespace, start);
            return Ok(());
        }

        if self.rest().starts_with(b"?>") {
            self.pos += 2;
            if self.peek(0) == Some(b'\n') {
                self.pos += 1;
            }
            self.push(TokenKind::CloseTag, start);
            self.mode = Mode::Html;
            return Ok(());
        }

        match c {
            b'#' if self.peek(1) == Some(b'[') => {
                self.pos += 2;
                self.push(TokenKind::Attribute, start);
            }
            b'#' => self.line_comment(start, 1),
            b'/' if self.peek(1) == Some(b'/') => self.line_comment(start, 2),
            b'/' if self.peek(1) == Some(b'*') => {
                self.pos += 2;
                match find(self.rest(), b"*/") {
                    Some(end) => self.pos += end + 2,
                    None => self.pos = self.input.len(),
                }
                self.push(TokenKind::Comment, start);
            }
            b'\'' | b'"' | b'`' => {
                self.quoted(c);
                self.push(TokenKind::StringLiteral, start);
            }
            b'<' if self.rest().starts_with(b"<<<") => {
                if self.heredoc() {
                    self.push(TokenKind::Heredoc, start);
                } else {
                    self.pos = start + 1;
                    self.push(TokenKind::Punct, start);
                }
            }
            b'$' if self.peek(1).is_some_and(is_ident_start) => {
                self.pos += 1;
                self.eat_while(is_ident_continue);
                self.push(TokenKind::Variable, start);
            }
            b'0'..=b'9' => {
                self.eat_while(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'.');
                self.push(TokenKind::Number, start);
            }
            _ if is_ident_start(c) => {
                self.eat_while(is_ident_continue);
                let kind = keyword_kind(&self.input[start..self.pos]);
                self.push(kind, start);
            }
            b'\\' => {
                self.pos += 1;
                self.push(TokenKind::NsSeparator, start);
            }
            b':' if self.peek(1) == Some(b':') => {
                self.pos += 2;
                self.push(TokenKind::DoubleColon, start);
            }
            b'-' if self.peek(1) == Some(b'>') => {
                self.pos += 2;
                self.push(TokenKind::Arrow, start);
            }
            b'?' if self.rest().starts_with(b"?->") => {
                self.pos += 3;
                self.push(TokenKind::Arrow, start);
            }
            b'{' => {
                self.pos += 1;
                self.push(TokenKind::OpenBrace, start);
            }
            b'}' => {
                self.pos += 1;
                self.push(TokenKind::CloseBrace, start);
            }
            b';' => {
                self.pos += 1;
                self.push(TokenKind::Semicolon, start);
            }
            _ => {
                self.pos += 1;
                self.push(TokenKind::Punct, start);
            }
        }
        Ok(())
    }

    fn eat_while(&mut self, pred: impl Fn(u8) -> bool) {
        while self.pos < self.input.len() && pred(self.input[self.pos]) {
            self.pos += 1;
        }
    }

    /// Line comments stop before a newline or a close tag.
    fn line_comment(&mut self, start: usize, opener: usize) {
        self.pos += opener;
        while self.pos < self.input.len() {
            let b = self.input[self.pos];
            if b == b'\n' || self.rest().starts_with(b"?>") {
                break;
            }
            self.pos += 1;
        }
        self.push(TokenKind::Comment, start);
    }

    fn quoted(&mut self, quote: u8) {
        self.pos += 1;
        while self.pos < self.input.len() {
            match self.input[self.pos] {
                b'\\' => self.pos = (self.pos + 2).min(self.input.len()),
                b if b == quote => {
                    self.pos += 1;
                    return;
                }
                _ => self.pos += 1,
            }
        }
    }

    /// `<<<ID`, `<<<"ID"` or `<<<'ID'` up to the closing identifier at the
    /// start of a line (indentation allowed). Returns false when the opener is
    /// not a well-formed heredoc header.
    fn heredoc(&mut self) -> bool {
        let mut p = self.pos + 3;
        while p < self.input.len() && matches!(self.input[p], b' ' | b'\t') {
            p += 1;
        }
        let quote = match self.input.get(p).copied() {
            Some(q @ (b'"' | b'\'')) => {
                p += 1;
                Some(q)
            }
            _ => None,
        };
        let label_start = p;
        while p < self.input.len() && is_ident_continue(self.input[p]) {
            p += 1;
        }
        if p == label_start || !is_ident_start(self.input[label_start]) {
            return false;
        }
        let label = &self.input[label_start..p];
        if let Some(q) = quote {
            if self.input.get(p) != Some(&q) {
                return false;
            }
            p += 1;
        }
        if !matches!(self.input.get(p), Some(b'\n') | Some(b'\r') | None) {
            return false;
        }

        let mut line_start = p;
        while let Some(nl) = self.input[line_start..].iter().position(|&b| b == b'\n') {
            line_start += nl + 1;
            let mut q = line_start;
            while q < self.input.len() && matches!(self.input[q], b' ' | b'\t') {
                q += 1;
            }
            if self.input[q..].starts_with(label)
                && !self
                    .input
                    .get(q + label.len())
                    .copied()
                    .is_some_and(is_ident_continue)
            {
                self.pos = q + label.len();
                return true;
            }
        }
        self.pos = self.input.len();
        true
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Locates the next `<?php`, `<?=` or `<?` open tag.
fn find_open_tag(input: &[u8]) -> Option<(usize, usize)> {
    let at = find(input, b"<?")?;
    let after = &input[at + 2..];
    let len = if after.len() >= 3 && after[..3].eq_ignore_ascii_case(b"php") {
        5
    } else if after.first() == Some(&b'=') {
        3
    } else {
        2
    };
    Some((at, len))
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b >= 0x80
}

fn is_ident_continue(b: u8) -> bool {
    is_ident_start(b) || b.is_ascii_digit()
}

fn keyword_kind(word: &[u8]) -> TokenKind {
    let lower = word.to_ascii_lowercase();
    match lower.as_slice() {
        b"namespace" => TokenKind::Namespace,
        b"class" => TokenKind::Class,
        b"interface" => TokenKind::Interface,
        b"trait" => TokenKind::Trait,
        b"enum" => TokenKind::Enum,
        _ => TokenKind::Identifier,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src.as_bytes())
            .unwrap()
            .into_iter()
            .filter(|t| !t.kind.is_trivia())
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn tokenizes_class_header() {
        let tokens = tokenize(b"<?php class Foo extends Bar {}").unwrap();
        let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::OpenTag,
                TokenKind::Whitespace,
                TokenKind::Class,
                TokenKind::Whitespace,
                TokenKind::Identifier,
                TokenKind::Whitespace,
                TokenKind::Identifier,
                TokenKind::Whitespace,
                TokenKind::Identifier,
                TokenKind::Whitespace,
                TokenKind::OpenBrace,
                TokenKind::CloseBrace,
            ]
        );
        assert_eq!(tokens[4].text, "Foo");
        assert_eq!(tokens[4].offset, 12);
    }

    #[test]
    fn text_before_open_tag_is_inline_html() {
        let tokens = tokenize(b"<html>class Nope {}<?= $x ?>\n</html>").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::InlineHtml);
        assert_eq!(tokens[0].text, "<html>class Nope {}");
        assert_eq!(tokens[1].kind, TokenKind::OpenTag);
        assert_eq!(tokens.last().map(|t| t.kind), Some(TokenKind::InlineHtml));
        assert!(!tokens.iter().any(|t| t.kind == TokenKind::Class));
    }

    #[test]
    fn keywords_inside_strings_and_comments_are_not_keywords() {
        let src = r#"<?php
// class Foo {
# class Bar {
/* class Baz { */
$a = 'class Qux {';
$b = "class \"Quux\" {";
"#;
        assert!(!kinds(src).iter().any(|k| k.is_class_like()));
    }

    #[test]
    fn attributes_do_not_comment_out_the_line() {
        let k = kinds("<?php #[Entity] class User {}");
        assert!(k.contains(&TokenKind::Attribute));
        assert!(k.contains(&TokenKind::Class));
    }

    #[test]
    fn heredoc_body_is_one_token() {
        let src = "<?php\n$x = <<<EOT\nclass Hidden {\nEOT;\nclass Real {}\n";
        let tokens = tokenize(src.as_bytes()).unwrap();
        let heredoc = tokens.iter().find(|t| t.kind == TokenKind::Heredoc).unwrap();
        assert!(heredoc.text.contains("Hidden"));
        let classes: Vec<&Token> = tokens.iter().filter(|t| t.kind == TokenKind::Class).collect();
        assert_eq!(classes.len(), 1);
    }

    #[test]
    fn namespace_separators_and_member_access() {
        let k = kinds(r"<?php namespace App\Http; Foo::class; $x?->class;");
        assert_eq!(
            k,
            vec![
                TokenKind::OpenTag,
                TokenKind::Namespace,
                TokenKind::Identifier,
                TokenKind::NsSeparator,
                TokenKind::Identifier,
                TokenKind::Semicolon,
                TokenKind::Identifier,
                TokenKind::DoubleColon,
                TokenKind::Class,
                TokenKind::Semicolon,
                TokenKind::Variable,
                TokenKind::Arrow,
                TokenKind::Class,
                TokenKind::Semicolon,
            ]
        );
    }

    #[test]
    fn keywords_are_case_insensitive() {
        let k = kinds("<?php NameSpace A; CLASS B {}");
        assert!(k.contains(&TokenKind::Namespace));
        assert!(k.contains(&TokenKind::Class));
    }

    #[test]
    fn nul_byte_in_code_fails() {
        assert_eq!(
            tokenize(b"<?php \0 class A {}"),
            Err(LexError::NulByte { offset: 6 })
        );
        assert_eq!(
            LexError::NulByte { offset: 6 }.to_string(),
            "NUL byte in code at offset 6"
        );
        // NUL in inline markup is just markup.
        assert!(tokenize(b"\0<?php class A {}").is_ok());
    }

    #[test]
    fn truncated_input_still_tokenizes() {
        let tokens = tokenize(b"<?php /* unterminated cla").unwrap();
        assert_eq!(tokens.last().map(|t| t.kind), Some(TokenKind::Comment));
        let tokens = tokenize(b"<?php $s = 'open string").unwrap();
        assert_eq!(tokens.last().map(|t| t.kind), Some(TokenKind::StringLiteral));
    }
}
