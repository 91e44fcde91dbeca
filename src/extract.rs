//! Class-name recovery by streaming token scan.
//!
//! The file is read in fixed-size chunks into a growing buffer. Nothing is
//! tokenized until a `{` has shown up, since no class header can be complete
//! before that. After that, every new chunk re-tokenizes the whole buffer from
//! the start. That repeats work on long preambles but keeps the lexer
//! stateless; buffers stay a few chunks long in practice.
//!
//! Tokens near the end of a non-final buffer may still change once more bytes
//! arrive (`cla` becoming `class`, `<?p` becoming `<?php`), so the scan only
//! consumes tokens that end at least [`TAIL_GUARD`] bytes before the buffer
//! end and are not the last token. The final pass at end of file consumes
//! everything.

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

use crate::error::LexError;
use crate::lexer::{Token, TokenKind, tokenize};

pub const DEFAULT_CHUNK_SIZE: usize = 512;

const TAIL_GUARD: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedName {
    pub namespace: Option<String>,
    pub class_name: String,
}

impl ExtractedName {
    /// `Namespace\Class`, or the bare class name outside a namespace.
    pub fn qualified(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{ns}\\{}", self.class_name),
            None => self.class_name.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClassNameExtractor {
    chunk_size: usize,
}

impl Default for ClassNameExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

impl ClassNameExtractor {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn extract_class_name(&self, path: &Path) -> Option<String> {
        self.extract(path).map(|name| name.class_name)
    }

    /// Never fails: unreadable or untokenizable files yield `None`.
    pub fn extract(&self, path: &Path) -> Option<ExtractedName> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(err) => {
                log::debug!(target: "extract", "cannot open {}: {err}", path.display());
                return None;
            }
        };
        let found = self.extract_from_reader(file);
        if found.is_none() {
            log::debug!(target: "extract", "no class declaration in {}", path.display());
        }
        found
    }

    pub fn extract_from_reader<R: Read>(&self, mut reader: R) -> Option<ExtractedName> {
        let mut state = TokenizerState::default();
        let mut chunk = vec![0u8; self.chunk_size];

        loop {
            let n = match read_chunk(&mut reader, &mut chunk) {
                Ok(n) => n,
                Err(err) => {
                    log::debug!(target: "extract", "read failed: {err}");
                    return None;
                }
            };
            let eof = n == 0;
            if !eof {
                state.append(&chunk[..n]);
            }

            if !state.brace_seen {
                if eof {
                    return None;
                }
                continue;
            }

            match state.advance(eof) {
                Ok(Some(found)) => return Some(found),
                Ok(None) if eof => return None,
                Ok(None) => {}
                Err(err) => {
                    log::debug!(target: "extract", "tokenizer gave up: {err}");
                    return None;
                }
            }
        }
    }
}

fn read_chunk<R: Read>(reader: &mut R, chunk: &mut [u8]) -> std::io::Result<usize> {
    loop {
        match reader.read(chunk) {
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

/// Per-file scan state; dropped once the file is done.
#[derive(Debug, Default)]
struct TokenizerState {
    buffer: Vec<u8>,
    brace_seen: bool,
    namespace: Option<String>,
    class_name: Option<String>,
    /// Byte offset of the first token not yet consumed.
    cursor: usize,
}

impl TokenizerState {
    fn append(&mut self, bytes: &[u8]) {
        if !self.brace_seen && bytes.contains(&b'{') {
            self.brace_seen = true;
        }
        self.buffer.extend_from_slice(bytes);
    }

    fn advance(&mut self, last: bool) -> Result<Option<ExtractedName>, LexError> {
        if let Some(class_name) = &self.class_name {
            return Ok(Some(ExtractedName {
                namespace: self.namespace.clone(),
                class_name: class_name.clone(),
            }));
        }

        let tokens = tokenize(&self.buffer)?;
        let stable = if last {
            tokens.len()
        } else {
            stable_len(&tokens, self.buffer.len())
        };

        let mut i = tokens
            .iter()
            .position(|t| t.offset >= self.cursor)
            .unwrap_or(tokens.len());

        while i < stable {
            let kind = tokens[i].kind;
            let is_keyword = kind == TokenKind::Namespace || kind.is_class_like();
            if is_keyword && !after_member_access(&tokens, i) {
                if kind == TokenKind::Namespace {
                    match namespace_clause(&tokens, i + 1, stable) {
                        Clause::Complete { name, next } => {
                            self.namespace = name;
                            i = next;
                            self.cursor = token_offset(&tokens, i, self.buffer.len());
                            continue;
                        }
                        Clause::Pending if !last => return Ok(None),
                        Clause::Pending | Clause::NotAClause => {}
                    }
                } else {
                    match declared_name(&tokens, i + 1, stable) {
                        Declaration::Found(name) => {
                            self.class_name = Some(name.clone());
                            return Ok(Some(ExtractedName {
                                namespace: self.namespace.clone(),
                                class_name: name,
                            }));
                        }
                        Declaration::Pending if !last => return Ok(None),
                        Declaration::Pending | Declaration::NotADeclaration => {}
                    }
                }
            }
            i += 1;
            self.cursor = token_offset(&tokens, i, self.buffer.len());
        }
        Ok(None)
    }
}

fn token_offset(tokens: &[Token], i: usize, end: usize) -> usize {
    tokens.get(i).map_or(end, |t| t.offset)
}

/// Number of leading tokens that can no longer change as the buffer grows.
fn stable_len(tokens: &[Token], buffer_len: usize) -> usize {
    let limit = buffer_len.saturating_sub(TAIL_GUARD);
    // A token ends where the next one starts; the last token never qualifies.
    tokens
        .windows(2)
        .take_while(|pair| pair[1].offset <= limit)
        .count()
}

fn after_member_access(tokens: &[Token], i: usize) -> bool {
    tokens[..i]
        .iter()
        .rev()
        .find(|t| !t.kind.is_trivia())
        .is_some_and(|t| t.kind.is_member_access())
}

fn next_significant(tokens: &[Token], from: usize, stable: usize) -> Option<usize> {
    (from..stable).find(|&j| !tokens[j].kind.is_trivia())
}

enum Clause {
    Complete { name: Option<String>, next: usize },
    Pending,
    NotAClause,
}

/// `namespace A\B;` or `namespace A\B {`. A bare `namespace {` declares the
/// global namespace; `namespace\foo()` is a relative name, not a clause.
fn namespace_clause(tokens: &[Token], from: usize, stable: usize) -> Clause {
    let mut name = String::new();
    for j in from..stable {
        let token = &tokens[j];
        match token.kind {
            k if k.is_trivia() => {}
            TokenKind::Identifier | TokenKind::Namespace => name.push_str(&token.text),
            k if k.is_class_like() => name.push_str(&token.text),
            TokenKind::NsSeparator if !name.is_empty() => name.push('\\'),
            TokenKind::OpenBrace | TokenKind::Semicolon => {
                return Clause::Complete {
                    name: (!name.is_empty()).then_some(name),
                    next: j + 1,
                };
            }
            _ => return Clause::NotAClause,
        }
    }
    Clause::Pending
}

enum Declaration {
    Found(String),
    Pending,
    NotADeclaration,
}

/// The name following a class-like keyword, accepted once the declaration's
/// opening brace is in view. `new class {` and `new class(...)` are anonymous.
fn declared_name(tokens: &[Token], from: usize, stable: usize) -> Declaration {
    let Some(j) = next_significant(tokens, from, stable) else {
        return Declaration::Pending;
    };
    let name = &tokens[j];
    if !matches!(name.kind, TokenKind::Identifier | TokenKind::Enum) {
        return Declaration::NotADeclaration;
    }

    for token in &tokens[j + 1..stable] {
        match token.kind {
            TokenKind::OpenBrace => return Declaration::Found(name.text.clone()),
            TokenKind::Semicolon | TokenKind::CloseBrace => return Declaration::NotADeclaration,
            _ => {}
        }
    }
    Declaration::Pending
}
