//! # Statement Lexing
//!
//! Splits one template line into tokens. Words end at whitespace, `=`, `,`,
//! `[` and `]`; quoted strings accept `"` or `'` with backslash escapes;
//! `$name` and `{name}` produce reference and hole tokens directly.
//!
//! Errors are reported against line 1; template parsing rewrites the line
//! number once it knows which line was being lexed.

use std::iter::Peekable;
use std::str::CharIndices;

use runbook_types::TemplateError;
use runbook_types::value::is_word_delimiter;

/// Kind and payload of a lexed token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// Unquoted word, kept verbatim.
    Word(String),
    /// Quoted string with escapes already applied.
    Quoted(String),
    /// `$identifier`
    Reference(String),
    /// `{name}`
    Hole(String),
    Equals,
    Comma,
    ListOpen,
    ListClose,
}

/// Token with original byte positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// The starting byte position in the original string
    pub start: usize,
    /// The ending byte position in the original string
    pub end: usize,
}

/// Tokenize a single statement.
///
/// # Example
/// ```rust
/// use runbook_engine::lexer::{TokenKind, tokenize};
///
/// let tokens = tokenize("create subnet vpc=$myvpc name={subnet.name}").unwrap();
/// assert_eq!(tokens[0].kind, TokenKind::Word("create".into()));
/// assert_eq!(tokens[4].kind, TokenKind::Reference("myvpc".into()));
/// assert_eq!(tokens[7].kind, TokenKind::Hole("subnet.name".into()));
/// ```
pub fn tokenize(input: &str) -> Result<Vec<Token>, TemplateError> {
    let mut lexer = Lexer {
        input,
        chars: input.char_indices().peekable(),
    };
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next_token()? {
        tokens.push(token);
    }
    Ok(tokens)
}

struct Lexer<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl Lexer<'_> {
    fn next_token(&mut self) -> Result<Option<Token>, TemplateError> {
        while let Some((_, character)) = self.chars.peek() {
            if !character.is_whitespace() {
                break;
            }
            self.chars.next();
        }

        let Some((start, character)) = self.chars.next() else {
            return Ok(None);
        };

        let kind = match character {
            '=' => TokenKind::Equals,
            ',' => TokenKind::Comma,
            '[' => TokenKind::ListOpen,
            ']' => TokenKind::ListClose,
            '"' | '\'' => {
                let text = self.quoted(start, character)?;
                self.expect_boundary(start)?;
                TokenKind::Quoted(text)
            }
            '$' => {
                let name = self.word_from(start + 1);
                if !is_identifier(&name) {
                    return Err(self.error(start, "malformed reference; expected $identifier"));
                }
                TokenKind::Reference(name)
            }
            '{' => {
                let name = self.hole(start)?;
                self.expect_boundary(start)?;
                TokenKind::Hole(name)
            }
            _ => TokenKind::Word(self.word_from(start)),
        };

        Ok(Some(Token {
            kind,
            start,
            end: self.position(),
        }))
    }

    fn position(&mut self) -> usize {
        self.chars.peek().map(|(index, _)| *index).unwrap_or(self.input.len())
    }

    /// Consumes word characters and returns the word starting at `start`.
    fn word_from(&mut self, start: usize) -> String {
        while let Some((_, character)) = self.chars.peek() {
            if is_word_delimiter(*character) {
                break;
            }
            self.chars.next();
        }
        let end = self.position();
        self.input[start.min(end)..end].to_string()
    }

    fn quoted(&mut self, start: usize, quote: char) -> Result<String, TemplateError> {
        let mut text = String::new();
        loop {
            let Some((_, character)) = self.chars.next() else {
                return Err(self.error(start, "unterminated quoted string"));
            };
            match character {
                '\\' => {
                    let Some((_, escaped)) = self.chars.next() else {
                        return Err(self.error(start, "unterminated quoted string"));
                    };
                    match escaped {
                        'n' => text.push('\n'),
                        't' => text.push('\t'),
                        'r' => text.push('\r'),
                        '\\' | '"' | '\'' => text.push(escaped),
                        other => return Err(self.error(start, &format!("unknown escape sequence '\\{other}'"))),
                    }
                }
                character if character == quote => return Ok(text),
                character => text.push(character),
            }
        }
    }

    fn hole(&mut self, start: usize) -> Result<String, TemplateError> {
        let mut name = String::new();
        loop {
            match self.chars.next() {
                Some((_, '}')) => break,
                Some((_, character)) if !character.is_whitespace() => name.push(character),
                _ => return Err(self.error(start, "unterminated hole; expected {name}")),
            }
        }
        if !is_hole_name(&name) {
            return Err(self.error(start, "malformed hole name"));
        }
        Ok(name)
    }

    /// A quoted string or hole must be followed by a delimiter.
    fn expect_boundary(&mut self, start: usize) -> Result<(), TemplateError> {
        match self.chars.peek() {
            Some((_, character)) if !is_word_delimiter(*character) => {
                Err(self.error(start, "unexpected character after value"))
            }
            _ => Ok(()),
        }
    }

    fn error(&mut self, start: usize, message: &str) -> TemplateError {
        let end = self.position().max(start);
        let token = &self.input[start..end];
        TemplateError::syntax(1, token, message)
    }
}

/// `[A-Za-z_][A-Za-z0-9_-]*`: declaration and reference names.
pub fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|character| character.is_ascii_alphanumeric() || character == '_' || character == '-')
}

/// `[A-Za-z_][A-Za-z0-9_.-]*`: parameter keys and hole names.
pub fn is_hole_name(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|character| character.is_ascii_alphanumeric() || matches!(character, '_' | '-' | '.'))
}

/// `[a-z][a-z0-9_-]*`: actions and entities.
pub fn is_verb_or_noun(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) if first.is_ascii_lowercase() => {}
        _ => return false,
    }
    chars.all(|character| character.is_ascii_lowercase() || character.is_ascii_digit() || character == '_' || character == '-')
}
