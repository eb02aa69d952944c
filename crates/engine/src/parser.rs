//! # Template Parsing
//!
//! Turns canonical template text into syntax tree nodes.
//!
//! ```text
//! myvpc = create vpc cidr=10.0.0.0/16 name={vpc.name}
//! create subnet vpc=$myvpc cidr=10.0.1.0/24
//! ```
//!
//! [`parse_statement`] handles a single line and is the inverse of the
//! `Display` rendering of a command node. [`parse_template`] parses a whole
//! template and additionally enforces that identifiers are declared once and
//! only referenced after their declaration.

use std::collections::HashSet;

use indexmap::IndexMap;
use tracing::debug;

use runbook_types::value::classify_bare_word;
use runbook_types::{Ast, CommandNode, CompositeValue, DeclarationNode, Literal, Node, Statement, TemplateError};

use crate::lexer::{Token, TokenKind, is_hole_name, is_identifier, is_verb_or_noun, tokenize};

/// Parses exactly one statement: a declaration or a bare command.
///
/// # Errors
///
/// Returns [`TemplateError::Syntax`] for malformed actions or entities,
/// unknown value shapes, duplicate parameter names or trailing tokens.
///
/// # Example
/// ```rust
/// use runbook_engine::parser::parse_statement;
/// use runbook_types::{CompositeValue, Node};
///
/// let Node::Declaration(declaration) = parse_statement("myvpc = create vpc count=1").unwrap() else {
///     panic!("expected a declaration");
/// };
/// assert_eq!(declaration.identifier, "myvpc");
/// assert_eq!(declaration.expr.params["count"], CompositeValue::literal(1i64));
/// ```
pub fn parse_statement(text: &str) -> Result<Node, TemplateError> {
    let tokens = tokenize(text)?;
    StatementParser {
        text,
        tokens: &tokens,
        position: 0,
    }
    .parse()
}

/// Parses a multi-line template.
///
/// Blank lines and lines starting with `#` are skipped. Syntax errors carry
/// the 1-based line number of the offending statement.
pub fn parse_template(text: &str) -> Result<Ast, TemplateError> {
    let mut statements = Vec::new();
    let mut declared: HashSet<String> = HashSet::new();

    for (index, line) in text.lines().enumerate() {
        let line_number = index + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let node = parse_statement(trimmed).map_err(|error| error.at_line(line_number))?;
        let statement = Statement { node };

        for value in statement.command_node().params.values() {
            if let Some(identifier) = value.as_reference()
                && !declared.contains(identifier)
            {
                return Err(TemplateError::syntax(
                    line_number,
                    format!("${identifier}"),
                    "reference to an identifier not declared on an earlier line",
                ));
            }
        }

        if let Some(identifier) = statement.declared_identifier()
            && !declared.insert(identifier.to_string())
        {
            return Err(TemplateError::syntax(line_number, identifier, "identifier is already declared"));
        }

        statements.push(statement);
    }

    debug!(statement_count = statements.len(), "parsed template");
    Ok(Ast { statements })
}

struct StatementParser<'a> {
    text: &'a str,
    tokens: &'a [Token],
    position: usize,
}

impl<'a> StatementParser<'a> {
    fn parse(mut self) -> Result<Node, TemplateError> {
        if self.tokens.is_empty() {
            return Err(TemplateError::syntax(1, "", "empty statement"));
        }

        let tokens = self.tokens;
        let identifier = match (tokens.first(), tokens.get(1)) {
            (Some(first), Some(second)) if second.kind == TokenKind::Equals => {
                let TokenKind::Word(name) = &first.kind else {
                    return Err(self.error_at(first, "expected an identifier before '='"));
                };
                if !is_identifier(name) {
                    return Err(self.error_at(first, "malformed identifier"));
                }
                self.position = 2;
                Some(name.clone())
            }
            _ => None,
        };

        let action = self.verb_or_noun("action")?;
        let entity = self.verb_or_noun("entity")?;
        let mut command = CommandNode::new(action, entity);
        command.params = self.params()?;

        Ok(match identifier {
            Some(identifier) => Node::Declaration(DeclarationNode { identifier, expr: command }),
            None => Node::Command(command),
        })
    }

    fn verb_or_noun(&mut self, what: &str) -> Result<String, TemplateError> {
        let Some(token) = self.next() else {
            return Err(TemplateError::syntax(1, self.text.trim(), format!("missing {what}")));
        };
        match &token.kind {
            TokenKind::Word(word) if is_verb_or_noun(word) => Ok(word.clone()),
            _ => Err(self.error_at(token, &format!("malformed {what}; expected lowercase word"))),
        }
    }

    fn params(&mut self) -> Result<IndexMap<String, CompositeValue>, TemplateError> {
        let mut params = IndexMap::new();
        while let Some(key_token) = self.next() {
            let key = match &key_token.kind {
                TokenKind::Word(word) if is_hole_name(word) => word.clone(),
                _ => return Err(self.error_at(key_token, "expected a parameter as key=value")),
            };
            match self.next() {
                Some(token) if token.kind == TokenKind::Equals => {}
                _ => return Err(self.error_at(key_token, "expected '=' after parameter name")),
            }
            let value = self.value(key_token)?;
            if params.contains_key(&key) {
                return Err(self.error_at(key_token, "duplicate parameter name"));
            }
            params.insert(key, value);
        }
        Ok(params)
    }

    fn value(&mut self, key_token: &Token) -> Result<CompositeValue, TemplateError> {
        let Some(token) = self.next() else {
            return Err(self.error_at(key_token, "missing parameter value"));
        };
        match &token.kind {
            TokenKind::Reference(identifier) => Ok(CompositeValue::Reference(identifier.clone())),
            TokenKind::Hole(name) => Ok(CompositeValue::Hole(name.clone())),
            TokenKind::ListOpen => self.list(token).map(CompositeValue::Interface),
            _ => match self.scalar(token) {
                Some(literal) => Ok(CompositeValue::Interface(literal)),
                None => Err(self.error_at(token, "expected a value")),
            },
        }
    }

    fn list(&mut self, open: &Token) -> Result<Literal, TemplateError> {
        let mut items = Vec::new();
        if matches!(self.peek(), Some(token) if token.kind == TokenKind::ListClose) {
            self.position += 1;
            return Ok(Literal::List(items));
        }

        loop {
            let Some(token) = self.next() else {
                return Err(self.error_at(open, "unterminated list"));
            };
            match &token.kind {
                TokenKind::ListOpen => return Err(self.error_at(token, "nested lists are not supported")),
                TokenKind::Reference(_) | TokenKind::Hole(_) => {
                    return Err(self.error_at(token, "lists may only contain literals"));
                }
                _ => match self.scalar(token) {
                    Some(literal) => items.push(literal),
                    None => return Err(self.error_at(token, "expected a list item")),
                },
            }

            match self.next() {
                Some(token) if token.kind == TokenKind::Comma => continue,
                Some(token) if token.kind == TokenKind::ListClose => return Ok(Literal::List(items)),
                Some(token) => return Err(self.error_at(token, "expected ',' or ']' in list")),
                None => return Err(self.error_at(open, "unterminated list")),
            }
        }
    }

    fn scalar(&self, token: &Token) -> Option<Literal> {
        match &token.kind {
            TokenKind::Word(word) => Some(classify_bare_word(word)),
            TokenKind::Quoted(text) => Some(Literal::String(text.clone())),
            _ => None,
        }
    }

    fn next(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.position);
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.position)
    }

    fn error_at(&self, token: &Token, message: &str) -> TemplateError {
        TemplateError::syntax(1, &self.text[token.start..token.end], message)
    }
}
