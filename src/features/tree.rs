//! A lossless statement tree for feature source
//!
//! This is not a full feature-file grammar. It understands just enough
//! structure to find language systems and top-level blocks, to inject and
//! append statements, and to remove them again before compilation. Parsed
//! statements keep their exact source text (leading whitespace and comments
//! included), so printing an unmodified tree reproduces the input byte for
//! byte.

use crate::error::BuildError;
use std::fmt;

/// Where a statement came from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Origin {
    /// Written by the designer
    Source,
    /// Added temporarily so a generator sees every script of the font
    Injected,
    /// Produced by a generator
    Synthesized,
}

#[derive(Clone, Debug, PartialEq)]
pub enum StatementKind {
    LanguageSystem { script: String, language: String },
    Script(String),
    Language(String),
    LookupReference(String),
    /// A `feature`, `lookup` or `table` block
    Block {
        keyword: String,
        label: String,
        body: Vec<Statement>,
    },
    /// Any other statement, kept as text
    Other(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Statement {
    pub origin: Origin,
    pub kind: StatementKind,
    /// Exact source span for parsed statements
    source: Option<String>,
}

impl Statement {
    pub fn injected(kind: StatementKind) -> Self {
        Self {
            origin: Origin::Injected,
            kind,
            source: None,
        }
    }

    pub fn synthesized(kind: StatementKind) -> Self {
        Self {
            origin: Origin::Synthesized,
            kind,
            source: None,
        }
    }

    pub fn is_block(&self, keyword: &str, label: &str) -> bool {
        matches!(&self.kind, StatementKind::Block { keyword: k, label: l, .. } if k == keyword && l == label)
    }

    fn write_to(&self, out: &mut String, depth: usize) {
        if let Some(source) = &self.source {
            out.push_str(source);
            return;
        }

        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        let indent = "    ".repeat(depth);
        match &self.kind {
            StatementKind::LanguageSystem { script, language } => {
                out.push_str(&format!("{indent}languagesystem {script} {language};\n"));
            }
            StatementKind::Script(script) => out.push_str(&format!("{indent}script {script};\n")),
            StatementKind::Language(language) => {
                out.push_str(&format!("{indent}language {language};\n"));
            }
            StatementKind::LookupReference(name) => {
                out.push_str(&format!("{indent}lookup {name};\n"));
            }
            StatementKind::Block {
                keyword,
                label,
                body,
            } => {
                out.push_str(&format!("{indent}{keyword} {label} {{\n"));
                for statement in body {
                    statement.write_to(out, depth + 1);
                }
                if !out.ends_with('\n') {
                    out.push('\n');
                }
                out.push_str(&format!("{indent}}} {label};\n"));
            }
            StatementKind::Other(text) => {
                out.push_str(&indent);
                out.push_str(text);
                out.push('\n');
            }
        }
    }
}

/// Parsed feature source
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FeatureTree {
    statements: Vec<Statement>,
    /// Whitespace and comments after the last statement
    trailing: String,
}

impl FeatureTree {
    pub fn parse(text: &str) -> Result<Self, BuildError> {
        let tokens = tokenize(text)?;
        let mut parser = Parser {
            text,
            tokens,
            pos: 0,
            span_start: 0,
        };
        let statements = parser.statements(None)?;
        let trailing = text[parser.span_start..].to_string();
        Ok(Self {
            statements,
            trailing,
        })
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    /// Whether the designer wrote a top-level `kern` or `dist` feature
    pub fn declares_kerning(&self) -> bool {
        self.statements
            .iter()
            .any(|s| s.is_block("feature", "kern") || s.is_block("feature", "dist"))
    }

    /// Top-level `languagesystem` statements as `(script, language)` pairs
    pub fn language_systems(&self) -> Vec<(String, String)> {
        self.statements
            .iter()
            .filter_map(|statement| match &statement.kind {
                StatementKind::LanguageSystem { script, language } => {
                    Some((script.clone(), language.clone()))
                }
                _ => None,
            })
            .collect()
    }

    /// Insert statements directly after the last top-level language system,
    /// or at the very start when there is none
    pub fn insert_after_language_systems(&mut self, statements: Vec<Statement>) {
        let at = self
            .statements
            .iter()
            .rposition(|s| matches!(s.kind, StatementKind::LanguageSystem { .. }))
            .map(|i| i + 1)
            .unwrap_or(0);
        self.statements.splice(at..at, statements);
    }

    pub fn push(&mut self, statement: Statement) {
        self.statements.push(statement);
    }

    /// Remove the temporary scaffolding a generator needed
    ///
    /// Injected statements are dropped. Inside synthesized blocks, script
    /// and language statements are dropped too and repeated lookup
    /// references collapse to their first occurrence.
    pub fn without_scaffolding(mut self) -> Self {
        self.statements.retain(|s| s.origin != Origin::Injected);
        for statement in &mut self.statements {
            if statement.origin == Origin::Synthesized {
                strip_scoping(statement);
            }
        }
        self
    }
}

fn strip_scoping(statement: &mut Statement) {
    let StatementKind::Block { body, .. } = &mut statement.kind else {
        return;
    };
    body.retain(|s| {
        s.origin != Origin::Injected
            && !matches!(s.kind, StatementKind::Script(_) | StatementKind::Language(_))
    });

    let mut seen = Vec::new();
    body.retain(|s| match &s.kind {
        StatementKind::LookupReference(name) if seen.contains(name) => false,
        StatementKind::LookupReference(name) => {
            seen.push(name.clone());
            true
        }
        _ => true,
    });

    for child in body.iter_mut() {
        strip_scoping(child);
    }
}

impl fmt::Display for FeatureTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Trailing trivia belongs to the source, so it follows the last
        // parsed statement rather than anything appended after it
        let last_source = self.statements.iter().rposition(|s| s.source.is_some());
        let mut out = String::new();
        if last_source.is_none() {
            out.push_str(&self.trailing);
        }
        for (i, statement) in self.statements.iter().enumerate() {
            statement.write_to(&mut out, 0);
            if Some(i) == last_source {
                out.push_str(&self.trailing);
            }
        }
        f.write_str(&out)
    }
}

#[derive(Clone, Debug, PartialEq)]
enum TokenKind {
    Word(String),
    Punct(char),
    Str,
    /// `include(...)` up to and including the closing parenthesis
    Include,
}

#[derive(Clone, Debug)]
struct Token {
    kind: TokenKind,
    end: usize,
    line: usize,
}

impl Token {
    fn word(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Word(word) => Some(word),
            _ => None,
        }
    }

    fn is_punct(&self, ch: char) -> bool {
        self.kind == TokenKind::Punct(ch)
    }
}

fn is_punct(ch: char) -> bool {
    matches!(
        ch,
        ';' | '{' | '}' | '[' | ']' | '(' | ')' | '<' | '>' | '=' | ',' | '\'' | '"' | '#'
    )
}

fn tokenize(text: &str) -> Result<Vec<Token>, BuildError> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();
    let mut line = 1;

    while let Some((start, ch)) = chars.next() {
        match ch {
            '\n' => line += 1,
            c if c.is_whitespace() => {}
            '#' => {
                while let Some(&(_, c)) = chars.peek() {
                    if c == '\n' {
                        break;
                    }
                    chars.next();
                }
            }
            '"' => {
                let first_line = line;
                let end = loop {
                    match chars.next() {
                        Some((i, '"')) => break i + 1,
                        Some((_, '\n')) => line += 1,
                        Some(_) => {}
                        None => {
                            return Err(BuildError::Parse {
                                line: first_line,
                                message: "unterminated string".to_string(),
                            })
                        }
                    }
                };
                tokens.push(Token {
                    kind: TokenKind::Str,
                    end,
                    line: first_line,
                });
            }
            c if is_punct(c) => tokens.push(Token {
                kind: TokenKind::Punct(c),
                end: start + c.len_utf8(),
                line,
            }),
            _ => {
                let mut end = start + ch.len_utf8();
                while let Some(&(i, c)) = chars.peek() {
                    if c.is_whitespace() || is_punct(c) {
                        break;
                    }
                    end = i + c.len_utf8();
                    chars.next();
                }
                let word = &text[start..end];

                if word == "include" {
                    if let Some(close) = include_end(text, end) {
                        line += text[end..close].matches('\n').count();
                        while chars.peek().is_some_and(|&(i, _)| i < close) {
                            chars.next();
                        }
                        tokens.push(Token {
                            kind: TokenKind::Include,
                            end: close,
                            line,
                        });
                        continue;
                    }
                }

                tokens.push(Token {
                    kind: TokenKind::Word(word.to_string()),
                    end,
                    line,
                });
            }
        }
    }

    Ok(tokens)
}

/// Offset just past the `)` of an include whose keyword ends at `from`
fn include_end(text: &str, from: usize) -> Option<usize> {
    let rest = &text[from..];
    let open = rest.len() - rest.trim_start().len();
    if !rest[open..].starts_with('(') {
        return None;
    }
    rest[open..].find(')').map(|close| from + open + close + 1)
}

struct Parser<'a> {
    text: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    /// Where the next statement's source span begins
    span_start: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn last_line(&self) -> usize {
        self.tokens.last().map(|t| t.line).unwrap_or(1)
    }

    fn error(&self, line: usize, message: impl Into<String>) -> BuildError {
        BuildError::Parse {
            line,
            message: message.into(),
        }
    }

    /// Parse statements until EOF or, inside a block, until its `}`
    fn statements(&mut self, block: Option<(&str, usize)>) -> Result<Vec<Statement>, BuildError> {
        let mut statements = Vec::new();
        loop {
            let next = self.peek().map(|t| (t.is_punct('}'), t.line));
            match (next, block) {
                (None, None) => return Ok(statements),
                (None, Some((label, line))) => {
                    return Err(self.error(line, format!("block '{label}' is never closed")))
                }
                (Some((true, line)), None) => return Err(self.error(line, "unmatched '}'")),
                (Some((true, _)), Some(_)) => return Ok(statements),
                _ => statements.push(self.statement()?),
            }
        }
    }

    fn statement(&mut self) -> Result<Statement, BuildError> {
        let start = self.span_start;
        let kind = self.statement_kind()?;
        let end = self.tokens[self.pos - 1].end;
        self.span_start = end;
        Ok(Statement {
            origin: Origin::Source,
            kind,
            source: Some(self.text[start..end].to_string()),
        })
    }

    fn statement_kind(&mut self) -> Result<StatementKind, BuildError> {
        let Some(first) = self.peek().cloned() else {
            return Err(self.error(self.last_line(), "unexpected end of input"));
        };

        if first.kind == TokenKind::Include {
            self.pos += 1;
            if self.peek().is_some_and(|t| t.is_punct(';')) {
                self.pos += 1;
            }
            return Ok(StatementKind::Other(String::new()));
        }

        let keyword = first.word().unwrap_or_default().to_string();
        let label = self.peek_at(1).and_then(Token::word).map(str::to_string);

        match (keyword.as_str(), label) {
            ("feature" | "lookup" | "table", Some(label)) => {
                let after = self.peek_at(2).cloned();
                let opens = match after.as_ref() {
                    Some(t) if t.is_punct('{') => Some(3),
                    Some(t) if t.word() == Some("useExtension") => self
                        .peek_at(3)
                        .filter(|t| t.is_punct('{'))
                        .map(|_| 4),
                    _ => None,
                };
                if let Some(skip) = opens {
                    self.pos += skip;
                    self.span_start = self.tokens[self.pos - 1].end;
                    let body = self.statements(Some((label.as_str(), first.line)))?;
                    self.close_block(&label, first.line)?;
                    return Ok(StatementKind::Block {
                        keyword,
                        label,
                        body,
                    });
                }
                let words = self.simple_statement()?;
                if keyword == "lookup" && words.len() == 2 {
                    return Ok(StatementKind::LookupReference(label));
                }
                Ok(StatementKind::Other(String::new()))
            }
            _ => {
                let words = self.simple_statement()?;
                let kind = match (keyword.as_str(), words.as_slice()) {
                    ("languagesystem", [_, script, language]) => StatementKind::LanguageSystem {
                        script: script.clone(),
                        language: language.clone(),
                    },
                    ("script", [_, script]) => StatementKind::Script(script.clone()),
                    ("language", [_, language, ..]) => StatementKind::Language(language.clone()),
                    _ => StatementKind::Other(String::new()),
                };
                Ok(kind)
            }
        }
    }

    /// Consume tokens up to a `;` outside braces, returning the words seen
    /// before any punctuation
    fn simple_statement(&mut self) -> Result<Vec<String>, BuildError> {
        let mut depth = 0usize;
        let mut words = Vec::new();
        let mut leading_words = true;
        let start_line = self.peek().map(|t| t.line).unwrap_or(1);

        while let Some(token) = self.peek().cloned() {
            self.pos += 1;
            match &token.kind {
                TokenKind::Punct(';') if depth == 0 => return Ok(words),
                TokenKind::Punct('{') => depth += 1,
                TokenKind::Punct('}') if depth == 0 => {
                    return Err(self.error(token.line, "expected ';' before '}'"))
                }
                TokenKind::Punct('}') => depth -= 1,
                TokenKind::Word(word) if leading_words => words.push(word.clone()),
                _ => leading_words = false,
            }
        }

        Err(self.error(start_line, "expected ';' at end of statement"))
    }

    fn close_block(&mut self, label: &str, line: usize) -> Result<(), BuildError> {
        // The body loop only returns inside a block when it sees '}'
        self.pos += 1;
        let closing = self.peek().cloned();
        match closing.as_ref().and_then(Token::word) {
            Some(name) if name == label => self.pos += 1,
            Some(name) => {
                return Err(self.error(
                    closing.as_ref().map(|t| t.line).unwrap_or(line),
                    format!("block '{label}' closed as '{name}'"),
                ))
            }
            None => return Err(self.error(line, format!("block '{label}' needs a closing label"))),
        }
        match self.peek() {
            Some(token) if token.is_punct(';') => {
                self.pos += 1;
                Ok(())
            }
            _ => Err(self.error(line, format!("expected ';' after closing block '{label}'"))),
        }
    }
}
