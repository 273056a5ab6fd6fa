//! Migration content parser.
//!
//! Splits SQL text into statements and groups them by transaction setting.
//! Splitting respects quoted strings, comments and PostgreSQL dollar-quoted
//! bodies, so function definitions containing `;` stay intact.
//!
//! Directives are line comments starting with `-- +migrate`:
//!
//! ```sql
//! CREATE TABLE users (id BIGINT PRIMARY KEY);
//!
//! -- +migrate NoTransaction
//! CREATE INDEX CONCURRENTLY users_id_idx ON users (id);
//!
//! -- +migrate Transaction
//! -- +migrate StatementBegin
//! CREATE FUNCTION touch() RETURNS trigger AS 'BEGIN RETURN NEW; END;' LANGUAGE plpgsql;
//! -- +migrate StatementEnd
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Result, WaypointError};
use crate::migration::{ChangeSet, StatementGroup};

const DIRECTIVE_PREFIX: &str = "+migrate";

/// Parser settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParserOptions {
    /// Transaction setting for statements that precede any directive.
    #[serde(default = "default_transaction")]
    pub default_transaction: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            default_transaction: default_transaction(),
        }
    }
}

fn default_transaction() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Directive {
    Transaction,
    NoTransaction,
    StatementBegin,
    StatementEnd,
}

/// Parse migration content into a change-set.
pub fn parse(content: &str, options: &ParserOptions) -> Result<ChangeSet> {
    let mut groups = Vec::new();
    let mut current = StatementGroup::new(Vec::new(), options.default_transaction);
    let mut splitter = Splitter::default();
    // Line number and text of an open StatementBegin block.
    let mut block: Option<(usize, String)> = None;

    for (index, line) in content.lines().enumerate() {
        let line_no = index + 1;

        if splitter.is_clean() {
            if let Some(directive) = parse_directive(line, line_no)? {
                if splitter.has_code {
                    return Err(WaypointError::Parse(format!(
                        "line {}: directive inside an unterminated statement",
                        line_no
                    )));
                }
                match directive {
                    Directive::StatementBegin => {
                        if let Some((start, _)) = &block {
                            return Err(WaypointError::Parse(format!(
                                "line {}: StatementBegin inside block opened on line {}",
                                line_no, start
                            )));
                        }
                        current.statements.extend(splitter.finish());
                        block = Some((line_no, String::new()));
                    }
                    Directive::StatementEnd => {
                        let (_, text) = block.take().ok_or_else(|| {
                            WaypointError::Parse(format!(
                                "line {}: StatementEnd without StatementBegin",
                                line_no
                            ))
                        })?;
                        let text = text.trim();
                        if !text.is_empty() {
                            current.statements.push(text.to_string());
                        }
                    }
                    Directive::Transaction | Directive::NoTransaction => {
                        if let Some((start, _)) = &block {
                            return Err(WaypointError::Parse(format!(
                                "line {}: transaction directive inside block opened on line {}",
                                line_no, start
                            )));
                        }
                        current.statements.extend(splitter.finish());
                        let use_transaction = directive == Directive::Transaction;
                        let finished = std::mem::replace(
                            &mut current,
                            StatementGroup::new(Vec::new(), use_transaction),
                        );
                        groups.push(finished);
                    }
                }
                continue;
            }
        }

        if let Some((_, text)) = block.as_mut() {
            text.push_str(line);
            text.push('\n');
            continue;
        }

        current.statements.extend(splitter.feed_line(line));
    }

    if let Some((start, _)) = block {
        return Err(WaypointError::Parse(format!(
            "StatementBegin on line {} is never closed",
            start
        )));
    }

    current.statements.extend(splitter.finish());
    groups.push(current);

    Ok(ChangeSet::from_groups(groups))
}

/// Split SQL into individual statements using default rules.
pub fn split_statements(sql: &str) -> Vec<String> {
    let mut splitter = Splitter::default();
    let mut statements = Vec::new();
    for line in sql.lines() {
        statements.extend(splitter.feed_line(line));
    }
    statements.extend(splitter.finish());
    statements
}

fn parse_directive(line: &str, line_no: usize) -> Result<Option<Directive>> {
    let Some(comment) = line.trim_start().strip_prefix("--") else {
        return Ok(None);
    };
    let Some(rest) = comment.trim_start().strip_prefix(DIRECTIVE_PREFIX) else {
        return Ok(None);
    };
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return Ok(None);
    }

    let word = rest.split_whitespace().next().unwrap_or("");
    let directive = match word.to_ascii_lowercase().as_str() {
        "transaction" => Directive::Transaction,
        "notransaction" => Directive::NoTransaction,
        "statementbegin" => Directive::StatementBegin,
        "statementend" => Directive::StatementEnd,
        _ => {
            return Err(WaypointError::Parse(format!(
                "line {}: unknown directive '{} {}'",
                line_no, DIRECTIVE_PREFIX, word
            )))
        }
    };

    Ok(Some(directive))
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
enum State {
    #[default]
    Normal,
    SingleQuote,
    DoubleQuote,
    LineComment,
    BlockComment,
    Dollar(String),
}

/// Incremental statement splitter; state carries across lines.
#[derive(Debug, Default)]
struct Splitter {
    state: State,
    current: String,
    has_code: bool,
}

impl Splitter {
    fn is_clean(&self) -> bool {
        self.state == State::Normal
    }

    fn feed_line(&mut self, line: &str) -> Vec<String> {
        let chars: Vec<char> = line.chars().chain(std::iter::once('\n')).collect();
        let mut statements = Vec::new();
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            let next = chars.get(i + 1).copied();

            match &self.state {
                State::Normal => match c {
                    ';' => {
                        if let Some(stmt) = self.take() {
                            statements.push(stmt);
                        }
                    }
                    '\'' => {
                        self.push_code(c);
                        self.state = State::SingleQuote;
                    }
                    '"' => {
                        self.push_code(c);
                        self.state = State::DoubleQuote;
                    }
                    '-' if next == Some('-') => {
                        self.current.push_str("--");
                        self.state = State::LineComment;
                        i += 1;
                    }
                    '/' if next == Some('*') => {
                        self.current.push_str("/*");
                        self.state = State::BlockComment;
                        i += 1;
                    }
                    '$' => match dollar_tag(&chars[i..]) {
                        Some(tag) => {
                            i += tag.chars().count() - 1;
                            self.current.push_str(&tag);
                            self.has_code = true;
                            self.state = State::Dollar(tag);
                        }
                        None => self.push_code(c),
                    },
                    _ => {
                        self.current.push(c);
                        if !c.is_whitespace() {
                            self.has_code = true;
                        }
                    }
                },
                State::SingleQuote => {
                    self.current.push(c);
                    if c == '\'' {
                        if next == Some('\'') {
                            self.current.push('\'');
                            i += 1;
                        } else {
                            self.state = State::Normal;
                        }
                    }
                }
                State::DoubleQuote => {
                    self.current.push(c);
                    if c == '"' {
                        self.state = State::Normal;
                    }
                }
                State::LineComment => {
                    self.current.push(c);
                    if c == '\n' {
                        self.state = State::Normal;
                    }
                }
                State::BlockComment => {
                    self.current.push(c);
                    if c == '*' && next == Some('/') {
                        self.current.push('/');
                        self.state = State::Normal;
                        i += 1;
                    }
                }
                State::Dollar(tag) => {
                    if c == '$' && starts_with(&chars[i..], tag) {
                        let len = tag.chars().count();
                        self.current.push_str(tag);
                        self.state = State::Normal;
                        i += len - 1;
                    } else {
                        self.current.push(c);
                    }
                }
            }

            i += 1;
        }

        statements
    }

    /// Flush whatever is pending, even without a trailing `;`.
    fn finish(&mut self) -> Option<String> {
        self.state = State::Normal;
        self.take()
    }

    fn push_code(&mut self, c: char) {
        self.current.push(c);
        self.has_code = true;
    }

    fn take(&mut self) -> Option<String> {
        let text = std::mem::take(&mut self.current);
        let has_code = std::mem::replace(&mut self.has_code, false);
        let stmt = text.trim();
        (has_code && !stmt.is_empty()).then(|| stmt.to_string())
    }
}

/// Match a `$$` or `$tag$` delimiter at the start of `chars`.
fn dollar_tag(chars: &[char]) -> Option<String> {
    let mut tag = String::from("$");
    for (pos, &c) in chars.iter().enumerate().skip(1) {
        if c == '$' {
            tag.push('$');
            return Some(tag);
        }
        let valid = if pos == 1 {
            c.is_alphabetic() || c == '_'
        } else {
            c.is_alphanumeric() || c == '_'
        };
        if !valid {
            return None;
        }
        tag.push(c);
    }
    None
}

fn starts_with(chars: &[char], tag: &str) -> bool {
    let mut it = chars.iter();
    tag.chars().all(|t| it.next() == Some(&t))
}
