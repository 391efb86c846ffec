//! Lexical scan of statement text
//!
//! Just enough of a scanner to classify a statement, count `?` placeholders
//! and find a trailing `WHERE CURRENT OF <cursor>` clause. String literals,
//! quoted identifiers and comments are skipped, so a placeholder or keyword
//! inside them is never seen.

/// Statement kind determined from the first keyword
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatementKind {
    /// Unknown or empty statement
    #[default]
    Unknown,
    /// Produces a result set: SELECT, WITH, SHOW, ...
    Query,
    /// INSERT, UPDATE, DELETE, REPLACE
    Dml,
    /// CREATE, ALTER, DROP, ...
    Ddl,
    /// CALL
    Procedure,
}

/// A trailing `WHERE CURRENT OF <cursor>` clause
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionedClause {
    /// Cursor name as written (quotes removed)
    pub cursor_name: String,
    /// Byte offset of the `WHERE` keyword
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Token {
    text: String,
    start: usize,
    quoted: bool,
}

impl Token {
    fn is_keyword(&self, keyword: &str) -> bool {
        !self.quoted && self.text.eq_ignore_ascii_case(keyword)
    }

    fn is_word(&self) -> bool {
        self.quoted
            || self
                .text
                .chars()
                .next()
                .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '$')
    }
}

/// Scanned statement text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlText {
    sql: String,
    kind: StatementKind,
    placeholders: usize,
    positioned: Option<PositionedClause>,
}

impl SqlText {
    /// Scan a statement
    pub fn parse(sql: impl Into<String>) -> Self {
        let sql = sql.into();
        let (tokens, placeholders) = scan(&sql);

        let kind = tokens
            .iter()
            .find(|t| t.is_word())
            .map_or(StatementKind::Unknown, |t| classify(&t.text));

        let positioned = if kind == StatementKind::Dml {
            positioned_clause(&tokens)
        } else {
            None
        };

        Self {
            sql,
            kind,
            placeholders,
            positioned,
        }
    }

    /// Original text
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Statement kind
    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    /// Check if this statement produces a result set
    pub fn is_query(&self) -> bool {
        self.kind == StatementKind::Query
    }

    /// Check if this is a DML statement
    pub fn is_dml(&self) -> bool {
        self.kind == StatementKind::Dml
    }

    /// Number of `?` placeholders
    pub fn placeholders(&self) -> usize {
        self.placeholders
    }

    /// Trailing `WHERE CURRENT OF` clause, if any
    pub fn positioned(&self) -> Option<&PositionedClause> {
        self.positioned.as_ref()
    }

    /// Replace the `WHERE CURRENT OF` clause with a `WHERE <predicate>`
    pub fn rewrite_positioned(&self, predicate: &str) -> Option<String> {
        let clause = self.positioned.as_ref()?;
        let head = self.sql[..clause.offset].trim_end();
        Some(format!("{} WHERE {}", head, predicate))
    }
}

fn classify(first_word: &str) -> StatementKind {
    match first_word.to_ascii_uppercase().as_str() {
        "SELECT" | "WITH" | "SHOW" | "DESCRIBE" | "DESC" | "EXPLAIN" => StatementKind::Query,
        "INSERT" | "UPDATE" | "DELETE" | "REPLACE" => StatementKind::Dml,
        "CREATE" | "ALTER" | "DROP" | "TRUNCATE" | "RENAME" | "GRANT" | "REVOKE" => {
            StatementKind::Ddl
        }
        "CALL" => StatementKind::Procedure,
        _ => StatementKind::Unknown,
    }
}

fn positioned_clause(tokens: &[Token]) -> Option<PositionedClause> {
    let mut end = tokens.len();
    while end > 0 && !tokens[end - 1].quoted && tokens[end - 1].text == ";" {
        end -= 1;
    }
    if end < 4 {
        return None;
    }
    let tail = &tokens[end - 4..end];
    if tail[0].is_keyword("WHERE")
        && tail[1].is_keyword("CURRENT")
        && tail[2].is_keyword("OF")
        && tail[3].is_word()
    {
        Some(PositionedClause {
            cursor_name: tail[3].text.clone(),
            offset: tail[0].start,
        })
    } else {
        None
    }
}

/// Split into word and punctuation tokens, counting placeholders
fn scan(sql: &str) -> (Vec<Token>, usize) {
    let chars: Vec<(usize, char)> = sql.char_indices().collect();
    let len = chars.len();
    let mut tokens = Vec::new();
    let mut placeholders = 0;
    let mut i = 0;

    while i < len {
        let (start, ch) = chars[i];

        // String literals; backslash escapes the next character
        if ch == '\'' || ch == '"' {
            i += 1;
            while i < len && chars[i].1 != ch {
                if chars[i].1 == '\\' {
                    i += 1;
                }
                i += 1;
            }
            i += 1;
            continue;
        }

        // Quoted identifiers
        if ch == '`' {
            i += 1;
            let mut text = String::new();
            while i < len {
                if chars[i].1 == '`' {
                    if i + 1 < len && chars[i + 1].1 == '`' {
                        text.push('`');
                        i += 2;
                        continue;
                    }
                    break;
                }
                text.push(chars[i].1);
                i += 1;
            }
            i += 1;
            tokens.push(Token {
                text,
                start,
                quoted: true,
            });
            continue;
        }

        // Line comments
        if ch == '#' || (ch == '-' && i + 1 < len && chars[i + 1].1 == '-') {
            while i < len && chars[i].1 != '\n' {
                i += 1;
            }
            continue;
        }

        // Block comments
        if ch == '/' && i + 1 < len && chars[i + 1].1 == '*' {
            i += 2;
            while i < len && !(chars[i].1 == '*' && i + 1 < len && chars[i + 1].1 == '/') {
                i += 1;
            }
            i += 2;
            continue;
        }

        if ch.is_whitespace() {
            i += 1;
            continue;
        }

        if ch.is_alphanumeric() || ch == '_' || ch == '$' {
            let mut text = String::new();
            while i < len {
                let c = chars[i].1;
                if c.is_alphanumeric() || c == '_' || c == '$' {
                    text.push(c);
                    i += 1;
                } else {
                    break;
                }
            }
            tokens.push(Token {
                text,
                start,
                quoted: false,
            });
            continue;
        }

        if ch == '?' {
            placeholders += 1;
        }
        tokens.push(Token {
            text: ch.to_string(),
            start,
            quoted: false,
        });
        i += 1;
    }

    (tokens, placeholders)
}
