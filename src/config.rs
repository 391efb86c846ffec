//! Connection and statement configuration
//!
//! [`Config`] holds the connection-level settings that shape synthesized SQL
//! and the cursor types a statement may use. It can be built with the builder
//! methods or parsed from a `KEY=value;` option string:
//!
//! - `IDENTIFIER_QUOTE=backtick|double`
//! - `BIND_MODE=inline|parameters`
//! - `DYNAMIC_CURSOR=0|1`
//! - `FORWARD_CURSOR=0|1`
//! - `ROW_ARRAY_SIZE=<n>`
//!
//! [`StatementOptions`] holds the per-statement settings.

use std::fmt;
use std::str::FromStr;

use crate::constants::{Concurrency, CursorType};
use crate::error::{Error, Result};

/// Default number of rows in a rowset
pub const DEFAULT_ROW_ARRAY_SIZE: usize = 1;

/// Quote character used around identifiers in synthesized SQL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdentifierQuote {
    /// `` `name` ``
    #[default]
    Backtick,
    /// `"name"` (ANSI_QUOTES servers)
    DoubleQuote,
}

impl IdentifierQuote {
    /// The quote character
    pub fn char(self) -> char {
        match self {
            IdentifierQuote::Backtick => '`',
            IdentifierQuote::DoubleQuote => '"',
        }
    }
}

/// How values reach the server in synthesized statements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BindMode {
    /// Values rendered as escaped SQL literals
    #[default]
    Inline,
    /// `?` placeholders with an ordered parameter list
    Parameters,
}

/// Connection-level configuration
///
/// # Examples
///
/// ```rust
/// use rowset_cursor::{BindMode, Config, IdentifierQuote};
///
/// let config = Config::new()
///     .identifier_quote(IdentifierQuote::DoubleQuote)
///     .bind_mode(BindMode::Parameters)
///     .with_dynamic_cursor();
/// assert!(config.dynamic_cursor);
///
/// let parsed: Config = "BIND_MODE=parameters;ROW_ARRAY_SIZE=10".parse().unwrap();
/// assert_eq!(parsed.default_row_array_size, 10);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Identifier quoting in synthesized SQL
    pub identifier_quote: IdentifierQuote,
    /// Inline literals or `?` placeholders
    pub bind_mode: BindMode,
    /// Allow dynamic cursors (otherwise downgraded to static)
    pub dynamic_cursor: bool,
    /// Force every cursor to forward-only
    pub forward_only: bool,
    /// Row-array size given to new statements
    pub default_row_array_size: usize,
}

impl Config {
    /// Create a configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set identifier quoting
    pub fn identifier_quote(mut self, quote: IdentifierQuote) -> Self {
        self.identifier_quote = quote;
        self
    }

    /// Set bind mode
    pub fn bind_mode(mut self, mode: BindMode) -> Self {
        self.bind_mode = mode;
        self
    }

    /// Allow dynamic cursors
    pub fn with_dynamic_cursor(mut self) -> Self {
        self.dynamic_cursor = true;
        self
    }

    /// Force forward-only cursors
    pub fn with_forward_only(mut self) -> Self {
        self.forward_only = true;
        self
    }

    /// Set the default row-array size (values below 1 become 1)
    pub fn row_array_size(mut self, size: usize) -> Self {
        self.default_row_array_size = size.max(1);
        self
    }

    /// Cursor type actually used for a requested one
    ///
    /// The second element is true when the request was downgraded.
    pub fn effective_cursor_type(&self, requested: CursorType) -> (CursorType, bool) {
        let effective = if self.forward_only {
            CursorType::ForwardOnly
        } else {
            match requested {
                CursorType::ForwardOnly | CursorType::Static => requested,
                CursorType::Dynamic if self.dynamic_cursor => CursorType::Dynamic,
                CursorType::Dynamic | CursorType::KeysetDriven => CursorType::Static,
            }
        };
        (effective, effective != requested)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            identifier_quote: IdentifierQuote::Backtick,
            bind_mode: BindMode::Inline,
            dynamic_cursor: false,
            forward_only: false,
            default_row_array_size: DEFAULT_ROW_ARRAY_SIZE,
        }
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim() {
        "1" => Ok(true),
        "0" => Ok(false),
        v if v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes") => Ok(true),
        v if v.eq_ignore_ascii_case("false") || v.eq_ignore_ascii_case("no") => Ok(false),
        other => Err(Error::InvalidAttribute(format!(
            "{} expects 0 or 1, got '{}'",
            key, other
        ))),
    }
}

/// Parse a `KEY=value;KEY=value` option string
///
/// Keys are case-insensitive; unknown keys are ignored.
impl FromStr for Config {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut config = Config::default();

        for part in s.split(';') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }

            let (key, value) = part.split_once('=').ok_or_else(|| {
                Error::InvalidAttribute(format!("option '{}' has no value", part))
            })?;
            let key = key.trim().to_ascii_uppercase();
            let value = value.trim();

            match key.as_str() {
                "IDENTIFIER_QUOTE" => {
                    config.identifier_quote = match value.to_ascii_lowercase().as_str() {
                        "backtick" | "`" => IdentifierQuote::Backtick,
                        "double" | "\"" | "ansi" => IdentifierQuote::DoubleQuote,
                        other => {
                            return Err(Error::InvalidAttribute(format!(
                                "unknown identifier quote '{}'",
                                other
                            )))
                        }
                    }
                }
                "BIND_MODE" => {
                    config.bind_mode = match value.to_ascii_lowercase().as_str() {
                        "inline" => BindMode::Inline,
                        "parameters" | "params" => BindMode::Parameters,
                        other => {
                            return Err(Error::InvalidAttribute(format!(
                                "unknown bind mode '{}'",
                                other
                            )))
                        }
                    }
                }
                "DYNAMIC_CURSOR" => config.dynamic_cursor = parse_flag(&key, value)?,
                "FORWARD_CURSOR" => config.forward_only = parse_flag(&key, value)?,
                "ROW_ARRAY_SIZE" => {
                    let size: usize = value.parse().map_err(|_| {
                        Error::InvalidAttribute(format!("invalid row array size '{}'", value))
                    })?;
                    config = config.row_array_size(size);
                }
                _ => {
                    tracing::debug!(option = %key, "ignoring unknown connection option");
                }
            }
        }

        Ok(config)
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let quote = match self.identifier_quote {
            IdentifierQuote::Backtick => "backtick",
            IdentifierQuote::DoubleQuote => "double",
        };
        let mode = match self.bind_mode {
            BindMode::Inline => "inline",
            BindMode::Parameters => "parameters",
        };
        write!(
            f,
            "IDENTIFIER_QUOTE={};BIND_MODE={};DYNAMIC_CURSOR={};FORWARD_CURSOR={};ROW_ARRAY_SIZE={}",
            quote,
            mode,
            u8::from(self.dynamic_cursor),
            u8::from(self.forward_only),
            self.default_row_array_size
        )
    }
}

/// Statement-level options
///
/// # Example
///
/// ```rust
/// use rowset_cursor::{Concurrency, CursorType, StatementOptions};
///
/// let opts = StatementOptions::new()
///     .cursor_type(CursorType::Static)
///     .concurrency(Concurrency::Values)
///     .row_array_size(5)
///     .with_bookmarks();
/// assert_eq!(opts.row_array_size, 5);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementOptions {
    /// Requested cursor type
    pub cursor_type: CursorType,
    /// Concurrency mode for positioned writes
    pub concurrency: Concurrency,
    /// Rows per rowset (at least 1)
    pub row_array_size: usize,
    /// Mint bookmarks for fetched rows
    pub use_bookmarks: bool,
    /// Return column data on fetch
    pub retrieve_data: bool,
    /// Maximum rows pulled from a result (None = unlimited)
    pub max_rows: Option<usize>,
}

impl StatementOptions {
    /// Create default statement options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cursor type
    pub fn cursor_type(mut self, cursor_type: CursorType) -> Self {
        self.cursor_type = cursor_type;
        self
    }

    /// Set the concurrency mode
    pub fn concurrency(mut self, concurrency: Concurrency) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set the row-array size
    pub fn row_array_size(mut self, size: usize) -> Self {
        self.row_array_size = size;
        self
    }

    /// Enable bookmarks
    pub fn with_bookmarks(mut self) -> Self {
        self.use_bookmarks = true;
        self
    }

    /// Position without returning column data
    pub fn without_data(mut self) -> Self {
        self.retrieve_data = false;
        self
    }

    /// Cap the number of rows read from a result
    pub fn max_rows(mut self, max: usize) -> Self {
        self.max_rows = if max == 0 { None } else { Some(max) };
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.row_array_size == 0 {
            return Err(Error::InvalidAttribute(
                "row array size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for StatementOptions {
    fn default() -> Self {
        Self {
            cursor_type: CursorType::ForwardOnly,
            concurrency: Concurrency::Values,
            row_array_size: DEFAULT_ROW_ARRAY_SIZE,
            use_bookmarks: false,
            retrieve_data: true,
            max_rows: None,
        }
    }
}
