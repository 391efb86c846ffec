//! SQL literal and identifier rendering
//!
//! Values are rendered from the target column's semantic type, never from the
//! host locale: decimals always use `.`, dates and times are ISO formatted,
//! booleans become `1`/`0` and binary data becomes an `X'..'` hex literal.

use crate::column::{SqlType, TableRef};
use crate::config::IdentifierQuote;
use crate::error::{Error, Result};
use crate::row::Value;

/// Quote an identifier, doubling embedded quote characters
pub fn quote_identifier(name: &str, quote: IdentifierQuote) -> String {
    let q = quote.char();
    let mut out = String::with_capacity(name.len() + 2);
    out.push(q);
    for c in name.chars() {
        if c == q {
            out.push(q);
        }
        out.push(c);
    }
    out.push(q);
    out
}

/// Quote a table name, qualified by its catalog when known
pub fn quote_table(table: &TableRef, quote: IdentifierQuote) -> String {
    match &table.catalog {
        Some(catalog) => format!(
            "{}.{}",
            quote_identifier(catalog, quote),
            quote_identifier(&table.name, quote)
        ),
        None => quote_identifier(&table.name, quote),
    }
}

/// Quote and escape a string literal
pub fn quote_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '\0' => out.push_str("\\0"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\x1a' => out.push_str("\\Z"),
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Hex literal for binary data
pub fn hex_literal(bytes: &[u8]) -> String {
    format!("X'{}'", hex::encode_upper(bytes))
}

/// Canonical numeric text, accepting `,` as a decimal separator
///
/// Returns None when the text is not a number.
pub fn normalize_number(text: &str) -> Option<String> {
    let trimmed = text.trim();
    let normalized = if !trimmed.contains('.') && trimmed.matches(',').count() == 1 {
        trimmed.replace(',', ".")
    } else {
        trimmed.to_string()
    };

    let body = normalized
        .strip_prefix(['-', '+'])
        .unwrap_or(&normalized);
    let (mantissa, exponent) = match body.find(['e', 'E']) {
        Some(pos) => (&body[..pos], Some(&body[pos + 1..])),
        None => (body, None),
    };

    let mut digits = 0;
    let mut dots = 0;
    for c in mantissa.chars() {
        match c {
            '0'..='9' => digits += 1,
            '.' => dots += 1,
            _ => return None,
        }
    }
    if digits == 0 || dots > 1 {
        return None;
    }
    if let Some(exp) = exponent {
        let exp = exp.strip_prefix(['-', '+']).unwrap_or(exp);
        if exp.is_empty() || !exp.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
    }
    Some(normalized)
}

fn numeric_text(text: &str, sql_type: SqlType) -> Result<String> {
    normalize_number(text).ok_or_else(|| {
        Error::DataConversion(format!("'{}' is not a valid {:?} value", text, sql_type))
    })
}

fn float_text(f: f64) -> Result<String> {
    if !f.is_finite() {
        return Err(Error::DataConversion(format!(
            "{} cannot be written as a SQL number",
            f
        )));
    }
    Ok(format!("{}", f))
}

/// Render a value as a literal for a column of the given type
pub fn render(value: &Value, sql_type: SqlType) -> Result<String> {
    let numeric = sql_type.is_numeric();
    let rendered = match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(i) if numeric => i.to_string(),
        Value::Integer(i) => quote_string(&i.to_string()),
        Value::Float(f) if numeric => float_text(*f)?,
        Value::Float(f) => quote_string(&float_text(*f)?),
        Value::Decimal(d) if numeric => numeric_text(d, sql_type)?,
        Value::Decimal(d) => quote_string(&numeric_text(d, sql_type)?),
        Value::Boolean(b) if numeric => u8::from(*b).to_string(),
        Value::Boolean(b) => quote_string(if *b { "1" } else { "0" }),
        Value::String(s) if numeric => numeric_text(s, sql_type)?,
        Value::String(s) if sql_type.is_binary() => hex_literal(s.as_bytes()),
        Value::String(s) => quote_string(s),
        Value::Bytes(b) => hex_literal(b),
        Value::Date(d) => quote_string(&d.format("%Y-%m-%d").to_string()),
        Value::Time(t) => quote_string(&t.format("%H:%M:%S%.f").to_string()),
        Value::Timestamp(ts) => quote_string(&ts.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
        Value::Json(json) => quote_string(&json.to_string()),
    };
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("name", IdentifierQuote::Backtick), "`name`");
        assert_eq!(quote_identifier("we`ird", IdentifierQuote::Backtick), "`we``ird`");
        assert_eq!(quote_identifier("a\"b", IdentifierQuote::DoubleQuote), "\"a\"\"b\"");
    }

    #[test]
    fn test_quote_table() {
        assert_eq!(
            quote_table(&TableRef::qualified("shop", "items"), IdentifierQuote::Backtick),
            "`shop`.`items`"
        );
        assert_eq!(quote_table(&TableRef::new("items"), IdentifierQuote::DoubleQuote), "\"items\"");
    }

    #[test]
    fn test_string_escaping() {
        assert_eq!(quote_string("plain"), "'plain'");
        assert_eq!(quote_string("O'Brien"), "'O\\'Brien'");
        assert_eq!(quote_string("back\\slash"), "'back\\\\slash'");
        assert_eq!(quote_string("a\nb\rc"), "'a\\nb\\rc'");
        assert_eq!(quote_string("nul\0z\x1a"), "'nul\\0z\\Z'");
    }

    #[test]
    fn test_numbers() {
        assert_eq!(render(&Value::Integer(-5), SqlType::Integer).unwrap(), "-5");
        assert_eq!(render(&Value::Float(2.5), SqlType::Double).unwrap(), "2.5");
        assert_eq!(render(&Value::Float(0.0000001), SqlType::Double).unwrap(), "0.0000001");
        assert_eq!(render(&Value::from("12,75"), SqlType::Decimal).unwrap(), "12.75");
        assert_eq!(render(&Value::Decimal("3.10".into()), SqlType::Decimal).unwrap(), "3.10");
        assert_eq!(render(&Value::Integer(7), SqlType::Varchar).unwrap(), "'7'");
        assert!(render(&Value::Float(f64::NAN), SqlType::Double).is_err());
        assert!(render(&Value::from("12abc"), SqlType::Integer).is_err());
    }

    #[test]
    fn test_normalize_number() {
        assert_eq!(normalize_number(" 42 ").as_deref(), Some("42"));
        assert_eq!(normalize_number("-1.5e10").as_deref(), Some("-1.5e10"));
        assert_eq!(normalize_number("1,5").as_deref(), Some("1.5"));
        assert_eq!(normalize_number("1,000,000"), None);
        assert_eq!(normalize_number("1.2.3"), None);
        assert_eq!(normalize_number("e5"), None);
        assert_eq!(normalize_number("1e"), None);
        assert_eq!(normalize_number(""), None);
    }

    #[test]
    fn test_other_types() {
        assert_eq!(render(&Value::Null, SqlType::Varchar).unwrap(), "NULL");
        assert_eq!(render(&Value::Boolean(true), SqlType::Bit).unwrap(), "1");
        assert_eq!(render(&Value::Boolean(false), SqlType::TinyInt).unwrap(), "0");
        assert_eq!(render(&Value::Bytes(vec![0xde, 0xad]), SqlType::Varbinary).unwrap(), "X'DEAD'");
        assert_eq!(render(&Value::from("AB"), SqlType::Binary).unwrap(), "X'4142'");

        let date = NaiveDate::from_ymd_opt(2023, 1, 9).unwrap();
        assert_eq!(render(&Value::Date(date), SqlType::Date).unwrap(), "'2023-01-09'");
        let ts = date.and_hms_micro_opt(8, 30, 0, 250_000).unwrap();
        assert_eq!(
            render(&Value::Timestamp(ts), SqlType::Timestamp).unwrap(),
            "'2023-01-09 08:30:00.250'"
        );
        let ts = date.and_hms_opt(8, 30, 0).unwrap();
        assert_eq!(
            render(&Value::Timestamp(ts), SqlType::Timestamp).unwrap(),
            "'2023-01-09 08:30:00'"
        );

        let json = serde_json::json!({"k": "it's"});
        assert_eq!(
            render(&Value::Json(json), SqlType::Json).unwrap(),
            "'{\\\"k\\\":\\\"it\\'s\\\"}'"
        );
    }
}
