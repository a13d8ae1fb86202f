//! SQL text helpers

/// Quote a string as a SQL literal, doubling embedded single quotes.
///
/// Use bind parameters where the server accepts them. This is for the places
/// it does not, such as utility statements.
///
/// ```
/// use pgkeeper_core::quote_literal;
///
/// assert_eq!(quote_literal("it's"), "'it''s'");
/// ```
pub fn quote_literal(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    quoted.push_str(&value.replace('\'', "''"));
    quoted.push('\'');
    quoted
}
