//! SQL identifier validation
//!
//! Table and column names are the only text spliced into SQL. They come from
//! the static registry, and every one of them must pass these checks.

use super::error::QueryError;
use regex::Regex;
use std::sync::OnceLock;

/// SQLite keywords that would change the meaning of a bare identifier
const SQLITE_RESERVED_WORDS: &[&str] = &[
    "ALL", "ALTER", "AND", "AS", "ASC", "BETWEEN", "BY", "CASE", "CHECK", "COLLATE", "COLUMN",
    "CONSTRAINT", "CREATE", "DEFAULT", "DELETE", "DESC", "DISTINCT", "DROP", "ELSE", "END",
    "ESCAPE", "EXCEPT", "EXISTS", "FOREIGN", "FROM", "GROUP", "HAVING", "IN", "INDEX", "INSERT",
    "INTERSECT", "INTO", "IS", "ISNULL", "JOIN", "LIMIT", "NOT", "NOTNULL", "NULL", "OFFSET",
    "ON", "OR", "ORDER", "PRIMARY", "REFERENCES", "SELECT", "SET", "TABLE", "THEN", "TO",
    "UNION", "UNIQUE", "UPDATE", "USING", "VALUES", "WHEN", "WHERE", "WITH",
];

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z_][a-z0-9_]{0,62}$").expect("identifier regex"))
}

/// Lowercase ASCII, digits and underscores, not starting with a digit, not a keyword
pub fn is_valid_identifier(name: &str) -> bool {
    identifier_pattern().is_match(name)
        && !SQLITE_RESERVED_WORDS.contains(&name.to_ascii_uppercase().as_str())
}

pub fn validate_identifier(name: &str) -> Result<(), QueryError> {
    if is_valid_identifier(name) {
        Ok(())
    } else {
        Err(QueryError::InvalidIdentifier(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_identifiers() {
        assert!(is_valid_identifier("drivers"));
        assert!(is_valid_identifier("number_of_wins"));
        assert!(is_valid_identifier("_internal"));
        assert!(is_valid_identifier("fp1_date"));
        // Not SQLite keywords
        assert!(is_valid_identifier("date"));
        assert!(is_valid_identifier("time"));
        assert!(is_valid_identifier("rank"));
    }

    #[test]
    fn test_invalid_identifiers() {
        assert!(!is_valid_identifier("")); // Empty
        assert!(!is_valid_identifier("1st")); // Starts with number
        assert!(!is_valid_identifier("Drivers")); // Uppercase
        assert!(!is_valid_identifier("id; DROP TABLE users")); // SQL injection
        assert!(!is_valid_identifier("drivers.id")); // Qualified
        assert!(!is_valid_identifier("order")); // Keyword
        assert!(!is_valid_identifier("select"));
        assert!(!is_valid_identifier(&"a".repeat(64))); // Too long
    }

    #[test]
    fn test_validate_identifier_error() {
        assert_eq!(
            validate_identifier("x y"),
            Err(QueryError::InvalidIdentifier("x y".to_string()))
        );
    }
}
