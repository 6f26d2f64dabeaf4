//! Row mapping helpers shared by the `SQLite` repositories.

use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};
use catalog_core::{Property, RepositoryError};

/// Format a timestamp for storage.
pub fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored timestamp; unreadable values fall back to "now".
pub fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Serialize a property list into its JSON column.
pub fn properties_to_json(properties: &[Property]) -> Result<String, RepositoryError> {
    serde_json::to_string(properties).map_err(|e| RepositoryError::Serialization(e.to_string()))
}

/// Deserialize a property list from its JSON column.
pub fn properties_from_json(json: &str) -> Result<Vec<Property>, RepositoryError> {
    serde_json::from_str(json).map_err(|e| RepositoryError::Serialization(e.to_string()))
}

/// Encode a keyset cursor (the last returned row id).
pub fn encode_cursor(last_id: i64) -> String {
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(last_id.to_string())
}

/// Decode a cursor produced by [`encode_cursor`].
pub fn decode_cursor(token: &str) -> Result<i64, RepositoryError> {
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(token)
        .map_err(|e| RepositoryError::Invalid(format!("Malformed page token: {e}")))?;

    String::from_utf8(bytes)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| RepositoryError::Invalid("Malformed page token".to_string()))
}

/// Resolve paging options into `(after_id, limit)` for a keyset query.
///
/// `limit` is one more than the page size so the caller can tell whether a
/// next page exists; `-1` means unlimited in `SQLite`.
pub fn page_bounds(
    page_size: Option<u32>,
    page_token: Option<&str>,
) -> Result<(i64, i64), RepositoryError> {
    let after_id = page_token.map(decode_cursor).transpose()?.unwrap_or(0);
    let limit = page_size.map_or(-1, |size| i64::from(size.max(1)) + 1);
    Ok((after_id, limit))
}

/// Trim an over-fetched result to the page size and compute the next token.
pub fn finish_page<T>(
    mut items: Vec<T>,
    page_size: Option<u32>,
    id_of: impl Fn(&T) -> Option<i64>,
) -> (Vec<T>, Option<String>) {
    let Some(size) = page_size.map(|s| s.max(1) as usize) else {
        return (items, None);
    };
    if items.len() <= size {
        return (items, None);
    }
    items.truncate(size);
    let next = items.last().and_then(&id_of).map(encode_cursor);
    (items, next)
}

/// Whether a `SQLx` error is a unique-constraint violation.
pub fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

/// Map `SQLx` errors to `RepositoryError`.
pub fn map_sqlx_error(e: sqlx::Error) -> RepositoryError {
    if let Some(db) = e.as_database_error() {
        if db.is_unique_violation() || db.is_foreign_key_violation() {
            return RepositoryError::Constraint(db.message().to_string());
        }
    }
    RepositoryError::Storage(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_round_trip() {
        let token = encode_cursor(42);
        assert_eq!(decode_cursor(&token).unwrap(), 42);
        assert!(matches!(
            decode_cursor("not base64!"),
            Err(RepositoryError::Invalid(_))
        ));
    }

    #[test]
    fn test_finish_page() {
        let (items, next) = finish_page(vec![1_i64, 2, 3], Some(2), |i| Some(*i));
        assert_eq!(items, vec![1, 2]);
        assert_eq!(next.as_deref().map(decode_cursor).unwrap().unwrap(), 2);

        let (items, next) = finish_page(vec![1_i64, 2], Some(2), |i| Some(*i));
        assert_eq!(items.len(), 2);
        assert!(next.is_none());
    }

    #[test]
    fn test_datetime_round_trip() {
        let now = Utc::now();
        let parsed = parse_datetime(&format_datetime(now));
        assert_eq!(parsed.timestamp_millis(), now.timestamp_millis());
    }
}
