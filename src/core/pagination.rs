// Pagination Codec - opaque keyset cursors over (id, created_at)
//
// A cursor is URL-safe base64 of "<id>,<RFC 3339 timestamp>". Pages are walked
// backwards in time: the next page holds the rows strictly before the cursor.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite};

use crate::error::{AppError, AppResult};

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MIN_PAGE_SIZE: u32 = 1;
pub const MAX_PAGE_SIZE: u32 = 99;

/// Position of the last row of a page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub id: i64,
    pub created_at: DateTime<Utc>,
}

impl Cursor {
    pub fn new(id: i64, created_at: DateTime<Utc>) -> Self {
        Self { id, created_at }
    }

    pub fn encode(&self) -> String {
        let raw = format!(
            "{},{}",
            self.id,
            self.created_at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
        );
        URL_SAFE_NO_PAD.encode(raw)
    }

    pub fn decode(s: &str) -> AppResult<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(s.trim())
            .map_err(|_| AppError::invalid_cursor())?;
        let raw = String::from_utf8(bytes).map_err(|_| AppError::invalid_cursor())?;

        let (id, created_at) = raw.split_once(',').ok_or_else(AppError::invalid_cursor)?;
        let id = id
            .parse::<i64>()
            .ok()
            .filter(|id| *id > 0)
            .ok_or_else(AppError::invalid_cursor)?;
        let created_at = DateTime::parse_from_rfc3339(created_at)
            .map_err(|_| AppError::invalid_cursor())?
            .with_timezone(&Utc);

        Ok(Self { id, created_at })
    }

    /// Appends the "strictly before this cursor" keyset predicate.
    ///
    /// `created_at` alone is not unique, so rows sharing the cursor's
    /// timestamp are split by id.
    pub fn push_before(
        &self,
        qb: &mut QueryBuilder<'_, Sqlite>,
        created_at_column: &'static str,
        id_column: &'static str,
    ) {
        let millis = self.created_at.timestamp_millis();
        qb.push(" AND ")
            .push(created_at_column)
            .push(" <= ")
            .push_bind(millis)
            .push(" AND (")
            .push(id_column)
            .push(" < ")
            .push_bind(self.id)
            .push(" OR ")
            .push(created_at_column)
            .push(" < ")
            .push_bind(millis)
            .push(")");
    }
}

/// Decodes an optional cursor argument
pub fn decode_cursor(before: Option<&str>) -> AppResult<Option<Cursor>> {
    before.map(Cursor::decode).transpose()
}

/// 0 means "use the default"; anything else is clamped into bounds
pub fn normalize_page_size(requested: u32) -> u32 {
    if requested == 0 {
        return DEFAULT_PAGE_SIZE;
    }
    requested.clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE)
}

/// Rows that can be paginated by keyset
pub trait Keyed {
    fn cursor(&self) -> Cursor;
}

/// One page of results plus the cursor of its last row.
///
/// The end cursor is absent on an empty page, which marks the end of the
/// listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub end_cursor: Option<String>,
}

impl<T: Keyed> Page<T> {
    pub fn new(items: Vec<T>) -> Self {
        let end_cursor = items.last().map(|item| item.cursor().encode());
        Self { items, end_cursor }
    }
}

impl<T> Page<T> {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_cursor_round_trip() {
        let samples = [
            Cursor::new(1, Utc.timestamp_millis_opt(0).unwrap()),
            Cursor::new(42, Utc.timestamp_millis_opt(1_700_000_000_123).unwrap()),
            Cursor::new(i64::MAX, Utc.timestamp_nanos(1_700_000_000_123_456_789)),
            Cursor::new(7, Utc.with_ymd_and_hms(2031, 12, 31, 23, 59, 59).unwrap()),
        ];
        for cursor in samples {
            assert_eq!(Cursor::decode(&cursor.encode()).unwrap(), cursor);
        }
    }

    #[test]
    fn test_malformed_cursors() {
        let encode = |raw: &str| URL_SAFE_NO_PAD.encode(raw);
        let bad = [
            "".to_string(),
            "not base64!".to_string(),
            encode("123"),
            encode(",2024-01-01T00:00:00Z"),
            encode("abc,2024-01-01T00:00:00Z"),
            encode("-1,2024-01-01T00:00:00Z"),
            encode("123,yesterday"),
            encode("123,"),
        ];
        for cursor in bad {
            assert_eq!(Cursor::decode(&cursor), Err(AppError::invalid_cursor()), "{}", cursor);
        }
    }

    #[test]
    fn test_decode_optional_cursor() {
        assert_eq!(decode_cursor(None), Ok(None));
        assert!(decode_cursor(Some("%%%")).is_err());
    }

    #[test]
    fn test_normalize_page_size() {
        assert_eq!(normalize_page_size(0), DEFAULT_PAGE_SIZE);
        assert_eq!(normalize_page_size(1), 1);
        assert_eq!(normalize_page_size(25), 25);
        assert_eq!(normalize_page_size(1000), MAX_PAGE_SIZE);
    }

    #[test]
    fn test_keyset_predicate_sql() {
        let cursor = Cursor::new(9, Utc.timestamp_millis_opt(1_000).unwrap());
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT id FROM posts WHERE 1 = 1");
        cursor.push_before(&mut qb, "posts.created_at", "posts.id");
        assert_eq!(
            qb.sql(),
            "SELECT id FROM posts WHERE 1 = 1 AND posts.created_at <= ? AND (posts.id < ? OR posts.created_at < ?)"
        );
    }

    struct Row(i64, i64);

    impl Keyed for Row {
        fn cursor(&self) -> Cursor {
            Cursor::new(self.0, Utc.timestamp_millis_opt(self.1).unwrap())
        }
    }

    #[test]
    fn test_page_end_cursor() {
        let empty: Page<Row> = Page::new(vec![]);
        assert!(empty.end_cursor.is_none());

        let page = Page::new(vec![Row(3, 2_000), Row(2, 1_000)]);
        let end = Cursor::decode(page.end_cursor.as_deref().unwrap()).unwrap();
        assert_eq!(end.id, 2);
        assert_eq!(end.created_at.timestamp_millis(), 1_000);
    }
}
