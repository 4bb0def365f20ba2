//! Request helpers shared by the catalog handlers.

use serde::Serialize;

pub const MIN_PAGE_LIMIT: i64 = 50;
pub const MAX_PAGE_LIMIT: i64 = 100;

/// A page window. Out-of-range input is clamped rather than rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
}

impl Pagination {
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        let page = page.filter(|&p| p >= 1).unwrap_or(1);
        let limit = limit
            .unwrap_or(MIN_PAGE_LIMIT)
            .clamp(MIN_PAGE_LIMIT, MAX_PAGE_LIMIT);
        Self { page, limit }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Parse a comma-separated id list such as `1, 2,3`.
///
/// Returns the first segment that is not a positive integer on failure.
/// Empty segments are skipped, so `""` parses to an empty list.
pub fn parse_id_list(raw: &str) -> Result<Vec<i64>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(|segment| match segment.parse::<i64>() {
            Ok(id) if id > 0 => Ok(id),
            _ => Err(segment.to_string()),
        })
        .collect()
}
