// Utility functions
use chrono::{Duration, NaiveDate};
use sha2::{Digest, Sha256};

/// Date format expected by the portal's search form.
pub const PORTAL_DATE_FORMAT: &str = "%d/%m/%Y";

/// Publication window `[today - lookback_days, today]`, formatted for the form.
pub fn search_window(today: NaiveDate, lookback_days: i64) -> (String, String) {
    let start = today - Duration::days(lookback_days);
    (
        start.format(PORTAL_DATE_FORMAT).to_string(),
        today.format(PORTAL_DATE_FORMAT).to_string(),
    )
}

/// Content fingerprint of a rendered row.
pub fn fingerprint(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Number of result pages at a given page size; never less than one.
pub fn total_pages(total: u32, page_size: u32) -> u32 {
    if page_size == 0 {
        return 1;
    }
    total.div_ceil(page_size).max(1)
}
