//! Notification history over HTTP
//!
//! The channel only carries live pushes; previously stored notifications
//! are fetched from the REST API that fronts the notification store.

use beacon_core::protocol::Notification;
use serde::Deserialize;
use tracing::debug;

/// One page of stored notifications
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryPage {
    pub notifications: Vec<Notification>,
    /// Total stored notifications for the user, across all pages
    pub total: u64,
}

/// Build the history URL for `user_id` against `api_url`
fn history_url(api_url: &str, user_id: &str, page: u32, limit: u32) -> String {
    format!(
        "{}/api/notifications?userId={}&page={}&limit={}",
        api_url.trim_end_matches('/'),
        user_id,
        page,
        limit
    )
}

/// Fetch one page of notification history.
///
/// Pages are 1-based; the server clamps out-of-range pages to an empty
/// list with the true total.
pub async fn fetch_history(
    api_url: &str,
    user_id: &str,
    page: u32,
    limit: u32,
) -> Result<HistoryPage, String> {
    let url = history_url(api_url, user_id, page, limit);
    debug!(%url, "fetching notification history");

    let response = reqwest::get(&url)
        .await
        .map_err(|e| format!("history request failed: {e}"))?;

    let status = response.status();
    if !status.is_success() {
        return Err(format!("history request returned {status}"));
    }

    response
        .json::<HistoryPage>()
        .await
        .map_err(|e| format!("invalid history response: {e}"))
}
