use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// A registered user, keyed by the identity provider's subject id.
///
/// Profile fields mirror whatever the provider reported last; only
/// `registration_date` is ours, stamped on first insert and preserved
/// across later profile refreshes.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub user_id: String,
    pub registration_date: DateTime<Utc>,
    pub name: Option<String>,
    pub nickname: Option<String>,
    pub email: Option<String>,
    pub picture: Option<String>,
}
