//! HTTP request handlers.

use serde::{Deserialize, Deserializer};

pub mod auth_handler;
pub mod chat_handler;
pub mod comment_handler;
pub mod health_handler;
pub mod issue_handler;
pub mod notification_handler;
pub mod project_handler;
pub mod report_handler;
pub mod search_handler;
pub mod team_handler;
pub mod user_handler;
pub mod workflow_handler;

pub use auth_handler::{account_routes, auth_routes};
pub use chat_handler::chat_routes;
pub use comment_handler::comment_routes;
pub use health_handler::health_routes;
pub use issue_handler::issue_routes;
pub use notification_handler::notification_routes;
pub use project_handler::project_routes;
pub use report_handler::report_routes;
pub use search_handler::search_routes;
pub use team_handler::team_routes;
pub use user_handler::user_routes;
pub use workflow_handler::workflow_routes;

/// Deserialize a field that distinguishes "absent" from `null`.
///
/// Use with `#[serde(default, deserialize_with = "nullable")]`: a missing
/// field stays `None`, an explicit `null` becomes `Some(None)`.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "nullable")]
        description: Option<Option<String>>,
    }

    #[test]
    fn test_nullable_distinguishes_absent_and_null() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.description, None);

        let cleared: Patch = serde_json::from_str(r#"{"description":null}"#).unwrap();
        assert_eq!(cleared.description, Some(None));

        let set: Patch = serde_json::from_str(r#"{"description":"x"}"#).unwrap();
        assert_eq!(set.description, Some(Some("x".to_string())));
    }
}
