use sqlx::error::{DatabaseError, ErrorKind};

use crate::application::repos::{RepoError, UniqueKey};

/// SQLSTATE `query_canceled`, raised when `statement_timeout` fires.
const QUERY_CANCELED: &str = "57014";
/// SQLSTATE `invalid_text_representation`.
const INVALID_TEXT: &str = "22P02";

pub fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    match err {
        sqlx::Error::RowNotFound => RepoError::NotFound,
        sqlx::Error::PoolTimedOut => RepoError::Timeout,
        sqlx::Error::Database(db) => map_database_error(&*db),
        other => RepoError::from_persistence(other),
    }
}

fn map_database_error(db: &dyn DatabaseError) -> RepoError {
    let code = db.code();
    classify(db.kind(), code.as_deref(), db.constraint(), db.message())
}

fn classify(
    kind: ErrorKind,
    code: Option<&str>,
    constraint: Option<&str>,
    message: &str,
) -> RepoError {
    match kind {
        ErrorKind::UniqueViolation => RepoError::duplicate(
            constraint
                .map(UniqueKey::from_constraint)
                .unwrap_or_else(|| UniqueKey::Other("unknown".to_string())),
        ),
        ErrorKind::ForeignKeyViolation => RepoError::InvalidInput {
            message: message.to_string(),
        },
        ErrorKind::NotNullViolation | ErrorKind::CheckViolation => RepoError::Integrity {
            message: message.to_string(),
        },
        _ => match code {
            Some(QUERY_CANCELED) => RepoError::Timeout,
            Some(INVALID_TEXT) => RepoError::InvalidInput {
                message: message.to_string(),
            },
            _ => RepoError::from_persistence(message),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_violations_name_the_schema_key() {
        let cases = [
            ("users_username_key", UniqueKey::Username),
            ("groups_title_key", UniqueKey::GroupTitle),
            ("groups_slug_key", UniqueKey::GroupSlug),
            ("follows_user_author_key", UniqueKey::Follow),
        ];
        for (constraint, expected) in cases {
            let err = classify(
                ErrorKind::UniqueViolation,
                Some("23505"),
                Some(constraint),
                "duplicate key value violates unique constraint",
            );
            assert!(
                matches!(&err, RepoError::Duplicate { key } if *key == expected),
                "{constraint} mapped to {err:?}"
            );
        }

        let err = classify(ErrorKind::UniqueViolation, Some("23505"), None, "dup");
        assert!(matches!(
            err,
            RepoError::Duplicate {
                key: UniqueKey::Other(_)
            }
        ));
    }

    #[test]
    fn other_kinds_follow_sqlstate() {
        assert!(matches!(
            classify(ErrorKind::ForeignKeyViolation, Some("23503"), Some("posts_author_id_fkey"), "fk"),
            RepoError::InvalidInput { .. }
        ));
        assert!(matches!(
            classify(ErrorKind::NotNullViolation, Some("23502"), None, "null"),
            RepoError::Integrity { .. }
        ));
        assert!(matches!(
            classify(ErrorKind::Other, Some(QUERY_CANCELED), None, "canceling statement"),
            RepoError::Timeout
        ));
        assert!(matches!(
            classify(ErrorKind::Other, Some(INVALID_TEXT), None, "invalid input syntax"),
            RepoError::InvalidInput { .. }
        ));
        assert!(matches!(
            classify(ErrorKind::Other, Some("XX000"), None, "internal"),
            RepoError::Persistence(_)
        ));
    }

    #[test]
    fn missing_rows_and_pool_timeouts() {
        assert!(matches!(
            map_sqlx_error(sqlx::Error::RowNotFound),
            RepoError::NotFound
        ));
        assert!(matches!(
            map_sqlx_error(sqlx::Error::PoolTimedOut),
            RepoError::Timeout
        ));
    }
}
