use std::borrow::Cow;
use std::time::Duration;

use async_trait::async_trait;
use lifecycle::{MigrationGuard, MigrationOutcome};
use sqlx::PgPool;
use tracing::{info, warn};

/// SQLSTATE for `undefined_object`, what Postgres reports when dropping a missing index.
pub const UNDEFINED_OBJECT: &str = "42704";

/// Finds the schema holding `index` on table `model`, restricted to the search path so an
/// identically named index on another table or in another schema is never touched.
pub const FIND_INDEX_QUERY: &str = "SELECT schemaname::text FROM pg_indexes \
     WHERE tablename = $1 AND indexname = $2 AND schemaname = ANY(current_schemas(false)) \
     ORDER BY array_position(current_schemas(false), schemaname) \
     LIMIT 1";

/// Drops an index left behind by an earlier deployment whose uniqueness constraint
/// conflicts with the current schema. Every outcome lets startup continue.
pub struct PgIndexGuard {
    timeout: Duration,
}

impl PgIndexGuard {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl MigrationGuard<PgPool> for PgIndexGuard {
    async fn ensure_index_consistency(
        &self,
        pool: &PgPool,
        model_name: &str,
        index_name: &str,
    ) -> MigrationOutcome {
        let repair = drop_index_on_model(pool, model_name, index_name);

        let result = match tokio::time::timeout(self.timeout, repair).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    model = model_name,
                    index = index_name,
                    timeout_secs = self.timeout.as_secs_f64(),
                    "timed out removing conflicting index"
                );
                return MigrationOutcome::UnexpectedError;
            }
        };

        let outcome = classify_repair_result(&result);
        match (outcome, result) {
            (MigrationOutcome::Removed, _) => {
                info!(model = model_name, index = index_name, "removed conflicting index")
            }
            (MigrationOutcome::Absent, _) => info!(
                model = model_name,
                index = index_name,
                "index does not exist, no need to remove"
            ),
            (MigrationOutcome::UnexpectedError, Err(e)) => warn!(
                model = model_name,
                index = index_name,
                "error removing conflicting index: {e:#}"
            ),
            (MigrationOutcome::UnexpectedError, Ok(_)) => {}
        }
        outcome
    }
}

/// Returns `Ok(true)` if the index was found on `model_name` and dropped, `Ok(false)` if the
/// table has no such index.
async fn drop_index_on_model(
    pool: &PgPool,
    model_name: &str,
    index_name: &str,
) -> Result<bool, sqlx::Error> {
    let schema: Option<String> = sqlx::query_scalar(FIND_INDEX_QUERY)
        .bind(model_name)
        .bind(index_name)
        .fetch_optional(pool)
        .await?;

    let Some(schema) = schema else {
        return Ok(false);
    };
    sqlx::query(&drop_index_statement(&schema, index_name))
        .execute(pool)
        .await?;
    Ok(true)
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Schema-qualified `DROP INDEX` with both names quoted as identifiers.
pub fn drop_index_statement(schema: &str, index_name: &str) -> String {
    format!(
        "DROP INDEX {}.{}",
        quote_identifier(schema),
        quote_identifier(index_name)
    )
}

/// The single place that knows what a store error looks like.
///
/// A concurrent deploy may drop the index between lookup and drop; that surfaces as
/// `undefined_object` and still counts as absent.
pub fn classify_repair_result(result: &Result<bool, sqlx::Error>) -> MigrationOutcome {
    match result {
        Ok(true) => MigrationOutcome::Removed,
        Ok(false) => MigrationOutcome::Absent,
        Err(e) => classify_sqlstate(sqlstate(e).as_deref()),
    }
}

pub fn classify_sqlstate(code: Option<&str>) -> MigrationOutcome {
    match code {
        Some(UNDEFINED_OBJECT) => MigrationOutcome::Absent,
        _ => MigrationOutcome::UnexpectedError,
    }
}

fn sqlstate(e: &sqlx::Error) -> Option<Cow<'_, str>> {
    match e {
        sqlx::Error::Database(db) => db.code(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_index_is_absent() {
        assert_eq!(
            classify_sqlstate(Some(UNDEFINED_OBJECT)),
            MigrationOutcome::Absent
        );
    }

    #[test]
    fn other_database_codes_are_unexpected() {
        // dependent_objects_still_exist, insufficient_privilege
        assert_eq!(
            classify_sqlstate(Some("2BP01")),
            MigrationOutcome::UnexpectedError
        );
        assert_eq!(
            classify_sqlstate(Some("42501")),
            MigrationOutcome::UnexpectedError
        );
        assert_eq!(classify_sqlstate(None), MigrationOutcome::UnexpectedError);
    }

    #[test]
    fn dropped_index_is_removed() {
        assert_eq!(classify_repair_result(&Ok(true)), MigrationOutcome::Removed);
    }

    #[test]
    fn index_missing_from_model_is_absent() {
        assert_eq!(classify_repair_result(&Ok(false)), MigrationOutcome::Absent);
    }

    #[test]
    fn lookup_is_scoped_to_model_table_and_search_path() {
        assert!(FIND_INDEX_QUERY.contains("FROM pg_indexes"));
        assert!(FIND_INDEX_QUERY.contains("tablename = $1"));
        assert!(FIND_INDEX_QUERY.contains("indexname = $2"));
        assert!(FIND_INDEX_QUERY.contains("current_schemas(false)"));
    }

    #[test]
    fn non_database_errors_are_unexpected() {
        assert_eq!(
            classify_repair_result(&Err(sqlx::Error::PoolTimedOut)),
            MigrationOutcome::UnexpectedError
        );
        assert_eq!(
            classify_repair_result(&Err(sqlx::Error::PoolClosed)),
            MigrationOutcome::UnexpectedError
        );
    }

    #[test]
    fn drop_is_schema_qualified_and_quoted() {
        assert_eq!(
            drop_index_statement("public", "address_1"),
            "DROP INDEX \"public\".\"address_1\""
        );
        assert_eq!(
            drop_index_statement("public", "bad\"; DROP TABLE merchants; --"),
            "DROP INDEX \"public\".\"bad\"\"; DROP TABLE merchants; --\""
        );
    }
}
