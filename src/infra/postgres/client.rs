use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgRow};
use sqlx::{Connection, Postgres, QueryBuilder, Row};
use tracing::{debug, warn};

use crate::config::DbConfig;
use crate::error::{EvalError, Result};
use crate::services::prediction_source::{DatasetCount, PredictionFilter, PredictionSource};
use crate::table::{Table, parse_cell};

const PREDICTIONS_QUERY: &str = "SELECT \
        pr.row_id::text AS row_id, \
        pr.dataset_id::text AS dataset_id, \
        pr.model_id::text AS model_id, \
        pr.prompt_id::text AS prompt_id, \
        pr.prediction::text AS prediction, \
        r.expected_prediction::text AS expected_prediction \
    FROM predictions pr \
    JOIN rows r ON pr.row_id = r.row_id \
    JOIN models m ON pr.model_id = m.model_id";

const PREDICTION_COLUMNS: [&str; 6] = [
    "row_id",
    "dataset_id",
    "model_id",
    "prompt_id",
    "prediction",
    "expected_prediction",
];

const EXPECTED_QUERY: &str = "SELECT \
        row_id::text AS row_id, \
        dataset_id::text AS dataset_id, \
        expected_prediction::text AS expected_prediction \
    FROM rows";

const EXPECTED_COLUMNS: [&str; 3] = ["row_id", "dataset_id", "expected_prediction"];

fn connectivity(context: &str) -> impl FnOnce(sqlx::Error) -> EvalError + '_ {
    move |e| EvalError::Connectivity(format!("{context}: {e}"))
}

/// Reads predictions from PostgreSQL, one short-lived connection per call.
pub struct PgPredictionSource {
    options: PgConnectOptions,
    display_url: String,
}

impl PgPredictionSource {
    pub fn new(config: &DbConfig) -> Self {
        Self {
            options: config.connect_options(),
            display_url: config.display_url(),
        }
    }

    async fn connect(&self) -> Result<PgConnection> {
        debug!(url = %self.display_url, "Connecting to database");
        PgConnection::connect_with(&self.options)
            .await
            .map_err(connectivity("failed to connect to database"))
    }

    /// Closes the connection whatever the query returned, then hands back the
    /// query result.
    async fn finish<T>(conn: PgConnection, outcome: Result<T>) -> Result<T> {
        if let Err(e) = conn.close().await {
            warn!(error = %e, "Failed to close database connection");
        }
        outcome
    }

    async fn fetch_table(&self, mut query: QueryBuilder<'_, Postgres>, columns: &[&str]) -> Result<Table> {
        let mut conn = self.connect().await?;
        let fetched = query
            .build()
            .fetch_all(&mut conn)
            .await
            .map_err(connectivity("query failed"));
        let rows = Self::finish(conn, fetched).await?;

        let mut table = Table::new(columns.iter().copied());
        for row in &rows {
            table.push_row(read_row(row, columns.len())?);
        }

        debug!(rows = table.len(), "Fetched table");
        Ok(table)
    }
}

fn read_row(row: &PgRow, width: usize) -> Result<Vec<Option<String>>> {
    (0..width)
        .map(|i| -> Result<Option<String>> {
            let value: Option<String> = row.try_get(i).map_err(connectivity("unexpected column type"))?;
            Ok(value.as_deref().and_then(parse_cell))
        })
        .collect()
}

#[async_trait]
impl PredictionSource for PgPredictionSource {
    #[tracing::instrument(skip(self))]
    async fn fetch_predictions(&self, filter: &PredictionFilter) -> Result<Table> {
        let mut query = QueryBuilder::<Postgres>::new(PREDICTIONS_QUERY);
        let mut prefix = " WHERE ";

        if let Some(id) = filter.model_id {
            query.push(prefix).push("pr.model_id = ").push_bind(id);
            prefix = " AND ";
        }
        if let Some(id) = filter.dataset_id {
            query.push(prefix).push("pr.dataset_id = ").push_bind(id);
            prefix = " AND ";
        }
        if let Some(id) = filter.prompt_id {
            query.push(prefix).push("pr.prompt_id = ").push_bind(id);
            prefix = " AND ";
        }
        if let Some(library) = &filter.library {
            query.push(prefix).push("m.library = ").push_bind(library.clone());
        }

        self.fetch_table(query, &PREDICTION_COLUMNS).await
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_expected_predictions(&self) -> Result<Table> {
        self.fetch_table(QueryBuilder::new(EXPECTED_QUERY), &EXPECTED_COLUMNS)
            .await
    }

    #[tracing::instrument(skip(self))]
    async fn dataset_row_count(&self, name: &str) -> Result<Option<DatasetCount>> {
        let mut conn = self.connect().await?;

        let outcome = async {
            let id: Option<i64> = sqlx::query_scalar("SELECT id::bigint FROM datasets WHERE name = $1")
                .bind(name)
                .fetch_optional(&mut conn)
                .await
                .map_err(connectivity("dataset lookup failed"))?;

            let Some(id) = id else {
                return Ok(None);
            };

            let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM rows WHERE datasetid = $1")
                .bind(id)
                .fetch_one(&mut conn)
                .await
                .map_err(connectivity("row count failed"))?;

            Ok::<_, EvalError>(Some(DatasetCount { id, rows }))
        }
        .await;

        Self::finish(conn, outcome).await
    }
}
