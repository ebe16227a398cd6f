//! Generic list and detail handlers
//!
//! Any table in the [`SchemaRegistry`](crate::registry::SchemaRegistry) can be
//! served by these without table-specific code: the table name selects the
//! schema, the query string becomes a [`QuerySpec`], and the builder renders
//! the SQL.

use super::AppState;
use crate::error::{ApiError, Result};
use crate::pool::Store;
use crate::registry::TableSchema;
use crate::sql::{parse_list_params, OrderTerm, QueryBuilder, QuerySpec, Record};
use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, MethodRouter},
    Json,
};
use serde_json::Value;
use tracing::debug;

/// One page of a list plus the size of the unpaginated result
#[derive(Debug)]
pub struct Page {
    pub records: Vec<Record>,
    pub total: u64,
    /// Index of the first record within the full result
    pub first: u64,
}

impl Page {
    /// `Content-Range` value understood by react-admin
    pub fn content_range(&self, resource: &str) -> String {
        match self.records.len() as u64 {
            0 => format!("{} */{}", resource, self.total),
            len => format!("{} {}-{}/{}", resource, self.first, self.first + len - 1, self.total),
        }
    }

    pub fn into_response(self, resource: &str) -> Response {
        let range = self.content_range(resource);
        (
            [
                (header::CONTENT_RANGE, range),
                (
                    header::ACCESS_CONTROL_EXPOSE_HEADERS,
                    "Content-Range".to_string(),
                ),
            ],
            Json(self.records),
        )
            .into_response()
    }
}

/// Run a builder's page query and count query together
pub async fn fetch_page(store: &Store, builder: &QueryBuilder<'_>, spec: &QuerySpec) -> Result<Page> {
    let query = builder.build(spec)?;
    let count = builder.build_count(spec)?;
    let (records, total) = store.fetch_page(query, count, builder.schema()).await?;

    let first = if spec.page.limit.is_some() {
        spec.page.offset
    } else {
        0
    };

    Ok(Page {
        records,
        total,
        first,
    })
}

/// `SELECT * FROM <table> WHERE id = ?`
pub async fn find_by_id(store: &Store, schema: &TableSchema, id: i64) -> Result<Option<Record>> {
    let mut spec = QuerySpec::default();
    spec.filter.insert("id".to_string(), Value::from(id));
    let query = QueryBuilder::table(schema).build(&spec)?;
    store.fetch_optional(query, schema).await
}

pub async fn list_table(
    state: &AppState,
    table: &str,
    params: &[(String, String)],
) -> Result<Response> {
    let schema = state.registry.table(table)?;
    let spec = parse_list_params(params)?;
    debug!("Listing {} with {:?}", table, spec);

    // Stable order so successive pages never overlap
    let builder = QueryBuilder::table(schema).default_order(vec![OrderTerm::asc("id")]);
    let page = fetch_page(&state.store, &builder, &spec).await?;

    Ok(page.into_response(table))
}

pub async fn get_table_record(state: &AppState, table: &str, id: i64) -> Result<Json<Record>> {
    let schema = state.registry.table(table)?;
    find_by_id(&state.store, schema, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("No {} record with id {}", table, id)))
}

/// `GET /<table>` for a registered table
pub fn list_route(table: &'static str) -> MethodRouter<AppState> {
    get(
        move |State(state): State<AppState>, Query(params): Query<Vec<(String, String)>>| async move {
            list_table(&state, table, &params).await
        },
    )
}

/// `GET /<table>/:id` for a registered table
pub fn detail_route(table: &'static str) -> MethodRouter<AppState> {
    get(move |State(state): State<AppState>, Path(id): Path<i64>| async move {
        get_table_record(&state, table, id).await
    })
}
