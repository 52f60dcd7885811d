//! The wiki data service: one acquire → query → map pipeline per operation.
//!
//! The contract is the [`WikiDatabaseService`] trait; [`WikiDatabase`] is
//! the in-process implementation. The bus proxy implements the same trait,
//! so callers cannot tell a local service from a dispatched one.

use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};

use crate::error::{ServiceError, ServiceResult};
use crate::page::{Page, PageMatch};
use crate::pipeline::chain;
use crate::pool::ConnPool;
use crate::queries::{QueryRegistry, SqlQuery};

/// Operation contract for the page store.
///
/// Lookups that may miss return `Option` rather than an error; the wire
/// layer renders that as the found-flag record.
#[async_trait]
pub trait WikiDatabaseService: Send + Sync {
    /// All page names, sorted lexicographically. Empty store → empty list.
    async fn fetch_all_page_names(&self) -> ServiceResult<Vec<String>>;

    /// Look up one page by name.
    async fn fetch_page(&self, name: &str) -> ServiceResult<Option<PageMatch>>;

    /// Look up one page by id.
    async fn fetch_page_by_id(&self, id: i64) -> ServiceResult<Option<Page>>;

    /// Create a page. A duplicate name is a `Conflict`.
    async fn create_page(&self, name: &str, content: &str) -> ServiceResult<()>;

    /// Replace the content of an existing page. Unknown id is `NotFound`.
    async fn save_page(&self, id: i64, content: &str) -> ServiceResult<()>;

    /// Delete a page. Deleting an absent id is a successful no-op.
    async fn delete_page(&self, id: i64) -> ServiceResult<()>;

    /// Full records for every page, in store order.
    async fn fetch_all_pages_data(&self) -> ServiceResult<Vec<Page>>;
}

/// In-process implementation backed by the shared connection pool.
#[derive(Clone)]
pub struct WikiDatabase {
    pool: Arc<ConnPool>,
    queries: Arc<QueryRegistry>,
}

impl WikiDatabase {
    /// Build the service and bootstrap the schema through a pooled
    /// connection. Fails instead of handing out a service that cannot
    /// reach a usable store.
    pub async fn connect(pool: Arc<ConnPool>, queries: Arc<QueryRegistry>) -> ServiceResult<Self> {
        let service = Self { pool, queries };
        let ddl = service.queries.get(SqlQuery::CreatePagesTable).to_owned();
        chain(service.pool.acquire(), |conn| {
            conn.run(move |c| c.execute_batch(&ddl).map_err(Into::into))
        })
        .await?;
        tracing::info!("wiki database service ready");
        Ok(service)
    }
}

#[async_trait]
impl WikiDatabaseService for WikiDatabase {
    async fn fetch_all_page_names(&self) -> ServiceResult<Vec<String>> {
        let sql = self.queries.get(SqlQuery::AllPages).to_owned();
        chain(self.pool.acquire(), |conn| {
            conn.run(move |c| {
                let mut stmt = c.prepare(&sql)?;
                let mut names = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                // Downstream rendering expects alphabetical order; sorting
                // stays out of the query to keep the SQL portable.
                names.sort();
                Ok(names)
            })
        })
        .await
    }

    async fn fetch_page(&self, name: &str) -> ServiceResult<Option<PageMatch>> {
        let sql = self.queries.get(SqlQuery::GetPage).to_owned();
        let name = name.to_owned();
        chain(self.pool.acquire(), |conn| {
            conn.run(move |c| {
                let found = c
                    .query_row(&sql, params![name], |row| {
                        Ok(PageMatch {
                            id: row.get(0)?,
                            content: row.get(1)?,
                        })
                    })
                    .optional()?;
                Ok(found)
            })
        })
        .await
    }

    async fn fetch_page_by_id(&self, id: i64) -> ServiceResult<Option<Page>> {
        let sql = self.queries.get(SqlQuery::GetPageById).to_owned();
        chain(self.pool.acquire(), |conn| {
            conn.run(move |c| {
                let found = c
                    .query_row(&sql, params![id], |row| {
                        Ok(Page {
                            id: row.get(0)?,
                            name: row.get(1)?,
                            content: row.get(2)?,
                        })
                    })
                    .optional()?;
                Ok(found)
            })
        })
        .await
    }

    async fn create_page(&self, name: &str, content: &str) -> ServiceResult<()> {
        let sql = self.queries.get(SqlQuery::CreatePage).to_owned();
        let name = name.to_owned();
        let content = content.to_owned();
        tracing::debug!(name = %name, "creating page");
        chain(self.pool.acquire(), |conn| {
            conn.run(move |c| {
                c.execute(&sql, params![name, content])?;
                Ok(())
            })
        })
        .await
    }

    async fn save_page(&self, id: i64, content: &str) -> ServiceResult<()> {
        let sql = self.queries.get(SqlQuery::SavePage).to_owned();
        let content = content.to_owned();
        chain(self.pool.acquire(), |conn| {
            conn.run(move |c| {
                let affected = c.execute(&sql, params![content, id])?;
                if affected == 0 {
                    return Err(ServiceError::NotFound(format!("page id {id}")));
                }
                Ok(())
            })
        })
        .await
    }

    async fn delete_page(&self, id: i64) -> ServiceResult<()> {
        let sql = self.queries.get(SqlQuery::DeletePage).to_owned();
        chain(self.pool.acquire(), |conn| {
            conn.run(move |c| {
                // Zero rows affected is fine: the page is gone either way.
                c.execute(&sql, params![id])?;
                Ok(())
            })
        })
        .await
    }

    async fn fetch_all_pages_data(&self) -> ServiceResult<Vec<Page>> {
        let sql = self.queries.get(SqlQuery::AllPagesData).to_owned();
        chain(self.pool.acquire(), |conn| {
            conn.run(move |c| {
                let mut stmt = c.prepare(&sql)?;
                let pages = stmt
                    .query_map([], |row| {
                        Ok(Page {
                            id: row.get(0)?,
                            name: row.get(1)?,
                            content: row.get(2)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(pages)
            })
        })
        .await
    }
}
