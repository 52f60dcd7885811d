//! SQL query registry.
//!
//! Statements live in an external TOML resource rather than in code, so the
//! schema and queries can be swapped per deployment. The registry is built
//! once at startup, fails fast on any missing key, and is immutable
//! afterwards, so lookups need no locking.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Compiled-in default statements, used when no resource path is configured.
const EMBEDDED_QUERIES: &str = include_str!("../queries/db-queries.toml");

/// One variant per statement the service issues. `CreatePagesTable` is the
/// schema bootstrap run at service startup; the rest map 1:1 to operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlQuery {
    CreatePagesTable,
    AllPages,
    GetPage,
    GetPageById,
    CreatePage,
    SavePage,
    DeletePage,
    AllPagesData,
}

impl SqlQuery {
    /// All variants, in registry-resource order.
    pub const ALL: [SqlQuery; 8] = [
        SqlQuery::CreatePagesTable,
        SqlQuery::AllPages,
        SqlQuery::GetPage,
        SqlQuery::GetPageById,
        SqlQuery::CreatePage,
        SqlQuery::SavePage,
        SqlQuery::DeletePage,
        SqlQuery::AllPagesData,
    ];

    /// Key under which this statement appears in the resource file.
    pub fn key(self) -> &'static str {
        match self {
            SqlQuery::CreatePagesTable => "create-pages-table",
            SqlQuery::AllPages => "all-pages",
            SqlQuery::GetPage => "get-page",
            SqlQuery::GetPageById => "get-page-by-id",
            SqlQuery::CreatePage => "create-page",
            SqlQuery::SavePage => "save-page",
            SqlQuery::DeletePage => "delete-page",
            SqlQuery::AllPagesData => "all-pages-data",
        }
    }
}

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("failed to read query resource {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("query resource is not valid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("query resource is missing required key '{key}'")]
    MissingQuery { key: &'static str },

    #[error("query '{key}' must be a string")]
    NotAString { key: &'static str },
}

/// Immutable tag → statement mapping.
#[derive(Debug, Clone)]
pub struct QueryRegistry {
    queries: HashMap<SqlQuery, String>,
}

impl QueryRegistry {
    /// Load the registry from a TOML file on disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&raw)
    }

    /// Build the registry from the compiled-in defaults.
    pub fn embedded() -> Result<Self, RegistryError> {
        Self::parse(EMBEDDED_QUERIES)
    }

    fn parse(raw: &str) -> Result<Self, RegistryError> {
        let table: toml::Table = raw.parse()?;
        let mut queries = HashMap::with_capacity(SqlQuery::ALL.len());
        for query in SqlQuery::ALL {
            let key = query.key();
            let value = table
                .get(key)
                .ok_or(RegistryError::MissingQuery { key })?;
            let sql = value
                .as_str()
                .ok_or(RegistryError::NotAString { key })?;
            queries.insert(query, sql.trim().to_owned());
        }
        Ok(Self { queries })
    }

    /// Look up the statement for a tag. Infallible: construction verified
    /// every variant is present.
    pub fn get(&self, query: SqlQuery) -> &str {
        &self.queries[&query]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn embedded_defaults_cover_every_tag() {
        let registry = QueryRegistry::embedded().expect("embedded resource parses");
        for query in SqlQuery::ALL {
            assert!(!registry.get(query).is_empty(), "{:?} is empty", query);
        }
    }

    #[test]
    fn load_from_file_round_trips() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(EMBEDDED_QUERIES.as_bytes()).unwrap();

        let registry = QueryRegistry::load(file.path()).expect("file loads");
        assert!(registry.get(SqlQuery::AllPages).starts_with("SELECT name"));
    }

    #[test]
    fn missing_key_fails_fast() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        // Everything except delete-page.
        let partial = EMBEDDED_QUERIES
            .lines()
            .filter(|line| !line.starts_with("delete-page"))
            .collect::<Vec<_>>()
            .join("\n");
        file.write_all(partial.as_bytes()).unwrap();

        let err = QueryRegistry::load(file.path()).unwrap_err();
        assert!(matches!(
            err,
            RegistryError::MissingQuery { key: "delete-page" }
        ));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = QueryRegistry::load("/nonexistent/queries.toml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/queries.toml"));
    }
}
