//! Schema introspection, cached for the lifetime of the process.
//!
//! The schema is assumed stable at runtime; only a restart refreshes it.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::OnceCell;

use crate::db::{ReadStore, Row, StoreError};

const TABLES_SQL: &str = "select table_name \
     from information_schema.tables \
     where table_schema::text = $1 \
     order by table_name";

const COLUMNS_SQL: &str = "select column_name, data_type, is_nullable \
     from information_schema.columns \
     where table_schema::text = $1 and table_name::text = $2 \
     order by ordinal_position";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSchema {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnSchema>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SchemaDescriptor {
    pub tables: Vec<TableSchema>,
}

impl SchemaDescriptor {
    /// Flat text block embedded verbatim in prompts.
    pub fn render_text(&self) -> String {
        let mut lines = Vec::new();
        for table in &self.tables {
            lines.push(format!("Table {}:", table.name));
            for column in &table.columns {
                lines.push(format!(
                    " - {} ({}){}",
                    column.name,
                    column.data_type,
                    if column.nullable { "" } else { " not null" }
                ));
            }
        }
        lines.join("\n")
    }

    /// One `table.column (type)` descriptor per column, in catalog order.
    pub fn column_descriptors(&self) -> Vec<String> {
        self.tables
            .iter()
            .flat_map(|table| {
                table.columns.iter().map(move |column| {
                    format!("{}.{} ({})", table.name, column.name, column.data_type)
                })
            })
            .collect()
    }

    pub fn column_count(&self) -> usize {
        self.tables.iter().map(|t| t.columns.len()).sum()
    }
}

/// Introspected schema plus its rendered text.
#[derive(Debug)]
pub struct LoadedSchema {
    pub descriptor: SchemaDescriptor,
    pub text: String,
}

pub struct SchemaCatalog {
    store: Arc<dyn ReadStore>,
    schema_name: String,
    cache: OnceCell<LoadedSchema>,
}

impl SchemaCatalog {
    pub fn new(store: Arc<dyn ReadStore>, schema_name: impl Into<String>) -> Self {
        Self {
            store,
            schema_name: schema_name.into(),
            cache: OnceCell::new(),
        }
    }

    /// Returns the cached schema, introspecting on first use.
    ///
    /// Concurrent first callers wait on the same fill. A failed fill caches
    /// nothing and the next call tries again.
    pub async fn load(&self) -> Result<&LoadedSchema, StoreError> {
        self.cache
            .get_or_try_init(|| async {
                let descriptor = self.introspect().await?;
                let text = descriptor.render_text();
                tracing::info!(
                    "Schema catalog loaded: {} tables, {} columns",
                    descriptor.tables.len(),
                    descriptor.column_count()
                );
                Ok::<_, StoreError>(LoadedSchema { descriptor, text })
            })
            .await
    }

    pub async fn schema_text(&self) -> Result<&str, StoreError> {
        Ok(self.load().await?.text.as_str())
    }

    async fn introspect(&self) -> Result<SchemaDescriptor, StoreError> {
        let table_rows = self
            .store
            .fetch_rows(TABLES_SQL, &[self.schema_name.clone()])
            .await?;

        let mut tables = Vec::with_capacity(table_rows.len());
        for table_row in &table_rows {
            let name = text_field(table_row, "table_name")?;
            let column_rows = self
                .store
                .fetch_rows(COLUMNS_SQL, &[self.schema_name.clone(), name.clone()])
                .await?;

            let columns = column_rows
                .iter()
                .map(|row| {
                    Ok(ColumnSchema {
                        name: text_field(row, "column_name")?,
                        data_type: text_field(row, "data_type")?,
                        nullable: text_field(row, "is_nullable")? != "NO",
                    })
                })
                .collect::<Result<Vec<_>, StoreError>>()?;

            tables.push(TableSchema { name, columns });
        }

        Ok(SchemaDescriptor { tables })
    }
}

fn text_field(row: &Row, key: &str) -> Result<String, StoreError> {
    row.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| StoreError::Query(format!("catalog row is missing '{}'", key)))
}
