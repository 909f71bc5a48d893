//! MySQL/MariaDB SQL for metadata lookups and batch reads.
//!
//! Batches are read in the order [`KeyValue`] uses: numeric for integer keys,
//! byte order for everything else. Integer, binary and `_bin`-collated keys
//! already sort that way natively, so their SQL names the bare column and the
//! primary key index serves every batch. Only keys under a linguistic
//! collation are re-collated with `COLLATE <charset>_bin`.

use crate::core::{BatchRequest, KeyValue, LowerBound, TableRef, UpperBound};

/// MySQL/MariaDB dialect.
///
/// Compatible with MySQL 5.7+, 8.0+, and MariaDB 10.2+.
#[derive(Debug, Clone, Default)]
pub struct MysqlDialect;

/// Statement that pins a repeatable-read view for the rest of the session.
pub const ISOLATION_SQL: &str = "SET SESSION TRANSACTION ISOLATION LEVEL REPEATABLE READ";
/// Starts the snapshot transaction.
pub const START_SNAPSHOT_SQL: &str = "START TRANSACTION WITH CONSISTENT SNAPSHOT, READ ONLY";
/// Ends the snapshot transaction.
pub const ROLLBACK_SQL: &str = "ROLLBACK";

/// How a primary key column is decoded, compared and ordered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyKind {
    /// Integer column; keys must fit `i64`.
    Integer,
    /// Character or temporal column whose native order is byte order of its text.
    Text,
    /// Character column under a linguistic collation; ordered under `collation`.
    CollatedText { collation: String },
    /// Binary string column, ordered bytewise.
    Binary,
}

impl KeyKind {
    /// Classify a key column from `information_schema.COLUMNS`.
    ///
    /// `None` for types whose rendered text does not sort like the column
    /// (`decimal`, `float`, `time`, `enum`, ...).
    pub fn classify(data_type: &str, charset: Option<&str>, collation: Option<&str>) -> Option<Self> {
        let data_type = data_type.to_lowercase();
        if is_integer_type(&data_type) {
            return Some(KeyKind::Integer);
        }
        match data_type.as_str() {
            "binary" | "varbinary" | "tinyblob" | "blob" | "mediumblob" | "longblob" => {
                Some(KeyKind::Binary)
            }
            // Fixed-width renderings, so text order is chronological order
            "date" | "datetime" | "timestamp" | "year" => Some(KeyKind::Text),
            "char" | "varchar" | "tinytext" | "text" | "mediumtext" | "longtext" => {
                match collation.map(str::to_lowercase) {
                    None => Some(KeyKind::Binary),
                    Some(c) if c == "binary" => Some(KeyKind::Binary),
                    Some(c) if c.ends_with("_bin") => Some(KeyKind::Text),
                    Some(c) => {
                        let charset = charset
                            .map(str::to_lowercase)
                            .or_else(|| c.split('_').next().map(str::to_string))
                            .unwrap_or_else(|| "utf8mb4".to_string());
                        Some(KeyKind::CollatedText {
                            collation: format!("{}_bin", charset),
                        })
                    }
                }
            }
            _ => None,
        }
    }
}

impl MysqlDialect {
    pub fn new() -> Self {
        Self
    }

    pub fn quote_ident(&self, name: &str) -> String {
        // Backticks inside names are doubled
        format!("`{}`", name.replace('`', "``"))
    }

    /// `` `schema`.`table` `` or `` `table` ``.
    pub fn qualified_table(&self, table: &TableRef) -> String {
        match &table.schema {
            Some(schema) => format!("{}.{}", self.quote_ident(schema), self.quote_ident(&table.name)),
            None => self.quote_ident(&table.name),
        }
    }

    /// Engine, version and row format. Binds: schema (nullable), table.
    pub fn table_status_query(&self) -> &'static str {
        "SELECT CAST(COALESCE(ENGINE, '') AS CHAR), \
                CAST(COALESCE(VERSION, '') AS CHAR), \
                CAST(COALESCE(ROW_FORMAT, '') AS CHAR) \
         FROM information_schema.TABLES \
         WHERE TABLE_SCHEMA = COALESCE(?, DATABASE()) AND TABLE_NAME = ?"
    }

    /// First primary key column with its data type, character set and
    /// collation. Binds: schema (nullable), table.
    pub fn primary_key_query(&self) -> &'static str {
        "SELECT CAST(k.COLUMN_NAME AS CHAR), CAST(c.DATA_TYPE AS CHAR), \
                CAST(c.CHARACTER_SET_NAME AS CHAR), CAST(c.COLLATION_NAME AS CHAR) \
         FROM information_schema.KEY_COLUMN_USAGE k \
         JOIN information_schema.COLUMNS c \
           ON c.TABLE_SCHEMA = k.TABLE_SCHEMA \
          AND c.TABLE_NAME = k.TABLE_NAME \
          AND c.COLUMN_NAME = k.COLUMN_NAME \
         WHERE k.TABLE_SCHEMA = COALESCE(?, DATABASE()) \
           AND k.TABLE_NAME = ? \
           AND k.CONSTRAINT_NAME = 'PRIMARY' \
         ORDER BY k.ORDINAL_POSITION \
         LIMIT 1"
    }

    /// Smallest and largest key, in the order batches walk them.
    pub fn key_bounds_query(&self, table: &TableRef, key_column: &str, kind: &KeyKind) -> String {
        let key = self.key_expr(key_column, kind);
        format!(
            "SELECT MIN({key}), MAX({key}) FROM {}",
            self.qualified_table(table)
        )
    }

    /// `SELECT *` for one batch, ordered by key.
    pub fn batch_query(&self, table: &TableRef, request: &BatchRequest, kind: &KeyKind) -> String {
        let key = self.key_expr(&request.key_column, kind);
        let literal = KeyValue::to_sql_literal;

        let mut conditions = Vec::new();
        match &request.lower {
            LowerBound::Start => {}
            LowerBound::After(v) => conditions.push(format!("{} > {}", key, literal(v))),
            LowerBound::From(v) => conditions.push(format!("{} >= {}", key, literal(v))),
        }
        let mut limit = None;
        match &request.upper {
            UpperBound::Limit(n) => limit = Some(*n),
            UpperBound::Before(v) => conditions.push(format!("{} < {}", key, literal(v))),
            UpperBound::Through(v) => conditions.push(format!("{} <= {}", key, literal(v))),
        }

        let mut sql = format!("SELECT * FROM {}", self.qualified_table(table));
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql.push_str(&format!(" ORDER BY {}", key));
        if let Some(n) = limit {
            sql.push_str(&format!(" LIMIT {}", n));
        }
        sql
    }

    fn key_expr(&self, key_column: &str, kind: &KeyKind) -> String {
        match kind {
            KeyKind::CollatedText { collation } => {
                format!("{} COLLATE {}", self.quote_ident(key_column), collation)
            }
            KeyKind::Integer | KeyKind::Text | KeyKind::Binary => self.quote_ident(key_column),
        }
    }
}

/// Whether a column `DATA_TYPE` holds integer keys.
pub fn is_integer_type(data_type: &str) -> bool {
    matches!(
        data_type.to_lowercase().as_str(),
        "tinyint" | "smallint" | "mediumint" | "int" | "integer" | "bigint"
    )
}
