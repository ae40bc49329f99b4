// SPDX-License-Identifier: Apache-2.0

//! Schema object model: Database ⊃ Schema ⊃ Table ⊃ Column
//!
//! Values are immutable and compare case-insensitively on every name in
//! their path, with hashes built from the same case-folded names. Engines
//! treat identifiers case-insensitively, so `DB.dbo.Orders` and
//! `db.DBO.orders` are the same table.
//!
//! `Ord` follows equality. For a stable presentation order that also
//! separates names differing only in case, use
//! [`CatalogObject::canonical_cmp`].

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::types::DbType;

fn fold(name: &str) -> String {
    name.to_lowercase()
}

fn names_eq(a: &str, b: &str) -> bool {
    a == b || a.eq_ignore_ascii_case(b) || fold(a) == fold(b)
}

fn names_cmp(a: &str, b: &str) -> Ordering {
    if names_eq(a, b) {
        Ordering::Equal
    } else {
        fold(a).cmp(&fold(b))
    }
}

fn names_canonical_cmp(a: &str, b: &str) -> Ordering {
    names_cmp(a, b).then_with(|| a.cmp(b))
}

fn opt_names_eq(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => names_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

fn opt_names_cmp(a: Option<&str>, b: Option<&str>, cmp: fn(&str, &str) -> Ordering) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => cmp(a, b),
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
    }
}

fn required(kind: &str, name: String) -> EngineResult<String> {
    if name.trim().is_empty() {
        Err(EngineError::validation(format!("{kind} name must not be blank")))
    } else {
        Ok(name)
    }
}

fn dotted(parts: &[Option<&str>]) -> String {
    parts
        .iter()
        .flatten()
        .filter(|part| !part.trim().is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(".")
}

/// Behaviour shared by every level of the hierarchy.
pub trait CatalogObject:
    Clone + Eq + Hash + fmt::Display + fmt::Debug + Send + Sync + 'static
{
    /// Case-insensitive order, ordinal comparison as tie-breaker.
    fn canonical_cmp(&self, other: &Self) -> Ordering;
}

/// Sorts catalog objects into their canonical presentation order.
pub fn sort_canonical<T: CatalogObject>(items: &mut [T]) {
    items.sort_by(|a, b| a.canonical_cmp(b));
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "DatabaseRecord")]
pub struct DatabaseSchemaDatabase {
    name: String,
}

impl DatabaseSchemaDatabase {
    pub fn new(name: impl Into<String>) -> EngineResult<Self> {
        Ok(Self {
            name: required("database", name.into())?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for DatabaseSchemaDatabase {
    fn eq(&self, other: &Self) -> bool {
        names_eq(&self.name, &other.name)
    }
}

impl Eq for DatabaseSchemaDatabase {}

impl Hash for DatabaseSchemaDatabase {
    fn hash<H: Hasher>(&self, state: &mut H) {
        fold(&self.name).hash(state);
    }
}

impl PartialOrd for DatabaseSchemaDatabase {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DatabaseSchemaDatabase {
    fn cmp(&self, other: &Self) -> Ordering {
        names_cmp(&self.name, &other.name)
    }
}

impl CatalogObject for DatabaseSchemaDatabase {
    fn canonical_cmp(&self, other: &Self) -> Ordering {
        names_canonical_cmp(&self.name, &other.name)
    }
}

impl fmt::Display for DatabaseSchemaDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A schema inside a database. Engines without schemas use `name: None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "SchemaRecord")]
pub struct DatabaseSchemaSchema {
    database: DatabaseSchemaDatabase,
    name: Option<String>,
}

impl DatabaseSchemaSchema {
    /// Blank names are stored as `None`.
    pub fn new(database: DatabaseSchemaDatabase, name: Option<impl Into<String>>) -> Self {
        let name = name.map(Into::into).filter(|n| !n.trim().is_empty());
        Self { database, name }
    }

    pub fn database(&self) -> &DatabaseSchemaDatabase {
        &self.database
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl PartialEq for DatabaseSchemaSchema {
    fn eq(&self, other: &Self) -> bool {
        self.database == other.database && opt_names_eq(self.name(), other.name())
    }
}

impl Eq for DatabaseSchemaSchema {}

impl Hash for DatabaseSchemaSchema {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.database.hash(state);
        self.name.as_deref().map(fold).hash(state);
    }
}

impl PartialOrd for DatabaseSchemaSchema {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DatabaseSchemaSchema {
    fn cmp(&self, other: &Self) -> Ordering {
        self.database
            .cmp(&other.database)
            .then_with(|| opt_names_cmp(self.name(), other.name(), names_cmp))
    }
}

impl CatalogObject for DatabaseSchemaSchema {
    fn canonical_cmp(&self, other: &Self) -> Ordering {
        self.database
            .canonical_cmp(&other.database)
            .then_with(|| opt_names_cmp(self.name(), other.name(), names_canonical_cmp))
    }
}

impl fmt::Display for DatabaseSchemaSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&dotted(&[Some(self.database.name()), self.name()]))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "TableRecord")]
pub struct DatabaseSchemaTable {
    schema: DatabaseSchemaSchema,
    name: String,
}

impl DatabaseSchemaTable {
    pub fn new(schema: DatabaseSchemaSchema, name: impl Into<String>) -> EngineResult<Self> {
        Ok(Self {
            schema,
            name: required("table", name.into())?,
        })
    }

    /// Builds the whole path at once: `from_parts("DB", Some("dbo"), "Orders")`.
    pub fn from_parts(
        database: impl Into<String>,
        schema: Option<&str>,
        table: impl Into<String>,
    ) -> EngineResult<Self> {
        let database = DatabaseSchemaDatabase::new(database)?;
        Self::new(DatabaseSchemaSchema::new(database, schema), table)
    }

    pub fn schema(&self) -> &DatabaseSchemaSchema {
        &self.schema
    }

    pub fn database(&self) -> &DatabaseSchemaDatabase {
        self.schema.database()
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for DatabaseSchemaTable {
    fn eq(&self, other: &Self) -> bool {
        self.schema == other.schema && names_eq(&self.name, &other.name)
    }
}

impl Eq for DatabaseSchemaTable {}

impl Hash for DatabaseSchemaTable {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.schema.hash(state);
        fold(&self.name).hash(state);
    }
}

impl PartialOrd for DatabaseSchemaTable {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DatabaseSchemaTable {
    fn cmp(&self, other: &Self) -> Ordering {
        self.schema
            .cmp(&other.schema)
            .then_with(|| names_cmp(&self.name, &other.name))
    }
}

impl CatalogObject for DatabaseSchemaTable {
    fn canonical_cmp(&self, other: &Self) -> Ordering {
        self.schema
            .canonical_cmp(&other.schema)
            .then_with(|| names_canonical_cmp(&self.name, &other.name))
    }
}

impl fmt::Display for DatabaseSchemaTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&dotted(&[
            Some(self.database().name()),
            self.schema.name(),
            Some(&self.name),
        ]))
    }
}

/// Column metadata. Identity is the owning table plus the column name.
///
/// `ordinal` is reported as the engine reports it, zero- or one-based.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "ColumnRecord")]
pub struct DatabaseSchemaColumn {
    table: DatabaseSchemaTable,
    name: String,
    column_type: String,
    db_type: DbType,
    nullable: bool,
    ordinal: i64,
    length: Option<i64>,
    precision: Option<i64>,
    scale: Option<i64>,
    default_value: Option<String>,
}

impl DatabaseSchemaColumn {
    pub fn new(
        table: DatabaseSchemaTable,
        name: impl Into<String>,
        column_type: impl Into<String>,
        db_type: DbType,
    ) -> EngineResult<Self> {
        Ok(Self {
            table,
            name: required("column", name.into())?,
            column_type: column_type.into(),
            db_type,
            nullable: true,
            ordinal: 0,
            length: None,
            precision: None,
            scale: None,
            default_value: None,
        })
    }

    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn with_ordinal(mut self, ordinal: i64) -> Self {
        self.ordinal = ordinal;
        self
    }

    pub fn with_length(mut self, length: Option<i64>) -> Self {
        self.length = length;
        self
    }

    pub fn with_precision(mut self, precision: Option<i64>) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_scale(mut self, scale: Option<i64>) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_default_value(mut self, default_value: Option<String>) -> Self {
        self.default_value = default_value;
        self
    }

    pub fn table(&self) -> &DatabaseSchemaTable {
        &self.table
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Native type name as the engine reported it.
    pub fn column_type(&self) -> &str {
        &self.column_type
    }

    pub fn db_type(&self) -> DbType {
        self.db_type
    }

    pub fn nullable(&self) -> bool {
        self.nullable
    }

    pub fn ordinal(&self) -> i64 {
        self.ordinal
    }

    pub fn length(&self) -> Option<i64> {
        self.length
    }

    pub fn precision(&self) -> Option<i64> {
        self.precision
    }

    pub fn scale(&self) -> Option<i64> {
        self.scale
    }

    pub fn default_value(&self) -> Option<&str> {
        self.default_value.as_deref()
    }
}

impl PartialEq for DatabaseSchemaColumn {
    fn eq(&self, other: &Self) -> bool {
        self.table == other.table && names_eq(&self.name, &other.name)
    }
}

impl Eq for DatabaseSchemaColumn {}

impl Hash for DatabaseSchemaColumn {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.table.hash(state);
        fold(&self.name).hash(state);
    }
}

impl PartialOrd for DatabaseSchemaColumn {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DatabaseSchemaColumn {
    fn cmp(&self, other: &Self) -> Ordering {
        self.table
            .cmp(&other.table)
            .then_with(|| names_cmp(&self.name, &other.name))
    }
}

impl CatalogObject for DatabaseSchemaColumn {
    /// Columns keep table order first, then the engine's ordinal.
    fn canonical_cmp(&self, other: &Self) -> Ordering {
        self.table
            .canonical_cmp(&other.table)
            .then_with(|| self.ordinal.cmp(&other.ordinal))
            .then_with(|| names_canonical_cmp(&self.name, &other.name))
    }
}

impl fmt::Display for DatabaseSchemaColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&dotted(&[
            Some(self.table.database().name()),
            self.table.schema().name(),
            Some(self.table.name()),
            Some(&self.name),
        ]))
    }
}

// Deserialization goes through the constructors so blank names are rejected.

#[derive(Deserialize)]
struct DatabaseRecord {
    name: String,
}

impl TryFrom<DatabaseRecord> for DatabaseSchemaDatabase {
    type Error = EngineError;

    fn try_from(record: DatabaseRecord) -> EngineResult<Self> {
        Self::new(record.name)
    }
}

#[derive(Deserialize)]
struct SchemaRecord {
    database: DatabaseSchemaDatabase,
    name: Option<String>,
}

impl From<SchemaRecord> for DatabaseSchemaSchema {
    fn from(record: SchemaRecord) -> Self {
        Self::new(record.database, record.name)
    }
}

#[derive(Deserialize)]
struct TableRecord {
    schema: DatabaseSchemaSchema,
    name: String,
}

impl TryFrom<TableRecord> for DatabaseSchemaTable {
    type Error = EngineError;

    fn try_from(record: TableRecord) -> EngineResult<Self> {
        Self::new(record.schema, record.name)
    }
}

#[derive(Deserialize)]
struct ColumnRecord {
    table: DatabaseSchemaTable,
    name: String,
    column_type: String,
    db_type: DbType,
    nullable: bool,
    ordinal: i64,
    length: Option<i64>,
    precision: Option<i64>,
    scale: Option<i64>,
    default_value: Option<String>,
}

impl TryFrom<ColumnRecord> for DatabaseSchemaColumn {
    type Error = EngineError;

    fn try_from(record: ColumnRecord) -> EngineResult<Self> {
        Ok(Self::new(record.table, record.name, record.column_type, record.db_type)?
            .with_nullable(record.nullable)
            .with_ordinal(record.ordinal)
            .with_length(record.length)
            .with_precision(record.precision)
            .with_scale(record.scale)
            .with_default_value(record.default_value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;
    use std::collections::HashSet;

    fn hash_of<T: Hash>(value: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    fn table(db: &str, schema: &str, name: &str) -> DatabaseSchemaTable {
        DatabaseSchemaTable::from_parts(db, Some(schema), name).expect("valid table")
    }

    #[test]
    fn table_equality_ignores_case() {
        let a = table("DB", "dbo", "Orders");
        let b = table("db", "DBO", "orders");
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
        assert_eq!(a.cmp(&b), Ordering::Equal);
    }

    #[test]
    fn different_names_are_different_tables() {
        assert_ne!(table("db", "dbo", "Orders"), table("db", "dbo", "OrderLines"));
        assert_ne!(table("db", "dbo", "Orders"), table("db", "sales", "Orders"));
    }

    #[test]
    fn canonical_order_breaks_case_ties_ordinally() {
        let mut items = vec![
            table("db", "dbo", "orders"),
            table("db", "dbo", "Customers"),
            table("db", "dbo", "Orders"),
        ];
        sort_canonical(&mut items);
        let names: Vec<&str> = items.iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["Customers", "Orders", "orders"]);
    }

    #[test]
    fn set_keeps_one_entry_per_case_insensitive_name() {
        let mut set = HashSet::new();
        assert!(set.insert(table("DB", "dbo", "Orders")));
        assert!(!set.insert(table("db", "DBO", "ORDERS")));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn schema_without_name() {
        let db = DatabaseSchemaDatabase::new("shop").expect("db");
        let schema = DatabaseSchemaSchema::new(db.clone(), Some("  "));
        assert_eq!(schema.name(), None);
        assert_eq!(schema, DatabaseSchemaSchema::new(db, None::<String>));
        assert_eq!(schema.to_string(), "shop");
    }

    #[test]
    fn display_renders_dotted_path() {
        let t = table("DB", "dbo", "Orders");
        assert_eq!(t.to_string(), "DB.dbo.Orders");

        let no_schema = DatabaseSchemaTable::from_parts("shop", None, "items").expect("table");
        let column = DatabaseSchemaColumn::new(no_schema, "id", "int", DbType::Int32).expect("column");
        assert_eq!(column.to_string(), "shop.items.id");
    }

    #[test]
    fn blank_names_are_rejected() {
        assert!(DatabaseSchemaDatabase::new(" ").is_err());
        assert!(DatabaseSchemaTable::from_parts("db", Some("dbo"), "").is_err());
        let t = table("db", "dbo", "Orders");
        assert!(DatabaseSchemaColumn::new(t, "\t", "int", DbType::Int32).is_err());
    }

    #[test]
    fn column_identity_ignores_metadata() {
        let t = table("db", "dbo", "Orders");
        let a = DatabaseSchemaColumn::new(t.clone(), "Id", "INT", DbType::Int32)
            .expect("column")
            .with_ordinal(1);
        let b = DatabaseSchemaColumn::new(t, "ID", "BIGINT", DbType::Int64)
            .expect("column")
            .with_ordinal(7)
            .with_nullable(false);
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn deserialization_rejects_blank_names() {
        assert!(serde_json::from_str::<DatabaseSchemaDatabase>(r#"{"name":"  "}"#).is_err());
        let blank_table = r#"{"schema":{"database":{"name":"db"},"name":"dbo"},"name":""}"#;
        assert!(serde_json::from_str::<DatabaseSchemaTable>(blank_table).is_err());

        let schema: DatabaseSchemaSchema =
            serde_json::from_str(r#"{"database":{"name":"db"},"name":" "}"#).expect("schema");
        assert_eq!(schema.name(), None);
    }

    #[test]
    fn serialized_column_reads_back() {
        let column = DatabaseSchemaColumn::new(table("db", "dbo", "Orders"), "Id", "int", DbType::Int32)
            .expect("column")
            .with_nullable(false)
            .with_ordinal(1);
        let json = serde_json::to_string(&column).expect("serialize");
        let back: DatabaseSchemaColumn = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, column);
        assert!(!back.nullable());
        assert_eq!(back.ordinal(), 1);

        let blank = json.replace(r#""name":"Id""#, r#""name":"""#);
        assert!(serde_json::from_str::<DatabaseSchemaColumn>(&blank).is_err());
    }
}
