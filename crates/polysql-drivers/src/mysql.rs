// SPDX-License-Identifier: Apache-2.0

//! MySQL / MariaDB dialect
//!
//! MySQL has no separate schema level: a database is its own single schema,
//! so every schema and table carries the database name as its schema name.

use std::sync::Arc;

use polysql_core::{
    CatalogQuery, DataRow, DatabaseSchemaColumn, DatabaseSchemaDatabase, DatabaseSchemaSchema,
    DatabaseSchemaTable, DatabaseTypes, DbType, Dialect, EngineError, EngineResult, Escaper,
    HostType, NativeType, SchemaIntrospector, SqlParameter, TypeCatalogCache, TypeCatalogProvider,
    TypeDescriptor,
};

use crate::convert;

pub const DRIVER_ID: &str = "mysql";

/// Native MySQL column types. Values follow the protocol's column type codes,
/// offset by 0x100 for the unsigned integer variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MySqlType {
    TinyInt = 1,
    SmallInt = 2,
    Int = 3,
    Float = 4,
    Double = 5,
    Timestamp = 7,
    BigInt = 8,
    MediumInt = 9,
    Date = 10,
    Time = 11,
    DateTime = 12,
    Year = 13,
    VarChar = 15,
    Bit = 16,
    Json = 245,
    Decimal = 246,
    Enum = 247,
    Set = 248,
    TinyBlob = 249,
    MediumBlob = 250,
    LongBlob = 251,
    Blob = 252,
    VarBinary = 253,
    Char = 254,
    Geometry = 255,
    TinyIntUnsigned = 0x101,
    SmallIntUnsigned = 0x102,
    IntUnsigned = 0x103,
    BigIntUnsigned = 0x108,
    MediumIntUnsigned = 0x109,
    Binary = 0x1FE,
    TinyText = 0x2F9,
    MediumText = 0x2FA,
    LongText = 0x2FB,
    Text = 0x2FC,
    Bool = 0x301,
    Numeric = 0x3F6,
    Real = 0x305,
    Point = 0x4FF,
    LineString = 0x5FF,
    Polygon = 0x6FF,
}

const MYSQL_TYPES: &[MySqlType] = &[
    MySqlType::TinyInt,
    MySqlType::SmallInt,
    MySqlType::Int,
    MySqlType::Float,
    MySqlType::Double,
    MySqlType::Timestamp,
    MySqlType::BigInt,
    MySqlType::MediumInt,
    MySqlType::Date,
    MySqlType::Time,
    MySqlType::DateTime,
    MySqlType::Year,
    MySqlType::VarChar,
    MySqlType::Bit,
    MySqlType::Json,
    MySqlType::Decimal,
    MySqlType::Enum,
    MySqlType::Set,
    MySqlType::TinyBlob,
    MySqlType::MediumBlob,
    MySqlType::LongBlob,
    MySqlType::Blob,
    MySqlType::VarBinary,
    MySqlType::Char,
    MySqlType::Geometry,
    MySqlType::TinyIntUnsigned,
    MySqlType::SmallIntUnsigned,
    MySqlType::IntUnsigned,
    MySqlType::BigIntUnsigned,
    MySqlType::MediumIntUnsigned,
    MySqlType::Binary,
    MySqlType::TinyText,
    MySqlType::MediumText,
    MySqlType::LongText,
    MySqlType::Text,
    MySqlType::Bool,
    MySqlType::Numeric,
    MySqlType::Real,
    MySqlType::Point,
    MySqlType::LineString,
    MySqlType::Polygon,
];

impl NativeType for MySqlType {
    const ENGINE: &'static str = DRIVER_ID;

    fn variants() -> &'static [Self] {
        MYSQL_TYPES
    }

    fn descriptors() -> Vec<TypeDescriptor<Self>> {
        use MySqlType::*;
        vec![
            TypeDescriptor::new(TinyInt, DbType::SByte, HostType::I8).names(&["tinyint"]),
            TypeDescriptor::new(SmallInt, DbType::Int16, HostType::I16).names(&["smallint"]),
            TypeDescriptor::new(Int, DbType::Int32, HostType::I32).names(&["int", "integer"]),
            TypeDescriptor::new(Float, DbType::Single, HostType::F32).names(&["float"]),
            TypeDescriptor::new(Double, DbType::Double, HostType::F64)
                .names(&["double", "double precision"]),
            TypeDescriptor::new(Timestamp, DbType::DateTime, HostType::DateTime)
                .names(&["timestamp"]),
            TypeDescriptor::new(BigInt, DbType::Int64, HostType::I64).names(&["bigint"]),
            TypeDescriptor::new(MediumInt, DbType::Int32, HostType::I32).names(&["mediumint"]),
            TypeDescriptor::new(Date, DbType::Date, HostType::Date).names(&["date"]),
            TypeDescriptor::new(Time, DbType::Time, HostType::Time).names(&["time"]),
            TypeDescriptor::new(DateTime, DbType::DateTime, HostType::DateTime)
                .names(&["datetime"]),
            TypeDescriptor::new(Year, DbType::Int16, HostType::I16).names(&["year"]),
            TypeDescriptor::new(VarChar, DbType::String, HostType::String)
                .names(&["varchar", "character varying"]),
            TypeDescriptor::new(Bit, DbType::Binary, HostType::Bytes).names(&["bit"]),
            TypeDescriptor::new(Json, DbType::Json, HostType::Json).names(&["json"]),
            TypeDescriptor::new(Decimal, DbType::Decimal, HostType::Decimal)
                .names(&["decimal", "dec", "fixed"]),
            TypeDescriptor::new(Enum, DbType::String, HostType::String).names(&["enum"]),
            TypeDescriptor::new(Set, DbType::String, HostType::String).names(&["set"]),
            TypeDescriptor::new(TinyBlob, DbType::Binary, HostType::Bytes).names(&["tinyblob"]),
            TypeDescriptor::new(MediumBlob, DbType::Binary, HostType::Bytes)
                .names(&["mediumblob"]),
            TypeDescriptor::new(LongBlob, DbType::Binary, HostType::Bytes).names(&["longblob"]),
            TypeDescriptor::new(Blob, DbType::Binary, HostType::Bytes).names(&["blob"]),
            TypeDescriptor::new(VarBinary, DbType::Binary, HostType::Bytes)
                .names(&["varbinary"]),
            TypeDescriptor::new(Char, DbType::StringFixedLength, HostType::String)
                .names(&["char", "character"]),
            TypeDescriptor::new(Geometry, DbType::Object, HostType::Bytes).names(&["geometry"]),
            TypeDescriptor::new(TinyIntUnsigned, DbType::Byte, HostType::U8)
                .names(&["tinyint unsigned"]),
            TypeDescriptor::new(SmallIntUnsigned, DbType::UInt16, HostType::U16)
                .names(&["smallint unsigned"]),
            TypeDescriptor::new(IntUnsigned, DbType::UInt32, HostType::U32)
                .names(&["int unsigned", "integer unsigned"]),
            TypeDescriptor::new(BigIntUnsigned, DbType::UInt64, HostType::U64)
                .names(&["bigint unsigned", "serial"]),
            TypeDescriptor::new(MediumIntUnsigned, DbType::UInt32, HostType::U32)
                .names(&["mediumint unsigned"]),
            TypeDescriptor::new(Binary, DbType::Binary, HostType::Bytes).names(&["binary"]),
            TypeDescriptor::new(TinyText, DbType::String, HostType::String).names(&["tinytext"]),
            TypeDescriptor::new(MediumText, DbType::String, HostType::String)
                .names(&["mediumtext"]),
            TypeDescriptor::new(LongText, DbType::String, HostType::String).names(&["longtext"]),
            TypeDescriptor::new(Text, DbType::String, HostType::String).names(&["text"]),
            TypeDescriptor::new(Bool, DbType::Boolean, HostType::Bool)
                .names(&["bool", "boolean"])
                .alias_for(TinyInt),
            TypeDescriptor::new(Numeric, DbType::Decimal, HostType::Decimal)
                .names(&["numeric"])
                .alias_for(Decimal),
            TypeDescriptor::new(Real, DbType::Double, HostType::F64)
                .names(&["real"])
                .alias_for(Double),
            TypeDescriptor::new(Point, DbType::Object, HostType::Bytes).names(&["point"]),
            TypeDescriptor::new(LineString, DbType::Object, HostType::Bytes)
                .names(&["linestring"]),
            TypeDescriptor::new(Polygon, DbType::Object, HostType::Bytes).names(&["polygon"]),
        ]
    }

    fn item_name(self) -> &'static str {
        match self {
            MySqlType::TinyInt => "TinyInt",
            MySqlType::SmallInt => "SmallInt",
            MySqlType::Int => "Int",
            MySqlType::Float => "Float",
            MySqlType::Double => "Double",
            MySqlType::Timestamp => "Timestamp",
            MySqlType::BigInt => "BigInt",
            MySqlType::MediumInt => "MediumInt",
            MySqlType::Date => "Date",
            MySqlType::Time => "Time",
            MySqlType::DateTime => "DateTime",
            MySqlType::Year => "Year",
            MySqlType::VarChar => "VarChar",
            MySqlType::Bit => "Bit",
            MySqlType::Json => "Json",
            MySqlType::Decimal => "Decimal",
            MySqlType::Enum => "Enum",
            MySqlType::Set => "Set",
            MySqlType::TinyBlob => "TinyBlob",
            MySqlType::MediumBlob => "MediumBlob",
            MySqlType::LongBlob => "LongBlob",
            MySqlType::Blob => "Blob",
            MySqlType::VarBinary => "VarBinary",
            MySqlType::Char => "Char",
            MySqlType::Geometry => "Geometry",
            MySqlType::TinyIntUnsigned => "TinyIntUnsigned",
            MySqlType::SmallIntUnsigned => "SmallIntUnsigned",
            MySqlType::IntUnsigned => "IntUnsigned",
            MySqlType::BigIntUnsigned => "BigIntUnsigned",
            MySqlType::MediumIntUnsigned => "MediumIntUnsigned",
            MySqlType::Binary => "Binary",
            MySqlType::TinyText => "TinyText",
            MySqlType::MediumText => "MediumText",
            MySqlType::LongText => "LongText",
            MySqlType::Text => "Text",
            MySqlType::Bool => "Bool",
            MySqlType::Numeric => "Numeric",
            MySqlType::Real => "Real",
            MySqlType::Point => "Point",
            MySqlType::LineString => "LineString",
            MySqlType::Polygon => "Polygon",
        }
    }

    fn native_value(self) -> i32 {
        self as i32
    }
}

const RESERVED_WORDS: &[&str] = &[
    "ACCESSIBLE", "ADD", "ALL", "ALTER", "ANALYZE", "AND", "AS", "ASC", "ASENSITIVE", "BEFORE",
    "BETWEEN", "BIGINT", "BINARY", "BLOB", "BOTH", "BY", "CALL", "CASCADE", "CASE", "CHANGE",
    "CHAR", "CHARACTER", "CHECK", "COLLATE", "COLUMN", "CONDITION", "CONSTRAINT", "CONTINUE",
    "CONVERT", "CREATE", "CROSS", "CUBE", "CURRENT_DATE", "CURRENT_TIME", "CURRENT_TIMESTAMP",
    "CURRENT_USER", "CURSOR", "DATABASE", "DATABASES", "DAY_HOUR", "DEC", "DECIMAL", "DECLARE",
    "DEFAULT", "DELAYED", "DELETE", "DESC", "DESCRIBE", "DETERMINISTIC", "DISTINCT", "DIV",
    "DOUBLE", "DROP", "DUAL", "EACH", "ELSE", "ELSEIF", "ENCLOSED", "ESCAPED", "EXCEPT", "EXISTS",
    "EXIT", "EXPLAIN", "FALSE", "FETCH", "FLOAT", "FOR", "FORCE", "FOREIGN", "FROM", "FULLTEXT",
    "FUNCTION", "GENERATED", "GET", "GRANT", "GROUP", "GROUPS", "HAVING", "IF", "IGNORE", "IN",
    "INDEX", "INFILE", "INNER", "INOUT", "INSERT", "INT", "INTEGER", "INTERSECT", "INTERVAL",
    "INTO", "IS", "ITERATE", "JOIN", "KEY", "KEYS", "KILL", "LATERAL", "LEADING", "LEAVE", "LEFT",
    "LIKE", "LIMIT", "LINEAR", "LINES", "LOAD", "LOCALTIME", "LOCALTIMESTAMP", "LOCK", "LONG",
    "LOOP", "MATCH", "MOD", "MODIFIES", "NATURAL", "NOT", "NULL", "NUMERIC", "OF", "ON",
    "OPTIMIZE", "OPTION", "OR", "ORDER", "OUT", "OUTER", "OVER", "PARTITION", "PRECISION",
    "PRIMARY", "PROCEDURE", "PURGE", "RANGE", "RANK", "READ", "REAL", "RECURSIVE", "REFERENCES",
    "REGEXP", "RELEASE", "RENAME", "REPEAT", "REPLACE", "REQUIRE", "RESTRICT", "RETURN", "REVOKE",
    "RIGHT", "RLIKE", "ROW", "ROWS", "SCHEMA", "SCHEMAS", "SELECT", "SENSITIVE", "SEPARATOR",
    "SET", "SHOW", "SIGNAL", "SMALLINT", "SPATIAL", "SPECIFIC", "SQL", "STARTING", "STORED",
    "STRAIGHT_JOIN", "SYSTEM", "TABLE", "TERMINATED", "THEN", "TO", "TRAILING", "TRIGGER", "TRUE",
    "UNDO", "UNION", "UNIQUE", "UNLOCK", "UNSIGNED", "UPDATE", "USAGE", "USE", "USING",
    "UTC_DATE", "UTC_TIME", "UTC_TIMESTAMP", "VALUES", "VARBINARY", "VARCHAR", "VARYING",
    "VIRTUAL", "WHEN", "WHERE", "WHILE", "WINDOW", "WITH", "WRITE", "XOR", "ZEROFILL",
];

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '$')
}

#[derive(Debug)]
pub struct MySqlDialect {
    escaper: Escaper,
}

impl MySqlDialect {
    pub fn new() -> Self {
        Self {
            escaper: Escaper::new('`', '`', is_identifier_char)
                .with_reserved_words(RESERVED_WORDS.iter().copied()),
        }
    }

    fn schema_of(database: &DatabaseSchemaDatabase) -> DatabaseSchemaSchema {
        DatabaseSchemaSchema::new(database.clone(), Some(database.name()))
    }
}

impl Default for MySqlDialect {
    fn default() -> Self {
        Self::new()
    }
}

/// MariaDB reports a missing default as the literal `NULL`.
fn normalize_default(raw: String) -> Option<String> {
    if raw.trim().eq_ignore_ascii_case("null") {
        None
    } else {
        Some(raw)
    }
}

impl TypeCatalogProvider for MySqlDialect {
    fn types(&self) -> EngineResult<Arc<DatabaseTypes>> {
        TypeCatalogCache::global().get_or_build::<MySqlType>()
    }
}

impl SchemaIntrospector for MySqlDialect {
    fn current_database_queries(&self) -> Vec<CatalogQuery> {
        vec![
            CatalogQuery::new("SELECT DATABASE()"),
            CatalogQuery::new("SELECT SCHEMA()"),
        ]
    }

    fn current_schema_queries(&self) -> Vec<CatalogQuery> {
        vec![CatalogQuery::new("SELECT DATABASE()")]
    }

    fn database_queries(&self) -> Vec<CatalogQuery> {
        vec![
            CatalogQuery::new(
                "SELECT CAST(SCHEMA_NAME AS CHAR) AS DATABASE_NAME \
                 FROM information_schema.SCHEMATA ORDER BY SCHEMA_NAME",
            ),
            CatalogQuery::new("SHOW DATABASES"),
        ]
    }

    fn schema_queries(&self, database: &DatabaseSchemaDatabase) -> Vec<CatalogQuery> {
        vec![CatalogQuery::new(format!(
            "SELECT CAST(SCHEMA_NAME AS CHAR) AS SCHEMA_NAME \
             FROM information_schema.SCHEMATA WHERE SCHEMA_NAME = {}",
            self.parameter_placeholder(0)
        ))
        .bind(SqlParameter::text(database.name()))]
    }

    fn table_queries(&self, database: &DatabaseSchemaDatabase) -> Vec<CatalogQuery> {
        vec![
            CatalogQuery::new(format!(
                "SELECT CAST(TABLE_NAME AS CHAR) AS TABLE_NAME \
                 FROM information_schema.TABLES \
                 WHERE TABLE_SCHEMA = {} AND TABLE_TYPE = 'BASE TABLE' ORDER BY TABLE_NAME",
                self.parameter_placeholder(0)
            ))
            .bind(SqlParameter::text(database.name())),
            CatalogQuery::new(format!(
                "SHOW FULL TABLES FROM {} WHERE Table_type = 'BASE TABLE'",
                self.escaper.escape_path([database.name()])
            )),
        ]
    }

    fn column_queries(
        &self,
        database: &DatabaseSchemaDatabase,
        table: Option<&DatabaseSchemaTable>,
    ) -> Vec<CatalogQuery> {
        let mut sql = format!(
            "SELECT CAST(TABLE_NAME AS CHAR) AS TABLE_NAME, \
             CAST(COLUMN_NAME AS CHAR) AS COLUMN_NAME, \
             CAST(COLUMN_TYPE AS CHAR) AS DATA_TYPE, IS_NULLABLE AS NULLABLE, \
             ORDINAL_POSITION AS ORDINAL, CHARACTER_MAXIMUM_LENGTH AS LENGTH, \
             NUMERIC_PRECISION AS PRECISION, NUMERIC_SCALE AS SCALE, \
             CAST(COLUMN_DEFAULT AS CHAR) AS DEFAULT_VALUE \
             FROM information_schema.COLUMNS WHERE TABLE_SCHEMA = {}",
            self.parameter_placeholder(0)
        );
        let mut query_parameters = vec![SqlParameter::text(database.name())];
        if let Some(table) = table {
            sql.push_str(&format!(
                " AND TABLE_NAME = {}",
                self.parameter_placeholder(1)
            ));
            query_parameters.push(SqlParameter::text(table.name()));
        }
        sql.push_str(" ORDER BY TABLE_NAME, ORDINAL_POSITION");
        vec![query_parameters
            .into_iter()
            .fold(CatalogQuery::new(sql), CatalogQuery::bind)]
    }

    /// Accepts both the `information_schema` label and `SHOW DATABASES` output.
    fn to_database(&self, row: &DataRow<'_>) -> EngineResult<DatabaseSchemaDatabase> {
        let name = row
            .get_string_any(&[convert::DATABASE_NAME, "Database"])
            .ok_or_else(|| {
                EngineError::validation(format!("row {}: no database name", row.index()))
            })?;
        DatabaseSchemaDatabase::new(name)
    }

    fn to_schema(
        &self,
        database: &DatabaseSchemaDatabase,
        _row: &DataRow<'_>,
    ) -> EngineResult<DatabaseSchemaSchema> {
        Ok(Self::schema_of(database))
    }

    /// `SHOW FULL TABLES` names its first column `Tables_in_<db>`.
    fn to_table(
        &self,
        database: &DatabaseSchemaDatabase,
        row: &DataRow<'_>,
    ) -> EngineResult<DatabaseSchemaTable> {
        let show_label = format!("Tables_in_{}", database.name());
        let name = row
            .get_string_any(&[convert::TABLE_NAME, show_label.as_str()])
            .ok_or_else(|| EngineError::validation(format!("row {}: no table name", row.index())))?;
        DatabaseSchemaTable::new(Self::schema_of(database), name)
    }

    fn to_column(
        &self,
        database: &DatabaseSchemaDatabase,
        types: &DatabaseTypes,
        row: &DataRow<'_>,
    ) -> EngineResult<DatabaseSchemaColumn> {
        let table = DatabaseSchemaTable::new(
            Self::schema_of(database),
            row.require_string(convert::TABLE_NAME)?,
        )?;
        convert::column(table, types, row, normalize_default)
    }
}

impl Dialect for MySqlDialect {
    fn driver_id(&self) -> &'static str {
        DRIVER_ID
    }

    fn driver_name(&self) -> &'static str {
        "MySQL / MariaDB"
    }

    fn escaper(&self) -> &Escaper {
        &self.escaper
    }

    fn parameter_name(&self, index: usize) -> String {
        format!("p{index}")
    }

    fn parameter_placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    /// The schema level duplicates the database, so it is skipped.
    fn table_path<'a>(&self, table: &'a DatabaseSchemaTable) -> Vec<Option<&'a str>> {
        vec![Some(table.database().name()), Some(table.name())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polysql_core::{DataTable, Value};

    #[test]
    fn column_type_keeps_signedness() {
        let types = MySqlDialect::new().types().expect("catalog");
        assert_eq!(types.db_type_or_default("int(10) unsigned"), DbType::UInt32);
        assert_eq!(types.db_type_or_default("int(11)"), DbType::Int32);
        assert_eq!(types.db_type_or_default("bigint unsigned"), DbType::UInt64);
        assert_eq!(types.db_type_or_default("enum('a','b')"), DbType::String);
        assert_eq!(types.db_type_or_default("decimal(10,2) unsigned zerofill"), DbType::Decimal);
        assert_eq!(types.lookup("boolean").map(|t| t.type_name()), Some("tinyint"));
    }

    #[test]
    fn zerofill_keeps_unsigned_types() {
        let types = MySqlDialect::new().types().expect("catalog");
        assert_eq!(types.db_type_or_default("int(10) unsigned zerofill"), DbType::UInt32);
        assert_eq!(types.db_type_or_default("bigint(20) unsigned zerofill"), DbType::UInt64);
        assert_eq!(types.db_type_or_default("smallint(5) unsigned zerofill"), DbType::UInt16);
    }

    #[test]
    fn backticks_and_question_marks() {
        let dialect = MySqlDialect::new();
        assert_eq!(dialect.escaper().escape("order"), "`order`");
        assert_eq!(dialect.escaper().escape("customers"), "customers");
        assert_eq!(dialect.parameter_name(4), "p4");
        assert_eq!(dialect.parameter_placeholder(4), "?");
    }

    #[test]
    fn tables_read_show_full_tables_output() {
        let dialect = MySqlDialect::new();
        let database = DatabaseSchemaDatabase::new("shop").expect("db");
        let table = DataTable::new(vec!["Tables_in_shop".into(), "Table_type".into()])
            .with_row(vec![Value::from("orders"), Value::from("BASE TABLE")]);
        let row = table.row(0).expect("row");

        let found = dialect.to_table(&database, &row).expect("table");
        assert_eq!(found.name(), "orders");
        assert_eq!(found.schema().name(), Some("shop"));
        assert_eq!(
            dialect.escaper().escape_path(dialect.table_path(&found).into_iter().flatten()),
            "shop.orders"
        );
    }

    #[test]
    fn databases_read_show_databases_output() {
        let dialect = MySqlDialect::new();
        let table = DataTable::new(vec!["Database".into()])
            .with_row(vec![Value::from("information_schema")]);
        let row = table.row(0).expect("row");
        assert_eq!(
            dialect.to_database(&row).expect("database").name(),
            "information_schema"
        );
    }

    #[test]
    fn column_query_is_database_scoped() {
        let dialect = MySqlDialect::new();
        let database = DatabaseSchemaDatabase::new("shop").expect("db");
        let table = DatabaseSchemaTable::from_parts("shop", Some("shop"), "orders")
            .expect("table");
        let candidates = dialect.column_queries(&database, Some(&table));
        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].sql.contains("TABLE_SCHEMA = ? AND TABLE_NAME = ?"));
        assert_eq!(candidates[0].parameters.len(), 2);
    }
}
