// SPDX-License-Identifier: Apache-2.0

//! SQL Server dialect
//!
//! Every catalog query is qualified with the target database
//! (`[db].sys.tables`), so one connection can introspect all databases on
//! the server. `sys.*` views come first, `INFORMATION_SCHEMA` is the fallback.

use std::sync::Arc;

use polysql_core::{
    CatalogQuery, DataRow, DatabaseSchemaColumn, DatabaseSchemaDatabase, DatabaseSchemaSchema,
    DatabaseSchemaTable, DatabaseTypes, DbType, Dialect, EngineResult, Escaper, HostType,
    NativeType, SchemaIntrospector, SqlParameter, TypeCatalogCache, TypeCatalogProvider, TypeDescriptor,
};

use crate::convert;

pub const DRIVER_ID: &str = "sqlserver";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlServerType {
    BigInt = 127,
    Binary = 173,
    Bit = 104,
    Char = 175,
    Date = 40,
    DateTime = 61,
    DateTime2 = 42,
    DateTimeOffset = 43,
    Decimal = 106,
    Float = 62,
    Geography = 1301,
    Geometry = 1302,
    HierarchyId = 1303,
    Image = 34,
    Int = 56,
    Money = 60,
    NChar = 239,
    NText = 99,
    Numeric = 108,
    NVarChar = 231,
    Real = 59,
    RowVersion = 189,
    SmallDateTime = 58,
    SmallInt = 52,
    SmallMoney = 122,
    SqlVariant = 98,
    SysName = 256,
    Text = 35,
    Time = 41,
    Timestamp = 190,
    TinyInt = 48,
    UniqueIdentifier = 36,
    VarBinary = 165,
    VarChar = 167,
    Xml = 241,
}

const SQLSERVER_TYPES: &[SqlServerType] = &[
    SqlServerType::BigInt,
    SqlServerType::Binary,
    SqlServerType::Bit,
    SqlServerType::Char,
    SqlServerType::Date,
    SqlServerType::DateTime,
    SqlServerType::DateTime2,
    SqlServerType::DateTimeOffset,
    SqlServerType::Decimal,
    SqlServerType::Float,
    SqlServerType::Geography,
    SqlServerType::Geometry,
    SqlServerType::HierarchyId,
    SqlServerType::Image,
    SqlServerType::Int,
    SqlServerType::Money,
    SqlServerType::NChar,
    SqlServerType::NText,
    SqlServerType::Numeric,
    SqlServerType::NVarChar,
    SqlServerType::Real,
    SqlServerType::RowVersion,
    SqlServerType::SmallDateTime,
    SqlServerType::SmallInt,
    SqlServerType::SmallMoney,
    SqlServerType::SqlVariant,
    SqlServerType::SysName,
    SqlServerType::Text,
    SqlServerType::Time,
    SqlServerType::Timestamp,
    SqlServerType::TinyInt,
    SqlServerType::UniqueIdentifier,
    SqlServerType::VarBinary,
    SqlServerType::VarChar,
    SqlServerType::Xml,
];

impl NativeType for SqlServerType {
    const ENGINE: &'static str = DRIVER_ID;

    fn variants() -> &'static [Self] {
        SQLSERVER_TYPES
    }

    fn descriptors() -> Vec<TypeDescriptor<Self>> {
        use SqlServerType::*;
        vec![
            TypeDescriptor::new(BigInt, DbType::Int64, HostType::I64).names(&["bigint"]),
            TypeDescriptor::new(Binary, DbType::Binary, HostType::Bytes).names(&["binary"]),
            TypeDescriptor::new(Bit, DbType::Boolean, HostType::Bool).names(&["bit"]),
            TypeDescriptor::new(Char, DbType::AnsiStringFixedLength, HostType::String)
                .names(&["char", "character"]),
            TypeDescriptor::new(Date, DbType::Date, HostType::Date).names(&["date"]),
            TypeDescriptor::new(DateTime, DbType::DateTime, HostType::DateTime)
                .names(&["datetime"]),
            TypeDescriptor::new(DateTime2, DbType::DateTime2, HostType::DateTime)
                .names(&["datetime2"]),
            TypeDescriptor::new(DateTimeOffset, DbType::DateTimeOffset, HostType::DateTimeOffset)
                .names(&["datetimeoffset"]),
            TypeDescriptor::new(Decimal, DbType::Decimal, HostType::Decimal)
                .names(&["decimal", "dec"]),
            TypeDescriptor::new(Float, DbType::Double, HostType::F64)
                .names(&["float", "double precision"]),
            TypeDescriptor::new(Geography, DbType::Object, HostType::Bytes).names(&["geography"]),
            TypeDescriptor::new(Geometry, DbType::Object, HostType::Bytes).names(&["geometry"]),
            TypeDescriptor::new(HierarchyId, DbType::Object, HostType::Bytes)
                .names(&["hierarchyid"]),
            TypeDescriptor::new(Image, DbType::Binary, HostType::Bytes).names(&["image"]),
            TypeDescriptor::new(Int, DbType::Int32, HostType::I32).names(&["int", "integer"]),
            TypeDescriptor::new(Money, DbType::Currency, HostType::Decimal).names(&["money"]),
            TypeDescriptor::new(NChar, DbType::StringFixedLength, HostType::String)
                .names(&["nchar", "national character", "national char"]),
            TypeDescriptor::new(NText, DbType::String, HostType::String)
                .names(&["ntext", "national text"]),
            TypeDescriptor::new(Numeric, DbType::Decimal, HostType::Decimal)
                .names(&["numeric"])
                .alias_for(Decimal),
            TypeDescriptor::new(NVarChar, DbType::String, HostType::String).names(&[
                "nvarchar",
                "national character varying",
                "national char varying",
            ]),
            TypeDescriptor::new(Real, DbType::Single, HostType::F32).names(&["real"]),
            TypeDescriptor::new(RowVersion, DbType::Binary, HostType::Bytes)
                .names(&["rowversion"]),
            TypeDescriptor::new(SmallDateTime, DbType::DateTime, HostType::DateTime)
                .names(&["smalldatetime"]),
            TypeDescriptor::new(SmallInt, DbType::Int16, HostType::I16).names(&["smallint"]),
            TypeDescriptor::new(SmallMoney, DbType::Currency, HostType::Decimal)
                .names(&["smallmoney"]),
            TypeDescriptor::new(SqlVariant, DbType::Object, HostType::Object)
                .names(&["sql_variant"]),
            TypeDescriptor::new(SysName, DbType::String, HostType::String)
                .names(&["sysname"])
                .alias_for(NVarChar),
            TypeDescriptor::new(Text, DbType::AnsiString, HostType::String).names(&["text"]),
            TypeDescriptor::new(Time, DbType::Time, HostType::Time).names(&["time"]),
            TypeDescriptor::new(Timestamp, DbType::Binary, HostType::Bytes)
                .names(&["timestamp"])
                .alias_for(RowVersion),
            TypeDescriptor::new(TinyInt, DbType::Byte, HostType::U8).names(&["tinyint"]),
            TypeDescriptor::new(UniqueIdentifier, DbType::Guid, HostType::Uuid)
                .names(&["uniqueidentifier"]),
            TypeDescriptor::new(VarBinary, DbType::Binary, HostType::Bytes)
                .names(&["varbinary", "binary varying"]),
            TypeDescriptor::new(VarChar, DbType::AnsiString, HostType::String)
                .names(&["varchar", "character varying", "char varying"]),
            TypeDescriptor::new(Xml, DbType::Xml, HostType::String).names(&["xml"]),
        ]
    }

    fn item_name(self) -> &'static str {
        match self {
            SqlServerType::BigInt => "BigInt",
            SqlServerType::Binary => "Binary",
            SqlServerType::Bit => "Bit",
            SqlServerType::Char => "Char",
            SqlServerType::Date => "Date",
            SqlServerType::DateTime => "DateTime",
            SqlServerType::DateTime2 => "DateTime2",
            SqlServerType::DateTimeOffset => "DateTimeOffset",
            SqlServerType::Decimal => "Decimal",
            SqlServerType::Float => "Float",
            SqlServerType::Geography => "Geography",
            SqlServerType::Geometry => "Geometry",
            SqlServerType::HierarchyId => "HierarchyId",
            SqlServerType::Image => "Image",
            SqlServerType::Int => "Int",
            SqlServerType::Money => "Money",
            SqlServerType::NChar => "NChar",
            SqlServerType::NText => "NText",
            SqlServerType::Numeric => "Numeric",
            SqlServerType::NVarChar => "NVarChar",
            SqlServerType::Real => "Real",
            SqlServerType::RowVersion => "RowVersion",
            SqlServerType::SmallDateTime => "SmallDateTime",
            SqlServerType::SmallInt => "SmallInt",
            SqlServerType::SmallMoney => "SmallMoney",
            SqlServerType::SqlVariant => "SqlVariant",
            SqlServerType::SysName => "SysName",
            SqlServerType::Text => "Text",
            SqlServerType::Time => "Time",
            SqlServerType::Timestamp => "Timestamp",
            SqlServerType::TinyInt => "TinyInt",
            SqlServerType::UniqueIdentifier => "UniqueIdentifier",
            SqlServerType::VarBinary => "VarBinary",
            SqlServerType::VarChar => "VarChar",
            SqlServerType::Xml => "Xml",
        }
    }

    fn native_value(self) -> i32 {
        self as i32
    }
}

const RESERVED_WORDS: &[&str] = &[
    "ADD", "ALL", "ALTER", "AND", "ANY", "AS", "ASC", "AUTHORIZATION", "BACKUP", "BEGIN",
    "BETWEEN", "BREAK", "BROWSE", "BULK", "BY", "CASCADE", "CASE", "CHECK", "CHECKPOINT", "CLOSE",
    "CLUSTERED", "COALESCE", "COLLATE", "COLUMN", "COMMIT", "COMPUTE", "CONSTRAINT", "CONTAINS",
    "CONTAINSTABLE", "CONTINUE", "CONVERT", "CREATE", "CROSS", "CURRENT", "CURRENT_DATE",
    "CURRENT_TIME", "CURRENT_TIMESTAMP", "CURRENT_USER", "CURSOR", "DATABASE", "DBCC",
    "DEALLOCATE", "DECLARE", "DEFAULT", "DELETE", "DENY", "DESC", "DISK", "DISTINCT",
    "DISTRIBUTED", "DOUBLE", "DROP", "DUMP", "ELSE", "END", "ERRLVL", "ESCAPE", "EXCEPT", "EXEC",
    "EXECUTE", "EXISTS", "EXIT", "EXTERNAL", "FETCH", "FILE", "FILLFACTOR", "FOR", "FOREIGN",
    "FREETEXT", "FREETEXTTABLE", "FROM", "FULL", "FUNCTION", "GOTO", "GRANT", "GROUP", "HAVING",
    "HOLDLOCK", "IDENTITY", "IDENTITY_INSERT", "IDENTITYCOL", "IF", "IN", "INDEX", "INNER",
    "INSERT", "INTERSECT", "INTO", "IS", "JOIN", "KEY", "KILL", "LEFT", "LIKE", "LINENO", "LOAD",
    "MERGE", "NATIONAL", "NOCHECK", "NONCLUSTERED", "NOT", "NULL", "NULLIF", "OF", "OFF",
    "OFFSETS", "ON", "OPEN", "OPENDATASOURCE", "OPENQUERY", "OPENROWSET", "OPENXML", "OPTION",
    "OR", "ORDER", "OUTER", "OVER", "PERCENT", "PIVOT", "PLAN", "PRECISION", "PRIMARY", "PRINT",
    "PROC", "PROCEDURE", "PUBLIC", "RAISERROR", "READ", "READTEXT", "RECONFIGURE", "REFERENCES",
    "REPLICATION", "RESTORE", "RESTRICT", "RETURN", "REVERT", "REVOKE", "RIGHT", "ROLLBACK",
    "ROWCOUNT", "ROWGUIDCOL", "RULE", "SAVE", "SCHEMA", "SECURITYAUDIT", "SELECT",
    "SEMANTICKEYPHRASETABLE", "SEMANTICSIMILARITYDETAILSTABLE", "SEMANTICSIMILARITYTABLE",
    "SESSION_USER", "SET", "SETUSER", "SHUTDOWN", "SOME", "STATISTICS", "SYSTEM_USER", "TABLE",
    "TABLESAMPLE", "TEXTSIZE", "THEN", "TO", "TOP", "TRAN", "TRANSACTION", "TRIGGER", "TRUNCATE",
    "TRY_CONVERT", "TSEQUAL", "UNION", "UNIQUE", "UNPIVOT", "UPDATE", "UPDATETEXT", "USE", "USER",
    "VALUES", "VARYING", "VIEW", "WAITFOR", "WHEN", "WHERE", "WHILE", "WITH", "WITHIN",
    "WRITETEXT",
];

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '@' | '#' | '$')
}

#[derive(Debug)]
pub struct SqlServerDialect {
    escaper: Escaper,
}

impl SqlServerDialect {
    pub fn new() -> Self {
        Self {
            escaper: Escaper::new('[', ']', is_identifier_char)
                .with_reserved_words(RESERVED_WORDS.iter().copied()),
        }
    }

    /// `[db]` prefix for catalog views of `database`.
    fn catalog(&self, database: &DatabaseSchemaDatabase) -> String {
        self.escaper.escape_path([database.name()])
    }

    /// Appends `schema = @p0 AND table = @p1` filters for a narrowed query.
    fn table_filter(
        &self,
        query: &mut String,
        table: Option<&DatabaseSchemaTable>,
        schema_column: &str,
        table_column: &str,
    ) -> Vec<SqlParameter> {
        let mut parameters = Vec::new();
        if let Some(table) = table {
            if let Some(schema) = table.schema().name() {
                query.push_str(&format!(
                    " AND {schema_column} = {}",
                    self.parameter_placeholder(parameters.len())
                ));
                parameters.push(SqlParameter::text(schema));
            }
            query.push_str(&format!(
                " AND {table_column} = {}",
                self.parameter_placeholder(parameters.len())
            ));
            parameters.push(SqlParameter::text(table.name()));
        }
        parameters
    }
}

impl Default for SqlServerDialect {
    fn default() -> Self {
        Self::new()
    }
}

/// Defaults come back as stored expressions: `((0))`, `(N'x')`, `(NULL)`.
fn normalize_default(raw: String) -> Option<String> {
    let stripped = convert::strip_parens(&raw);
    if stripped.is_empty() || stripped.eq_ignore_ascii_case("null") {
        None
    } else {
        Some(stripped.to_string())
    }
}

fn with_parameters(sql: String, parameters: &[SqlParameter]) -> CatalogQuery {
    parameters
        .iter()
        .cloned()
        .fold(CatalogQuery::new(sql), CatalogQuery::bind)
}

impl TypeCatalogProvider for SqlServerDialect {
    fn types(&self) -> EngineResult<Arc<DatabaseTypes>> {
        TypeCatalogCache::global().get_or_build::<SqlServerType>()
    }
}

impl SchemaIntrospector for SqlServerDialect {
    fn current_database_queries(&self) -> Vec<CatalogQuery> {
        vec![
            CatalogQuery::new("SELECT DB_NAME()"),
            CatalogQuery::new("SELECT ORIGINAL_DB_NAME()"),
        ]
    }

    fn current_schema_queries(&self) -> Vec<CatalogQuery> {
        vec![CatalogQuery::new("SELECT SCHEMA_NAME()")]
    }

    fn database_queries(&self) -> Vec<CatalogQuery> {
        vec![
            CatalogQuery::new(
                "SELECT name AS DATABASE_NAME FROM sys.databases WHERE state = 0 ORDER BY name",
            ),
            CatalogQuery::new(
                "SELECT DISTINCT CATALOG_NAME AS DATABASE_NAME FROM INFORMATION_SCHEMA.SCHEMATA",
            ),
            CatalogQuery::new("SELECT DB_NAME() AS DATABASE_NAME"),
        ]
    }

    fn schema_queries(&self, database: &DatabaseSchemaDatabase) -> Vec<CatalogQuery> {
        let catalog = self.catalog(database);
        vec![
            CatalogQuery::new(format!(
                "SELECT name AS SCHEMA_NAME FROM {catalog}.sys.schemas ORDER BY name"
            )),
            CatalogQuery::new(format!(
                "SELECT SCHEMA_NAME FROM {catalog}.INFORMATION_SCHEMA.SCHEMATA ORDER BY SCHEMA_NAME"
            )),
        ]
    }

    fn table_queries(&self, database: &DatabaseSchemaDatabase) -> Vec<CatalogQuery> {
        let catalog = self.catalog(database);
        vec![
            CatalogQuery::new(format!(
                "SELECT s.name AS SCHEMA_NAME, t.name AS TABLE_NAME \
                 FROM {catalog}.sys.tables t \
                 JOIN {catalog}.sys.schemas s ON s.schema_id = t.schema_id \
                 ORDER BY s.name, t.name"
            )),
            CatalogQuery::new(format!(
                "SELECT TABLE_SCHEMA AS SCHEMA_NAME, TABLE_NAME \
                 FROM {catalog}.INFORMATION_SCHEMA.TABLES \
                 WHERE TABLE_TYPE = 'BASE TABLE' ORDER BY TABLE_SCHEMA, TABLE_NAME"
            )),
        ]
    }

    fn column_queries(
        &self,
        database: &DatabaseSchemaDatabase,
        table: Option<&DatabaseSchemaTable>,
    ) -> Vec<CatalogQuery> {
        let catalog = self.catalog(database);

        let mut sys = format!(
            "SELECT s.name AS SCHEMA_NAME, t.name AS TABLE_NAME, c.name AS COLUMN_NAME, \
             ty.name AS DATA_TYPE, c.is_nullable AS NULLABLE, c.column_id AS ORDINAL, \
             c.max_length AS LENGTH, c.precision AS PRECISION, c.scale AS SCALE, \
             dc.definition AS DEFAULT_VALUE \
             FROM {catalog}.sys.columns c \
             JOIN {catalog}.sys.tables t ON t.object_id = c.object_id \
             JOIN {catalog}.sys.schemas s ON s.schema_id = t.schema_id \
             JOIN {catalog}.sys.types ty ON ty.user_type_id = c.user_type_id \
             LEFT JOIN {catalog}.sys.default_constraints dc ON dc.object_id = c.default_object_id \
             WHERE 1 = 1"
        );
        let sys_parameters = self.table_filter(&mut sys, table, "s.name", "t.name");
        sys.push_str(" ORDER BY s.name, t.name, c.column_id");

        let mut information = format!(
            "SELECT TABLE_SCHEMA AS SCHEMA_NAME, TABLE_NAME, COLUMN_NAME, DATA_TYPE, \
             IS_NULLABLE AS NULLABLE, ORDINAL_POSITION AS ORDINAL, \
             CHARACTER_MAXIMUM_LENGTH AS LENGTH, NUMERIC_PRECISION AS PRECISION, \
             NUMERIC_SCALE AS SCALE, COLUMN_DEFAULT AS DEFAULT_VALUE \
             FROM {catalog}.INFORMATION_SCHEMA.COLUMNS WHERE 1 = 1"
        );
        let information_parameters =
            self.table_filter(&mut information, table, "TABLE_SCHEMA", "TABLE_NAME");
        information.push_str(" ORDER BY TABLE_SCHEMA, TABLE_NAME, ORDINAL_POSITION");

        vec![
            with_parameters(sys, &sys_parameters),
            with_parameters(information, &information_parameters),
        ]
    }

    fn to_database(&self, row: &DataRow<'_>) -> EngineResult<DatabaseSchemaDatabase> {
        convert::database(row)
    }

    fn to_schema(
        &self,
        database: &DatabaseSchemaDatabase,
        row: &DataRow<'_>,
    ) -> EngineResult<DatabaseSchemaSchema> {
        convert::schema(database, row)
    }

    fn to_table(
        &self,
        database: &DatabaseSchemaDatabase,
        row: &DataRow<'_>,
    ) -> EngineResult<DatabaseSchemaTable> {
        convert::table(database, row)
    }

    fn to_column(
        &self,
        database: &DatabaseSchemaDatabase,
        types: &DatabaseTypes,
        row: &DataRow<'_>,
    ) -> EngineResult<DatabaseSchemaColumn> {
        let table = convert::table(database, row)?;
        convert::column(table, types, row, normalize_default)
    }
}

impl Dialect for SqlServerDialect {
    fn driver_id(&self) -> &'static str {
        DRIVER_ID
    }

    fn driver_name(&self) -> &'static str {
        "Microsoft SQL Server"
    }

    fn escaper(&self) -> &Escaper {
        &self.escaper
    }

    fn parameter_name(&self, index: usize) -> String {
        format!("@p{index}")
    }

    fn table_path<'a>(&self, table: &'a DatabaseSchemaTable) -> Vec<Option<&'a str>> {
        vec![
            Some(table.database().name()),
            table.schema().name(),
            Some(table.name()),
        ]
    }
}
