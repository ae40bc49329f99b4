// SPDX-License-Identifier: Apache-2.0

//! PostgreSQL dialect
//!
//! A PostgreSQL session only sees the catalogs of the database it is
//! connected to, so schema, table and column queries bind the requested
//! database name and return nothing for any other database.

use std::sync::Arc;

use polysql_core::{
    CatalogQuery, DataRow, DatabaseSchemaColumn, DatabaseSchemaDatabase, DatabaseSchemaSchema,
    DatabaseSchemaTable, DatabaseTypes, DbType, Dialect, EngineResult, Escaper, HostType,
    NativeType, SchemaIntrospector, SqlParameter, TypeCatalogCache, TypeCatalogProvider, TypeDescriptor,
};

use crate::convert;

pub const DRIVER_ID: &str = "postgres";

/// Native PostgreSQL types. Values are the built-in type OIDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PostgresType {
    Array = 2277,
    BigInt = 20,
    BigSerial = -20,
    Bit = 1560,
    BitVarying = 1562,
    Boolean = 16,
    Box = 603,
    Bytea = 17,
    Char = 1042,
    Cidr = 650,
    Circle = 718,
    Date = 1082,
    DoublePrecision = 701,
    Inet = 869,
    Integer = 23,
    Interval = 1186,
    Json = 114,
    Jsonb = 3802,
    Line = 628,
    Lseg = 601,
    MacAddr = 829,
    Money = 790,
    Name = 19,
    Numeric = 1700,
    Oid = 26,
    Path = 602,
    Point = 600,
    Polygon = 604,
    Real = 700,
    Serial = -23,
    SmallInt = 21,
    SmallSerial = -21,
    Text = 25,
    Time = 1083,
    TimeTz = 1266,
    Timestamp = 1114,
    TimestampTz = 1184,
    TsQuery = 3615,
    TsVector = 3614,
    Uuid = 2950,
    VarChar = 1043,
    Xml = 142,
}

const POSTGRES_TYPES: &[PostgresType] = &[
    PostgresType::Array,
    PostgresType::BigInt,
    PostgresType::BigSerial,
    PostgresType::Bit,
    PostgresType::BitVarying,
    PostgresType::Boolean,
    PostgresType::Box,
    PostgresType::Bytea,
    PostgresType::Char,
    PostgresType::Cidr,
    PostgresType::Circle,
    PostgresType::Date,
    PostgresType::DoublePrecision,
    PostgresType::Inet,
    PostgresType::Integer,
    PostgresType::Interval,
    PostgresType::Json,
    PostgresType::Jsonb,
    PostgresType::Line,
    PostgresType::Lseg,
    PostgresType::MacAddr,
    PostgresType::Money,
    PostgresType::Name,
    PostgresType::Numeric,
    PostgresType::Oid,
    PostgresType::Path,
    PostgresType::Point,
    PostgresType::Polygon,
    PostgresType::Real,
    PostgresType::Serial,
    PostgresType::SmallInt,
    PostgresType::SmallSerial,
    PostgresType::Text,
    PostgresType::Time,
    PostgresType::TimeTz,
    PostgresType::Timestamp,
    PostgresType::TimestampTz,
    PostgresType::TsQuery,
    PostgresType::TsVector,
    PostgresType::Uuid,
    PostgresType::VarChar,
    PostgresType::Xml,
];

impl NativeType for PostgresType {
    const ENGINE: &'static str = DRIVER_ID;

    fn variants() -> &'static [Self] {
        POSTGRES_TYPES
    }

    fn descriptors() -> Vec<TypeDescriptor<Self>> {
        use PostgresType::*;
        vec![
            TypeDescriptor::new(Array, DbType::Object, HostType::Json).names(&["ARRAY"]),
            TypeDescriptor::new(BigInt, DbType::Int64, HostType::I64).names(&["bigint", "int8"]),
            TypeDescriptor::new(BigSerial, DbType::Int64, HostType::I64)
                .names(&["bigserial", "serial8"])
                .alias_for(BigInt),
            TypeDescriptor::new(Bit, DbType::Binary, HostType::Bytes).names(&["bit"]),
            TypeDescriptor::new(BitVarying, DbType::Binary, HostType::Bytes)
                .names(&["bit varying", "varbit"]),
            TypeDescriptor::new(Boolean, DbType::Boolean, HostType::Bool)
                .names(&["boolean", "bool"]),
            TypeDescriptor::new(Box, DbType::Object, HostType::String).names(&["box"]),
            TypeDescriptor::new(Bytea, DbType::Binary, HostType::Bytes).names(&["bytea"]),
            TypeDescriptor::new(Char, DbType::StringFixedLength, HostType::String)
                .names(&["character", "char", "bpchar"]),
            TypeDescriptor::new(Cidr, DbType::AnsiString, HostType::String).names(&["cidr"]),
            TypeDescriptor::new(Circle, DbType::Object, HostType::String).names(&["circle"]),
            TypeDescriptor::new(Date, DbType::Date, HostType::Date).names(&["date"]),
            TypeDescriptor::new(DoublePrecision, DbType::Double, HostType::F64)
                .names(&["double precision", "float8", "float"]),
            TypeDescriptor::new(Inet, DbType::AnsiString, HostType::String).names(&["inet"]),
            TypeDescriptor::new(Integer, DbType::Int32, HostType::I32)
                .names(&["integer", "int", "int4"]),
            TypeDescriptor::new(Interval, DbType::Object, HostType::Duration)
                .names(&["interval"]),
            TypeDescriptor::new(Json, DbType::Json, HostType::Json).names(&["json"]),
            TypeDescriptor::new(Jsonb, DbType::Json, HostType::Json).names(&["jsonb"]),
            TypeDescriptor::new(Line, DbType::Object, HostType::String).names(&["line"]),
            TypeDescriptor::new(Lseg, DbType::Object, HostType::String).names(&["lseg"]),
            TypeDescriptor::new(MacAddr, DbType::AnsiString, HostType::String)
                .names(&["macaddr"]),
            TypeDescriptor::new(Money, DbType::Currency, HostType::Decimal).names(&["money"]),
            TypeDescriptor::new(Name, DbType::AnsiString, HostType::String).names(&["name"]),
            TypeDescriptor::new(Numeric, DbType::Decimal, HostType::Decimal)
                .names(&["numeric", "decimal"]),
            TypeDescriptor::new(Oid, DbType::UInt32, HostType::U32).names(&["oid"]),
            TypeDescriptor::new(Path, DbType::Object, HostType::String).names(&["path"]),
            TypeDescriptor::new(Point, DbType::Object, HostType::String).names(&["point"]),
            TypeDescriptor::new(Polygon, DbType::Object, HostType::String).names(&["polygon"]),
            TypeDescriptor::new(Real, DbType::Single, HostType::F32).names(&["real", "float4"]),
            TypeDescriptor::new(Serial, DbType::Int32, HostType::I32)
                .names(&["serial", "serial4"])
                .alias_for(Integer),
            TypeDescriptor::new(SmallInt, DbType::Int16, HostType::I16)
                .names(&["smallint", "int2"]),
            TypeDescriptor::new(SmallSerial, DbType::Int16, HostType::I16)
                .names(&["smallserial", "serial2"])
                .alias_for(SmallInt),
            TypeDescriptor::new(Text, DbType::String, HostType::String).names(&["text"]),
            TypeDescriptor::new(Time, DbType::Time, HostType::Time)
                .names(&["time without time zone", "time"]),
            TypeDescriptor::new(TimeTz, DbType::Time, HostType::Time)
                .names(&["time with time zone", "timetz"]),
            TypeDescriptor::new(Timestamp, DbType::DateTime2, HostType::DateTime)
                .names(&["timestamp without time zone", "timestamp"]),
            TypeDescriptor::new(TimestampTz, DbType::DateTimeOffset, HostType::DateTimeOffset)
                .names(&["timestamp with time zone", "timestamptz"]),
            TypeDescriptor::new(TsQuery, DbType::String, HostType::String).names(&["tsquery"]),
            TypeDescriptor::new(TsVector, DbType::String, HostType::String).names(&["tsvector"]),
            TypeDescriptor::new(Uuid, DbType::Guid, HostType::Uuid).names(&["uuid"]),
            TypeDescriptor::new(VarChar, DbType::String, HostType::String)
                .names(&["character varying", "varchar"]),
            TypeDescriptor::new(Xml, DbType::Xml, HostType::String).names(&["xml"]),
        ]
    }

    fn item_name(self) -> &'static str {
        match self {
            PostgresType::Array => "Array",
            PostgresType::BigInt => "BigInt",
            PostgresType::BigSerial => "BigSerial",
            PostgresType::Bit => "Bit",
            PostgresType::BitVarying => "BitVarying",
            PostgresType::Boolean => "Boolean",
            PostgresType::Box => "Box",
            PostgresType::Bytea => "Bytea",
            PostgresType::Char => "Char",
            PostgresType::Cidr => "Cidr",
            PostgresType::Circle => "Circle",
            PostgresType::Date => "Date",
            PostgresType::DoublePrecision => "DoublePrecision",
            PostgresType::Inet => "Inet",
            PostgresType::Integer => "Integer",
            PostgresType::Interval => "Interval",
            PostgresType::Json => "Json",
            PostgresType::Jsonb => "Jsonb",
            PostgresType::Line => "Line",
            PostgresType::Lseg => "Lseg",
            PostgresType::MacAddr => "MacAddr",
            PostgresType::Money => "Money",
            PostgresType::Name => "Name",
            PostgresType::Numeric => "Numeric",
            PostgresType::Oid => "Oid",
            PostgresType::Path => "Path",
            PostgresType::Point => "Point",
            PostgresType::Polygon => "Polygon",
            PostgresType::Real => "Real",
            PostgresType::Serial => "Serial",
            PostgresType::SmallInt => "SmallInt",
            PostgresType::SmallSerial => "SmallSerial",
            PostgresType::Text => "Text",
            PostgresType::Time => "Time",
            PostgresType::TimeTz => "TimeTz",
            PostgresType::Timestamp => "Timestamp",
            PostgresType::TimestampTz => "TimestampTz",
            PostgresType::TsQuery => "TsQuery",
            PostgresType::TsVector => "TsVector",
            PostgresType::Uuid => "Uuid",
            PostgresType::VarChar => "VarChar",
            PostgresType::Xml => "Xml",
        }
    }

    fn native_value(self) -> i32 {
        self as i32
    }
}

const RESERVED_WORDS: &[&str] = &[
    "ALL", "ANALYSE", "ANALYZE", "AND", "ANY", "ARRAY", "AS", "ASC", "ASYMMETRIC",
    "AUTHORIZATION", "BINARY", "BOTH", "CASE", "CAST", "CHECK", "COLLATE", "COLLATION", "COLUMN",
    "CONCURRENTLY", "CONSTRAINT", "CREATE", "CROSS", "CURRENT_CATALOG", "CURRENT_DATE",
    "CURRENT_ROLE", "CURRENT_SCHEMA", "CURRENT_TIME", "CURRENT_TIMESTAMP", "CURRENT_USER",
    "DEFAULT", "DEFERRABLE", "DESC", "DISTINCT", "DO", "ELSE", "END", "EXCEPT", "FALSE", "FETCH",
    "FOR", "FOREIGN", "FREEZE", "FROM", "FULL", "GRANT", "GROUP", "HAVING", "ILIKE", "IN",
    "INITIALLY", "INNER", "INTERSECT", "INTO", "IS", "ISNULL", "JOIN", "LATERAL", "LEADING",
    "LEFT", "LIKE", "LIMIT", "LOCALTIME", "LOCALTIMESTAMP", "NATURAL", "NOT", "NOTNULL", "NULL",
    "OFFSET", "ON", "ONLY", "OR", "ORDER", "OUTER", "OVERLAPS", "PLACING", "PRIMARY",
    "REFERENCES", "RETURNING", "RIGHT", "SELECT", "SESSION_USER", "SIMILAR", "SOME", "SYMMETRIC",
    "SYSTEM_USER", "TABLE", "TABLESAMPLE", "THEN", "TO", "TRAILING", "TRUE", "UNION", "UNIQUE",
    "USER", "USING", "VARIADIC", "VERBOSE", "WHEN", "WHERE", "WINDOW", "WITH",
];

/// Unquoted identifiers fold to lower case, so upper case letters need quotes.
fn is_identifier_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '$')
}

const SYSTEM_SCHEMAS: &str = "('pg_catalog', 'information_schema')";

#[derive(Debug)]
pub struct PostgresDialect {
    escaper: Escaper,
}

impl PostgresDialect {
    pub fn new() -> Self {
        Self {
            escaper: Escaper::new('"', '"', is_identifier_char)
                .with_reserved_words(RESERVED_WORDS.iter().copied()),
        }
    }

    /// Query bound to `database` as `$1`, plus an optional schema/table narrowing.
    fn scoped(
        &self,
        sql: String,
        database: &DatabaseSchemaDatabase,
        table: Option<&DatabaseSchemaTable>,
        schema_column: &str,
        table_column: &str,
        order_by: &str,
    ) -> CatalogQuery {
        let mut sql = sql;
        let mut parameters = vec![SqlParameter::text(database.name())];
        if let Some(table) = table {
            if let Some(schema) = table.schema().name() {
                sql.push_str(&format!(
                    " AND {schema_column} = {}",
                    self.parameter_placeholder(parameters.len())
                ));
                parameters.push(SqlParameter::text(schema));
            }
            sql.push_str(&format!(
                " AND {table_column} = {}",
                self.parameter_placeholder(parameters.len())
            ));
            parameters.push(SqlParameter::text(table.name()));
        }
        sql.push_str(" ORDER BY ");
        sql.push_str(order_by);
        parameters
            .into_iter()
            .fold(CatalogQuery::new(sql), CatalogQuery::bind)
    }
}

impl Default for PostgresDialect {
    fn default() -> Self {
        Self::new()
    }
}

/// `NULL::character varying` style defaults mean no default; everything
/// else (`nextval('seq'::regclass)`, `'x'::text`, `now()`) is kept verbatim.
fn normalize_default(raw: String) -> Option<String> {
    let trimmed = raw.trim();
    let head = trimmed.split("::").next().unwrap_or(trimmed).trim();
    if trimmed.is_empty() || head.eq_ignore_ascii_case("null") {
        None
    } else {
        Some(trimmed.to_string())
    }
}

impl TypeCatalogProvider for PostgresDialect {
    fn types(&self) -> EngineResult<Arc<DatabaseTypes>> {
        TypeCatalogCache::global().get_or_build::<PostgresType>()
    }
}

impl SchemaIntrospector for PostgresDialect {
    fn current_database_queries(&self) -> Vec<CatalogQuery> {
        vec![CatalogQuery::new("SELECT current_database()")]
    }

    fn current_schema_queries(&self) -> Vec<CatalogQuery> {
        vec![
            CatalogQuery::new("SELECT current_schema()"),
            CatalogQuery::new("SELECT (current_schemas(false))[1]"),
        ]
    }

    fn database_queries(&self) -> Vec<CatalogQuery> {
        vec![
            CatalogQuery::new(
                "SELECT datname::text AS DATABASE_NAME FROM pg_catalog.pg_database \
                 WHERE NOT datistemplate AND datallowconn ORDER BY datname",
            ),
            CatalogQuery::new(
                "SELECT catalog_name::text AS DATABASE_NAME \
                 FROM information_schema.information_schema_catalog_name",
            ),
            CatalogQuery::new("SELECT current_database() AS DATABASE_NAME"),
        ]
    }

    fn schema_queries(&self, database: &DatabaseSchemaDatabase) -> Vec<CatalogQuery> {
        vec![
            self.scoped(
                format!(
                    "SELECT nspname::text AS SCHEMA_NAME FROM pg_catalog.pg_namespace \
                     WHERE current_database() = $1 AND nspname NOT IN {SYSTEM_SCHEMAS} \
                     AND nspname NOT LIKE 'pg\\_%'"
                ),
                database,
                None,
                "",
                "",
                "nspname",
            ),
            self.scoped(
                format!(
                    "SELECT schema_name::text AS SCHEMA_NAME FROM information_schema.schemata \
                     WHERE catalog_name = $1 AND schema_name NOT IN {SYSTEM_SCHEMAS} \
                     AND schema_name NOT LIKE 'pg\\_%'"
                ),
                database,
                None,
                "",
                "",
                "schema_name",
            ),
        ]
    }

    fn table_queries(&self, database: &DatabaseSchemaDatabase) -> Vec<CatalogQuery> {
        vec![
            self.scoped(
                format!(
                    "SELECT n.nspname::text AS SCHEMA_NAME, c.relname::text AS TABLE_NAME \
                     FROM pg_catalog.pg_class c \
                     JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace \
                     WHERE current_database() = $1 AND c.relkind IN ('r', 'p') \
                     AND n.nspname NOT IN {SYSTEM_SCHEMAS} AND n.nspname NOT LIKE 'pg\\_%'"
                ),
                database,
                None,
                "",
                "",
                "n.nspname, c.relname",
            ),
            self.scoped(
                format!(
                    "SELECT table_schema::text AS SCHEMA_NAME, table_name::text AS TABLE_NAME \
                     FROM information_schema.tables \
                     WHERE table_catalog = $1 AND table_type = 'BASE TABLE' \
                     AND table_schema NOT IN {SYSTEM_SCHEMAS}"
                ),
                database,
                None,
                "",
                "",
                "table_schema, table_name",
            ),
        ]
    }

    fn column_queries(
        &self,
        database: &DatabaseSchemaDatabase,
        table: Option<&DatabaseSchemaTable>,
    ) -> Vec<CatalogQuery> {
        vec![
            self.scoped(
                format!(
                    "SELECT n.nspname::text AS SCHEMA_NAME, c.relname::text AS TABLE_NAME, \
                     a.attname::text AS COLUMN_NAME, \
                     pg_catalog.format_type(a.atttypid, a.atttypmod) AS DATA_TYPE, \
                     NOT a.attnotnull AS NULLABLE, a.attnum::int8 AS ORDINAL, \
                     CASE WHEN t.typname IN ('varchar', 'bpchar') AND a.atttypmod > 4 \
                          THEN (a.atttypmod - 4)::int8 END AS LENGTH, \
                     CASE WHEN t.typname = 'numeric' AND a.atttypmod > 4 \
                          THEN (((a.atttypmod - 4) >> 16) & 65535)::int8 END AS PRECISION, \
                     CASE WHEN t.typname = 'numeric' AND a.atttypmod > 4 \
                          THEN ((a.atttypmod - 4) & 65535)::int8 END AS SCALE, \
                     pg_catalog.pg_get_expr(d.adbin, d.adrelid) AS DEFAULT_VALUE \
                     FROM pg_catalog.pg_attribute a \
                     JOIN pg_catalog.pg_class c ON c.oid = a.attrelid \
                     JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace \
                     JOIN pg_catalog.pg_type t ON t.oid = a.atttypid \
                     LEFT JOIN pg_catalog.pg_attrdef d \
                          ON d.adrelid = a.attrelid AND d.adnum = a.attnum \
                     WHERE current_database() = $1 AND a.attnum > 0 AND NOT a.attisdropped \
                     AND c.relkind IN ('r', 'p') AND n.nspname NOT IN {SYSTEM_SCHEMAS}"
                ),
                database,
                table,
                "n.nspname",
                "c.relname",
                "n.nspname, c.relname, a.attnum",
            ),
            self.scoped(
                format!(
                    "SELECT table_schema::text AS SCHEMA_NAME, table_name::text AS TABLE_NAME, \
                     column_name::text AS COLUMN_NAME, data_type::text AS DATA_TYPE, \
                     is_nullable::text AS NULLABLE, ordinal_position::int8 AS ORDINAL, \
                     character_maximum_length::int8 AS LENGTH, \
                     numeric_precision::int8 AS PRECISION, numeric_scale::int8 AS SCALE, \
                     column_default::text AS DEFAULT_VALUE \
                     FROM information_schema.columns \
                     WHERE table_catalog = $1 AND table_schema NOT IN {SYSTEM_SCHEMAS}"
                ),
                database,
                table,
                "table_schema",
                "table_name",
                "table_schema, table_name, ordinal_position",
            ),
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

impl Dialect for PostgresDialect {
    fn driver_id(&self) -> &'static str {
        DRIVER_ID
    }

    fn driver_name(&self) -> &'static str {
        "PostgreSQL"
    }

    fn escaper(&self) -> &Escaper {
        &self.escaper
    }

    /// Positional: `$1` for the first parameter.
    fn parameter_name(&self, index: usize) -> String {
        format!("${}", index + 1)
    }
}
