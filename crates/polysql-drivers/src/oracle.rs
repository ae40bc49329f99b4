// SPDX-License-Identifier: Apache-2.0

//! Oracle dialect
//!
//! Catalog queries walk the `DBA_*` views first and fall back to `ALL_*` and
//! `USER_*` when the session lacks the privileges. An Oracle instance is a
//! single database, so database-level queries ignore the database argument.

use std::sync::Arc;

use polysql_core::{
    CatalogQuery, DataRow, DatabaseSchemaColumn, DatabaseSchemaDatabase, DatabaseSchemaSchema,
    DatabaseSchemaTable, DatabaseTypes, DbType, Dialect, EngineResult, Escaper, HostType,
    NativeType, SchemaIntrospector, SqlParameter, TypeCatalogCache, TypeCatalogProvider, TypeDescriptor,
};

use crate::convert;

pub const DRIVER_ID: &str = "oracle";

/// Native Oracle column types, including the ANSI names Oracle accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OracleType {
    BFile = 1,
    BinaryDouble = 2,
    BinaryFloat = 3,
    Blob = 4,
    Char = 5,
    Clob = 6,
    Date = 7,
    Float = 8,
    IntervalDayToSecond = 9,
    IntervalYearToMonth = 10,
    Long = 11,
    LongRaw = 12,
    NChar = 13,
    NClob = 14,
    Number = 15,
    NVarchar2 = 16,
    Raw = 17,
    RowId = 18,
    Timestamp = 19,
    TimestampWithTimeZone = 20,
    TimestampWithLocalTimeZone = 21,
    URowId = 22,
    Varchar2 = 23,
    XmlType = 24,
    Varchar = 25,
    Integer = 26,
    SmallInt = 27,
    Decimal = 28,
    Numeric = 29,
    Real = 30,
    DoublePrecision = 31,
}

const ORACLE_TYPES: &[OracleType] = &[
    OracleType::BFile,
    OracleType::BinaryDouble,
    OracleType::BinaryFloat,
    OracleType::Blob,
    OracleType::Char,
    OracleType::Clob,
    OracleType::Date,
    OracleType::Float,
    OracleType::IntervalDayToSecond,
    OracleType::IntervalYearToMonth,
    OracleType::Long,
    OracleType::LongRaw,
    OracleType::NChar,
    OracleType::NClob,
    OracleType::Number,
    OracleType::NVarchar2,
    OracleType::Raw,
    OracleType::RowId,
    OracleType::Timestamp,
    OracleType::TimestampWithTimeZone,
    OracleType::TimestampWithLocalTimeZone,
    OracleType::URowId,
    OracleType::Varchar2,
    OracleType::XmlType,
    OracleType::Varchar,
    OracleType::Integer,
    OracleType::SmallInt,
    OracleType::Decimal,
    OracleType::Numeric,
    OracleType::Real,
    OracleType::DoublePrecision,
];

impl NativeType for OracleType {
    const ENGINE: &'static str = DRIVER_ID;

    fn variants() -> &'static [Self] {
        ORACLE_TYPES
    }

    fn descriptors() -> Vec<TypeDescriptor<Self>> {
        use OracleType::*;
        vec![
            TypeDescriptor::new(BFile, DbType::Binary, HostType::Bytes).names(&["BFILE"]),
            TypeDescriptor::new(BinaryDouble, DbType::Double, HostType::F64)
                .names(&["BINARY_DOUBLE"]),
            TypeDescriptor::new(BinaryFloat, DbType::Single, HostType::F32)
                .names(&["BINARY_FLOAT"]),
            TypeDescriptor::new(Blob, DbType::Binary, HostType::Bytes).names(&["BLOB"]),
            TypeDescriptor::new(Char, DbType::AnsiStringFixedLength, HostType::String)
                .names(&["CHAR", "CHARACTER"]),
            TypeDescriptor::new(Clob, DbType::AnsiString, HostType::String).names(&["CLOB"]),
            TypeDescriptor::new(Date, DbType::DateTime, HostType::DateTime).names(&["DATE"]),
            TypeDescriptor::new(Float, DbType::Double, HostType::F64).names(&["FLOAT"]),
            TypeDescriptor::new(IntervalDayToSecond, DbType::Object, HostType::Duration)
                .names(&["INTERVAL DAY TO SECOND"]),
            TypeDescriptor::new(IntervalYearToMonth, DbType::Object, HostType::String)
                .names(&["INTERVAL YEAR TO MONTH"]),
            TypeDescriptor::new(Long, DbType::AnsiString, HostType::String).names(&["LONG"]),
            TypeDescriptor::new(LongRaw, DbType::Binary, HostType::Bytes).names(&["LONG RAW"]),
            TypeDescriptor::new(NChar, DbType::StringFixedLength, HostType::String)
                .names(&["NCHAR", "NATIONAL CHARACTER", "NATIONAL CHAR"]),
            TypeDescriptor::new(NClob, DbType::String, HostType::String).names(&["NCLOB"]),
            TypeDescriptor::new(Number, DbType::Decimal, HostType::Decimal).names(&["NUMBER"]),
            TypeDescriptor::new(NVarchar2, DbType::String, HostType::String).names(&[
                "NVARCHAR2",
                "NCHAR VARYING",
                "NATIONAL CHARACTER VARYING",
                "NATIONAL CHAR VARYING",
            ]),
            TypeDescriptor::new(Raw, DbType::Binary, HostType::Bytes).names(&["RAW"]),
            TypeDescriptor::new(RowId, DbType::AnsiString, HostType::String).names(&["ROWID"]),
            TypeDescriptor::new(Timestamp, DbType::DateTime2, HostType::DateTime)
                .names(&["TIMESTAMP"]),
            TypeDescriptor::new(TimestampWithTimeZone, DbType::DateTimeOffset, HostType::DateTimeOffset)
                .names(&["TIMESTAMP WITH TIME ZONE"]),
            TypeDescriptor::new(TimestampWithLocalTimeZone, DbType::DateTime2, HostType::DateTime)
                .names(&["TIMESTAMP WITH LOCAL TIME ZONE"]),
            TypeDescriptor::new(URowId, DbType::AnsiString, HostType::String).names(&["UROWID"]),
            TypeDescriptor::new(Varchar2, DbType::AnsiString, HostType::String)
                .names(&["VARCHAR2"]),
            TypeDescriptor::new(XmlType, DbType::Xml, HostType::String).names(&["XMLTYPE"]),
            TypeDescriptor::new(Varchar, DbType::AnsiString, HostType::String)
                .names(&["VARCHAR", "CHARACTER VARYING", "CHAR VARYING"])
                .alias_for(Varchar2),
            TypeDescriptor::new(Integer, DbType::Decimal, HostType::Decimal)
                .names(&["INTEGER", "INT"])
                .alias_for(Number),
            TypeDescriptor::new(SmallInt, DbType::Decimal, HostType::Decimal)
                .names(&["SMALLINT"])
                .alias_for(Integer),
            TypeDescriptor::new(Decimal, DbType::Decimal, HostType::Decimal)
                .names(&["DECIMAL", "DEC"])
                .alias_for(Number),
            TypeDescriptor::new(Numeric, DbType::Decimal, HostType::Decimal)
                .names(&["NUMERIC"])
                .alias_for(Number),
            TypeDescriptor::new(Real, DbType::Double, HostType::F64)
                .names(&["REAL"])
                .alias_for(Float),
            TypeDescriptor::new(DoublePrecision, DbType::Double, HostType::F64)
                .names(&["DOUBLE PRECISION"])
                .alias_for(Float),
        ]
    }

    fn item_name(self) -> &'static str {
        match self {
            OracleType::BFile => "BFile",
            OracleType::BinaryDouble => "BinaryDouble",
            OracleType::BinaryFloat => "BinaryFloat",
            OracleType::Blob => "Blob",
            OracleType::Char => "Char",
            OracleType::Clob => "Clob",
            OracleType::Date => "Date",
            OracleType::Float => "Float",
            OracleType::IntervalDayToSecond => "IntervalDayToSecond",
            OracleType::IntervalYearToMonth => "IntervalYearToMonth",
            OracleType::Long => "Long",
            OracleType::LongRaw => "LongRaw",
            OracleType::NChar => "NChar",
            OracleType::NClob => "NClob",
            OracleType::Number => "Number",
            OracleType::NVarchar2 => "NVarchar2",
            OracleType::Raw => "Raw",
            OracleType::RowId => "RowId",
            OracleType::Timestamp => "Timestamp",
            OracleType::TimestampWithTimeZone => "TimestampWithTimeZone",
            OracleType::TimestampWithLocalTimeZone => "TimestampWithLocalTimeZone",
            OracleType::URowId => "URowId",
            OracleType::Varchar2 => "Varchar2",
            OracleType::XmlType => "XmlType",
            OracleType::Varchar => "Varchar",
            OracleType::Integer => "Integer",
            OracleType::SmallInt => "SmallInt",
            OracleType::Decimal => "Decimal",
            OracleType::Numeric => "Numeric",
            OracleType::Real => "Real",
            OracleType::DoublePrecision => "DoublePrecision",
        }
    }

    fn native_value(self) -> i32 {
        self as i32
    }
}

const RESERVED_WORDS: &[&str] = &[
    "ACCESS", "ADD", "ALL", "ALTER", "AND", "ANY", "AS", "ASC", "AUDIT", "BETWEEN", "BY", "CHAR",
    "CHECK", "CLUSTER", "COLUMN", "COMMENT", "COMPRESS", "CONNECT", "CREATE", "CURRENT", "DATE",
    "DECIMAL", "DEFAULT", "DELETE", "DESC", "DISTINCT", "DROP", "ELSE", "EXCLUSIVE", "EXISTS",
    "FILE", "FLOAT", "FOR", "FROM", "GRANT", "GROUP", "HAVING", "IDENTIFIED", "IMMEDIATE", "IN",
    "INCREMENT", "INDEX", "INITIAL", "INSERT", "INTEGER", "INTERSECT", "INTO", "IS", "LEVEL",
    "LIKE", "LOCK", "LONG", "MAXEXTENTS", "MINUS", "MLSLABEL", "MODE", "MODIFY", "NOAUDIT",
    "NOCOMPRESS", "NOT", "NOWAIT", "NULL", "NUMBER", "OF", "OFFLINE", "ON", "ONLINE", "OPTION",
    "OR", "ORDER", "PCTFREE", "PRIOR", "PUBLIC", "RAW", "RENAME", "RESOURCE", "REVOKE", "ROW",
    "ROWID", "ROWNUM", "ROWS", "SELECT", "SESSION", "SET", "SHARE", "SIZE", "SMALLINT", "START",
    "SUCCESSFUL", "SYNONYM", "SYSDATE", "TABLE", "THEN", "TO", "TRIGGER", "UID", "UNION",
    "UNIQUE", "UPDATE", "USER", "VALIDATE", "VALUES", "VARCHAR", "VARCHAR2", "VIEW", "WHENEVER",
    "WHERE", "WITH",
];

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '#')
}

/// Column projection shared by the three `*_TAB_COLUMNS` views.
const COLUMN_PROJECTION: &str = "COLUMN_NAME, DATA_TYPE, NULLABLE, \
     COLUMN_ID AS ORDINAL, DATA_LENGTH AS LENGTH, DATA_PRECISION AS PRECISION, \
     DATA_SCALE AS SCALE, DATA_DEFAULT AS DEFAULT_VALUE";

#[derive(Debug)]
pub struct OracleDialect {
    escaper: Escaper,
}

impl OracleDialect {
    pub fn new() -> Self {
        Self {
            escaper: Escaper::new('"', '"', is_identifier_char)
                .with_reserved_words(RESERVED_WORDS.iter().copied()),
        }
    }

    fn column_candidates(&self, table: Option<&DatabaseSchemaTable>) -> Vec<CatalogQuery> {
        let owner = table.and_then(|t| t.schema().name());
        let mut filter = String::new();
        let mut parameters = Vec::new();
        if let Some(table) = table {
            if let Some(owner) = owner {
                filter.push_str(&format!(" AND OWNER = {}", self.parameter_placeholder(0)));
                parameters.push(SqlParameter::text(owner));
            }
            filter.push_str(&format!(
                " AND TABLE_NAME = {}",
                self.parameter_placeholder(parameters.len())
            ));
            parameters.push(SqlParameter::text(table.name()));
        }

        let dictionary = |view: &str, owner_expr: &str| {
            let mut query = CatalogQuery::new(format!(
                "SELECT {owner_expr} AS SCHEMA_NAME, TABLE_NAME, {COLUMN_PROJECTION} \
                 FROM {view} WHERE 1 = 1{filter} ORDER BY TABLE_NAME, COLUMN_ID"
            ));
            for parameter in &parameters {
                query = query.bind(parameter.clone());
            }
            query
        };

        let mut candidates = vec![
            dictionary("DBA_TAB_COLUMNS", "OWNER"),
            dictionary("ALL_TAB_COLUMNS", "OWNER"),
        ];
        // USER_TAB_COLUMNS has no OWNER column; it only covers the session's own schema.
        candidates.push(match table {
            None => CatalogQuery::new(format!(
                "SELECT USER AS SCHEMA_NAME, TABLE_NAME, {COLUMN_PROJECTION} \
                 FROM USER_TAB_COLUMNS ORDER BY TABLE_NAME, COLUMN_ID"
            )),
            Some(table) => CatalogQuery::new(format!(
                "SELECT USER AS SCHEMA_NAME, TABLE_NAME, {COLUMN_PROJECTION} \
                 FROM USER_TAB_COLUMNS WHERE TABLE_NAME = {} ORDER BY COLUMN_ID",
                self.parameter_placeholder(0)
            ))
            .bind(SqlParameter::text(table.name())),
        });
        candidates
    }
}

impl Default for OracleDialect {
    fn default() -> Self {
        Self::new()
    }
}

/// `DATA_DEFAULT` holds the default expression as typed; a bare `null`
/// means no default.
fn normalize_default(raw: String) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null") {
        None
    } else {
        Some(trimmed.to_string())
    }
}

impl TypeCatalogProvider for OracleDialect {
    fn types(&self) -> EngineResult<Arc<DatabaseTypes>> {
        TypeCatalogCache::global().get_or_build::<OracleType>()
    }
}

impl SchemaIntrospector for OracleDialect {
    fn current_database_queries(&self) -> Vec<CatalogQuery> {
        vec![
            CatalogQuery::new("SELECT SYS_CONTEXT('USERENV', 'DB_NAME') FROM DUAL"),
            CatalogQuery::new("SELECT ORA_DATABASE_NAME FROM DUAL"),
            CatalogQuery::new("SELECT NAME FROM V$DATABASE"),
        ]
    }

    fn current_schema_queries(&self) -> Vec<CatalogQuery> {
        vec![
            CatalogQuery::new("SELECT SYS_CONTEXT('USERENV', 'CURRENT_SCHEMA') FROM DUAL"),
            CatalogQuery::new("SELECT USER FROM DUAL"),
        ]
    }

    fn database_queries(&self) -> Vec<CatalogQuery> {
        vec![
            CatalogQuery::new("SELECT NAME AS DATABASE_NAME FROM V$DATABASE"),
            CatalogQuery::new(
                "SELECT SYS_CONTEXT('USERENV', 'DB_NAME') AS DATABASE_NAME FROM DUAL",
            ),
            CatalogQuery::new("SELECT ORA_DATABASE_NAME AS DATABASE_NAME FROM DUAL"),
        ]
    }

    fn schema_queries(&self, _database: &DatabaseSchemaDatabase) -> Vec<CatalogQuery> {
        vec![
            CatalogQuery::new("SELECT USERNAME AS SCHEMA_NAME FROM DBA_USERS ORDER BY USERNAME"),
            CatalogQuery::new("SELECT USERNAME AS SCHEMA_NAME FROM ALL_USERS ORDER BY USERNAME"),
            CatalogQuery::new(
                "SELECT DISTINCT OWNER AS SCHEMA_NAME FROM ALL_TABLES ORDER BY OWNER",
            ),
            CatalogQuery::new("SELECT USER AS SCHEMA_NAME FROM DUAL"),
        ]
    }

    fn table_queries(&self, _database: &DatabaseSchemaDatabase) -> Vec<CatalogQuery> {
        vec![
            CatalogQuery::new(
                "SELECT OWNER AS SCHEMA_NAME, TABLE_NAME FROM DBA_TABLES \
                 WHERE DROPPED = 'NO' ORDER BY OWNER, TABLE_NAME",
            ),
            CatalogQuery::new(
                "SELECT OWNER AS SCHEMA_NAME, TABLE_NAME FROM ALL_TABLES \
                 WHERE DROPPED = 'NO' ORDER BY OWNER, TABLE_NAME",
            ),
            CatalogQuery::new(
                "SELECT USER AS SCHEMA_NAME, TABLE_NAME FROM USER_TABLES \
                 WHERE DROPPED = 'NO' ORDER BY TABLE_NAME",
            ),
        ]
    }

    fn column_queries(
        &self,
        _database: &DatabaseSchemaDatabase,
        table: Option<&DatabaseSchemaTable>,
    ) -> Vec<CatalogQuery> {
        self.column_candidates(table)
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

impl Dialect for OracleDialect {
    fn driver_id(&self) -> &'static str {
        DRIVER_ID
    }

    fn driver_name(&self) -> &'static str {
        "Oracle Database"
    }

    fn escaper(&self) -> &Escaper {
        &self.escaper
    }

    fn parameter_name(&self, index: usize) -> String {
        format!(":p{index}")
    }
}
