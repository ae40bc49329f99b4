// SPDX-License-Identifier: Apache-2.0

//! polysql core
//!
//! Engine-neutral building blocks: native type catalogs, the schema object
//! model, identifier escaping, the transport/dialect contracts and the
//! [`Sql`] engine that composes them.

pub mod catalog;
pub mod config;
pub mod data;
pub mod error;
pub mod escape;
pub mod exclusion;
pub mod introspect;
pub mod registry;
pub mod schema;
pub mod sensitive;
pub mod sql;
pub mod traits;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use catalog::{DatabaseType, DatabaseTypes, NativeType, TypeCatalogCache, TypeDescriptor};
pub use config::{ConnectionConfig, ExclusionConfig};
pub use data::{BufferedReader, DataRow, DataTable};
pub use error::{CatalogFailure, CatalogLevel, EngineError, EngineResult};
pub use escape::Escaper;
pub use exclusion::Exclusions;
pub use introspect::{CatalogQuery, Introspected};
pub use registry::{DriverInfo, DriverRegistry};
pub use schema::{
    CatalogObject, DatabaseSchemaColumn, DatabaseSchemaDatabase, DatabaseSchemaSchema,
    DatabaseSchemaTable,
};
pub use sensitive::Sensitive;
pub use sql::{InsertColumn, Sql};
pub use traits::{
    Command, Connection, DataReader, Dialect, SchemaIntrospector, TypeCatalogProvider,
};
pub use types::{DbType, HostType, Parameter, SqlParameter, Value};
