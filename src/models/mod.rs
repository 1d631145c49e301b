// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{SchemaInfo, TableInfo, ColumnInfo, ForeignKey, SqlTranslation, QueryRows, QueryResult};
pub use requests::QueryRequest;
pub use responses::{SchemaResponse, SampleQueriesResponse, HealthResponse, ErrorResponse};
