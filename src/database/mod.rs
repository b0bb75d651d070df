pub mod changes;
pub mod manager;
pub mod models;
pub mod query_builder;
pub mod repository;
pub mod value;

pub use changes::Changes;
pub use manager::{DatabaseError, DatabaseManager};
pub use repository::{Page, PageRequest, Pagination, Repository};
pub use value::SqlValue;
