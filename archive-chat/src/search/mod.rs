//! Archive search
//!
//! Query construction, the gateway to the search engine and the types shared
//! with the results view.

pub mod gateway;
pub mod query;
pub mod types;

pub use gateway::{ElasticGateway, SearchGateway, SearchPage};
pub use query::build_query;
pub use types::*;
