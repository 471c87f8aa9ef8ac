//! Request and response bodies for the HTTP front end.

pub mod requests;
pub mod responses;

pub use requests::SetRequest;
pub use responses::{
    DeleteResponse, GetResponse, HealthResponse, SetResponse, StatsResponse, TagDeleteResponse,
    TagKeysResponse, TtlResponse,
};
