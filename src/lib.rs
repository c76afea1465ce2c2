//! Client for the Ex Libris Alma REST APIs.
//!
//! [`Alma`] is the entry point: it resolves the regional gateway, carries
//! the API key in the `authorization` header, and exposes the resource
//! families as typed sub-clients. Responses come back as [`Content`]
//! (decoded JSON or XML) or as [`RawResponse`] snapshots when decoding is
//! skipped.

mod client;
mod config;
mod connection;
mod errors;
mod payload;
mod query;
mod response;
mod users;
pub mod xml;

pub use self::client::{Alma, AlmaBuilder};
pub use self::config::{DataFormat, Region};
pub use self::errors::Error;
pub use self::payload::Payload;
pub use self::query::{BriefQuery, PageOptions};
pub use self::response::{Content, RawResponse};
pub use self::users::{
    CreateOutcome, DeleteOutcome, UpdateOutcome, UserDepositsClient, UserFeesClient,
    UserLoansClient, UserRequestsClient, UsersClient,
};
