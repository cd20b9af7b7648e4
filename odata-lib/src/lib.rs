//! OData v4 client library
//!
//! A Rust async client library for OData v4 services: a fluent query builder
//! compiled into request URIs, lazy pagination over `@odata.nextLink`, and
//! `$batch` requests with atomic changesets.
//!
//! # Example
//!
//! ```ignore
//! use odata_lib::ODataClient;
//! use odata_lib::api::query::Filterable;
//!
//! let client = ODataClient::builder()
//!     .url("https://services.odata.org/V4/TripPinService")
//!     .build()?;
//!
//! let mut people = client
//!     .from("People")
//!     .filter_op("FirstName", "eq", "Scott")
//!     .cursor();
//!
//! while let Some(person) = people.next().await {
//!     println!("{:?}", person?.get_string("UserName")?);
//! }
//! ```

pub mod api;
pub mod auth;
pub mod error;
pub mod model;
pub mod response;
pub mod transport;

mod client;

pub use client::*;
pub use response::ODataResponse;
