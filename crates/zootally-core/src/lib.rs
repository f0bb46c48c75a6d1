//! Core types and trait definitions for the zootally observation engine.
//!
//! Nothing here touches HTTP or a database.
//! Backends implement [`store::CountStore`]; everything that can be computed
//! without touching the store (day arithmetic, latest-wins reduction, window
//! assembly, dashboard rollups) lives here as plain functions.

// `CountStore` spells out `impl Future + Send`; implementors use `async fn`.
#![allow(async_fn_in_trait)]

pub mod calendar;
pub mod error;
pub mod latest;
pub mod observation;
pub mod registry;
pub mod rollup;
pub mod store;
pub mod window;

pub use error::{Error, Result};
