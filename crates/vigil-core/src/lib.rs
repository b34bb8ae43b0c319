//! Core types and trait definitions for the Vigil occurrence service.
//!
//! This crate is deliberately free of HTTP and database dependencies. The
//! lifecycle rules live here so every backend and every client applies the
//! same tables.

#![allow(async_fn_in_trait)]

pub mod attachment;
pub mod capa;
pub mod dashboard;
pub mod error;
pub mod event;
pub mod lifecycle;
pub mod occurrence;
pub mod outcome;
pub mod store;
pub mod tenant;

pub use error::{Error, Result};
