//! Library crate for potd-back: a problem-of-the-day competition service.
//!
//! Exposes the modules used by the binaries and the integration tests.

pub mod config;
pub mod dao;
pub mod dto;
pub mod error;
pub mod export;
pub mod gateway;
pub mod routes;
pub mod services;
pub mod state;
