//! Chatter Gateway Library
//!
//! HTTP surface fronting the model backend: the streaming answer relay plus
//! buffered pass-through proxies for the management endpoints.

pub mod backend;
pub mod proxy;
pub mod relay;
pub mod routes;
