//! metalquote library
//!
//! Fetches current buy/sell quotes for gold (mihong.vn) and silver
//! (giabac.vn), caches them briefly and serves them over HTTP.

pub mod cache;
pub mod cli;
pub mod data;
pub mod notify;
pub mod pipeline;
pub mod server;
