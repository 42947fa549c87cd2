//! REST layer: single-attempt requests against the messaging API.

pub mod client;
pub mod dto;
pub mod error;
