#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]

pub mod areq;
pub mod command;
pub mod cursor;
pub mod error;
pub mod flags;
pub mod host;
pub mod index;
pub mod plan;
pub mod processor;
pub mod result;
pub mod row;
pub mod serializer;
pub mod value;

pub use self::{
    areq::{Areq, AreqBuilder},
    command::{handle_aggregate, handle_cursor, handle_search, explain, CompiledRequest, Compiler},
    cursor::{Registry, RegistryConfig},
    error::Error,
    host::{BufferHost, Host, Reply},
};
