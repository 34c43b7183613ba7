pub mod config;
pub mod error;
pub mod filter;
pub mod ids;
pub mod inspect;
pub mod model;
pub mod registry;
pub mod replay;
pub mod time;

pub use error::{ReplayError, Result};
pub use model::span::{FieldLayout, SpanRecord};
pub use replay::{
    ReplayOptions, Replayed, TraceIdPolicy, reconstruct, reconstruct_with,
    reconstruct_with_registry,
};
