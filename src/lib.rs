//! Strategic map explorer: a focus-centred graph view over intelligence maps.

pub mod app;
pub mod engine;
pub mod map;
mod util;
