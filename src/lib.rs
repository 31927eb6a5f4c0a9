// Library exports for scaflink
pub mod alignment;
pub mod classify;
pub mod config;
pub mod graph;
pub mod graphviz;
pub mod input;
pub mod linker;
pub mod pairing;
pub mod pipeline;
pub mod scaffold_sizes;
pub mod stats;
