// Library exports for metaforge
pub mod cli;
pub mod config;
pub mod metadata;
pub mod output;
pub mod registry;
pub mod requirements;
pub mod resolve;
pub mod sdist;
