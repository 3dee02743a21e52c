//! artforge - HTTP backend for AI-generated SVG art
//!
//! Turns text prompts and uploaded images into SVG artwork with a generative
//! model, stores artifacts and their metadata on Walrus (or a local/in-memory
//! store), analyzes uploads, and hosts an art-mentor chat session.

pub mod ai;
pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod image;
pub mod models;
pub mod prompts;
pub mod storage;

pub use error::{Error, Result};
