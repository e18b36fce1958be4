//! Core library for playlist-blender
pub mod api;
pub mod blend;
pub mod cache;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod merge;
pub mod models;
pub mod prompts;
pub mod resolver;
