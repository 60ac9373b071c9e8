//! Quill: a community blogging server built around a paginated, cache-aware feed engine.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
