//! HTML rendering: view models and askama templates.

pub mod views;
