pub mod admin;
pub mod api_router;
pub mod auth;
pub mod config;
pub mod heatmap;
pub mod kb;
pub mod llm;
pub mod shared;
pub mod support;
