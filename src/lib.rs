//! Short News - A Summarised News Portal
//!
//! This crate fetches news feeds from an aggregator, extracts and summarises
//! each linked article, and serves the results as cards on a web page.

pub mod article;
pub mod cards;
pub mod config;
pub mod fetcher;
pub mod images;
pub mod routes;
pub mod summarizer;
