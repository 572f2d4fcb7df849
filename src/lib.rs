//! Assent - consent record management service
//!
//! This library provides the consent lifecycle engine, its storage layer and
//! the HTTP API. It exposes all modules for testing purposes.

pub mod entities;
pub mod errors;
pub mod models;
pub mod purpose_types;
pub mod service;
pub mod settings;
pub mod status;
pub mod storage;
pub mod validation;
pub mod web;
