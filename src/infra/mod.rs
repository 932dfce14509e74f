pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod expiration_worker;
pub mod setup;
pub mod webhook_signature;
