//! Library crate for quiz-clash-back, exposing modules for binaries and tests.

pub mod config;
pub mod dao;
pub mod dto;
pub mod error;
pub mod match_engine;
pub mod routes;
pub mod services;
pub mod state;
