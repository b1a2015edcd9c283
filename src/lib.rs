//! relay - promotes configuration artifacts through an ordered chain of
//! deployment environments, one repository per environment.

pub mod cli;
pub mod commands;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod observability;
pub mod services;
pub mod ui;
