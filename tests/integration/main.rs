//! Integration tests for context-protector

mod check_tests;
mod cli_tests;
mod config_tests;
mod hook_tests;
