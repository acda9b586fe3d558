//! Integration tests for the prompt lifecycle engine

mod access_control;
mod cli_commands;
mod config_integration;
mod logging_file;
mod milestone_generation;
mod outbox_delivery;
mod quality_gate;
mod queue_lifecycle;
mod queue_positions;
mod store_integration;
mod test_utils;
