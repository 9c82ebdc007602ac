//! CLI infrastructure for the dinoq toolkit
//!
//! This module provides the command-line interface for training,
//! evaluating, inspecting, and exporting runner agents.

pub mod commands;
pub mod output;
