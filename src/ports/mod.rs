//! Ports (trait boundaries) for external dependencies.
//!
//! This module defines the interfaces between the domain layer and
//! infrastructure. Following hexagonal architecture, these traits are
//! owned by the domain and implemented by adapters elsewhere: the game
//! side by environments (simulated course, browser driver), the storage
//! side by snapshot repositories, and the reporting side by observers.

pub mod controller;
pub mod environment;
pub mod observer;
pub mod repository;

pub use controller::{Controller, Transition};
pub use environment::Environment;
pub use observer::{EpisodeRecord, Observer};
pub use repository::SnapshotRepository;
