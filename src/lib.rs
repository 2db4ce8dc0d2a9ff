//! Dayplan - An offline-tolerant day planner backed by a remote calendar
//!
//! This library merges local-only tasks with events from a remote calendar
//! into one task collection, overlays client-side completion state, and
//! keeps a durable queue of mutations made while offline so they replay in
//! order once connectivity and a session token return.
//!
//! # Modules
//!
//! The library is organized into several key modules:
//!
//! * [`config`] - Application configuration management
//! * [`model`] - The unified task model and recurrence rules
//! * [`store`] - Local persistence for tasks, completion and the queue
//! * [`gateway`] - Remote calendar access and wire translation
//! * [`engine`] - The reconciliation engine and mutation paths
//! * [`query`] - Day-window and next-task queries

/// Configuration module for managing application settings
pub mod config;

/// Reconciliation engine owning the task collection and mutation queue
pub mod engine;

/// Remote calendar gateway, wire types and model translation
pub mod gateway;

/// File logging setup
pub mod logger;

/// Task, scheduling and recurrence models
pub mod model;

/// User-facing notification sink
pub mod notify;

/// Read-side queries over the task collection
pub mod query;

/// Session token and connectivity state
pub mod session;

/// Local JSON-file persistence layer
pub mod store;

/// Background watcher reacting to session transitions
pub mod watcher;

pub use engine::{AddReport, EngineSettings, Outcome, PlannerEngine, PromotionReport};
pub use model::{Task, TaskDraft, TaskOrigin, TaskPatch};
