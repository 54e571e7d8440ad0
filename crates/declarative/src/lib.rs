//! # Declarative
//!
//! A framework for declarative management of remote resources.
//!
//! This crate provides the core abstractions for declaring desired
//! attributes, refreshing what the remote side actually has, planning the
//! difference and converging the two.
//!
//! ## Core Concepts
//!
//! - **ResourceKind**: A remote object type with a schema and a lifecycle
//!   (create, read, update, delete, import)
//! - **Schema**: Attributes with a mutability class (required, optional,
//!   computed) and a force-new flag
//! - **ExecutionPlan**: One action per instance (create, update, replace, delete)
//! - **Executor**: Refreshes state and applies plans with bounded parallelism
//!
//! ## Example
//!
//! ```ignore
//! use declarative::{
//!     AutoConfirm, Declaration, ExecuteOptions, ExecutionPlan, NoProgress, Registry,
//!     Tracked, execute, refresh,
//! };
//!
//! let mut registry = Registry::new();
//! registry.register(BranchKind::new(client, "master"));
//!
//! let report = refresh(&registry, &tracked, 4)?;
//! let plan = ExecutionPlan::build(&registry, &declarations, &report.tracked, &report.missing)?;
//!
//! let mut tracked = report.tracked;
//! let summary = execute(
//!     &registry,
//!     &plan,
//!     &mut tracked,
//!     &ExecuteOptions::default(),
//!     &mut NoProgress,
//!     &mut AutoConfirm,
//! )?;
//! ```
//!
//! ## Provider Traits
//!
//! The crate uses traits for dependency injection:
//!
//! - [`ProgressCallback`]: Receives progress updates
//! - [`ConfirmCallback`]: Handles user confirmations
//!
//! This allows the crate to be used without hard dependencies on
//! specific UI frameworks.

pub mod context;
pub mod diff;
pub mod executor;
pub mod planner;
pub mod resource;
pub mod schema;
pub mod set;
pub mod types;

// Re-export main types at crate root
pub use context::{AutoConfirm, AutoDecline, ConfirmCallback, NoProgress, ProgressCallback};
pub use diff::{AttributeChange, DiffSummary, ResourceDiff, classify, diff_attributes, group_by_type};
pub use executor::{RefreshReport, execute, refresh};
pub use planner::{Declaration, ExecutionPlan, PlannedChange};
pub use resource::{DynKind, Registry, ResourceKind};
pub use schema::{Attribute, AttributeType, Mode, Schema};
pub use set::StringSet;
pub use types::{
    Action, Address, AddressError, ApplyResult, ExecuteOptions, ExecuteSummary, ReadOutcome,
    Record, Tracked,
};
