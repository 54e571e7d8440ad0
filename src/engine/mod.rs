//! Terminal front end for the declarative engine
//!
//! The engine shows the plan, asks for confirmation and reports progress
//! while [`declarative::execute`] applies the changes.

pub mod differ;
pub mod executor;

pub use differ::display_diff;
pub use executor::execute;
