//! GitLab resource kinds
//!
//! Each kind maps declared attributes onto GitLab API calls and projects the
//! API's responses back into recorded state:
//! - `gitlab_branch`: repository branches, identified as `<project>-<branch>`
//! - `gitlab_group`: groups and subgroups, identified by numeric ID

pub mod branch;
pub mod group;
pub mod id;

pub use branch::BranchKind;
pub use group::GroupKind;
