//! Hierarchical iterative cooperation.
//!
//! The non-cloud nodes are split into clusters. Each cluster optimizes a
//! local problem in which the other clusters appear as composite nodes,
//! then the clusters exchange what they learned and optimize again. The
//! last local decisions are merged into one global decision.
//!
//! A coarser controller can bound each cluster through a
//! [`ParentDecision`], typically derived from a solution of
//! [`ClusterPartition::aggregate_scenario`].
//!
//! # Components
//!
//! | Type | Role |
//! |------|------|
//! | `ClusterPartition` | Disjoint cover of the edge nodes |
//! | `ClusterView` | Local scenario, snapshot and environment of one cluster |
//! | `ExternalEstimate` | What a cluster assumes about the others |
//! | `ParentDecision` | Instance bounds and ceilings from a coarser layer |
//! | `HierarchicalCoordinator` | Round loop, exchange and assembly |

mod assembly;
mod hierarchical;
mod parent;
mod partition;
mod view;

pub use assembly::assemble;
pub use hierarchical::HierarchicalCoordinator;
pub use parent::ParentDecision;
pub use partition::ClusterPartition;
pub use view::{ClusterView, ExternalEstimate, LocalNode};
