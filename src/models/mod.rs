//! Placement domain models.
//!
//! Provides the data types describing a placement problem and its
//! solutions. Every entity is addressed by a compact index assigned once per
//! scenario, and all per-entity state lives in dense grids.
//!
//! # Entities
//!
//! | Type | Role |
//! |------|------|
//! | `Resource` | Capacity dimension (CPU, RAM, disk) |
//! | `Application` | Service with deadline, work and demand functions |
//! | `Node` | Cloud, simple or composite (cluster) host |
//! | `Scenario` | Resources + applications + nodes |
//! | `SystemState` | Scenario + deployed decision + queues at a time |
//! | `Environment` | Generated load, network delays, dispatch ceilings |
//! | `Solution` | Placement, allocation and load distribution |

mod application;
mod environment;
mod function;
mod grid;
mod node;
mod resource;
mod scenario;
mod solution;
mod system;

pub use application::Application;
pub use environment::Environment;
pub use function::ScalarFn;
pub use grid::{Grid2, Grid3};
pub use node::{Node, NodeKind};
pub use resource::Resource;
pub use scenario::Scenario;
pub use solution::{Solution, Violation, ViolationType, CAPACITY_TOLERANCE, LOAD_TOLERANCE};
pub use system::SystemState;
