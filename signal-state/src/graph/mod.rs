//! Dependency Graph
//!
//! The runtime records which signals and memos each computation read on its
//! last run as edges of a directed acyclic graph:
//!
//! - a node is a signal (source), a memo (derived) or an effect (leaf)
//! - an edge `B -> A` means A read B, so a change of B must reach A
//!
//! Each node keeps both edge directions. Dependents drive propagation, and
//! dependencies let a re-running computation drop its stale inputs first.

mod node;
mod scheduler;

pub use node::{Node, NodeId, NodeKind};
pub use scheduler::UpdateScheduler;
