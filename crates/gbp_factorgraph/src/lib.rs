//! Gaussian belief propagation over a factor graph: canonical-form messages,
//! Huber-robust factor linearization, and a synchronous scheduler.

pub mod factor;
pub mod graph;
pub mod id;
pub mod message;
pub mod node;
pub mod variable;

pub use factor::{Factor, FactorError, JacobianFn, MeasurementFn};
pub use graph::{FactorGraph, GraphError};
pub use id::{FactorGraphId, FactorId, VariableId};
pub use message::{FactorInbox, FactorOutbox, Message, VariableInbox};
pub use node::Node;
pub use variable::VariableNode;
