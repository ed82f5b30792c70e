//! WebLogic operator CRD definitions
//!
//! Custom resource types and the ownership-label contract shared by the
//! controller and the cluster client.

pub mod labels;
pub mod weblogic_server;

pub use labels::*;
pub use weblogic_server::*;
