/*
    oplog - Append-only operation log

    Records every local and remote mutation, in arrival order, together
    with the node's hybrid logical clock.
*/

pub mod errors;
pub mod log;
pub mod operation;

pub use errors::{OpLogError, OpLogResult};
pub use log::OperationLog;
pub use operation::{NewOperation, Operation, Verb};
