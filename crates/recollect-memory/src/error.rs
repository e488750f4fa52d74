use thiserror::Error;

use crate::policy::PolicyError;
use crate::store::StoreError;

/// Failure inside a manager operation, before it is degraded to an empty
/// result at the manager boundary.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Policy(#[from] PolicyError),
}
