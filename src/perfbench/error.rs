use thiserror::Error;

/// Every detected error is fatal to the current test case. There is no retry
/// and no partial-result reporting; `main` logs the message and exits non-zero.
#[derive(Debug, Error)]
pub enum Error {
    // Bad or missing configuration: unknown test case, missing flag set,
    // unreadable config file.
    #[error("configuration error: {0}")]
    Configuration(String),

    // The chosen object class needs more hosts than the cluster has.
    #[error("Need at least {min} servers for oclass {oclass}")]
    Capacity { min: usize, oclass: String },

    // An external command (dmg, daos, dfuse, mpirun/ior/mdtest) failed.
    #[error("execution error: {0}")]
    Execution(String),
}

pub type Result<T> = ::std::result::Result<T, Error>;
