use thiserror::Error;

/// Failures of a single command. None of them stop the worker.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("world has not been created yet (send makeWorld first)")]
    WorldNotReady,

    #[error("unknown shape type: {0}")]
    UnknownShape(String),

    #[error("unknown constraint type: {0}")]
    UnknownConstraint(String),

    #[error("{0} has no geometry")]
    EmptyGeometry(&'static str),

    #[error("id {0} is already registered")]
    DuplicateId(u32),

    #[error("no body with id {0}")]
    MissingBody(u32),

    #[error("body {body} is still referenced by {by}")]
    BodyInUse { body: u32, by: &'static str },

    #[error("no vehicle with id {0}")]
    MissingVehicle(u32),

    #[error("{kind} constraint needs a second body")]
    MissingSecondBody { kind: &'static str },

    #[error("malformed `{cmd}` parameters: {source}")]
    Decode {
        cmd: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type WorkerResult<T> = Result<T, WorkerError>;
