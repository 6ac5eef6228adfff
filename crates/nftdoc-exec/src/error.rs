use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to spawn {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error while talking to nft: {0}")]
    Io(#[from] std::io::Error),

    /// Non-zero exit; `stderr` is the executor's diagnostic, untouched.
    #[error("nft command failed: {stderr}")]
    Failed { stderr: String, code: Option<i32> },

    #[error("nft did not finish within {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Document(#[from] nftdoc::Error),
}
