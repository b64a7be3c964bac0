// Copyright (c) 2021 10x Genomics, Inc. All rights reserved.

// One error type for the whole pipeline, split along the three fatal
// classes the operator sees: configuration (exit 2), data (exit 3) and
// capacity (exit 4).

use std::path::PathBuf;
use tcr_catalog::CatalogError;
use tcr_recomb::RecombError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("data error: {0}")]
    Data(String),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Recomb(#[from] RecombError),
    #[error("could not access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SimError {
    /// Process exit code: 2 configuration, 3 data, 4 capacity.
    pub fn exit_code(&self) -> i32 {
        match self {
            SimError::Config(_) => 2,
            SimError::Data(_) | SimError::Io { .. } | SimError::Catalog(_) => 3,
            SimError::Recomb(e) => match e {
                RecombError::ModelFormat { .. } | RecombError::NegativeProbability { .. } => 2,
                RecombError::Capacity { .. } | RecombError::UnproductiveLocus { .. } => 4,
                _ => 3,
            },
        }
    }
}
