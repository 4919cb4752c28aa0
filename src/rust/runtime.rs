use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use ort::session::Session;
use ort::Result as OrtResult;
use std::sync::OnceLock;

use crate::classifier::ClassifierError;

static INIT: OnceLock<Result<(), String>> = OnceLock::new();

/// Graph optimization applied by ONNX Runtime when a session is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OptimizationLevel {
    Disable,
    Basic,
    Extended,
    #[default]
    All,
}

impl OptimizationLevel {
    fn to_ort(self) -> GraphOptimizationLevel {
        match self {
            Self::Disable => GraphOptimizationLevel::Disable,
            Self::Basic => GraphOptimizationLevel::Level1,
            Self::Extended => GraphOptimizationLevel::Level2,
            Self::All => GraphOptimizationLevel::Level3,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    /// Threads used to run independent graph nodes in parallel (0 lets the runtime decide)
    pub inter_threads: usize,
    /// Threads used inside a single operator (0 lets the runtime decide)
    pub intra_threads: usize,
    pub optimization_level: OptimizationLevel,
}

fn init_onnx_environment() -> OrtResult<()> {
    ort::init()
        .with_name("glyphcast")
        .commit()?;
    Ok(())
}

/// Initializes the process-wide ONNX Runtime environment exactly once.
///
/// A failed initialization is remembered and reported to every later caller.
pub fn ensure_initialized() -> Result<(), ClassifierError> {
    INIT.get_or_init(|| init_onnx_environment().map_err(|e| e.to_string()))
        .clone()
        .map_err(ClassifierError::RuntimeError)
}

pub fn create_session_builder(config: &RuntimeConfig) -> Result<SessionBuilder, ClassifierError> {
    ensure_initialized()?;
    let mut builder = Session::builder()?;

    if config.inter_threads > 0 {
        builder = builder.with_inter_threads(config.inter_threads)?;
    }
    if config.intra_threads > 0 {
        builder = builder.with_intra_threads(config.intra_threads)?;
    }

    builder = builder.with_optimization_level(config.optimization_level.to_ort())?;

    Ok(builder)
}
