use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use anyhow::Context;
use clap::Parser;
use log::{info, warn};

use glyphcast::{
    AppState, ArtifactManager, LabelMap, OnnxClassifier, OptimizationLevel, Predictor,
    RuntimeConfig,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(long, env = "GLYPHCAST_ADDR", default_value = "0.0.0.0:8000")]
    addr: String,

    /// Directory holding model.onnx, label_map.json and frontend/
    #[arg(long, env = "GLYPHCAST_HOME")]
    artifacts: Option<PathBuf>,

    /// ONNX model file (defaults to <artifacts>/model.onnx)
    #[arg(long, env = "GLYPHCAST_MODEL")]
    model: Option<PathBuf>,

    /// Label map JSON (defaults to <artifacts>/label_map.json)
    #[arg(long, env = "GLYPHCAST_LABELS")]
    labels: Option<PathBuf>,

    /// Static frontend directory (defaults to <artifacts>/frontend)
    #[arg(long, env = "GLYPHCAST_FRONTEND")]
    frontend: Option<PathBuf>,

    /// Expected SHA-256 of the model file
    #[arg(long, env = "GLYPHCAST_MODEL_SHA256")]
    model_sha256: Option<String>,

    /// Download the model from this URL when it is missing
    #[arg(long, env = "GLYPHCAST_MODEL_URL")]
    model_url: Option<String>,

    /// ONNX Runtime intra-op threads (0 lets the runtime decide)
    #[arg(long, default_value_t = 0)]
    intra_threads: usize,

    /// ONNX Runtime inter-op threads (0 lets the runtime decide)
    #[arg(long, default_value_t = 0)]
    inter_threads: usize,

    /// Graph optimization level
    #[arg(long, value_enum, default_value_t = OptimizationLevel::All)]
    optimization: OptimizationLevel,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    glyphcast::init_logger();
    let args = Args::parse();

    let manager = match &args.artifacts {
        Some(root) => ArtifactManager::new(root),
        None => ArtifactManager::new_default(),
    };
    info!("Using artifact directory {:?}", manager.root());

    let model_path = args.model.clone().unwrap_or_else(|| manager.model_path());
    let labels_path = args.labels.clone().unwrap_or_else(|| manager.label_map_path());
    let frontend_dir = args.frontend.clone().unwrap_or_else(|| manager.frontend_dir());

    manager
        .ensure_file(&model_path, args.model_url.as_deref(), args.model_sha256.as_deref())
        .await
        .with_context(|| format!("Model artifact unavailable at {}", model_path.display()))?;

    let start_time = Instant::now();
    let runtime_config = RuntimeConfig {
        inter_threads: args.inter_threads,
        intra_threads: args.intra_threads,
        optimization_level: args.optimization,
    };
    let classifier = OnnxClassifier::builder()
        .with_runtime_config(runtime_config)
        .with_model_file(&model_path)
        .and_then(|builder| builder.build())
        .with_context(|| format!("Failed to load classifier from {}", model_path.display()))?;
    let model = classifier.info();
    info!(
        "Classifier loaded in {:.2?}: {} (input '{}' {:?}, {} classes)",
        start_time.elapsed(),
        model.model_path,
        model.input_name,
        model.input_dimensions,
        model.num_classes.map_or_else(|| "dynamic".to_string(), |n| n.to_string())
    );

    let labels = LabelMap::from_file(&labels_path)
        .with_context(|| format!("Failed to load label map from {}", labels_path.display()))?;
    info!("Loaded {} labels from {}", labels.len(), labels_path.display());
    if let Some(classes) = model.num_classes {
        if labels.len() < classes {
            warn!("Label map covers {} of {} classes; the rest are reported by index", labels.len(), classes);
        }
    }

    let frontend = if frontend_dir.is_dir() {
        Some(frontend_dir)
    } else {
        warn!("Frontend directory {} not found; static files are disabled", frontend_dir.display());
        None
    };

    let predictor = Predictor::new(Arc::new(classifier), Arc::new(labels));
    glyphcast::start_server(&args.addr, AppState::new(predictor), frontend.as_deref())
        .await
        .with_context(|| format!("Server on {} stopped", args.addr))?;

    Ok(())
}
