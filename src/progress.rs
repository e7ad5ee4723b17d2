use std::sync::Arc;

use crate::pipeline::PipelineState;

pub type ProgressCallback = Arc<dyn Fn(PipelineState, &str) + Send + Sync>;
