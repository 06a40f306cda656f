// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 错误类型 (Error types)

use thiserror::Error;

use crate::detection::Rect;

pub type Result<T, E = VisionError> = std::result::Result<T, E>;

/// 视觉核心错误
///
/// 除配置错误外, 逐帧操作只会降级为空结果 + 日志, 不会中断进程
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VisionError {
    #[error("detection model is not initialized")]
    ModelUnavailable,

    #[error("model inference failed: {0}")]
    Inference(String),

    #[error("unsupported model family `{0}`")]
    UnsupportedModelFamily(String),

    #[error("tracker init failed for roi {0:?}")]
    TrackInitFailure(Rect),

    #[error("track id `{0}` was already issued")]
    DuplicateTrackId(String),

    #[error("unknown or inactive track id `{0}`")]
    InvalidTrackId(String),

    #[error("no 4-vertex document contour found")]
    DocumentNotFound,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
