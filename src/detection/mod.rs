// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 检测系统 (Detection System)
///
/// - decoder:  模型原始输出 → 候选框 (GridAnchor / FlatRow)
/// - detector: 解码 + NMS, 帧 → Detection 列表
/// - types:    Rect / Detection / Candidate
pub mod decoder;
pub mod detector;
pub mod types;

pub use decoder::DetectionLayout;
pub use detector::Detector;
pub use types::{Candidate, Detection, Rect};
