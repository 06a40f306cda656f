// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod algorithm; // 跟踪算法接口 + 工厂
pub mod correlation; // NCC 模板跟踪器
pub mod orchestrator; // 检测 + 跟踪 编排
pub mod registry; // 跟踪器注册表 + 轨迹历史

pub use algorithm::{CorrelationTrackerFactory, TrackerFactory, TrackerKind, TrackingAlgorithm};
pub use correlation::{CorrelationParams, CorrelationTracker};
pub use orchestrator::{DetectAndTrack, StartedTrack, TrackingReport, UpdatedTrack};
pub use registry::{StopReason, Track, TrackHistory, TrackState, TrackUpdate, TrackerRegistry};
