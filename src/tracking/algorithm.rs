// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 单目标跟踪算法接口
//!
//! 注册表只依赖 `TrackingAlgorithm`, 具体算法由 `TrackerFactory` 提供

use std::fmt;

use image::DynamicImage;
use tracing::warn;

use super::correlation::CorrelationTracker;
use crate::detection::Rect;

/// 单目标跟踪算法 (Tracker Trait)
///
/// 每个实例只被一个注册表条目独占, 不会被并发调用
pub trait TrackingAlgorithm {
    /// 用首帧和ROI初始化, 失败返回 false
    fn init(&mut self, frame: &DynamicImage, roi: Rect) -> bool;

    /// 在新帧上定位目标, 丢失时返回 None
    fn update(&mut self, frame: &DynamicImage) -> Option<Rect>;
}

/// 跟踪算法类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackerKind {
    Csrt,
    Kcf,
    Boosting,
    Mil,
    Tld,
    MedianFlow,
    Mosse,
}

impl TrackerKind {
    pub const ALL: [TrackerKind; 7] = [
        TrackerKind::Csrt,
        TrackerKind::Kcf,
        TrackerKind::Boosting,
        TrackerKind::Mil,
        TrackerKind::Tld,
        TrackerKind::MedianFlow,
        TrackerKind::Mosse,
    ];

    /// 严格解析 (不区分大小写)
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_uppercase().as_str() {
            "CSRT" => Some(TrackerKind::Csrt),
            "KCF" => Some(TrackerKind::Kcf),
            "BOOSTING" => Some(TrackerKind::Boosting),
            "MIL" => Some(TrackerKind::Mil),
            "TLD" => Some(TrackerKind::Tld),
            "MEDIANFLOW" => Some(TrackerKind::MedianFlow),
            "MOSSE" => Some(TrackerKind::Mosse),
            _ => None,
        }
    }

    /// 解析; 未知类型回退到 CSRT 并记录警告
    pub fn from_name(name: &str) -> Self {
        Self::parse(name).unwrap_or_else(|| {
            warn!("⚠️ 未知的跟踪器类型 {}, 使用 CSRT", name);
            TrackerKind::Csrt
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            TrackerKind::Csrt => "CSRT",
            TrackerKind::Kcf => "KCF",
            TrackerKind::Boosting => "BOOSTING",
            TrackerKind::Mil => "MIL",
            TrackerKind::Tld => "TLD",
            TrackerKind::MedianFlow => "MEDIANFLOW",
            TrackerKind::Mosse => "MOSSE",
        }
    }
}

impl Default for TrackerKind {
    fn default() -> Self {
        TrackerKind::Csrt
    }
}

impl fmt::Display for TrackerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 跟踪算法工厂
pub trait TrackerFactory {
    fn create(&self, kind: TrackerKind) -> Box<dyn TrackingAlgorithm + Send>;
}

/// 默认工厂: 所有类型都映射到相关滤波模板跟踪器, 参数按类型区分
#[derive(Debug, Clone, Copy, Default)]
pub struct CorrelationTrackerFactory;

impl TrackerFactory for CorrelationTrackerFactory {
    fn create(&self, kind: TrackerKind) -> Box<dyn TrackingAlgorithm + Send> {
        Box::new(CorrelationTracker::for_kind(kind))
    }
}
