// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 检测 + 跟踪编排
//!
//! 每帧: 检测 → 为符合条件的检测创建新跟踪 → 更新所有活动跟踪 (包括刚创建的).
//! 检测与已有跟踪之间不做身份关联, 同一目标在每帧都会产生新的跟踪.

use anyhow::Result;
use image::DynamicImage;
use serde::Serialize;
use tracing::{debug, warn};

use super::registry::{StopReason, TrackUpdate, TrackerRegistry};
use crate::config::VisionConfig;
use crate::detection::{Detection, Detector, Rect};

/// 本帧新建的跟踪
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StartedTrack {
    pub id: String,
    pub class_name: String,
    pub confidence: f32,
    pub initial_box: Rect,
}

/// 本帧成功更新的跟踪
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdatedTrack {
    pub id: String,
    #[serde(rename = "box")]
    pub bbox: Rect,
}

/// 单帧结果, 交给下游消费者 (导出/显示)
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrackingReport {
    pub detections: Vec<Detection>,
    pub tracking_started: Vec<StartedTrack>,
    pub tracking_updated: Vec<UpdatedTrack>,
}

pub struct DetectAndTrack {
    detector: Detector,
    registry: TrackerRegistry,
    min_confidence: f32,
}

impl DetectAndTrack {
    /// 默认最小置信度取检测器的置信度阈值
    pub fn new(detector: Detector, registry: TrackerRegistry) -> Self {
        let min_confidence = detector.confidence_threshold();
        Self {
            detector,
            registry,
            min_confidence,
        }
    }

    pub fn from_config(config: &VisionConfig) -> Result<Self> {
        let detector = Detector::from_config(config)?;
        let registry = TrackerRegistry::with_kind(config.tracker_kind());
        Ok(Self::new(detector, registry))
    }

    pub fn with_min_confidence(mut self, min_confidence: f32) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    pub fn min_confidence(&self) -> f32 {
        self.min_confidence
    }

    pub fn detector(&self) -> &Detector {
        &self.detector
    }

    pub fn detector_mut(&mut self) -> &mut Detector {
        &mut self.detector
    }

    pub fn registry(&self) -> &TrackerRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut TrackerRegistry {
        &mut self.registry
    }

    pub fn into_parts(self) -> (Detector, TrackerRegistry) {
        (self.detector, self.registry)
    }

    /// 检测并跟踪
    ///
    /// - `allowed_classes`: 只为这些类别创建跟踪 (None = 全部)
    /// - `min_confidence`: 创建跟踪的最小置信度 (None = 默认值)
    ///
    /// 返回的 `detections` 是完整的检测结果, 不受上述过滤影响
    pub fn detect_and_track(
        &mut self,
        frame: &DynamicImage,
        allowed_classes: Option<&[&str]>,
        min_confidence: Option<f32>,
    ) -> TrackingReport {
        let min_confidence = min_confidence.unwrap_or(self.min_confidence);
        let conf_threshold = self.detector.confidence_threshold();
        let detections = self.detector.detect(frame, conf_threshold);

        let mut tracking_started = Vec::new();
        for det in &detections {
            if let Some(allowed) = allowed_classes {
                if !allowed.contains(&det.class_name.as_str()) {
                    continue;
                }
            }
            if det.confidence < min_confidence {
                continue;
            }

            let id = self.registry.generate_id(&det.class_name);
            match self.registry.init_tracking(frame, det.bbox, None, Some(id)) {
                Ok(id) => tracking_started.push(StartedTrack {
                    id,
                    class_name: det.class_name.clone(),
                    confidence: det.confidence,
                    initial_box: det.bbox,
                }),
                Err(e) => warn!("⚠️ {} 跟踪创建失败: {}", det.class_name, e),
            }
        }

        // 新跟踪先创建, 再统一更新, 新跟踪本帧即被推进一次
        let mut tracking_updated = Vec::new();
        for id in self.registry.active_ids() {
            match self.registry.update_tracking(frame, &id) {
                Ok(TrackUpdate::Tracked(bbox)) => tracking_updated.push(UpdatedTrack { id, bbox }),
                Ok(TrackUpdate::Lost) => {
                    self.registry.stop_with_reason(&id, StopReason::Lost);
                }
                Err(e) => warn!("⚠️ 跟踪更新失败: {}", e),
            }
        }

        debug!(
            "检测 {} 个, 新建跟踪 {} 个, 更新 {} 个, 活动 {} 个",
            detections.len(),
            tracking_started.len(),
            tracking_updated.len(),
            self.registry.active_count()
        );

        TrackingReport {
            detections,
            tracking_started,
            tracking_updated,
        }
    }
}
