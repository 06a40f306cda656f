// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod codes; // 二维码识别
pub mod config; // 配置参数
pub mod detection; // 目标检测: 解码 + NMS
pub mod document; // 文档定位与透视矫正
pub mod error;
pub mod models; // 模型后端接口
pub mod pipeline; // 帧采集 → 检测跟踪 流水线
pub mod tracking; // 单目标跟踪器注册表 + 检测跟踪编排
pub mod utils;

use std::cmp::Ordering;

pub use crate::codes::{detect_codes, CodeDetection, CodeKind};
pub use crate::config::VisionConfig;
pub use crate::detection::{Candidate, Detection, DetectionLayout, Detector, Rect};
pub use crate::document::{DocumentLocator, Quad};
pub use crate::error::VisionError;
pub use crate::models::{ModelBackend, ModelFamily, PreprocessParams};
pub use crate::tracking::{DetectAndTrack, TrackerKind, TrackerRegistry, TrackingReport};

/// 贪心 NMS (跨类别)
///
/// 按置信度降序, 与任一已保留框 IoU > `iou_threshold` 的框被丢弃
pub fn non_max_suppression(xs: &mut Vec<Candidate>, iou_threshold: f32) {
    xs.sort_by(|b1, b2| {
        b2.confidence
            .partial_cmp(&b1.confidence)
            .unwrap_or(Ordering::Equal)
    });

    let mut current_index = 0;
    for index in 0..xs.len() {
        let mut drop = false;
        for prev_index in 0..current_index {
            let iou = xs[prev_index].bbox.iou(&xs[index].bbox);
            if iou > iou_threshold {
                drop = true;
                break;
            }
        }
        if !drop {
            xs.swap(current_index, index);
            current_index += 1;
        }
    }
    xs.truncate(current_index);
}

/// 当前 Unix 时间戳 (秒), 用于可读的跟踪ID
pub fn unix_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}
