// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 配置参数
//!
//! JSON 配置文件, 所有字段都有默认值:
//! ```json
//! {
//!   "detection_model": "yolo",
//!   "yolo_version": "yolov4",
//!   "models_dir": "models/vision",
//!   "confidence_threshold": 0.5,
//!   "nms_threshold": 0.4,
//!   "tracker_type": "CSRT",
//!   "enable_gpu": false,
//!   "document": { "canny_low": 75.0, "canny_high": 200.0 }
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::VisionError;
use crate::models::ModelFamily;
use crate::tracking::TrackerKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    /// "yolo" | "ssd" | "faster_rcnn"
    pub detection_model: String,
    /// "yolov3" | "yolov4" (仅 yolo)
    pub yolo_version: String,
    pub models_dir: PathBuf,
    /// 检测置信度阈值, 同时作为 detect_and_track 的默认最小置信度
    pub confidence_threshold: f32,
    /// NMS IoU 阈值
    pub nms_threshold: f32,
    /// 默认跟踪算法 (CSRT/KCF/BOOSTING/MIL/TLD/MEDIANFLOW/MOSSE)
    pub tracker_type: String,
    pub enable_gpu: bool,
    pub document: DocumentConfig,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            detection_model: "yolo".to_string(),
            yolo_version: "yolov4".to_string(),
            models_dir: PathBuf::from("models/vision"),
            confidence_threshold: 0.5,
            nms_threshold: 0.4,
            tracker_type: "CSRT".to_string(),
            enable_gpu: false,
            document: DocumentConfig::default(),
        }
    }
}

impl VisionConfig {
    /// 从 JSON 文件加载
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// 启动时校验, 不合法的配置在处理任何帧之前失败
    pub fn validate(&self) -> Result<(), VisionError> {
        self.model_family()?;
        for (name, value) in [
            ("confidence_threshold", self.confidence_threshold),
            ("nms_threshold", self.nms_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(VisionError::InvalidConfig(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }
        self.document.validate()
    }

    pub fn model_family(&self) -> Result<ModelFamily, VisionError> {
        ModelFamily::resolve(&self.detection_model, &self.yolo_version)
    }

    /// 未知名称回退到 CSRT (记录警告)
    pub fn tracker_kind(&self) -> TrackerKind {
        TrackerKind::from_name(&self.tracker_type)
    }
}

/// 文档定位参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentConfig {
    /// 5x5 高斯核对应的 sigma
    pub blur_sigma: f32,
    pub canny_low: f32,
    pub canny_high: f32,
    /// 只检查面积最大的前N个轮廓
    pub max_candidates: usize,
    /// 多边形逼近精度 = epsilon_ratio * 周长
    pub epsilon_ratio: f64,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            blur_sigma: 1.1,
            canny_low: 75.0,
            canny_high: 200.0,
            max_candidates: 5,
            epsilon_ratio: 0.02,
        }
    }
}

impl DocumentConfig {
    pub fn validate(&self) -> Result<(), VisionError> {
        if self.blur_sigma <= 0.0 {
            return Err(VisionError::InvalidConfig(
                "document.blur_sigma must be positive".to_string(),
            ));
        }
        if self.canny_low > self.canny_high {
            return Err(VisionError::InvalidConfig(
                "document.canny_low must not exceed canny_high".to_string(),
            ));
        }
        if self.epsilon_ratio <= 0.0 || self.max_candidates == 0 {
            return Err(VisionError::InvalidConfig(
                "document.epsilon_ratio and max_candidates must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// 读取类别名文件 (每行一个)
pub fn load_class_names<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read class names {}", path.display()))?;
    Ok(text
        .lines()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect())
}
