// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 模型后端接口与模型族
//!
//! # 架构说明
//!
//! 推理引擎是外部依赖: 核心只关心 "帧 + 预处理参数 → 原始输出张量"。
//! 后端的选择、权重加载、硬件加速都由调用方注入。
//!
//! ## ModelBackend Trait
//! ```text
//! 原始帧 → (后端内部) resize + 归一化 → 推理 → Vec<ArrayD<f32>>
//!                                              ↓
//!                              DetectionLayout::decode → NMS → Detection
//! ```
//!
//! ## 模型族 (ModelFamily)
//! - **YOLO** (v3/v4 darknet): GridAnchor 布局, 416x416
//! - **SSD** / **Faster R-CNN**: FlatRow 布局, 300x300
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Result;
use image::DynamicImage;
use ndarray::{Array, IxDyn};

use crate::detection::DetectionLayout;
use crate::error::VisionError;

#[cfg(feature = "onnx")]
pub mod onnx;

#[cfg(feature = "onnx")]
pub use onnx::OnnxModel;

/// 通道顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOrder {
    Rgb,
    Bgr,
}

/// 预处理参数 (传给后端)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreprocessParams {
    pub width: u32,
    pub height: u32,
    /// 像素值乘以该系数
    pub scale: f32,
    pub channel_order: ChannelOrder,
}

/// 推理后端接口
///
/// 实现者对权重只读; `&mut self` 仅用于复用内部缓冲区/会话
pub trait ModelBackend {
    /// 推理: 帧 → 原始输出张量 (一个或多个输出层)
    fn infer(
        &mut self,
        frame: &DynamicImage,
        params: &PreprocessParams,
    ) -> Result<Vec<Array<f32, IxDyn>>>;

    /// 打印模型信息
    fn summary(&self) -> String {
        String::from("model backend")
    }
}

/// 模型族
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFamily {
    /// YOLOv3 darknet 导出
    YOLOv3,
    /// YOLOv4 darknet 导出
    YOLOv4,
    /// SSD MobileNet v2
    Ssd,
    /// Faster R-CNN Inception v2
    FasterRcnn,
}

impl ModelFamily {
    /// 从配置中的 `detection_model` / `yolo_version` 解析
    pub fn resolve(detection_model: &str, yolo_version: &str) -> Result<Self, VisionError> {
        match detection_model.to_lowercase().as_str() {
            "yolo" => match yolo_version.to_lowercase().as_str() {
                "yolov4" => Ok(ModelFamily::YOLOv4),
                "yolov3" => Ok(ModelFamily::YOLOv3),
                other => Err(VisionError::UnsupportedModelFamily(format!("yolo/{}", other))),
            },
            other => other.parse(),
        }
    }

    /// 输出张量布局
    pub fn layout(&self) -> DetectionLayout {
        match self {
            ModelFamily::YOLOv3 | ModelFamily::YOLOv4 => DetectionLayout::darknet(),
            ModelFamily::Ssd | ModelFamily::FasterRcnn => DetectionLayout::FlatRow,
        }
    }

    /// 模型输入预处理参数
    pub fn preprocess_params(&self) -> PreprocessParams {
        match self {
            ModelFamily::YOLOv3 | ModelFamily::YOLOv4 => PreprocessParams {
                width: 416,
                height: 416,
                scale: 1.0 / 255.0,
                channel_order: ChannelOrder::Rgb,
            },
            ModelFamily::Ssd | ModelFamily::FasterRcnn => PreprocessParams {
                width: 300,
                height: 300,
                scale: 1.0,
                channel_order: ChannelOrder::Rgb,
            },
        }
    }

    /// 模型文件名 (位于 models_dir 下)
    pub fn model_file(&self) -> &'static str {
        match self {
            ModelFamily::YOLOv3 => "yolov3.onnx",
            ModelFamily::YOLOv4 => "yolov4.onnx",
            ModelFamily::Ssd => "ssd_mobilenet_v2.onnx",
            ModelFamily::FasterRcnn => "faster_rcnn_inception_v2.onnx",
        }
    }

    pub fn model_path(&self, models_dir: &Path) -> PathBuf {
        models_dir.join(self.model_file())
    }

    /// 类别名文件 (所有模型族共用 COCO)
    pub fn classes_path(&self, models_dir: &Path) -> PathBuf {
        models_dir.join("coco.names")
    }
}

impl FromStr for ModelFamily {
    type Err = VisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "yolo" | "yolov4" => Ok(ModelFamily::YOLOv4),
            "yolov3" => Ok(ModelFamily::YOLOv3),
            "ssd" => Ok(ModelFamily::Ssd),
            "faster_rcnn" => Ok(ModelFamily::FasterRcnn),
            other => Err(VisionError::UnsupportedModelFamily(other.to_string())),
        }
    }
}
