// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 检测器 (Detector)
//! 职责: 帧 → 模型后端 → 解码 → NMS → 坐标截断 → Detection 列表

use anyhow::Result;
use image::{DynamicImage, GenericImageView};
use ndarray::{Array, IxDyn};
use tracing::{debug, error, info};

use super::decoder::DetectionLayout;
use super::types::{class_name_for, Detection};
use crate::config::{load_class_names, VisionConfig};
use crate::error::VisionError;
use crate::models::{ModelBackend, ModelFamily, PreprocessParams};
use crate::non_max_suppression;

pub struct Detector {
    backend: Option<Box<dyn ModelBackend + Send>>,
    layout: DetectionLayout,
    params: PreprocessParams,
    classes: Vec<String>,
    conf_threshold: f32,
    nms_threshold: f32,
}

impl Detector {
    /// 使用注入的后端创建检测器
    pub fn new(
        backend: Box<dyn ModelBackend + Send>,
        family: ModelFamily,
        classes: Vec<String>,
    ) -> Self {
        Self::with_layout(
            Some(backend),
            family.layout(),
            family.preprocess_params(),
            classes,
        )
    }

    pub fn with_layout(
        backend: Option<Box<dyn ModelBackend + Send>>,
        layout: DetectionLayout,
        params: PreprocessParams,
        classes: Vec<String>,
    ) -> Self {
        Self {
            backend,
            layout,
            params,
            classes,
            conf_threshold: 0.5,
            nms_threshold: 0.4,
        }
    }

    /// 没有可用模型的检测器: 每次 detect 都返回空列表
    pub fn unavailable(family: ModelFamily) -> Self {
        Self::with_layout(
            None,
            family.layout(),
            family.preprocess_params(),
            Vec::new(),
        )
    }

    /// 根据配置创建
    ///
    /// 配置非法 (模型族不支持) 时立即失败; 模型文件加载失败只记录日志,
    /// 检测器仍然可用但处于 ModelUnavailable 状态
    pub fn from_config(config: &VisionConfig) -> Result<Self> {
        config.validate()?;
        let family = config.model_family()?;

        let classes = match load_class_names(family.classes_path(&config.models_dir)) {
            Ok(classes) => classes,
            Err(e) => {
                error!("❌ 类别文件加载失败: {:#}", e);
                return Ok(Self::unavailable(family)
                    .with_thresholds(config.confidence_threshold, config.nms_threshold));
            }
        };

        let backend = Self::load_backend(config, family);
        if let Some(backend) = backend.as_ref() {
            info!("✅ 检测器就绪: {}, {} 个类别", backend.summary(), classes.len());
        }
        Ok(
            Self::with_layout(backend, family.layout(), family.preprocess_params(), classes)
                .with_thresholds(config.confidence_threshold, config.nms_threshold),
        )
    }

    #[cfg(feature = "onnx")]
    fn load_backend(
        config: &VisionConfig,
        family: ModelFamily,
    ) -> Option<Box<dyn ModelBackend + Send>> {
        let path = family.model_path(&config.models_dir);
        match crate::models::OnnxModel::load(&path, config.enable_gpu) {
            Ok(model) => Some(Box::new(model)),
            Err(e) => {
                error!("❌ {:?} 模型加载失败: {:#}", family, e);
                None
            }
        }
    }

    #[cfg(not(feature = "onnx"))]
    fn load_backend(
        _config: &VisionConfig,
        family: ModelFamily,
    ) -> Option<Box<dyn ModelBackend + Send>> {
        tracing::warn!(
            "⚠️ {:?}: 未启用 `onnx` 特性, 需要通过 Detector::new 注入模型后端",
            family
        );
        None
    }

    pub fn with_thresholds(mut self, conf_threshold: f32, nms_threshold: f32) -> Self {
        self.conf_threshold = conf_threshold;
        self.nms_threshold = nms_threshold;
        self
    }

    pub fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    pub fn layout(&self) -> DetectionLayout {
        self.layout
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn confidence_threshold(&self) -> f32 {
        self.conf_threshold
    }

    pub fn nms_threshold(&self) -> f32 {
        self.nms_threshold
    }

    /// 检测; 模型不可用或推理失败时返回错误
    pub fn try_detect(
        &mut self,
        frame: &DynamicImage,
        conf_threshold: f32,
    ) -> Result<Vec<Detection>, VisionError> {
        let backend = self
            .backend
            .as_mut()
            .ok_or(VisionError::ModelUnavailable)?;
        let outputs = backend
            .infer(frame, &self.params)
            .map_err(|e| VisionError::Inference(format!("{:#}", e)))?;

        let (width, height) = frame.dimensions();
        Ok(self.postprocess(&outputs, width, height, conf_threshold))
    }

    /// 检测; 任何失败都降级为空列表 + 日志
    pub fn detect(&mut self, frame: &DynamicImage, conf_threshold: f32) -> Vec<Detection> {
        match self.try_detect(frame, conf_threshold) {
            Ok(detections) => detections,
            Err(VisionError::ModelUnavailable) => {
                error!("❌ 目标检测器未初始化");
                Vec::new()
            }
            Err(e) => {
                error!("❌ 目标检测失败: {}", e);
                Vec::new()
            }
        }
    }

    /// 后处理: 原始输出 → 解码 → NMS → 截断左上角 → 类别名
    pub fn postprocess(
        &self,
        outputs: &[Array<f32, IxDyn>],
        frame_width: u32,
        frame_height: u32,
        conf_threshold: f32,
    ) -> Vec<Detection> {
        let mut candidates = self
            .layout
            .decode(outputs, frame_width, frame_height, conf_threshold);
        let decoded = candidates.len();

        if self.layout.needs_nms() {
            non_max_suppression(&mut candidates, self.nms_threshold);
        }
        debug!("解码候选 {} 个, NMS 后 {} 个", decoded, candidates.len());

        candidates
            .into_iter()
            .map(|c| {
                let index = match self.layout {
                    DetectionLayout::GridAnchor { .. } => c.class_id as i64,
                    // FlatRow 类别从1开始
                    DetectionLayout::FlatRow => c.class_id as i64 - 1,
                };
                Detection {
                    class_id: c.class_id,
                    class_name: class_name_for(&self.classes, index, c.class_id),
                    confidence: c.confidence,
                    bbox: c.bbox.clamp_origin(),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::Rect;
    use ndarray::Array2;

    /// 返回固定张量的后端
    struct FixedBackend(Vec<Array<f32, IxDyn>>);

    impl ModelBackend for FixedBackend {
        fn infer(
            &mut self,
            _frame: &DynamicImage,
            _params: &PreprocessParams,
        ) -> Result<Vec<Array<f32, IxDyn>>> {
            Ok(self.0.clone())
        }
    }

    struct FailingBackend;

    impl ModelBackend for FailingBackend {
        fn infer(
            &mut self,
            _frame: &DynamicImage,
            _params: &PreprocessParams,
        ) -> Result<Vec<Array<f32, IxDyn>>> {
            anyhow::bail!("device lost")
        }
    }

    fn names() -> Vec<String> {
        vec!["person".to_string(), "car".to_string()]
    }

    fn flat_detector() -> Detector {
        Detector::with_layout(
            None,
            DetectionLayout::FlatRow,
            ModelFamily::Ssd.preprocess_params(),
            names(),
        )
    }

    fn flat_row(class_id: f32) -> Array<f32, IxDyn> {
        Array::from_shape_vec(
            IxDyn(&[1, 1, 1, 7]),
            vec![0.0, class_id, 0.9, 0.0, 0.0, 0.5, 0.5],
        )
        .unwrap()
    }

    #[test]
    fn test_flat_class_mapping_one_based() {
        let det = flat_detector();
        let out = det.postprocess(&[flat_row(1.0)], 100, 100, 0.5);
        assert_eq!(out[0].class_name, "person");
        assert_eq!(out[0].class_id, 1);
        let out = det.postprocess(&[flat_row(2.0)], 100, 100, 0.5);
        assert_eq!(out[0].class_name, "car");
    }

    #[test]
    fn test_flat_class_mapping_out_of_range() {
        let det = flat_detector();
        let out = det.postprocess(&[flat_row(0.0)], 100, 100, 0.5);
        assert_eq!(out[0].class_name, "unknown_0");
        let out = det.postprocess(&[flat_row(99.0)], 100, 100, 0.5);
        assert_eq!(out[0].class_name, "unknown_99");
    }

    #[test]
    fn test_grid_detections_are_clamped_after_nms() {
        let det = Detector::with_layout(
            None,
            DetectionLayout::darknet(),
            ModelFamily::YOLOv4.preprocess_params(),
            names(),
        );
        // 160x160 画面: x = 10 - 20 = -10, y = 5 - 10 = -5
        let out = Array2::from_shape_vec((1, 7), vec![0.0625, 0.03125, 0.25, 0.125, 1.0, 0.9, 0.1])
            .unwrap()
            .into_dyn();
        let dets = det.postprocess(&[out], 160, 160, 0.5);
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].bbox, Rect::new(0, 0, 40, 20));
        assert_eq!(dets[0].class_name, "person");
    }

    #[test]
    fn test_grid_nms_suppresses_overlap() {
        let det = Detector::with_layout(
            None,
            DetectionLayout::darknet(),
            ModelFamily::YOLOv4.preprocess_params(),
            names(),
        )
        .with_thresholds(0.5, 0.4);
        let rows = vec![
            0.5, 0.5, 0.2, 0.2, 1.0, 0.9, 0.0, //
            0.51, 0.51, 0.2, 0.2, 1.0, 0.8, 0.0, //
            0.1, 0.1, 0.05, 0.05, 1.0, 0.0, 0.7,
        ];
        let out = Array2::from_shape_vec((3, 7), rows).unwrap().into_dyn();
        let dets = det.postprocess(&[out], 1000, 1000, 0.5);
        assert_eq!(dets.len(), 2);
        assert!((dets[0].confidence - 0.9).abs() < 1e-6);
        assert_eq!(dets[1].class_name, "car");
    }

    #[test]
    fn test_detect_without_model_is_empty() {
        let mut det = Detector::unavailable(ModelFamily::YOLOv4);
        let frame = DynamicImage::new_rgb8(32, 32);
        assert!(det.detect(&frame, 0.5).is_empty());
        assert_eq!(
            det.try_detect(&frame, 0.5),
            Err(VisionError::ModelUnavailable)
        );
    }

    #[test]
    fn test_detect_with_backend() {
        let mut det = Detector::new(
            Box::new(FixedBackend(vec![flat_row(1.0)])),
            ModelFamily::Ssd,
            names(),
        );
        let frame = DynamicImage::new_rgb8(200, 100);
        let dets = det.detect(&frame, 0.5);
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].bbox, Rect::new(0, 0, 100, 50));
    }

    #[test]
    fn test_from_config_without_model_files() {
        let config = VisionConfig {
            models_dir: std::env::temp_dir().join("ocr-vision-missing-models"),
            confidence_threshold: 0.3,
            ..Default::default()
        };
        let mut det = Detector::from_config(&config).unwrap();
        assert!(!det.is_available());
        assert_eq!(det.confidence_threshold(), 0.3);
        assert!(det.detect(&DynamicImage::new_rgb8(8, 8), 0.3).is_empty());
    }

    #[test]
    fn test_from_config_rejects_unknown_family() {
        let config = VisionConfig {
            detection_model: "detr".to_string(),
            ..Default::default()
        };
        assert!(Detector::from_config(&config).is_err());
    }

    #[test]
    fn test_inference_failure_degrades() {
        let mut det = Detector::new(Box::new(FailingBackend), ModelFamily::Ssd, names());
        let frame = DynamicImage::new_rgb8(8, 8);
        assert!(det.detect(&frame, 0.5).is_empty());
        assert!(matches!(
            det.try_detect(&frame, 0.5),
            Err(VisionError::Inference(_))
        ));
    }
}
