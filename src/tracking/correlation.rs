// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 相关滤波模板跟踪器 (Correlation Tracker)
//!
//! 在上一帧位置周围的搜索窗口内做归一化互相关 (NCC) 模板匹配:
//! - 最高得分 < `min_score` 视为目标丢失
//! - `learning_rate > 0` 时模板按指数滑动平均更新, 适应外观变化

use image::imageops;
use image::{DynamicImage, GrayImage, Luma};
use imageproc::template_matching::{find_extremes, match_template, MatchTemplateMethod};

use super::algorithm::{TrackerKind, TrackingAlgorithm};
use crate::detection::Rect;

/// 跟踪参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrelationParams {
    /// 搜索窗口在每侧扩展的比例 (相对模板宽高)
    pub search_margin: f32,
    /// 接受匹配的最低 NCC 得分
    pub min_score: f32,
    /// 模板更新率 (0 = 不更新)
    pub learning_rate: f32,
    /// ROI 最小边长 (像素)
    pub min_size: u32,
}

impl Default for CorrelationParams {
    fn default() -> Self {
        Self {
            search_margin: 1.0,
            min_score: 0.6,
            learning_rate: 0.0,
            min_size: 4,
        }
    }
}

impl TrackerKind {
    /// 各算法类型对应的参数
    pub fn correlation_params(&self) -> CorrelationParams {
        let base = CorrelationParams::default();
        match self {
            TrackerKind::Csrt => base,
            TrackerKind::Kcf => CorrelationParams {
                search_margin: 0.5,
                learning_rate: 0.02,
                ..base
            },
            TrackerKind::Mosse => CorrelationParams {
                search_margin: 0.5,
                min_score: 0.5,
                learning_rate: 0.125,
                ..base
            },
            TrackerKind::Mil => CorrelationParams {
                min_score: 0.5,
                ..base
            },
            TrackerKind::Boosting => CorrelationParams {
                search_margin: 0.75,
                min_score: 0.55,
                ..base
            },
            TrackerKind::Tld => CorrelationParams {
                search_margin: 1.5,
                ..base
            },
            TrackerKind::MedianFlow => CorrelationParams {
                search_margin: 0.5,
                min_score: 0.7,
                ..base
            },
        }
    }
}

pub struct CorrelationTracker {
    params: CorrelationParams,
    template: Option<GrayImage>,
    last: Option<Rect>,
}

impl CorrelationTracker {
    pub fn new(params: CorrelationParams) -> Self {
        Self {
            params,
            template: None,
            last: None,
        }
    }

    pub fn for_kind(kind: TrackerKind) -> Self {
        Self::new(kind.correlation_params())
    }

    pub fn params(&self) -> &CorrelationParams {
        &self.params
    }

    fn crop(gray: &GrayImage, rect: Rect) -> GrayImage {
        imageops::crop_imm(
            gray,
            rect.x as u32,
            rect.y as u32,
            rect.width as u32,
            rect.height as u32,
        )
        .to_image()
    }

    /// 模板滑动平均更新
    fn blend_template(&mut self, patch: &GrayImage) {
        let rate = self.params.learning_rate;
        if let Some(template) = self.template.as_mut() {
            for (t, p) in template.pixels_mut().zip(patch.pixels()) {
                let v = t.0[0] as f32 * (1.0 - rate) + p.0[0] as f32 * rate;
                *t = Luma([v.round().clamp(0.0, 255.0) as u8]);
            }
        }
    }
}

impl TrackingAlgorithm for CorrelationTracker {
    fn init(&mut self, frame: &DynamicImage, roi: Rect) -> bool {
        if roi.is_degenerate() {
            return false;
        }
        let gray = frame.to_luma8();
        let clipped = match roi.clip_to(gray.width(), gray.height()) {
            Some(rect) => rect,
            None => return false,
        };
        let min = self.params.min_size as i32;
        if clipped.width < min || clipped.height < min {
            return false;
        }

        self.template = Some(Self::crop(&gray, clipped));
        self.last = Some(clipped);
        true
    }

    fn update(&mut self, frame: &DynamicImage) -> Option<Rect> {
        let last = self.last?;
        let (tw, th) = self.template.as_ref()?.dimensions();
        let gray = frame.to_luma8();

        let mx = (tw as f32 * self.params.search_margin).ceil() as i32;
        let my = (th as f32 * self.params.search_margin).ceil() as i32;
        let window = Rect::new(
            last.x - mx,
            last.y - my,
            tw as i32 + 2 * mx,
            th as i32 + 2 * my,
        )
        .clip_to(gray.width(), gray.height())?;
        if window.width < tw as i32 || window.height < th as i32 {
            return None;
        }

        let region = Self::crop(&gray, window);
        let scores = match_template(
            &region,
            self.template.as_ref()?,
            MatchTemplateMethod::CrossCorrelationNormalized,
        );
        let extremes = find_extremes(&scores);
        if !extremes.max_value.is_finite() || extremes.max_value < self.params.min_score {
            return None;
        }

        let (dx, dy) = extremes.max_value_location;
        let found = Rect::new(
            window.x + dx as i32,
            window.y + dy as i32,
            tw as i32,
            th as i32,
        );

        if self.params.learning_rate > 0.0 {
            let patch = Self::crop(&gray, found);
            self.blend_template(&patch);
        }
        self.last = Some(found);
        Some(found)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::RgbImage;

    /// 伪随机纹理, 保证 NCC 最大值唯一
    pub(crate) fn textured_frame(width: u32, height: u32, shift_x: u32) -> DynamicImage {
        let img = RgbImage::from_fn(width, height, |x, y| {
            let sx = x.wrapping_sub(shift_x);
            let v = ((sx.wrapping_mul(31) ^ y.wrapping_mul(17)) ^ (sx.wrapping_mul(y) >> 3)) % 251;
            image::Rgb([v as u8, v as u8, v as u8])
        });
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_init_rejects_degenerate_roi() {
        let frame = textured_frame(64, 64, 0);
        let mut tracker = CorrelationTracker::for_kind(TrackerKind::Csrt);
        assert!(!tracker.init(&frame, Rect::new(10, 10, 0, 20)));
        assert!(!tracker.init(&frame, Rect::new(100, 100, 10, 10)));
        assert!(!tracker.init(&frame, Rect::new(62, 62, 10, 10)));
    }

    #[test]
    fn test_update_on_same_frame_keeps_position() {
        let frame = textured_frame(96, 96, 0);
        let mut tracker = CorrelationTracker::for_kind(TrackerKind::Csrt);
        let roi = Rect::new(30, 40, 16, 12);
        assert!(tracker.init(&frame, roi));
        assert_eq!(tracker.update(&frame), Some(roi));
    }

    #[test]
    fn test_update_follows_translation() {
        let first = textured_frame(128, 96, 0);
        let moved = textured_frame(128, 96, 5);
        let mut tracker = CorrelationTracker::for_kind(TrackerKind::Csrt);
        assert!(tracker.init(&first, Rect::new(40, 30, 20, 20)));
        assert_eq!(tracker.update(&moved), Some(Rect::new(45, 30, 20, 20)));
    }

    #[test]
    fn test_update_reports_loss_on_blank_frame() {
        let frame = textured_frame(64, 64, 0);
        let blank = DynamicImage::new_rgb8(64, 64);
        let mut tracker = CorrelationTracker::for_kind(TrackerKind::Kcf);
        assert!(tracker.init(&frame, Rect::new(20, 20, 10, 10)));
        assert_eq!(tracker.update(&blank), None);
    }

    #[test]
    fn test_update_before_init_is_lost() {
        let frame = textured_frame(32, 32, 0);
        let mut tracker = CorrelationTracker::new(CorrelationParams::default());
        assert_eq!(tracker.update(&frame), None);
    }
}
