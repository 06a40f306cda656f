// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! OCR 预处理: 去噪 → 直方图均衡 → 自适应二值化

use image::{DynamicImage, GrayImage};
use imageproc::contrast::{adaptive_threshold, equalize_histogram};
use imageproc::filter::median_filter;

/// 自适应阈值的邻域半径 (11x11 邻域)
const THRESHOLD_BLOCK_RADIUS: u32 = 5;

/// 生成适合 OCR 的二值图, 尺寸与输入相同
///
/// 每个像素与其 11x11 邻域均值比较, 不低于均值为白 (255), 否则为黑.
/// 光照不均的页面上, 暗处的背景也能保持为白色
pub fn enhance_for_ocr(frame: &DynamicImage) -> GrayImage {
    let gray = frame.to_luma8();
    let denoised = median_filter(&gray, 1, 1);
    let equalized = equalize_histogram(&denoised);
    adaptive_threshold(&equalized, THRESHOLD_BLOCK_RADIUS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, RgbImage};

    /// 左半页较暗 (100), 右半页较亮 (220), 各有一道 3 像素宽的竖笔画
    fn uneven_page() -> DynamicImage {
        let img = RgbImage::from_fn(80, 40, |x, _| {
            let v = match x {
                15..=17 => 20,
                55..=57 => 140,
                0..=39 => 100,
                _ => 220,
            };
            image::Rgb([v, v, v])
        });
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_output_is_binary_with_same_size() {
        let out = enhance_for_ocr(&uneven_page());
        assert_eq!(out.dimensions(), (80, 40));
        assert!(out.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
    }

    #[test]
    fn test_strokes_are_black_on_both_halves() {
        let out = enhance_for_ocr(&uneven_page());
        // 笔画
        assert_eq!(out.get_pixel(16, 20), &Luma([0]));
        assert_eq!(out.get_pixel(56, 20), &Luma([0]));
        // 远离笔画和明暗分界的背景, 包括较暗的左半页
        assert_eq!(out.get_pixel(5, 20), &Luma([255]));
        assert_eq!(out.get_pixel(27, 20), &Luma([255]));
        assert_eq!(out.get_pixel(70, 20), &Luma([255]));
    }
}
