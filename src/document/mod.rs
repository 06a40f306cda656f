// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 文档定位与透视矫正 (Document Locator)
//!
//! 流程:
//! 1. 灰度 → 高斯模糊 (5x5) → Canny 边缘
//! 2. 外轮廓按面积降序, 只检查最大的前5个
//! 3. 多边形逼近 (epsilon = 0.02 * 周长), 第一个4顶点的轮廓即为文档
//! 4. 找不到时原样返回输入帧
//! 5. rectify = false: 裁剪包围盒; rectify = true: 透视变换为矩形

pub mod contour;
pub mod enhance;
pub mod quad;

use std::cmp::Ordering;

use image::{DynamicImage, GenericImageView, GrayImage, Rgb};
use imageproc::contours::find_contours;
use imageproc::edges::canny;
use imageproc::filter::separable_filter_equal;
use imageproc::point::Point;
use tracing::{debug, info};

pub use contour::{approx_poly_dp, arc_length, contour_area};
pub use enhance::enhance_for_ocr;
pub use quad::{order_points, Quad};

use crate::config::DocumentConfig;
use crate::error::{Result, VisionError};
use crate::utils::perspective_transform::{get_perspective_transform, warp_perspective_rgb};

/// 5 抽头归一化高斯核 (对应 5x5 可分离高斯模糊)
fn gaussian_kernel_5(sigma: f32) -> [f32; 5] {
    let mut kernel = [-2.0f32, -1.0, 0.0, 1.0, 2.0].map(|x| (-x * x / (2.0 * sigma * sigma)).exp());
    let sum: f32 = kernel.iter().sum();
    kernel.iter_mut().for_each(|k| *k /= sum);
    kernel
}

#[derive(Debug, Clone, Default)]
pub struct DocumentLocator {
    config: DocumentConfig,
}

impl DocumentLocator {
    pub fn new(config: DocumentConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DocumentConfig {
        &self.config
    }

    /// 边缘图
    pub fn edge_map(&self, frame: &DynamicImage) -> GrayImage {
        let gray = frame.to_luma8();
        let blurred = separable_filter_equal(&gray, &gaussian_kernel_5(self.config.blur_sigma));
        canny(&blurred, self.config.canny_low, self.config.canny_high)
    }

    /// 在帧中寻找文档四边形
    pub fn find_quad(&self, frame: &DynamicImage) -> Option<Quad> {
        self.find_quad_in_edges(&self.edge_map(frame))
    }

    /// 在边缘图中寻找文档四边形
    pub fn find_quad_in_edges(&self, edges: &GrayImage) -> Option<Quad> {
        let mut outlines: Vec<(f64, Vec<Point<i32>>)> = find_contours::<i32>(edges)
            .into_iter()
            .filter(|c| c.parent.is_none())
            .map(|c| (contour_area(&c.points), c.points))
            .collect();
        outlines.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

        for (area, points) in outlines.iter().take(self.config.max_candidates) {
            let epsilon = self.config.epsilon_ratio * arc_length(points, true);
            let approx = approx_poly_dp(points, epsilon, true);
            debug!("轮廓面积 {:.0}, 逼近顶点 {} 个", area, approx.len());
            if approx.len() == 4 {
                let corners = [0, 1, 2, 3].map(|i| (approx[i].x as f64, approx[i].y as f64));
                return Some(Quad::from_points(corners));
            }
        }
        None
    }

    /// 定位文档; 找不到时返回 `DocumentNotFound`
    pub fn try_locate(&self, frame: &DynamicImage, rectify: bool) -> Result<DynamicImage> {
        let quad = self.find_quad(frame).ok_or(VisionError::DocumentNotFound)?;
        let located = if rectify {
            self.rectify(frame, &quad)
        } else {
            Self::crop(frame, &quad)
        };
        located.ok_or(VisionError::DocumentNotFound)
    }

    /// 定位文档; 找不到时原样返回输入帧
    pub fn locate(&self, frame: &DynamicImage, rectify: bool) -> DynamicImage {
        match self.try_locate(frame, rectify) {
            Ok(document) => document,
            Err(_) => {
                info!("📄 未检测到文档边界, 返回原图");
                frame.clone()
            }
        }
    }

    /// 包围盒裁剪 (裁剪到帧内)
    pub fn crop(frame: &DynamicImage, quad: &Quad) -> Option<DynamicImage> {
        let (width, height) = frame.dimensions();
        let rect = quad.bounding_rect().clip_to(width, height)?;
        Some(frame.crop_imm(
            rect.x as u32,
            rect.y as u32,
            rect.width as u32,
            rect.height as u32,
        ))
    }

    /// 透视矫正: 四边形 → (0,0),(w-1,0),(w-1,h-1),(0,h-1)
    pub fn rectify(&self, frame: &DynamicImage, quad: &Quad) -> Option<DynamicImage> {
        let (width, height) = quad.output_size();
        if width < 2 || height < 2 {
            return None;
        }
        let (w, h) = ((width - 1) as f64, (height - 1) as f64);
        let projection =
            get_perspective_transform(quad.points, [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)])?;
        let warped = warp_perspective_rgb(&frame.to_rgb8(), &projection, (width, height), Rgb([0; 3]));
        Some(DynamicImage::ImageRgb8(warped))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contour::tests::rect_outline;
    use image::{Luma, Rgb, RgbImage};

    fn document_frame() -> DynamicImage {
        let img = RgbImage::from_fn(240, 180, |x, y| {
            if (50..190).contains(&x) && (40..140).contains(&y) {
                Rgb([255, 255, 255])
            } else {
                Rgb([0, 0, 0])
            }
        });
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_blank_frame_is_returned_unchanged() {
        let frame = DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 48, Rgb([90, 90, 90])));
        let locator = DocumentLocator::default();
        assert!(locator.find_quad(&frame).is_none());
        assert_eq!(
            locator.try_locate(&frame, true),
            Err(VisionError::DocumentNotFound)
        );
        let out = locator.locate(&frame, true);
        assert_eq!(out.dimensions(), (64, 48));
        assert_eq!(out.as_bytes(), frame.as_bytes());
    }

    #[test]
    fn test_quad_from_edge_outline() {
        let mut edges = GrayImage::new(200, 150);
        for p in rect_outline(40, 30, 160, 120) {
            edges.put_pixel(p.x as u32, p.y as u32, Luma([255]));
        }
        let quad = DocumentLocator::default().find_quad_in_edges(&edges).unwrap();
        assert_eq!(
            quad.points,
            [(40.0, 30.0), (160.0, 30.0), (160.0, 120.0), (40.0, 120.0)]
        );
    }

    #[test]
    fn test_triangle_is_not_a_document() {
        let mut edges = GrayImage::new(100, 100);
        for i in 0..=60 {
            edges.put_pixel(20 + i, 80, Luma([255]));
            edges.put_pixel(20 + i / 2, 80 - i, Luma([255]));
            edges.put_pixel(80 - i / 2, 80 - i, Luma([255]));
        }
        assert!(DocumentLocator::default().find_quad_in_edges(&edges).is_none());
    }

    #[test]
    fn test_locates_bright_page() {
        let frame = document_frame();
        let locator = DocumentLocator::default();
        let quad = locator.find_quad(&frame).unwrap();
        let expected = [(50.0, 40.0), (189.0, 40.0), (189.0, 139.0), (50.0, 139.0)];
        for (found, want) in quad.points.iter().zip(expected.iter()) {
            assert!((found.0 - want.0).abs() <= 3.0, "{:?} vs {:?}", found, want);
            assert!((found.1 - want.1).abs() <= 3.0, "{:?} vs {:?}", found, want);
        }

        let cropped = locator.locate(&frame, false);
        let (w, h) = cropped.dimensions();
        assert!((w as i32 - 140).abs() <= 6 && (h as i32 - 100).abs() <= 6);
    }

    #[test]
    fn test_blur_kernel_has_five_taps() {
        let kernel = gaussian_kernel_5(1.1);
        assert!((kernel.iter().sum::<f32>() - 1.0).abs() < 1e-6);
        assert_eq!(kernel[0], kernel[4]);
        assert!(kernel[2] > kernel[1] && kernel[1] > kernel[0]);
    }

    #[test]
    fn test_rectifies_skewed_page() {
        let corners = [(60, 40), (200, 55), (190, 160), (45, 145)];
        let mut img = GrayImage::new(260, 200);
        let poly: Vec<Point<i32>> = corners.iter().map(|&(x, y)| Point::new(x, y)).collect();
        imageproc::drawing::draw_polygon_mut(&mut img, &poly, Luma([255]));
        let frame = DynamicImage::ImageLuma8(img);

        let locator = DocumentLocator::default();
        let quad = locator.find_quad(&frame).unwrap();
        for (found, want) in quad.points.iter().zip(corners.iter()) {
            assert!((found.0 - want.0 as f64).abs() <= 3.0, "{:?} vs {:?}", found, want);
            assert!((found.1 - want.1 as f64).abs() <= 3.0, "{:?} vs {:?}", found, want);
        }

        // 宽 = max(|BR-BL|, |TR-TL|) ≈ 145, 高 = max(|TR-BR|, |TL-BL|) ≈ 106
        let page = locator.locate(&frame, true);
        let (w, h) = page.dimensions();
        assert!((w as i32 - 145).abs() <= 5 && (h as i32 - 106).abs() <= 5, "{}x{}", w, h);
        let gray = page.to_luma8();
        let white = gray.pixels().filter(|p| p.0[0] > 200).count();
        assert!(white * 10 >= gray.len() * 8, "{} of {}", white, gray.len());
    }

    #[test]
    fn test_rectify_axis_aligned_quad() {
        let img = RgbImage::from_fn(80, 60, |x, y| Rgb([x as u8, y as u8, 7]));
        let frame = DynamicImage::ImageRgb8(img);
        let quad = Quad::from_points([(10.0, 10.0), (50.0, 10.0), (50.0, 30.0), (10.0, 30.0)]);
        let out = DocumentLocator::default().rectify(&frame, &quad).unwrap();
        assert_eq!(out.dimensions(), (40, 20));

        // 双线性采样按截断取整, 允许 1 的误差
        let rgb = out.to_rgb8();
        for (x, y, want) in [(0, 0, [10, 10, 7]), (39, 19, [50, 30, 7])] {
            let got = rgb.get_pixel(x, y).0;
            for c in 0..3 {
                assert!((got[c] as i32 - want[c]).abs() <= 1, "{:?} vs {:?}", got, want);
            }
        }
    }

    #[test]
    fn test_degenerate_quad_is_not_rectified() {
        let frame = DynamicImage::new_rgb8(10, 10);
        let quad = Quad::from_points([(1.0, 1.0), (1.0, 1.0), (1.0, 1.0), (1.0, 1.0)]);
        assert!(DocumentLocator::default().rectify(&frame, &quad).is_none());
    }
}
