// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 二维码识别 (QR Code)
//!
//! 灰度化 → 定位码网格 → 解码. 每个成功解码的码给出内容, 四个角点和轴对齐包围盒;
//! 解码失败或内容为空的码被忽略

use image::DynamicImage;
use serde::Serialize;
use tracing::{debug, warn};

use crate::detection::Rect;

/// 码制
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CodeKind {
    #[serde(rename = "QRCODE")]
    QrCode,
}

/// 单个识别结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodeDetection {
    #[serde(rename = "type")]
    pub kind: CodeKind,
    pub data: String,
    /// 码的四个角点 (图像坐标)
    pub points: [(i32, i32); 4],
    /// 角点的最小包围盒
    #[serde(rename = "box")]
    pub bbox: Rect,
}

/// 角点 → 包围盒 (x, y 取最小值, 宽高为最大值与最小值之差)
fn bounding_box(points: &[(i32, i32); 4]) -> Rect {
    let (mut min_x, mut min_y) = (i32::MAX, i32::MAX);
    let (mut max_x, mut max_y) = (i32::MIN, i32::MIN);
    for &(x, y) in points {
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    }
    Rect::new(min_x, min_y, max_x - min_x, max_y - min_y)
}

/// 识别帧中的所有二维码
pub fn detect_codes(frame: &DynamicImage) -> Vec<CodeDetection> {
    let gray = frame.to_luma8();
    let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
        gray.width() as usize,
        gray.height() as usize,
        |x, y| gray.get_pixel(x as u32, y as u32).0[0],
    );

    let mut codes = Vec::new();
    for grid in prepared.detect_grids() {
        let data = match grid.decode() {
            Ok((_, data)) => data,
            Err(e) => {
                warn!("⚠️ 二维码解码失败: {:?}", e);
                continue;
            }
        };
        if data.is_empty() {
            continue;
        }
        let b = &grid.bounds;
        let points = [(b[0].x, b[0].y), (b[1].x, b[1].y), (b[2].x, b[2].y), (b[3].x, b[3].y)];
        let bbox = bounding_box(&points);
        debug!("🔳 二维码 {:?}: {}", bbox, data);
        codes.push(CodeDetection {
            kind: CodeKind::QrCode,
            data,
            points,
            bbox,
        });
    }
    codes
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};
    use qrcode::{Color, QrCode};

    const SCALE: u32 = 4;
    const QUIET: u32 = 4;

    /// 白底上的二维码, 左上角留出 `offset` 的空白
    fn qr_frame(text: &str, offset: u32) -> (DynamicImage, u32) {
        let code = QrCode::new(text.as_bytes()).unwrap();
        let modules = code.width() as u32;
        let colors = code.to_colors();
        let size = offset + (modules + 2 * QUIET) * SCALE;
        let img = GrayImage::from_fn(size, size, |x, y| {
            if x < offset || y < offset {
                return Luma([255]);
            }
            let (mx, my) = ((x - offset) / SCALE, (y - offset) / SCALE);
            if mx < QUIET || my < QUIET || mx >= modules + QUIET || my >= modules + QUIET {
                return Luma([255]);
            }
            let index = ((my - QUIET) * modules + (mx - QUIET)) as usize;
            if colors[index] == Color::Dark {
                Luma([0])
            } else {
                Luma([255])
            }
        });
        (DynamicImage::ImageLuma8(img), modules)
    }

    #[test]
    fn test_decodes_generated_qr_code() {
        let (frame, modules) = qr_frame("https://ultralytics.com", 30);
        let codes = detect_codes(&frame);
        assert_eq!(codes.len(), 1);
        let code = &codes[0];
        assert_eq!(code.kind, CodeKind::QrCode);
        assert_eq!(code.data, "https://ultralytics.com");

        // 码区域从 offset + QUIET * SCALE 开始, 边长 modules * SCALE
        let start = (30 + QUIET * SCALE) as i32;
        let side = (modules * SCALE) as i32;
        let tol = 2 * SCALE as i32;
        assert!((code.bbox.x - start).abs() <= tol, "{:?}", code.bbox);
        assert!((code.bbox.y - start).abs() <= tol, "{:?}", code.bbox);
        assert!((code.bbox.width - side).abs() <= tol, "{:?}", code.bbox);
        assert!((code.bbox.height - side).abs() <= tol, "{:?}", code.bbox);
        assert_eq!(code.bbox, bounding_box(&code.points));
    }

    #[test]
    fn test_blank_frame_has_no_codes() {
        let frame = DynamicImage::ImageLuma8(GrayImage::from_pixel(64, 64, Luma([255])));
        assert!(detect_codes(&frame).is_empty());
    }

    #[test]
    fn test_bounding_box_of_rotated_corners() {
        let points = [(50, 10), (90, 50), (50, 90), (10, 50)];
        assert_eq!(bounding_box(&points), Rect::new(10, 10, 80, 80));
    }

    #[test]
    fn test_serializes_like_detections() {
        let detection = CodeDetection {
            kind: CodeKind::QrCode,
            data: "42".to_string(),
            points: [(1, 2), (11, 2), (11, 12), (1, 12)],
            bbox: Rect::new(1, 2, 10, 10),
        };
        let json = serde_json::to_value(&detection).unwrap();
        assert_eq!(json["type"], "QRCODE");
        assert_eq!(json["data"], "42");
        assert_eq!(json["box"]["width"], 10);
        assert_eq!(json["points"][1][0], 11);
    }
}
