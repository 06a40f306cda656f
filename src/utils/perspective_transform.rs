// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 透视变换工具模块
//! 实现类似于 cv2::getPerspectiveTransform / cv2::warpPerspective 的功能,
//! 矩阵求解和采样都交给 imageproc::geometric_transformations
use image::{Rgb, RgbImage};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};

/// 从4个对应点对获取透视变换矩阵 (源 → 目标)
///
/// # 参数
/// - `src_pts`: 源图像中的4个点
/// - `dst_pts`: 目标图像中的4个点
///
/// 无解或矩阵不可逆时返回 None
pub fn get_perspective_transform(
    src_pts: [(f64, f64); 4],
    dst_pts: [(f64, f64); 4],
) -> Option<Projection> {
    let to_f32 = |pts: [(f64, f64); 4]| pts.map(|(x, y)| (x as f32, y as f32));
    Projection::from_control_points(to_f32(src_pts), to_f32(dst_pts))
}

/// 透视变换 (RGB图像, 双线性插值)
///
/// 输出尺寸为 `dst_size`; 反向映射落在源图外的像素填 `fill`
pub fn warp_perspective_rgb(
    src: &RgbImage,
    projection: &Projection,
    dst_size: (u32, u32),
    fill: Rgb<u8>,
) -> RgbImage {
    let mut dst = RgbImage::new(dst_size.0, dst_size.1);
    warp_into(src, projection, Interpolation::Bilinear, fill, &mut dst);
    dst
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: (f32, f32), b: (f64, f64)) -> bool {
        (a.0 as f64 - b.0).abs() < 1e-2 && (a.1 as f64 - b.1).abs() < 1e-2
    }

    #[test]
    fn test_maps_corresponding_points() {
        let src = [(10.0, 5.0), (200.0, 20.0), (220.0, 160.0), (-5.0, 140.0)];
        let dst = [(0.0, 0.0), (99.0, 0.0), (99.0, 49.0), (0.0, 49.0)];
        let projection = get_perspective_transform(src, dst).unwrap();
        for (s, d) in src.iter().zip(dst.iter()) {
            assert!(close(projection * (s.0 as f32, s.1 as f32), *d));
        }
    }

    #[test]
    fn test_warp_fills_outside_source() {
        let src = RgbImage::from_fn(6, 6, |x, y| Rgb([(x * 10 + y) as u8, 0, 0]));
        // 向右平移1像素, 输出比源图宽
        let projection = get_perspective_transform(
            [(0.0, 0.0), (5.0, 0.0), (5.0, 5.0), (0.0, 5.0)],
            [(1.0, 0.0), (6.0, 0.0), (6.0, 5.0), (1.0, 5.0)],
        )
        .unwrap();
        let dst = warp_perspective_rgb(&src, &projection, (10, 6), Rgb([9, 9, 9]));
        assert_eq!(dst.dimensions(), (10, 6));
        assert_eq!(dst.get_pixel(9, 2), &Rgb([9, 9, 9]));
        let moved = dst.get_pixel(3, 2)[0] as i32;
        assert!((moved - src.get_pixel(2, 2)[0] as i32).abs() <= 1);
    }
}
