// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use serde::Serialize;

use crate::detection::Rect;

/// 文档四边形, 顶点顺序 [左上, 右上, 右下, 左下]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Quad {
    pub points: [(f64, f64); 4],
}

fn distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

/// 第一个最小/最大值的下标
fn arg_by(values: &[f64; 4], better: impl Fn(f64, f64) -> bool) -> usize {
    let mut index = 0;
    for i in 1..4 {
        if better(values[i], values[index]) {
            index = i;
        }
    }
    index
}

/// 顶点排序 (和/差法)
///
/// - x+y 最小为左上, 最大为右下
/// - y-x 最小为右上, 最大为左下
pub fn order_points(pts: [(f64, f64); 4]) -> [(f64, f64); 4] {
    let sums = pts.map(|(x, y)| x + y);
    let diffs = pts.map(|(x, y)| y - x);
    [
        pts[arg_by(&sums, |a, b| a < b)],
        pts[arg_by(&diffs, |a, b| a < b)],
        pts[arg_by(&sums, |a, b| a > b)],
        pts[arg_by(&diffs, |a, b| a > b)],
    ]
}

impl Quad {
    /// 任意顺序的4个点
    pub fn from_points(pts: [(f64, f64); 4]) -> Self {
        Self {
            points: order_points(pts),
        }
    }

    pub fn top_left(&self) -> (f64, f64) {
        self.points[0]
    }

    pub fn top_right(&self) -> (f64, f64) {
        self.points[1]
    }

    pub fn bottom_right(&self) -> (f64, f64) {
        self.points[2]
    }

    pub fn bottom_left(&self) -> (f64, f64) {
        self.points[3]
    }

    /// 矫正后的精确尺寸 (宽, 高)
    ///
    /// 宽 = max(|右下-左下|, |右上-左上|), 高 = max(|右上-右下|, |左上-左下|)
    pub fn target_size(&self) -> (f64, f64) {
        let width_a = distance(self.bottom_right(), self.bottom_left());
        let width_b = distance(self.top_right(), self.top_left());
        let height_a = distance(self.top_right(), self.bottom_right());
        let height_b = distance(self.top_left(), self.bottom_left());
        (width_a.max(width_b), height_a.max(height_b))
    }

    /// 输出图像尺寸: 每条边长先截断为整数再取最大值
    pub fn output_size(&self) -> (u32, u32) {
        let width_a = distance(self.bottom_right(), self.bottom_left()) as u32;
        let width_b = distance(self.top_right(), self.top_left()) as u32;
        let height_a = distance(self.top_right(), self.bottom_right()) as u32;
        let height_b = distance(self.top_left(), self.bottom_left()) as u32;
        (width_a.max(width_b), height_a.max(height_b))
    }

    /// 包围盒 (含两端像素)
    pub fn bounding_rect(&self) -> Rect {
        let xs = self.points.map(|p| p.0);
        let ys = self.points.map(|p| p.1);
        let min_x = xs.iter().copied().fold(f64::INFINITY, f64::min).floor() as i32;
        let max_x = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max).floor() as i32;
        let min_y = ys.iter().copied().fold(f64::INFINITY, f64::min).floor() as i32;
        let max_y = ys.iter().copied().fold(f64::NEG_INFINITY, f64::max).floor() as i32;
        Rect::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_points_any_input_order() {
        let expected = [(0.0, 0.0), (100.0, 0.0), (100.0, 100.0), (0.0, 100.0)];
        assert_eq!(
            order_points([(100.0, 0.0), (0.0, 0.0), (100.0, 100.0), (0.0, 100.0)]),
            expected
        );
        assert_eq!(
            order_points([(0.0, 100.0), (100.0, 100.0), (100.0, 0.0), (0.0, 0.0)]),
            expected
        );
    }

    #[test]
    fn test_target_size_of_skewed_quad() {
        let quad = Quad::from_points([(0.0, 0.0), (200.0, 0.0), (210.0, 150.0), (-10.0, 150.0)]);
        assert_eq!(quad.top_right(), (200.0, 0.0));
        assert_eq!(quad.bottom_left(), (-10.0, 150.0));

        let (width, height) = quad.target_size();
        assert_eq!(width, 220.0);
        assert_eq!(height, 22600.0f64.sqrt());
        assert_eq!(quad.output_size(), (220, 150));
    }

    #[test]
    fn test_bounding_rect() {
        let quad = Quad::from_points([(40.0, 30.0), (160.0, 30.0), (160.0, 120.0), (40.0, 120.0)]);
        assert_eq!(quad.bounding_rect(), Rect::new(40, 30, 121, 91));
    }
}
