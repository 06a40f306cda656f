// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 闭合轮廓的多边形逼近
//!
//! 周长和面积直接用 `imageproc::geometry`; 这里只补上闭合轮廓的切分方式:
//! 先找轮廓上相距最远的两点, 在这两点处切成两段弧, 各自做 Douglas-Peucker.
//! 轮廓起点通常不是角点 (Canny 会把角磨圆), 从起点切分会丢掉真正的角.

use imageproc::geometry::approximate_polygon_dp;
pub use imageproc::geometry::{arc_length, contour_area};
use imageproc::point::Point;

fn distance_sq(a: Point<i32>, b: Point<i32>) -> i64 {
    let dx = (a.x - b.x) as i64;
    let dy = (a.y - b.y) as i64;
    dx * dx + dy * dy
}

/// 点到直线 (start, end) 的距离; 两点重合时返回欧氏距离
fn perpendicular_distance(p: Point<i32>, start: Point<i32>, end: Point<i32>) -> f64 {
    let dx = (end.x - start.x) as f64;
    let dy = (end.y - start.y) as f64;
    let len = (dx * dx + dy * dy).sqrt();
    if len == 0.0 {
        return (distance_sq(p, start) as f64).sqrt();
    }
    ((p.x - start.x) as f64 * dy - (p.y - start.y) as f64 * dx).abs() / len
}

/// 离 `points[from]` 最远的点的下标 (相同距离取第一个)
fn farthest_from(points: &[Point<i32>], from: usize) -> usize {
    let origin = points[from];
    let mut best = from;
    let mut best_d = 0;
    for (i, &p) in points.iter().enumerate() {
        let d = distance_sq(origin, p);
        if d > best_d {
            best = i;
            best_d = d;
        }
    }
    best
}

/// Douglas-Peucker 多边形逼近
///
/// 闭合轮廓: A = 离起点最远的点, B = 离 A 最远的点, 两段弧 A→B 和 B→A 分别简化.
/// 最后去掉离相邻两顶点连线不超过 `epsilon` 的顶点. 输出沿轮廓方向, 从 A/B 中下标较小者开始.
pub fn approx_poly_dp(points: &[Point<i32>], epsilon: f64, closed: bool) -> Vec<Point<i32>> {
    if points.len() < 3 || epsilon <= 0.0 {
        return points.to_vec();
    }
    if !closed {
        return approximate_polygon_dp(points, epsilon, false);
    }

    let a = farthest_from(points, 0);
    if a == 0 {
        // 所有点重合
        return vec![points[0]];
    }
    let b = farthest_from(points, a);
    let (first, second) = (a.min(b), a.max(b));

    let mut result = approximate_polygon_dp(&points[first..=second], epsilon, false);
    result.pop();
    let mut back: Vec<Point<i32>> = points[second..].to_vec();
    back.extend_from_slice(&points[..=first]);
    let mut tail = approximate_polygon_dp(&back, epsilon, false);
    tail.pop();
    result.extend(tail);

    // 去掉几乎共线的顶点
    let mut i = 0;
    while result.len() > 3 && i < result.len() {
        let n = result.len();
        let prev = result[(i + n - 1) % n];
        let next = result[(i + 1) % n];
        if perpendicular_distance(result[i], prev, next) <= epsilon {
            result.remove(i);
        } else {
            i += 1;
        }
    }
    result
}
