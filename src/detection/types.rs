// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use serde::{Deserialize, Serialize};

/// 像素坐标矩形 (x, y, width, height)
///
/// 检测结果只保证 `x, y >= 0`; 宽高可能来自退化的原始框, 调用方需自行校验
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn xmax(&self) -> i32 {
        self.x + self.width
    }

    pub fn ymax(&self) -> i32 {
        self.y + self.height
    }

    /// 退化框 (宽或高 <= 0) 面积为0
    pub fn area(&self) -> i64 {
        if self.is_degenerate() {
            0
        } else {
            self.width as i64 * self.height as i64
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn center(&self) -> (f32, f32) {
        (
            self.x as f32 + self.width as f32 / 2.0,
            self.y as f32 + self.height as f32 / 2.0,
        )
    }

    pub fn intersection_area(&self, another: &Rect) -> i64 {
        let l = self.x.max(another.x);
        let r = self.xmax().min(another.xmax());
        let t = self.y.max(another.y);
        let b = self.ymax().min(another.ymax());
        if r <= l || b <= t {
            return 0;
        }
        (r - l) as i64 * (b - t) as i64
    }

    pub fn union(&self, another: &Rect) -> i64 {
        self.area() + another.area() - self.intersection_area(another)
    }

    pub fn iou(&self, another: &Rect) -> f32 {
        if self.is_degenerate() || another.is_degenerate() {
            return 0.0;
        }
        let union = self.union(another);
        if union <= 0 {
            return 0.0;
        }
        self.intersection_area(another) as f32 / union as f32
    }

    /// 左上角截断到 >= 0, 宽高保持不变
    pub fn clamp_origin(self) -> Self {
        Self {
            x: self.x.max(0),
            y: self.y.max(0),
            ..self
        }
    }

    /// 裁剪到 `width x height` 画面内, 无交集时返回 None
    pub fn clip_to(&self, width: u32, height: u32) -> Option<Rect> {
        let l = self.x.max(0);
        let t = self.y.max(0);
        let r = self.xmax().min(width as i32);
        let b = self.ymax().min(height as i32);
        if r <= l || b <= t {
            return None;
        }
        Some(Rect::new(l, t, r - l, b - t))
    }
}

/// 检测结果 (Detection)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class_id: i32,
    pub class_name: String,
    pub confidence: f32,
    #[serde(rename = "box")]
    pub bbox: Rect,
}

/// 解码后、NMS前的候选框
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub bbox: Rect,
    pub class_id: i32,
    pub confidence: f32,
}

impl Candidate {
    pub fn new(bbox: Rect, class_id: i32, confidence: f32) -> Self {
        Self {
            bbox,
            class_id,
            confidence,
        }
    }
}

/// 类别名映射, 越界时合成 `unknown_<id>`
pub fn class_name_for(names: &[String], index: i64, class_id: i32) -> String {
    if index >= 0 && (index as usize) < names.len() {
        names[index as usize].clone()
    } else {
        format!("unknown_{}", class_id)
    }
}
