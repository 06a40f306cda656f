// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// 模型输出解码 (Box/Score Decoder)
// 两种输出布局:
//   - GridAnchor: YOLO darknet 导出, 每行 [cx, cy, w, h, obj, class_scores...]
//   - FlatRow:    SSD / Faster R-CNN, 每行 [image_id, class_id, conf, xmin, ymin, xmax, ymax]

use ndarray::{Array, IxDyn};

use super::types::{Candidate, Rect};

/// FlatRow 每行固定7个值
pub const FLAT_ROW_LEN: usize = 7;

/// 输出张量布局, 在 Detector 构造时选定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionLayout {
    /// `class_offset`: 类别分数起始通道 (darknet 为5, 第4通道是 objectness)
    GridAnchor { class_offset: usize },
    /// 类别编号从1开始
    FlatRow,
}

impl DetectionLayout {
    pub fn darknet() -> Self {
        DetectionLayout::GridAnchor { class_offset: 5 }
    }

    /// 该布局是否需要 NMS (FlatRow 输出已由网络内部抑制)
    pub fn needs_nms(&self) -> bool {
        matches!(self, DetectionLayout::GridAnchor { .. })
    }

    /// 解码全部输出张量, 返回 `confidence > conf_threshold` 的候选框
    pub fn decode(
        &self,
        outputs: &[Array<f32, IxDyn>],
        frame_width: u32,
        frame_height: u32,
        conf_threshold: f32,
    ) -> Vec<Candidate> {
        let mut candidates = Vec::new();
        for output in outputs {
            match *self {
                DetectionLayout::GridAnchor { class_offset } => decode_grid_anchor(
                    output,
                    class_offset,
                    frame_width,
                    frame_height,
                    conf_threshold,
                    &mut candidates,
                ),
                DetectionLayout::FlatRow => decode_flat_rows(
                    output,
                    frame_width,
                    frame_height,
                    conf_threshold,
                    &mut candidates,
                ),
            }
        }
        candidates
    }
}

/// 按最后一维切分为行 (张量可能是 [N, C], [1, N, C] 或 [1, 1, N, C])
fn rows_of(output: &Array<f32, IxDyn>) -> (Vec<f32>, usize) {
    let row_len = output.shape().last().copied().unwrap_or(0);
    (output.iter().copied().collect(), row_len)
}

fn decode_grid_anchor(
    output: &Array<f32, IxDyn>,
    class_offset: usize,
    frame_width: u32,
    frame_height: u32,
    conf_threshold: f32,
    candidates: &mut Vec<Candidate>,
) {
    let (data, row_len) = rows_of(output);
    if row_len <= class_offset || class_offset < 4 {
        return;
    }
    let (w0, h0) = (frame_width as f32, frame_height as f32);

    for row in data.chunks_exact(row_len) {
        let scores = &row[class_offset..];
        // argmax: 相同分数取第一个
        let mut class_id = 0;
        let mut confidence = scores[0];
        for (i, &s) in scores.iter().enumerate().skip(1) {
            if s > confidence {
                class_id = i;
                confidence = s;
            }
        }

        if !(confidence > conf_threshold) {
            continue;
        }

        let center_x = (row[0] * w0) as i32;
        let center_y = (row[1] * h0) as i32;
        let w = (row[2] * w0) as i32;
        let h = (row[3] * h0) as i32;
        let x = (center_x as f32 - w as f32 / 2.0) as i32;
        let y = (center_y as f32 - h as f32 / 2.0) as i32;

        candidates.push(Candidate::new(
            Rect::new(x, y, w, h),
            class_id as i32,
            confidence,
        ));
    }
}

fn decode_flat_rows(
    output: &Array<f32, IxDyn>,
    frame_width: u32,
    frame_height: u32,
    conf_threshold: f32,
    candidates: &mut Vec<Candidate>,
) {
    let (data, row_len) = rows_of(output);
    if row_len != FLAT_ROW_LEN {
        return;
    }
    let (w0, h0) = (frame_width as f32, frame_height as f32);

    for row in data.chunks_exact(FLAT_ROW_LEN) {
        let confidence = row[2];
        if !(confidence > conf_threshold) {
            continue;
        }
        let class_id = row[1] as i32;
        let x_min = (row[3] * w0) as i32;
        let y_min = (row[4] * h0) as i32;
        let x_max = (row[5] * w0) as i32;
        let y_max = (row[6] * h0) as i32;

        candidates.push(Candidate::new(
            Rect::new(x_min, y_min, x_max - x_min, y_max - y_min),
            class_id,
            confidence,
        ));
    }
}
