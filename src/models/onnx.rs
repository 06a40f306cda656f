// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// ONNX Runtime 推理后端
// 预处理: resize → NCHW f32 (按 PreprocessParams 缩放/通道顺序) → session.run

use std::path::Path;

use anyhow::{Context, Result};
use image::{imageops::FilterType, DynamicImage};
use ndarray::{Array, IxDyn};
use ort::execution_providers as ep;
use ort::session::Session;
use ort::value::Tensor;
use tracing::info;

use super::{ChannelOrder, ModelBackend, PreprocessParams};

/// 基于 ort 的模型后端
pub struct OnnxModel {
    session: Session,
    input_name: String,
    path: String,
}

impl OnnxModel {
    /// 加载 ONNX 模型; `use_gpu` 时注册 CUDA 执行器 (不可用时 ort 会回退到 CPU)
    pub fn load<P: AsRef<Path>>(model_path: P, use_gpu: bool) -> Result<Self> {
        let model_path = model_path.as_ref();
        let mut builder = Session::builder().context("failed to create ORT session builder")?;
        builder = builder
            .with_intra_threads(1)
            .context("failed to set ORT intra threads")?;
        if use_gpu {
            builder = builder
                .with_execution_providers([ep::CUDAExecutionProvider::default().build()])
                .context("failed to register CUDA execution provider")?;
        }
        let session = builder
            .commit_from_file(model_path)
            .with_context(|| format!("failed to load ONNX model {}", model_path.display()))?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .context("ONNX model has no inputs")?;

        info!("✅ ONNX 模型加载成功: {}", model_path.display());
        Ok(Self {
            session,
            input_name,
            path: model_path.display().to_string(),
        })
    }

    fn preprocess(frame: &DynamicImage, params: &PreprocessParams) -> Result<Tensor<f32>> {
        let (w, h) = (params.width, params.height);
        let resized = frame.resize_exact(w, h, FilterType::Triangle).to_rgb8();

        // NCHW float tensor: [1, 3, h, w]
        let size = (w * h) as usize;
        let mut data = vec![0f32; 3 * size];
        for (x, y, pixel) in resized.enumerate_pixels() {
            let idx = (y * w + x) as usize;
            let [r, g, b] = pixel.0;
            let (c0, c2) = match params.channel_order {
                ChannelOrder::Rgb => (r, b),
                ChannelOrder::Bgr => (b, r),
            };
            data[idx] = c0 as f32 * params.scale;
            data[size + idx] = g as f32 * params.scale;
            data[2 * size + idx] = c2 as f32 * params.scale;
        }

        let shape = [1usize, 3, h as usize, w as usize];
        Tensor::from_array((shape, data.into_boxed_slice()))
            .context("failed to create model input tensor")
    }
}

impl ModelBackend for OnnxModel {
    fn infer(
        &mut self,
        frame: &DynamicImage,
        params: &PreprocessParams,
    ) -> Result<Vec<Array<f32, IxDyn>>> {
        let input = Self::preprocess(frame, params)?;
        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => input])
            .context("ONNX inference failed")?;

        let mut ys = Vec::new();
        for (_name, value) in outputs.iter() {
            let (shape, data) = value
                .try_extract_tensor::<f32>()
                .context("failed to extract output tensor")?;
            let dims: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();
            ys.push(
                Array::from_shape_vec(IxDyn(&dims), data.to_vec())
                    .context("output tensor shape mismatch")?,
            );
        }
        Ok(ys)
    }

    fn summary(&self) -> String {
        format!("onnx: {} (input `{}`)", self.path, self.input_name)
    }
}
