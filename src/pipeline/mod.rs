// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 帧处理流水线 (Frame Pipeline)
//!
//! 双线程架构, 通过单槽 crossbeam 通道通信:
//! - Producer: 帧采集 (独立线程), 检测线程忙时直接丢帧
//! - Consumer: 检测 + 跟踪 (独立线程), 独占 DetectAndTrack, 是注册表的唯一写者
//!
//! 结果通过 `reports()` 通道输出, `join()` 取回编排器和统计信息
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{bounded, Receiver, TrySendError};
use image::DynamicImage;
use tracing::{debug, info, warn};

use crate::document::DocumentLocator;
use crate::tracking::{DetectAndTrack, TrackingReport};

/// 帧来源 (摄像头/视频/内存)
pub trait FrameSource: Send {
    /// 下一帧; None 表示来源已结束
    fn next_frame(&mut self) -> Option<DynamicImage>;
}

impl<F> FrameSource for F
where
    F: FnMut() -> Option<DynamicImage> + Send,
{
    fn next_frame(&mut self) -> Option<DynamicImage> {
        self()
    }
}

/// 内存帧来源, 可选固定帧间隔 (模拟摄像头帧率)
pub struct VecFrameSource {
    frames: VecDeque<DynamicImage>,
    interval: Option<Duration>,
}

impl VecFrameSource {
    pub fn new(frames: Vec<DynamicImage>) -> Self {
        Self {
            frames: frames.into(),
            interval: None,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for VecFrameSource {
    fn next_frame(&mut self) -> Option<DynamicImage> {
        if let Some(interval) = self.interval {
            thread::sleep(interval);
        }
        self.frames.pop_front()
    }
}

/// 流水线参数
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// 只为这些类别创建跟踪 (None = 全部)
    pub allowed_classes: Option<Vec<String>>,
    /// None = 编排器默认值
    pub min_confidence: Option<f32>,
    /// 结果通道容量, 满时丢弃结果
    pub report_capacity: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            allowed_classes: None,
            min_confidence: None,
            report_capacity: 64,
        }
    }
}

/// 单帧结果 (检测线程 → 调用方)
#[derive(Debug, Clone)]
pub struct FrameReport {
    pub frame_index: u64, // 帧序号 (从0开始, 包括被丢弃的帧)
    pub report: TrackingReport,
}

/// 运行统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub frames: u64,
    pub processed: u64,
    pub dropped: u64,
    pub reports_dropped: u64,
}

pub struct FramePipeline {
    stop: Arc<AtomicBool>,
    producer: Option<JoinHandle<(u64, u64)>>,
    consumer: Option<JoinHandle<(DetectAndTrack, u64, u64)>>,
    reports: Receiver<FrameReport>,
}

impl FramePipeline {
    /// 启动采集线程和检测线程
    pub fn spawn<S>(source: S, orchestrator: DetectAndTrack, options: PipelineOptions) -> Result<Self>
    where
        S: FrameSource + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let (frame_tx, frame_rx) = bounded::<(u64, DynamicImage)>(1);
        let (report_tx, report_rx) = bounded::<FrameReport>(options.report_capacity.max(1));

        let producer_stop = stop.clone();
        let producer = thread::Builder::new()
            .name("frame-producer".to_string())
            .spawn(move || {
                let mut source = source;
                let mut frames = 0u64;
                let mut dropped = 0u64;
                while !producer_stop.load(Ordering::Relaxed) {
                    let frame = match source.next_frame() {
                        Some(frame) => frame,
                        None => break,
                    };
                    let index = frames;
                    frames += 1;
                    match frame_tx.try_send((index, frame)) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => {
                            dropped += 1;
                            debug!("⏭️ 检测线程忙, 丢弃第 {} 帧", index);
                        }
                        Err(TrySendError::Disconnected(_)) => break,
                    }
                }
                info!("📹 采集线程结束: 共 {} 帧, 丢弃 {} 帧", frames, dropped);
                (frames, dropped)
            })
            .context("failed to spawn frame producer")?;

        let consumer_stop = stop.clone();
        let consumer = thread::Builder::new()
            .name("detect-and-track".to_string())
            .spawn(move || {
                let mut orchestrator = orchestrator;
                let allowed: Option<Vec<&str>> = options
                    .allowed_classes
                    .as_ref()
                    .map(|classes| classes.iter().map(String::as_str).collect());
                let mut processed = 0u64;
                let mut reports_dropped = 0u64;

                for (frame_index, frame) in frame_rx.iter() {
                    if consumer_stop.load(Ordering::Relaxed) {
                        break;
                    }
                    let report = orchestrator.detect_and_track(
                        &frame,
                        allowed.as_deref(),
                        options.min_confidence,
                    );
                    processed += 1;
                    if report_tx
                        .try_send(FrameReport {
                            frame_index,
                            report,
                        })
                        .is_err()
                    {
                        reports_dropped += 1;
                    }
                }
                info!("🔍 检测线程结束: 处理 {} 帧", processed);
                (orchestrator, processed, reports_dropped)
            });
        let consumer = match consumer {
            Ok(handle) => handle,
            Err(e) => {
                stop.store(true, Ordering::Relaxed);
                return Err(e).context("failed to spawn detect-and-track worker");
            }
        };

        Ok(Self {
            stop,
            producer: Some(producer),
            consumer: Some(consumer),
            reports: report_rx,
        })
    }

    /// 结果通道
    pub fn reports(&self) -> &Receiver<FrameReport> {
        &self.reports
    }

    /// 请求停止, 两个线程在当前帧结束后退出
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// 等待线程结束, 取回编排器 (及其注册表) 和统计信息
    pub fn join(mut self) -> Result<(DetectAndTrack, PipelineStats)> {
        let (frames, dropped) = self
            .producer
            .take()
            .ok_or_else(|| anyhow!("frame producer already joined"))?
            .join()
            .map_err(|_| anyhow!("frame producer panicked"))?;
        let (orchestrator, processed, reports_dropped) = self
            .consumer
            .take()
            .ok_or_else(|| anyhow!("detect-and-track worker already joined"))?
            .join()
            .map_err(|_| anyhow!("detect-and-track worker panicked"))?;

        Ok((
            orchestrator,
            PipelineStats {
                frames,
                processed,
                dropped,
                reports_dropped,
            },
        ))
    }
}

impl Drop for FramePipeline {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

/// 从来源获取一帧并定位文档; 来源无帧时返回 None
pub fn capture_document<S>(
    source: &mut S,
    locator: &DocumentLocator,
    rectify: bool,
) -> Option<DynamicImage>
where
    S: FrameSource + ?Sized,
{
    match source.next_frame() {
        Some(frame) => Some(locator.locate(&frame, rectify)),
        None => {
            warn!("⚠️ 无法获取帧");
            None
        }
    }
}
