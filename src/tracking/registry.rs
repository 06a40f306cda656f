// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 跟踪器注册表 (Tracker Registry)
//!
//! 拥有所有活动跟踪器, 以及每个出现过的目标的轨迹历史.
//! 状态机: `Active --update--> Active`, `Active --stop--> Stopped`, Stopped 之后不再转换.
//! 所有方法都需要 `&mut self`, 跨线程使用时由单一所有者 (见 pipeline) 串行调用.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use image::DynamicImage;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::algorithm::{CorrelationTrackerFactory, TrackerFactory, TrackerKind, TrackingAlgorithm};
use crate::detection::Rect;
use crate::error::{Result, VisionError};
use crate::unix_timestamp;

/// 停止原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StopReason {
    /// 调用 stop_tracking
    Explicit,
    /// 更新失败后自动停止
    Lost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrackState {
    Active,
    Stopped(StopReason),
}

/// 单个跟踪目标
pub struct Track {
    pub id: String,
    pub kind: TrackerKind,
    pub state: TrackState,
    pub last_box: Rect,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub frames_tracked: u32,
    /// 创建序号, 用于按创建顺序遍历活动跟踪
    seq: u64,
    handle: Option<Box<dyn TrackingAlgorithm + Send>>,
}

impl Track {
    pub fn is_active(&self) -> bool {
        self.state == TrackState::Active
    }
}

impl fmt::Debug for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Track")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("state", &self.state)
            .field("last_box", &self.last_box)
            .field("created_at", &self.created_at)
            .field("last_updated", &self.last_updated)
            .field("frames_tracked", &self.frames_tracked)
            .field("has_handle", &self.handle.is_some())
            .finish()
    }
}

/// 轨迹历史, 只追加; positions 与 timestamps 长度始终相同
#[derive(Debug, Clone, Default, Serialize)]
pub struct TrackHistory {
    positions: Vec<Rect>,
    timestamps: Vec<DateTime<Utc>>,
}

impl TrackHistory {
    fn push(&mut self, position: Rect, timestamp: DateTime<Utc>) {
        self.positions.push(position);
        self.timestamps.push(timestamp);
    }

    pub fn positions(&self) -> &[Rect] {
        &self.positions
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn last(&self) -> Option<&Rect> {
        self.positions.last()
    }

    /// 轨迹中心点序列 (用于绘制轨迹线)
    pub fn centers(&self) -> Vec<(f32, f32)> {
        self.positions.iter().map(Rect::center).collect()
    }
}

/// 单次更新结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackUpdate {
    Tracked(Rect),
    Lost,
}

/// 活动跟踪和已停止的记录分开存放, 更新和停止只查活动表
pub struct TrackerRegistry {
    factory: Box<dyn TrackerFactory + Send>,
    default_kind: TrackerKind,
    active: HashMap<String, Track>,
    stopped: HashMap<String, Track>,
    histories: HashMap<String, TrackHistory>,
    next_serial: u64,
}

impl TrackerRegistry {
    pub fn new(factory: Box<dyn TrackerFactory + Send>, default_kind: TrackerKind) -> Self {
        Self {
            factory,
            default_kind,
            active: HashMap::new(),
            stopped: HashMap::new(),
            histories: HashMap::new(),
            next_serial: 0,
        }
    }

    /// 使用内置相关滤波跟踪器
    pub fn with_kind(default_kind: TrackerKind) -> Self {
        Self::new(Box::new(CorrelationTrackerFactory), default_kind)
    }

    pub fn default_kind(&self) -> TrackerKind {
        self.default_kind
    }

    /// 生成可读的唯一ID: `<prefix>_<unix秒>_<序号>`
    ///
    /// 序号在注册表生命周期内单调递增, 同一秒内创建多个跟踪也不会冲突
    pub fn generate_id(&mut self, prefix: &str) -> String {
        loop {
            let id = format!("{}_{}_{}", prefix, unix_timestamp(), self.next_serial);
            self.next_serial += 1;
            if !self.histories.contains_key(&id) {
                return id;
            }
        }
    }

    /// 初始化跟踪
    ///
    /// `kind` 为 None 时使用注册表默认算法; `id` 为 None 时生成 `track_` 前缀的ID.
    /// 初始化失败时不记录任何内容
    pub fn init_tracking(
        &mut self,
        frame: &DynamicImage,
        roi: Rect,
        kind: Option<TrackerKind>,
        id: Option<String>,
    ) -> Result<String> {
        if let Some(id) = id.as_ref() {
            if self.histories.contains_key(id) {
                warn!("⚠️ 跟踪ID已被使用: {}", id);
                return Err(VisionError::DuplicateTrackId(id.clone()));
            }
        }

        let kind = kind.unwrap_or(self.default_kind);
        let mut handle = self.factory.create(kind);
        if !handle.init(frame, roi) {
            error!("❌ 跟踪器初始化失败: {:?}", roi);
            return Err(VisionError::TrackInitFailure(roi));
        }

        let id = match id {
            Some(id) => id,
            None => self.generate_id("track"),
        };
        let seq = self.next_serial;
        self.next_serial += 1;
        let now = Utc::now();
        self.active.insert(
            id.clone(),
            Track {
                id: id.clone(),
                kind,
                state: TrackState::Active,
                last_box: roi,
                created_at: now,
                last_updated: now,
                frames_tracked: 1,
                seq,
                handle: Some(handle),
            },
        );
        self.histories
            .entry(id.clone())
            .or_default()
            .push(roi, now);

        info!("🎯 开始跟踪 {} ({}) {:?}", id, kind, roi);
        Ok(id)
    }

    /// 更新跟踪
    ///
    /// 成功时更新 last_box / last_updated / frames_tracked 并追加历史;
    /// 失败 (目标丢失) 时返回 `TrackUpdate::Lost`, 不改变状态, 由调用方决定是否停止
    pub fn update_tracking(&mut self, frame: &DynamicImage, id: &str) -> Result<TrackUpdate> {
        let track = match self.active.get_mut(id) {
            Some(track) => track,
            None => {
                warn!("⚠️ 无效的跟踪ID: {}", id);
                return Err(VisionError::InvalidTrackId(id.to_string()));
            }
        };
        let handle = match track.handle.as_mut() {
            Some(handle) => handle,
            None => return Err(VisionError::InvalidTrackId(id.to_string())),
        };

        match handle.update(frame) {
            Some(bbox) => {
                let now = Utc::now();
                track.last_box = bbox;
                track.last_updated = now;
                track.frames_tracked += 1;
                self.histories
                    .entry(track.id.clone())
                    .or_default()
                    .push(bbox, now);
                Ok(TrackUpdate::Tracked(bbox))
            }
            None => {
                debug!("跟踪 {} 本帧丢失", id);
                Ok(TrackUpdate::Lost)
            }
        }
    }

    /// 停止跟踪: 释放跟踪器, 保留历史; 未知或已停止的ID返回 false
    pub fn stop_tracking(&mut self, id: &str) -> bool {
        self.stop_with_reason(id, StopReason::Explicit)
    }

    pub fn stop_with_reason(&mut self, id: &str, reason: StopReason) -> bool {
        match self.active.remove(id) {
            Some(mut track) => {
                track.handle = None;
                track.state = TrackState::Stopped(reason);
                match reason {
                    StopReason::Explicit => info!("🛑 停止跟踪 {}", id),
                    StopReason::Lost => info!("👻 目标丢失, 停止跟踪 {}", id),
                }
                self.stopped.insert(track.id.clone(), track);
                true
            }
            None => false,
        }
    }

    /// 停止所有活动跟踪, 返回停止的数量
    pub fn stop_all(&mut self) -> usize {
        let ids = self.active_ids();
        ids.iter().filter(|id| self.stop_tracking(id)).count()
    }

    pub fn track(&self, id: &str) -> Option<&Track> {
        self.active.get(id).or_else(|| self.stopped.get(id))
    }

    /// 所有跟踪记录 (活动 + 已停止), 无固定顺序
    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.active.values().chain(self.stopped.values())
    }

    pub fn history(&self, id: &str) -> Option<&TrackHistory> {
        self.histories.get(id)
    }

    /// 所有轨迹 (包括已停止的)
    pub fn histories(&self) -> &HashMap<String, TrackHistory> {
        &self.histories
    }

    /// 活动跟踪ID, 按创建顺序
    pub fn active_ids(&self) -> Vec<String> {
        let mut active: Vec<&Track> = self.active.values().collect();
        active.sort_by_key(|t| t.seq);
        active.into_iter().map(|t| t.id.clone()).collect()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn stopped_count(&self) -> usize {
        self.stopped.len()
    }
}

impl Default for TrackerRegistry {
    fn default() -> Self {
        Self::with_kind(TrackerKind::default())
    }
}
