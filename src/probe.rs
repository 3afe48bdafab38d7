//! Pad探针接口 (Pad probe surface)
//!
//! 宿主流水线在每个buffer/event经过pad时调用已安装的探针,
//! 探针借用 `PadProbeInfo` 完成本次调用, 不持有它。

use crate::meta::BatchMeta;
use std::cell::RefCell;
use tracing::debug;

/// 视频buffer (只保留时间戳与附加的批次元数据)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Buffer {
    pub pts: u64,
    pub duration: u64,
    meta: Option<BatchMeta>,
}

impl Buffer {
    pub fn new(pts: u64, duration: u64) -> Self {
        Self {
            pts,
            duration,
            meta: None,
        }
    }

    pub fn with_meta(pts: u64, duration: u64, meta: BatchMeta) -> Self {
        Self {
            pts,
            duration,
            meta: Some(meta),
        }
    }

    pub fn batch_meta(&self) -> Option<&BatchMeta> {
        self.meta.as_ref()
    }

    pub fn batch_meta_mut(&mut self) -> Option<&mut BatchMeta> {
        self.meta.as_mut()
    }

    pub fn attach_meta(&mut self, meta: BatchMeta) {
        self.meta = Some(meta);
    }

    pub fn take_meta(&mut self) -> Option<BatchMeta> {
        self.meta.take()
    }
}

/// 下游事件
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Eos,
    FlushStart,
    FlushStop,
    Custom(String),
}

/// 探针可以看到的数据
#[derive(Debug, Clone, PartialEq)]
pub enum PadProbeData {
    Buffer(Buffer),
    Event(Event),
}

/// 探针关心的数据类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PadProbeType {
    Buffer,
    EventDownstream,
    /// buffer + event
    All,
}

impl PadProbeType {
    fn matches(&self, data: &PadProbeData) -> bool {
        matches!(
            (self, data),
            (PadProbeType::All, _)
                | (PadProbeType::Buffer, PadProbeData::Buffer(_))
                | (PadProbeType::EventDownstream, PadProbeData::Event(_))
        )
    }
}

/// 探针返回值
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PadProbeReturn {
    /// 正常放行
    Ok,
    /// 丢弃该数据
    Drop,
    /// 移除探针并放行
    Remove,
    /// 放行, 不做任何处理
    Pass,
}

pub type ProbeId = u64;

/// 单次探针调用的信息
#[derive(Debug)]
pub struct PadProbeInfo {
    pub id: ProbeId,
    pub data: Option<PadProbeData>,
}

impl PadProbeInfo {
    pub fn new(id: ProbeId, data: PadProbeData) -> Self {
        Self {
            id,
            data: Some(data),
        }
    }

    pub fn buffer(&self) -> Option<&Buffer> {
        match &self.data {
            Some(PadProbeData::Buffer(buffer)) => Some(buffer),
            _ => None,
        }
    }

    pub fn buffer_mut(&mut self) -> Option<&mut Buffer> {
        match &mut self.data {
            Some(PadProbeData::Buffer(buffer)) => Some(buffer),
            _ => None,
        }
    }
}

pub type ProbeCallback = Box<dyn FnMut(&Pad, &mut PadProbeInfo) -> PadProbeReturn + Send>;

struct InstalledProbe {
    id: ProbeId,
    mask: PadProbeType,
    // 回调只在 push 期间借用; push 需要 &mut Pad, 回调拿到的是 &Pad, 不会重入
    callback: RefCell<ProbeCallback>,
}

/// push的结果
#[derive(Debug, Clone, PartialEq)]
pub enum FlowOutcome {
    /// 所有探针放行后的数据
    Passed(PadProbeData),
    /// 被某个探针丢弃
    Dropped,
}

/// Pad: 数据流经的连接点, 持有按安装顺序执行的探针
pub struct Pad {
    name: String,
    next_id: ProbeId,
    probes: Vec<InstalledProbe>,
}

impl Pad {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            next_id: 1,
            probes: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn num_probes(&self) -> usize {
        self.probes.len()
    }

    pub fn add_probe<F>(&mut self, mask: PadProbeType, callback: F) -> ProbeId
    where
        F: FnMut(&Pad, &mut PadProbeInfo) -> PadProbeReturn + Send + 'static,
    {
        let id = self.next_id;
        self.next_id += 1;
        self.probes.push(InstalledProbe {
            id,
            mask,
            callback: RefCell::new(Box::new(callback)),
        });
        debug!(pad = %self.name, id, ?mask, "probe installed");
        id
    }

    pub fn remove_probe(&mut self, id: ProbeId) -> bool {
        let before = self.probes.len();
        self.probes.retain(|p| p.id != id);
        before != self.probes.len()
    }

    /// 让数据流过该pad, 依次执行匹配的探针
    ///
    /// 探针列表在执行期间保持不变, 回调看到的 `&Pad` 包含所有已安装的探针;
    /// 返回 `Remove` 的探针在本次push结束后移除
    pub fn push(&mut self, data: PadProbeData) -> FlowOutcome {
        let mut info = PadProbeInfo::new(0, data);
        let mut removed = Vec::new();
        let mut dropped = false;

        let pad: &Pad = self;
        for probe in &pad.probes {
            let Some(current) = info.data.as_ref() else {
                break;
            };
            if !probe.mask.matches(current) {
                continue;
            }
            info.id = probe.id;
            let mut callback = probe.callback.borrow_mut();
            match (*callback)(pad, &mut info) {
                PadProbeReturn::Ok | PadProbeReturn::Pass => {}
                PadProbeReturn::Remove => removed.push(probe.id),
                PadProbeReturn::Drop => {
                    dropped = true;
                    break;
                }
            }
        }

        if !removed.is_empty() {
            self.probes.retain(|p| !removed.contains(&p.id));
        }

        match (dropped, info.data.take()) {
            (false, Some(data)) => FlowOutcome::Passed(data),
            _ => FlowOutcome::Dropped,
        }
    }
}

impl std::fmt::Debug for Pad {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pad")
            .field("name", &self.name)
            .field("probes", &self.probes.len())
            .finish()
    }
}
