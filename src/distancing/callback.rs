//! 探针回调: 在buffer的批次元数据上标记违规
//!
//! 回调在宿主线程上同步执行, 只借用 `PadProbeInfo`。
//! 先校验整个批次再修改, 失败时不会留下部分修改。

use super::{rules::find_violations, DistancingConfig};
use crate::error::DistancingError;
use crate::meta::FrameMeta;
use crate::probe::{Pad, PadProbeInfo, PadProbeReturn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// 单帧处理结果
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct FrameReport {
    pub source_id: u32,
    pub frame_num: u64,
    pub persons: usize,    // 参与比较的人数
    pub violations: usize, // 违规的人对数
    pub flagged: usize,    // 被标红的框数
}

/// 单个buffer处理结果
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct BatchReport {
    pub frames: Vec<FrameReport>,
}

impl BatchReport {
    pub fn persons(&self) -> usize {
        self.frames.iter().map(|f| f.persons).sum()
    }

    pub fn violations(&self) -> usize {
        self.frames.iter().map(|f| f.violations).sum()
    }

    pub fn flagged(&self) -> usize {
        self.frames.iter().map(|f| f.flagged).sum()
    }
}

/// 处理单帧: 将所有违规人对中的两个框都改为违规颜色
pub fn process_frame(frame: &mut FrameMeta, cfg: &DistancingConfig) -> FrameReport {
    let pairs = find_violations(&frame.objects, cfg);

    let mut flagged = vec![false; frame.objects.len()];
    for &(i, j) in &pairs {
        flagged[i] = true;
        flagged[j] = true;
    }
    for (obj, &close) in frame.objects.iter_mut().zip(&flagged) {
        if close {
            obj.rect_params.border_color = cfg.violation_color;
        }
    }

    FrameReport {
        source_id: frame.source_id,
        frame_num: frame.frame_num,
        persons: frame.objects.iter().filter(|o| cfg.is_person(o)).count(),
        violations: pairs.len(),
        flagged: flagged.iter().filter(|&&close| close).count(),
    }
}

/// 处理探针中的buffer
pub fn process_buffer(
    info: &mut PadProbeInfo,
    cfg: &DistancingConfig,
) -> Result<BatchReport, DistancingError> {
    let buffer = info.buffer_mut().ok_or(DistancingError::NoBuffer)?;
    let batch = buffer
        .batch_meta_mut()
        .ok_or(DistancingError::MissingBatchMeta)?;
    batch.validate()?;

    let frames = batch
        .frames
        .iter_mut()
        .map(|frame| process_frame(frame, cfg))
        .collect();
    Ok(BatchReport { frames })
}

/// 社交距离探针入口
///
/// 将距离小于框高的 person 框改为红色。
/// 返回 true 表示元数据已处理(包括没有违规的情况),
/// false 表示buffer缺少或带有损坏的元数据, 此时不做任何修改。
pub fn on_buffer_osd_distance(info: &mut PadProbeInfo) -> bool {
    match process_buffer(info, &DistancingConfig::default()) {
        Ok(report) => {
            debug!(
                persons = report.persons(),
                violations = report.violations(),
                "distancing processed"
            );
            true
        }
        Err(e) => {
            warn!("on_buffer_osd_distance failed: {}", e);
            false
        }
    }
}

/// 探针统计 (探针线程写, 其他线程读)
#[derive(Debug, Default)]
pub struct ProbeCounters {
    pub buffers: AtomicU64,
    pub failed: AtomicU64,
    pub frames: AtomicU64,
    pub persons: AtomicU64,
    pub violations: AtomicU64,
}

impl ProbeCounters {
    fn record(&self, report: &BatchReport) {
        self.buffers.fetch_add(1, Ordering::Relaxed);
        self.frames
            .fetch_add(report.frames.len() as u64, Ordering::Relaxed);
        self.persons
            .fetch_add(report.persons() as u64, Ordering::Relaxed);
        self.violations
            .fetch_add(report.violations() as u64, Ordering::Relaxed);
    }
}

/// 可配置的距离探针, 安装到OSD sink pad上
pub struct DistanceProbe {
    config: DistancingConfig,
    counters: Arc<ProbeCounters>,
}

impl DistanceProbe {
    pub fn new(config: DistancingConfig) -> Self {
        Self {
            config,
            counters: Arc::new(ProbeCounters::default()),
        }
    }

    pub fn counters(&self) -> Arc<ProbeCounters> {
        self.counters.clone()
    }

    /// 转换为pad探针回调
    ///
    /// 元数据错误只记录警告, 始终返回 `PadProbeReturn::Ok`, 不阻塞数据流
    pub fn into_callback(
        self,
    ) -> impl FnMut(&Pad, &mut PadProbeInfo) -> PadProbeReturn + Send + 'static {
        move |pad, info| {
            match process_buffer(info, &self.config) {
                Ok(report) => {
                    for frame in report.frames.iter().filter(|f| f.violations > 0) {
                        debug!(
                            pad = pad.name(),
                            source = frame.source_id,
                            frame = frame.frame_num,
                            violations = frame.violations,
                            "too close"
                        );
                    }
                    self.counters.record(&report);
                }
                Err(e) => {
                    self.counters.failed.fetch_add(1, Ordering::Relaxed);
                    warn!(pad = pad.name(), "distancing probe failed: {}", e);
                }
            }
            PadProbeReturn::Ok
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distancing::PERSON_CLASS_ID;
    use crate::error::MetaError;
    use crate::meta::{BatchMeta, ColorParams, ObjectMeta, RectParams};
    use crate::probe::{Buffer, Event, PadProbeData, PadProbeType};

    fn person(left: f32, top: f32, width: f32, height: f32) -> ObjectMeta {
        ObjectMeta::new(
            PERSON_CLASS_ID,
            "person",
            0.9,
            RectParams::new_from_xywh(left, top, width, height),
        )
    }

    fn info_with(objects: Vec<ObjectMeta>) -> PadProbeInfo {
        let mut frame = FrameMeta::new(0, 1, 1280, 720);
        frame.objects = objects;
        let buffer = Buffer::with_meta(0, 40, BatchMeta::single(frame));
        PadProbeInfo::new(1, PadProbeData::Buffer(buffer))
    }

    fn colors(info: &PadProbeInfo) -> Vec<ColorParams> {
        info.buffer().unwrap().batch_meta().unwrap().frames[0]
            .objects
            .iter()
            .map(|o| o.rect_params.border_color)
            .collect()
    }

    #[test]
    fn test_no_persons() {
        let mut car = person(0.0, 0.0, 50.0, 100.0);
        car.class_id = 0;
        let mut info = info_with(vec![car.clone(), car]);
        assert!(on_buffer_osd_distance(&mut info));
        assert_eq!(colors(&info), vec![ColorParams::GREEN; 2]);
    }

    #[test]
    fn test_single_person() {
        let mut info = info_with(vec![person(0.0, 0.0, 50.0, 100.0)]);
        assert!(on_buffer_osd_distance(&mut info));
        assert_eq!(colors(&info), vec![ColorParams::GREEN]);
    }

    #[test]
    fn test_close_pair_turns_red() {
        let mut info = info_with(vec![
            person(0.0, 0.0, 50.0, 100.0),
            person(60.0, 0.0, 50.0, 100.0),
        ]);
        assert!(on_buffer_osd_distance(&mut info));
        assert_eq!(colors(&info), vec![ColorParams::RED; 2]);
    }

    #[test]
    fn test_distant_pair_untouched() {
        let mut info = info_with(vec![
            person(0.0, 0.0, 50.0, 100.0),
            person(400.0, 0.0, 50.0, 100.0),
        ]);
        assert!(on_buffer_osd_distance(&mut info));
        assert_eq!(colors(&info), vec![ColorParams::GREEN; 2]);
    }

    #[test]
    fn test_only_pair_members_flagged() {
        let mut frame = FrameMeta::new(0, 1, 1280, 720);
        frame.objects = vec![
            person(0.0, 0.0, 50.0, 100.0),
            person(500.0, 0.0, 50.0, 100.0),
            person(40.0, 0.0, 50.0, 100.0),
        ];
        let report = process_frame(&mut frame, &DistancingConfig::default());
        assert_eq!(report.persons, 3);
        assert_eq!(report.violations, 1);
        assert_eq!(report.flagged, 2);
        assert_eq!(frame.objects[1].rect_params.border_color, ColorParams::GREEN);
    }

    #[test]
    fn test_missing_meta_returns_false() {
        let mut info = PadProbeInfo::new(1, PadProbeData::Buffer(Buffer::new(0, 40)));
        assert!(!on_buffer_osd_distance(&mut info));
        assert_eq!(
            process_buffer(&mut info, &DistancingConfig::default()),
            Err(DistancingError::MissingBatchMeta)
        );
    }

    #[test]
    fn test_event_returns_false() {
        let mut info = PadProbeInfo::new(1, PadProbeData::Event(Event::Eos));
        assert!(!on_buffer_osd_distance(&mut info));
    }

    #[test]
    fn test_malformed_meta_not_mutated() {
        let mut info = info_with(vec![
            person(0.0, 0.0, 50.0, 100.0),
            person(60.0, 0.0, 50.0, 100.0),
            person(f32::INFINITY, 0.0, 50.0, 100.0),
        ]);
        assert!(!on_buffer_osd_distance(&mut info));
        assert_eq!(colors(&info), vec![ColorParams::GREEN; 3]);
    }

    #[test]
    fn test_idempotent() {
        let mut info = info_with(vec![
            person(0.0, 0.0, 50.0, 100.0),
            person(60.0, 0.0, 50.0, 100.0),
            person(600.0, 0.0, 50.0, 100.0),
        ]);
        assert!(on_buffer_osd_distance(&mut info));
        let first = colors(&info);
        assert!(on_buffer_osd_distance(&mut info));
        assert_eq!(colors(&info), first);
        assert_eq!(
            first,
            vec![ColorParams::RED, ColorParams::RED, ColorParams::GREEN]
        );
    }

    #[test]
    fn test_distance_probe_counts() {
        let probe = DistanceProbe::new(DistancingConfig::default());
        let counters = probe.counters();
        let mut pad = Pad::new("osd-sink");
        pad.add_probe(PadProbeType::Buffer, probe.into_callback());

        let info = info_with(vec![
            person(0.0, 0.0, 50.0, 100.0),
            person(60.0, 0.0, 50.0, 100.0),
        ]);
        let data = info.data.unwrap();
        pad.push(data);
        pad.push(PadProbeData::Buffer(Buffer::new(40, 40)));

        assert_eq!(counters.buffers.load(Ordering::Relaxed), 1);
        assert_eq!(counters.failed.load(Ordering::Relaxed), 1);
        assert_eq!(counters.violations.load(Ordering::Relaxed), 1);
        assert_eq!(counters.persons.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_frame_report_matches_pairs() {
        // 0-1, 1-2 各自过近, 0-2 相距正好一个框高, 不算违规
        let mut frame = FrameMeta::new(0, 1, 1280, 720);
        frame.objects = vec![
            person(0.0, 0.0, 50.0, 100.0),
            person(50.0, 0.0, 50.0, 100.0),
            person(100.0, 0.0, 50.0, 100.0),
            person(900.0, 0.0, 50.0, 100.0),
        ];
        let cfg = DistancingConfig::default();
        let pairs = find_violations(&frame.objects, &cfg);
        let report = process_frame(&mut frame, &cfg);

        assert_eq!(pairs, vec![(0, 1), (1, 2)]);
        assert_eq!(report.violations, pairs.len());
        assert_eq!(report.flagged, 3);
        assert_eq!(report.persons, 4);
        assert_eq!(frame.objects[3].rect_params.border_color, ColorParams::GREEN);
    }

    #[test]
    fn test_negative_size_not_mutated() {
        let mut info = info_with(vec![
            person(0.0, 0.0, 50.0, 100.0),
            person(60.0, 0.0, 50.0, 100.0),
            person(200.0, 0.0, -50.0, 100.0),
        ]);
        assert!(!on_buffer_osd_distance(&mut info));
        assert!(matches!(
            process_buffer(&mut info, &DistancingConfig::default()),
            Err(DistancingError::Malformed(MetaError::NegativeSize { index: 2, .. }))
        ));
        assert_eq!(colors(&info), vec![ColorParams::GREEN; 3]);
    }

    #[test]
    fn test_invalid_color_not_mutated() {
        let mut bad = person(200.0, 0.0, 50.0, 100.0);
        bad.rect_params.border_color = ColorParams::new(0.0, 2.0, 0.0, 1.0);
        let mut info = info_with(vec![
            person(0.0, 0.0, 50.0, 100.0),
            person(60.0, 0.0, 50.0, 100.0),
            bad.clone(),
        ]);
        assert!(!on_buffer_osd_distance(&mut info));
        assert!(matches!(
            process_buffer(&mut info, &DistancingConfig::default()),
            Err(DistancingError::Malformed(MetaError::InvalidColor { index: 2, .. }))
        ));
        assert_eq!(
            colors(&info),
            vec![
                ColorParams::GREEN,
                ColorParams::GREEN,
                bad.rect_params.border_color
            ]
        );
    }
}
