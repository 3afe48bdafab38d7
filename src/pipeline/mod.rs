/// 视频分析流水线 (Video Analytics Pipeline)
///
/// 三线程架构, 通过crossbeam channel通信:
/// - Source: 产生带元数据的buffer (独立线程)
/// - OSD:    osd-sink pad 上运行距离探针, 可选渲染PNG (独立线程)
/// - Sink:   写出处理后的元数据并统计 (调用线程)
pub mod sink;
pub mod source;

pub use sink::JsonlSink;
pub use source::{JsonlSource, Source, SyntheticSource};

use crate::config::AppConfig;
use crate::distancing::DistanceProbe;
use crate::osd;
use crate::probe::{Buffer, Event, FlowOutcome, Pad, PadProbeData, PadProbeType};
use ab_glyph::FontArc;
use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{bounded, Receiver, Sender};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Instant;
use tracing::{debug, error, info, warn};

pub const OSD_SINK_PAD: &str = "osd-sink";

/// 运行统计
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PipelineStats {
    pub buffers: u64,
    pub frames: u64,
    pub persons: u64,
    pub violations: u64,
    pub failed_buffers: u64,
    pub rendered: u64,
    pub elapsed_ms: f64,
}

pub struct Pipeline {
    config: AppConfig,
    source: Box<dyn Source>,
    output: Option<PathBuf>,
    render_dir: Option<PathBuf>,
    font: Option<FontArc>,
}

impl Pipeline {
    pub fn new(config: AppConfig, source: Box<dyn Source>) -> Self {
        Self {
            config,
            source,
            output: None,
            render_dir: None,
            font: None,
        }
    }

    pub fn with_output(mut self, path: PathBuf) -> Self {
        self.output = Some(path);
        self
    }

    pub fn with_render_dir(mut self, dir: PathBuf) -> Self {
        self.render_dir = Some(dir);
        self
    }

    pub fn with_font(mut self, font: FontArc) -> Self {
        self.font = Some(font);
        self
    }

    pub fn run(self) -> Result<PipelineStats> {
        let Pipeline {
            config,
            source,
            output,
            render_dir,
            font,
        } = self;
        config.validate()?;

        let start = Instant::now();
        info!("🚀 pipeline start, source: {}", source.name());

        if let Some(dir) = &render_dir {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        let mut sink = match &output {
            Some(path) => Some(JsonlSink::create(path)?),
            None => None,
        };

        // 解码线程 → OSD线程 → 调用线程
        let (tx_source, rx_source) = bounded::<PadProbeData>(config.queue_size);
        let (tx_sink, rx_sink) = bounded::<Buffer>(config.queue_size);

        let source_handle = thread::Builder::new()
            .name("source".into())
            .spawn(move || source_thread(source, tx_source))
            .context("failed to spawn source thread")?;

        let probe = DistanceProbe::new(config.distancing.clone());
        let counters = probe.counters();
        let render_cfg = config.render.clone();
        let osd_handle = thread::Builder::new()
            .name("osd".into())
            .spawn(move || {
                let render_dir = render_dir.filter(|_| render_cfg.enabled);
                let mut pad = Pad::new(OSD_SINK_PAD);
                pad.add_probe(PadProbeType::Buffer, probe.into_callback());
                osd_thread(pad, rx_source, tx_sink, render_dir, &render_cfg, font.as_ref())
            })
            .context("failed to spawn osd thread")?;

        let mut stats = PipelineStats::default();
        for buffer in rx_sink {
            stats.buffers += 1;
            if let Some(sink) = sink.as_mut() {
                sink.write_buffer(&buffer)?;
            }
        }
        if let Some(sink) = sink {
            sink.finish()?;
        }

        let produced = source_handle
            .join()
            .map_err(|_| anyhow!("source thread panicked"))??;
        stats.rendered = osd_handle
            .join()
            .map_err(|_| anyhow!("osd thread panicked"))??;

        stats.frames = counters.frames.load(Ordering::Relaxed);
        stats.persons = counters.persons.load(Ordering::Relaxed);
        stats.violations = counters.violations.load(Ordering::Relaxed);
        stats.failed_buffers = counters.failed.load(Ordering::Relaxed);
        stats.elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        if produced != stats.buffers {
            warn!("source produced {} buffers, sink got {}", produced, stats.buffers);
        }
        info!(
            "✅ pipeline done: {} buffers, {} violations, {:.1} ms",
            stats.buffers, stats.violations, stats.elapsed_ms
        );
        Ok(stats)
    }
}

/// 数据源线程: 读取buffer直到结束, 最后发送EOS
fn source_thread(mut source: Box<dyn Source>, tx: Sender<PadProbeData>) -> Result<u64> {
    info!("🎬 source thread started: {}", source.name());
    let mut count = 0;
    let result = loop {
        match source.next_buffer() {
            Ok(Some(buffer)) => {
                if tx.send(PadProbeData::Buffer(buffer)).is_err() {
                    // 下游已退出
                    break Ok(count);
                }
                count += 1;
            }
            Ok(None) => break Ok(count),
            Err(e) => {
                error!("source {} failed: {:#}", source.name(), e);
                break Err(e);
            }
        }
    };
    let _ = tx.send(PadProbeData::Event(Event::Eos));
    info!("source thread finished after {} buffers", count);
    result
}

/// OSD线程: buffer流过osd-sink pad (执行探针), 之后渲染并转发
fn osd_thread(
    mut pad: Pad,
    rx: Receiver<PadProbeData>,
    tx: Sender<Buffer>,
    render_dir: Option<PathBuf>,
    render_cfg: &crate::config::RenderConfig,
    font: Option<&FontArc>,
) -> Result<u64> {
    info!("🖼  osd thread started, pad {}", pad.name());
    let mut rendered = 0;

    while let Ok(data) = rx.recv() {
        match pad.push(data) {
            FlowOutcome::Passed(PadProbeData::Buffer(buffer)) => {
                if let (Some(dir), Some(batch)) = (&render_dir, buffer.batch_meta()) {
                    for frame in &batch.frames {
                        let path = osd::render_to_file(frame, dir, render_cfg, font)?;
                        debug!("rendered {}", path.display());
                        rendered += 1;
                    }
                }
                if tx.send(buffer).is_err() {
                    break;
                }
            }
            FlowOutcome::Passed(PadProbeData::Event(Event::Eos)) => {
                debug!("eos on {}", pad.name());
                break;
            }
            FlowOutcome::Passed(PadProbeData::Event(event)) => {
                debug!("event {:?} on {}", event, pad.name());
            }
            FlowOutcome::Dropped => {}
        }
    }

    info!("osd thread finished, {} frames rendered", rendered);
    Ok(rendered)
}
