/// 数据源 (Source)
/// 职责: 产生带批次元数据的buffer, 结束时返回None
use crate::distancing::PERSON_CLASS_ID;
use crate::meta::{BatchMeta, FrameMeta, ObjectMeta, RectParams};
use crate::probe::Buffer;
use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

pub trait Source: Send {
    fn name(&self) -> &str;

    /// 下一个buffer, 数据结束时返回None
    fn next_buffer(&mut self) -> Result<Option<Buffer>>;
}

/// JSON Lines 文件源
///
/// 每行一个批次元数据; `null` 表示该buffer没有附加元数据
pub struct JsonlSource {
    name: String,
    lines: Lines<BufReader<File>>,
    line_no: usize,
    frame_duration: u64,
    count: u64,
}

impl JsonlSource {
    pub fn open(path: impl AsRef<Path>, frame_duration: u64) -> Result<Self> {
        let path = path.as_ref();
        let file =
            File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        Ok(Self {
            name: path.display().to_string(),
            lines: BufReader::new(file).lines(),
            line_no: 0,
            frame_duration,
            count: 0,
        })
    }
}

impl Source for JsonlSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_buffer(&mut self) -> Result<Option<Buffer>> {
        loop {
            let Some(line) = self.lines.next() else {
                return Ok(None);
            };
            self.line_no += 1;
            let line = line.with_context(|| format!("{}: read error", self.name))?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let meta: Option<BatchMeta> = serde_json::from_str(line)
                .with_context(|| format!("{}:{}: invalid batch", self.name, self.line_no))?;
            let pts = self.count * self.frame_duration;
            self.count += 1;

            let mut buffer = Buffer::new(pts, self.frame_duration);
            if let Some(meta) = meta {
                buffer.attach_meta(meta);
            }
            return Ok(Some(buffer));
        }
    }
}

/// 随机行走的人
#[derive(Clone, Debug)]
struct Walker {
    x: f32, // 脚底中点
    y: f32,
    vx: f32,
    vy: f32,
}

/// 合成数据源: 在画面中随机行走的人 (无需视频和模型即可演示)
pub struct SyntheticSource {
    frames: u64,
    width: u32,
    height: u32,
    class_id: i32,
    frame_duration: u64,
    walkers: Vec<Walker>,
    rng: StdRng,
    count: u64,
}

impl SyntheticSource {
    /// 宽高为0时按1像素处理
    pub fn new(frames: u64, persons: usize, width: u32, height: u32, seed: u64) -> Self {
        let (width, height) = (width.max(1), height.max(1));
        let mut rng = StdRng::seed_from_u64(seed);
        let walkers = (0..persons)
            .map(|_| Walker {
                x: rng.gen_range(0.0..width as f32),
                y: rng.gen_range(height as f32 * 0.3..height as f32),
                vx: rng.gen_range(-4.0..4.0),
                vy: rng.gen_range(-2.0..2.0),
            })
            .collect();
        Self {
            frames,
            width,
            height,
            class_id: PERSON_CLASS_ID,
            frame_duration: 40_000_000,
            walkers,
            rng,
            count: 0,
        }
    }

    pub fn with_class_id(mut self, class_id: i32) -> Self {
        self.class_id = class_id;
        self
    }

    pub fn with_frame_duration(mut self, frame_duration: u64) -> Self {
        self.frame_duration = frame_duration;
        self
    }

    /// 透视: 越靠近画面底部人越高
    fn person_height(&self, y: f32) -> f32 {
        self.height as f32 * (0.15 + 0.25 * y / self.height as f32)
    }

    fn step(&mut self) {
        let (w, h) = (self.width as f32, self.height as f32);
        for walker in self.walkers.iter_mut() {
            walker.vx = (walker.vx + self.rng.gen_range(-0.5..0.5)).clamp(-6.0, 6.0);
            walker.vy = (walker.vy + self.rng.gen_range(-0.3..0.3)).clamp(-3.0, 3.0);
            walker.x += walker.vx;
            walker.y += walker.vy;
            if walker.x < 0.0 || walker.x > w {
                walker.vx = -walker.vx;
                walker.x = walker.x.clamp(0.0, w);
            }
            if walker.y < h * 0.3 || walker.y > h {
                walker.vy = -walker.vy;
                walker.y = walker.y.clamp(h * 0.3, h);
            }
        }
    }
}

impl Source for SyntheticSource {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn next_buffer(&mut self) -> Result<Option<Buffer>> {
        if self.count >= self.frames {
            return Ok(None);
        }

        let mut frame = FrameMeta::new(0, self.count, self.width, self.height);
        frame.pts = self.count * self.frame_duration;
        for walker in &self.walkers {
            let height = self.person_height(walker.y);
            let width = height * 0.4;
            let rect = RectParams::new_from_xywh(
                walker.x - width / 2.0,
                walker.y - height,
                width,
                height,
            );
            let confidence = self.rng.gen_range(0.5..1.0);
            frame.add_object(ObjectMeta::new(self.class_id, "person", confidence, rect));
        }

        let buffer = Buffer::with_meta(frame.pts, self.frame_duration, BatchMeta::single(frame));
        self.count += 1;
        self.step();
        Ok(Some(buffer))
    }
}
