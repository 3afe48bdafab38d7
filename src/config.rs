//! 应用配置 - 通过JSON文件调整参数

use crate::distancing::DistancingConfig;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

/// OSD渲染参数
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub enabled: bool,          // 是否输出PNG
    pub draw_labels: bool,      // 是否绘制标签 (需要字体)
    pub label_scale: f32,       // 标签字号(像素)
    pub max_border_width: u32,
    pub max_canvas_pixels: u64, // 画布像素上限, 超过则拒绝渲染
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            draw_labels: true,
            label_scale: 18.0,
            max_border_width: 8,
            max_canvas_pixels: 8192 * 8192,
        }
    }
}

/// 应用配置
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    // === 距离检测 ===
    pub distancing: DistancingConfig,

    // === 流水线 ===
    pub queue_size: usize,        // 线程间队列长度
    pub frame_duration_ns: u64,   // 合成源每帧时长

    // === 渲染 ===
    pub render: RenderConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            distancing: DistancingConfig::default(),
            queue_size: 8,
            frame_duration_ns: 40_000_000, // 25fps
            render: RenderConfig::default(),
        }
    }
}

impl AppConfig {
    /// 从JSON文件加载配置, 文件不存在时写入并返回默认配置
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!("config {} not found, writing defaults", path.display());
            let config = Self::default();
            config.save(path)?;
            return Ok(config);
        }

        let json = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&json)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        config.validate()?;
        info!("config loaded from {}", path.display());
        Ok(config)
    }

    /// 保存配置到JSON文件
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).context("failed to serialize config")?;
        fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
        info!("config saved to {}", path.display());
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.queue_size == 0 {
            bail!("queue_size must be at least 1");
        }
        if !self.distancing.violation_color.is_valid() {
            bail!("violation_color channels must be within 0.0..=1.0");
        }
        if !(0.0..=1.0).contains(&self.distancing.min_confidence) {
            bail!("min_confidence must be within 0.0..=1.0");
        }
        if !self.render.label_scale.is_finite() || self.render.label_scale <= 0.0 {
            bail!("label_scale must be a positive number");
        }
        if self.render.max_canvas_pixels == 0 {
            bail!("max_canvas_pixels must be at least 1");
        }
        Ok(())
    }

    /// 打印当前配置
    pub fn print_summary(&self) {
        info!("person class id: {}", self.distancing.person_class_id);
        info!("min confidence: {:.2}", self.distancing.min_confidence);
        info!("distance rule: {:?}", self.distancing.distance_rule);
        info!("queue size: {}", self.queue_size);
        info!(
            "render: {} (labels: {})",
            self.render.enabled, self.render.draw_labels
        );
    }
}
