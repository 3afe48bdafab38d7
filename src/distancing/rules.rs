//! 距离判定规则
//!
//! 坐标为帧像素坐标。两人的距离取两个框底边中点(脚底)之间的欧氏距离,
//! 距离严格小于阈值才算违规, 等于阈值不算。

use super::DistancingConfig;
use crate::meta::{ObjectMeta, RectParams};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// 阈值取两个框高中的哪一个
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceRule {
    /// 较高的框 (默认)
    #[default]
    MaxHeight,
    /// 较矮的框
    MinHeight,
    /// 两框平均高度
    MeanHeight,
}

impl DistanceRule {
    pub fn threshold(&self, a: &RectParams, b: &RectParams) -> f32 {
        match self {
            DistanceRule::MaxHeight => a.height.max(b.height),
            DistanceRule::MinHeight => a.height.min(b.height),
            DistanceRule::MeanHeight => (a.height + b.height) / 2.0,
        }
    }
}

impl FromStr for DistanceRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "max" | "max_height" => Ok(DistanceRule::MaxHeight),
            "min" | "min_height" => Ok(DistanceRule::MinHeight),
            "mean" | "mean_height" => Ok(DistanceRule::MeanHeight),
            other => Err(format!("unknown distance rule: {}", other)),
        }
    }
}

/// 两个框是否距离过近
pub fn are_too_close(a: &RectParams, b: &RectParams, rule: DistanceRule) -> bool {
    let distance = a.bottom_center().distance(&b.bottom_center());
    distance < rule.threshold(a, b)
}

/// 找出所有违规的人对 (i < j, 按索引升序)
pub fn find_violations(objects: &[ObjectMeta], cfg: &DistancingConfig) -> Vec<(usize, usize)> {
    let mut pairs = Vec::new();
    for (i, a) in objects.iter().enumerate() {
        if !cfg.is_person(a) {
            continue;
        }
        for (j, b) in objects.iter().enumerate().skip(i + 1) {
            if cfg.is_person(b) && are_too_close(&a.rect_params, &b.rect_params, cfg.distance_rule)
            {
                pairs.push((i, j));
            }
        }
    }
    pairs
}
