/// 社交距离检测 (Social Distancing)
///
/// 安装在OSD之前的buffer探针:
/// - rules:    两人之间的距离判定
/// - callback: 遍历批次元数据, 将距离过近的人框改为红色
///
/// ```text
/// 推理 → [osd-sink探针: on_buffer_osd_distance] → OSD渲染
/// ```
pub mod callback;
pub mod rules;

pub use callback::{
    on_buffer_osd_distance, process_buffer, process_frame, BatchReport, DistanceProbe,
    FrameReport, ProbeCounters,
};
pub use rules::{are_too_close, find_violations, DistanceRule};

use crate::meta::{ColorParams, ObjectMeta};
use serde::{Deserialize, Serialize};

/// DeepStream 四分类示例检测器 (vehicle/bicycle/person/roadsign) 中 person 的类别ID
pub const PERSON_CLASS_ID: i32 = 2;

/// 距离检测参数
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistancingConfig {
    pub person_class_id: i32,         // 参与比较的类别
    pub min_confidence: f32,          // 低于该置信度的框不参与比较
    pub violation_color: ColorParams, // 违规框颜色
    pub distance_rule: DistanceRule,  // 阈值取哪一个框高
}

impl Default for DistancingConfig {
    fn default() -> Self {
        Self {
            person_class_id: PERSON_CLASS_ID,
            min_confidence: 0.0,
            violation_color: ColorParams::RED,
            distance_rule: DistanceRule::MaxHeight,
        }
    }
}

impl DistancingConfig {
    pub fn is_person(&self, obj: &ObjectMeta) -> bool {
        obj.class_id == self.person_class_id && obj.confidence >= self.min_confidence
    }
}
