// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod config; // 应用配置参数
pub mod distancing; // 社交距离探针
pub mod error; // 错误类型
pub mod meta; // 批次/帧/对象元数据
pub mod osd; // OSD渲染
pub mod pipeline; // 三线程流水线
pub mod probe; // Pad探针接口

pub use crate::config::{AppConfig, RenderConfig};
pub use crate::distancing::{
    on_buffer_osd_distance, DistanceProbe, DistanceRule, DistancingConfig, PERSON_CLASS_ID,
};
pub use crate::error::{DistancingError, MetaError};
pub use crate::meta::{BatchMeta, ColorParams, FrameMeta, ObjectMeta, RectParams};
pub use crate::pipeline::{Pipeline, PipelineStats};
pub use crate::probe::{Buffer, Pad, PadProbeInfo, PadProbeReturn, PadProbeType};

pub fn gen_time_string(delimiter: &str) -> String {
    let t_now = chrono::Local::now();
    let fmt = format!(
        "%Y{}%m{}%d{}%H{}%M{}%S",
        delimiter, delimiter, delimiter, delimiter, delimiter
    );
    t_now.format(&fmt).to_string()
}
