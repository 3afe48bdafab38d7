/// 元数据系统 (Metadata System)
///
/// 推理阶段附加到每个buffer上的批次元数据:
/// - BatchMeta:  一个buffer中的所有帧
/// - FrameMeta:  单帧的检测对象
/// - ObjectMeta: 单个检测框 + OSD显示参数
pub mod types;

pub use types::{
    BatchMeta, ColorParams, FrameMeta, ObjectMeta, Point2, RectParams, UNTRACKED_OBJECT_ID,
};
