//! 错误类型定义
//! Error types for metadata validation and the distancing probe

use thiserror::Error;

/// 元数据校验错误 (Malformed metadata)
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MetaError {
    #[error("frame {frame_num} object {index}: non-finite box coordinates")]
    NonFiniteRect { frame_num: u64, index: usize },

    #[error("frame {frame_num} object {index}: negative box size {width}x{height}")]
    NegativeSize {
        frame_num: u64,
        index: usize,
        width: f32,
        height: f32,
    },

    #[error("frame {frame_num} object {index}: border color out of range")]
    InvalidColor { frame_num: u64, index: usize },

    #[error("batch holds {frames} frames, more than max_frames_in_batch={max}")]
    BatchOverflow { frames: usize, max: u32 },
}

/// 距离检测探针错误
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DistancingError {
    /// 探针不是由buffer触发的 (event/query)
    #[error("probe info carries no buffer")]
    NoBuffer,

    /// buffer上没有附加批次元数据
    #[error("buffer has no batch metadata attached")]
    MissingBatchMeta,

    #[error("malformed batch metadata: {0}")]
    Malformed(#[from] MetaError),
}
