// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use crate::error::MetaError;
use image::Rgba;
use serde::{Deserialize, Serialize};

/// 未被追踪器分配ID的对象
pub const UNTRACKED_OBJECT_ID: u64 = u64::MAX;

#[derive(Debug, PartialEq, Clone, Copy, Default)]
pub struct Point2 {
    // A point2d in frame pixels
    x: f32,
    y: f32,
}

impl Point2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn x(&self) -> f32 {
        self.x
    }

    pub fn y(&self) -> f32 {
        self.y
    }

    pub fn distance(&self, another: &Point2) -> f32 {
        ((self.x - another.x).powi(2) + (self.y - another.y).powi(2)).sqrt()
    }
}

/// OSD颜色 (各通道 0.0 ~ 1.0)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorParams {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
    pub alpha: f64,
}

impl ColorParams {
    pub const RED: ColorParams = ColorParams::new(1.0, 0.0, 0.0, 1.0);
    pub const GREEN: ColorParams = ColorParams::new(0.0, 1.0, 0.0, 1.0);
    pub const BLUE: ColorParams = ColorParams::new(0.0, 0.0, 1.0, 1.0);
    pub const WHITE: ColorParams = ColorParams::new(1.0, 1.0, 1.0, 1.0);

    pub const fn new(red: f64, green: f64, blue: f64, alpha: f64) -> Self {
        Self {
            red,
            green,
            blue,
            alpha,
        }
    }

    pub fn is_valid(&self) -> bool {
        [self.red, self.green, self.blue, self.alpha]
            .iter()
            .all(|c| (0.0..=1.0).contains(c))
    }

    /// 转换为8位RGBA像素 (用于渲染)
    pub fn to_rgba(&self) -> Rgba<u8> {
        let q = |c: f64| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        Rgba([q(self.red), q(self.green), q(self.blue), q(self.alpha)])
    }
}

impl Default for ColorParams {
    fn default() -> Self {
        Self::GREEN
    }
}

fn default_border_width() -> u32 {
    3
}

/// OSD矩形框参数 (帧像素坐标, 原点左上角, y轴向下)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RectParams {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
    #[serde(default = "default_border_width")]
    pub border_width: u32,
    #[serde(default)]
    pub border_color: ColorParams,
    #[serde(default)]
    pub has_bg_color: bool,
    #[serde(default)]
    pub bg_color: Option<ColorParams>,
}

impl RectParams {
    pub fn new_from_xywh(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
            border_width: default_border_width(),
            border_color: ColorParams::default(),
            has_bg_color: false,
            bg_color: None,
        }
    }

    pub fn right(&self) -> f32 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }

    pub fn center(&self) -> Point2 {
        Point2::new(self.left + self.width / 2., self.top + self.height / 2.)
    }

    /// 底边中点 (人的脚底位置)
    pub fn bottom_center(&self) -> Point2 {
        Point2::new(self.left + self.width / 2., self.bottom())
    }

    pub fn is_finite(&self) -> bool {
        self.left.is_finite()
            && self.top.is_finite()
            && self.width.is_finite()
            && self.height.is_finite()
    }
}

/// 单个检测对象
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectMeta {
    #[serde(default = "untracked")]
    pub object_id: u64,
    pub class_id: i32,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub confidence: f32,
    pub rect_params: RectParams,
}

fn untracked() -> u64 {
    UNTRACKED_OBJECT_ID
}

impl ObjectMeta {
    pub fn new(class_id: i32, label: &str, confidence: f32, rect_params: RectParams) -> Self {
        Self {
            object_id: UNTRACKED_OBJECT_ID,
            class_id,
            label: label.to_string(),
            confidence,
            rect_params,
        }
    }

    pub fn is_tracked(&self) -> bool {
        self.object_id != UNTRACKED_OBJECT_ID
    }
}

/// 单帧元数据
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FrameMeta {
    #[serde(default)]
    pub source_id: u32,
    pub frame_num: u64,
    #[serde(default)]
    pub pts: u64,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub objects: Vec<ObjectMeta>,
}

impl FrameMeta {
    pub fn new(source_id: u32, frame_num: u64, width: u32, height: u32) -> Self {
        Self {
            source_id,
            frame_num,
            width,
            height,
            ..Default::default()
        }
    }

    pub fn add_object(&mut self, object: ObjectMeta) {
        self.objects.push(object);
    }

    pub fn validate(&self) -> Result<(), MetaError> {
        for (index, obj) in self.objects.iter().enumerate() {
            let rect = &obj.rect_params;
            if !rect.is_finite() {
                return Err(MetaError::NonFiniteRect {
                    frame_num: self.frame_num,
                    index,
                });
            }
            if rect.width < 0.0 || rect.height < 0.0 {
                return Err(MetaError::NegativeSize {
                    frame_num: self.frame_num,
                    index,
                    width: rect.width,
                    height: rect.height,
                });
            }
            if !rect.border_color.is_valid() {
                return Err(MetaError::InvalidColor {
                    frame_num: self.frame_num,
                    index,
                });
            }
        }
        Ok(())
    }
}

/// 批次元数据 (一个buffer对应一个批次)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BatchMeta {
    #[serde(default)]
    pub max_frames_in_batch: u32,
    #[serde(default)]
    pub frames: Vec<FrameMeta>,
}

impl BatchMeta {
    pub fn new(max_frames_in_batch: u32) -> Self {
        Self {
            max_frames_in_batch,
            frames: Vec::new(),
        }
    }

    /// 单帧批次
    pub fn single(frame: FrameMeta) -> Self {
        Self {
            max_frames_in_batch: 1,
            frames: vec![frame],
        }
    }

    pub fn num_objects(&self) -> usize {
        self.frames.iter().map(|f| f.objects.len()).sum()
    }

    /// 校验整个批次, 返回第一个错误
    /// max_frames_in_batch 为0表示不限制
    pub fn validate(&self) -> Result<(), MetaError> {
        if self.max_frames_in_batch > 0 && self.frames.len() > self.max_frames_in_batch as usize {
            return Err(MetaError::BatchOverflow {
                frames: self.frames.len(),
                max: self.max_frames_in_batch,
            });
        }
        self.frames.iter().try_for_each(FrameMeta::validate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bottom_center() {
        let rect = RectParams::new_from_xywh(10.0, 20.0, 40.0, 100.0);
        assert_eq!(rect.bottom_center(), Point2::new(30.0, 120.0));
        assert_eq!(rect.center(), Point2::new(30.0, 70.0));
    }

    #[test]
    fn test_color_to_rgba() {
        assert_eq!(ColorParams::RED.to_rgba(), Rgba([255, 0, 0, 255]));
        assert!(!ColorParams::new(1.5, 0.0, 0.0, 1.0).is_valid());
    }

    #[test]
    fn test_validate_rejects_nan() {
        let mut frame = FrameMeta::new(0, 7, 640, 480);
        frame.add_object(ObjectMeta::new(
            2,
            "person",
            0.9,
            RectParams::new_from_xywh(f32::NAN, 0.0, 10.0, 10.0),
        ));
        let batch = BatchMeta::single(frame);
        assert_eq!(
            batch.validate(),
            Err(MetaError::NonFiniteRect {
                frame_num: 7,
                index: 0
            })
        );
    }

    #[test]
    fn test_validate_rejects_negative_size() {
        let mut frame = FrameMeta::new(0, 4, 640, 480);
        frame.add_object(ObjectMeta::new(
            2,
            "person",
            0.9,
            RectParams::new_from_xywh(0.0, 0.0, 10.0, 10.0),
        ));
        frame.add_object(ObjectMeta::new(
            2,
            "person",
            0.9,
            RectParams::new_from_xywh(0.0, 0.0, 10.0, -1.0),
        ));
        assert_eq!(
            BatchMeta::single(frame).validate(),
            Err(MetaError::NegativeSize {
                frame_num: 4,
                index: 1,
                width: 10.0,
                height: -1.0
            })
        );
    }

    #[test]
    fn test_validate_rejects_invalid_color() {
        let mut rect = RectParams::new_from_xywh(0.0, 0.0, 10.0, 10.0);
        rect.border_color = ColorParams::new(0.0, 0.0, 0.0, -0.5);
        let mut frame = FrameMeta::new(0, 9, 640, 480);
        frame.add_object(ObjectMeta::new(2, "person", 0.9, rect));
        assert_eq!(
            BatchMeta::single(frame).validate(),
            Err(MetaError::InvalidColor {
                frame_num: 9,
                index: 0
            })
        );
    }

    #[test]
    fn test_validate_batch_overflow() {
        let mut batch = BatchMeta::new(1);
        batch.frames.push(FrameMeta::new(0, 0, 640, 480));
        batch.frames.push(FrameMeta::new(1, 0, 640, 480));
        assert!(matches!(
            batch.validate(),
            Err(MetaError::BatchOverflow { frames: 2, max: 1 })
        ));
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let json = r#"{"frames":[{"frame_num":3,"width":1280,"height":720,"objects":[
            {"class_id":2,"label":"person","confidence":0.8,
             "rect_params":{"left":1,"top":2,"width":3,"height":4}}]}]}"#;
        let batch: BatchMeta = serde_json::from_str(json).unwrap();
        let obj = &batch.frames[0].objects[0];
        assert!(!obj.is_tracked());
        assert_eq!(obj.rect_params.border_width, 3);
        assert_eq!(obj.rect_params.border_color, ColorParams::GREEN);
    }
}
