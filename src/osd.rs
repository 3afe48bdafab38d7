/// OSD渲染模块
/// On-screen display: 按元数据中的颜色绘制检测框
use crate::config::RenderConfig;
use crate::meta::{FrameMeta, ObjectMeta};
use ab_glyph::{FontArc, PxScale};
use anyhow::{bail, Context, Result};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, Blend};
use imageproc::rect::Rect;
use std::path::{Path, PathBuf};

/// 背景色 (没有原始视频帧时使用)
const CANVAS_COLOR: Rgba<u8> = Rgba([32, 32, 32, 255]);

/// 加载标签字体 (ttf/otf)
pub fn load_font(path: impl AsRef<Path>) -> Result<FontArc> {
    let path = path.as_ref();
    let data =
        std::fs::read(path).with_context(|| format!("failed to read font {}", path.display()))?;
    FontArc::try_from_vec(data).with_context(|| format!("invalid font {}", path.display()))
}

/// 按帧尺寸创建空白画布, 像素数超过 `max_canvas_pixels` 时拒绝分配
pub fn blank_canvas(frame: &FrameMeta, cfg: &RenderConfig) -> Result<RgbaImage> {
    let (width, height) = (frame.width.max(1), frame.height.max(1));
    let pixels = width as u64 * height as u64;
    if pixels > cfg.max_canvas_pixels {
        bail!(
            "frame {} size {}x{} exceeds canvas limit of {} pixels",
            frame.frame_num,
            width,
            height,
            cfg.max_canvas_pixels
        );
    }
    Ok(RgbaImage::from_pixel(width, height, CANVAS_COLOR))
}

/// 框在画布内的整数矩形, 完全在画布外或尺寸为0时返回None
fn clip_rect(obj: &ObjectMeta, width: u32, height: u32) -> Option<Rect> {
    let r = &obj.rect_params;
    let x1 = r.left.round().max(0.0) as i64;
    let y1 = r.top.round().max(0.0) as i64;
    let x2 = (r.right().round() as i64).min(width as i64);
    let y2 = (r.bottom().round() as i64).min(height as i64);
    if x2 <= x1 || y2 <= y1 {
        return None;
    }
    Some(Rect::at(x1 as i32, y1 as i32).of_size((x2 - x1) as u32, (y2 - y1) as u32))
}

/// 在画布上绘制一帧的所有对象
pub fn draw_frame(
    image: &mut RgbaImage,
    frame: &FrameMeta,
    cfg: &RenderConfig,
    font: Option<&FontArc>,
) {
    let (width, height) = image.dimensions();

    for obj in &frame.objects {
        let Some(rect) = clip_rect(obj, width, height) else {
            continue;
        };
        let params = &obj.rect_params;

        if params.has_bg_color {
            if let Some(bg) = params.bg_color {
                let mut canvas = Blend(std::mem::take(image));
                draw_filled_rect_mut(&mut canvas, rect, bg.to_rgba());
                *image = canvas.0;
            }
        }

        // 边框向内加粗
        let color = params.border_color.to_rgba();
        let border = params.border_width.min(cfg.max_border_width);
        for k in 0..border {
            let (w, h) = (rect.width(), rect.height());
            if w <= 2 * k || h <= 2 * k {
                break;
            }
            let inner = Rect::at(rect.left() + k as i32, rect.top() + k as i32)
                .of_size(w - 2 * k, h - 2 * k);
            draw_hollow_rect_mut(image, inner, color);
        }

        if let (true, Some(font), false) = (cfg.draw_labels, font, obj.label.is_empty()) {
            let scale = PxScale::from(cfg.label_scale);
            let y = (rect.top() - cfg.label_scale.ceil() as i32).max(0);
            let text = format!("{} {:.2}", obj.label, obj.confidence);
            draw_text_mut(image, color, rect.left(), y, scale, font, &text);
        }
    }
}

/// 渲染一帧并保存为PNG
pub fn render_to_file(
    frame: &FrameMeta,
    dir: &Path,
    cfg: &RenderConfig,
    font: Option<&FontArc>,
) -> Result<PathBuf> {
    let mut image = blank_canvas(frame, cfg)
        .with_context(|| format!("cannot render frame {}", frame.frame_num))?;
    draw_frame(&mut image, frame, cfg, font);

    let path = dir.join(format!(
        "frame_{}_{:06}.png",
        frame.source_id, frame.frame_num
    ));
    image
        .save(&path)
        .with_context(|| format!("failed to save {}", path.display()))?;
    Ok(path)
}
