/// 社交距离检测 (Social Distancing)
///
/// 系统架构:
/// 1. 数据源线程: 读取检测元数据 (JSON Lines) 或生成合成数据
/// 2. OSD线程:    osd-sink 探针标记距离过近的人, 可选渲染PNG
/// 3. 主线程:     写出结果并汇总统计
///
/// 直接运行: cargo run --bin distancing -- --synthetic 100 --render-dir frames
use anyhow::{bail, Result};
use clap::Parser;
use distancing_rs::osd;
use distancing_rs::pipeline::{JsonlSource, Pipeline, Source, SyntheticSource};
use distancing_rs::{gen_time_string, AppConfig, DistanceRule};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// 社交距离检测参数
#[derive(Parser, Debug)]
#[command(author, version, about = "社交距离检测 - 标记距离过近的人", long_about = None)]
struct Args {
    /// 输入元数据 (JSON Lines, 每行一个批次)
    #[arg(short, long, conflicts_with = "synthetic")]
    input: Option<PathBuf>,

    /// 使用合成数据, 指定帧数
    #[arg(long)]
    synthetic: Option<u64>,

    /// 合成数据中的人数
    #[arg(long, default_value_t = 8)]
    persons: usize,

    /// 合成数据随机种子
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// 输出元数据 (默认 distancing_<时间>.jsonl)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// 配置文件
    #[arg(short, long, default_value = "distancing.json")]
    config: PathBuf,

    /// 渲染PNG的目录
    #[arg(long)]
    render_dir: Option<PathBuf>,

    /// 标签字体 (ttf/otf)
    #[arg(long)]
    font: Option<PathBuf>,

    /// 覆盖配置中的 person 类别ID
    #[arg(long)]
    person_class_id: Option<i32>,

    /// 距离阈值规则: max / min / mean
    #[arg(long)]
    rule: Option<DistanceRule>,

    /// 日志级别 (RUST_LOG 优先)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = AppConfig::load(&args.config)?;
    if let Some(class_id) = args.person_class_id {
        config.distancing.person_class_id = class_id;
    }
    if let Some(rule) = args.rule {
        config.distancing.distance_rule = rule;
    }
    if args.render_dir.is_some() {
        config.render.enabled = true;
    }
    config.print_summary();

    let source: Box<dyn Source> = match (&args.input, args.synthetic) {
        (Some(path), _) => Box::new(JsonlSource::open(path, config.frame_duration_ns)?),
        (None, Some(frames)) => Box::new(
            SyntheticSource::new(frames, args.persons, 1280, 720, args.seed)
                .with_class_id(config.distancing.person_class_id)
                .with_frame_duration(config.frame_duration_ns),
        ),
        (None, None) => bail!("either --input or --synthetic is required"),
    };

    let output = args
        .output
        .unwrap_or_else(|| PathBuf::from(format!("distancing_{}.jsonl", gen_time_string("_"))));
    info!("📝 output: {}", output.display());

    let mut pipeline = Pipeline::new(config, source).with_output(output);
    if let Some(dir) = args.render_dir {
        pipeline = pipeline.with_render_dir(dir);
    }
    if let Some(path) = args.font {
        pipeline = pipeline.with_font(osd::load_font(path)?);
    }

    let stats = pipeline.run()?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
