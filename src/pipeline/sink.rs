/// 输出 (Sink)
/// 职责: 将探针处理后的批次元数据写为JSON Lines
use crate::probe::Buffer;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub struct JsonlSink<W: Write> {
    writer: W,
    written: u64,
}

impl JsonlSink<BufWriter<File>> {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file =
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> JsonlSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    /// 没有元数据的buffer写为 `null`, 与输入格式一致
    pub fn write_buffer(&mut self, buffer: &Buffer) -> Result<()> {
        serde_json::to_writer(&mut self.writer, &buffer.batch_meta())
            .context("failed to serialize batch")?;
        self.writer.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    pub fn finish(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::{BatchMeta, FrameMeta};

    #[test]
    fn test_write_lines() {
        let mut sink = JsonlSink::new(Vec::new());
        let meta = BatchMeta::single(FrameMeta::new(0, 5, 640, 480));
        sink.write_buffer(&Buffer::with_meta(0, 40, meta.clone()))
            .unwrap();
        sink.write_buffer(&Buffer::new(40, 40)).unwrap();
        assert_eq!(sink.written(), 2);

        let out = String::from_utf8(sink.finish().unwrap()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: BatchMeta = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed, meta);
        assert_eq!(lines[1], "null");
    }
}
