//! Where inspection records go
//!
//! Sinks write each record as soon as it is produced and flush before
//! returning, so the output stays in step with the target even if the run is
//! later cut short.

use std::io::{self, Write};

use serde::Serialize;

use crate::debugger::ExitStatus;
use crate::record::InspectionRecord;

/// How a run ended, as reported to the sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEnd {
    Exited(ExitStatus),
    Aborted(String),
}

pub trait RecordSink: Send {
    /// Write one record. `seq` starts at 1.
    fn emit(&mut self, seq: u64, record: &InspectionRecord) -> io::Result<()>;

    /// A line the target printed to its own stdout.
    fn target_output(&mut self, line: &str) -> io::Result<()>;

    fn finish(&mut self, end: &RunEnd) -> io::Result<()>;
}

/// `TAG:` / `PRINT:` line pairs, target output passed through verbatim
pub struct TextSink<W: Write + Send> {
    writer: W,
    prefix: String,
}

impl TextSink<io::Stdout> {
    pub fn stdout(prefix: impl Into<String>) -> Self {
        Self::new(io::stdout(), prefix)
    }
}

impl<W: Write + Send> TextSink<W> {
    pub fn new(writer: W, prefix: impl Into<String>) -> Self {
        Self {
            writer,
            prefix: prefix.into(),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> RecordSink for TextSink<W> {
    fn emit(&mut self, _seq: u64, record: &InspectionRecord) -> io::Result<()> {
        let [tag, outcome] = record.text_lines(&self.prefix);
        writeln!(self.writer, "{tag}")?;
        writeln!(self.writer, "{outcome}")?;
        self.writer.flush()
    }

    fn target_output(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.writer, "{line}")?;
        self.writer.flush()
    }

    fn finish(&mut self, _end: &RunEnd) -> io::Result<()> {
        self.writer.flush()
    }
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum JsonLine<'a> {
    Record {
        seq: u64,
        #[serde(flatten)]
        record: &'a InspectionRecord,
    },
    TargetOutput {
        line: &'a str,
    },
    Exit {
        #[serde(skip_serializing_if = "Option::is_none")]
        status: Option<&'a ExitStatus>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<&'a str>,
    },
}

/// One JSON object per line
pub struct JsonlSink<W: Write + Send> {
    writer: W,
}

impl JsonlSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> JsonlSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_line(&mut self, line: &JsonLine<'_>) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, line)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }
}

impl<W: Write + Send> RecordSink for JsonlSink<W> {
    fn emit(&mut self, seq: u64, record: &InspectionRecord) -> io::Result<()> {
        self.write_line(&JsonLine::Record { seq, record })
    }

    fn target_output(&mut self, line: &str) -> io::Result<()> {
        self.write_line(&JsonLine::TargetOutput { line })
    }

    fn finish(&mut self, end: &RunEnd) -> io::Result<()> {
        let line = match end {
            RunEnd::Exited(status) => JsonLine::Exit {
                status: Some(status),
                error: None,
            },
            RunEnd::Aborted(message) => JsonLine::Exit {
                status: None,
                error: Some(message),
            },
        };
        self.write_line(&line)
    }
}

/// Keeps everything in memory, for tests and for callers that post-process
#[derive(Debug, Default)]
pub struct MemorySink {
    pub records: Vec<(u64, InspectionRecord)>,
    pub target_output: Vec<String>,
    pub end: Option<RunEnd>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tags(&self) -> Vec<&str> {
        self.records.iter().map(|(_, r)| r.tag.as_str()).collect()
    }
}

impl RecordSink for MemorySink {
    fn emit(&mut self, seq: u64, record: &InspectionRecord) -> io::Result<()> {
        self.records.push((seq, record.clone()));
        Ok(())
    }

    fn target_output(&mut self, line: &str) -> io::Result<()> {
        self.target_output.push(line.to_string());
        Ok(())
    }

    fn finish(&mut self, end: &RunEnd) -> io::Result<()> {
        self.end = Some(end.clone());
        Ok(())
    }
}

/// Forwards to another sink and keeps the unprefixed text lines of every
/// record, for comparing a run against expected output
pub struct CapturingSink<'a> {
    inner: &'a mut dyn RecordSink,
    lines: Vec<String>,
}

impl<'a> CapturingSink<'a> {
    pub fn new(inner: &'a mut dyn RecordSink) -> Self {
        Self {
            inner,
            lines: Vec::new(),
        }
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }
}

impl RecordSink for CapturingSink<'_> {
    fn emit(&mut self, seq: u64, record: &InspectionRecord) -> io::Result<()> {
        self.inner.emit(seq, record)?;
        self.lines.extend(record.text_lines(""));
        Ok(())
    }

    fn target_output(&mut self, line: &str) -> io::Result<()> {
        self.inner.target_output(line)
    }

    fn finish(&mut self, end: &RunEnd) -> io::Result<()> {
        self.inner.finish(end)
    }
}
