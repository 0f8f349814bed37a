// src/journal/line.rs

//! Framing lines: the structured records shepherd appends to log files.
//!
//! One event per line, `key=value` pairs after a fixed prefix:
//!
//! ```text
//! [shepherd] ts=2026-10-19T07:00:00.120Z pid=4242 level=INFO source=dispatcher event=start task=daily_report run=20261019T070000120-4242 cmd="python -m src --task=daily_report"
//! ```
//!
//! Values containing whitespace, quotes or `=` are written in Rust string
//! literal form so the line stays single-line and parseable.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;


pub const LINE_PREFIX: &str = "[shepherd] ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Supervisor,
    Dispatcher,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Source::Supervisor => "supervisor",
            Source::Dispatcher => "dispatcher",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Start,
    End,
    Success,
    Failure,
    Launched,
    LaunchFailure,
    EnvSetupFailure,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::Start => "start",
            Event::End => "end",
            Event::Success => "success",
            Event::Failure => "failure",
            Event::Launched => "launched",
            Event::LaunchFailure => "launch_failure",
            Event::EnvSetupFailure => "env_setup_failure",
        }
    }

    fn level(&self) -> &'static str {
        match self {
            Event::Start | Event::End | Event::Success | Event::Launched => "INFO",
            Event::EnvSetupFailure => "WARN",
            Event::Failure | Event::LaunchFailure => "ERROR",
        }
    }
}

/// A single framing record, built up field by field then rendered.
#[derive(Debug, Clone)]
pub struct FramingLine {
    ts: DateTime<Utc>,
    source: Source,
    event: Event,
    fields: Vec<(&'static str, String)>,
}

impl FramingLine {
    pub fn new(source: Source, event: Event) -> Self {
        Self::at(Utc::now(), source, event)
    }

    pub fn at(ts: DateTime<Utc>, source: Source, event: Event) -> Self {
        Self {
            ts,
            source,
            event,
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, key: &'static str, value: impl fmt::Display) -> Self {
        self.fields.push((key, value.to_string()));
        self
    }

    pub fn render(&self) -> String {
        let mut out = format!(
            "{LINE_PREFIX}ts={} pid={} level={} source={} event={}",
            self.ts.to_rfc3339_opts(SecondsFormat::Millis, true),
            std::process::id(),
            self.event.level(),
            self.source,
            self.event.as_str(),
        );
        for (key, value) in &self.fields {
            out.push(' ');
            out.push_str(key);
            out.push('=');
            out.push_str(&quote(value));
        }
        out.push('\n');
        out
    }
}

fn quote(value: &str) -> String {
    let plain = !value.is_empty()
        && !value
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || matches!(c, '"' | '=' | '\\'));
    if plain {
        value.to_string()
    } else {
        format!("{value:?}")
    }
}

/// Append-only writer for one log file.
#[derive(Debug, Clone)]
pub struct Journal {
    path: PathBuf,
}

impl Journal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one rendered line with a single `write` on an `O_APPEND` handle,
    /// so it cannot interleave with the worker's own output mid-line.
    ///
    /// If the file does not end in a newline (a worker died mid-line), one is
    /// written first so the framing line still starts at column 0.
    pub fn append(&self, line: &FramingLine) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&self.path)?;

        let mut buf = String::new();
        if !ends_at_line_start(&mut file)? {
            buf.push('\n');
        }
        buf.push_str(&line.render());
        file.write_all(buf.as_bytes())?;
        file.flush()
    }
}

fn ends_at_line_start(file: &mut File) -> std::io::Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(true);
    }
    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

/// A framing line read back from a log file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine {
    pub fields: BTreeMap<String, String>,
}

impl ParsedLine {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn event(&self) -> Option<&str> {
        self.get("event")
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        let ts = self.get("ts")?;
        DateTime::parse_from_rfc3339(ts)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }
}

fn field_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"([A-Za-z_]+)=("(?:[^"\\]|\\.)*"|\S*)"#).expect("field regex is valid")
    })
}

/// Parse a framing line; returns `None` for worker output and other lines.
pub fn parse_line(line: &str) -> Option<ParsedLine> {
    let body = line.strip_prefix(LINE_PREFIX)?;
    let fields = field_regex()
        .captures_iter(body)
        .map(|c| (c[1].to_string(), unquote(&c[2])))
        .collect::<BTreeMap<_, _>>();
    if fields.contains_key("event") {
        Some(ParsedLine { fields })
    } else {
        None
    }
}

fn unquote(raw: &str) -> String {
    let Some(inner) = raw.strip_prefix('"').and_then(|r| r.strip_suffix('"')) else {
        return raw.to_string();
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
