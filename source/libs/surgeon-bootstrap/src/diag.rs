// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Advisory diagnostic stream for bootstrap failures. Lines are meant for
//! humans and are not a parseable protocol.

/// Destination for one-line bootstrap diagnostics.
pub trait DiagnosticSink {
    /// Emits a single line without trailing newline.
    fn emit(&mut self, line: &str);
}

/// Writes diagnostics to the process error stream.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrSink;

impl DiagnosticSink for StderrSink {
    fn emit(&mut self, line: &str) {
        eprintln!("{line}");
    }
}

/// Collects diagnostics in memory so a host can forward or inspect them.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    lines: Vec<String>,
}

impl MemorySink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines emitted so far, oldest first.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

impl DiagnosticSink for MemorySink {
    fn emit(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }
}

impl<S: DiagnosticSink + ?Sized> DiagnosticSink for &mut S {
    fn emit(&mut self, line: &str) {
        (**self).emit(line);
    }
}
