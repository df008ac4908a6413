//! Terminal status display

use chrono::Local;
use contracts::StatusFormat;
use hub::{Chunk, StatsRow, StatusReporter};
use std::io::{self, Write};

const BOLD: &str = "\x1b[1m";
const CYAN: &str = "\x1b[36m";
const RESET: &str = "\x1b[0m";

/// Writes live status to stdout: a traffic table or a hexdump of every chunk
pub struct TerminalReporter {
    format: StatusFormat,
    color: bool,
}

impl TerminalReporter {
    pub fn new(format: StatusFormat, color: bool) -> Self {
        Self { format, color }
    }

    fn emit(&self, text: &str) {
        let mut out = io::stdout().lock();
        // Write errors on stdout are ignored
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }
}

impl StatusReporter for TerminalReporter {
    fn on_chunk(&mut self, chunk: &Chunk) {
        if self.format != StatusFormat::Hexdump {
            return;
        }
        let block = traffic_log::hexdump::format_block(Local::now(), &chunk.peer, &chunk.data);
        if self.color {
            let (header, body) = block.split_once('\n').unwrap_or((&block, ""));
            self.emit(&format!("{CYAN}{header}{RESET}\n{body}"));
        } else {
            self.emit(&block);
        }
    }

    fn on_stats(&mut self, rows: &[StatsRow]) {
        if self.format != StatusFormat::Table {
            return;
        }
        self.emit(&render_table(rows, self.color));
    }
}

/// Render the per-connection table: `peer | tx | rx | idle(s)`
pub fn render_table(rows: &[StatsRow], color: bool) -> String {
    let header = format!(
        "{:<24} {:>12} {:>12} {:>9}",
        "peer", "tx", "rx", "idle(s)"
    );
    let mut out = String::new();
    if color {
        out.push_str(BOLD);
        out.push_str(&header);
        out.push_str(RESET);
    } else {
        out.push_str(&header);
    }
    out.push('\n');

    for row in rows {
        out.push_str(&row.to_string());
        out.push('\n');
    }
    if rows.is_empty() {
        out.push_str("(no connections)\n");
    }
    out
}
