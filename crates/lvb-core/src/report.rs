//! Report rendering: ordered display lines and message-sized chunks.

use crate::domain::{LinkResult, LinkStatus};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReportOptions {
    pub show_invalid: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self { show_invalid: true }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub valid: usize,
    pub invalid: usize,
    pub unknown: usize,
}

impl StatusCounts {
    pub fn of(results: &[LinkResult]) -> Self {
        let mut c = Self::default();
        for r in results {
            match r.status {
                LinkStatus::Valid => c.valid += 1,
                LinkStatus::Invalid => c.invalid += 1,
                LinkStatus::Unknown => c.unknown += 1,
            }
        }
        c
    }

    pub fn total(&self) -> usize {
        self.valid + self.invalid + self.unknown
    }
}

/// Header + body lines. Counts always cover the full result set.
pub fn format_report(results: &[LinkResult], opts: ReportOptions) -> Vec<String> {
    let counts = StatusCounts::of(results);

    let mut lines = vec![
        format!("Total: {}", counts.total()),
        format!("Valid: {}", counts.valid),
        if opts.show_invalid {
            format!("Invalid: {}", counts.invalid)
        } else {
            format!("Invalid: {} (hidden)", counts.invalid)
        },
        format!("Unknown: {}", counts.unknown),
        String::new(),
    ];

    let mut body: Vec<&LinkResult> = results
        .iter()
        .filter(|r| opts.show_invalid || r.status != LinkStatus::Invalid)
        .collect();
    // Stable: ties keep their original order.
    body.sort_by_key(|r| r.status.rank());

    lines.extend(
        body.into_iter()
            .map(|r| format!("{} {}", r.status.glyph(), r.link)),
    );
    lines
}

/// Greedily pack lines into chunks of at most `max_len` characters.
///
/// Lines are never split; a line longer than `max_len` becomes its own chunk.
pub fn chunk_lines<S: AsRef<str>>(lines: &[S], max_len: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut cur = String::new();
    let mut cur_len = 0usize;
    let mut cur_has_lines = false;

    for line in lines {
        let line = line.as_ref();
        let line_len = line.chars().count();

        if cur_has_lines && cur_len + 1 + line_len > max_len {
            out.push(std::mem::take(&mut cur));
            cur_len = 0;
            cur_has_lines = false;
        }

        if cur_has_lines {
            cur.push('\n');
            cur_len += 1;
        }
        cur.push_str(line);
        cur_len += line_len;
        cur_has_lines = true;
    }

    if cur_has_lines {
        out.push(cur);
    }
    out
}

/// Format and chunk in one step.
pub fn render_chunks(results: &[LinkResult], opts: ReportOptions, max_len: usize) -> Vec<String> {
    chunk_lines(&format_report(results, opts), max_len)
}
