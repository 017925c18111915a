use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::Local;
use tickoff_shared::{Filter, Task};
use unicode_width::UnicodeWidthStr;

use crate::api::ApiError;
use crate::config::Config;
use crate::notify::{Notification, NotificationLevel, Notifier};
use crate::selection::SelectionResult;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self { color })
    }

    #[tracing::instrument(skip(self, selection), fields(items = selection.items.len()))]
    pub fn print_selection(&self, selection: &SelectionResult, filter: Filter) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        if selection.items.is_empty() {
            writeln!(out, "{}", empty_message(filter))?;
        } else {
            let rows = selection.items.iter().map(|task| self.task_row(task)).collect();
            write_table(
                &mut out,
                vec![
                    "ID".to_string(),
                    " ".to_string(),
                    "Task".to_string(),
                    "Created".to_string(),
                ],
                rows,
            )?;
        }

        writeln!(out)?;
        writeln!(
            out,
            "{} left, {} completed, {} total (filter: {filter})",
            plural(selection.active_count, "item"),
            selection.complete_count,
            selection.count
        )?;

        if !selection.visible_completed_ids.is_empty() {
            writeln!(
                out,
                "  clear-completed would remove {} visible completed",
                selection.visible_completed_ids.len()
            )?;
        }
        if !selection.visible_active_ids.is_empty() {
            writeln!(
                out,
                "  complete-all would complete {} visible active",
                selection.visible_active_ids.len()
            )?;
        }

        Ok(())
    }

    pub fn print_task(&self, task: &Task) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let [id, mark, text, created] = self.task_row(task);
        writeln!(out, "{mark} {id} {text} ({created})")?;
        Ok(())
    }

    pub fn print_filter(&self, filter: Filter) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "filter: {}", self.paint(filter.as_str(), "36"))?;
        Ok(())
    }

    /// The persistent panel shown when the task list cannot be loaded.
    pub fn print_load_error(&self, err: &ApiError) -> anyhow::Result<()> {
        let mut out = io::stderr().lock();
        writeln!(out, "{}", self.paint("Could not load tasks", "31"))?;
        writeln!(out, "  {}", err.user_message())?;
        if err.is_retryable() {
            writeln!(out, "  Run the command again to retry.")?;
        }
        Ok(())
    }

    fn task_row(&self, task: &Task) -> [String; 4] {
        let mark = if task.completed { "[x]" } else { "[ ]" };
        let created = task
            .created_date
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M")
            .to_string();
        let text = if task.completed {
            self.paint(task.text.as_str(), "2")
        } else {
            task.text.to_string()
        };

        [self.paint(task.id.as_str(), "33"), mark.to_string(), text, created]
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

impl Notifier for Renderer {
    fn notify(&self, notification: Notification) {
        let code = match notification.level {
            NotificationLevel::Info => "36",
            NotificationLevel::Success => "32",
            NotificationLevel::Warning => "33",
            NotificationLevel::Error => "31",
        };
        let label = self.paint(&notification.level.to_string(), code);
        let line = format!("{label}: {}", notification.message);
        let written = match notification.level {
            NotificationLevel::Error => writeln!(io::stderr().lock(), "{line}"),
            _ => writeln!(io::stdout().lock(), "{line}"),
        };
        if let Err(err) = written {
            tracing::warn!(error = %err, "failed to print notification");
        }
    }
}

fn empty_message(filter: Filter) -> &'static str {
    match filter {
        Filter::All => "No tasks.",
        Filter::Active => "No active tasks.",
        Filter::Completed => "No completed tasks.",
    }
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("1 {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<[String; 4]>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for (header, width) in headers.iter().zip(&widths) {
        write!(writer, "{header:width$} ")?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "")?;
    }
    writeln!(writer)?;

    for row in rows {
        for (cell, width) in row.iter().zip(&widths) {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = width.saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_pads_by_visible_width() {
        let mut buf = Vec::new();
        write_table(
            &mut buf,
            vec!["ID".into(), " ".into(), "Task".into(), "Created".into()],
            vec![[
                "\x1b[33mabc\x1b[0m".into(),
                "[ ]".into(),
                "café ☕".into(),
                "2026-01-01".into(),
            ]],
        )
        .expect("table");

        let text = String::from_utf8(buf).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "ID      Task    Created    ");
        assert!(lines[2].starts_with("\x1b[33mabc\x1b[0m [ ] café ☕ "));
    }

    #[test]
    fn strip_ansi_removes_escape_sequences() {
        assert_eq!(strip_ansi("\x1b[31mred\x1b[0m"), "red");
    }
}
