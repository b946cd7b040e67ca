use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use cubekit_shared::{Board, BoardsDto, TagColor, TagColorEntry};
use unicode_width::UnicodeWidthStr;

use crate::alerts::{AlertColor, Alerts};
use crate::changes::{ChangeSet, PendingMarker, PendingOp};
use crate::config::Config;
use crate::sorts::{SortPanel, SortSlot};
use crate::tag_colors::{TagColorPanel, color_for};

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

        Ok(Self {
            color: color && io::stdout().is_terminal(),
        })
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    /// Derived board: committed cards with pending edits applied on top.
    #[tracing::instrument(skip(self, out, base, changes, tag_colors))]
    pub fn write_board<W: Write>(
        &self,
        out: &mut W,
        base: &BoardsDto,
        changes: &ChangeSet,
        board: Board,
        tag_colors: Option<&[TagColorEntry]>,
    ) -> anyhow::Result<()> {
        let entries = changes.changed_cards(base, board);
        writeln!(out, "{board} ({} cards)", entries.iter().filter(|e| !e.marked_for_delete).count())?;

        let headers = vec![
            "#".to_string(),
            "Name".to_string(),
            "Status".to_string(),
            "Tags".to_string(),
            "Pending".to_string(),
        ];

        let mut rows = Vec::with_capacity(entries.len());
        for entry in &entries {
            let index = entry
                .index
                .map(|value| value.to_string())
                .unwrap_or_else(|| "-".to_string());
            let name = entry
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| entry.card.reference.card_id.clone());
            let name = match tag_colors.and_then(|list| color_for(list, &entry.card.tags)) {
                Some(color) => self.paint(&name, tag_color_code(color)),
                None => name,
            };
            let pending = match entry.pending {
                Some(PendingMarker::Added) => self.paint("added", "32"),
                Some(PendingMarker::SwappedIn) => self.paint("swapped in", "32"),
                Some(PendingMarker::Removed) => self.paint("removed", "31"),
                Some(PendingMarker::SwappedOut) => self.paint("swapped out", "31"),
                None => String::new(),
            };

            rows.push(vec![
                self.paint(&index, "33"),
                name,
                entry.card.reference.status.to_string(),
                entry.card.tags.join(", "),
                pending,
            ]);
        }

        write_table(out, headers, rows)
    }

    /// Pending operations per board, numbered for `revert`.
    pub fn write_changes<W: Write>(
        &self,
        out: &mut W,
        base: &BoardsDto,
        changes: &ChangeSet,
    ) -> anyhow::Result<()> {
        if changes.is_empty() {
            writeln!(out, "No pending changes.")?;
            return Ok(());
        }

        for board in Board::ALL {
            let ops = changes.ops(board);
            if ops.is_empty() {
                continue;
            }
            writeln!(out, "{board}:")?;
            for (position, op) in ops.iter().enumerate() {
                let committed_name = |index: usize| {
                    base.board(board)
                        .get(index)
                        .and_then(|card| card.name())
                        .unwrap_or("?")
                        .to_string()
                };
                let line = match op {
                    PendingOp::Add { card } => {
                        self.paint(&format!("+ {}", card.name().unwrap_or("?")), "32")
                    }
                    PendingOp::Remove { index } => {
                        self.paint(&format!("- {} (#{index})", committed_name(*index)), "31")
                    }
                    PendingOp::Swap { index, card } => format!(
                        "{} -> {}",
                        self.paint(&format!("~ {} (#{index})", committed_name(*index)), "31"),
                        self.paint(card.name().unwrap_or("?"), "32")
                    ),
                };
                writeln!(out, "  [{position}] {line}")?;
            }
        }
        Ok(())
    }

    pub fn write_sorts<W: Write>(&self, out: &mut W, panel: &SortPanel) -> anyhow::Result<()> {
        let headers = vec!["Slot".to_string(), "Current".to_string(), "Saved".to_string()];
        let rows = SortSlot::ALL
            .iter()
            .map(|slot| {
                let current = panel.current().label_of(*slot);
                let saved = panel.defaults().label_of(*slot);
                let current = if current == saved {
                    current.to_string()
                } else {
                    self.paint(current, "33")
                };
                vec![slot.label().to_string(), current, saved.to_string()]
            })
            .collect();
        write_table(&mut *out, headers, rows)?;
        writeln!(
            out,
            "show unsorted: {}",
            if panel.show_unsorted() { "on" } else { "off" }
        )?;
        Ok(())
    }

    pub fn write_tags<W: Write>(&self, out: &mut W, panel: &TagColorPanel) -> anyhow::Result<()> {
        let headers = vec!["#".to_string(), "Tag".to_string(), "Color".to_string()];
        let rows = panel
            .rows()
            .iter()
            .enumerate()
            .map(|(position, entry)| {
                let color = match entry.color {
                    Some(color) => self.paint(color.as_str(), tag_color_code(color)),
                    None => "none".to_string(),
                };
                vec![position.to_string(), entry.tag.clone(), color]
            })
            .collect();
        write_table(&mut *out, headers, rows)?;
        if panel.is_dirty() {
            writeln!(out, "(unsaved changes)")?;
        }
        Ok(())
    }

    pub fn write_alerts<W: Write>(&self, out: &mut W, alerts: &Alerts) -> anyhow::Result<()> {
        for alert in alerts.iter() {
            let code = match alert.color {
                AlertColor::Danger => "31",
                AlertColor::Success => "32",
            };
            writeln!(out, "{}", self.paint(&alert.to_string(), code))?;
        }
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn tag_color_code(color: TagColor) -> &'static str {
    match color {
        TagColor::Red => "31",
        TagColor::Brown => "38;5;130",
        TagColor::Orange => "38;5;208",
        TagColor::Yellow => "33",
        TagColor::Green => "32",
        TagColor::Turquoise => "36",
        TagColor::Blue => "34",
        TagColor::Purple => "35",
        TagColor::Violet => "38;5;177",
        TagColor::Pink => "38;5;218",
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
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
    use crate::changes::tests::{boards, card};

    fn render(f: impl FnOnce(&mut Vec<u8>) -> anyhow::Result<()>) -> String {
        let mut buf = Vec::new();
        f(&mut buf).expect("render");
        String::from_utf8(buf).expect("utf8")
    }

    #[test]
    fn board_shows_pending_markers() {
        let base = boards(&["Bolt", "Shock"]);
        let mut changes = ChangeSet::default();
        changes
            .remove_card(&base, 0, Board::Mainboard)
            .expect("remove");
        changes.add_card(card("n", "Opt"), Board::Mainboard);

        let renderer = Renderer::plain();
        let text = render(|out| renderer.write_board(out, &base, &changes, Board::Mainboard, None));

        assert!(text.starts_with("mainboard (2 cards)"));
        let bolt = text.lines().find(|l| l.contains("Bolt")).expect("bolt row");
        assert!(bolt.contains("removed"));
        let opt = text.lines().find(|l| l.contains("Opt")).expect("opt row");
        assert!(opt.starts_with("- "));
        assert!(opt.contains("added"));
    }

    #[test]
    fn changes_are_numbered_per_board() {
        let base = boards(&["Bolt", "Shock"]);
        let mut changes = ChangeSet::default();
        changes
            .swap_card(&base, 1, card("n", "Opt"), Board::Mainboard)
            .expect("swap");
        changes.add_card(card("x", "Ponder"), Board::Maybeboard);

        let text = render(|out| Renderer::plain().write_changes(out, &base, &changes));
        assert!(text.contains("mainboard:\n  [0] ~ Shock (#1) -> Opt"));
        assert!(text.contains("maybeboard:\n  [0] + Ponder"));

        let empty = render(|out| Renderer::plain().write_changes(out, &base, &ChangeSet::default()));
        assert_eq!(empty, "No pending changes.\n");
    }

    #[test]
    fn table_width_ignores_ansi_codes() {
        let painted = "\x1b[31mred\x1b[0m".to_string();
        assert_eq!(strip_ansi(&painted), "red");

        let text = render(|out| {
            write_table(
                out,
                vec!["A".to_string(), "B".to_string()],
                vec![vec![painted.clone(), "x".to_string()]],
            )
        });
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "A   B ");
        assert_eq!(lines[1], "--- - ");
    }
}
