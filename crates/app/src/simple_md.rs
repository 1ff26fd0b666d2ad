//! Small markdown painter for transcript blocks.
//!
//! Parsing is split from painting so the line classification can be
//! tested without a UI. Supported: headings, bullets, fenced code,
//! `**bold**`, `` `code` `` and `[links](url)`. Anything else is plain text,
//! which matters while a reply is still streaming and markers are unclosed.

use eframe::egui;

#[derive(Debug, Clone, PartialEq)]
pub enum Block<'a> {
    Heading { level: u8, text: &'a str },
    Bullet(&'a str),
    Paragraph(&'a str),
    Code(Vec<&'a str>),
    Blank,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Span<'a> {
    Plain(&'a str),
    Bold(&'a str),
    Code(&'a str),
    Link { text: &'a str, url: &'a str },
}

pub fn parse_blocks(text: &str) -> Vec<Block<'_>> {
    let mut blocks = Vec::new();
    let mut fence: Option<Vec<&str>> = None;

    for line in text.lines() {
        let trimmed = line.trim();

        if trimmed.starts_with("```") {
            match fence.take() {
                Some(body) => blocks.push(Block::Code(body)),
                None => fence = Some(Vec::new()),
            }
            continue;
        }
        if let Some(body) = fence.as_mut() {
            body.push(line);
            continue;
        }

        if trimmed.is_empty() {
            blocks.push(Block::Blank);
        } else if let Some(block) = heading(trimmed) {
            blocks.push(block);
        } else if let Some(rest) = trimmed
            .strip_prefix("- ")
            .or_else(|| trimmed.strip_prefix("* "))
        {
            blocks.push(Block::Bullet(rest));
        } else {
            blocks.push(Block::Paragraph(trimmed));
        }
    }

    // An unterminated fence is still code; the closing marker may not
    // have streamed in yet.
    if let Some(body) = fence {
        blocks.push(Block::Code(body));
    }
    blocks
}

fn heading(line: &str) -> Option<Block<'_>> {
    let level = line.bytes().take_while(|b| *b == b'#').count();
    if !(1..=4).contains(&level) {
        return None;
    }
    let text = line[level..].strip_prefix(' ')?;
    Some(Block::Heading {
        level: level as u8,
        text,
    })
}

pub fn parse_inline(text: &str) -> Vec<Span<'_>> {
    let mut spans = Vec::new();
    let mut plain_start = 0;
    let mut cursor = 0;

    while let Some(offset) = text[cursor..].find(['*', '`', '[']) {
        let pos = cursor + offset;
        let tail = &text[pos..];
        let parsed = if let Some(inner) = tail.strip_prefix("**") {
            inner.find("**").map(|end| (Span::Bold(&inner[..end]), end + 4))
        } else if let Some(inner) = tail.strip_prefix('`') {
            inner.find('`').map(|end| (Span::Code(&inner[..end]), end + 2))
        } else if let Some(inner) = tail.strip_prefix('[') {
            link(inner).map(|(span, len)| (span, len + 1))
        } else {
            None
        };

        match parsed {
            Some((span, len)) => {
                if plain_start < pos {
                    spans.push(Span::Plain(&text[plain_start..pos]));
                }
                spans.push(span);
                cursor = pos + len;
                plain_start = cursor;
            }
            // Not a marker; markers are ASCII so one byte is one char.
            None => cursor = pos + 1,
        }
    }

    if plain_start < text.len() {
        spans.push(Span::Plain(&text[plain_start..]));
    }
    spans
}

/// `inner` starts just after `[`. Returns the span and the bytes consumed.
fn link(inner: &str) -> Option<(Span<'_>, usize)> {
    let close = inner.find("](")?;
    let after = &inner[close + 2..];
    let end = after.find(')')?;
    Some((
        Span::Link {
            text: &inner[..close],
            url: &after[..end],
        },
        close + 2 + end + 1,
    ))
}

pub fn render_markdown(ui: &mut egui::Ui, text: &str, base_color: egui::Color32) {
    let dark = base_color.r() > 128;
    let code_bg = if dark {
        egui::Color32::from_rgb(60, 60, 70)
    } else {
        egui::Color32::from_rgb(230, 232, 236)
    };

    for block in parse_blocks(text) {
        match block {
            Block::Blank => ui.add_space(6.0),
            Block::Heading { level, text } => {
                let size = match level {
                    1 => 18.0,
                    2 => 16.0,
                    3 => 15.0,
                    _ => 14.0,
                };
                ui.add_space(4.0);
                ui.label(egui::RichText::new(text).strong().size(size).color(base_color));
                ui.add_space(2.0);
            }
            Block::Bullet(text) => {
                ui.horizontal_wrapped(|ui| {
                    ui.label(egui::RichText::new("  •  ").size(14.0).color(base_color));
                    paint_spans(ui, text, base_color, code_bg);
                });
            }
            Block::Paragraph(text) => {
                ui.horizontal_wrapped(|ui| paint_spans(ui, text, base_color, code_bg));
            }
            Block::Code(lines) => {
                egui::Frame::none()
                    .fill(code_bg)
                    .rounding(egui::Rounding::same(6.0))
                    .inner_margin(egui::Margin::same(8.0))
                    .show(ui, |ui| {
                        ui.label(
                            egui::RichText::new(lines.join("\n"))
                                .monospace()
                                .size(13.0)
                                .color(base_color),
                        );
                    });
            }
        }
    }
}

fn paint_spans(ui: &mut egui::Ui, text: &str, base_color: egui::Color32, code_bg: egui::Color32) {
    let link_color = egui::Color32::from_rgb(100, 170, 240);
    let size = 14.0;

    for span in parse_inline(text) {
        match span {
            Span::Plain(s) => {
                ui.label(egui::RichText::new(s).size(size).color(base_color));
            }
            Span::Bold(s) => {
                ui.label(egui::RichText::new(s).size(size).strong().color(base_color));
            }
            Span::Code(s) => {
                egui::Frame::none()
                    .fill(code_bg)
                    .rounding(egui::Rounding::same(3.0))
                    .inner_margin(egui::Margin::symmetric(4.0, 1.0))
                    .show(ui, |ui| {
                        ui.label(egui::RichText::new(s).size(size).monospace().color(base_color));
                    });
            }
            Span::Link { text, url } => {
                ui.add(egui::Hyperlink::from_label_and_url(
                    egui::RichText::new(text).size(size).color(link_color).underline(),
                    url,
                ))
                .on_hover_text(url);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocks() {
        let blocks = parse_blocks("## Steps\n- one\n\nplain text\n#nospace");
        assert_eq!(
            blocks,
            vec![
                Block::Heading { level: 2, text: "Steps" },
                Block::Bullet("one"),
                Block::Blank,
                Block::Paragraph("plain text"),
                Block::Paragraph("#nospace"),
            ]
        );
    }

    #[test]
    fn test_fenced_code_even_when_unterminated() {
        let blocks = parse_blocks("```rust\nfn main() {}\n```\nafter\n```\nlet x");
        assert_eq!(blocks[0], Block::Code(vec!["fn main() {}"]));
        assert_eq!(blocks[1], Block::Paragraph("after"));
        assert_eq!(blocks[2], Block::Code(vec!["let x"]));
    }

    #[test]
    fn test_inline_spans() {
        let spans = parse_inline("a **b** `c` [d](http://e) f");
        assert_eq!(
            spans,
            vec![
                Span::Plain("a "),
                Span::Bold("b"),
                Span::Plain(" "),
                Span::Code("c"),
                Span::Plain(" "),
                Span::Link { text: "d", url: "http://e" },
                Span::Plain(" f"),
            ]
        );
    }

    #[test]
    fn test_unclosed_markers_stay_text() {
        assert_eq!(parse_inline("2 * 3 = **six"), vec![Span::Plain("2 * 3 = **six")]);
        assert_eq!(parse_inline("see [docs"), vec![Span::Plain("see [docs")]);
    }
}
