use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use std::io::Write;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};
use crate::error::{Error, Result};

/// Formats markdown text for terminal output with colors and styling
pub fn format_markdown(markdown: &str) -> Result<()> {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    render_markdown(&mut stdout, markdown)?;
    stdout.flush().map_err(Error::Markdown)
}

/// Renders markdown into any color-capable writer
pub fn render_markdown<W: WriteColor>(out: &mut W, markdown: &str) -> Result<()> {
    let mut state = FormatState::default();
    for event in Parser::new_ext(markdown, Options::all()) {
        state.handle_event(out, event).map_err(Error::Markdown)?;
    }
    out.reset().map_err(Error::Markdown)
}

/// Tracks the current formatting state
#[derive(Default)]
struct FormatState {
    list_depth: usize,
    /// Next number for each open ordered list, `None` for bullets
    list_numbers: Vec<Option<u64>>,
    styles: Vec<ColorSpec>,
}

impl FormatState {
    fn handle_event<W: WriteColor>(&mut self, out: &mut W, event: Event) -> std::io::Result<()> {
        match event {
            Event::Start(tag) => self.start(out, tag),
            Event::End(tag_end) => self.end(out, tag_end),
            Event::Text(text) => write!(out, "{}", text),
            Event::Code(code) => self.inline_code(out, &code),
            Event::SoftBreak | Event::HardBreak => writeln!(out),
            Event::Rule => writeln!(out, "{}", "─".repeat(40)),
            _ => Ok(()),
        }
    }

    fn start<W: WriteColor>(&mut self, out: &mut W, tag: Tag) -> std::io::Result<()> {
        match tag {
            Tag::Heading { level, .. } => {
                let color = match level {
                    HeadingLevel::H1 => Color::Rgb(255, 99, 71),
                    HeadingLevel::H2 => Color::Rgb(70, 130, 180),
                    _ => Color::Cyan,
                };
                let mut spec = ColorSpec::new();
                spec.set_fg(Some(color)).set_bold(true);
                self.push(out, spec)
            }
            Tag::Strong => {
                let mut spec = ColorSpec::new();
                spec.set_bold(true);
                self.push(out, spec)
            }
            Tag::Emphasis => {
                let mut spec = ColorSpec::new();
                spec.set_italic(true);
                self.push(out, spec)
            }
            Tag::CodeBlock(_) => {
                let mut spec = ColorSpec::new();
                spec.set_fg(Some(Color::Green));
                self.push(out, spec)
            }
            Tag::List(start) => {
                self.list_depth += 1;
                self.list_numbers.push(start);
                Ok(())
            }
            Tag::Item => {
                let indent = "  ".repeat(self.list_depth.saturating_sub(1));
                match self.list_numbers.last_mut() {
                    Some(Some(n)) => {
                        write!(out, "{}{}. ", indent, n)?;
                        *n += 1;
                        Ok(())
                    }
                    _ => write!(out, "{}• ", indent),
                }
            }
            _ => Ok(()),
        }
    }

    fn end<W: WriteColor>(&mut self, out: &mut W, tag_end: TagEnd) -> std::io::Result<()> {
        match tag_end {
            TagEnd::Heading(_) => {
                self.pop(out)?;
                writeln!(out)?;
                writeln!(out)
            }
            TagEnd::Paragraph => {
                writeln!(out)?;
                if self.list_depth == 0 {
                    writeln!(out)?;
                }
                Ok(())
            }
            TagEnd::Strong | TagEnd::Emphasis => self.pop(out),
            TagEnd::CodeBlock => {
                self.pop(out)?;
                writeln!(out)
            }
            TagEnd::List(_) => {
                self.list_depth = self.list_depth.saturating_sub(1);
                self.list_numbers.pop();
                if self.list_depth == 0 {
                    writeln!(out)?;
                }
                Ok(())
            }
            TagEnd::Item => writeln!(out),
            _ => Ok(()),
        }
    }

    fn inline_code<W: WriteColor>(&self, out: &mut W, code: &str) -> std::io::Result<()> {
        out.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
        write!(out, "`{}`", code)?;
        self.restore(out)
    }

    fn push<W: WriteColor>(&mut self, out: &mut W, spec: ColorSpec) -> std::io::Result<()> {
        out.set_color(&spec)?;
        self.styles.push(spec);
        Ok(())
    }

    fn pop<W: WriteColor>(&mut self, out: &mut W) -> std::io::Result<()> {
        self.styles.pop();
        self.restore(out)
    }

    fn restore<W: WriteColor>(&self, out: &mut W) -> std::io::Result<()> {
        match self.styles.last() {
            Some(spec) => out.set_color(spec),
            None => out.reset(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use termcolor::NoColor;

    fn render(markdown: &str) -> String {
        let mut out = NoColor::new(Vec::new());
        render_markdown(&mut out, markdown).unwrap();
        String::from_utf8(out.into_inner()).unwrap()
    }

    #[test]
    fn test_suggestion_summary() {
        let text = render(
            "## 🔄 Requirements Partially Met (55%)\n\nClose.\n\n### Suggested Improvements:\n- Add a footer\n- Center the card",
        );

        assert!(text.starts_with("🔄 Requirements Partially Met (55%)\n"));
        assert!(text.contains("Close.\n"));
        assert!(text.contains("• Add a footer\n• Center the card\n"));
        assert!(!text.contains("##"));
    }

    #[test]
    fn test_ordered_list_and_inline_code() {
        let text = render("1. use `flex`\n2. done");

        assert!(text.contains("1. use `flex`\n2. done\n"));
    }

    #[test]
    fn test_strong_text_is_kept() {
        let text = render("**The current implementation successfully meets the requirements.**");

        assert_eq!(text.trim(), "The current implementation successfully meets the requirements.");
    }
}
