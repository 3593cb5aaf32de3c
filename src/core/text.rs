//! Styled summary text and the two-slot template that produces it.
//!
//! Templates use positional `%1$s` / `%2$s` slots (a bare `%s` takes the
//! next slot in order, `%%` is a literal percent sign). Slot 1 is the
//! primary label, slot 2 the fallback label. Emphasis is carried on the
//! spans and only becomes markup when a sink asks for it.

use std::fmt;

use serde::Serialize;

use crate::error::MonitorError;

/// A run of text with a single style.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StyledSpan {
    text: String,
    bold: bool,
}

impl StyledSpan {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: false,
        }
    }

    pub fn bold(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: true,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_bold(&self) -> bool {
        self.bold
    }
}

/// Composed summary: a sequence of styled spans.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StyledText {
    spans: Vec<StyledSpan>,
}

impl StyledText {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a span, merging it into the last one when the style matches.
    pub fn push(&mut self, span: StyledSpan) {
        if span.text.is_empty() {
            return;
        }
        match self.spans.last_mut() {
            Some(last) if last.bold == span.bold => last.text.push_str(&span.text),
            _ => self.spans.push(span),
        }
    }

    pub fn spans(&self) -> &[StyledSpan] {
        &self.spans
    }

    /// Text of all bold spans, in order.
    pub fn bold_segments(&self) -> Vec<&str> {
        self.spans
            .iter()
            .filter(|s| s.bold)
            .map(|s| s.text.as_str())
            .collect()
    }

    /// Renders bold spans as `<b>..</b>` with `&`, `<` and `>` escaped.
    pub fn to_markup(&self) -> String {
        let mut out = String::new();
        for span in &self.spans {
            let escaped = span
                .text
                .replace('&', "&amp;")
                .replace('<', "&lt;")
                .replace('>', "&gt;");
            if span.bold {
                out.push_str("<b>");
                out.push_str(&escaped);
                out.push_str("</b>");
            } else {
                out.push_str(&escaped);
            }
        }
        out
    }
}

impl fmt::Display for StyledText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for span in &self.spans {
            f.write_str(&span.text)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Slot(usize),
}

/// A parsed summary template with a primary slot and a fallback slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryTemplate {
    segments: Vec<Segment>,
}

impl SummaryTemplate {
    const SLOTS: usize = 2;

    pub fn parse(template: &str) -> Result<Self, MonitorError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut next_sequential = 1;
        let mut seen = [false; Self::SLOTS];
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '%' {
                literal.push(c);
                continue;
            }
            let slot = match chars.next() {
                Some('%') => {
                    literal.push('%');
                    continue;
                }
                Some('s') => {
                    let slot = next_sequential;
                    next_sequential += 1;
                    slot
                }
                Some(d) if d.is_ascii_digit() => {
                    let mut digits = String::from(d);
                    while let Some(&n) = chars.peek() {
                        if !n.is_ascii_digit() {
                            break;
                        }
                        digits.push(n);
                        chars.next();
                    }
                    if chars.next() != Some('$') || chars.next() != Some('s') {
                        return Err(MonitorError::Template(format!(
                            "expected %{digits}$s in \"{template}\""
                        )));
                    }
                    digits.parse::<usize>().map_err(|e| {
                        MonitorError::Template(format!("bad slot index {digits}: {e}"))
                    })?
                }
                Some(other) => {
                    return Err(MonitorError::Template(format!(
                        "unsupported conversion %{other} in \"{template}\""
                    )))
                }
                None => {
                    return Err(MonitorError::Template(format!(
                        "dangling % at end of \"{template}\""
                    )))
                }
            };
            if slot == 0 || slot > Self::SLOTS {
                return Err(MonitorError::Template(format!(
                    "slot {slot} out of range 1..={} in \"{template}\"",
                    Self::SLOTS
                )));
            }
            seen[slot - 1] = true;
            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(Segment::Slot(slot));
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        if let Some(missing) = seen.iter().position(|s| !s) {
            return Err(MonitorError::Template(format!(
                "missing slot %{}$s in \"{template}\"",
                missing + 1
            )));
        }
        Ok(Self { segments })
    }

    /// Fills slot 1 with `primary` and slot 2 with `fallback`.
    pub fn format(&self, primary: &StyledSpan, fallback: &StyledSpan) -> StyledText {
        let mut text = StyledText::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(s) => text.push(StyledSpan::plain(s.as_str())),
                Segment::Slot(1) => text.push(primary.clone()),
                Segment::Slot(_) => text.push(fallback.clone()),
            }
        }
        text
    }
}
