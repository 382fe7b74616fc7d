//! Quoting, forwarding and HTML rendering of committed bodies.

use crate::model::EmailMessage;
use chrono::{DateTime, Utc};
use pulldown_cmark::{html, Event, Options, Parser};

fn format_date(date: Option<DateTime<Utc>>) -> String {
    date.map(|d| d.format("%a, %b %-d, %Y at %-I:%M %p").to_string())
        .unwrap_or_else(|| "an earlier date".to_string())
}

/// Append the parent body as a `>`-quoted block under an attribution line.
pub fn append_quoted(body: &str, parent: &EmailMessage) -> String {
    let author = parent
        .from
        .as_ref()
        .map(|m| m.to_string())
        .unwrap_or_else(|| "someone".to_string());
    let quoted: Vec<String> = parent
        .body_plain
        .lines()
        .map(|line| {
            if line.is_empty() {
                ">".to_string()
            } else {
                format!("> {}", line)
            }
        })
        .collect();
    format!(
        "{}\n\nOn {}, {} wrote:\n{}",
        body.trim_end(),
        format_date(parent.sent_at),
        author,
        quoted.join("\n")
    )
}

/// Append the parent as a forwarded message with its original headers.
pub fn append_forwarded(body: &str, parent: &EmailMessage) -> String {
    let from = parent
        .from
        .as_ref()
        .map(|m| m.to_string())
        .unwrap_or_default();
    let to: Vec<String> = parent.to.iter().map(|m| m.to_string()).collect();
    let mut header = format!(
        "---------- Forwarded message ---------\nFrom: {}\nDate: {}\nSubject: {}\nTo: {}",
        from,
        format_date(parent.sent_at),
        parent.subject,
        to.join(", ")
    );
    if !parent.cc.is_empty() {
        let cc: Vec<String> = parent.cc.iter().map(|m| m.to_string()).collect();
        header.push_str(&format!("\nCc: {}", cc.join(", ")));
    }
    format!("{}\n\n{}\n\n{}", body.trim_end(), header, parent.body_plain)
}

/// Markdown to HTML with every soft line break kept as a hard break, since email bodies
/// are written line by line.
pub fn render_html(body: &str) -> String {
    let parser = Parser::new_ext(body, Options::ENABLE_STRIKETHROUGH).map(|event| match event {
        Event::SoftBreak => Event::HardBreak,
        other => other,
    });
    let mut out = String::with_capacity(body.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}
