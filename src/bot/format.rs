//! Operator-facing message formatting (HTML parse mode).

use crate::feed::NewsItem;
use crate::store::PublishedPost;
use crate::workflow::StatusReport;

/// Keep operator-facing error reports short.
const MAX_ERROR_CHARS: usize = 200;

pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Visual hype tier for alerts and digests.
pub fn hype_emoji(score: u8) -> &'static str {
    match score {
        9..=10 => "🔥🔥🔥",
        8 => "🔥🔥",
        7 => "🔥",
        _ => "📰",
    }
}

/// Alert card for a hot item.
pub fn format_alert(item: &NewsItem) -> String {
    format!(
        "{} <b>{}</b>\n\n{}\n\n📊 Hype: <b>{}/10</b> | 📡 {}\n🔗 {}",
        hype_emoji(item.hype_score),
        escape_html(&item.title),
        escape_html(&item.summary),
        item.hype_score,
        escape_html(&item.source),
        escape_html(&item.url),
    )
}

/// One digest line per item.
pub fn format_digest(items: &[NewsItem], min: u8, max: u8, total_today: usize) -> String {
    if items.is_empty() {
        return format!("📭 Nothing scored {min}–{max} today ({total_today} items seen).");
    }
    let mut out = format!("🗞 <b>Today's digest</b> (score {min}–{max}):\n");
    for item in items {
        out.push_str(&format!(
            "\n{} <b>{}</b> — {}\n{}\n",
            hype_emoji(item.hype_score),
            item.hype_score,
            escape_html(&item.title),
            escape_html(&item.url),
        ));
    }
    out.push_str(&format!("\n{total_today} items scored today in total."));
    out
}

pub fn format_status(report: &StatusReport) -> String {
    format!(
        "📋 <b>Status</b>\n\
         • Items in workspace: {}\n\
         • Posts in ledger: {}\n\
         • Scored today: {}\n\
         • Hype threshold: {}/10",
        report.workspace_items, report.ledger_posts, report.daily_items, report.threshold,
    )
}

/// Short label for a reply candidate button.
pub fn candidate_label(post: &PublishedPost) -> String {
    let title: String = post.title.chars().take(30).collect();
    if post.title.chars().count() > 30 {
        format!("{title}…")
    } else {
        title
    }
}

pub fn truncate_error(err: &impl std::fmt::Display) -> String {
    let text = err.to_string();
    if text.chars().count() > MAX_ERROR_CHARS {
        let cut: String = text.chars().take(MAX_ERROR_CHARS).collect();
        format!("{cut}…")
    } else {
        text
    }
}
