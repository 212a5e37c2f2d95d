//! Inline keyboards for each lifecycle step.
//!
//! Callback data stays well under the platform's 64-byte limit because
//! fingerprints are 16 hex chars.

use crate::bot::format::candidate_label;
use crate::channel::{InlineButton, InlineKeyboard};
use crate::workflow::ReplyPage;

/// Keyboard under a fresh alert.
pub fn alert(uid: &str) -> InlineKeyboard {
    InlineKeyboard::new(vec![vec![InlineButton::new(
        "✍️ Generate post",
        format!("generate:{uid}"),
    )]])
}

/// Keyboard under a draft preview.
pub fn draft(uid: &str, has_photo: bool) -> InlineKeyboard {
    let photo_label = if has_photo { "🖼 Photo ✅" } else { "🖼 Photo" };
    InlineKeyboard::new(vec![
        vec![InlineButton::new("🚀 Publish", format!("publish:{uid}"))],
        vec![
            InlineButton::new("✏️ Edit", format!("edit:{uid}")),
            InlineButton::new("🔄 Regenerate", format!("regenerate:{uid}")),
        ],
        vec![
            InlineButton::new(photo_label, format!("photo:{uid}")),
            InlineButton::new("💬 Reply to…", format!("reply_pick:{uid}:0")),
        ],
    ])
}

/// Keyboard for a resolver-proposed reply candidate.
pub fn reply_choice(uid: &str) -> InlineKeyboard {
    InlineKeyboard::new(vec![
        vec![InlineButton::new(
            "✅ Publish as reply",
            format!("reply_confirm:{uid}"),
        )],
        vec![InlineButton::new(
            "🚫 Publish standalone",
            format!("reply_skip:{uid}"),
        )],
        vec![InlineButton::new(
            "📋 Pick another post",
            format!("reply_pick:{uid}:0"),
        )],
    ])
}

/// One page of reply candidates plus navigation.
pub fn reply_page(uid: &str, page: &ReplyPage) -> InlineKeyboard {
    let mut rows: Vec<Vec<InlineButton>> = page
        .posts
        .iter()
        .map(|post| {
            vec![InlineButton::new(
                candidate_label(post),
                format!("reply_set:{uid}:{}", post.uid),
            )]
        })
        .collect();

    let mut nav = Vec::new();
    if page.has_prev {
        nav.push(InlineButton::new(
            "⬅️",
            format!("reply_pick:{uid}:{}", page.page - 1),
        ));
    }
    if page.has_next {
        nav.push(InlineButton::new(
            "➡️",
            format!("reply_pick:{uid}:{}", page.page + 1),
        ));
    }
    if !nav.is_empty() {
        rows.push(nav);
    }
    rows.push(vec![InlineButton::new(
        "🚫 No reply",
        format!("reply_none:{uid}"),
    )]);

    InlineKeyboard::new(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::PublishedPost;

    #[test]
    fn callback_data_fits_platform_limit() {
        let uid = "a".repeat(16);
        let page = ReplyPage {
            posts: vec![PublishedPost {
                uid: "b".repeat(16),
                title: "t".into(),
                text: String::new(),
                channel_message_id: 1,
                timestamp: chrono::Utc::now(),
            }],
            page: 3,
            has_prev: true,
            has_next: true,
        };
        for kb in [
            alert(&uid),
            draft(&uid, true),
            reply_choice(&uid),
            reply_page(&uid, &page),
        ] {
            for row in &kb.inline_keyboard {
                for button in row {
                    assert!(button.callback_data.len() <= 64, "{}", button.callback_data);
                }
            }
        }
    }

    #[test]
    fn first_page_has_no_back_button() {
        let page = ReplyPage {
            posts: Vec::new(),
            page: 0,
            has_prev: false,
            has_next: true,
        };
        let kb = reply_page("u", &page);
        let all: Vec<&str> = kb
            .inline_keyboard
            .iter()
            .flatten()
            .map(|b| b.callback_data.as_str())
            .collect();
        assert!(all.iter().any(|d| d.starts_with("reply_pick:u:1")));
        assert!(!all.iter().any(|d| d.contains(":u:-")));
    }
}
