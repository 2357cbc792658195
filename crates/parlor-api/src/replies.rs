use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;

use parlor_db::RoomStore;

fn marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"#(\d+)#").expect("literal pattern"))
}

pub struct ReplyTransform {
    /// The content as it will be stored; the rewrite is irreversible.
    pub content: String,
    /// Distinct referenced authors, the poster excluded.
    pub notify: Vec<String>,
}

/// Rewrites `#<id>#` reply markers to their highlighted form and collects
/// the referenced authors. Markers that resolve to no message are still
/// rewritten but notify nobody.
pub fn transform(
    store: &RoomStore,
    content: &str,
    poster_email: &str,
) -> anyhow::Result<ReplyTransform> {
    let mut notify = BTreeSet::new();
    for capture in marker_re().captures_iter(content) {
        let Ok(id) = capture[1].parse::<i64>() else {
            continue;
        };
        if let Some(message) = store.get_message(id)? {
            if !message.email.eq_ignore_ascii_case(poster_email) {
                notify.insert(message.email);
            }
        }
    }

    let content = marker_re().replace_all(content, "**#$1#**").into_owned();
    Ok(ReplyTransform {
        content,
        notify: notify.into_iter().collect(),
    })
}
