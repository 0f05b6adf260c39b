use {meshrelay_config::ChannelMapping, meshrelay_meshcore::GroupText};

/// Discord rejects messages over 2000 characters; stay clear of it.
pub const MAX_MESSAGE_CHARS: usize = 1900;
/// Length kept before the ellipsis when truncating.
const TRUNCATED_CHARS: usize = 1890;
const ELLIPSIS: &str = "...";

/// Render a decrypted group message as `[MeshCore <label>] <sender>: <body>`.
///
/// The label is `#<name>` for a named mapping, `hash <hash>` for an unnamed
/// one, and `unknown` for messages routed to the default channel. Returns
/// `None` when there is no body.
pub fn format_message(mapping: Option<&ChannelMapping>, group: &GroupText) -> Option<String> {
    let decrypted = group.decrypted.as_ref()?;
    let body = decrypted.message.as_deref().unwrap_or_default().trim();
    if body.is_empty() {
        return None;
    }

    let label = channel_label(mapping);
    let sender = decrypted
        .sender
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(|s| format!("{s}: "))
        .unwrap_or_default();

    let text = format!("[MeshCore {label}] {sender}{body}");
    Some(truncate(text.trim()))
}

fn channel_label(mapping: Option<&ChannelMapping>) -> String {
    match mapping {
        Some(m) if !m.name.is_empty() => format!("#{}", m.name),
        Some(m) if !m.channel_hash.is_empty() => format!("hash {}", m.channel_hash),
        _ => "unknown".to_string(),
    }
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= MAX_MESSAGE_CHARS {
        return text.to_string();
    }
    let mut out: String = text.chars().take(TRUNCATED_CHARS).collect();
    out.push_str(ELLIPSIS);
    out
}
