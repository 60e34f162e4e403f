//! User-facing message templates.
//!
//! Templates use `{name}` placeholders filled by [`render`]. Unknown
//! placeholders are left as-is so a missing argument is visible in the
//! output rather than silently dropped.

use crate::discord_text::escape_mentions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Msg {
    ReplyAdded,
    ReplyExists,
    ReplyRemoved,
    ReplyNotFound,
    NoReplies,
    ReplyList,
    ReplyTooLong,
    EmptyKey,
    InfoChannelSet,
    ConfigSummary,
    NoInfoChannel,
    AttachmentFailed,
    StoreUnavailable,
    ErrorHappened,
}

impl Msg {
    pub fn template(self) -> &'static str {
        match self {
            Msg::ReplyAdded => "Reply for `{key}` was added.",
            Msg::ReplyExists => "Reply for `{key}` already exists.",
            Msg::ReplyRemoved => "Reply for `{key}` was removed.",
            Msg::ReplyNotFound => "Reply for `{key}` was not found.",
            Msg::NoReplies => "This server has no replies yet.",
            Msg::ReplyList => "**Replies of this server:**\n",
            Msg::ReplyTooLong => "Reply is too long (max {limit} characters).",
            Msg::EmptyKey => "Trigger cannot be empty.",
            Msg::InfoChannelSet => "Info channel set to {channel}.",
            Msg::ConfigSummary => "Info channel: {channel}\nReplies: {count}",
            Msg::NoInfoChannel => "not set",
            Msg::AttachmentFailed => "Failed to download attachment `{filename}`.",
            Msg::StoreUnavailable => "Storage is unavailable right now, please try again later.",
            Msg::ErrorHappened => "`Errors happen Mr. Anderson`",
        }
    }

    /// Render with `args`, escaping mentions in user-supplied values.
    pub fn with(self, args: &[(&str, &str)]) -> String {
        let escaped: Vec<(&str, String)> = args
            .iter()
            .map(|(name, value)| (*name, escape_mentions(value)))
            .collect();
        let refs: Vec<(&str, &str)> = escaped
            .iter()
            .map(|(name, value)| (*name, value.as_str()))
            .collect();
        render(self.template(), &refs)
    }

    pub fn text(self) -> String {
        self.template().to_string()
    }
}

/// Substitute `{name}` placeholders in `template`.
pub fn render(template: &str, args: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                match args.iter().find(|(arg, _)| *arg == name) {
                    Some((_, value)) => out.push_str(value),
                    None => {
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

pub const MORPHEUS_QUOTES: &[&str] = &[
    "Remember...All I'm Offering Is The Truth. Nothing More.",
    "I Have Dreamed A Dream, But Now That Dream Is Gone From Me.",
    "What Was Said Was For You, And You Alone.",
    "We Are Still Here!",
    "Fate, It Seems, Is Not Without A Sense Of Irony.",
    "You Have To Understand, Most People Are Not Ready To Be Unplugged...",
    "You Think That's Air You're Breathing Now?",
    "Have You Ever Had A Dream, Neo, That You Were So Sure Was Real?",
    "Don't THINK You Are. KNOW You Are.",
    "I Can Only Show You The Door. You're The One That Has To Walk Through It.",
    "He's Beginning To Believe!",
    "You Take The Red Pill - You Stay In Wonderland, And I Show You How Deep The Rabbit Hole Goes.",
    "What is real? How do you define real?",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render() {
        assert_eq!(render("Reply for `{key}`.", &[("key", "hi")]), "Reply for `hi`.");
        assert_eq!(render("{a}{b}{a}", &[("a", "1"), ("b", "2")]), "121");
        assert_eq!(render("no args", &[]), "no args");
    }

    #[test]
    fn test_render_leaves_unknown_and_unclosed() {
        assert_eq!(render("{missing} x", &[]), "{missing} x");
        assert_eq!(render("open { brace", &[("x", "y")]), "open { brace");
    }

    #[test]
    fn test_with_escapes_mentions() {
        let text = Msg::ReplyAdded.with(&[("key", "@everyone")]);
        assert!(!text.contains("@everyone"));
        assert!(text.starts_with("Reply for `@"));
    }
}
