const ZERO_WIDTH_SPACE: char = '\u{200b}';

const ANSI_BLUE: &str = "\u{001b}[2;34m";
const ANSI_PINK: &str = "\u{001b}[2;35m";
const ANSI_RESET: &str = "\u{001b}[0m";

/// Whether the text pings the bot directly (`<@id>` or the nickname form `<@!id>`).
pub fn mentions_bot(input: &str, bot_id: u64) -> bool {
    let mention = format!("<@{}>", bot_id);
    let mention_nick = format!("<@!{}>", bot_id);
    input.contains(&mention) || input.contains(&mention_nick)
}

/// Break `@` so user-supplied text cannot ping users, roles or everyone.
pub fn escape_mentions(input: &str) -> String {
    input.replace('@', &format!("@{}", ZERO_WIDTH_SPACE))
}

/// One colored `key: value` line of a reply listing.
pub fn reply_list_line(key: &str, value: &str) -> String {
    format!("{ANSI_BLUE}{key}{ANSI_RESET}: {ANSI_PINK}{value}{ANSI_RESET}\n")
}

/// Split text into chunks of at most `limit` characters, cutting after
/// `separator` where possible. A single segment longer than `limit` is cut
/// at the character boundary.
pub fn split_by_separator(text: &str, limit: usize, separator: &str) -> Vec<String> {
    let limit = limit.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for segment in text.split_inclusive(separator) {
        let segment_len = segment.chars().count();
        if current_len + segment_len > limit && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if segment_len > limit {
            let mut chars = segment.chars().peekable();
            while chars.peek().is_some() {
                let piece: String = chars.by_ref().take(limit).collect();
                let piece_len = piece.chars().count();
                if piece_len == limit {
                    chunks.push(piece);
                } else {
                    current = piece;
                    current_len = piece_len;
                }
            }
            continue;
        }

        current.push_str(segment);
        current_len += segment_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
