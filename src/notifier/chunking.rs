//! Message chunking for transports with a per-message size limit.
//!
//! Lengths are counted in Unicode scalar values.

/// Telegram's per-message limit.
pub const MAX_MESSAGE_LENGTH: usize = 4096;

/// Room left free in every piece of a hard-split line.
pub const HARD_SPLIT_HEADROOM: usize = 100;

/// Split `message` into chunks of at most `limit` characters.
///
/// Messages that fit are returned unchanged as a single chunk. Otherwise
/// lines are packed greedily; a line longer than `limit` is cut into
/// pieces of `limit - 100` characters, each its own chunk. No chunk of a
/// split message is empty.
pub fn split_message(message: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);

    if char_len(message) <= limit {
        return vec![message.to_string()];
    }

    let width = hard_split_width(limit);
    let mut chunks = Vec::new();
    let mut current = Pending::default();

    for line in message.split('\n') {
        let line_len = char_len(line);

        if line_len > limit {
            current.flush_into(&mut chunks);
            chunks.extend(hard_split(line, width));
            continue;
        }

        if current.len_with(line_len) > limit {
            current.flush_into(&mut chunks);
        }
        current.push(line, line_len);
    }

    current.flush_into(&mut chunks);
    chunks
}

/// Piece width used when a single line exceeds the limit.
pub fn hard_split_width(limit: usize) -> usize {
    if limit > HARD_SPLIT_HEADROOM {
        limit - HARD_SPLIT_HEADROOM
    } else {
        limit.max(1)
    }
}

/// Lines collected for the next chunk.
#[derive(Default)]
struct Pending {
    text: String,
    len: usize,
    has_lines: bool,
}

impl Pending {
    /// Length after appending a line of `line_len` plus its separator.
    fn len_with(&self, line_len: usize) -> usize {
        if self.has_lines {
            self.len + 1 + line_len
        } else {
            line_len
        }
    }

    fn push(&mut self, line: &str, line_len: usize) {
        self.len = self.len_with(line_len);
        if self.has_lines {
            self.text.push('\n');
        }
        self.text.push_str(line);
        self.has_lines = true;
    }

    fn flush_into(&mut self, chunks: &mut Vec<String>) {
        let pending = std::mem::take(self);
        if !pending.text.is_empty() {
            chunks.push(pending.text);
        }
    }
}

fn hard_split(line: &str, width: usize) -> Vec<String> {
    let chars: Vec<char> = line.chars().collect();
    chars.chunks(width).map(|piece| piece.iter().collect()).collect()
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
