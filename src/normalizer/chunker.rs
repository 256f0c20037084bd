/// Telegram rejects longer messages (4096), leave room for entities.
pub const MESSAGE_CEILING: usize = 4000;

const PARAGRAPH_BREAK: &str = "\n\n";

/// Split `text` into chunks of at most `ceiling` characters, cutting only
/// between paragraphs.
///
/// Paragraphs are separated by a blank line and are kept whole; joining the
/// chunks with a blank line gives back the input. A single paragraph longer
/// than `ceiling` is the one exception and gets cut at character
/// boundaries.
pub fn split_paragraphs(text: &str, ceiling: usize) -> Vec<String> {
    let ceiling = ceiling.max(1);
    if char_len(text) <= ceiling {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_len = 0;

    for paragraph in text.split(PARAGRAPH_BREAK) {
        let len = char_len(paragraph);
        let joined_len = if current.is_empty() {
            len
        } else {
            current_len + PARAGRAPH_BREAK.len() + len
        };

        if joined_len <= ceiling {
            current.push(paragraph);
            current_len = joined_len;
            continue;
        }

        if !current.is_empty() {
            chunks.push(current.join(PARAGRAPH_BREAK));
            current.clear();
            current_len = 0;
        }

        if len <= ceiling {
            current.push(paragraph);
            current_len = len;
        } else {
            chunks.extend(hard_split(paragraph, ceiling));
        }
    }

    if !current.is_empty() {
        chunks.push(current.join(PARAGRAPH_BREAK));
    }

    chunks
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn hard_split(paragraph: &str, ceiling: usize) -> Vec<String> {
    let chars: Vec<char> = paragraph.chars().collect();
    chars
        .chunks(ceiling)
        .map(|piece| piece.iter().collect())
        .collect()
}
