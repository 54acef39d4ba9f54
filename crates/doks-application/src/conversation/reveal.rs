/// Cumulative prefixes of `text`, one per word.
///
/// Every prefix ends where a word ends, so markdown tokens such as
/// `**bold**` or code spans are never cut in half. The last prefix is always
/// the full text, trailing whitespace included. Text without any word yields
/// the text itself as the only prefix.
pub fn word_prefixes(text: &str) -> Vec<&str> {
    let mut ends = Vec::new();
    let mut in_word = false;

    for (idx, ch) in text.char_indices() {
        if ch.is_whitespace() {
            if in_word {
                ends.push(idx);
                in_word = false;
            }
        } else {
            in_word = true;
        }
    }

    if in_word || ends.is_empty() {
        ends.push(text.len());
    } else if let Some(last) = ends.last_mut() {
        *last = text.len();
    }

    ends.into_iter().map(|end| &text[..end]).collect()
}
