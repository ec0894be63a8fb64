//! Splitting long message bodies into wire-sized fragments.

/// Split `message` into fragments of at most `max_len` bytes.
///
/// Breaks at the last whitespace inside the window when there is one,
/// otherwise at the last character boundary. Fragments keep their order
/// and never split a UTF-8 sequence. Whitespace at a break is dropped.
///
/// ```
/// use slirc_proto::split::split;
///
/// assert_eq!(split("hello big world", 9), vec!["hello big", "world"]);
/// ```
pub fn split(message: &str, max_len: usize) -> Vec<String> {
    let max_len = max_len.max(4);
    let mut fragments = Vec::new();
    let mut rest = message;

    while rest.len() > max_len {
        let mut cut = max_len;
        while !rest.is_char_boundary(cut) {
            cut -= 1;
        }

        let window = &rest[..cut];
        if let Some(ws) = rest[cut..].chars().next().filter(|c| c.is_whitespace()) {
            fragments.push(window.to_owned());
            rest = &rest[cut + ws.len_utf8()..];
            continue;
        }

        let (head, tail) = match window.rfind(char::is_whitespace) {
            Some(pos) if pos > 0 => {
                let ws_len = window[pos..].chars().next().map_or(1, char::len_utf8);
                (&rest[..pos], &rest[pos + ws_len..])
            }
            _ => (window, &rest[cut..]),
        };

        fragments.push(head.to_owned());
        rest = tail;
    }

    if !rest.is_empty() || fragments.is_empty() {
        fragments.push(rest.to_owned());
    }
    fragments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_message_is_untouched() {
        assert_eq!(split("hi", 10), vec!["hi"]);
        assert_eq!(split("", 10), vec![""]);
    }

    #[test]
    fn test_hard_break_without_whitespace() {
        assert_eq!(split("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_respects_char_boundaries() {
        let parts = split("ééééé", 5);
        assert_eq!(parts, vec!["éé", "éé", "é"]);
        assert!(parts.iter().all(|p| p.len() <= 5));
    }

    #[test]
    fn test_break_exactly_at_limit() {
        assert_eq!(split("hello big world", 9), vec!["hello big", "world"]);
    }

    #[test]
    fn test_whitespace_break() {
        assert_eq!(
            split("the quick brown fox", 10),
            vec!["the quick", "brown fox"]
        );
    }

    proptest::proptest! {
        #[test]
        fn fragments_fit_and_preserve_words(words in proptest::collection::vec("[a-z]{1,8}", 0..30), max in 8usize..64) {
            let message = words.join(" ");
            let parts = split(&message, max);
            for part in &parts {
                proptest::prop_assert!(part.len() <= max);
            }
            proptest::prop_assert_eq!(parts.join(" ").split_whitespace().collect::<Vec<_>>(), words.iter().map(String::as_str).collect::<Vec<_>>());
        }
    }
}
