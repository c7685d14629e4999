//! Method name normalization.

/// Convert a method name to the lower camel case used by client stubs.
///
/// Words are split at non-alphanumeric characters, lower-to-upper
/// transitions, the end of an upper-case run followed by a lower-case letter,
/// and letter/digit transitions. The first word is lower-cased and every
/// following word capitalized.
pub fn to_lower_camel(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for (index, word) in split_words(name).into_iter().enumerate() {
        let lower = word.to_lowercase();
        if index == 0 {
            out.push_str(&lower);
            continue;
        }
        let mut chars = lower.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
        }
    }
    out
}

fn split_words(name: &str) -> Vec<&str> {
    let chars: Vec<(usize, char)> = name.char_indices().collect();
    let mut words = Vec::new();
    let mut start: Option<usize> = None;

    for (i, &(pos, c)) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            if let Some(s) = start.take() {
                words.push(&name[s..pos]);
            }
            continue;
        }
        match start {
            None => start = Some(pos),
            Some(s) => {
                let prev = chars[i - 1].1;
                let next = chars.get(i + 1).map(|&(_, n)| n);
                if is_boundary(prev, c, next) {
                    words.push(&name[s..pos]);
                    start = Some(pos);
                }
            }
        }
    }
    if let Some(s) = start {
        words.push(&name[s..]);
    }
    words
}

fn is_boundary(prev: char, current: char, next: Option<char>) -> bool {
    (prev.is_lowercase() && current.is_uppercase())
        || (prev.is_uppercase() && current.is_uppercase() && next.is_some_and(char::is_lowercase))
        || (prev.is_alphabetic() && current.is_numeric())
        || (prev.is_numeric() && current.is_alphabetic())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_lower_camel() {
        let cases = [
            ("SayHello", "sayHello"),
            ("sayHello", "sayHello"),
            ("say_hello", "sayHello"),
            ("say-hello", "sayHello"),
            ("SAY_HELLO", "sayHello"),
            ("say hello", "sayHello"),
            ("ThrowAnErr", "throwAnErr"),
            ("HTTPRequest", "httpRequest"),
            ("getHTTPResponse", "getHttpResponse"),
            ("foo2bar", "foo2Bar"),
            ("Get2FACode", "get2FaCode"),
            ("__Private__", "private"),
            ("a", "a"),
            ("", ""),
        ];
        for (input, expected) in cases {
            assert_eq!(to_lower_camel(input), expected, "input: {:?}", input);
        }
    }

    #[test]
    fn test_idempotent() {
        for name in ["SayHello", "say_hello", "HTTPRequest", "foo2bar"] {
            let once = to_lower_camel(name);
            assert_eq!(to_lower_camel(&once), once);
        }
    }

    #[test]
    fn test_non_ascii() {
        assert_eq!(to_lower_camel("Grüße_Welt"), "grüßeWelt");
    }
}
