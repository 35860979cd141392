//! Tokenization and n-gram enumeration.

use referent_core::{Ngram, Token};

/// Characters that separate tokens and are dropped.
const DELIMITERS: &[char] = &[
    ' ', '\t', '\n', '\r', '\u{0C}', '—', '/', '*', '`', '"', '\'', '(', ')', '[', ']', '{', '}',
    ',', '‘', '’', '“', '”', ';', '?', '_', '\u{A0}',
];

/// Sentence punctuation: separates tokens and becomes a token itself.
const DELIMITERS_KEEP: &[char] = &['.', '!', '-', ':'];

/// Split text into lowercased tokens.
///
/// Offsets are character positions in `text`. Kept delimiters come out as
/// single-character tokens in text order.
///
/// # Examples
///
/// ```
/// use referent::extract::tokenize;
///
/// let tokens = tokenize("Apollo 11 landed. (Moon)");
/// let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
/// assert_eq!(texts, ["apollo", "11", "landed", ".", "moon"]);
/// assert_eq!(tokens[4].offset, 19);
/// ```
#[must_use]
pub fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut start = 0;

    // A trailing delimiter flushes the last token
    for (i, ch) in text.chars().chain(std::iter::once(' ')).enumerate() {
        let keep = DELIMITERS_KEEP.contains(&ch);
        if !keep && !DELIMITERS.contains(&ch) {
            if current.is_empty() {
                start = i;
            }
            current.push(ch);
            continue;
        }
        if !current.is_empty() {
            tokens.push(Token::new(&current, start));
            current.clear();
        }
        if keep {
            tokens.push(Token::new(ch.encode_utf8(&mut [0; 4]), i));
        }
    }
    tokens
}

/// Every contiguous n-gram of 1 to `max_len` tokens.
///
/// Uses a ring of `max_len` in-progress n-grams: each new token starts a
/// fresh n-gram in the oldest slot and extends all the others, so the cost
/// is `O(tokens * max_len)`. The `original` of every n-gram is the exact
/// substring of `text` it spans.
#[must_use]
pub fn gather_ngrams(text: &str, tokens: &[Token], max_len: usize) -> Vec<Ngram> {
    if max_len == 0 {
        return Vec::new();
    }

    let mut result = Vec::with_capacity(tokens.len() * max_len);
    let mut ring: Vec<Ngram> = Vec::with_capacity(max_len);
    let mut oldest = 0;

    for token in tokens {
        if ring.len() < max_len {
            ring.push(Ngram::from_token(token));
            let newest = ring.len() - 1;
            result.push(ring[newest].clone());
            for ngram in &mut ring[..newest] {
                ngram.append(token);
                result.push(ngram.clone());
            }
        } else {
            ring[oldest] = Ngram::from_token(token);
            result.push(ring[oldest].clone());
            let mut j = (oldest + 1) % max_len;
            while j != oldest {
                ring[j].append(token);
                result.push(ring[j].clone());
                j = (j + 1) % max_len;
            }
            oldest = (oldest + 1) % max_len;
        }
    }

    // Character offsets -> byte offsets
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(b, _)| b)
        .chain(std::iter::once(text.len()))
        .collect();
    for ngram in &mut result {
        let span = boundaries
            .get(ngram.offset)
            .zip(boundaries.get(ngram.offset + ngram.length));
        if let Some((&from, &to)) = span {
            ngram.original = text[from..to].to_string();
        }
    }
    result
}
