//! Group slug derivation.
//!
//! Titles are transliterated (`pinyin` for CJK text) and slugified with the
//! `slug` crate, then cut to the group slug length limit. Uniqueness is checked
//! through a caller-supplied async predicate so the helpers stay free of
//! persistence concerns.

use std::future::Future;

use pinyin::{Pinyin, ToPinyin};
use slug::slugify;
use thiserror::Error;

use super::types::MAX_GROUP_SLUG_LEN;

const MAX_SUFFIX_ATTEMPTS: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlugError {
    #[error("slug source text is empty")]
    EmptyInput,
    #[error("failed to derive slug from `{input}`")]
    Unrepresentable { input: String },
    #[error("exhausted attempts to find a unique slug for `{base}`")]
    Exhausted { base: String },
}

#[derive(Debug, Error)]
pub enum SlugAsyncError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    #[error(transparent)]
    Slug(#[from] SlugError),
    #[error(transparent)]
    Predicate(E),
}

/// Derive a group slug of at most [`MAX_GROUP_SLUG_LEN`] bytes from a title.
pub fn derive_slug(input: &str) -> Result<String, SlugError> {
    if input.trim().is_empty() {
        return Err(SlugError::EmptyInput);
    }

    let candidate = truncate_slug(&slugify(transliterate_to_ascii(input)), MAX_GROUP_SLUG_LEN);
    if candidate.is_empty() {
        return Err(SlugError::Unrepresentable {
            input: input.to_string(),
        });
    }

    Ok(candidate)
}

/// Derive a slug and retry with `-2`, `-3`, ... suffixes until `is_unique`
/// accepts one. The base is shortened so suffixed candidates still fit.
pub async fn generate_unique_slug_async<F, Fut, E>(
    input: &str,
    mut is_unique: F,
) -> Result<String, SlugAsyncError<E>>
where
    F: FnMut(&str) -> Fut,
    Fut: Future<Output = Result<bool, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    let base = derive_slug(input)?;

    if is_unique(&base).await.map_err(SlugAsyncError::Predicate)? {
        return Ok(base);
    }

    for attempt in 2..=MAX_SUFFIX_ATTEMPTS + 1 {
        let suffix = format!("-{attempt}");
        let stem = truncate_slug(&base, MAX_GROUP_SLUG_LEN - suffix.len());
        let candidate = format!("{stem}{suffix}");
        if is_unique(&candidate)
            .await
            .map_err(SlugAsyncError::Predicate)?
        {
            return Ok(candidate);
        }
    }

    Err(SlugAsyncError::Slug(SlugError::Exhausted { base }))
}

fn truncate_slug(slug: &str, max_len: usize) -> String {
    // slugify output is ASCII, so byte slicing is safe.
    let cut = &slug[..slug.len().min(max_len)];
    cut.trim_end_matches('-').to_string()
}

fn transliterate_to_ascii(input: &str) -> String {
    let mut output = String::with_capacity(input.len());

    for ch in input.chars() {
        if ch.is_ascii() {
            output.push(ch);
            continue;
        }

        match ch.to_pinyin() {
            Some(py) => append_pinyin(&mut output, py),
            None if ch.is_whitespace() => output.push(' '),
            None => output.push(ch),
        }
    }

    output
}

fn append_pinyin(buffer: &mut String, pinyin: Pinyin) {
    if !buffer.is_empty() && !buffer.ends_with(' ') {
        buffer.push(' ');
    }
    buffer.push_str(pinyin.plain());
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use super::*;

    #[test]
    fn derive_slug_transliterates_chinese() {
        assert_eq!(derive_slug("Rust 基础").expect("slug"), "rust-ji-chu");
    }

    #[test]
    fn derive_slug_respects_length_limit() {
        let slug = derive_slug("The Quick Brown Fox Jumps Over").expect("slug");
        assert!(slug.len() <= MAX_GROUP_SLUG_LEN);
        assert!(!slug.ends_with('-'));
        assert_eq!(slug, "the-quick-brown-fox");
    }

    #[test]
    fn derive_slug_rejects_blank_titles() {
        assert_eq!(derive_slug("   "), Err(SlugError::EmptyInput));
    }

    #[tokio::test]
    async fn unique_slug_suffix_fits_limit() {
        let taken = ["the-quick-brown-fox".to_string()];
        let slug = generate_unique_slug_async("The Quick Brown Fox Jumps", |candidate| {
            let free = !taken.iter().any(|existing| existing == candidate);
            async move { Ok::<bool, Infallible>(free) }
        })
        .await
        .expect("unique slug");

        assert_eq!(slug, "the-quick-brown-fo-2");
        assert!(slug.len() <= MAX_GROUP_SLUG_LEN);
    }

    #[tokio::test]
    async fn unique_slug_gives_up_eventually() {
        let result = generate_unique_slug_async("Example", |_| async {
            Ok::<bool, Infallible>(false)
        })
        .await;

        assert!(matches!(
            result,
            Err(SlugAsyncError::Slug(SlugError::Exhausted { .. }))
        ));
    }
}
