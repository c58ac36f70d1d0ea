//! URL-safe slugs for public card and bio link pages.

/// Upper bound on slug length, before any collision suffix.
pub const MAX_SLUG_LEN: usize = 80;

/// Lower-case ASCII, runs of anything else collapse to a single `-`.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;

    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
        if slug.len() >= MAX_SLUG_LEN {
            break;
        }
    }

    if slug.is_empty() {
        "page".to_string()
    } else {
        slug
    }
}

/// First free slug among `base`, `base-1`, `base-2`, ...
///
/// `taken` is consulted once per candidate. There is no reservation, so two
/// concurrent creators can pick the same candidate; the UNIQUE index on the
/// table rejects the loser.
pub fn unique_slug<E>(
    base: &str,
    mut taken: impl FnMut(&str) -> Result<bool, E>,
) -> Result<String, E> {
    if !taken(base)? {
        return Ok(base.to_string());
    }

    let mut n: u64 = 1;
    loop {
        let candidate = format!("{}-{}", base, n);
        if !taken(&candidate)? {
            return Ok(candidate);
        }
        n += 1;
    }
}
