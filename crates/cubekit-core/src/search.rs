use reqwest::Url;

use crate::error::CubeError;

/// Address of the card search page for `query`.
pub fn search_url(base_url: &str, query: &str) -> Result<String, CubeError> {
    let mut url = Url::parse(base_url)
        .and_then(|base| base.join("/tool/searchcards"))
        .map_err(|e| CubeError::InvalidValue(format!("bad server url {base_url}: {e}")))?;
    url.query_pairs_mut().append_pair("f", query.trim());
    Ok(url.into())
}

/// Case-insensitive prefix matches in source order, without repeats.
pub fn suggest<'a>(names: &'a [String], prefix: &str, limit: usize) -> Vec<&'a str> {
    let needle = prefix.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }

    let mut out: Vec<&str> = Vec::new();
    for name in names {
        if out.len() >= limit {
            break;
        }
        if name.to_lowercase().starts_with(&needle) && !out.contains(&name.as_str()) {
            out.push(name);
        }
    }
    out
}
