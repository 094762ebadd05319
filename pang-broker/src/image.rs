//! Generated-image URL builder. No request is made; clients fetch the URL.

use pang_common::{Error, Result};
use url::Url;

/// Build the generation URL for `prompt`.
///
/// `base` is a URL prefix such as `https://image.pollinations.ai/prompt/`; the
/// prompt becomes one percent-encoded path segment after it.
pub fn image_url(base: &str, prompt: &str, model: &str) -> Result<String> {
    let mut url = Url::parse(base)
        .map_err(|e| Error::Config(format!("Invalid image base URL {}: {}", base, e)))?;

    url.path_segments_mut()
        .map_err(|_| Error::Config(format!("Image base URL cannot take a path: {}", base)))?
        .pop_if_empty()
        .push(prompt);

    url.query_pairs_mut()
        .clear()
        .append_pair("height", "1000")
        .append_pair("width", "1000")
        .append_pair("enhance", "true")
        .append_pair("nologo", "true")
        .append_pair("model", model);

    Ok(url.into())
}
