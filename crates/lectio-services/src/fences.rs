use regex::Regex;
use std::sync::LazyLock;

static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```(?i:json)?").expect("valid fence regex"));

/// Remove markdown code fences and trim. Models frequently wrap JSON in them even
/// when told not to.
pub(crate) fn strip_code_fences(raw: &str) -> String {
    FENCE_RE.replace_all(raw, "").trim().to_string()
}

/// The outermost `{...}` span, for replies with prose before or after the object.
pub(crate) fn outer_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}
