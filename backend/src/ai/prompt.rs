use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref SCRIPT_STYLE_BLOCK: Regex = Regex::new(
        r"(?is)<script\b[^>]*>.*?</script\s*>|<style\b[^>]*>.*?</style\s*>"
    )
    .expect("hard-coded regex");
    static ref HTML_COMMENT: Regex = Regex::new(r"(?s)<!--.*?-->").expect("hard-coded regex");
    static ref MARKUP_TAG: Regex = Regex::new(r"</?[A-Za-z][^>]*>").expect("hard-coded regex");
}

/// Strips markup from the configured prompt before it is sent to a
/// provider: script/style blocks and comments are removed entirely, any
/// remaining tags are dropped and their inner text kept. Prose is left
/// untouched; nothing is escaped or truncated.
///
/// This guards against HTML remnants in user-editable configuration. It is
/// not a defense against adversarial prompt injection.
pub fn clean(raw_prompt: &str) -> String {
    let without_blocks = SCRIPT_STYLE_BLOCK.replace_all(raw_prompt, "");
    let without_comments = HTML_COMMENT.replace_all(&without_blocks, "");
    MARKUP_TAG
        .replace_all(&without_comments, "")
        .trim()
        .to_string()
}
