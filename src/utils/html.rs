/// Clean HTML content using the ammonia library.
///
/// Course, section, question and answer texts are entered by admins and
/// rendered by clients; safe markup (like <b>, <p>) is kept while scripts,
/// iframes and event-handler attributes are stripped.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}
