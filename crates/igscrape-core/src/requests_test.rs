use std::sync::{Arc, Mutex};

use super::*;

fn row(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect()
}

// -----------------------------------------------------------------------
// extract_shortcode
// -----------------------------------------------------------------------

#[test]
fn extracts_shortcode_with_trailing_slash() {
    assert_eq!(
        extract_shortcode("https://example.com/p/AbC123xy/").as_deref(),
        Some("AbC123xy")
    );
}

#[test]
fn extracts_shortcode_without_trailing_slash() {
    assert_eq!(
        extract_shortcode("https://www.instagram.com/p/CqzmmWjy95o").as_deref(),
        Some("CqzmmWjy95o")
    );
}

#[test]
fn extracts_shortcode_ignoring_query_string() {
    assert_eq!(
        extract_shortcode("https://www.instagram.com/p/Cq_-9x/?igsh=MWQ1").as_deref(),
        Some("Cq_-9x")
    );
}

#[test]
fn no_shortcode_without_delimiter() {
    assert_eq!(extract_shortcode("https://www.instagram.com/natgeo/"), None);
}

#[test]
fn no_shortcode_when_segment_is_empty() {
    assert_eq!(extract_shortcode("https://www.instagram.com/p/"), None);
}

// -----------------------------------------------------------------------
// classify_record
// -----------------------------------------------------------------------

#[test]
fn permalink_row_is_single_post() {
    let r = row(&[("link", "https://example.com/p/AbC123xy/"), ("name", "natgeo")]);
    let req = classify_record(&r, 5).unwrap();
    assert_eq!(req.mode, RequestMode::SinglePost);
    assert_eq!(req.target, "AbC123xy");
    assert_eq!(req.permalink.as_deref(), Some("https://example.com/p/AbC123xy/"));
    assert_eq!(req.origin_metadata, r);
}

#[test]
fn identifier_row_is_profile_with_posts() {
    let r = row(&[("name", "natgeo")]);
    let req = classify_record(&r, 5).unwrap();
    assert_eq!(req.mode, RequestMode::ProfileWithPosts);
    assert_eq!(req.target, "natgeo");
    assert_eq!(req.post_limit, 5);
    assert!(req.permalink.is_none());
}

#[test]
fn identifier_priority_prefers_app_unique_id() {
    let r = row(&[("app_unique_id", "25025320"), ("name", "instagram")]);
    let req = classify_record(&r, 3).unwrap();
    assert_eq!(req.target, "25025320");
}

#[test]
fn blank_identifier_falls_through_to_next_column() {
    let r = row(&[("app_unique_id", "  "), ("name", ""), ("username", "@github")]);
    let req = classify_record(&r, 3).unwrap();
    assert_eq!(req.target, "github");
}

#[test]
fn non_post_link_falls_back_to_identifier() {
    let r = row(&[("link", "https://www.instagram.com/natgeo/"), ("name", "natgeo")]);
    let req = classify_record(&r, 2).unwrap();
    assert_eq!(req.mode, RequestMode::ProfileWithPosts);
    assert_eq!(req.target, "natgeo");
}

#[test]
fn row_without_identifier_is_rejected() {
    let r = row(&[("link", ""), ("display_name", "National Geographic")]);
    assert_eq!(classify_record(&r, 2), Err(RequestParseError::NoIdentifier));
}

// -----------------------------------------------------------------------
// RequestQueue
// -----------------------------------------------------------------------

#[test]
fn queue_preserves_input_order_and_drops_unusable_rows() {
    let rows = vec![
        row(&[("name", "natgeo")]),
        row(&[("display_name", "nothing usable")]),
        row(&[("link", "https://example.com/p/AbC123xy/")]),
        row(&[("name", "nasa")]),
    ];
    let mut queue = RequestQueue::from_records(rows, 4);
    assert_eq!(queue.len(), 3);
    assert_eq!(queue.dropped(), 1);

    let targets: Vec<String> = std::iter::from_fn(|| queue.pop()).map(|r| r.target).collect();
    assert_eq!(targets, vec!["natgeo", "AbC123xy", "nasa"]);
    assert!(queue.is_empty());
}

/// Formatted log output collected in memory.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLogs {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[test]
fn dropped_row_leaves_queue_length_unchanged() {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .finish();

    let queue = tracing::subscriber::with_default(subscriber, || {
        RequestQueue::from_records(
            vec![row(&[("other", "x")]), row(&[("username", "natgeo")])],
            4,
        )
    });
    assert_eq!(queue.len(), 1);
    assert_eq!(queue.dropped(), 1);

    let output = logs.contents();
    assert!(output.contains("WARN"), "expected a warning, got: {output}");
    assert!(output.contains("skipping input row"), "got: {output}");
    assert!(output.contains("row=1"), "got: {output}");
    assert_eq!(output.matches("skipping input row").count(), 1);
}
