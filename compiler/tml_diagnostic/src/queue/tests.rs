use super::*;
use crate::Severity;
use pretty_assertions::assert_eq;
use tml_ir::Span;

fn err(code: ErrorCode, start: u32, msg: &str) -> Diagnostic {
    Diagnostic::error(code)
        .with_message(msg)
        .with_label(Span::new(start, start + 1), "here")
}

#[test]
fn duplicates_are_dropped() {
    let mut queue = DiagnosticQueue::new();
    assert!(queue.push(err(ErrorCode::E5001, 4, "unresolved call to `f`")));
    assert!(!queue.push(err(ErrorCode::E5001, 4, "unresolved call to `f`")));
    assert!(queue.push(err(ErrorCode::E5001, 9, "unresolved call to `f`")));
    assert_eq!(queue.error_count(), 2);
}

#[test]
fn error_limit_stops_errors_not_warnings() {
    let mut queue = DiagnosticQueue::with_config(DiagnosticConfig {
        error_limit: 1,
        deduplicate: true,
    });
    assert!(queue.push(err(ErrorCode::E5001, 0, "a")));
    assert!(!queue.push(err(ErrorCode::E5004, 1, "b")));
    let warning = Diagnostic::warning(ErrorCode::W5001).with_message("defaulted");
    assert!(queue.push(warning));
    assert_eq!(queue.len(), 2);
    assert!(queue.limit_reached());
}

#[test]
fn flush_sorts_by_position() {
    let mut queue = DiagnosticQueue::new();
    let _ = queue.push(err(ErrorCode::E5005, 30, "late"));
    let _ = queue.push(err(ErrorCode::E5001, 10, "early"));
    let _ = queue.push(Diagnostic::warning(ErrorCode::W5002).with_message("spanless"));

    let flushed = queue.flush();
    let messages: Vec<_> = flushed.iter().map(|d| d.message.as_str()).collect();
    assert_eq!(messages, vec!["spanless", "early", "late"]);
    assert_eq!(flushed[0].severity, Severity::Warning);
    assert!(queue.is_empty());
    assert!(!queue.has_errors());
}

#[test]
fn dedup_key_includes_the_code() {
    let mut queue = DiagnosticQueue::new();
    assert!(queue.push(err(ErrorCode::E5001, 4, "same text")));
    assert!(queue.push(err(ErrorCode::E5005, 4, "same text")));
    assert!(!queue.push(err(ErrorCode::E5005, 4, "same text")));
    assert_eq!(queue.len(), 2);
}
