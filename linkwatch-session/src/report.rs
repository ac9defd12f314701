//! Terminal output for accepted local changes.

use chrono::{DateTime, Local};
use colored::Colorize;

use crate::queue::ChangeKind;

/// `HH:MM:SS:mmm - U path`
pub fn change_line(kind: ChangeKind, remote: &str, at: DateTime<Local>) -> String {
    let tag = match kind {
        ChangeKind::Update => kind.tag().to_string().yellow(),
        ChangeKind::Delete => kind.tag().to_string().red(),
    };
    format!("{} - {tag} {remote}", at.format("%H:%M:%S:%3f"))
}

pub fn print_change(kind: ChangeKind, remote: &str) {
    println!("{}", change_line(kind, remote, Local::now()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn line_has_millisecond_timestamp_tag_and_path() {
        let at = Local
            .with_ymd_and_hms(2024, 5, 1, 12, 3, 4)
            .single()
            .expect("valid local time")
            + chrono::Duration::milliseconds(5);
        let line = change_line(ChangeKind::Delete, "store/a.js", at);
        assert!(line.starts_with("12:03:04:005 - "), "got: {line}");
        assert!(line.contains('D'));
        assert!(line.ends_with(" store/a.js"), "got: {line}");
    }
}
