//! Terminal rendering for library notices.

use std::io::Write;

use shopfloor_core::notice::{Notice, NoticeLevel, NoticeSink};

/// Prints notices to stderr.
///
/// Error notices are only logged: the failing command already returns the
/// error and `main` prints it once.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalNoticeSink;

impl NoticeSink for TerminalNoticeSink {
    fn notify(&self, notice: Notice) {
        match terminal_line(&notice) {
            Some(line) => {
                let _ = writeln!(std::io::stderr(), "{line}");
            }
            None => tracing::debug!("{}", notice.message),
        }
    }

    fn session_ended(&self) {
        let _ = writeln!(
            std::io::stderr(),
            "Session ended. Run `shopfloor auth login` to sign in again."
        );
    }
}

/// The stderr line for a notice, or `None` when the command reports it itself.
pub fn terminal_line(notice: &Notice) -> Option<String> {
    (notice.level != NoticeLevel::Error).then(|| render_notice(notice))
}

pub fn render_notice(notice: &Notice) -> String {
    format!("[{}] {}", notice.level, notice.message)
}
