//! Classifier for downloader output lines

use regex::Regex;
use std::sync::LazyLock;

/// Progress-bar glyph the tool draws; removed before a line is shown
const BAR_GLYPH: char = '\u{2501}';

/// Marker the tool prefixes its error messages with
const ERROR_MARKER: &str = "ERROR:";

#[allow(clippy::expect_used)]
static PERCENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+\.\d+)%").expect("percent pattern is valid"));

/// A classified line of downloader output
#[derive(Debug, Clone, PartialEq)]
pub enum OutputLine {
    /// Line carrying a completion percentage
    Progress {
        /// First `<digits>.<digits>%` match, truncated to a whole percent
        percent: u8,
        /// Cleaned line text
        text: String,
    },
    /// Line containing the error marker
    Error(String),
    /// Anything else; still shown as the task's status text
    Other(String),
}

impl OutputLine {
    /// Cleaned text of the line
    pub fn text(&self) -> &str {
        match self {
            OutputLine::Progress { text, .. } | OutputLine::Error(text) | OutputLine::Other(text) => {
                text
            }
        }
    }
}

/// Strip progress-bar glyphs and surrounding whitespace
pub fn clean_line(line: &str) -> String {
    line.replace(BAR_GLYPH, "").trim().to_string()
}

/// Classify one line of output
///
/// A percentage takes precedence over the error marker, so a progress line
/// that happens to mention `ERROR:` still counts as progress.
///
/// # Examples
///
/// ```
/// use episode_dl::supervisor::{OutputLine, parse_output_line};
///
/// assert_eq!(
///     parse_output_line("Vid 1080p ━━━━━━ 42.7% 12.3MB/s"),
///     OutputLine::Progress { percent: 42, text: "Vid 1080p  42.7% 12.3MB/s".into() }
/// );
/// assert!(matches!(parse_output_line("ERROR: 403"), OutputLine::Error(_)));
/// ```
pub fn parse_output_line(line: &str) -> OutputLine {
    let text = clean_line(line);

    if let Some(captures) = PERCENT_RE.captures(&text)
        && let Some(value) = captures.get(1)
        && let Ok(value) = value.as_str().parse::<f32>()
    {
        let percent = value.clamp(0.0, 100.0) as u8;
        return OutputLine::Progress { percent, text };
    }

    if text.contains(ERROR_MARKER) {
        return OutputLine::Error(text);
    }

    OutputLine::Other(text)
}
