use crate::error::AnalysisError;
use crate::types::duration::{Timing, recip_to_duration};
use std::borrow::Cow;
use std::fmt;

pub const NULL_DATA: &str = ".";
pub const NULL_INTERPRETATION: &str = "*";
pub const NULL_COMMENT_LOCAL: &str = "!";
pub const NULL_COMMENT_GLOBAL: &str = "!!";

/// Data types whose data tokens carry `**recip` rhythms.
const RHYTHMIC_DATA_TYPES: [&str; 2] = ["**kern", "**recip"];

/// Position of a token inside the owning file: line index, field index and
/// the token generation of that line.
///
/// A line moves to a new generation whenever its tokens are replaced or
/// shifted, and the owning file only resolves ids of the current generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenId {
    pub line: usize,
    pub field: usize,
    pub generation: u32,
}

impl TokenId {
    /// Id in the first generation of a line.
    pub fn new(line: usize, field: usize) -> Self {
        Self {
            line,
            field,
            generation: 0,
        }
    }

    pub fn with_generation(self, generation: u32) -> Self {
        Self { generation, ..self }
    }
}

/// Track number encoded by a spine-info string: the first run of decimal
/// digits, or 0 when there is none. `((1)b)a` → 1, `1 (2)a` → 1.
pub fn parse_track(spine_info: &str) -> usize {
    let Some(start) = spine_info.find(|c: char| c.is_ascii_digit()) else {
        return 0;
    };
    spine_info[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .fold(0usize, |track, digit| {
            track
                .saturating_mul(10)
                .saturating_add(digit.to_digit(10).unwrap_or(0) as usize)
        })
}

/// A single field of a line.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HumdrumToken {
    text: String,
    line_index: Option<usize>,
    field_index: usize,
    generation: u32,
    spine_info: String,
    track: usize,
    subtrack: usize,
    subtrack_count: usize,
    data_type: String,
    duration: Timing,
    next: Vec<TokenId>,
    previous: Vec<TokenId>,
}

impl HumdrumToken {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            ..Default::default()
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replace the token text. The owning line only shows the change after
    /// `HumdrumLine::create_line_from_tokens`.
    pub fn set_text(&mut self, text: &str) {
        self.text = text.to_string();
    }

    pub fn line_index(&self) -> Option<usize> {
        self.line_index
    }

    pub fn field_index(&self) -> usize {
        self.field_index
    }

    pub(crate) fn set_position(&mut self, line_index: Option<usize>, field_index: usize, generation: u32) {
        self.line_index = line_index;
        self.field_index = field_index;
        self.generation = generation;
    }

    /// Id of this token, `None` while its line is not part of a file.
    pub fn id(&self) -> Option<TokenId> {
        self.line_index
            .map(|line| TokenId::new(line, self.field_index).with_generation(self.generation))
    }

    // Classification

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn is_comment(&self) -> bool {
        self.text.starts_with('!')
    }

    pub fn is_local_comment(&self) -> bool {
        self.is_comment() && !self.text.starts_with("!!")
    }

    pub fn is_interpretation(&self) -> bool {
        self.text.starts_with('*')
    }

    pub fn is_exclusive(&self) -> bool {
        self.text.starts_with("**")
    }

    pub fn is_barline(&self) -> bool {
        self.text.starts_with('=')
    }

    pub fn is_data(&self) -> bool {
        !(self.is_empty() || self.is_comment() || self.is_interpretation() || self.is_barline())
    }

    /// Null markers: `.` for data, `*` for interpretations, `!`/`!!` for
    /// comments.
    pub fn is_null(&self) -> bool {
        matches!(
            self.text.as_str(),
            NULL_DATA | NULL_INTERPRETATION | NULL_COMMENT_LOCAL | NULL_COMMENT_GLOBAL
        )
    }

    pub fn is_split(&self) -> bool {
        self.text == "*^"
    }

    pub fn is_merge(&self) -> bool {
        self.text == "*v"
    }

    pub fn is_exchange(&self) -> bool {
        self.text == "*x"
    }

    pub fn is_add(&self) -> bool {
        self.text == "*+"
    }

    pub fn is_terminator(&self) -> bool {
        self.text == "*-"
    }

    pub fn is_manipulator(&self) -> bool {
        self.is_split()
            || self.is_merge()
            || self.is_exchange()
            || self.is_add()
            || self.is_terminator()
            || self.is_exclusive()
    }

    // Spine identity

    pub fn spine_info(&self) -> &str {
        &self.spine_info
    }

    pub fn set_spine_info(&mut self, spine_info: &str) {
        self.spine_info = spine_info.to_string();
    }

    pub fn track(&self) -> usize {
        self.track
    }

    pub fn set_track(&mut self, track: usize) {
        self.track = track;
    }

    /// 1-based position among sibling subtracks, 0 when the track has not
    /// split on this line.
    pub fn subtrack(&self) -> usize {
        self.subtrack
    }

    pub fn set_subtrack(&mut self, subtrack: usize) {
        self.subtrack = subtrack;
    }

    pub fn subtrack_count(&self) -> usize {
        self.subtrack_count
    }

    pub fn set_subtrack_count(&mut self, count: usize) {
        self.subtrack_count = count;
    }

    /// `track` or `track.subtrack` when the track is split.
    pub fn track_string(&self) -> String {
        if self.subtrack > 0 {
            format!("{}.{}", self.track, self.subtrack)
        } else {
            self.track.to_string()
        }
    }

    /// Exclusive interpretation of the spine, e.g. `**kern`. Empty until spine
    /// analysis has run.
    pub fn data_type(&self) -> &str {
        &self.data_type
    }

    pub fn set_data_type(&mut self, data_type: &str) {
        self.data_type = data_type.to_string();
    }

    /// Accepts the data type with or without its `**` prefix.
    pub fn is_data_type(&self, data_type: &str) -> bool {
        match data_type.strip_prefix("**") {
            Some(_) => self.data_type == data_type,
            None => self.data_type.strip_prefix("**") == Some(data_type),
        }
    }

    pub fn is_kern(&self) -> bool {
        self.is_data_type("**kern")
    }

    pub fn has_rhythm(&self) -> bool {
        RHYTHMIC_DATA_TYPES.contains(&self.data_type.as_str())
    }

    /// A sounding `**kern` note that is not a rest or the continuation of a
    /// tie.
    pub fn is_note_attack(&self) -> bool {
        if !self.is_data() || self.is_null() {
            return false;
        }
        !(self.text.contains('r') || self.text.contains('_') || self.text.contains(']'))
    }

    // Rhythm

    pub fn duration(&self) -> Timing {
        self.duration
    }

    pub fn set_duration(&mut self, duration: Timing) {
        self.duration = duration;
    }

    /// Derive the duration of the token from its rhythm.
    ///
    /// Tokens without rhythm (non-rhythmic spines, nulls, interpretations,
    /// comments, barlines) are left unanalyzed. A rhythmic data token without
    /// a readable rhythm is an error.
    pub fn analyze_duration(&mut self) -> Result<(), AnalysisError> {
        self.duration = Timing::Unanalyzed;
        if !self.has_rhythm() || !self.is_data() || self.is_null() {
            return Ok(());
        }
        match recip_to_duration(&self.text) {
            Some(duration) => {
                self.duration = Timing::known(duration);
                Ok(())
            }
            None => Err(AnalysisError::new(
                self.line_index.map_or(0, |index| index + 1),
                self.field_index + 1,
                format!("no rhythm in {} token \"{}\"", self.data_type, self.text),
            )),
        }
    }

    // Links to the neighbouring tokens of the same spine

    pub fn next_tokens(&self) -> &[TokenId] {
        &self.next
    }

    pub fn previous_tokens(&self) -> &[TokenId] {
        &self.previous
    }

    pub(crate) fn add_next(&mut self, id: TokenId) {
        if !self.next.contains(&id) {
            self.next.push(id);
        }
    }

    pub(crate) fn add_previous(&mut self, id: TokenId) {
        if !self.previous.contains(&id) {
            self.previous.push(id);
        }
    }

    pub(crate) fn clear_links(&mut self) {
        self.next.clear();
        self.previous.clear();
    }

    // Output

    /// CSV-safe rendering: quoted, with doubled quotes, when the text holds
    /// the separator, a comma or a quote.
    pub fn to_csv(&self, separator: &str) -> Cow<'_, str> {
        crate::csv::escape_field(&self.text, separator)
    }
}

impl fmt::Display for HumdrumToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::duration::HumNum;

    fn kern(text: &str) -> HumdrumToken {
        let mut token = HumdrumToken::new(text);
        token.set_data_type("**kern");
        token
    }

    #[test]
    fn test_parse_track() {
        assert_eq!(parse_track("1"), 1);
        assert_eq!(parse_track("(2)a"), 2);
        assert_eq!(parse_track("((12)b)a"), 12);
        assert_eq!(parse_track("1 (2)a"), 1);
        assert_eq!(parse_track("(x)a"), 0);
        assert_eq!(parse_track(""), 0);
    }

    #[test]
    fn test_classification() {
        assert!(HumdrumToken::new(".").is_null());
        assert!(HumdrumToken::new("*").is_null());
        assert!(HumdrumToken::new("!").is_null());
        assert!(!HumdrumToken::new("4c").is_null());

        assert!(HumdrumToken::new("4c").is_data());
        assert!(!HumdrumToken::new("=1").is_data());
        assert!(HumdrumToken::new("=1").is_barline());
        assert!(HumdrumToken::new("**kern").is_exclusive());
        assert!(HumdrumToken::new("*^").is_manipulator());
        assert!(HumdrumToken::new("*-").is_terminator());
        assert!(!HumdrumToken::new("*M4/4").is_manipulator());
        assert!(HumdrumToken::new("! local").is_local_comment());
    }

    #[test]
    fn test_data_type_matching() {
        let token = kern("4c");
        assert!(token.is_data_type("**kern"));
        assert!(token.is_data_type("kern"));
        assert!(!token.is_data_type("**text"));
        assert!(token.has_rhythm());
        assert!(token.is_kern());
    }

    #[test]
    fn test_analyze_duration() {
        let mut token = kern("8.cc#");
        token.analyze_duration().unwrap();
        assert_eq!(token.duration(), Timing::known(HumNum::new(3, 4)));

        let mut null = kern(".");
        null.analyze_duration().unwrap();
        assert!(!null.duration().is_analyzed());

        let mut text = HumdrumToken::new("la");
        text.set_data_type("**text");
        text.analyze_duration().unwrap();
        assert!(!text.duration().is_analyzed());
    }

    #[test]
    fn test_analyze_duration_error() {
        let mut token = kern("cc");
        token.set_position(Some(4), 1, 0);
        let err = token.analyze_duration().unwrap_err();
        assert_eq!(err.line, 5);
        assert_eq!(err.field, 2);
        assert_eq!(err.to_string(), "Line 5, field 2: no rhythm in **kern token \"cc\"");
    }

    #[test]
    fn test_id_carries_generation() {
        let mut token = kern("4c");
        assert_eq!(token.id(), None);
        token.set_position(Some(2), 1, 3);
        assert_eq!(token.id(), Some(TokenId::new(2, 1).with_generation(3)));
        assert_ne!(token.id(), Some(TokenId::new(2, 1)));
    }

    #[test]
    fn test_note_attack_and_track_string() {
        assert!(kern("4c").is_note_attack());
        assert!(!kern("4r").is_note_attack());
        assert!(!kern("4c_").is_note_attack());
        assert!(!kern("4c]").is_note_attack());

        let mut token = kern("4c");
        token.set_track(3);
        assert_eq!(token.track_string(), "3");
        token.set_subtrack(2);
        assert_eq!(token.track_string(), "3.2");
    }
}
