//! A single Humdrum record and its tokens.
//!
//! Classification works on the raw characters of the line and never needs
//! tokens. Tokens are split from the text on first request and are owned by
//! the line. Timing fields start out unanalyzed and are filled in by the
//! file-level rhythm passes.

use crate::error::{AnalysisError, HumdrumError};
use crate::types::duration::{
    HumNum, Timing, duration_to_recip, is_negative, is_zero, mixed_fraction, recip_to_duration, zero,
};
use crate::types::parameters::ParameterStore;
use crate::types::token::{HumdrumToken, TokenId, parse_track};
use std::cell::OnceCell;
use std::collections::HashMap;
use std::fmt;

/// Cross-line context supplied by the file that owns a line.
pub trait LineOwner {
    /// Total duration of the score in quarter notes.
    fn score_duration(&self) -> HumNum;

    /// Exclusive interpretation token that starts `track`.
    fn track_start(&self, track: usize) -> Option<&HumdrumToken>;

    fn xml_id_prefix(&self) -> &str;

    fn token(&self, id: TokenId) -> Option<&HumdrumToken>;
}

/// Mutually exclusive classification of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Empty,
    Reference,
    GlobalComment,
    LocalComment,
    Exclusive,
    Interpretation,
    Barline,
    Data,
}

/// Reference key with its optional language tag split out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceKey {
    pub key: String,
    pub language: Option<String>,
    /// Set by the `@@lang` form.
    pub primary: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HumdrumLine {
    text: String,
    line_index: Option<usize>,
    tokens: OnceCell<Vec<HumdrumToken>>,
    // Bumped whenever tokens are replaced or shifted.
    generation: u32,
    duration: Timing,
    duration_from_start: Timing,
    duration_from_barline: Timing,
    duration_to_barline: Timing,
    parameters: ParameterStore,
}

impl Default for HumdrumLine {
    fn default() -> Self {
        Self::new("")
    }
}

impl HumdrumLine {
    /// Create a line from one input record. A trailing carriage return is
    /// removed.
    pub fn new(text: &str) -> Self {
        Self {
            text: text.strip_suffix('\r').unwrap_or(text).to_string(),
            line_index: None,
            tokens: OnceCell::new(),
            generation: 0,
            duration: Timing::Unanalyzed,
            duration_from_start: Timing::Unanalyzed,
            duration_from_barline: Timing::Unanalyzed,
            duration_to_barline: Timing::Unanalyzed,
            parameters: ParameterStore::with_prefix("!!"),
        }
    }

    /// Create a line from comma-separated (or `separator`-separated) text.
    pub fn from_csv(csv: &str, separator: &str) -> Self {
        Self::new(&crate::csv::csv_to_tabs(csv, separator))
    }

    /// Replace the text with a CSV record rewritten to tab-separated form.
    /// Lines starting with `!!` are taken verbatim. Existing tokens are
    /// dropped.
    pub fn set_line_from_csv(&mut self, csv: &str, separator: &str) {
        if csv.is_empty() {
            return;
        }
        self.set_text(&crate::csv::csv_to_tabs(csv, separator));
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replace the text of the line. Existing tokens are dropped and will be
    /// split again from the new text on the next request.
    pub fn set_text(&mut self, text: &str) {
        self.text = text.strip_suffix('\r').unwrap_or(text).to_string();
        self.clear();
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn char_at(&self, index: usize) -> Option<char> {
        self.text.chars().nth(index)
    }

    pub fn equal_char(&self, index: usize, ch: char) -> bool {
        self.char_at(index) == Some(ch)
    }

    // Position within the owning file

    pub fn line_index(&self) -> Option<usize> {
        self.line_index
    }

    /// Line index plus one, or 0 for a line outside of any file.
    pub fn line_number(&self) -> usize {
        self.line_index.map_or(0, |index| index + 1)
    }

    pub fn set_line_index(&mut self, index: usize) {
        self.line_index = Some(index);
        self.stamp_tokens();
    }

    /// Token generation of the line. Ids of tokens from an older generation
    /// no longer resolve.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    fn next_generation(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }

    fn stamp_tokens(&mut self) {
        let (line_index, generation) = (self.line_index, self.generation);
        if let Some(tokens) = self.tokens.get_mut() {
            for (field, token) in tokens.iter_mut().enumerate() {
                token.set_position(line_index, field, generation);
            }
        }
    }

    // Classification

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn is_comment(&self) -> bool {
        self.text.starts_with('!')
    }

    pub fn is_comment_local(&self) -> bool {
        self.is_comment() && !self.text.starts_with("!!")
    }

    pub fn is_comment_global(&self) -> bool {
        self.text.starts_with("!!")
    }

    /// `!!!key: value`, where no space or tab comes before the colon.
    pub fn is_reference(&self) -> bool {
        self.reference_split().is_some()
    }

    fn reference_split(&self) -> Option<(&str, &str)> {
        if self.text.len() < 5 || !self.text.starts_with("!!!") || self.text.starts_with("!!!!") {
            return None;
        }
        let colon = self.text.find(':')?;
        let before = &self.text[..colon];
        if before.contains([' ', '\t']) {
            return None;
        }
        Some((&self.text[3..colon], &self.text[colon + 1..]))
    }

    /// Raw reference key (including any language tag), empty when the line is
    /// not a reference record.
    pub fn reference_key(&self) -> &str {
        self.reference_split().map_or("", |(key, _)| key)
    }

    pub fn reference_value(&self) -> &str {
        self.reference_split().map_or("", |(_, value)| value.trim())
    }

    /// Reference key split into the bare key and its language tag:
    /// `OTL@@EN` is the primary-language English title.
    pub fn reference_key_parts(&self) -> Option<ReferenceKey> {
        let (raw, _) = self.reference_split()?;
        let parts = if let Some((key, language)) = raw.split_once("@@") {
            ReferenceKey {
                key: key.to_string(),
                language: Some(language.to_string()),
                primary: true,
            }
        } else if let Some((key, language)) = raw.split_once('@') {
            ReferenceKey {
                key: key.to_string(),
                language: Some(language.to_string()),
                primary: false,
            }
        } else {
            ReferenceKey {
                key: raw.to_string(),
                language: None,
                primary: false,
            }
        };
        Some(parts)
    }

    pub fn is_exclusive(&self) -> bool {
        self.text.starts_with("**")
    }

    pub fn is_interpretation(&self) -> bool {
        self.text.starts_with('*')
    }

    /// `*!` text, or a line on which every token is a `*-` terminator.
    pub fn is_terminator(&self) -> bool {
        if self.text.starts_with("*!") {
            return true;
        }
        self.is_interpretation() && self.tokens().iter().all(HumdrumToken::is_terminator)
    }

    pub fn is_barline(&self) -> bool {
        self.text.starts_with('=')
    }

    pub fn is_data(&self) -> bool {
        !(self.is_comment() || self.is_interpretation() || self.is_barline() || self.is_empty())
    }

    /// Not empty and not a global comment.
    pub fn has_spines(&self) -> bool {
        !(self.is_empty() || self.is_comment_global())
    }

    pub fn is_global(&self) -> bool {
        !self.has_spines()
    }

    pub fn kind(&self) -> LineKind {
        if self.is_empty() {
            LineKind::Empty
        } else if self.is_reference() {
            LineKind::Reference
        } else if self.is_comment_global() {
            LineKind::GlobalComment
        } else if self.is_comment() {
            LineKind::LocalComment
        } else if self.is_exclusive() {
            LineKind::Exclusive
        } else if self.is_interpretation() {
            LineKind::Interpretation
        } else if self.is_barline() {
            LineKind::Barline
        } else {
            LineKind::Data
        }
    }

    /// Every token is a null marker. Lines without spines never are.
    pub fn is_all_null(&self) -> bool {
        self.has_spines() && self.tokens().iter().all(HumdrumToken::is_null)
    }

    /// Every token of a rhythmic data type is a null marker.
    pub fn is_all_rhythmic_null(&self) -> bool {
        self.has_spines()
            && self
                .tokens()
                .iter()
                .filter(|token| token.has_rhythm())
                .all(HumdrumToken::is_null)
    }

    pub fn is_manipulator(&self) -> bool {
        self.tokens().iter().any(HumdrumToken::is_manipulator)
    }

    /// No `**kern` token on this data line is null.
    pub fn is_kern_boundary_start(&self) -> bool {
        self.is_data()
            && self
                .tokens()
                .iter()
                .filter(|token| token.is_kern())
                .all(|token| !token.is_null())
    }

    /// The next data token of every `**kern` spine is not null.
    pub fn is_kern_boundary_end(&self, owner: &dyn LineOwner) -> bool {
        if !self.is_data() {
            return false;
        }
        self.tokens()
            .iter()
            .filter(|token| token.is_kern())
            .all(|token| {
                let mut next = token.next_tokens().first().and_then(|id| owner.token(*id));
                while let Some(candidate) = next {
                    if candidate.is_data() {
                        break;
                    }
                    next = candidate
                        .next_tokens()
                        .first()
                        .and_then(|id| owner.token(*id));
                }
                next.is_none_or(|candidate| !candidate.is_null())
            })
    }

    pub fn kern_note_attacks(&self) -> usize {
        self.tokens()
            .iter()
            .filter(|token| token.is_kern() && token.is_note_attack())
            .count()
    }

    // Tokens

    fn split_tokens(&self) -> Vec<HumdrumToken> {
        let texts: Vec<&str> = if self.text.is_empty() || self.text.starts_with("!!") {
            vec![self.text.as_str()]
        } else {
            self.text.split('\t').collect()
        };
        texts
            .into_iter()
            .enumerate()
            .map(|(field, text)| {
                let mut token = HumdrumToken::new(text);
                token.set_position(self.line_index, field, self.generation);
                token
            })
            .collect()
    }

    /// Tokens of the line, split from the text on first use.
    pub fn tokens(&self) -> &[HumdrumToken] {
        self.tokens.get_or_init(|| self.split_tokens())
    }

    fn token_vec_mut(&mut self) -> &mut Vec<HumdrumToken> {
        if self.tokens.get().is_none() {
            self.tokens = OnceCell::from(self.split_tokens());
        }
        match self.tokens.get_mut() {
            Some(tokens) => tokens,
            None => unreachable!("tokens are initialised above"),
        }
    }

    pub fn tokens_mut(&mut self) -> &mut [HumdrumToken] {
        self.token_vec_mut()
    }

    /// Split the text again, dropping the previous tokens. Returns the new
    /// token count.
    pub fn create_tokens_from_line(&mut self) -> usize {
        self.next_generation();
        let tokens = self.split_tokens();
        let count = tokens.len();
        self.tokens = OnceCell::from(tokens);
        count
    }

    /// Rebuild the text from the current tokens joined by tabs.
    pub fn create_line_from_tokens(&mut self) {
        self.text = self
            .tokens()
            .iter()
            .map(HumdrumToken::text)
            .collect::<Vec<_>>()
            .join("\t");
    }

    /// Drop all tokens.
    pub fn clear(&mut self) {
        self.tokens = OnceCell::new();
        self.next_generation();
    }

    pub fn token_count(&self) -> usize {
        self.tokens().len()
    }

    fn out_of_range(&self, index: usize) -> HumdrumError {
        HumdrumError::TokenIndexOutOfRange {
            line: self.line_number(),
            index,
            count: self.token_count(),
        }
    }

    pub fn token(&self, index: usize) -> Result<&HumdrumToken, HumdrumError> {
        self.tokens()
            .get(index)
            .ok_or_else(|| self.out_of_range(index))
    }

    pub fn token_mut(&mut self, index: usize) -> Result<&mut HumdrumToken, HumdrumError> {
        let count = self.token_count();
        let line = self.line_number();
        self.token_vec_mut()
            .get_mut(index)
            .ok_or(HumdrumError::TokenIndexOutOfRange { line, index, count })
    }

    pub fn token_string(&self, index: usize) -> Result<String, HumdrumError> {
        self.token(index).map(|token| token.text().to_string())
    }

    /// Add a token after the last one. The text is not rebuilt until
    /// `create_line_from_tokens`.
    pub fn append_token(&mut self, text: &str) {
        self.token_vec_mut().push(HumdrumToken::new(text));
        self.next_generation();
        self.stamp_tokens();
    }

    pub fn insert_token(&mut self, index: usize, text: &str) -> Result<(), HumdrumError> {
        if index > self.token_count() {
            return Err(self.out_of_range(index));
        }
        self.token_vec_mut().insert(index, HumdrumToken::new(text));
        self.next_generation();
        self.stamp_tokens();
        Ok(())
    }

    // Track analysis

    /// Assign track, subtrack and subtrack count to each token from its spine
    /// info. Subtracks count strictly left to right on the line.
    pub fn analyze_tracks(&mut self) {
        if !self.has_spines() {
            return;
        }
        let tokens = self.token_vec_mut();
        let mut population: HashMap<usize, usize> = HashMap::new();
        for token in tokens.iter_mut() {
            let track = parse_track(token.spine_info());
            if track == 0 {
                log::warn!(
                    "no track number in spine info \"{}\" for token \"{}\"",
                    token.spine_info(),
                    token.text()
                );
            }
            token.set_track(track);
            *population.entry(track).or_default() += 1;
        }

        let mut current: HashMap<usize, usize> = HashMap::new();
        for token in tokens.iter_mut() {
            let count = population.get(&token.track()).copied().unwrap_or(0);
            if count > 1 {
                let subtrack = current.entry(token.track()).or_default();
                *subtrack += 1;
                token.set_subtrack(*subtrack);
            } else {
                token.set_subtrack(0);
            }
            token.set_subtrack_count(count);
        }
    }

    /// Run duration analysis on each token left to right, stopping at the
    /// first failure.
    pub fn analyze_token_durations(&mut self) -> Result<(), AnalysisError> {
        if !self.has_spines() {
            return Ok(());
        }
        self.token_vec_mut()
            .iter_mut()
            .try_for_each(HumdrumToken::analyze_duration)
    }

    pub fn track_start<'a>(&self, owner: Option<&'a dyn LineOwner>, track: usize) -> Option<&'a HumdrumToken> {
        owner?.track_start(track)
    }

    // Timing

    pub fn duration(&self) -> Timing {
        self.duration
    }

    pub fn duration_scaled(&self, scale: HumNum) -> HumNum {
        self.duration.scaled(scale)
    }

    /// Negative input is stored as zero.
    pub fn set_duration(&mut self, duration: HumNum) {
        if is_negative(&duration) {
            log::warn!(
                "negative duration {} on line {} clamped to zero",
                duration,
                self.line_number()
            );
            self.duration = Timing::known(zero());
        } else {
            self.duration = Timing::known(duration);
        }
    }

    pub fn duration_from_start(&self) -> Timing {
        self.duration_from_start
    }

    pub fn duration_from_start_scaled(&self, scale: HumNum) -> HumNum {
        self.duration_from_start.scaled(scale)
    }

    pub fn set_duration_from_start(&mut self, duration: HumNum) {
        self.duration_from_start = Timing::known(duration);
    }

    /// Score duration minus the duration from start; zero for a detached
    /// line.
    pub fn duration_to_end(&self, owner: Option<&dyn LineOwner>) -> HumNum {
        match owner {
            Some(owner) => owner.score_duration() - self.duration_from_start.value(),
            None => zero(),
        }
    }

    pub fn duration_to_end_scaled(&self, owner: Option<&dyn LineOwner>, scale: HumNum) -> HumNum {
        self.duration_to_end(owner) * scale
    }

    pub fn duration_from_barline(&self) -> Timing {
        self.duration_from_barline
    }

    pub fn duration_from_barline_scaled(&self, scale: HumNum) -> HumNum {
        self.duration_from_barline.scaled(scale)
    }

    pub fn set_duration_from_barline(&mut self, duration: HumNum) {
        self.duration_from_barline = Timing::known(duration);
    }

    pub fn duration_to_barline(&self) -> Timing {
        self.duration_to_barline
    }

    pub fn duration_to_barline_scaled(&self, scale: HumNum) -> HumNum {
        self.duration_to_barline.scaled(scale)
    }

    pub fn set_duration_to_barline(&mut self, duration: HumNum) {
        self.duration_to_barline = Timing::known(duration);
    }

    /// Duration of the measure started by a barline, or of the measure that
    /// contains any other line.
    pub fn barline_duration(&self) -> HumNum {
        self.barline_duration_scaled(HumNum::from_integer(1))
    }

    pub fn barline_duration_scaled(&self, scale: HumNum) -> HumNum {
        if self.is_barline() {
            self.duration_to_barline.scaled(scale)
        } else {
            self.duration_from_barline.scaled(scale) + self.duration_to_barline.scaled(scale)
        }
    }

    /// 1-based beat position in the measure for beats of `beat_duration`
    /// quarter notes. A zero beat duration yields zero.
    pub fn beat(&self, beat_duration: HumNum) -> HumNum {
        if is_zero(&beat_duration) {
            return beat_duration;
        }
        self.duration_from_barline.value() / beat_duration + HumNum::from_integer(1)
    }

    /// Beat position for a beat given as a `**recip` rhythm such as `4` or
    /// `8.`.
    pub fn beat_recip(&self, recip: &str) -> HumNum {
        self.beat(recip_to_duration(recip).unwrap_or_else(zero))
    }

    // Parameters

    pub fn parameters(&self) -> &ParameterStore {
        &self.parameters
    }

    pub fn parameters_mut(&mut self) -> &mut ParameterStore {
        &mut self.parameters
    }

    /// Import a directive body such as `LO:N:vis=4`.
    pub fn set_parameters(&mut self, data: &str) {
        self.parameters.set_parameters(data);
    }

    /// Import the parameters of another directive line such as
    /// `!!LO:N:vis=4`.
    pub fn set_parameters_from_line(&mut self, source: &HumdrumLine) {
        if source.is_parameter_directive() {
            self.parameters.set_parameters(&source.text[2..]);
        }
    }

    /// Import this line's own text when it is a parameter directive.
    pub fn import_parameter_directive(&mut self) {
        if self.is_parameter_directive() {
            self.parameters.set_parameters(&self.text[2..]);
        }
    }

    /// Global comment shaped like `!!NS1:NS2:key...`.
    pub fn is_parameter_directive(&self) -> bool {
        if !self.is_comment_global() || self.is_reference() || self.text.starts_with("!!!") {
            return false;
        }
        let body = &self.text[2..];
        let first_field = body.split(':').next().unwrap_or("");
        body.split(':').count() >= 3 && !first_field.is_empty() && !first_field.contains(' ')
    }

    // Output

    pub fn xml_id(&self, prefix: &str) -> String {
        format!("{}loc{}", prefix, self.line_index.unwrap_or(0))
    }

    /// Tokens rendered CSV-safe and joined by `separator`.
    pub fn to_csv(&self, separator: &str) -> String {
        self.tokens()
            .iter()
            .map(|token| token.to_csv(separator))
            .collect::<Vec<_>>()
            .join(separator)
    }

    fn format_tokens(&self, render: impl Fn(&HumdrumToken) -> String) -> String {
        if self.is_manipulator() {
            return self.text.clone();
        }
        self.tokens()
            .iter()
            .map(render)
            .collect::<Vec<_>>()
            .join("\t")
    }

    /// Spine info of each token; manipulator lines print verbatim.
    pub fn format_spine_info(&self) -> String {
        self.format_tokens(|token| token.spine_info().to_string())
    }

    pub fn format_track_info(&self) -> String {
        self.format_tokens(HumdrumToken::track_string)
    }

    /// Token durations as mixed fractions, `-1` when unanalyzed.
    pub fn format_duration_info(&self) -> String {
        self.format_tokens(|token| mixed_fraction(&token.duration().value()))
    }

    /// Token durations as `**recip` rhythms, `.` when unanalyzed.
    pub fn format_recip_info(&self) -> String {
        self.format_tokens(|token| match token.duration() {
            Timing::Known(duration) => duration_to_recip(&duration),
            Timing::Unanalyzed => ".".to_string(),
        })
    }

    /// Data type of each token without its `**` prefix.
    pub fn format_data_type_info(&self) -> String {
        self.format_tokens(|token| {
            let data_type = token.data_type();
            data_type.strip_prefix("**").unwrap_or(data_type).to_string()
        })
    }
}

impl fmt::Display for HumdrumLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl From<&str> for HumdrumLine {
    fn from(text: &str) -> Self {
        HumdrumLine::new(text)
    }
}
