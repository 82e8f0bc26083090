use crate::analysis::{AnalysisOptions, analyze};
use crate::types::duration::{HumNum, zero};
use crate::types::line::{HumdrumLine, LineOwner};
use crate::types::token::{HumdrumToken, TokenId};
use crate::xml::{XmlWriter, hum_num_attributes, write_line};
use anyhow::Result;
use std::fmt;

/// Per-line rendering used by `HumdrumFile::display_view`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineView {
    Text,
    SpineInfo,
    TrackInfo,
    DurationInfo,
    RecipInfo,
    DataTypeInfo,
}

pub struct HumdrumFileFormatter<'a> {
    file: &'a HumdrumFile,
    view: LineView,
}

impl<'a> fmt::Display for HumdrumFileFormatter<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.file.lines {
            // Global lines have no spines to describe
            if !line.has_spines() {
                writeln!(f, "{}", line)?;
                continue;
            }
            match self.view {
                LineView::Text => writeln!(f, "{}", line)?,
                LineView::SpineInfo => writeln!(f, "{}", line.format_spine_info())?,
                LineView::TrackInfo => writeln!(f, "{}", line.format_track_info())?,
                LineView::DurationInfo => writeln!(f, "{}", line.format_duration_info())?,
                LineView::RecipInfo => writeln!(f, "{}", line.format_recip_info())?,
                LineView::DataTypeInfo => writeln!(f, "{}", line.format_data_type_info())?,
            }
        }
        Ok(())
    }
}

/// An ordered collection of lines and the cross-line results of analyzing
/// them.
#[derive(Debug, Clone)]
pub struct HumdrumFile {
    lines: Vec<HumdrumLine>,
    track_starts: Vec<Option<TokenId>>,
    measure_starts: Vec<usize>,
    score_duration: HumNum,
    xml_id_prefix: String,
}

impl Default for HumdrumFile {
    fn default() -> Self {
        Self::new()
    }
}

impl HumdrumFile {
    pub fn new() -> Self {
        Self {
            lines: Vec::new(),
            track_starts: Vec::new(),
            measure_starts: Vec::new(),
            score_duration: zero(),
            xml_id_prefix: String::new(),
        }
    }

    /// Take ownership of `lines` and number them. Nothing is analyzed yet.
    pub fn from_lines(lines: Vec<HumdrumLine>) -> Self {
        let mut file = Self::new();
        for line in lines {
            file.push_line(line);
        }
        file
    }

    /// Parse and analyze Humdrum text with the default options.
    pub fn read_string(content: &str) -> Result<Self> {
        crate::parser::parse_humdrum(content)
    }

    /// Parse and analyze CSV text.
    pub fn read_csv(content: &str, separator: &str) -> Result<Self> {
        crate::parser::parse_humdrum_csv(content, separator)
    }

    pub fn push_line(&mut self, mut line: HumdrumLine) {
        line.set_line_index(self.lines.len());
        self.lines.push(line);
    }

    /// Run the analysis passes selected by `options`, replacing any earlier
    /// results.
    pub fn analyze(&mut self, options: &AnalysisOptions) -> Result<()> {
        self.xml_id_prefix = options.xml_id_prefix.clone();
        let analysis = analyze(&mut self.lines, options)?;
        self.track_starts = analysis.track_starts;
        self.measure_starts = analysis.measure_starts;
        self.score_duration = analysis.score_duration;
        Ok(())
    }

    pub fn lines(&self) -> &[HumdrumLine] {
        &self.lines
    }

    pub fn line(&self, index: usize) -> Option<&HumdrumLine> {
        self.lines.get(index)
    }

    pub fn line_mut(&mut self, index: usize) -> Option<&mut HumdrumLine> {
        self.lines.get_mut(index)
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Number of tracks opened by exclusive interpretations.
    pub fn max_track(&self) -> usize {
        self.track_starts.len()
    }

    /// Indices of lines that start a measure.
    pub fn measure_starts(&self) -> &[usize] {
        &self.measure_starts
    }

    pub fn score_duration(&self) -> HumNum {
        self.score_duration
    }

    pub fn set_xml_id_prefix(&mut self, prefix: &str) {
        self.xml_id_prefix = prefix.to_string();
    }

    /// Time from the start of line `index` to the end of the score.
    pub fn duration_to_end(&self, index: usize) -> Option<HumNum> {
        self.lines
            .get(index)
            .map(|line| line.duration_to_end(Some(self)))
    }

    pub fn display_view(&self, view: LineView) -> HumdrumFileFormatter<'_> {
        HumdrumFileFormatter { file: self, view }
    }

    pub fn to_csv(&self, separator: &str) -> String {
        let mut output = String::new();
        for line in &self.lines {
            if line.has_spines() {
                output.push_str(&line.to_csv(separator));
            } else {
                output.push_str(line.text());
            }
            output.push('\n');
        }
        output
    }

    pub fn to_xml(&self) -> String {
        let mut writer = XmlWriter::new("\t");
        writer.open(0, "sequence", "");
        writer.open(1, "sequenceInfo", "");
        writer.text(2, "frameCount", "", &self.lines.len().to_string());
        writer.text(2, "trackCount", "", &self.max_track().to_string());
        writer.empty(2, "sequenceStart", &hum_num_attributes(&zero()));
        writer.empty(2, "sequenceDuration", &hum_num_attributes(&self.score_duration));
        writer.close(1, "sequenceInfo");
        writer.open(1, "frames", "");
        for line in &self.lines {
            write_line(&mut writer, line, Some(self), 2);
        }
        writer.close(1, "frames");
        writer.close(0, "sequence");
        writer.finish()
    }
}

impl LineOwner for HumdrumFile {
    fn score_duration(&self) -> HumNum {
        self.score_duration
    }

    fn track_start(&self, track: usize) -> Option<&HumdrumToken> {
        let id = (*self.track_starts.get(track.checked_sub(1)?)?)?;
        LineOwner::token(self, id)
    }

    fn xml_id_prefix(&self) -> &str {
        &self.xml_id_prefix
    }

    /// Ids from before the line's tokens were last replaced resolve to `None`.
    fn token(&self, id: TokenId) -> Option<&HumdrumToken> {
        let line = self.lines.get(id.line)?;
        if line.generation() != id.generation {
            return None;
        }
        line.tokens().get(id.field)
    }
}

impl fmt::Display for HumdrumFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_view(LineView::Text))
    }
}
