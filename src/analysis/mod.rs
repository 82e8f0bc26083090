pub mod rhythm;
pub mod spines;

use crate::types::duration::{HumNum, zero};
use crate::types::line::HumdrumLine;
use crate::types::token::TokenId;
use anyhow::{Context, Result};

/// Which passes run when a file is analyzed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisOptions {
    pub analyze_parameters: bool,
    pub analyze_rhythm: bool,
    /// Requires `analyze_rhythm`.
    pub analyze_meter: bool,
    pub xml_id_prefix: String,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            analyze_parameters: true,
            analyze_rhythm: true,
            analyze_meter: true,
            xml_id_prefix: String::new(),
        }
    }
}

impl AnalysisOptions {
    /// Structure only: spines and tracks, no timing.
    pub fn structure_only() -> Self {
        Self {
            analyze_parameters: false,
            analyze_rhythm: false,
            analyze_meter: false,
            ..Self::default()
        }
    }
}

/// File-level results of an analysis run.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub track_starts: Vec<Option<TokenId>>,
    pub score_duration: HumNum,
    pub measure_starts: Vec<usize>,
}

/// Run the enabled passes over `lines`, which must already carry their line
/// indices.
pub fn analyze(lines: &mut [HumdrumLine], options: &AnalysisOptions) -> Result<Analysis> {
    let mut analysis = Analysis {
        track_starts: Vec::new(),
        score_duration: zero(),
        measure_starts: Vec::new(),
    };

    // order is important here

    if options.analyze_parameters {
        for line in lines.iter_mut() {
            line.import_parameter_directive();
        }
    }

    analysis.track_starts = spines::analyze_spines(lines).context("Spine analysis failed")?;
    log::debug!("{} tracks", analysis.track_starts.len());

    for line in lines.iter_mut() {
        line.analyze_tracks();
    }

    if options.analyze_rhythm {
        rhythm::analyze_token_durations(lines).context("Rhythm analysis failed")?;
        analysis.score_duration = rhythm::analyze_line_durations(lines);
        if options.analyze_meter {
            analysis.measure_starts = rhythm::analyze_meter(lines);
        }
    }

    Ok(analysis)
}
