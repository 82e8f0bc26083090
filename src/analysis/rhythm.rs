//! Rhythmic timing passes over a whole file.

use crate::error::AnalysisError;
use crate::types::duration::{HumNum, is_zero, zero};
use crate::types::line::HumdrumLine;

/// Duration of every rhythmic token. The first failing line stops the pass.
pub fn analyze_token_durations(lines: &mut [HumdrumLine]) -> Result<(), AnalysisError> {
    lines
        .iter_mut()
        .try_for_each(HumdrumLine::analyze_token_durations)
}

/// Line durations and start times; returns the total duration of the score.
///
/// A data line lasts until the next point in time where a note in any spine
/// ends, so every pending note end is tracked. The last data line lasts until
/// the latest pending end. Lines where every sounding rhythmic token is a
/// grace note take no time. All other lines take no time either.
pub fn analyze_line_durations(lines: &mut [HumdrumLine]) -> HumNum {
    let last_data = lines.iter().rposition(HumdrumLine::is_data);
    let mut pending_ends: Vec<HumNum> = Vec::new();
    let mut start = zero();

    for (index, line) in lines.iter_mut().enumerate() {
        line.set_duration_from_start(start);
        if !line.is_data() {
            line.set_duration(zero());
            continue;
        }

        let durations: Vec<HumNum> = line
            .tokens()
            .iter()
            .filter(|token| token.has_rhythm())
            .filter_map(|token| token.duration().as_option())
            .collect();
        pending_ends.extend(
            durations
                .iter()
                .filter(|duration| !is_zero(duration))
                .map(|duration| start + duration),
        );
        pending_ends.retain(|end| *end > start);

        let grace_only = !durations.is_empty() && durations.iter().all(is_zero);
        let end = if grace_only {
            None
        } else if Some(index) == last_data {
            pending_ends.iter().max().copied()
        } else {
            pending_ends.iter().min().copied()
        };
        let duration = end.map_or_else(zero, |end| end - start);
        line.set_duration(duration);
        start += duration;
    }

    log::debug!("score duration {} quarter notes", start);
    start
}

/// Position of every line relative to its surrounding barlines.
///
/// The forward sweep sets the duration from the previous barline, the
/// backward sweep the duration to the next one. Returns the indices of the
/// lines that start a measure: every barline, plus the first data line when it
/// comes before any barline.
pub fn analyze_meter(lines: &mut [HumdrumLine]) -> Vec<usize> {
    let mut measure_starts = Vec::new();
    let mut found_barline = false;
    let mut sum = zero();
    for (index, line) in lines.iter_mut().enumerate() {
        line.set_duration_from_barline(sum);
        sum += line.duration().as_option().unwrap_or_else(zero);
        if line.is_barline() {
            found_barline = true;
            measure_starts.push(index);
            sum = zero();
        }
        if !found_barline && line.is_data() {
            found_barline = true;
            measure_starts.push(index);
        }
    }

    let mut sum = zero();
    for line in lines.iter_mut().rev() {
        sum += line.duration().as_option().unwrap_or_else(zero);
        line.set_duration_to_barline(sum);
        if line.is_barline() {
            sum = zero();
        }
    }

    measure_starts
}
