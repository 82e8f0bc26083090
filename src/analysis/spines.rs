use crate::error::HumdrumError;
use crate::types::line::HumdrumLine;
use crate::types::token::{HumdrumToken, TokenId, parse_track};

/// A spine that is open between two lines.
#[derive(Debug, Clone)]
struct ActiveSpine {
    info: String,
    data_type: String,
    /// Tokens on the last spined line that continue into this spine.
    previous: Vec<TokenId>,
}

impl ActiveSpine {
    fn continued(&self, from: TokenId) -> Self {
        Self {
            info: self.info.clone(),
            data_type: self.data_type.clone(),
            previous: vec![from],
        }
    }
}

/// Spine info of a merge of adjacent spines.
///
/// Siblings of one split, `(X)a` and `(X)b`, collapse back to `X`; anything
/// else is joined with spaces.
pub fn merged_spine_info(infos: &[&str]) -> String {
    let Some((first, rest)) = infos.split_first() else {
        return String::new();
    };
    rest.iter().fold(first.to_string(), |merged, info| {
        let siblings = merged.len() == info.len()
            && merged.len() > 3
            && merged.starts_with('(')
            && merged[..merged.len() - 1] == info[..info.len() - 1]
            && merged[..merged.len() - 1].ends_with(')');
        if siblings {
            merged[1..merged.len() - 2].to_string()
        } else {
            format!("{} {}", merged, info)
        }
    })
}

fn register_track_start(track_starts: &mut Vec<Option<TokenId>>, spine_info: &str, id: TokenId) {
    let track = parse_track(spine_info);
    if track == 0 {
        return;
    }
    if track_starts.len() < track {
        track_starts.resize(track, None);
    }
    if track_starts[track - 1].is_none() {
        track_starts[track - 1] = Some(id);
    }
}

fn manipulator_error(line: usize, message: &str) -> HumdrumError {
    HumdrumError::Manipulator {
        line,
        message: message.to_string(),
    }
}

/// Follow the spines through the file.
///
/// Every token on a line with spines gets its spine info and data type, and
/// is linked to the tokens it continues from on the previous spined line.
/// Returns the exclusive interpretation token that starts each track, indexed
/// by track number minus one.
pub fn analyze_spines(lines: &mut [HumdrumLine]) -> Result<Vec<Option<TokenId>>, HumdrumError> {
    let mut active: Vec<ActiveSpine> = Vec::new();
    let mut track_starts: Vec<Option<TokenId>> = Vec::new();
    let mut links: Vec<(TokenId, TokenId)> = Vec::new();
    let mut max_track = 0;
    let mut started = false;

    for line in lines.iter_mut() {
        for token in line.tokens_mut() {
            token.clear_links();
        }
    }

    for (index, line) in lines.iter_mut().enumerate() {
        if !line.has_spines() {
            continue;
        }
        let line_number = index + 1;
        let generation = line.generation();
        let id_at = |field: usize| TokenId::new(index, field).with_generation(generation);

        if active.is_empty() {
            if !line.is_exclusive() {
                return Err(if started {
                    manipulator_error(line_number, "data after all spines were terminated")
                } else {
                    HumdrumError::SpineNotStarted { line: line_number }
                });
            }
            if started {
                log::debug!("new spine segment on line {}", line_number);
            }
            started = true;
            active = line
                .tokens()
                .iter()
                .enumerate()
                .map(|(field, token)| ActiveSpine {
                    info: (field + 1).to_string(),
                    data_type: token.text().to_string(),
                    previous: Vec::new(),
                })
                .collect();
            max_track = max_track.max(active.len());
        }

        if line.token_count() != active.len() {
            return Err(HumdrumError::SpineCountMismatch {
                line: line_number,
                expected: active.len(),
                found: line.token_count(),
            });
        }

        for (field, (token, spine)) in line.tokens_mut().iter_mut().zip(active.iter_mut()).enumerate() {
            let id = id_at(field);
            if token.is_exclusive() {
                spine.data_type = token.text().to_string();
                register_track_start(&mut track_starts, &spine.info, id);
            } else if spine.data_type.is_empty() {
                return Err(manipulator_error(
                    line_number,
                    "added spine must start with an exclusive interpretation",
                ));
            }
            token.set_spine_info(&spine.info);
            token.set_data_type(&spine.data_type);
            for previous in &spine.previous {
                links.push((*previous, id));
            }
        }

        let tokens = line.tokens();
        if !line.is_interpretation() || !tokens.iter().any(is_spine_manipulator) {
            for (field, spine) in active.iter_mut().enumerate() {
                spine.previous = vec![id_at(field)];
            }
            continue;
        }

        let mut next_active = Vec::with_capacity(active.len());
        let mut field = 0;
        while field < tokens.len() {
            let token = &tokens[field];
            let spine = &active[field];
            let id = id_at(field);
            if token.is_split() {
                for side in ["a", "b"] {
                    next_active.push(ActiveSpine {
                        info: format!("({}){}", spine.info, side),
                        data_type: spine.data_type.clone(),
                        previous: vec![id],
                    });
                }
                field += 1;
            } else if token.is_merge() {
                let end = field + tokens[field..].iter().take_while(|t| t.is_merge()).count();
                if end - field < 2 {
                    return Err(manipulator_error(
                        line_number,
                        "spine merge needs at least two adjacent *v tokens",
                    ));
                }
                let infos: Vec<&str> = active[field..end].iter().map(|s| s.info.as_str()).collect();
                next_active.push(ActiveSpine {
                    info: merged_spine_info(&infos),
                    data_type: spine.data_type.clone(),
                    previous: (field..end).map(id_at).collect(),
                });
                field = end;
            } else if token.is_exchange() {
                if !tokens.get(field + 1).is_some_and(HumdrumToken::is_exchange) {
                    return Err(manipulator_error(line_number, "unpaired *x exchange"));
                }
                next_active.push(active[field + 1].continued(id_at(field + 1)));
                next_active.push(spine.continued(id));
                field += 2;
            } else if token.is_add() {
                next_active.push(spine.continued(id));
                max_track += 1;
                next_active.push(ActiveSpine {
                    info: max_track.to_string(),
                    data_type: String::new(),
                    previous: Vec::new(),
                });
                field += 1;
            } else if token.is_terminator() {
                field += 1;
            } else {
                next_active.push(spine.continued(id));
                field += 1;
            }
        }
        active = next_active;
    }

    if !active.is_empty() {
        log::warn!("{} spines were not terminated", active.len());
    }

    for (from, to) in links {
        if let Ok(token) = lines[from.line].token_mut(from.field) {
            token.add_next(to);
        }
        if let Ok(token) = lines[to.line].token_mut(to.field) {
            token.add_previous(from);
        }
    }

    Ok(track_starts)
}

fn is_spine_manipulator(token: &HumdrumToken) -> bool {
    token.is_split() || token.is_merge() || token.is_exchange() || token.is_add() || token.is_terminator()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn numbered(text: &str) -> Vec<HumdrumLine> {
        text.lines()
            .enumerate()
            .map(|(index, text)| {
                let mut line = HumdrumLine::new(text);
                line.set_line_index(index);
                line
            })
            .collect()
    }

    fn infos(line: &HumdrumLine) -> Vec<String> {
        line.tokens().iter().map(|t| t.spine_info().to_string()).collect()
    }

    #[test]
    fn test_merged_spine_info() {
        assert_eq!(merged_spine_info(&["(1)a", "(1)b"]), "1");
        assert_eq!(merged_spine_info(&["((2)a)a", "((2)a)b"]), "(2)a");
        assert_eq!(merged_spine_info(&["1", "(2)a"]), "1 (2)a");
        assert_eq!(merged_spine_info(&["(1)a", "(1)b", "2"]), "1 2");
        assert_eq!(merged_spine_info(&[]), "");
    }

    #[test]
    fn test_split_and_merge() {
        let mut lines = numbered("**kern\t**kern\n*^\t*\n4c\t4d\t4e\n*v\t*v\t*\n4c\t4e\n*-\t*-");
        let track_starts = analyze_spines(&mut lines).unwrap();
        assert_eq!(track_starts, vec![Some(TokenId::new(0, 0)), Some(TokenId::new(0, 1))]);
        assert_eq!(infos(&lines[2]), vec!["(1)a", "(1)b", "2"]);
        assert_eq!(infos(&lines[4]), vec!["1", "2"]);
        assert_eq!(lines[2].token(2).unwrap().data_type(), "**kern");

        let split = lines[1].token(0).unwrap();
        assert_eq!(split.next_tokens(), &[TokenId::new(2, 0), TokenId::new(2, 1)]);
        let merged = lines[4].token(0).unwrap();
        assert_eq!(merged.previous_tokens(), &[TokenId::new(3, 0), TokenId::new(3, 1)]);
    }

    #[test]
    fn test_exchange_and_add() {
        let mut lines = numbered("**kern\t**dynam\n*x\t*x\np\t4c\n*+\t*\n*\t**text\t*\n.\tla\t4d\n*-\t*-\t*-");
        let track_starts = analyze_spines(&mut lines).unwrap();
        assert_eq!(infos(&lines[2]), vec!["2", "1"]);
        assert_eq!(lines[2].token(0).unwrap().data_type(), "**dynam");
        assert_eq!(infos(&lines[5]), vec!["2", "3", "1"]);
        assert_eq!(lines[5].token(1).unwrap().data_type(), "**text");
        assert_eq!(track_starts.len(), 3);
        assert_eq!(track_starts[2], Some(TokenId::new(4, 1)));
    }

    #[test]
    fn test_errors() {
        let mut data_first = numbered("4c\n**kern");
        assert_eq!(
            analyze_spines(&mut data_first).unwrap_err(),
            HumdrumError::SpineNotStarted { line: 1 }
        );

        let mut mismatch = numbered("**kern\t**kern\n4c");
        assert_eq!(
            analyze_spines(&mut mismatch).unwrap_err(),
            HumdrumError::SpineCountMismatch {
                line: 2,
                expected: 2,
                found: 1
            }
        );

        let mut lone_merge = numbered("**kern\t**kern\n*v\t*");
        assert!(matches!(
            analyze_spines(&mut lone_merge),
            Err(HumdrumError::Manipulator { line: 2, .. })
        ));

        let mut lone_exchange = numbered("**kern\t**kern\n*x\t*");
        assert!(analyze_spines(&mut lone_exchange).is_err());

        let mut untyped_add = numbered("**kern\n*+\n4c\t4d");
        assert!(analyze_spines(&mut untyped_add).is_err());
    }

    #[test]
    fn test_global_lines_are_skipped() {
        let mut lines = numbered("!!!OTL: x\n**kern\n!! comment\n\n4c\n*-");
        analyze_spines(&mut lines).unwrap();
        assert_eq!(lines[0].token(0).unwrap().spine_info(), "");
        assert_eq!(infos(&lines[4]), vec!["1"]);
        assert_eq!(lines[1].token(0).unwrap().next_tokens(), &[TokenId::new(4, 0)]);
    }

    #[test]
    fn test_new_segment_after_termination() {
        let mut lines = numbered("**kern\n4c\n*-\n**kern\t**kern\n4d\t4e\n*-\t*-");
        let track_starts = analyze_spines(&mut lines).unwrap();
        assert_eq!(infos(&lines[4]), vec!["1", "2"]);
        assert_eq!(track_starts, vec![Some(TokenId::new(0, 0)), Some(TokenId::new(3, 1))]);

        let mut stray = numbered("**kern\n*-\n4c");
        assert!(analyze_spines(&mut stray).is_err());
    }
}
