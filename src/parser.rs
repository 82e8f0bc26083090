use crate::analysis::AnalysisOptions;
use crate::file::HumdrumFile;
use crate::types::line::HumdrumLine;
use anyhow::{Result, bail};

pub struct HumdrumParser {
    options: AnalysisOptions,
}

pub fn parse_humdrum(content: &str) -> Result<HumdrumFile> {
    let mut parser = HumdrumParser::new();
    parser.parse(content)
}

pub fn parse_humdrum_with(content: &str, options: AnalysisOptions) -> Result<HumdrumFile> {
    let mut parser = HumdrumParser::with_options(options);
    parser.parse(content)
}

pub fn parse_humdrum_csv(content: &str, separator: &str) -> Result<HumdrumFile> {
    let mut parser = HumdrumParser::new();
    parser.parse_csv(content, separator)
}

impl Default for HumdrumParser {
    fn default() -> Self {
        Self::new()
    }
}

impl HumdrumParser {
    pub fn new() -> Self {
        Self {
            options: AnalysisOptions::default(),
        }
    }

    pub fn with_options(options: AnalysisOptions) -> Self {
        Self { options }
    }

    pub fn parse(&mut self, content: &str) -> Result<HumdrumFile> {
        let mut file = HumdrumFile::new();
        for line in content.lines() {
            file.push_line(HumdrumLine::new(line));
        }
        self.finish(file)
    }

    pub fn parse_csv(&mut self, content: &str, separator: &str) -> Result<HumdrumFile> {
        if separator.is_empty() {
            bail!("Empty CSV separator");
        }
        let mut file = HumdrumFile::new();
        for line in content.lines() {
            let humdrum_line = HumdrumLine::from_csv(line, separator);
            file.push_line(humdrum_line);
        }
        self.finish(file)
    }

    fn finish(&self, mut file: HumdrumFile) -> Result<HumdrumFile> {
        if file.line_count() == 0 {
            bail!("No Humdrum data");
        }
        file.analyze(&self.options)?;
        log::debug!(
            "parsed {} lines, {} tracks",
            file.line_count(),
            file.max_track()
        );
        Ok(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::duration::HumNum;

    #[test]
    fn test_parse_humdrum() {
        let file = parse_humdrum("**kern\r\n4c\r\n*-\r\n").unwrap();
        assert_eq!(file.line_count(), 3);
        assert_eq!(file.line(1).unwrap().text(), "4c");
        assert_eq!(file.score_duration(), HumNum::from_integer(1));
    }

    #[test]
    fn test_parse_with_options() {
        let options = AnalysisOptions {
            xml_id_prefix: "p-".to_string(),
            ..AnalysisOptions::structure_only()
        };
        let file = parse_humdrum_with("**kern\ncc\n*-", options).unwrap();
        assert!(file.to_xml().contains("xml:id=\"p-loc1\""));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse_humdrum("").unwrap_err().to_string(), "No Humdrum data");

        let err = parse_humdrum("**kern\t**kern\n4c\n*-\t*-").unwrap_err();
        assert_eq!(
            format!("{:#}", err),
            "Spine analysis failed: Line 2: expected 2 spines but found 1"
        );
        assert!(parse_humdrum_csv("**kern", "").is_err());
    }

    #[test]
    fn test_parse_csv() {
        let file = parse_humdrum_csv("**kern;**text\n4c;\"a;b\"\n*-;*-", ";").unwrap();
        assert_eq!(file.line(1).unwrap().token_string(1).unwrap(), "a;b");
    }
}
