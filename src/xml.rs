//! XML rendering of analyzed lines.
//!
//! Lines with spines become `<frame>` elements with one `<field>` per token.
//! Global lines (empty lines, global comments, reference records) become
//! `<metaFrame>` elements.

use crate::types::duration::{HumNum, to_f64};
use crate::types::line::{HumdrumLine, LineKind, LineOwner};
use crate::types::token::HumdrumToken;
use crate::util::format_float;
use quick_xml::escape::escape;

/// Indented element writer over a string buffer.
pub struct XmlWriter {
    buffer: String,
    indent: String,
}

impl XmlWriter {
    pub fn new(indent: &str) -> Self {
        Self {
            buffer: String::new(),
            indent: indent.to_string(),
        }
    }

    fn pad(&mut self, level: usize) {
        for _ in 0..level {
            self.buffer.push_str(&self.indent);
        }
    }

    fn start_tag(&mut self, level: usize, name: &str, attributes: &str) {
        self.pad(level);
        self.buffer.push_str(&format!("<{}{}", name, attributes));
    }

    pub fn open(&mut self, level: usize, name: &str, attributes: &str) {
        self.start_tag(level, name, attributes);
        self.buffer.push_str(">\n");
    }

    pub fn close(&mut self, level: usize, name: &str) {
        self.pad(level);
        self.buffer.push_str(&format!("</{}>\n", name));
    }

    pub fn empty(&mut self, level: usize, name: &str, attributes: &str) {
        self.start_tag(level, name, attributes);
        self.buffer.push_str("/>\n");
    }

    pub fn text(&mut self, level: usize, name: &str, attributes: &str, text: &str) {
        self.start_tag(level, name, attributes);
        self.buffer
            .push_str(&format!(">{}</{}>\n", escape(text), name));
    }

    pub fn finish(self) -> String {
        self.buffer
    }
}

/// ` name="value"` with the value escaped.
pub fn attribute(name: &str, value: &str) -> String {
    format!(" {}=\"{}\"", name, escape(value))
}

/// ` float="0.5" ratfrac="1/2"`; the fraction is left out for integers.
pub fn hum_num_attributes(value: &HumNum) -> String {
    let mut output = attribute("float", &format_float(to_f64(value)));
    if !value.is_integer() {
        output.push_str(&attribute("ratfrac", &value.to_string()));
    }
    output
}

fn frame_type(line: &HumdrumLine) -> &'static str {
    match line.kind() {
        LineKind::Data => "data",
        LineKind::Barline => "barline",
        LineKind::Exclusive | LineKind::Interpretation => "interpretation",
        LineKind::LocalComment => "local-comment",
        LineKind::Reference => "reference",
        LineKind::GlobalComment => "global-comment",
        LineKind::Empty => "empty",
    }
}

/// Render one line at `level` levels of indentation.
pub fn line_to_xml(line: &HumdrumLine, owner: Option<&dyn LineOwner>, level: usize, indent: &str) -> String {
    let mut writer = XmlWriter::new(indent);
    write_line(&mut writer, line, owner, level);
    writer.finish()
}

pub fn write_line(writer: &mut XmlWriter, line: &HumdrumLine, owner: Option<&dyn LineOwner>, level: usize) {
    let prefix = owner.map_or("", |owner| owner.xml_id_prefix());
    let index = line.line_index().unwrap_or(0);

    if line.has_spines() {
        let attributes = format!(
            "{}{}",
            attribute("n", &index.to_string()),
            attribute("xml:id", &line.xml_id(prefix))
        );
        writer.open(level, "frame", &attributes);
        write_frame_info(writer, line, owner, level + 1);
        writer.open(level + 1, "fields", "");
        for token in line.tokens() {
            write_field(writer, token, prefix, level + 2);
        }
        writer.close(level + 1, "fields");
        writer.close(level, "frame");
    } else {
        let attributes = format!(
            "{}{}{}",
            attribute("n", &index.to_string()),
            attribute("token", line.text()),
            attribute("xml:id", &line.xml_id(prefix))
        );
        writer.open(level, "metaFrame", &attributes);
        writer.open(level + 1, "frameInfo", "");
        writer.empty(
            level + 2,
            "startTime",
            &hum_num_attributes(&line.duration_from_start().value()),
        );
        writer.text(level + 2, "frameType", "", frame_type(line));
        if let Some(parts) = line.reference_key_parts() {
            let mut key_attributes = String::new();
            if let Some(language) = &parts.language {
                key_attributes.push_str(&attribute("language", language));
                if parts.primary {
                    key_attributes.push_str(&attribute("primary", "true"));
                }
            }
            writer.text(level + 2, "referenceKey", &key_attributes, &parts.key);
            writer.text(level + 2, "referenceValue", "", line.reference_value());
        }
        writer.close(level + 1, "frameInfo");
        writer.close(level, "metaFrame");
    }
}

fn write_frame_info(writer: &mut XmlWriter, line: &HumdrumLine, owner: Option<&dyn LineOwner>, level: usize) {
    writer.open(level, "frameInfo", "");
    writer.text(level + 1, "fieldCount", "", &line.token_count().to_string());
    writer.empty(
        level + 1,
        "frameStart",
        &hum_num_attributes(&line.duration_from_start().value()),
    );
    writer.empty(
        level + 1,
        "frameDuration",
        &hum_num_attributes(&line.duration().value()),
    );
    writer.text(level + 1, "frameType", "", frame_type(line));
    if line.is_barline() {
        writer.empty(
            level + 1,
            "barlineDuration",
            &hum_num_attributes(&line.barline_duration()),
        );
    }
    let start = line.is_kern_boundary_start();
    let end = owner.is_some_and(|owner| line.is_kern_boundary_end(owner));
    if start || end {
        let attributes = format!(
            "{}{}",
            attribute("start", if start { "true" } else { "false" }),
            attribute("end", if end { "true" } else { "false" })
        );
        writer.empty(level + 1, "kernBoundary", &attributes);
    }
    writer.close(level, "frameInfo");
}

fn write_field(writer: &mut XmlWriter, token: &HumdrumToken, prefix: &str, level: usize) {
    let mut attributes = attribute("n", &token.field_index().to_string());
    attributes.push_str(&attribute("track", &token.track().to_string()));
    if token.subtrack() > 0 {
        attributes.push_str(&attribute("subtrack", &token.subtrack().to_string()));
    }
    attributes.push_str(&attribute("token", token.text()));
    let id = format!(
        "{}loc{}_{}",
        prefix,
        token.line_index().unwrap_or(0),
        token.field_index()
    );
    attributes.push_str(&attribute("xml:id", &id));

    writer.open(level, "field", &attributes);
    let data_type = token.data_type();
    writer.text(
        level + 1,
        "dataType",
        "",
        data_type.strip_prefix("**").unwrap_or(data_type),
    );
    if let Some(duration) = token.duration().as_option() {
        writer.empty(level + 1, "duration", &hum_num_attributes(&duration));
    }
    writer.close(level, "field");
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use quick_xml::Reader;
    use quick_xml::events::Event;

    /// Names of all start and empty elements, failing on malformed XML.
    fn element_names(xml: &str) -> Vec<String> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);
        let mut names = Vec::new();
        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                    names.push(String::from_utf8(e.name().as_ref().to_vec()).unwrap());
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => panic!("malformed xml: {}", e),
            }
        }
        names
    }

    #[test]
    fn test_hum_num_attributes() {
        assert_eq!(hum_num_attributes(&HumNum::from_integer(2)), " float=\"2\"");
        assert_eq!(
            hum_num_attributes(&HumNum::new(1, 2)),
            " float=\"0.5\" ratfrac=\"1/2\""
        );
        assert_eq!(hum_num_attributes(&HumNum::from_integer(-1)), " float=\"-1\"");
    }

    #[test]
    fn test_data_frame() {
        let mut line = HumdrumLine::new("4c\t\"&<\"");
        line.set_line_index(3);
        line.tokens_mut()[0].set_data_type("**kern");
        line.tokens_mut()[0].set_track(1);
        line.tokens_mut()[1].set_data_type("**text");
        line.tokens_mut()[1].set_track(2);
        line.analyze_token_durations().unwrap();

        let xml = line_to_xml(&line, None, 0, "\t");
        assert!(xml.starts_with("<frame n=\"3\" xml:id=\"loc3\">\n"));
        assert!(xml.contains("<frameType>data</frameType>"));
        assert!(xml.contains("token=\"&quot;&amp;&lt;&quot;\""));
        assert!(xml.contains("xml:id=\"loc3_1\""));
        assert!(xml.contains("<dataType>kern</dataType>"));
        assert!(xml.contains("<kernBoundary start=\"true\" end=\"false\"/>"));
        assert_eq!(
            element_names(&xml),
            vec![
                "frame",
                "frameInfo",
                "fieldCount",
                "frameStart",
                "frameDuration",
                "frameType",
                "kernBoundary",
                "fields",
                "field",
                "dataType",
                "duration",
                "field",
                "dataType",
            ]
        );
    }

    #[test]
    fn test_barline_frame() {
        let mut line = HumdrumLine::new("=2");
        line.set_duration_to_barline(HumNum::from_integer(4));
        let xml = line_to_xml(&line, None, 1, "  ");
        assert!(xml.starts_with("  <frame"));
        assert!(xml.contains("<frameType>barline</frameType>"));
        assert!(xml.contains("<barlineDuration float=\"4\"/>"));
        assert!(!xml.contains("kernBoundary"));
    }

    #[test]
    fn test_reference_meta_frame() {
        let mut line = HumdrumLine::new("!!!OTL@@EN: A <Title>");
        line.set_line_index(0);
        line.set_duration_from_start(HumNum::from_integer(0));
        let xml = line_to_xml(&line, None, 0, "\t");
        assert!(xml.starts_with("<metaFrame n=\"0\" token=\"!!!OTL@@EN: A &lt;Title&gt;\" xml:id=\"loc0\">"));
        assert!(xml.contains("<frameType>reference</frameType>"));
        assert!(xml.contains("<referenceKey language=\"EN\" primary=\"true\">OTL</referenceKey>"));
        assert!(xml.contains("<referenceValue>A &lt;Title&gt;</referenceValue>"));
        assert_eq!(
            element_names(&xml),
            vec![
                "metaFrame",
                "frameInfo",
                "startTime",
                "frameType",
                "referenceKey",
                "referenceValue",
            ]
        );
    }

    #[test]
    fn test_empty_meta_frame() {
        let xml = line_to_xml(&HumdrumLine::new(""), None, 0, "\t");
        assert!(xml.contains("<frameType>empty</frameType>"));
        assert!(xml.contains("<startTime float=\"-1\"/>"));
    }
}
