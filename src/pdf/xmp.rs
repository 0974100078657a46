//! XMP packet generation
//!
//! Produces the RDF/XML packet stored in the catalog's `/Metadata` stream. The
//! properties mirror what goes into the info dictionary so readers that only
//! look at one of the two see the same document.

use crate::date::to_iso;
use crate::pdf::metadata::DocumentMetadata;

/// Escape text for XML element content and attribute values
pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            // Control characters other than tab/newline/return are not allowed in XML 1.0
            c if c.is_control() && !matches!(c, '\t' | '\n' | '\r') => {}
            c => out.push(c),
        }
    }
    out
}

struct PacketWriter {
    body: String,
}

impl PacketWriter {
    fn new() -> Self {
        Self { body: String::new() }
    }

    fn simple(&mut self, property: &str, value: &str) {
        self.body.push_str(&format!(
            "   <{p}>{v}</{p}>\n",
            p = property,
            v = escape_xml(value)
        ));
    }

    fn alt(&mut self, property: &str, value: &str) {
        self.body.push_str(&format!(
            "   <{p}>\n    <rdf:Alt>\n     <rdf:li xml:lang=\"x-default\">{v}</rdf:li>\n    </rdf:Alt>\n   </{p}>\n",
            p = property,
            v = escape_xml(value)
        ));
    }

    fn list(&mut self, property: &str, container: &str, items: &[&str]) {
        if items.is_empty() {
            return;
        }
        self.body.push_str(&format!("   <{}>\n    <rdf:{}>\n", property, container));
        for item in items {
            self.body
                .push_str(&format!("     <rdf:li>{}</rdf:li>\n", escape_xml(item)));
        }
        self.body
            .push_str(&format!("    </rdf:{}>\n   </{}>\n", container, property));
    }

    fn seq(&mut self, property: &str, items: &[&str]) {
        self.list(property, "Seq", items);
    }

    fn bag(&mut self, property: &str, items: &[&str]) {
        self.list(property, "Bag", items);
    }

    fn finish(self) -> String {
        let mut packet = String::new();
        packet.push_str("<?xpacket begin=\"\u{feff}\" id=\"W5M0MpCehiHzreSzNTczkc9d\"?>\n");
        packet.push_str("<x:xmpmeta xmlns:x=\"adobe:ns:meta/\">\n");
        packet.push_str(" <rdf:RDF xmlns:rdf=\"http://www.w3.org/1999/02/22-rdf-syntax-ns#\">\n");
        packet.push_str("  <rdf:Description rdf:about=\"\"\n");
        packet.push_str("    xmlns:dc=\"http://purl.org/dc/elements/1.1/\"\n");
        packet.push_str("    xmlns:xmp=\"http://ns.adobe.com/xap/1.0/\"\n");
        packet.push_str("    xmlns:pdf=\"http://ns.adobe.com/pdf/1.3/\">\n");
        packet.push_str(&self.body);
        packet.push_str("  </rdf:Description>\n");
        packet.push_str(" </rdf:RDF>\n");
        packet.push_str("</x:xmpmeta>\n");
        packet.push_str("<?xpacket end=\"w\"?>");
        packet
    }
}

/// Split a comma-separated keyword string into trimmed, non-empty entries
pub fn split_keywords(keywords: &str) -> Vec<&str> {
    keywords
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .collect()
}

/// Build the XMP packet for a document
pub fn build_packet(meta: &DocumentMetadata) -> String {
    let published = to_iso(&meta.published);
    let modified = to_iso(&meta.modified);
    let mut writer = PacketWriter::new();

    writer.alt("dc:title", &meta.title);
    writer.seq("dc:creator", &[meta.author.as_str()]);
    if let Some(url) = &meta.source_url {
        writer.simple("dc:identifier", url);
    }
    writer.alt("dc:description", &meta.subject);
    writer.seq("dc:date", &[published.as_str()]);
    if let Some(keywords) = &meta.keywords {
        writer.bag("dc:subject", &split_keywords(keywords));
    }
    if let Some(language) = &meta.language {
        writer.bag("dc:language", &[language.as_str()]);
    }
    if let Some(publisher) = &meta.publisher {
        writer.bag("dc:publisher", &[publisher.as_str()]);
    }

    writer.simple("xmp:CreatorTool", &meta.creator);
    writer.simple("xmp:CreateDate", &published);
    writer.simple("xmp:ModifyDate", &modified);
    writer.simple("xmp:MetadataDate", &modified);
    writer.simple("pdf:Producer", &meta.producer);
    if let Some(keywords) = &meta.keywords {
        writer.simple("pdf:Keywords", keywords);
    }

    writer.finish()
}
