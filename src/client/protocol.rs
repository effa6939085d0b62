//! Index Server Wire Protocol
//!
//! Endpoint paths, content types and the fixed XML update bodies understood by
//! the index servers.
//!
//! Bulk bodies are tab-separated: the first line is the header naming the
//! fields, every following line is one document. Tabs are used both as the
//! separator and as the encapsulator so that quotes in values are kept as is.

// --- API Endpoints ---

/// XML update handler (commit, optimize, delete).
pub const ENDPOINT_UPDATE: &str = "/solr/update";
/// Tab-separated bulk upload with the body in the request.
pub const ENDPOINT_UPDATE_TSV: &str = "/solr/update?separator=%09&encapsulator=%09";
/// Tab-separated bulk upload of a file read by the server itself. The
/// URL-encoded absolute path is appended.
pub const ENDPOINT_UPDATE_STREAM_FILE: &str = "/solr/update/csv?separator=%09&encapsulator=%09&stream.contentType=text/plain;charset=utf-8&stream.file=";
pub const ENDPOINT_PING: &str = "/solr/admin/ping";

// --- Content Types ---

pub const CONTENT_TYPE_XML: &str = "text/xml; charset=UTF-8";
pub const CONTENT_TYPE_TSV: &str = "text/csv; charset=UTF-8";

// --- Update Bodies ---

pub const DELETE_ALL_COMMAND: &str = "<delete><query>*:*</query></delete>";
pub const COMMIT_COMMAND: &str = "<commit/>";
pub const SOFT_COMMIT_COMMAND: &str = r#"<commit softCommit="true"/>"#;
pub const OPTIMIZE_COMMAND: &str = "<optimize/>";

/// Delete-by-query body for `query`, escaped for an XML text node.
pub fn delete_by_query(query: &str) -> String {
    format!("<delete><query>{}</query></delete>", escape_xml(query))
}

pub fn escape_xml(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
