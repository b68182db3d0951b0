//! Turns a [`DomainQueryResult`] into the reply shown to the user.

use crate::DomainQueryResult;
use serde::Serialize;

const NOT_AVAILABLE: &str = "N/A";

/// Longest text Telegram accepts in one message, in UTF-16 code units.
pub const MAX_MESSAGE_LEN: usize = 4096;

/// Structured summary of a lookup. Record lists keep API order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DomainReport {
    pub hostname: String,
    pub apex_domain: String,
    pub ipv4: Vec<String>,
    pub ipv6: Vec<String>,
    pub mx: Vec<String>,
    pub ns: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub soa_email: Option<String>,
    pub txt: Vec<String>,
    pub subdomain_count: u64,
}

impl From<&DomainQueryResult> for DomainReport {
    fn from(result: &DomainQueryResult) -> Self {
        let dns = &result.current_dns;

        Self {
            hostname: result.hostname.clone().unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            apex_domain: result.apex_domain.clone().unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            ipv4: dns.a.values.iter().map(|v| v.ip.clone()).collect(),
            ipv6: dns.aaaa.values.iter().map(|v| v.ipv6.clone()).collect(),
            mx: dns.mx.values.iter().map(|v| v.hostname.clone()).collect(),
            ns: dns.ns.values.iter().map(|v| v.nameserver.clone()).collect(),
            // Only the first SOA record is reported
            soa_email: dns
                .soa
                .values
                .first()
                .map(|soa| soa.email.clone().unwrap_or_else(|| NOT_AVAILABLE.to_string())),
            txt: dns.txt.values.iter().map(|v| v.value.clone()).collect(),
            subdomain_count: result.subdomain_count.unwrap_or(0),
        }
    }
}

impl DomainReport {
    /// Renders the report as Telegram Markdown, one line per section.
    pub fn render_markdown(&self) -> String {
        let mut text = String::from("🔎 *Domain Info*\n");
        text.push_str(&format!("Hostname: {}\n", self.hostname));
        text.push_str(&format!("Apex domain: {}\n", self.apex_domain));

        push_list(&mut text, "IPv4", &self.ipv4);
        push_list(&mut text, "IPv6", &self.ipv6);
        push_list(&mut text, "MX", &self.mx);
        push_list(&mut text, "NS", &self.ns);
        if let Some(email) = &self.soa_email {
            text.push_str(&format!("SOA Email: `{}`\n", email));
        }
        push_list(&mut text, "TXT", &self.txt);

        text.push_str(&format!("Subdomain count: `{}`\n", self.subdomain_count));
        text
    }
}

fn push_list(text: &mut String, label: &str, values: &[String]) {
    if values.is_empty() {
        return;
    }
    text.push_str(&format!("{}: `{}`\n", label, values.join(", ")));
}

pub fn format_report(result: &DomainQueryResult) -> String {
    DomainReport::from(result).render_markdown()
}

/// The report split into messages Telegram will accept.
pub fn format_report_messages(result: &DomainQueryResult) -> Vec<String> {
    split_message(&format_report(result), MAX_MESSAGE_LEN)
}

/// Splits `text` into chunks of at most `limit` UTF-16 units, breaking
/// between lines. A single line over the limit is cut mid-line.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split_inclusive('\n') {
        let line_len = line.encode_utf16().count();
        if current_len + line_len > limit && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if line_len <= limit {
            current.push_str(line);
            current_len += line_len;
            continue;
        }

        for ch in line.chars() {
            let width = ch.len_utf16();
            if current_len + width > limit {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            current.push(ch);
            current_len += width;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
