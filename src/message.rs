use mail_parser::{HeaderName, HeaderValue, MessageParser};

/// Comparable features derived from one fetched message. Constructed once
/// per message, discarded after classification.
#[derive(Debug, Default, Clone)]
pub struct MessageFeatures {
    /// Decoded From header as a display string ("Name <addr>" or the bare
    /// address). None when nothing recoverable; all sender-based rules then
    /// fall through to Keep.
    pub sender: Option<String>,
    /// Bare address, used when harvesting signals from a blacklist folder.
    pub from_address: Option<String>,
    /// Undecoded From header value; whitelist matching is case-sensitive
    /// against this.
    pub raw_from: Option<String>,
    /// First originating IPv4 found in the Received trace headers, in
    /// original header order. Spoofed or missing trace headers yield None,
    /// disabling the IP-based rules for that message.
    pub origin_ip: Option<String>,
    /// Decoded subject with control characters and pictographs stripped.
    pub subject: Option<String>,
    /// Folder the message was fetched from.
    pub folder: String,
}

impl MessageFeatures {
    /// Derive features from a raw message. Never fails: undecodable or
    /// absent parts degrade to None rather than aborting the message.
    pub fn extract(raw: &[u8], folder: &str) -> Self {
        let raw_from = raw_header_value(raw, "From");
        let mut features = MessageFeatures {
            raw_from: raw_from.clone(),
            folder: folder.to_string(),
            ..Default::default()
        };

        if let Some(message) = MessageParser::default().parse(raw) {
            let addr = message
                .header(HeaderName::From)
                .and_then(|v| v.as_address())
                .and_then(|v| v.as_list())
                .and_then(|v| v.first());
            if let Some(addr) = addr {
                match (addr.name(), addr.address()) {
                    (Some(name), Some(address)) => {
                        features.sender = Some(format!("{name} <{address}>"));
                        features.from_address = Some(address.to_string());
                    }
                    (None, Some(address)) => {
                        features.sender = Some(address.to_string());
                        features.from_address = Some(address.to_string());
                    }
                    (Some(name), None) => {
                        features.sender = Some(name.to_string());
                    }
                    (None, None) => {}
                }
            }

            features.origin_ip = message
                .header_values(HeaderName::Received)
                .find_map(|value| match value {
                    HeaderValue::Received(received) => received
                        .from_ip
                        .filter(|ip| ip.is_ipv4())
                        .map(|ip| ip.to_string()),
                    _ => None,
                });

            features.subject = message
                .header(HeaderName::Subject)
                .and_then(|v| v.as_text())
                .map(sanitize_subject);
        }

        // Structurally defective From headers: recover the raw line and
        // strip "Name <addr>" decoration before use as an address.
        if features.from_address.is_none() {
            if let Some(value) = &raw_from {
                let address = strip_display(value);
                if !address.is_empty() {
                    features.from_address = Some(address);
                }
            }
        }
        if features.sender.is_none() {
            features.sender = raw_from.filter(|v| !v.is_empty());
        }
        // A From value carrying raw binary with no declared charset has no
        // recoverable sender; sender-based rules then keep the message.
        // The bare address recovered above still serves harvesting.
        if features
            .sender
            .as_deref()
            .is_some_and(|v| v.contains(char::REPLACEMENT_CHARACTER))
        {
            features.sender = None;
        }

        features
    }
}

/// Locate a header in the raw header block, unfolding continuation lines.
fn raw_header_value(raw: &[u8], name: &str) -> Option<String> {
    let text = String::from_utf8_lossy(raw);
    let mut value: Option<String> = None;
    for line in text.lines() {
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some(v) = value.as_mut() {
                v.push(' ');
                v.push_str(line.trim());
            }
            continue;
        }
        if value.is_some() {
            break;
        }
        if line.trim_end().is_empty() {
            // End of the header block.
            break;
        }
        if let Some((field, rest)) = line.split_once(':') {
            if field.trim().eq_ignore_ascii_case(name) {
                value = Some(rest.trim().to_string());
            }
        }
    }
    value.filter(|v| !v.is_empty())
}

/// "Name <addr>" -> "addr".
fn strip_display(value: &str) -> String {
    match (value.find('<'), value.rfind('>')) {
        (Some(start), Some(end)) if end > start => value[start + 1..end].trim().to_string(),
        (Some(start), _) => value[start + 1..].trim().to_string(),
        _ => value.trim().to_string(),
    }
}

fn sanitize_subject(subject: &str) -> String {
    subject
        .chars()
        .filter(|c| !c.is_control() && !is_pictograph(*c))
        .collect()
}

/// Emoji and other pictographic blocks that spam subjects lean on.
fn is_pictograph(c: char) -> bool {
    matches!(
        u32::from(c),
        0x1F000..=0x1FAFF | 0x2600..=0x27BF | 0x2B00..=0x2BFF | 0xFE00..=0xFE0F
    )
}
