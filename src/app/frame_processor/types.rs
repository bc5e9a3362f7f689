// SPDX-License-Identifier: GPL-3.0-only

//! Decoder output types

use std::fmt;

/// A rectangular region within a frame
///
/// Coordinates are normalized (0.0 to 1.0) relative to the upright frame, so
/// the preview can map them onto any terminal size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameRegion {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl FrameRegion {
    /// Create a frame region from pixel coordinates
    pub fn from_pixels(
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        frame_width: u32,
        frame_height: u32,
    ) -> Self {
        let fw = frame_width.max(1) as f32;
        let fh = frame_height.max(1) as f32;
        Self {
            x: (x as f32 / fw).clamp(0.0, 1.0),
            y: (y as f32 / fh).clamp(0.0, 1.0),
            width: (width as f32 / fw).clamp(0.0, 1.0),
            height: (height as f32 / fh).clamp(0.0, 1.0),
        }
    }

    /// Whether the normalized point lies inside the region
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x <= self.x + self.width && y >= self.y && y <= self.y + self.height
    }
}

/// Symbology of a decoded barcode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BarcodeFormat {
    QrCode,
    Aztec,
    DataMatrix,
    Pdf417,
    Codabar,
    Code39,
    Code93,
    Code128,
    Ean8,
    Ean13,
    Itf,
    UpcA,
    UpcE,
}

impl fmt::Display for BarcodeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BarcodeFormat::QrCode => "QR Code",
            BarcodeFormat::Aztec => "Aztec",
            BarcodeFormat::DataMatrix => "Data Matrix",
            BarcodeFormat::Pdf417 => "PDF417",
            BarcodeFormat::Codabar => "Codabar",
            BarcodeFormat::Code39 => "Code 39",
            BarcodeFormat::Code93 => "Code 93",
            BarcodeFormat::Code128 => "Code 128",
            BarcodeFormat::Ean8 => "EAN-8",
            BarcodeFormat::Ean13 => "EAN-13",
            BarcodeFormat::Itf => "ITF",
            BarcodeFormat::UpcA => "UPC-A",
            BarcodeFormat::UpcE => "UPC-E",
        };
        f.write_str(name)
    }
}

/// What kind of payload a barcode carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Url,
    Wifi,
    Phone,
    Email,
    Sms,
    Geo,
    Contact,
    Event,
    Text,
}

impl ValueType {
    /// Classify decoded text by its scheme or envelope
    ///
    /// Falls back to `Text` for anything unrecognized.
    pub fn classify(content: &str) -> Self {
        let trimmed = content.trim();
        let lower = trimmed.to_ascii_lowercase();

        if trimmed.starts_with("WIFI:") {
            ValueType::Wifi
        } else if lower.starts_with("http://") || lower.starts_with("https://") {
            ValueType::Url
        } else if lower.starts_with("tel:") {
            ValueType::Phone
        } else if lower.starts_with("mailto:") || lower.starts_with("matmsg:") {
            ValueType::Email
        } else if lower.starts_with("sms:") || lower.starts_with("smsto:") {
            ValueType::Sms
        } else if lower.starts_with("geo:") {
            ValueType::Geo
        } else if trimmed.starts_with("BEGIN:VCARD") || trimmed.starts_with("MECARD:") {
            ValueType::Contact
        } else if trimmed.starts_with("BEGIN:VCALENDAR") || trimmed.starts_with("BEGIN:VEVENT") {
            ValueType::Event
        } else if bare_domain(trimmed) {
            ValueType::Url
        } else {
            ValueType::Text
        }
    }

    /// Short label shown next to the decoded text
    pub fn label(&self) -> &'static str {
        match self {
            ValueType::Url => "Link",
            ValueType::Wifi => "Wi-Fi network",
            ValueType::Phone => "Phone number",
            ValueType::Email => "E-mail",
            ValueType::Sms => "SMS",
            ValueType::Geo => "Location",
            ValueType::Contact => "Contact",
            ValueType::Event => "Calendar event",
            ValueType::Text => "Text",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Looks like `www.example.com` or `example.org` with no scheme
fn bare_domain(text: &str) -> bool {
    if text.is_empty() || text.len() >= 256 || text.contains(char::is_whitespace) {
        return false;
    }
    let host = text.split('/').next().unwrap_or(text).to_ascii_lowercase();
    host.starts_with("www.")
        || [".com", ".org", ".net", ".io"]
            .iter()
            .any(|tld| host.ends_with(tld) && host.len() > tld.len())
}

/// URL to hand to the desktop opener, if the content is a link
pub fn link_target(content: &str) -> Option<String> {
    let trimmed = content.trim();
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        Some(trimmed.to_string())
    } else if bare_domain(trimmed) {
        Some(format!("https://{}", trimmed))
    } else {
        None
    }
}

/// Network name from a `WIFI:` payload
///
/// Handles backslash escapes in the value.
pub fn wifi_ssid(content: &str) -> Option<String> {
    let body = content.trim().strip_prefix("WIFI:")?;

    let mut fields = Vec::new();
    let mut current = String::new();
    let mut escaped = false;
    for c in body.chars() {
        match (escaped, c) {
            (true, c) => {
                current.push(c);
                escaped = false;
            }
            (false, '\\') => escaped = true,
            (false, ';') => fields.push(std::mem::take(&mut current)),
            (false, c) => current.push(c),
        }
    }
    fields.push(current);

    fields
        .into_iter()
        .find_map(|field| field.strip_prefix("S:").map(str::to_string))
}

/// One barcode found in a frame
#[derive(Debug, Clone, PartialEq)]
pub struct Barcode {
    /// Decoded payload exactly as encoded
    pub raw_value: String,
    pub format: BarcodeFormat,
    /// Location in the upright frame, when the decoder reports one
    pub bounding_box: Option<FrameRegion>,
    pub value_type: ValueType,
}

impl Barcode {
    /// Barcode with a classified payload
    pub fn new(
        raw_value: String,
        format: BarcodeFormat,
        bounding_box: Option<FrameRegion>,
    ) -> Self {
        let value_type = ValueType::classify(&raw_value);
        Self {
            raw_value,
            format,
            bounding_box,
            value_type,
        }
    }

    /// QR code with text only, no location
    pub fn qr(raw_value: impl Into<String>) -> Self {
        Self::new(raw_value.into(), BarcodeFormat::QrCode, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_schemes() {
        assert_eq!(ValueType::classify("https://example.com"), ValueType::Url);
        assert_eq!(ValueType::classify("HTTP://EXAMPLE.COM/A"), ValueType::Url);
        assert_eq!(
            ValueType::classify("WIFI:S:MyNetwork;T:WPA;P:mypassword;;"),
            ValueType::Wifi
        );
        assert_eq!(ValueType::classify("tel:+1234567890"), ValueType::Phone);
        assert_eq!(
            ValueType::classify("mailto:test@example.com?subject=Hello"),
            ValueType::Email
        );
        assert_eq!(ValueType::classify("smsto:+123:hi"), ValueType::Sms);
        assert_eq!(ValueType::classify("geo:37.7749,-122.4194"), ValueType::Geo);
        assert_eq!(
            ValueType::classify("BEGIN:VCARD\nVERSION:3.0\nEND:VCARD"),
            ValueType::Contact
        );
        assert_eq!(
            ValueType::classify("BEGIN:VEVENT\nSUMMARY:x\nEND:VEVENT"),
            ValueType::Event
        );
    }

    #[test]
    fn test_classify_text_and_bare_domain() {
        assert_eq!(ValueType::classify("Hello World!"), ValueType::Text);
        assert_eq!(ValueType::classify("A123"), ValueType::Text);
        assert_eq!(ValueType::classify("www.example.de"), ValueType::Url);
        assert_eq!(ValueType::classify("example.org/path"), ValueType::Url);
        assert_eq!(ValueType::classify(".com"), ValueType::Text);
        assert_eq!(ValueType::classify("v1.2.3"), ValueType::Text);
    }

    #[test]
    fn test_link_target() {
        assert_eq!(
            link_target(" https://example.com/a "),
            Some("https://example.com/a".to_string())
        );
        assert_eq!(
            link_target("example.com"),
            Some("https://example.com".to_string())
        );
        assert_eq!(link_target("tel:+1"), None);
        assert_eq!(link_target("B456"), None);
    }

    #[test]
    fn test_wifi_ssid() {
        assert_eq!(
            wifi_ssid("WIFI:T:WPA;S:HiddenNet;P:secret;H:true;;"),
            Some("HiddenNet".to_string())
        );
        assert_eq!(
            wifi_ssid(r"WIFI:S:Cafe\;Bar;T:nopass;;"),
            Some("Cafe;Bar".to_string())
        );
        assert_eq!(wifi_ssid("not wifi"), None);
    }

    #[test]
    fn test_barcode_classifies_payload() {
        let barcode = Barcode::qr("https://example.com");
        assert_eq!(barcode.value_type, ValueType::Url);
        assert_eq!(barcode.format, BarcodeFormat::QrCode);
        assert!(barcode.bounding_box.is_none());
    }

    #[test]
    fn test_frame_region_from_pixels() {
        let region = FrameRegion::from_pixels(100, 50, 200, 100, 1000, 500);
        assert!((region.x - 0.1).abs() < 0.001);
        assert!((region.y - 0.1).abs() < 0.001);
        assert!((region.width - 0.2).abs() < 0.001);
        assert!((region.height - 0.2).abs() < 0.001);
        assert!(region.contains(0.2, 0.2));
        assert!(!region.contains(0.05, 0.2));
    }
}
