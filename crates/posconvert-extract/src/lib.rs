//! Field extraction for POS-terminal registration forms.
//!
//! The form is a fixed template, so each field is pulled out by a
//! dedicated pattern anchored at its printed label. Extraction never
//! fails: a pattern that does not match simply leaves its field unset.
//! Matching is first-occurrence and case-sensitive; `.` does not cross
//! line boundaries, so a capture runs to the end of the label's line.

use once_cell::sync::Lazy;
use regex::Regex;

use posconvert_core::PosRecord;

/// Extract all known fields from raw page text.
pub fn extract(page_text: &str) -> PosRecord {
    let mut record = PosRecord {
        business_name: extract_business_name(page_text),
        address: extract_address(page_text),
        serial_number: extract_serial_number(page_text),
        device_type: extract_device_type(page_text),
        group_name: extract_group_name(page_text),
        notes: extract_notes(page_text),
        merchant_id: extract_merchant_id(page_text),
        terminal_id: extract_terminal_id(page_text),
        terminal_vtop_id: extract_terminal_vtop_id(page_text),
        ..Default::default()
    };

    record.terminal_id_00 = record.terminal_id.as_deref().and_then(derive_terminal_id_00);
    record.pos_vtop = record
        .terminal_vtop_id
        .as_deref()
        .map(|id| format!("POS_{id}"));

    record
}

fn extract_business_name(text: &str) -> Option<String> {
    static RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"Tên kinh doanh \(.*\):\s*(.+)").unwrap());
    first_capture(&RE, text)
}

fn extract_address(text: &str) -> Option<String> {
    static RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Địa chỉ lắp máy:\s*(.+)").unwrap());
    first_capture(&RE, text)
}

/// Serial numbers are recorded without the manufacturer's leading "F";
/// it is re-added here.
fn extract_serial_number(text: &str) -> Option<String> {
    static RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Số S/N của máy EDC:\s*(\S+)").unwrap());
    first_capture(&RE, text).map(|sn| format!("F{sn}"))
}

/// Device type, truncated at the first character outside `[A-Za-z0-9 ]`
/// so trailing form decoration (checkboxes, slashes) is dropped.
fn extract_device_type(text: &str) -> Option<String> {
    static RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Loại máy:\s*(.+)").unwrap());
    first_capture(&RE, text).map(|device| {
        device
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == ' ')
            .collect::<String>()
            .trim()
            .to_string()
    })
}

/// Legal name line. Two alternatives: a short code after a trailing
/// dash, or the whole remainder of the line; whichever group matched
/// wins.
fn extract_group_name(text: &str) -> Option<String> {
    static RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"Tên pháp lý \(Theo giấy phép kinh doanh\):(?:.*-\s*(\S+)|\s*(.+))").unwrap()
    });
    let caps = RE.captures(text)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str().trim().to_string())
}

/// Notes line. A note starting with "Ngày" is the form's date stamp,
/// not a real note; the literal string "null" is stored in that case.
/// Downstream consumers depend on the marker, so it is kept as-is.
fn extract_notes(text: &str) -> Option<String> {
    static RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Ghi chú:\s*(.+)").unwrap());
    first_capture(&RE, text).map(|notes| {
        if notes.starts_with("Ngày") {
            "null".to_string()
        } else {
            notes
        }
    })
}

fn extract_merchant_id(text: &str) -> Option<String> {
    static RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"MID\s+VND\s+([\d\s]+)").unwrap());
    digits_capture(&RE, text)
}

fn extract_terminal_id(text: &str) -> Option<String> {
    static RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"TID\s+VND\s+([\d\s]+)").unwrap());
    digits_capture(&RE, text)
}

fn extract_terminal_vtop_id(text: &str) -> Option<String> {
    static RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"TID V-TOP\s+([\d\s]+)").unwrap());
    digits_capture(&RE, text)
}

/// The "00" variant of a terminal ID: only terminals whose 3rd and 4th
/// digits are "39" have one, formed by replacing those digits with "00".
pub fn derive_terminal_id_00(terminal_id: &str) -> Option<String> {
    // get() keeps arbitrary caller input safe: too-short IDs and
    // non-boundary byte offsets both come back None.
    if terminal_id.get(2..4)? == "39" {
        Some(format!(
            "{}00{}",
            &terminal_id[..2],
            &terminal_id[4..]
        ))
    } else {
        None
    }
}

fn first_capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// Capture digits, dropping whitespace embedded by PDF text extraction
/// (column layouts split IDs across spaces and newlines).
fn digits_capture(re: &Regex, text: &str) -> Option<String> {
    let raw = re.captures(text)?.get(1)?.as_str();
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() { None } else { Some(digits) }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_FORM: &str = "\
PHIẾU ĐĂNG KÝ LẮP ĐẶT MÁY POS
Tên pháp lý (Theo giấy phép kinh doanh): CÔNG TY TNHH ABC - HN01
Tên kinh doanh (Theo biển hiệu): CUA HANG ABC
Địa chỉ lắp máy: 12 Lê Lợi, Quận 1, TP.HCM
Số S/N của máy EDC: 12345678
Loại máy: PAX A920/GPRS
Ghi chú: khách yêu cầu lắp trước thứ 6
MID VND 9704 0012 3456
TID VND 12 39 56 78 90
TID V-TOP 99 88 77 66 55
";

    #[test]
    fn extracts_every_field_from_sample_form() {
        let record = extract(SAMPLE_FORM);

        assert_eq!(record.group_name.as_deref(), Some("HN01"));
        assert_eq!(record.business_name.as_deref(), Some("CUA HANG ABC"));
        assert_eq!(
            record.address.as_deref(),
            Some("12 Lê Lợi, Quận 1, TP.HCM")
        );
        assert_eq!(record.serial_number.as_deref(), Some("F12345678"));
        assert_eq!(record.device_type.as_deref(), Some("PAX A920"));
        assert_eq!(
            record.notes.as_deref(),
            Some("khách yêu cầu lắp trước thứ 6")
        );
        assert_eq!(record.merchant_id.as_deref(), Some("970400123456"));
        assert_eq!(record.terminal_id.as_deref(), Some("1239567890"));
        assert_eq!(record.terminal_id_00.as_deref(), Some("1200567890"));
        assert_eq!(record.terminal_vtop_id.as_deref(), Some("9988776655"));
        assert_eq!(record.pos_vtop.as_deref(), Some("POS_9988776655"));
    }

    #[test]
    fn extraction_is_idempotent() {
        let first = extract(SAMPLE_FORM);
        let second = extract(SAMPLE_FORM);
        assert_eq!(first, second);
    }

    #[test]
    fn unmatched_text_yields_empty_record() {
        let record = extract("an unrelated invoice with no form labels");
        assert!(record.is_empty());
    }

    #[test]
    fn terminal_id_00_derivation() {
        assert_eq!(
            derive_terminal_id_00("1239567890").as_deref(),
            Some("1200567890")
        );
        // chars at [2,4) are "34", not "39"
        assert_eq!(derive_terminal_id_00("1234567890"), None);
        assert_eq!(derive_terminal_id_00("123"), None);
    }

    #[test]
    fn terminal_id_00_derivation_tolerates_non_ascii_input() {
        // "₫" is 3 bytes; offset 2..4 is not a char boundary.
        assert_eq!(derive_terminal_id_00("₫3999"), None);
        assert_eq!(
            derive_terminal_id_00("1239đ").as_deref(),
            Some("1200đ")
        );
    }

    #[test]
    fn no_terminal_id_00_without_39_infix() {
        let text = "TID VND 1234567890";
        let record = extract(text);
        assert_eq!(record.terminal_id.as_deref(), Some("1234567890"));
        assert!(record.terminal_id_00.is_none());
    }

    #[test]
    fn pos_vtop_is_derived_from_vtop_id() {
        let record = extract("TID V-TOP 9988776655");
        assert_eq!(record.pos_vtop.as_deref(), Some("POS_9988776655"));
    }

    #[test]
    fn ids_survive_whitespace_and_newlines() {
        let text = "MID VND 9704\n0012 34";
        let record = extract(text);
        assert_eq!(record.merchant_id.as_deref(), Some("9704001234"));
    }

    #[test]
    fn date_stamp_notes_become_null_marker() {
        let record = extract("Ghi chú: Ngày 12 tháng 3 năm 2024");
        assert_eq!(record.notes.as_deref(), Some("null"));
    }

    #[test]
    fn group_name_falls_back_to_whole_remainder() {
        let record =
            extract("Tên pháp lý (Theo giấy phép kinh doanh): HỘ KINH DOANH XYZ");
        assert_eq!(record.group_name.as_deref(), Some("HỘ KINH DOANH XYZ"));
    }

    #[test]
    fn first_occurrence_wins() {
        let text = "Địa chỉ lắp máy: 1 First St\nĐịa chỉ lắp máy: 2 Second St";
        let record = extract(text);
        assert_eq!(record.address.as_deref(), Some("1 First St"));
    }

    #[test]
    fn device_type_truncates_at_non_alphanumeric() {
        let record = extract("Loại máy: Verifone X990 (GPRS)");
        assert_eq!(record.device_type.as_deref(), Some("Verifone X990"));
    }
}
