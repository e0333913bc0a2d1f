//! The combined-text-artifact line schema.
//!
//! The aggregator writes blocks with these exact label prefixes and the
//! exporter parses them back; keeping both sides on the same constants
//! is what makes the round trip lossless. Labels are the wire format
//! and stay in the form's original language.

use crate::PosRecord;

/// Starts a new per-file block.
pub const FILE_HEADER_PREFIX: &str = "File: ";

/// Separator line between blocks.
pub const BLOCK_SEPARATOR: &str =
    "----------------------------------------------------------------";

pub const LABEL_BUSINESS_NAME: &str = "Tên kinh doanh: ";
pub const LABEL_ADDRESS: &str = "Địa chỉ: ";
pub const LABEL_SERIAL_NUMBER: &str = "Số serial: ";
pub const LABEL_DEVICE_TYPE: &str = "Loại máy: ";
pub const LABEL_GROUP_NAME: &str = "Mã máy: ";
pub const LABEL_NOTES: &str = "Ghi chú: ";
pub const LABEL_MERCHANT_ID: &str = "MID: ";
pub const LABEL_TERMINAL_ID: &str = "TID: ";
pub const LABEL_TERMINAL_ID_00: &str = "TID 00: ";
pub const LABEL_TERMINAL_VTOP_ID: &str = "TID V-TOP: ";
pub const LABEL_POS_VTOP: &str = "POS_V-TOP: ";

/// The record's fields paired with their labels, in block order.
pub fn field_lines(record: &PosRecord) -> [(&'static str, Option<&str>); 11] {
    [
        (LABEL_BUSINESS_NAME, record.business_name.as_deref()),
        (LABEL_ADDRESS, record.address.as_deref()),
        (LABEL_SERIAL_NUMBER, record.serial_number.as_deref()),
        (LABEL_DEVICE_TYPE, record.device_type.as_deref()),
        (LABEL_GROUP_NAME, record.group_name.as_deref()),
        (LABEL_NOTES, record.notes.as_deref()),
        (LABEL_MERCHANT_ID, record.merchant_id.as_deref()),
        (LABEL_TERMINAL_ID, record.terminal_id.as_deref()),
        (LABEL_TERMINAL_ID_00, record.terminal_id_00.as_deref()),
        (LABEL_TERMINAL_VTOP_ID, record.terminal_vtop_id.as_deref()),
        (LABEL_POS_VTOP, record.pos_vtop.as_deref()),
    ]
}

/// Render one artifact block: header line, one label line per set
/// field, then a blank line and the separator.
pub fn render_block(file_name: &str, record: &PosRecord) -> String {
    let mut block = String::new();
    block.push_str(FILE_HEADER_PREFIX);
    block.push_str(file_name);
    block.push('\n');
    for (label, value) in field_lines(record) {
        if let Some(value) = value {
            block.push_str(label);
            block.push_str(value);
            block.push('\n');
        }
    }
    block.push('\n');
    block.push_str(BLOCK_SEPARATOR);
    block.push('\n');
    block
}

/// Populate the field matching `line`'s label prefix, if any.
///
/// Returns false for unrecognized lines (blank lines, separators),
/// which the reader ignores.
pub fn set_field(record: &mut PosRecord, line: &str) -> bool {
    let fields: [(&str, &mut Option<String>); 11] = [
        (LABEL_BUSINESS_NAME, &mut record.business_name),
        (LABEL_ADDRESS, &mut record.address),
        (LABEL_SERIAL_NUMBER, &mut record.serial_number),
        (LABEL_DEVICE_TYPE, &mut record.device_type),
        (LABEL_GROUP_NAME, &mut record.group_name),
        (LABEL_NOTES, &mut record.notes),
        (LABEL_MERCHANT_ID, &mut record.merchant_id),
        (LABEL_TERMINAL_ID, &mut record.terminal_id),
        (LABEL_TERMINAL_ID_00, &mut record.terminal_id_00),
        (LABEL_TERMINAL_VTOP_ID, &mut record.terminal_vtop_id),
        (LABEL_POS_VTOP, &mut record.pos_vtop),
    ];
    for (label, slot) in fields {
        if let Some(rest) = line.strip_prefix(label) {
            *slot = Some(rest.to_string());
            return true;
        }
    }
    false
}
