//! EMV Merchant-Presented QR payload, Brazilian PIX profile.
//!
//! The payload is a flat sequence of tag-length-value fields where the
//! length is always a two-digit decimal byte count, closed by a CRC-16
//! computed over everything before it plus the literal "6304". Identical
//! inputs must produce byte-identical output: the rendered QR and the
//! copy-paste text have to match what the payer's bank displays.

use {
    super::key,
    crate::domain::{error::EngineError, money::MoneyAmount},
    crc::{CRC_16_IBM_3740, Crc},
    unicode_normalization::{UnicodeNormalization, char::is_combining_mark},
};

const ID_PAYLOAD_FORMAT: &str = "00";
const ID_MERCHANT_ACCOUNT: &str = "26";
const ID_MERCHANT_CATEGORY: &str = "52";
const ID_CURRENCY: &str = "53";
const ID_AMOUNT: &str = "54";
const ID_COUNTRY: &str = "58";
const ID_MERCHANT_NAME: &str = "59";
const ID_MERCHANT_CITY: &str = "60";
const ID_ADDITIONAL_DATA: &str = "62";
const ID_CRC: &str = "63";

const PIX_GUI: &str = "br.gov.bcb.pix";
const BRL_NUMERIC: &str = "986";

// CRC-16/CCITT-FALSE in the crc crate's catalog.
const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_3740);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixQrRequest {
    pub pix_key: String,
    pub merchant_name: String,
    pub merchant_city: String,
    pub amount: MoneyAmount,
    pub transaction_ref: String,
    pub description: Option<String>,
}

/// Build the EMV text payload. Pure — no clock, no randomness.
pub fn encode(request: &PixQrRequest) -> Result<String, EngineError> {
    key::classify(&request.pix_key)?;

    let mut payload = String::new();
    payload.push_str(&tlv(ID_PAYLOAD_FORMAT, "01"));

    let account = format!(
        "{}{}",
        tlv("00", PIX_GUI),
        tlv("01", &request.pix_key)
    );
    payload.push_str(&tlv(ID_MERCHANT_ACCOUNT, &account));

    payload.push_str(&tlv(ID_MERCHANT_CATEGORY, "0000"));
    payload.push_str(&tlv(ID_CURRENCY, BRL_NUMERIC));

    // Zero means "payer types the amount" — the field is omitted entirely.
    if !request.amount.is_zero() {
        payload.push_str(&tlv(ID_AMOUNT, &request.amount.as_decimal_string()));
    }

    payload.push_str(&tlv(ID_COUNTRY, "BR"));
    payload.push_str(&tlv(ID_MERCHANT_NAME, &sanitize(&request.merchant_name, 25)));
    payload.push_str(&tlv(ID_MERCHANT_CITY, &sanitize(&request.merchant_city, 15)));

    let mut additional = String::new();
    let reference = sanitize_ref(&request.transaction_ref);
    if !reference.is_empty() {
        additional.push_str(&tlv("05", &reference));
    }
    if let Some(description) = request.description.as_deref() {
        additional.push_str(&tlv("08", truncate_bytes(description, 72)));
    }
    payload.push_str(&tlv(ID_ADDITIONAL_DATA, &additional));

    // CRC covers the payload plus its own tag and length ("6304").
    payload.push_str(ID_CRC);
    payload.push_str("04");
    let crc = CRC16.checksum(payload.as_bytes());
    payload.push_str(&format!("{crc:04X}"));

    Ok(payload)
}

fn tlv(tag: &str, value: &str) -> String {
    debug_assert!(value.len() <= 99, "TLV value over 99 bytes: {tag}");
    format!("{tag}{:02}{value}", value.len())
}

/// Accents stripped, uppercased, letters/digits/spaces only, truncated.
fn sanitize(input: &str, max: usize) -> String {
    input
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_uppercase)
        .filter(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || *c == ' ')
        .take(max)
        .collect::<String>()
        .trim()
        .to_string()
}

/// Reference label: truncated to 25 chars, then anything non-alphanumeric
/// dropped.
fn sanitize_ref(input: &str) -> String {
    input
        .chars()
        .take(25)
        .filter(char::is_ascii_alphanumeric)
        .collect()
}

fn truncate_bytes(input: &str, max: usize) -> &str {
    if input.len() <= max {
        return input;
    }
    let mut end = max;
    while !input.is_char_boundary(end) {
        end -= 1;
    }
    &input[..end]
}
