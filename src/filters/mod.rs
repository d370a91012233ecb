//! Stream content filters: dispatch by `/Filter` name and the individual
//! decoders. FlateDecode and LZWDecode run the predictor post-pass from
//! `/DecodeParms`; CCITTFaxDecode only wraps its payload into a TIFF
//! container for a downstream image decoder.

pub mod png;

use crate::cursor::is_white_space;
use crate::error::FilterError;
use crate::Dictionary;
use log::warn;
use std::io::{Read, Write};

type Result<T> = std::result::Result<T, FilterError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    Ascii85,
    AsciiHex,
    CcittFax,
    Crypt,
    Dct,
    Flate,
    Jbig2,
    Jpx,
    Lzw,
    RunLength,
}

impl Filter {
    /// Look up a filter by its `/Filter` name. The short decode-side
    /// synonyms are accepted alongside the long forms.
    pub fn from_name(name: &[u8]) -> Result<Filter> {
        match name {
            b"ASCII85Decode" | b"A85" => Ok(Filter::Ascii85),
            b"ASCIIHexDecode" | b"AHx" => Ok(Filter::AsciiHex),
            b"CCITTFaxDecode" | b"CCF" => Ok(Filter::CcittFax),
            b"Crypt" => Ok(Filter::Crypt),
            b"DCTDecode" | b"DCT" => Ok(Filter::Dct),
            b"FlateDecode" | b"Fl" => Ok(Filter::Flate),
            b"JBIG2Decode" => Ok(Filter::Jbig2),
            b"JPXDecode" => Ok(Filter::Jpx),
            b"LZWDecode" | b"LZW" => Ok(Filter::Lzw),
            b"RunLengthDecode" | b"RL" => Ok(Filter::RunLength),
            _ => Err(FilterError::Unsupported(String::from_utf8_lossy(name).into_owned())),
        }
    }
}

/// Decode one filter stage. `params` is the `/DecodeParms` entry matching
/// this stage, if any.
pub fn decode(data: &[u8], filter: Filter, params: Option<&Dictionary>) -> Result<Vec<u8>> {
    if data.is_empty() {
        return Ok(Vec::new());
    }
    match filter {
        Filter::Flate => predictor_decode(inflate(data)?, params),
        Filter::Lzw => predictor_decode(lzw_decode(data, params)?, params),
        Filter::Ascii85 => ascii85_decode(data),
        Filter::AsciiHex => ascii_hex_decode(data),
        Filter::RunLength => run_length_decode(data),
        Filter::CcittFax => Ok(ccitt_fax_wrap(data, params)),
        Filter::Dct | Filter::Jpx => Ok(data.to_vec()),
        Filter::Crypt => Err(FilterError::Unsupported("Crypt".to_string())),
        Filter::Jbig2 => Err(FilterError::Unsupported("JBIG2Decode".to_string())),
    }
}

/// Encode data for one filter stage. Only the byte-transform filters have
/// an encode direction.
pub fn encode(data: &[u8], filter: Filter, params: Option<&Dictionary>) -> Result<Vec<u8>> {
    match filter {
        Filter::Flate => deflate(&predictor_encode(data, params)?),
        Filter::Lzw => lzw_encode(&predictor_encode(data, params)?, params),
        Filter::Ascii85 => Ok(ascii85_encode(data)),
        Filter::AsciiHex => Ok(ascii_hex_encode(data)),
        Filter::RunLength => Ok(run_length_encode(data)),
        Filter::CcittFax => Err(FilterError::Unsupported("CCITTFaxDecode".to_string())),
        Filter::Dct => Err(FilterError::Unsupported("DCTDecode".to_string())),
        Filter::Jpx => Err(FilterError::Unsupported("JPXDecode".to_string())),
        Filter::Crypt => Err(FilterError::Unsupported("Crypt".to_string())),
        Filter::Jbig2 => Err(FilterError::Unsupported("JBIG2Decode".to_string())),
    }
}

fn param_i64(params: Option<&Dictionary>, key: &[u8], default: i64) -> i64 {
    params
        .and_then(|p| p.get(key).ok())
        .and_then(|value| value.as_i64().ok())
        .unwrap_or(default)
}

struct PredictorParams {
    predictor: i64,
    columns: usize,
    bpp: usize,
}

fn predictor_params(params: Option<&Dictionary>) -> PredictorParams {
    let predictor = param_i64(params, b"Predictor", 1);
    let columns = param_i64(params, b"Columns", 1).max(1) as usize;
    let mut bits = param_i64(params, b"BitsPerComponent", 8);
    if ![1, 2, 4, 8, 16].contains(&bits) {
        bits = 8;
    }
    PredictorParams {
        predictor,
        columns,
        bpp: ((bits + 7) / 8) as usize,
    }
}

fn predictor_decode(data: Vec<u8>, params: Option<&Dictionary>) -> Result<Vec<u8>> {
    let p = predictor_params(params);
    if p.predictor <= 1 {
        return Ok(data);
    }
    png::decode_frame(&data, p.predictor, p.bpp, p.columns)
}

fn predictor_encode(data: &[u8], params: Option<&Dictionary>) -> Result<Vec<u8>> {
    let p = predictor_params(params);
    if p.predictor <= 1 {
        return Ok(data.to_vec());
    }
    png::encode_frame(data, p.predictor, p.bpp, p.columns)
}

fn inflate(data: &[u8]) -> Result<Vec<u8>> {
    use flate2::read::ZlibDecoder;

    let mut output = Vec::with_capacity(data.len() * 2);
    let mut decoder = ZlibDecoder::new(data);
    decoder
        .read_to_end(&mut output)
        .map_err(|err| FilterError::Flate(err.to_string()))?;
    Ok(output)
}

fn deflate(data: &[u8]) -> Result<Vec<u8>> {
    use flate2::write::ZlibEncoder;
    use flate2::Compression;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .and_then(|_| encoder.finish())
        .map_err(|err| FilterError::Flate(err.to_string()))
}

fn check_early_change(params: Option<&Dictionary>) -> Result<()> {
    if param_i64(params, b"EarlyChange", 1) != 1 {
        return Err(FilterError::Lzw("only EarlyChange = 1 is supported".to_string()));
    }
    Ok(())
}

fn lzw_decode(data: &[u8], params: Option<&Dictionary>) -> Result<Vec<u8>> {
    use weezl::{decode::Decoder, BitOrder};

    check_early_change(params)?;

    let mut output = vec![];
    let mut decoder = Decoder::with_tiff_size_switch(BitOrder::Msb, 8);
    let result = decoder.into_stream(&mut output).decode_all(data);
    if let Err(err) = result.status {
        return Err(FilterError::Lzw(err.to_string()));
    }
    Ok(output)
}

fn lzw_encode(data: &[u8], params: Option<&Dictionary>) -> Result<Vec<u8>> {
    use weezl::{encode::Encoder, BitOrder};

    check_early_change(params)?;

    let mut encoder = Encoder::with_tiff_size_switch(BitOrder::Msb, 8);
    encoder.encode(data).map_err(|err| FilterError::Lzw(err.to_string()))
}

fn ascii85_decode(data: &[u8]) -> Result<Vec<u8>> {
    let mut output = Vec::with_capacity(data.len() / 5 * 4);
    let mut buffer: u32 = 0;
    let mut count = 0;
    let mut saw_eod = false;

    for &byte in data {
        match byte {
            b'~' => {
                saw_eod = true;
                break;
            }
            b'z' if count == 0 => output.extend_from_slice(&[0, 0, 0, 0]),
            b'z' => return Err(FilterError::Ascii85("z is not allowed in the middle of a group")),
            b'!'..=b'u' => {
                buffer = buffer
                    .checked_mul(85)
                    .and_then(|b| b.checked_add((byte - b'!') as u32))
                    .ok_or(FilterError::Ascii85("group exceeds 32 bits"))?;
                count += 1;
                if count == 5 {
                    output.extend_from_slice(&buffer.to_be_bytes());
                    buffer = 0;
                    count = 0;
                }
            }
            c if is_white_space(c) => {}
            _ => return Err(FilterError::Ascii85("byte outside the ASCII85 alphabet")),
        }
    }

    if !saw_eod {
        warn!("ASCII85 stream is missing its EOD marker");
    }

    if count == 1 {
        return Err(FilterError::Ascii85("a final group of one character is impossible"));
    }
    if count > 0 {
        // pad the partial group with 'u' and keep count - 1 bytes
        for _ in count..5 {
            buffer = buffer
                .checked_mul(85)
                .and_then(|b| b.checked_add(84))
                .ok_or(FilterError::Ascii85("group exceeds 32 bits"))?;
        }
        let bytes = buffer.to_be_bytes();
        output.extend_from_slice(&bytes[..count - 1]);
    }

    Ok(output)
}

fn ascii85_encode(data: &[u8]) -> Vec<u8> {
    let mut output = Vec::with_capacity(data.len() / 4 * 5 + 2);
    for chunk in data.chunks(4) {
        let mut word: u32 = 0;
        for (i, &byte) in chunk.iter().enumerate() {
            word |= (byte as u32) << (8 * (3 - i));
        }
        if chunk.len() == 4 && word == 0 {
            output.push(b'z');
            continue;
        }
        let mut digits = [0_u8; 5];
        for digit in digits.iter_mut().rev() {
            *digit = (word % 85) as u8 + b'!';
            word /= 85;
        }
        output.extend_from_slice(&digits[..chunk.len() + 1]);
    }
    output.extend_from_slice(b"~>");
    output
}

fn ascii_hex_decode(data: &[u8]) -> Result<Vec<u8>> {
    let mut output = Vec::with_capacity(data.len() / 2);
    let mut high = None;

    for &byte in data {
        if byte == b'>' {
            break;
        }
        if is_white_space(byte) {
            continue;
        }
        let nibble = (byte as char)
            .to_digit(16)
            .ok_or(FilterError::AsciiHex("byte outside the hexadecimal alphabet"))? as u8;
        high = match high {
            None => Some(nibble),
            Some(h) => {
                output.push((h << 4) | nibble);
                None
            }
        };
    }

    // an odd trailing digit behaves as if followed by 0
    if let Some(h) = high {
        output.push(h << 4);
    }
    Ok(output)
}

fn ascii_hex_encode(data: &[u8]) -> Vec<u8> {
    const DIGITS: &[u8; 16] = b"0123456789ABCDEF";
    let mut output = Vec::with_capacity(data.len() * 2 + 1);
    for &byte in data {
        output.push(DIGITS[(byte >> 4) as usize]);
        output.push(DIGITS[(byte & 0x0F) as usize]);
    }
    output.push(b'>');
    output
}

fn run_length_decode(data: &[u8]) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    let mut i = 0;

    while i < data.len() {
        let length = data[i];
        i += 1;
        match length {
            128 => break,
            0..=127 => {
                let run = data
                    .get(i..i + length as usize + 1)
                    .ok_or(FilterError::RunLength("literal run is truncated"))?;
                output.extend_from_slice(run);
                i += length as usize + 1;
            }
            _ => {
                let byte = *data.get(i).ok_or(FilterError::RunLength("repeat run is truncated"))?;
                output.resize(output.len() + 257 - length as usize, byte);
                i += 1;
            }
        }
    }
    Ok(output)
}

fn run_length_encode(data: &[u8]) -> Vec<u8> {
    let mut output = Vec::new();
    let mut i = 0;

    while i < data.len() {
        let byte = data[i];
        let mut run = 1;
        while run < 128 && i + run < data.len() && data[i + run] == byte {
            run += 1;
        }
        if run >= 2 {
            output.push((257 - run) as u8);
            output.push(byte);
            i += run;
        } else {
            let start = i;
            i += 1;
            while i - start < 128 && i < data.len() && !(i + 1 < data.len() && data[i] == data[i + 1]) {
                i += 1;
            }
            output.push((i - start - 1) as u8);
            output.extend_from_slice(&data[start..i]);
        }
    }
    output.push(128);
    output
}

/// CCITT data is not decompressed; it is wrapped into a single-strip
/// monochrome TIFF so an image decoder can take over. Group 4 when
/// `/K < 0`, group 3 otherwise.
fn ccitt_fax_wrap(data: &[u8], params: Option<&Dictionary>) -> Vec<u8> {
    let columns = param_i64(params, b"Columns", 1728) as u32;
    let height = param_i64(params, b"Height", 0) as u32;
    let group: u32 = if param_i64(params, b"K", 0) < 0 { 4 } else { 3 };

    // II magic + IFD offset + tag count + 8 tags + next-IFD terminator
    const HEADER_LEN: u32 = 2 + 2 + 4 + 2 + 8 * 12 + 4;

    let mut out = Vec::with_capacity(HEADER_LEN as usize + data.len());
    out.extend_from_slice(b"II");
    out.extend_from_slice(&42_u16.to_le_bytes());
    out.extend_from_slice(&8_u32.to_le_bytes());
    out.extend_from_slice(&8_u16.to_le_bytes());

    let mut tag = |id: u16, kind: u16, value: u32| {
        out.extend_from_slice(&id.to_le_bytes());
        out.extend_from_slice(&kind.to_le_bytes());
        out.extend_from_slice(&1_u32.to_le_bytes());
        out.extend_from_slice(&value.to_le_bytes());
    };
    tag(256, 4, columns); // ImageWidth
    tag(257, 4, height); // ImageLength
    tag(258, 3, 1); // BitsPerSample
    tag(259, 3, group); // Compression
    tag(262, 3, 0); // PhotometricInterpretation: WhiteIsZero
    tag(273, 4, HEADER_LEN); // StripOffsets
    tag(278, 4, height); // RowsPerStrip
    tag(279, 4, data.len() as u32); // StripByteCounts

    out.extend_from_slice(&0_u32.to_le_bytes());
    out.extend_from_slice(data);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary;

    #[test]
    fn ascii85_decodes_the_classic_sample() {
        let input = r#"9jqo^BlbD-BleB1DJ+*+F(f,q/0JhKF<GL>Cj@.4Gp$d7F!,L7@<6@)/0JDEF<G%<+EV:2F!,O<
            DJ+*.@<*K0@<6L(Df-\0Ec5e;DffZ(EZee.Bl.9pF"AGXBPCsi+DGm>@3BB/F*&OCAfu2/AKYi(
            DIb:@FD,*)+C]U=@3BN#EcYf8ATD3s@q?d$AftVqCh[NqF<G:8+EV:.+Cf>-FD5W8ARlolDIal(
            DId<j@<?3r@:F%a+D58'ATD4$Bl@l3De:,-DJs`8ARoFb/0JMK@qB4^F!,R<AKZ&-DfTqBG%G>u
            D.RTpAKYo'+CT/5+Cei#DII?(E,9)oF*2M7/c~>"#;
        let expected = "Man is distinguished, not only by his reason, but by this singular passion from other animals, which is a lust of the mind, that by a perseverance of delight in the continued and indefatigable generation of knowledge, exceeds the short vehemence of any carnal pleasure.";
        let output = ascii85_decode(input.as_bytes()).unwrap();
        assert_eq!(output, expected.as_bytes());
    }

    #[test]
    fn ascii85_four_byte_group() {
        assert_eq!(ascii85_encode(b"Man "), b"9jqo^~>");
        assert_eq!(ascii85_decode(b"9jqo^~>").unwrap(), b"Man ");
    }

    #[test]
    fn ascii85_round_trips_partial_groups() {
        for input in [&b""[..], b"M", b"Ma", b"Man", b"Man M", b"sure."] {
            let encoded = ascii85_encode(input);
            assert_eq!(ascii85_decode(&encoded).unwrap(), input, "input {input:?}");
        }
    }

    #[test]
    fn ascii85_zero_group_shortcut() {
        assert_eq!(ascii85_encode(&[0, 0, 0, 0]), b"z~>");
        assert_eq!(ascii85_decode(b"zz~>").unwrap(), vec![0; 8]);
        assert!(matches!(
            ascii85_decode(b"9jz~>"),
            Err(FilterError::Ascii85(_))
        ));
    }

    #[test]
    fn ascii85_rejects_overflow_and_alien_bytes() {
        assert!(matches!(ascii85_decode(b"uuuuu~>"), Err(FilterError::Ascii85(_))));
        assert!(matches!(ascii85_decode(b"9jqo{~>"), Err(FilterError::Ascii85(_))));
    }

    #[test]
    fn ascii_hex_round_trips() {
        assert_eq!(ascii_hex_encode(b"Hello"), b"48656C6C6F>");
        assert_eq!(ascii_hex_decode(b"48656C6C6F>").unwrap(), b"Hello");
        for input in [&b""[..], b"\x00\xFF", b"any bytes at all \x80"] {
            assert_eq!(ascii_hex_decode(&ascii_hex_encode(input)).unwrap(), input);
        }
    }

    #[test]
    fn ascii_hex_odd_digit_and_white_space() {
        // example from the PDF specification
        assert_eq!(ascii_hex_decode(b"90 1F A>").unwrap(), b"\x90\x1F\xA0");
        assert!(ascii_hex_decode(b"4X>").is_err());
    }

    #[test]
    fn run_length_decodes_literal_and_repeat_runs() {
        let data = [2, b'a', b'b', b'c', 254, b'x', 128];
        assert_eq!(run_length_decode(&data).unwrap(), b"abcxxx");
        assert!(run_length_decode(&[5, b'a']).is_err());
    }

    #[test]
    fn run_length_round_trips() {
        let mut mixed = Vec::new();
        mixed.extend_from_slice(&[7; 300]);
        mixed.extend_from_slice(b"no repeats here");
        mixed.extend_from_slice(&[0; 2]);
        for input in [&b""[..], b"a", b"aaa", b"abab", &mixed] {
            let encoded = run_length_encode(input);
            assert_eq!(run_length_decode(&encoded).unwrap(), input, "input {input:?}");
        }
    }

    #[test]
    fn flate_round_trips_with_every_predictor() {
        let rows: Vec<u8> = (0..120).map(|i| (i * 7) as u8).collect();
        for predictor in [1, 2, 10, 11, 12, 13, 14, 15] {
            let params = dictionary! {
                "Predictor" => predictor,
                "Columns" => 6,
            };
            let encoded = encode(&rows, Filter::Flate, Some(&params)).unwrap();
            let decoded = decode(&encoded, Filter::Flate, Some(&params)).unwrap();
            assert_eq!(decoded, rows, "predictor {predictor}");
        }
    }

    #[test]
    fn flate_with_png_sub_predictor_restores_rows() {
        let rows = [10_u8, 20, 30, 11, 21, 31];
        let params = dictionary! {
            "Predictor" => 11,
            "Columns" => 3,
            "Colors" => 1,
            "BitsPerComponent" => 8,
        };
        let encoded = encode(&rows, Filter::Flate, Some(&params)).unwrap();
        let decoded = decode(&encoded, Filter::Flate, Some(&params)).unwrap();
        assert_eq!(decoded, rows);
    }

    #[test]
    fn lzw_round_trips() {
        let input = b"TOBEORNOTTOBEORTOBEORNOT, and then some more text to grow the table";
        let encoded = encode(input, Filter::Lzw, None).unwrap();
        let decoded = decode(&encoded, Filter::Lzw, None).unwrap();
        assert_eq!(decoded, input);
    }

    #[test]
    fn lzw_rejects_deferred_change() {
        let params = dictionary! {"EarlyChange" => 0};
        assert!(matches!(
            decode(b"\x80\x00", Filter::Lzw, Some(&params)),
            Err(FilterError::Lzw(_))
        ));
    }

    #[test]
    fn ccitt_wrap_builds_a_tiff_container() {
        let params = dictionary! {
            "K" => -1,
            "Columns" => 1728,
            "Height" => 2,
        };
        let payload = [0xAA_u8, 0xBB, 0xCC];
        let out = decode(&payload, Filter::CcittFax, Some(&params)).unwrap();

        assert_eq!(&out[..2], b"II");
        assert_eq!(u16::from_le_bytes([out[2], out[3]]), 42);
        assert_eq!(out.len(), 110 + payload.len());
        assert_eq!(&out[110..], &payload);

        let tag_value = |id: u16| {
            let entry = out[10..106]
                .chunks(12)
                .find(|entry| u16::from_le_bytes([entry[0], entry[1]]) == id)
                .unwrap();
            u32::from_le_bytes([entry[8], entry[9], entry[10], entry[11]])
        };
        assert_eq!(tag_value(259), 4); // group 4 for K = -1
        assert_eq!(tag_value(256), 1728);
        assert_eq!(tag_value(273), 110); // strip starts right after the header
        assert_eq!(tag_value(279), payload.len() as u32);
    }

    #[test]
    fn unsupported_filters_fail_by_name() {
        assert!(matches!(
            decode(b"x", Filter::Jbig2, None),
            Err(FilterError::Unsupported(_))
        ));
        assert!(matches!(
            decode(b"x", Filter::Crypt, None),
            Err(FilterError::Unsupported(_))
        ));
        assert!(Filter::from_name(b"NoSuchDecode").is_err());
    }

    #[test]
    fn passthrough_filters_keep_their_payload() {
        let payload = b"\xFF\xD8\xFF\xE0 jpeg-ish bytes";
        assert_eq!(decode(payload, Filter::Dct, None).unwrap(), payload);
        assert_eq!(decode(payload, Filter::Jpx, None).unwrap(), payload);
    }

    #[test]
    fn short_names_resolve_to_the_same_filters() {
        for (short, long) in [
            (&b"A85"[..], &b"ASCII85Decode"[..]),
            (b"AHx", b"ASCIIHexDecode"),
            (b"CCF", b"CCITTFaxDecode"),
            (b"DCT", b"DCTDecode"),
            (b"Fl", b"FlateDecode"),
            (b"LZW", b"LZWDecode"),
            (b"RL", b"RunLengthDecode"),
        ] {
            assert_eq!(Filter::from_name(short).unwrap(), Filter::from_name(long).unwrap());
        }
    }
}
