//! PNG filter-type row codec and the TIFF horizontal predictor, used to
//! reverse `/Predictor` settings after FlateDecode and LZWDecode.

use crate::error::FilterError;
use std::mem;

type Result<T> = std::result::Result<T, FilterError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterType {
    None = 0,
    Sub = 1,
    Up = 2,
    Avg = 3,
    Paeth = 4,
}

impl FilterType {
    pub fn from_u8(n: u8) -> Option<FilterType> {
        match n {
            0 => Some(FilterType::None),
            1 => Some(FilterType::Sub),
            2 => Some(FilterType::Up),
            3 => Some(FilterType::Avg),
            4 => Some(FilterType::Paeth),
            _ => None,
        }
    }
}

fn paeth_predict(left: u8, above: u8, upperleft: u8) -> u8 {
    let expand_left = left as i16;
    let expand_above = above as i16;
    let expand_upperleft = upperleft as i16;

    let initial_estimate = expand_left + expand_above - expand_upperleft;

    let dist_left = (initial_estimate - expand_left).abs();
    let dist_above = (initial_estimate - expand_above).abs();
    let dist_upperleft = (initial_estimate - expand_upperleft).abs();

    if dist_left <= dist_above && dist_left <= dist_upperleft {
        left
    } else if dist_above <= dist_upperleft {
        above
    } else {
        upperleft
    }
}

pub fn decode_row(filter: FilterType, bpp: usize, previous: &[u8], current: &mut [u8]) {
    use self::FilterType::*;
    let len = current.len();

    match filter {
        None => (),
        Sub => {
            for i in bpp..len {
                current[i] = current[i].wrapping_add(current[i - bpp]);
            }
        }
        Up => {
            for i in 0..len {
                current[i] = current[i].wrapping_add(previous[i]);
            }
        }
        Avg => {
            for i in 0..bpp.min(len) {
                current[i] = current[i].wrapping_add(previous[i] / 2);
            }

            for i in bpp..len {
                current[i] = current[i].wrapping_add(((current[i - bpp] as i16 + previous[i] as i16) / 2) as u8);
            }
        }
        Paeth => {
            for i in 0..bpp.min(len) {
                current[i] = current[i].wrapping_add(paeth_predict(0, previous[i], 0));
            }

            for i in bpp..len {
                current[i] = current[i].wrapping_add(paeth_predict(current[i - bpp], previous[i], previous[i - bpp]));
            }
        }
    }
}

pub fn encode_row(method: FilterType, bpp: usize, previous: &[u8], current: &mut [u8]) {
    use self::FilterType::*;
    let len = current.len();

    match method {
        None => (),
        Sub => {
            for i in (bpp..len).rev() {
                current[i] = current[i].wrapping_sub(current[i - bpp]);
            }
        }
        Up => {
            for i in 0..len {
                current[i] = current[i].wrapping_sub(previous[i]);
            }
        }
        Avg => {
            for i in (bpp..len).rev() {
                current[i] = current[i].wrapping_sub(((current[i - bpp] as i16 + previous[i] as i16) / 2) as u8);
            }

            for i in 0..bpp.min(len) {
                current[i] = current[i].wrapping_sub(previous[i] / 2);
            }
        }
        Paeth => {
            for i in (bpp..len).rev() {
                current[i] = current[i].wrapping_sub(paeth_predict(current[i - bpp], previous[i], previous[i - bpp]));
            }

            for i in 0..bpp.min(len) {
                current[i] = current[i].wrapping_sub(paeth_predict(0, previous[i], 0));
            }
        }
    }
}

/// Reverse row prediction over a whole block.
///
/// PNG predictors (10..=15) expect `rows * (columns + 1)` bytes, each row
/// led by its filter byte; the TIFF predictor (2) expects bare
/// `rows * columns` bytes. Output is the reconstructed rows without filter
/// bytes.
pub fn decode_frame(content: &[u8], predictor: i64, bpp: usize, columns: usize) -> Result<Vec<u8>> {
    match predictor {
        1 => Ok(content.to_vec()),
        2 => {
            let mut decoded = content.to_vec();
            for row in each_row_mut(&mut decoded, columns)? {
                tiff_decode_row(bpp, row);
            }
            Ok(decoded)
        }
        10..=15 => {
            let stride = columns + 1;
            if columns == 0 || content.len() % stride != 0 {
                return Err(FilterError::Predictor("input is not a whole number of rows"));
            }
            let mut previous = vec![0_u8; columns];
            let mut current = vec![0_u8; columns];
            let mut decoded = Vec::with_capacity(content.len() / stride * columns);
            for row in content.chunks(stride) {
                let filter =
                    FilterType::from_u8(row[0]).ok_or(FilterError::Predictor("invalid PNG filter type"))?;
                current.copy_from_slice(&row[1..]);
                decode_row(filter, bpp, &previous, &mut current);
                decoded.extend_from_slice(&current);
                mem::swap(&mut previous, &mut current);
            }
            Ok(decoded)
        }
        _ => Err(FilterError::Predictor("unsupported predictor value")),
    }
}

/// Apply row prediction over a whole block; the inverse of
/// [`decode_frame`] for the same parameters.
pub fn encode_frame(content: &[u8], predictor: i64, bpp: usize, columns: usize) -> Result<Vec<u8>> {
    match predictor {
        1 => Ok(content.to_vec()),
        2 => {
            let mut encoded = content.to_vec();
            for row in each_row_mut(&mut encoded, columns)? {
                tiff_encode_row(bpp, row);
            }
            Ok(encoded)
        }
        10..=15 => {
            // predictor 15 ("optimum") is free to pick any row filter
            let method = FilterType::from_u8((predictor - 10).min(4) as u8)
                .ok_or(FilterError::Predictor("unsupported predictor value"))?;
            if columns == 0 || content.len() % columns != 0 {
                return Err(FilterError::Predictor("input is not a whole number of rows"));
            }
            let mut previous = vec![0_u8; columns];
            let mut current = vec![0_u8; columns];
            let mut encoded = Vec::with_capacity(content.len() / columns * (columns + 1));
            for row in content.chunks(columns) {
                current.copy_from_slice(row);
                encode_row(method, bpp, &previous, &mut current);
                encoded.push(method as u8);
                encoded.extend_from_slice(&current);
                previous.copy_from_slice(row);
            }
            Ok(encoded)
        }
        _ => Err(FilterError::Predictor("unsupported predictor value")),
    }
}

fn each_row_mut(content: &mut [u8], columns: usize) -> Result<std::slice::ChunksMut<u8>> {
    if columns == 0 || content.len() % columns != 0 {
        return Err(FilterError::Predictor("input is not a whole number of rows"));
    }
    Ok(content.chunks_mut(columns))
}

fn tiff_decode_row(bpp: usize, current: &mut [u8]) {
    for i in bpp..current.len() {
        current[i] = current[i].wrapping_add(current[i - bpp]);
    }
}

fn tiff_encode_row(bpp: usize, current: &mut [u8]) {
    for i in (bpp..current.len()).rev() {
        current[i] = current[i].wrapping_sub(current[i - bpp]);
    }
}
