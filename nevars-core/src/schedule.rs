//! Schedule table decoder
//!
//! Schedule objects answer with a list of fixed-width fields such as
//! `0731010102`. Each field is a run of decimal pairs: the groups look like
//! hex but the meter encodes them in base 10. All-zero fields mark unused
//! slots and are skipped.

use tracing::trace;

use nevars_types::ScheduleRecord;

use crate::error::{Error, Result};

/// Width of one group in every schedule table the meters report
pub const GROUP_WIDTH: usize = 2;

/// Split schedule fields into groups of `field_width` decimal digits
///
/// Returns one `Vec` of `arity` values per non-zero field, in input order.
///
/// # Examples
///
/// ```
/// use nevars_core::schedule::decode_schedule_table;
///
/// let rows = decode_schedule_table(&["0731010102", "0000000000"], 2, 5).unwrap();
/// assert_eq!(rows, vec![vec![7, 31, 1, 1, 2]]);
/// ```
pub fn decode_schedule_table<S: AsRef<str>>(
    fields: &[S],
    field_width: usize,
    arity: usize,
) -> Result<Vec<Vec<u32>>> {
    if field_width == 0 || arity == 0 {
        return Err(Error::InvalidFrameRequest(format!(
            "invalid schedule layout: width={} arity={}",
            field_width, arity
        )));
    }

    let expected_len = field_width * arity;
    let mut rows = Vec::with_capacity(fields.len());

    for field in fields {
        let field = field.as_ref();

        if field.len() != expected_len {
            return Err(Error::malformed(
                format!(
                    "schedule field length {} (expected {})",
                    field.len(),
                    expected_len
                ),
                field.as_bytes(),
            ));
        }
        if !field.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::malformed(
                "schedule field is not decimal",
                field.as_bytes(),
            ));
        }

        if field.bytes().all(|b| b == b'0') {
            trace!("Skipping unused schedule slot");
            continue;
        }

        let row = field
            .as_bytes()
            .chunks(field_width)
            .map(|group| {
                group
                    .iter()
                    .try_fold(0u32, |acc, d| {
                        acc.checked_mul(10)?.checked_add(u32::from(d - b'0'))
                    })
                    .ok_or_else(|| Error::malformed("schedule group out of range", group))
            })
            .collect::<Result<Vec<u32>>>()?;
        rows.push(row);
    }

    Ok(rows)
}

/// Decode schedule fields into typed records
pub fn decode_records<R: ScheduleRecord, S: AsRef<str>>(fields: &[S]) -> Result<Vec<R>> {
    decode_schedule_table(fields, GROUP_WIDTH, R::ARITY)?
        .iter()
        .map(|groups| {
            R::from_groups(groups).map_err(|e| Error::MalformedFrame {
                reason: e.to_string(),
                raw: format!("{:?}", groups),
            })
        })
        .collect()
}
