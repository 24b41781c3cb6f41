//! JSON bodies for the two uplink topics.
//!
//! Field names and array lengths are what the dashboard consumes:
//! `bp_data` carries the raw PPG window, `stress_data` the 64 Hz PPG view
//! plus the temperature window.

use serde::{Serialize, Serializer};

use crate::config::PAYLOAD_CAPACITY;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PayloadError {
    /// Body did not fit the payload buffer.
    Overflow,
}

impl From<serde_json_core::ser::Error> for PayloadError {
    fn from(_: serde_json_core::ser::Error) -> Self {
        Self::Overflow
    }
}

/// `{"device_id":..,"timestamp":..,"ppg":[..]}`
#[derive(Debug, Serialize)]
pub struct BpPayload<'a> {
    pub device_id: &'a str,
    pub timestamp: u64,
    pub ppg: &'a [i32],
}

/// `{"device_id":..,"timestamp":..,"ppg":[..],"temperature":[..]}`
#[derive(Debug, Serialize)]
pub struct StressPayload<'a> {
    pub device_id: &'a str,
    pub timestamp: u64,
    pub ppg: &'a [i32],
    #[serde(serialize_with = "finite_or_null")]
    pub temperature: &'a [f32],
}

// JSON has no NaN or infinity
fn finite_or_null<S: Serializer>(values: &&[f32], s: S) -> Result<S::Ok, S::Error> {
    s.collect_seq(values.iter().map(|v| v.is_finite().then_some(*v)))
}

/// Fixed buffer the encoded body lives in until the transport has taken it.
pub struct PayloadBuf<const N: usize = PAYLOAD_CAPACITY> {
    bytes: [u8; N],
    len: usize,
}

impl<const N: usize> PayloadBuf<N> {
    pub const fn new() -> Self {
        Self {
            bytes: [0; N],
            len: 0,
        }
    }

    /// Replace the buffer contents with `payload` as JSON. On overflow the
    /// buffer is left empty.
    pub fn encode<P: Serialize>(&mut self, payload: &P) -> Result<usize, PayloadError> {
        self.len = 0;
        self.len = serde_json_core::to_slice(payload, &mut self.bytes)?;
        Ok(self.len)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<const N: usize> Default for PayloadBuf<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DECIMATED_LEN, DEVICE_ID, PPG_CAPACITY, TEMP_CAPACITY};

    fn text<const N: usize>(buf: &PayloadBuf<N>) -> &str {
        core::str::from_utf8(buf.as_bytes()).unwrap()
    }

    #[test]
    fn bp_body_layout() {
        let mut buf = PayloadBuf::<256>::new();
        let payload = BpPayload {
            device_id: "dev",
            timestamp: 1234,
            ppg: &[1, -2, 3],
        };
        buf.encode(&payload).unwrap();
        assert_eq!(
            text(&buf),
            r#"{"device_id":"dev","timestamp":1234,"ppg":[1,-2,3]}"#
        );
    }

    #[test]
    fn stress_body_layout() {
        let mut buf = PayloadBuf::<256>::new();
        let payload = StressPayload {
            device_id: "dev",
            timestamp: 9,
            ppg: &[5, 6],
            temperature: &[36.5, 37.25, f32::NAN],
        };
        let n = buf.encode(&payload).unwrap();
        assert_eq!(n, buf.len());
        assert_eq!(
            text(&buf),
            r#"{"device_id":"dev","timestamp":9,"ppg":[5,6],"temperature":[36.5,37.25,null]}"#
        );
    }

    #[test]
    fn device_id_is_escaped() {
        let mut buf = PayloadBuf::<64>::new();
        let payload = BpPayload {
            device_id: "a\"b",
            timestamp: 0,
            ppg: &[],
        };
        buf.encode(&payload).unwrap();
        assert!(text(&buf).starts_with(r#"{"device_id":"a\"b","#));
        assert!(text(&buf).ends_with(r#""ppg":[]}"#));
    }

    #[test]
    fn full_windows_fit_the_payload_buffer() {
        let mut buf = PayloadBuf::<PAYLOAD_CAPACITY>::new();
        let ppg = [-2_000_000_000i32; PPG_CAPACITY];
        buf.encode(&BpPayload {
            device_id: DEVICE_ID,
            timestamp: u64::MAX,
            ppg: &ppg,
        })
        .unwrap();

        let view = [-2_000_000_000i32; DECIMATED_LEN];
        let temp = [-12.345_678f32; TEMP_CAPACITY];
        buf.encode(&StressPayload {
            device_id: DEVICE_ID,
            timestamp: u64::MAX,
            ppg: &view,
            temperature: &temp,
        })
        .unwrap();
    }

    #[test]
    fn overflow_is_reported_and_leaves_buffer_empty() {
        let mut tiny = PayloadBuf::<16>::new();
        let payload = BpPayload {
            device_id: "dev",
            timestamp: 0,
            ppg: &[1, 2, 3, 4, 5],
        };
        assert_eq!(tiny.encode(&payload), Err(PayloadError::Overflow));
        assert!(tiny.is_empty());
    }
}
