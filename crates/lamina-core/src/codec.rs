//! Record codec.
//!
//! Record payloads are opaque to the engine; the contract is a
//! deterministic byte round-trip plus bounded row sizes. CBOR keeps rows
//! self-describing without a schema artifact. The codec enforces its row
//! ceiling in both directions: an oversized record is refused before it
//! ever reaches a transaction, and an oversized or poisoned row read back
//! from storage surfaces as data corruption instead of unwinding into the
//! store.

use crate::error::Error;
use serde::{Serialize, de::DeserializeOwned};
use std::panic::{AssertUnwindSafe, catch_unwind};

/// Default per-row ceiling. Rows must stay far below the driver's 10 MB
/// transaction limit or a single save could exhaust a whole transaction.
pub const DEFAULT_MAX_RECORD_BYTES: usize = 1024 * 1024;

///
/// RecordCodec
///
/// One codec per store; the row ceiling is the only knob.
///

#[derive(Clone, Copy, Debug)]
pub struct RecordCodec {
    max_record_bytes: usize,
}

impl Default for RecordCodec {
    fn default() -> Self {
        Self {
            max_record_bytes: DEFAULT_MAX_RECORD_BYTES,
        }
    }
}

impl RecordCodec {
    #[must_use]
    pub const fn with_max_record_bytes(max_record_bytes: usize) -> Self {
        Self { max_record_bytes }
    }

    #[must_use]
    pub const fn max_record_bytes(&self) -> usize {
        self.max_record_bytes
    }

    /// Serialize a record into row bytes, refusing rows over the ceiling.
    pub fn encode<R>(&self, record: &R) -> Result<Vec<u8>, Error>
    where
        R: Serialize,
    {
        let bytes =
            serde_cbor::to_vec(record).map_err(|e| Error::SerializationFailed(e.to_string()))?;

        if bytes.len() > self.max_record_bytes {
            return Err(Error::SerializationFailed(format!(
                "record encodes to {} bytes, over the {}-byte row ceiling",
                bytes.len(),
                self.max_record_bytes
            )));
        }
        Ok(bytes)
    }

    /// Decode one stored row back into a record.
    ///
    /// A row that is empty, over the ceiling, malformed, or that trips a
    /// decoder panic is reported as corrupt; no panic escapes into the
    /// store's transaction handling.
    pub fn decode<R>(&self, bytes: &[u8]) -> Result<R, Error>
    where
        R: DeserializeOwned,
    {
        if bytes.is_empty() {
            return Err(corrupt_row("row is empty"));
        }
        if bytes.len() > self.max_record_bytes {
            return Err(corrupt_row(format!(
                "row of {} bytes exceeds the {}-byte ceiling",
                bytes.len(),
                self.max_record_bytes
            )));
        }

        match catch_unwind(AssertUnwindSafe(|| serde_cbor::from_slice::<R>(bytes))) {
            Ok(Ok(record)) => Ok(record),
            Ok(Err(err)) => Err(corrupt_row(format!("row failed to decode: {err}"))),
            Err(_) => Err(corrupt_row("row tripped a decoder panic")),
        }
    }
}

fn corrupt_row(detail: impl Into<String>) -> Error {
    Error::InvalidSerializedData(format!("corrupt record row: {}", detail.into()))
}
