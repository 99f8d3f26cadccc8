//! In-memory response buffer with all-or-nothing error override
//!
//! The handler writes the whole body here and the transport flushes it once.
//! A failure after partial writes replaces the buffer with an error envelope,
//! so the client sees either a complete array or a complete error object.

use bytes::{Bytes, BytesMut};

use crate::{
    application::{ApplicationError, dto::ErrorEnvelope},
    domain::TraceId,
};

/// Growable byte sink owned by the merge stage of one request
#[derive(Debug)]
pub struct ResponseAccumulator {
    trace_id: TraceId,
    buffer: BytesMut,
    status: u16,
    error: Option<ApplicationError>,
}

impl ResponseAccumulator {
    /// Empty buffer with status 200
    pub fn new(trace_id: TraceId) -> Self {
        Self {
            trace_id,
            buffer: BytesMut::new(),
            status: 200,
            error: None,
        }
    }

    /// Buffer holding only the envelope for `err`
    pub fn failed(trace_id: TraceId, err: &ApplicationError) -> Self {
        let mut acc = Self::new(trace_id);
        acc.write_error(err);
        acc
    }

    /// Reserve room for `additional` more bytes. Zero is ignored.
    pub fn grow(&mut self, additional: usize) {
        if additional > 0 {
            self.buffer.reserve(additional);
        }
    }

    /// Append bytes; returns the running byte count.
    ///
    /// Writes after [`write_error`](Self::write_error) are dropped.
    pub fn write(&mut self, bytes: &[u8]) -> usize {
        if self.error.is_none() {
            self.buffer.extend_from_slice(bytes);
        }
        self.buffer.len()
    }

    /// Append a string; returns the running byte count
    pub fn write_str(&mut self, s: &str) -> usize {
        self.write(s.as_bytes())
    }

    /// Status applied at flush
    pub fn write_header(&mut self, status: u16) {
        if self.error.is_none() {
            self.status = status;
        }
    }

    /// Discard everything buffered and make the envelope for `err` the body
    pub fn write_error(&mut self, err: &ApplicationError) {
        self.buffer.clear();
        self.status = err.status();
        self.buffer
            .extend_from_slice(&ErrorEnvelope::new(self.trace_id, err).to_bytes());
        self.error = Some(err.clone());
    }

    /// Correlation id of the request
    pub fn trace_id(&self) -> TraceId {
        self.trace_id
    }

    /// Status to send
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Error that replaced the body, if any
    pub fn error(&self) -> Option<&ApplicationError> {
        self.error.as_ref()
    }

    /// Whether the body is an error envelope
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Bytes currently buffered
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Nothing buffered
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Reserved capacity
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Hand the body to the transport
    pub fn into_parts(self) -> (u16, TraceId, Bytes) {
        (self.status, self.trace_id, self.buffer.freeze())
    }
}
