use std::io::{self, Write};

use byteorder::{ByteOrder, NativeEndian};
use log::{debug, info};

use crate::{
    auth::restage,
    channel::Transport,
    error::{Result, SessionError},
    files::{ResultSink, VectorBatch},
};

// Counts and values travel in host byte order. The server is built for the same
// host layout, network order would break it.
pub const COUNT_WIDTH: usize = std::mem::size_of::<u32>();
pub const VALUE_WIDTH: usize = std::mem::size_of::<f64>();

pub fn encode_count(count: u32) -> [u8; COUNT_WIDTH] {
    let mut buf = [0; COUNT_WIDTH];
    NativeEndian::write_u32(&mut buf, count);
    buf
}

pub fn encode_value(value: f64) -> [u8; VALUE_WIDTH] {
    let mut buf = [0; VALUE_WIDTH];
    NativeEndian::write_f64(&mut buf, value);
    buf
}

pub fn decode_value(bytes: &[u8; VALUE_WIDTH]) -> f64 {
    NativeEndian::read_f64(bytes)
}

fn wire_count(len: usize, what: &'static str) -> Result<u32> {
    u32::try_from(len).map_err(|_| {
        SessionError::network(
            what,
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{len} does not fit the 4 byte count field"),
            ),
        )
    })
}

/// Read until one full result value is assembled.
fn receive_value<T: Transport>(transport: &mut T) -> Result<f64> {
    let mut buf = [0; VALUE_WIDTH];
    let mut filled = 0;
    while filled < VALUE_WIDTH {
        let chunk = transport.receive(VALUE_WIDTH - filled)?;
        if chunk.is_empty() {
            return Err(SessionError::network(
                "receiving result",
                io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("result ended after {filled} of {VALUE_WIDTH} bytes"),
                ),
            ));
        }
        buf[filled..filled + chunk.len()].copy_from_slice(&chunk);
        filled += chunk.len();
    }
    Ok(decode_value(&buf))
}

/// Send the whole batch and collect one result per vector, in order.
///
/// Each result is written to `sink` before the next vector is sent. The first failure stops the batch, nothing further is sent.
pub fn stream_batch<T, W>(
    transport: &mut T,
    batch: &VectorBatch,
    sink: &mut ResultSink<W>,
) -> Result<Vec<f64>>
where
    T: Transport,
    W: Write,
{
    let count = wire_count(batch.len(), "encoding vector count")?;
    transport
        .send(&encode_count(count))
        .map_err(|e| restage(e, "sending vector count"))?;
    debug!("Announced {count} vectors");

    let mut results = Vec::with_capacity(batch.len());
    for (i, vector) in batch.vectors().iter().enumerate() {
        let size = wire_count(vector.len(), "encoding vector size")?;
        transport
            .send(&encode_count(size))
            .map_err(|e| restage(e, "sending vector size"))?;

        for value in vector.values() {
            transport
                .send(&encode_value(*value))
                .map_err(|e| restage(e, "sending vector element"))?;
        }

        let result = receive_value(transport).map_err(|e| restage(e, "receiving result"))?;
        info!("Vector {i} ({size} values) -> {result}");
        sink.record(result)?;
        results.push(result);
    }

    Ok(results)
}
