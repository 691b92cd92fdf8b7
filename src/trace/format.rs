//! Binary format definitions for sand trace files.

use std::io;

use bytemuck::{Pod, Zeroable};
use log::debug;
use rayon::prelude::*;

/// Size of the particle count header in bytes.
pub const HEADER_SIZE: usize = 8;

/// Size of one encoded point: x, y, z as f64.
pub const RECORD_SIZE: usize = 3 * 8;

/// A single particle position.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Point3D {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3D {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Decode one 24-byte record.
    ///
    /// `record` must be exactly [`RECORD_SIZE`] bytes long.
    fn from_le_bytes(record: &[u8]) -> Self {
        Self {
            x: read_f64(record, 0),
            y: read_f64(record, 8),
            z: read_f64(record, 16),
        }
    }

    fn write_le_bytes(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.x.to_le_bytes());
        out.extend_from_slice(&self.y.to_le_bytes());
        out.extend_from_slice(&self.z.to_le_bytes());
    }
}

#[inline]
fn read_f64(bytes: &[u8], offset: usize) -> f64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[offset..offset + 8]);
    f64::from_le_bytes(buf)
}

/// One time sample: every particle's position, in recorded order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frame {
    points: Vec<Point3D>,
}

impl Frame {
    pub fn new(points: Vec<Point3D>) -> Self {
        Self { points }
    }

    /// Number of particles in this frame.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Point3D] {
        &self.points
    }

    pub fn get(&self, particle: usize) -> Option<&Point3D> {
        self.points.get(particle)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Point3D> {
        self.points.iter()
    }

    /// Interleaved `x, y, z` coordinates, suitable for vertex buffers.
    pub fn coords(&self) -> &[f64] {
        bytemuck::cast_slice(&self.points)
    }

    /// Axis-aligned bounds as `(min, max)`, or `None` for an empty frame.
    pub fn bounds(&self) -> Option<(Point3D, Point3D)> {
        let first = *self.points.first()?;
        Some(self.points[1..].iter().fold((first, first), |(lo, hi), p| {
            (
                Point3D::new(lo.x.min(p.x), lo.y.min(p.y), lo.z.min(p.z)),
                Point3D::new(hi.x.max(p.x), hi.y.max(p.y), hi.z.max(p.z)),
            )
        }))
    }
}

impl<'a> IntoIterator for &'a Frame {
    type Item = &'a Point3D;
    type IntoIter = std::slice::Iter<'a, Point3D>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

/// A fully decoded trace: every frame holds exactly `sand_num` points.
#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    sand_num: u64,
    frames: Vec<Frame>,
}

impl Trace {
    /// Build a trace from already decoded frames.
    pub fn from_frames(sand_num: u64, frames: Vec<Frame>) -> Result<Self, TraceError> {
        if sand_num == 0 {
            return Err(TraceError::InvalidFrameSize);
        }
        if let Some((frame, f)) = frames
            .iter()
            .enumerate()
            .find(|(_, f)| f.len() as u64 != sand_num)
        {
            return Err(TraceError::FrameLength {
                frame,
                expected: sand_num,
                actual: f.len(),
            });
        }
        Ok(Self { sand_num, frames })
    }

    /// Particles per frame, as read from the header.
    pub fn sand_num(&self) -> u64 {
        self.sand_num
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frame(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Encoded size of one frame in bytes, if representable.
    pub fn frame_stride(&self) -> Option<usize> {
        frame_stride(self.sand_num)
    }
}

/// Errors raised while decoding a trace.
#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    #[error("Trace is {len} bytes, shorter than the 8-byte particle count header")]
    Malformed { len: usize },
    #[error("Trace header declares zero particles per frame")]
    InvalidFrameSize,
    #[error("Frame {frame} has {actual} points, expected {expected}")]
    FrameLength {
        frame: usize,
        expected: u64,
        actual: usize,
    },
    #[error("Failed to read trace: {0}")]
    Io(#[from] io::Error),
}

/// Parse the particle count from the start of a trace.
pub(crate) fn parse_header(bytes: &[u8]) -> Result<u64, TraceError> {
    if bytes.len() < HEADER_SIZE {
        return Err(TraceError::Malformed { len: bytes.len() });
    }
    let mut buf = [0u8; HEADER_SIZE];
    buf.copy_from_slice(&bytes[..HEADER_SIZE]);
    match u64::from_le_bytes(buf) {
        0 => Err(TraceError::InvalidFrameSize),
        sand_num => Ok(sand_num),
    }
}

/// Bytes per frame, or `None` when `sand_num * 24` does not fit in memory
/// addressing (no such frame can ever be complete).
pub(crate) fn frame_stride(sand_num: u64) -> Option<usize> {
    usize::try_from(sand_num).ok()?.checked_mul(RECORD_SIZE)
}

/// Decode one complete frame window.
pub(crate) fn decode_frame(window: &[u8]) -> Frame {
    Frame::new(
        window
            .chunks_exact(RECORD_SIZE)
            .map(Point3D::from_le_bytes)
            .collect(),
    )
}

/// Decode a complete trace held in memory.
///
/// A trailing window shorter than one frame is dropped without error.
pub fn decode(bytes: &[u8]) -> Result<Trace, TraceError> {
    let sand_num = parse_header(bytes)?;
    let payload = &bytes[HEADER_SIZE..];

    let Some(stride) = frame_stride(sand_num) else {
        debug!("Frame stride for {sand_num} particles overflows, no complete frames");
        return Ok(Trace {
            sand_num,
            frames: Vec::new(),
        });
    };

    let trailing = payload.len() % stride;
    if trailing > 0 {
        debug!("Dropping {trailing} trailing bytes (partial frame)");
    }

    let frames: Vec<Frame> = payload.par_chunks_exact(stride).map(decode_frame).collect();

    debug!(
        "Decoded {} frames of {} particles ({} bytes/frame)",
        frames.len(),
        sand_num,
        stride
    );

    Ok(Trace { sand_num, frames })
}

/// Encode a trace in the recorder's layout.
pub fn encode(trace: &Trace) -> Vec<u8> {
    let points: usize = trace.frames.iter().map(Frame::len).sum();
    let mut bytes = Vec::with_capacity(HEADER_SIZE + points * RECORD_SIZE);
    bytes.extend_from_slice(&trace.sand_num.to_le_bytes());
    for point in trace.frames.iter().flat_map(Frame::iter) {
        point.write_le_bytes(&mut bytes);
    }
    bytes
}
