//! Trace loading from disk and streaming frame reads.

use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::Path;

use log::{debug, info};

use super::format::{
    Frame, HEADER_SIZE, Trace, TraceError, decode, decode_frame, frame_stride, parse_header,
};

/// Read and decode a whole trace file in one pass.
pub fn load<P: AsRef<Path>>(path: P) -> Result<Trace, TraceError> {
    let path = path.as_ref();
    let bytes = fs::read(path)?;
    let trace = decode(&bytes)?;
    info!(
        "Loaded {} frames of {} particles from {}",
        trace.frame_count(),
        trace.sand_num(),
        path.display()
    );
    Ok(trace)
}

/// Streaming trace reader.
///
/// Decodes one frame at a time instead of materializing the whole file.
///
/// Usage:
/// ```ignore
/// let reader = TraceReader::open("sand.dat")?;
/// for frame in reader.frames() {
///     let frame = frame?;
///     // Use frame...
/// }
/// ```
pub struct TraceReader<R> {
    reader: R,
    sand_num: u64,
    stride: Option<usize>,
    frames_read: usize,
    finished: bool,
    /// Reused read buffer for one frame window.
    buffer: Vec<u8>,
}

impl TraceReader<BufReader<File>> {
    /// Open a trace file for streaming.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, TraceError> {
        let file = File::open(path)?;
        Self::new(BufReader::new(file))
    }
}

impl<R: Read> TraceReader<R> {
    /// Read the header from `reader` and prepare to stream frames.
    pub fn new(mut reader: R) -> Result<Self, TraceError> {
        let mut header = Vec::with_capacity(HEADER_SIZE);
        reader
            .by_ref()
            .take(HEADER_SIZE as u64)
            .read_to_end(&mut header)?;
        let sand_num = parse_header(&header)?;

        Ok(Self {
            reader,
            sand_num,
            stride: frame_stride(sand_num),
            frames_read: 0,
            finished: false,
            buffer: Vec::new(),
        })
    }

    /// Particles per frame.
    pub fn sand_num(&self) -> u64 {
        self.sand_num
    }

    /// Number of complete frames returned so far.
    pub fn frames_read(&self) -> usize {
        self.frames_read
    }

    /// Read the next complete frame, or `None` once the data runs out.
    pub fn read_frame(&mut self) -> Result<Option<Frame>, TraceError> {
        if self.finished {
            return Ok(None);
        }
        let Some(stride) = self.stride else {
            self.finished = true;
            return Ok(None);
        };

        // Grows with the data actually present, so a bogus header cannot
        // force a huge allocation up front.
        self.buffer.clear();
        self.reader
            .by_ref()
            .take(stride as u64)
            .read_to_end(&mut self.buffer)?;

        if self.buffer.len() < stride {
            if !self.buffer.is_empty() {
                debug!(
                    "Dropping {} trailing bytes after frame {}",
                    self.buffer.len(),
                    self.frames_read
                );
            }
            self.finished = true;
            return Ok(None);
        }

        self.frames_read += 1;
        Ok(Some(decode_frame(&self.buffer)))
    }

    /// Consume the reader as an iterator over its frames.
    pub fn frames(self) -> FrameIterator<R> {
        FrameIterator { reader: self }
    }

    /// Read every remaining frame into a [`Trace`].
    pub fn collect_trace(self) -> Result<Trace, TraceError> {
        let sand_num = self.sand_num;
        let frames = self.frames().collect::<Result<Vec<_>, _>>()?;
        Trace::from_frames(sand_num, frames)
    }
}

/// Lazy, finite, non-restartable iterator over trace frames.
pub struct FrameIterator<R> {
    reader: TraceReader<R>,
}

impl<R: Read> Iterator for FrameIterator<R> {
    type Item = Result<Frame, TraceError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.reader.read_frame() {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => None,
            Err(e) => {
                self.reader.finished = true;
                Some(Err(e))
            }
        }
    }
}

impl<R: Read> std::iter::FusedIterator for FrameIterator<R> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::{Point3D, encode};
    use std::io::Cursor;
    use tempfile::tempdir;

    fn test_trace(sand_num: u64, frame_count: usize) -> Trace {
        let frames = (0..frame_count)
            .map(|f| {
                Frame::new(
                    (0..sand_num)
                        .map(|p| Point3D::new(f as f64, p as f64, (f * 10) as f64 - p as f64))
                        .collect(),
                )
            })
            .collect();
        Trace::from_frames(sand_num, frames).unwrap()
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".dat");

        let trace = test_trace(3, 4);
        fs::write(&path, encode(&trace)).unwrap();

        let loaded = load(&path).unwrap();
        assert_eq!(loaded, trace);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let err = load(dir.path().join("missing.dat")).unwrap_err();
        assert!(matches!(err, TraceError::Io(_)));
    }

    #[test]
    fn test_streaming_matches_decode() {
        let mut bytes = encode(&test_trace(5, 6));
        bytes.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7]);

        let streamed = TraceReader::new(Cursor::new(&bytes))
            .unwrap()
            .collect_trace()
            .unwrap();
        assert_eq!(streamed, decode(&bytes).unwrap());
        assert_eq!(streamed.frame_count(), 6);
    }

    #[test]
    fn test_streaming_iterator_is_finite() {
        let bytes = encode(&test_trace(2, 3));
        let reader = TraceReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.sand_num(), 2);

        let mut frames = reader.frames();
        for _ in 0..3 {
            assert!(frames.next().unwrap().is_ok());
        }
        assert!(frames.next().is_none());
        assert!(frames.next().is_none());
    }

    #[test]
    fn test_streaming_header_errors() {
        let err = TraceReader::new(Cursor::new(vec![0u8; 5])).err().unwrap();
        assert!(matches!(err, TraceError::Malformed { len: 5 }));

        let err = TraceReader::new(Cursor::new(0u64.to_le_bytes())).err().unwrap();
        assert!(matches!(err, TraceError::InvalidFrameSize));
    }

    #[test]
    fn test_open_reads_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stream.dat");
        fs::write(&path, encode(&test_trace(4, 2))).unwrap();

        let mut reader = TraceReader::open(&path).unwrap();
        assert!(reader.read_frame().unwrap().is_some());
        assert!(reader.read_frame().unwrap().is_some());
        assert!(reader.read_frame().unwrap().is_none());
        assert_eq!(reader.frames_read(), 2);
    }
}
