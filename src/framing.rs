//! Exact-length transfers over a byte stream
//!
//! `send_exact` and `recv_exact` loop over short reads/writes until the whole
//! buffer has moved. Interrupted calls are resumed; every other failure is
//! classified via [`crate::error::classify`].

use crate::error::{classify, LocalReason, TransferError};
use crate::protocol::{decode_u32, encode_u32, LEN_PREFIX_BYTES};
use std::io::{ErrorKind, Read, Write};

pub type TransferResult<T> = Result<T, TransferError>;

/// Write all of `buf`. An empty buffer performs no I/O.
pub fn send_exact<W: Write + ?Sized>(w: &mut W, buf: &[u8]) -> TransferResult<()> {
    let mut sent = 0usize;
    while sent < buf.len() {
        match w.write(&buf[sent..]) {
            Ok(0) => return Err(TransferError::ConnectionLocal(LocalReason::BrokenPipe)),
            Ok(n) => sent += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(classify(e)),
        }
    }
    Ok(())
}

/// Fill all of `buf`. A zero-byte read before the buffer is full means the
/// peer closed early, which is always a connection-local error.
pub fn recv_exact<R: Read + ?Sized>(r: &mut R, buf: &mut [u8]) -> TransferResult<()> {
    let expected = buf.len();
    let mut received = 0usize;
    while received < expected {
        match r.read(&mut buf[received..]) {
            Ok(0) => {
                return Err(TransferError::ConnectionLocal(LocalReason::PeerClosed {
                    transferred: received,
                    expected,
                }))
            }
            Ok(n) => received += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(classify(e)),
        }
    }
    Ok(())
}

pub fn send_u32<W: Write + ?Sized>(w: &mut W, value: u32) -> TransferResult<()> {
    send_exact(w, &encode_u32(value))
}

pub fn recv_u32<R: Read + ?Sized>(r: &mut R) -> TransferResult<u32> {
    let mut field = [0u8; LEN_PREFIX_BYTES];
    recv_exact(r, &mut field)?;
    Ok(decode_u32(&field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io;

    /// One scripted result per call: `Ok(n)` moves at most n bytes
    enum Step {
        Chunk(usize),
        Fail(io::ErrorKind),
    }

    struct ScriptedStream {
        data: Vec<u8>,
        pos: usize,
        script: VecDeque<Step>,
        written: Vec<u8>,
    }

    impl ScriptedStream {
        fn new(data: &[u8], script: Vec<Step>) -> Self {
            Self {
                data: data.to_vec(),
                pos: 0,
                script: script.into(),
                written: Vec::new(),
            }
        }
    }

    impl Read for ScriptedStream {
        fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
            let limit = match self.script.pop_front() {
                Some(Step::Chunk(n)) => n,
                Some(Step::Fail(kind)) => return Err(io::Error::from(kind)),
                None => usize::MAX,
            };
            let n = limit.min(out.len()).min(self.data.len() - self.pos);
            out[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    impl Write for ScriptedStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let limit = match self.script.pop_front() {
                Some(Step::Chunk(n)) => n,
                Some(Step::Fail(kind)) => return Err(io::Error::from(kind)),
                None => usize::MAX,
            };
            let n = limit.min(buf.len());
            self.written.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_recv_exact_across_short_reads() {
        let mut s = ScriptedStream::new(
            b"hello world",
            vec![Step::Chunk(1), Step::Chunk(3), Step::Chunk(2)],
        );
        let mut buf = [0u8; 11];
        recv_exact(&mut s, &mut buf).unwrap();
        assert_eq!(&buf, b"hello world");
    }

    #[test]
    fn test_recv_exact_resumes_after_interrupt() {
        let mut s = ScriptedStream::new(
            b"abcd",
            vec![
                Step::Chunk(2),
                Step::Fail(io::ErrorKind::Interrupted),
                Step::Chunk(2),
            ],
        );
        let mut buf = [0u8; 4];
        recv_exact(&mut s, &mut buf).unwrap();
        assert_eq!(&buf, b"abcd");
    }

    #[test]
    fn test_recv_exact_early_close_is_local() {
        let mut s = ScriptedStream::new(b"abc", vec![]);
        let mut buf = [0u8; 8];
        match recv_exact(&mut s, &mut buf) {
            Err(TransferError::ConnectionLocal(LocalReason::PeerClosed {
                transferred,
                expected,
            })) => {
                assert_eq!(transferred, 3);
                assert_eq!(expected, 8);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_recv_exact_zero_length_does_no_io() {
        // A failing script proves no read was attempted
        let mut s = ScriptedStream::new(b"", vec![Step::Fail(io::ErrorKind::Other)]);
        recv_exact(&mut s, &mut []).unwrap();
        send_exact(&mut s, &[]).unwrap();
        assert_eq!(s.script.len(), 1);
    }

    #[test]
    fn test_recv_exact_reset_is_local() {
        let mut s = ScriptedStream::new(
            b"abcdef",
            vec![Step::Chunk(2), Step::Fail(io::ErrorKind::ConnectionReset)],
        );
        let mut buf = [0u8; 6];
        let err = recv_exact(&mut s, &mut buf).unwrap_err();
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_recv_exact_unclassified_error_is_fatal() {
        let mut s = ScriptedStream::new(b"abcdef", vec![Step::Fail(io::ErrorKind::PermissionDenied)]);
        let mut buf = [0u8; 6];
        assert!(recv_exact(&mut s, &mut buf).unwrap_err().is_fatal());
    }

    #[test]
    fn test_send_exact_across_short_writes() {
        let mut s = ScriptedStream::new(
            b"",
            vec![
                Step::Chunk(1),
                Step::Fail(io::ErrorKind::Interrupted),
                Step::Chunk(4),
            ],
        );
        send_exact(&mut s, b"payload!").unwrap();
        assert_eq!(s.written, b"payload!");
    }

    #[test]
    fn test_send_exact_broken_pipe_is_local() {
        let mut s = ScriptedStream::new(b"", vec![Step::Fail(io::ErrorKind::BrokenPipe)]);
        match send_exact(&mut s, b"x") {
            Err(TransferError::ConnectionLocal(LocalReason::BrokenPipe)) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_send_exact_zero_write_is_local() {
        let mut s = ScriptedStream::new(b"", vec![Step::Chunk(0)]);
        assert!(!send_exact(&mut s, b"x").unwrap_err().is_fatal());
    }

    #[test]
    fn test_u32_fields_over_stream() {
        let mut out = ScriptedStream::new(b"", vec![Step::Chunk(1), Step::Chunk(1)]);
        send_u32(&mut out, 4).unwrap();
        assert_eq!(out.written, vec![0, 0, 0, 4]);

        let mut input = ScriptedStream::new(&[0, 0, 1, 2], vec![Step::Chunk(3)]);
        assert_eq!(recv_u32(&mut input).unwrap(), 258);
    }
}
