#![allow(clippy::unwrap_used)]
//! Framing-contract tests: split-invariance of the extraction loop and the
//! exact wire layout.

use framewire::core::buffer::ByteBuffer;
use framewire::core::packet::{extract_frames, peek_header, Packet};
use framewire::error::ProtocolError;

fn wire(frames: &[(i32, &[u8])]) -> Vec<u8> {
    let mut bytes = Vec::new();
    for (command_id, payload) in frames {
        bytes.extend_from_slice(&Packet::new(*command_id, payload.to_vec()).pack().unwrap());
    }
    bytes
}

/// Feed `stream` through a receive buffer in the given chunks and collect
/// every dispatched `(command_id, payload)` pair.
fn feed(stream: &[u8], chunks: &[usize]) -> Vec<(i32, Vec<u8>)> {
    let mut recv = ByteBuffer::new();
    let mut dispatched = Vec::new();
    let mut offset = 0;

    for &chunk in chunks {
        let end = (offset + chunk).min(stream.len());
        recv.write(&stream[offset..end]);
        offset = end;
        for packet in extract_frames(&mut recv, 1024 * 1024).unwrap() {
            dispatched.push((packet.command_id, packet.payload.to_vec()));
        }
    }
    assert_eq!(offset, stream.len(), "test fed the whole stream");
    dispatched
}

#[test]
fn split_invariance_at_every_boundary() {
    let stream = wire(&[
        (1, b"hello"),
        (2, b""),
        (300, b"a much longer payload, still one frame"),
        (-7, b"negative ids are just ids"),
    ]);
    let contiguous = feed(&stream, &[stream.len()]);
    assert_eq!(contiguous.len(), 4);

    for split in 0..=stream.len() {
        let two_reads = feed(&stream, &[split, stream.len() - split]);
        assert_eq!(two_reads, contiguous, "split at byte {split} diverged");
    }
}

#[test]
fn split_invariance_across_many_small_reads() {
    let stream = wire(&[(10, b"first"), (20, b"second"), (30, b"third")]);
    let contiguous = feed(&stream, &[stream.len()]);

    for chunk_size in [1, 2, 3, 5, 7, 11] {
        let chunks: Vec<usize> = std::iter::repeat(chunk_size)
            .take(stream.len().div_ceil(chunk_size))
            .collect();
        assert_eq!(
            feed(&stream, &chunks),
            contiguous,
            "chunk size {chunk_size} diverged"
        );
    }
}

#[test]
fn concrete_hello_scenario_split_after_sixth_byte() {
    // length=5, commandId=1, payload="hello"
    let stream = [
        0x00, 0x00, 0x00, 0x05, 0x00, 0x00, 0x00, 0x01, 0x68, 0x65, 0x6C, 0x6C, 0x6F,
    ];

    let mut recv = ByteBuffer::new();
    recv.write(&stream[..6]);
    assert!(extract_frames(&mut recv, 1024).unwrap().is_empty());

    recv.write(&stream[6..]);
    let frames = extract_frames(&mut recv, 1024).unwrap();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].command_id, 1);
    assert_eq!(&frames[0].payload[..], b"hello");
}

#[test]
fn header_peek_matches_pack() {
    let packet = Packet::new(0x0102_0304, vec![0xAB; 9]);
    let mut recv = ByteBuffer::new();
    recv.write(&packet.pack().unwrap());

    let header = peek_header(&recv).unwrap();
    assert_eq!(header.length, 9);
    assert_eq!(header.command_id, 0x0102_0304);
}

#[test]
fn oversized_declared_length_fails_before_payload() {
    let mut recv = ByteBuffer::new();
    // Header only: 1 MB declared against a 1 KB cap.
    recv.write(&(1_048_576i32).to_be_bytes());
    recv.write(&(5i32).to_be_bytes());

    let err = extract_frames(&mut recv, 1024).unwrap_err();
    assert!(matches!(err, ProtocolError::OversizedFrame { .. }));
}

#[test]
fn frames_never_double_dispatch_across_reads() {
    let stream = wire(&[(1, b"once")]);
    let mut recv = ByteBuffer::new();

    recv.write(&stream);
    assert_eq!(extract_frames(&mut recv, 1024).unwrap().len(), 1);
    // Nothing buffered, nothing re-dispatched.
    assert!(extract_frames(&mut recv, 1024).unwrap().is_empty());
    assert!(recv.is_empty());
}
