//! Linear-sweep driver: walks the buffer front to back, one instruction at a time.

use std::time::Instant;
use rayon::prelude::*;

use crate::{Address, Decoder, Disassembly, DisassemblyError};

/// Linear-sweep disassembly of a whole buffer.
///
/// The cursor starts at zero and moves forward by exactly the size of each
/// decoded instruction until it reaches the end of `image`. The first
/// instruction that fails to decode aborts the run; there is no attempt to
/// resynchronise.
///
/// # Arguments
/// * `image` - The raw machine code to disassemble
/// * `decoder` - The decoder to use for disassembly
///
/// # Returns
/// Every instruction in the buffer, in order
pub fn run(image: &[u8], decoder: &dyn Decoder) -> Result<Disassembly, DisassemblyError> {
    log::debug!("Starting linear sweep on {} bytes", image.len());
    let start_time = Instant::now();

    let mut insns = Vec::new();
    let mut at: Address = 0;

    while at < image.len() {
        let insn = decoder.decode(image, at).map_err(|e| {
            log::error!("Decoding stopped after {} instructions: {}", insns.len(), e);
            e
        })?;
        log::trace!("0x{:04x}: {:<24} ; {}", at, insn.to_string(), insn.hex_bytes());

        at += insn.size as Address;
        insns.push(insn);
    }

    log::debug!(
        "Linear sweep completed in {:?}: {} instructions, {} bytes",
        start_time.elapsed(),
        insns.len(),
        at
    );

    Ok(Disassembly::new(insns))
}

/// Run independent linear sweeps over several buffers in parallel.
///
/// Each buffer gets its own pass; one failing buffer does not affect the
/// others. Results come back in the same order as `images`.
pub fn run_all<B>(images: &[B], decoder: &dyn Decoder) -> Vec<Result<Disassembly, DisassemblyError>>
where
    B: AsRef<[u8]> + Sync,
{
    log::debug!("Starting {} parallel sweeps", images.len());

    images
        .par_iter()
        .map(|image| run(image.as_ref(), decoder))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{DecodeError, Decoder8086};

    #[test]
    fn test_linear_sweep() {
        let bytes = [0x8b, 0xc8, 0xb8, 0x05, 0x00];
        let result = run(&bytes, &Decoder8086::new()).unwrap();

        assert_eq!(result.instruction_count(), 2);
        assert_eq!(result.size(), bytes.len());
        assert_eq!(result.insns[0].addr, 0);
        assert_eq!(result.insns[1].addr, 2);
        assert_eq!(result.insns[0].to_string(), "mov cx, ax");
        assert_eq!(result.insns[1].to_string(), "mov ax, 5");
    }

    #[test]
    fn test_cursor_follows_variable_sizes() {
        // 2, 6, 3, 2, 4 bytes
        let bytes = [
            0x89, 0xd9,
            0xc7, 0x85, 0x85, 0x03, 0x5b, 0x01,
            0x83, 0x07, 0x05,
            0x74, 0xfe,
            0x8b, 0x1e, 0x82, 0x0d,
        ];
        let result = run(&bytes, &Decoder8086::new()).unwrap();

        let offsets: Vec<_> = result.iter().map(|i| i.addr).collect();
        assert_eq!(offsets, vec![0, 2, 8, 11, 13]);
        assert_eq!(result.size(), bytes.len());
    }

    #[test]
    fn test_empty_input() {
        let result = run(&[], &Decoder8086::new()).unwrap();
        assert_eq!(result.instruction_count(), 0);
    }

    #[test]
    fn test_truncated_tail_is_an_error() {
        let err = run(&[0x8b, 0xc8, 0xb8, 0x05], &Decoder8086::new()).unwrap_err();
        assert!(matches!(
            err,
            DisassemblyError::Decode(DecodeError::TruncatedInput {
                offset: 2,
                needed: 3,
                available: 2
            })
        ));
    }

    #[test]
    fn test_deterministic() {
        let bytes = [0x03, 0x18, 0x83, 0x3e, 0xe2, 0x12, 0x1d, 0xe2, 0xf6];
        let first = run(&bytes, &Decoder8086::new()).unwrap();
        let second = run(&bytes, &Decoder8086::new()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_run_all_keeps_order_and_isolates_failures() {
        let images: Vec<Vec<u8>> = vec![
            vec![0x8b, 0xc8],
            vec![0x90],
            vec![0x74, 0x02, 0xb8, 0x05, 0x00],
        ];
        let results = run_all(&images, &Decoder8086::new());

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().instruction_count(), 1);
        assert!(results[1].is_err());
        let third = results[2].as_ref().unwrap();
        assert_eq!(third.instruction_count(), 2);
        assert_eq!(third.insns[0].to_string(), "je 2");
    }
}
