use std::io::{self, Read, Write};

use log::debug;
use ndarray::Array2;

use super::store::{BLOCK_NAMES, NUM_BLOCKS, ParameterStore, block_shapes};
use crate::{ParseErr, Result, symbol::Signature};

type HeaderType = u64;
const HEADER_SIZE: usize = size_of::<HeaderType>();

impl ParameterStore {
    /// Writes the store as `hidden`, `embedding`, `count` followed by every block.
    ///
    /// Each block is its `rows` and `cols` followed by its row-major `f32` elements,
    /// everything in host byte order. Blocks follow `BLOCK_NAMES`.
    ///
    /// # Arguments
    /// * `writer` - Where to write the bytes to.
    pub fn serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        write_header(writer, self.hidden() as HeaderType)?;
        write_header(writer, self.embedding() as HeaderType)?;
        write_header(writer, self.count)?;

        for (_, block) in self.blocks() {
            write_block(writer, block)?;
        }

        debug!(hidden = self.hidden(), embedding = self.embedding(); "serialized parameters");
        Ok(())
    }

    /// Serializes the store into a fresh buffer.
    pub fn to_bytes(&self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.serialize(&mut buf)?;
        Ok(buf)
    }

    /// Reads a store written by `serialize`, replacing this one.
    ///
    /// The label and terminal inventories are recovered from the shapes of the
    /// terminal table and the classification matrix, every later block must then
    /// match the shape they imply. Every block shape is checked before its payload
    /// is read, and payloads are never allocated past what the stream holds. The
    /// receiver is only replaced once the whole stream was read and validated.
    ///
    /// # Arguments
    /// * `reader` - Where to read the bytes from.
    pub fn deserialize<R: Read>(&mut self, reader: &mut R) -> Result<()> {
        *self = Self::read_from(reader)?;
        Ok(())
    }

    /// Reads a store from a byte slice.
    pub fn from_bytes(mut bytes: &[u8]) -> Result<Self> {
        Self::read_from(&mut bytes)
    }

    fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let hidden = to_usize(read_header(reader)?)?;
        let embedding = to_usize(read_header(reader)?)?;
        let count = read_header(reader)?;

        let (rows, terminals) = read_dims(reader)?;
        check_shape(BLOCK_NAMES[0], rows, embedding, "rows")?;
        let terminal = read_block(reader, (rows, terminals))?;

        let (classifications, cols) = read_dims(reader)?;
        check_shape(BLOCK_NAMES[1], cols, hidden, "cols")?;

        let Some(labels) = classifications.checked_sub(2) else {
            return Err(ParseErr::ShapeMismatch {
                block: BLOCK_NAMES[1],
                got: (classifications, cols),
                expected: (2, hidden),
            });
        };
        let w_class = read_block(reader, (classifications, cols))?;

        let signature = Signature::new(labels, terminals);
        let shapes = block_shapes(signature, hidden, embedding);
        let mut blocks = Vec::with_capacity(NUM_BLOCKS);
        blocks.push(terminal);
        blocks.push(w_class);

        for (&name, &expected) in BLOCK_NAMES.iter().zip(&shapes).skip(2) {
            let dims = read_dims(reader)?;

            if dims != expected {
                return Err(ParseErr::ShapeMismatch {
                    block: name,
                    got: dims,
                    expected,
                });
            }

            blocks.push(read_block(reader, dims)?);
        }

        let mut store = Self::with_dims(signature, hidden, embedding);
        store.count = count;

        for ((_, dst), src) in store.blocks_mut().into_iter().zip(blocks) {
            *dst = src;
        }

        debug!(
            hidden = hidden, embedding = embedding, labels = labels, count = count;
            "deserialized parameters"
        );
        Ok(store)
    }
}

fn write_header<W: Write>(writer: &mut W, value: HeaderType) -> io::Result<()> {
    writer.write_all(&value.to_ne_bytes())
}

fn read_header<R: Read>(reader: &mut R) -> io::Result<HeaderType> {
    let mut buf = [0; HEADER_SIZE];
    reader.read_exact(&mut buf)?;
    Ok(HeaderType::from_ne_bytes(buf))
}

fn write_block<W: Write>(writer: &mut W, block: &Array2<f32>) -> io::Result<()> {
    let (rows, cols) = block.dim();
    write_header(writer, rows as HeaderType)?;
    write_header(writer, cols as HeaderType)?;

    // Iteration order is logical (row-major) order regardless of memory layout.
    let nums: Vec<f32> = block.iter().copied().collect();
    writer.write_all(bytemuck::cast_slice(nums.as_slice()))
}

fn read_dims<R: Read>(reader: &mut R) -> Result<(usize, usize)> {
    let rows = to_usize(read_header(reader)?)?;
    let cols = to_usize(read_header(reader)?)?;
    Ok((rows, cols))
}

/// Reads the payload of a block whose shape was already read and checked.
///
/// The header can't be trusted for an allocation size, so the payload is read
/// through a bounded reader and only converted once all of it arrived.
fn read_block<R: Read>(reader: &mut R, (rows, cols): (usize, usize)) -> Result<Array2<f32>> {
    let len_bytes = rows
        .checked_mul(cols)
        .and_then(|len| len.checked_mul(size_of::<f32>()))
        .ok_or_else(|| invalid_data(format!("block of {rows}x{cols} overflows")))?;

    let mut bytes = Vec::new();
    reader
        .by_ref()
        .take(len_bytes as u64)
        .read_to_end(&mut bytes)?;

    if bytes.len() != len_bytes {
        return Err(ParseErr::Deserialize(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("block of {rows}x{cols} ends after {} bytes", bytes.len()),
        )));
    }

    let mut nums = vec![0.0f32; rows * cols];
    bytemuck::cast_slice_mut(nums.as_mut_slice()).copy_from_slice(&bytes);

    let block = Array2::from_shape_vec((rows, cols), nums)
        .map_err(|e| invalid_data(e.to_string()))?;

    Ok(block)
}

fn check_shape(block: &'static str, got: usize, expected: usize, axis: &str) -> Result<()> {
    if got == expected {
        return Ok(());
    }

    Err(invalid_data(format!(
        "{block} has {got} {axis}, the header declares {expected}"
    )))
}

fn to_usize(value: HeaderType) -> Result<usize> {
    usize::try_from(value).map_err(|_| invalid_data(format!("{value} doesn't fit a usize")))
}

fn invalid_data(msg: String) -> ParseErr {
    ParseErr::Deserialize(io::Error::new(io::ErrorKind::InvalidData, msg))
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng, rngs::StdRng};

    use super::*;
    use crate::params::Sign;

    const SIGNATURE: Signature = Signature {
        labels: 4,
        terminals: 7,
    };

    fn random_store(seed: u64) -> ParameterStore {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut store = ParameterStore::with_dims(SIGNATURE, 3, 2);
        store.count = rng.random_range(0..1000);

        for (_, block) in store.blocks_mut() {
            block.mapv_inplace(|_| rng.random_range(-1.0..1.0));
        }

        store
    }

    #[test]
    fn round_trip_is_byte_exact() {
        let store = random_store(7);
        let bytes = store.to_bytes().unwrap();
        let read = ParameterStore::from_bytes(&bytes).unwrap();

        assert_eq!(read, store);
        assert_eq!(read.signature(), SIGNATURE);
        assert_eq!(read.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn round_trip_of_an_initialized_store() {
        let mut store = ParameterStore::new(SIGNATURE);
        store.initialize(5, 3);

        let read = ParameterStore::from_bytes(&store.to_bytes().unwrap()).unwrap();
        assert_eq!(read, store);
    }

    #[test]
    fn header_leads_the_stream() {
        let mut store = ParameterStore::with_dims(SIGNATURE, 3, 2);
        store.count = 9;
        let bytes = store.to_bytes().unwrap();

        assert_eq!(bytes[..HEADER_SIZE], 3u64.to_ne_bytes());
        assert_eq!(bytes[HEADER_SIZE..2 * HEADER_SIZE], 2u64.to_ne_bytes());
        assert_eq!(bytes[2 * HEADER_SIZE..3 * HEADER_SIZE], 9u64.to_ne_bytes());

        // terminal table shape follows
        assert_eq!(bytes[3 * HEADER_SIZE..4 * HEADER_SIZE], 2u64.to_ne_bytes());
        assert_eq!(bytes[4 * HEADER_SIZE..5 * HEADER_SIZE], 7u64.to_ne_bytes());
    }

    #[test]
    fn truncated_stream_fails_and_leaves_the_receiver_intact() {
        let bytes = random_store(1).to_bytes().unwrap();
        let mut receiver = random_store(2);
        let before = receiver.clone();

        for len in [0, 5, HEADER_SIZE * 3, bytes.len() / 2, bytes.len() - 1] {
            let err = receiver.deserialize(&mut &bytes[..len]).unwrap_err();
            assert!(matches!(err, ParseErr::Deserialize(_)), "len {len}: {err}");
            assert_eq!(receiver, before);
        }
    }

    #[test]
    fn block_shape_not_matching_the_header_fails() {
        let mut bytes = random_store(3).to_bytes().unwrap();
        // Declare a hidden size that Wc's columns can't satisfy.
        bytes[..HEADER_SIZE].copy_from_slice(&4u64.to_ne_bytes());

        let err = ParameterStore::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, ParseErr::Deserialize(_)));
    }

    #[test]
    fn oversized_block_header_is_rejected() {
        let mut bytes = Vec::new();
        for header in [1u64, 1, 0, 1, 1 << 61] {
            bytes.extend_from_slice(&header.to_ne_bytes());
        }

        let err = ParameterStore::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, ParseErr::Deserialize(_)), "{err}");

        // a payload that is there but far shorter than declared
        bytes.extend_from_slice(&[0; 64]);
        let err = ParameterStore::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, ParseErr::Deserialize(_)), "{err}");
    }

    #[test]
    fn terminal_rows_are_checked_before_the_payload() {
        let mut bytes = Vec::new();
        for header in [1u64, 2, 0, 3, u64::MAX] {
            bytes.extend_from_slice(&header.to_ne_bytes());
        }

        let err = ParameterStore::from_bytes(&bytes).unwrap_err();
        let ParseErr::Deserialize(e) = err else {
            panic!("expected a deserialization error, got {err}");
        };
        assert_eq!(e.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn later_block_shape_is_checked_before_the_payload() {
        let bytes = random_store(5).to_bytes().unwrap();
        let terminal = 2 * HEADER_SIZE + 2 * 7 * size_of::<f32>();
        let w_class = 2 * HEADER_SIZE + SIGNATURE.classifications() * 3 * size_of::<f32>();
        let wshift = 3 * HEADER_SIZE + terminal + w_class;

        // keep everything up to Wshift's rows and declare a huge column count
        let mut bytes = bytes[..wshift + HEADER_SIZE].to_vec();
        bytes.extend_from_slice(&(1u64 << 40).to_ne_bytes());

        let err = ParameterStore::from_bytes(&bytes).unwrap_err();
        assert!(matches!(
            err,
            ParseErr::ShapeMismatch {
                block: "Wshift",
                got: (12, 0x100_0000_0000),
                expected: (12, 8),
            }
        ));
    }

    #[test]
    fn deserialized_store_combines_with_its_source() {
        let store = random_store(11);
        let mut read = ParameterStore::from_bytes(&store.to_bytes().unwrap()).unwrap();

        read.combine(&store, Sign::Minus).unwrap();
        for (_, block) in read.blocks() {
            assert!(block.iter().all(|&x| x == 0.0));
        }
    }
}
