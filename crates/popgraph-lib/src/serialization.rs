//! Binary persistence for [`KmerStore`]
//!
//! # File Format
//!
//! ```text
//! GraphHeader
//!   ├─ magic: "POPGRAPH"
//!   ├─ version_major: u32
//!   ├─ version_minor: u32
//!   ├─ k: u32
//!   ├─ num_colours: u32
//!   └─ num_nodes: u64
//! Records ([num_nodes] entries):
//!   ├─ key: ⌈2k/8⌉ bytes, big-endian packed canonical k-mer
//!   ├─ edges: u8 × num_colours
//!   └─ coverage: u32 × num_colours
//! ```
//!
//! Integers are little-endian. Loading goes through the normal insert path
//! and merges into whatever the store already holds: edges are OR-ed and
//! coverage is added, so loading the same file twice doubles coverage.

use crate::kmer::{Kmer, KmerBits};
use crate::node::{EdgeSet, NodeHandle};
use crate::store::KmerStore;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::debug;

/// Magic bytes for the graph binary format
const MAGIC: &[u8; 8] = b"POPGRAPH";

/// File format version: (major, minor)
/// Increment major on breaking changes, minor on compatible changes
const FORMAT_VERSION: (u32, u32) = (1, 0);

/// Header of a serialized graph
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GraphHeader {
    /// Format version major number
    pub version_major: u32,
    /// Format version minor number
    pub version_minor: u32,
    /// K-mer size
    pub k: u32,
    /// Number of colours stored per record
    pub num_colours: u32,
    /// Number of node records following the header
    pub num_nodes: u64,
}

impl GraphHeader {
    /// Create a header for the current format version
    pub fn new(k: usize, num_colours: usize, num_nodes: usize) -> Self {
        Self {
            version_major: FORMAT_VERSION.0,
            version_minor: FORMAT_VERSION.1,
            k: k as u32,
            num_colours: num_colours as u32,
            num_nodes: num_nodes as u64,
        }
    }

    /// Write header to a writer
    pub fn write(&self, writer: &mut dyn Write) -> io::Result<()> {
        writer.write_all(MAGIC)?;
        writer.write_all(&self.version_major.to_le_bytes())?;
        writer.write_all(&self.version_minor.to_le_bytes())?;
        writer.write_all(&self.k.to_le_bytes())?;
        writer.write_all(&self.num_colours.to_le_bytes())?;
        writer.write_all(&self.num_nodes.to_le_bytes())?;
        Ok(())
    }

    /// Read and check a header
    ///
    /// Fails on bad magic or an incompatible major version.
    pub fn read(reader: &mut dyn Read) -> SerializationResult<Self> {
        let mut magic = [0u8; 8];
        reader.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(SerializationError::BadMagic(magic));
        }

        let version_major = read_u32(reader)?;
        let version_minor = read_u32(reader)?;
        if version_major != FORMAT_VERSION.0 {
            return Err(SerializationError::IncompatibleVersion {
                found: (version_major, version_minor),
                expected: FORMAT_VERSION,
            });
        }

        Ok(Self {
            version_major,
            version_minor,
            k: read_u32(reader)?,
            num_colours: read_u32(reader)?,
            num_nodes: read_u64(reader)?,
        })
    }
}

fn read_u32(reader: &mut dyn Read) -> io::Result<u32> {
    let mut bytes = [0u8; 4];
    reader.read_exact(&mut bytes)?;
    Ok(u32::from_le_bytes(bytes))
}

fn read_u64(reader: &mut dyn Read) -> io::Result<u64> {
    let mut bytes = [0u8; 8];
    reader.read_exact(&mut bytes)?;
    Ok(u64::from_le_bytes(bytes))
}

/// Serialization errors
#[derive(Debug)]
pub enum SerializationError {
    /// I/O error during serialization (including a truncated file)
    Io(io::Error),
    /// The file does not start with the graph magic
    BadMagic([u8; 8]),
    /// The file was written by an incompatible format version
    IncompatibleVersion {
        /// Version in the file
        found: (u32, u32),
        /// Version this build reads
        expected: (u32, u32),
    },
    /// The file was built with a different k
    KmerSizeMismatch {
        /// k of the receiving store
        expected: usize,
        /// k recorded in the file
        found: usize,
    },
    /// The file holds more colours than the target can receive
    TooManyColours {
        /// Colours in the file
        stored: usize,
        /// Colours the target accepts
        available: usize,
    },
    /// A record's key is not a valid packed canonical k-mer
    InvalidKey {
        /// Zero-based record index
        record: u64,
    },
}

impl From<io::Error> for SerializationError {
    fn from(err: io::Error) -> Self {
        SerializationError::Io(err)
    }
}

impl std::fmt::Display for SerializationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SerializationError::Io(e) => write!(f, "IO error: {}", e),
            SerializationError::BadMagic(magic) => {
                write!(f, "Invalid magic number for graph file: {:?}", magic)
            }
            SerializationError::IncompatibleVersion { found, expected } => write!(
                f,
                "Incompatible format version: {}.{}, expected {}.{}",
                found.0, found.1, expected.0, expected.1
            ),
            SerializationError::KmerSizeMismatch { expected, found } => write!(
                f,
                "Graph was built with k={}, but this graph uses k={}",
                found, expected
            ),
            SerializationError::TooManyColours { stored, available } => write!(
                f,
                "Graph file holds {} colours but only {} are available",
                stored, available
            ),
            SerializationError::InvalidKey { record } => {
                write!(f, "Corrupt k-mer key in record {}", record)
            }
        }
    }
}

impl std::error::Error for SerializationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SerializationError::Io(e) => Some(e),
            _ => None,
        }
    }
}

/// Result type for serialization operations
pub type SerializationResult<T> = Result<T, SerializationError>;

impl<const K: usize> KmerStore<K>
where
    Kmer<K>: KmerBits,
{
    /// Write every node with all colours
    pub fn save<W: Write>(&self, writer: &mut W) -> SerializationResult<()> {
        let colours: Vec<usize> = (0..self.num_colours()).collect();
        self.write_nodes(writer, &colours, self.len(), |_| true)?;
        debug!("Saved {} nodes x {} colours", self.len(), self.num_colours());
        Ok(())
    }

    /// Write the nodes present in `colour` as a single-colour graph
    pub fn save_colour<W: Write>(&self, writer: &mut W, colour: usize) -> SerializationResult<()> {
        if colour >= self.num_colours() {
            return Err(SerializationError::TooManyColours {
                stored: colour + 1,
                available: self.num_colours(),
            });
        }
        let count = self.count_in_colour(colour);
        self.write_nodes(writer, &[colour], count, |h| self.is_in_colour(h, colour))?;
        debug!("Saved {} nodes of colour {}", count, colour);
        Ok(())
    }

    fn write_nodes<W, F>(
        &self,
        writer: &mut W,
        colours: &[usize],
        count: usize,
        keep: F,
    ) -> SerializationResult<()>
    where
        W: Write,
        F: Fn(NodeHandle) -> bool,
    {
        GraphHeader::new(K, colours.len(), count).write(writer)?;

        let mut key = vec![0u8; Kmer::<K>::BYTES];
        for (handle, kmer) in self.iter() {
            if !keep(handle) {
                continue;
            }
            kmer.write_key_bytes(&mut key);
            writer.write_all(&key)?;
            for &c in colours {
                writer.write_all(&[self.edges(handle, c).bits()])?;
            }
            for &c in colours {
                writer.write_all(&self.coverage(handle, c).to_le_bytes())?;
            }
        }
        writer.flush()?;
        Ok(())
    }

    /// Merge a multi-colour graph into colours `0..num_colours` of the file
    ///
    /// Returns the number of records read.
    pub fn load<R: Read>(&mut self, reader: &mut R) -> SerializationResult<u64> {
        let header = self.read_checked_header(reader)?;
        if header.num_colours as usize > self.num_colours() {
            return Err(SerializationError::TooManyColours {
                stored: header.num_colours as usize,
                available: self.num_colours(),
            });
        }
        let colours: Vec<usize> = (0..header.num_colours as usize).collect();
        self.read_nodes(reader, header.num_nodes, &colours)
    }

    /// Merge a single-colour graph into `colour`
    ///
    /// Returns the number of records read.
    pub fn load_into_colour<R: Read>(
        &mut self,
        reader: &mut R,
        colour: usize,
    ) -> SerializationResult<u64> {
        if colour >= self.num_colours() {
            return Err(SerializationError::TooManyColours {
                stored: colour + 1,
                available: self.num_colours(),
            });
        }
        let header = self.read_checked_header(reader)?;
        if header.num_colours != 1 {
            return Err(SerializationError::TooManyColours {
                stored: header.num_colours as usize,
                available: 1,
            });
        }
        self.read_nodes(reader, header.num_nodes, &[colour])
    }

    fn read_checked_header<R: Read>(&self, reader: &mut R) -> SerializationResult<GraphHeader> {
        let header = GraphHeader::read(reader)?;
        if header.k as usize != K {
            return Err(SerializationError::KmerSizeMismatch {
                expected: K,
                found: header.k as usize,
            });
        }
        Ok(header)
    }

    fn read_nodes<R: Read>(
        &mut self,
        reader: &mut R,
        num_nodes: u64,
        colours: &[usize],
    ) -> SerializationResult<u64> {
        let mut key = vec![0u8; Kmer::<K>::BYTES];
        let mut edges = vec![0u8; colours.len()];
        let mut coverage = [0u8; 4];

        for record in 0..num_nodes {
            reader.read_exact(&mut key)?;
            // edge bytes are only meaningful in the canonical frame
            let kmer = Kmer::<K>::from_key_bytes(&key)
                .filter(|kmer| *kmer == kmer.canonical())
                .ok_or(SerializationError::InvalidKey { record })?;
            reader.read_exact(&mut edges)?;

            let (handle, _, _) = self.find_or_insert(kmer);
            for (&c, &bits) in colours.iter().zip(edges.iter()) {
                self.set_edges(handle, c, EdgeSet::from_bits(bits));
            }
            for &c in colours {
                reader.read_exact(&mut coverage)?;
                self.increment_coverage(handle, c, u32::from_le_bytes(coverage));
            }
        }
        debug!("Loaded {} records into {} colour(s)", num_nodes, colours.len());
        Ok(num_nodes)
    }

    /// Save to a file path
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> SerializationResult<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.save(&mut writer)
    }

    /// Merge a multi-colour graph file into this store
    pub fn load_from_file<P: AsRef<Path>>(&mut self, path: P) -> SerializationResult<u64> {
        let mut reader = BufReader::new(File::open(path)?);
        self.load(&mut reader)
    }
}
