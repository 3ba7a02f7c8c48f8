//! Typed entries of the transaction graph.
//!
//! Every entry is a committed `body` plus an optional `witness`. Bodies
//! reference other entries by their [`Hash`] id only; in-memory
//! back-pointers live in the [`Transaction`](crate::transaction::Transaction)
//! arena, never inside a body. An entry's identity is
//!
//! ```text
//! entry_id(e) = SHA3-256("entryid:" || type || ":" || SHA3-256(body_bytes))
//! ```
//!
//! so any body mutation changes the id while witness mutation does not.
//! Each body carries a zero `ext_hash` slot reserved for soft-fork
//! extension.

use crate::serialization::{
    write_varint31, write_varint63, write_varstr31, write_varstr_list31, ReadError, Reader,
};
use crate::types::{sha3_256, AssetAmount, AssetId, Hash, Program};

pub const TYPE_HEADER: &str = "txheader";
pub const TYPE_MUX: &str = "mux1";
pub const TYPE_ISSUANCE: &str = "issuance1";
pub const TYPE_SPEND: &str = "spend1";
pub const TYPE_OUTPUT: &str = "output1";
pub const TYPE_RETIREMENT: &str = "retirement1";
pub const TYPE_NONCE: &str = "nonce1";
pub const TYPE_TIME_RANGE: &str = "timerange";
pub const TYPE_BLOCK_HEADER: &str = "blockheader";

/// Compute an entry id from its type tag and serialized body.
pub fn entry_id(type_tag: &str, body_bytes: &[u8]) -> Hash {
    let body_hash = sha3_256(&[body_bytes]);
    sha3_256(&[b"entryid:", type_tag.as_bytes(), b":", body_hash.as_bytes()])
}

/// Value flowing into an entry from `ref_id`. `position` is nonzero only
/// when the referent is a mux.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueSource {
    pub ref_id: Hash,
    pub value: AssetAmount,
    pub position: u64,
}

/// Value flowing out of an entry toward `ref_id` at `position`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueDestination {
    pub ref_id: Hash,
    pub position: u64,
}

impl Default for ValueDestination {
    fn default() -> Self {
        ValueDestination {
            ref_id: Hash::ZERO,
            position: 0,
        }
    }
}

impl ValueSource {
    fn write(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self.ref_id.as_bytes());
        buf.extend_from_slice(self.value.asset_id.as_bytes());
        write_varint63(buf, self.value.amount);
        write_varint63(buf, self.position);
    }

    fn read(r: &mut Reader) -> Result<ValueSource, ReadError> {
        let ref_id = Hash(r.read_array()?);
        let asset_id = AssetId(r.read_array()?);
        let amount = r.read_varint63()?;
        let position = r.read_varint63()?;
        Ok(ValueSource {
            ref_id,
            value: AssetAmount { asset_id, amount },
            position,
        })
    }
}

impl ValueDestination {
    fn write(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self.ref_id.as_bytes());
        write_varint63(buf, self.position);
    }

    fn read(r: &mut Reader) -> Result<ValueDestination, ReadError> {
        let ref_id = Hash(r.read_array()?);
        let position = r.read_varint63()?;
        Ok(ValueDestination { ref_id, position })
    }
}

fn write_program(buf: &mut Vec<u8>, program: &Program) {
    write_varint63(buf, program.vm_version);
    write_varstr31(buf, &program.code);
}

fn read_program(r: &mut Reader) -> Result<Program, ReadError> {
    let vm_version = r.read_varint63()?;
    let code = r.read_varstr31()?;
    Ok(Program { vm_version, code })
}

fn read_hash(r: &mut Reader) -> Result<Hash, ReadError> {
    Ok(Hash(r.read_array()?))
}

/// The single header of a transaction. Its entry id is the transaction id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub body: HeaderBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HeaderBody {
    pub version: u64,
    pub results: Vec<Hash>,
    pub data: Hash,
    pub min_time_ms: u64,
    pub max_time_ms: u64,
    pub ext_hash: Hash,
}

impl Header {
    pub fn new(version: u64, min_time_ms: u64, max_time_ms: u64) -> Header {
        Header {
            body: HeaderBody {
                version,
                min_time_ms,
                max_time_ms,
                ..HeaderBody::default()
            },
        }
    }

    pub fn id(&self) -> Hash {
        entry_id(TYPE_HEADER, &self.body_bytes())
    }

    pub fn body_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        write_varint63(&mut buf, self.body.version);
        write_varint31(&mut buf, self.body.results.len() as u64);
        for result in &self.body.results {
            buf.extend_from_slice(result.as_bytes());
        }
        buf.extend_from_slice(self.body.data.as_bytes());
        write_varint63(&mut buf, self.body.min_time_ms);
        write_varint63(&mut buf, self.body.max_time_ms);
        buf.extend_from_slice(self.body.ext_hash.as_bytes());
        buf
    }

    pub(crate) fn read_body(r: &mut Reader) -> Result<Header, ReadError> {
        let version = r.read_varint63()?;
        let n = r.read_varint31()?;
        let mut results = Vec::with_capacity(n.min(1024) as usize);
        for _ in 0..n {
            results.push(read_hash(r)?);
        }
        let data = read_hash(r)?;
        let min_time_ms = r.read_varint63()?;
        let max_time_ms = r.read_varint63()?;
        let ext_hash = read_hash(r)?;
        Ok(Header {
            body: HeaderBody {
                version,
                results,
                data,
                min_time_ms,
                max_time_ms,
                ext_hash,
            },
        })
    }
}

/// The routing node all input value flows through on its way to results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mux {
    pub body: MuxBody,
    pub witness: MuxWitness,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MuxBody {
    pub sources: Vec<ValueSource>,
    pub program: Program,
    pub ext_hash: Hash,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MuxWitness {
    pub destinations: Vec<ValueDestination>,
}

impl Mux {
    pub fn new(sources: Vec<ValueSource>, program: Program) -> Mux {
        Mux {
            body: MuxBody {
                sources,
                program,
                ext_hash: Hash::ZERO,
            },
            witness: MuxWitness::default(),
        }
    }
}

/// Creation of new units of an asset, anchored to a nonce for replay
/// protection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issuance {
    pub body: IssuanceBody,
    pub witness: IssuanceWitness,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuanceBody {
    pub anchor: Hash,
    pub value: AssetAmount,
    pub data: Hash,
    pub ext_hash: Hash,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IssuanceWitness {
    pub destination: ValueDestination,
    pub initial_block_id: Hash,
    pub asset_definition_hash: Hash,
    pub issuance_program: Program,
    pub arguments: Vec<Vec<u8>>,
}

impl Issuance {
    pub fn new(anchor: Hash, value: AssetAmount, data: Hash) -> Issuance {
        Issuance {
            body: IssuanceBody {
                anchor,
                value,
                data,
                ext_hash: Hash::ZERO,
            },
            witness: IssuanceWitness::default(),
        }
    }

    pub fn asset_id(&self) -> AssetId {
        self.body.value.asset_id
    }

    pub fn amount(&self) -> u64 {
        self.body.value.amount
    }
}

/// Elements of a spent output needed for validation when the full output
/// entry is not locally known: its value and control program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prevout {
    pub value: AssetAmount,
    pub program: Program,
}

/// Consumption of an existing unspent output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spend {
    pub body: SpendBody,
    pub witness: SpendWitness,
    /// Validation data for the spent output when the output entry itself
    /// is absent from the arena. Rides in the witness so a spend stays
    /// checkable after crossing the wire to a party without the output;
    /// like the rest of the witness it is outside the identity hash.
    pub prevout: Option<Prevout>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpendBody {
    pub spent_output: Hash,
    pub data: Hash,
    pub ext_hash: Hash,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpendWitness {
    pub destination: ValueDestination,
    pub arguments: Vec<Vec<u8>>,
}

impl Spend {
    pub fn new(spent_output: Hash, data: Hash) -> Spend {
        Spend {
            body: SpendBody {
                spent_output,
                data,
                ext_hash: Hash::ZERO,
            },
            witness: SpendWitness::default(),
            prevout: None,
        }
    }

    pub fn with_prevout(spent_output: Hash, prevout: Prevout, data: Hash) -> Spend {
        let mut spend = Spend::new(spent_output, data);
        spend.prevout = Some(prevout);
        spend
    }
}

/// Value locked under a control program, spendable in a later transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
    pub body: OutputBody,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputBody {
    pub source: ValueSource,
    pub control_program: Program,
    pub data: Hash,
    pub ext_hash: Hash,
}

impl Output {
    pub fn new(source: ValueSource, control_program: Program, data: Hash) -> Output {
        Output {
            body: OutputBody {
                source,
                control_program,
                data,
                ext_hash: Hash::ZERO,
            },
        }
    }

    pub fn asset_amount(&self) -> AssetAmount {
        self.body.source.value
    }

    pub fn asset_id(&self) -> AssetId {
        self.body.source.value.asset_id
    }

    pub fn amount(&self) -> u64 {
        self.body.source.value.amount
    }
}

/// Value destroyed forever. Has no control program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retirement {
    pub body: RetirementBody,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetirementBody {
    pub source: ValueSource,
    pub data: Hash,
    pub ext_hash: Hash,
}

impl Retirement {
    pub fn new(source: ValueSource, data: Hash) -> Retirement {
        Retirement {
            body: RetirementBody {
                source,
                data,
                ext_hash: Hash::ZERO,
            },
        }
    }

    pub fn asset_id(&self) -> AssetId {
        self.body.source.value.asset_id
    }

    pub fn amount(&self) -> u64 {
        self.body.source.value.amount
    }
}

/// A unique anchor seeding an issuance, bounded by a time range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nonce {
    pub body: NonceBody,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonceBody {
    pub program: Program,
    pub time_range: Hash,
    pub ext_hash: Hash,
}

impl Nonce {
    pub fn new(program: Program, time_range: Hash) -> Nonce {
        Nonce {
            body: NonceBody {
                program,
                time_range,
                ext_hash: Hash::ZERO,
            },
        }
    }
}

/// A closed (or half-open) window of milliseconds since the epoch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeRange {
    pub body: TimeRangeBody,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeRangeBody {
    pub min_time_ms: u64,
    pub max_time_ms: u64,
    pub ext_hash: Hash,
}

impl TimeRange {
    pub fn new(min_time_ms: u64, max_time_ms: u64) -> TimeRange {
        TimeRange {
            body: TimeRangeBody {
                min_time_ms,
                max_time_ms,
                ext_hash: Hash::ZERO,
            },
        }
    }
}

/// Header of a block. Its entry id is the block id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    pub body: BlockHeaderBody,
    pub witness: BlockHeaderWitness,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BlockHeaderBody {
    pub version: u64,
    pub height: u64,
    pub previous_block_id: Hash,
    pub timestamp_ms: u64,
    pub transactions_root: Hash,
    pub assets_root: Hash,
    pub next_consensus_program: Vec<u8>,
    pub ext_hash: Hash,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BlockHeaderWitness {
    pub arguments: Vec<Vec<u8>>,
    pub ext_hash: Hash,
}

impl BlockHeader {
    pub fn id(&self) -> Hash {
        entry_id(TYPE_BLOCK_HEADER, &self.body_bytes())
    }

    pub fn body_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        write_varint63(&mut buf, self.body.version);
        write_varint63(&mut buf, self.body.height);
        buf.extend_from_slice(self.body.previous_block_id.as_bytes());
        write_varint63(&mut buf, self.body.timestamp_ms);
        buf.extend_from_slice(self.body.transactions_root.as_bytes());
        buf.extend_from_slice(self.body.assets_root.as_bytes());
        write_varstr31(&mut buf, &self.body.next_consensus_program);
        buf.extend_from_slice(self.body.ext_hash.as_bytes());
        buf
    }

    pub fn witness_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        write_varstr_list31(&mut buf, &self.witness.arguments);
        buf.extend_from_slice(self.witness.ext_hash.as_bytes());
        buf
    }

    pub(crate) fn read(r: &mut Reader) -> Result<BlockHeader, ReadError> {
        let version = r.read_varint63()?;
        let height = r.read_varint63()?;
        let previous_block_id = read_hash(r)?;
        let timestamp_ms = r.read_varint63()?;
        let transactions_root = read_hash(r)?;
        let assets_root = read_hash(r)?;
        let next_consensus_program = r.read_varstr31()?;
        let ext_hash = read_hash(r)?;
        let arguments = r.read_varstr_list31()?;
        let witness_ext_hash = read_hash(r)?;
        Ok(BlockHeader {
            body: BlockHeaderBody {
                version,
                height,
                previous_block_id,
                timestamp_ms,
                transactions_root,
                assets_root,
                next_consensus_program,
                ext_hash,
            },
            witness: BlockHeaderWitness {
                arguments,
                ext_hash: witness_ext_hash,
            },
        })
    }
}

/// A typed node of the transaction graph.
///
/// Dispatch over entries is always exhaustive; introspection opcodes and
/// validation pattern-match the variant they expect and treat anything
/// else as a hard error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Mux(Mux),
    Issuance(Issuance),
    Spend(Spend),
    Output(Output),
    Retirement(Retirement),
    Nonce(Nonce),
    TimeRange(TimeRange),
}

impl Entry {
    pub fn type_tag(&self) -> &'static str {
        match self {
            Entry::Mux(_) => TYPE_MUX,
            Entry::Issuance(_) => TYPE_ISSUANCE,
            Entry::Spend(_) => TYPE_SPEND,
            Entry::Output(_) => TYPE_OUTPUT,
            Entry::Retirement(_) => TYPE_RETIREMENT,
            Entry::Nonce(_) => TYPE_NONCE,
            Entry::TimeRange(_) => TYPE_TIME_RANGE,
        }
    }

    pub fn id(&self) -> Hash {
        entry_id(self.type_tag(), &self.body_bytes())
    }

    pub fn body_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        match self {
            Entry::Mux(m) => {
                write_varint31(&mut buf, m.body.sources.len() as u64);
                for source in &m.body.sources {
                    source.write(&mut buf);
                }
                write_program(&mut buf, &m.body.program);
                buf.extend_from_slice(m.body.ext_hash.as_bytes());
            }
            Entry::Issuance(iss) => {
                buf.extend_from_slice(iss.body.anchor.as_bytes());
                buf.extend_from_slice(iss.body.value.asset_id.as_bytes());
                write_varint63(&mut buf, iss.body.value.amount);
                buf.extend_from_slice(iss.body.data.as_bytes());
                buf.extend_from_slice(iss.body.ext_hash.as_bytes());
            }
            Entry::Spend(sp) => {
                buf.extend_from_slice(sp.body.spent_output.as_bytes());
                buf.extend_from_slice(sp.body.data.as_bytes());
                buf.extend_from_slice(sp.body.ext_hash.as_bytes());
            }
            Entry::Output(out) => {
                out.body.source.write(&mut buf);
                write_program(&mut buf, &out.body.control_program);
                buf.extend_from_slice(out.body.data.as_bytes());
                buf.extend_from_slice(out.body.ext_hash.as_bytes());
            }
            Entry::Retirement(ret) => {
                ret.body.source.write(&mut buf);
                buf.extend_from_slice(ret.body.data.as_bytes());
                buf.extend_from_slice(ret.body.ext_hash.as_bytes());
            }
            Entry::Nonce(nonce) => {
                write_program(&mut buf, &nonce.body.program);
                buf.extend_from_slice(nonce.body.time_range.as_bytes());
                buf.extend_from_slice(nonce.body.ext_hash.as_bytes());
            }
            Entry::TimeRange(tr) => {
                write_varint63(&mut buf, tr.body.min_time_ms);
                write_varint63(&mut buf, tr.body.max_time_ms);
                buf.extend_from_slice(tr.body.ext_hash.as_bytes());
            }
        }
        buf
    }

    pub fn witness_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        match self {
            Entry::Mux(m) => {
                write_varint31(&mut buf, m.witness.destinations.len() as u64);
                for dest in &m.witness.destinations {
                    dest.write(&mut buf);
                }
            }
            Entry::Issuance(iss) => {
                iss.witness.destination.write(&mut buf);
                buf.extend_from_slice(iss.witness.initial_block_id.as_bytes());
                buf.extend_from_slice(iss.witness.asset_definition_hash.as_bytes());
                write_program(&mut buf, &iss.witness.issuance_program);
                write_varstr_list31(&mut buf, &iss.witness.arguments);
            }
            Entry::Spend(sp) => {
                sp.witness.destination.write(&mut buf);
                write_varstr_list31(&mut buf, &sp.witness.arguments);
                match &sp.prevout {
                    Some(prevout) => {
                        buf.push(1);
                        buf.extend_from_slice(prevout.value.asset_id.as_bytes());
                        write_varint63(&mut buf, prevout.value.amount);
                        write_program(&mut buf, &prevout.program);
                    }
                    None => buf.push(0),
                }
            }
            Entry::Output(_) | Entry::Retirement(_) | Entry::Nonce(_) | Entry::TimeRange(_) => {}
        }
        buf
    }
}

/// Write a typed entry: `varstr31(type) || body || witness`.
pub fn write_entry(buf: &mut Vec<u8>, entry: &Entry) {
    write_varstr31(buf, entry.type_tag().as_bytes());
    buf.extend_from_slice(&entry.body_bytes());
    buf.extend_from_slice(&entry.witness_bytes());
}

/// Read a typed entry, dispatching on its type tag. Unknown tags are
/// fatal for the containing transaction.
pub fn read_entry(r: &mut Reader) -> Result<Entry, ReadError> {
    let tag_bytes = r.read_varstr31()?;
    let tag = std::str::from_utf8(&tag_bytes).map_err(|_| ReadError::BadTypeTag)?;
    match tag {
        TYPE_MUX => {
            let n = r.read_varint31()?;
            let mut sources = Vec::with_capacity(n.min(1024) as usize);
            for _ in 0..n {
                sources.push(ValueSource::read(r)?);
            }
            let program = read_program(r)?;
            let ext_hash = read_hash(r)?;
            let n = r.read_varint31()?;
            let mut destinations = Vec::with_capacity(n.min(1024) as usize);
            for _ in 0..n {
                destinations.push(ValueDestination::read(r)?);
            }
            Ok(Entry::Mux(Mux {
                body: MuxBody {
                    sources,
                    program,
                    ext_hash,
                },
                witness: MuxWitness { destinations },
            }))
        }
        TYPE_ISSUANCE => {
            let anchor = read_hash(r)?;
            let asset_id = AssetId(r.read_array()?);
            let amount = r.read_varint63()?;
            let data = read_hash(r)?;
            let ext_hash = read_hash(r)?;
            let destination = ValueDestination::read(r)?;
            let initial_block_id = read_hash(r)?;
            let asset_definition_hash = read_hash(r)?;
            let issuance_program = read_program(r)?;
            let arguments = r.read_varstr_list31()?;
            Ok(Entry::Issuance(Issuance {
                body: IssuanceBody {
                    anchor,
                    value: AssetAmount { asset_id, amount },
                    data,
                    ext_hash,
                },
                witness: IssuanceWitness {
                    destination,
                    initial_block_id,
                    asset_definition_hash,
                    issuance_program,
                    arguments,
                },
            }))
        }
        TYPE_SPEND => {
            let spent_output = read_hash(r)?;
            let data = read_hash(r)?;
            let ext_hash = read_hash(r)?;
            let destination = ValueDestination::read(r)?;
            let arguments = r.read_varstr_list31()?;
            let prevout = match r.read_u8()? {
                0 => None,
                1 => {
                    let asset_id = AssetId(r.read_array()?);
                    let amount = r.read_varint63()?;
                    let program = read_program(r)?;
                    Some(Prevout {
                        value: AssetAmount { asset_id, amount },
                        program,
                    })
                }
                other => return Err(ReadError::BadMarker(other)),
            };
            Ok(Entry::Spend(Spend {
                body: SpendBody {
                    spent_output,
                    data,
                    ext_hash,
                },
                witness: SpendWitness {
                    destination,
                    arguments,
                },
                prevout,
            }))
        }
        TYPE_OUTPUT => {
            let source = ValueSource::read(r)?;
            let control_program = read_program(r)?;
            let data = read_hash(r)?;
            let ext_hash = read_hash(r)?;
            Ok(Entry::Output(Output {
                body: OutputBody {
                    source,
                    control_program,
                    data,
                    ext_hash,
                },
            }))
        }
        TYPE_RETIREMENT => {
            let source = ValueSource::read(r)?;
            let data = read_hash(r)?;
            let ext_hash = read_hash(r)?;
            Ok(Entry::Retirement(Retirement {
                body: RetirementBody {
                    source,
                    data,
                    ext_hash,
                },
            }))
        }
        TYPE_NONCE => {
            let program = read_program(r)?;
            let time_range = read_hash(r)?;
            let ext_hash = read_hash(r)?;
            Ok(Entry::Nonce(Nonce {
                body: NonceBody {
                    program,
                    time_range,
                    ext_hash,
                },
            }))
        }
        TYPE_TIME_RANGE => {
            let min_time_ms = r.read_varint63()?;
            let max_time_ms = r.read_varint63()?;
            let ext_hash = read_hash(r)?;
            Ok(Entry::TimeRange(TimeRange {
                body: TimeRangeBody {
                    min_time_ms,
                    max_time_ms,
                    ext_hash,
                },
            }))
        }
        other => Err(ReadError::UnknownEntryType(other.to_string())),
    }
}
