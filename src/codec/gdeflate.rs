//! GDeflate codec implementation.
//!
//! A GDeflate payload is a tile stream: an 8-byte header, one `u32` offset per
//! tile and the tiles themselves. Every tile is an independent Deflate stream
//! of at most 64 KiB output whose bits are spread over 32 interleaved lanes.
//! Each lane owns a 64-bit bit buffer that is refilled one little-endian
//! `u32` at a time, in lane order, from the shared tile input.

use crate::{Error, Result};

/// Tile stream identifier.
const GDEFLATE_ID: u8 = 4;

/// Uncompressed size of every tile but the last.
const TILE_SIZE: usize = 64 * 1024;

/// Size of the tile stream header.
const HEADER_SIZE: usize = 8;

/// Interleaved bit streams per tile.
const LANES: usize = 32;

/// Zero words a tile may read past its end before it is treated as truncated.
const MAX_OVERRUN: usize = 4 * LANES;

const LENGTH_BASE: [u16; 29] = [
    3, 4, 5, 6, 7, 8, 9, 10, 11, 13, 15, 17, 19, 23, 27, 31, 35, 43, 51, 59, 67, 83, 99, 115, 131,
    163, 195, 227, 258,
];
const LENGTH_EXTRA: [u8; 29] = [
    0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4, 5, 5, 5, 5, 0,
];
const DIST_BASE: [u16; 30] = [
    1, 2, 3, 4, 5, 7, 9, 13, 17, 25, 33, 49, 65, 97, 129, 193, 257, 385, 513, 769, 1025, 1537,
    2049, 3073, 4097, 6145, 8193, 12289, 16385, 24577,
];
const DIST_EXTRA: [u8; 30] = [
    0, 0, 0, 0, 1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 6, 6, 7, 7, 8, 8, 9, 9, 10, 10, 11, 11, 12, 12, 13,
    13,
];

/// Order of the code length code lengths in a dynamic block header.
const CODE_LENGTH_ORDER: [usize; 19] = [
    16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15,
];

const END_OF_BLOCK: u16 = 256;
const MAX_BITS: usize = 15;

fn corrupt(what: impl std::fmt::Display) -> Error {
    Error::Decode(format!("gdeflate: {what}"))
}

/// Parsed tile stream header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TileStream {
    num_tiles: usize,
    last_tile_size: usize,
}

impl TileStream {
    fn parse(data: &[u8]) -> Result<Self> {
        let header = data
            .get(..HEADER_SIZE)
            .ok_or_else(|| corrupt("truncated tile stream header"))?;
        if header[0] != GDEFLATE_ID || header[1] != header[0] ^ 0xFF {
            return Err(corrupt(format!(
                "bad tile stream id {:#04x}/{:#04x}",
                header[0], header[1]
            )));
        }
        let num_tiles = usize::from(u16::from_le_bytes([header[2], header[3]]));
        let bits = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        if bits & 0x3 != 1 {
            return Err(corrupt(format!("unsupported tile size index {}", bits & 0x3)));
        }
        let last_tile_size = ((bits >> 2) & 0x3_FFFF) as usize;
        if last_tile_size > TILE_SIZE {
            return Err(corrupt(format!("last tile size {last_tile_size}")));
        }
        Ok(Self {
            num_tiles,
            last_tile_size,
        })
    }

    fn tile_output(&self, index: usize) -> usize {
        if index + 1 == self.num_tiles && self.last_tile_size != 0 {
            self.last_tile_size
        } else {
            TILE_SIZE
        }
    }

    fn uncompressed_size(&self) -> usize {
        (0..self.num_tiles).map(|i| self.tile_output(i)).sum()
    }
}

/// Decompresses a GDeflate tile stream.
///
/// The output size is taken from the tile stream header.
///
/// # Errors
///
/// Returns [`Error::Decode`] if the header, the tile table or any tile is
/// malformed.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    let stream = TileStream::parse(data)?;
    let table_end = HEADER_SIZE + stream.num_tiles * 4;
    let table = data
        .get(HEADER_SIZE..table_end)
        .ok_or_else(|| corrupt("truncated tile offset table"))?;
    let offsets: Vec<usize> = table
        .chunks_exact(4)
        .map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]) as usize)
        .collect();
    let tiles = &data[table_end..];

    let mut out = Vec::with_capacity(stream.uncompressed_size().min(1 << 20));
    for index in 0..stream.num_tiles {
        let start = if index == 0 { 0 } else { offsets[index] };
        let length = if index + 1 < stream.num_tiles {
            offsets[index + 1]
                .checked_sub(start)
                .ok_or_else(|| corrupt(format!("tile {index} offsets out of order")))?
        } else {
            offsets[0]
        };
        let tile = tiles
            .get(start..start.saturating_add(length))
            .ok_or_else(|| corrupt(format!("tile {index} out of bounds")))?;
        inflate_tile(tile, &mut out, stream.tile_output(index))
            .map_err(|e| match e {
                Error::Decode(msg) => Error::Decode(format!("{msg} in tile {index}")),
                other => other,
            })?;
    }
    Ok(out)
}

/// Interleaved bit reader over one tile.
struct Lanes<'a> {
    input: &'a [u8],
    pos: usize,
    overrun: usize,
    buf: [u64; LANES],
    avail: [u32; LANES],
}

impl<'a> Lanes<'a> {
    fn new(input: &'a [u8]) -> Result<Self> {
        let mut lanes = Self {
            input,
            pos: 0,
            overrun: 0,
            buf: [0; LANES],
            avail: [0; LANES],
        };
        for lane in 0..LANES {
            lanes.load(lane)?;
        }
        Ok(lanes)
    }

    /// Appends the next input word to `lane`. Input past the end reads as zeros.
    fn load(&mut self, lane: usize) -> Result<()> {
        let word = match self.input.get(self.pos..self.pos + 4) {
            Some(w) => u32::from_le_bytes([w[0], w[1], w[2], w[3]]),
            None => {
                self.overrun += 1;
                if self.overrun > MAX_OVERRUN {
                    return Err(corrupt("truncated tile"));
                }
                0
            }
        };
        self.pos += 4;
        self.buf[lane] |= u64::from(word) << self.avail[lane];
        self.avail[lane] += 32;
        Ok(())
    }

    /// Tops up every lane holding fewer than 32 bits.
    fn refill_all(&mut self) -> Result<()> {
        for lane in 0..LANES {
            if self.avail[lane] < 32 {
                self.load(lane)?;
            }
        }
        Ok(())
    }

    fn bits(&mut self, lane: usize, n: u32) -> Result<u32> {
        if self.avail[lane] < n {
            self.load(lane)?;
        }
        let value = (self.buf[lane] & ((1u64 << n) - 1)) as u32;
        self.buf[lane] >>= n;
        self.avail[lane] -= n;
        Ok(value)
    }

    /// Drops the bits up to the next byte boundary of `lane`.
    fn align(&mut self, lane: usize) {
        let n = self.avail[lane] % 8;
        self.buf[lane] >>= n;
        self.avail[lane] -= n;
    }
}

/// Canonical Huffman code as per-length counts and symbols in code order.
struct Huffman {
    count: [u16; MAX_BITS + 1],
    symbol: Vec<u16>,
}

impl Huffman {
    fn new(lengths: &[u8]) -> Result<Self> {
        let mut count = [0u16; MAX_BITS + 1];
        for &len in lengths {
            count[usize::from(len)] += 1;
        }
        count[0] = 0;
        let mut left: i32 = 1;
        for &c in &count[1..] {
            left = (left << 1) - i32::from(c);
            if left < 0 {
                return Err(corrupt("over-subscribed Huffman code"));
            }
        }
        let mut offs = [0u16; MAX_BITS + 1];
        for len in 1..MAX_BITS {
            offs[len + 1] = offs[len] + count[len];
        }
        let mut symbol = vec![0u16; lengths.len()];
        for (sym, &len) in lengths.iter().enumerate() {
            if len != 0 {
                let slot = &mut offs[usize::from(len)];
                symbol[usize::from(*slot)] = sym as u16;
                *slot += 1;
            }
        }
        Ok(Self { count, symbol })
    }

    fn decode(&self, lanes: &mut Lanes<'_>, lane: usize) -> Result<u16> {
        let (mut code, mut first, mut index) = (0i32, 0i32, 0i32);
        for len in 1..=MAX_BITS {
            code |= lanes.bits(lane, 1)? as i32;
            let count = i32::from(self.count[len]);
            if code - first < count {
                return Ok(self.symbol[(index + code - first) as usize]);
            }
            index += count;
            first = (first + count) << 1;
            code <<= 1;
        }
        Err(corrupt("invalid Huffman code"))
    }
}

fn fixed_tables() -> Result<(Huffman, Huffman)> {
    let mut lengths = [0u8; 288];
    lengths[..144].fill(8);
    lengths[144..256].fill(9);
    lengths[256..280].fill(7);
    lengths[280..].fill(8);
    Ok((Huffman::new(&lengths)?, Huffman::new(&[5; 30])?))
}

fn dynamic_tables(lanes: &mut Lanes<'_>) -> Result<(Huffman, Huffman)> {
    let nlen = lanes.bits(0, 5)? as usize + 257;
    let ndist = lanes.bits(0, 5)? as usize + 1;
    let ncode = lanes.bits(0, 4)? as usize + 4;
    if nlen > 286 || ndist > 30 {
        return Err(corrupt("too many length or distance codes"));
    }

    let mut code_lengths = [0u8; 19];
    for &position in &CODE_LENGTH_ORDER[..ncode] {
        code_lengths[position] = lanes.bits(0, 3)? as u8;
    }
    let code_length_code = Huffman::new(&code_lengths)?;

    let mut lengths = vec![0u8; nlen + ndist];
    let mut i = 0;
    while i < lengths.len() {
        let sym = code_length_code.decode(lanes, 0)?;
        let (value, repeat) = match sym {
            0..=15 => (sym as u8, 1),
            16 => {
                let prev = *i
                    .checked_sub(1)
                    .and_then(|p| lengths.get(p))
                    .ok_or_else(|| corrupt("repeat with no previous length"))?;
                (prev, 3 + lanes.bits(0, 2)? as usize)
            }
            17 => (0, 3 + lanes.bits(0, 3)? as usize),
            _ => (0, 11 + lanes.bits(0, 7)? as usize),
        };
        if i + repeat > lengths.len() {
            return Err(corrupt("too many code lengths"));
        }
        lengths[i..i + repeat].fill(value);
        i += repeat;
    }
    if lengths[usize::from(END_OF_BLOCK)] == 0 {
        return Err(corrupt("missing end-of-block code"));
    }
    Ok((Huffman::new(&lengths[..nlen])?, Huffman::new(&lengths[nlen..])?))
}

/// One decoded item of a lane round.
#[derive(Clone, Copy)]
enum Op {
    Literal(u8),
    Copy { lane: usize, length: usize },
}

/// Inflates one tile, appending exactly `size` bytes to `out`.
fn inflate_tile(input: &[u8], out: &mut Vec<u8>, size: usize) -> Result<()> {
    let base = out.len();
    let limit = base + size;
    let mut lanes = Lanes::new(input)?;
    loop {
        let last = lanes.bits(0, 1)? == 1;
        match lanes.bits(0, 2)? {
            0 => stored_block(&mut lanes, out, limit)?,
            1 => {
                let (litlen, dist) = fixed_tables()?;
                codes(&mut lanes, out, base, limit, &litlen, &dist)?;
            }
            2 => {
                let (litlen, dist) = dynamic_tables(&mut lanes)?;
                codes(&mut lanes, out, base, limit, &litlen, &dist)?;
            }
            _ => return Err(corrupt("reserved block type")),
        }
        if last {
            break;
        }
    }
    if out.len() != limit {
        return Err(corrupt(format!(
            "tile holds {} bytes, expected {size}",
            out.len() - base
        )));
    }
    Ok(())
}

fn stored_block(lanes: &mut Lanes<'_>, out: &mut Vec<u8>, limit: usize) -> Result<()> {
    lanes.align(0);
    let len = lanes.bits(0, 16)?;
    let nlen = lanes.bits(0, 16)?;
    if len != !nlen & 0xFFFF {
        return Err(corrupt("stored block length check failed"));
    }
    if out.len() + len as usize > limit {
        return Err(corrupt("tile output overflow"));
    }
    for _ in 0..len {
        out.push(lanes.bits(0, 8)? as u8);
    }
    Ok(())
}

/// Decodes a Huffman-coded block in rounds of one item per lane.
///
/// Each round first decodes the literal/length symbol of every lane, then the
/// distances of the lanes that produced a match, then writes the round's
/// output in lane order. An end-of-block symbol ends the round at its lane.
fn codes(
    lanes: &mut Lanes<'_>,
    out: &mut Vec<u8>,
    base: usize,
    limit: usize,
    litlen: &Huffman,
    dist: &Huffman,
) -> Result<()> {
    let mut ops = Vec::with_capacity(LANES);
    loop {
        ops.clear();
        let mut end = false;
        lanes.refill_all()?;
        for lane in 0..LANES {
            let sym = litlen.decode(lanes, lane)?;
            match sym {
                0..=255 => ops.push(Op::Literal(sym as u8)),
                END_OF_BLOCK => {
                    end = true;
                    break;
                }
                _ => {
                    let index = usize::from(sym - 257);
                    if index >= LENGTH_BASE.len() {
                        return Err(corrupt(format!("invalid length symbol {sym}")));
                    }
                    let extra = lanes.bits(lane, u32::from(LENGTH_EXTRA[index]))?;
                    let length = usize::from(LENGTH_BASE[index]) + extra as usize;
                    ops.push(Op::Copy { lane, length });
                }
            }
        }

        lanes.refill_all()?;
        for op in &ops {
            match *op {
                Op::Literal(byte) => {
                    if out.len() >= limit {
                        return Err(corrupt("tile output overflow"));
                    }
                    out.push(byte);
                }
                Op::Copy { lane, length } => {
                    let sym = usize::from(dist.decode(lanes, lane)?);
                    if sym >= DIST_BASE.len() {
                        return Err(corrupt(format!("invalid distance symbol {sym}")));
                    }
                    let extra = lanes.bits(lane, u32::from(DIST_EXTRA[sym]))?;
                    let distance = usize::from(DIST_BASE[sym]) + extra as usize;
                    if distance > out.len() - base {
                        return Err(corrupt("distance reaches before the tile"));
                    }
                    if out.len() + length > limit {
                        return Err(corrupt("tile output overflow"));
                    }
                    let from = out.len() - distance;
                    for k in 0..length {
                        out.push(out[from + k]);
                    }
                }
            }
        }
        if end {
            return Ok(());
        }
    }
}
