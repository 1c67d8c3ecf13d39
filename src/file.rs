//! JPEG/JFIF segment parser.
//!
//! [`JpegParser`] wraps the bit source and yields one parsed [`Segment`] at a
//! time. It handles the wire format only; semantic checks (duplicate tables,
//! baseline constraints, table references) are the caller's business. The
//! entropy-coded data following an SOS header is *not* consumed here, it is
//! decoded straight off the bit source by the scan decoder.

#![allow(non_snake_case, dead_code)]

#[cfg(test)]
mod tests;

use std::{fmt, mem};

use std::io::Read;

use bytemuck::AnyBitPattern;

use crate::bits::BitReader;
use crate::error::{Error, Result};

pub struct JpegParser<R> {
    reader: BitReader<R>,
}

impl<R: Read> JpegParser<R> {
    /// Creates a parser and consumes the SOI marker.
    pub fn new(src: R) -> Result<Self> {
        let mut reader = BitReader::new(src);
        if reader.read_byte()? != 0xFF || reader.read_byte()? != 0xD8 {
            return Err(Error::structural("JPEG image does not start with SOI marker"));
        }
        Ok(Self { reader })
    }

    /// Reads the next [`Segment`] from the JPEG data.
    ///
    /// Returns `Ok(None)` when the EOI marker is encountered, signaling the
    /// end of the image. `SOI`/`EOI` markers are handled internally and never
    /// returned. Markers a baseline sequential stream must not contain (DRI,
    /// RSTn, DNL, progressive/lossless SOF variants appear as parsed `Sof`
    /// segments and are rejected by the caller) are fatal.
    pub fn next_segment(&mut self) -> Result<Option<Segment>> {
        let lead = self.reader.read_byte()?;
        if lead != 0xFF {
            return Err(Error::structural(format!(
                "expected a marker, found stray byte {lead:02x}"
            )));
        }
        let mut marker = self.reader.read_byte()?;
        while marker == 0xFF {
            // Fill bytes before a marker are allowed.
            marker = self.reader.read_byte()?;
        }

        match marker {
            0x00 => return Err(Error::structural("invalid ff 00 marker")),
            0xD8 => return Err(Error::structural("second SOI marker inside the image")),
            0xD9 => return Ok(None),
            0x01 | 0xD0..=0xD7 => {
                return Err(Error::structural(format!(
                    "standalone marker ff {marker:02x} is not allowed in a baseline stream"
                )))
            }
            0xDD => {
                return Err(Error::structural(
                    "DRI segment: restart intervals are not supported",
                ))
            }
            // The marker segments this parser understands.
            0xDB | 0xC4 | 0xC0..=0xC3 | 0xC5..=0xC7 | 0xC9..=0xCB | 0xCD..=0xCF | 0xDA
            | 0xE0..=0xEF | 0xFE => {}
            _ => {
                return Err(Error::structural(format!("unknown marker ff {marker:02x}")));
            }
        }

        // Every remaining accepted marker is followed by the segment length.
        let length = self.read_length()?;
        let payload = self.reader.read_bytes(length)?;
        let mut reader = Reader {
            buf: &payload,
            position: 0,
        };

        let kind = match marker {
            0xDB => SegmentKind::Dqt(read_dqt(&mut reader)?),
            0xC4 => SegmentKind::Dht(read_dht(&mut reader)?),
            0xC0..=0xC3 | 0xC5..=0xC7 | 0xC9..=0xCB | 0xCD..=0xCF => {
                SegmentKind::Sof(read_sof(marker, &mut reader)?)
            }
            0xDA => SegmentKind::Sos(read_sos(&mut reader)?),
            0xE0..=0xEF => {
                log::trace!("skipping {length} byte APP{} payload", marker - 0xE0);
                reader.position = reader.buf.len();
                SegmentKind::App(App { n: marker - 0xE0 })
            }
            0xFE => SegmentKind::Com(read_com(&mut reader)?),
            _ => unreachable!("marker ff {marker:02x} passed the acceptance check"),
        };

        if reader.position != payload.len() {
            return Err(Error::structural(format!(
                "ff {:02x} segment specified a length of {} bytes, but {} remain after decoding",
                marker,
                length,
                payload.len() - reader.position,
            )));
        }

        Ok(Some(Segment { marker, kind }))
    }

    fn read_length(&mut self) -> Result<usize> {
        // The length parameter covers the segment parameters including the
        // length parameter itself, but excluding the FF xx marker.
        let len = self.reader.read_word()?;
        if len < 2 {
            return Err(Error::structural(format!("invalid segment length {len}")));
        }
        Ok(usize::from(len) - 2)
    }

    /// Hands the bit source to the scan decoder once the SOS header has been
    /// read.
    pub fn bits_mut(&mut self) -> &mut BitReader<R> {
        &mut self.reader
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    position: usize,
}

impl<'a> Reader<'a> {
    fn remaining(&self) -> &'a [u8] {
        &self.buf[self.position..]
    }

    fn read_u8(&mut self) -> Result<u8> {
        match self.remaining().first() {
            Some(&byte) => {
                self.position += 1;
                Ok(byte)
            }
            None => Err(Error::structural(
                "segment payload ended before its contents",
            )),
        }
    }

    fn read_u16(&mut self) -> Result<u16> {
        let b = [self.read_u8()?, self.read_u8()?];
        Ok(u16::from_be_bytes(b))
    }

    fn read_slice(&mut self, count: usize) -> Result<&'a [u8]> {
        if self.remaining().len() < count {
            return Err(Error::structural(
                "segment payload ended before its contents",
            ));
        }
        let slice = &self.remaining()[..count];
        self.position += count;
        Ok(slice)
    }

    fn read_obj<T: AnyBitPattern>(&mut self) -> Result<T> {
        assert_eq!(mem::align_of::<T>(), 1);
        let bytes = self.read_slice(mem::size_of::<T>())?;
        Ok(*bytemuck::from_bytes(bytes))
    }

    fn read_objs<T: AnyBitPattern>(&mut self, count: usize) -> Result<Vec<T>> {
        assert_eq!(mem::align_of::<T>(), 1);
        let bytes = self.read_slice(count * mem::size_of::<T>())?;
        Ok(bytemuck::cast_slice(bytes).to_vec())
    }
}

fn read_dqt(reader: &mut Reader<'_>) -> Result<Vec<QuantizationTable>> {
    let mut tables = Vec::new();
    while !reader.remaining().is_empty() {
        let PqTq = reader.read_u8()?;
        let mut Qk = [0u16; 64];
        match PqTq >> 4 {
            0 => {
                for q in &mut Qk {
                    *q = reader.read_u8()?.into();
                }
            }
            1 => {
                for q in &mut Qk {
                    *q = reader.read_u16()?;
                }
            }
            err => {
                return Err(Error::semantic(format!(
                    "invalid quantization table precision Pq={err} (only 0 and 1 are valid)"
                )))
            }
        }
        tables.push(QuantizationTable { PqTq, Qk });
    }
    if tables.is_empty() {
        return Err(Error::structural("empty DQT segment"));
    }
    Ok(tables)
}

fn read_dht(reader: &mut Reader<'_>) -> Result<Vec<HuffmanTable>> {
    let mut tables = Vec::new();
    while !reader.remaining().is_empty() {
        let header: DhtHeader = reader.read_obj()?;
        let Vij = reader.read_slice(header.num_values())?.to_vec();
        tables.push(HuffmanTable { header, Vij });
    }
    if tables.is_empty() {
        return Err(Error::structural("empty DHT segment"));
    }
    Ok(tables)
}

fn read_sof(marker: u8, reader: &mut Reader<'_>) -> Result<Sof> {
    let P = reader.read_u8()?;
    let Y = reader.read_u16()?;
    let X = reader.read_u16()?;
    let num_components = reader.read_u8()?;
    let components = reader.read_objs::<FrameComponent>(num_components.into())?;
    Ok(Sof {
        marker,
        P,
        Y,
        X,
        components,
    })
}

fn read_sos(reader: &mut Reader<'_>) -> Result<Sos> {
    let num_components = reader.read_u8()?;
    let components = reader.read_objs::<ScanComponent>(num_components.into())?;
    let Ss = reader.read_u8()?;
    let Se = reader.read_u8()?;
    let AhAl = reader.read_u8()?;
    Ok(Sos {
        components,
        Ss,
        Se,
        AhAl,
    })
}

fn read_com(reader: &mut Reader<'_>) -> Result<Com> {
    Ok(Com {
        com: reader.read_slice(reader.remaining().len())?.to_vec(),
    })
}

/// A segment of a JPEG file, introduced by a `0xFF 0xXX` marker.
#[derive(Debug)]
pub struct Segment {
    marker: u8,
    kind: SegmentKind,
}

impl Segment {
    /// Returns the value of the marker byte indicating the type of the
    /// segment.
    #[inline]
    pub fn marker(&self) -> u8 {
        self.marker
    }

    #[inline]
    pub fn kind(&self) -> &SegmentKind {
        &self.kind
    }

    #[inline]
    pub fn into_kind(self) -> SegmentKind {
        self.kind
    }
}

/// Enumeration of segment kinds understood by this parser.
#[derive(Debug)]
#[non_exhaustive]
pub enum SegmentKind {
    Dqt(Vec<QuantizationTable>),
    Dht(Vec<HuffmanTable>),
    Sof(Sof),
    Sos(Sos),
    App(App),
    Com(Com),
}

/// An application-specific segment (`APPn`). The payload is skipped.
#[derive(Debug)]
pub struct App {
    n: u8,
}

impl App {
    /// Returns the type of APP marker (the `n` in `APPn`), in range `0..=15`.
    #[inline]
    pub fn n(&self) -> u8 {
        self.n
    }
}

/// A comment segment (`COM`).
pub struct Com {
    com: Vec<u8>,
}

impl Com {
    /// The comment text. JPEG does not pin down an encoding; invalid UTF-8 is
    /// replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.com).into_owned()
    }
}

impl fmt::Debug for Com {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Com(\"{}\")", self.com.escape_ascii())
    }
}

/// One quantization table from a DQT segment, with `Qk` still in the wire's
/// zig-zag order.
#[derive(Clone, Copy)]
pub struct QuantizationTable {
    PqTq: u8,
    Qk: [u16; 64],
}

impl QuantizationTable {
    /// Returns the quantization table element precision (0: 8-bit entries,
    /// 1: 16-bit entries).
    #[inline]
    pub fn Pq(&self) -> u8 {
        self.PqTq >> 4
    }

    /// Returns the destination identifier (0-15).
    #[inline]
    pub fn Tq(&self) -> u8 {
        self.PqTq & 0xf
    }

    /// Returns the quantization table elements in zig-zag order.
    #[inline]
    pub fn Qk(&self) -> &[u16; 64] {
        &self.Qk
    }
}

impl fmt::Debug for QuantizationTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuantizationTable")
            .field("Pq", &self.Pq())
            .field("Tq", &self.Tq())
            .field("Qk", &self.Qk)
            .finish()
    }
}

#[derive(Clone, Copy, AnyBitPattern)]
#[repr(C)]
struct DhtHeader {
    TcTh: u8,
    Li: [u8; 16],
}

impl DhtHeader {
    fn num_values(&self) -> usize {
        self.Li.iter().map(|l| *l as usize).sum()
    }
}

/// One code table from a DHT segment.
pub struct HuffmanTable {
    header: DhtHeader,
    Vij: Vec<u8>,
}

impl HuffmanTable {
    /// Returns the table class (0 = DC, 1 = AC).
    #[inline]
    pub fn Tc(&self) -> u8 {
        self.header.TcTh >> 4
    }

    /// Returns the table destination identifier (0-3).
    #[inline]
    pub fn Th(&self) -> u8 {
        self.header.TcTh & 0xf
    }

    /// Returns an array containing the number of codes of each length.
    #[inline]
    pub fn Li(&self) -> &[u8; 16] {
        &self.header.Li
    }

    /// Returns the values associated with each huffman code.
    #[inline]
    pub fn Vij(&self) -> &[u8] {
        &self.Vij
    }
}

impl fmt::Debug for HuffmanTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HuffmanTable")
            .field("Tc", &self.Tc())
            .field("Th", &self.Th())
            .field("Li", &self.Li())
            .field("Vij", &self.Vij)
            .finish()
    }
}

/// **SOF** Start Of Frame.
///
/// All SOFn markers share this layout; which coding process the frame uses
/// is encoded in the marker itself. Only `SOF0` (baseline DCT) frames can be
/// decoded here, everything else is the caller's cue to give up with an
/// error naming the variant.
pub struct Sof {
    marker: u8,
    /// Sample precision in bits.
    P: u8,
    Y: u16,
    X: u16,
    components: Vec<FrameComponent>,
}

impl Sof {
    /// Returns the `n` in the `SOFn` marker this frame header came with
    /// (0 = baseline, 2 = progressive, 9-15 = arithmetic coding variants).
    #[inline]
    pub fn variant(&self) -> u8 {
        self.marker - 0xC0
    }

    /// Whether this is a baseline DCT (`SOF0`) frame.
    #[inline]
    pub fn is_baseline(&self) -> bool {
        self.variant() == 0
    }

    /// Returns the sample precision in bits.
    #[inline]
    pub fn P(&self) -> u8 {
        self.P
    }

    /// Returns the number of lines in the image (the height of the frame).
    #[inline]
    pub fn Y(&self) -> u16 {
        self.Y
    }

    /// Returns the number of samples per line (the width of the frame).
    #[inline]
    pub fn X(&self) -> u16 {
        self.X
    }

    #[inline]
    pub fn components(&self) -> &[FrameComponent] {
        &self.components
    }
}

impl fmt::Debug for Sof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sof")
            .field("sof", &format_args!("SOF{}", self.variant()))
            .field("P", &self.P)
            .field("Y", &self.Y)
            .field("X", &self.X)
            .field("components", &self.components)
            .finish()
    }
}

#[derive(Clone, Copy, AnyBitPattern)]
#[repr(C)]
pub struct FrameComponent {
    Ci: u8,
    HiVi: u8,
    Tqi: u8,
}

impl FrameComponent {
    /// Returns this component's identifier, which the scan header refers
    /// back to.
    #[inline]
    pub fn Ci(&self) -> u8 {
        self.Ci
    }

    /// Returns the horizontal sampling factor for this component.
    #[inline]
    pub fn Hi(&self) -> u8 {
        self.HiVi >> 4
    }

    /// Returns the vertical sampling factor for this component.
    #[inline]
    pub fn Vi(&self) -> u8 {
        self.HiVi & 0xf
    }

    /// Returns the index of the quantization table to use for this
    /// component.
    #[inline]
    pub fn Tqi(&self) -> u8 {
        self.Tqi
    }
}

impl fmt::Debug for FrameComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameComponent")
            .field("Ci", &self.Ci)
            .field("Hi", &self.Hi())
            .field("Vi", &self.Vi())
            .field("Tqi", &self.Tqi)
            .finish()
    }
}

/// **SOS** Start Of Scan – a scan header; the entropy-coded scan data
/// follows it on the bit source.
pub struct Sos {
    components: Vec<ScanComponent>,
    Ss: u8,
    Se: u8,
    AhAl: u8,
}

impl Sos {
    #[inline]
    pub fn components(&self) -> &[ScanComponent] {
        &self.components
    }

    #[inline]
    pub fn Ss(&self) -> u8 {
        self.Ss
    }

    #[inline]
    pub fn Se(&self) -> u8 {
        self.Se
    }

    #[inline]
    pub fn Ah(&self) -> u8 {
        self.AhAl >> 4
    }

    #[inline]
    pub fn Al(&self) -> u8 {
        self.AhAl & 0xf
    }
}

impl fmt::Debug for Sos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sos")
            .field("components", &self.components)
            .field("Ss", &self.Ss)
            .field("Se", &self.Se)
            .field("Ah", &self.Ah())
            .field("Al", &self.Al())
            .finish()
    }
}

#[derive(Clone, Copy, AnyBitPattern)]
#[repr(C)]
pub struct ScanComponent {
    Csj: u8,
    TdjTaj: u8,
}

impl ScanComponent {
    /// Returns the scan component selector.
    #[inline]
    pub fn Csj(&self) -> u8 {
        self.Csj
    }

    /// Returns the DC entropy coding table destination selector.
    #[inline]
    pub fn Tdj(&self) -> u8 {
        self.TdjTaj >> 4
    }

    /// Returns the AC entropy coding table destination selector.
    #[inline]
    pub fn Taj(&self) -> u8 {
        self.TdjTaj & 0xf
    }
}

impl fmt::Debug for ScanComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanComponent")
            .field("Csj", &self.Csj)
            .field("Tdj", &self.Tdj())
            .field("Taj", &self.Taj())
            .finish()
    }
}
