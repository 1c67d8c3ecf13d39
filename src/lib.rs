//! A baseline sequential JPEG (SOF0) decoder.
//!
//! [`decode`] consumes a byte source holding an ISO/IEC 10918-1 baseline DCT
//! stream and produces a fully materialized 8-bit RGB [`Image`], along with
//! any embedded comment. [`decode_into`] does the same through a
//! caller-provided [`ImageSink`].
//!
//! Only the baseline sequential feature set is handled: single-scan
//! Huffman-coded streams without restart intervals. Progressive,
//! hierarchical, lossless and arithmetic-coded images are rejected, as is
//! any marker outside the baseline set. All errors are fatal to the decode;
//! no partial image is returned.

mod bits;
mod error;
mod file;
mod huffman;
mod idct;
mod metadata;
mod recon;
mod scan;


use std::io::Read;

use file::{JpegParser, SegmentKind};
use huffman::{HuffmanTables, HuffmanTree, TableClass};
use metadata::{
    Component, FrameHeader, QuantTable, QuantTables, ScanComponentInfo, ScanHeader, UNZIGZAG,
};

pub use error::{Error, ErrorKind};

use error::Result;

/// One 8-bit RGB pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// Receives the decoded image.
///
/// The sink is created once the image dimensions are known and is fed every
/// pixel exactly once, in unspecified order. Implemented by [`Image`]; bring
/// your own impl to stream pixels into an existing surface.
pub trait ImageSink {
    fn set_pixel(&mut self, y: u32, x: u32, rgb: Rgb);
    fn set_comment(&mut self, comment: &str);
}

/// A fully materialized RGB raster.
#[derive(Debug)]
pub struct Image {
    width: u32,
    height: u32,
    pixels: Vec<Rgb>,
    comment: Option<String>,
}

impl Image {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Rgb { r: 0, g: 0, b: 0 }; width as usize * height as usize],
            comment: None,
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns the pixel at the given position.
    ///
    /// # Panics
    ///
    /// Panics when `y` or `x` lie outside the image.
    #[inline]
    pub fn pixel(&self, y: u32, x: u32) -> Rgb {
        assert!(y < self.height && x < self.width);
        self.pixels[y as usize * self.width as usize + x as usize]
    }

    /// All pixels in row-major order.
    #[inline]
    pub fn pixels(&self) -> &[Rgb] {
        &self.pixels
    }

    /// The stream's COM segment text, if any.
    #[inline]
    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }
}

impl ImageSink for Image {
    fn set_pixel(&mut self, y: u32, x: u32, rgb: Rgb) {
        self.pixels[y as usize * self.width as usize + x as usize] = rgb;
    }

    fn set_comment(&mut self, comment: &str) {
        self.comment = Some(comment.to_owned());
    }
}

/// Decodes a baseline JPEG stream into an [`Image`].
///
/// The source only needs to produce bytes; wrap files in a
/// [`BufReader`][std::io::BufReader].
pub fn decode<R: Read>(source: R) -> Result<Image> {
    decode_into(source, Image::new)
}

/// Decodes a baseline JPEG stream into a caller-provided sink.
///
/// `make_sink` is invoked with the image's (width, height) as soon as the
/// frame header has been read, before any pixel is produced.
pub fn decode_into<R, S, F>(source: R, make_sink: F) -> Result<S>
where
    R: Read,
    S: ImageSink,
    F: FnOnce(u32, u32) -> S,
{
    let mut parser = JpegParser::new(source)?;

    let mut qtables = QuantTables::new();
    let mut huffman = HuffmanTables::new();
    let mut frame: Option<FrameHeader> = None;
    let mut comment: Option<String> = None;
    let mut decoded: Option<(ScanHeader, scan::CoefficientStore)> = None;

    while let Some(segment) = parser.next_segment()? {
        match segment.into_kind() {
            SegmentKind::Sof(sof) => {
                if !sof.is_baseline() {
                    return Err(Error::structural(format!(
                        "not a baseline JPEG (SOF{} frame)",
                        sof.variant()
                    )));
                }
                if frame.is_some() {
                    return Err(Error::structural("two SOF markers in the stream"));
                }
                if sof.X() == 0 || sof.Y() == 0 {
                    return Err(Error::semantic("image with zero width or height"));
                }
                if sof.components().is_empty() || sof.components().len() > 4 {
                    return Err(Error::semantic(format!(
                        "frame with {} components is not supported",
                        sof.components().len()
                    )));
                }

                let mut components = Vec::with_capacity(sof.components().len());
                for c in sof.components() {
                    log::trace!("{c:?}");
                    if !(1..=4).contains(&c.Hi()) || !(1..=4).contains(&c.Vi()) {
                        return Err(Error::semantic(format!(
                            "invalid sampling factors {}x{} for component {}",
                            c.Hi(),
                            c.Vi(),
                            c.Ci(),
                        )));
                    }
                    components.push(Component {
                        id: c.Ci(),
                        h: c.Hi(),
                        v: c.Vi(),
                        quant_id: c.Tqi(),
                    });
                }

                let header = FrameHeader {
                    precision: sof.P(),
                    height: sof.Y(),
                    width: sof.X(),
                    components,
                };
                if header.precision != 8 {
                    return Err(Error::semantic(format!(
                        "sample precision of {} bits is not supported",
                        header.precision
                    )));
                }

                log::trace!(
                    "frame: {}x{} pixels, {} components",
                    header.width,
                    header.height,
                    header.components.len()
                );
                frame = Some(header);
            }
            SegmentKind::Dqt(tables) => {
                for table in tables {
                    let mut values = [0u16; 64];
                    for (zz, &q) in table.Qk().iter().enumerate() {
                        values[UNZIGZAG[zz]] = q;
                    }
                    qtables.set(QuantTable {
                        id: table.Tq(),
                        values,
                    })?;
                }
            }
            SegmentKind::Dht(tables) => {
                for table in tables {
                    let class = match table.Tc() {
                        0 => TableClass::Dc,
                        1 => TableClass::Ac,
                        err => {
                            return Err(Error::semantic(format!(
                                "invalid table class Tc={err} (only 0 and 1 are valid)"
                            )))
                        }
                    };
                    if table.Th() > 3 {
                        return Err(Error::semantic(format!(
                            "invalid table destination Th={} (only 0-3 are valid)",
                            table.Th()
                        )));
                    }

                    let tree = HuffmanTree::build(table.Li(), table.Vij())?;
                    log::debug!("installed {class} table {}:\n{tree:?}", table.Th());
                    huffman.set(class, table.Th(), tree)?;
                }
            }
            SegmentKind::Sos(sos) => {
                if decoded.is_some() {
                    return Err(Error::structural(
                        "multiple scans per image are not supported",
                    ));
                }
                let Some(frame) = &frame else {
                    return Err(Error::structural("SOS not preceded by SOF header"));
                };
                if sos.Ss() != 0 || sos.Se() != 63 || sos.Ah() != 0 || sos.Al() != 0 {
                    return Err(Error::semantic("non-baseline scan header"));
                }
                if sos.components().is_empty()
                    || sos.components().len() > frame.components.len()
                {
                    return Err(Error::semantic(format!(
                        "scan selects {} components, the frame has {}",
                        sos.components().len(),
                        frame.components.len()
                    )));
                }

                let mut components = Vec::with_capacity(sos.components().len());
                for c in sos.components() {
                    log::trace!("{c:?}");
                    if c.Tdj() > 3 || c.Taj() > 3 {
                        return Err(Error::semantic(format!(
                            "invalid entropy table selectors {}/{} for component {} \
                             (only 0-3 are valid)",
                            c.Tdj(),
                            c.Taj(),
                            c.Csj(),
                        )));
                    }
                    components.push(ScanComponentInfo {
                        component_id: c.Csj(),
                        dc_id: c.Tdj(),
                        ac_id: c.Taj(),
                    });
                }

                let scan_header = ScanHeader { components };
                let store =
                    scan::decode_scan(parser.bits_mut(), frame, &scan_header, &huffman)?;
                decoded = Some((scan_header, store));
            }
            SegmentKind::Com(com) => {
                // The last comment wins.
                comment = Some(com.text());
            }
            SegmentKind::App(app) => {
                log::trace!("ignoring APP{} segment", app.n());
            }
        }
    }

    let Some(frame) = frame else {
        return Err(Error::structural("no SOF header in the stream"));
    };
    let Some((scan_header, store)) = decoded else {
        return Err(Error::structural("no image data in the stream"));
    };

    let mut sink = make_sink(frame.width.into(), frame.height.into());
    if let Some(comment) = &comment {
        sink.set_comment(comment);
    }
    recon::reconstruct(&frame, &scan_header, &qtables, store, &mut sink)?;
    Ok(sink)
}
