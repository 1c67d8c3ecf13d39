//! Image reconstruction.
//!
//! Consumes the coefficient store produced by the scan decoder and drives
//! the output sink: dequantization, inverse DCT, level shift, chroma
//! upsampling by MCU-local replication, and YCbCr→RGB conversion.

use crate::error::Result;
use crate::idct::Idct;
use crate::metadata::{FrameHeader, QuantTables, ScanHeader};
use crate::scan::CoefficientStore;
use crate::{ImageSink, Rgb};

pub fn reconstruct(
    frame: &FrameHeader,
    scan: &ScanHeader,
    qtables: &QuantTables,
    store: CoefficientStore,
    sink: &mut impl ImageSink,
) -> Result<()> {
    let width = usize::from(frame.width);
    let height = usize::from(frame.height);
    let h_max = usize::from(frame.max_h());
    let v_max = usize::from(frame.max_v());
    let (mcu_cols, mcu_rows) = frame.mcu_grid();
    let (mcu_cols, mcu_rows) = (usize::from(mcu_cols), usize::from(mcu_rows));

    // One full-resolution sample plane per scan component. Every in-range
    // pixel is covered by the MCU grid, pad samples fall outside and are
    // dropped.
    let mut planes: Vec<Vec<u8>> = vec![vec![0u8; width * height]; scan.components.len()];

    let idct = Idct::new();
    for (c, sc) in scan.components.iter().enumerate() {
        let comp = frame.component_by_id(sc.component_id)?;
        let quant = qtables.get(comp.quant_id)?;
        let h = usize::from(comp.h);
        let v = usize::from(comp.v);
        let h_scale = h_max / h;
        let v_scale = v_max / v;
        let blocks = &store.blocks[c];
        let plane = &mut planes[c];

        for mcu_y in 0..mcu_rows {
            for mcu_x in 0..mcu_cols {
                for block_v in 0..v {
                    for block_h in 0..h {
                        let index = ((mcu_y * mcu_cols + mcu_x) * v + block_v) * h + block_h;
                        let block = &blocks[index];

                        let mut freq = [0.0f64; 64];
                        for (f, (&coeff, &q)) in
                            freq.iter_mut().zip(block.iter().zip(&quant.values))
                        {
                            *f = f64::from(coeff) * f64::from(q);
                        }
                        let mut samples = [0.0f64; 64];
                        idct.inverse(&freq, &mut samples);

                        let block_y0 = mcu_y * 8 * v_max + 8 * block_v * v_scale;
                        let block_x0 = mcu_x * 8 * h_max + 8 * block_h * h_scale;
                        for ly in 0..8 {
                            for lx in 0..8 {
                                let value = (samples[ly * 8 + lx].round() as i32 + 128)
                                    .clamp(0, 255)
                                    as u8;
                                let y0 = block_y0 + ly * v_scale;
                                let x0 = block_x0 + lx * h_scale;
                                for dy in 0..v_scale {
                                    for dx in 0..h_scale {
                                        if y0 + dy < height && x0 + dx < width {
                                            plane[(y0 + dy) * width + x0 + dx] = value;
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    if planes.len() > 3 {
        log::warn!(
            "scan carries {} components, only the first 3 feed the color conversion",
            planes.len()
        );
    }

    for y in 0..height {
        for x in 0..width {
            let luma = planes[0][y * width + x];
            // A missing chroma plane means neutral chroma, so a grayscale
            // image passes its Y samples through.
            let cb = planes.get(1).map_or(128, |p| p[y * width + x]);
            let cr = planes.get(2).map_or(128, |p| p[y * width + x]);
            sink.set_pixel(y as u32, x as u32, ycbcr_to_rgb(luma, cb, cr));
        }
    }

    Ok(())
}

/// JFIF YCbCr→RGB conversion on centered chroma, rounded to nearest and
/// clamped.
fn ycbcr_to_rgb(y: u8, cb: u8, cr: u8) -> Rgb {
    let y = f64::from(y);
    let cb = f64::from(cb) - 128.0;
    let cr = f64::from(cr) - 128.0;

    let r = y + 1.402 * cr;
    let g = y - 0.344136 * cb - 0.714136 * cr;
    let b = y + 1.772 * cb;

    Rgb {
        r: to_sample(r),
        g: to_sample(g),
        b: to_sample(b),
    }
}

fn to_sample(value: f64) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
