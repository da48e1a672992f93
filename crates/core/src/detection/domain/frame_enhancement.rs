use crate::shared::frame::Frame;

/// Tile grid edge for contrast normalisation (8x8 tiles).
pub const CLAHE_TILES: usize = 8;

/// Histogram clip limit, as a multiple of the uniform bin height.
pub const CLAHE_CLIP_LIMIT: f32 = 2.0;

/// Contrast-limited adaptive histogram equalisation on the luma plane.
///
/// Chroma offsets are kept, so colours shift with brightness only.
pub fn normalize_contrast(frame: &Frame) -> Frame {
    let mut gray = frame.to_gray();
    equalize_adaptive(
        &mut gray,
        frame.width() as usize,
        frame.height() as usize,
        CLAHE_TILES,
        CLAHE_CLIP_LIMIT,
    );
    frame.with_luma(&gray)
}

/// In-place CLAHE over a `w` x `h` grey plane with a `tiles` x `tiles` grid.
pub fn equalize_adaptive(gray: &mut [u8], w: usize, h: usize, tiles: usize, clip_limit: f32) {
    if w == 0 || h == 0 || tiles == 0 || gray.len() < w * h {
        return;
    }
    let tile_w = w / tiles;
    let tile_h = h / tiles;
    if tile_w == 0 || tile_h == 0 {
        return;
    }
    let area = (tile_w * tile_h) as f32;
    let clip = ((clip_limit * area / 256.0) as u32).max(1);

    let mut luts = vec![[0u8; 256]; tiles * tiles];
    for ty in 0..tiles {
        for tx in 0..tiles {
            let mut hist = [0u32; 256];
            for y in ty * tile_h..(ty + 1) * tile_h {
                let row = &gray[y * w + tx * tile_w..y * w + (tx + 1) * tile_w];
                for &v in row {
                    hist[v as usize] += 1;
                }
            }

            let mut excess = 0u32;
            for bin in hist.iter_mut() {
                if *bin > clip {
                    excess += *bin - clip;
                    *bin = clip;
                }
            }
            let spread = excess / 256;
            let remainder = (excess % 256) as usize;
            for (i, bin) in hist.iter_mut().enumerate() {
                *bin += spread + u32::from(i < remainder);
            }

            let lut = &mut luts[ty * tiles + tx];
            let mut cumulative = 0u32;
            for (i, &count) in hist.iter().enumerate() {
                cumulative += count;
                lut[i] = ((cumulative as f32 / area) * 255.0).round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    // Bilinear blend between the four nearest tile centres.
    let last = (tiles - 1) as f32;
    for y in 0..h {
        let fy = (y as f32 / tile_h as f32 - 0.5).clamp(0.0, last);
        let y0 = fy as usize;
        let y1 = (y0 + 1).min(tiles - 1);
        let wy = fy - y0 as f32;
        for x in 0..w {
            let fx = (x as f32 / tile_w as f32 - 0.5).clamp(0.0, last);
            let x0 = fx as usize;
            let x1 = (x0 + 1).min(tiles - 1);
            let wx = fx - x0 as f32;

            let v = gray[y * w + x] as usize;
            let top = luts[y0 * tiles + x0][v] as f32 * (1.0 - wx)
                + luts[y0 * tiles + x1][v] as f32 * wx;
            let bottom = luts[y1 * tiles + x0][v] as f32 * (1.0 - wx)
                + luts[y1 * tiles + x1][v] as f32 * wx;
            gray[y * w + x] = (top * (1.0 - wy) + bottom * wy).round().clamp(0.0, 255.0) as u8;
        }
    }
}

/// Variance of the 4-neighbour Laplacian; low values mean a blurry frame.
pub fn sharpness(frame: &Frame) -> f64 {
    laplacian_variance(
        &frame.to_gray(),
        frame.width() as usize,
        frame.height() as usize,
    )
}

pub fn laplacian_variance(gray: &[u8], w: usize, h: usize) -> f64 {
    if w < 3 || h < 3 || gray.len() < w * h {
        return 0.0;
    }
    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    let mut n = 0usize;
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let c = gray[y * w + x] as f64;
            let lap = gray[(y - 1) * w + x] as f64
                + gray[(y + 1) * w + x] as f64
                + gray[y * w + x - 1] as f64
                + gray[y * w + x + 1] as f64
                - 4.0 * c;
            sum += lap;
            sum_sq += lap * lap;
            n += 1;
        }
    }
    let mean = sum / n as f64;
    (sum_sq / n as f64 - mean * mean).max(0.0)
}
