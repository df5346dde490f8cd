use std::time::{Duration, Instant};

use cap_stitch::overlap::band_similarity;
use cap_stitch::{Frame, OverlapConfig, OverlapFinder, PixelFormat, StitchResult};

/// Benchmark comparing coarse-to-fine overlap search against an exhaustive
/// full-resolution scan of every candidate overlap.
///
/// Time complexity: the exhaustive scan is O(range * width * height); the
/// coarse search samples every 2nd row, every 4th column and every 5th
/// candidate, then refines a 9-row window.
fn main() -> StitchResult<()> {
    println!("Overlap Search Benchmark");
    println!("═══════════════════════════");

    let width = 1280;
    let height = 900;
    let scroll = 240;
    let rounds = 5;

    println!(
        "Benchmarking: {}x{} frames scrolled by {} rows, {} rounds",
        width, height, scroll, rounds
    );
    println!();

    let top = document(width, height, 0)?;
    let bottom = document(width, height, scroll)?;
    let expected = height - scroll;

    println!("Running coarse-to-fine search...");
    let finder = OverlapFinder::new(OverlapConfig::default());
    let (coarse_time, coarse) = time_rounds(rounds, || {
        finder
            .find_overlap(&top, &bottom)
            .map(|r| (r.overlap_rows, r.similarity))
            .unwrap_or((0, 0.0))
    });

    println!("Running exhaustive full-resolution scan...");
    let (full_time, full) = time_rounds(rounds, || exhaustive(&top, &bottom));

    let speedup = full_time.as_secs_f64() / coarse_time.as_secs_f64();

    println!();
    println!("Results:");
    println!("───────────");
    println!("Expected overlap: {} rows", expected);
    println!(
        "Coarse-to-fine: {} rows (similarity {:.3}), {:.2} ms per pair",
        coarse.0,
        coarse.1,
        per_round_ms(coarse_time, rounds)
    );
    println!(
        "Exhaustive:     {} rows (similarity {:.3}), {:.2} ms per pair",
        full.0,
        full.1,
        per_round_ms(full_time, rounds)
    );
    println!("Speedup: {:.1}x", speedup);

    let coarse_samples = sampled_pixels(width, height, &OverlapConfig::default());
    let full_samples = u64::from(width) * (1..=height).map(u64::from).sum::<u64>();
    println!();
    println!("Pixel comparisons per pair:");
    println!("─────────────────────────────");
    println!("Coarse-to-fine: ~{}", coarse_samples);
    println!("Exhaustive:     {}", full_samples);
    Ok(())
}

fn time_rounds<T>(rounds: u32, mut f: impl FnMut() -> T) -> (Duration, T) {
    let start = Instant::now();
    let mut last = f();
    for _ in 1..rounds {
        last = f();
    }
    (start.elapsed(), last)
}

fn per_round_ms(total: Duration, rounds: u32) -> f64 {
    total.as_secs_f64() * 1000.0 / f64::from(rounds)
}

/// Every overlap from the full height down to 1 at full resolution.
fn exhaustive(top: &Frame, bottom: &Frame) -> (u32, f64) {
    let cfg = OverlapConfig {
        row_step: 1,
        column_step: 1,
        ..OverlapConfig::default()
    };
    let mut best = (0, 0.0);
    for overlap in (1..=top.height.min(bottom.height)).rev() {
        let similarity = band_similarity(top, bottom, overlap, &cfg);
        if similarity > best.1 {
            best = (overlap, similarity);
        }
    }
    best
}

/// Rough count of pixel comparisons made by the default coarse search.
fn sampled_pixels(width: u32, height: u32, cfg: &OverlapConfig) -> u64 {
    let columns = u64::from(width.div_ceil(cfg.column_step));
    let max = (cfg.search_fraction * f64::from(height)) as u32;
    let candidates = (cfg.min_overlap..=max).step_by(cfg.coarse_step as usize);
    let rows: u64 = candidates
        .map(|o| u64::from(o.div_ceil(cfg.row_step)))
        .sum();
    let refine = u64::from(2 * cfg.refine_radius) * u64::from(max.div_ceil(cfg.row_step));
    (rows + refine) * columns
}

/// Synthetic text-like page: rows of 6px "glyph" blocks separated by blank
/// lines, viewed `offset` rows down the page.
fn document(width: u32, height: u32, offset: u32) -> StitchResult<Frame> {
    let mut data = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        let page_y = y + offset;
        let line = page_y / 18;
        let blank = page_y % 18 >= 12;
        for x in 0..width {
            let glyph = x / 6;
            let mut h = (u64::from(line) << 32) | u64::from(glyph);
            h = (h ^ (h >> 33)).wrapping_mul(0xFF51_AFD7_ED55_8CCD);
            h ^= h >> 29;
            let ink = !blank && h % 3 != 0;
            let v = if ink { (h >> 8) as u8 & 0x7F } else { 245 };
            data.extend_from_slice(&[v, v, v, 255]);
        }
    }
    Frame::packed(width, height, PixelFormat::Bgra8, data)
}
