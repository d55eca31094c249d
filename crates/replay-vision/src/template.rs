use image::{GrayImage, RgbaImage};
use replay_capture::{crop_region, ScreenRegion};
use serde::{Deserialize, Serialize};

/// Best template found inside an image
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateMatch {
    /// Index into the candidate list passed to [`best_match`]
    pub index: usize,
    pub score: f64,
    pub x: u32,
    pub y: u32,
}

/// Half-open range of resize factors tried when a template's on-screen size is unknown
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleRange {
    pub start: f64,
    pub end: f64,
    pub step: f64,
}

impl ScaleRange {
    pub fn values(&self) -> Vec<f64> {
        if self.step <= 0.0 || self.end <= self.start {
            return vec![self.start];
        }
        let count = ((self.end - self.start) / self.step - 1e-9).ceil().max(1.0) as usize;
        (0..count)
            .map(|i| self.start + i as f64 * self.step)
            .collect()
    }
}

/// Find the candidate that best matches somewhere inside `image`.
///
/// Each candidate slides over the image and is scored with zero-mean normalized
/// cross-correlation; candidates larger than the image are skipped. Ties keep the
/// earlier candidate. Returns `None` when the best score is below `threshold`.
pub fn best_match(image: &RgbaImage, candidates: &[RgbaImage], threshold: f64) -> Option<TemplateMatch> {
    let gray = image::imageops::grayscale(image);
    let integral = Integral::new(&gray);

    let mut best: Option<TemplateMatch> = None;
    for (index, candidate) in candidates.iter().enumerate() {
        let templ = image::imageops::grayscale(candidate);
        let Some((score, x, y)) = slide(&gray, &integral, &templ) else {
            continue;
        };
        if best.as_ref().map_or(true, |b| score > b.score) {
            best = Some(TemplateMatch { index, score, x, y });
        }
    }

    best.filter(|b| b.score >= threshold)
}

/// Crop `roi` out of `avatar` and resize the crop by every factor in `scales`.
pub fn scaled_templates(avatar: &RgbaImage, roi: &ScreenRegion, scales: &ScaleRange) -> Vec<RgbaImage> {
    let crop = crop_region(avatar, roi);
    scales
        .values()
        .into_iter()
        .map(|scale| {
            let w = ((crop.width() as f64 * scale).round() as u32).max(1);
            let h = ((crop.height() as f64 * scale).round() as u32).max(1);
            if (w, h) == crop.dimensions() {
                crop.clone()
            } else {
                image::imageops::resize(&crop, w, h, image::imageops::FilterType::Triangle)
            }
        })
        .collect()
}

/// Summed-area tables of pixel values and squared pixel values
struct Integral {
    stride: usize,
    sum: Vec<f64>,
    sq: Vec<f64>,
}

impl Integral {
    fn new(img: &GrayImage) -> Self {
        let (w, h) = (img.width() as usize, img.height() as usize);
        let stride = w + 1;
        let mut sum = vec![0.0; stride * (h + 1)];
        let mut sq = vec![0.0; stride * (h + 1)];
        for y in 0..h {
            let mut row_sum = 0.0;
            let mut row_sq = 0.0;
            for x in 0..w {
                let v = img.get_pixel(x as u32, y as u32)[0] as f64;
                row_sum += v;
                row_sq += v * v;
                sum[(y + 1) * stride + x + 1] = sum[y * stride + x + 1] + row_sum;
                sq[(y + 1) * stride + x + 1] = sq[y * stride + x + 1] + row_sq;
            }
        }
        Self { stride, sum, sq }
    }

    fn window(&self, table: &[f64], x: usize, y: usize, w: usize, h: usize) -> f64 {
        let s = self.stride;
        table[(y + h) * s + x + w] - table[y * s + x + w] - table[(y + h) * s + x] + table[y * s + x]
    }

    /// Mean and standard deviation of a window
    fn stats(&self, x: usize, y: usize, w: usize, h: usize) -> (f64, f64) {
        let n = (w * h) as f64;
        let mean = self.window(&self.sum, x, y, w, h) / n;
        let variance = (self.window(&self.sq, x, y, w, h) / n - mean * mean).max(0.0);
        (mean, variance.sqrt())
    }
}

/// Best ZNCC score of `templ` over every position inside `img`
fn slide(img: &GrayImage, integral: &Integral, templ: &GrayImage) -> Option<(f64, u32, u32)> {
    let (iw, ih) = img.dimensions();
    let (tw, th) = templ.dimensions();
    if tw == 0 || th == 0 || tw > iw || th > ih {
        return None;
    }

    let (tmpl_mean, tmpl_std) = compute_stats(templ);
    let centered: Vec<f64> = templ.pixels().map(|p| p[0] as f64 - tmpl_mean).collect();
    let n = (tw * th) as f64;

    let mut best: Option<(f64, u32, u32)> = None;
    for oy in 0..=(ih - th) {
        for ox in 0..=(iw - tw) {
            let (_, win_std) = integral.stats(ox as usize, oy as usize, tw as usize, th as usize);
            let denom = win_std * tmpl_std;
            let score = if denom < 1e-10 {
                0.0
            } else {
                // Sum of (I - mean_I)(T - mean_T) equals sum of I(T - mean_T)
                let mut cross = 0.0;
                for ty in 0..th {
                    for tx in 0..tw {
                        let v = img.get_pixel(ox + tx, oy + ty)[0] as f64;
                        cross += v * centered[(ty * tw + tx) as usize];
                    }
                }
                cross / (n * denom)
            };
            if best.map_or(true, |(s, _, _)| score > s) {
                best = Some((score, ox, oy));
            }
        }
    }
    best
}

/// Compute mean and standard deviation of pixel values
fn compute_stats(img: &GrayImage) -> (f64, f64) {
    let pixels: Vec<f64> = img.pixels().map(|p| p[0] as f64).collect();
    let n = pixels.len() as f64;
    if n == 0.0 {
        return (0.0, 0.0);
    }
    let mean = pixels.iter().sum::<f64>() / n;
    let variance = pixels.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}
