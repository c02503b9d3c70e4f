// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Face-signature extraction: turns captured pixels into a normalized
// grayscale intensity histogram that the face matcher can correlate.

use image::DynamicImage;
use kioskid_core::FaceSignature;
use kioskid_core::error::{KioskError, Result};
use tracing::{debug, instrument};

/// Largest useful bin count: one bin per 8-bit intensity level.
pub const MAX_BINS: usize = 256;

fn check_bins(bins: usize) -> Result<()> {
    if bins == 0 || bins > MAX_BINS {
        return Err(KioskError::Image(format!(
            "histogram bins must be in 1..={MAX_BINS}, got {bins}"
        )));
    }
    Ok(())
}

/// Histogram of `intensities` over `bins` equal-width buckets, each bucket
/// holding the fraction of samples that fell into it.
fn histogram(intensities: impl Iterator<Item = u8>, bins: usize) -> Result<FaceSignature> {
    let mut counts = vec![0u64; bins];
    let mut total = 0u64;
    for value in intensities {
        counts[value as usize * bins / 256] += 1;
        total += 1;
    }
    if total == 0 {
        return Err(KioskError::Image("image has no pixels".into()));
    }
    let values = counts
        .into_iter()
        .map(|c| c as f64 / total as f64)
        .collect();
    Ok(FaceSignature::new(values))
}

/// Signature of a decoded image (any colour type; converted to 8-bit luma).
#[instrument(skip(image), fields(width = image.width(), height = image.height()))]
pub fn face_signature_from_image(image: &DynamicImage, bins: usize) -> Result<FaceSignature> {
    check_bins(bins)?;
    let luma = image.to_luma8();
    let signature = histogram(luma.pixels().map(|p| p.0[0]), bins)?;
    debug!(bins, "face signature extracted");
    Ok(signature)
}

/// Signature of a raw RGBA8 buffer, as handed over by a camera frame grab.
///
/// Luminance uses the Rec. 601 weights (0.299 R + 0.587 G + 0.114 B); alpha
/// is ignored.
pub fn face_signature_from_rgba(rgba: &[u8], bins: usize) -> Result<FaceSignature> {
    check_bins(bins)?;
    if rgba.len() % 4 != 0 {
        return Err(KioskError::Image(format!(
            "RGBA buffer length {} is not a multiple of 4",
            rgba.len()
        )));
    }
    let luma = rgba.chunks_exact(4).map(|px| {
        let y = 0.299 * f64::from(px[0]) + 0.587 * f64::from(px[1]) + 0.114 * f64::from(px[2]);
        y.round().clamp(0.0, 255.0) as u8
    });
    histogram(luma, bins)
}
