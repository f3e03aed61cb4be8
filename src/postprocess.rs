//! Post-processing of stored chains into analysis-ready datasets.
//!
//! `clean_chain` streams a chain file, drops the burn-in, subsamples to a
//! bounded number of rows, re-scores each kept sample and writes the
//! pre-collapse parameters and the post-collapse orbit side by side. Scoring
//! goes through the same public evaluation path as the sampler, so a row
//! that reads as zero probability here was never a valid sample.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use itertools::Itertools;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use crate::likelihood::{normalize_angles, KickLikelihood};
use crate::orbit::OrbitalTransform;
use crate::params::KickParams;
use crate::storage::{format_value, ChainReader, ChainRow};

/// What a clean pass did.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct CleanSummary {
    /// Post-burn-in rows seen in the chain file.
    pub total: usize,
    /// Rows kept by the subsampler.
    pub kept: usize,
    /// Rows written after dropping zero-probability samples.
    pub written: usize,
    pub pre_path: PathBuf,
    pub post_path: PathBuf,
}

/// Stream a stored chain into the two processed datasets.
///
/// Rows from the first `burn_in` iterations are dropped, the remainder is
/// reservoir-subsampled down to `max_samples` with its own seeded stream,
/// and each kept sample is re-normalized and re-scored before the orbital
/// transform is applied to it.
pub fn clean_chain<T: OrbitalTransform>(
    engine: &KickLikelihood<T>,
    chain_path: &Path,
    out_dir: &Path,
    burn_in: u64,
    max_samples: usize,
    seed: u64,
) -> Result<CleanSummary> {
    let mut seed_rng = ChaCha8Rng::seed_from_u64(seed);
    seed_rng.set_stream(1);
    let mut rng = SmallRng::from_rng(&mut seed_rng);

    let mut reservoir: Vec<ChainRow> = Vec::with_capacity(max_samples);
    let mut total = 0usize;
    for row in ChainReader::open(chain_path)? {
        let row = row?;
        if row.iteration <= burn_in {
            continue;
        }
        if row.position.len() != KickParams::DIM {
            bail!(
                "chain row at iteration {} has {} parameters, expected {}",
                row.iteration,
                row.position.len(),
                KickParams::DIM
            );
        }
        total += 1;
        if reservoir.len() < max_samples {
            reservoir.push(row);
        } else {
            let slot = rng.random_range(0..total);
            if slot < max_samples {
                reservoir[slot] = row;
            }
        }
    }
    let kept = reservoir.len();

    let remnant_mass = engine.observables().remnant_mass;
    let transform = engine.transform();
    let mut pre = Vec::with_capacity(kept);
    let mut post = Vec::with_capacity(kept);
    for row in &reservoir {
        let mut params = KickParams::from_position(&row.position);
        let (theta, phi) = normalize_angles(params.theta, params.phi);
        params.theta = theta;
        params.phi = phi;
        let log_prob = engine.evaluate(&params);
        if !log_prob.is_finite() {
            debug!(
                iteration = row.iteration,
                walker = row.walker,
                "dropping zero-probability sample"
            );
            continue;
        }
        let separation =
            transform.period_to_separation(params.porb_pre, params.m1_pre, params.m2);
        let orbit = transform.apply_kick(
            separation,
            params.m1_pre,
            params.m2,
            remnant_mass,
            params.w,
            params.theta,
            params.phi,
        );
        pre.push(vec![
            params.porb_pre,
            separation,
            params.m1_pre,
            params.m2,
            params.w,
            params.theta,
            params.phi,
        ]);
        post.push(vec![
            orbit.period,
            orbit.eccentricity,
            orbit.cos_inclination.acos().to_degrees(),
            orbit.systemic_velocity,
            log_prob,
        ]);
    }

    fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create output directory: {out_dir:?}"))?;
    let pre_path = out_dir.join("pre_collapse.csv");
    let post_path = out_dir.join("post_collapse.csv");
    write_rows(&pre_path, "porb_pre,a_pre,m1_pre,m2,w,theta,phi", &pre)?;
    write_rows(&post_path, "porb_post,e,inc_deg,v_sys,log_prob", &post)?;

    let written = pre.len();
    info!(total, kept, written, "chain cleaned");
    Ok(CleanSummary {
        total,
        kept,
        written,
        pre_path,
        post_path,
    })
}

fn write_rows(path: &Path, header: &str, rows: &[Vec<f64>]) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("Failed to create output file: {path:?}"))?;
    let mut writer = BufWriter::new(file);
    writeln!(writer, "{header}")?;
    for row in rows {
        let line = row.iter().map(|&v| format_value(v, None)).join(",");
        writeln!(writer, "{line}")?;
    }
    writer.flush()?;
    Ok(())
}
