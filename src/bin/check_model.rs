//! Model artifact checker for UPRisk.
//!
//! Loads a logistic graph, compares its declared inputs with the encoder's
//! signature and optionally runs one reference record through the full pipeline.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin check_model -- [<model_path>] [--list-slots] [--smoke]
//! ```
//!
//! Without a path, `UPRISK_MODEL_PATH` (or the default bundled model) is used.
//! Exits non-zero when the artifact cannot be loaded or does not match.

use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};

use uprisk::adapters::LogisticEngine;
use uprisk::application::{check_signature, RiskCalculator};
use uprisk::config::AppConfig;
use uprisk::domain::{input_signature, FormRecord};
use uprisk::ports::InferenceEngine;

struct Args {
    model_path: Option<PathBuf>,
    list_slots: bool,
    smoke: bool,
}

fn usage() -> String {
    "Usage: check_model [<model_path>] [--list-slots] [--smoke]".to_string()
}

fn parse_args() -> Result<Args> {
    let mut parsed = Args {
        model_path: None,
        list_slots: false,
        smoke: false,
    };

    for arg in env::args().skip(1) {
        match arg.as_str() {
            "--list-slots" => parsed.list_slots = true,
            "--smoke" => parsed.smoke = true,
            "-h" | "--help" => bail!(usage()),
            _ if parsed.model_path.is_none() && !arg.starts_with("--") => {
                parsed.model_path = Some(PathBuf::from(arg));
            }
            _ => bail!(usage()),
        }
    }

    Ok(parsed)
}

/// Reference record: 10-year-old, congenital EOS, bilateral MCGR to the pelvis.
fn reference_record() -> Result<FormRecord> {
    let record = FormRecord::from_pairs([
        ("age_at_insertion", "10"),
        ("height_pre", "120"),
        ("weight_pre", "25"),
        ("eos_type", "Congenital"),
        ("amb_status_preop", "Ambulatory"),
        ("major_cobb_angle_pre", "60"),
        ("minor_cobb_angle_pre", "30"),
        ("kyphosis_pre", "40"),
        ("construct_type_initial", "MCGR"),
        ("construct_side_initial", "Bilateral"),
        ("superior_attach_initial", "Spine"),
        ("num_superior_anchors_initial", "2"),
        ("inferior_attach_initial", "Pelvis"),
    ])?;
    Ok(record)
}

fn main() -> Result<()> {
    let args = parse_args()?;
    let config = AppConfig::from_env()?;
    let model_path = args.model_path.unwrap_or(config.model_path.clone());

    let expected = input_signature();
    if args.list_slots {
        println!("Encoder signature ({} slots):", expected.len());
        for (i, name) in expected.iter().enumerate() {
            println!("  {i:>2}  {name}");
        }
    }

    let session = LogisticEngine::new()
        .load(&model_path)
        .with_context(|| format!("Failed to load {}", model_path.display()))?;

    println!("Model:       {}", model_path.display());
    if let Some(fp) = session.fingerprint() {
        println!("SHA-256:     {fp}");
    }
    println!("Inputs:      {}", session.input_names().len());
    println!("Outputs:     {}", session.output_names().join(", "));

    check_signature(session.as_ref())
        .map_err(|e| anyhow!("{} does not match the encoder: {e}", model_path.display()))?;
    println!("Signature:   OK ({} slots)", expected.len());

    if args.smoke {
        let calculator =
            RiskCalculator::new(LogisticEngine::new(), model_path, config.encoding_mode);
        let prediction = calculator.predict(&reference_record()?)?;
        println!("Reference:   {}", prediction.display_line());
    }

    Ok(())
}
