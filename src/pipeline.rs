//! End-to-end build: convert → build → rank → mark-hot.
//!
//! Conversion is skipped when no conversion stages are configured or when
//! the caller asks for it. Every other stage runs in order and the first
//! fatal error stops the pipeline.

use anyhow::Result;

use crate::config::Config;
use crate::convert::{self, ConversionReport};
use crate::hot::{self, MarkSummary};
use crate::ingest::{self, BuildSummary};
use crate::progress::ProgressReporter;
use crate::rank::{self, Shortlist};

#[derive(Debug, Clone)]
pub struct PipelineSummary {
    pub conversion: Option<ConversionReport>,
    pub build: BuildSummary,
    pub shortlist: Shortlist,
    pub marks: MarkSummary,
}

pub async fn run_pipeline(
    config: &Config,
    skip_convert: bool,
    reporter: &dyn ProgressReporter,
) -> Result<PipelineSummary> {
    let conversion = if skip_convert {
        println!("convert: skipped (--skip-convert)");
        None
    } else if !config.conversion.is_configured() {
        println!("convert: skipped (no [[conversion.stages]] configured)");
        None
    } else {
        Some(convert::run_conversion(config, false, reporter)?)
    };
    println!();

    let build = ingest::run_build(config, false, reporter).await?;
    println!();

    let shortlist = rank::run_rank(config)?;
    println!();

    let marks = hot::run_mark_hot(config, reporter).await?;

    Ok(PipelineSummary {
        conversion,
        build,
        shortlist,
        marks,
    })
}
