//! Suspiciousness formulas

use super::SpectrumCounts;
use serde::{Deserialize, Serialize};
use std::fmt;

/// SBFL formula used to score a statement
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum SbflFormula {
    /// ef / sqrt((ef+nf)(ef+ep))
    #[default]
    Ochiai,
    /// (ef/(ef+nf)) / (ef/(ef+nf) + ep/(ep+np))
    Tarantula,
    /// ef² / (ep+nf), or 1 when ep+nf = 0
    #[value(name = "dstar")]
    DStar,
    /// 2ef / (ef+nf+ep)
    Dice,
    /// 1 - ep/(ep+ef)
    Barinel,
    /// ef - ep/(np+ep+1)
    Op2,
}

impl SbflFormula {
    pub const ALL: [SbflFormula; 6] = [
        SbflFormula::Ochiai,
        SbflFormula::Tarantula,
        SbflFormula::DStar,
        SbflFormula::Dice,
        SbflFormula::Barinel,
        SbflFormula::Op2,
    ];

    /// Score one statement; `None` when a denominator is zero
    pub fn score(self, counts: &SpectrumCounts) -> Option<f64> {
        let ef = counts.ef as f64;
        let nf = counts.nf as f64;
        let ep = counts.ep as f64;
        let np = counts.np as f64;

        match self {
            SbflFormula::Ochiai => ratio(ef, ((ef + nf) * (ef + ep)).sqrt()),
            SbflFormula::Tarantula => {
                let fail_ratio = ratio(ef, ef + nf)?;
                let pass_ratio = ratio(ep, ep + np)?;
                ratio(fail_ratio, fail_ratio + pass_ratio)
            }
            SbflFormula::DStar => {
                if ep + nf == 0.0 {
                    Some(1.0)
                } else {
                    ratio(ef * ef, ep + nf)
                }
            }
            SbflFormula::Dice => ratio(2.0 * ef, ef + nf + ep),
            SbflFormula::Barinel => Some(1.0 - ratio(ep, ep + ef)?),
            SbflFormula::Op2 => Some(ef - ratio(ep, np + ep + 1.0)?),
        }
    }
}

fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    (denominator != 0.0).then(|| numerator / denominator)
}

impl fmt::Display for SbflFormula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SbflFormula::Ochiai => "Ochiai",
            SbflFormula::Tarantula => "Tarantula",
            SbflFormula::DStar => "DStar",
            SbflFormula::Dice => "Dice",
            SbflFormula::Barinel => "Barinel",
            SbflFormula::Op2 => "Op2",
        };
        write!(f, "{}", name)
    }
}
