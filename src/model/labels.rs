//! Output classes of the instrument classifier

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{MelBridgeError, Result};

/// IRMAS instrument classes, in output-neuron order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Instrument {
    Cello,
    Clarinet,
    Flute,
    AcousticGuitar,
    ElectricGuitar,
    Organ,
    Piano,
    Saxophone,
    Trumpet,
    Violin,
}

impl Instrument {
    pub const ALL: [Instrument; 10] = [
        Instrument::Cello,
        Instrument::Clarinet,
        Instrument::Flute,
        Instrument::AcousticGuitar,
        Instrument::ElectricGuitar,
        Instrument::Organ,
        Instrument::Piano,
        Instrument::Saxophone,
        Instrument::Trumpet,
        Instrument::Violin,
    ];

    /// Three-letter dataset code (directory name in the training set)
    pub fn code(&self) -> &'static str {
        match self {
            Instrument::Cello => "cel",
            Instrument::Clarinet => "cla",
            Instrument::Flute => "flu",
            Instrument::AcousticGuitar => "gac",
            Instrument::ElectricGuitar => "gel",
            Instrument::Organ => "org",
            Instrument::Piano => "pia",
            Instrument::Saxophone => "sax",
            Instrument::Trumpet => "tru",
            Instrument::Violin => "vio",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Instrument::Cello => "Cello",
            Instrument::Clarinet => "Clarinet",
            Instrument::Flute => "Flute",
            Instrument::AcousticGuitar => "Acoustic Guitar",
            Instrument::ElectricGuitar => "Electric Guitar",
            Instrument::Organ => "Organ",
            Instrument::Piano => "Piano",
            Instrument::Saxophone => "Saxophone",
            Instrument::Trumpet => "Trumpet",
            Instrument::Violin => "Violin",
        }
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// One ranked prediction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub instrument: Instrument,
    pub probability: f32,
}

/// Rank classifier outputs and keep the `k` most likely classes
///
/// Ties keep class order. `outputs` must hold exactly one value per class.
pub fn top_k(outputs: &[f32], k: usize) -> Result<Vec<Prediction>> {
    if outputs.len() != Instrument::ALL.len() {
        return Err(MelBridgeError::SizeMismatch {
            name: "classifier output".to_string(),
            expected: Instrument::ALL.len(),
            actual: outputs.len(),
        });
    }

    let mut ranked: Vec<Prediction> = Instrument::ALL
        .iter()
        .zip(outputs.iter())
        .map(|(&instrument, &probability)| Prediction {
            instrument,
            probability,
        })
        .collect();
    ranked.sort_by(|a, b| b.probability.total_cmp(&a.probability));
    ranked.truncate(k);
    Ok(ranked)
}
