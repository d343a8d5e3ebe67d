use std::fmt;

/// Sample data of one signal. Integer traces widen to `f64`; complex traces
/// keep their (re, im) pairs.
#[derive(Debug, Clone, PartialEq)]
pub enum Samples {
    Real(Vec<f64>),
    Complex(Vec<(f64, f64)>),
}

impl Samples {
    pub fn len(&self) -> usize {
        match self {
            Samples::Real(v) => v.len(),
            Samples::Complex(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_real(&self) -> Option<&[f64]> {
        match self {
            Samples::Real(v) => Some(v),
            Samples::Complex(_) => None,
        }
    }

    pub fn as_complex(&self) -> Option<&[(f64, f64)]> {
        match self {
            Samples::Complex(v) => Some(v),
            Samples::Real(_) => None,
        }
    }
}

/// A named waveform: dense x and y vectors of equal length, with the units
/// carried as opaque strings.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    pub x: Vec<f64>,
    pub x_unit: String,
    pub y: Samples,
    pub y_unit: String,
    pub name: String,
}

impl Waveform {
    pub(crate) fn new(
        x: Vec<f64>,
        x_unit: String,
        y: Samples,
        y_unit: String,
        name: String,
    ) -> Self {
        Waveform { x, x_unit, y, y_unit, name }
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

impl fmt::Display for Waveform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.x.first(), self.x.last()) {
            (Some(first), Some(last)) => write!(
                f,
                "Waveform: {} points, x = {} -> {} {}",
                self.x.len(),
                first,
                last,
                self.x_unit
            ),
            _ => write!(f, "Waveform: empty"),
        }
    }
}
