//! Banco de filtros: reductores estadísticos que convierten una ventana de
//! muestras de una dimensión en un número fijo de características.
//!
//! Todos siguen el mismo contrato: fallan si la ventana es más corta que su
//! mínimo o si el tamaño de salida no coincide con su aridad, y en otro caso
//! escriben exactamente esa cantidad de valores.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Ventana del detector de picos
pub const PEAKS_LAG: usize = 5;
/// Umbral en desviaciones estándar para considerar una señal
pub const PEAKS_THRESHOLD: f32 = 3.5;
/// Peso de una señal al incorporarla a la copia filtrada
pub const PEAKS_INFLUENCE: f32 = 0.5;
/// Desviación absoluta mínima para considerar una señal
const PEAKS_MIN_DEVIATION: f32 = 0.1;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("Window too short: requires {required} samples, got {actual}")]
    InputTooShort { required: usize, actual: usize },

    #[error("Invalid output size: expected {expected}, got {actual}")]
    OutputSize { expected: usize, actual: usize },
}

/// Firma común de todos los reductores
pub type FilterFn = fn(&[f32], &mut [f32]) -> Result<(), FilterError>;

/// Reductores disponibles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    Max,
    Min,
    Mean,
    StdDev,
    Peaks,
    TotalAcc,
    Zcr,
    Rms,
    PassThrough,
}

impl FilterKind {
    pub fn function(self) -> FilterFn {
        match self {
            FilterKind::Max => max,
            FilterKind::Min => min,
            FilterKind::Mean => mean,
            FilterKind::StdDev => std_dev,
            FilterKind::Peaks => peaks,
            FilterKind::TotalAcc => total_acc,
            FilterKind::Zcr => zcr,
            FilterKind::Rms => rms,
            FilterKind::PassThrough => pass_through,
        }
    }

    pub fn apply(self, input: &[f32], output: &mut [f32]) -> Result<(), FilterError> {
        (self.function())(input, output)
    }
}

/// Entrada del banco: reductor más el número de valores que produce por dimensión
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterDescriptor {
    pub kind: FilterKind,
    pub out_size: usize,
}

impl FilterDescriptor {
    pub const fn new(kind: FilterKind, out_size: usize) -> Self {
        Self { kind, out_size }
    }

    /// Reductor de una sola salida
    pub const fn single(kind: FilterKind) -> Self {
        Self::new(kind, 1)
    }
}

/// Banco usado por el entrenador. El orden forma parte del contrato con el
/// modelo: no reordenar.
pub const DEFAULT_FILTERS: [FilterDescriptor; 8] = [
    FilterDescriptor::single(FilterKind::Max),
    FilterDescriptor::single(FilterKind::Mean),
    FilterDescriptor::single(FilterKind::Min),
    FilterDescriptor::single(FilterKind::StdDev),
    FilterDescriptor::single(FilterKind::Peaks),
    FilterDescriptor::single(FilterKind::TotalAcc),
    FilterDescriptor::single(FilterKind::Zcr),
    FilterDescriptor::single(FilterKind::Rms),
];

/// Valida un reductor de una sola salida
fn check_single(input: &[f32], output: &[f32], min_len: usize) -> Result<(), FilterError> {
    if input.len() < min_len {
        return Err(FilterError::InputTooShort {
            required: min_len,
            actual: input.len(),
        });
    }
    if output.len() != 1 {
        return Err(FilterError::OutputSize {
            expected: 1,
            actual: output.len(),
        });
    }
    Ok(())
}

pub fn max(input: &[f32], output: &mut [f32]) -> Result<(), FilterError> {
    check_single(input, output, 1)?;

    let mut max = input[0];
    for &value in &input[1..] {
        if value > max {
            max = value;
        }
    }
    output[0] = max;
    Ok(())
}

pub fn min(input: &[f32], output: &mut [f32]) -> Result<(), FilterError> {
    check_single(input, output, 1)?;

    let mut min = input[0];
    for &value in &input[1..] {
        if value < min {
            min = value;
        }
    }
    output[0] = min;
    Ok(())
}

pub fn mean(input: &[f32], output: &mut [f32]) -> Result<(), FilterError> {
    check_single(input, output, 1)?;
    output[0] = mean_of(input);
    Ok(())
}

/// Desviación estándar poblacional (divide entre n)
pub fn std_dev(input: &[f32], output: &mut [f32]) -> Result<(), FilterError> {
    check_single(input, output, 1)?;
    output[0] = std_dev_of(input);
    Ok(())
}

/// Número de picos positivos según un detector de z-score suavizado
pub fn peaks(input: &[f32], output: &mut [f32]) -> Result<(), FilterError> {
    check_single(input, output, PEAKS_LAG + 2)?;
    output[0] = count_peaks(input) as f32;
    Ok(())
}

/// Aceleración absoluta total
pub fn total_acc(input: &[f32], output: &mut [f32]) -> Result<(), FilterError> {
    check_single(input, output, 1)?;
    output[0] = input.iter().map(|x| x.abs()).sum();
    Ok(())
}

/// Tasa de cruces por cero
pub fn zcr(input: &[f32], output: &mut [f32]) -> Result<(), FilterError> {
    check_single(input, output, 2)?;

    let crossings = input
        .windows(2)
        .filter(|w| (w[1] >= 0.0 && w[0] < 0.0) || (w[1] < 0.0 && w[0] >= 0.0))
        .count();
    output[0] = crossings as f32 / (input.len() - 1) as f32;
    Ok(())
}

/// Raíz cuadrática media
pub fn rms(input: &[f32], output: &mut [f32]) -> Result<(), FilterError> {
    check_single(input, output, 1)?;
    output[0] = (input.iter().map(|x| x * x).sum::<f32>() / input.len() as f32).sqrt();
    Ok(())
}

/// Copia la ventana tal cual; la salida debe tener capacidad suficiente
pub fn pass_through(input: &[f32], output: &mut [f32]) -> Result<(), FilterError> {
    if input.len() > output.len() {
        return Err(FilterError::OutputSize {
            expected: input.len(),
            actual: output.len(),
        });
    }
    output[..input.len()].copy_from_slice(input);
    Ok(())
}

// ========== Funciones auxiliares ==========

fn mean_of(data: &[f32]) -> f32 {
    data.iter().sum::<f32>() / data.len() as f32
}

fn std_dev_of(data: &[f32]) -> f32 {
    let mean = mean_of(data);
    let sum_of_squares: f32 = data.iter().map(|x| (x - mean) * (x - mean)).sum();
    (sum_of_squares / data.len() as f32).sqrt()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signal {
    None,
    Positive,
    Negative,
}

/// Detector de picos por z-score suavizado.
///
/// Trabaja sobre una copia de la señal en la que las muestras clasificadas
/// como señal se amortiguan con `PEAKS_INFLUENCE`. Tras clasificar la muestra
/// `i`, la media y la desviación móviles se recalculan sobre
/// `filtered[i - lag..i]`. El estado se reconstruye en cada llamada.
fn count_peaks(data: &[f32]) -> u32 {
    let mut filtered = data.to_vec();
    let mut avg = mean_of(&data[..PEAKS_LAG]);
    let mut std = std_dev_of(&data[..PEAKS_LAG]);
    let mut previous = Signal::None;
    let mut peaks = 0;

    for i in PEAKS_LAG..data.len() {
        let deviation = data[i] - avg;
        let signal = if deviation.abs() > PEAKS_MIN_DEVIATION
            && deviation.abs() > PEAKS_THRESHOLD * std
        {
            filtered[i] = PEAKS_INFLUENCE * data[i] + (1.0 - PEAKS_INFLUENCE) * filtered[i - 1];
            if deviation > 0.0 {
                Signal::Positive
            } else {
                Signal::Negative
            }
        } else {
            filtered[i] = data[i];
            Signal::None
        };

        // Solo cuenta la entrada en una señal positiva
        if signal == Signal::Positive && previous != Signal::Positive {
            peaks += 1;
        }
        previous = signal;

        let lag_window = &filtered[i - PEAKS_LAG..i];
        avg = mean_of(lag_window);
        std = std_dev_of(lag_window);
    }

    peaks
}
