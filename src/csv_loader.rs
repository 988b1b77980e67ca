use std::path::Path;

use anyhow::{bail, ensure, Context, Result};
use csv::ReaderBuilder;

use crate::types::MILLI_G_PER_G;

/// Unidades de las muestras del CSV
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleUnits {
    /// Valores en g, se usan tal cual
    G,
    /// Enteros en milli-g, se dividen entre 1000
    MilliG,
}

/// Carga muestras desde un CSV con cabecera: una fila por muestra y una
/// columna por dimensión. Las columnas sobrantes se ignoran.
///
/// Devuelve las muestras intercaladas ([d0, d1, .., d0, d1, ..]), el
/// formato que espera `DataProcessor::record`.
pub fn load_samples_from_csv(
    path: impl AsRef<Path>,
    dimensions: usize,
    units: SampleUnits,
) -> Result<Vec<f32>> {
    let path = path.as_ref();
    ensure!(dimensions > 0, "El número de dimensiones debe ser mayor que 0");

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("No se pudo abrir el CSV {:?}", path))?;

    let mut samples = Vec::new();
    for (row_idx, result) in reader.records().enumerate() {
        let record =
            result.with_context(|| format!("Fila {} inválida en {:?}", row_idx + 1, path))?;
        if record.len() < dimensions {
            bail!(
                "La fila {} tiene {} columnas, se esperaban {}",
                row_idx + 1,
                record.len(),
                dimensions
            );
        }

        for (col, field) in record.iter().take(dimensions).enumerate() {
            let field = field.trim();
            let value = match units {
                SampleUnits::G => field.parse::<f32>().with_context(|| {
                    format!("Valor inválido {:?} en fila {}, columna {}", field, row_idx + 1, col)
                })?,
                SampleUnits::MilliG => {
                    let milli_g: i32 = field.parse().with_context(|| {
                        format!(
                            "Valor milli-g inválido {:?} en fila {}, columna {}",
                            field,
                            row_idx + 1,
                            col
                        )
                    })?;
                    milli_g as f32 / MILLI_G_PER_G
                }
            };
            samples.push(value);
        }
    }

    ensure!(!samples.is_empty(), "El CSV {:?} no contiene datos", path);
    Ok(samples)
}
