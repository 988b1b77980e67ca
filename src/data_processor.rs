use std::collections::TryReserveError;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

use crate::engine::EngineModel;
use crate::filters::{FilterDescriptor, FilterError, FilterKind, DEFAULT_FILTERS};
use crate::model_header::ModelHeader;
use crate::sample_buffer::{try_zeroed, SampleBuffer};
use crate::types::{AccSample, ACC_DIMENSIONS, DEFAULT_SAMPLES_LENGTH};

#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Could not allocate {what}: {source}")]
    Alloc {
        what: &'static str,
        #[source]
        source: TryReserveError,
    },

    #[error("No complete window recorded yet")]
    NotReady,

    #[error("Filter {kind:?} failed on dimension {dimension}: {source}")]
    Filter {
        kind: FilterKind,
        dimension: usize,
        #[source]
        source: FilterError,
    },
}

/// Parámetros del procesador de datos
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Longitud de la ventana (muestras por dimensión)
    pub samples_length: usize,
    /// Número de dimensiones de cada muestra
    pub dimensions: usize,
    /// Filtros en el orden con el que se entrenó el modelo
    pub filters: Vec<FilterDescriptor>,
    /// Tamaño esperado del vector de características
    pub output_length: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self::with_default_filters(DEFAULT_SAMPLES_LENGTH, ACC_DIMENSIONS)
    }
}

impl ProcessorConfig {
    /// Configuración con el banco de filtros por defecto
    pub fn with_default_filters(samples_length: usize, dimensions: usize) -> Self {
        Self {
            samples_length,
            dimensions,
            filters: DEFAULT_FILTERS.to_vec(),
            output_length: DEFAULT_FILTERS.len() * dimensions,
        }
    }

    /// Configuración derivada de un modelo: la geometría de la ventana sale de
    /// la cabecera y el tamaño de salida de la entrada del motor.
    pub fn for_model(header: &ModelHeader<'_>, engine_model: &EngineModel<'_>) -> Self {
        Self {
            samples_length: header.samples_length() as usize,
            dimensions: header.sample_dimensions() as usize,
            filters: DEFAULT_FILTERS.to_vec(),
            output_length: engine_model.input_len(),
        }
    }

    /// Suma de las salidas de todos los filtros sobre todas las dimensiones.
    /// `None` si no cabe en un `usize`.
    pub fn filters_output_length(&self) -> Option<usize> {
        self.filters.iter().try_fold(0usize, |total, filter| {
            total.checked_add(filter.out_size.checked_mul(self.dimensions)?)
        })
    }

    pub fn validate(&self) -> Result<(), ProcessorError> {
        if self.samples_length == 0 || self.dimensions == 0 || self.output_length == 0 {
            return Err(ProcessorError::Config(format!(
                "samples length ({}), dimensions ({}) and output length ({}) must be non-zero",
                self.samples_length, self.dimensions, self.output_length
            )));
        }

        let total = self.filters_output_length().ok_or_else(|| {
            ProcessorError::Config("filters output length overflows".to_string())
        })?;
        if total != self.output_length {
            return Err(ProcessorError::Config(format!(
                "filters produce {} values but output length is {}",
                total, self.output_length
            )));
        }

        Ok(())
    }
}

/// Estados del procesador
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorState {
    /// Aún no se completó la primera ventana
    Filling,
    /// Hay al menos una ventana completa; se sigue grabando sobre el anillo
    Ready,
}

/// Acumula muestras y aplica el banco de filtros para obtener el vector de
/// características que espera el modelo.
pub struct DataProcessor {
    config: ProcessorConfig,
    buffer: SampleBuffer,
    output: Vec<f32>,
}

impl DataProcessor {
    /// Valida la configuración y reserva todos los buffers. Si falla no queda
    /// ningún procesador inicializado.
    pub fn new(config: ProcessorConfig) -> Result<Self, ProcessorError> {
        config.validate()?;

        let buffer = SampleBuffer::new(config.dimensions, config.samples_length)?;
        let output = try_zeroed(config.output_length, "feature vector")?;

        Ok(Self {
            config,
            buffer,
            output,
        })
    }

    /// Graba un lote de muestras intercaladas por dimensión
    pub fn record(&mut self, samples: &[f32]) -> Result<(), ProcessorError> {
        let was_ready = self.is_ready();
        self.buffer.record(samples)?;
        if !was_ready && self.is_ready() {
            trace!(
                samples_length = self.config.samples_length,
                "first window complete"
            );
        }
        Ok(())
    }

    /// Graba una muestra del acelerómetro; requiere tres dimensiones
    pub fn record_acc(&mut self, sample: AccSample) -> Result<(), ProcessorError> {
        self.record(&sample.to_array())
    }

    pub fn is_ready(&self) -> bool {
        self.buffer.is_filled()
    }

    pub fn state(&self) -> ProcessorState {
        if self.is_ready() {
            ProcessorState::Ready
        } else {
            ProcessorState::Filling
        }
    }

    /// Ejecuta todos los filtros sobre la ventana actual.
    ///
    /// Orden de salida: por cada filtro, todas las dimensiones. El slice
    /// devuelto apunta al buffer interno y se sobrescribe en la siguiente
    /// llamada; copiarlo si se necesita conservar.
    pub fn feature_vector(&mut self) -> Result<&[f32], ProcessorError> {
        if !self.is_ready() {
            return Err(ProcessorError::NotReady);
        }

        let mut offset = 0;
        for filter in &self.config.filters {
            for dimension in 0..self.config.dimensions {
                let window = self
                    .buffer
                    .snapshot(dimension)
                    .ok_or_else(|| ProcessorError::Config(format!("unknown dimension {}", dimension)))?;
                let out = &mut self.output[offset..offset + filter.out_size];
                filter
                    .kind
                    .apply(window, out)
                    .map_err(|source| ProcessorError::Filter {
                        kind: filter.kind,
                        dimension,
                        source,
                    })?;
                offset += filter.out_size;
            }
        }

        Ok(&self.output)
    }

    /// Tamaño del vector de características
    pub fn output_length(&self) -> usize {
        self.config.output_length
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Descarta las muestras grabadas y vuelve a `Filling`
    pub fn reset(&mut self) {
        self.buffer.clear();
    }
}
